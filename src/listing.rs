//! Car listings: the stored record, the authoring draft, and display helpers.
//!
//! A listing is stored as a JSON object with camelCase keys; its images live
//! under `imagesData` as an ordered array of data URLs, first image first.
//! Older records may lack `imagesData` or carry something other than an
//! array there; those read back as a listing with no images.

use crate::types::ImageAsset;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Shortened descriptions in tables cut off after this many characters.
pub const SHORT_DESCRIPTION_CHARS: usize = 50;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CarListing {
    /// Assigned by the document store; not part of the stored body.
    #[serde(skip)]
    pub id: String,
    #[serde(default)]
    pub make: String,
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub year: i32,
    #[serde(default)]
    pub price: f64,
    #[serde(default)]
    pub description: String,
    #[serde(default, deserialize_with = "lenient_images")]
    pub images_data: Vec<ImageAsset>,
}

/// Accept any JSON value for `imagesData`: arrays keep their string
/// entries, anything else means no images.
fn lenient_images<'de, D>(deserializer: D) -> Result<Vec<ImageAsset>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::Array(items) => items
            .into_iter()
            .filter_map(|item| match item {
                Value::String(s) => Some(ImageAsset::from(s)),
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    })
}

impl CarListing {
    /// Build a listing from a stored document body and its id.
    pub fn from_record(id: impl Into<String>, record: Value) -> Result<Self, serde_json::Error> {
        let mut listing: CarListing = serde_json::from_value(record)?;
        listing.id = id.into();
        Ok(listing)
    }

    /// "2019 Toyota Corolla"
    pub fn summary(&self) -> String {
        format!("{} {} {}", self.year, self.make, self.model)
    }

    /// First image, shown on cards and in tables.
    pub fn thumbnail(&self) -> Option<&ImageAsset> {
        self.images_data.first()
    }

    pub fn image_count(&self) -> usize {
        self.images_data.len()
    }

    pub fn formatted_price(&self) -> String {
        format_price(self.price)
    }

    /// Description cut to [`SHORT_DESCRIPTION_CHARS`] characters, with an
    /// ellipsis when something was cut.
    pub fn short_description(&self) -> String {
        let mut chars = self.description.chars();
        let head: String = chars.by_ref().take(SHORT_DESCRIPTION_CHARS).collect();
        if chars.next().is_some() {
            format!("{head}...")
        } else {
            head
        }
    }

    /// Case-insensitive search over make, model and description, plus a
    /// substring match on the year. An empty term matches everything.
    pub fn matches_search(&self, term: &str) -> bool {
        let term = term.to_lowercase();
        if term.is_empty() {
            return true;
        }
        self.make.to_lowercase().contains(&term)
            || self.model.to_lowercase().contains(&term)
            || self.description.to_lowercase().contains(&term)
            || self.year.to_string().contains(&term)
    }
}

/// Newest model year first. Listings of the same year keep their order.
pub fn sort_for_display(listings: &mut [CarListing]) {
    listings.sort_by(|a, b| b.year.cmp(&a.year));
}

/// Listings matching `term`, in their current order.
pub fn filter_listings<'a>(listings: &'a [CarListing], term: &str) -> Vec<&'a CarListing> {
    listings.iter().filter(|l| l.matches_search(term)).collect()
}

/// Format a price for display: `Rs.1,250,000`, `Rs.9,999.5`.
///
/// A zero (or non-finite) price is shown as `Rs.N/A`.
pub fn format_price(price: f64) -> String {
    if price == 0.0 || !price.is_finite() {
        return "Rs.N/A".to_string();
    }
    let fixed = format!("{:.3}", price.abs());
    let (int_part, frac_part) = fixed.split_once('.').unwrap_or((fixed.as_str(), ""));
    let frac_part = frac_part.trim_end_matches('0');

    let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
    for (i, digit) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }

    let sign = if price < 0.0 { "-" } else { "" };
    if frac_part.is_empty() {
        format!("Rs.{sign}{grouped}")
    } else {
        format!("Rs.{sign}{grouped}.{frac_part}")
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Please enter valid numbers for Year and Price.")]
    InvalidNumber,
    #[error("Please fill in all required text fields.")]
    MissingField(&'static str),
    #[error("Please upload at least one image for the car.")]
    NoImages,
    #[error("Price must not be negative.")]
    NegativePrice,
}

/// A validated listing body, ready for the document store.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewListing {
    pub make: String,
    pub model: String,
    pub year: i32,
    pub price: f64,
    pub description: String,
    pub images_data: Vec<ImageAsset>,
}

impl NewListing {
    /// The JSON object stored for this listing.
    pub fn to_record(&self) -> Result<Value, serde_json::Error> {
        serde_json::to_value(self)
    }
}

/// Raw text fields of the authoring form.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListingDraft {
    pub make: String,
    pub model: String,
    pub year: String,
    pub price: String,
    pub description: String,
}

impl ListingDraft {
    /// Pre-fill the form from an existing listing.
    pub fn from_listing(listing: &CarListing) -> Self {
        Self {
            make: listing.make.clone(),
            model: listing.model.clone(),
            year: listing.year.to_string(),
            price: listing.price.to_string(),
            description: listing.description.clone(),
        }
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }

    /// Validate the form together with the staged images.
    ///
    /// Checks run in the order the form reports them: numbers, then text
    /// fields, then images, then the price sign.
    pub fn validate(&self, images: &[ImageAsset]) -> Result<NewListing, ValidationError> {
        let year: i32 = self
            .year
            .trim()
            .parse()
            .map_err(|_| ValidationError::InvalidNumber)?;
        let price: f64 = self
            .price
            .trim()
            .parse()
            .map_err(|_| ValidationError::InvalidNumber)?;
        if !price.is_finite() {
            return Err(ValidationError::InvalidNumber);
        }

        for (field, value) in [
            ("make", &self.make),
            ("model", &self.model),
            ("description", &self.description),
        ] {
            if value.trim().is_empty() {
                return Err(ValidationError::MissingField(field));
            }
        }

        if images.is_empty() {
            return Err(ValidationError::NoImages);
        }
        if price < 0.0 {
            return Err(ValidationError::NegativePrice);
        }

        Ok(NewListing {
            make: self.make.trim().to_string(),
            model: self.model.trim().to_string(),
            year,
            price,
            description: self.description.trim().to_string(),
            images_data: images.to_vec(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn listing(make: &str, model: &str, year: i32, description: &str) -> CarListing {
        CarListing {
            id: format!("{make}-{year}"),
            make: make.into(),
            model: model.into(),
            year,
            price: 1_000_000.0,
            description: description.into(),
            images_data: vec!["data:image/jpeg;base64,AAAA".into()],
        }
    }

    fn draft() -> ListingDraft {
        ListingDraft {
            make: "Toyota".into(),
            model: "Corolla".into(),
            year: "2019".into(),
            price: "4500000".into(),
            description: "One owner".into(),
        }
    }

    // =========================================================================
    // Record parsing
    // =========================================================================

    #[test]
    fn from_record_reads_camel_case_fields() {
        let record = json!({
            "make": "Honda",
            "model": "Civic",
            "year": 2018,
            "price": 3250000.5,
            "description": "Clean",
            "imagesData": ["data:image/jpeg;base64,AA==", "data:image/jpeg;base64,BB=="]
        });
        let car = CarListing::from_record("abc", record).unwrap();
        assert_eq!(car.id, "abc");
        assert_eq!(car.year, 2018);
        assert_eq!(car.image_count(), 2);
        assert_eq!(car.thumbnail().unwrap().as_str(), "data:image/jpeg;base64,AA==");
    }

    #[test]
    fn missing_images_data_reads_as_empty() {
        let car = CarListing::from_record("x", json!({"make": "Kia", "year": 2010})).unwrap();
        assert!(car.images_data.is_empty());
        assert!(car.thumbnail().is_none());
    }

    #[test]
    fn non_array_images_data_reads_as_empty() {
        let car = CarListing::from_record(
            "x",
            json!({"make": "Kia", "imagesData": "data:image/jpeg;base64,AA=="}),
        )
        .unwrap();
        assert!(car.images_data.is_empty());

        let car = CarListing::from_record("y", json!({"imagesData": null})).unwrap();
        assert!(car.images_data.is_empty());
    }

    #[test]
    fn non_string_image_entries_are_skipped() {
        let car =
            CarListing::from_record("x", json!({"imagesData": ["data:a", 42, {"x": 1}, "data:b"]}))
                .unwrap();
        let urls: Vec<&str> = car.images_data.iter().map(|a| a.as_str()).collect();
        assert_eq!(urls, vec!["data:a", "data:b"]);
    }

    #[test]
    fn id_is_not_part_of_the_record() {
        let car = listing("Kia", "Rio", 2015, "x");
        let value = serde_json::to_value(&car).unwrap();
        assert!(value.get("id").is_none());
        assert!(value.get("imagesData").is_some());
    }

    // =========================================================================
    // Search and ordering
    // =========================================================================

    #[test]
    fn search_is_case_insensitive_over_text_fields() {
        let car = listing("Toyota", "Corolla", 2019, "Low mileage, FULL service history");
        assert!(car.matches_search("toyota"));
        assert!(car.matches_search("COROL"));
        assert!(car.matches_search("full service"));
        assert!(!car.matches_search("honda"));
    }

    #[test]
    fn search_matches_year_as_substring() {
        let car = listing("Toyota", "Corolla", 2019, "x");
        assert!(car.matches_search("201"));
        assert!(car.matches_search("19"));
        assert!(!car.matches_search("2020"));
    }

    #[test]
    fn empty_search_matches_everything() {
        let car = listing("Toyota", "Corolla", 2019, "x");
        assert!(car.matches_search(""));
    }

    #[test]
    fn sort_puts_newest_first() {
        let mut cars = vec![
            listing("A", "a", 2010, ""),
            listing("B", "b", 2021, ""),
            listing("C", "c", 2015, ""),
            listing("D", "d", 2021, ""),
        ];
        sort_for_display(&mut cars);
        let makes: Vec<&str> = cars.iter().map(|c| c.make.as_str()).collect();
        assert_eq!(makes, vec!["B", "D", "C", "A"]);
    }

    #[test]
    fn filter_keeps_order() {
        let cars = vec![
            listing("Toyota", "Vitz", 2012, ""),
            listing("Honda", "Fit", 2013, ""),
            listing("Toyota", "Aqua", 2014, ""),
        ];
        let found = filter_listings(&cars, "toyota");
        let models: Vec<&str> = found.iter().map(|c| c.model.as_str()).collect();
        assert_eq!(models, vec!["Vitz", "Aqua"]);
    }

    // =========================================================================
    // Display helpers
    // =========================================================================

    #[test]
    fn format_price_groups_thousands() {
        assert_eq!(format_price(4_500_000.0), "Rs.4,500,000");
        assert_eq!(format_price(999.0), "Rs.999");
        assert_eq!(format_price(1000.0), "Rs.1,000");
        assert_eq!(format_price(1234.5), "Rs.1,234.5");
        assert_eq!(format_price(12.3456), "Rs.12.346");
    }

    #[test]
    fn zero_price_is_not_available() {
        assert_eq!(format_price(0.0), "Rs.N/A");
        assert_eq!(format_price(f64::NAN), "Rs.N/A");
    }

    #[test]
    fn short_description_truncates_on_characters() {
        let long = "é".repeat(60);
        let car = listing("A", "b", 2000, &long);
        let short = car.short_description();
        assert_eq!(short.chars().count(), SHORT_DESCRIPTION_CHARS + 3);
        assert!(short.ends_with("..."));

        let exact = "x".repeat(SHORT_DESCRIPTION_CHARS);
        assert_eq!(listing("A", "b", 2000, &exact).short_description(), exact);
    }

    #[test]
    fn summary_reads_year_make_model() {
        assert_eq!(listing("Suzuki", "Alto", 2008, "").summary(), "2008 Suzuki Alto");
    }

    // =========================================================================
    // Draft validation
    // =========================================================================

    #[test]
    fn valid_draft_produces_record() {
        let images = vec![ImageAsset::from("data:image/jpeg;base64,AA==")];
        let listing = draft().validate(&images).unwrap();
        assert_eq!(listing.year, 2019);
        assert_eq!(listing.price, 4_500_000.0);

        let record = listing.to_record().unwrap();
        assert_eq!(record["imagesData"], json!(["data:image/jpeg;base64,AA=="]));
        assert_eq!(record["make"], json!("Toyota"));
    }

    #[test]
    fn non_numeric_year_is_rejected() {
        let mut d = draft();
        d.year = "abc".into();
        let err = d.validate(&["x".into()]).unwrap_err();
        assert_eq!(err, ValidationError::InvalidNumber);
        assert_eq!(err.to_string(), "Please enter valid numbers for Year and Price.");
    }

    #[test]
    fn non_numeric_price_is_rejected() {
        let mut d = draft();
        d.price = "lots".into();
        assert_eq!(d.validate(&["x".into()]), Err(ValidationError::InvalidNumber));
        d.price = "inf".into();
        assert_eq!(d.validate(&["x".into()]), Err(ValidationError::InvalidNumber));
    }

    #[test]
    fn blank_text_field_is_rejected() {
        let mut d = draft();
        d.model = "   ".into();
        let err = d.validate(&["x".into()]).unwrap_err();
        assert_eq!(err, ValidationError::MissingField("model"));
        assert_eq!(err.to_string(), "Please fill in all required text fields.");
    }

    #[test]
    fn missing_images_are_rejected() {
        assert_eq!(draft().validate(&[]), Err(ValidationError::NoImages));
    }

    #[test]
    fn negative_price_is_rejected() {
        let mut d = draft();
        d.price = "-5".into();
        assert_eq!(d.validate(&["x".into()]), Err(ValidationError::NegativePrice));
    }

    #[test]
    fn number_errors_are_reported_before_text_errors() {
        let d = ListingDraft {
            year: "abc".into(),
            ..Default::default()
        };
        assert_eq!(d.validate(&[]), Err(ValidationError::InvalidNumber));
    }

    #[test]
    fn draft_round_trips_from_listing() {
        let car = listing("Nissan", "Leaf", 2017, "EV");
        let d = ListingDraft::from_listing(&car);
        assert_eq!(d.year, "2017");
        assert_eq!(d.price, "1000000");
        let back = d.validate(&car.images_data).unwrap();
        assert_eq!(back.make, "Nissan");
        assert_eq!(back.images_data, car.images_data);
    }
}
