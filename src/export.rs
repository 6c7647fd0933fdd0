//! CSV export of listings.
//!
//! One row per listing with a fixed header. Images are summarized as a count;
//! their payloads are far too large for a spreadsheet cell.

use crate::listing::CarListing;
use std::borrow::Cow;
use std::path::Path;
use thiserror::Error;

pub const CSV_HEADER: &str = "ID,Make,Model,Year,Price,Description,Image Count";

/// Suggested file name for downloads.
pub const DEFAULT_EXPORT_FILE: &str = "car_data.csv";

#[derive(Error, Debug)]
pub enum ExportError {
    #[error("No car data to download.")]
    Empty,
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Quote a field when it contains a quote, comma, CR or LF, doubling any
/// inner quotes.
pub fn csv_field(value: &str) -> Cow<'_, str> {
    if value.contains(['"', ',', '\r', '\n']) {
        Cow::Owned(format!("\"{}\"", value.replace('"', "\"\"")))
    } else {
        Cow::Borrowed(value)
    }
}

fn csv_row(listing: &CarListing) -> String {
    [
        csv_field(&listing.id),
        csv_field(&listing.make),
        csv_field(&listing.model),
        Cow::Owned(listing.year.to_string()),
        Cow::Owned(listing.price.to_string()),
        csv_field(&listing.description),
        Cow::Owned(listing.image_count().to_string()),
    ]
    .join(",")
}

/// Render listings as CSV, lines joined by `\n`. Refuses an empty set.
pub fn listings_to_csv(listings: &[CarListing]) -> Result<String, ExportError> {
    if listings.is_empty() {
        return Err(ExportError::Empty);
    }
    let lines: Vec<String> = std::iter::once(CSV_HEADER.to_string())
        .chain(listings.iter().map(csv_row))
        .collect();
    Ok(lines.join("\n"))
}

/// Write the CSV for `listings` to `path`.
pub fn write_csv(path: &Path, listings: &[CarListing]) -> Result<(), ExportError> {
    let csv = listings_to_csv(listings)?;
    std::fs::write(path, csv)?;
    tracing::debug!(path = %path.display(), rows = listings.len(), "wrote CSV export");
    Ok(())
}
