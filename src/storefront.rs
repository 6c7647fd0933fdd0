//! Visitor-facing storefront: the live listing feed and its static page.
//!
//! [`ListingFeed`] subscribes to the listings collection and keeps a sorted
//! (newest year first) copy of every listing. A subscription failure is not
//! an error for visitors: the feed logs it and keeps whatever it had, which
//! is an empty list if nothing ever arrived.
//!
//! [`render_storefront`] turns a set of listings into a self-contained HTML
//! page with [maud](https://maud.lambda.xyz/), CSS inlined.

use crate::listing::{CarListing, filter_listings, sort_for_display};
use crate::store::{Document, DocumentStore, Subscription};
use maud::{DOCTYPE, Markup, PreEscaped, html};
use std::sync::{Arc, Mutex};

const CSS: &str = include_str!("../static/storefront.css");

/// Card image shown when a listing's image fails to load.
pub const CARD_IMAGE_ERROR: &str = "https://placehold.co/400x200/555/FFF?text=Image+Error";
/// Card image for listings without any images.
pub const CARD_NO_IMAGES: &str = "https://placehold.co/400x200/555/FFF?text=No+Images";

/// Parse stored documents into listings, newest first.
///
/// Documents that are not listing-shaped are skipped with a warning.
pub fn listings_from_documents(docs: Vec<Document>) -> Vec<CarListing> {
    let mut listings: Vec<CarListing> = docs
        .into_iter()
        .filter_map(|doc| match CarListing::from_record(doc.id.clone(), doc.data) {
            Ok(listing) => Some(listing),
            Err(e) => {
                tracing::warn!(id = %doc.id, error = %e, "skipping malformed listing");
                None
            }
        })
        .collect();
    sort_for_display(&mut listings);
    listings
}

#[derive(Debug)]
struct FeedState {
    listings: Vec<CarListing>,
    loading: bool,
    last_error: Option<String>,
}

/// Live, sorted view of the listings collection.
#[derive(Debug)]
pub struct ListingFeed {
    state: Arc<Mutex<FeedState>>,
    _subscription: Subscription,
}

impl ListingFeed {
    /// Start watching `collection`. Dropping the feed detaches it.
    pub fn subscribe(store: &dyn DocumentStore, collection: &str) -> Self {
        let state = Arc::new(Mutex::new(FeedState {
            listings: Vec::new(),
            loading: true,
            last_error: None,
        }));

        let on_update = {
            let state = Arc::clone(&state);
            Box::new(move |docs: Vec<Document>| {
                let listings = listings_from_documents(docs);
                if let Ok(mut s) = state.lock() {
                    s.listings = listings;
                    s.loading = false;
                    s.last_error = None;
                }
            })
        };
        let on_error = {
            let state = Arc::clone(&state);
            let collection = collection.to_string();
            Box::new(move |e: crate::store::StoreError| {
                tracing::warn!(%collection, error = %e, "listing feed unavailable");
                if let Ok(mut s) = state.lock() {
                    s.loading = false;
                    s.last_error = Some(e.to_string());
                }
            })
        };

        let subscription = store.subscribe(collection, on_update, on_error);
        Self {
            state,
            _subscription: subscription,
        }
    }

    /// True until the first snapshot or error arrives.
    pub fn is_loading(&self) -> bool {
        self.state.lock().map(|s| s.loading).unwrap_or(false)
    }

    /// All listings, newest year first.
    pub fn listings(&self) -> Vec<CarListing> {
        self.state
            .lock()
            .map(|s| s.listings.clone())
            .unwrap_or_default()
    }

    /// Listings matching `term`, in display order.
    pub fn search(&self, term: &str) -> Vec<CarListing> {
        self.state
            .lock()
            .map(|s| {
                filter_listings(&s.listings, term)
                    .into_iter()
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    /// The most recent subscription failure, cleared by the next snapshot.
    pub fn last_error(&self) -> Option<String> {
        self.state.lock().ok().and_then(|s| s.last_error.clone())
    }
}

// ============================================================================
// HTML
// ============================================================================

fn base_document(title: &str, content: Markup) -> Markup {
    html! {
        (DOCTYPE)
        html lang="en" {
            head {
                meta charset="UTF-8";
                meta name="viewport" content="width=device-width, initial-scale=1.0";
                title { (title) }
                style { (PreEscaped(CSS)) }
            }
            body {
                (content)
            }
        }
    }
}

fn fallback_handler(placeholder: &str) -> String {
    format!("this.onerror=null;this.src='{placeholder}'")
}

fn render_card(listing: &CarListing) -> Markup {
    html! {
        article.car-card data-id=(listing.id) {
            div.image-gallery-container {
                @if listing.images_data.is_empty() {
                    img.gallery-image src=(CARD_NO_IMAGES) alt="No images available";
                } @else {
                    @for (index, image) in listing.images_data.iter().enumerate() {
                        img.gallery-image
                            src=(image.as_str())
                            alt={ (listing.make) " " (listing.model) " Image " (index + 1) }
                            data-index=(index)
                            loading="lazy"
                            onerror=(fallback_handler(CARD_IMAGE_ERROR));
                    }
                }
            }
            h3 { (listing.summary()) }
            p { (listing.description) }
            p.price { (listing.formatted_price()) }
        }
    }
}

/// Render the storefront page for `listings`, optionally filtered by
/// `search`. Listings are shown in the order given.
pub fn render_storefront(title: &str, listings: &[CarListing], search: Option<&str>) -> Markup {
    let term = search.unwrap_or_default();
    let shown = filter_listings(listings, term);

    let content = html! {
        header.header {
            h1 { (title) }
        }
        main.container {
            h2 { "Available Used Cars" }
            form.search-bar method="get" {
                input type="text" name="q"
                    placeholder="Search by make, model, year, or description..."
                    value=(term);
            }
            @if shown.is_empty() {
                p.empty { "No cars found matching your search criteria." }
            } @else {
                div.car-list {
                    @for listing in &shown {
                        (render_card(listing))
                    }
                }
            }
        }
    };

    base_document(title, content)
}
