//! Administrator workflow against a file-backed store: sign in, author,
//! edit, delete, and the storefront and CSV views of the result.

use carlot::admin::{AdminError, AdminPanel};
use carlot::auth::{LocalIdentity, hash_password};
use carlot::config::AdminAccount;
use carlot::imaging::{CompressParams, RustBackend};
use carlot::intake::MemorySource;
use carlot::store::{DocumentStore, MemoryStore, collection_path};
use carlot::storefront::{ListingFeed, listings_from_documents, render_storefront};
use image::{DynamicImage, ImageFormat, RgbImage};
use std::io::Cursor;
use std::path::Path;
use std::sync::Arc;

const EMAIL: &str = "owner@lot.example";
const PASSWORD: &str = "hunter22";

fn jpeg(width: u32, height: u32) -> Vec<u8> {
    let mut bytes = Vec::new();
    DynamicImage::ImageRgb8(RgbImage::new(width, height))
        .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Jpeg)
        .unwrap();
    bytes
}

fn panel(store: Arc<MemoryStore>) -> AdminPanel {
    let identity = Arc::new(LocalIdentity::new(vec![AdminAccount {
        email: EMAIL.into(),
        password_sha256: hash_password(EMAIL, PASSWORD),
    }]));
    AdminPanel::new(
        identity,
        store,
        collection_path("test-lot"),
        CompressParams::default(),
    )
}

fn fill(panel: &mut AdminPanel, make: &str, year: &str) {
    let draft = panel.draft_mut();
    draft.make = make.into();
    draft.model = "Corolla".into();
    draft.year = year.into();
    draft.price = "4500000".into();
    draft.description = "One owner, \"mint\"".into();
}

fn stored(path: &Path) -> Vec<carlot::listing::CarListing> {
    let reopened = MemoryStore::open(path).unwrap();
    listings_from_documents(reopened.list(&collection_path("test-lot")).unwrap())
}

#[test]
fn signed_out_panel_refuses_changes() {
    let mut panel = panel(Arc::new(MemoryStore::new()));
    fill(&mut panel, "Toyota", "2019");

    assert!(matches!(panel.submit(), Err(AdminError::NotSignedIn)));
    assert!(panel.listings().is_empty());
}

#[test]
fn wrong_password_is_reported_generically() {
    let mut panel = panel(Arc::new(MemoryStore::new()));

    assert!(panel.login(EMAIL, "nope").is_err());
    assert!(!panel.is_signed_in());
    assert_eq!(
        panel.login_error(),
        Some("Invalid email or password. Please try again.")
    );
}

#[test]
fn add_edit_delete_round_trip_through_the_file_store() {
    let tmp = tempfile::TempDir::new().unwrap();
    let path = tmp.path().join("store.json");
    let store = Arc::new(MemoryStore::open(&path).unwrap());
    let mut panel = panel(Arc::clone(&store));
    panel.login(EMAIL, PASSWORD).unwrap();

    // Add
    fill(&mut panel, "Toyota", "2019");
    panel
        .add_images(
            &RustBackend::new(),
            &[
                MemorySource::new("front.jpg", jpeg(1200, 1200)),
                MemorySource::new("rear.jpg", jpeg(640, 480)),
            ],
        )
        .unwrap();
    let id = panel.submit().unwrap();
    assert_eq!(panel.notice().unwrap().text, "Car added successfully!");
    assert!(panel.staged_images().is_empty());

    let saved = stored(&path);
    assert_eq!(saved.len(), 1);
    assert_eq!(saved[0].id, id);
    assert_eq!(saved[0].year, 2019);
    assert_eq!(saved[0].image_count(), 2);

    // Edit keeps images unless replaced
    panel.edit(&id).unwrap();
    assert_eq!(panel.staged_images().len(), 2);
    panel.draft_mut().price = "4200000".into();
    panel.remove_image(1);
    panel.submit().unwrap();
    assert_eq!(panel.notice().unwrap().text, "Car updated successfully!");

    let saved = stored(&path);
    assert_eq!(saved[0].price, 4_200_000.0);
    assert_eq!(saved[0].image_count(), 1);

    // Storefront and CSV see the same data
    let html = render_storefront("Lot", &saved, None).into_string();
    assert!(html.contains("2019 Toyota Corolla"));
    assert!(html.contains("Rs.4,200,000"));
    let csv = panel.export_csv().unwrap();
    assert!(csv.contains(r#""One owner, ""mint""""#));

    // Delete after confirmation
    panel.request_delete(&id);
    panel.confirm().unwrap();
    assert_eq!(panel.notice().unwrap().text, "Car deleted successfully!");
    assert!(stored(&path).is_empty());
}

#[test]
fn submit_without_images_keeps_form() {
    let mut panel = panel(Arc::new(MemoryStore::new()));
    panel.login(EMAIL, PASSWORD).unwrap();
    fill(&mut panel, "Honda", "2015");

    assert!(matches!(panel.submit(), Err(AdminError::Validation(_))));
    assert_eq!(
        panel.notice().unwrap().text,
        "Please upload at least one image for the car."
    );
    assert_eq!(panel.draft().make, "Honda");
}

#[test]
fn storefront_feed_follows_admin_changes() {
    let store = Arc::new(MemoryStore::new());
    let feed = ListingFeed::subscribe(store.as_ref(), &collection_path("test-lot"));
    let mut panel = panel(Arc::clone(&store));
    panel.login(EMAIL, PASSWORD).unwrap();

    for (make, year) in [("Old", "2005"), ("New", "2021")] {
        fill(&mut panel, make, year);
        panel
            .add_images(&RustBackend::new(), &[MemorySource::new("x.jpg", jpeg(8, 8))])
            .unwrap();
        panel.submit().unwrap();
    }

    let makes: Vec<String> = feed.listings().into_iter().map(|c| c.make).collect();
    assert_eq!(makes, vec!["New", "Old"]);
    assert_eq!(feed.search("2005").len(), 1);
}
