//! End-to-end intake tests with the pure Rust backend.
//!
//! Source images are synthesized with the `image` crate so the tests need no
//! fixtures on disk.

use carlot::imaging::{CompressParams, RustBackend};
use carlot::intake::{Intake, IntakeEvent, MemorySource, collect_files};
use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};
use std::io::Cursor;

fn png(width: u32, height: u32) -> Vec<u8> {
    let img = RgbaImage::from_pixel(width, height, Rgba([200, 40, 40, 128]));
    let mut bytes = Vec::new();
    DynamicImage::ImageRgba8(img)
        .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
        .unwrap();
    bytes
}

fn decoded_size(asset: &carlot::types::ImageAsset) -> (u32, u32) {
    let bytes = asset.decode().unwrap();
    let img = image::load_from_memory(&bytes).unwrap();
    (img.width(), img.height())
}

#[test]
fn large_image_is_fit_inside_bounds_as_jpeg() {
    let mut intake = Intake::new();
    let files = [MemorySource::new("wide.png", png(1600, 900))];

    let report = intake
        .process_files(&RustBackend::new(), &files, &CompressParams::default(), None)
        .unwrap();

    assert!(report.is_clean());
    let asset = &intake.images()[0];
    assert!(asset.as_str().starts_with("data:image/jpeg;base64,"));
    assert_eq!(decoded_size(asset), (800, 450));
}

#[test]
fn small_image_keeps_its_size() {
    let mut intake = Intake::new();
    let files = [MemorySource::new("small.png", png(320, 240))];

    intake
        .process_files(&RustBackend::new(), &files, &CompressParams::default(), None)
        .unwrap();

    assert_eq!(decoded_size(&intake.images()[0]), (320, 240));
}

#[test]
fn bad_file_fails_alone_and_order_is_kept() {
    let mut intake = Intake::new();
    let files = [
        MemorySource::new("a.png", png(100, 50)),
        MemorySource::new("notes.txt", b"not an image".to_vec()),
        MemorySource::new("c.png", png(50, 100)),
    ];
    let (tx, rx) = std::sync::mpsc::channel();

    let report = intake
        .process_files(&RustBackend::new(), &files, &CompressParams::default(), Some(&tx))
        .unwrap();
    drop(tx);

    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].name, "notes.txt");
    assert_eq!(intake.len(), 2);
    assert_eq!(decoded_size(&intake.images()[0]), (100, 50));
    assert_eq!(decoded_size(&intake.images()[1]), (50, 100));

    let events: Vec<IntakeEvent> = rx.into_iter().collect();
    assert_eq!(events.len(), 3);
    assert!(
        events
            .iter()
            .any(|e| matches!(e, IntakeEvent::Failed { name, .. } if name == "notes.txt"))
    );
}

#[test]
fn batches_append_to_staged_images() {
    let mut intake = Intake::new();
    let backend = RustBackend::new();
    let params = CompressParams::default();

    intake
        .process_files(&backend, &[MemorySource::new("1.png", png(10, 10))], &params, None)
        .unwrap();
    intake
        .process_files(&backend, &[MemorySource::new("2.png", png(20, 10))], &params, None)
        .unwrap();

    assert_eq!(intake.len(), 2);
    assert_eq!(decoded_size(&intake.images()[1]), (20, 10));
    assert!(!intake.is_busy());
}

#[test]
fn collect_files_walks_directories_for_images() {
    let tmp = tempfile::TempDir::new().unwrap();
    let nested = tmp.path().join("rear");
    std::fs::create_dir(&nested).unwrap();
    std::fs::write(tmp.path().join("b.png"), png(4, 4)).unwrap();
    std::fs::write(nested.join("a.png"), png(4, 4)).unwrap();
    std::fs::write(tmp.path().join("notes.txt"), "skip").unwrap();

    let files = collect_files(&[tmp.path().to_path_buf()]).unwrap();

    let names: Vec<String> = files
        .iter()
        .map(|f| f.0.file_name().unwrap().to_string_lossy().into_owned())
        .collect();
    assert_eq!(names, vec!["b.png", "a.png"]);
}
