//! CLI output formatting.
//!
//! # Information-First Display
//!
//! Every entity leads with a positional index and its human identity (file
//! name for intake images, "year make model" for listings). Details follow
//! on indented context lines.
//!
//! ## Compress
//!
//! ```text
//! 001 front.jpg → 800×600 (41.3 KB)
//! 002 notes.txt failed
//!     Error: Failed to decode notes.txt: Unrecognized image format
//!
//! Staged 1 image, 1 failed
//! ```
//!
//! ## List
//!
//! ```text
//! 001 2019 Toyota Corolla (3 images)
//!     ID: 4f1c0a9e2b7d35c8a6e1
//!     Price: Rs.4,500,000
//!     Description: One owner, full service history
//! ```
//!
//! # Architecture
//!
//! Each output has a `format_*` function (returns `Vec<String>`) for
//! testability and a `print_*` wrapper that writes to stdout. Format
//! functions are pure: no I/O, no side effects.

use crate::intake::{IntakeEvent, IntakeReport};
use crate::listing::CarListing;

/// Format a 1-based positional index as 3-digit zero-padded.
fn format_index(pos: usize) -> String {
    format!("{:0>3}", pos)
}

/// Human-readable byte count.
fn format_bytes(bytes: usize) -> String {
    const KB: f64 = 1024.0;
    let b = bytes as f64;
    if b < KB {
        format!("{bytes} B")
    } else if b < KB * KB {
        format!("{:.1} KB", b / KB)
    } else {
        format!("{:.1} MB", b / (KB * KB))
    }
}

fn plural(n: usize, word: &str) -> String {
    if n == 1 {
        format!("{n} {word}")
    } else {
        format!("{n} {word}s")
    }
}

// ============================================================================
// Compress
// ============================================================================

/// Format one intake progress event.
pub fn format_intake_event(event: &IntakeEvent) -> Vec<String> {
    match event {
        IntakeEvent::Compressed {
            index,
            name,
            width,
            height,
            bytes,
        } => vec![format!(
            "{} {} → {}×{} ({})",
            format_index(index + 1),
            name,
            width,
            height,
            format_bytes(*bytes)
        )],
        IntakeEvent::Failed { index, name, error } => vec![
            format!("{} {} failed", format_index(index + 1), name),
            format!("    Error: {error}"),
        ],
    }
}

pub fn print_intake_event(event: &IntakeEvent) {
    for line in format_intake_event(event) {
        println!("{}", line);
    }
}

/// Summary line after a batch.
pub fn format_intake_summary(report: &IntakeReport) -> Vec<String> {
    let staged = plural(report.staged.len(), "image");
    if report.failures.is_empty() {
        vec![format!("Staged {staged}")]
    } else {
        vec![format!("Staged {staged}, {} failed", report.failures.len())]
    }
}

pub fn print_intake_summary(report: &IntakeReport) {
    println!();
    for line in format_intake_summary(report) {
        println!("{}", line);
    }
}

// ============================================================================
// List
// ============================================================================

/// Format listings in the order given.
pub fn format_listings(listings: &[CarListing]) -> Vec<String> {
    if listings.is_empty() {
        return vec!["No cars found matching your search criteria.".to_string()];
    }
    let mut lines = Vec::new();
    for (i, listing) in listings.iter().enumerate() {
        lines.push(format!(
            "{} {} ({})",
            format_index(i + 1),
            listing.summary(),
            plural(listing.image_count(), "image")
        ));
        lines.push(format!("    ID: {}", listing.id));
        lines.push(format!("    Price: {}", listing.formatted_price()));
        if !listing.description.is_empty() {
            lines.push(format!("    Description: {}", listing.short_description()));
        }
    }
    lines
}

pub fn print_listings(listings: &[CarListing]) {
    for line in format_listings(listings) {
        println!("{}", line);
    }
}
