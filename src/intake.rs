//! Image intake: the staged image sequence of a listing being authored.
//!
//! Selected files go through [`compress_image`](crate::imaging::compress_image)
//! (decode → fit inside 800×600 → JPEG at quality 70) and land in the staged
//! sequence as [`ImageAsset`]s. A bad file produces an [`IntakeFailure`] and
//! never stops its siblings.
//!
//! ## Ordering
//!
//! A batch is compressed in parallel with [rayon](https://docs.rs/rayon).
//! Every result carries the index of the file it came from and results are
//! sorted back into input order before staging, so the staged order is the
//! selection order no matter which file finishes first.
//!
//! ## Busy guard and liveness
//!
//! ```text
//! Idle ──begin_batch──▶ Compressing ──complete_batch──▶ Idle
//! ```
//!
//! [`Intake::begin_batch`] refuses to start while a batch is in flight and
//! hands out a [`BatchTicket`] stamped with the current generation. Clearing
//! or discarding the form bumps the generation, so a batch that finishes
//! after its form was reset is dropped instead of leaking into the new one.

use crate::imaging::{BackendError, CompressParams, CompressedImage, ImageBackend, compress_image};
use crate::types::ImageAsset;
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use std::sync::mpsc::Sender;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum IntakeError {
    #[error("Failed to read {name}: {source}")]
    Read {
        name: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to decode {name}: {reason}")]
    Decode { name: String, reason: String },
    #[error("Failed to encode {name}: {reason}")]
    Encode { name: String, reason: String },
    #[error("Image compression already in progress")]
    Busy,
}

impl IntakeError {
    fn from_backend(name: &str, err: BackendError) -> Self {
        match err {
            BackendError::Decode(reason) => Self::Decode {
                name: name.to_string(),
                reason,
            },
            BackendError::Encode(reason) => Self::Encode {
                name: name.to_string(),
                reason,
            },
        }
    }

    /// Short message for the authoring form.
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::Read { .. } => "Failed to read file. Please try again.",
            Self::Decode { .. } | Self::Encode { .. } => {
                "Failed to load image. Please try another file."
            }
            Self::Busy => "Please wait until the current images finish compressing.",
        }
    }
}

/// A file handle the host hands to the pipeline.
pub trait FileSource: Sync {
    /// Display name, used in failure reports.
    fn name(&self) -> String;

    /// Read the raw file contents.
    fn read(&self) -> std::io::Result<Vec<u8>>;
}

/// A file on the local filesystem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathSource(pub PathBuf);

impl FileSource for PathSource {
    fn name(&self) -> String {
        self.0
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.0.display().to_string())
    }

    fn read(&self) -> std::io::Result<Vec<u8>> {
        std::fs::read(&self.0)
    }
}

/// An already-loaded file, e.g. a multipart upload body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemorySource {
    pub name: String,
    pub bytes: Vec<u8>,
}

impl MemorySource {
    pub fn new(name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            bytes: bytes.into(),
        }
    }
}

impl FileSource for MemorySource {
    fn name(&self) -> String {
        self.name.clone()
    }

    fn read(&self) -> std::io::Result<Vec<u8>> {
        Ok(self.bytes.clone())
    }
}

/// Progress events emitted while a batch runs, in completion order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IntakeEvent {
    Compressed {
        index: usize,
        name: String,
        width: u32,
        height: u32,
        bytes: usize,
    },
    Failed {
        index: usize,
        name: String,
        error: String,
    },
}

/// Result for one file of a batch, tagged with its input position.
#[derive(Debug)]
pub struct FileOutcome {
    pub index: usize,
    pub name: String,
    pub result: Result<CompressedImage, IntakeError>,
}

/// A file that could not be staged.
#[derive(Debug)]
pub struct IntakeFailure {
    pub index: usize,
    pub name: String,
    pub error: IntakeError,
}

/// What a completed batch did to the staged sequence.
#[derive(Debug, Default)]
pub struct IntakeReport {
    /// Files appended to the staged sequence, in input order.
    pub staged: Vec<StagedFile>,
    pub failures: Vec<IntakeFailure>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedFile {
    pub index: usize,
    pub name: String,
    pub width: u32,
    pub height: u32,
}

impl IntakeReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

fn compress_file(
    backend: &impl ImageBackend,
    file: &impl FileSource,
    params: &CompressParams,
) -> Result<CompressedImage, IntakeError> {
    let name = file.name();
    let bytes = file
        .read()
        .map_err(|source| IntakeError::Read {
            name: name.clone(),
            source,
        })?;
    compress_image(backend, &bytes, params).map_err(|e| IntakeError::from_backend(&name, e))
}

/// Compress a batch of files in parallel.
///
/// Returns one outcome per file, sorted by input index. When `progress` is
/// given, an [`IntakeEvent`] is sent as each file finishes.
pub fn compress_batch<B, F>(
    backend: &B,
    files: &[F],
    params: &CompressParams,
    progress: Option<&Sender<IntakeEvent>>,
) -> Vec<FileOutcome>
where
    B: ImageBackend,
    F: FileSource,
{
    let mut outcomes: Vec<FileOutcome> = files
        .par_iter()
        .enumerate()
        .map(|(index, file)| {
            let name = file.name();
            let result = compress_file(backend, file, params);

            if let Some(tx) = progress {
                let event = match &result {
                    Ok(image) => IntakeEvent::Compressed {
                        index,
                        name: name.clone(),
                        width: image.width,
                        height: image.height,
                        bytes: image.encoded_len,
                    },
                    Err(e) => IntakeEvent::Failed {
                        index,
                        name: name.clone(),
                        error: e.to_string(),
                    },
                };
                // Receiver gone just means nobody is watching
                let _ = tx.send(event);
            }

            FileOutcome {
                index,
                name,
                result,
            }
        })
        .collect();

    outcomes.sort_by_key(|o| o.index);
    outcomes
}

/// Whether the intake is idle or waiting on a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntakePhase {
    Idle,
    Compressing,
}

/// Proof that a batch was started against a particular generation of the
/// staged sequence.
#[derive(Debug, PartialEq, Eq)]
#[must_use = "a started batch must be completed or the intake stays busy"]
pub struct BatchTicket {
    generation: u64,
}

/// The in-progress set of staged images for one listing being authored.
#[derive(Debug)]
pub struct Intake {
    images: Vec<ImageAsset>,
    phase: IntakePhase,
    generation: u64,
}

impl Default for Intake {
    fn default() -> Self {
        Self::new()
    }
}

impl Intake {
    pub fn new() -> Self {
        Self {
            images: Vec::new(),
            phase: IntakePhase::Idle,
            generation: 0,
        }
    }

    pub fn phase(&self) -> IntakePhase {
        self.phase
    }

    /// True while a batch is compressing; file selection should be disabled.
    pub fn is_busy(&self) -> bool {
        self.phase == IntakePhase::Compressing
    }

    pub fn images(&self) -> &[ImageAsset] {
        &self.images
    }

    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }

    /// Enter `Compressing`. Rejected while another batch is in flight.
    pub fn begin_batch(&mut self) -> Result<BatchTicket, IntakeError> {
        if self.is_busy() {
            return Err(IntakeError::Busy);
        }
        self.phase = IntakePhase::Compressing;
        Ok(BatchTicket {
            generation: self.generation,
        })
    }

    /// Apply a finished batch and return to `Idle`.
    ///
    /// Returns `None` without touching the staged images when the ticket is
    /// stale, i.e. the form was cleared or discarded after the batch started.
    pub fn complete_batch(
        &mut self,
        ticket: BatchTicket,
        mut outcomes: Vec<FileOutcome>,
    ) -> Option<IntakeReport> {
        if ticket.generation != self.generation {
            tracing::debug!(
                ticket = ticket.generation,
                current = self.generation,
                "dropping result of a discarded intake batch"
            );
            return None;
        }
        self.phase = IntakePhase::Idle;

        outcomes.sort_by_key(|o| o.index);
        let mut report = IntakeReport::default();
        for FileOutcome {
            index,
            name,
            result,
        } in outcomes
        {
            match result {
                Ok(image) => {
                    report.staged.push(StagedFile {
                        index,
                        name,
                        width: image.width,
                        height: image.height,
                    });
                    self.images.push(image.asset);
                }
                Err(error) => {
                    tracing::warn!(file = %name, %error, "image intake failed");
                    report.failures.push(IntakeFailure { index, name, error });
                }
            }
        }
        Some(report)
    }

    /// Run a whole batch synchronously: begin, compress, complete.
    pub fn process_files<B, F>(
        &mut self,
        backend: &B,
        files: &[F],
        params: &CompressParams,
        progress: Option<&Sender<IntakeEvent>>,
    ) -> Result<IntakeReport, IntakeError>
    where
        B: ImageBackend,
        F: FileSource,
    {
        let ticket = self.begin_batch()?;
        let outcomes = compress_batch(backend, files, params, progress);
        // The ticket was issued by this call, it cannot be stale
        Ok(self.complete_batch(ticket, outcomes).unwrap_or_default())
    }

    /// Remove the staged image at `index`, shifting later images down.
    ///
    /// Out-of-range indices are a caller bug and leave the sequence as is.
    pub fn remove_image(&mut self, index: usize) -> Option<ImageAsset> {
        if index >= self.images.len() {
            tracing::debug!(index, len = self.images.len(), "remove_image out of range");
            return None;
        }
        Some(self.images.remove(index))
    }

    /// Stage a listing's existing images for editing, replacing whatever was
    /// staged before.
    pub fn load_existing(&mut self, images: Vec<ImageAsset>) {
        self.reset();
        self.images = images;
    }

    /// Hand the staged images to a submission and start over.
    pub fn take(&mut self) -> Vec<ImageAsset> {
        let images = std::mem::take(&mut self.images);
        self.reset();
        images
    }

    /// Abandon an in-flight batch but keep what is already staged.
    pub fn discard(&mut self) {
        if self.is_busy() {
            tracing::debug!(generation = self.generation, "discarding in-flight intake batch");
        }
        self.reset();
    }

    /// Discard staged images (cancel / discard). In-flight batches become stale.
    pub fn clear(&mut self) {
        self.images.clear();
        self.reset();
    }

    fn reset(&mut self) {
        self.generation += 1;
        self.phase = IntakePhase::Idle;
    }
}

/// Expand CLI arguments into image files.
///
/// Directories are walked recursively and filtered to extensions with a
/// compiled-in decoder, sorted by path. Files named directly are kept even
/// when their extension is unknown; they fail later at decode time.
pub fn collect_files(paths: &[PathBuf]) -> std::io::Result<Vec<PathSource>> {
    let supported = crate::imaging::supported_input_extensions();
    let mut files = Vec::new();

    for path in paths {
        if path.is_dir() {
            let mut found: Vec<PathBuf> = walkdir::WalkDir::new(path)
                .into_iter()
                .filter_map(|entry| entry.ok())
                .filter(|entry| entry.file_type().is_file())
                .map(|entry| entry.into_path())
                .filter(|p| has_extension(p, supported))
                .collect();
            found.sort();
            files.extend(found.into_iter().map(PathSource));
        } else if path.exists() {
            files.push(PathSource(path.clone()));
        } else {
            return Err(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("{} does not exist", path.display()),
            ));
        }
    }

    Ok(files)
}

fn has_extension(path: &Path, supported: &[&str]) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| supported.iter().any(|s| s.eq_ignore_ascii_case(e)))
}
