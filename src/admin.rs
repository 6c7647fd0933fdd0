//! Admin panel: the listing authoring form and inventory management.
//!
//! The panel owns the form state (text draft, staged images, the id of the
//! listing being edited, and the current notice) and talks to its two
//! collaborators, the [`IdentityProvider`] and the [`DocumentStore`].
//!
//! ## Flow
//!
//! ```text
//! login ──▶ add_images / remove_image / draft_mut ──▶ submit
//!              ▲                                        │
//!              └── edit(id) ◀── listings()              ├─ ok: notice, form cleared
//!                                                       └─ err: notice, form kept
//! ```
//!
//! Validation always runs before any store call. A failed store call leaves
//! the form untouched so nothing the user typed is lost. Deletes go through
//! a confirmation notice.

use crate::auth::{IdentityProvider, Session};
use crate::export::{ExportError, listings_to_csv};
use crate::imaging::{CompressParams, ImageBackend};
use crate::intake::{FileSource, Intake, IntakeError, IntakeReport};
use crate::listing::{CarListing, ListingDraft, ValidationError};
use crate::storefront::ListingFeed;
use crate::store::{DocumentStore, StoreError, Subscription};
use crate::types::ImageAsset;
use std::sync::{Arc, Mutex};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AdminError {
    #[error("Please log in to manage listings.")]
    NotSignedIn,
    #[error("{}", .0.user_message())]
    Auth(#[from] crate::auth::AuthError),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Intake(#[from] IntakeError),
    #[error("Error: {0}")]
    Store(#[from] StoreError),
    #[error(transparent)]
    Export(#[from] ExportError),
    #[error("No listing with id {0}")]
    UnknownListing(String),
    #[error("Invalid listing {id}: {source}")]
    Record {
        id: String,
        #[source]
        source: serde_json::Error,
    },
}

/// An action waiting on the user's yes/no.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PendingAction {
    Delete { id: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NoticeKind {
    Info,
    Error,
    Confirm(PendingAction),
}

/// A dismissable message box.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub text: String,
    pub kind: NoticeKind,
}

impl Notice {
    fn info(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            kind: NoticeKind::Info,
        }
    }

    fn error(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            kind: NoticeKind::Error,
        }
    }

    pub fn is_confirm(&self) -> bool {
        matches!(self.kind, NoticeKind::Confirm(_))
    }
}

/// What the panel mirrors from the identity provider: the session, and the
/// inventory feed that exists only while someone is signed in.
#[derive(Debug, Default)]
struct SessionState {
    session: Option<Session>,
    feed: Option<ListingFeed>,
}

pub struct AdminPanel {
    identity: Arc<dyn IdentityProvider>,
    store: Arc<dyn DocumentStore>,
    collection: String,
    params: CompressParams,
    state: Arc<Mutex<SessionState>>,
    _session_watch: Subscription,
    draft: ListingDraft,
    intake: Intake,
    editing: Option<String>,
    notice: Option<Notice>,
    login_error: Option<String>,
}

impl AdminPanel {
    /// Build a panel and start following `identity`. Whoever signs in,
    /// through this panel or any other holder of the provider, gets the
    /// inventory feed attached; signing out drops it.
    pub fn new(
        identity: Arc<dyn IdentityProvider>,
        store: Arc<dyn DocumentStore>,
        collection: impl Into<String>,
        params: CompressParams,
    ) -> Self {
        let collection = collection.into();
        let state: Arc<Mutex<SessionState>> = Arc::default();
        let session_watch = {
            let state = Arc::clone(&state);
            let store = Arc::clone(&store);
            let collection = collection.clone();
            identity.on_session_change(Box::new(move |current: Option<Session>| {
                let Ok(mut s) = state.lock() else {
                    return;
                };
                match (&current, s.feed.is_some()) {
                    (Some(_), false) => {
                        s.feed = Some(ListingFeed::subscribe(&*store, &collection));
                    }
                    (None, true) => s.feed = None,
                    _ => {}
                }
                s.session = current;
            }))
        };

        Self {
            identity,
            store,
            collection,
            params,
            state,
            _session_watch: session_watch,
            draft: ListingDraft::default(),
            intake: Intake::new(),
            editing: None,
            notice: None,
            login_error: None,
        }
    }

    // ------------------------------------------------------------------
    // Session
    // ------------------------------------------------------------------

    pub fn session(&self) -> Option<Session> {
        self.state.lock().ok().and_then(|s| s.session.clone())
    }

    pub fn is_signed_in(&self) -> bool {
        self.session().is_some()
    }

    fn require_session(&self) -> Result<Session, AdminError> {
        self.session().ok_or(AdminError::NotSignedIn)
    }

    pub fn login(&mut self, email: &str, password: &str) -> Result<Session, AdminError> {
        self.login_error = None;
        self.identity.sign_in(email, password).map_err(|e| {
            tracing::warn!(code = %e.code, "admin login failed");
            self.login_error = Some(e.user_message());
            e.into()
        })
    }

    pub fn logout(&mut self) {
        self.identity.sign_out();
    }

    /// Message for the login form after a failed attempt.
    pub fn login_error(&self) -> Option<&str> {
        self.login_error.as_deref()
    }

    // ------------------------------------------------------------------
    // Inventory
    // ------------------------------------------------------------------

    /// Current listings, newest year first. Empty while signed out.
    pub fn listings(&self) -> Vec<CarListing> {
        self.state
            .lock()
            .ok()
            .and_then(|s| s.feed.as_ref().map(ListingFeed::listings))
            .unwrap_or_default()
    }

    fn find_listing(&self, id: &str) -> Result<CarListing, AdminError> {
        let doc = self
            .store
            .list(&self.collection)?
            .into_iter()
            .find(|d| d.id == id)
            .ok_or_else(|| AdminError::UnknownListing(id.to_string()))?;
        CarListing::from_record(doc.id, doc.data).map_err(|source| AdminError::Record {
            id: id.to_string(),
            source,
        })
    }

    // ------------------------------------------------------------------
    // Form
    // ------------------------------------------------------------------

    pub fn draft(&self) -> &ListingDraft {
        &self.draft
    }

    pub fn draft_mut(&mut self) -> &mut ListingDraft {
        &mut self.draft
    }

    pub fn intake(&self) -> &Intake {
        &self.intake
    }

    /// For hosts that run compression batches on a background thread via
    /// [`Intake::begin_batch`] and [`Intake::complete_batch`].
    pub fn intake_mut(&mut self) -> &mut Intake {
        &mut self.intake
    }

    pub fn staged_images(&self) -> &[ImageAsset] {
        self.intake.images()
    }

    /// Id of the listing being edited, if any.
    pub fn editing(&self) -> Option<&str> {
        self.editing.as_deref()
    }

    /// Status line under the file picker.
    pub fn upload_status(&self) -> String {
        match self.intake.len() {
            _ if self.intake.is_busy() => "Compressing images...".to_string(),
            0 if self.editing.is_none() => "Please upload at least one image.".to_string(),
            0 => "No images staged.".to_string(),
            1 => "1 image ready for upload.".to_string(),
            n => format!("{n} images ready for upload."),
        }
    }

    /// Compress and stage files. Per-file failures do not stop the batch;
    /// the first one is surfaced as a notice.
    pub fn add_images<B, F>(&mut self, backend: &B, files: &[F]) -> Result<IntakeReport, AdminError>
    where
        B: ImageBackend,
        F: FileSource,
    {
        self.require_session()?;
        let report = self
            .intake
            .process_files(backend, files, &self.params, None)?;
        if let Some(failure) = report.failures.first() {
            self.notice = Some(Notice::error(failure.error.user_message()));
        }
        Ok(report)
    }

    pub fn remove_image(&mut self, index: usize) -> Option<ImageAsset> {
        self.intake.remove_image(index)
    }

    /// Load a listing into the form for editing.
    pub fn edit(&mut self, id: &str) -> Result<(), AdminError> {
        self.require_session()?;
        let listing = self.find_listing(id)?;
        self.draft = ListingDraft::from_listing(&listing);
        self.intake.load_existing(listing.images_data);
        self.editing = Some(listing.id);
        Ok(())
    }

    /// Leave edit mode and clear the form.
    pub fn cancel_edit(&mut self) {
        self.clear_form();
    }

    fn clear_form(&mut self) {
        self.draft.clear();
        self.intake.clear();
        self.editing = None;
    }

    /// Validate and save the form. Returns the listing id.
    pub fn submit(&mut self) -> Result<String, AdminError> {
        self.require_session()?;
        if self.intake.is_busy() {
            return Err(IntakeError::Busy.into());
        }

        let listing = match self.draft.validate(self.intake.images()) {
            Ok(listing) => listing,
            Err(e) => {
                self.notice = Some(Notice::error(e.to_string()));
                return Err(e.into());
            }
        };
        let record = listing
            .to_record()
            .map_err(|e| self.store_failure(StoreError::Serialize(e)))?;

        let result = match &self.editing {
            Some(id) => self
                .store
                .update(&self.collection, id, record)
                .map(|()| (id.clone(), "Car updated successfully!")),
            None => self
                .store
                .create(&self.collection, record)
                .map(|id| (id, "Car added successfully!")),
        };
        let (id, message) = result.map_err(|e| self.store_failure(e))?;

        self.notice = Some(Notice::info(message));
        self.clear_form();
        Ok(id)
    }

    /// Record a store failure as a notice, leaving the form as it was.
    fn store_failure(&mut self, e: StoreError) -> AdminError {
        tracing::warn!(error = %e, "listing mutation failed");
        let err = AdminError::Store(e);
        self.notice = Some(Notice::error(err.to_string()));
        err
    }

    /// Ask for confirmation before deleting a listing.
    pub fn request_delete(&mut self, id: &str) {
        self.notice = Some(Notice {
            text: "Are you sure you want to delete this car?".to_string(),
            kind: NoticeKind::Confirm(PendingAction::Delete { id: id.to_string() }),
        });
    }

    /// Answer "yes" to the pending confirmation. Without one this only
    /// dismisses the current notice.
    pub fn confirm(&mut self) -> Result<(), AdminError> {
        let Some(Notice {
            kind: NoticeKind::Confirm(action),
            ..
        }) = self.notice.take()
        else {
            return Ok(());
        };
        self.require_session()?;

        match action {
            PendingAction::Delete { id } => {
                self.store
                    .delete(&self.collection, &id)
                    .map_err(|e| self.store_failure(e))?;
                if self.editing.as_deref() == Some(id.as_str()) {
                    self.clear_form();
                }
                self.notice = Some(Notice::info("Car deleted successfully!"));
            }
        }
        Ok(())
    }

    pub fn notice(&self) -> Option<&Notice> {
        self.notice.as_ref()
    }

    /// Close the message box. A pending confirmation is answered "no".
    pub fn dismiss_notice(&mut self) {
        self.notice = None;
    }

    /// CSV of all listings. Refuses (with a notice) when there are none.
    pub fn export_csv(&mut self) -> Result<String, AdminError> {
        self.require_session()?;
        match listings_to_csv(&self.listings()) {
            Ok(csv) => {
                self.notice = Some(Notice::info("Car data downloaded successfully as CSV!"));
                Ok(csv)
            }
            Err(e) => {
                self.notice = Some(Notice::info(e.to_string()));
                Err(e.into())
            }
        }
    }
}
