//! # carlot
//!
//! The engine of a small used-car storefront: listing and administering
//! used-car inventory, with photos uploaded by an administrator and browsed
//! by visitors in a zoomable gallery.
//!
//! # Architecture
//!
//! Two pieces are engineered locally; everything else is plumbing around
//! them and two injected collaborators.
//!
//! ```text
//!  files ──▶ intake (decode → fit 800×600 → JPEG q70 → data URL)
//!                │
//!                ▼
//!          admin panel ──validate──▶ DocumentStore ──snapshot──▶ storefront feed
//!                ▲                                                    │
//!         IdentityProvider                                            ▼
//!                                                      gallery viewer (zoom, pan)
//! ```
//!
//! The intake pipeline and the viewer never call each other. The pipeline's
//! output is stored in a listing's `imagesData` field, and the viewer is
//! later built from that field.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`imaging`] | Pure-Rust decode, bounded resize and JPEG encode behind a backend trait |
//! | [`intake`] | Staged image sequence: parallel batch compression, busy guard, liveness tickets |
//! | [`viewer`] | Gallery viewer state machine: navigation, cursor-anchored zoom, drag/touch pan, scroll lock |
//! | [`listing`] | `CarListing` record, form-draft validation, search, ordering, price formatting |
//! | [`store`] | `DocumentStore` trait and the in-process, JSON-file-backed `MemoryStore` |
//! | [`auth`] | `IdentityProvider` trait and the config-backed `LocalIdentity` |
//! | [`admin`] | Authoring form: session gating, submit/edit/delete, notices, CSV export |
//! | [`storefront`] | Live listing feed and the static storefront page (Maud) |
//! | [`export`] | CSV serialization of listings |
//! | [`config`] | `carlot.toml` loading, merging, validation |
//! | [`types`] | [`ImageAsset`](types::ImageAsset), the data-URL image payload |
//! | [`output`] | CLI output formatting |
//!
//! # Design Decisions
//!
//! ## Images as Data URLs
//!
//! Listings carry their images inline as `data:image/jpeg;base64,...`
//! strings. The document store only holds JSON, and inline payloads keep a
//! listing self-contained: deleting it deletes its images. The intake
//! pipeline keeps payloads small by bounding dimensions and re-encoding
//! everything as JPEG.
//!
//! ## Collaborators Behind Traits
//!
//! Persistence and identity are injected as `Arc<dyn DocumentStore>` and
//! `Arc<dyn IdentityProvider>`. Nothing in the crate reaches for a global
//! session or database handle, so tests swap in failing or recording fakes.
//!
//! ## Explicit State Machines
//!
//! The viewer's drag handling is an `Idle`/`Dragging` enum driven by named
//! events, and the intake's busy flag is an `Idle`/`Compressing` phase with
//! generation-stamped tickets. Stale batch results are dropped instead of
//! leaking into a form that has since been cleared.

pub mod admin;
pub mod auth;
pub mod config;
pub mod export;
pub mod imaging;
pub mod intake;
pub mod listing;
pub mod output;
pub mod store;
pub mod storefront;
pub mod types;
pub mod viewer;
