//! # hangsms
//!
//! A Rust library for converting Google Hangouts Takeout exports into the
//! Titanium Backup SMS/MMS XML format, so old Hangouts text conversations can
//! be restored onto a phone.
//!
//! ## Overview
//!
//! Conversion runs in two stages:
//!
//! 1. **Normalization** ([`normalize`]) — the deeply nested, loosely typed
//!    Takeout JSON is deserialized once into an explicit schema and walked
//!    into a canonical [`Conversation`] / [`Participant`] / [`Message`] /
//!    [`Attachment`] model. Missing fields at any nesting level are tolerated;
//!    a single malformed conversation never aborts the run.
//! 2. **Serialization** ([`output`]) — the canonical model is written as one
//!    XML document: one `<thread>` per phone-network conversation, one `<sms>`
//!    or `<mms>` element per message, with plain/base64 body encoding and
//!    remote attachments inlined through a [`fetch::MediaSource`].
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::path::Path;
//!
//! use hangsms::fetch::HttpMediaFetcher;
//! use hangsms::normalize;
//! use hangsms::output::write_backup_file;
//!
//! fn main() -> hangsms::Result<()> {
//!     let export = normalize::parse_file(Path::new("Hangouts.json"), "+15551234567")?;
//!
//!     let fetcher = HttpMediaFetcher::new()?;
//!     let stats = write_backup_file(
//!         Path::new("messages.xml"),
//!         &export.conversations,
//!         export.self_gaia_id.as_ref(),
//!         &fetcher,
//!     )?;
//!
//!     println!("wrote {} threads", stats.threads);
//!     Ok(())
//! }
//! ```
//!
//! ## Module Structure
//!
//! - [`model`] — canonical records and the [`GaiaId`] join key
//! - [`normalize`] — Takeout JSON → canonical model
//! - [`output`] — canonical model → backup XML
//! - [`fetch`] — remote attachment retrieval with bounded retries
//! - [`cli`] — CLI argument types
//! - [`error`] — unified error types ([`BackupError`], [`Result`])

pub mod cli;
pub mod error;
pub mod fetch;
pub mod model;
pub mod normalize;
pub mod output;
mod takeout;

// Re-export the main types at the crate root for convenience
pub use error::{BackupError, Result};
pub use model::{Attachment, Conversation, GaiaId, MediaKind, Message, Participant};

/// Convenient re-exports for common usage.
pub mod prelude {
    pub use crate::error::{BackupError, Result};
    pub use crate::fetch::{HttpMediaFetcher, MediaSource};
    pub use crate::model::{
        Attachment, Conversation, GaiaId, MediaKind, Message, Participant, SegmentKind,
    };
    pub use crate::normalize::{parse_file, parse_str, Export};
    pub use crate::output::{to_xml, write_backup, write_backup_file, BackupStats};
}
