//! Backup document writers.
//!
//! One output format: the Titanium Backup `threads` XML schema. The writer
//! comes in three shapes, mirroring how the parsers pair file and string
//! entry points:
//!
//! - [`write_backup_file`] — write straight to a path (the file is rebuilt
//!   from scratch on every run)
//! - [`write_backup`] — stream to any `io::Write`
//! - [`to_xml`] — return the document as a `String`, useful in tests

mod xml_writer;

pub use xml_writer::{to_xml, write_backup, write_backup_file, BackupStats};
