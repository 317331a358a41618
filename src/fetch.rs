//! Remote attachment retrieval.
//!
//! Attachment bytes live behind Google content URLs; the writer inlines them
//! as base64 MMS parts. Downloads are retried a fixed number of times and
//! then given up on — a failed attachment is reported and omitted, never an
//! error that stops the run.

use std::io::{Read, Write};

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use reqwest::blocking::Client;
use tempfile::NamedTempFile;
use tracing::{debug, warn};

use crate::error::Result;

/// Download attempts before an attachment is given up on.
const MAX_ATTEMPTS: u32 = 5;

/// Source of attachment bytes, base64-encoded for embedding.
///
/// The writer only needs "bytes or nothing": implementations report their own
/// failures and surface them as `None`, which callers treat as "skip this
/// attachment".
pub trait MediaSource {
    fn fetch_base64(&self, url: &str) -> Option<String>;
}

/// HTTP fetcher with a bounded retry budget.
///
/// Each attempt buffers the download through a uniquely named temporary file
/// before encoding; the file is removed as soon as it has been read back.
pub struct HttpMediaFetcher {
    client: Client,
}

impl HttpMediaFetcher {
    /// Creates a fetcher with the default blocking client.
    ///
    /// No request timeout is configured beyond the network stack's own.
    pub fn new() -> Result<Self> {
        let client = Client::builder().build()?;
        Ok(Self { client })
    }

    fn try_fetch(&self, url: &str) -> Result<String> {
        let response = self.client.get(url).send()?.error_for_status()?;
        let bytes = response.bytes()?;

        let mut buffer = NamedTempFile::new()?;
        buffer.write_all(&bytes)?;
        buffer.flush()?;

        let mut data = Vec::with_capacity(bytes.len());
        buffer.reopen()?.read_to_end(&mut data)?;
        debug!(url, size = data.len(), "attachment downloaded");
        Ok(STANDARD.encode(data))
    }
}

impl MediaSource for HttpMediaFetcher {
    fn fetch_base64(&self, url: &str) -> Option<String> {
        for attempt in 1..=MAX_ATTEMPTS {
            match self.try_fetch(url) {
                Ok(encoded) => return Some(encoded),
                Err(err) => {
                    warn!(url, attempt, error = %err, "attachment request failed; trying again");
                }
            }
        }
        warn!(url, "giving up on attachment after {MAX_ATTEMPTS} attempts");
        None
    }
}
