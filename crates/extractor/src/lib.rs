//! Turns an uploaded document into ordered text segments.
//!
//! The extraction itself runs on a remote service; this crate only defines
//! the seam the chat uses ([`Extractor`]) and an HTTP client for it.

#![deny(missing_docs)]

#[macro_use]
extern crate tracing;

mod http;

use std::error::Error;
use std::fmt::{self, Display};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub use http::HttpExtractor;

/// One piece of text pulled out of a document, in document order.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TextSegment {
    /// The extracted text.
    pub text: String,
}

impl TextSegment {
    /// Creates a segment.
    #[inline]
    pub fn new<S: Into<String>>(text: S) -> Self {
        Self { text: text.into() }
    }
}

/// A document text extraction service.
#[async_trait]
pub trait Extractor: Send + Sync + 'static {
    /// Extracts the ordered segments of one document.
    async fn extract(
        &self,
        file_name: &str,
        document: Vec<u8>,
    ) -> Result<Vec<TextSegment>, ExtractionError>;
}

/// The extraction service failed or returned something unusable.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ExtractionError {
    message: String,
}

impl ExtractionError {
    /// Creates an error with the given message.
    #[inline]
    pub fn new<S: Into<String>>(message: S) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// Returns the error message.
    #[inline]
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl Display for ExtractionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "extraction failed: {}", self.message)
    }
}

impl Error for ExtractionError {}
