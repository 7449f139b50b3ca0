use std::borrow::Cow;
use std::error::Error as StdError;
use std::fmt::{self, Display};

use pdfchat_model::{self as model, ModelProviderError};

/// The kind of error that occurred during a turn.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The model could not produce a reply.
    ModelUnavailable,
    /// The model refused the prompt or withheld the reply.
    ModelRejected,
    /// A record could not be written to the log store.
    StoreAppendFailed,
    /// A document could not be turned into text segments.
    ExtractionFailed,
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::ModelUnavailable => write!(f, "Model unavailable"),
            ErrorKind::ModelRejected => write!(f, "Model rejected the prompt"),
            ErrorKind::StoreAppendFailed => write!(f, "Store append failed"),
            ErrorKind::ExtractionFailed => write!(f, "Extraction failed"),
        }
    }
}

/// Describes why a step of a turn failed.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Error {
    kind: ErrorKind,
    reason: Option<String>,
}

impl Error {
    /// Creates a new error with the `ModelUnavailable` kind.
    #[inline]
    pub fn model_unavailable() -> Self {
        Self::new(ErrorKind::ModelUnavailable)
    }

    /// Creates a new error with the `ModelRejected` kind.
    #[inline]
    pub fn model_rejected() -> Self {
        Self::new(ErrorKind::ModelRejected)
    }

    /// Creates a new error with the `StoreAppendFailed` kind.
    #[inline]
    pub fn store_append_failed() -> Self {
        Self::new(ErrorKind::StoreAppendFailed)
    }

    /// Creates a new error with the `ExtractionFailed` kind.
    #[inline]
    pub fn extraction_failed() -> Self {
        Self::new(ErrorKind::ExtractionFailed)
    }

    /// Classifies an error raised by a model provider.
    pub fn from_provider(err: &dyn ModelProviderError) -> Self {
        let error = match err.kind() {
            model::ErrorKind::Moderated => Self::model_rejected(),
            model::ErrorKind::RateLimitExceeded
            | model::ErrorKind::Unavailable
            | model::ErrorKind::Other => Self::model_unavailable(),
        };
        error.with_reason(format!("{}: {err}", err.kind()))
    }

    #[inline]
    fn new(kind: ErrorKind) -> Self {
        Self { kind, reason: None }
    }

    /// Attaches a reason to the error.
    #[inline]
    pub fn with_reason<S: Into<String>>(self, reason: S) -> Self {
        Self {
            kind: self.kind,
            reason: Some(reason.into()),
        }
    }

    /// Returns the kind of the error.
    #[inline]
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Returns the reason for the error.
    #[inline]
    pub fn reason(&self) -> Cow<'_, str> {
        match self.reason.as_deref() {
            Some(reason) => Cow::Borrowed(reason),
            None => Cow::Owned(format!("{}", self.kind)),
        }
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.reason {
            Some(reason) => write!(f, "{}: {reason}", self.kind),
            None => write!(f, "{}", self.kind),
        }
    }
}

impl StdError for Error {}
