use std::fmt::{self, Display};

/// The kind of error that occurred.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The prompt or the reply was blocked by the provider's safety
    /// filters.
    Moderated,
    /// The model provider is rate limited.
    RateLimitExceeded,
    /// The provider could not be reached or failed on its side.
    Unavailable,
    /// Any other errors.
    Other,
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::Moderated => write!(f, "Moderated"),
            ErrorKind::RateLimitExceeded => write!(f, "Rate limit exceeded"),
            ErrorKind::Unavailable => write!(f, "Unavailable"),
            ErrorKind::Other => write!(f, "Other"),
        }
    }
}
