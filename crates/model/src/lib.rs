//! A provider-agnostic protocol for the generative model behind the chat.
//!
//! The driver only ever needs "send one prompt, get one reply", but
//! providers stream their replies, are rate limited, and may refuse a
//! prompt on safety grounds. This crate pins down how those facts are
//! reported, so that providers can be swapped without touching the core.
//!
//! Types in this crate don't define any behavior, instead they are the
//! constraints that the implementors should adhere to.

#![deny(missing_docs)]

mod error;
mod provider;
mod request;
mod response;

pub use error::*;
pub use provider::*;
pub use request::*;
pub use response::*;
