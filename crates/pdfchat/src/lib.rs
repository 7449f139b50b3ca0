//! Chat with a generative model about a PDF document.
//!
//! A [`Session`] ties the conversation driver to a model provider, a
//! message log and a text extraction service. The crate also ships the
//! `pdfchat` CLI for using it in the terminal.

#![deny(missing_docs)]

#[macro_use]
extern crate tracing;

mod session;
mod view;

pub use session::{Session, SessionBuilder};
pub use view::{TranscriptView, ViewChange, render_message};

/// Re-exports of [`pdfchat_core`] crate.
pub mod core {
    pub use pdfchat_core::*;
}

/// Re-exports of [`pdfchat_store`] crate.
pub mod store {
    pub use pdfchat_store::*;
}

/// Re-exports of [`pdfchat_extractor`] crate.
pub mod extractor {
    pub use pdfchat_extractor::*;
}
