//! Error handling for the composition engine
//!
//! Idiomatic thiserror types. Almost every failure in this crate is
//! non-fatal by contract: fetch and payload problems degrade to "missing
//! data, continue" and surface as events or log lines instead of errors.
//! The variants here cover the few places where a caller genuinely needs
//! to know the pass did not complete.

use thiserror::Error;

/// Errors surfaced by a composition pass
#[derive(Error, Debug)]
pub enum ComposeError {
    /// The template engine rejected a compiled fragment.
    #[error("template render error: {0}")]
    Render(#[from] handlebars::RenderError),

    /// Serialization of a context value failed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, ComposeError>;
