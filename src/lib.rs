//! tessera: recursive, context-propagating template composition
//!
//! Given a markup tree with nodes marked as template regions, tessera
//! resolves a data context for each region (from inline declaration,
//! remote JSON, or inherited parent context) and rewrites the region's
//! markup into a handlebars fragment. Once every nested region has been
//! rewritten, each top-level region is compiled and rendered exactly once
//! and the output substituted back into the tree.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use tessera::{Document, Session};
//!
//! let mut doc = Document::parse(
//!     r#"<ul data-template="name: users; context: /api/users.json"><li>{{login}}</li></ul>"#,
//! );
//! let mut session = Session::with_http("https://example.com/page?team=core");
//! session.render(&mut doc).unwrap();
//! ```
//!
//! Resolution is fail-soft: fetch failures are recorded as events on the
//! session, malformed payloads are logged, and a region with no data renders
//! against an empty mapping. The global context lives on the [`Session`]
//! and persists across passes, so a failed pass never loses bindings that
//! were already resolved.

pub mod composer;
pub mod config;
pub mod context;
pub mod dom;
pub mod engine;
pub mod error;
pub mod fetch;
pub mod render;
pub mod resolver;
pub mod session;

pub use config::RegionConfig;
pub use context::{ContextPath, Object, Resolved};
pub use dom::{Document, NodeId};
pub use engine::Engine;
pub use error::{ComposeError, Result};
pub use fetch::{FetchError, FetchEvent, HttpFetcher, Payload, RemoteFetcher};
pub use session::Session;
