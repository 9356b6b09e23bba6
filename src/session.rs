//! Page-lifetime composition session
//!
//! The externally owned store the host keeps alive between render passes.
//! It holds the global context (seeded from the page location and query
//! string), the auto-name counter, the fetch-event log, and the fetcher and
//! engine handles. Because the store outlives a pass, bindings accumulated
//! before a mid-pass render failure survive, and a retry does not lose
//! previously resolved data.

use std::collections::HashSet;

use serde_json::Value;

use crate::context::{self, ContextPath};
use crate::dom::Document;
use crate::engine::Engine;
use crate::error::Result;
use crate::fetch::{FetchEvent, HttpFetcher, RemoteFetcher};
use crate::render;

pub struct Session<F: RemoteFetcher> {
    pub(crate) global: Value,
    pub(crate) engine: Engine,
    pub(crate) fetcher: F,
    pub(crate) events: Vec<FetchEvent>,
    /// Page-scoped counter feeding auto-generated region names.
    counter: u64,
    /// Names claimed by fetched bindings in the current pass, keyed by
    /// scope; a sibling fetching under an already-claimed name gets a
    /// disambiguated one.
    claimed: HashSet<String>,
}

impl<F: RemoteFetcher> Session<F> {
    /// Create a session for one page, seeding the global context from its
    /// URL and query string.
    pub fn new(fetcher: F, page_url: &str) -> Self {
        Self {
            global: Value::Object(context::seed_global(page_url)),
            engine: Engine::new(),
            fetcher,
            events: Vec::new(),
            counter: 0,
            claimed: HashSet::new(),
        }
    }

    /// Render every unprocessed top-level region in `doc`, in document
    /// order. Child regions are fully resolved before their parent
    /// compiles; ordering is enforced by the call structure alone.
    pub fn render(&mut self, doc: &mut Document) -> Result<()> {
        render::render_document(self, doc)
    }

    /// The accumulated global context.
    pub fn global(&self) -> &Value {
        &self.global
    }

    /// Mutable access for hosts that seed extra bindings before a pass.
    pub fn global_mut(&mut self) -> &mut Value {
        &mut self.global
    }

    /// Drain the fetch failure events recorded since the last call.
    pub fn take_events(&mut self) -> Vec<FetchEvent> {
        std::mem::take(&mut self.events)
    }

    /// The fetcher this session was built with.
    pub fn fetcher(&self) -> &F {
        &self.fetcher
    }

    pub(crate) fn begin_pass(&mut self) {
        self.claimed.clear();
    }

    pub(crate) fn next_auto_name(&mut self) -> String {
        let n = self.counter;
        self.counter += 1;
        format!("template{n}")
    }

    /// Claim `name` for a fetched binding in the scope at `path`,
    /// disambiguating when a sibling already claimed it this pass.
    pub(crate) fn claim_name(&mut self, path: &ContextPath, name: String) -> String {
        let key = format!("{}::{}", path.key(), name);
        if self.claimed.insert(key) {
            return name;
        }
        let mut i = 2;
        loop {
            let candidate = format!("{name}_{i}");
            let key = format!("{}::{}", path.key(), candidate);
            if self.claimed.insert(key) {
                tracing::debug!(name = %name, bound_as = %candidate, "sibling name collision disambiguated");
                return candidate;
            }
            i += 1;
        }
    }
}

impl Session<HttpFetcher> {
    /// Session backed by a blocking HTTP fetcher.
    pub fn with_http(page_url: &str) -> Self {
        Self::new(HttpFetcher::new(), page_url)
    }
}
