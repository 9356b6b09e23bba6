//! Remote retrieval
//!
//! Blocking fetch of templates and context payloads behind the
//! [`RemoteFetcher`] seam so tests can substitute an in-memory fetcher.
//! Failures never propagate out of resolution: they are logged, recorded as
//! [`FetchEvent`]s on the originating region node, and the caller falls
//! through to its "absent value" handling.

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::dom::NodeId;

/// Payload returned by a fetcher.
#[derive(Debug, Clone)]
pub enum Payload {
    /// Already-structured JSON (e.g. an `application/json` response); used
    /// as-is.
    Json(Value),
    /// Raw text; may be markup, or JSON that still needs parsing.
    Text(String),
}

/// A failed retrieval.
#[derive(Error, Debug)]
#[error("{message}")]
pub struct FetchError {
    /// HTTP status, when the transport got far enough to have one.
    pub status: Option<u16>,
    pub message: String,
}

/// Failure event recorded against the originating region node.
#[derive(Debug, Clone, Serialize)]
pub struct FetchEvent {
    pub node: NodeId,
    pub url: String,
    pub status: Option<u16>,
    pub error: String,
}

/// Blocking retrieval of a remote document.
pub trait RemoteFetcher {
    fn get(&self, url: &str) -> Result<Payload, FetchError>;
}

/// reqwest-backed fetcher. Synchronous by design: resolution ordering
/// depends on a child being fully resolved before its parent renders.
pub struct HttpFetcher {
    client: reqwest::blocking::Client,
}

impl HttpFetcher {
    pub fn new() -> Self {
        Self {
            client: reqwest::blocking::Client::new(),
        }
    }
}

impl Default for HttpFetcher {
    fn default() -> Self {
        Self::new()
    }
}

impl RemoteFetcher for HttpFetcher {
    fn get(&self, url: &str) -> Result<Payload, FetchError> {
        tracing::debug!(url = %url, "performing blocking request");
        let response = self.client.get(url).send().map_err(|e| FetchError {
            status: e.status().map(|s| s.as_u16()),
            message: e.to_string(),
        })?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError {
                status: Some(status.as_u16()),
                message: format!("request for '{url}' returned HTTP {status}"),
            });
        }
        let is_json = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.contains("json"))
            .unwrap_or(false);
        let body = response.text().map_err(|e| FetchError {
            status: Some(status.as_u16()),
            message: e.to_string(),
        })?;
        if is_json {
            match serde_json::from_str(&body) {
                Ok(v) => Ok(Payload::Json(v)),
                Err(e) => Err(FetchError {
                    status: Some(status.as_u16()),
                    message: format!("invalid json body from '{url}': {e}"),
                }),
            }
        } else {
            Ok(Payload::Text(body))
        }
    }
}

/// Fetch a JSON context payload. A text payload is parsed; parse failures
/// are logged and treated as absent. Transport failures are recorded as an
/// event unless suppressed.
pub(crate) fn fetch_json<F: RemoteFetcher>(
    fetcher: &F,
    url: &str,
    node: NodeId,
    events: &mut Vec<FetchEvent>,
    suppress_event: bool,
) -> Option<Value> {
    match fetcher.get(url) {
        Ok(Payload::Json(v)) => Some(v),
        Ok(Payload::Text(body)) => match serde_json::from_str(&body) {
            Ok(v) => Some(v),
            Err(e) => {
                tracing::error!(url = %url, error = %e, "error parsing json payload");
                None
            }
        },
        Err(e) => {
            tracing::debug!(url = %url, error = %e, "context fetch failed");
            if !suppress_event {
                events.push(FetchEvent {
                    node,
                    url: url.to_string(),
                    status: e.status,
                    error: e.to_string(),
                });
            }
            None
        }
    }
}

/// Fetch template markup. A structured payload in a markup position is a
/// declaration mistake; it is logged and treated as absent. Transport
/// failures are recorded as an event unless suppressed.
pub(crate) fn fetch_markup<F: RemoteFetcher>(
    fetcher: &F,
    url: &str,
    node: NodeId,
    events: &mut Vec<FetchEvent>,
    suppress_event: bool,
) -> Option<String> {
    match fetcher.get(url) {
        Ok(Payload::Text(body)) => Some(body),
        Ok(Payload::Json(_)) => {
            tracing::warn!(url = %url, "expected markup but got a json payload");
            None
        }
        Err(e) => {
            tracing::debug!(url = %url, error = %e, "template fetch failed");
            if !suppress_event {
                events.push(FetchEvent {
                    node,
                    url: url.to_string(),
                    status: e.status,
                    error: e.to_string(),
                });
            }
            None
        }
    }
}
