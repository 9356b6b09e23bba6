//! End-to-end composition scenarios: nested regions, tabular expansion,
//! idempotence, failure degradation, and post-render fix-ups.

use std::cell::Cell;
use std::collections::HashMap;
use std::sync::Once;

use serde_json::json;
use tessera::{Document, FetchError, Payload, RemoteFetcher, Session};

static TRACING: Once = Once::new();

/// Log output for failing tests, filtered through `RUST_LOG`.
fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

/// In-memory fetcher with a call counter, standing in for the blocking
/// HTTP transport.
struct FixtureFetcher {
    fixtures: HashMap<String, Payload>,
    calls: Cell<usize>,
}

impl FixtureFetcher {
    fn new(fixtures: &[(&str, &str)]) -> Self {
        Self {
            fixtures: fixtures
                .iter()
                .map(|(k, v)| (k.to_string(), Payload::Text(v.to_string())))
                .collect(),
            calls: Cell::new(0),
        }
    }
}

impl RemoteFetcher for FixtureFetcher {
    fn get(&self, url: &str) -> Result<Payload, FetchError> {
        self.calls.set(self.calls.get() + 1);
        self.fixtures.get(url).cloned().ok_or(FetchError {
            status: Some(404),
            message: format!("no fixture for '{url}'"),
        })
    }
}

fn session(fixtures: &[(&str, &str)]) -> Session<FixtureFetcher> {
    init_tracing();
    Session::new(
        FixtureFetcher::new(fixtures),
        "https://example.com/page?foo=%5B1%2C2%5D&bar=baz",
    )
}

#[test]
fn test_nested_table_composition_renders_once() {
    let mut session = session(&[(
        "/app.json",
        r#"{"title":"Board","rows":[{"n":"a"},{"n":"b"}]}"#,
    )]);
    let mut doc = Document::parse(
        r#"<div id="app" data-template="context: /app.json"><h1>{{title}}</h1><table><tbody data-template="name: rows"><tr><td>{{n}}</td><td>{{PARENT.title}}</td></tr></tbody></table></div>"#,
    );

    session.render(&mut doc).unwrap();

    let html = doc.inner_markup(Document::root());
    assert!(html.contains("<h1>Board</h1>"), "html: {html}");
    // one row fragment per element, each carrying the parent back-reference
    assert!(html.contains("<tr><td>a</td><td>Board</td></tr>"), "html: {html}");
    assert!(html.contains("<tr><td>b</td><td>Board</td></tr>"), "html: {html}");
    // declarations consumed, nothing left to initialize
    assert!(!html.contains("data-template"));
    // exactly one fetch for the whole subtree
    assert_eq!(session_calls(&session), 1);
}

fn session_calls(session: &Session<FixtureFetcher>) -> usize {
    session.fetcher().calls.get()
}

#[test]
fn test_rendering_is_idempotent_across_passes() {
    let mut session = session(&[("/app.json", r#"{"title":"T"}"#)]);
    let mut doc =
        Document::parse(r#"<div data-template="name: app; context: /app.json">{{title}}</div>"#);

    session.render(&mut doc).unwrap();
    let first = doc.inner_markup(Document::root());
    let calls_after_first = session_calls(&session);

    // a second pass finds no unprocessed region: no fetch, no rewrite
    session.render(&mut doc).unwrap();
    assert_eq!(doc.inner_markup(Document::root()), first);
    assert_eq!(session_calls(&session), calls_after_first);
}

#[test]
fn test_premarked_region_is_never_initialized() {
    let mut session = session(&[("/app.json", r#"{"title":"T"}"#)]);
    let mut doc = Document::parse(
        r#"<div class="template-rendered" data-template="name: app; context: /app.json">{{title}}</div>"#,
    );
    session.render(&mut doc).unwrap();
    assert_eq!(session_calls(&session), 0);
    assert!(doc.inner_markup(Document::root()).contains("{{title}}"));
}

#[test]
fn test_sequence_without_expand_renders_through_iteration_block() {
    let mut session = session(&[("/tags.json", r#"[{"t":"x"},{"t":"y"}]"#)]);
    let mut doc = Document::parse(
        r#"<ul data-template="name: tags; context: /tags.json"><li>{{t}}</li></ul>"#,
    );
    session.render(&mut doc).unwrap();
    let html = doc.inner_markup(Document::root());
    assert!(html.contains("<li>x</li><li>y</li>"), "html: {html}");
}

#[test]
fn test_fetched_sequence_is_sorted_before_binding() {
    let mut session = session(&[("/items.json", r#"[{"id":2},{"id":1}]"#)]);
    let mut doc = Document::parse(
        r#"<ol data-template="name: items; context: /items.json; sort: id"><li>{{id}}</li></ol>"#,
    );
    session.render(&mut doc).unwrap();

    assert_eq!(session.global()["items"], json!([{"id": 1}, {"id": 2}]));
    let html = doc.inner_markup(Document::root());
    assert!(html.contains("<li>1</li><li>2</li>"), "html: {html}");
}

#[test]
fn test_already_sorted_sequence_is_unchanged() {
    let mut session = session(&[("/items.json", r#"[{"id":1},{"id":2}]"#)]);
    let mut doc = Document::parse(
        r#"<ol data-template="name: items; context: /items.json; sort: id"><li>{{id}}</li></ol>"#,
    );
    session.render(&mut doc).unwrap();
    assert_eq!(session.global()["items"], json!([{"id": 1}, {"id": 2}]));
}

#[test]
fn test_region_without_context_or_inheritance_gets_empty_mapping() {
    let mut session = session(&[]);
    let mut doc = Document::parse(r#"<div data-template="name: ghost">{{missing}}</div>"#);
    session.render(&mut doc).unwrap();

    // never absent: the binding exists and is an empty mapping
    assert_eq!(session.global()["ghost"], json!({}));
    let html = doc.inner_markup(Document::root());
    assert_eq!(html, "<div class=\"template-rendered\"></div>");
}

#[test]
fn test_fetch_failure_degrades_and_records_event() {
    let mut session = session(&[]);
    let mut doc = Document::parse(
        r#"<div data-template="name: gone; context: /missing.json">{{x}}</div>"#,
    );
    session.render(&mut doc).unwrap();

    let events = session.take_events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].status, Some(404));
    assert_eq!(events[0].url, "/missing.json");
    // resolution continued with the empty-mapping default
    assert_eq!(session.global()["gone"], json!({}));
}

#[test]
fn test_query_string_bindings_reach_templates() {
    // ?foo=%5B1%2C2%5D parses as a collection, ?bar=baz stays a string
    let mut session = session(&[]);
    assert_eq!(session.global()["foo"], json!([1, 2]));
    assert_eq!(session.global()["bar"], json!("baz"));

    let mut doc = Document::parse(r#"<p data-template="name: q; wrap: none">{{bar}}</p>"#);
    session.render(&mut doc).unwrap();
    assert!(doc.inner_markup(Document::root()).contains("baz"));
}

#[test]
fn test_sibling_auto_named_regions_do_not_collide() {
    let mut session = session(&[
        ("/a.json", r#"{"v":"first"}"#),
        ("/b.json", r#"{"v":"second"}"#),
    ]);
    let mut doc = Document::parse(
        r#"<div data-template="context: /a.json">{{v}}</div><div data-template="context: /b.json">{{v}}</div>"#,
    );
    session.render(&mut doc).unwrap();

    let html = doc.inner_markup(Document::root());
    assert!(html.contains("first"), "html: {html}");
    assert!(html.contains("second"), "html: {html}");
    assert_eq!(session.global()["template0"], json!({"v": "first"}));
    assert_eq!(session.global()["template1"], json!({"v": "second"}));
}

#[test]
fn test_state_attributes_and_deferred_images_fixed_up() {
    let mut session = session(&[(
        "/form.json",
        r#"{"v":"a","choice":"a","img":"real.png"}"#,
    )]);
    let mut doc = Document::parse(
        r#"<form data-template="name: f; context: /form.json"><option data-selected="{{setSelected v choice}}">A</option><img data-src="{{img}}" src="blank.gif"></form>"#,
    );
    session.render(&mut doc).unwrap();

    let html = doc.inner_markup(Document::root());
    assert!(html.contains(r#"selected="selected""#), "html: {html}");
    assert!(!html.contains("data-selected"), "html: {html}");
    assert!(html.contains(r#"src="real.png""#), "html: {html}");
}

#[test]
fn test_global_context_survives_render_failure() {
    let mut session = session(&[("/app.json", r#"{"title":"kept"}"#)]);
    // inner region resolves (binding installed), then the top-level compile
    // fails on an unclosed block
    let mut doc = Document::parse(
        r#"<div data-template="name: app; context: /app.json">{{#if broken}}</div>"#,
    );
    assert!(session.render(&mut doc).is_err());
    assert_eq!(session.global()["app"], json!({"title": "kept"}));

    // a retry against fixed markup reuses the session without re-seeding
    let mut doc =
        Document::parse(r#"<div data-template="name: app2; wrap: none">{{href}}</div>"#);
    session.render(&mut doc).unwrap();
    assert!(doc
        .inner_markup(Document::root())
        .contains("https://example.com/page"));
}
