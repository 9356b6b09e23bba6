//! Template engine wrapper
//!
//! Thin seam over handlebars: compile-and-render as a pure function, plus
//! the block and value helpers region markup relies on. The registry runs
//! in non-strict mode so unknown paths render empty, matching the
//! fail-soft contract of resolution.

use handlebars::{Handlebars, Renderable};
use serde_json::Value;

use crate::error::Result;

pub struct Engine {
    registry: Handlebars<'static>,
}

impl Engine {
    pub fn new() -> Self {
        let mut registry = Handlebars::new();
        registry.register_helper("condition", Box::new(condition_helper));
        registry.register_helper("setSelected", Box::new(set_selected_helper));
        registry.register_helper("setChecked", Box::new(set_checked_helper));
        registry.register_helper("defaultValue", Box::new(default_value_helper));
        registry.register_helper("filterATandDOT", Box::new(filter_at_and_dot_helper));
        // replaces the builtin index lookup with find-by-key projection
        registry.register_helper("lookup", Box::new(lookup_helper));
        Self { registry }
    }

    /// Compile `source` and render it against `data` in one step.
    pub fn render(&self, source: &str, data: &Value) -> Result<String> {
        Ok(self.registry.render_template(source, data)?)
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

/// `{{#condition left op right}}...{{/condition}}` renders the block when
/// the comparison holds. The operator may be written bare or quoted.
fn condition_helper<'reg, 'rc>(
    h: &handlebars::Helper<'rc>,
    r: &'reg Handlebars<'reg>,
    ctx: &'rc handlebars::Context,
    rc: &mut handlebars::RenderContext<'reg, 'rc>,
    out: &mut dyn handlebars::Output,
) -> handlebars::HelperResult {
    let left = h.param(0).map(|p| p.value().clone()).unwrap_or(Value::Null);
    let right = h.param(2).map(|p| p.value().clone()).unwrap_or(Value::Null);
    // a bare operator word is an unresolvable path; fall back to its literal
    // spelling
    let op = h
        .param(1)
        .and_then(|p| {
            p.value()
                .as_str()
                .map(str::to_string)
                .or_else(|| p.relative_path().cloned())
        })
        .unwrap_or_default();

    let holds = match op.as_str() {
        "equals" => left == right,
        "unequals" => left != right,
        "contains" => contains(&left, &right),
        other => {
            tracing::warn!(op = %other, "unknown condition operator");
            false
        }
    };
    if holds {
        if let Some(template) = h.template() {
            template.render(r, ctx, rc, out)?;
        }
    }
    Ok(())
}

/// Containment: substring for strings, membership by equality for
/// sequences, false for everything else.
fn contains(left: &Value, right: &Value) -> bool {
    match left {
        Value::String(s) => right.as_str().map(|r| s.contains(r)).unwrap_or(false),
        Value::Array(items) => items.contains(right),
        _ => false,
    }
}

/// Shared test behind `setSelected`/`setChecked`: equality, or membership
/// when the expected side is a sequence.
fn flag_matches(h: &handlebars::Helper) -> bool {
    let is = h.param(0).map(|p| p.value().clone()).unwrap_or(Value::Null);
    let should = h.param(1).map(|p| p.value().clone()).unwrap_or(Value::Null);
    match &should {
        Value::Array(items) => items.contains(&is),
        other => &is == other,
    }
}

// The true/false strings land in data-selected/data-checked attributes; the
// post-processor rewrites the true ones into real attributes.

fn set_selected_helper(
    h: &handlebars::Helper,
    _: &Handlebars,
    _: &handlebars::Context,
    _: &mut handlebars::RenderContext,
    out: &mut dyn handlebars::Output,
) -> handlebars::HelperResult {
    out.write(if flag_matches(h) { "true" } else { "false" })?;
    Ok(())
}

fn set_checked_helper(
    h: &handlebars::Helper,
    _: &Handlebars,
    _: &handlebars::Context,
    _: &mut handlebars::RenderContext,
    out: &mut dyn handlebars::Output,
) -> handlebars::HelperResult {
    out.write(if flag_matches(h) { "true" } else { "false" })?;
    Ok(())
}

fn default_value_helper(
    h: &handlebars::Helper,
    _: &Handlebars,
    _: &handlebars::Context,
    _: &mut handlebars::RenderContext,
    out: &mut dyn handlebars::Output,
) -> handlebars::HelperResult {
    let value = h.param(0).map(|p| p.value()).filter(|v| !v.is_null());
    let fallback = h.param(1).map(|p| p.value());
    if let Some(v) = value.or(fallback) {
        out.write(&scalar_text(v))?;
    }
    Ok(())
}

fn filter_at_and_dot_helper(
    h: &handlebars::Helper,
    _: &Handlebars,
    _: &handlebars::Context,
    _: &mut handlebars::RenderContext,
    out: &mut dyn handlebars::Output,
) -> handlebars::HelperResult {
    let param = h.param(0).and_then(|p| p.value().as_str()).unwrap_or("");
    let filtered: String = param.chars().filter(|c| *c != '@' && *c != '.').collect();
    out.write(&filtered)?;
    Ok(())
}

/// `{{lookup value list "key" "projection"}}` writes the first element of
/// `list` whose `key` equals `value`, projected through `projection`.
/// Writes nothing when no element matches.
fn lookup_helper(
    h: &handlebars::Helper,
    _: &Handlebars,
    _: &handlebars::Context,
    _: &mut handlebars::RenderContext,
    out: &mut dyn handlebars::Output,
) -> handlebars::HelperResult {
    let value = h.param(0).map(|p| p.value().clone()).unwrap_or(Value::Null);
    let list = h.param(1).and_then(|p| p.value().as_array().cloned());
    let key = h.param(2).and_then(|p| p.value().as_str().map(str::to_string));
    let projection = h.param(3).and_then(|p| p.value().as_str().map(str::to_string));

    if let (Some(list), Some(key), Some(projection)) = (list, key, projection) {
        if let Some(found) = list.iter().find(|item| item.get(&key) == Some(&value)) {
            if let Some(projected) = found.get(&projection) {
                out.write(&scalar_text(projected))?;
            }
        }
    }
    Ok(())
}

fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
