//! Template variable injection
//!
//! Filling a template is two ordered passes over the markup:
//!
//! 1. every `{{field}}` token naming a recognized field is replaced by the
//!    field's resolved value, in a single scan so inserted text is never
//!    matched again;
//! 2. every `{{#if field}}...{{/if}}` block is kept or dropped according to
//!    the field's resolved truthiness. Blocks do not nest.
//!
//! Values are inserted verbatim. Templates and slide data are trusted, and
//! several fields are expected to carry HTML fragments, so nothing is escaped.

use std::collections::HashMap;
use std::sync::OnceLock;

use regex::{Captures, Regex};

use crate::fields::{ResolvedValue, SlideData, FIELDS};

/// Field name to resolved value, for every recognized field.
pub type ResolvedFields = HashMap<&'static str, ResolvedValue>;

fn placeholder_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\{\{([A-Za-z0-9_]+)\}\}").expect("placeholder pattern"))
}

fn block_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?s)\{\{#if\s+([A-Za-z0-9_]+)\s*\}\}(.*?)\{\{/if\}\}").expect("block pattern")
    })
}

/// Apply defaults to every recognized field of `data`.
pub fn resolve_fields(data: &SlideData) -> ResolvedFields {
    FIELDS
        .iter()
        .map(|f| (f.name, ResolvedValue::resolve(data.get(f.name), f.default)))
        .collect()
}

/// Fill `markup` with `data`: plain substitution, then conditional blocks.
pub fn inject(markup: &str, data: &SlideData) -> String {
    let fields = resolve_fields(data);
    let substituted = substitute(markup, &fields);
    resolve_blocks(&substituted, &fields)
}

/// Replace every recognized `{{field}}` token. Unknown tokens are left as-is.
pub fn substitute(markup: &str, fields: &ResolvedFields) -> String {
    placeholder_re()
        .replace_all(markup, |caps: &Captures| match fields.get(&caps[1]) {
            Some(v) => v.text.clone(),
            None => caps[0].to_string(),
        })
        .into_owned()
}

/// Keep truthy `{{#if field}}` blocks and drop the rest.
///
/// A block naming an unrecognized field is treated as falsy.
pub fn resolve_blocks(markup: &str, fields: &ResolvedFields) -> String {
    block_re()
        .replace_all(markup, |caps: &Captures| {
            let keep = fields.get(&caps[1]).is_some_and(|v| v.truthy);
            if keep {
                caps[2].to_string()
            } else {
                String::new()
            }
        })
        .into_owned()
}
