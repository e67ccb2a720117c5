//! Slide data and the catalog of recognized template fields
//!
//! Every field a template may reference is listed in [`FIELDS`] together with
//! the value substituted when a slide leaves it absent, null or empty. Fields
//! a slide carries that are not in the catalog are ignored.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};

const DEFAULT_FONT_STACK: &str = "'Inter', 'Helvetica Neue', Arial, sans-serif";

/// Whether a field carries slide content or presentation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Content,
    Style,
}

/// A recognized template field and its documented default.
#[derive(Debug, Clone, Copy)]
pub struct Field {
    pub name: &'static str,
    pub kind: FieldKind,
    pub default: &'static str,
}

const fn content(name: &'static str) -> Field {
    Field { name, kind: FieldKind::Content, default: "" }
}

const fn style(name: &'static str, default: &'static str) -> Field {
    Field { name, kind: FieldKind::Style, default }
}

/// All fields the injector substitutes, in substitution order.
pub const FIELDS: &[Field] = &[
    content("heading"),
    content("subheading"),
    content("body_text"),
    content("label"),
    content("cta_text"),
    content("footer_text"),
    content("author_name"),
    content("author_handle"),
    content("image_url"),
    content("background_image_url"),
    content("logo_url"),
    content("position"),
    content("total"),
    style("background_color", "#ffffff"),
    style("text_color", "#111827"),
    style("heading_color", "#111827"),
    style("accent_color", "#2563eb"),
    style("secondary_color", "#6b7280"),
    style("overlay_color", "rgba(0, 0, 0, 0.45)"),
    style("font_family", DEFAULT_FONT_STACK),
    style("heading_font_family", DEFAULT_FONT_STACK),
    style("heading_size", "72px"),
    style("body_size", "36px"),
    style("label_size", "24px"),
    style("line_height", "1.35"),
    style("text_align", "left"),
    style("padding", "96px"),
    style("border_radius", "24px"),
    style("image_fit", "cover"),
];

/// Look up a recognized field by name.
pub fn field(name: &str) -> Option<&'static Field> {
    FIELDS.iter().find(|f| f.name == name)
}

/// The field that selects which layout template renders a slide.
pub const LAYOUT_STYLE: &str = "layout_style";

/// One slide's content and styling, as a flat JSON object.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SlideData(Map<String, Value>);

impl SlideData {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style setter, mostly useful in tests and demos.
    pub fn with(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.set(name, value);
        self
    }

    pub fn set(&mut self, name: &str, value: impl Into<Value>) {
        self.0.insert(name.to_string(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    /// The requested layout, if present as a non-empty string.
    pub fn layout_style(&self) -> Option<&str> {
        match self.0.get(LAYOUT_STYLE) {
            Some(Value::String(s)) if !s.is_empty() => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn into_inner(self) -> Map<String, Value> {
        self.0
    }
}

impl From<Map<String, Value>> for SlideData {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

/// A field's value after defaults have been applied.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedValue {
    /// Text inserted in place of the placeholder
    pub text: String,
    /// Whether `{{#if field}}` blocks keep their content
    pub truthy: bool,
}

impl ResolvedValue {
    /// Resolve a raw slide value against the field's default.
    ///
    /// Absent, null and empty-string values fall back to `default`. The
    /// truthiness of the result is decided by [`is_truthy`] on whichever
    /// value won.
    pub fn resolve(raw: Option<&Value>, default: &str) -> Self {
        match raw {
            Some(value) if !is_blank(value) => Self {
                text: value_text(value),
                truthy: is_truthy(value),
            },
            _ => Self {
                text: default.to_string(),
                truthy: is_truthy_text(default),
            },
        }
    }
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        _ => false,
    }
}

fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Conditional-block truthiness.
///
/// Falsy: null, the empty string, the string `"0"`, numeric zero and `false`.
/// Every other value is truthy, the string `"false"` included.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => !is_zero(n),
        Value::String(s) => is_truthy_text(s),
        Value::Array(_) | Value::Object(_) => true,
    }
}

fn is_truthy_text(s: &str) -> bool {
    !s.is_empty() && s != "0"
}

fn is_zero(n: &Number) -> bool {
    n.as_f64().is_some_and(|f| f == 0.0)
}
