use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::entities::value::Scalar;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectOption {
    pub label: String,
    pub value: Scalar,
}

impl SelectOption {
    pub fn new(label: impl Into<String>, value: impl Into<Scalar>) -> Self {
        Self {
            label: label.into(),
            value: value.into(),
        }
    }

    /// Maps a raw item from a paged option loader.
    ///
    /// Label precedence is `name`, `title`, `label`, then the item itself;
    /// the value is `id` when present, otherwise the item itself.
    pub fn from_raw(item: &Value) -> Self {
        let label = ["name", "title", "label"]
            .iter()
            .find_map(|key| item.get(key).filter(|value| !value.is_null()))
            .map(json_to_label)
            .unwrap_or_else(|| json_to_label(item));
        let value = item
            .get("id")
            .and_then(Scalar::from_json)
            .or_else(|| Scalar::from_json(item))
            .unwrap_or_else(|| Scalar::text(""));
        Self { label, value }
    }
}

fn json_to_label(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

/// First option whose value stringifies to `raw`.
pub fn find_by_raw<'a>(options: &'a [SelectOption], raw: &str) -> Option<&'a SelectOption> {
    options.iter().find(|option| option.value.to_string() == raw)
}

/// First option whose value equals `value`, compared as strings so that a
/// text value recovered from the URL still matches a numeric option.
pub fn find_by_value<'a>(options: &'a [SelectOption], value: &Scalar) -> Option<&'a SelectOption> {
    let raw = value.to_string();
    find_by_raw(options, &raw)
}

/// Per-field option cache entry. `has_more` is true while the loader reports
/// further pages.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct OptionCacheEntry {
    pub options: Vec<SelectOption>,
    pub current_page: u32,
    pub page_size: u32,
    pub total: u64,
    pub has_more: bool,
    pub loading: bool,
    pub search_text: String,
    pub error: Option<String>,
}

impl OptionCacheEntry {
    pub fn with_options(options: Vec<SelectOption>) -> Self {
        let total = options.len() as u64;
        Self {
            options,
            current_page: 1,
            page_size: 0,
            total,
            has_more: false,
            loading: false,
            search_text: String::new(),
            error: None,
        }
    }
}
