use std::collections::BTreeMap;
use std::fmt::Write;

use chrono::{DateTime, NaiveDate};

use crate::domain::entities::chip::{ActiveFilter, ChipKey};
use crate::domain::entities::option::find_by_value;
use crate::domain::entities::value::Scalar;
use crate::usecase::config::screen::{FilterDescriptor, FilterKind};
use crate::usecase::services::option_resolver::OptionResolver;

pub const SEARCH_CHIP_LABEL: &str = "Search";
pub const DEFAULT_DATE_FORMAT: &str = "%-m/%-d/%Y";

/// Derives the applied-filter chips. The search chip, if any, comes first;
/// the rest follow descriptor order.
pub fn project(
    descriptors: &[FilterDescriptor],
    applied: &BTreeMap<String, Scalar>,
    search_text: &str,
    options: &OptionResolver,
    date_format: &str,
) -> Vec<ActiveFilter> {
    let mut chips = Vec::new();

    if !search_text.trim().is_empty() {
        chips.push(ActiveFilter {
            key: ChipKey::Search,
            label: SEARCH_CHIP_LABEL.to_string(),
            raw_value: Scalar::text(search_text),
            display_value: search_text.to_string(),
        });
    }

    for descriptor in descriptors {
        let Some(value) = applied.get(&descriptor.name).filter(|value| !value.is_empty()) else {
            continue;
        };
        chips.push(ActiveFilter {
            key: ChipKey::Filter(descriptor.name.clone()),
            label: descriptor.label.clone(),
            raw_value: value.clone(),
            display_value: display_value(descriptor, value, applied, options, date_format),
        });
    }

    chips
}

fn display_value(
    descriptor: &FilterDescriptor,
    value: &Scalar,
    applied: &BTreeMap<String, Scalar>,
    options: &OptionResolver,
    date_format: &str,
) -> String {
    match descriptor.kind {
        FilterKind::Select => {
            let parent = descriptor
                .parent_name()
                .and_then(|parent| applied.get(parent));
            let cached = options.cached(&descriptor.name, parent);
            let static_list = descriptor.static_options().unwrap_or(&[]);
            find_by_value(cached, value)
                .or_else(|| find_by_value(static_list, value))
                .map(|option| option.label.clone())
                .unwrap_or_else(|| value.to_string())
        }
        FilterKind::Date => format_date(value, date_format),
        FilterKind::Text | FilterKind::Number => value.to_string(),
    }
}

/// Formats ISO dates and RFC 3339 timestamps; anything else, or a bad
/// format string, is shown raw.
pub fn format_date(value: &Scalar, date_format: &str) -> String {
    let raw = value.to_string();
    let date = NaiveDate::parse_from_str(&raw, "%Y-%m-%d")
        .ok()
        .or_else(|| {
            DateTime::parse_from_rfc3339(&raw)
                .ok()
                .map(|timestamp| timestamp.date_naive())
        });
    let Some(date) = date else {
        return raw;
    };
    let mut out = String::new();
    match write!(out, "{}", date.format(date_format)) {
        Ok(()) => out,
        Err(_) => raw,
    }
}
