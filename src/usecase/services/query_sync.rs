use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, NaiveDate};

use crate::domain::entities::option::find_by_raw;
use crate::domain::entities::query::{
    QueryState, SortSpec, LIMIT_KEY, PAGE_KEY, SEARCH_KEY, SORTING_KEY,
};
use crate::domain::entities::value::Scalar;
use crate::usecase::config::screen::{FilterDescriptor, FilterKind};
use crate::usecase::ports::source::LocationStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryDefaults {
    pub limit: u32,
    pub max_limit: u32,
}

impl Default for QueryDefaults {
    fn default() -> Self {
        Self {
            limit: 10,
            max_limit: 100,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    /// Patch keys onto the existing query string.
    Merge,
    /// Drop every existing key first, so removed filters disappear.
    ReplaceAll,
}

/// Key → new value; `None` removes the key.
pub type UrlPatch = Vec<(String, Option<String>)>;

pub fn parse_pairs(query_string: &str) -> Vec<(String, String)> {
    let trimmed = query_string.trim().trim_start_matches('?');
    form_urlencoded::parse(trimmed.as_bytes())
        .map(|(key, value)| (key.into_owned(), value.into_owned()))
        .collect()
}

fn parse_positive(raw: Option<&String>) -> Option<u32> {
    raw.and_then(|value| value.trim().parse::<u32>().ok())
        .filter(|value| *value > 0)
}

fn parse_date(raw: &str) -> Option<Scalar> {
    let valid = NaiveDate::parse_from_str(raw, "%Y-%m-%d").is_ok()
        || DateTime::parse_from_rfc3339(raw).is_ok();
    valid.then(|| Scalar::text(raw))
}

/// Decodes one URL value according to the field's type. `None` means the
/// value is dropped.
pub fn decode_filter_value(descriptor: &FilterDescriptor, raw: &str) -> Option<Scalar> {
    if raw.is_empty() {
        return None;
    }
    match descriptor.kind {
        FilterKind::Text => Some(Scalar::text(raw)),
        FilterKind::Number => Scalar::parse_number(raw),
        FilterKind::Date => parse_date(raw),
        FilterKind::Select => match descriptor.static_options() {
            Some(options) => find_by_raw(options, raw).map(|option| option.value.clone()),
            None => Some(Scalar::text(raw)),
        },
    }
}

/// Builds the query state from a query string. Malformed tokens fall back to
/// defaults; unknown keys and undecodable filter values are dropped.
pub fn read_query(
    query_string: &str,
    filters: &[FilterDescriptor],
    defaults: QueryDefaults,
) -> QueryState {
    let pairs: HashMap<String, String> = parse_pairs(query_string).into_iter().collect();

    let mut query = QueryState::new(defaults.limit);
    query.page = parse_positive(pairs.get(PAGE_KEY)).unwrap_or(1);
    query.limit = parse_positive(pairs.get(LIMIT_KEY))
        .filter(|limit| *limit <= defaults.max_limit.max(1))
        .unwrap_or(defaults.limit.max(1));
    query.sorting = pairs.get(SORTING_KEY).and_then(|token| SortSpec::parse(token));
    query.search = pairs
        .get(SEARCH_KEY)
        .filter(|text| !text.trim().is_empty())
        .cloned();

    for descriptor in filters {
        let Some(raw) = pairs.get(&descriptor.name) else {
            continue;
        };
        match decode_filter_value(descriptor, raw) {
            Some(value) => {
                query.filters.insert(descriptor.name.clone(), value);
            }
            None => {
                tracing::debug!(filter = %descriptor.name, raw = %raw, "dropping undecodable url filter value");
            }
        }
    }

    query
}

/// Applies `patch` to `current` and re-encodes. Existing keys keep their
/// position; empty values are stripped.
pub fn write_query(current: &str, patch: &[(String, Option<String>)], mode: WriteMode) -> String {
    let mut pairs = match mode {
        WriteMode::Merge => parse_pairs(current),
        WriteMode::ReplaceAll => Vec::new(),
    };

    for (key, value) in patch {
        match value {
            Some(value) => match pairs.iter_mut().find(|(existing, _)| existing == key) {
                Some(slot) => slot.1 = value.clone(),
                None => pairs.push((key.clone(), value.clone())),
            },
            None => pairs.retain(|(existing, _)| existing != key),
        }
    }

    let mut serializer = form_urlencoded::Serializer::new(String::new());
    for (key, value) in pairs.iter().filter(|(_, value)| !value.trim().is_empty()) {
        serializer.append_pair(key, value);
    }
    serializer.finish()
}

/// Full-state patch for `query`, used with [`WriteMode::ReplaceAll`].
pub fn full_patch(query: &QueryState) -> UrlPatch {
    query
        .to_pairs()
        .into_iter()
        .map(|(key, value)| (key, Some(value)))
        .collect()
}

/// Page/limit/sort patch, used with [`WriteMode::Merge`].
pub fn paging_patch(query: &QueryState) -> UrlPatch {
    vec![
        (PAGE_KEY.to_string(), Some(query.page.to_string())),
        (LIMIT_KEY.to_string(), Some(query.limit.to_string())),
        (
            SORTING_KEY.to_string(),
            query.sorting.as_ref().map(ToString::to_string),
        ),
    ]
}

/// Sole writer of the location's query string.
#[derive(Clone)]
pub struct QuerySync {
    location: Arc<dyn LocationStore>,
    defaults: QueryDefaults,
}

impl QuerySync {
    pub fn new(location: Arc<dyn LocationStore>, defaults: QueryDefaults) -> Self {
        Self { location, defaults }
    }

    pub fn current(&self) -> String {
        self.location.query_string()
    }

    pub fn read_from_url(&self, filters: &[FilterDescriptor]) -> QueryState {
        read_query(&self.location.query_string(), filters, self.defaults)
    }

    pub fn write_to_url(&self, patch: &[(String, Option<String>)], mode: WriteMode) {
        let next = write_query(&self.location.query_string(), patch, mode);
        tracing::debug!(query = %next, ?mode, "replacing location query string");
        self.location.replace_query_string(&next);
    }
}
