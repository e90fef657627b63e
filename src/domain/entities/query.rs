use std::collections::BTreeMap;
use std::fmt;

use crate::domain::entities::value::Scalar;

pub const PAGE_KEY: &str = "page";
pub const LIMIT_KEY: &str = "limit";
pub const SORTING_KEY: &str = "sorting";
pub const SEARCH_KEY: &str = "filter";

/// Query-string keys the engine owns; filter descriptors may not reuse them.
pub const RESERVED_KEYS: [&str; 4] = [PAGE_KEY, LIMIT_KEY, SORTING_KEY, SEARCH_KEY];

pub fn is_reserved_key(key: &str) -> bool {
    RESERVED_KEYS.contains(&key)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    /// Anything other than `asc` sorts descending.
    pub fn parse(raw: &str) -> Self {
        if raw.eq_ignore_ascii_case("asc") {
            SortDirection::Asc
        } else {
            SortDirection::Desc
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SortDirection::Asc => "asc",
            SortDirection::Desc => "desc",
        }
    }

    pub fn toggled(self) -> Self {
        match self {
            SortDirection::Asc => SortDirection::Desc,
            SortDirection::Desc => SortDirection::Asc,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortSpec {
    pub field: String,
    pub direction: SortDirection,
}

impl SortSpec {
    pub fn new(field: impl Into<String>, direction: SortDirection) -> Self {
        Self {
            field: field.into(),
            direction,
        }
    }

    /// Parses a `"field direction"` token. A bare field sorts descending, matching
    /// the rule that only an explicit `asc` is ascending.
    pub fn parse(token: &str) -> Option<Self> {
        let mut parts = token.split_whitespace();
        let field = parts.next()?;
        let direction = parts
            .next()
            .map(SortDirection::parse)
            .unwrap_or(SortDirection::Desc);
        if parts.next().is_some() {
            return None;
        }
        Some(Self::new(field, direction))
    }
}

impl fmt::Display for SortSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.field, self.direction.as_str())
    }
}

/// Canonical page/limit/sort/search/filter snapshot. Data sources only ever
/// see a clone of it.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryState {
    pub page: u32,
    pub limit: u32,
    pub sorting: Option<SortSpec>,
    pub search: Option<String>,
    pub filters: BTreeMap<String, Scalar>,
}

impl QueryState {
    pub fn new(limit: u32) -> Self {
        Self {
            page: 1,
            limit: limit.max(1),
            sorting: None,
            search: None,
            filters: BTreeMap::new(),
        }
    }

    pub fn search_text(&self) -> &str {
        self.search.as_deref().unwrap_or("")
    }

    /// Filters with empty values removed, as sent to data sources.
    pub fn active_filters(&self) -> impl Iterator<Item = (&String, &Scalar)> {
        self.filters.iter().filter(|(_, value)| !value.is_empty())
    }

    /// Flat key/value view in query-string order: reserved keys first, then
    /// filters alphabetically. Empty values are stripped.
    pub fn to_pairs(&self) -> Vec<(String, String)> {
        let mut pairs = vec![
            (PAGE_KEY.to_string(), self.page.to_string()),
            (LIMIT_KEY.to_string(), self.limit.to_string()),
        ];
        if let Some(sorting) = &self.sorting {
            pairs.push((SORTING_KEY.to_string(), sorting.to_string()));
        }
        let search = self.search_text().trim();
        if !search.is_empty() {
            pairs.push((SEARCH_KEY.to_string(), search.to_string()));
        }
        for (name, value) in self.active_filters() {
            pairs.push((name.clone(), value.to_string()));
        }
        pairs
    }
}
