use std::collections::{BTreeMap, HashMap};

use serde_json::Value;

use crate::domain::entities::option::{OptionCacheEntry, SelectOption};
use crate::domain::entities::page::Page;
use crate::domain::entities::value::Scalar;
use crate::usecase::config::screen::{FilterDescriptor, OptionSource};
use crate::usecase::ports::source::{OptionPageQuery, SourceError};

pub const DEFAULT_OPTION_PAGE_SIZE: u32 = 20;

/// Cache slot: one per field, plus one per parent value for cascading fields.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OptionKey {
    pub field: String,
    pub parent: Option<String>,
}

impl OptionKey {
    pub fn new(field: impl Into<String>, parent: Option<&Scalar>) -> Self {
        Self {
            field: field.into(),
            parent: parent.map(ToString::to_string),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum OptionRequestKind {
    All,
    ForParent(Scalar),
    Page(OptionPageQuery),
}

#[derive(Debug, Clone, PartialEq)]
pub struct OptionRequest {
    pub key: OptionKey,
    pub seq: u64,
    pub kind: OptionRequestKind,
}

#[derive(Debug, Clone, PartialEq)]
pub enum OptionPayload {
    List(Vec<SelectOption>),
    Page(Page<Value>),
}

/// Outcome of planning a resolution for one field.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    /// Options are available synchronously (static list).
    Ready,
    /// A loader call is needed.
    Request(OptionRequest),
    /// Nothing to do: no option source, or a cascading parent is empty.
    Skipped,
}

/// Owns the option cache of one screen.
#[derive(Debug, Default)]
pub struct OptionResolver {
    entries: BTreeMap<OptionKey, OptionCacheEntry>,
    seqs: HashMap<OptionKey, u64>,
    next_seq: u64,
    default_page_size: u32,
}

impl OptionResolver {
    pub fn new(default_page_size: u32) -> Self {
        Self {
            default_page_size: default_page_size.max(1),
            ..Self::default()
        }
    }

    fn page_size_for(&self, descriptor: &FilterDescriptor) -> u32 {
        descriptor.page_size.unwrap_or(self.default_page_size).max(1)
    }

    fn issue(&mut self, key: OptionKey, kind: OptionRequestKind) -> Resolution {
        self.next_seq += 1;
        let seq = self.next_seq;
        self.seqs.insert(key.clone(), seq);
        Resolution::Request(OptionRequest { key, seq, kind })
    }

    /// Plans the first load of a field. `parent` is the parent's current
    /// value for cascading fields.
    pub fn plan(&mut self, descriptor: &FilterDescriptor, parent: Option<&Scalar>) -> Resolution {
        self.plan_page(descriptor, parent, 1, None)
    }

    fn plan_page(
        &mut self,
        descriptor: &FilterDescriptor,
        parent: Option<&Scalar>,
        page: u32,
        search: Option<String>,
    ) -> Resolution {
        let Some(source) = descriptor.options.as_ref() else {
            return Resolution::Skipped;
        };

        let parent = match (descriptor.parent_name(), parent) {
            (Some(_), Some(value)) if !value.is_empty() => Some(value),
            (Some(_), _) => return Resolution::Skipped,
            (None, _) => None,
        };
        let key = OptionKey::new(&descriptor.name, parent);

        match source {
            OptionSource::Static(options) => {
                self.entries
                    .insert(key, OptionCacheEntry::with_options(options.clone()));
                Resolution::Ready
            }
            OptionSource::Loader(_) => {
                self.mark_loading(&key, 0, String::new());
                self.issue(key, OptionRequestKind::All)
            }
            OptionSource::Dependent(_) => match parent {
                Some(value) => {
                    self.mark_loading(&key, 0, String::new());
                    self.issue(key, OptionRequestKind::ForParent(value.clone()))
                }
                None => Resolution::Skipped,
            },
            OptionSource::Paged(_) => {
                let limit = self.page_size_for(descriptor);
                let search_text = search.clone().unwrap_or_default();
                self.mark_loading(&key, limit, search_text);
                let parent_pair = match (descriptor.parent_name(), parent) {
                    (Some(name), Some(value)) => Some((name.to_string(), value.clone())),
                    _ => None,
                };
                let query = OptionPageQuery {
                    page,
                    limit,
                    filter: search.filter(|text| !text.is_empty()),
                    parent: parent_pair,
                };
                self.issue(key, OptionRequestKind::Page(query))
            }
        }
    }

    fn mark_loading(&mut self, key: &OptionKey, page_size: u32, search_text: String) {
        let entry = self.entries.entry(key.clone()).or_default();
        entry.loading = true;
        entry.error = None;
        if page_size > 0 {
            entry.page_size = page_size;
        }
        entry.search_text = search_text;
    }

    /// Restarts a paged field at page one with new search text.
    pub fn plan_search(
        &mut self,
        descriptor: &FilterDescriptor,
        parent: Option<&Scalar>,
        text: &str,
    ) -> Resolution {
        if !descriptor.uses_pagination() {
            return Resolution::Skipped;
        }
        self.plan_page(descriptor, parent, 1, Some(text.to_string()))
    }

    /// Next page of a paged field, if the loader reported more and no load is
    /// in flight.
    pub fn plan_next_page(
        &mut self,
        descriptor: &FilterDescriptor,
        parent: Option<&Scalar>,
    ) -> Resolution {
        if !descriptor.uses_pagination() {
            return Resolution::Skipped;
        }
        let key = OptionKey::new(&descriptor.name, parent.filter(|value| !value.is_empty()));
        let Some(entry) = self.entries.get(&key) else {
            return Resolution::Skipped;
        };
        if !entry.has_more || entry.loading {
            return Resolution::Skipped;
        }
        let next = entry.current_page + 1;
        let search = Some(entry.search_text.clone());
        self.plan_page(descriptor, parent, next, search)
    }

    /// Stores a loader result. Returns `false` when the response is stale.
    pub fn apply(
        &mut self,
        key: &OptionKey,
        seq: u64,
        result: Result<OptionPayload, SourceError>,
    ) -> bool {
        if self.seqs.get(key) != Some(&seq) {
            return false;
        }
        let entry = self.entries.entry(key.clone()).or_default();
        entry.loading = false;

        match result {
            Ok(OptionPayload::List(options)) => {
                entry.total = options.len() as u64;
                entry.options = options;
                entry.current_page = 1;
                entry.has_more = false;
                entry.error = None;
            }
            Ok(OptionPayload::Page(page)) => {
                let mapped = page.data.iter().map(SelectOption::from_raw);
                if page.page <= 1 {
                    entry.options = mapped.collect();
                } else {
                    entry.options.extend(mapped);
                }
                entry.current_page = page.page.max(1);
                entry.total = page.total_records;
                entry.has_more = page.page < page.total_pages;
                entry.error = None;
            }
            Err(err) => {
                tracing::warn!(field = %key.field, error = %err, "option load failed; field degrades to no options");
                entry.options.clear();
                entry.has_more = false;
                entry.error = Some(err.to_string());
            }
        }
        true
    }

    pub fn entry(&self, key: &OptionKey) -> Option<&OptionCacheEntry> {
        self.entries.get(key)
    }

    /// Options cached for `field` (under `parent` for cascading fields).
    pub fn cached(&self, field: &str, parent: Option<&Scalar>) -> &[SelectOption] {
        let key = OptionKey::new(field, parent.filter(|value| !value.is_empty()));
        self.entries
            .get(&key)
            .map(|entry| entry.options.as_slice())
            .unwrap_or(&[])
    }

    pub fn is_loading(&self, field: &str) -> bool {
        self.entries
            .iter()
            .any(|(key, entry)| key.field == field && entry.loading)
    }

    /// Empties every entry of `field` and invalidates its in-flight requests.
    pub fn clear_field(&mut self, field: &str) {
        self.entries.retain(|key, _| key.field != field);
        self.seqs.retain(|key, _| key.field != field);
    }

    pub fn reset(&mut self) {
        self.entries.clear();
        self.seqs.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Calls the loader behind `source` for `request`.
pub fn execute(source: &OptionSource, request: &OptionRequest) -> Result<OptionPayload, SourceError> {
    match (source, &request.kind) {
        (OptionSource::Static(options), _) => Ok(OptionPayload::List(options.clone())),
        (OptionSource::Loader(loader), _) => loader.load().map(OptionPayload::List),
        (OptionSource::Dependent(loader), OptionRequestKind::ForParent(parent)) => {
            loader.load(parent).map(OptionPayload::List)
        }
        (OptionSource::Paged(loader), OptionRequestKind::Page(query)) => {
            loader.load_page(query).map(OptionPayload::Page)
        }
        _ => Err(SourceError::message(format!(
            "option request for {} does not match its source",
            request.key.field
        ))),
    }
}

impl OptionResolver {
    /// Resolves a field synchronously: plans, runs the loader and stores the
    /// result. Failures leave an empty list.
    pub fn resolve(&mut self, descriptor: &FilterDescriptor, parent: Option<&Scalar>) -> Vec<SelectOption> {
        match self.plan(descriptor, parent) {
            Resolution::Ready => self.cached(&descriptor.name, parent).to_vec(),
            Resolution::Skipped => Vec::new(),
            Resolution::Request(request) => {
                let result = match descriptor.options.as_ref() {
                    Some(source) => execute(source, &request),
                    None => Ok(OptionPayload::List(Vec::new())),
                };
                self.apply(&request.key, request.seq, result);
                self.cached(&descriptor.name, parent).to_vec()
            }
        }
    }

    /// Clears and re-resolves a field from page one.
    pub fn refresh(&mut self, descriptor: &FilterDescriptor, parent: Option<&Scalar>) -> Vec<SelectOption> {
        self.clear_field(&descriptor.name);
        self.resolve(descriptor, parent)
    }
}
