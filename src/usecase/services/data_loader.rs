use std::sync::Arc;

use crate::domain::entities::page::Page;
use crate::domain::entities::query::{QueryState, SortDirection};
use crate::domain::entities::record::Record;
use crate::domain::entities::value::Scalar;
use crate::usecase::config::screen::GridData;
use crate::usecase::ports::source::SourceError;

type FieldFn<T> = fn(&T, &str) -> Option<Scalar>;
type ScalarsFn<T> = fn(&T) -> Vec<Scalar>;

/// Rows held in memory. Field access is captured at construction so the
/// grid itself needs no `Record` bound.
pub struct LocalRows<T> {
    rows: Arc<Vec<T>>,
    field: FieldFn<T>,
    scalars: ScalarsFn<T>,
}

impl<T: Record> LocalRows<T> {
    pub fn new(rows: Vec<T>) -> Self {
        Self {
            rows: Arc::new(rows),
            field: <T as Record>::field,
            scalars: <T as Record>::scalar_fields,
        }
    }
}

impl<T> LocalRows<T> {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    fn matches(&self, row: &T, query: &QueryState) -> bool {
        let search = query.search_text().trim();
        if !search.is_empty() {
            let needle = search.to_lowercase();
            let hit = (self.scalars)(row)
                .iter()
                .any(|value| value.to_string().to_lowercase().contains(&needle));
            if !hit {
                return false;
            }
        }

        query.active_filters().all(|(path, wanted)| {
            let Some(actual) = (self.field)(row, path) else {
                return false;
            };
            match wanted {
                Scalar::Text(text) => actual
                    .to_string()
                    .to_lowercase()
                    .contains(&text.to_lowercase()),
                other => actual.strict_eq(other),
            }
        })
    }

    fn sort_key(&self, row: &T, path: &str) -> String {
        (self.field)(row, path)
            .map(|value| value.to_string())
            .unwrap_or_default()
    }
}

impl<T: Clone> LocalRows<T> {
    /// Filter, then sort, then paginate. Pure in `(rows, query)`.
    pub fn query(&self, query: &QueryState) -> Page<T> {
        let mut matched: Vec<&T> = self
            .rows
            .iter()
            .filter(|row| self.matches(row, query))
            .collect();

        if let Some(sorting) = &query.sorting {
            matched.sort_by(|a, b| {
                let ordering = self
                    .sort_key(a, &sorting.field)
                    .cmp(&self.sort_key(b, &sorting.field));
                match sorting.direction {
                    SortDirection::Asc => ordering,
                    SortDirection::Desc => ordering.reverse(),
                }
            });
        }

        let limit = query.limit.max(1);
        let page = query.page.max(1);
        let total = matched.len() as u64;
        let start = (page as usize - 1).saturating_mul(limit as usize);
        let data = matched
            .into_iter()
            .skip(start)
            .take(limit as usize)
            .cloned()
            .collect();

        Page::new(data, total, page, limit)
    }
}

impl<T> Clone for LocalRows<T> {
    fn clone(&self) -> Self {
        Self {
            rows: Arc::clone(&self.rows),
            field: self.field,
            scalars: self.scalars,
        }
    }
}

/// Single attempt; remote failures are returned to the caller unchanged.
pub fn load<T: Clone>(data: &GridData<T>, query: &QueryState) -> Result<Page<T>, SourceError> {
    match data {
        GridData::Remote(source) => source.fetch(query),
        GridData::Local(rows) => Ok(rows.query(query)),
    }
}
