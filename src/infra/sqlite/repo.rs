use std::collections::BTreeSet;
use std::path::PathBuf;

use serde_json::{Map, Value};

use crate::domain::entities::option::SelectOption;
use crate::domain::entities::page::Page;
use crate::domain::entities::query::{QueryState, SortDirection};
use crate::domain::entities::value::Scalar;
use crate::infra::sqlite::queries::{
    distinct_values, query_page, CellFilter, CellMatch, CellQuery, DistinctQuery,
};
use crate::usecase::ports::source::{
    DataSource, DependentOptionLoader, OptionPageQuery, PagedOptionLoader, SourceError,
};

/// Cells are stored as text; integers that print back identically come out
/// as numbers, everything else stays text.
pub fn cell_scalar(raw: &str) -> Scalar {
    match raw.parse::<i64>() {
        Ok(int) if int.to_string() == raw => Scalar::Int(int),
        _ => Scalar::text(raw),
    }
}

fn row_to_json(columns: &[String], row: Vec<String>) -> Value {
    let object: Map<String, Value> = columns
        .iter()
        .cloned()
        .zip(row.iter().map(|raw| cell_scalar(raw).to_json()))
        .collect();
    Value::Object(object)
}

/// Grid rows from one imported dataset. Filter names are column names.
///
/// Text values match by substring and typed values exactly. Columns listed in
/// `exact_columns` always match exactly, so a select value still carried as
/// text ("79") does not also hit "179".
#[derive(Debug, Clone)]
pub struct SqliteSource {
    pub db_path: PathBuf,
    pub dataset_id: i64,
    pub exact_columns: BTreeSet<String>,
}

impl SqliteSource {
    pub fn new(db_path: impl Into<PathBuf>, dataset_id: i64) -> Self {
        Self {
            db_path: db_path.into(),
            dataset_id,
            exact_columns: BTreeSet::new(),
        }
    }

    pub fn with_exact_columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.exact_columns.extend(columns.into_iter().map(Into::into));
        self
    }

    fn cell_query(&self, query: &QueryState) -> CellQuery {
        let filters = query
            .active_filters()
            .map(|(column, value)| CellFilter {
                column: column.clone(),
                value: value.to_string(),
                mode: match value {
                    Scalar::Text(_) if !self.exact_columns.contains(column) => CellMatch::Contains,
                    _ => CellMatch::Equals,
                },
            })
            .collect();
        CellQuery {
            search: query.search_text().to_string(),
            filters,
            sort: query.sorting.as_ref().map(|sorting| {
                (
                    sorting.field.clone(),
                    sorting.direction == SortDirection::Desc,
                )
            }),
            page: i64::from(query.page.max(1)),
            limit: i64::from(query.limit.max(1)),
        }
    }
}

impl DataSource<Value> for SqliteSource {
    fn fetch(&self, query: &QueryState) -> Result<Page<Value>, SourceError> {
        let (columns, rows, total_rows) =
            query_page(&self.db_path, self.dataset_id, &self.cell_query(query))
                .map_err(|err| SourceError::Message(err.to_string()))?;
        let data = rows
            .into_iter()
            .map(|row| row_to_json(&columns, row))
            .collect();
        Ok(Page::new(
            data,
            total_rows.max(0) as u64,
            query.page.max(1),
            query.limit.max(1),
        ))
    }
}

/// Searchable, paginated distinct values of one column. Items come out as
/// `{"id": value, "name": label}`.
#[derive(Debug, Clone)]
pub struct SqliteColumnOptions {
    pub db_path: PathBuf,
    pub dataset_id: i64,
    pub value_column: String,
    pub label_column: Option<String>,
    /// Column matched against the parent value for cascading fields.
    pub parent_column: Option<String>,
}

impl SqliteColumnOptions {
    pub fn new(db_path: impl Into<PathBuf>, dataset_id: i64, value_column: impl Into<String>) -> Self {
        Self {
            db_path: db_path.into(),
            dataset_id,
            value_column: value_column.into(),
            label_column: None,
            parent_column: None,
        }
    }

    pub fn with_label(mut self, label_column: impl Into<String>) -> Self {
        self.label_column = Some(label_column.into());
        self
    }

    pub fn with_parent_column(mut self, parent_column: impl Into<String>) -> Self {
        self.parent_column = Some(parent_column.into());
        self
    }
}

impl PagedOptionLoader for SqliteColumnOptions {
    fn load_page(&self, query: &OptionPageQuery) -> Result<Page<Value>, SourceError> {
        let parent = match (&self.parent_column, &query.parent) {
            (Some(column), Some((_, value))) => Some((column.clone(), value.to_string())),
            _ => None,
        };
        let distinct = DistinctQuery {
            value_column: self.value_column.clone(),
            label_column: self.label_column.clone(),
            search: query.filter.clone(),
            parent,
            page: i64::from(query.page.max(1)),
            limit: i64::from(query.limit.max(1)),
        };
        let (values, total) = distinct_values(&self.db_path, self.dataset_id, &distinct)
            .map_err(|err| SourceError::Message(err.to_string()))?;
        let data = values
            .into_iter()
            .map(|(value, label)| {
                serde_json::json!({ "id": cell_scalar(&value).to_json(), "name": label })
            })
            .collect();
        Ok(Page::new(
            data,
            total.max(0) as u64,
            query.page.max(1),
            query.limit.max(1),
        ))
    }
}

/// Every distinct value of `value_column` among rows whose `parent_column`
/// equals the parent value.
#[derive(Debug, Clone)]
pub struct SqliteDependentOptions {
    pub db_path: PathBuf,
    pub dataset_id: i64,
    pub value_column: String,
    pub label_column: Option<String>,
    pub parent_column: String,
}

impl SqliteDependentOptions {
    pub fn new(
        db_path: impl Into<PathBuf>,
        dataset_id: i64,
        value_column: impl Into<String>,
        parent_column: impl Into<String>,
    ) -> Self {
        Self {
            db_path: db_path.into(),
            dataset_id,
            value_column: value_column.into(),
            label_column: None,
            parent_column: parent_column.into(),
        }
    }

    pub fn with_label(mut self, label_column: impl Into<String>) -> Self {
        self.label_column = Some(label_column.into());
        self
    }
}

impl DependentOptionLoader for SqliteDependentOptions {
    fn load(&self, parent: &Scalar) -> Result<Vec<SelectOption>, SourceError> {
        let distinct = DistinctQuery {
            value_column: self.value_column.clone(),
            label_column: self.label_column.clone(),
            search: None,
            parent: Some((self.parent_column.clone(), parent.to_string())),
            page: 1,
            limit: i64::MAX,
        };
        let (values, _) = distinct_values(&self.db_path, self.dataset_id, &distinct)
            .map_err(|err| SourceError::Message(err.to_string()))?;
        Ok(values
            .into_iter()
            .map(|(value, label)| SelectOption::new(label, cell_scalar(&value)))
            .collect())
    }
}
