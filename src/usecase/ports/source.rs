use serde_json::Value;
use thiserror::Error;

use crate::domain::entities::option::SelectOption;
use crate::domain::entities::page::Page;
use crate::domain::entities::query::QueryState;
use crate::domain::entities::value::Scalar;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SourceError {
    #[error("{0}")]
    Message(String),
}

impl SourceError {
    pub fn message(message: impl Into<String>) -> Self {
        SourceError::Message(message.into())
    }
}

/// Row provider for a grid. Must be free of side effects for identical input.
pub trait DataSource<T>: Send + Sync {
    fn fetch(&self, query: &QueryState) -> Result<Page<T>, SourceError>;
}

impl<T, F> DataSource<T> for F
where
    F: Fn(&QueryState) -> Result<Page<T>, SourceError> + Send + Sync,
{
    fn fetch(&self, query: &QueryState) -> Result<Page<T>, SourceError> {
        self(query)
    }
}

/// Zero-argument option loader, called once per screen configuration.
pub trait OptionLoader: Send + Sync {
    fn load(&self) -> Result<Vec<SelectOption>, SourceError>;
}

impl<F> OptionLoader for F
where
    F: Fn() -> Result<Vec<SelectOption>, SourceError> + Send + Sync,
{
    fn load(&self) -> Result<Vec<SelectOption>, SourceError> {
        self()
    }
}

/// Option loader for a cascading field, called with the parent's value.
pub trait DependentOptionLoader: Send + Sync {
    fn load(&self, parent: &Scalar) -> Result<Vec<SelectOption>, SourceError>;
}

impl<F> DependentOptionLoader for F
where
    F: Fn(&Scalar) -> Result<Vec<SelectOption>, SourceError> + Send + Sync,
{
    fn load(&self, parent: &Scalar) -> Result<Vec<SelectOption>, SourceError> {
        self(parent)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OptionPageQuery {
    pub page: u32,
    pub limit: u32,
    pub filter: Option<String>,
    /// Parent field name and value for cascading paged fields.
    pub parent: Option<(String, Scalar)>,
}

/// Search-as-you-type / infinite-scroll loader. Items are mapped to options
/// with [`SelectOption::from_raw`].
pub trait PagedOptionLoader: Send + Sync {
    fn load_page(&self, query: &OptionPageQuery) -> Result<Page<Value>, SourceError>;
}

impl<F> PagedOptionLoader for F
where
    F: Fn(&OptionPageQuery) -> Result<Page<Value>, SourceError> + Send + Sync,
{
    fn load_page(&self, query: &OptionPageQuery) -> Result<Page<Value>, SourceError> {
        self(query)
    }
}

/// Grants the whole key set or nothing.
pub trait PermissionChecker: Send + Sync {
    fn check(&self, keys: &[String]) -> Result<bool, SourceError>;
}

impl<F> PermissionChecker for F
where
    F: Fn(&[String]) -> Result<bool, SourceError> + Send + Sync,
{
    fn check(&self, keys: &[String]) -> Result<bool, SourceError> {
        self(keys)
    }
}

/// The address bar: the only state outside the screen. Writes replace the
/// current entry; they never add history.
pub trait LocationStore: Send + Sync {
    fn query_string(&self) -> String;
    fn replace_query_string(&self, query: &str);
}
