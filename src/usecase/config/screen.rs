use std::fmt;
use std::sync::Arc;

use thiserror::Error;

use crate::domain::entities::option::SelectOption;
use crate::domain::entities::query::is_reserved_key;
use crate::usecase::ports::source::{
    DataSource, DependentOptionLoader, OptionLoader, PagedOptionLoader,
};
use crate::usecase::services::data_loader::LocalRows;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterKind {
    Text,
    Select,
    Date,
    Number,
}

/// Where a select field's choices come from, decided once at configuration
/// time.
#[derive(Clone)]
pub enum OptionSource {
    Static(Vec<SelectOption>),
    Loader(Arc<dyn OptionLoader>),
    Dependent(Arc<dyn DependentOptionLoader>),
    Paged(Arc<dyn PagedOptionLoader>),
}

impl OptionSource {
    pub fn is_paged(&self) -> bool {
        matches!(self, OptionSource::Paged(_))
    }

    pub fn static_options(&self) -> Option<&[SelectOption]> {
        match self {
            OptionSource::Static(options) => Some(options),
            _ => None,
        }
    }
}

impl fmt::Debug for OptionSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OptionSource::Static(options) => f.debug_tuple("Static").field(options).finish(),
            OptionSource::Loader(_) => f.write_str("Loader(..)"),
            OptionSource::Dependent(_) => f.write_str("Dependent(..)"),
            OptionSource::Paged(_) => f.write_str("Paged(..)"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParentRef {
    pub filter_name: String,
}

#[derive(Debug, Clone)]
pub struct FilterDescriptor {
    pub kind: FilterKind,
    pub name: String,
    pub label: String,
    pub options: Option<OptionSource>,
    pub parent: Option<ParentRef>,
    pub page_size: Option<u32>,
}

impl FilterDescriptor {
    pub fn new(kind: FilterKind, name: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
            label: label.into(),
            options: None,
            parent: None,
            page_size: None,
        }
    }

    pub fn text(name: impl Into<String>, label: impl Into<String>) -> Self {
        Self::new(FilterKind::Text, name, label)
    }

    pub fn select(name: impl Into<String>, label: impl Into<String>, options: OptionSource) -> Self {
        Self::new(FilterKind::Select, name, label).with_options(options)
    }

    pub fn with_options(mut self, options: OptionSource) -> Self {
        self.options = Some(options);
        self
    }

    pub fn with_parent(mut self, filter_name: impl Into<String>) -> Self {
        self.parent = Some(ParentRef {
            filter_name: filter_name.into(),
        });
        self
    }

    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = Some(page_size);
        self
    }

    pub fn uses_pagination(&self) -> bool {
        self.options.as_ref().is_some_and(OptionSource::is_paged)
    }

    pub fn parent_name(&self) -> Option<&str> {
        self.parent.as_ref().map(|parent| parent.filter_name.as_str())
    }

    pub fn static_options(&self) -> Option<&[SelectOption]> {
        self.options.as_ref().and_then(OptionSource::static_options)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDef {
    pub key: String,
    pub label: String,
    pub sortable: bool,
    pub permission: Option<String>,
}

impl ColumnDef {
    pub fn new(key: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            label: label.into(),
            sortable: true,
            permission: None,
        }
    }

    pub fn unsortable(mut self) -> Self {
        self.sortable = false;
        self
    }

    pub fn with_permission(mut self, permission: impl Into<String>) -> Self {
        self.permission = Some(permission.into());
        self
    }
}

pub type RowPredicate<T> = Arc<dyn Fn(&T) -> bool + Send + Sync>;

pub struct ActionDef<T> {
    pub key: String,
    pub label: String,
    pub permission: Option<String>,
    pub visible: Option<RowPredicate<T>>,
}

impl<T> ActionDef<T> {
    pub fn new(key: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            label: label.into(),
            permission: None,
            visible: None,
        }
    }

    pub fn with_permission(mut self, permission: impl Into<String>) -> Self {
        self.permission = Some(permission.into());
        self
    }

    pub fn visible_when(mut self, predicate: impl Fn(&T) -> bool + Send + Sync + 'static) -> Self {
        self.visible = Some(Arc::new(predicate));
        self
    }
}

impl<T> Clone for ActionDef<T> {
    fn clone(&self) -> Self {
        Self {
            key: self.key.clone(),
            label: self.label.clone(),
            permission: self.permission.clone(),
            visible: self.visible.clone(),
        }
    }
}

impl<T> fmt::Debug for ActionDef<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActionDef")
            .field("key", &self.key)
            .field("label", &self.label)
            .field("permission", &self.permission)
            .field("visible", &self.visible.is_some())
            .finish()
    }
}

/// Row source for a screen: a remote function or rows held in memory.
pub enum GridData<T> {
    Remote(Arc<dyn DataSource<T>>),
    Local(LocalRows<T>),
}

impl<T> Clone for GridData<T> {
    fn clone(&self) -> Self {
        match self {
            GridData::Remote(source) => GridData::Remote(Arc::clone(source)),
            GridData::Local(rows) => GridData::Local(rows.clone()),
        }
    }
}

impl<T> fmt::Debug for GridData<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GridData::Remote(_) => f.write_str("Remote(..)"),
            GridData::Local(rows) => write!(f, "Local({} rows)", rows.len()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("duplicate filter name: {0}")]
    DuplicateFilter(String),
    #[error("filter name is reserved by the query string: {0}")]
    ReservedFilterName(String),
    #[error("filter {filter} depends on unknown parent {parent}")]
    UnknownParent { filter: String, parent: String },
    #[error("filter {0} cannot be its own parent")]
    SelfParent(String),
}

/// Declarative configuration for one screen.
#[derive(Debug)]
pub struct ScreenConfig<T> {
    pub filters: Vec<FilterDescriptor>,
    pub columns: Vec<ColumnDef>,
    pub actions: Vec<ActionDef<T>>,
    pub data: GridData<T>,
}

impl<T> Clone for ScreenConfig<T> {
    fn clone(&self) -> Self {
        Self {
            filters: self.filters.clone(),
            columns: self.columns.clone(),
            actions: self.actions.clone(),
            data: self.data.clone(),
        }
    }
}

impl<T> ScreenConfig<T> {
    pub fn new(data: GridData<T>) -> Self {
        Self {
            filters: Vec::new(),
            columns: Vec::new(),
            actions: Vec::new(),
            data,
        }
    }

    pub fn with_filter(mut self, filter: FilterDescriptor) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn with_column(mut self, column: ColumnDef) -> Self {
        self.columns.push(column);
        self
    }

    pub fn with_action(mut self, action: ActionDef<T>) -> Self {
        self.actions.push(action);
        self
    }

    pub fn filter(&self, name: &str) -> Option<&FilterDescriptor> {
        self.filters.iter().find(|filter| filter.name == name)
    }

    /// Fields that name `parent` as their cascading parent.
    pub fn children_of<'a>(&'a self, parent: &'a str) -> impl Iterator<Item = &'a FilterDescriptor> {
        self.filters
            .iter()
            .filter(move |filter| filter.parent_name() == Some(parent))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for (idx, filter) in self.filters.iter().enumerate() {
            if is_reserved_key(&filter.name) {
                return Err(ConfigError::ReservedFilterName(filter.name.clone()));
            }
            if self.filters[..idx].iter().any(|other| other.name == filter.name) {
                return Err(ConfigError::DuplicateFilter(filter.name.clone()));
            }
            if let Some(parent) = filter.parent_name() {
                if parent == filter.name {
                    return Err(ConfigError::SelfParent(filter.name.clone()));
                }
                if self.filter(parent).is_none() {
                    return Err(ConfigError::UnknownParent {
                        filter: filter.name.clone(),
                        parent: parent.to_string(),
                    });
                }
            }
        }
        Ok(())
    }
}
