//! Elm-style state for one grid screen.
//!
//! All screen state lives in [`GridModel`]. User interaction and loader
//! results arrive as [`GridMsg`] values; side effects leave as [`GridCmd`]
//! values returned from [`update`](super::update::update). Nothing in here
//! performs I/O.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::domain::entities::chip::ChipKey;
use crate::domain::entities::page::Page;
use crate::domain::entities::query::{QueryState, SortSpec};
use crate::domain::entities::value::Scalar;
use crate::usecase::config::screen::ScreenConfig;
use crate::usecase::ports::source::SourceError;
use crate::usecase::services::chips::DEFAULT_DATE_FORMAT;
use crate::usecase::services::debounce::{SearchChannel, SearchChannels};
use crate::usecase::services::option_resolver::{
    OptionKey, OptionPayload, OptionRequest, OptionResolver, DEFAULT_OPTION_PAGE_SIZE,
};
use crate::usecase::services::permission_gate::PermissionGate;
use crate::usecase::services::query_sync::{QueryDefaults, UrlPatch, WriteMode};

#[derive(Debug, Clone, PartialEq)]
pub struct EngineSettings {
    pub defaults: QueryDefaults,
    pub option_page_size: u32,
    pub live_search_delay: Duration,
    pub staged_search_delay: Duration,
    pub date_format: String,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            defaults: QueryDefaults::default(),
            option_page_size: DEFAULT_OPTION_PAGE_SIZE,
            live_search_delay: Duration::from_millis(400),
            staged_search_delay: Duration::from_millis(300),
            date_format: DEFAULT_DATE_FORMAT.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    Created,
    Mounted,
    Destroyed,
}

pub struct GridModel<T> {
    pub config: Arc<ScreenConfig<T>>,
    pub settings: EngineSettings,
    pub lifecycle: Lifecycle,

    /// Applied state; mirrors the query string.
    pub query: QueryState,
    /// Draft filter values being edited before apply.
    pub form: BTreeMap<String, Scalar>,
    pub live_search_input: String,
    pub staged_search: String,
    pub initial_values: BTreeMap<String, Scalar>,

    pub rows: Vec<T>,
    pub total_records: u64,
    pub total_pages: u32,
    pub loading: bool,
    pub error: Option<String>,
    /// Sequence number of the latest data request; older responses are dropped.
    pub data_seq: u64,

    pub options: OptionResolver,
    pub permissions: PermissionGate,
    pub search: SearchChannels,
}

impl<T> GridModel<T> {
    pub fn new(config: Arc<ScreenConfig<T>>, settings: EngineSettings) -> Self {
        let query = QueryState::new(settings.defaults.limit);
        let search = SearchChannels::new(settings.live_search_delay, settings.staged_search_delay);
        let options = OptionResolver::new(settings.option_page_size);
        Self {
            config,
            settings,
            lifecycle: Lifecycle::Created,
            query,
            form: BTreeMap::new(),
            live_search_input: String::new(),
            staged_search: String::new(),
            initial_values: BTreeMap::new(),
            rows: Vec::new(),
            total_records: 0,
            total_pages: 1,
            loading: false,
            error: None,
            data_seq: 0,
            options,
            permissions: PermissionGate::new(),
            search,
        }
    }

    pub fn is_mounted(&self) -> bool {
        self.lifecycle == Lifecycle::Mounted
    }
}

pub enum GridMsg<T> {
    /// First render: parse the query string, seed from initial values.
    Mount {
        query_string: String,
        initial_values: BTreeMap<String, Scalar>,
    },
    /// Screen torn down; every later message is ignored.
    Unmount,
    /// The screen configuration was replaced.
    ConfigChanged(Arc<ScreenConfig<T>>),
    PageChanged(u32),
    PageSizeChanged(u32),
    SortChanged(Option<SortSpec>),
    /// Header click: ascending first, then flip.
    SortToggled(String),
    /// Draft edit of one form field; cascades to dependent fields.
    FieldChanged {
        name: String,
        value: Option<Scalar>,
    },
    /// Apply a complete filter value set.
    FilterChanged(BTreeMap<String, Scalar>),
    /// Apply the draft form and the staged search text.
    ApplyStaged,
    ClearFilters,
    SearchInput {
        text: String,
        at: Instant,
    },
    StagedSearchInput {
        text: String,
        at: Instant,
    },
    ClearSearch(SearchChannel),
    /// Debounce clock.
    Tick(Instant),
    SelectSearch {
        field: String,
        text: String,
    },
    SelectScrollToBottom {
        field: String,
    },
    RemoveChip(ChipKey),
    Refresh,
    InitialValuesChanged(BTreeMap<String, Scalar>),
    DataLoaded {
        seq: u64,
        result: Result<Page<T>, SourceError>,
    },
    OptionsLoaded {
        key: OptionKey,
        seq: u64,
        result: Result<OptionPayload, SourceError>,
    },
    PermissionsResolved(Vec<(String, bool)>),
}

/// Side effects for the runtime to execute.
#[derive(Debug, Clone, PartialEq)]
pub enum GridCmd {
    None,
    Batch(Vec<GridCmd>),
    LoadData { seq: u64, query: QueryState },
    LoadOptions(OptionRequest),
    CheckPermissions(Vec<String>),
    WriteUrl { patch: UrlPatch, mode: WriteMode },
    ScheduleWake(Instant),
}

impl GridCmd {
    /// Collapses `None`s and single-element batches.
    pub fn batch(cmds: Vec<GridCmd>) -> GridCmd {
        let mut flat: Vec<GridCmd> = cmds
            .into_iter()
            .filter(|cmd| !matches!(cmd, GridCmd::None))
            .collect();
        match flat.len() {
            0 => GridCmd::None,
            1 => flat.remove(0),
            _ => GridCmd::Batch(flat),
        }
    }

    /// Depth-first list of the leaf commands.
    pub fn flatten(self) -> Vec<GridCmd> {
        match self {
            GridCmd::None => Vec::new(),
            GridCmd::Batch(cmds) => cmds.into_iter().flat_map(GridCmd::flatten).collect(),
            other => vec![other],
        }
    }
}
