//! Command executor for one mounted grid screen.
//!
//! [`GridSession`] owns the model, the location store and the permission
//! checker. Every public operation turns into a [`GridMsg`]; the commands
//! returned by `update` are executed in order and their results are fed
//! back as messages until the queue drains. Loaders are synchronous, like
//! the repository ports the rest of the crate uses; callers that need to
//! keep a UI thread free wrap the calls in `run_blocking`.

use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;
use std::time::Instant;

use crate::domain::entities::chip::{ActiveFilter, ChipKey};
use crate::domain::entities::option::SelectOption;
use crate::domain::entities::query::{QueryState, SortSpec};
use crate::domain::entities::value::Scalar;
use crate::usecase::config::screen::{ActionDef, ColumnDef, ConfigError, ScreenConfig};
use crate::usecase::engine::model::{EngineSettings, GridCmd, GridModel, GridMsg};
use crate::usecase::engine::update::update;
use crate::usecase::ports::source::{LocationStore, PermissionChecker, SourceError};
use crate::usecase::services::cascade;
use crate::usecase::services::chips;
use crate::usecase::services::data_loader;
use crate::usecase::services::debounce::SearchChannel;
use crate::usecase::services::option_resolver::{self, OptionKey, OptionRequest};
use crate::usecase::services::permission_gate::check_permissions;
use crate::usecase::services::query_sync::QuerySync;

pub struct GridSession<T> {
    model: GridModel<T>,
    sync: QuerySync,
    checker: Arc<dyn PermissionChecker>,
    wake: Option<Instant>,
}

impl<T: Clone> GridSession<T> {
    pub fn new(
        config: ScreenConfig<T>,
        settings: EngineSettings,
        location: Arc<dyn LocationStore>,
        checker: Arc<dyn PermissionChecker>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let sync = QuerySync::new(location, settings.defaults);
        Ok(Self {
            model: GridModel::new(Arc::new(config), settings),
            sync,
            checker,
            wake: None,
        })
    }

    /// Reads the current query string, seeds `initial_values` for keys the
    /// URL does not carry, and runs the first loads.
    pub fn mount(&mut self, initial_values: BTreeMap<String, Scalar>) {
        let query_string = self.sync.current();
        self.dispatch(GridMsg::Mount {
            query_string,
            initial_values,
        });
    }

    pub fn unmount(&mut self) {
        self.dispatch(GridMsg::Unmount);
        self.wake = None;
    }

    /// Runs `msg` and every follow-up message to completion.
    pub fn dispatch(&mut self, msg: GridMsg<T>) {
        let mut queue = VecDeque::from([msg]);
        while let Some(msg) = queue.pop_front() {
            let cmd = update(&mut self.model, msg);
            for step in cmd.flatten() {
                queue.extend(self.perform(step));
            }
        }
    }

    /// Executes one leaf command and returns the result messages.
    pub fn perform(&mut self, cmd: GridCmd) -> Vec<GridMsg<T>> {
        match cmd {
            GridCmd::None => Vec::new(),
            GridCmd::Batch(cmds) => cmds.into_iter().flat_map(|cmd| self.perform(cmd)).collect(),
            GridCmd::LoadData { seq, query } => {
                tracing::debug!(seq, page = query.page, limit = query.limit, "loading grid data");
                let result = data_loader::load(&self.model.config.data, &query);
                if let Err(err) = &result {
                    tracing::warn!(seq, error = %err, "grid data load failed");
                }
                vec![GridMsg::DataLoaded { seq, result }]
            }
            GridCmd::LoadOptions(request) => vec![self.load_options(request)],
            GridCmd::CheckPermissions(keys) => {
                tracing::debug!(count = keys.len(), "checking permissions");
                vec![GridMsg::PermissionsResolved(check_permissions(
                    self.checker.as_ref(),
                    &keys,
                ))]
            }
            GridCmd::WriteUrl { patch, mode } => {
                self.sync.write_to_url(&patch, mode);
                Vec::new()
            }
            GridCmd::ScheduleWake(at) => {
                self.wake = Some(match self.wake {
                    Some(existing) if existing > Instant::now() => existing.min(at),
                    _ => at,
                });
                Vec::new()
            }
        }
    }

    fn load_options(&self, request: OptionRequest) -> GridMsg<T> {
        tracing::debug!(field = %request.key.field, seq = request.seq, "loading options");
        let result = match self
            .model
            .config
            .filter(&request.key.field)
            .and_then(|descriptor| descriptor.options.as_ref())
        {
            Some(source) => option_resolver::execute(source, &request),
            None => Err(SourceError::message(format!(
                "no option source for {}",
                request.key.field
            ))),
        };
        GridMsg::OptionsLoaded {
            key: request.key,
            seq: request.seq,
            result,
        }
    }

    /// Earliest pending debounce deadline; the adapter sleeps until then and
    /// calls [`tick`](Self::tick).
    pub fn take_wake(&mut self) -> Option<Instant> {
        self.wake.take()
    }

    pub fn tick(&mut self, now: Instant) {
        self.dispatch(GridMsg::Tick(now));
    }

    pub fn refresh(&mut self) {
        self.dispatch(GridMsg::Refresh);
    }

    pub fn set_config(&mut self, config: ScreenConfig<T>) -> Result<(), ConfigError> {
        config.validate()?;
        self.dispatch(GridMsg::ConfigChanged(Arc::new(config)));
        Ok(())
    }

    pub fn set_initial_values(&mut self, values: BTreeMap<String, Scalar>) {
        self.dispatch(GridMsg::InitialValuesChanged(values));
    }

    pub fn on_page_change(&mut self, page: u32) {
        self.dispatch(GridMsg::PageChanged(page));
    }

    pub fn on_page_size_change(&mut self, limit: u32) {
        self.dispatch(GridMsg::PageSizeChanged(limit));
    }

    pub fn on_sort_change(&mut self, sorting: Option<SortSpec>) {
        self.dispatch(GridMsg::SortChanged(sorting));
    }

    pub fn on_sort_toggle(&mut self, field: impl Into<String>) {
        self.dispatch(GridMsg::SortToggled(field.into()));
    }

    pub fn on_field_change(&mut self, name: impl Into<String>, value: Option<Scalar>) {
        self.dispatch(GridMsg::FieldChanged {
            name: name.into(),
            value,
        });
    }

    pub fn on_filter_change(&mut self, values: BTreeMap<String, Scalar>) {
        self.dispatch(GridMsg::FilterChanged(values));
    }

    pub fn on_apply(&mut self) {
        self.dispatch(GridMsg::ApplyStaged);
    }

    pub fn on_clear_filter(&mut self) {
        self.dispatch(GridMsg::ClearFilters);
    }

    pub fn on_search(&mut self, text: impl Into<String>, at: Instant) {
        self.dispatch(GridMsg::SearchInput {
            text: text.into(),
            at,
        });
    }

    pub fn on_staged_search(&mut self, text: impl Into<String>, at: Instant) {
        self.dispatch(GridMsg::StagedSearchInput {
            text: text.into(),
            at,
        });
    }

    pub fn on_clear_search(&mut self, channel: SearchChannel) {
        self.dispatch(GridMsg::ClearSearch(channel));
    }

    pub fn on_select_search(&mut self, field: impl Into<String>, text: impl Into<String>) {
        self.dispatch(GridMsg::SelectSearch {
            field: field.into(),
            text: text.into(),
        });
    }

    pub fn on_select_scroll_to_bottom(&mut self, field: impl Into<String>) {
        self.dispatch(GridMsg::SelectScrollToBottom {
            field: field.into(),
        });
    }

    pub fn remove_chip(&mut self, key: ChipKey) {
        self.dispatch(GridMsg::RemoveChip(key));
    }
}

impl<T> GridSession<T> {
    pub fn model(&self) -> &GridModel<T> {
        &self.model
    }

    pub fn query(&self) -> &QueryState {
        &self.model.query
    }

    pub fn rows(&self) -> &[T] {
        &self.model.rows
    }

    pub fn is_loading(&self) -> bool {
        self.model.loading
    }

    pub fn error(&self) -> Option<&str> {
        self.model.error.as_deref()
    }

    pub fn form_value(&self, name: &str) -> Option<&Scalar> {
        self.model.form.get(name)
    }

    pub fn chips(&self) -> Vec<ActiveFilter> {
        chips::project(
            &self.model.config.filters,
            &self.model.query.filters,
            self.model.query.search_text(),
            &self.model.options,
            &self.model.settings.date_format,
        )
    }

    /// Options for a form field, keyed by the parent's draft value.
    pub fn options_for(&self, field: &str) -> &[SelectOption] {
        let parent = self
            .model
            .config
            .filter(field)
            .and_then(|descriptor| descriptor.parent_name())
            .and_then(|parent| self.model.form.get(parent));
        self.model.options.cached(field, parent)
    }

    pub fn is_options_loading(&self, field: &str) -> bool {
        self.model.options.is_loading(field)
    }

    /// Whether a paged field can load another page under its current parent.
    pub fn has_more_options(&self, field: &str) -> bool {
        let parent = self
            .model
            .config
            .filter(field)
            .and_then(|descriptor| descriptor.parent_name())
            .and_then(|parent| self.model.form.get(parent));
        self.model
            .options
            .entry(&OptionKey::new(field, parent))
            .is_some_and(|entry| entry.has_more)
    }

    pub fn is_field_enabled(&self, field: &str) -> bool {
        self.model
            .config
            .filter(field)
            .is_some_and(|descriptor| cascade::is_enabled(descriptor, &self.model.form))
    }

    pub fn visible_columns(&self) -> Vec<&ColumnDef> {
        self.model
            .config
            .columns
            .iter()
            .filter(|column| self.model.permissions.is_column_visible(column))
            .collect()
    }

    pub fn visible_actions(&self, row: &T) -> Vec<&ActionDef<T>> {
        self.model
            .config
            .actions
            .iter()
            .filter(|action| self.model.permissions.is_action_visible(action, Some(row)))
            .collect()
    }
}

impl<T> Drop for GridSession<T> {
    fn drop(&mut self) {
        if self.model.is_mounted() {
            update(&mut self.model, GridMsg::Unmount);
            tracing::info!("grid session released");
        }
    }
}
