//! Pure update function for a grid screen.
//!
//! `update()` applies a message to the model and returns the commands the
//! runtime should execute. No I/O happens here.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::domain::entities::chip::ChipKey;
use crate::domain::entities::option::find_by_value;
use crate::domain::entities::query::{SortDirection, SortSpec};
use crate::domain::entities::value::Scalar;
use crate::usecase::engine::model::{GridCmd, GridModel, GridMsg, Lifecycle};
use crate::usecase::services::cascade;
use crate::usecase::services::debounce::SearchChannel;
use crate::usecase::services::option_resolver::{OptionKey, OptionRequest, Resolution};
use crate::usecase::services::query_sync::{full_patch, paging_patch, read_query, WriteMode};

pub fn update<T>(model: &mut GridModel<T>, msg: GridMsg<T>) -> GridCmd {
    match model.lifecycle {
        Lifecycle::Destroyed => return GridCmd::None,
        Lifecycle::Created if !matches!(msg, GridMsg::Mount { .. } | GridMsg::Unmount) => {
            return GridCmd::None;
        }
        _ => {}
    }

    match msg {
        GridMsg::Mount {
            query_string,
            initial_values,
        } => mount(model, &query_string, initial_values),

        GridMsg::Unmount => {
            model.lifecycle = Lifecycle::Destroyed;
            model.search.cancel();
            model.options.reset();
            model.permissions.clear();
            model.rows.clear();
            model.loading = false;
            GridCmd::None
        }

        GridMsg::ConfigChanged(config) => {
            if Arc::ptr_eq(&model.config, &config) {
                return GridCmd::None;
            }
            model.config = config;
            let known = |name: &String| model.config.filter(name).is_some();
            model.form.retain(|name, _| known(name));
            model.query.filters.retain(|name, _| known(name));
            model.options.reset();
            let mut cmds = vec![precompute_permissions(model)];
            cmds.extend(plan_all_options(model));
            cmds.push(load_data(model));
            GridCmd::batch(cmds)
        }

        GridMsg::PageChanged(page) => {
            let page = page.max(1);
            if page == model.query.page {
                return GridCmd::None;
            }
            model.query.page = page;
            paging_changed(model)
        }

        GridMsg::PageSizeChanged(limit) => {
            let limit = limit.clamp(1, model.settings.defaults.max_limit.max(1));
            if limit == model.query.limit {
                return GridCmd::None;
            }
            model.query.limit = limit;
            model.query.page = 1;
            paging_changed(model)
        }

        GridMsg::SortChanged(sorting) => {
            if sorting == model.query.sorting {
                return GridCmd::None;
            }
            model.query.sorting = sorting;
            model.query.page = 1;
            paging_changed(model)
        }

        GridMsg::SortToggled(field) => {
            let next = match &model.query.sorting {
                Some(current) if current.field == field => {
                    SortSpec::new(field, current.direction.toggled())
                }
                _ => SortSpec::new(field, SortDirection::Asc),
            };
            model.query.sorting = Some(next);
            model.query.page = 1;
            paging_changed(model)
        }

        GridMsg::FieldChanged { name, value } => {
            if model.config.filter(&name).is_none() {
                return GridCmd::None;
            }
            let value = value.filter(|value| !value.is_empty());
            if model.form.get(&name) == value.as_ref() {
                return GridCmd::None;
            }
            match &value {
                Some(value) => model.form.insert(name.clone(), value.clone()),
                None => model.form.remove(&name),
            };
            let config = Arc::clone(&model.config);
            let requests = cascade::on_parent_changed(
                &config.filters,
                &name,
                value.as_ref(),
                &mut model.form,
                &mut model.options,
            );
            option_cmds(requests)
        }

        GridMsg::FilterChanged(values) => apply_filters(model, values),

        GridMsg::ApplyStaged => {
            if let Some(text) = model.search.staged.flush() {
                model.staged_search = text;
            }
            let staged = model.staged_search.trim().to_string();
            model.query.search = (!staged.is_empty()).then_some(staged.clone());
            model.search.live.settle(staged.clone());
            model.live_search_input = staged;
            let values = model.form.clone();
            apply_filters(model, values)
        }

        GridMsg::ClearFilters => {
            let config = Arc::clone(&model.config);
            let parents: Vec<String> = config
                .filters
                .iter()
                .filter_map(|filter| filter.parent_name().map(str::to_string))
                .collect();
            for parent in parents {
                cascade::on_parent_changed(
                    &config.filters,
                    &parent,
                    None,
                    &mut model.form,
                    &mut model.options,
                );
            }
            model.form.clear();
            model.query.filters.clear();
            reset_search(model);
            model.query.page = 1;
            filters_changed(model)
        }

        GridMsg::SearchInput { text, at } => {
            model.live_search_input = text.clone();
            if text.trim().is_empty() {
                return clear_search(model, SearchChannel::Live);
            }
            GridCmd::ScheduleWake(model.search.live.push(text.trim(), at))
        }

        GridMsg::StagedSearchInput { text, at } => {
            if text.trim().is_empty() {
                return clear_search(model, SearchChannel::Staged);
            }
            GridCmd::ScheduleWake(model.search.staged.push(text.trim(), at))
        }

        GridMsg::ClearSearch(channel) => clear_search(model, channel),

        GridMsg::Tick(now) => {
            let mut cmds = Vec::new();
            if let Some(text) = model.search.staged.poll(now) {
                model.staged_search = text;
            }
            if let Some(text) = model.search.live.poll(now) {
                if model.query.search.as_deref() != Some(text.as_str()) {
                    model.query.search = Some(text);
                    model.query.page = 1;
                    cmds.push(filters_changed(model));
                }
            }
            if let Some(deadline) = model.search.next_deadline() {
                cmds.push(GridCmd::ScheduleWake(deadline));
            }
            GridCmd::batch(cmds)
        }

        GridMsg::SelectSearch { field, text } => {
            let config = Arc::clone(&model.config);
            let Some(descriptor) = config.filter(&field) else {
                return GridCmd::None;
            };
            let parent = parent_value(&model.form, descriptor.parent_name());
            resolution_cmd(model.options.plan_search(descriptor, parent.as_ref(), &text))
        }

        GridMsg::SelectScrollToBottom { field } => {
            let config = Arc::clone(&model.config);
            let Some(descriptor) = config.filter(&field) else {
                return GridCmd::None;
            };
            let parent = parent_value(&model.form, descriptor.parent_name());
            resolution_cmd(model.options.plan_next_page(descriptor, parent.as_ref()))
        }

        GridMsg::RemoveChip(ChipKey::Search) => {
            if model.query.search.is_none() {
                return GridCmd::None;
            }
            reset_search(model);
            model.query.page = 1;
            filters_changed(model)
        }

        GridMsg::RemoveChip(ChipKey::Filter(name)) => {
            if model.query.filters.remove(&name).is_none() {
                return GridCmd::None;
            }
            model.form.remove(&name);
            let config = Arc::clone(&model.config);
            for child in cascade::dependents_of(&config.filters, &name) {
                model.query.filters.remove(&child.name);
            }
            let requests = cascade::on_parent_changed(
                &config.filters,
                &name,
                None,
                &mut model.form,
                &mut model.options,
            );
            model.query.page = 1;
            let mut cmds = option_cmds(requests).flatten();
            cmds.push(filters_changed(model));
            GridCmd::batch(cmds)
        }

        GridMsg::Refresh => load_data(model),

        GridMsg::InitialValuesChanged(values) => {
            if values == model.initial_values {
                return GridCmd::None;
            }
            model.initial_values = values.clone();
            let values: BTreeMap<String, Scalar> = values
                .into_iter()
                .filter(|(name, value)| model.config.filter(name).is_some() && !value.is_empty())
                .collect();
            model.form = values.clone();
            apply_filters(model, values)
        }

        GridMsg::DataLoaded { seq, result } => {
            if seq != model.data_seq {
                tracing::debug!(seq, latest = model.data_seq, "discarding stale data response");
                return GridCmd::None;
            }
            model.loading = false;
            match result {
                Ok(page) => {
                    model.total_records = page.total_records;
                    model.total_pages = page.total_pages.max(1);
                    model.rows = page.data;
                    model.error = None;
                }
                Err(err) => {
                    model.rows.clear();
                    model.total_records = 0;
                    model.total_pages = 1;
                    model.error = Some(err.to_string());
                }
            }
            GridCmd::None
        }

        GridMsg::OptionsLoaded { key, seq, result } => {
            if model.options.apply(&key, seq, result) {
                retype_select_value(model, &key.field);
            }
            GridCmd::None
        }

        GridMsg::PermissionsResolved(results) => {
            for (permission, granted) in results {
                model.permissions.resolve(&permission, granted);
            }
            GridCmd::None
        }
    }
}

fn mount<T>(
    model: &mut GridModel<T>,
    query_string: &str,
    initial_values: BTreeMap<String, Scalar>,
) -> GridCmd {
    if model.is_mounted() {
        return GridCmd::None;
    }
    let mut query = read_query(query_string, &model.config.filters, model.settings.defaults);

    let mut seeded = false;
    for (name, value) in &initial_values {
        if value.is_empty() || model.config.filter(name).is_none() {
            continue;
        }
        if !query.filters.contains_key(name) {
            query.filters.insert(name.clone(), value.clone());
            seeded = true;
        }
    }

    let search = query.search.clone().unwrap_or_default();
    model.search.live.settle(search.clone());
    model.search.staged.settle(search.clone());
    model.live_search_input = search.clone();
    model.staged_search = search;
    model.form = query.filters.clone();
    model.query = query;
    model.initial_values = initial_values;
    model.lifecycle = Lifecycle::Mounted;

    tracing::info!(query = ?model.query, "grid mounted");

    let mut cmds = vec![precompute_permissions(model)];
    cmds.extend(plan_all_options(model));
    if seeded {
        cmds.push(write_full(model));
    }
    cmds.push(load_data(model));
    GridCmd::batch(cmds)
}

fn load_data<T>(model: &mut GridModel<T>) -> GridCmd {
    model.data_seq += 1;
    model.loading = true;
    GridCmd::LoadData {
        seq: model.data_seq,
        query: model.query.clone(),
    }
}

fn write_full<T>(model: &GridModel<T>) -> GridCmd {
    GridCmd::WriteUrl {
        patch: full_patch(&model.query),
        mode: WriteMode::ReplaceAll,
    }
}

/// Page, limit or sort changed: merge into the URL and reload.
fn paging_changed<T>(model: &mut GridModel<T>) -> GridCmd {
    let write = GridCmd::WriteUrl {
        patch: paging_patch(&model.query),
        mode: WriteMode::Merge,
    };
    GridCmd::batch(vec![write, load_data(model)])
}

/// Filter or search set changed: replace the URL state and reload.
fn filters_changed<T>(model: &mut GridModel<T>) -> GridCmd {
    let write = write_full(model);
    GridCmd::batch(vec![write, load_data(model)])
}

fn apply_filters<T>(model: &mut GridModel<T>, values: BTreeMap<String, Scalar>) -> GridCmd {
    let config = Arc::clone(&model.config);
    let mut next: BTreeMap<String, Scalar> = values
        .into_iter()
        .filter(|(name, value)| config.filter(name).is_some() && !value.is_empty())
        .collect();
    cascade::prune_dependents(&config.filters, &mut next, &model.options);

    let mut requests = Vec::new();
    for descriptor in &config.filters {
        let Some(parent) = parent_value(&next, descriptor.parent_name()) else {
            continue;
        };
        let key = OptionKey::new(&descriptor.name, Some(&parent));
        if model.options.entry(&key).is_some() {
            continue;
        }
        if let Resolution::Request(request) = model.options.plan(descriptor, Some(&parent)) {
            requests.push(request);
        }
    }

    model.form = next.clone();
    model.query.filters = next;
    model.query.page = 1;

    let mut cmds = option_cmds(requests).flatten();
    cmds.push(filters_changed(model));
    GridCmd::batch(cmds)
}

fn reset_search<T>(model: &mut GridModel<T>) {
    model.query.search = None;
    model.staged_search.clear();
    model.live_search_input.clear();
    model.search.live.settle("");
    model.search.staged.settle("");
}

/// Either channel clears both the staged and applied text; only the live
/// channel reloads.
fn clear_search<T>(model: &mut GridModel<T>, channel: SearchChannel) -> GridCmd {
    let had_search = model.query.search.is_some();
    reset_search(model);
    match channel {
        SearchChannel::Live if had_search => {
            model.query.page = 1;
            filters_changed(model)
        }
        SearchChannel::Live => GridCmd::None,
        SearchChannel::Staged if had_search => write_full(model),
        SearchChannel::Staged => GridCmd::None,
    }
}

fn precompute_permissions<T>(model: &mut GridModel<T>) -> GridCmd {
    let config = Arc::clone(&model.config);
    let keys = model.permissions.precompute(&config.columns, &config.actions);
    if keys.is_empty() {
        GridCmd::None
    } else {
        GridCmd::CheckPermissions(keys)
    }
}

fn parent_value(values: &BTreeMap<String, Scalar>, parent: Option<&str>) -> Option<Scalar> {
    parent.and_then(|name| values.get(name)).cloned()
}

/// Plans the first option load of every field. Cascading fields with an
/// empty parent are skipped.
fn plan_all_options<T>(model: &mut GridModel<T>) -> Vec<GridCmd> {
    let config = Arc::clone(&model.config);
    config
        .filters
        .iter()
        .map(|descriptor| {
            let parent = parent_value(&model.form, descriptor.parent_name());
            resolution_cmd(model.options.plan(descriptor, parent.as_ref()))
        })
        .filter(|cmd| !matches!(cmd, GridCmd::None))
        .collect()
}

fn resolution_cmd(resolution: Resolution) -> GridCmd {
    match resolution {
        Resolution::Request(request) => GridCmd::LoadOptions(request),
        Resolution::Ready | Resolution::Skipped => GridCmd::None,
    }
}

fn option_cmds(requests: Vec<OptionRequest>) -> GridCmd {
    GridCmd::batch(requests.into_iter().map(GridCmd::LoadOptions).collect())
}

/// A select value recovered from the URL as text takes the type of the
/// matching option once options arrive. Never triggers a reload.
fn retype_select_value<T>(model: &mut GridModel<T>, field: &str) {
    let Some(descriptor) = model.config.filter(field) else {
        return;
    };
    let parent = parent_value(&model.query.filters, descriptor.parent_name());
    let Some(current) = model.query.filters.get(field) else {
        return;
    };
    if current.as_text().is_none() {
        return;
    }
    let typed = find_by_value(model.options.cached(field, parent.as_ref()), current)
        .map(|option| option.value.clone());
    if let Some(typed) = typed.filter(|typed| typed != current) {
        if model.form.get(field) == Some(current) {
            model.form.insert(field.to_string(), typed.clone());
        }
        model.query.filters.insert(field.to_string(), typed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::{Duration, Instant};

    use serde_json::{json, Value};

    use crate::domain::entities::option::SelectOption;
    use crate::domain::entities::page::Page;
    use crate::usecase::config::screen::{
        ColumnDef, FilterDescriptor, GridData, OptionSource, ScreenConfig,
    };
    use crate::usecase::engine::model::EngineSettings;
    use crate::usecase::ports::source::SourceError;
    use crate::usecase::services::data_loader::LocalRows;

    fn rows() -> Vec<Value> {
        vec![json!({"id": 1, "name": "b"}), json!({"id": 2, "name": "a"})]
    }

    fn config(calls: Arc<AtomicUsize>) -> ScreenConfig<Value> {
        let wards = move |parent: &Scalar| -> Result<Vec<SelectOption>, SourceError> {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(vec![SelectOption::new(format!("Ward of {parent}"), 10)])
        };
        ScreenConfig::new(GridData::Local(LocalRows::new(rows())))
            .with_filter(FilterDescriptor::select(
                "category",
                "Category",
                OptionSource::Static(vec![
                    SelectOption::new("Books", 1),
                    SelectOption::new("Games", 2),
                ]),
            ))
            .with_filter(
                FilterDescriptor::select("item", "Item", OptionSource::Dependent(Arc::new(wards)))
                    .with_parent("category"),
            )
            .with_filter(FilterDescriptor::text("name", "Name"))
            .with_column(ColumnDef::new("name", "Name"))
            .with_column(ColumnDef::new("secret", "Secret").with_permission("rows.secret"))
    }

    fn mounted(query_string: &str) -> (GridModel<Value>, GridCmd, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut model = GridModel::new(Arc::new(config(calls.clone())), EngineSettings::default());
        let cmd = update(
            &mut model,
            GridMsg::Mount {
                query_string: query_string.to_string(),
                initial_values: BTreeMap::new(),
            },
        );
        (model, cmd, calls)
    }

    fn loads(cmd: &GridCmd) -> usize {
        cmd.clone()
            .flatten()
            .iter()
            .filter(|cmd| matches!(cmd, GridCmd::LoadData { .. }))
            .count()
    }

    fn option_requests(cmd: &GridCmd) -> Vec<OptionRequest> {
        cmd.clone()
            .flatten()
            .into_iter()
            .filter_map(|cmd| match cmd {
                GridCmd::LoadOptions(request) => Some(request),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn mount_reads_url_and_issues_one_load() {
        let (model, cmd, _) = mounted("?category=1&filter=abc&page=2");

        assert_eq!(model.query.page, 2);
        assert_eq!(model.query.search.as_deref(), Some("abc"));
        assert_eq!(model.query.filters.get("category"), Some(&Scalar::Int(1)));
        assert_eq!(loads(&cmd), 1);
        let steps = cmd.flatten();
        assert!(steps.contains(&GridCmd::CheckPermissions(vec!["rows.secret".to_string()])));
        assert!(!steps.iter().any(|step| matches!(step, GridCmd::WriteUrl { .. })));
    }

    #[test]
    fn messages_before_mount_are_ignored() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut model = GridModel::new(Arc::new(config(calls)), EngineSettings::default());
        assert_eq!(update(&mut model, GridMsg::Refresh), GridCmd::None);
        assert_eq!(update(&mut model, GridMsg::PageChanged(3)), GridCmd::None);
        assert_eq!(model.query.page, 1);
    }

    #[test]
    fn removing_search_chip_keeps_filters_and_loads_once() {
        let (mut model, _, _) = mounted("?category=2&name=x&filter=abc");

        let cmd = update(&mut model, GridMsg::RemoveChip(ChipKey::Search));

        assert_eq!(model.query.search, None);
        assert_eq!(model.query.filters.get("category"), Some(&Scalar::Int(2)));
        assert_eq!(model.query.filters.get("name"), Some(&Scalar::text("x")));
        assert_eq!(loads(&cmd), 1);
    }

    #[test]
    fn child_without_parent_value_never_loads_options() {
        let (mut model, cmd, calls) = mounted("");
        assert!(option_requests(&cmd).is_empty());

        let cmd = update(
            &mut model,
            GridMsg::FieldChanged {
                name: "name".to_string(),
                value: Some(Scalar::text("x")),
            },
        );
        assert!(option_requests(&cmd).is_empty());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn parent_change_clears_child_before_requesting() {
        let (mut model, _, _) = mounted("?category=1&item=10");
        assert_eq!(model.form.get("item"), Some(&Scalar::text("10")));

        let cmd = update(
            &mut model,
            GridMsg::FieldChanged {
                name: "category".to_string(),
                value: Some(Scalar::Int(2)),
            },
        );

        assert!(!model.form.contains_key("item"));
        let requests = option_requests(&cmd);
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].key, OptionKey::new("item", Some(&Scalar::Int(2))));
        assert_eq!(loads(&cmd), 0);
    }

    #[test]
    fn apply_keeps_child_picked_after_parent() {
        let (mut model, _, _) = mounted("");
        let picks = [("category", Scalar::Int(2)), ("item", Scalar::Int(20))];
        let mut requested = Vec::new();
        for (name, value) in picks {
            let cmd = update(
                &mut model,
                GridMsg::FieldChanged {
                    name: name.to_string(),
                    value: Some(value),
                },
            );
            requested.extend(option_requests(&cmd));
        }
        assert_eq!(requested.len(), 1);

        let cmd = update(&mut model, GridMsg::ApplyStaged);

        assert_eq!(model.query.filters.get("category"), Some(&Scalar::Int(2)));
        assert_eq!(model.query.filters.get("item"), Some(&Scalar::Int(20)));
        assert_eq!(model.form, model.query.filters);
        assert!(option_requests(&cmd).is_empty());
        assert_eq!(loads(&cmd), 1);
    }

    #[test]
    fn filter_change_with_new_parent_keeps_submitted_child() {
        let (mut model, _, _) = mounted("?category=1&item=10");
        let values = BTreeMap::from([
            ("category".to_string(), Scalar::Int(2)),
            ("item".to_string(), Scalar::Int(20)),
        ]);

        let cmd = update(&mut model, GridMsg::FilterChanged(values.clone()));

        assert_eq!(model.query.filters, values);
        let requests = option_requests(&cmd);
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].key, OptionKey::new("item", Some(&Scalar::Int(2))));
        assert_eq!(loads(&cmd), 1);
    }

    #[test]
    fn filter_change_drops_child_without_parent() {
        let (mut model, _, _) = mounted("?category=1&item=10");
        let values = BTreeMap::from([("item".to_string(), Scalar::Int(10))]);

        update(&mut model, GridMsg::FilterChanged(values));

        assert!(model.query.filters.is_empty());
        assert!(model.form.is_empty());
    }

    #[test]
    fn stale_data_response_is_discarded() {
        let (mut model, first, _) = mounted("");
        let GridCmd::LoadData { seq: first_seq, .. } = first
            .flatten()
            .into_iter()
            .find(|cmd| matches!(cmd, GridCmd::LoadData { .. }))
            .expect("initial load")
        else {
            unreachable!()
        };
        update(&mut model, GridMsg::Refresh);

        update(
            &mut model,
            GridMsg::DataLoaded {
                seq: first_seq,
                result: Ok(Page::new(rows(), 2, 1, 10)),
            },
        );
        assert!(model.rows.is_empty());
        assert!(model.loading);

        let latest = model.data_seq;
        update(
            &mut model,
            GridMsg::DataLoaded {
                seq: latest,
                result: Err(SourceError::message("down")),
            },
        );
        assert!(!model.loading);
        assert_eq!(model.error.as_deref(), Some("down"));
    }

    #[test]
    fn loaded_options_retype_url_value_without_reload() {
        let (mut model, cmd, _) = mounted("?category=1&item=10");
        let request = option_requests(&cmd)
            .into_iter()
            .find(|request| request.key.field == "item")
            .expect("item options requested");

        let cmd = update(
            &mut model,
            GridMsg::OptionsLoaded {
                key: request.key,
                seq: request.seq,
                result: Ok(crate::usecase::services::option_resolver::OptionPayload::List(vec![
                    SelectOption::new("Ward", 10),
                ])),
            },
        );

        assert_eq!(cmd, GridCmd::None);
        assert_eq!(model.query.filters.get("item"), Some(&Scalar::Int(10)));
    }

    #[test]
    fn live_search_settles_through_tick() {
        let (mut model, _, _) = mounted("");
        let start = Instant::now();

        let wake = update(
            &mut model,
            GridMsg::SearchInput {
                text: "ab".to_string(),
                at: start,
            },
        );
        assert_eq!(wake, GridCmd::ScheduleWake(start + Duration::from_millis(400)));
        assert_eq!(
            update(&mut model, GridMsg::Tick(start)),
            GridCmd::ScheduleWake(start + Duration::from_millis(400))
        );

        let cmd = update(&mut model, GridMsg::Tick(start + Duration::from_millis(400)));
        assert_eq!(model.query.search.as_deref(), Some("ab"));
        assert_eq!(loads(&cmd), 1);
    }

    #[test]
    fn staged_search_waits_for_apply() {
        let (mut model, _, _) = mounted("");
        let start = Instant::now();
        update(
            &mut model,
            GridMsg::StagedSearchInput {
                text: "cd".to_string(),
                at: start,
            },
        );
        let cmd = update(&mut model, GridMsg::Tick(start + Duration::from_millis(300)));
        assert_eq!(cmd, GridCmd::None);
        assert_eq!(model.staged_search, "cd");
        assert_eq!(model.query.search, None);

        let cmd = update(&mut model, GridMsg::ApplyStaged);
        assert_eq!(model.query.search.as_deref(), Some("cd"));
        assert_eq!(loads(&cmd), 1);
    }

    #[test]
    fn apply_flushes_staged_text_typed_before_the_deadline() {
        let (mut model, _, _) = mounted("");
        let start = Instant::now();
        let wake = update(
            &mut model,
            GridMsg::StagedSearchInput {
                text: "ward 5".to_string(),
                at: start,
            },
        );
        assert_eq!(wake, GridCmd::ScheduleWake(start + Duration::from_millis(300)));

        let cmd = update(&mut model, GridMsg::ApplyStaged);
        assert_eq!(model.query.search.as_deref(), Some("ward 5"));
        assert_eq!(model.staged_search, "ward 5");
        assert_eq!(loads(&cmd), 1);

        let late = update(&mut model, GridMsg::Tick(start + Duration::from_millis(300)));
        assert_eq!(late, GridCmd::None);
        assert_eq!(model.query.search.as_deref(), Some("ward 5"));
    }

    #[test]
    fn sort_toggle_starts_ascending_and_resets_page() {
        let (mut model, _, _) = mounted("?page=3");
        update(&mut model, GridMsg::SortToggled("name".to_string()));
        assert_eq!(model.query.sorting, Some(SortSpec::new("name", SortDirection::Asc)));
        assert_eq!(model.query.page, 1);
        update(&mut model, GridMsg::SortToggled("name".to_string()));
        assert_eq!(model.query.sorting, Some(SortSpec::new("name", SortDirection::Desc)));
    }

    #[test]
    fn unmount_silences_everything() {
        let (mut model, _, _) = mounted("");
        update(&mut model, GridMsg::Unmount);
        assert_eq!(update(&mut model, GridMsg::Refresh), GridCmd::None);
        assert!(model.options.is_empty());
    }
}
