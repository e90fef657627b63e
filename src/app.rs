use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use dioxus::prelude::*;

use crate::domain::entities::chip::{ActiveFilter, ChipKey};
use crate::domain::entities::option::{find_by_raw, SelectOption};
use crate::domain::entities::query::SortDirection;
use crate::domain::entities::record::Record;
use crate::domain::entities::value::Scalar;
use crate::infra::location::MemoryLocation;
use crate::infra::settings::GridSettings;
use crate::ui::demo::{default_db_path, demo_permissions, seed_demo, wards_screen};
use crate::ui::state::grid_state::GridHandle;
use crate::usecase::config::screen::FilterKind;
use crate::usecase::engine::runtime::GridSession;
use crate::usecase::services::debounce::SearchChannel;

const CELL_STYLE: &str = "border: 1px solid #bbb; padding: 4px 8px;";
const HEADER_STYLE: &str =
    "border: 1px solid #bbb; padding: 6px 8px; background: #f3f3f3; position: sticky; top: 0;";
const BUTTON_STYLE: &str =
    "border: 1px solid #bbb; background: #fff; padding: 4px 10px; border-radius: 6px; cursor: pointer;";

#[derive(Clone, Debug, PartialEq)]
struct FilterView {
    name: String,
    label: String,
    kind: FilterKind,
    value: String,
    options: Vec<SelectOption>,
    enabled: bool,
    loading: bool,
    paged: bool,
    has_more: bool,
}

fn build_handle(settings: &GridSettings, version: Signal<u64>) -> Result<GridHandle, String> {
    let db_path = default_db_path().map_err(|err| err.to_string())?;
    let datasets = seed_demo(&db_path).map_err(|err| format!("failed to seed demo data: {err:#}"))?;
    let mut session = GridSession::new(
        wards_screen(&db_path, datasets),
        settings.engine_settings(),
        Arc::new(MemoryLocation::default()),
        demo_permissions(),
    )
    .map_err(|err| err.to_string())?;
    session.mount(BTreeMap::new());
    Ok(GridHandle::new(session, version))
}

#[component]
pub fn App(settings: GridSettings) -> Element {
    let version = use_signal(|| 0_u64);
    let page_sizes = settings.page_sizes();
    let handle = use_hook(move || build_handle(&settings, version));

    match handle {
        Ok(handle) => rsx! {
            GridScreen { handle, page_sizes }
        },
        Err(err) => rsx! {
            div { style: "padding: 16px;",
                p { "Failed to start: {err}" }
            }
        },
    }
}

#[component]
fn GridScreen(handle: GridHandle, page_sizes: Vec<u32>) -> Element {
    let _ = handle.version();
    let mut staged_text = use_signal(String::new);
    let mut status = use_signal(String::new);

    let (filters, chips, columns, rows, query, total_records, total_pages, loading, error, live_text) =
        handle.read(|session| {
            let model = session.model();
            let filters: Vec<FilterView> = model
                .config
                .filters
                .iter()
                .map(|descriptor| FilterView {
                    name: descriptor.name.clone(),
                    label: descriptor.label.clone(),
                    kind: descriptor.kind,
                    value: session
                        .form_value(&descriptor.name)
                        .map(ToString::to_string)
                        .unwrap_or_default(),
                    options: session.options_for(&descriptor.name).to_vec(),
                    enabled: session.is_field_enabled(&descriptor.name),
                    loading: session.is_options_loading(&descriptor.name),
                    paged: descriptor.uses_pagination(),
                    has_more: session.has_more_options(&descriptor.name),
                })
                .collect();
            let columns: Vec<(String, String, bool)> = session
                .visible_columns()
                .into_iter()
                .map(|column| (column.key.clone(), column.label.clone(), column.sortable))
                .collect();
            let rows: Vec<(Vec<String>, Vec<(String, String)>)> = session
                .rows()
                .iter()
                .map(|row| {
                    let cells = columns
                        .iter()
                        .map(|(key, _, _)| row.field(key).map(|value| value.to_string()).unwrap_or_default())
                        .collect();
                    let actions = session
                        .visible_actions(row)
                        .into_iter()
                        .map(|action| (action.key.clone(), action.label.clone()))
                        .collect();
                    (cells, actions)
                })
                .collect();
            (
                filters,
                session.chips(),
                columns,
                rows,
                session.query().clone(),
                model.total_records,
                model.total_pages,
                session.is_loading(),
                session.error().map(str::to_string),
                model.live_search_input.clone(),
            )
        });

    let page = query.page;
    let limit = query.limit;
    let sorting = query.sorting.clone();
    let has_actions = rows.iter().any(|(_, actions)| !actions.is_empty());

    let live_handle = handle.clone();
    let staged_handle = handle.clone();
    let apply_handle = handle.clone();
    let clear_handle = handle.clone();
    let chip_handle = handle.clone();
    let prev_handle = handle.clone();
    let next_handle = handle.clone();
    let size_handle = handle.clone();

    rsx! {
        div { style: "display: flex; flex-direction: column; height: 100vh; padding: 12px; box-sizing: border-box; font-family: sans-serif; gap: 10px;",
            div { style: "display: flex; gap: 12px; align-items: center;",
                input {
                    placeholder: "Search",
                    value: "{live_text}",
                    oninput: move |event| {
                        let text = event.value();
                        live_handle.apply("search", |session| session.on_search(text, Instant::now()));
                    },
                }
                input {
                    placeholder: "Search on apply",
                    value: "{staged_text}",
                    oninput: move |event| {
                        let text = event.value();
                        staged_text.set(text.clone());
                        staged_handle.apply("staged-search", |session| {
                            if text.trim().is_empty() {
                                session.on_clear_search(SearchChannel::Staged);
                            } else {
                                session.on_staged_search(text, Instant::now());
                            }
                        });
                    },
                }
                if loading {
                    span { style: "color: #666;", "Loading…" }
                }
            }

            div { style: "display: flex; gap: 12px; align-items: flex-end; flex-wrap: wrap;",
                {filters.into_iter().map(|filter| {
                    let field_key = filter.name.clone();
                    let handle = handle.clone();
                    rsx!(FilterField { key: "{field_key}", filter, handle })
                })}
                button {
                    style: BUTTON_STYLE,
                    onclick: move |_| apply_handle.apply("apply", |session| session.on_apply()),
                    "Apply"
                }
                button {
                    style: BUTTON_STYLE,
                    onclick: move |_| {
                        staged_text.set(String::new());
                        clear_handle.apply("clear", |session| session.on_clear_filter());
                    },
                    "Clear"
                }
            }

            ChipBar {
                chips,
                on_remove: move |key: ChipKey| {
                    if key == ChipKey::Search {
                        staged_text.set(String::new());
                    }
                    chip_handle.apply("remove-chip", |session| session.remove_chip(key));
                },
            }

            if let Some(error) = error {
                p { style: "color: #d24;", "Load failed: {error}" }
            }
            if !status().is_empty() {
                p { style: "color: #246;", "{status}" }
            }

            div { style: "flex: 1; min-height: 0; overflow: auto;",
                table { style: "border-collapse: collapse; width: 100%; background: #fff;",
                    thead {
                        tr {
                            {columns.iter().map(|(key, label, sortable)| {
                                let key = key.clone();
                                let marker = match &sorting {
                                    Some(sort) if sort.field == key => match sort.direction {
                                        SortDirection::Asc => " ▲",
                                        SortDirection::Desc => " ▼",
                                    },
                                    _ => "",
                                };
                                let sortable = *sortable;
                                let field = key.clone();
                                let sort_handle = handle.clone();
                                rsx!(
                                    th {
                                        key: "{key}",
                                        style: "{HEADER_STYLE} cursor: pointer;",
                                        onclick: move |_| {
                                            if sortable {
                                                let field = field.clone();
                                                sort_handle.apply("sort", |session| session.on_sort_toggle(field));
                                            }
                                        },
                                        "{label}{marker}"
                                    }
                                )
                            })}
                            if has_actions {
                                th { style: HEADER_STYLE, "Actions" }
                            }
                        }
                    }
                    tbody {
                        {rows.into_iter().map(|(cells, actions)| {
                            let row_code = cells.first().cloned().unwrap_or_default();
                            rsx!(
                                tr {
                                    for cell in cells.iter() {
                                        td { style: CELL_STYLE, "{cell}" }
                                    }
                                    if has_actions {
                                        td { style: CELL_STYLE,
                                            {actions.into_iter().map(|(action_key, action_label)| {
                                                let row_code = row_code.clone();
                                                rsx!(
                                                    button {
                                                        style: BUTTON_STYLE,
                                                        onclick: move |_| status.set(format!("{action_key} requested for {row_code}")),
                                                        "{action_label}"
                                                    }
                                                )
                                            })}
                                        }
                                    }
                                }
                            )
                        })}
                    }
                }
            }

            div { style: "display: flex; gap: 12px; align-items: center;",
                button {
                    style: BUTTON_STYLE,
                    disabled: page <= 1,
                    onclick: move |_| prev_handle.apply("page", |session| session.on_page_change(page.saturating_sub(1))),
                    "Prev"
                }
                span { "Page {page} / {total_pages} · {total_records} rows" }
                button {
                    style: BUTTON_STYLE,
                    disabled: page >= total_pages,
                    onclick: move |_| next_handle.apply("page", |session| session.on_page_change(page + 1)),
                    "Next"
                }
                select {
                    onchange: move |event| {
                        if let Ok(size) = event.value().parse::<u32>() {
                            size_handle.apply("page-size", |session| session.on_page_size_change(size));
                        }
                    },
                    for size in page_sizes.iter().copied() {
                        option { value: "{size}", selected: size == limit, "{size} / page" }
                    }
                }
            }
        }
    }
}

#[component]
fn FilterField(filter: FilterView, handle: GridHandle) -> Element {
    let name = filter.name.clone();
    let field_handle = handle.clone();

    match filter.kind {
        FilterKind::Select => {
            let options = filter.options.clone();
            let search_handle = handle.clone();
            let more_handle = handle.clone();
            let search_name = name.clone();
            let more_name = name.clone();
            rsx! {
                label { style: "display: flex; flex-direction: column; gap: 4px;",
                    span { "{filter.label}" }
                    if filter.paged {
                        input {
                            placeholder: "Find…",
                            disabled: !filter.enabled,
                            oninput: move |event| {
                                let text = event.value();
                                let field = search_name.clone();
                                search_handle.apply("select-search", |session| session.on_select_search(field, text));
                            },
                        }
                    }
                    select {
                        disabled: !filter.enabled,
                        onchange: move |event| {
                            let raw = event.value();
                            let value = find_by_raw(&options, &raw).map(|option| option.value.clone());
                            let field = name.clone();
                            field_handle.apply("field", |session| session.on_field_change(field, value));
                        },
                        option { value: "", selected: filter.value.is_empty(), "(any)" }
                        for choice in filter.options.iter() {
                            option {
                                value: "{choice.value}",
                                selected: choice.value.to_string() == filter.value,
                                "{choice.label}"
                            }
                        }
                    }
                    if filter.loading {
                        span { style: "color: #666; font-size: 12px;", "loading…" }
                    }
                    if filter.paged && filter.has_more {
                        button {
                            style: BUTTON_STYLE,
                            onclick: move |_| {
                                let field = more_name.clone();
                                more_handle.apply("select-more", |session| session.on_select_scroll_to_bottom(field));
                            },
                            "More…"
                        }
                    }
                }
            }
        }
        FilterKind::Text | FilterKind::Date | FilterKind::Number => {
            let input_type = match filter.kind {
                FilterKind::Date => "date",
                FilterKind::Number => "number",
                _ => "text",
            };
            let kind = filter.kind;
            rsx! {
                label { style: "display: flex; flex-direction: column; gap: 4px;",
                    span { "{filter.label}" }
                    input {
                        r#type: input_type,
                        value: "{filter.value}",
                        disabled: !filter.enabled,
                        oninput: move |event| {
                            let raw = event.value();
                            let value = match kind {
                                FilterKind::Number => Scalar::parse_number(&raw),
                                _ => Some(Scalar::text(raw)),
                            };
                            let field = name.clone();
                            field_handle.apply("field", |session| session.on_field_change(field, value));
                        },
                    }
                }
            }
        }
    }
}

#[component]
fn ChipBar(chips: Vec<ActiveFilter>, on_remove: EventHandler<ChipKey>) -> Element {
    if chips.is_empty() {
        return rsx! {};
    }
    rsx! {
        div { style: "display: flex; gap: 8px; flex-wrap: wrap;",
            {chips.into_iter().map(|chip| {
                let key = chip.key.clone();
                rsx!(
                    span {
                        style: "display: inline-flex; gap: 6px; align-items: center; background: #eef4ff; border: 1px solid #bcd; border-radius: 12px; padding: 2px 10px;",
                        "{chip.label}: {chip.display_value}"
                        button {
                            style: "border: none; background: transparent; cursor: pointer;",
                            onclick: move |_| on_remove.call(key.clone()),
                            "×"
                        }
                    }
                )
            })}
        }
    }
}
