use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use proptest::prelude::*;
use rusqlite::Connection;
use serde_json::{json, Value};

use crate::domain::entities::chip::ChipKey;
use crate::domain::entities::option::SelectOption;
use crate::domain::entities::page::total_pages;
use crate::domain::entities::query::{QueryState, SortDirection, SortSpec};
use crate::domain::entities::record::Record;
use crate::domain::entities::value::Scalar;
use crate::infra::import::csv::import_csv_to_sqlite;
use crate::infra::location::MemoryLocation;
use crate::infra::settings::{read_settings, save_settings_to, GridSettings};
use crate::infra::sqlite::queries::{create_dataset_from_rows, list_datasets};
use crate::infra::sqlite::repo::{SqliteColumnOptions, SqliteDependentOptions, SqliteSource};
use crate::infra::sqlite::schema::init_db;
use crate::ui::demo::{demo_permissions, seed_demo, wards_screen, DemoDatasets};
use crate::usecase::config::screen::{
    ColumnDef, FilterDescriptor, FilterKind, GridData, OptionSource, ScreenConfig,
};
use crate::usecase::engine::runtime::GridSession;
use crate::usecase::ports::source::{
    DataSource, DependentOptionLoader, LocationStore, OptionPageQuery, PagedOptionLoader,
    SourceError,
};
use crate::usecase::services::data_loader::LocalRows;
use crate::usecase::services::query_sync::{read_query, write_query, QueryDefaults, WriteMode};

fn unique_test_dir(prefix: &str) -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("clock should be after epoch")
        .as_nanos();
    std::env::temp_dir().join(format!("admin-grid-{prefix}-{nanos}"))
}

fn seeded_db(prefix: &str) -> (PathBuf, PathBuf, DemoDatasets) {
    let temp_dir = unique_test_dir(prefix);
    fs::create_dir_all(&temp_dir).expect("should create temp dir");
    let db_path = temp_dir.join("grid.sqlite");
    let datasets = seed_demo(&db_path).expect("demo data should seed");
    (temp_dir, db_path, datasets)
}

fn text_query(filters: &[(&str, Scalar)]) -> QueryState {
    let mut query = QueryState::new(10);
    for (name, value) in filters {
        query.filters.insert(name.to_string(), value.clone());
    }
    query
}

#[test]
fn init_db_creates_required_tables() {
    let temp_dir = unique_test_dir("init-db");
    fs::create_dir_all(&temp_dir).expect("should create temp dir");
    let db_path = temp_dir.join("app.sqlite");

    let result = init_db(&db_path);

    assert!(result.is_ok(), "init_db should succeed: {result:?}");

    let conn = Connection::open(&db_path).expect("should open sqlite db");
    let table_count: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name IN ('dataset','column_name','cell')",
            [],
            |row| row.get(0),
        )
        .expect("table count query should succeed");

    assert_eq!(table_count, 3, "required tables should exist");

    fs::remove_dir_all(&temp_dir).expect("should cleanup temp dir");
}

#[test]
fn import_creates_dataset_with_headers_and_rows() {
    let temp_dir = unique_test_dir("import-csv");
    fs::create_dir_all(&temp_dir).expect("should create temp dir");
    let db_path = temp_dir.join("app.sqlite");
    let csv_path = temp_dir.join("people.csv");
    fs::write(&csv_path, "id,name,city\n1,Ann,Hue\n2,Binh\n").expect("should write csv");

    let imported = import_csv_to_sqlite(&db_path, &csv_path).expect("import should succeed");

    assert_eq!(imported.row_count, 2);
    let datasets = list_datasets(&db_path).expect("should list datasets");
    assert_eq!(datasets.len(), 1);
    assert_eq!(datasets[0].name, "people");
    assert_eq!(datasets[0].row_count, 2);

    let source = SqliteSource::new(&db_path, imported.dataset_id);
    let page = source
        .fetch(&QueryState::new(10))
        .expect("fetch should succeed");
    assert_eq!(page.total_records, 2);
    assert_eq!(page.data[0], json!({ "id": 1, "name": "Ann", "city": "Hue" }));
    assert_eq!(page.data[1]["city"], json!(""), "short record is padded");

    fs::remove_dir_all(&temp_dir).expect("should cleanup temp dir");
}

#[test]
fn seeding_twice_reuses_datasets() {
    let (temp_dir, db_path, first) = seeded_db("seed-twice");

    let second = seed_demo(&db_path).expect("second seed should succeed");

    assert_eq!(first, second);
    assert_eq!(list_datasets(&db_path).expect("should list").len(), 2);

    fs::remove_dir_all(&temp_dir).expect("should cleanup temp dir");
}

#[test]
fn sqlite_source_filters_pages_and_types_cells() {
    let (temp_dir, db_path, datasets) = seeded_db("source-filter");
    let source = SqliteSource::new(&db_path, datasets.wards).with_exact_columns(["region"]);

    let mut query = text_query(&[("region", Scalar::text("South"))]);
    query.limit = 5;
    query.page = 2;
    let page = source.fetch(&query).expect("fetch should succeed");

    assert_eq!(page.total_records, 8);
    assert_eq!(page.total_pages, 2);
    assert_eq!(page.data.len(), 3);
    assert!(page
        .data
        .iter()
        .all(|row| row.field("region") == Some(Scalar::text("South"))));
    assert!(matches!(page.data[0].field("population"), Some(Scalar::Int(_))));

    fs::remove_dir_all(&temp_dir).expect("should cleanup temp dir");
}

#[test]
fn sqlite_source_text_filters_match_substrings_case_insensitively() {
    let (temp_dir, db_path, datasets) = seeded_db("source-like");
    let source = SqliteSource::new(&db_path, datasets.wards);

    let page = source
        .fetch(&text_query(&[("name", Scalar::text("binh"))]))
        .expect("fetch should succeed");
    let names: Vec<Option<Scalar>> = page.data.iter().map(|row| row.field("name")).collect();

    assert_eq!(
        names,
        vec![Some(Scalar::text("Binh Thanh")), Some(Scalar::text("Binh Thuy"))]
    );

    fs::remove_dir_all(&temp_dir).expect("should cleanup temp dir");
}

#[test]
fn exact_columns_do_not_substring_match() {
    let (temp_dir, db_path, datasets) = seeded_db("source-exact");
    let query = text_query(&[("code", Scalar::text("9"))]);

    let loose = SqliteSource::new(&db_path, datasets.wards)
        .fetch(&query)
        .expect("fetch should succeed");
    let exact = SqliteSource::new(&db_path, datasets.wards)
        .with_exact_columns(["code"])
        .fetch(&query)
        .expect("fetch should succeed");

    assert!(loose.total_records > 0);
    assert_eq!(exact.total_records, 0);

    fs::remove_dir_all(&temp_dir).expect("should cleanup temp dir");
}

#[test]
fn sqlite_source_searches_and_sorts() {
    let (temp_dir, db_path, datasets) = seeded_db("source-sort");
    let source = SqliteSource::new(&db_path, datasets.wards);

    let mut search = QueryState::new(10);
    search.search = Some("kiem".to_string());
    let found = source.fetch(&search).expect("search should succeed");
    assert_eq!(found.total_records, 1);
    assert_eq!(found.data[0].field("name"), Some(Scalar::text("Hoan Kiem")));

    let mut sorted = QueryState::new(3);
    sorted.sorting = Some(SortSpec::new("name", SortDirection::Desc));
    let page = source.fetch(&sorted).expect("sort should succeed");
    let names: Vec<String> = page
        .data
        .iter()
        .filter_map(|row| row.field("name"))
        .map(|name| name.to_string())
        .collect();
    assert_eq!(names, vec!["Thuan Hoa", "Thanh Khe", "Tay Ho"]);
    assert_eq!(page.total_records, 24);

    fs::remove_dir_all(&temp_dir).expect("should cleanup temp dir");
}

#[test]
fn unknown_filter_column_is_a_source_error() {
    let (temp_dir, db_path, datasets) = seeded_db("source-unknown");
    let source = SqliteSource::new(&db_path, datasets.wards);

    let err = source
        .fetch(&text_query(&[("missing", Scalar::text("x"))]))
        .expect_err("unknown column should fail");

    assert!(matches!(err, SourceError::Message(ref message) if message.contains("unknown column")));

    fs::remove_dir_all(&temp_dir).expect("should cleanup temp dir");
}

#[test]
fn column_options_page_by_label_within_parent() {
    let (temp_dir, db_path, datasets) = seeded_db("column-options");
    let loader = SqliteColumnOptions::new(&db_path, datasets.wards, "code")
        .with_label("name")
        .with_parent_column("province");

    let first = loader
        .load_page(&OptionPageQuery {
            page: 1,
            limit: 2,
            filter: None,
            parent: Some(("province".to_string(), Scalar::Int(79))),
        })
        .expect("first page should load");
    assert_eq!(first.total_records, 5);
    assert!(first.has_more());
    assert_eq!(
        first.data,
        vec![
            json!({ "id": 769, "name": "Ben Thanh" }),
            json!({ "id": 784, "name": "Binh Thanh" }),
        ]
    );

    let searched = loader
        .load_page(&OptionPageQuery {
            page: 1,
            limit: 10,
            filter: Some("vap".to_string()),
            parent: Some(("province".to_string(), Scalar::Int(79))),
        })
        .expect("search should load");
    assert_eq!(searched.data, vec![json!({ "id": 790, "name": "Go Vap" })]);

    fs::remove_dir_all(&temp_dir).expect("should cleanup temp dir");
}

#[test]
fn dependent_options_follow_parent_value() {
    let (temp_dir, db_path, datasets) = seeded_db("dependent-options");
    let loader =
        SqliteDependentOptions::new(&db_path, datasets.provinces, "code", "region").with_label("name");

    let north = loader
        .load(&Scalar::text("North"))
        .expect("options should load");
    let labels: Vec<&str> = north.iter().map(|option| option.label.as_str()).collect();
    let values: Vec<&Scalar> = north.iter().map(|option| &option.value).collect();

    assert_eq!(labels, vec!["Ha Noi", "Hai Phong", "Quang Ninh"]);
    assert_eq!(values, vec![&Scalar::Int(1), &Scalar::Int(31), &Scalar::Int(22)]);
    assert!(loader
        .load(&Scalar::text("Nowhere"))
        .expect("empty parent should still load")
        .is_empty());

    fs::remove_dir_all(&temp_dir).expect("should cleanup temp dir");
}

#[test]
fn local_rows_sort_by_dotted_path() {
    let rows = vec![
        json!({ "id": 1, "name": "Charlie" }),
        json!({ "id": 2, "name": "alice" }),
        json!({ "id": 3, "name": "Bob" }),
    ];
    let mut query = QueryState::new(10);
    query.sorting = Some(SortSpec::new("name", SortDirection::Asc));

    let page = LocalRows::new(rows).query(&query);
    let ids: Vec<Value> = page.data.iter().map(|row| row["id"].clone()).collect();

    assert_eq!(ids, vec![json!(3), json!(1), json!(2)]);
    assert_eq!(page.total_records, 3);
    assert_eq!(page.total_pages, 1);
}

#[test]
fn demo_session_reads_url_and_resolves_cascading_labels() {
    let (temp_dir, db_path, datasets) = seeded_db("session-mount");
    let location = Arc::new(MemoryLocation::new("region=South&province=79"));
    let mut session = GridSession::new(
        wards_screen(&db_path, datasets),
        GridSettings::default().engine_settings(),
        location.clone(),
        demo_permissions(),
    )
    .expect("demo screen should validate");

    session.mount(BTreeMap::new());

    assert_eq!(session.model().total_records, 5);
    assert_eq!(session.form_value("province"), Some(&Scalar::Int(79)));
    assert!(session.is_field_enabled("code"));
    assert_eq!(session.options_for("code").len(), 5);
    assert!(!session.has_more_options("code"));
    assert_eq!(location.replacements(), 0, "mount without defaults writes nothing");

    let chips: Vec<(String, String)> = session
        .chips()
        .into_iter()
        .map(|chip| (chip.label, chip.display_value))
        .collect();
    assert_eq!(
        chips,
        vec![
            ("Region".to_string(), "South".to_string()),
            ("Province".to_string(), "Ho Chi Minh City".to_string()),
        ]
    );

    let columns: Vec<&str> = session
        .visible_columns()
        .into_iter()
        .map(|column| column.key.as_str())
        .collect();
    assert_eq!(columns, vec!["code", "name", "province", "region", "population"]);
    let row = session.rows()[0].clone();
    let actions: Vec<&str> = session
        .visible_actions(&row)
        .into_iter()
        .map(|action| action.key.as_str())
        .collect();
    assert_eq!(actions, vec!["edit"]);

    drop(session);
    fs::remove_dir_all(&temp_dir).expect("should cleanup temp dir");
}

#[test]
fn demo_session_writes_filters_and_removes_chips() {
    let (temp_dir, db_path, datasets) = seeded_db("session-chips");
    let location = Arc::new(MemoryLocation::new("region=South&province=79"));
    let mut session = GridSession::new(
        wards_screen(&db_path, datasets),
        GridSettings::default().engine_settings(),
        location.clone(),
        demo_permissions(),
    )
    .expect("demo screen should validate");
    session.mount(BTreeMap::new());

    session.on_filter_change(BTreeMap::from([
        ("region".to_string(), Scalar::text("South")),
        ("province".to_string(), Scalar::Int(79)),
        ("name".to_string(), Scalar::text("binh")),
    ]));

    assert_eq!(session.model().total_records, 1);
    assert_eq!(
        location.query_string(),
        "page=1&limit=10&name=binh&province=79&region=South"
    );

    session.remove_chip(ChipKey::Filter("region".to_string()));

    assert_eq!(session.query().filters.get("province"), None);
    assert_eq!(session.form_value("province"), None);
    assert!(!session.is_field_enabled("province"));
    assert_eq!(session.model().total_records, 2);
    assert_eq!(location.query_string(), "page=1&limit=10&name=binh");
    assert_eq!(location.replacements(), 2);

    drop(session);
    fs::remove_dir_all(&temp_dir).expect("should cleanup temp dir");
}

#[test]
fn live_search_through_session_waits_for_the_wake() {
    let rows: Vec<Value> = (1..=30)
        .map(|id| json!({ "id": id, "name": format!("row {id}") }))
        .collect();
    let config = ScreenConfig::new(GridData::Local(LocalRows::new(rows)))
        .with_filter(FilterDescriptor::text("name", "Name"))
        .with_column(ColumnDef::new("name", "Name"));
    let location = Arc::new(MemoryLocation::default());
    let checker = Arc::new(|_: &[String]| -> Result<bool, SourceError> { Ok(true) });
    let mut session = GridSession::new(
        config,
        GridSettings::default().engine_settings(),
        location.clone(),
        checker,
    )
    .expect("config should validate");
    session.mount(BTreeMap::new());
    assert_eq!(session.model().total_records, 30);

    let typed_at = Instant::now();
    session.on_search("row 2", typed_at);
    assert_eq!(session.model().total_records, 30, "search is still debouncing");

    let wake = session.take_wake().expect("a wake should be scheduled");
    assert!(wake >= typed_at + Duration::from_millis(400));
    session.tick(wake);

    assert_eq!(session.query().search.as_deref(), Some("row 2"));
    // "row 2" and "row 20".."row 29"
    assert_eq!(session.model().total_records, 11);
    assert_eq!(location.query_string(), "page=1&limit=10&filter=row+2");
}

#[test]
fn session_operations_follow_lifecycle() {
    let groups = ["a", "b", "c"];
    let rows: Vec<Value> = (1..=30)
        .map(|id| json!({ "id": id, "group": groups[id % 3] }))
        .collect();
    let local = LocalRows::new(rows);
    let config = ScreenConfig::new(GridData::Local(local.clone()))
        .with_filter(FilterDescriptor::text("group", "Group"))
        .with_column(ColumnDef::new("id", "Id"));
    let location = Arc::new(MemoryLocation::default());
    let checker = Arc::new(|_: &[String]| -> Result<bool, SourceError> { Ok(true) });
    let mut session = GridSession::new(
        config,
        GridSettings::default().engine_settings(),
        location.clone(),
        checker,
    )
    .expect("config should validate");

    let seed = BTreeMap::from([("group".to_string(), Scalar::text("a"))]);
    session.mount(seed.clone());
    assert_eq!(session.model().total_records, 10);
    assert_eq!(location.query_string(), "page=1&limit=10&group=a");

    session.set_initial_values(seed);
    assert_eq!(location.replacements(), 1, "unchanged initial values are ignored");

    session.set_initial_values(BTreeMap::from([("group".to_string(), Scalar::text("b"))]));
    assert_eq!(location.query_string(), "page=1&limit=10&group=b");

    session.on_sort_change(Some(SortSpec::new("id", SortDirection::Desc)));
    assert_eq!(session.rows()[0]["id"], json!(7), "sorting compares stringified values");
    assert_eq!(location.query_string(), "page=1&limit=10&group=b&sorting=id+desc");

    let before = session.model().data_seq;
    session.refresh();
    assert_eq!(session.model().data_seq, before + 1);
    assert_eq!(session.model().total_records, 10);

    let reserved = ScreenConfig::new(GridData::Local(local.clone()))
        .with_filter(FilterDescriptor::text("page", "Page"));
    assert!(session.set_config(reserved).is_err());

    session
        .set_config(ScreenConfig::new(GridData::Local(local)))
        .expect("plain config should validate");
    assert!(session.query().filters.is_empty());
    assert_eq!(session.model().total_records, 30);

    session.unmount();
    session.on_page_change(2);
    assert_eq!(session.query().page, 1);
    assert!(session.rows().is_empty());
}

#[test]
fn settings_round_trip_through_toml() {
    let temp_dir = unique_test_dir("settings");
    let path = temp_dir.join("nested").join("settings.toml");
    let settings = GridSettings {
        default_limit: 20,
        live_search_debounce_ms: 250,
        ..GridSettings::default()
    };

    save_settings_to(&path, &settings).expect("settings should save");
    let loaded = read_settings(&path).expect("settings should load");

    assert_eq!(loaded, settings);
    assert_eq!(
        loaded.engine_settings().live_search_delay,
        Duration::from_millis(250)
    );

    fs::remove_dir_all(&temp_dir).expect("should cleanup temp dir");
}

#[test]
fn create_dataset_rejects_empty_header() {
    let temp_dir = unique_test_dir("empty-header");
    fs::create_dir_all(&temp_dir).expect("should create temp dir");
    let db_path = temp_dir.join("app.sqlite");

    let result = create_dataset_from_rows(&db_path, "empty", "empty.csv", &[], &[]);

    assert!(result.is_err());
    fs::remove_dir_all(&temp_dir).expect("should cleanup temp dir");
}

fn numbered_rows(count: usize) -> Vec<Value> {
    (0..count)
        .map(|idx| json!({ "id": idx, "name": format!("item {idx}"), "even": idx % 2 == 0 }))
        .collect()
}

proptest! {
    #[test]
    fn local_pages_never_exceed_limit(count in 0usize..60, page in 1u32..10, limit in 1u32..25) {
        let rows = LocalRows::new(numbered_rows(count));
        let mut query = QueryState::new(limit);
        query.page = page;

        let result = rows.query(&query);

        prop_assert!(result.data.len() as u32 <= limit);
        prop_assert_eq!(result.total_records, count as u64);
        prop_assert_eq!(result.total_pages, total_pages(count as u64, limit));
        let expected = count
            .saturating_sub((page as usize - 1) * limit as usize)
            .min(limit as usize);
        prop_assert_eq!(result.data.len(), expected);
    }

    #[test]
    fn local_query_is_deterministic(count in 0usize..40, needle in "[0-9]{0,2}", even in any::<bool>()) {
        let rows = LocalRows::new(numbered_rows(count));
        let mut query = QueryState::new(100);
        query.search = Some(needle);
        query.filters.insert("even".to_string(), Scalar::Bool(even));

        let first = rows.query(&query);
        let second = rows.query(&query);

        prop_assert_eq!(&first, &second);
        prop_assert!(first
            .data
            .iter()
            .all(|row| row.field("even") == Some(Scalar::Bool(even))));
    }

    #[test]
    fn url_round_trip_keeps_paging_and_typed_filters(
        page in 1u32..50,
        limit in 1u32..100,
        name in "[a-z][a-z ]{0,8}[a-z]",
        descending in any::<bool>(),
        age in prop_oneof![
            any::<i32>().prop_map(|n| Scalar::Int(i64::from(n))),
            (-1.0e9f64..1.0e9).prop_map(Scalar::Float),
        ],
        status in 0usize..3,
        active in any::<bool>(),
    ) {
        let statuses = vec![
            SelectOption::new("Draft", 0),
            SelectOption::new("Active", 1),
            SelectOption::new("Archived", 2),
        ];
        let filters = vec![
            FilterDescriptor::text("name", "Name"),
            FilterDescriptor::new(FilterKind::Number, "age", "Age"),
            FilterDescriptor::select("status", "Status", OptionSource::Static(statuses.clone())),
            FilterDescriptor::select(
                "active",
                "Active",
                OptionSource::Static(vec![
                    SelectOption::new("Yes", true),
                    SelectOption::new("No", false),
                ]),
            ),
        ];
        let defaults = QueryDefaults { limit: 10, max_limit: 100 };
        let mut query = QueryState::new(limit);
        query.page = page;
        query.sorting = Some(SortSpec::new(
            "name",
            if descending { SortDirection::Desc } else { SortDirection::Asc },
        ));
        query.filters.insert("name".to_string(), Scalar::text(name));
        query.filters.insert("age".to_string(), age);
        query.filters.insert("status".to_string(), statuses[status].value.clone());
        query.filters.insert("active".to_string(), Scalar::Bool(active));

        let patch: Vec<(String, Option<String>)> = query
            .to_pairs()
            .into_iter()
            .map(|(key, value)| (key, Some(value)))
            .collect();
        let encoded = write_query("", &patch, WriteMode::ReplaceAll);

        prop_assert_eq!(read_query(&encoded, &filters, defaults), query);
    }
}
