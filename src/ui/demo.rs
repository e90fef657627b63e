//! Provinces / wards demo screen backed by SQLite.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{anyhow, Result};
use directories::ProjectDirs;
use serde_json::Value;

use crate::domain::entities::option::SelectOption;
use crate::domain::entities::record::Record;
use crate::domain::entities::value::Scalar;
use crate::infra::import::csv::import_csv_reader;
use crate::infra::sqlite::queries::find_dataset;
use crate::infra::sqlite::repo::{SqliteColumnOptions, SqliteDependentOptions, SqliteSource};
use crate::infra::sqlite::schema::init_db;
use crate::usecase::config::screen::{
    ActionDef, ColumnDef, FilterDescriptor, GridData, OptionSource, ScreenConfig,
};
use crate::usecase::ports::source::{PermissionChecker, SourceError};

const PROVINCES_CSV: &str = include_str!("../../assets/demo/provinces.csv");
const WARDS_CSV: &str = include_str!("../../assets/demo/wards.csv");

pub const PROVINCES: &str = "provinces";
pub const WARDS: &str = "wards";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DemoDatasets {
    pub provinces: i64,
    pub wards: i64,
}

pub fn default_db_path() -> Result<PathBuf> {
    let project_dirs = ProjectDirs::from("com", "hellhbbd", "admin-grid")
        .ok_or_else(|| anyhow!("unable to resolve data directory"))?;
    Ok(project_dirs.data_local_dir().join("grid.sqlite"))
}

fn ensure_dataset(db_path: &Path, name: &str, csv: &str) -> Result<i64> {
    if let Some(dataset_id) = find_dataset(db_path, name)? {
        return Ok(dataset_id);
    }
    let imported = import_csv_reader(db_path, name, &format!("{name}.csv"), csv.as_bytes())?;
    tracing::info!(name, rows = imported.row_count, "seeded demo dataset");
    Ok(imported.dataset_id)
}

/// Imports the embedded CSVs once; later calls reuse the stored datasets.
pub fn seed_demo(db_path: &Path) -> Result<DemoDatasets> {
    init_db(db_path)?;
    Ok(DemoDatasets {
        provinces: ensure_dataset(db_path, PROVINCES, PROVINCES_CSV)?,
        wards: ensure_dataset(db_path, WARDS, WARDS_CSV)?,
    })
}

fn regions() -> Vec<SelectOption> {
    ["North", "Central", "South"]
        .into_iter()
        .map(|region| SelectOption::new(region, region))
        .collect()
}

pub fn wards_screen(db_path: &Path, datasets: DemoDatasets) -> ScreenConfig<Value> {
    let source = SqliteSource::new(db_path, datasets.wards)
        .with_exact_columns(["region", "province", "code"]);
    let provinces = SqliteDependentOptions::new(db_path, datasets.provinces, "code", "region")
        .with_label("name");
    let wards = SqliteColumnOptions::new(db_path, datasets.wards, "code")
        .with_label("name")
        .with_parent_column("province");

    ScreenConfig::new(GridData::Remote(Arc::new(source)))
        .with_filter(FilterDescriptor::select(
            "region",
            "Region",
            OptionSource::Static(regions()),
        ))
        .with_filter(
            FilterDescriptor::select("province", "Province", OptionSource::Dependent(Arc::new(provinces)))
                .with_parent("region"),
        )
        .with_filter(
            FilterDescriptor::select("code", "Ward", OptionSource::Paged(Arc::new(wards)))
                .with_parent("province")
                .with_page_size(5),
        )
        .with_filter(FilterDescriptor::text("name", "Name"))
        .with_column(ColumnDef::new("code", "Code"))
        .with_column(ColumnDef::new("name", "Name"))
        .with_column(ColumnDef::new("province", "Province"))
        .with_column(ColumnDef::new("region", "Region"))
        .with_column(
            ColumnDef::new("population", "Population")
                .unsortable()
                .with_permission("wards.population"),
        )
        .with_action(
            ActionDef::new("edit", "Edit")
                .with_permission("wards.edit")
                .visible_when(|row: &Value| {
                    matches!(row.field("population"), Some(Scalar::Int(population)) if population > 0)
                }),
        )
        .with_action(ActionDef::new("delete", "Delete").with_permission("wards.delete"))
}

/// Grants read and edit keys; everything else is denied.
pub fn demo_permissions() -> Arc<dyn PermissionChecker> {
    Arc::new(|keys: &[String]| -> Result<bool, SourceError> {
        Ok(keys
            .iter()
            .all(|key| key.ends_with(".population") || key.ends_with(".edit")))
    })
}
