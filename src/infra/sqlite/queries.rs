use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};
use rusqlite::{params, types::Value, Connection, Transaction};

use crate::infra::sqlite::schema::{init_db, open_connection};

type QueryPageResult = (Vec<String>, Vec<Vec<String>>, i64);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetMeta {
    pub id: i64,
    pub name: String,
    pub row_count: i64,
    pub source_path: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellMatch {
    /// Case-insensitive substring (`LIKE %term%`).
    Contains,
    Equals,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CellFilter {
    pub column: String,
    pub value: String,
    pub mode: CellMatch,
}

/// One page request against a dataset. `page` is 1-based.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CellQuery {
    pub search: String,
    pub filters: Vec<CellFilter>,
    /// Column name and whether to sort descending.
    pub sort: Option<(String, bool)>,
    pub page: i64,
    pub limit: i64,
}

impl Default for CellQuery {
    fn default() -> Self {
        Self {
            search: String::new(),
            filters: Vec::new(),
            sort: None,
            page: 1,
            limit: 10,
        }
    }
}

/// Distinct values of one column, for option lists. `page` is 1-based.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DistinctQuery {
    pub value_column: String,
    pub label_column: Option<String>,
    pub search: Option<String>,
    /// Restrict to rows whose `parent.0` column equals `parent.1`.
    pub parent: Option<(String, String)>,
    pub page: i64,
    pub limit: i64,
}

pub fn insert_headers(tx: &Transaction<'_>, dataset_id: i64, headers: &[String]) -> Result<()> {
    let mut insert_header = tx
        .prepare("INSERT INTO column_name(dataset_id, col_idx, name) VALUES (?1, ?2, ?3)")
        .context("failed to prepare header insert")?;

    for (col_idx, name) in headers.iter().enumerate() {
        insert_header
            .execute(params![dataset_id, col_idx as i64, name])
            .context("failed to insert header")?;
    }

    Ok(())
}

pub fn create_dataset_from_rows(
    db_path: &Path,
    name: &str,
    source_path: &str,
    columns: &[String],
    rows: &[Vec<String>],
) -> Result<i64> {
    if columns.is_empty() {
        anyhow::bail!("dataset needs at least one column")
    }
    init_db(db_path)?;
    let mut conn = open_connection(db_path)?;
    let tx = conn
        .transaction()
        .context("failed to start dataset create transaction")?;

    tx.execute(
        "INSERT INTO dataset(name, source_path, row_count) VALUES (?1, ?2, 0)",
        params![name, source_path],
    )
    .context("failed to insert dataset")?;
    let dataset_id = tx.last_insert_rowid();

    insert_headers(&tx, dataset_id, columns)?;

    let mut insert_cell = tx
        .prepare("INSERT INTO cell(dataset_id, row_idx, col_idx, value) VALUES (?1, ?2, ?3, ?4)")
        .context("failed to prepare cell insert")?;
    for (row_idx, row) in rows.iter().enumerate() {
        for col_idx in 0..columns.len() {
            let value = row.get(col_idx).map(String::as_str).unwrap_or("");
            insert_cell
                .execute(params![dataset_id, row_idx as i64, col_idx as i64, value])
                .context("failed to insert dataset cell")?;
        }
    }
    drop(insert_cell);

    tx.execute(
        "UPDATE dataset SET row_count = ?1 WHERE id = ?2",
        params![rows.len() as i64, dataset_id],
    )
    .context("failed to update dataset row_count")?;

    tx.commit().context("failed to commit dataset create")?;
    tracing::info!(dataset_id, name, rows = rows.len(), "dataset created");
    Ok(dataset_id)
}

pub fn list_datasets(db_path: &Path) -> Result<Vec<DatasetMeta>> {
    init_db(db_path)?;
    let conn = open_connection(db_path)?;
    let mut stmt = conn
        .prepare(
            "SELECT id, name, row_count, source_path
             FROM dataset
             ORDER BY id DESC",
        )
        .context("failed to prepare datasets query")?;

    let datasets = stmt
        .query_map([], |row| {
            Ok(DatasetMeta {
                id: row.get(0)?,
                name: row.get(1)?,
                row_count: row.get(2)?,
                source_path: row.get(3)?,
            })
        })
        .context("failed to query datasets")?
        .collect::<rusqlite::Result<Vec<_>>>()
        .context("failed to collect datasets")?;

    Ok(datasets)
}

/// Newest dataset with this name.
pub fn find_dataset(db_path: &Path, name: &str) -> Result<Option<i64>> {
    Ok(list_datasets(db_path)?
        .into_iter()
        .find(|dataset| dataset.name == name)
        .map(|dataset| dataset.id))
}

pub fn load_columns(conn: &Connection, dataset_id: i64) -> Result<Vec<String>> {
    let mut columns_stmt = conn
        .prepare(
            "SELECT name
             FROM column_name
             WHERE dataset_id = ?1
             ORDER BY col_idx ASC",
        )
        .context("failed to prepare columns query")?;
    let columns = columns_stmt
        .query_map([dataset_id], |row| row.get::<_, String>(0))
        .context("failed to query columns")?
        .collect::<rusqlite::Result<Vec<_>>>()
        .context("failed to collect columns")?;
    Ok(columns)
}

fn column_index(columns: &[String], name: &str) -> Result<i64> {
    columns
        .iter()
        .position(|column| column == name)
        .map(|idx| idx as i64)
        .with_context(|| format!("unknown column: {name}"))
}

pub fn query_page(db_path: &Path, dataset_id: i64, query: &CellQuery) -> Result<QueryPageResult> {
    if query.limit <= 0 {
        anyhow::bail!("limit must be greater than zero")
    }

    let conn = open_connection(db_path)?;
    let columns = load_columns(&conn, dataset_id)?;
    if columns.is_empty() {
        return Ok((columns, Vec::new(), 0));
    }

    let sort = match &query.sort {
        Some((column, descending)) => Some((column_index(&columns, column)?, *descending)),
        None => None,
    };

    let mut filter_clauses = vec!["base.dataset_id = ?".to_string()];
    let mut filter_params = vec![Value::Integer(dataset_id)];

    let search = query.search.trim();
    if !search.is_empty() {
        filter_clauses.push(
            "EXISTS (
                SELECT 1 FROM cell gs
                WHERE gs.dataset_id = base.dataset_id
                  AND gs.row_idx = base.row_idx
                  AND gs.value LIKE ?
            )"
            .to_string(),
        );
        filter_params.push(Value::Text(format!("%{search}%")));
    }

    for filter in &query.filters {
        let col_idx = column_index(&columns, &filter.column)?;
        let (operator, term) = match filter.mode {
            CellMatch::Contains => ("LIKE", format!("%{}%", filter.value.trim())),
            CellMatch::Equals => ("=", filter.value.clone()),
        };
        filter_clauses.push(format!(
            "EXISTS (
                SELECT 1 FROM cell cs
                WHERE cs.dataset_id = base.dataset_id
                  AND cs.row_idx = base.row_idx
                  AND cs.col_idx = ?
                  AND cs.value {operator} ?
            )"
        ));
        filter_params.push(Value::Integer(col_idx));
        filter_params.push(Value::Text(term));
    }

    let where_sql = filter_clauses.join(" AND ");

    let count_sql = format!(
        "SELECT COUNT(*)
         FROM (
             SELECT base.row_idx
             FROM cell base
             WHERE {where_sql}
             GROUP BY base.row_idx
         ) filtered"
    );
    let total_rows: i64 = conn
        .query_row(
            &count_sql,
            rusqlite::params_from_iter(filter_params.iter().cloned()),
            |row| row.get(0),
        )
        .context("failed to query filtered row count")?;

    let offset = (query.page.max(1) - 1) * query.limit;

    let mut row_params = Vec::<Value>::new();
    let mut row_sql = String::from("SELECT base.row_idx FROM cell base ");
    if let Some((sort_col, _)) = sort {
        row_sql.push_str(
            "LEFT JOIN cell sort_cell
             ON sort_cell.dataset_id = base.dataset_id
            AND sort_cell.row_idx = base.row_idx
            AND sort_cell.col_idx = ? ",
        );
        row_params.push(Value::Integer(sort_col));
    }

    row_sql.push_str(&format!("WHERE {where_sql} GROUP BY base.row_idx ORDER BY "));
    if let Some((_, descending)) = sort {
        let direction = if descending { "DESC" } else { "ASC" };
        row_sql.push_str(&format!("COALESCE(sort_cell.value, '') {direction}, "));
    }
    row_sql.push_str("base.row_idx ASC LIMIT ? OFFSET ?");

    row_params.extend(filter_params.iter().cloned());
    row_params.push(Value::Integer(query.limit));
    row_params.push(Value::Integer(offset));

    let mut row_stmt = conn
        .prepare(&row_sql)
        .context("failed to prepare page row_idx query")?;
    let row_indices = row_stmt
        .query_map(rusqlite::params_from_iter(row_params), |row| row.get::<_, i64>(0))
        .context("failed to query page row_idx")?
        .collect::<rusqlite::Result<Vec<_>>>()
        .context("failed to collect page row_idx")?;
    drop(row_stmt);

    if row_indices.is_empty() {
        return Ok((columns, Vec::new(), total_rows));
    }

    let rows = hydrate_rows(&conn, dataset_id, columns.len(), &row_indices)?;
    Ok((columns, rows, total_rows))
}

/// Loads full rows for `row_indices`, keeping their order.
fn hydrate_rows(
    conn: &Connection,
    dataset_id: i64,
    column_count: usize,
    row_indices: &[i64],
) -> Result<Vec<Vec<String>>> {
    let placeholders = std::iter::repeat_n("?", row_indices.len())
        .collect::<Vec<_>>()
        .join(",");
    let hydrate_sql = format!(
        "SELECT row_idx, col_idx, value
         FROM cell
         WHERE dataset_id = ? AND row_idx IN ({placeholders})
         ORDER BY row_idx ASC, col_idx ASC"
    );
    let mut hydrate_params = vec![Value::Integer(dataset_id)];
    hydrate_params.extend(row_indices.iter().copied().map(Value::Integer));

    let mut rows = vec![vec![String::new(); column_count]; row_indices.len()];
    let row_pos: HashMap<i64, usize> = row_indices
        .iter()
        .copied()
        .enumerate()
        .map(|(idx, row_idx)| (row_idx, idx))
        .collect();

    let mut hydrate_stmt = conn
        .prepare(&hydrate_sql)
        .context("failed to prepare row hydration query")?;
    let mut hydrated = hydrate_stmt
        .query(rusqlite::params_from_iter(hydrate_params))
        .context("failed to run row hydration query")?;

    while let Some(row) = hydrated.next().context("failed to read hydrated row")? {
        let row_idx: i64 = row.get(0).context("failed to read row_idx")?;
        let col_idx: i64 = row.get(1).context("failed to read col_idx")?;
        let value: String = row.get(2).context("failed to read value")?;

        if let Some(dest_cell) = row_pos
            .get(&row_idx)
            .and_then(|&dest_row| rows.get_mut(dest_row))
            .and_then(|dest_row| dest_row.get_mut(col_idx as usize))
        {
            *dest_cell = value;
        }
    }

    Ok(rows)
}

/// `(value, label)` pairs ordered by label, plus the distinct total.
pub fn distinct_values(
    db_path: &Path,
    dataset_id: i64,
    query: &DistinctQuery,
) -> Result<(Vec<(String, String)>, i64)> {
    if query.limit <= 0 {
        anyhow::bail!("limit must be greater than zero")
    }

    let conn = open_connection(db_path)?;
    let columns = load_columns(&conn, dataset_id)?;
    let value_idx = column_index(&columns, &query.value_column)?;
    let label_idx = match &query.label_column {
        Some(label) => column_index(&columns, label)?,
        None => value_idx,
    };

    let mut clauses = vec![
        "v.dataset_id = ?".to_string(),
        "v.col_idx = ?".to_string(),
        "v.value <> ''".to_string(),
    ];
    let mut query_params = vec![
        Value::Integer(label_idx),
        Value::Integer(dataset_id),
        Value::Integer(value_idx),
    ];

    if let Some((parent_column, parent_value)) = &query.parent {
        let parent_idx = column_index(&columns, parent_column)?;
        clauses.push(
            "EXISTS (
                SELECT 1 FROM cell p
                WHERE p.dataset_id = v.dataset_id
                  AND p.row_idx = v.row_idx
                  AND p.col_idx = ?
                  AND p.value = ?
            )"
            .to_string(),
        );
        query_params.push(Value::Integer(parent_idx));
        query_params.push(Value::Text(parent_value.clone()));
    }

    if let Some(search) = query.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        clauses.push("COALESCE(l.value, v.value) LIKE ?".to_string());
        query_params.push(Value::Text(format!("%{search}%")));
    }

    let from_sql = format!(
        "FROM cell v
         LEFT JOIN cell l
           ON l.dataset_id = v.dataset_id
          AND l.row_idx = v.row_idx
          AND l.col_idx = ?
         WHERE {}
         GROUP BY v.value",
        clauses.join(" AND ")
    );

    let total: i64 = conn
        .query_row(
            &format!("SELECT COUNT(*) FROM (SELECT v.value {from_sql}) grouped"),
            rusqlite::params_from_iter(query_params.iter().cloned()),
            |row| row.get(0),
        )
        .context("failed to count distinct values")?;

    let offset = (query.page.max(1) - 1) * query.limit;
    query_params.push(Value::Integer(query.limit));
    query_params.push(Value::Integer(offset));

    let mut stmt = conn
        .prepare(&format!(
            "SELECT v.value, MIN(COALESCE(l.value, v.value)) AS label
             {from_sql}
             ORDER BY label ASC, v.value ASC
             LIMIT ? OFFSET ?"
        ))
        .context("failed to prepare distinct values query")?;
    let values = stmt
        .query_map(rusqlite::params_from_iter(query_params), |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })
        .context("failed to query distinct values")?
        .collect::<rusqlite::Result<Vec<_>>>()
        .context("failed to collect distinct values")?;

    Ok((values, total))
}
