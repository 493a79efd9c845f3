//! In-memory [`SqlExecutor`] for tests.
//!
//! Answers `spatial_ref_sys` lookups from a small catalog, and any other query
//! from scripted responses matched by substring. Every query is recorded.

use std::cell::RefCell;

use crate::sql::{SqlError, SqlExecutor, SqlRow};
use crate::srs;

/// One `spatial_ref_sys` row.
#[derive(Debug, Clone)]
pub struct CatalogEntry {
    pub srid: i32,
    pub auth_name: String,
    pub auth_srid: i32,
    pub proj4text: Option<String>,
}

impl CatalogEntry {
    pub fn new(srid: i32, auth_name: &str, auth_srid: i32, proj4text: Option<&str>) -> Self {
        Self {
            srid,
            auth_name: auth_name.to_string(),
            auth_srid,
            proj4text: proj4text.map(str::to_string),
        }
    }
}

#[derive(Default)]
pub struct MockExecutor {
    catalog: Vec<CatalogEntry>,
    scripted: Vec<(String, Result<Vec<SqlRow>, SqlError>)>,
    queries: RefCell<Vec<String>>,
}

impl MockExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Catalog with EPSG:4326 (degrees), EPSG:3857 and EPSG:2154 (meters).
    pub fn with_epsg_defaults() -> Self {
        Self::new()
            .with_entry(CatalogEntry::new(
                4326,
                "EPSG",
                4326,
                Some("+proj=longlat +datum=WGS84 +no_defs "),
            ))
            .with_entry(CatalogEntry::new(
                3857,
                "EPSG",
                3857,
                Some("+proj=merc +a=6378137 +b=6378137 +units=m +nadgrids=@null +no_defs "),
            ))
            .with_entry(CatalogEntry::new(
                2154,
                "EPSG",
                2154,
                Some("+proj=lcc +lat_1=49 +lat_2=44 +ellps=GRS80 +units=m +no_defs "),
            ))
    }

    pub fn with_entry(mut self, entry: CatalogEntry) -> Self {
        self.catalog.push(entry);
        self
    }

    /// Answer any query containing `needle` with `rows`. Earlier scripts win.
    pub fn respond_to(mut self, needle: &str, rows: Vec<Vec<Option<&str>>>) -> Self {
        let rows = rows
            .into_iter()
            .map(|row| SqlRow::new(row.into_iter().map(|v| v.map(str::to_string)).collect()))
            .collect();
        self.scripted.push((needle.to_string(), Ok(rows)));
        self
    }

    /// Fail any query containing `needle`.
    pub fn fail_on(mut self, needle: &str, message: &str) -> Self {
        self.scripted
            .push((needle.to_string(), Err(SqlError::Query(message.to_string()))));
        self
    }

    pub fn queries(&self) -> Vec<String> {
        self.queries.borrow().clone()
    }

    pub fn query_count(&self) -> usize {
        self.queries.borrow().len()
    }

    fn catalog_rows(&self, sql: &str) -> Option<Vec<SqlRow>> {
        let by_srid: Vec<SqlRow> = self
            .catalog
            .iter()
            .filter(|e| sql == srs::by_srid_query(e.srid))
            .map(|e| {
                SqlRow::new(vec![
                    Some(e.auth_name.clone()),
                    Some(e.auth_srid.to_string()),
                    e.proj4text.clone(),
                ])
            })
            .collect();
        if !by_srid.is_empty() {
            return Some(by_srid);
        }

        let by_code: Vec<SqlRow> = self
            .catalog
            .iter()
            .filter(|e| sql == srs::by_code_query(&e.auth_name, e.auth_srid))
            .map(|e| SqlRow::new(vec![Some(e.srid.to_string()), e.proj4text.clone()]))
            .collect();
        if !by_code.is_empty() {
            return Some(by_code);
        }

        let labels: Vec<SqlRow> = self
            .catalog
            .iter()
            .filter(|e| sql == srs::label_query(e.srid))
            .map(|e| SqlRow::from_texts([format!("{}:{}", e.auth_name, e.auth_srid)]))
            .collect();
        if !labels.is_empty() {
            return Some(labels);
        }

        // A well-formed catalog query with no matching entry: empty result.
        sql.contains("FROM spatial_ref_sys WHERE").then(Vec::new)
    }
}

impl SqlExecutor for MockExecutor {
    fn query(&self, sql: &str) -> Result<Vec<SqlRow>, SqlError> {
        self.queries.borrow_mut().push(sql.to_string());

        if let Some((_, response)) = self
            .scripted
            .iter()
            .find(|(needle, _)| sql.contains(needle.as_str()))
        {
            return response.clone();
        }

        self.catalog_rows(sql)
            .ok_or_else(|| SqlError::Query(format!("no scripted response for `{sql}`")))
    }
}
