//! Service configuration (JSON).
//!
//! ```json
//! {
//!   "layers": [
//!     { "name": "roads", "schema": "topo", "srid": 2154, "unit": "meters",
//!       "geometry_columns": ["geom"] },
//!     { "name": "cities", "srid": 4326, "unit": "degrees" }
//!   ]
//! }
//! ```

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::layer::{Layer, LayerCatalog};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServiceConfig {
    #[serde(default)]
    pub layers: Vec<Layer>,
}

impl ServiceConfig {
    pub fn from_json_str(text: &str) -> Result<Self> {
        serde_json::from_str(text).context("invalid service configuration")
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let config = Self::from_json_str(&text)
            .with_context(|| format!("while loading {}", path.display()))?;
        tracing::debug!(path = %path.display(), layers = config.layers.len(), "loaded service config");
        Ok(config)
    }

    pub fn layer_catalog(&self) -> Result<LayerCatalog> {
        LayerCatalog::new(self.layers.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layer::LinearUnit;

    #[test]
    fn test_defaults_fill_schema_and_geometry_column() {
        let config = ServiceConfig::from_json_str(
            r#"{ "layers": [
                { "name": "roads", "schema": "topo", "srid": 2154, "unit": "meters",
                  "geometry_columns": ["geom", "centerline"] },
                { "name": "cities", "srid": 4326, "unit": "degrees" }
            ] }"#,
        )
        .unwrap();

        let catalog = config.layer_catalog().unwrap();
        let roads = catalog.get("roads").unwrap();
        assert_eq!(roads.schema, "topo");
        assert_eq!(roads.geometry_columns, vec!["geom", "centerline"]);
        assert_eq!(roads.unit, LinearUnit::Meters);

        let cities = catalog.get("cities").unwrap();
        assert_eq!(cities.schema, "public");
        assert_eq!(cities.geometry_columns, vec!["the_geom"]);
        assert!(cities.is_degree());
    }

    #[test]
    fn test_unknown_unit_is_rejected() {
        let err = ServiceConfig::from_json_str(
            r#"{ "layers": [ { "name": "x", "srid": 4326, "unit": "furlongs" } ] }"#,
        );
        assert!(err.is_err());
    }

    #[test]
    fn test_missing_file_reports_path() {
        let err = ServiceConfig::load("/nonexistent/geofilter.json").unwrap_err();
        assert!(format!("{err:#}").contains("/nonexistent/geofilter.json"));
    }
}
