//! Configured feature layers and their storage metadata.

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

use crate::sql;

/// Linear unit of a layer's storage projection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinearUnit {
    Meters,
    Degrees,
}

/// A feature layer backed by a PostGIS table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Layer {
    pub name: String,
    #[serde(default = "default_schema")]
    pub schema: String,
    /// Storage SRID of the geometry columns.
    pub srid: i32,
    pub unit: LinearUnit,
    #[serde(default = "default_geometry_columns")]
    pub geometry_columns: Vec<String>,
}

fn default_schema() -> String {
    "public".to_string()
}

fn default_geometry_columns() -> Vec<String> {
    vec!["the_geom".to_string()]
}

impl Layer {
    pub fn new(name: &str, srid: i32, unit: LinearUnit) -> Self {
        Self {
            name: name.to_string(),
            schema: default_schema(),
            srid,
            unit,
            geometry_columns: default_geometry_columns(),
        }
    }

    pub fn with_schema(mut self, schema: &str) -> Self {
        self.schema = schema.to_string();
        self
    }

    pub fn with_geometry_columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.geometry_columns = columns.into_iter().map(Into::into).collect();
        self
    }

    pub fn is_degree(&self) -> bool {
        self.unit == LinearUnit::Degrees
    }

    /// `"schema"."name"`
    pub fn qualified_table(&self) -> String {
        sql::qualified_table(&self.schema, &self.name)
    }
}

/// The layers a service exposes, looked up by exact name.
#[derive(Debug, Clone, Default)]
pub struct LayerCatalog {
    layers: Vec<Layer>,
}

impl LayerCatalog {
    pub fn new(layers: Vec<Layer>) -> Result<Self> {
        for (i, layer) in layers.iter().enumerate() {
            if layer.name.is_empty() {
                bail!("layer #{i} has an empty name");
            }
            if layer.geometry_columns.is_empty() {
                bail!("layer `{}` declares no geometry column", layer.name);
            }
            if layers[..i].iter().any(|other| other.name == layer.name) {
                bail!("layer `{}` is declared twice", layer.name);
            }
        }
        Ok(Self { layers })
    }

    pub fn get(&self, name: &str) -> Option<&Layer> {
        self.layers.iter().find(|layer| layer.name == name)
    }

    /// Lookup for names the caller already knows are configured.
    ///
    /// # Panics
    ///
    /// Panics if `name` is not a configured layer.
    pub fn expect_layer(&self, name: &str) -> &Layer {
        match self.get(name) {
            Some(layer) => layer,
            None => panic!("layer `{name}` is not configured"),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Layer> {
        self.layers.iter()
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_is_exact() {
        let catalog = LayerCatalog::new(vec![
            Layer::new("roads", 2154, LinearUnit::Meters),
            Layer::new("roads_archive", 4326, LinearUnit::Degrees),
        ])
        .unwrap();

        assert_eq!(catalog.get("roads").unwrap().srid, 2154);
        assert_eq!(catalog.get("roads_archive").unwrap().srid, 4326);
        assert!(catalog.get("Roads").is_none());
        assert!(catalog.get("road").is_none());
    }

    #[test]
    fn test_rejects_duplicates_and_empty_columns() {
        let dup = LayerCatalog::new(vec![
            Layer::new("roads", 2154, LinearUnit::Meters),
            Layer::new("roads", 4326, LinearUnit::Degrees),
        ]);
        assert!(dup.is_err());

        let no_geom = LayerCatalog::new(vec![Layer::new("roads", 2154, LinearUnit::Meters)
            .with_geometry_columns(Vec::<String>::new())]);
        assert!(no_geom.is_err());
    }

    #[test]
    #[should_panic(expected = "not configured")]
    fn test_expect_layer_panics_on_unknown_name() {
        let catalog = LayerCatalog::default();
        catalog.expect_layer("missing");
    }

    #[test]
    fn test_qualified_table() {
        let layer = Layer::new("roads", 2154, LinearUnit::Meters).with_schema("topo");
        assert_eq!(layer.qualified_table(), "\"topo\".\"roads\"");
    }
}
