use geofilter_ows::testing::MockExecutor;
use geofilter_ows::{sql, Layer, LayerCatalog, LinearUnit, SpatialReference, SrsRegistry};

use crate::context::{ColumnResolver, CompileContext, GeometryTranslator};
use crate::error::FeError;
use crate::xml::XmlElement;

/// Property names are column names.
pub(crate) struct QuotedColumns;

impl ColumnResolver for QuotedColumns {
    fn column_sql(&self, _layer: &str, property: &str) -> Result<String, FeError> {
        if property.is_empty() {
            return Err(FeError::structural("empty property name"));
        }
        Ok(sql::quote_ident(property))
    }
}

/// Points only, as EWKT.
pub(crate) struct PointsAsEwkt;

impl GeometryTranslator for PointsAsEwkt {
    fn geometry_sql(&self, element: &XmlElement) -> Result<String, FeError> {
        if element.name() != "Point" {
            return Err(FeError::structural(format!(
                "cannot translate {}",
                element.name()
            )));
        }
        let position = element
            .element_children()
            .next()
            .map(|c| c.text())
            .unwrap_or_default()
            .replace(',', " ");
        Ok(format!("SRID=4326;POINT({})", position.trim()))
    }
}

/// `roads` (EPSG:2154, meters) and `cities` (EPSG:4326, degrees).
pub(crate) struct Fixture {
    pub db: MockExecutor,
    pub layers: LayerCatalog,
}

impl Fixture {
    pub fn new() -> Self {
        Self {
            db: MockExecutor::with_epsg_defaults(),
            layers: LayerCatalog::new(vec![
                Layer::new("roads", 2154, LinearUnit::Meters),
                Layer::new("cities", 4326, LinearUnit::Degrees),
            ])
            .unwrap(),
        }
    }

    pub fn context(&self) -> CompileContext<'_> {
        CompileContext::new(
            SrsRegistry::new(&self.db, &self.layers),
            &QuotedColumns,
            &PointsAsEwkt,
        )
    }

    pub fn srs(&self, srid: i32) -> SpatialReference {
        SrsRegistry::new(&self.db, &self.layers)
            .resolve_by_srid(srid)
            .unwrap()
    }
}
