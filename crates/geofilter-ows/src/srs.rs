//! Spatial reference resolution against the PostGIS `spatial_ref_sys` catalog.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::layer::LayerCatalog;
use crate::sql::{self, SqlError, SqlExecutor, SqlRow};

/// SRID of the unset reference.
pub const UNSET_SRID: i32 = -1;

/// WGS 84 geographic coordinates.
pub const WGS84_SRID: i32 = 4326;

/// `srsName` encodings we understand, with the delimiter that separates the
/// code from the rest of the token. The code is always the last segment, so
/// versioned URNs such as `urn:ogc:def:crs:EPSG:6.3:4326` resolve too.
const SRS_NAME_PREFIXES: &[(&str, char)] = &[
    ("http://www.opengis.net/gml/srs/epsg.xml#", '#'),
    ("http://www.epsg.org/", '/'),
    ("EPSG:", ':'),
    ("urn:EPSG:geographicCRC:", ':'),
    ("urn:ogc:def:crs:EPSG:", ':'),
    ("urn:x-ogc:def:crs:EPSG:", ':'),
];

/// A resolved (or unset) coordinate reference system.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpatialReference {
    srid: i32,
    authority_name: String,
    authority_code: i32,
    is_degree_unit: bool,
}

impl SpatialReference {
    /// The reference of data without a known coordinate system.
    pub fn unset() -> Self {
        Self {
            srid: UNSET_SRID,
            authority_name: String::new(),
            authority_code: 0,
            is_degree_unit: true,
        }
    }

    pub fn is_unset(&self) -> bool {
        self.srid == UNSET_SRID
    }

    pub fn srid(&self) -> i32 {
        self.srid
    }

    pub fn authority_name(&self) -> &str {
        &self.authority_name
    }

    pub fn authority_code(&self) -> i32 {
        self.authority_code
    }

    pub fn is_degree_unit(&self) -> bool {
        self.is_degree_unit
    }

    /// `AUTH:CODE`, e.g. `EPSG:4326`. `None` for the unset reference.
    pub fn srs_name(&self) -> Option<String> {
        if self.is_unset() {
            None
        } else {
            Some(format!("{}:{}", self.authority_name, self.authority_code))
        }
    }

    /// Build from a catalog row `(auth_name, auth_srid, proj4text)` found for `srid`.
    pub(crate) fn from_catalog_columns(
        srid: i32,
        row: &SqlRow,
        first_column: usize,
    ) -> Result<Self, SqlError> {
        Ok(Self {
            srid,
            authority_name: row.text(first_column)?.to_string(),
            authority_code: row.int(first_column + 1)?,
            is_degree_unit: !declares_meter_unit(row.opt_text(first_column + 2)?),
        })
    }
}

impl Default for SpatialReference {
    fn default() -> Self {
        Self::unset()
    }
}

impl fmt::Display for SpatialReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.srs_name() {
            Some(name) => write!(f, "{name} (srid {})", self.srid),
            None => f.write_str("unset"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SrsError {
    #[error("no unique spatial_ref_sys entry for {authority}:{code}")]
    NotFoundByCode { authority: String, code: i32 },
    #[error("no unique spatial_ref_sys entry for srid {0}")]
    NotFoundBySrid(i32),
    #[error("unrecognized srsName `{0}`")]
    UnrecognizedName(String),
    #[error(transparent)]
    Engine(#[from] SqlError),
}

impl SrsError {
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            SrsError::NotFoundByCode { .. } | SrsError::NotFoundBySrid(_)
        )
    }
}

/// True when a proj4 definition declares meters as its linear unit.
pub fn declares_meter_unit(proj4text: Option<&str>) -> bool {
    proj4text.is_some_and(|text| text.split_whitespace().any(|token| token == "+units=m"))
}

/// Extract the EPSG code from one of the supported `srsName` encodings.
pub fn srid_from_srs_name(name: &str) -> Option<i32> {
    let (_, delimiter) = SRS_NAME_PREFIXES
        .iter()
        .find(|(prefix, _)| name.starts_with(prefix))?;
    name.rsplit(*delimiter).next()?.trim().parse().ok()
}

pub(crate) fn by_code_query(authority: &str, code: i32) -> String {
    format!(
        "SELECT srid, proj4text FROM spatial_ref_sys WHERE auth_name={} AND auth_srid={code}",
        sql::string_literal(authority)
    )
}

pub(crate) fn by_srid_query(srid: i32) -> String {
    format!("SELECT auth_name, auth_srid, proj4text FROM spatial_ref_sys WHERE srid={srid}")
}

pub(crate) fn label_query(srid: i32) -> String {
    format!("SELECT auth_name||':'||auth_srid AS srs FROM spatial_ref_sys WHERE srid={srid}")
}

/// Resolves spatial references for one request.
///
/// Holds the request's database connection and the configured layers; it
/// keeps no state of its own, so every lookup is a fresh catalog query.
#[derive(Clone, Copy)]
pub struct SrsRegistry<'a> {
    executor: &'a dyn SqlExecutor,
    layers: &'a LayerCatalog,
}

impl<'a> SrsRegistry<'a> {
    pub fn new(executor: &'a dyn SqlExecutor, layers: &'a LayerCatalog) -> Self {
        Self { executor, layers }
    }

    pub fn executor(&self) -> &'a dyn SqlExecutor {
        self.executor
    }

    pub fn layers(&self) -> &'a LayerCatalog {
        self.layers
    }

    /// Resolve by authority and code, e.g. `("EPSG", 4326)`.
    pub fn resolve_by_code(
        &self,
        authority: &str,
        code: i32,
    ) -> Result<SpatialReference, SrsError> {
        let rows = self.executor.query(&by_code_query(authority, code))?;
        let [row] = rows.as_slice() else {
            tracing::debug!(authority, code, rows = rows.len(), "srs lookup by code missed");
            return Err(SrsError::NotFoundByCode {
                authority: authority.to_string(),
                code,
            });
        };

        let srs = SpatialReference {
            srid: row.int(0)?,
            authority_name: authority.to_string(),
            authority_code: code,
            is_degree_unit: !declares_meter_unit(row.opt_text(1)?),
        };
        tracing::debug!(authority, code, srid = srs.srid, "resolved srs by code");
        Ok(srs)
    }

    /// Resolve by SRID. [`UNSET_SRID`] never reaches the database.
    pub fn resolve_by_srid(&self, srid: i32) -> Result<SpatialReference, SrsError> {
        if srid == UNSET_SRID {
            return Ok(SpatialReference::unset());
        }

        let rows = self.executor.query(&by_srid_query(srid))?;
        let [row] = rows.as_slice() else {
            tracing::debug!(srid, rows = rows.len(), "srs lookup by srid missed");
            return Err(SrsError::NotFoundBySrid(srid));
        };

        let srs = SpatialReference::from_catalog_columns(srid, row, 0)?;
        tracing::debug!(srid, srs = %srs, "resolved srs by srid");
        Ok(srs)
    }

    /// Resolve an `srsName` attribute value.
    ///
    /// Accepted forms (WFS 1.1.0 §9.2, RFC 5165):
    ///
    /// ```text
    /// EPSG:4326
    /// http://www.opengis.net/gml/srs/epsg.xml#4326
    /// http://www.epsg.org/4326
    /// urn:ogc:def:crs:EPSG:6.3:4326
    /// urn:x-ogc:def:crs:EPSG:4326
    /// urn:EPSG:geographicCRC:4326
    /// ```
    pub fn resolve_by_name(&self, name: &str) -> Result<SpatialReference, SrsError> {
        let srid = srid_from_srs_name(name)
            .ok_or_else(|| SrsError::UnrecognizedName(name.to_string()))?;
        self.resolve_by_srid(srid)
    }

    /// # Panics
    ///
    /// Panics if `layer` is not configured.
    pub fn layer_unit_is_meters(&self, layer: &str) -> bool {
        !self.layers.expect_layer(layer).is_degree()
    }

    /// # Panics
    ///
    /// Panics if `layer` is not configured.
    pub fn layer_srid(&self, layer: &str) -> i32 {
        self.layers.expect_layer(layer).srid
    }

    /// `AUTH:CODE` label of a catalogued srid, `None` when not catalogued.
    pub fn authority_label(&self, srid: i32) -> Result<Option<String>, SrsError> {
        let rows = self.executor.query(&label_query(srid))?;
        match rows.as_slice() {
            [row] => Ok(row.opt_text(0)?.map(str::to_string)),
            _ => Ok(None),
        }
    }

    /// Labels for a list of srids, position for position. Unknown srids map
    /// to an empty string so the output lines up with the input.
    pub fn authority_labels(&self, srids: &[i32]) -> Result<Vec<String>, SrsError> {
        srids
            .iter()
            .map(|&srid| Ok(self.authority_label(srid)?.unwrap_or_default()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layer::{Layer, LinearUnit};
    use crate::testing::{CatalogEntry, MockExecutor};

    fn layers() -> LayerCatalog {
        LayerCatalog::new(vec![
            Layer::new("roads", 2154, LinearUnit::Meters),
            Layer::new("cities", 4326, LinearUnit::Degrees),
        ])
        .unwrap()
    }

    #[test]
    fn test_unset_srid_issues_no_query() {
        let db = MockExecutor::with_epsg_defaults();
        let layers = layers();
        let registry = SrsRegistry::new(&db, &layers);

        let srs = registry.resolve_by_srid(UNSET_SRID).unwrap();
        assert_eq!(srs, SpatialReference::unset());
        assert!(srs.is_degree_unit());
        assert_eq!(srs.authority_code(), 0);
        assert_eq!(db.query_count(), 0);
    }

    #[test]
    fn test_resolve_by_srid_reads_units() {
        let db = MockExecutor::with_epsg_defaults();
        let layers = layers();
        let registry = SrsRegistry::new(&db, &layers);

        let wgs84 = registry.resolve_by_srid(4326).unwrap();
        assert_eq!(wgs84.authority_name(), "EPSG");
        assert_eq!(wgs84.authority_code(), 4326);
        assert!(wgs84.is_degree_unit());

        let lambert = registry.resolve_by_srid(2154).unwrap();
        assert!(!lambert.is_degree_unit());
        assert_eq!(lambert.srs_name().as_deref(), Some("EPSG:2154"));
    }

    #[test]
    fn test_resolve_by_code() {
        let db = MockExecutor::with_epsg_defaults();
        let layers = layers();
        let registry = SrsRegistry::new(&db, &layers);

        let srs = registry.resolve_by_code("EPSG", 3857).unwrap();
        assert_eq!(srs.srid(), 3857);
        assert!(!srs.is_degree_unit());
        assert_eq!(srs, registry.resolve_by_srid(3857).unwrap());
    }

    #[test]
    fn test_missing_and_duplicate_rows_are_not_found() {
        let db = MockExecutor::with_epsg_defaults().with_entry(CatalogEntry::new(
            900913,
            "EPSG",
            3857,
            Some("+proj=merc +units=m +no_defs"),
        ));
        let layers = layers();
        let registry = SrsRegistry::new(&db, &layers);

        assert_eq!(
            registry.resolve_by_srid(99999).unwrap_err(),
            SrsError::NotFoundBySrid(99999)
        );
        let dup = registry.resolve_by_code("EPSG", 3857).unwrap_err();
        assert!(dup.is_not_found());
    }

    #[test]
    fn test_engine_failure_is_distinct_from_not_found() {
        let db = MockExecutor::new().fail_on("spatial_ref_sys", "connection reset");
        let layers = layers();
        let registry = SrsRegistry::new(&db, &layers);

        let err = registry.resolve_by_srid(4326).unwrap_err();
        assert!(matches!(err, SrsError::Engine(SqlError::Query(_))));
        assert!(!err.is_not_found());
    }

    #[test]
    fn test_srs_name_encodings() {
        assert_eq!(srid_from_srs_name("EPSG:4326"), Some(4326));
        assert_eq!(
            srid_from_srs_name("http://www.opengis.net/gml/srs/epsg.xml#27700"),
            Some(27700)
        );
        assert_eq!(srid_from_srs_name("http://www.epsg.org/2154"), Some(2154));
        assert_eq!(srid_from_srs_name("urn:ogc:def:crs:EPSG:6.3:4326"), Some(4326));
        assert_eq!(srid_from_srs_name("urn:ogc:def:crs:EPSG::4326"), Some(4326));
        assert_eq!(srid_from_srs_name("urn:x-ogc:def:crs:EPSG:3857"), Some(3857));
        assert_eq!(srid_from_srs_name("urn:EPSG:geographicCRC:4326"), Some(4326));
        assert_eq!(srid_from_srs_name("CRS:84"), None);
        assert_eq!(srid_from_srs_name("epsg:4326"), None);
        assert_eq!(srid_from_srs_name("EPSG:wgs84"), None);
    }

    #[test]
    fn test_resolve_by_name_matches_srid() {
        let db = MockExecutor::with_epsg_defaults();
        let layers = layers();
        let registry = SrsRegistry::new(&db, &layers);

        let by_srid = registry.resolve_by_srid(4326).unwrap();
        assert_eq!(registry.resolve_by_name("EPSG:4326").unwrap(), by_srid);
        assert_eq!(
            registry.resolve_by_name("urn:ogc:def:crs:EPSG:6.3:4326").unwrap(),
            by_srid
        );

        let queries_before = db.query_count();
        assert_eq!(
            registry.resolve_by_name("CRS:84").unwrap_err(),
            SrsError::UnrecognizedName("CRS:84".to_string())
        );
        assert_eq!(db.query_count(), queries_before);
    }

    #[test]
    fn test_layer_lookups() {
        let db = MockExecutor::new();
        let layers = layers();
        let registry = SrsRegistry::new(&db, &layers);

        assert!(registry.layer_unit_is_meters("roads"));
        assert!(!registry.layer_unit_is_meters("cities"));
        assert_eq!(registry.layer_srid("roads"), 2154);
        assert_eq!(db.query_count(), 0);
    }

    #[test]
    #[should_panic]
    fn test_layer_srid_of_unknown_layer_panics() {
        let db = MockExecutor::new();
        let layers = layers();
        SrsRegistry::new(&db, &layers).layer_srid("rivers");
    }

    #[test]
    fn test_authority_labels_keep_positions() {
        let db = MockExecutor::with_epsg_defaults();
        let layers = layers();
        let registry = SrsRegistry::new(&db, &layers);

        assert_eq!(
            registry.authority_label(4326).unwrap().as_deref(),
            Some("EPSG:4326")
        );
        assert_eq!(registry.authority_label(12).unwrap(), None);
        assert_eq!(
            registry.authority_labels(&[2154, 12, 3857]).unwrap(),
            vec!["EPSG:2154".to_string(), String::new(), "EPSG:3857".to_string()]
        );
        assert!(registry.authority_labels(&[]).unwrap().is_empty());
    }

    #[test]
    fn test_meter_unit_detection() {
        assert!(declares_meter_unit(Some("+proj=utm +zone=31 +units=m +no_defs")));
        assert!(declares_meter_unit(Some("+proj=merc +units=m")));
        assert!(!declares_meter_unit(Some("+proj=longlat +datum=WGS84 +no_defs")));
        assert!(!declares_meter_unit(Some("+proj=tmerc +units=us-ft")));
        assert!(!declares_meter_unit(None));
    }

    #[test]
    fn test_display() {
        assert_eq!(SpatialReference::unset().to_string(), "unset");
    }
}
