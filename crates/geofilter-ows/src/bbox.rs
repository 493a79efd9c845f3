//! Bounding boxes: validation, parsing, extent aggregation and reprojection.

use std::fmt;

use crate::sql::{self, SqlError, SqlRow};
use crate::srs::{SpatialReference, SrsError, SrsRegistry, UNSET_SRID, WGS84_SRID};

/// Lower coordinate of the unbounded sentinel.
pub const SENTINEL_MIN: f64 = f64::MIN;
/// Upper coordinate of the unbounded sentinel.
pub const SENTINEL_MAX: f64 = f64::MAX;

/// A geographic extent as advertised in capabilities documents. Corners may
/// come in either order.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoBoundingBox {
    pub west: f64,
    pub east: f64,
    pub north: f64,
    pub south: f64,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum BboxError {
    #[error("invalid extent [{xmin},{ymin},{xmax},{ymax}]")]
    InvalidExtent {
        xmin: f64,
        ymin: f64,
        xmax: f64,
        ymax: f64,
    },
    #[error("expected `xmin,ymin,xmax,ymax`, got `{0}`")]
    Malformed(String),
    #[error("cannot reproject {0}: both boxes need a spatial reference")]
    Unreferenced(String),
    #[error(transparent)]
    Srs(#[from] SrsError),
    #[error(transparent)]
    Engine(#[from] SqlError),
}

/// An axis-aligned extent with its spatial reference.
///
/// A fresh box is *unbounded*: it carries the extreme finite `f64` values and
/// an unset reference. [`BoundingBox::set`] never accepts those values, so an
/// unbounded box cannot be confused with real data.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundingBox {
    xmin: f64,
    ymin: f64,
    xmax: f64,
    ymax: f64,
    srs: SpatialReference,
}

impl Default for BoundingBox {
    fn default() -> Self {
        Self::unbounded()
    }
}

impl BoundingBox {
    pub fn unbounded() -> Self {
        Self {
            xmin: SENTINEL_MIN,
            ymin: SENTINEL_MIN,
            xmax: SENTINEL_MAX,
            ymax: SENTINEL_MAX,
            srs: SpatialReference::unset(),
        }
    }

    pub fn is_unbounded(&self) -> bool {
        [self.xmin, self.ymin, self.xmax, self.ymax]
            .iter()
            .any(|&v| is_sentinel(v))
    }

    pub fn is_valid(&self) -> bool {
        !self.is_unbounded() && self.xmin < self.xmax && self.ymin < self.ymax
    }

    pub fn xmin(&self) -> f64 {
        self.xmin
    }

    pub fn ymin(&self) -> f64 {
        self.ymin
    }

    pub fn xmax(&self) -> f64 {
        self.xmax
    }

    pub fn ymax(&self) -> f64 {
        self.ymax
    }

    pub fn srs(&self) -> &SpatialReference {
        &self.srs
    }

    /// Set coordinates and reference. Nothing changes unless the extent is
    /// valid and `srid` resolves.
    pub fn set(
        &mut self,
        registry: &SrsRegistry<'_>,
        xmin: f64,
        ymin: f64,
        xmax: f64,
        ymax: f64,
        srid: i32,
    ) -> Result<(), BboxError> {
        if xmin >= xmax || ymin >= ymax {
            return Err(rejected(xmin, ymin, xmax, ymax));
        }
        self.commit(registry, [xmin, ymin, xmax, ymax], srid)
    }

    /// Resolve `srid`, then store everything at once. Coordinates only have
    /// to be finite real values here; ordering is the caller's business.
    fn commit(
        &mut self,
        registry: &SrsRegistry<'_>,
        [xmin, ymin, xmax, ymax]: [f64; 4],
        srid: i32,
    ) -> Result<(), BboxError> {
        if [xmin, ymin, xmax, ymax]
            .iter()
            .any(|v| !v.is_finite() || is_sentinel(*v))
        {
            return Err(rejected(xmin, ymin, xmax, ymax));
        }

        let srs = registry.resolve_by_srid(srid)?;
        *self = Self {
            xmin,
            ymin,
            xmax,
            ymax,
            srs,
        };
        Ok(())
    }

    /// Set from a `xmin,ymin,xmax,ymax` string, as in a WFS `BBOX` parameter.
    pub fn set_from_text(
        &mut self,
        registry: &SrsRegistry<'_>,
        text: &str,
        srid: i32,
    ) -> Result<(), BboxError> {
        let values = text
            .split(',')
            .map(|token| token.trim().parse::<f64>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|_| BboxError::Malformed(text.to_string()))?;

        let [xmin, ymin, xmax, ymax] = values.as_slice() else {
            return Err(BboxError::Malformed(text.to_string()));
        };
        self.set(registry, *xmin, *ymin, *xmax, *ymax, srid)
    }

    /// Set from a geographic extent; the result is in EPSG:4326.
    ///
    /// Unlike [`BoundingBox::set`], a zero-width or zero-height extent is
    /// kept: a layer holding a single point has one.
    pub fn set_from_geo_extent(
        &mut self,
        registry: &SrsRegistry<'_>,
        geo: &GeoBoundingBox,
    ) -> Result<(), BboxError> {
        self.commit(
            registry,
            [
                geo.west.min(geo.east),
                geo.north.min(geo.south),
                geo.west.max(geo.east),
                geo.north.max(geo.south),
            ],
            WGS84_SRID,
        )
    }

    /// Union extent of every geometry column of `layers`, each restricted by
    /// the row filter at the same position (a trailing SQL clause such as
    /// `WHERE id = 3`, or empty).
    ///
    /// Mismatched lengths, or no layers at all, yield the unbounded box
    /// without touching the database. An empty result does too. The box takes
    /// the reference of the first layer only.
    ///
    /// # Panics
    ///
    /// Panics if a layer name is not configured.
    pub fn aggregate_extent(
        registry: &SrsRegistry<'_>,
        layers: &[&str],
        filters: &[&str],
    ) -> Result<Self, BboxError> {
        let mut bbox = Self::unbounded();
        if layers.len() != filters.len() || layers.is_empty() {
            tracing::debug!(
                layers = layers.len(),
                filters = filters.len(),
                "extent aggregation skipped"
            );
            return Ok(bbox);
        }

        let query = extent_query(registry, layers, filters);
        tracing::debug!(%query, "aggregating layer extent");
        let rows = registry.executor().query(&query)?;
        let Some(row) = rows.first() else {
            return Ok(bbox);
        };
        if (0..4).any(|idx| row.is_null(idx)) {
            return Ok(bbox);
        }

        let srs = registry.resolve_by_srid(registry.layer_srid(layers[0]))?;
        bbox.xmin = row.float(0)?;
        bbox.ymin = row.float(1)?;
        bbox.xmax = row.float(2)?;
        bbox.ymax = row.float(3)?;
        bbox.srs = srs;
        Ok(bbox)
    }

    /// Reproject into `target_srid`.
    ///
    /// Coordinates and the target reference come back from a single query
    /// and are committed together; on any failure the box is left as it was.
    pub fn transform(
        &mut self,
        registry: &SrsRegistry<'_>,
        target_srid: i32,
    ) -> Result<(), BboxError> {
        if self.is_unbounded() || self.srs.is_unset() || target_srid == UNSET_SRID {
            return Err(BboxError::Unreferenced(self.to_string()));
        }

        let query = transform_query(self, target_srid)?;
        tracing::debug!(%query, from = self.srs.srid(), to = target_srid, "reprojecting bbox");
        let rows = registry.executor().query(&query)?;
        let [row] = rows.as_slice() else {
            return Err(SrsError::NotFoundBySrid(target_srid).into());
        };

        *self = Self::from_transform_row(row, target_srid)?;
        Ok(())
    }

    fn from_transform_row(row: &SqlRow, srid: i32) -> Result<Self, SqlError> {
        Ok(Self {
            xmin: row.float(0)?,
            ymin: row.float(1)?,
            xmax: row.float(2)?,
            ymax: row.float(3)?,
            srs: SpatialReference::from_catalog_columns(srid, row, 4)?,
        })
    }

    /// The box as a PostGIS `box2d` expression carrying its srid.
    pub fn to_sql(&self) -> Result<String, SqlError> {
        sql::box2d_literal(self.xmin, self.ymin, self.xmax, self.ymax, self.srs.srid())
    }
}

impl fmt::Display for BoundingBox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_unbounded() {
            return f.write_str("[unbounded]");
        }
        write!(f, "[{},{},{},{}]", self.xmin, self.ymin, self.xmax, self.ymax)
    }
}

fn rejected(xmin: f64, ymin: f64, xmax: f64, ymax: f64) -> BboxError {
    tracing::warn!(xmin, ymin, xmax, ymax, "rejected bounding box");
    BboxError::InvalidExtent {
        xmin,
        ymin,
        xmax,
        ymax,
    }
}

fn is_sentinel(value: f64) -> bool {
    value == SENTINEL_MIN || value == SENTINEL_MAX
}

fn extent_query(registry: &SrsRegistry<'_>, layers: &[&str], filters: &[&str]) -> String {
    let branches: Vec<String> = layers
        .iter()
        .zip(filters)
        .flat_map(|(name, filter)| {
            let layer = registry.layers().expect_layer(name);
            let table = layer.qualified_table();
            layer
                .geometry_columns
                .iter()
                .map(move |column| {
                    let branch = format!(
                        "(SELECT {}::geometry AS \"the_geom\" FROM {table} {filter}",
                        sql::quote_ident(column)
                    );
                    format!("{})", branch.trim_end())
                })
                .collect::<Vec<_>>()
        })
        .collect();

    format!(
        "SELECT ST_XMin(g.extent), ST_YMin(g.extent), ST_XMax(g.extent), ST_YMax(g.extent) \
         FROM (SELECT ST_Extent(foo.the_geom) AS extent FROM ({}) AS foo) AS g",
        branches.join(" UNION ALL ")
    )
}

fn transform_query(bbox: &BoundingBox, target_srid: i32) -> Result<String, SqlError> {
    let source = sql::box_text(bbox.xmin, bbox.ymin, bbox.xmax, bbox.ymax)?;
    Ok(format!(
        "SELECT ST_XMin(g.geom), ST_YMin(g.geom), ST_XMax(g.geom), ST_YMax(g.geom), \
         s.auth_name, s.auth_srid, s.proj4text \
         FROM (SELECT ST_Transform(ST_SetSRID('{source}'::box2d::geometry, {}), {target_srid}) AS geom) AS g, \
         spatial_ref_sys AS s WHERE s.srid = {target_srid}",
        bbox.srs.srid()
    ))
}
