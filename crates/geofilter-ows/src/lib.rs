//! OWS-side metadata for geofilter
//!
//! Everything the Filter Encoding compiler needs to know about the service it
//! runs in:
//! - configured layers and their storage srid / linear unit
//! - spatial references resolved from `spatial_ref_sys`
//! - bounding boxes (parsing, validation, extent aggregation, reprojection)
//! - the blocking SQL seam ([`sql::SqlExecutor`]) all of the above query through

pub mod bbox;
pub mod config;
pub mod layer;
pub mod sql;
pub mod srs;

#[cfg(any(test, feature = "test-support"))]
pub mod testing;

pub use bbox::{BboxError, BoundingBox, GeoBoundingBox};
pub use config::ServiceConfig;
pub use layer::{Layer, LayerCatalog, LinearUnit};
pub use sql::{SqlError, SqlExecutor, SqlRow};
pub use srs::{SpatialReference, SrsError, SrsRegistry, UNSET_SRID, WGS84_SRID};
