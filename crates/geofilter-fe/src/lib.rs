//! Filter Encoding spatial operators for geofilter
//!
//! Compiles the spatial part of an OGC filter into a PostGIS predicate:
//! - topological operators -> `ST_<Op>(column, geometry)`
//! - DWithin / Beyond -> centroid distance in meters
//! - BBOX -> `st_intersects(column, box2d)`
//!
//! Property names and GML geometries are handed to the caller's
//! [`ColumnResolver`] and [`GeometryTranslator`]; envelopes are compiled here.

pub mod context;
pub mod envelope;
pub mod error;
pub mod operator;
pub mod spatial;
pub mod xml;

#[cfg(test)]
mod test_support;

pub use context::{ColumnResolver, CompileContext, CompiledSql, GeometryTranslator};
pub use envelope::{compile_envelope, normalize_gml2_coordinates, parse_envelope, Corner, Envelope};
pub use error::FeError;
pub use operator::{is_spatial_operator, OperatorFamily, SpatialOperator};
pub use spatial::{compile, compile_filter, GeometryOperand};
pub use xml::{XmlElement, XmlNode};
