//! Per-compilation state: collaborators, request SRS, and the SQL accumulator.

use geofilter_ows::{SpatialReference, SrsRegistry};

use crate::error::FeError;
use crate::xml::XmlElement;

/// Maps a property name of a layer to a qualified SQL column expression.
pub trait ColumnResolver {
    fn column_sql(&self, layer: &str, property: &str) -> Result<String, FeError>;
}

/// Translates a GML geometry element into an SQL geometry literal (the text
/// that goes between single quotes, e.g. EWKT).
pub trait GeometryTranslator {
    fn geometry_sql(&self, element: &XmlElement) -> Result<String, FeError>;
}

/// Everything one request's compilation reads. Nothing here is mutated while
/// compiling; output goes to a [`CompiledSql`].
#[derive(Clone, Copy)]
pub struct CompileContext<'a> {
    pub registry: SrsRegistry<'a>,
    pub columns: &'a dyn ColumnResolver,
    pub geometry: &'a dyn GeometryTranslator,
    request_srs: Option<&'a SpatialReference>,
}

impl<'a> CompileContext<'a> {
    pub fn new(
        registry: SrsRegistry<'a>,
        columns: &'a dyn ColumnResolver,
        geometry: &'a dyn GeometryTranslator,
    ) -> Self {
        Self {
            registry,
            columns,
            geometry,
            request_srs: None,
        }
    }

    /// Use the SRS the request asked for (`srsName` of a GetFeature query).
    /// An unset reference is the same as no override.
    pub fn with_request_srs(mut self, srs: &'a SpatialReference) -> Self {
        self.request_srs = (!srs.is_unset()).then_some(srs);
        self
    }

    pub fn request_srs(&self) -> Option<&'a SpatialReference> {
        self.request_srs
    }

    /// SRID literals are compared in: the request's when given, else the layer's.
    ///
    /// # Panics
    ///
    /// Panics if `layer` is not configured.
    pub fn target_srid(&self, layer: &str) -> i32 {
        match self.request_srs {
            Some(srs) => srs.srid(),
            None => self.registry.layer_srid(layer),
        }
    }

    /// The SRID a layer column has to be transformed into, if any.
    ///
    /// # Panics
    ///
    /// Panics if `layer` is not configured.
    pub fn transform_srid(&self, layer: &str) -> Option<i32> {
        let requested = self.request_srs?.srid();
        (requested != self.registry.layer_srid(layer)).then_some(requested)
    }
}

/// Append-only SQL text plus the first error met while producing it.
///
/// The text is only handed out by [`CompiledSql::finish`], and only when no
/// error was recorded, so a fragment built past a non-halting error can never
/// reach the database.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompiledSql {
    sql: String,
    error: Option<FeError>,
}

impl CompiledSql {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_str(&mut self, text: &str) {
        self.sql.push_str(text);
    }

    /// The text so far, for inspection and logging. Not for execution.
    pub fn as_str(&self) -> &str {
        &self.sql
    }

    /// Record `err` unless an error is already recorded.
    pub fn record(&mut self, err: FeError) {
        if self.error.is_none() {
            tracing::warn!(kind = err.kind(), error = %err, "filter compilation error");
            self.error = Some(err);
        }
    }

    pub fn error(&self) -> Option<&FeError> {
        self.error.as_ref()
    }

    pub fn has_error(&self) -> bool {
        self.error.is_some()
    }

    pub fn finish(self) -> Result<String, FeError> {
        match self.error {
            Some(err) => Err(err),
            None => Ok(self.sql),
        }
    }
}
