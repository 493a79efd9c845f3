use geofilter_ows::{SqlError, SrsError};

/// Why a filter could not be compiled.
///
/// Only [`FeError::Units`] is non-halting: compilation records it and keeps
/// going. Every other kind aborts the operator being compiled.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FeError {
    #[error("malformed number `{0}`")]
    Parse(String),
    #[error("unexpected filter structure: {0}")]
    Structural(String),
    #[error("srsName `{srs_name}` does not match srid {srid}")]
    SrsMismatch { srs_name: String, srid: i32 },
    #[error(transparent)]
    Srs(#[from] SrsError),
    #[error("unsupported distance unit `{0}`")]
    Units(String),
    #[error("`{0}` is not a spatial operator")]
    UnknownOperator(String),
    #[error(transparent)]
    Engine(SqlError),
    #[error("malformed XML: {0}")]
    Xml(String),
}

impl From<SqlError> for FeError {
    fn from(err: SqlError) -> Self {
        match err {
            SqlError::NonFinite(value) => FeError::Parse(value.to_string()),
            other => FeError::Engine(other),
        }
    }
}

impl FeError {
    /// Stable name for protocol-level error reports.
    pub fn kind(&self) -> &'static str {
        match self {
            FeError::Parse(_) => "ParseError",
            FeError::Structural(_) => "StructuralError",
            FeError::SrsMismatch { .. } => "SrsMismatchError",
            FeError::Srs(SrsError::UnrecognizedName(_)) => "UnrecognizedSrsNameError",
            FeError::Srs(SrsError::Engine(_)) | FeError::Engine(_) => "EngineError",
            FeError::Srs(_) => "SrsNotFoundError",
            FeError::Units(_) => "UnitsError",
            FeError::UnknownOperator(_) => "UnknownOperatorError",
            FeError::Xml(_) => "XmlError",
        }
    }

    pub fn is_fatal(&self) -> bool {
        !matches!(self, FeError::Units(_))
    }

    pub(crate) fn structural(message: impl Into<String>) -> Self {
        FeError::Structural(message.into())
    }
}
