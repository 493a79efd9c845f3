//! Blocking SQL transport seam and literal rendering.
//!
//! Every number that ends up inside generated SQL goes through
//! [`format_float`]; identifiers and string literals are quoted with
//! `sqlparser`'s AST types so that their escaping rules are the database's,
//! not ours.

use sqlparser::ast::{Ident, ObjectName, Value};

/// Failure of a round trip to the database, or of rendering a value into SQL.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SqlError {
    #[error("query failed: {0}")]
    Query(String),
    #[error("unexpected result shape: {0}")]
    Shape(String),
    #[error("cannot render non-finite number {0} as SQL")]
    NonFinite(f64),
}

/// One result row in text form, as returned by the libpq text protocol.
/// `None` is SQL `NULL`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SqlRow {
    values: Vec<Option<String>>,
}

impl SqlRow {
    pub fn new(values: Vec<Option<String>>) -> Self {
        Self { values }
    }

    /// Convenience constructor for rows without `NULL`s.
    pub fn from_texts<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            values: values.into_iter().map(|v| Some(v.into())).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn is_null(&self, idx: usize) -> bool {
        matches!(self.values.get(idx), Some(None))
    }

    /// Column text, `None` for `NULL`. A missing column is a shape error.
    pub fn opt_text(&self, idx: usize) -> Result<Option<&str>, SqlError> {
        self.values
            .get(idx)
            .map(|v| v.as_deref())
            .ok_or_else(|| SqlError::Shape(format!("row has no column {idx}")))
    }

    pub fn text(&self, idx: usize) -> Result<&str, SqlError> {
        self.opt_text(idx)?
            .ok_or_else(|| SqlError::Shape(format!("column {idx} is NULL")))
    }

    pub fn int(&self, idx: usize) -> Result<i32, SqlError> {
        let text = self.text(idx)?;
        text.trim()
            .parse()
            .map_err(|_| SqlError::Shape(format!("column {idx} is not an integer: `{text}`")))
    }

    pub fn float(&self, idx: usize) -> Result<f64, SqlError> {
        let text = self.text(idx)?;
        text.trim()
            .parse()
            .map_err(|_| SqlError::Shape(format!("column {idx} is not a number: `{text}`")))
    }
}

/// The blocking query collaborator.
///
/// Implementations wrap a single database connection. Compilation and bbox
/// operations are request scoped, so `&self` is enough; connection types that
/// need `&mut` are expected to hold it behind a `RefCell`.
pub trait SqlExecutor {
    fn query(&self, sql: &str) -> Result<Vec<SqlRow>, SqlError>;
}

/// Render a float as an SQL numeric literal.
///
/// Uses the shortest representation that round-trips, so `1500.0` renders as
/// `1500` and `0.1` as `0.1`.
pub fn format_float(value: f64) -> Result<String, SqlError> {
    if !value.is_finite() {
        return Err(SqlError::NonFinite(value));
    }
    Ok(format!("{value}"))
}

/// `setsrid('BOX(<xmin> <ymin>,<xmax> <ymax>)'::box2d,<srid>)`
pub fn box2d_literal(
    xmin: f64,
    ymin: f64,
    xmax: f64,
    ymax: f64,
    srid: i32,
) -> Result<String, SqlError> {
    Ok(format!(
        "setsrid('{}'::box2d,{srid})",
        box_text(xmin, ymin, xmax, ymax)?
    ))
}

/// `BOX(<xmin> <ymin>,<xmax> <ymax>)`, without quotes.
pub fn box_text(xmin: f64, ymin: f64, xmax: f64, ymax: f64) -> Result<String, SqlError> {
    Ok(format!(
        "BOX({} {},{} {})",
        format_float(xmin)?,
        format_float(ymin)?,
        format_float(xmax)?,
        format_float(ymax)?
    ))
}

/// Double-quoted identifier.
pub fn quote_ident(name: &str) -> String {
    Ident::with_quote('"', name).to_string()
}

/// `"schema"."table"`
pub fn qualified_table(schema: &str, table: &str) -> String {
    ObjectName(vec![
        Ident::with_quote('"', schema),
        Ident::with_quote('"', table),
    ])
    .to_string()
}

/// Single-quoted string literal.
pub fn string_literal(text: &str) -> String {
    Value::SingleQuotedString(text.to_string()).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_float_shortest_form() {
        assert_eq!(format_float(1500.0).unwrap(), "1500");
        assert_eq!(format_float(1.5).unwrap(), "1.5");
        assert_eq!(format_float(-73.25).unwrap(), "-73.25");
        assert_eq!(format_float(1.5 * 1000.0).unwrap(), "1500");
    }

    #[test]
    fn test_format_float_rejects_non_finite() {
        assert!(matches!(format_float(f64::NAN), Err(SqlError::NonFinite(_))));
        assert!(format_float(f64::INFINITY).is_err());
    }

    #[test]
    fn test_box2d_literal() {
        assert_eq!(
            box2d_literal(1.0, 2.0, 3.0, 4.0, 4326).unwrap(),
            "setsrid('BOX(1 2,3 4)'::box2d,4326)"
        );
    }

    #[test]
    fn test_identifier_and_string_quoting() {
        assert_eq!(quote_ident("the_geom"), "\"the_geom\"");
        assert_eq!(qualified_table("public", "roads"), "\"public\".\"roads\"");
        assert_eq!(string_literal("EPSG"), "'EPSG'");
        assert_eq!(string_literal("O'Neil"), "'O''Neil'");
    }

    #[test]
    fn test_row_accessors() {
        let row = SqlRow::new(vec![Some("4326".into()), None, Some(" 2.5 ".into())]);
        assert_eq!(row.int(0).unwrap(), 4326);
        assert!(row.is_null(1));
        assert_eq!(row.opt_text(1).unwrap(), None);
        assert!(matches!(row.text(1), Err(SqlError::Shape(_))));
        assert_eq!(row.float(2).unwrap(), 2.5);
        assert!(row.text(7).is_err());
    }
}
