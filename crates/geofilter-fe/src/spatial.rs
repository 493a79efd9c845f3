//! Spatial operators compiled to PostGIS predicates.
//!
//! | family       | operators                          | SQL                                                   |
//! |--------------|------------------------------------|-------------------------------------------------------|
//! | topological  | Equals .. Contains                 | `ST_<Op>(column, geometry)`                           |
//! | distance     | DWithin, Beyond                    | `ST_Distance[_sphere](ST_centroid(..),ST_centroid(..)) < d` |
//! | bbox         | BBOX                               | `st_intersects(column, box2d)`                        |
//!
//! Each family builds its fragment on the side and appends it to the
//! [`CompiledSql`] once complete, so a fatal error leaves the accumulator as
//! it was.

use geofilter_ows::sql::{format_float, string_literal};

use crate::context::{CompileContext, CompiledSql};
use crate::envelope::{compile_envelope, is_envelope_element, parse_number};
use crate::error::FeError;
use crate::operator::{OperatorFamily, SpatialOperator};
use crate::xml::XmlElement;

/// The second (or first) operand of a spatial operator.
#[derive(Debug, Clone, PartialEq)]
pub enum GeometryOperand<'e> {
    PropertyReference(String),
    Envelope(&'e XmlElement),
    OtherGeometry(&'e XmlElement),
}

impl<'e> GeometryOperand<'e> {
    pub fn classify(element: &'e XmlElement) -> Self {
        match element.name() {
            "PropertyName" | "ValueReference" => {
                GeometryOperand::PropertyReference(element.text().trim().to_string())
            }
            _ if is_envelope_element(element) => GeometryOperand::Envelope(element),
            _ => GeometryOperand::OtherGeometry(element),
        }
    }
}

/// Compile one spatial operator element for `layer`, appending to `sql`.
///
/// A fatal error is returned and also recorded in `sql` (first error wins);
/// a non-halting one is only recorded. Either way `sql.finish()` refuses to
/// hand out the text afterwards.
///
/// # Panics
///
/// Panics if `layer` is not configured.
pub fn compile(
    ctx: &CompileContext<'_>,
    layer: &str,
    sql: &mut CompiledSql,
    element: &XmlElement,
) -> Result<(), FeError> {
    let outcome = compile_operator(ctx, layer, sql, element);
    if let Err(err) = &outcome {
        sql.record(err.clone());
    }
    outcome
}

fn compile_operator(
    ctx: &CompileContext<'_>,
    layer: &str,
    sql: &mut CompiledSql,
    element: &XmlElement,
) -> Result<(), FeError> {
    let op: SpatialOperator = element.name().parse()?;
    tracing::debug!(operator = %op, layer, "compiling spatial operator");

    match op.family() {
        OperatorFamily::Topological => compile_topological(ctx, layer, sql, op, element),
        OperatorFamily::Distance => compile_distance(ctx, layer, sql, op, element),
        OperatorFamily::Bbox => compile_bbox(ctx, layer, sql, element),
    }
}

/// Parse `xml` (a spatial operator, or a `Filter` holding exactly one) and
/// compile it into an executable predicate.
pub fn compile_filter(ctx: &CompileContext<'_>, layer: &str, xml: &str) -> Result<String, FeError> {
    let root = XmlElement::parse(xml)?;
    let operator = if root.name() == "Filter" {
        let mut children = root.element_children();
        match (children.next(), children.next()) {
            (Some(only), None) => only,
            _ => {
                return Err(FeError::structural(
                    "Filter must hold exactly one spatial operator",
                ))
            }
        }
    } else {
        &root
    };

    let mut sql = CompiledSql::new();
    // The error also lands in `sql`, which `finish` reports.
    let _ = compile(ctx, layer, &mut sql, operator);
    sql.finish()
}

fn compile_topological(
    ctx: &CompileContext<'_>,
    layer: &str,
    sql: &mut CompiledSql,
    op: SpatialOperator,
    element: &XmlElement,
) -> Result<(), FeError> {
    let function = op
        .sql_function()
        .ok_or_else(|| FeError::UnknownOperator(op.name().to_string()))?;
    let mut operands = element.element_children();

    let column = property_column(ctx, layer, op, operands.next(), true)?;
    let geometry = match operands.next().map(GeometryOperand::classify) {
        Some(GeometryOperand::Envelope(envelope)) => compile_envelope(ctx, layer, envelope)?,
        Some(GeometryOperand::OtherGeometry(geometry)) => {
            string_literal(&ctx.geometry.geometry_sql(geometry)?)
        }
        Some(GeometryOperand::PropertyReference(_)) | None => {
            return Err(FeError::structural(format!(
                "{op} needs a geometry as second operand"
            )))
        }
    };

    sql.push_str(&format!("{function}({column},{geometry})"));
    Ok(())
}

fn compile_distance(
    ctx: &CompileContext<'_>,
    layer: &str,
    sql: &mut CompiledSql,
    op: SpatialOperator,
    element: &XmlElement,
) -> Result<(), FeError> {
    let comparator = op
        .distance_comparator()
        .ok_or_else(|| FeError::UnknownOperator(op.name().to_string()))?;
    // Distance_sphere only accepts points, hence the centroids; planar
    // distances take them too so both kinds of layer behave alike.
    let function = if ctx.registry.layer_unit_is_meters(layer) {
        "ST_Distance"
    } else {
        "ST_Distance_sphere"
    };
    let mut operands = element.element_children();

    let column = property_column(ctx, layer, op, operands.next(), false)?;
    let geometry = match operands.next().map(GeometryOperand::classify) {
        Some(GeometryOperand::Envelope(geometry) | GeometryOperand::OtherGeometry(geometry)) => {
            string_literal(&ctx.geometry.geometry_sql(geometry)?)
        }
        Some(GeometryOperand::PropertyReference(_)) | None => {
            return Err(FeError::structural(format!(
                "{op} needs a geometry as second operand"
            )))
        }
    };
    let distance = operands
        .next()
        .filter(|d| d.name() == "Distance")
        .ok_or_else(|| FeError::structural(format!("{op} needs a Distance element")))?;

    let value = parse_number(&distance.text())?;
    let meters = match distance.attribute("units") {
        Some("meters" | "#metre") => value,
        Some("kilometers" | "#kilometre") => value * 1000.0,
        other => {
            sql.record(FeError::Units(other.unwrap_or_default().to_string()));
            value
        }
    };

    sql.push_str(&format!(
        "{function}(ST_centroid({column}),ST_centroid({geometry})) {comparator} {}",
        format_float(meters)?
    ));
    Ok(())
}

fn compile_bbox(
    ctx: &CompileContext<'_>,
    layer: &str,
    sql: &mut CompiledSql,
    element: &XmlElement,
) -> Result<(), FeError> {
    let mut operands = element.element_children();

    let column = property_column(ctx, layer, SpatialOperator::Bbox, operands.next(), true)?;
    let envelope = match operands.next().map(GeometryOperand::classify) {
        Some(GeometryOperand::Envelope(envelope)) => compile_envelope(ctx, layer, envelope)?,
        Some(GeometryOperand::PropertyReference(_) | GeometryOperand::OtherGeometry(_)) | None => {
            return Err(FeError::structural(
                "BBOX needs a Box or Envelope as second operand",
            ))
        }
    };

    sql.push_str(&format!("st_intersects({column},{envelope})"));
    Ok(())
}

/// SQL for the first operand, wrapped in `st_transform` when the request
/// asks for another SRID than the layer is stored in (and `transform` is set).
fn property_column(
    ctx: &CompileContext<'_>,
    layer: &str,
    op: SpatialOperator,
    operand: Option<&XmlElement>,
    transform: bool,
) -> Result<String, FeError> {
    let property = match operand.map(GeometryOperand::classify) {
        Some(GeometryOperand::PropertyReference(name)) => name,
        _ => {
            return Err(FeError::structural(format!(
                "{op} needs a property name as first operand"
            )))
        }
    };

    let column = ctx.columns.column_sql(layer, &property)?;
    match ctx.transform_srid(layer).filter(|_| transform) {
        Some(srid) => Ok(format!("st_transform({column},{srid})")),
        None => Ok(column),
    }
}
