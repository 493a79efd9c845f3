//! GML envelope literals (`gml:Box`, `gml:Envelope`) to PostGIS `box2d`.

use std::borrow::Cow;
use std::sync::OnceLock;

use geofilter_ows::sql;
use regex::Regex;

use crate::context::CompileContext;
use crate::error::FeError;
use crate::xml::XmlElement;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Corner {
    pub x: f64,
    pub y: f64,
}

/// Two corners exactly as written; no min/max sorting happens.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Envelope {
    pub lower: Corner,
    pub upper: Corner,
}

/// `Box` (GML2) or `Envelope` (GML3).
pub fn is_envelope_element(element: &XmlElement) -> bool {
    matches!(element.name(), "Box" | "Envelope")
}

fn gml2_coordinates() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[0-9eE.+-]+,").unwrap())
}

/// Turn GML2 `x1,y1 x2,y2` into `x1 y1,x2 y2` by swapping every comma and
/// space. Text whose first separator is not a comma is returned untouched,
/// which makes the operation idempotent.
pub fn normalize_gml2_coordinates(text: &str) -> Cow<'_, str> {
    if !gml2_coordinates().is_match(text) {
        return Cow::Borrowed(text);
    }
    Cow::Owned(
        text.chars()
            .map(|c| match c {
                ' ' => ',',
                ',' => ' ',
                c => c,
            })
            .collect(),
    )
}

/// Parse a `Box` or `Envelope` element.
pub fn parse_envelope(element: &XmlElement) -> Result<Envelope, FeError> {
    match element.name() {
        "Envelope" => parse_gml3(element),
        "Box" => parse_gml2(element),
        other => Err(FeError::structural(format!(
            "expected Box or Envelope, found {other}"
        ))),
    }
}

/// Compile an envelope element into
/// `setsrid('BOX(minx miny,maxx maxy)'::box2d,srid)`.
///
/// The srid is the request's override when given, else the layer's. An
/// `srsName` on the element has to mention that srid.
pub fn compile_envelope(
    ctx: &CompileContext<'_>,
    layer: &str,
    element: &XmlElement,
) -> Result<String, FeError> {
    let srid = ctx.target_srid(layer);

    if let Some(srs_name) = element.attribute("srsName") {
        if !srs_name.contains(&srid.to_string()) {
            return Err(FeError::SrsMismatch {
                srs_name: srs_name.to_string(),
                srid,
            });
        }
    }

    let Envelope { lower, upper } = parse_envelope(element)?;
    Ok(sql::box2d_literal(lower.x, lower.y, upper.x, upper.y, srid)?)
}

fn parse_gml3(element: &XmlElement) -> Result<Envelope, FeError> {
    let mut corners = element.element_children();
    let (Some(lower), Some(upper)) = (corners.next(), corners.next()) else {
        return Err(FeError::structural(
            "Envelope needs a lower and an upper corner",
        ));
    };
    Ok(Envelope {
        lower: parse_position(&lower.text())?,
        upper: parse_position(&upper.text())?,
    })
}

fn parse_gml2(element: &XmlElement) -> Result<Envelope, FeError> {
    let first = element
        .element_children()
        .next()
        .ok_or_else(|| FeError::structural("Box has no coordinates"))?;

    if first.name() == "coord" {
        return parse_gml2_coords(element);
    }

    let collapsed = first.text().split_whitespace().collect::<Vec<_>>().join(" ");
    let normalized = normalize_gml2_coordinates(&collapsed);
    let mut pairs = normalized.split(',');
    let (Some(lower), Some(upper)) = (pairs.next(), pairs.next()) else {
        return Err(FeError::structural(format!(
            "Box coordinates need two corners, got `{collapsed}`"
        )));
    };
    Ok(Envelope {
        lower: parse_position(lower)?,
        upper: parse_position(upper)?,
    })
}

/// `<gml:coord><gml:X>..</gml:X><gml:Y>..</gml:Y></gml:coord>` twice.
fn parse_gml2_coords(element: &XmlElement) -> Result<Envelope, FeError> {
    let corner = |coord: &XmlElement| -> Result<Corner, FeError> {
        let axis = |name: &str| {
            coord
                .element_children()
                .find(|c| c.name() == name)
                .ok_or_else(|| FeError::structural(format!("coord without {name}")))
                .and_then(|c| parse_number(&c.text()))
        };
        Ok(Corner {
            x: axis("X")?,
            y: axis("Y")?,
        })
    };

    let mut coords = element.element_children().filter(|c| c.name() == "coord");
    let (Some(lower), Some(upper)) = (coords.next(), coords.next()) else {
        return Err(FeError::structural("Box needs two coord elements"));
    };
    Ok(Envelope {
        lower: corner(lower)?,
        upper: corner(upper)?,
    })
}

/// `x y`, separated by any run of whitespace.
fn parse_position(text: &str) -> Result<Corner, FeError> {
    let mut parts = text.split_whitespace();
    let (Some(x), Some(y)) = (parts.next(), parts.next()) else {
        return Err(FeError::structural(format!(
            "position `{}` needs two coordinates",
            text.trim()
        )));
    };
    Ok(Corner {
        x: parse_number(x)?,
        y: parse_number(y)?,
    })
}

/// Parse a finite decimal number; anything else is a [`FeError::Parse`].
pub(crate) fn parse_number(text: &str) -> Result<f64, FeError> {
    let trimmed = text.trim();
    match trimmed.parse::<f64>() {
        Ok(value) if value.is_finite() => Ok(value),
        _ => Err(FeError::Parse(trimmed.to_string())),
    }
}
