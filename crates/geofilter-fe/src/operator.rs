//! The Filter Encoding spatial operators.
//!
//! Names are compared case-sensitively: the standard fixes their exact
//! spelling, so `equals` or `Bbox` are simply not operators.

use std::fmt;
use std::str::FromStr;

use crate::error::FeError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SpatialOperator {
    Equals,
    Disjoint,
    Touches,
    Within,
    Overlaps,
    Crosses,
    Intersects,
    Contains,
    DWithin,
    Beyond,
    Bbox,
}

/// How an operator is compiled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperatorFamily {
    /// `ST_<Op>(property, geometry)`
    Topological,
    /// Centroid distance compared against a constant.
    Distance,
    /// `st_intersects(property, envelope)`
    Bbox,
}

impl SpatialOperator {
    pub const ALL: [SpatialOperator; 11] = [
        SpatialOperator::Equals,
        SpatialOperator::Disjoint,
        SpatialOperator::Touches,
        SpatialOperator::Within,
        SpatialOperator::Overlaps,
        SpatialOperator::Crosses,
        SpatialOperator::Intersects,
        SpatialOperator::Contains,
        SpatialOperator::DWithin,
        SpatialOperator::Beyond,
        SpatialOperator::Bbox,
    ];

    /// Element name as spelled by the standard.
    pub fn name(self) -> &'static str {
        match self {
            SpatialOperator::Equals => "Equals",
            SpatialOperator::Disjoint => "Disjoint",
            SpatialOperator::Touches => "Touches",
            SpatialOperator::Within => "Within",
            SpatialOperator::Overlaps => "Overlaps",
            SpatialOperator::Crosses => "Crosses",
            SpatialOperator::Intersects => "Intersects",
            SpatialOperator::Contains => "Contains",
            SpatialOperator::DWithin => "DWithin",
            SpatialOperator::Beyond => "Beyond",
            SpatialOperator::Bbox => "BBOX",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|op| op.name() == name)
    }

    pub fn family(self) -> OperatorFamily {
        match self {
            SpatialOperator::DWithin | SpatialOperator::Beyond => OperatorFamily::Distance,
            SpatialOperator::Bbox => OperatorFamily::Bbox,
            _ => OperatorFamily::Topological,
        }
    }

    /// PostGIS predicate of a topological operator.
    pub fn sql_function(self) -> Option<&'static str> {
        Some(match self {
            SpatialOperator::Equals => "ST_Equals",
            SpatialOperator::Disjoint => "ST_Disjoint",
            SpatialOperator::Touches => "ST_Touches",
            SpatialOperator::Within => "ST_Within",
            SpatialOperator::Overlaps => "ST_Overlaps",
            SpatialOperator::Crosses => "ST_Crosses",
            SpatialOperator::Intersects => "ST_Intersects",
            SpatialOperator::Contains => "ST_Contains",
            SpatialOperator::DWithin | SpatialOperator::Beyond | SpatialOperator::Bbox => {
                return None
            }
        })
    }

    /// Strict comparator of a distance operator.
    pub fn distance_comparator(self) -> Option<&'static str> {
        match self {
            SpatialOperator::DWithin => Some("<"),
            SpatialOperator::Beyond => Some(">"),
            _ => None,
        }
    }
}

impl fmt::Display for SpatialOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for SpatialOperator {
    type Err = FeError;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        Self::from_name(name).ok_or_else(|| FeError::UnknownOperator(name.to_string()))
    }
}

/// True for the eleven spatial operator element names, and nothing else.
pub fn is_spatial_operator(name: &str) -> bool {
    SpatialOperator::from_name(name).is_some()
}
