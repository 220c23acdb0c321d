//! # Arm locations
//!
//! A [`Location`] is an ordered list of axis values, either joint positions or a Cartesian pose
//! (x, y, z, yaw, pitch, roll). Locations are written in configuration files and sent to the
//! controller as whitespace separated numbers, optionally tagged with the location type:
//!
//! ```text
//! j 410.2 -12.5 175.0 3.1 122.0 0.0
//! c 300.0 -55.0 212.5 0.0 90.0 180.0
//! ```
//!
//! Untagged locations are joint locations.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::{Deserialize, Serialize};
use std::convert::TryFrom;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// Index of the vertical column axis in a joint location.
pub const JOINT_Z_AXIS: usize = 0;

/// Index of the gripper axis in a joint location.
pub const GRIPPER_AXIS: usize = 4;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// A joint or Cartesian arm location.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Location {
    pub values: Vec<f64>,
    pub loc_type: LocType,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LocType {
    Joint,
    Cartesian,
}

#[derive(Debug, Error)]
pub enum LocationError {
    #[error("The location has no values")]
    Empty,

    #[error("\"{0}\" is not a valid location value")]
    InvalidValue(String),

    #[error("Cannot offset a joint location in x or y (x = {0}, y = {1})")]
    JointOffset(f64, f64),

    #[error("Cannot add a {0:?} location to a {1:?} location")]
    TypeMismatch(LocType, LocType),

    #[error("Cannot add a location with {0} values to one with {1}")]
    LengthMismatch(usize, usize),
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl Location {
    pub fn new(loc_type: LocType, values: Vec<f64>) -> Self {
        Self { values, loc_type }
    }

    pub fn joint(values: Vec<f64>) -> Self {
        Self::new(LocType::Joint, values)
    }

    pub fn cartesian(values: Vec<f64>) -> Self {
        Self::new(LocType::Cartesian, values)
    }

    pub fn is_joint(&self) -> bool {
        self.loc_type == LocType::Joint
    }

    /// Apply an x/y/z offset.
    ///
    /// Cartesian locations are offset in their first three values. Joint locations can only be
    /// offset vertically, which moves the column axis.
    pub fn offset(&self, x: f64, y: f64, z: f64) -> Result<Location, LocationError> {
        let mut values = self.values.clone();

        match self.loc_type {
            LocType::Cartesian => {
                for (v, o) in values.iter_mut().zip(&[x, y, z]) {
                    *v += o;
                }
            }
            LocType::Joint => {
                if x != 0.0 || y != 0.0 {
                    return Err(LocationError::JointOffset(x, y));
                }
                if let Some(v) = values.get_mut(JOINT_Z_AXIS) {
                    *v += z;
                }
            }
        }

        Ok(Location::new(self.loc_type, values))
    }

    /// Add another location element-wise.
    ///
    /// The other location may be shorter than this one, missing values count as zero.
    pub fn checked_add(&self, other: &Location) -> Result<Location, LocationError> {
        if self.loc_type != other.loc_type {
            return Err(LocationError::TypeMismatch(other.loc_type, self.loc_type));
        }
        if other.values.len() > self.values.len() {
            return Err(LocationError::LengthMismatch(
                other.values.len(),
                self.values.len(),
            ));
        }

        let mut values = self.values.clone();
        for (v, o) in values.iter_mut().zip(&other.values) {
            *v += o;
        }

        Ok(Location::new(self.loc_type, values))
    }

    /// Format the values the way the controller expects them in motion commands.
    pub fn to_controller_string(&self) -> String {
        self.values
            .iter()
            .map(|v| format!("{:.3}", v))
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Parse the values of a controller position reply (`wherej`/`wherec`), taking at most
    /// `max_values` of them.
    pub fn from_controller_reply(
        loc_type: LocType,
        reply: &str,
        max_values: usize,
    ) -> Result<Location, LocationError> {
        let values = reply
            .split_whitespace()
            .take(max_values)
            .map(parse_value)
            .collect::<Result<Vec<f64>, _>>()?;

        if values.is_empty() {
            return Err(LocationError::Empty);
        }

        Ok(Location::new(loc_type, values))
    }
}

impl LocType {
    pub fn tag(&self) -> &'static str {
        match self {
            LocType::Joint => "j",
            LocType::Cartesian => "c",
        }
    }
}

impl FromStr for Location {
    type Err = LocationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut tokens = s.split_whitespace().peekable();

        let loc_type = match tokens.peek().map(|t| t.to_ascii_lowercase()) {
            Some(t) if t == "j" => {
                tokens.next();
                LocType::Joint
            }
            Some(t) if t == "c" => {
                tokens.next();
                LocType::Cartesian
            }
            _ => LocType::Joint,
        };

        let values = tokens.map(parse_value).collect::<Result<Vec<f64>, _>>()?;

        if values.is_empty() {
            return Err(LocationError::Empty);
        }

        Ok(Location::new(loc_type, values))
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.loc_type.tag(), self.to_controller_string())
    }
}

impl TryFrom<String> for Location {
    type Error = LocationError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<Location> for String {
    fn from(l: Location) -> Self {
        l.to_string()
    }
}

// ------------------------------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ------------------------------------------------------------------------------------------------

fn parse_value(token: &str) -> Result<f64, LocationError> {
    token
        .parse::<f64>()
        .map_err(|_| LocationError::InvalidValue(token.to_string()))
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_parse_and_format() {
        let l: Location = "c 300 -55.25 212.5 0 90 180".parse().unwrap();
        assert_eq!(l.loc_type, LocType::Cartesian);
        assert_eq!(l.values, vec![300.0, -55.25, 212.5, 0.0, 90.0, 180.0]);
        assert_eq!(
            l.to_string(),
            "c 300.000 -55.250 212.500 0.000 90.000 180.000"
        );

        // Formatting rounds to three decimals and parses back to the same values
        let l: Location = "J 1.23456 2 3".parse().unwrap();
        assert_eq!(l.loc_type, LocType::Joint);
        let back: Location = l.to_string().parse().unwrap();
        assert_eq!(back.values, vec![1.235, 2.0, 3.0]);

        // Untagged locations are joint locations
        let l: Location = " 10 20 ".parse().unwrap();
        assert!(l.is_joint());
        assert_eq!(l.to_controller_string(), "10.000 20.000");
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!("".parse::<Location>(), Err(LocationError::Empty)));
        assert!(matches!("c".parse::<Location>(), Err(LocationError::Empty)));
        assert!(matches!(
            "j 1 two 3".parse::<Location>(),
            Err(LocationError::InvalidValue(_))
        ));
    }

    #[test]
    fn test_offsets() {
        let c = Location::cartesian(vec![1.0, 2.0, 3.0, 0.0, 90.0, 180.0]);
        assert_eq!(
            c.offset(1.0, -1.0, 10.0).unwrap().values,
            vec![2.0, 1.0, 13.0, 0.0, 90.0, 180.0]
        );

        let j = Location::joint(vec![100.0, 5.0, 6.0, 7.0, 120.0]);
        assert_eq!(
            j.offset(0.0, 0.0, 25.0).unwrap().values,
            vec![125.0, 5.0, 6.0, 7.0, 120.0]
        );
        assert!(matches!(
            j.offset(1.0, 0.0, 0.0),
            Err(LocationError::JointOffset(..))
        ));
    }

    #[test]
    fn test_checked_add() {
        let base = Location::cartesian(vec![1.0, 2.0, 3.0, 4.0]);
        let cp = Location::cartesian(vec![0.0, 0.0, 50.0]);
        assert_eq!(
            base.checked_add(&cp).unwrap().values,
            vec![1.0, 2.0, 53.0, 4.0]
        );

        assert!(matches!(
            base.checked_add(&Location::joint(vec![1.0])),
            Err(LocationError::TypeMismatch(..))
        ));
        assert!(matches!(
            cp.checked_add(&base),
            Err(LocationError::LengthMismatch(4, 3))
        ));
    }

    #[test]
    fn test_serde() {
        let l: Location = serde_json::from_str("\"c 1 2 3\"").unwrap();
        assert_eq!(l, Location::cartesian(vec![1.0, 2.0, 3.0]));
        assert_eq!(
            serde_json::to_string(&l).unwrap(),
            "\"c 1.000 2.000 3.000\""
        );
        assert!(serde_json::from_str::<Location>("\"c x\"").is_err());
    }

    #[test]
    fn test_controller_reply() {
        let l = Location::from_controller_reply(LocType::Cartesian, "1 2 3 4 5 6 1", 6).unwrap();
        assert_eq!(l.values.len(), 6);
    }
}
