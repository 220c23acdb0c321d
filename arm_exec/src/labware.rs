//! # Labware catalog
//!
//! Lid handling needs the geometry of the labware involved. The catalog is an external
//! collaborator, [`LabwareCatalog`] is the seam it is reached through and [`JsonLabwareCatalog`]
//! reads it from a JSON file of the form:
//!
//! ```json
//! { "greiner_96": { "height": 14.4, "plate_lid_offset": 5.0, "lid_offset": 2.5 } }
//! ```

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::waypoints::LookupError;

// ------------------------------------------------------------------------------------------------
// TRAITS
// ------------------------------------------------------------------------------------------------

/// Source of labware geometry.
pub trait LabwareCatalog: Send {
    fn lookup(&self, labware: &str) -> Result<LabwareGeometry, LookupError>;
}

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Geometry of a piece of labware, all in mm.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LabwareGeometry {
    /// Height of the plate with its lid on
    pub height: f64,

    /// How far below the top of a lidded plate the lid is gripped
    pub plate_lid_offset: f64,

    /// Height at which a lid resting on a lid stack is gripped
    pub lid_offset: f64,
}

/// Catalog loaded from a JSON file.
#[derive(Debug, Clone, Default)]
pub struct JsonLabwareCatalog {
    entries: HashMap<String, LabwareGeometry>,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum LabwareError {
    #[error("Could not read the labware catalog at {0:?}: {1}")]
    LoadError(PathBuf, std::io::Error),

    #[error("The labware catalog is invalid: {0}")]
    InvalidJson(serde_json::Error),
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl JsonLabwareCatalog {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, LabwareError> {
        let path = path.as_ref();
        let json_str =
            fs::read_to_string(path).map_err(|e| LabwareError::LoadError(path.to_path_buf(), e))?;

        Self::from_json(&json_str)
    }

    pub fn from_json(json_str: &str) -> Result<Self, LabwareError> {
        Ok(Self {
            entries: serde_json::from_str(json_str).map_err(LabwareError::InvalidJson)?,
        })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl LabwareCatalog for JsonLabwareCatalog {
    fn lookup(&self, labware: &str) -> Result<LabwareGeometry, LookupError> {
        self.entries
            .get(labware)
            .copied()
            .ok_or_else(|| LookupError::UnknownLabware(labware.to_string()))
    }
}

#[cfg(test)]
pub(crate) const TEST_LABWARE: &str = r#"{
    "greiner_96": {"height": 14.0, "plate_lid_offset": 4.0, "lid_offset": 3.0},
    "deep_well": {"height": 44.0, "plate_lid_offset": 6.0, "lid_offset": 3.5}
}"#;

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_lookup() {
        let catalog = JsonLabwareCatalog::from_json(TEST_LABWARE).unwrap();

        assert_eq!(catalog.len(), 2);
        assert_eq!(catalog.lookup("deep_well").unwrap().height, 44.0);
        assert_eq!(
            catalog.lookup("tube_rack"),
            Err(LookupError::UnknownLabware("tube_rack".into()))
        );
        assert!(JsonLabwareCatalog::from_json("[1, 2]").is_err());
    }
}
