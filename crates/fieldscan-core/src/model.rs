use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

use crate::error::FieldscanError;
use crate::placement::column::column_to_letters;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    #[default]
    Single,
    Table,
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldType::Single => write!(f, "single"),
            FieldType::Table => write!(f, "table"),
        }
    }
}

/// A named rectangle in page-pixel coordinates at the rendering DPI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Region {
    pub name: String,
    pub x: i64,
    pub y: i64,
    pub w: i64,
    pub h: i64,
    /// Pixel padding added on every side before cropping.
    #[serde(default)]
    pub tolerance: u32,
    #[serde(default)]
    pub field_type: FieldType,
}

impl Region {
    pub fn new(name: impl Into<String>, x: i64, y: i64, w: i64, h: i64) -> Self {
        Region {
            name: name.into(),
            x,
            y,
            w,
            h,
            tolerance: 0,
            field_type: FieldType::Single,
        }
    }

    pub fn with_tolerance(mut self, tolerance: u32) -> Self {
        self.tolerance = tolerance;
        self
    }

    pub fn table(mut self) -> Self {
        self.field_type = FieldType::Table;
        self
    }

    pub fn is_table(&self) -> bool {
        self.field_type == FieldType::Table
    }
}

/// A named, reusable collection of regions applied to every page of a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegionSet {
    pub set_name: String,
    #[serde(rename = "rois")]
    pub regions: Vec<Region>,
}

impl RegionSet {
    pub fn new(set_name: impl Into<String>, regions: Vec<Region>) -> Self {
        RegionSet {
            set_name: set_name.into(),
            regions,
        }
    }

    pub fn region(&self, name: &str) -> Option<&Region> {
        self.regions.iter().find(|r| r.name == name)
    }

    /// Check that the set is well-formed: a name, unique region names and
    /// positive region sizes.
    pub fn validate(&self) -> Result<(), FieldscanError> {
        if self.set_name.trim().is_empty() {
            return Err(FieldscanError::InvalidRegion(
                "region set name must not be empty".into(),
            ));
        }

        let mut seen = HashSet::new();
        for region in &self.regions {
            if region.name.trim().is_empty() {
                return Err(FieldscanError::InvalidRegion(format!(
                    "set '{}' contains a region without a name",
                    self.set_name
                )));
            }
            if !seen.insert(region.name.as_str()) {
                return Err(FieldscanError::InvalidRegion(format!(
                    "duplicate region name '{}' in set '{}'",
                    region.name, self.set_name
                )));
            }
            if region.w <= 0 || region.h <= 0 {
                return Err(FieldscanError::InvalidRegion(format!(
                    "region '{}' has non-positive size {}x{}",
                    region.name, region.w, region.h
                )));
            }
        }

        Ok(())
    }
}

/// Blank `target_field` when it contains `exclude_text`, together with every
/// field in `linked_fields` on the same page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExclusionRule {
    pub target_field: String,
    pub exclude_text: String,
    #[serde(default)]
    pub linked_fields: Vec<String>,
}

/// One recognized text fragment from a table region, in crop coordinates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    pub text: String,
    pub left: i64,
    pub top: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
}

impl Token {
    pub fn new(text: impl Into<String>, left: i64, top: i64) -> Self {
        Token {
            text: text.into(),
            left,
            top,
            height: None,
        }
    }

    pub fn with_height(mut self, height: u32) -> Self {
        self.height = Some(height);
        self
    }
}

/// Recognized value of one region on one page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldValue {
    Single(String),
    /// Outer index is the row, inner index the column within the row.
    Table(Vec<Vec<String>>),
}

impl FieldValue {
    pub fn empty(field_type: FieldType) -> Self {
        match field_type {
            FieldType::Single => FieldValue::Single(String::new()),
            FieldType::Table => FieldValue::Table(Vec::new()),
        }
    }

    /// Number of spreadsheet rows this value occupies (at least one).
    pub fn height(&self) -> u32 {
        match self {
            FieldValue::Single(_) => 1,
            FieldValue::Table(rows) => (rows.len() as u32).max(1),
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            FieldValue::Single(s) => s.trim().is_empty(),
            FieldValue::Table(rows) => rows.iter().flatten().all(|c| c.trim().is_empty()),
        }
    }
}

/// A single value placed into a spreadsheet cell. Rows and columns are 1-based.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CellWrite {
    pub row: u32,
    pub column: u32,
    pub value: String,
}

impl CellWrite {
    pub fn new(row: u32, column: u32, value: impl Into<String>) -> Self {
        CellWrite {
            row,
            column,
            value: value.into(),
        }
    }

    /// A1-style reference, e.g. `C7`.
    pub fn cell_ref(&self) -> String {
        format!("{}{}", column_to_letters(self.column), self.row)
    }
}

impl fmt::Display for CellWrite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.cell_ref(), self.value)
    }
}
