pub mod column;

use std::collections::HashMap;
use std::fmt;
use std::ops::RangeInclusive;
use std::path::Path;

use serde::Serialize;
use tracing::{debug, warn};

use crate::error::FieldscanError;
use crate::model::{CellWrite, FieldValue, RegionSet};
use crate::sheet::SheetState;
use column::{column_to_letters, resolve_target, MAX_COLUMN};

/// Region name to target column, as given by the operator.
///
/// Targets are column letters (`B`, `AA`) or header names looked up in the
/// header row. Regions without an entry are not exported.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColumnMapping {
    entries: Vec<(String, String)>,
}

impl ColumnMapping {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace the target for `region`.
    pub fn insert(&mut self, region: impl Into<String>, target: impl Into<String>) {
        let region = region.into();
        let target = target.into();
        match self.entries.iter_mut().find(|(r, _)| *r == region) {
            Some(entry) => entry.1 = target,
            None => self.entries.push((region, target)),
        }
    }

    pub fn with(mut self, region: impl Into<String>, target: impl Into<String>) -> Self {
        self.insert(region, target);
        self
    }

    /// Parse `NAME=TARGET` arguments. The last `=` separates the two, so region
    /// names may themselves contain `=`.
    pub fn from_args<S: AsRef<str>>(args: &[S]) -> Result<ColumnMapping, FieldscanError> {
        let mut mapping = ColumnMapping::new();
        for arg in args {
            let arg = arg.as_ref();
            let (region, target) = arg.rsplit_once('=').ok_or_else(|| {
                FieldscanError::Config(format!("mapping '{arg}' must look like NAME=COLUMN"))
            })?;
            if region.trim().is_empty() {
                return Err(FieldscanError::Config(format!(
                    "mapping '{arg}' has an empty region name"
                )));
            }
            mapping.insert(region.trim(), target.trim());
        }
        Ok(mapping)
    }

    /// Load a JSON object `{ "region": "column", ... }`.
    pub fn load(path: &Path) -> Result<ColumnMapping, FieldscanError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            FieldscanError::Config(format!("failed to read {}: {e}", path.display()))
        })?;
        let object: serde_json::Map<String, serde_json::Value> = serde_json::from_str(&content)
            .map_err(|e| {
                FieldscanError::Config(format!("failed to parse {}: {e}", path.display()))
            })?;

        let mut mapping = ColumnMapping::new();
        for (region, target) in object {
            let target = match target {
                serde_json::Value::String(s) => s,
                serde_json::Value::Number(n) => n.to_string(),
                other => {
                    return Err(FieldscanError::Config(format!(
                        "target for region '{region}' must be a string, got {other}"
                    )))
                }
            };
            mapping.insert(region, target);
        }
        Ok(mapping)
    }

    /// Merge `other` into this mapping; its entries win.
    pub fn extend(&mut self, other: ColumnMapping) {
        for (region, target) in other.entries {
            self.insert(region, target);
        }
    }

    pub fn entries(&self) -> &[(String, String)] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Check every entry against the region set and sheet. Runs before any
    /// document is touched so a bad mapping never produces partial output.
    pub fn resolve<S: SheetState + ?Sized>(
        &self,
        set: &RegionSet,
        sheet: &S,
        header_row: u32,
    ) -> Result<ResolvedMapping, FieldscanError> {
        if self.entries.is_empty() {
            return Err(FieldscanError::Config(
                "column mapping is empty; map at least one region".into(),
            ));
        }

        let mut columns = Vec::with_capacity(self.entries.len());
        for (region_name, target) in &self.entries {
            set.region(region_name).ok_or_else(|| {
                FieldscanError::Config(format!(
                    "mapping names region '{region_name}' which is not in set '{}'",
                    set.set_name
                ))
            })?;
            let column = resolve_target(region_name, target, sheet, header_row)?;
            debug!(region = %region_name, target = %target, column = %column_to_letters(column), "mapping resolved");
            columns.push(ResolvedColumn {
                region: region_name.clone(),
                column,
            });
        }

        Ok(ResolvedMapping { columns })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct ResolvedColumn {
    region: String,
    column: u32,
}

/// A mapping whose targets have all been resolved to column indices.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedMapping {
    columns: Vec<ResolvedColumn>,
}

/// First free row below all data already present in the mapped columns.
pub fn start_row<S: SheetState + ?Sized>(mapping: &ResolvedMapping, sheet: &S) -> u32 {
    1 + mapping
        .columns
        .iter()
        .map(|c| sheet.last_occupied_row(c.column))
        .max()
        .unwrap_or(0)
}

/// Two mapped regions on one page landed on the same cell. The region placed
/// first keeps the cell; the other value is dropped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlacementConflict {
    pub row: u32,
    pub column: u32,
    pub kept: String,
    pub dropped: String,
    pub dropped_value: String,
}

impl fmt::Display for PlacementConflict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{} kept '{}', dropped '{}' value '{}'",
            column_to_letters(self.column),
            self.row,
            self.kept,
            self.dropped,
            self.dropped_value
        )
    }
}

/// Cell writes for one page, in the order they must be applied.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PagePlacement {
    pub writes: Vec<CellWrite>,
    pub conflicts: Vec<PlacementConflict>,
}

/// Turns each page's field values into cell writes and owns the row cursor.
///
/// All fields of one page share a row block as tall as the tallest table on
/// that page (at least one row); the next page starts below it. A block never
/// starts above data already present in any column it covers, including the
/// columns a table spills into.
#[derive(Debug, Clone)]
pub struct PlacementEngine {
    mapping: ResolvedMapping,
    start_row: u32,
    cursor: u32,
    pages_placed: usize,
}

impl PlacementEngine {
    pub fn new<S: SheetState + ?Sized>(mapping: ResolvedMapping, sheet: &S) -> Self {
        let start = start_row(&mapping, sheet);
        debug!(start_row = start, "placement cursor initialized");
        PlacementEngine {
            mapping,
            start_row: start,
            cursor: start,
            pages_placed: 0,
        }
    }

    /// Row of the first placed block, or the computed start before any page.
    pub fn start_row(&self) -> u32 {
        self.start_row
    }

    /// Row the next page will be placed on at the earliest.
    pub fn current_row(&self) -> u32 {
        self.cursor
    }

    /// Lay out one page below existing data and advance the cursor past it.
    ///
    /// Values for unmapped regions are ignored. Blank values produce no write
    /// but still occupy their place in the block.
    pub fn place_page<S: SheetState + ?Sized>(
        &mut self,
        values: &[(String, FieldValue)],
        sheet: &S,
    ) -> PagePlacement {
        let page: Vec<(&ResolvedColumn, &FieldValue)> = self
            .mapping
            .columns
            .iter()
            .filter_map(|mapped| {
                values
                    .iter()
                    .find(|(name, _)| *name == mapped.region)
                    .map(|(_, value)| (mapped, value))
            })
            .collect();

        let row = page
            .iter()
            .flat_map(|(mapped, value)| covered_columns(mapped.column, value))
            .map(|column| sheet.last_occupied_row(column) + 1)
            .fold(self.cursor, u32::max);
        if row > self.cursor {
            debug!(cursor = self.cursor, row, "block moved below data in covered columns");
        }
        if self.pages_placed == 0 {
            self.start_row = row;
        }

        let mut placement = PagePlacement::default();
        let mut claimed: HashMap<(u32, u32), &str> = HashMap::new();
        let mut height = 1;

        for (mapped, value) in page {
            height = height.max(value.height());

            let cells: Vec<(u32, u32, &str)> = match value {
                FieldValue::Single(text) => vec![(0, 0, text.as_str())],
                FieldValue::Table(rows) => rows
                    .iter()
                    .enumerate()
                    .flat_map(|(r, cells)| {
                        cells
                            .iter()
                            .enumerate()
                            .map(move |(c, cell)| (r as u32, c as u32, cell.as_str()))
                    })
                    .collect(),
            };

            for (r, c, text) in cells {
                if text.trim().is_empty() {
                    continue;
                }
                let column = mapped.column + c;
                if column > MAX_COLUMN {
                    warn!(region = %mapped.region, column, "table cell beyond last sheet column dropped");
                    continue;
                }
                let cell = (row + r, column);
                if let Some(owner) = claimed.get(&cell) {
                    let conflict = PlacementConflict {
                        row: cell.0,
                        column,
                        kept: owner.to_string(),
                        dropped: mapped.region.clone(),
                        dropped_value: text.to_string(),
                    };
                    warn!(%conflict, "two regions mapped onto one cell");
                    placement.conflicts.push(conflict);
                    continue;
                }
                claimed.insert(cell, mapped.region.as_str());
                placement.writes.push(CellWrite::new(cell.0, column, text));
            }
        }

        self.cursor = row + height;
        self.pages_placed += 1;
        debug!(row, height, writes = placement.writes.len(), "page placed");
        placement
    }
}

/// Columns a value occupies when placed at `column`: one for a single field,
/// the widest row for a table.
fn covered_columns(column: u32, value: &FieldValue) -> RangeInclusive<u32> {
    let width = match value {
        FieldValue::Single(_) => 1,
        FieldValue::Table(rows) => rows.iter().map(Vec::len).max().unwrap_or(0).max(1) as u32,
    };
    column..=(column + width - 1).min(MAX_COLUMN)
}
