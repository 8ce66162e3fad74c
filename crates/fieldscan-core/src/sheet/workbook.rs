use calamine::{open_workbook_auto, Data, Reader};
use std::path::{Path, PathBuf};

use super::{CellValue, MemorySheet};
use crate::error::FieldscanError;

pub const DEFAULT_SHEET: &str = "Sheet1";

/// A workbook held in memory: loaded from an `.xlsx`/`.xlsm`/`.xls` template,
/// edited through its sheets, and always saved as a new `.xlsx` file.
#[derive(Debug, Clone)]
pub struct Workbook {
    template: Option<PathBuf>,
    sheets: Vec<MemorySheet>,
}

impl Workbook {
    /// A workbook with one empty sheet.
    pub fn new() -> Self {
        Workbook {
            template: None,
            sheets: vec![MemorySheet::new(DEFAULT_SHEET)],
        }
    }

    /// Load every sheet of `path`. A path that does not exist yet gives a new
    /// workbook remembered as the template name.
    pub fn open(path: &Path) -> Result<Workbook, FieldscanError> {
        if !path.exists() {
            return Ok(Workbook {
                template: Some(path.to_path_buf()),
                ..Workbook::new()
            });
        }

        let mut source = open_workbook_auto(path).map_err(|e| {
            FieldscanError::Workbook(format!("failed to open {}: {e}", path.display()))
        })?;

        let mut sheets = Vec::new();
        for name in source.sheet_names() {
            let range = source.worksheet_range(&name).map_err(|e| {
                FieldscanError::Workbook(format!("failed to read sheet '{name}': {e}"))
            })?;
            let (row0, col0) = range.start().unwrap_or((0, 0));

            let mut sheet = MemorySheet::new(name.as_str());
            for (r, c, data) in range.used_cells() {
                if let Some(value) = cell_value(data) {
                    let row = row0 + r as u32 + 1;
                    let col = col0 + c as u32 + 1;
                    sheet.set_value(row, col, value);
                }
            }
            sheets.push(sheet);
        }

        if sheets.is_empty() {
            sheets.push(MemorySheet::new(DEFAULT_SHEET));
        }

        Ok(Workbook {
            template: Some(path.to_path_buf()),
            sheets,
        })
    }

    pub fn template(&self) -> Option<&Path> {
        self.template.as_deref()
    }

    pub fn sheet_names(&self) -> Vec<&str> {
        self.sheets.iter().map(|s| s.name()).collect()
    }

    pub fn sheet(&self, name: &str) -> Option<&MemorySheet> {
        self.sheets.iter().find(|s| s.name() == name)
    }

    /// The named sheet, or the first sheet when `name` is `None`.
    pub fn sheet_mut(&mut self, name: Option<&str>) -> Result<&mut MemorySheet, FieldscanError> {
        match name {
            Some(name) => self
                .sheets
                .iter_mut()
                .find(|s| s.name() == name)
                .ok_or_else(|| FieldscanError::MissingSheet(name.to_string())),
            None => self
                .sheets
                .first_mut()
                .ok_or_else(|| FieldscanError::MissingSheet(DEFAULT_SHEET.to_string())),
        }
    }

    /// Write all sheets to `path` as `.xlsx`. Refuses to overwrite the template.
    pub fn save(&self, path: &Path) -> Result<(), FieldscanError> {
        if let Some(template) = self.template.as_deref() {
            if template.exists() && same_file(template, path) {
                return Err(FieldscanError::Config(format!(
                    "refusing to overwrite template {}; choose a new output file",
                    template.display()
                )));
            }
        }

        let mut book = rust_xlsxwriter::Workbook::new();
        for sheet in &self.sheets {
            let worksheet = book.add_worksheet();
            worksheet.set_name(sheet.name()).map_err(xlsx_error)?;
            for (row, col, value) in sheet.cells() {
                let (r, c) = (row - 1, (col - 1) as u16);
                match value {
                    CellValue::Text(s) => worksheet.write_string(r, c, s.as_str()),
                    CellValue::Number(n) => worksheet.write_number(r, c, *n),
                    CellValue::Bool(b) => worksheet.write_boolean(r, c, *b),
                }
                .map_err(xlsx_error)?;
            }
        }

        book.save(path).map_err(xlsx_error)
    }

    /// Save next to the template (or into `out_dir`) as
    /// `<stem>_<YYYYmmdd_HHMMSS>.xlsx` and return the new path.
    pub fn save_as_new(&self, out_dir: Option<&Path>) -> Result<PathBuf, FieldscanError> {
        let template = self.template.as_deref();
        let stem = template
            .and_then(|t| t.file_stem())
            .and_then(|s| s.to_str())
            .unwrap_or("fieldscan");
        let dir = out_dir
            .map(Path::to_path_buf)
            .or_else(|| template.and_then(|t| t.parent()).map(Path::to_path_buf))
            .unwrap_or_else(|| PathBuf::from("."));

        let timestamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
        let out_path = dir.join(format!("{stem}_{timestamp}.xlsx"));
        self.save(&out_path)?;
        Ok(out_path)
    }
}

impl Default for Workbook {
    fn default() -> Self {
        Self::new()
    }
}

fn cell_value(data: &Data) -> Option<CellValue> {
    match data {
        Data::Empty | Data::Error(_) => None,
        Data::String(s) => Some(CellValue::Text(s.clone())),
        Data::Float(f) => Some(CellValue::Number(*f)),
        Data::Int(i) => Some(CellValue::Number(*i as f64)),
        Data::Bool(b) => Some(CellValue::Bool(*b)),
        Data::DateTime(dt) => Some(CellValue::Number(dt.as_f64())),
        Data::DateTimeIso(s) | Data::DurationIso(s) => Some(CellValue::Text(s.clone())),
    }
}

fn same_file(a: &Path, b: &Path) -> bool {
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => a == b,
    }
}

fn xlsx_error(e: rust_xlsxwriter::XlsxError) -> FieldscanError {
    FieldscanError::Workbook(e.to_string())
}
