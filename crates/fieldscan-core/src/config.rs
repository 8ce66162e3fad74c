use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::FieldscanError;

/// Rasterization resolution regions are defined at. Changing it shifts every region.
pub const DEFAULT_DPI: u32 = 600;
pub const DEFAULT_LANGUAGE: &str = "kor+eng";

/// How table tokens are grouped into rows by their `top` coordinate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "mode")]
pub enum RowBand {
    /// Same row only when `top` is identical.
    Exact,
    /// Same row while `top` is within `pixels` of the row's first token.
    Fixed { pixels: u32 },
    /// Same row while `top` differs by less than half the median token height.
    #[default]
    HalfMedianHeight,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PreprocessOptions {
    /// Median filter radius, 0 disables smoothing.
    pub median_radius: u32,
    pub sharpen: bool,
    /// Mean-threshold binarization.
    pub binarize: bool,
    /// Thicken dark strokes by one pixel.
    pub dilate: bool,
}

impl Default for PreprocessOptions {
    fn default() -> Self {
        PreprocessOptions {
            median_radius: 0,
            sharpen: true,
            binarize: false,
            dilate: false,
        }
    }
}

/// Options handed to the text recognizer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecognizerOptions {
    pub language: String,
    /// Tesseract `--oem` value (1 = LSTM only).
    pub engine_mode: u32,
    /// Tesseract `--psm` value (6 = single uniform block).
    pub page_segmentation: u32,
}

impl Default for RecognizerOptions {
    fn default() -> Self {
        RecognizerOptions {
            language: DEFAULT_LANGUAGE.to_string(),
            engine_mode: 1,
            page_segmentation: 6,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    pub dpi: u32,
    pub recognizer: RecognizerOptions,
    pub row_band: RowBand,
    pub preprocess: PreprocessOptions,
    /// Row holding column headers for header-name targets (1-based).
    pub header_row: u32,
    /// Target sheet; `None` uses the first sheet of the workbook.
    pub sheet: Option<String>,
    /// Process at most this many pages per document.
    pub max_pages: Option<usize>,
    pub parallel_regions: bool,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        ExtractionConfig {
            dpi: DEFAULT_DPI,
            recognizer: RecognizerOptions::default(),
            row_band: RowBand::default(),
            preprocess: PreprocessOptions::default(),
            header_row: 1,
            sheet: None,
            max_pages: None,
            parallel_regions: true,
        }
    }
}

impl ExtractionConfig {
    pub fn load(path: &Path) -> Result<ExtractionConfig, FieldscanError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            FieldscanError::Config(format!("failed to read {}: {e}", path.display()))
        })?;
        let config: ExtractionConfig = serde_json::from_str(&content).map_err(|e| {
            FieldscanError::Config(format!("failed to parse {}: {e}", path.display()))
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), FieldscanError> {
        if self.dpi == 0 {
            return Err(FieldscanError::Config("dpi must be positive".into()));
        }
        if self.header_row == 0 {
            return Err(FieldscanError::Config(
                "header_row is 1-based and must be positive".into(),
            ));
        }
        if self.recognizer.language.trim().is_empty() {
            return Err(FieldscanError::Config(
                "recognizer language must not be empty".into(),
            ));
        }
        if self.max_pages == Some(0) {
            return Err(FieldscanError::Config("max_pages must be positive".into()));
        }
        Ok(())
    }
}

/// Directory holding `roi_sets.json` and `exclusions.json`.
///
/// `FIELDSCAN_STORE_DIR` overrides the per-user data directory.
pub fn default_store_dir() -> PathBuf {
    if let Some(dir) = std::env::var_os("FIELDSCAN_STORE_DIR") {
        return PathBuf::from(dir);
    }
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("fieldscan")
}
