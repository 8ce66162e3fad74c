use std::path::PathBuf;

use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
pub enum FieldscanError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("region set '{0}' not found")]
    UnknownRegionSet(String),

    #[error("invalid region: {0}")]
    InvalidRegion(String),

    #[error("invalid target column '{target}' for region '{region}'")]
    InvalidColumn { region: String, target: String },

    #[error("header '{header}' for region '{region}' not found in row {header_row}")]
    UnresolvedHeader {
        region: String,
        header: String,
        header_row: u32,
    },

    #[error("sheet '{0}' not found in workbook")]
    MissingSheet(String),

    #[error("failed to persist {path}: {reason}")]
    Persistence { path: PathBuf, reason: String },

    #[error("failed to render page {page} of {document}: {reason}")]
    Render {
        document: PathBuf,
        page: usize,
        reason: String,
    },

    #[error("{tool} not found. Install poppler-utils and tesseract-ocr (apt install poppler-utils tesseract-ocr)")]
    ToolNotFound { tool: String },

    #[error("{tool} failed with exit code {code}: {stderr}")]
    ToolFailed {
        tool: String,
        code: i32,
        stderr: String,
    },

    #[error("workbook error: {0}")]
    Workbook(String),

    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// A recognizer or rasterizer failure for one region (or one whole page or
/// document when `region` is `None`). Recorded in the report; never aborts a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecognitionFailure {
    pub document: PathBuf,
    /// Zero-based page index.
    pub page: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    pub reason: String,
}

impl std::fmt::Display for RecognitionFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} page {}", self.document.display(), self.page + 1)?;
        if let Some(ref region) = self.region {
            write!(f, " region '{region}'")?;
        }
        write!(f, ": {}", self.reason)
    }
}
