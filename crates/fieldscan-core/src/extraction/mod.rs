pub mod poppler;
pub mod table;
pub mod tesseract;

use image::{GrayImage, RgbImage};
use std::path::Path;
use std::process::Output;

use crate::config::RecognizerOptions;
use crate::error::FieldscanError;
use crate::model::Token;

/// Backend turning a document page into pixels.
pub trait PageRasterizer: Send + Sync {
    /// Number of pages in the document.
    fn page_count(&self, document: &Path) -> Result<usize, FieldscanError>;

    /// Render one zero-based page at `dpi`. Regions must have been drawn at the same DPI.
    fn render(&self, document: &Path, page_index: usize, dpi: u32) -> Result<RgbImage, FieldscanError>;

    /// Name of this backend (for diagnostics).
    fn backend_name(&self) -> &str;
}

/// Backend turning a preprocessed crop into text.
pub trait TextRecognizer: Send + Sync {
    /// Recognize a single field as one string.
    fn recognize_text(
        &self,
        image: &GrayImage,
        options: &RecognizerOptions,
    ) -> Result<String, FieldscanError>;

    /// Recognize a table field as positioned word tokens, in crop coordinates.
    fn recognize_tokens(
        &self,
        image: &GrayImage,
        options: &RecognizerOptions,
    ) -> Result<Vec<Token>, FieldscanError>;

    fn backend_name(&self) -> &str;
}

/// Run a prepared command, mapping a missing binary and a non-zero exit to errors.
pub(crate) fn run_tool(
    tool: &str,
    command: &mut std::process::Command,
) -> Result<Output, FieldscanError> {
    let output = command.output().map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            FieldscanError::ToolNotFound {
                tool: tool.to_string(),
            }
        } else {
            FieldscanError::ToolFailed {
                tool: tool.to_string(),
                code: -1,
                stderr: e.to_string(),
            }
        }
    })?;

    if !output.status.success() {
        let code = output.status.code().unwrap_or(-1);
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        return Err(FieldscanError::ToolFailed {
            tool: tool.to_string(),
            code,
            stderr,
        });
    }

    Ok(output)
}

/// Check if an external tool can be started.
pub fn tool_available(tool: &str, version_flag: &str) -> bool {
    std::process::Command::new(tool)
        .arg(version_flag)
        .output()
        .map(|o| o.status.success() || !o.stderr.is_empty())
        .unwrap_or(false)
}
