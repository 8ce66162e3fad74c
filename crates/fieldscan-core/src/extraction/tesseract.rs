use image::GrayImage;
use std::path::Path;
use std::process::Command;

use super::{run_tool, tool_available, TextRecognizer};
use crate::config::RecognizerOptions;
use crate::error::FieldscanError;
use crate::model::Token;

/// TSV row level for individual words.
const WORD_LEVEL: &str = "5";

/// Text recognizer backed by the `tesseract` command-line tool.
pub struct TesseractRecognizer;

impl TesseractRecognizer {
    pub fn new() -> Self {
        TesseractRecognizer
    }

    /// Check if tesseract is available on the system.
    pub fn is_available() -> bool {
        tool_available("tesseract", "--version")
    }

    fn run(
        &self,
        image: &GrayImage,
        options: &RecognizerOptions,
        tsv: bool,
    ) -> Result<String, FieldscanError> {
        let tmp = tempfile::Builder::new().suffix(".png").tempfile()?;
        image.save_with_format(tmp.path(), image::ImageFormat::Png)?;

        let mut command = tesseract_command(tmp.path(), options);
        if tsv {
            command.arg("tsv");
        }
        let output = run_tool("tesseract", &mut command)?;
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

impl Default for TesseractRecognizer {
    fn default() -> Self {
        Self::new()
    }
}

impl TextRecognizer for TesseractRecognizer {
    fn recognize_text(
        &self,
        image: &GrayImage,
        options: &RecognizerOptions,
    ) -> Result<String, FieldscanError> {
        if image.width() == 0 || image.height() == 0 {
            return Ok(String::new());
        }
        self.run(image, options, false)
    }

    fn recognize_tokens(
        &self,
        image: &GrayImage,
        options: &RecognizerOptions,
    ) -> Result<Vec<Token>, FieldscanError> {
        if image.width() == 0 || image.height() == 0 {
            return Ok(Vec::new());
        }
        let tsv = self.run(image, options, true)?;
        parse_tsv_tokens(&tsv)
    }

    fn backend_name(&self) -> &str {
        "tesseract"
    }
}

fn tesseract_command(input: &Path, options: &RecognizerOptions) -> Command {
    let mut command = Command::new("tesseract");
    command
        .arg(input)
        .arg("stdout")
        .arg("-l")
        .arg(&options.language)
        .arg("--oem")
        .arg(options.engine_mode.to_string())
        .arg("--psm")
        .arg(options.page_segmentation.to_string());
    command
}

/// Parse `tesseract ... tsv` output into word tokens.
///
/// Columns are located by the header line so extra or reordered columns are
/// tolerated. Non-word rows and rows with blank text are skipped.
fn parse_tsv_tokens(tsv: &str) -> Result<Vec<Token>, FieldscanError> {
    let mut lines = tsv.lines();
    let header = match lines.next() {
        Some(h) => h,
        None => return Ok(Vec::new()),
    };
    let columns: Vec<&str> = header.split('\t').collect();
    let index_of = |name: &str| {
        columns.iter().position(|c| *c == name).ok_or_else(|| FieldscanError::ToolFailed {
            tool: "tesseract".into(),
            code: 0,
            stderr: format!("TSV output has no '{name}' column"),
        })
    };
    let level = index_of("level")?;
    let left = index_of("left")?;
    let top = index_of("top")?;
    let height = index_of("height")?;
    let text = index_of("text")?;

    let mut tokens = Vec::new();
    for line in lines {
        let fields: Vec<&str> = line.split('\t').collect();
        if fields.get(level) != Some(&WORD_LEVEL) {
            continue;
        }
        let word = fields.get(text).map(|s| s.trim()).unwrap_or("");
        if word.is_empty() {
            continue;
        }
        let (Some(l), Some(t)) = (
            fields.get(left).and_then(|s| s.parse::<i64>().ok()),
            fields.get(top).and_then(|s| s.parse::<i64>().ok()),
        ) else {
            continue;
        };
        let mut token = Token::new(word, l, t);
        token.height = fields.get(height).and_then(|s| s.parse::<u32>().ok());
        tokens.push(token);
    }

    Ok(tokens)
}
