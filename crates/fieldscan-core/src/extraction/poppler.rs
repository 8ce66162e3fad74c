use image::RgbImage;
use std::path::Path;
use std::process::Command;

use super::{run_tool, tool_available, PageRasterizer};
use crate::error::FieldscanError;

const RASTER_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "tif", "tiff", "bmp"];

/// Page rasterizer backed by poppler's `pdfinfo` and `pdftoppm`.
///
/// Image files (PNG, JPEG, TIFF, BMP) are accepted as single-page documents and
/// used at their native resolution.
pub struct PopplerRasterizer;

impl PopplerRasterizer {
    pub fn new() -> Self {
        PopplerRasterizer
    }

    /// Check if pdftoppm is available on the system.
    pub fn is_available() -> bool {
        tool_available("pdftoppm", "-v")
    }
}

impl Default for PopplerRasterizer {
    fn default() -> Self {
        Self::new()
    }
}

impl PageRasterizer for PopplerRasterizer {
    fn page_count(&self, document: &Path) -> Result<usize, FieldscanError> {
        if is_raster_image(document) {
            return Ok(1);
        }

        let output = run_tool("pdfinfo", Command::new("pdfinfo").arg(document))?;
        let text = String::from_utf8_lossy(&output.stdout);
        parse_page_count(&text).ok_or_else(|| FieldscanError::Render {
            document: document.to_path_buf(),
            page: 0,
            reason: "pdfinfo output has no 'Pages:' line".into(),
        })
    }

    fn render(&self, document: &Path, page_index: usize, dpi: u32) -> Result<RgbImage, FieldscanError> {
        if is_raster_image(document) {
            if page_index != 0 {
                return Err(FieldscanError::Render {
                    document: document.to_path_buf(),
                    page: page_index,
                    reason: "image documents have a single page".into(),
                });
            }
            return Ok(image::open(document)?.to_rgb8());
        }

        let workdir = tempfile::tempdir()?;
        let prefix = workdir.path().join("page");
        let page_number = (page_index + 1).to_string();

        run_tool(
            "pdftoppm",
            Command::new("pdftoppm")
                .arg("-r")
                .arg(dpi.to_string())
                .arg("-f")
                .arg(&page_number)
                .arg("-l")
                .arg(&page_number)
                .arg("-png")
                .arg("-singlefile")
                .arg(document)
                .arg(&prefix),
        )?;

        // -singlefile writes exactly `<prefix>.png`.
        let rendered = prefix.with_extension("png");
        let page = image::open(&rendered).map_err(|e| FieldscanError::Render {
            document: document.to_path_buf(),
            page: page_index,
            reason: e.to_string(),
        })?;
        Ok(page.to_rgb8())
    }

    fn backend_name(&self) -> &str {
        "poppler"
    }
}

fn is_raster_image(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| RASTER_EXTENSIONS.iter().any(|r| e.eq_ignore_ascii_case(r)))
        .unwrap_or(false)
}

fn parse_page_count(pdfinfo: &str) -> Option<usize> {
    pdfinfo
        .lines()
        .find_map(|line| line.strip_prefix("Pages:"))
        .and_then(|rest| rest.trim().parse().ok())
}
