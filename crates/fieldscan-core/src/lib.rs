pub mod config;
pub mod error;
pub mod extraction;
pub mod filter;
pub mod imaging;
pub mod model;
pub mod pipeline;
pub mod placement;
pub mod sheet;
pub mod store;

use std::path::PathBuf;

use config::ExtractionConfig;
use error::FieldscanError;
use extraction::{PageRasterizer, TextRecognizer};
use model::RegionSet;
use pipeline::{ExtractionJob, ExtractionReport, Extractor};
use placement::ColumnMapping;
use sheet::Workbook;
use store::ExclusionSet;

/// Main API entry point: extract region values from documents into a workbook.
///
/// Writes go to the sheet named in `config.sheet` (or the first sheet),
/// appended below existing data. The workbook is only modified in memory;
/// saving is up to the caller.
#[allow(clippy::too_many_arguments)]
pub fn extract_to_workbook(
    documents: &[PathBuf],
    region_set: &RegionSet,
    exclusions: &ExclusionSet,
    mapping: &ColumnMapping,
    config: &ExtractionConfig,
    rasterizer: &dyn PageRasterizer,
    recognizer: &dyn TextRecognizer,
    workbook: &mut Workbook,
) -> Result<ExtractionReport, FieldscanError> {
    // Resolve the sheet first so a bad name fails before any recognition.
    let sheet = workbook.sheet_mut(config.sheet.as_deref())?;

    let job = ExtractionJob {
        documents,
        region_set,
        exclusions,
        mapping,
    };
    Extractor::new(rasterizer, recognizer, config.clone()).run(&job, sheet)
}
