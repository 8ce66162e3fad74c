use std::collections::HashSet;
use std::path::{Path, PathBuf};

use image::RgbImage;
use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::ExtractionConfig;
use crate::error::{FieldscanError, RecognitionFailure};
use crate::extraction::table::reconstruct;
use crate::extraction::{PageRasterizer, TextRecognizer};
use crate::filter::filter_page;
use crate::imaging::{crop_region, preprocess};
use crate::model::{CellWrite, FieldType, FieldValue, Region, RegionSet};
use crate::placement::{ColumnMapping, PlacementConflict, PlacementEngine};
use crate::sheet::SheetSink;
use crate::store::ExclusionSet;

/// Everything one extraction run works on.
#[derive(Debug, Clone)]
pub struct ExtractionJob<'a> {
    pub documents: &'a [PathBuf],
    pub region_set: &'a RegionSet,
    pub exclusions: &'a ExclusionSet,
    pub mapping: &'a ColumnMapping,
}

/// A region that fell entirely outside a rendered page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GeometryWarning {
    pub document: PathBuf,
    /// Zero-based page index.
    pub page: usize,
    pub region: String,
}

/// A value dropped because another region on the same page already wrote its
/// cell.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CellConflict {
    pub document: PathBuf,
    /// Zero-based page index.
    pub page: usize,
    #[serde(flatten)]
    pub conflict: PlacementConflict,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ExtractionReport {
    pub documents: usize,
    pub pages: usize,
    pub cell_writes: Vec<CellWrite>,
    pub failures: Vec<RecognitionFailure>,
    pub geometry_warnings: Vec<GeometryWarning>,
    pub cell_conflicts: Vec<CellConflict>,
    /// First row written by this run.
    pub start_row: u32,
    /// Row the next run would start on if nothing else changes the sheet.
    pub next_row: u32,
}

impl ExtractionReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
            && self.geometry_warnings.is_empty()
            && self.cell_conflicts.is_empty()
    }
}

/// Drives documents through render, crop, preprocess, recognize, filter and
/// placement, writing into a sheet page by page.
pub struct Extractor<'a> {
    rasterizer: &'a dyn PageRasterizer,
    recognizer: &'a dyn TextRecognizer,
    config: ExtractionConfig,
}

impl<'a> Extractor<'a> {
    pub fn new(
        rasterizer: &'a dyn PageRasterizer,
        recognizer: &'a dyn TextRecognizer,
        config: ExtractionConfig,
    ) -> Self {
        Extractor {
            rasterizer,
            recognizer,
            config,
        }
    }

    /// Run the job against `sheet`.
    ///
    /// Configuration problems are returned before any document is opened.
    /// Failures of individual pages or regions are recorded in the report and
    /// the run continues with empty values in their place.
    pub fn run(
        &self,
        job: &ExtractionJob<'_>,
        sheet: &mut dyn SheetSink,
    ) -> Result<ExtractionReport, FieldscanError> {
        self.config.validate()?;
        job.region_set.validate()?;
        if job.documents.is_empty() {
            return Err(FieldscanError::Config("no documents to process".into()));
        }

        let mapping = job
            .mapping
            .resolve(job.region_set, &*sheet, self.config.header_row)?;
        let regions = regions_to_recognize(job.region_set, job.mapping, job.exclusions);
        let mut engine = PlacementEngine::new(mapping, &*sheet);

        let mut report = ExtractionReport::default();

        info!(
            set = %job.region_set.set_name,
            documents = job.documents.len(),
            regions = regions.len(),
            start_row = engine.start_row(),
            rasterizer = self.rasterizer.backend_name(),
            recognizer = self.recognizer.backend_name(),
            "extraction started"
        );

        for document in job.documents {
            report.documents += 1;

            let page_count = match self.rasterizer.page_count(document) {
                Ok(n) => n,
                Err(e) => {
                    warn!(document = %document.display(), error = %e, "document skipped");
                    report.failures.push(RecognitionFailure {
                        document: document.clone(),
                        page: 0,
                        region: None,
                        reason: e.to_string(),
                    });
                    continue;
                }
            };
            let pages = self
                .config
                .max_pages
                .map_or(page_count, |max| page_count.min(max));
            info!(document = %document.display(), pages, "processing document");

            for page_index in 0..pages {
                report.pages += 1;
                let mut values = self.recognize_page(document, page_index, &regions, &mut report);
                filter_page(&mut values, job.exclusions);

                let placement = engine.place_page(&values, &*sheet);
                for write in placement.writes {
                    sheet.write_cell(write.row, write.column, &write.value);
                    report.cell_writes.push(write);
                }
                report
                    .cell_conflicts
                    .extend(placement.conflicts.into_iter().map(|conflict| CellConflict {
                        document: document.clone(),
                        page: page_index,
                        conflict,
                    }));
            }
        }

        report.start_row = engine.start_row();
        report.next_row = engine.current_row();
        info!(
            writes = report.cell_writes.len(),
            failures = report.failures.len(),
            next_row = report.next_row,
            "extraction finished"
        );
        Ok(report)
    }

    /// Values for every region on one page, in region-set order. Failed and
    /// out-of-page regions yield empty values.
    fn recognize_page(
        &self,
        document: &Path,
        page_index: usize,
        regions: &[&Region],
        report: &mut ExtractionReport,
    ) -> Vec<(String, FieldValue)> {
        let page = match self.rasterizer.render(document, page_index, self.config.dpi) {
            Ok(page) => page,
            Err(e) => {
                warn!(document = %document.display(), page = page_index + 1, error = %e, "page render failed");
                return regions
                    .iter()
                    .map(|region| {
                        report.failures.push(RecognitionFailure {
                            document: document.to_path_buf(),
                            page: page_index,
                            region: Some(region.name.clone()),
                            reason: e.to_string(),
                        });
                        (region.name.clone(), FieldValue::empty(region.field_type))
                    })
                    .collect();
            }
        };
        debug!(page = page_index + 1, width = page.width(), height = page.height(), "page rendered");

        let results: Vec<Result<Option<FieldValue>, RecognitionFailure>> =
            if self.config.parallel_regions {
                regions
                    .par_iter()
                    .map(|region| self.recognize_region(document, page_index, &page, region))
                    .collect()
            } else {
                regions
                    .iter()
                    .map(|region| self.recognize_region(document, page_index, &page, region))
                    .collect()
            };

        regions
            .iter()
            .zip(results)
            .map(|(region, result)| {
                let value = match result {
                    Ok(Some(value)) => value,
                    Ok(None) => {
                        warn!(document = %document.display(), page = page_index + 1, region = %region.name, "region outside page");
                        report.geometry_warnings.push(GeometryWarning {
                            document: document.to_path_buf(),
                            page: page_index,
                            region: region.name.clone(),
                        });
                        FieldValue::empty(region.field_type)
                    }
                    Err(failure) => {
                        warn!(%failure, "recognition failed");
                        report.failures.push(failure);
                        FieldValue::empty(region.field_type)
                    }
                };
                (region.name.clone(), value)
            })
            .collect()
    }

    /// `Ok(None)` when the region has no pixels on this page.
    fn recognize_region(
        &self,
        document: &Path,
        page_index: usize,
        page: &RgbImage,
        region: &Region,
    ) -> Result<Option<FieldValue>, RecognitionFailure> {
        let Some(crop) = crop_region(page, region, region.tolerance) else {
            return Ok(None);
        };
        let image = preprocess(&crop, &self.config.preprocess);
        let options = &self.config.recognizer;

        let value = match region.field_type {
            FieldType::Single => self
                .recognizer
                .recognize_text(&image, options)
                .map(|text| FieldValue::Single(text.trim().to_string())),
            FieldType::Table => self
                .recognizer
                .recognize_tokens(&image, options)
                .map(|tokens| FieldValue::Table(reconstruct(&tokens, self.config.row_band))),
        };

        value.map(Some).map_err(|e| RecognitionFailure {
            document: document.to_path_buf(),
            page: page_index,
            region: Some(region.name.clone()),
            reason: e.to_string(),
        })
    }
}

/// Mapped regions plus any region an exclusion rule inspects, in set order.
fn regions_to_recognize<'s>(
    set: &'s RegionSet,
    mapping: &ColumnMapping,
    exclusions: &ExclusionSet,
) -> Vec<&'s Region> {
    let wanted: HashSet<&str> = mapping
        .entries()
        .iter()
        .map(|(region, _)| region.as_str())
        .chain(exclusions.rules.iter().map(|r| r.target_field.as_str()))
        .collect();
    set.regions
        .iter()
        .filter(|r| wanted.contains(r.name.as_str()))
        .collect()
}
