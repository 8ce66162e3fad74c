use fieldscan_core::config::ExtractionConfig;
use fieldscan_core::error::FieldscanError;
use fieldscan_core::extraction::poppler::PopplerRasterizer;
use fieldscan_core::extraction::tesseract::TesseractRecognizer;
use fieldscan_core::placement::ColumnMapping;
use fieldscan_core::sheet::Workbook;
use fieldscan_core::store::{ExclusionStore, RegionStore, EXCLUSION_STORE_FILE, REGION_STORE_FILE};
use std::path::PathBuf;
use tracing::info;

use crate::output;

pub struct ExtractArgs {
    pub store_dir: PathBuf,
    pub documents: Vec<PathBuf>,
    pub set: String,
    pub map: Vec<String>,
    pub mapping: Option<PathBuf>,
    pub config: Option<PathBuf>,
    pub template: Option<PathBuf>,
    pub sheet: Option<String>,
    pub out: Option<PathBuf>,
    pub out_dir: Option<PathBuf>,
    pub dpi: Option<u32>,
    pub lang: Option<String>,
    pub sequential: bool,
    pub output: String,
}

pub fn run(args: ExtractArgs) -> Result<(), FieldscanError> {
    let mut config = match args.config {
        Some(ref path) => ExtractionConfig::load(path)?,
        None => ExtractionConfig::default(),
    };
    if let Some(dpi) = args.dpi {
        config.dpi = dpi;
    }
    if let Some(lang) = args.lang {
        config.recognizer.language = lang;
    }
    if args.sheet.is_some() {
        config.sheet = args.sheet;
    }
    if args.sequential {
        config.parallel_regions = false;
    }
    config.validate()?;

    let regions = RegionStore::open(args.store_dir.join(REGION_STORE_FILE))?;
    let set = regions.require_set(&args.set)?;
    let exclusions = ExclusionStore::open(args.store_dir.join(EXCLUSION_STORE_FILE))?.snapshot();

    let mut mapping = match args.mapping {
        Some(ref path) => ColumnMapping::load(path)?,
        None => ColumnMapping::new(),
    };
    mapping.extend(ColumnMapping::from_args(&args.map)?);

    let mut workbook = match args.template {
        Some(ref path) => Workbook::open(path)?,
        None => Workbook::new(),
    };

    if !TesseractRecognizer::is_available() {
        return Err(FieldscanError::ToolNotFound {
            tool: "tesseract".into(),
        });
    }
    let has_pdf = args.documents.iter().any(|d| {
        d.extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"))
    });
    if has_pdf && !PopplerRasterizer::is_available() {
        return Err(FieldscanError::ToolNotFound {
            tool: "pdftoppm".into(),
        });
    }

    let rasterizer = PopplerRasterizer::new();
    let recognizer = TesseractRecognizer::new();
    let report = fieldscan_core::extract_to_workbook(
        &args.documents,
        &set,
        &exclusions,
        &mapping,
        &config,
        &rasterizer,
        &recognizer,
        &mut workbook,
    )?;

    // Always save as a new file so the template stays intact
    let saved = match args.out {
        Some(path) => {
            workbook.save(&path)?;
            path
        }
        None => workbook.save_as_new(args.out_dir.as_deref())?,
    };
    info!(path = %saved.display(), "workbook saved");

    match args.output.as_str() {
        "json" => output::json::print(&report)?,
        _ => print!("{}", output::table::format_report(&report)),
    }
    eprintln!(
        "{} cell(s) written to {}",
        report.cell_writes.len(),
        saved.display()
    );

    Ok(())
}
