//! Integration tests for the extraction pipeline end to end.
//!
//! Uses a MockRasterizer that paints blank pages and a MockRecognizer that
//! answers by crop size, so these tests run without poppler-utils or tesseract.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use fieldscan_core::config::{ExtractionConfig, RecognizerOptions};
use fieldscan_core::error::FieldscanError;
use fieldscan_core::extract_to_workbook;
use fieldscan_core::extraction::{PageRasterizer, TextRecognizer};
use fieldscan_core::model::{ExclusionRule, Region, RegionSet, Token};
use fieldscan_core::pipeline::{ExtractionJob, ExtractionReport, Extractor};
use fieldscan_core::placement::column::column_to_letters;
use fieldscan_core::placement::ColumnMapping;
use fieldscan_core::sheet::{MemorySheet, SheetSink, SheetState, Workbook};
use fieldscan_core::store::ExclusionSet;
use image::{GrayImage, Rgb, RgbImage};

const PAGE_W: u32 = 1000;
const PAGE_H: u32 = 1000;

struct MockRasterizer {
    /// Page count per document; unknown documents fail to open.
    documents: HashMap<PathBuf, usize>,
    /// (document, page) pairs whose rendering fails.
    broken_pages: Vec<(PathBuf, usize)>,
    renders: AtomicUsize,
}

impl MockRasterizer {
    fn new(documents: &[(&str, usize)]) -> Self {
        MockRasterizer {
            documents: documents
                .iter()
                .map(|(name, pages)| (PathBuf::from(name), *pages))
                .collect(),
            broken_pages: Vec::new(),
            renders: AtomicUsize::new(0),
        }
    }

    fn break_page(mut self, document: &str, page: usize) -> Self {
        self.broken_pages.push((PathBuf::from(document), page));
        self
    }
}

impl PageRasterizer for MockRasterizer {
    fn page_count(&self, document: &Path) -> Result<usize, FieldscanError> {
        self.documents
            .get(document)
            .copied()
            .ok_or_else(|| FieldscanError::Render {
                document: document.to_path_buf(),
                page: 0,
                reason: "no such document".into(),
            })
    }

    fn render(&self, document: &Path, page_index: usize, _dpi: u32) -> Result<RgbImage, FieldscanError> {
        self.renders.fetch_add(1, Ordering::SeqCst);
        if self
            .broken_pages
            .iter()
            .any(|(d, p)| d == document && *p == page_index)
        {
            return Err(FieldscanError::Render {
                document: document.to_path_buf(),
                page: page_index,
                reason: "corrupt page".into(),
            });
        }
        Ok(RgbImage::from_pixel(PAGE_W, PAGE_H, Rgb([255, 255, 255])))
    }

    fn backend_name(&self) -> &str {
        "mock"
    }
}

#[derive(Clone)]
enum Answer {
    Text(&'static str),
    Tokens(Vec<Token>),
    Fail,
}

/// Answers by crop size, one queued answer per call. Regions in these tests
/// all have distinct sizes and zero tolerance.
struct MockRecognizer {
    answers: Mutex<HashMap<(u32, u32), Vec<Answer>>>,
}

impl MockRecognizer {
    fn new() -> Self {
        MockRecognizer {
            answers: Mutex::new(HashMap::new()),
        }
    }

    fn answer(self, region: &Region, answers: Vec<Answer>) -> Self {
        self.answers
            .lock()
            .unwrap()
            .insert((region.w as u32, region.h as u32), answers);
        self
    }

    fn next(&self, image: &GrayImage) -> Option<Answer> {
        let mut answers = self.answers.lock().unwrap();
        let queue = answers.get_mut(&image.dimensions())?;
        if queue.is_empty() {
            None
        } else {
            Some(queue.remove(0))
        }
    }
}

impl TextRecognizer for MockRecognizer {
    fn recognize_text(&self, image: &GrayImage, _options: &RecognizerOptions) -> Result<String, FieldscanError> {
        match self.next(image) {
            Some(Answer::Text(s)) => Ok(s.to_string()),
            Some(Answer::Fail) => Err(FieldscanError::ToolFailed {
                tool: "mock".into(),
                code: 1,
                stderr: "engine crashed".into(),
            }),
            _ => Ok(String::new()),
        }
    }

    fn recognize_tokens(&self, image: &GrayImage, _options: &RecognizerOptions) -> Result<Vec<Token>, FieldscanError> {
        match self.next(image) {
            Some(Answer::Tokens(tokens)) => Ok(tokens),
            Some(Answer::Fail) => Err(FieldscanError::ToolFailed {
                tool: "mock".into(),
                code: 1,
                stderr: "engine crashed".into(),
            }),
            _ => Ok(Vec::new()),
        }
    }

    fn backend_name(&self) -> &str {
        "mock"
    }
}

fn name_region() -> Region {
    Region::new("Name", 10, 10, 100, 20)
}

fn date_region() -> Region {
    Region::new("Date", 10, 50, 120, 20)
}

fn items_region() -> Region {
    Region::new("Items", 10, 100, 400, 200).table()
}

fn region_set() -> RegionSet {
    RegionSet::new("invoice", vec![name_region(), date_region(), items_region()])
}

fn item_tokens() -> Vec<Token> {
    vec![
        Token::new("5", 200, 51).with_height(20),
        Token::new("Bolt", 10, 5).with_height(20),
        Token::new("Nut", 10, 50).with_height(20),
        Token::new("10", 200, 6).with_height(20),
    ]
}

fn docs(names: &[&str]) -> Vec<PathBuf> {
    names.iter().map(PathBuf::from).collect()
}

fn cell_refs(sheet: &MemorySheet) -> Vec<String> {
    sheet
        .cells()
        .map(|(r, c, v)| format!("{}{}={}", column_to_letters(c), r, v))
        .collect()
}

fn run(
    rasterizer: &MockRasterizer,
    recognizer: &MockRecognizer,
    documents: &[PathBuf],
    exclusions: &ExclusionSet,
    mapping: &ColumnMapping,
    sheet: &mut MemorySheet,
) -> Result<ExtractionReport, FieldscanError> {
    let set = region_set();
    let job = ExtractionJob {
        documents,
        region_set: &set,
        exclusions,
        mapping,
    };
    Extractor::new(rasterizer, recognizer, ExtractionConfig::default()).run(&job, sheet)
}

// ---------------------------------------------------------------------------
// Single field and two-row table on a fresh sheet
// ---------------------------------------------------------------------------
#[test]
fn single_and_table_on_fresh_sheet() {
    let rasterizer = MockRasterizer::new(&[("a.pdf", 1)]);
    let recognizer = MockRecognizer::new()
        .answer(&name_region(), vec![Answer::Text("  홍길동\n")])
        .answer(&items_region(), vec![Answer::Tokens(item_tokens())]);
    let mapping = ColumnMapping::new().with("Name", "A").with("Items", "B");
    let mut sheet = MemorySheet::new("Sheet1");

    let report = run(
        &rasterizer,
        &recognizer,
        &docs(&["a.pdf"]),
        &ExclusionSet::default(),
        &mapping,
        &mut sheet,
    )
    .unwrap();

    let writes: Vec<String> = report.cell_writes.iter().map(|w| w.to_string()).collect();
    assert_eq!(writes, vec!["A1=홍길동", "B1=Bolt", "C1=10", "B2=Nut", "C2=5"]);
    assert_eq!(report.start_row, 1);
    assert_eq!(report.next_row, 3);
    assert_eq!(report.pages, 1);
    assert!(report.is_clean());
    assert_eq!(sheet.read_cell(2, 3).as_deref(), Some("5"));
}

// ---------------------------------------------------------------------------
// Appends below existing data, one row block per page
// ---------------------------------------------------------------------------
#[test]
fn appends_after_existing_rows() {
    let rasterizer = MockRasterizer::new(&[("a.pdf", 2), ("b.pdf", 1)]);
    let recognizer = MockRecognizer::new()
        .answer(&name_region(), vec![Answer::Text("p1"), Answer::Text("p2"), Answer::Text("p3")])
        .answer(&date_region(), vec![Answer::Text("d1"), Answer::Text(""), Answer::Text("d3")]);
    let mapping = ColumnMapping::new().with("Name", "A").with("Date", "B");

    let mut sheet = MemorySheet::new("Sheet1");
    for row in 1..=5 {
        sheet.write_cell(row, 1, "old");
    }
    for row in 1..=3 {
        sheet.write_cell(row, 2, "old");
    }

    let report = run(
        &rasterizer,
        &recognizer,
        &docs(&["a.pdf", "b.pdf"]),
        &ExclusionSet::default(),
        &mapping,
        &mut sheet,
    )
    .unwrap();

    assert_eq!(report.start_row, 6);
    assert_eq!(report.next_row, 9);
    assert_eq!(report.documents, 2);
    assert_eq!(report.pages, 3);
    assert_eq!(sheet.read_cell(6, 1).as_deref(), Some("p1"));
    assert_eq!(sheet.read_cell(6, 2).as_deref(), Some("d1"));
    assert_eq!(sheet.read_cell(7, 1).as_deref(), Some("p2"));
    assert_eq!(sheet.read_cell(7, 2), None);
    assert_eq!(sheet.read_cell(8, 2).as_deref(), Some("d3"));
    assert_eq!(sheet.read_cell(5, 1).as_deref(), Some("old"));
}

// ---------------------------------------------------------------------------
// A recognizer failure blanks one region and the batch carries on
// ---------------------------------------------------------------------------
#[test]
fn recognition_failure_does_not_abort() {
    let rasterizer = MockRasterizer::new(&[("a.pdf", 2)]);
    let recognizer = MockRecognizer::new()
        .answer(&name_region(), vec![Answer::Fail, Answer::Text("second")])
        .answer(&items_region(), vec![Answer::Tokens(item_tokens()), Answer::Tokens(vec![])]);
    let mapping = ColumnMapping::new().with("Name", "A").with("Items", "B");
    let mut sheet = MemorySheet::new("Sheet1");

    let report = run(
        &rasterizer,
        &recognizer,
        &docs(&["a.pdf"]),
        &ExclusionSet::default(),
        &mapping,
        &mut sheet,
    )
    .unwrap();

    assert_eq!(report.failures.len(), 1);
    let failure = &report.failures[0];
    assert_eq!(failure.page, 0);
    assert_eq!(failure.region.as_deref(), Some("Name"));
    assert!(failure.reason.contains("engine crashed"));

    assert_eq!(sheet.read_cell(1, 1), None);
    assert_eq!(sheet.read_cell(1, 2).as_deref(), Some("Bolt"));
    // Page two starts below the two-row table of page one.
    assert_eq!(sheet.read_cell(3, 1).as_deref(), Some("second"));
    assert_eq!(report.next_row, 4);
}

// ---------------------------------------------------------------------------
// Render and open failures are recorded, not fatal
// ---------------------------------------------------------------------------
#[test]
fn broken_pages_and_documents_are_skipped() {
    let rasterizer = MockRasterizer::new(&[("a.pdf", 2), ("c.pdf", 1)]).break_page("a.pdf", 0);
    let recognizer = MockRecognizer::new().answer(
        &name_region(),
        vec![Answer::Text("a2"), Answer::Text("c1")],
    );
    let mapping = ColumnMapping::new().with("Name", "A");
    let mut sheet = MemorySheet::new("Sheet1");

    let report = run(
        &rasterizer,
        &recognizer,
        &docs(&["a.pdf", "missing.pdf", "c.pdf"]),
        &ExclusionSet::default(),
        &mapping,
        &mut sheet,
    )
    .unwrap();

    assert_eq!(report.documents, 3);
    assert_eq!(report.pages, 3);
    assert_eq!(report.failures.len(), 2);
    assert_eq!(report.failures[0].region.as_deref(), Some("Name"));
    assert_eq!(report.failures[1].document, PathBuf::from("missing.pdf"));
    assert_eq!(report.failures[1].region, None);

    // The broken page still consumes its row.
    assert_eq!(sheet.read_cell(1, 1), None);
    assert_eq!(sheet.read_cell(2, 1).as_deref(), Some("a2"));
    assert_eq!(sheet.read_cell(3, 1).as_deref(), Some("c1"));
}

// ---------------------------------------------------------------------------
// A region beyond the page edge is a warning and an empty value
// ---------------------------------------------------------------------------
#[test]
fn region_outside_page_is_a_warning() {
    let far = Region::new("Far", 5000, 5000, 50, 50);
    let set = RegionSet::new("s", vec![name_region(), far]);
    let rasterizer = MockRasterizer::new(&[("a.pdf", 1)]);
    let recognizer = MockRecognizer::new().answer(&name_region(), vec![Answer::Text("x")]);
    let mapping = ColumnMapping::new().with("Name", "A").with("Far", "B");
    let exclusions = ExclusionSet::default();
    let documents = docs(&["a.pdf"]);
    let job = ExtractionJob {
        documents: &documents,
        region_set: &set,
        exclusions: &exclusions,
        mapping: &mapping,
    };
    let mut sheet = MemorySheet::new("Sheet1");

    let report = Extractor::new(&rasterizer, &recognizer, ExtractionConfig::default())
        .run(&job, &mut sheet)
        .unwrap();

    assert!(report.failures.is_empty());
    assert_eq!(report.geometry_warnings.len(), 1);
    assert_eq!(report.geometry_warnings[0].region, "Far");
    assert_eq!(cell_refs(&sheet), vec!["A1=x"]);
    assert_eq!(report.next_row, 2);
}

// ---------------------------------------------------------------------------
// Linked exclusion blanks the whole page's linked fields
// ---------------------------------------------------------------------------
#[test]
fn exclusion_rule_cascades_to_linked_fields() {
    let item = Region::new("품명", 10, 10, 100, 20);
    let qty = Region::new("수량", 10, 50, 120, 20);
    let note = Region::new("비고", 10, 80, 140, 20);
    let set = RegionSet::new("order", vec![item.clone(), qty.clone(), note.clone()]);

    let rasterizer = MockRasterizer::new(&[("a.pdf", 2)]);
    let recognizer = MockRecognizer::new()
        .answer(&item, vec![Answer::Text("견적서"), Answer::Text("볼트")])
        .answer(&qty, vec![Answer::Text("10"), Answer::Text("20")])
        .answer(&note, vec![Answer::Text("합계 포함"), Answer::Text("급송")]);
    // 품명 is unmapped but still drives the cascade.
    let mapping = ColumnMapping::new().with("수량", "A").with("비고", "B");
    let exclusions = ExclusionSet::from_strings(["합계"]).with_rule(ExclusionRule {
        target_field: "품명".into(),
        exclude_text: "견적".into(),
        linked_fields: vec!["수량".into()],
    });
    let documents = docs(&["a.pdf"]);
    let job = ExtractionJob {
        documents: &documents,
        region_set: &set,
        exclusions: &exclusions,
        mapping: &mapping,
    };
    let mut sheet = MemorySheet::new("Sheet1");

    Extractor::new(&rasterizer, &recognizer, ExtractionConfig::default())
        .run(&job, &mut sheet)
        .unwrap();

    assert_eq!(cell_refs(&sheet), vec!["A2=20", "B2=급송"]);
}

// ---------------------------------------------------------------------------
// Configuration errors surface before any page is rendered
// ---------------------------------------------------------------------------
#[test]
fn config_errors_abort_before_rendering() {
    let rasterizer = MockRasterizer::new(&[("a.pdf", 1)]);
    let recognizer = MockRecognizer::new();
    let mut sheet = MemorySheet::new("Sheet1");
    let documents = docs(&["a.pdf"]);

    for mapping in [
        ColumnMapping::new(),
        ColumnMapping::new().with("Name", "0"),
        ColumnMapping::new().with("Name", "없는 헤더"),
        ColumnMapping::new().with("Nope", "A"),
    ] {
        let result = run(
            &rasterizer,
            &recognizer,
            &documents,
            &ExclusionSet::default(),
            &mapping,
            &mut sheet,
        );
        assert!(result.is_err());
    }

    assert!(run(
        &rasterizer,
        &recognizer,
        &[],
        &ExclusionSet::default(),
        &ColumnMapping::new().with("Name", "A"),
        &mut sheet,
    )
    .is_err());

    assert_eq!(rasterizer.renders.load(Ordering::SeqCst), 0);
    assert!(sheet.is_empty());
}

// ---------------------------------------------------------------------------
// Header-name targets, named sheets and save-as-new through a real file
// ---------------------------------------------------------------------------
#[test]
fn workbook_round_trip_with_header_targets() {
    let dir = tempfile::tempdir().unwrap();
    let template = dir.path().join("orders.xlsx");
    let mut book = Workbook::new();
    {
        let sheet = book.sheet_mut(None).unwrap();
        sheet.write_cell(1, 1, "No");
        sheet.write_cell(1, 2, "이름");
    }
    book.save(&template).unwrap();

    let rasterizer = MockRasterizer::new(&[("a.pdf", 1)]);
    let recognizer = MockRecognizer::new().answer(&name_region(), vec![Answer::Text("홍길동")]);
    let mapping = ColumnMapping::new().with("Name", "이름");

    let mut book = Workbook::open(&template).unwrap();
    let report = extract_to_workbook(
        &docs(&["a.pdf"]),
        &region_set(),
        &ExclusionSet::default(),
        &mapping,
        &ExtractionConfig::default(),
        &rasterizer,
        &recognizer,
        &mut book,
    )
    .unwrap();
    assert_eq!(report.cell_writes[0].cell_ref(), "B2");

    let out = book.save_as_new(None).unwrap();
    let reopened = Workbook::open(&out).unwrap();
    let sheet = reopened.sheet("Sheet1").unwrap();
    assert_eq!(sheet.read_cell(2, 2).as_deref(), Some("홍길동"));
    assert_eq!(sheet.read_cell(1, 2).as_deref(), Some("이름"));

    let untouched = Workbook::open(&template).unwrap();
    assert_eq!(untouched.sheet("Sheet1").unwrap().last_occupied_row(2), 1);

    let config = ExtractionConfig {
        sheet: Some("Missing".into()),
        ..ExtractionConfig::default()
    };
    let err = extract_to_workbook(
        &docs(&["a.pdf"]),
        &region_set(),
        &ExclusionSet::default(),
        &mapping,
        &config,
        &rasterizer,
        &recognizer,
        &mut book,
    )
    .unwrap_err();
    assert!(matches!(err, FieldscanError::MissingSheet(_)));
}

// ---------------------------------------------------------------------------
// A table block starts below data in every column it spills into
// ---------------------------------------------------------------------------
#[test]
fn table_spill_columns_stay_below_existing_data() {
    let rasterizer = MockRasterizer::new(&[("a.pdf", 1)]);
    let recognizer =
        MockRecognizer::new().answer(&items_region(), vec![Answer::Tokens(item_tokens())]);
    let mapping = ColumnMapping::new().with("Items", "C");

    let mut sheet = MemorySheet::new("Sheet1");
    sheet.write_cell(1, 3, "품명");
    for row in 1..=5 {
        sheet.write_cell(row, 4, "old");
    }

    let report = run(
        &rasterizer,
        &recognizer,
        &docs(&["a.pdf"]),
        &ExclusionSet::default(),
        &mapping,
        &mut sheet,
    )
    .unwrap();

    let writes: Vec<String> = report.cell_writes.iter().map(|w| w.to_string()).collect();
    assert_eq!(writes, vec!["C6=Bolt", "D6=10", "C7=Nut", "D7=5"]);
    assert_eq!(report.start_row, 6);
    assert_eq!(report.next_row, 8);
    for row in 1..=5 {
        assert_eq!(sheet.read_cell(row, 4).as_deref(), Some("old"));
    }
    assert!(report.is_clean());
}

// ---------------------------------------------------------------------------
// Two regions landing on one cell keep the first value and report the other
// ---------------------------------------------------------------------------
#[test]
fn overlapping_columns_report_a_conflict() {
    let rasterizer = MockRasterizer::new(&[("a.pdf", 1)]);
    let recognizer = MockRecognizer::new()
        .answer(&items_region(), vec![Answer::Tokens(item_tokens())])
        .answer(&date_region(), vec![Answer::Text("2024-03-01")]);
    let mapping = ColumnMapping::new().with("Items", "B").with("Date", "C");
    let mut sheet = MemorySheet::new("Sheet1");

    let report = run(
        &rasterizer,
        &recognizer,
        &docs(&["a.pdf"]),
        &ExclusionSet::default(),
        &mapping,
        &mut sheet,
    )
    .unwrap();

    assert_eq!(sheet.read_cell(1, 3).as_deref(), Some("10"));
    assert_eq!(report.cell_writes.len(), 4);
    assert_eq!(report.cell_conflicts.len(), 1);
    let conflict = &report.cell_conflicts[0];
    assert_eq!(conflict.document, PathBuf::from("a.pdf"));
    assert_eq!(conflict.page, 0);
    assert_eq!((conflict.conflict.row, conflict.conflict.column), (1, 3));
    assert_eq!(conflict.conflict.kept, "Items");
    assert_eq!(conflict.conflict.dropped, "Date");
    assert_eq!(conflict.conflict.dropped_value, "2024-03-01");
    assert!(!report.is_clean());
}

// ---------------------------------------------------------------------------
// Sequential and parallel region recognition agree
// ---------------------------------------------------------------------------
#[test]
fn parallel_and_sequential_runs_agree() {
    let mut outputs = Vec::new();
    for parallel in [true, false] {
        let rasterizer = MockRasterizer::new(&[("a.pdf", 1)]);
        let recognizer = MockRecognizer::new()
            .answer(&name_region(), vec![Answer::Text("n")])
            .answer(&date_region(), vec![Answer::Text("d")])
            .answer(&items_region(), vec![Answer::Tokens(item_tokens())]);
        let mapping = ColumnMapping::new()
            .with("Items", "C")
            .with("Name", "A")
            .with("Date", "B");
        let set = region_set();
        let documents = docs(&["a.pdf"]);
        let exclusions = ExclusionSet::default();
        let job = ExtractionJob {
            documents: &documents,
            region_set: &set,
            exclusions: &exclusions,
            mapping: &mapping,
        };
        let config = ExtractionConfig {
            parallel_regions: parallel,
            max_pages: Some(1),
            ..ExtractionConfig::default()
        };
        let mut sheet = MemorySheet::new("Sheet1");
        let report = Extractor::new(&rasterizer, &recognizer, config)
            .run(&job, &mut sheet)
            .unwrap();
        outputs.push(report.cell_writes);
    }
    assert_eq!(outputs[0], outputs[1]);
    assert_eq!(outputs[0][0].cell_ref(), "C1");
}
