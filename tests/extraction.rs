//! Integration tests for the extraction pipeline.
//!
//! pdfium and tesseract are replaced by in-process fakes: the rasteriser
//! renders page `n` as a blank image `n` pixels wide, and the recogniser
//! returns scripted OCR text keyed by that width. Everything between the two
//! (normalisation, cleanup, segmentation, aggregation) runs for real.

use electoral_roll_ocr::error::RecognitionError;
use electoral_roll_ocr::{
    ErrorKind, ErrorResponse, ExtractionConfig, ExtractionError, ExtractionProgressCallback,
    Extractor, Gender, IncompleteBlockPolicy, LanguageHints, PageSelection, PageSink, Rasterizer,
    RecordField, TextRecognizer, VoterRecord,
};
use image::{DynamicImage, GrayImage, Rgb, RgbImage};
use std::path::Path;
use std::sync::{Arc, Mutex};

// ── Fakes ────────────────────────────────────────────────────────────────────

struct BlankPages {
    pages: usize,
}

impl Rasterizer for BlankPages {
    fn rasterize(
        &self,
        _pdf_path: &Path,
        config: &ExtractionConfig,
        sink: &mut dyn PageSink,
    ) -> Result<(), ExtractionError> {
        let indices = config.pages.to_indices(self.pages);
        if indices.is_empty() {
            return Err(ExtractionError::PageOutOfRange {
                page: 1,
                total: self.pages,
            });
        }
        sink.begin(indices.len(), self.pages);
        for idx in indices {
            let page_num = idx + 1;
            let img = RgbImage::from_pixel(page_num as u32, 3, Rgb([250, 250, 250]));
            sink.page(page_num, Ok(DynamicImage::ImageRgb8(img)))?;
        }
        Ok(())
    }
}

struct ScriptedOcr {
    pages: Vec<&'static str>,
    seen_languages: Mutex<Vec<String>>,
}

impl ScriptedOcr {
    fn new(pages: Vec<&'static str>) -> Arc<Self> {
        Arc::new(Self {
            pages,
            seen_languages: Mutex::new(Vec::new()),
        })
    }
}

impl TextRecognizer for ScriptedOcr {
    fn recognize(
        &self,
        image: &GrayImage,
        languages: &LanguageHints,
    ) -> Result<String, RecognitionError> {
        self.seen_languages.lock().unwrap().push(languages.to_string());
        let idx = image.width() as usize - 1;
        Ok(self.pages.get(idx).copied().unwrap_or_default().to_string())
    }
}

fn extractor(config: ExtractionConfig, pages: Vec<&'static str>) -> (Extractor, Arc<ScriptedOcr>) {
    let ocr = ScriptedOcr::new(pages.clone());
    let extractor = Extractor::with_components(
        config,
        Arc::new(BlankPages { pages: pages.len() }),
        ocr.clone(),
    );
    (extractor, ocr)
}

fn run(
    config: ExtractionConfig,
    pages: Vec<&'static str>,
) -> Result<Vec<VoterRecord>, ExtractionError> {
    let (extractor, _) = extractor(config, pages);
    extractor
        .extract_path(Path::new("roll.pdf"))
        .map(|out| out.records)
}

// ── Scripted pages ───────────────────────────────────────────────────────────

const PAGE_WITH_HEADER: &str = "\
निवाचन क्षेत्र की संख्या एवं नाम : 123 - लखनऊ पूर्व
अनुभाग संख्या एवं नाम : 1-रामपुर खास

निर्वाचक का नाम : राम कुमार
पिता का नाम : श्याम लाल
मकान संख्या : 12
उम्र : 45
लिंग : पुरुष

निर्वाचक का नाम : सीता देवी
पति का नाम : राम कुमार
मकान संख्या : 12
उम्र : ४२
लिंग : महिला
";

// No header, and the last block is not followed by a blank line.
const PAGE_WITHOUT_HEADER: &str = "\
निर्वाचक का नाम : मोहन
मकान संख्या : 7
उम्र : 60

निर्वाचक का नाम : गीता शर्मा
मकान संख्या : 8
उम्र : 33";

const PAGE_NOISE: &str = "फोटो उपलब्ध\n\nभाग संख्या\n";

// ── Tests ────────────────────────────────────────────────────────────────────

#[test]
fn records_follow_page_order_with_header_fields() {
    let records = run(
        ExtractionConfig::default(),
        vec![PAGE_WITH_HEADER, PAGE_WITHOUT_HEADER],
    )
    .unwrap();

    let names: Vec<_> = records.iter().map(|r| r.name.as_deref().unwrap()).collect();
    assert_eq!(names, ["राम कुमार", "सीता देवी", "मोहन", "गीता शर्मा"]);

    let ram = &records[0];
    assert_eq!(ram.surname.as_deref(), Some("कुमार"));
    assert_eq!(ram.age, Some(45));
    assert_eq!(ram.house_number.as_deref(), Some("12"));
    assert_eq!(ram.gender, Some(Gender::Male));
    assert_eq!(ram.spouse_or_parent_name.as_deref(), Some("श्याम लाल"));

    assert_eq!(records[1].age, Some(42));
    assert_eq!(records[1].gender, Some(Gender::Female));

    for r in &records[..2] {
        assert_eq!(r.section_number.as_deref(), Some("1"));
        assert_eq!(r.section_name.as_deref(), Some("रामपुर खास"));
        assert_eq!(r.polling_station_number.as_deref(), Some("123"));
        assert_eq!(r.polling_station_name.as_deref(), Some("लखनऊ पूर्व"));
    }
    // Header values never leak onto the next page.
    for r in &records[2..] {
        assert!(r.section_number.is_none());
        assert!(r.polling_station_name.is_none());
    }
}

#[test]
fn single_token_name_has_empty_surname() {
    let records = run(ExtractionConfig::default(), vec![PAGE_WITHOUT_HEADER]).unwrap();
    assert_eq!(records[0].surname.as_deref(), Some(""));
    assert_eq!(records[1].surname.as_deref(), Some("शर्मा"));
}

#[test]
fn trailing_block_without_blank_line_is_emitted() {
    let records = run(ExtractionConfig::default(), vec![PAGE_WITHOUT_HEADER]).unwrap();
    assert_eq!(records.len(), 2);
    assert_eq!(records[1].house_number.as_deref(), Some("8"));
}

#[test]
fn page_reports_and_warnings() {
    let (extractor, _) = extractor(
        ExtractionConfig::default(),
        vec![PAGE_WITHOUT_HEADER, PAGE_NOISE],
    );
    let output = extractor.extract_path(Path::new("roll.pdf")).unwrap();

    assert_eq!(output.pages.len(), 2);
    assert_eq!(output.pages[0].record_count, 2);
    assert!(output.pages[1].no_match);
    assert_eq!(output.stats.total_records, 2);
    assert_eq!(output.stats.no_match_pages, 1);
    assert_eq!(output.warnings(), ["No match found on page 2"]);

    let response = output.into_response();
    assert_eq!(response.status, "success");
    assert_eq!(response.data.len(), 2);
}

#[test]
fn language_hints_reach_the_recognizer() {
    let config = ExtractionConfig::builder()
        .languages("mar+eng".parse().unwrap())
        .build()
        .unwrap();
    let (extractor, ocr) = extractor(config, vec![PAGE_WITHOUT_HEADER, PAGE_WITHOUT_HEADER]);
    extractor.extract_path(Path::new("roll.pdf")).unwrap();
    assert_eq!(*ocr.seen_languages.lock().unwrap(), ["mar+eng", "mar+eng"]);
}

#[test]
fn page_selection_limits_recognition() {
    let config = ExtractionConfig::builder()
        .pages(PageSelection::Single(2))
        .build()
        .unwrap();
    let records = run(config, vec![PAGE_WITH_HEADER, PAGE_WITHOUT_HEADER]).unwrap();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].name.as_deref(), Some("मोहन"));
}

#[test]
fn required_fields_are_configurable() {
    const NO_HOUSE: &str = "निर्वाचक का नाम : राम कुमार\nलिंग : पुरुष\n";

    let err = run(ExtractionConfig::default(), vec![NO_HOUSE]).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::EmptyExtraction);

    let config = ExtractionConfig::builder()
        .required_fields([RecordField::Name, RecordField::Gender])
        .build()
        .unwrap();
    let records = run(config, vec![NO_HOUSE]).unwrap();
    assert_eq!(records.len(), 1);
    assert!(records[0].house_number.is_none());
}

#[test]
fn carry_policy_joins_split_blocks() {
    // OCR broke one elector block in two with a stray blank line.
    const SPLIT: &str = "निर्वाचक का नाम : राम कुमार\nउम्र : 45\n\nमकान संख्या : 12\n";

    let err = run(ExtractionConfig::default(), vec![SPLIT]).unwrap_err();
    assert!(matches!(err, ExtractionError::EmptyExtraction { .. }));

    let config = ExtractionConfig::builder()
        .incomplete_blocks(IncompleteBlockPolicy::Carry)
        .build()
        .unwrap();
    let records = run(config, vec![SPLIT]).unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].house_number.as_deref(), Some("12"));
}

#[test]
fn invisible_characters_do_not_break_labels() {
    const ZWJ: &str = "निर्वाचक\u{200D} का नाम : राम कुमार\r\nउम्र :\u{200B} 45\r\nमकान संख्या : 3\r\n";
    let records = run(ExtractionConfig::default(), vec![ZWJ]).unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].age, Some(45));
}

#[test]
fn no_records_anywhere_is_an_empty_extraction() {
    let err = run(ExtractionConfig::default(), vec![PAGE_NOISE, PAGE_NOISE]).unwrap_err();
    assert!(matches!(
        err,
        ExtractionError::EmptyExtraction {
            total_pages: 2,
            no_match_pages: 2
        }
    ));

    let response = ErrorResponse::from(&err);
    assert_eq!(response.code, 422);
    assert_eq!(response.status, "error");
}

#[test]
fn repeated_runs_are_identical() {
    let pages = vec![PAGE_WITH_HEADER, PAGE_NOISE, PAGE_WITHOUT_HEADER];
    let first = run(ExtractionConfig::default(), pages.clone()).unwrap();
    let second = run(ExtractionConfig::default(), pages).unwrap();
    assert_eq!(
        serde_json::to_value(&first).unwrap(),
        serde_json::to_value(&second).unwrap()
    );
}

#[derive(Default)]
struct EventLog(Mutex<Vec<String>>);

impl EventLog {
    fn push(&self, event: String) {
        self.0.lock().unwrap().push(event);
    }
}

impl ExtractionProgressCallback for EventLog {
    fn on_extraction_start(&self, total_pages: usize) {
        self.push(format!("start {total_pages}"));
    }
    fn on_page_start(&self, page_num: usize, total_pages: usize) {
        self.push(format!("page {page_num}/{total_pages}"));
    }
    fn on_page_complete(&self, page_num: usize, _total_pages: usize, record_count: usize) {
        self.push(format!("done {page_num}: {record_count}"));
    }
    fn on_page_error(&self, page_num: usize, _total_pages: usize, _error: &str) {
        self.push(format!("error {page_num}"));
    }
    fn on_extraction_complete(&self, total_pages: usize, total_records: usize) {
        self.push(format!("finish {total_pages}: {total_records}"));
    }
}

#[test]
fn progress_events_arrive_in_page_order() {
    let log = Arc::new(EventLog::default());
    let config = ExtractionConfig::builder()
        .progress_callback(log.clone())
        .build()
        .unwrap();
    run(config, vec![PAGE_WITH_HEADER, PAGE_NOISE]).unwrap();

    assert_eq!(
        *log.0.lock().unwrap(),
        [
            "start 2",
            "page 1/2",
            "done 1: 2",
            "page 2/2",
            "done 2: 0",
            "finish 2: 2"
        ]
    );
}

#[tokio::test]
async fn extract_bytes_stages_and_runs() {
    let (extractor, _) = extractor(ExtractionConfig::default(), vec![PAGE_WITHOUT_HEADER]);
    let output = extractor
        .extract_bytes(b"%PDF-1.7\n%fake body", "ward-7.pdf")
        .await
        .unwrap();
    assert_eq!(output.records.len(), 2);
}

#[tokio::test]
async fn extract_bytes_rejects_non_pdf_and_oversized_input() {
    let config = ExtractionConfig::builder()
        .max_input_bytes(16)
        .build()
        .unwrap();
    let (extractor, ocr) = extractor(config, vec![PAGE_WITHOUT_HEADER]);

    let err = extractor
        .extract_bytes(b"GIF89a", "scan.gif")
        .await
        .unwrap_err();
    assert!(matches!(err, ExtractionError::NotAPdf { .. }));
    assert_eq!(err.kind(), ErrorKind::InvalidInput);

    let err = extractor
        .extract_bytes(&[b'%'; 17], "big.pdf")
        .await
        .unwrap_err();
    assert!(matches!(err, ExtractionError::FileTooLarge { size: 17, .. }));
    assert_eq!(ErrorResponse::from(&err).code, 400);

    // Rejected before any page reached the recogniser.
    assert!(ocr.seen_languages.lock().unwrap().is_empty());
}

#[test]
fn missing_local_file_is_invalid_input() {
    let extractor = Extractor::new(ExtractionConfig::default());
    let err = tokio_test::block_on(extractor.extract("/no/such/roll.pdf")).unwrap_err();
    assert!(matches!(err, ExtractionError::FileNotFound { .. }));
    assert_eq!(err.kind(), ErrorKind::InvalidInput);
}
