//! Record segmentation: OCR text of one page → ordered voter records.
//!
//! The segmenter has a single state (accumulating into one working record)
//! and three transitions:
//!
//! * non-blank line: run the line rules from [`crate::pipeline::fields`] and
//!   fold the matched value into the working record;
//! * blank line: emit the working record if valid and start a new one (an
//!   incomplete record is discarded or carried, see
//!   [`IncompleteBlockPolicy`]);
//! * end of page: emit the trailing record if valid, otherwise discard it.
//!
//! Page-scoped header fields are scanned once, before the line loop, and
//! stamped onto every record emitted from the page.

use crate::config::{ExtractionConfig, IncompleteBlockPolicy};
use crate::output::{RecordField, VoterRecord};
use crate::pipeline::fields::{match_line, LineField, PageHeader};
use tracing::debug;

/// Rules the segmenter needs from the configuration.
#[derive(Debug, Clone)]
pub struct SegmentRules {
    pub required_fields: Vec<RecordField>,
    pub incomplete_blocks: IncompleteBlockPolicy,
}

impl Default for SegmentRules {
    fn default() -> Self {
        Self::from(&ExtractionConfig::default())
    }
}

impl From<&ExtractionConfig> for SegmentRules {
    fn from(config: &ExtractionConfig) -> Self {
        Self {
            required_fields: config.required_fields.clone(),
            incomplete_blocks: config.incomplete_blocks,
        }
    }
}

/// Records found on one page plus segmentation diagnostics.
#[derive(Debug, Clone, Default)]
pub struct PageSegmentation {
    pub records: Vec<VoterRecord>,
    pub header: PageHeader,
    /// Non-empty blocks dropped because a required field was missing.
    pub discarded_blocks: usize,
}

/// Segment the text of one page.
pub fn segment_page(page_text: &str, rules: &SegmentRules) -> PageSegmentation {
    let mut segmenter = RecordSegmenter::new(page_text, rules);
    for line in page_text.split('\n') {
        segmenter.push_line(line);
    }
    segmenter.finish()
}

/// Line-driven state machine owning the working record for one page.
pub struct RecordSegmenter<'a> {
    rules: &'a SegmentRules,
    header: PageHeader,
    working: VoterRecord,
    records: Vec<VoterRecord>,
    discarded_blocks: usize,
}

impl<'a> RecordSegmenter<'a> {
    /// Start a page. Header fields are taken from the full page text.
    pub fn new(page_text: &str, rules: &'a SegmentRules) -> Self {
        let header = PageHeader::scan(page_text);
        if !header.is_empty() {
            debug!(?header, "Page header fields");
        }
        Self {
            rules,
            header,
            working: VoterRecord::default(),
            records: Vec::new(),
            discarded_blocks: 0,
        }
    }

    pub fn push_line(&mut self, line: &str) {
        let line = line.trim();
        if line.is_empty() {
            self.flush_block();
            return;
        }
        if let Some(field) = match_line(line) {
            self.apply(field);
        }
    }

    /// End of page: emit the trailing record if valid.
    pub fn finish(mut self) -> PageSegmentation {
        if self.is_valid() {
            self.emit();
        } else if !self.working.is_empty() {
            debug!(record = ?self.working, "Discarding incomplete trailing block");
            self.discarded_blocks += 1;
        }
        PageSegmentation {
            records: self.records,
            header: self.header,
            discarded_blocks: self.discarded_blocks,
        }
    }

    fn apply(&mut self, field: LineField) {
        let record = &mut self.working;
        match field {
            LineField::Name { name, surname } => {
                record.name = Some(name);
                record.surname = Some(surname);
            }
            LineField::Age(age) => record.age = Some(age),
            LineField::HouseNumber(n) => record.house_number = Some(n),
            LineField::SpouseOrParentName(n) => record.spouse_or_parent_name = Some(n),
            LineField::Gender(g) => record.gender = Some(g),
            LineField::Tag(tag) => {
                if record.tag_number.is_none() {
                    record.tag_number = Some(tag);
                }
            }
        }
    }

    fn flush_block(&mut self) {
        if self.is_valid() {
            self.emit();
            return;
        }
        if self.working.is_empty() {
            return;
        }
        match self.rules.incomplete_blocks {
            IncompleteBlockPolicy::Discard => {
                debug!(record = ?self.working, "Discarding incomplete block");
                self.working = VoterRecord::default();
                self.discarded_blocks += 1;
            }
            IncompleteBlockPolicy::Carry => {}
        }
    }

    /// Required fields may be page-scoped, so validity is judged on the
    /// record as it would be emitted. A block with no line fields of its own
    /// is never valid.
    fn is_valid(&self) -> bool {
        !self.working.is_empty()
            && self
                .with_header(self.working.clone())
                .is_valid(&self.rules.required_fields)
    }

    fn with_header(&self, mut record: VoterRecord) -> VoterRecord {
        record.section_number = self.header.section_number.clone();
        record.section_name = self.header.section_name.clone();
        record.polling_station_number = self.header.polling_station_number.clone();
        record.polling_station_name = self.header.polling_station_name.clone();
        record
    }

    fn emit(&mut self) {
        let record = std::mem::take(&mut self.working);
        let record = self.with_header(record);
        self.records.push(record);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::Gender;

    fn rules() -> SegmentRules {
        SegmentRules::default()
    }

    const BLOCK_RAM: &str = "निर्वाचक का नाम : राम कुमार\nउम्र : 45\nमकान संख्या : 12\nलिंग : पुरुष\n";
    const BLOCK_SITA: &str = "निर्वाचक का नाम : सीता देवी\nपति का नाम : राम कुमार\nउम्र : 40\nमकान संख्या : 12\nलिंग : महिला\n";

    #[test]
    fn test_single_block_example() {
        let text = format!("{BLOCK_RAM}\n");
        let seg = segment_page(&text, &rules());
        assert_eq!(seg.records.len(), 1);
        assert_eq!(
            seg.records[0],
            VoterRecord {
                name: Some("राम कुमार".into()),
                surname: Some("कुमार".into()),
                age: Some(45),
                house_number: Some("12".into()),
                gender: Some(Gender::Male),
                ..Default::default()
            }
        );
    }

    #[test]
    fn test_trailing_block_without_blank_line_is_emitted() {
        let text = format!("{BLOCK_RAM}\n{}", BLOCK_SITA.trim_end());
        let seg = segment_page(&text, &rules());
        assert_eq!(seg.records.len(), 2);
        assert_eq!(seg.records[1].name.as_deref(), Some("सीता देवी"));
        assert_eq!(seg.records[1].spouse_or_parent_name.as_deref(), Some("राम कुमार"));
        assert_eq!(seg.discarded_blocks, 0);
    }

    #[test]
    fn test_missing_required_field_is_not_emitted() {
        let text = "निर्वाचक का नाम : मोहन\nउम्र : 33\n\n";
        let seg = segment_page(text, &rules());
        assert!(seg.records.is_empty());
        assert_eq!(seg.discarded_blocks, 1);
    }

    #[test]
    fn test_discard_policy_resets_on_blank_line() {
        // House number arrives after a stray blank line; with Discard the
        // first half is dropped and the second half alone is incomplete.
        let text = "निर्वाचक का नाम : मोहन लाल\nउम्र : 33\n\nमकान संख्या : 9\n";
        let seg = segment_page(text, &rules());
        assert!(seg.records.is_empty());
        assert_eq!(seg.discarded_blocks, 2);
    }

    #[test]
    fn test_carry_policy_survives_stray_blank_line() {
        let rules = SegmentRules {
            incomplete_blocks: IncompleteBlockPolicy::Carry,
            ..SegmentRules::default()
        };
        let text = "निर्वाचक का नाम : मोहन लाल\nउम्र : 33\n\nमकान संख्या : 9\n";
        let seg = segment_page(text, &rules);
        assert_eq!(seg.records.len(), 1);
        assert_eq!(seg.records[0].surname.as_deref(), Some("लाल"));
        assert_eq!(seg.records[0].house_number.as_deref(), Some("9"));
    }

    #[test]
    fn test_header_applies_to_every_record() {
        let text = format!(
            "अनुभाग संख्या एवं नाम : 2-शिवपुर\n\
             निवाचन क्षेत्र की संख्या एवं नाम : 173 - सरोजनीनगर\n\n\
             {BLOCK_RAM}\n{BLOCK_SITA}\n"
        );
        let seg = segment_page(&text, &rules());
        assert_eq!(seg.records.len(), 2);
        for r in &seg.records {
            assert_eq!(r.section_number.as_deref(), Some("2"));
            assert_eq!(r.section_name.as_deref(), Some("शिवपुर"));
            assert_eq!(r.polling_station_number.as_deref(), Some("173"));
            assert_eq!(r.polling_station_name.as_deref(), Some("सरोजनीनगर"));
        }
    }

    #[test]
    fn test_header_found_below_records_still_applies() {
        let text = format!("{BLOCK_RAM}\nअनुभाग संख्या एवं नाम : 5-गांधी नगर\n");
        let seg = segment_page(&text, &rules());
        assert_eq!(seg.records.len(), 1);
        assert_eq!(seg.records[0].section_name.as_deref(), Some("गांधी नगर"));
    }

    #[test]
    fn test_header_only_page_yields_nothing() {
        let text = "अनुभाग संख्या एवं नाम : 1-रामपुर\nनिवाचन क्षेत्र की संख्या एवं नाम : 12 - सदर\n";
        let seg = segment_page(text, &rules());
        assert!(seg.records.is_empty());
        assert_eq!(seg.header.section_number.as_deref(), Some("1"));
        assert_eq!(seg.header.polling_station_name.as_deref(), Some("सदर"));
    }

    #[test]
    fn test_tag_first_match_wins() {
        let text = "| 101 | UP1234567\nनिर्वाचक का नाम : राम\nउम्र : 45\nमकान संख्या : 12\n| 102 | UP7654321\n\n";
        let seg = segment_page(text, &rules());
        assert_eq!(seg.records.len(), 1);
        assert_eq!(seg.records[0].tag_number.as_deref(), Some("101  UP1234567"));
        assert_eq!(seg.records[0].surname.as_deref(), Some(""));
    }

    #[test]
    fn test_later_line_overwrites_earlier_value() {
        let text = "निर्वाचक का नाम : राम\nउम्र : 45\nउम्र : 46\nमकान संख्या : 12\n";
        let seg = segment_page(text, &rules());
        assert_eq!(seg.records[0].age, Some(46));
    }

    #[test]
    fn test_crlf_and_whitespace_only_lines() {
        let text = "निर्वाचक का नाम : राम कुमार\r\nउम्र : 45\r\nमकान संख्या : 12\r\n   \t\r\nनिर्वाचक का नाम : गीता\r\n";
        let seg = segment_page(text, &rules());
        assert_eq!(seg.records.len(), 1);
        assert_eq!(seg.records[0].name.as_deref(), Some("राम कुमार"));
        assert_eq!(seg.discarded_blocks, 1);
    }

    #[test]
    fn test_custom_required_fields() {
        let rules = SegmentRules {
            required_fields: vec![RecordField::Name, RecordField::Gender],
            ..SegmentRules::default()
        };
        let text = "निर्वाचक का नाम : राम\nलिंग : पुरुष\n\nनिर्वाचक का नाम : श्याम\nउम्र : 20\nमकान संख्या : 3\n";
        let seg = segment_page(text, &rules);
        assert_eq!(seg.records.len(), 1);
        assert_eq!(seg.records[0].name.as_deref(), Some("राम"));
    }

    #[test]
    fn test_page_scoped_required_field_comes_from_header() {
        let rules = SegmentRules {
            required_fields: vec![RecordField::Name, RecordField::SectionNumber],
            ..SegmentRules::default()
        };
        let text = format!("अनुभाग संख्या एवं नाम : 2-शिवपुर\n\n{BLOCK_RAM}\n");
        let seg = segment_page(&text, &rules);
        assert_eq!(seg.records.len(), 1);
        assert_eq!(seg.records[0].section_number.as_deref(), Some("2"));
        assert_eq!(seg.discarded_blocks, 0);

        // Without a header on the page the same block cannot qualify.
        let seg = segment_page(&format!("{BLOCK_RAM}\n"), &rules);
        assert!(seg.records.is_empty());
        assert_eq!(seg.discarded_blocks, 1);
    }

    #[test]
    fn test_header_alone_does_not_make_a_record() {
        let rules = SegmentRules {
            required_fields: vec![RecordField::SectionNumber],
            ..SegmentRules::default()
        };
        let seg = segment_page("अनुभाग संख्या एवं नाम : 2-शिवपुर\n\nफोटो उपलब्ध\n", &rules);
        assert!(seg.records.is_empty());
    }

    #[test]
    fn test_empty_page() {
        let seg = segment_page("", &rules());
        assert!(seg.records.is_empty());
        assert_eq!(seg.discarded_blocks, 0);
    }
}
