//! Field pattern matching: Devanagari label anchors → record fields.
//!
//! Electoral rolls print every value after a Hindi label and a colon, e.g.
//! `निर्वाचक का नाम : राम कुमार`. Two labels describe the whole page (the
//! section and the constituency/polling station); they are read once from the
//! full page text by [`PageHeader::scan`]. All other labels describe the
//! elector block they appear in and are matched line by line with
//! [`match_line`].
//!
//! Matching is case-sensitive and script-exact. `\d` and `\w` are Unicode
//! aware, so Devanagari digits (`०`–`९`) and combining vowel signs are
//! accepted wherever ASCII ones are.

use crate::output::Gender;
use once_cell::sync::Lazy;
use regex::Regex;

// ── Page-scoped patterns ─────────────────────────────────────────────────────
//
// Values stop at the end of the label's line: `[\t\p{Zs}]` is horizontal
// whitespace only, so the section name never swallows the next label.

static RE_SECTION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"अनुभाग संख्या एवं नाम\s*:\s*(\d+-\w+[\w\t\p{Zs}]+)").unwrap()
});

// `निवाचन` (missing र्) is how the label comes out of OCR on most rolls; the
// correct spelling is accepted too.
static RE_POLLING: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"नि(?:र्)?वाचन क्षेत्र की संख्या एवं नाम\s*:\s*(\d+[\t\p{Zs}]*-[\t\p{Zs}]*[\w\t\p{Zs}()]+)",
    )
    .unwrap()
});

// ── Line patterns, in matching order ─────────────────────────────────────────

static RE_NAME: Lazy<Regex> = Lazy::new(|| Regex::new(r"निर्वाचक का नाम\s*:\s*(.+)").unwrap());

static RE_AGE: Lazy<Regex> = Lazy::new(|| Regex::new(r"उम्र\s*:\s*(\d+)").unwrap());

static RE_HOUSE: Lazy<Regex> = Lazy::new(|| Regex::new(r"मकान संख्या\s*:\s*(\d+)").unwrap());

static RE_RELATION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?:पिता का नाम|पति का नाम)\s*:\s*(.+)").unwrap());

static RE_GENDER: Lazy<Regex> = Lazy::new(|| Regex::new(r"लिंग\s*:\s*(पुरुष|महिला)").unwrap());

// Weak fallback: `| 123 | ABC4567`-style serial/EPIC fragments.
static RE_TAG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\|?\s*(\d+\s*\|?\s*[A-Za-z0-9]+)").unwrap());

/// Page-scoped values shared by every record on a page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageHeader {
    pub section_number: Option<String>,
    pub section_name: Option<String>,
    pub polling_station_number: Option<String>,
    pub polling_station_name: Option<String>,
}

impl PageHeader {
    /// Scan the full page text once. The first occurrence of each label wins.
    pub fn scan(page_text: &str) -> Self {
        let mut header = PageHeader::default();

        if let Some(caps) = RE_SECTION.captures(page_text) {
            let (number, name) = split_numbered(&caps[1]);
            header.section_number = Some(number);
            header.section_name = Some(name);
        }

        if let Some(caps) = RE_POLLING.captures(page_text) {
            let (number, name) = split_numbered(&caps[1]);
            header.polling_station_number = Some(number);
            header.polling_station_name = Some(name);
        }

        header
    }

    pub fn is_empty(&self) -> bool {
        *self == PageHeader::default()
    }
}

/// Split `"12 - रामपुर (उत्तर)"` on the first `-`: trimmed left part is the
/// number, the trimmed remainder (any further `-` kept) is the name.
fn split_numbered(value: &str) -> (String, String) {
    let value = value.trim();
    match value.split_once('-') {
        Some((number, name)) => (number.trim().to_string(), name.trim().to_string()),
        None => (value.to_string(), String::new()),
    }
}

/// A value recognised on a single line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineField {
    Name { name: String, surname: String },
    Age(u32),
    HouseNumber(String),
    SpouseOrParentName(String),
    Gender(Gender),
    Tag(String),
}

/// Match one trimmed, non-blank line against the line rules.
///
/// Rules are tried in fixed order (name, age, house number, spouse/parent,
/// gender, tag fallback) and the first that matches consumes the line.
pub fn match_line(line: &str) -> Option<LineField> {
    if let Some(caps) = RE_NAME.captures(line) {
        let name = caps[1].trim().to_string();
        let surname = surname_of(&name).to_string();
        return Some(LineField::Name { name, surname });
    }

    if let Some(age) = RE_AGE.captures(line).and_then(|c| parse_digits(&c[1])) {
        return Some(LineField::Age(age));
    }

    if let Some(caps) = RE_HOUSE.captures(line) {
        return Some(LineField::HouseNumber(caps[1].trim().to_string()));
    }

    if let Some(caps) = RE_RELATION.captures(line) {
        return Some(LineField::SpouseOrParentName(caps[1].trim().to_string()));
    }

    if let Some(gender) = RE_GENDER
        .captures(line)
        .and_then(|c| Gender::from_label(&c[1]))
    {
        return Some(LineField::Gender(gender));
    }

    RE_TAG
        .captures(line)
        .map(|c| LineField::Tag(c[1].replace('|', "").trim().to_string()))
}

/// Last whitespace token of `name`, or `""` when the name has fewer than two tokens.
pub fn surname_of(name: &str) -> &str {
    let mut tokens = name.split_whitespace();
    match (tokens.next(), tokens.next_back()) {
        (Some(_), Some(last)) => last,
        _ => "",
    }
}

/// Parse a run of decimal digits from any script into a number.
///
/// Returns `None` on overflow or a non-digit character.
fn parse_digits(s: &str) -> Option<u32> {
    s.chars().try_fold(0u32, |acc, c| {
        let d = c.to_digit(10).or_else(|| devanagari_digit(c))?;
        acc.checked_mul(10)?.checked_add(d)
    })
}

fn devanagari_digit(c: char) -> Option<u32> {
    match c {
        '०'..='९' => Some(c as u32 - '०' as u32),
        _ => None,
    }
}
