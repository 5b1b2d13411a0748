//! Post-processing: deterministic cleanup of raw OCR text.
//!
//! Runs between recognition and segmentation. Every rule preserves the line
//! structure: no line is added, removed or merged, so blank lines still mark
//! elector-block boundaries afterwards.
//!
//! ## Rule Order
//!
//! Line endings are normalised first so the per-line rules see `\n` only.

/// Apply all cleanup rules to the raw engine output.
///
/// Rules (applied in order):
/// 1. Normalise line endings (CRLF and bare CR → LF)
/// 2. Strip invisible Unicode (zero-width space and joiners, BOM, soft hyphen, word joiner)
/// 3. Trim trailing whitespace per line
pub fn clean_ocr_text(input: &str) -> String {
    let s = normalise_line_endings(input);
    let s = remove_invisible_chars(&s);
    trim_trailing_whitespace(&s)
}

// ── Rule 1: Normalise line endings ───────────────────────────────────────────

fn normalise_line_endings(input: &str) -> String {
    input.replace("\r\n", "\n").replace('\r', "\n")
}

// ── Rule 2: Remove invisible Unicode characters ─────────────────────────────
//
// Tesseract emits ZWJ/ZWNJ around viramas on some Devanagari conjuncts.
// Left in place they break the literal label anchors (`निर्वाचक`, `उम्र`).

fn remove_invisible_chars(input: &str) -> String {
    input.replace(
        [
            '\u{200B}', '\u{FEFF}', '\u{00AD}', '\u{200C}', '\u{200D}', '\u{2060}',
        ],
        "",
    )
}

// ── Rule 3: Trim trailing whitespace per line ────────────────────────────────

fn trim_trailing_whitespace(input: &str) -> String {
    input
        .split('\n')
        .map(str::trim_end)
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalise_line_endings() {
        assert_eq!(normalise_line_endings("a\r\nb\rc\n"), "a\nb\nc\n");
    }

    #[test]
    fn test_remove_invisible() {
        let input = "उम्र\u{200D} : 45\u{200B}\u{FEFF}";
        assert_eq!(remove_invisible_chars(input), "उम्र : 45");
    }

    #[test]
    fn test_trim_trailing_whitespace_keeps_blank_lines() {
        let input = "उम्र : 45   \n \t\nलिंग : पुरुष\t";
        assert_eq!(trim_trailing_whitespace(input), "उम्र : 45\n\nलिंग : पुरुष");
    }

    #[test]
    fn test_clean_preserves_line_count() {
        let raw = "निर्वाचक का नाम : राम कुमार \r\nउम्र : 45\r\n\r\n\u{FEFF}मकान संख्या : 12\r\n";
        let cleaned = clean_ocr_text(raw);
        assert_eq!(
            cleaned,
            "निर्वाचक का नाम : राम कुमार\nउम्र : 45\n\nमकान संख्या : 12\n"
        );
        assert_eq!(raw.matches('\n').count(), cleaned.matches('\n').count());
    }

    #[test]
    fn test_clean_empty() {
        assert_eq!(clean_ocr_text(""), "");
    }
}
