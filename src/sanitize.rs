//! Identifier Sanitization & Barcode Normalization
//!
//! Pure, deterministic string mapping. Collision detection between two
//! distinct names sanitizing to the same identifier is the synchronizer's
//! job, not this module's.

/// Characters that are illegal in artifact filenames on the platforms we
/// target. Stripped outright, never substituted.
const ILLEGAL: &[char] = &['\\', '/', ':', '*', '?', '"', '<', '>', '|'];

/// Map a display name to a filesystem-safe artifact identifier.
///
/// Leading/trailing whitespace is trimmed, illegal characters are removed,
/// and each run of interior whitespace collapses to a single underscore.
/// Total for every input including the empty string; callers reject empty
/// display names before deriving an identifier.
pub fn sanitize(name: &str) -> String {
    let trimmed = name.trim();
    let mut out = String::with_capacity(trimmed.len());
    let mut pending_separator = false;
    for ch in trimmed.chars() {
        if ILLEGAL.contains(&ch) {
            continue;
        }
        if ch.is_whitespace() {
            pending_separator = !out.is_empty();
            continue;
        }
        if pending_separator {
            out.push('_');
            pending_separator = false;
        }
        out.push(ch);
    }
    out
}

/// Canonicalize a barcode value.
///
/// Decimal inputs are formatted to exactly two fractional digits
/// (`"12345"` becomes `"12345.00"`); anything else is the trimmed literal.
/// The result is both what the rendering endpoint receives and what the
/// catalog stores.
pub fn normalize_barcode(raw: &str) -> String {
    let trimmed = raw.trim();
    match trimmed.parse::<f64>() {
        Ok(n) if n.is_finite() => format!("{n:.2}"),
        _ => trimmed.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_strips_illegal_characters() {
        let out = sanitize(r#"a\b/c:d*e?f"g<h>i|j"#);
        assert_eq!(out, "abcdefghij");
        for ch in ILLEGAL {
            assert!(!out.contains(*ch));
        }
    }

    #[test]
    fn test_sanitize_collapses_whitespace_runs() {
        assert_eq!(sanitize("Widget A"), "Widget_A");
        assert_eq!(sanitize("Widget \t  A"), "Widget_A");
        assert_eq!(sanitize("  Widget A  "), "Widget_A");
    }

    #[test]
    fn test_sanitize_deterministic() {
        let name = "Some / Item: 2?";
        assert_eq!(sanitize(name), sanitize(name));
    }

    #[test]
    fn test_sanitize_empty_input() {
        assert_eq!(sanitize(""), "");
        assert_eq!(sanitize("   "), "");
    }

    #[test]
    fn test_normalize_decimal_barcode() {
        assert_eq!(normalize_barcode("12345"), "12345.00");
        assert_eq!(normalize_barcode("500"), "500.00");
        assert_eq!(normalize_barcode(" 12.5 "), "12.50");
    }

    #[test]
    fn test_normalize_literal_barcode() {
        assert_eq!(normalize_barcode("ABC-1"), "ABC-1");
        assert_eq!(normalize_barcode("  ABC-1  "), "ABC-1");
        assert_eq!(normalize_barcode(""), "");
    }
}
