//! Field truncation for spreadsheet cells.
//!
//! Sheets rejects cells above 50,000 characters; rows are capped well below
//! that so one oversized email cannot sink a whole append batch.

use tracing::warn;

/// Marker appended to any truncated field.
pub const TRUNCATION_SUFFIX: &str = "...[TRUNCATED]";

/// Maximum characters per exported field.
pub const MAX_FIELD_CHARS: usize = 10_000;

/// Truncate `text` to at most `max_chars` characters (not bytes).
///
/// Text at or under the limit is returned unchanged. Truncated text keeps
/// `max_chars - suffix` leading characters and ends with [`TRUNCATION_SUFFIX`]
/// so a reader can tell truncation from short content. If `max_chars` is
/// smaller than the suffix itself, the result is the suffix cut to fit.
pub fn truncate(text: &str, max_chars: usize, field: &str) -> String {
    let total = text.chars().count();
    if total <= max_chars {
        return text.to_string();
    }

    let suffix_len = TRUNCATION_SUFFIX.chars().count();
    let keep = max_chars.saturating_sub(suffix_len);

    let mut result: String = text.chars().take(keep).collect();
    result.push_str(TRUNCATION_SUFFIX);

    // Degenerate limits below the suffix length still honor the bound
    let result: String = result.chars().take(max_chars).collect();

    warn!(
        field = field,
        original_chars = total,
        max_chars = max_chars,
        "truncated oversized field"
    );

    result
}
