//! Character-safe truncation helpers shared by tools, the dispatcher and the
//! session log.

/// Marker appended to tool output cut at a cap.
pub const TRUNCATION_MARKER: &str = "...(truncated)";

/// Byte offset of the `max`-th character, or `None` when `s` has at most
/// `max` characters.
fn cut_point(s: &str, max: usize) -> Option<usize> {
    s.char_indices().nth(max).map(|(idx, _)| idx)
}

/// Keep at most `max` characters of `s`, appending `marker` when anything
/// was dropped. Strings within the cap are returned unchanged.
pub fn truncate_with_marker(s: &str, max: usize, marker: &str) -> String {
    match cut_point(s, max) {
        Some(idx) if max > 0 => format!("{}{}", &s[..idx], marker),
        _ => s.to_string(),
    }
}

/// Truncate tool output to `max` characters with [`TRUNCATION_MARKER`].
pub fn truncate_output(s: &str, max: usize) -> String {
    truncate_with_marker(s, max, TRUNCATION_MARKER)
}

/// Keep at most `max` characters, noting how many were dropped,
/// e.g. `"abc...(+12 chars)"`.
pub fn truncate_with_count(s: &str, max: usize) -> String {
    match cut_point(s, max) {
        Some(idx) if max > 0 => {
            let dropped = s[idx..].chars().count();
            format!("{}...(+{} chars)", &s[..idx], dropped)
        }
        _ => s.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn output_at_cap_is_unchanged() {
        let s = "x".repeat(50_000);
        assert_eq!(truncate_output(&s, 50_000), s);
    }

    #[test]
    fn output_over_cap_gets_marker() {
        let s = "x".repeat(50_001);
        let out = truncate_output(&s, 50_000);
        assert!(out.ends_with(TRUNCATION_MARKER));
        assert_eq!(out.chars().count(), 50_000 + TRUNCATION_MARKER.len());
    }

    #[test]
    fn truncation_respects_char_boundaries() {
        let s = "héllo wörld";
        assert_eq!(truncate_with_marker(s, 2, "~"), "hé~");
    }

    #[test]
    fn count_marker_reports_dropped_chars() {
        assert_eq!(truncate_with_count("abcdef", 2), "ab...(+4 chars)");
        assert_eq!(truncate_with_count("ab", 2), "ab");
    }

    #[test]
    fn zero_cap_disables_truncation() {
        assert_eq!(truncate_output("abc", 0), "abc");
    }
}
