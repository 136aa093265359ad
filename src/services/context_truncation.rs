//! Truncation of oversized prompt sections.
//!
//! Generated source and captured output are echoed back into feedback
//! messages, and a runaway program can print megabytes. Each such section is
//! capped at a character budget, cut on a newline boundary, and marked.

/// Approximate characters per token (conservative heuristic).
const CHARS_PER_TOKEN: usize = 4;

/// Minimum characters kept when truncating, regardless of budget.
const MIN_KEEP_CHARS: usize = 256;

/// Estimate the number of tokens in a string using the chars/token heuristic.
pub fn estimate_tokens(text: &str) -> usize {
    text.len().div_ceil(CHARS_PER_TOKEN)
}

/// Truncate a section to at most `max_chars` bytes of original content.
///
/// Cuts at the last newline before the limit when there is one, never
/// inside a UTF-8 sequence, and appends a marker when content is dropped.
pub fn truncate_section(text: &str, max_chars: usize) -> String {
    if text.len() <= max_chars {
        return text.to_string();
    }

    let keep = floor_char_boundary(text, max_chars.max(MIN_KEEP_CHARS).min(text.len()));
    let cut = text[..keep].rfind('\n').filter(|&pos| pos > 0).unwrap_or(keep);
    let kept = &text[..cut];

    tracing::debug!(
        original_chars = text.len(),
        kept_chars = kept.len(),
        "truncated context section"
    );

    format!(
        "{kept}\n[... truncated: showing {} of {} characters, ~{} tokens omitted ...]",
        kept.len(),
        text.len(),
        estimate_tokens(&text[cut..]),
    )
}

fn floor_char_boundary(text: &str, mut index: usize) -> usize {
    while index > 0 && !text.is_char_boundary(index) {
        index -= 1;
    }
    index
}
