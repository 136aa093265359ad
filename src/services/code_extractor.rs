//! Extraction of a single source block from a model response.
//!
//! Models usually answer with prose around one fenced block:
//!
//! ````text
//! Here is the solution:
//! ```python
//! def reverse(s):
//!     return s[::-1]
//! print(reverse("hello"))
//! ```
//! ````
//!
//! The first fenced block wins. Without one, the whole response is taken as
//! source. In both cases a leading language tag line (`python`, `Py`,
//! `cpp`, ...) is stripped, as is the tag of a one-line fence such as
//! ```` ```python print(1)``` ````.

use crate::domain::models::TargetLanguage;

const FENCE: &str = "```";

/// Extract the source to execute from a raw completion.
///
/// Pure and deterministic; never looks at what the code does.
pub fn extract_code(response: &str) -> String {
    let block = first_fenced_block(response).unwrap_or(response);
    strip_language_tag(block).to_string()
}

/// Interior of the first closed, non-blank fenced block.
pub fn first_fenced_block(text: &str) -> Option<&str> {
    let mut search_from = 0;

    while let Some(open_rel) = text[search_from..].find(FENCE) {
        let interior_start = search_from + open_rel + FENCE.len();
        let close_rel = text[interior_start..].find(FENCE)?;
        let interior = &text[interior_start..interior_start + close_rel];

        if !interior.trim().is_empty() {
            return Some(interior);
        }
        search_from = interior_start + close_rel + FENCE.len();
    }

    None
}

/// Drop a first line that consists of nothing but a language tag, or the
/// leading tag token of a single-line block.
fn strip_language_tag(block: &str) -> &str {
    let (first_line, rest) = match block.find('\n') {
        Some(pos) => (&block[..pos], &block[pos + 1..]),
        None => (block, ""),
    };

    if TargetLanguage::is_fence_tag(first_line.trim()) {
        return rest;
    }

    // Multi-line code may legitimately start with a word like `py`
    if rest.trim().is_empty() {
        if let Some((tag, code)) = first_line.trim_start().split_once(char::is_whitespace) {
            if TargetLanguage::is_fence_tag(tag) {
                return code.trim_start();
            }
        }
    }

    block
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extracts_first_fenced_block_with_tag_stripped() {
        let response = "Sure! Here you go:\n```python\ndef reverse(s):\n    return s[::-1]\n\nprint(reverse(\"hello\"))\n```\nThis prints olleh.";
        assert_eq!(
            extract_code(response),
            "def reverse(s):\n    return s[::-1]\n\nprint(reverse(\"hello\"))\n"
        );
    }

    #[test]
    fn test_tag_is_case_insensitive() {
        let response = "```Python3\nprint(1)\n```";
        assert_eq!(extract_code(response), "print(1)\n");

        let response = "```CPP\nint main() {}\n```";
        assert_eq!(extract_code(response), "int main() {}\n");
    }

    #[test]
    fn test_untagged_block_returns_exact_interior() {
        let response = "```\nprint('x')\n```";
        assert_eq!(extract_code(response), "\nprint('x')\n");
    }

    #[test]
    fn test_only_first_block_is_used() {
        let response = "```py\nprint(1)\n```\nAlternatively:\n```py\nprint(2)\n```";
        assert_eq!(extract_code(response), "print(1)\n");
    }

    #[test]
    fn test_blank_block_is_skipped() {
        let response = "``````\ntext\n```py\nprint(3)\n```";
        assert_eq!(extract_code(response), "print(3)\n");
    }

    #[test]
    fn test_falls_back_to_whole_response() {
        let response = "print('no fences here')";
        assert_eq!(extract_code(response), response);
    }

    #[test]
    fn test_fallback_strips_leading_tag_line() {
        let response = "python\nprint('hi')";
        assert_eq!(extract_code(response), "print('hi')");
    }

    #[test]
    fn test_unclosed_fence_is_not_a_block() {
        let response = "```python\nprint('cut off";
        assert_eq!(first_fenced_block(response), None);
        assert_eq!(extract_code(response), response);
    }

    #[test]
    fn test_code_mentioning_python_is_preserved() {
        let response = "```python\nprint(\"python is fun\")\n```";
        assert_eq!(extract_code(response), "print(\"python is fun\")\n");
    }

    #[test]
    fn test_single_line_fence_drops_inline_tag() {
        assert_eq!(extract_code("Run this: ```python print(1)```"), "print(1)");
        assert_eq!(extract_code("```JS\tconsole.log(1)```"), "console.log(1)");
    }

    #[test]
    fn test_multi_line_code_starting_with_tag_word_is_kept() {
        let response = "```\npy = 3\nprint(py)\n```";
        assert_eq!(extract_code(response), "\npy = 3\nprint(py)\n");

        let response = "```python\npy = 3\n```";
        assert_eq!(extract_code(response), "py = 3\n");
    }

    #[test]
    fn test_tag_only_block_yields_empty_source() {
        assert_eq!(extract_code("```python```"), "");
    }
}
