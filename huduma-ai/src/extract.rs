//! Structured-text extraction - recover a JSON value from noisy model output.
//!
//! Model responses routinely wrap their payload in prose or markdown fences
//! ("Here is the result: {...} Hope that helps!"). This module finds the
//! first JSON object or array in the text, delimits it with a
//! string-literal-aware depth scan, and parses it. Pure text-to-value
//! transformation: deterministic, single pass, no retries, no I/O.

use crate::error::ExtractError;
use serde_json::Value;

/// Recover a JSON value from an arbitrary text blob.
///
/// Scans for the first `{` or `[` and extracts the balanced structure that
/// starts there. Text with no structural delimiter is parsed as a bare JSON
/// scalar (string, number, boolean, null).
///
/// Either returns a value that parses losslessly under `serde_json`, or
/// fails; a partial or corrupt value is never returned.
pub fn extract_json(text: &str) -> Result<Value, ExtractError> {
    let Some(start) = text.find(['{', '[']) else {
        return serde_json::from_str(text.trim()).map_err(|_| ExtractError::MalformedOutput {
            original: text.to_string(),
            extracted: None,
        });
    };

    let open = if text[start..].starts_with('{') { '{' } else { '[' };
    let close = if open == '{' { '}' } else { ']' };

    // Depth scan over the candidate region. Delimiter characters inside
    // string literals must not affect the count, so the scanner tracks
    // string state and backslash escapes.
    let mut depth: usize = 0;
    let mut in_string = false;
    let mut escaped = false;
    let mut end = None;

    for (i, c) in text[start..].char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }
        if c == '"' {
            in_string = true;
        } else if c == open {
            depth += 1;
        } else if c == close {
            depth = depth.saturating_sub(1);
            if depth == 0 {
                end = Some(start + i + c.len_utf8());
                break;
            }
        }
    }

    let Some(end) = end else {
        return Err(ExtractError::UnbalancedStructure {
            original: text.to_string(),
        });
    };

    let candidate = &text[start..end];
    serde_json::from_str(candidate).map_err(|_| ExtractError::MalformedOutput {
        original: text.to_string(),
        extracted: Some(candidate.to_string()),
    })
}
