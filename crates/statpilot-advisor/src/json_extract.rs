//! Balanced JSON object extraction from free-form model output
//!
//! Models often wrap their JSON answer in prose or markdown fences. Taking the
//! span between the first `{` and the last `}` breaks as soon as a response
//! contains two JSON-looking fragments, so the extractor tracks brace depth and
//! string literals instead and stops at the end of the first complete object.

/// Return the first syntactically balanced `{...}` object in `text`.
///
/// Braces inside string literals do not count towards the depth, and a
/// backslash inside a string escapes exactly one following character. If the
/// first object never closes, `None` is returned: a truncated object must not
/// reach the parser.
pub fn extract_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let bytes = text.as_bytes();

    let mut depth: usize = 0;
    let mut in_string = false;
    let mut escape_pending = false;

    for (offset, &byte) in bytes[start..].iter().enumerate() {
        if in_string {
            if escape_pending {
                escape_pending = false;
            } else if byte == b'\\' {
                escape_pending = true;
            } else if byte == b'"' {
                in_string = false;
            }
            continue;
        }

        match byte {
            b'"' => in_string = true,
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    let end = start + offset + 1;
                    return Some(&text[start..end]);
                }
            }
            _ => {}
        }
    }

    None
}
