//! Removal of reasoning spans that some models emit before their answer

/// Marker opening a reasoning span
pub const THINK_OPEN: &str = "<think>";
/// Marker closing a reasoning span
pub const THINK_CLOSE: &str = "</think>";

/// Strip every `<think>...</think>` span from `text`.
///
/// A span whose closing marker never arrives (output truncated mid-thought)
/// is removed through the end of the text. Removal repeats until no marker is
/// left, so spans spliced together by an earlier removal are caught as well and
/// the function is idempotent.
pub fn strip_thinking(text: &str) -> String {
    let mut current = strip_once(text);
    while current.contains(THINK_OPEN) {
        current = strip_once(&current);
    }
    current
}

fn strip_once(text: &str) -> String {
    let mut output = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(open) = rest.find(THINK_OPEN) {
        output.push_str(&rest[..open]);
        let after_open = &rest[open + THINK_OPEN.len()..];
        match after_open.find(THINK_CLOSE) {
            Some(close) => rest = &after_open[close + THINK_CLOSE.len()..],
            None => {
                rest = "";
                break;
            }
        }
    }
    output.push_str(rest);

    output.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_closed_span_removed() {
        assert_eq!(
            strip_thinking("<think>reasoning...</think>Final answer"),
            "Final answer"
        );
    }

    #[test]
    fn test_unterminated_span_removed_to_end() {
        assert_eq!(strip_thinking("<think>partial, truncated"), "");
        assert_eq!(strip_thinking("Answer first <think>then more"), "Answer first");
    }

    #[test]
    fn test_multiple_spans() {
        assert_eq!(
            strip_thinking("<think>a</think>{\"x\":1}<think>b</think> done"),
            "{\"x\":1} done"
        );
    }

    #[test]
    fn test_text_without_markers_is_trimmed_only() {
        assert_eq!(strip_thinking("  plain text \n"), "plain text");
    }

    #[test]
    fn test_spliced_marker_removed() {
        assert_eq!(strip_thinking("<thi<think>x</think>nk>rest"), "");
        assert_eq!(strip_thinking("<thi<think>x</think>nk>y</think>rest"), "rest");
    }

    #[test]
    fn test_idempotent() {
        let inputs = [
            "<think>x</think> y",
            "<think>unterminated",
            "a <think>b</think> c <think>d",
            "nothing to strip",
        ];
        for input in inputs {
            let once = strip_thinking(input);
            assert_eq!(strip_thinking(&once), once);
        }
    }
}
