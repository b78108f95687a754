use once_cell::sync::Lazy;
use regex::Regex;

pub const UNTITLED: &str = "Untitled";

static HEADING_MARKER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^#+\s*").expect("valid heading regex"));
static INLINE_MARKERS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\*\*|__|~~|[*_`]").expect("valid emphasis regex"));

/// Sidebar label for a note: its first non-blank line with heading and
/// emphasis markers removed.
pub fn derive_title(body: &str) -> String {
    let Some(line) = body.lines().find(|line| !line.trim().is_empty()) else {
        return UNTITLED.to_string();
    };
    let line = line.trim_start();
    let without_heading = HEADING_MARKER.replace(line, "");
    let plain = INLINE_MARKERS.replace_all(&without_heading, "");
    let title = plain.trim();
    if title.is_empty() {
        UNTITLED.to_string()
    } else {
        title.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_bodies_are_untitled() {
        for body in ["", "   ", "\n\n", " \t\n  \n"] {
            assert_eq!(derive_title(body), UNTITLED, "body {body:?}");
        }
    }

    #[test]
    fn heading_markers_are_stripped() {
        assert_eq!(derive_title("# Hello\nworld"), "Hello");
        assert_eq!(derive_title("###   Deep heading"), "Deep heading");
        assert_eq!(derive_title("\n\n  ## Indented"), "Indented");
    }

    #[test]
    fn emphasis_and_code_markers_are_stripped() {
        assert_eq!(derive_title("**bold** and _it_"), "bold and it");
        assert_eq!(derive_title("~~gone~~ `code` __under__ *star*"), "gone code under star");
    }

    #[test]
    fn marker_only_lines_are_untitled() {
        assert_eq!(derive_title("#"), UNTITLED);
        assert_eq!(derive_title("## **__**"), UNTITLED);
    }

    #[test]
    fn first_non_blank_line_wins() {
        assert_eq!(derive_title("\n   \nplain note\n# later"), "plain note");
    }

    #[test]
    fn plain_text_is_a_fixed_point() {
        for text in ["plain note", "Meeting notes 2024", "a - b + c"] {
            let once = derive_title(text);
            assert_eq!(once, text);
            assert_eq!(derive_title(&once), once);
        }
    }
}
