use std::borrow::Cow;

use strum::{EnumIter, IntoEnumIterator, IntoStaticStr};

const TABLE_TEMPLATE: &str = "\n| Header 1 | Header 2 | Header 3 |\n\
| -------- | -------- | -------- |\n\
| Cell 1   | Cell 2   | Cell 3   |\n\
| Cell 4   | Cell 5   | Cell 6   |\n";

/// A byte range inside the edit buffer. `start == end` is a caret.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Selection {
    pub start: usize,
    pub end: usize,
}

impl Selection {
    pub fn new(a: usize, b: usize) -> Self {
        Self {
            start: a.min(b),
            end: a.max(b),
        }
    }

    pub fn caret(position: usize) -> Self {
        Self {
            start: position,
            end: position,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormatSpec {
    pub prefix: Cow<'static, str>,
    pub suffix: &'static str,
    pub placeholder: &'static str,
}

impl FormatSpec {
    pub fn new(prefix: impl Into<Cow<'static, str>>) -> Self {
        Self {
            prefix: prefix.into(),
            suffix: "",
            placeholder: "",
        }
    }

    pub fn with_suffix(mut self, suffix: &'static str) -> Self {
        self.suffix = suffix;
        self
    }

    pub fn with_placeholder(mut self, placeholder: &'static str) -> Self {
        self.placeholder = placeholder;
        self
    }

    pub fn heading(level: usize) -> Self {
        let level = level.clamp(1, 6);
        Self::new(format!("{} ", "#".repeat(level))).with_placeholder("Heading")
    }
}

/// Result of a formatting insertion: the new text and the selection to apply
/// once the new text has been painted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Insertion {
    pub text: String,
    pub selection: Selection,
}

/// Wraps the selection in `prefix`/`suffix`, or inserts the placeholder at the
/// caret when nothing is selected.
pub fn insert_markdown(text: &str, selection: Selection, spec: &FormatSpec) -> Insertion {
    let start = clamp_to_boundary(text, selection.start.min(selection.end));
    let end = clamp_to_boundary(text, selection.start.max(selection.end));
    let prefix = spec.prefix.as_ref();

    let inner = if start == end {
        spec.placeholder
    } else {
        &text[start..end]
    };

    let mut out =
        String::with_capacity(text.len() + prefix.len() + inner.len() + spec.suffix.len());
    out.push_str(&text[..start]);
    out.push_str(prefix);
    out.push_str(inner);
    out.push_str(spec.suffix);
    out.push_str(&text[end..]);

    let selection_start = start + prefix.len();
    Insertion {
        text: out,
        selection: Selection::new(selection_start, selection_start + inner.len()),
    }
}

fn clamp_to_boundary(text: &str, index: usize) -> usize {
    let mut index = index.min(text.len());
    while !text.is_char_boundary(index) {
        index -= 1;
    }
    index
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, IntoStaticStr)]
pub enum FormatAction {
    #[strum(serialize = "Bold")]
    Bold,
    #[strum(serialize = "Italic")]
    Italic,
    #[strum(serialize = "H1")]
    Heading1,
    #[strum(serialize = "H2")]
    Heading2,
    #[strum(serialize = "H3")]
    Heading3,
    #[strum(serialize = "Code")]
    CodeBlock,
    #[strum(serialize = "Link")]
    Link,
    #[strum(serialize = "Image")]
    Image,
    #[strum(serialize = "List")]
    UnorderedList,
    #[strum(serialize = "Numbered")]
    OrderedList,
    #[strum(serialize = "Quote")]
    Quote,
    #[strum(serialize = "Rule")]
    HorizontalRule,
    #[strum(serialize = "Table")]
    Table,
}

impl FormatAction {
    pub fn spec(self) -> FormatSpec {
        match self {
            FormatAction::Bold => FormatSpec::new("**")
                .with_suffix("**")
                .with_placeholder("bold text"),
            FormatAction::Italic => FormatSpec::new("_")
                .with_suffix("_")
                .with_placeholder("italic text"),
            FormatAction::Heading1 => FormatSpec::heading(1),
            FormatAction::Heading2 => FormatSpec::heading(2),
            FormatAction::Heading3 => FormatSpec::heading(3),
            FormatAction::CodeBlock => FormatSpec::new("```\n")
                .with_suffix("\n```")
                .with_placeholder("code here"),
            FormatAction::Link => FormatSpec::new("[")
                .with_suffix("](url)")
                .with_placeholder("link text"),
            FormatAction::Image => FormatSpec::new("![")
                .with_suffix("](image-url)")
                .with_placeholder("alt text"),
            FormatAction::UnorderedList => FormatSpec::new("- ")
                .with_suffix("\n- ")
                .with_placeholder("List item"),
            FormatAction::OrderedList => FormatSpec::new("1. ")
                .with_suffix("\n2. ")
                .with_placeholder("List item"),
            FormatAction::Quote => FormatSpec::new("> ").with_placeholder("Quote"),
            FormatAction::HorizontalRule => FormatSpec::new("\n---\n"),
            FormatAction::Table => FormatSpec::new(TABLE_TEMPLATE),
        }
    }

    /// Key pressed together with Alt to trigger the action.
    pub fn shortcut(self) -> char {
        match self {
            FormatAction::Bold => 'b',
            FormatAction::Italic => 'i',
            FormatAction::Heading1 => '1',
            FormatAction::Heading2 => '2',
            FormatAction::Heading3 => '3',
            FormatAction::CodeBlock => 'c',
            FormatAction::Link => 'k',
            FormatAction::Image => 'm',
            FormatAction::UnorderedList => 'u',
            FormatAction::OrderedList => 'o',
            FormatAction::Quote => 'q',
            FormatAction::HorizontalRule => 'h',
            FormatAction::Table => 't',
        }
    }

    pub fn from_shortcut(ch: char) -> Option<Self> {
        let ch = ch.to_ascii_lowercase();
        FormatAction::iter().find(|action| action.shortcut() == ch)
    }

    pub fn label(self) -> &'static str {
        self.into()
    }

    pub fn apply(self, text: &str, selection: Selection) -> Insertion {
        insert_markdown(text, selection, &self.spec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn caret_insert_selects_placeholder() {
        let out = FormatAction::Bold.apply("before  after", Selection::caret(7));
        insta::assert_snapshot!(&out.text, @"before **bold text** after");
        assert_eq!(&out.text[out.selection.start..out.selection.end], "bold text");
        assert_eq!(out.selection, Selection::new(9, 18));
    }

    #[test]
    fn caret_insert_wraps_placeholder_for_every_action() {
        let buffer = "alpha\nbeta";
        for action in FormatAction::iter() {
            for caret in [0, 3, buffer.len()] {
                let spec = action.spec();
                let out = action.apply(buffer, Selection::caret(caret));
                let wrapped = format!("{}{}{}", spec.prefix, spec.placeholder, spec.suffix);
                assert_eq!(
                    &out.text[caret..caret + wrapped.len()],
                    wrapped,
                    "{action:?} at {caret}"
                );
                assert_eq!(out.selection.start, caret + spec.prefix.len());
                assert_eq!(
                    &out.text[out.selection.start..out.selection.end],
                    spec.placeholder
                );
            }
        }
    }

    #[test]
    fn selection_is_wrapped_and_shifted_by_prefix() {
        let text = "make this loud";
        let out = FormatAction::Bold.apply(text, Selection::new(5, 9));
        insta::assert_snapshot!(&out.text, @"make **this** loud");
        assert_eq!(out.selection, Selection::new(7, 11));
        assert_eq!(&out.text[out.selection.start..out.selection.end], "this");
    }

    #[test]
    fn reversed_selection_is_normalised() {
        let out = FormatAction::Link.apply("see docs", Selection { start: 8, end: 4 });
        assert_eq!(out.text, "see [docs](url)");
        assert_eq!(out.selection.len(), 4);
    }

    #[test]
    fn selection_preserves_length_for_every_action() {
        let text = "one two three";
        let original = Selection::new(4, 7);
        for action in FormatAction::iter() {
            let out = action.apply(text, original);
            assert_eq!(out.selection.len(), original.len(), "{action:?}");
            assert_eq!(&out.text[out.selection.start..out.selection.end], "two");
        }
    }

    #[test]
    fn heading_levels_repeat_hashes() {
        let out = insert_markdown("", Selection::caret(0), &FormatSpec::heading(4));
        insta::assert_snapshot!(&out.text, @"#### Heading");
        assert_eq!(FormatSpec::heading(9).prefix, "###### ");
        assert_eq!(FormatSpec::heading(0).prefix, "# ");
    }

    #[test]
    fn rule_and_table_leave_a_caret_after_the_insert() {
        let out = FormatAction::HorizontalRule.apply("ab", Selection::caret(1));
        assert_eq!(out.text, "a\n---\nb");
        assert_eq!(out.selection, Selection::caret(6));

        let out = FormatAction::Table.apply("", Selection::caret(0));
        assert_eq!(out.text.lines().filter(|l| l.starts_with('|')).count(), 4);
        assert!(out.selection.is_empty());
        assert_eq!(out.selection.start, out.text.len());
    }

    #[test]
    fn out_of_range_and_mid_char_offsets_are_clamped() {
        let out = FormatAction::Italic.apply("héllo", Selection::new(2, 99));
        // offset 2 sits inside 'é' and snaps back to 1
        assert_eq!(out.text, "h_éllo_");
        assert_eq!(&out.text[out.selection.start..out.selection.end], "éllo");
    }

    #[test]
    fn shortcuts_are_unique_and_resolve() {
        let mut seen = std::collections::HashSet::new();
        for action in FormatAction::iter() {
            assert!(seen.insert(action.shortcut()), "duplicate for {action:?}");
            assert_eq!(FormatAction::from_shortcut(action.shortcut()), Some(action));
        }
        assert_eq!(FormatAction::from_shortcut('B'), Some(FormatAction::Bold));
        assert_eq!(FormatAction::from_shortcut('z'), None);
        assert_eq!(FormatAction::CodeBlock.label(), "Code");
    }
}
