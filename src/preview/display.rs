use ratatui::style::{Modifier, Style};
use ratatui::text::{Line, Span};

use crate::config::themes::Palette;

const RULE_WIDTH: usize = 40;

/// Turns sanitised preview HTML into styled terminal lines. Only the tags the
/// markdown converter emits are understood; anything else contributes its
/// text content.
pub fn html_to_lines(html: &str, palette: &Palette) -> Vec<Line<'static>> {
    let mut writer = LineWriter::new(palette);
    let mut rest = html;
    while let Some(open) = rest.find('<') {
        writer.text(&rest[..open]);
        let after = &rest[open + 1..];
        let Some(close) = after.find('>') else {
            writer.text(&rest[open..]);
            rest = "";
            break;
        };
        writer.tag(&after[..close]);
        rest = &after[close + 1..];
    }
    writer.text(rest);
    writer.finish()
}

#[derive(Debug, Clone, Copy)]
enum ListKind {
    Bullet,
    Numbered(u64),
}

struct LineWriter<'p> {
    palette: &'p Palette,
    lines: Vec<Line<'static>>,
    spans: Vec<Span<'static>>,
    styles: Vec<(String, Style)>,
    lists: Vec<ListKind>,
    quote_depth: usize,
    pre: bool,
    has_text: bool,
    pending_space: bool,
    cell: usize,
}

impl<'p> LineWriter<'p> {
    fn new(palette: &'p Palette) -> Self {
        Self {
            palette,
            lines: Vec::new(),
            spans: Vec::new(),
            styles: Vec::new(),
            lists: Vec::new(),
            quote_depth: 0,
            pre: false,
            has_text: false,
            pending_space: false,
            cell: 0,
        }
    }

    fn style(&self) -> Style {
        self.styles
            .iter()
            .fold(Style::default().fg(self.palette.foreground), |acc, (_, s)| {
                acc.patch(*s)
            })
    }

    fn push_style(&mut self, tag: &str, style: Style) {
        self.styles.push((tag.to_string(), style));
    }

    fn pop_style(&mut self, tag: &str) {
        if let Some(pos) = self.styles.iter().rposition(|(name, _)| name == tag) {
            self.styles.truncate(pos);
        }
    }

    fn line_prefix(&mut self) {
        if self.spans.is_empty() && self.quote_depth > 0 {
            self.spans.push(Span::styled(
                "│ ".repeat(self.quote_depth),
                Style::default().fg(self.palette.quote),
            ));
        }
    }

    fn push_span(&mut self, content: String, style: Style) {
        self.line_prefix();
        self.spans.push(Span::styled(content, style));
        self.has_text = true;
    }

    fn text(&mut self, raw: &str) {
        if raw.is_empty() {
            return;
        }
        let decoded = decode_entities(raw);
        let style = self.style();
        if self.pre {
            let mut segments = decoded.split('\n');
            if let Some(first) = segments.next() {
                if !first.is_empty() {
                    self.push_span(first.to_string(), style);
                }
            }
            for segment in segments {
                self.flush(true);
                if !segment.is_empty() {
                    self.push_span(segment.to_string(), style);
                }
            }
            return;
        }

        let mut out = String::new();
        for ch in decoded.chars() {
            if ch.is_whitespace() {
                self.pending_space = true;
                continue;
            }
            if self.pending_space && (self.has_text || !out.is_empty()) {
                out.push(' ');
            }
            self.pending_space = false;
            out.push(ch);
        }
        if !out.is_empty() {
            self.push_span(out, style);
        }
    }

    fn flush(&mut self, force: bool) {
        if self.has_text || force || !self.spans.is_empty() {
            self.line_prefix();
            let spans = std::mem::take(&mut self.spans);
            self.lines.push(Line::from(spans));
        }
        self.has_text = false;
        self.pending_space = false;
    }

    /// Ends a block and separates it from the next with one blank line.
    fn end_block(&mut self) {
        if self.has_text {
            self.flush(false);
        } else {
            self.spans.clear();
        }
        if self.lines.last().is_some_and(|line| line.width() > 0) {
            self.lines.push(Line::default());
        }
    }

    fn tag(&mut self, raw: &str) {
        if raw.starts_with('!') || raw.starts_with('?') {
            return;
        }
        let closing = raw.starts_with('/');
        let body = raw.trim_start_matches('/').trim_end_matches('/');
        let (name, attrs) = match body.find(|c: char| c.is_whitespace()) {
            Some(pos) => (&body[..pos], &body[pos..]),
            None => (body, ""),
        };
        let name = name.to_ascii_lowercase();
        if closing {
            self.close(&name);
        } else {
            self.open(&name, attrs);
        }
    }

    fn open(&mut self, name: &str, attrs: &str) {
        let palette = self.palette;
        match name {
            "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => {
                self.end_line();
                let mut style = Style::default()
                    .fg(palette.heading)
                    .add_modifier(Modifier::BOLD);
                if name == "h1" {
                    style = style.add_modifier(Modifier::UNDERLINED);
                }
                self.push_style(name, style);
            }
            "p" | "div" | "table" => self.end_line(),
            "pre" => {
                self.end_line();
                self.pre = true;
                self.push_style(name, Style::default().fg(palette.code));
            }
            "blockquote" => {
                self.end_line();
                self.quote_depth += 1;
                self.push_style(
                    name,
                    Style::default()
                        .fg(palette.quote)
                        .add_modifier(Modifier::ITALIC),
                );
            }
            "ul" => {
                self.end_line();
                self.lists.push(ListKind::Bullet);
            }
            "ol" => {
                self.end_line();
                let start = attr(attrs, "start")
                    .and_then(|value| value.parse().ok())
                    .unwrap_or(1);
                self.lists.push(ListKind::Numbered(start));
            }
            "li" => {
                self.end_line();
                let indent = "  ".repeat(self.lists.len().saturating_sub(1));
                let marker = match self.lists.last_mut() {
                    Some(ListKind::Numbered(next)) => {
                        let marker = format!("{indent}{next}. ");
                        *next += 1;
                        marker
                    }
                    _ => format!("{indent}• "),
                };
                self.line_prefix();
                self.spans
                    .push(Span::styled(marker, Style::default().fg(palette.accent)));
            }
            "hr" => {
                self.end_block();
                self.lines.push(Line::from(Span::styled(
                    "─".repeat(RULE_WIDTH),
                    Style::default().fg(palette.muted),
                )));
                self.lines.push(Line::default());
            }
            "br" => self.flush(true),
            "tr" => {
                self.end_line();
                self.cell = 0;
            }
            "td" | "th" => {
                if self.cell > 0 {
                    self.push_span(" │ ".into(), Style::default().fg(palette.muted));
                }
                self.cell += 1;
                if name == "th" {
                    self.push_style(name, Style::default().add_modifier(Modifier::BOLD));
                }
            }
            "strong" | "b" => self.push_style(name, Style::default().add_modifier(Modifier::BOLD)),
            "em" | "i" => self.push_style(name, Style::default().add_modifier(Modifier::ITALIC)),
            "del" | "s" => {
                self.push_style(name, Style::default().add_modifier(Modifier::CROSSED_OUT))
            }
            "code" => self.push_style(name, Style::default().fg(palette.code)),
            "a" => self.push_style(
                name,
                Style::default()
                    .fg(palette.link)
                    .add_modifier(Modifier::UNDERLINED),
            ),
            "img" => {
                let alt = attr(attrs, "alt").unwrap_or_default();
                self.pending_space_flush();
                self.push_span(
                    format!("[image: {}]", decode_entities(&alt)),
                    Style::default().fg(palette.link),
                );
            }
            "input" => {
                let marker = if has_attr(attrs, "checked") {
                    "[x]"
                } else {
                    "[ ]"
                };
                self.push_span(marker.into(), Style::default().fg(palette.accent));
                self.pending_space = true;
            }
            _ => {}
        }
    }

    fn close(&mut self, name: &str) {
        match name {
            "h1" | "h2" | "h3" | "h4" | "h5" | "h6" | "p" | "div" | "table" => {
                self.pop_style(name);
                self.end_block();
            }
            "pre" => {
                self.pre = false;
                self.pop_style(name);
                self.end_block();
            }
            "blockquote" => {
                self.pop_style(name);
                self.end_line();
                self.quote_depth = self.quote_depth.saturating_sub(1);
                self.end_block();
            }
            "ul" | "ol" => {
                self.end_line();
                self.lists.pop();
                if self.lists.is_empty() {
                    self.end_block();
                }
            }
            "li" => {
                let force = !self.spans.is_empty();
                self.flush(force);
            }
            "tr" => self.end_line(),
            _ => self.pop_style(name),
        }
    }

    fn end_line(&mut self) {
        if self.has_text {
            self.flush(false);
        }
    }

    fn pending_space_flush(&mut self) {
        if self.pending_space && self.has_text {
            let style = self.style();
            self.push_span(" ".into(), style);
        }
        self.pending_space = false;
    }

    fn finish(mut self) -> Vec<Line<'static>> {
        self.end_line();
        while self.lines.last().is_some_and(|line| line.width() == 0) {
            self.lines.pop();
        }
        self.lines
    }
}

fn attr(attrs: &str, name: &str) -> Option<String> {
    let needle = format!("{name}=\"");
    let mut search = attrs;
    while let Some(pos) = search.find(&needle) {
        let boundary = search[..pos]
            .chars()
            .next_back()
            .map_or(true, char::is_whitespace);
        let value_start = pos + needle.len();
        if boundary {
            let value = &search[value_start..];
            return value.find('"').map(|end| value[..end].to_string());
        }
        search = &search[value_start..];
    }
    None
}

fn has_attr(attrs: &str, name: &str) -> bool {
    attrs.split_whitespace().any(|part| {
        part.trim_end_matches('/')
            .split('=')
            .next()
            .is_some_and(|key| key.eq_ignore_ascii_case(name))
    })
}

/// Decodes the entities an HTML serializer produces.
pub fn decode_entities(text: &str) -> String {
    if !text.contains('&') {
        return text.to_string();
    }
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        let tail = &rest[amp..];
        let decoded = tail.find(';').and_then(|semi| {
            let entity = &tail[1..semi];
            decode_entity(entity).map(|ch| (ch, semi + 1))
        });
        match decoded {
            Some((ch, consumed)) => {
                out.push(ch);
                rest = &tail[consumed..];
            }
            None => {
                out.push('&');
                rest = &tail[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

fn decode_entity(entity: &str) -> Option<char> {
    match entity {
        "amp" => Some('&'),
        "lt" => Some('<'),
        "gt" => Some('>'),
        "quot" => Some('"'),
        "apos" => Some('\''),
        "nbsp" => Some('\u{a0}'),
        _ => {
            let numeric = entity.strip_prefix('#')?;
            let code = match numeric.strip_prefix(['x', 'X']) {
                Some(hex) => u32::from_str_radix(hex, 16).ok()?,
                None => numeric.parse().ok()?,
            };
            char::from_u32(code)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::preview::{render_preview, CmarkConverter};

    fn plain(lines: &[Line<'_>]) -> Vec<String> {
        lines
            .iter()
            .map(|line| line.spans.iter().map(|s| s.content.as_ref()).collect())
            .collect()
    }

    fn render(markdown: &str) -> Vec<Line<'static>> {
        let html = render_preview(&CmarkConverter::default(), markdown);
        html_to_lines(&html, &Palette::for_dark_mode(false))
    }

    #[test]
    fn headings_and_paragraphs_are_separated() {
        let lines = render("# Title\n\nSome *body* text.\n");
        assert_eq!(plain(&lines), vec!["Title", "", "Some body text."]);
        assert!(lines[0].spans[0]
            .style
            .add_modifier
            .contains(Modifier::BOLD));
    }

    #[test]
    fn inline_styles_are_applied() {
        let lines = render("a **b** _c_ ~~d~~ `e`");
        let spans = &lines[0].spans;
        let find = |text: &str| {
            spans
                .iter()
                .find(|s| s.content.trim() == text)
                .map(|s| s.style)
                .expect("span present")
        };
        assert!(find("b").add_modifier.contains(Modifier::BOLD));
        assert!(find("c").add_modifier.contains(Modifier::ITALIC));
        assert!(find("d").add_modifier.contains(Modifier::CROSSED_OUT));
        let palette = Palette::for_dark_mode(false);
        assert_eq!(find("e").fg, Some(palette.code));
        assert_eq!(plain(&lines), vec!["a b c d e"]);
    }

    #[test]
    fn code_blocks_keep_line_breaks() {
        let lines = render("```\nfn main() {\n    run();\n}\n```\n");
        assert_eq!(plain(&lines), vec!["fn main() {", "    run();", "}"]);
    }

    #[test]
    fn lists_get_markers() {
        let lines = render("- one\n- two\n\n1. first\n2. second\n");
        assert_eq!(
            plain(&lines),
            vec!["• one", "• two", "", "1. first", "2. second"]
        );
    }

    #[test]
    fn quotes_rules_and_images() {
        let lines = render("> quoted\n\n---\n\n![cat](cat.png)\n");
        let text = plain(&lines);
        assert_eq!(text[0], "│ quoted");
        assert!(text.iter().any(|l| l.starts_with("───")));
        assert!(text.iter().any(|l| l == "[image: cat]"));
    }

    #[test]
    fn table_cells_are_joined() {
        let lines = render("| a | b |\n| - | - |\n| 1 | 2 |\n");
        assert_eq!(plain(&lines), vec!["a │ b", "1 │ 2"]);
    }

    #[test]
    fn task_lists_show_checkboxes() {
        let lines = render("- [x] done\n- [ ] todo\n");
        assert_eq!(plain(&lines), vec!["• [x] done", "• [ ] todo"]);
    }

    #[test]
    fn entities_are_decoded() {
        assert_eq!(decode_entities("a &amp; b &lt;c&gt; &#39;d&#x27;"), "a & b <c> 'd'");
        assert_eq!(decode_entities("fish & chips"), "fish & chips");
        assert_eq!(decode_entities("&bogus;"), "&bogus;");
        let lines = render("1 < 2 & 3");
        assert_eq!(plain(&lines), vec!["1 < 2 & 3"]);
    }

    #[test]
    fn escaped_fallback_renders_as_text() {
        let lines = html_to_lines(
            "<pre>&lt;b&gt;x&lt;/b&gt;</pre>",
            &Palette::for_dark_mode(true),
        );
        assert_eq!(plain(&lines), vec!["<b>x</b>"]);
    }
}
