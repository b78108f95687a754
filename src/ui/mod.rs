use std::ops::Range;

use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Modifier, Style};
use ratatui::text::{Line, Span, Text};
use ratatui::widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph, Wrap};
use ratatui::Frame;
use strum::IntoEnumIterator;
use time::{macros::format_description, OffsetDateTime};
use unicode_segmentation::UnicodeSegmentation;
use unicode_width::UnicodeWidthStr;

use crate::app::state::{AppState, FocusPane, OverlayState};
use crate::app::EditorState;
use crate::config::themes::Palette;
use crate::formatting::{FormatAction, Selection};
use crate::layout::{PaneTab, ViewportMode};
use crate::preview::display::html_to_lines;

pub fn draw_app(frame: &mut Frame, state: &AppState, list_state: &mut ListState) {
    let palette = Palette::for_dark_mode(state.dark_mode());
    frame.render_widget(
        Block::default().style(
            Style::default()
                .bg(palette.background)
                .fg(palette.foreground),
        ),
        frame.size(),
    );

    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(3), Constraint::Length(2)])
        .split(frame.size());

    let panes = state.visible_panes();
    let note_visible = panes.editor || panes.preview;
    match (panes.list, note_visible) {
        (true, true) => {
            let columns = Layout::default()
                .direction(Direction::Horizontal)
                .constraints([Constraint::Percentage(30), Constraint::Percentage(70)])
                .split(vertical[0]);
            draw_note_list(frame, state, list_state, columns[0], &palette);
            draw_note_pane(frame, state, columns[1], &palette);
        }
        (true, false) => draw_note_list(frame, state, list_state, vertical[0], &palette),
        (false, _) => draw_note_pane(frame, state, vertical[0], &palette),
    }

    let status = Paragraph::new(build_status_line(state, &palette))
        .style(Style::default().fg(palette.muted));
    frame.render_widget(status, vertical[1]);

    render_overlay(frame, state, &palette);
}

fn border_style(focused: bool, palette: &Palette) -> Style {
    if focused {
        Style::default().fg(palette.accent)
    } else {
        Style::default().fg(palette.muted)
    }
}

fn draw_note_list(
    frame: &mut Frame,
    state: &AppState,
    list_state: &mut ListState,
    area: Rect,
    palette: &Palette,
) {
    let selected = state.selected_index();
    let mut items: Vec<ListItem> = state
        .titles()
        .into_iter()
        .enumerate()
        .map(|(index, title)| {
            let marker = if Some(index) == selected { "✎ " } else { "  " };
            ListItem::new(Line::from(vec![
                Span::styled(marker, Style::default().fg(palette.accent)),
                Span::styled(title, Style::default().add_modifier(Modifier::BOLD)),
            ]))
        })
        .collect();
    if items.is_empty() {
        items.push(ListItem::new("No notes yet. Press `a` to create one."));
    }

    let list = List::new(items)
        .block(
            Block::default()
                .title(format!("Notes ({})", state.notes().len()))
                .borders(Borders::ALL)
                .border_style(border_style(state.focus == FocusPane::List, palette)),
        )
        .highlight_style(
            Style::default()
                .bg(palette.selection_bg)
                .fg(palette.selection_fg)
                .add_modifier(Modifier::BOLD),
        )
        .highlight_symbol("▸ ");
    frame.render_stateful_widget(list, area, list_state);
}

fn draw_note_pane(frame: &mut Frame, state: &AppState, area: Rect, palette: &Palette) {
    let tab = state.layout().tab();
    let mut constraints = vec![Constraint::Length(1)];
    if tab == PaneTab::Editor {
        constraints.push(Constraint::Length(1));
    }
    constraints.push(Constraint::Min(1));
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints(constraints)
        .split(area);

    frame.render_widget(Paragraph::new(tab_bar(tab, palette)), rows[0]);
    let body_area = rows[rows.len() - 1];
    let title = state
        .selected_index()
        .and_then(|index| state.notes().get(index))
        .map(crate::title::derive_title)
        .unwrap_or_else(|| "Scratch".to_string());

    match tab {
        PaneTab::Editor => {
            frame.render_widget(Paragraph::new(toolbar_line(palette)), rows[1]);
            draw_editor(frame, state, body_area, &title, palette);
        }
        PaneTab::Preview => draw_preview(frame, state, body_area, &title, palette),
    }
}

fn tab_bar(active: PaneTab, palette: &Palette) -> Line<'static> {
    let tab = |label: &'static str, tab: PaneTab| {
        if tab == active {
            Span::styled(
                format!(" {label} "),
                Style::default()
                    .bg(palette.selection_bg)
                    .fg(palette.selection_fg)
                    .add_modifier(Modifier::BOLD),
            )
        } else {
            Span::styled(format!(" {label} "), Style::default().fg(palette.muted))
        }
    };
    Line::from(vec![
        tab("Editor", PaneTab::Editor),
        Span::raw("│"),
        tab("Preview", PaneTab::Preview),
        Span::styled("  Ctrl-p switch", Style::default().fg(palette.muted)),
    ])
}

fn toolbar_line(palette: &Palette) -> Line<'static> {
    let mut spans = Vec::new();
    for action in FormatAction::iter() {
        if !spans.is_empty() {
            spans.push(Span::raw(" "));
        }
        spans.push(Span::styled(
            format!("M-{}", action.shortcut()),
            Style::default().fg(palette.accent),
        ));
        spans.push(Span::styled(
            format!(":{}", action.label()),
            Style::default().fg(palette.muted),
        ));
    }
    Line::from(spans)
}

fn draw_editor(frame: &mut Frame, state: &AppState, area: Rect, title: &str, palette: &Palette) {
    let editor = state.editor();
    let focused = state.focus == FocusPane::Editor;
    let block = Block::default()
        .title(title.to_string())
        .borders(Borders::ALL)
        .border_style(border_style(focused, palette));
    let inner = block.inner(area);
    frame.render_widget(Clear, area);
    if inner.width == 0 || inner.height == 0 {
        frame.render_widget(block, area);
        return;
    }

    let view = EditorView::layout(editor, inner.width);
    let height = inner.height as usize;
    let scroll = view.cursor_row.saturating_sub(height - 1);
    let visible = &view.rows[scroll.min(view.rows.len())..];
    let visible = &visible[..visible.len().min(height)];
    let lines = editor_lines(editor.buffer(), visible, editor.selection(), palette);
    frame.render_widget(Paragraph::new(Text::from(lines)).block(block), area);

    if focused {
        let row = (view.cursor_row - scroll) as u16;
        frame.set_cursor(inner.x + view.cursor_col, inner.y + row);
    }
}

/// Buffer split into screen rows, wrapped at word boundaries.
struct EditorView {
    rows: Vec<Range<usize>>,
    cursor_col: u16,
    cursor_row: usize,
}

impl EditorView {
    fn layout(editor: &EditorState, width: u16) -> Self {
        let buffer = editor.buffer();
        let rows = wrap_rows(buffer, width.max(1) as usize);
        let cursor = editor.cursor().min(buffer.len());
        // row starts are strictly increasing, so the caret belongs to the last row
        // starting at or before it
        let cursor_row = rows
            .partition_point(|row| row.start <= cursor)
            .saturating_sub(1);
        let col = rows
            .get(cursor_row)
            .map_or(0, |row| buffer[row.start..cursor.max(row.start)].width());
        let cursor_col = col.min(width.saturating_sub(1) as usize) as u16;
        Self {
            rows,
            cursor_col,
            cursor_row,
        }
    }
}

/// Byte ranges of each screen row, newlines excluded.
fn wrap_rows(buffer: &str, width: usize) -> Vec<Range<usize>> {
    let mut rows = Vec::new();
    let mut line_start = 0;
    for raw in buffer.split('\n') {
        let line_end = line_start + raw.len();
        wrap_line(buffer, line_start..line_end, width, &mut rows);
        line_start = line_end + 1;
    }
    rows
}

fn wrap_line(buffer: &str, line: Range<usize>, width: usize, rows: &mut Vec<Range<usize>>) {
    let mut row_start = line.start;
    let mut row_width = 0;
    let mut last_break = None;
    for (offset, grapheme) in buffer[line.clone()].grapheme_indices(true) {
        let at = line.start + offset;
        let glyph_width = grapheme.width();
        if glyph_width > 0 && row_width + glyph_width > width && at > row_start {
            let cut = match last_break {
                Some(brk) if brk > row_start => brk,
                _ => at,
            };
            rows.push(row_start..cut);
            row_start = cut;
            row_width = buffer[cut..at].width();
            last_break = None;
        }
        row_width += glyph_width;
        if grapheme.chars().all(char::is_whitespace) {
            last_break = Some(at + grapheme.len());
        }
    }
    rows.push(row_start..line.end);
}

/// Screen rows with the active selection highlighted.
fn editor_lines(
    buffer: &str,
    rows: &[Range<usize>],
    selection: Selection,
    palette: &Palette,
) -> Vec<Line<'static>> {
    let selected = Style::default()
        .bg(palette.selection_bg)
        .fg(palette.selection_fg);
    let mut lines = Vec::with_capacity(rows.len());
    for row in rows {
        let (start, end) = (row.start, row.end);
        let sel_start = selection.start.clamp(start, end);
        let sel_end = selection.end.clamp(start, end);
        if selection.is_empty() || sel_start == sel_end {
            lines.push(Line::from(buffer[start..end].to_string()));
            continue;
        }
        let mut spans = Vec::with_capacity(3);
        if sel_start > start {
            spans.push(Span::raw(buffer[start..sel_start].to_string()));
        }
        spans.push(Span::styled(buffer[sel_start..sel_end].to_string(), selected));
        if sel_end < end {
            spans.push(Span::raw(buffer[sel_end..end].to_string()));
        }
        lines.push(Line::from(spans));
    }
    lines
}

fn draw_preview(frame: &mut Frame, state: &AppState, area: Rect, title: &str, palette: &Palette) {
    let preview = state.preview();
    let text = if preview.html().is_empty() && !preview.is_current(state.buffer()) {
        Text::from(Span::styled(
            "Rendering…",
            Style::default()
                .fg(palette.muted)
                .add_modifier(Modifier::ITALIC),
        ))
    } else {
        Text::from(html_to_lines(preview.html(), palette))
    };
    let paragraph = Paragraph::new(text)
        .block(
            Block::default()
                .title(format!("{title} (preview)"))
                .borders(Borders::ALL)
                .border_style(border_style(state.focus == FocusPane::Editor, palette)),
        )
        .wrap(Wrap { trim: false });
    frame.render_widget(Clear, area);
    frame.render_widget(paragraph, area);
}

fn build_status_line(state: &AppState, palette: &Palette) -> Text<'static> {
    let mode = match state.layout().mode() {
        ViewportMode::Desktop => "Desktop",
        ViewportMode::Mobile => "Mobile",
    };
    let focus = match state.focus {
        FocusPane::List => "List",
        FocusPane::Editor => "Editor",
    };
    let saved = state
        .last_saved_at
        .map(format_time_short)
        .unwrap_or_else(|| "never".to_string());
    let theme = if state.dark_mode() { "Dark" } else { "Light" };

    let bold = Style::default().add_modifier(Modifier::BOLD);
    let mut spans = vec![
        Span::raw(format!("Notes: {} ", state.notes().len())),
        Span::raw("| View: "),
        Span::styled(mode, bold),
        Span::raw(" | Focus: "),
        Span::styled(focus, bold),
        Span::raw(" | Theme: "),
        Span::styled(theme, bold),
        Span::raw(" | Saved "),
        Span::styled(saved, bold),
    ];
    if let Some(message) = &state.status_message {
        spans.push(Span::raw(" | "));
        spans.push(Span::styled(
            message.clone(),
            Style::default().fg(palette.accent),
        ));
    }

    let hints = match state.focus {
        FocusPane::List => "j/k move • Enter open • a add • d delete • p preview • m theme • q quit",
        FocusPane::Editor => {
            "Esc back • Shift+arrows select • Ctrl-a all • Ctrl-z/y undo/redo • Ctrl-p preview"
        }
    };
    Text::from(vec![
        Line::from(spans),
        Line::from(Span::styled(hints, Style::default().fg(palette.muted))),
    ])
}

fn format_time_short(dt: OffsetDateTime) -> String {
    dt.format(&format_description!("[hour]:[minute]:[second]"))
        .unwrap_or_else(|_| dt.unix_timestamp().to_string())
}

fn render_overlay(frame: &mut Frame, state: &AppState, palette: &Palette) {
    match state.overlay.as_ref() {
        Some(OverlayState::DeleteNote(draft)) => {
            let area = centered_rect(60, 30, frame.size());
            frame.render_widget(Clear, area);
            let paragraph = Paragraph::new(vec![
                Line::from(Span::styled(
                    "Delete note?",
                    Style::default().add_modifier(Modifier::BOLD),
                )),
                Line::from(""),
                Line::from(format!("\"{}\"", draft.title)),
                Line::from(""),
                Line::from(Span::styled(
                    "Enter/y to delete • Esc/n to cancel",
                    Style::default().fg(palette.muted),
                )),
            ])
            .block(
                Block::default()
                    .title("Delete Note")
                    .borders(Borders::ALL)
                    .border_style(Style::default().fg(palette.error)),
            )
            .wrap(Wrap { trim: false });
            frame.render_widget(paragraph, area);
        }
        None => {}
    }
}

fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(area);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(vertical[1])[1]
}
