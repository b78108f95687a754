use unicode_segmentation::UnicodeSegmentation;

use crate::formatting::{Insertion, Selection};

const MAX_HISTORY: usize = 200;

#[derive(Debug, Clone)]
pub struct EditorState {
    buffer: String,
    cursor: usize,
    anchor: Option<usize>,
    pending_selection: Option<Selection>,
    preferred_column: Option<usize>,
    history: Vec<String>,
    history_index: usize,
}

impl Default for EditorState {
    fn default() -> Self {
        Self::new(String::new())
    }
}

impl EditorState {
    pub fn new(buffer: String) -> Self {
        let cursor = buffer.len();
        let mut history = Vec::with_capacity(128);
        history.push(buffer.clone());
        Self {
            buffer,
            cursor,
            anchor: None,
            pending_selection: None,
            preferred_column: None,
            history,
            history_index: 0,
        }
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn buffer(&self) -> &str {
        &self.buffer
    }

    /// Current selection, normalised; a caret when nothing is selected.
    pub fn selection(&self) -> Selection {
        match self.anchor {
            Some(anchor) => Selection::new(anchor, self.cursor),
            None => Selection::caret(self.cursor),
        }
    }

    pub fn has_selection(&self) -> bool {
        !self.selection().is_empty()
    }

    pub fn pending_selection(&self) -> Option<Selection> {
        self.pending_selection
    }

    /// Replaces the buffer with a different note's body and forgets history.
    pub fn load(&mut self, body: String) {
        *self = Self::new(body);
    }

    pub fn clear(&mut self) {
        self.load(String::new());
    }

    /// Replaces the buffer the way a text widget does on a value change: the
    /// caret jumps to the end and any selection is dropped.
    pub fn set_text(&mut self, text: String) -> bool {
        self.pending_selection = None;
        if text == self.buffer {
            return false;
        }
        self.buffer = text;
        self.cursor = self.buffer.len();
        self.anchor = None;
        self.preferred_column = None;
        self.record_history();
        true
    }

    /// First phase of a formatting edit. The computed selection is held back
    /// until [`EditorState::commit_pending_selection`] runs after the next paint.
    pub fn apply_insertion(&mut self, insertion: Insertion) -> bool {
        let changed = self.set_text(insertion.text);
        self.pending_selection = Some(insertion.selection);
        changed
    }

    /// Second phase of a formatting edit.
    pub fn commit_pending_selection(&mut self) -> bool {
        let Some(selection) = self.pending_selection.take() else {
            return false;
        };
        self.set_selection(selection);
        true
    }

    pub fn set_selection(&mut self, selection: Selection) {
        let start = clamp_to_boundary(&self.buffer, selection.start);
        let end = clamp_to_boundary(&self.buffer, selection.end);
        self.anchor = if start == end { None } else { Some(start) };
        self.cursor = end;
        self.preferred_column = None;
    }

    pub fn select_all(&mut self) -> bool {
        if self.buffer.is_empty() {
            return false;
        }
        self.set_selection(Selection::new(0, self.buffer.len()));
        true
    }

    pub fn insert_char(&mut self, ch: char) -> bool {
        let mut scratch = [0u8; 4];
        let encoded = ch.encode_utf8(&mut scratch);
        self.insert_str(encoded)
    }

    pub fn insert_str(&mut self, text: &str) -> bool {
        self.delete_selection_inner();
        self.buffer.insert_str(self.cursor, text);
        self.cursor += text.len();
        self.preferred_column = None;
        self.after_edit();
        true
    }

    pub fn insert_newline(&mut self) -> bool {
        self.insert_str("\n");
        self.preferred_column = Some(0);
        true
    }

    pub fn backspace(&mut self) -> bool {
        if self.delete_selection_inner() {
            self.after_edit();
            return true;
        }
        if self.cursor == 0 {
            return false;
        }
        let prev = prev_grapheme_boundary(&self.buffer, self.cursor);
        self.buffer.drain(prev..self.cursor);
        self.cursor = prev;
        self.preferred_column = None;
        self.after_edit();
        true
    }

    pub fn delete(&mut self) -> bool {
        if self.delete_selection_inner() {
            self.after_edit();
            return true;
        }
        if self.cursor >= self.buffer.len() {
            return false;
        }
        let next = next_grapheme_boundary(&self.buffer, self.cursor);
        if next == self.cursor {
            return false;
        }
        self.buffer.drain(self.cursor..next);
        self.preferred_column = None;
        self.after_edit();
        true
    }

    pub fn move_left(&mut self, extend: bool) -> bool {
        if let Some(target) = self.collapse_target(extend, true) {
            return self.move_to(target, extend);
        }
        if self.cursor == 0 {
            return false;
        }
        let prev = prev_grapheme_boundary(&self.buffer, self.cursor);
        self.move_to(prev, extend)
    }

    pub fn move_right(&mut self, extend: bool) -> bool {
        if let Some(target) = self.collapse_target(extend, false) {
            return self.move_to(target, extend);
        }
        if self.cursor >= self.buffer.len() {
            return false;
        }
        let next = next_grapheme_boundary(&self.buffer, self.cursor);
        if next == self.cursor {
            return false;
        }
        self.move_to(next, extend)
    }

    pub fn move_home(&mut self, extend: bool) -> bool {
        let line_start = line_start(&self.buffer, self.cursor);
        if self.cursor == line_start && !self.drops_selection(extend) {
            return false;
        }
        self.move_to(line_start, extend);
        self.preferred_column = Some(0);
        true
    }

    pub fn move_end(&mut self, extend: bool) -> bool {
        let line_end = line_end(&self.buffer, self.cursor);
        if self.cursor == line_end && !self.drops_selection(extend) {
            return false;
        }
        self.move_to(line_end, extend);
        self.preferred_column = Some(column_at(
            &self.buffer,
            line_start(&self.buffer, self.cursor),
            self.cursor,
        ));
        true
    }

    pub fn move_up(&mut self, extend: bool) -> bool {
        let current_line_start = line_start(&self.buffer, self.cursor);
        let current_column = self
            .preferred_column
            .unwrap_or_else(|| column_at(&self.buffer, current_line_start, self.cursor));
        let target = if current_line_start == 0 {
            0
        } else {
            let prev_line_start = line_start(&self.buffer, current_line_start - 1);
            position_for_column(&self.buffer, prev_line_start, current_column)
        };
        if self.cursor == target && !self.drops_selection(extend) {
            return false;
        }
        self.move_to(target, extend);
        self.preferred_column = Some(current_column);
        true
    }

    pub fn move_down(&mut self, extend: bool) -> bool {
        let current_line_start = line_start(&self.buffer, self.cursor);
        let current_column = self
            .preferred_column
            .unwrap_or_else(|| column_at(&self.buffer, current_line_start, self.cursor));
        let current_line_end = line_end(&self.buffer, self.cursor);
        let target = if current_line_end == self.buffer.len() {
            self.buffer.len()
        } else {
            position_for_column(&self.buffer, current_line_end + 1, current_column)
        };
        if self.cursor == target && !self.drops_selection(extend) {
            return false;
        }
        self.move_to(target, extend);
        self.preferred_column = Some(current_column);
        true
    }

    pub fn move_word_left(&mut self, extend: bool) -> bool {
        if self.cursor == 0 {
            return false;
        }
        let mut idx = self.cursor;
        while idx > 0 {
            let prev = prev_grapheme_boundary(&self.buffer, idx);
            if self.buffer[prev..idx].trim().is_empty() {
                idx = prev;
            } else {
                break;
            }
        }
        while idx > 0 {
            let prev = prev_grapheme_boundary(&self.buffer, idx);
            if self.buffer[prev..idx].trim().is_empty() {
                break;
            }
            idx = prev;
        }
        self.move_to(idx, extend)
    }

    pub fn move_word_right(&mut self, extend: bool) -> bool {
        let len = self.buffer.len();
        if self.cursor >= len {
            return false;
        }
        let mut idx = self.cursor;
        while idx < len {
            let next = next_grapheme_boundary(&self.buffer, idx);
            if self.buffer[idx..next].trim().is_empty() {
                idx = next;
            } else {
                break;
            }
        }
        while idx < len {
            let next = next_grapheme_boundary(&self.buffer, idx);
            if self.buffer[idx..next].trim().is_empty() {
                break;
            }
            idx = next;
        }
        while idx < len {
            let next = next_grapheme_boundary(&self.buffer, idx);
            if self.buffer[idx..next].trim().is_empty() {
                idx = next;
            } else {
                break;
            }
        }
        if idx == self.cursor {
            return false;
        }
        self.move_to(idx.min(len), extend)
    }

    pub fn undo(&mut self) -> bool {
        if self.history_index == 0 {
            return false;
        }
        self.history_index -= 1;
        self.restore_history_snapshot();
        true
    }

    pub fn redo(&mut self) -> bool {
        if self.history_index + 1 >= self.history.len() {
            return false;
        }
        self.history_index += 1;
        self.restore_history_snapshot();
        true
    }

    fn move_to(&mut self, target: usize, extend: bool) -> bool {
        if extend {
            if self.anchor.is_none() {
                self.anchor = Some(self.cursor);
            }
        } else {
            self.anchor = None;
        }
        self.cursor = target;
        if self.anchor == Some(self.cursor) {
            self.anchor = None;
        }
        self.preferred_column = None;
        true
    }

    /// Plain left/right with an active selection collapses to its edge.
    fn collapse_target(&self, extend: bool, towards_start: bool) -> Option<usize> {
        if extend || !self.has_selection() {
            return None;
        }
        let selection = self.selection();
        Some(if towards_start {
            selection.start
        } else {
            selection.end
        })
    }

    fn drops_selection(&self, extend: bool) -> bool {
        !extend && self.anchor.is_some()
    }

    fn delete_selection_inner(&mut self) -> bool {
        let selection = self.selection();
        self.anchor = None;
        if selection.is_empty() {
            return false;
        }
        self.buffer.drain(selection.start..selection.end);
        self.cursor = selection.start;
        true
    }

    fn after_edit(&mut self) {
        self.pending_selection = None;
        self.record_history();
    }

    fn record_history(&mut self) {
        if let Some(current) = self.history.get(self.history_index) {
            if current.as_str() == self.buffer {
                return;
            }
        }
        self.history.truncate(self.history_index + 1);
        self.history.push(self.buffer.clone());
        if self.history.len() > MAX_HISTORY {
            let overflow = self.history.len() - MAX_HISTORY;
            self.history.drain(0..overflow);
        }
        self.history_index = self.history.len() - 1;
    }

    fn restore_history_snapshot(&mut self) {
        if let Some(snapshot) = self.history.get(self.history_index).cloned() {
            self.buffer = snapshot;
            if self.cursor > self.buffer.len() {
                self.cursor = self.buffer.len();
            }
            self.cursor = clamp_to_boundary(&self.buffer, self.cursor);
            self.anchor = None;
            self.pending_selection = None;
            self.preferred_column = None;
        }
    }
}

fn clamp_to_boundary(text: &str, index: usize) -> usize {
    let mut index = index.min(text.len());
    while !text.is_char_boundary(index) {
        index -= 1;
    }
    index
}

fn prev_grapheme_boundary(text: &str, cursor: usize) -> usize {
    if cursor == 0 {
        return 0;
    }
    text[..cursor]
        .grapheme_indices(true)
        .last()
        .map(|(idx, _)| idx)
        .unwrap_or(0)
}

fn next_grapheme_boundary(text: &str, cursor: usize) -> usize {
    if cursor >= text.len() {
        return text.len();
    }
    text[cursor..]
        .graphemes(true)
        .next()
        .map(|grapheme| cursor + grapheme.len())
        .unwrap_or(text.len())
}

fn line_start(text: &str, cursor: usize) -> usize {
    text[..cursor].rfind('\n').map(|idx| idx + 1).unwrap_or(0)
}

fn line_end(text: &str, cursor: usize) -> usize {
    text[cursor..]
        .find('\n')
        .map(|idx| cursor + idx)
        .unwrap_or_else(|| text.len())
}

fn column_at(text: &str, line_start: usize, cursor: usize) -> usize {
    text[line_start..cursor].graphemes(true).count()
}

fn position_for_column(text: &str, line_start: usize, column: usize) -> usize {
    let line_end = line_end(text, line_start);
    let mut position = line_start;
    for (count, grapheme) in text[line_start..line_end].graphemes(true).enumerate() {
        if count >= column {
            return position;
        }
        position += grapheme.len();
    }
    line_end
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formatting::FormatAction;

    #[test]
    fn editor_undo_redo_cycles() {
        let mut editor = EditorState::new("hello".to_string());
        assert!(editor.insert_char('!'));
        assert_eq!(editor.buffer(), "hello!");
        assert!(editor.undo());
        assert_eq!(editor.buffer(), "hello");
        assert!(!editor.undo());
        assert!(editor.redo());
        assert_eq!(editor.buffer(), "hello!");
    }

    #[test]
    fn editor_word_navigation_skips_whitespace() {
        let mut editor = EditorState::new("alpha  beta".to_string());
        assert!(editor.move_word_left(false));
        assert_eq!(editor.cursor(), 7);
        assert!(editor.move_word_left(false));
        assert_eq!(editor.cursor(), 0);
        assert!(editor.move_word_right(false));
        assert_eq!(editor.cursor(), 7);
    }

    #[test]
    fn shift_moves_extend_selection_and_typing_replaces_it() {
        let mut editor = EditorState::new("abcdef".to_string());
        editor.move_left(true);
        editor.move_left(true);
        assert_eq!(editor.selection(), Selection::new(4, 6));
        editor.insert_char('X');
        assert_eq!(editor.buffer(), "abcdX");
        assert!(!editor.has_selection());
    }

    #[test]
    fn plain_move_collapses_selection_to_edge() {
        let mut editor = EditorState::new("abcdef".to_string());
        editor.set_selection(Selection::new(1, 4));
        editor.move_left(false);
        assert_eq!(editor.selection(), Selection::caret(1));

        editor.set_selection(Selection::new(1, 4));
        editor.move_right(false);
        assert_eq!(editor.selection(), Selection::caret(4));
    }

    #[test]
    fn backspace_removes_selection() {
        let mut editor = EditorState::new("hello world".to_string());
        editor.set_selection(Selection::new(5, 11));
        assert!(editor.backspace());
        assert_eq!(editor.buffer(), "hello");
        assert_eq!(editor.cursor(), 5);
    }

    #[test]
    fn insertion_restores_selection_only_after_commit() {
        let mut editor = EditorState::new("say hi".to_string());
        editor.set_selection(Selection::new(4, 6));
        let insertion = FormatAction::Bold.apply(editor.buffer(), editor.selection());
        editor.apply_insertion(insertion);

        // Phase one: the value changed, caret reset to the end.
        assert_eq!(editor.buffer(), "say **hi**");
        assert_eq!(editor.selection(), Selection::caret(10));
        assert_eq!(editor.pending_selection(), Some(Selection::new(6, 8)));

        // Phase two: after paint.
        assert!(editor.commit_pending_selection());
        assert_eq!(editor.selection(), Selection::new(6, 8));
        assert!(!editor.commit_pending_selection());
    }

    #[test]
    fn typing_before_commit_discards_pending_selection() {
        let mut editor = EditorState::new(String::new());
        let insertion = FormatAction::Italic.apply("", Selection::caret(0));
        editor.apply_insertion(insertion);
        editor.insert_char('x');
        assert_eq!(editor.pending_selection(), None);
        assert!(!editor.commit_pending_selection());
    }

    #[test]
    fn vertical_moves_keep_preferred_column() {
        let mut editor = EditorState::new("abcd\nx\nabcd".to_string());
        editor.set_selection(Selection::caret(3));
        assert!(editor.move_down(false));
        assert_eq!(editor.cursor(), 6);
        assert!(editor.move_down(false));
        assert_eq!(editor.cursor(), 10);
        assert!(editor.move_up(false));
        assert!(editor.move_up(false));
        assert_eq!(editor.cursor(), 3);
    }

    #[test]
    fn load_resets_history_and_cursor() {
        let mut editor = EditorState::new("seed".to_string());
        editor.insert_char('s');
        editor.load("other".to_string());
        assert_eq!(editor.cursor(), 5);
        assert!(!editor.undo());
    }
}
