use std::time::{Duration, Instant};

use time::OffsetDateTime;

use crate::app::actions::{ActionDispatcher, Slices, Snapshot};
use crate::app::editor::EditorState;
use crate::app::notes::{NoteError, NoteStore, SelectionShift};
use crate::config::AppConfig;
use crate::formatting::FormatAction;
use crate::layout::{LayoutState, PaneTab, ViewportMode, VisiblePanes};
use crate::preview::{MarkdownConverter, PreviewState, RenderOutcome, RenderRequest};
use crate::storage::StorageHandle;
use crate::title::derive_title;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FocusPane {
    List,
    Editor,
}

#[derive(Debug, Clone)]
pub struct DeleteNoteOverlay {
    pub index: usize,
    pub title: String,
}

#[derive(Debug, Clone)]
pub enum OverlayState {
    DeleteNote(DeleteNoteOverlay),
}

#[derive(Debug, Clone)]
pub struct AppState {
    pub focus: FocusPane,
    pub list_cursor: usize,
    pub status_message: Option<String>,
    pub overlay: Option<OverlayState>,
    pub last_saved_at: Option<OffsetDateTime>,
    pub last_save_error: Option<String>,
    status_expires_at: Option<Instant>,
    notification_ttl: Duration,
    notes: NoteStore,
    editor: EditorState,
    dark_mode: bool,
    layout: LayoutState,
    preview: PreviewState,
}

impl AppState {
    /// Restores persisted state. Bad entries were already replaced by
    /// defaults in storage, so this cannot fail.
    pub fn load(storage: &StorageHandle, config: &AppConfig) -> Self {
        let persisted = storage.load_state();
        let notes = NoteStore::from_parts(persisted.notes, persisted.selected_note_index);
        let buffer = match notes.selected_body() {
            Some(body) => {
                if body != persisted.current_note {
                    tracing::debug!("stored currentNote diverges from the selected note, using the note");
                }
                body.to_string()
            }
            None => String::new(),
        };
        tracing::info!(
            notes = notes.len(),
            selected = ?notes.selected(),
            dark_mode = persisted.dark_mode,
            "state restored"
        );

        Self {
            focus: FocusPane::List,
            list_cursor: notes.selected().unwrap_or(0),
            status_message: None,
            overlay: None,
            last_saved_at: None,
            last_save_error: None,
            status_expires_at: None,
            notification_ttl: Duration::from_secs(config.notification_ttl_secs),
            editor: EditorState::new(buffer),
            notes,
            dark_mode: persisted.dark_mode,
            layout: LayoutState::new(config.layout),
            preview: PreviewState::default(),
        }
    }

    pub fn notes(&self) -> &NoteStore {
        &self.notes
    }

    pub fn selected_index(&self) -> Option<usize> {
        self.notes.selected()
    }

    pub fn editor(&self) -> &EditorState {
        &self.editor
    }

    pub fn buffer(&self) -> &str {
        self.editor.buffer()
    }

    pub fn dark_mode(&self) -> bool {
        self.dark_mode
    }

    pub fn layout(&self) -> &LayoutState {
        &self.layout
    }

    pub fn preview(&self) -> &PreviewState {
        &self.preview
    }

    pub fn titles(&self) -> Vec<String> {
        self.notes.notes().iter().map(|body| derive_title(body)).collect()
    }

    pub fn visible_panes(&self) -> VisiblePanes {
        self.layout.visible(self.notes.selected().is_some())
    }

    pub fn add_note(&mut self, storage: &StorageHandle) -> usize {
        let index = self.notes.add();
        self.editor.clear();
        self.list_cursor = index;
        self.focus = FocusPane::Editor;
        self.layout.on_note_opened();
        tracing::debug!(index, "note added");
        self.persist(
            storage,
            Slices::NOTES | Slices::SELECTION | Slices::CURRENT_NOTE,
        );
        index
    }

    pub fn delete_note(&mut self, storage: &StorageHandle, index: usize) -> Result<(), NoteError> {
        let shift = self.notes.delete(index)?;
        if shift == SelectionShift::Cleared {
            self.editor.clear();
            self.focus = FocusPane::List;
            self.layout.on_note_closed();
        }
        self.list_cursor = self.list_cursor.min(self.notes.len().saturating_sub(1));
        tracing::debug!(index, ?shift, "note deleted");
        self.persist(
            storage,
            Slices::NOTES | Slices::SELECTION | Slices::CURRENT_NOTE,
        );
        Ok(())
    }

    pub fn select_note(&mut self, storage: &StorageHandle, index: usize) -> Result<(), NoteError> {
        let body = self.notes.select(index)?.to_string();
        self.editor.load(body);
        self.list_cursor = index;
        self.focus = FocusPane::Editor;
        self.layout.on_note_opened();
        self.persist(storage, Slices::SELECTION | Slices::CURRENT_NOTE);
        Ok(())
    }

    /// Replaces the edit buffer wholesale.
    pub fn edit_current_note(&mut self, storage: &StorageHandle, text: String) {
        self.editor.set_text(text);
        self.commit_buffer(storage);
    }

    /// Runs a buffer-changing editor operation and persists when it reports a
    /// change.
    pub fn apply_editor_change<F>(&mut self, storage: &StorageHandle, edit: F) -> bool
    where
        F: FnOnce(&mut EditorState) -> bool,
    {
        if !edit(&mut self.editor) {
            return false;
        }
        self.commit_buffer(storage);
        true
    }

    /// Cursor and selection changes; nothing is persisted.
    pub fn move_cursor<F>(&mut self, movement: F) -> bool
    where
        F: FnOnce(&mut EditorState) -> bool,
    {
        movement(&mut self.editor)
    }

    /// First phase of a toolbar action. The selection lands on the next
    /// [`AppState::commit_pending_selection`].
    pub fn apply_format(&mut self, storage: &StorageHandle, action: FormatAction) {
        let insertion = action.apply(self.editor.buffer(), self.editor.selection());
        self.editor.apply_insertion(insertion);
        self.commit_buffer(storage);
    }

    pub fn commit_pending_selection(&mut self) -> bool {
        self.editor.commit_pending_selection()
    }

    pub fn toggle_dark_mode(&mut self, storage: &StorageHandle) -> bool {
        self.dark_mode = !self.dark_mode;
        self.persist(storage, Slices::DARK_MODE);
        self.dark_mode
    }

    fn commit_buffer(&mut self, storage: &StorageHandle) {
        let mut slices = Slices::CURRENT_NOTE;
        if self.notes.replace_selected(self.editor.buffer()) {
            slices |= Slices::NOTES;
        }
        self.persist(storage, slices);
    }

    fn persist(&mut self, storage: &StorageHandle, slices: Slices) {
        let snapshot = Snapshot {
            notes: &self.notes,
            current_note: self.editor.buffer(),
            dark_mode: self.dark_mode,
        };
        let failures = ActionDispatcher::new(storage).persist(slices, &snapshot);
        match failures.first() {
            None => {
                self.last_saved_at =
                    Some(OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc()));
                self.last_save_error = None;
            }
            Some(first) => {
                for err in &failures {
                    tracing::warn!(?err, "failed to persist state");
                }
                let message = format!("Could not save: {first}");
                self.last_save_error = Some(message.clone());
                self.set_status_message(Some(message));
            }
        }
    }

    pub fn on_resize(&mut self, columns: u16) -> bool {
        let note_selected = self.notes.selected().is_some();
        let changed = self.layout.on_resize(columns, note_selected);
        if changed && self.layout.mode() == ViewportMode::Mobile {
            self.focus = if note_selected {
                FocusPane::Editor
            } else {
                FocusPane::List
            };
        }
        changed
    }

    /// Esc. Leaves the editor and, on a narrow viewport, returns to the list.
    pub fn back(&mut self) -> bool {
        let left_editor = self.focus == FocusPane::Editor;
        self.focus = FocusPane::List;
        let returned = self.layout.back();
        left_editor || returned
    }

    pub fn toggle_tab(&mut self) -> PaneTab {
        self.layout.toggle_tab()
    }

    pub fn move_list_cursor(&mut self, delta: isize) {
        if self.notes.is_empty() {
            self.list_cursor = 0;
            return;
        }
        let last = self.notes.len() as isize - 1;
        let next = (self.list_cursor as isize + delta).clamp(0, last);
        self.list_cursor = next as usize;
    }

    pub fn open_list_cursor(&mut self, storage: &StorageHandle) -> Result<(), NoteError> {
        self.select_note(storage, self.list_cursor)
    }

    pub fn open_delete_note(&mut self) {
        if let Some(body) = self.notes.get(self.list_cursor) {
            self.overlay = Some(OverlayState::DeleteNote(DeleteNoteOverlay {
                index: self.list_cursor,
                title: derive_title(body),
            }));
        }
    }

    pub fn delete_note_overlay(&self) -> Option<&DeleteNoteOverlay> {
        match self.overlay.as_ref() {
            Some(OverlayState::DeleteNote(overlay)) => Some(overlay),
            None => None,
        }
    }

    pub fn confirm_delete(&mut self, storage: &StorageHandle) -> Result<(), NoteError> {
        let Some(OverlayState::DeleteNote(overlay)) = self.overlay.take() else {
            return Ok(());
        };
        self.delete_note(storage, overlay.index)?;
        self.set_status_message(Some(format!("Deleted \"{}\"", overlay.title)));
        Ok(())
    }

    pub fn close_overlay(&mut self) {
        self.overlay = None;
    }

    pub fn preview_visible(&self) -> bool {
        self.visible_panes().preview
    }

    /// A render request when the preview is showing and stale.
    pub fn preview_request(&mut self) -> Option<RenderRequest> {
        if !self.preview_visible() {
            return None;
        }
        self.preview.request_for(self.editor.buffer())
    }

    pub fn accept_render(&mut self, outcome: RenderOutcome) -> bool {
        self.preview.accept(outcome, self.editor.buffer())
    }

    pub fn render_preview_inline<C: MarkdownConverter + ?Sized>(&mut self, converter: &C) {
        self.preview.render_now(converter, self.editor.buffer());
    }

    pub fn set_status_message<S: Into<String>>(&mut self, message: Option<S>) {
        self.status_message = message.map(Into::into);
        self.status_expires_at = self
            .status_message
            .as_ref()
            .map(|_| Instant::now() + self.notification_ttl);
    }

    pub fn clear_status_message(&mut self) {
        self.set_status_message(None::<String>);
    }

    /// Drops the status message once its time is up.
    pub fn expire_status(&mut self, now: Instant) -> bool {
        match self.status_expires_at {
            Some(deadline) if now >= deadline => {
                self.clear_status_message();
                true
            }
            _ => false,
        }
    }
}
