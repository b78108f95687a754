use std::io::Stdout;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::execute;
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use ratatui::backend::CrosstermBackend;
use ratatui::widgets::ListState;
use ratatui::Terminal;

use crate::config::AppConfig;
use crate::formatting::FormatAction;
use crate::preview::{CmarkConverter, PreviewWorker};
use crate::storage::StorageHandle;
use crate::ui;

pub mod actions;
pub mod editor;
pub mod notes;
pub mod state;

pub use editor::EditorState;
pub use notes::{NoteError, NoteStore};
pub use state::{AppState, FocusPane, OverlayState};

const RENDER_POLL: Duration = Duration::from_millis(30);

enum Action {
    Quit,
    SelectNext,
    SelectPrevious,
    OpenNote,
    NewNote,
    DeleteNote,
    ToggleTab,
    ToggleDarkMode,
    Back,
}

pub struct App {
    pub config: Arc<AppConfig>,
    pub storage: StorageHandle,
    state: AppState,
    list_state: ListState,
    converter: CmarkConverter,
    preview_worker: PreviewWorker,
    should_quit: bool,
    tick_rate: Duration,
}

impl App {
    pub fn new(config: Arc<AppConfig>, storage: StorageHandle) -> Result<Self> {
        let state = AppState::load(&storage, &config);
        let converter = CmarkConverter::new(&config.preview);
        let preview_worker =
            PreviewWorker::spawn(converter).context("starting preview renderer")?;
        Ok(Self {
            config,
            storage,
            state,
            list_state: ListState::default(),
            converter,
            preview_worker,
            should_quit: false,
            tick_rate: Duration::from_millis(250),
        })
    }

    pub fn run(&mut self) -> Result<()> {
        let mut terminal = setup_terminal()?;
        let result = self.event_loop(&mut terminal);
        restore_terminal(&mut terminal)?;
        result
    }

    fn event_loop(&mut self, terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> Result<()> {
        let size = terminal.size().context("reading terminal size")?;
        self.state.on_resize(size.width);

        let mut last_tick = Instant::now();
        loop {
            self.pump_preview();
            terminal
                .draw(|frame| {
                    if self.state.notes().is_empty() {
                        self.list_state.select(None);
                    } else {
                        self.list_state.select(Some(self.state.list_cursor));
                    }
                    ui::draw_app(frame, &self.state, &mut self.list_state);
                })
                .context("rendering frame")?;

            if self.should_quit {
                break;
            }

            // the new text has been painted; now place the toolbar selection
            if self.state.commit_pending_selection() {
                continue;
            }

            let timeout = if self.state.preview().is_rendering() {
                RENDER_POLL
            } else {
                self.tick_rate
                    .checked_sub(last_tick.elapsed())
                    .unwrap_or_else(|| Duration::from_millis(0))
            };

            if event::poll(timeout).context("polling for terminal events")? {
                match event::read().context("reading terminal event")? {
                    Event::Key(key) => self.handle_key(key),
                    Event::Resize(columns, _) => {
                        self.state.on_resize(columns);
                    }
                    _ => {}
                }
            }

            if last_tick.elapsed() >= self.tick_rate {
                self.on_tick();
                last_tick = Instant::now();
            }
        }
        Ok(())
    }

    fn on_tick(&mut self) {
        self.state.expire_status(Instant::now());
    }

    /// Collects finished renders and asks for a new one when the visible
    /// preview is stale.
    fn pump_preview(&mut self) {
        while let Some(outcome) = self.preview_worker.try_recv() {
            self.state.accept_render(outcome);
        }
        if let Some(request) = self.state.preview_request() {
            if !self.preview_worker.submit(request) {
                tracing::warn!("preview worker unavailable, rendering inline");
                self.state.render_preview_inline(&self.converter);
            }
        }
    }

    fn handle_key(&mut self, key: KeyEvent) {
        if key.kind != KeyEventKind::Press {
            return;
        }

        if self.handle_overlay_key(key) {
            return;
        }

        if key.modifiers.contains(KeyModifiers::CONTROL) {
            match key.code {
                KeyCode::Char('c') => {
                    self.handle_action(Action::Quit);
                    return;
                }
                KeyCode::Char('p') => {
                    self.handle_action(Action::ToggleTab);
                    return;
                }
                _ => {}
            }
        }

        let editing = self.state.focus == FocusPane::Editor && self.state.visible_panes().editor;
        if editing && self.handle_editor_key(key) {
            return;
        }

        let plain = !key
            .modifiers
            .intersects(KeyModifiers::CONTROL | KeyModifiers::ALT | KeyModifiers::SUPER);
        let action = match key.code {
            KeyCode::Char('q') if plain => Some(Action::Quit),
            KeyCode::Char('j') | KeyCode::Down => Some(Action::SelectNext),
            KeyCode::Char('k') | KeyCode::Up => Some(Action::SelectPrevious),
            KeyCode::Enter => Some(Action::OpenNote),
            KeyCode::Char('a') if plain => Some(Action::NewNote),
            KeyCode::Char('d') if plain => Some(Action::DeleteNote),
            KeyCode::Char('p') if plain => Some(Action::ToggleTab),
            KeyCode::Char('m') if plain => Some(Action::ToggleDarkMode),
            KeyCode::Esc => Some(Action::Back),
            _ => None,
        };

        if let Some(action) = action {
            self.handle_action(action);
        }
    }

    fn handle_action(&mut self, action: Action) {
        match action {
            Action::Quit => self.should_quit = true,
            Action::SelectNext => self.state.move_list_cursor(1),
            Action::SelectPrevious => self.state.move_list_cursor(-1),
            Action::OpenNote => {
                if let Err(err) = self.state.open_list_cursor(&self.storage) {
                    tracing::debug!(?err, "nothing to open");
                    self.state.set_status_message(Some("No note to open"));
                }
            }
            Action::NewNote => {
                self.state.add_note(&self.storage);
            }
            Action::DeleteNote => {
                if self.state.notes().is_empty() {
                    self.state.set_status_message(Some("Nothing to delete"));
                } else {
                    self.state.open_delete_note();
                }
            }
            Action::ToggleTab => {
                self.state.toggle_tab();
            }
            Action::ToggleDarkMode => {
                let enabled = self.state.toggle_dark_mode(&self.storage);
                tracing::debug!(enabled, "dark mode toggled");
            }
            Action::Back => {
                self.state.back();
            }
        }
    }

    fn handle_overlay_key(&mut self, key: KeyEvent) -> bool {
        match self.state.overlay {
            Some(OverlayState::DeleteNote(_)) => {
                match key.code {
                    KeyCode::Esc | KeyCode::Char('n') => {
                        self.state.close_overlay();
                        self.state.set_status_message(Some("Delete canceled"));
                    }
                    KeyCode::Enter | KeyCode::Char('y') => {
                        if let Err(err) = self.state.confirm_delete(&self.storage) {
                            tracing::warn!(?err, "delete failed");
                            self.state.set_status_message(Some(err.to_string()));
                        }
                    }
                    _ => {}
                }
                true
            }
            None => false,
        }
    }

    fn handle_editor_key(&mut self, key: KeyEvent) -> bool {
        let extend = key.modifiers.contains(KeyModifiers::SHIFT);

        if key.modifiers.contains(KeyModifiers::ALT) {
            if let KeyCode::Char(ch) = key.code {
                if let Some(action) = FormatAction::from_shortcut(ch) {
                    self.state.apply_format(&self.storage, action);
                    return true;
                }
            }
        }

        if key.modifiers.contains(KeyModifiers::CONTROL) {
            match key.code {
                KeyCode::Char('z') => {
                    if !self.state.apply_editor_change(&self.storage, EditorState::undo) {
                        self.state.set_status_message(Some("Nothing to undo"));
                    }
                    return true;
                }
                KeyCode::Char('y') => {
                    if !self.state.apply_editor_change(&self.storage, EditorState::redo) {
                        self.state.set_status_message(Some("Nothing to redo"));
                    }
                    return true;
                }
                KeyCode::Char('a') => {
                    self.state.move_cursor(EditorState::select_all);
                    return true;
                }
                KeyCode::Left => {
                    self.state.move_cursor(|editor| editor.move_word_left(extend));
                    return true;
                }
                KeyCode::Right => {
                    self.state.move_cursor(|editor| editor.move_word_right(extend));
                    return true;
                }
                _ => return false,
            }
        }

        match key.code {
            KeyCode::Esc => {
                self.state.back();
                true
            }
            KeyCode::Enter => {
                self.state
                    .apply_editor_change(&self.storage, EditorState::insert_newline);
                true
            }
            KeyCode::Backspace => {
                self.state
                    .apply_editor_change(&self.storage, EditorState::backspace);
                true
            }
            KeyCode::Delete => {
                self.state
                    .apply_editor_change(&self.storage, EditorState::delete);
                true
            }
            KeyCode::Tab => {
                self.state
                    .apply_editor_change(&self.storage, |editor| editor.insert_char('\t'));
                true
            }
            KeyCode::Char(ch)
                if !key
                    .modifiers
                    .intersects(KeyModifiers::ALT | KeyModifiers::SUPER) =>
            {
                self.state
                    .apply_editor_change(&self.storage, |editor| editor.insert_char(ch));
                true
            }
            KeyCode::Left => {
                self.state.move_cursor(|editor| editor.move_left(extend));
                true
            }
            KeyCode::Right => {
                self.state.move_cursor(|editor| editor.move_right(extend));
                true
            }
            KeyCode::Up => {
                self.state.move_cursor(|editor| editor.move_up(extend));
                true
            }
            KeyCode::Down => {
                self.state.move_cursor(|editor| editor.move_down(extend));
                true
            }
            KeyCode::Home => {
                self.state.move_cursor(|editor| editor.move_home(extend));
                true
            }
            KeyCode::End => {
                self.state.move_cursor(|editor| editor.move_end(extend));
                true
            }
            _ => false,
        }
    }
}

fn setup_terminal() -> Result<Terminal<CrosstermBackend<Stdout>>> {
    enable_raw_mode().context("enabling raw mode")?;
    let mut stdout = std::io::stdout();
    execute!(stdout, EnterAlternateScreen).context("switching to alternate screen")?;
    let backend = CrosstermBackend::new(stdout);
    let terminal = Terminal::new(backend).context("creating terminal backend")?;
    Ok(terminal)
}

fn restore_terminal(terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> Result<()> {
    terminal.show_cursor().ok();
    disable_raw_mode().context("disabling raw mode")?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen).context("restoring screen state")?;
    Ok(())
}
