use std::fmt::Write as _;
use std::io::{self, Read};
use std::sync::Arc;

use anyhow::{bail, Result};
use clap::{Args, ValueEnum};

use crate::app::{App, AppState, NoteError};
use crate::config::AppConfig;
use crate::preview::{render_preview, CmarkConverter};
use crate::storage::StorageHandle;
use crate::title::derive_title;

#[derive(Args, Debug, Clone)]
pub struct NewArgs {
    /// Provide the note body inline. If omitted, reads from stdin when piped.
    #[arg(long)]
    pub body: Option<String>,
}

#[derive(Args, Debug, Clone)]
pub struct ShowArgs {
    /// Zero-based note index
    pub index: usize,
    /// Print the sanitized preview HTML instead of the markdown
    #[arg(long)]
    pub html: bool,
}

#[derive(Args, Debug, Clone)]
pub struct DeleteArgs {
    /// Zero-based note index
    pub index: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum DarkModeSetting {
    On,
    Off,
    Toggle,
}

#[derive(Args, Debug, Clone)]
pub struct DarkModeArgs {
    /// Omit to print the current preference
    #[arg(value_enum)]
    pub setting: Option<DarkModeSetting>,
}

pub fn run_tui(app: &mut App) -> Result<()> {
    app.run()
}

pub fn new_note(config: Arc<AppConfig>, storage: StorageHandle, args: NewArgs) -> Result<()> {
    let body = match args.body {
        Some(body) => body,
        None => read_stdin()?.unwrap_or_default(),
    };
    let output = create_note(&config, &storage, body)?;
    print!("{output}");
    Ok(())
}

fn create_note(config: &AppConfig, storage: &StorageHandle, body: String) -> Result<String> {
    let mut state = AppState::load(storage, config);
    let index = state.add_note(storage);
    if !body.is_empty() {
        state.edit_current_note(storage, body);
    }
    ensure_saved(&state)?;
    Ok(format!("Created note #{index}: {}\n", derive_title(state.buffer())))
}

pub fn list_notes(config: Arc<AppConfig>, storage: StorageHandle) -> Result<()> {
    let state = AppState::load(&storage, &config);
    print!("{}", format_note_list(&state));
    Ok(())
}

fn format_note_list(state: &AppState) -> String {
    if state.notes().is_empty() {
        return "No notes yet.\n".to_string();
    }
    let selected = state.selected_index();
    let mut out = String::new();
    for (index, title) in state.titles().iter().enumerate() {
        let marker = if Some(index) == selected { "*" } else { " " };
        let _ = writeln!(&mut out, "{marker}{index:>3}  {title}");
    }
    out
}

pub fn show_note(config: Arc<AppConfig>, storage: StorageHandle, args: ShowArgs) -> Result<()> {
    let output = render_note(&config, &storage, &args)?;
    print!("{output}");
    Ok(())
}

fn render_note(config: &AppConfig, storage: &StorageHandle, args: &ShowArgs) -> Result<String> {
    let state = AppState::load(storage, config);
    let body = state
        .notes()
        .get(args.index)
        .ok_or(NoteError::IndexOutOfRange {
            index: args.index,
            len: state.notes().len(),
        })?;
    let mut out = if args.html {
        render_preview(&CmarkConverter::new(&config.preview), body)
    } else {
        body.to_string()
    };
    if !out.ends_with('\n') {
        out.push('\n');
    }
    Ok(out)
}

pub fn delete_note(config: Arc<AppConfig>, storage: StorageHandle, args: DeleteArgs) -> Result<()> {
    let output = remove_note(&config, &storage, args.index)?;
    print!("{output}");
    Ok(())
}

fn remove_note(config: &AppConfig, storage: &StorageHandle, index: usize) -> Result<String> {
    let mut state = AppState::load(storage, config);
    let title = state.notes().get(index).map(derive_title);
    state.delete_note(storage, index)?;
    ensure_saved(&state)?;
    Ok(format!(
        "Deleted note #{index}: {}\n",
        title.unwrap_or_default()
    ))
}

pub fn dark_mode(config: Arc<AppConfig>, storage: StorageHandle, args: DarkModeArgs) -> Result<()> {
    let output = apply_dark_mode(&config, &storage, args.setting)?;
    print!("{output}");
    Ok(())
}

fn apply_dark_mode(
    config: &AppConfig,
    storage: &StorageHandle,
    setting: Option<DarkModeSetting>,
) -> Result<String> {
    let mut state = AppState::load(storage, config);
    let wanted = match setting {
        None => state.dark_mode(),
        Some(DarkModeSetting::On) => true,
        Some(DarkModeSetting::Off) => false,
        Some(DarkModeSetting::Toggle) => !state.dark_mode(),
    };
    if wanted != state.dark_mode() {
        state.toggle_dark_mode(storage);
        ensure_saved(&state)?;
    }
    let label = if state.dark_mode() { "on" } else { "off" };
    Ok(format!("Dark mode {label}\n"))
}

fn ensure_saved(state: &AppState) -> Result<()> {
    if let Some(err) = &state.last_save_error {
        bail!("{err}");
    }
    Ok(())
}

fn read_stdin() -> Result<Option<String>> {
    if atty::is(atty::Stream::Stdin) {
        return Ok(None);
    }
    let mut buf = String::new();
    io::stdin().read_to_string(&mut buf)?;
    Ok(Some(buf))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::tests::{init_storage, init_storage_with_quota};
    use assert_matches::assert_matches;

    type TestResult<T = ()> = Result<T>;

    #[test]
    fn cli_new_appends_and_selects() -> TestResult {
        let (_dir, storage) = init_storage()?;
        let config = AppConfig::default();
        let output = create_note(&config, &storage, "# Shopping\n- eggs".into())?;
        assert_eq!(output, "Created note #0: Shopping\n");
        create_note(&config, &storage, String::new())?;

        let state = AppState::load(&storage, &config);
        let listing = format_note_list(&state);
        assert_eq!(listing, "   0  Shopping\n*  1  Untitled\n");
        Ok(())
    }

    #[test]
    fn cli_list_reports_empty_store() -> TestResult {
        let (_dir, storage) = init_storage()?;
        let state = AppState::load(&storage, &AppConfig::default());
        assert_eq!(format_note_list(&state), "No notes yet.\n");
        Ok(())
    }

    #[test]
    fn cli_show_prints_body_or_sanitized_html() -> TestResult {
        let (_dir, storage) = init_storage()?;
        let config = AppConfig::default();
        storage.save_notes(&["**hi** <script>x()</script>".into()])?;

        let raw = render_note(&config, &storage, &ShowArgs { index: 0, html: false })?;
        assert_eq!(raw, "**hi** <script>x()</script>\n");

        let html = render_note(&config, &storage, &ShowArgs { index: 0, html: true })?;
        assert!(html.contains("<strong>hi</strong>"), "{html}");
        assert!(!html.contains("script"), "{html}");

        let missing = render_note(&config, &storage, &ShowArgs { index: 4, html: false });
        let err = missing.expect_err("index out of range");
        assert_matches!(
            err.downcast_ref::<NoteError>(),
            Some(NoteError::IndexOutOfRange { index: 4, len: 1 })
        );
        Ok(())
    }

    #[test]
    fn cli_delete_shifts_selection() -> TestResult {
        let (_dir, storage) = init_storage()?;
        let config = AppConfig::default();
        storage.save_notes(&["a".into(), "b".into(), "c".into()])?;
        storage.save_selected_index(Some(2))?;

        let output = remove_note(&config, &storage, 0)?;
        assert_eq!(output, "Deleted note #0: a\n");
        let persisted = storage.load_state();
        assert_eq!(persisted.notes, vec!["b".to_string(), "c".to_string()]);
        assert_eq!(persisted.selected_note_index, Some(1));
        assert_eq!(persisted.current_note, "c");

        assert!(remove_note(&config, &storage, 9).is_err());
        Ok(())
    }

    #[test]
    fn cli_dark_mode_only_writes_on_change() -> TestResult {
        let (_dir, storage) = init_storage()?;
        let config = AppConfig::default();
        assert_eq!(apply_dark_mode(&config, &storage, None)?, "Dark mode off\n");
        assert_eq!(
            apply_dark_mode(&config, &storage, Some(DarkModeSetting::Off))?,
            "Dark mode off\n"
        );
        assert_eq!(storage.get_raw(crate::storage::DARK_MODE_KEY)?, None);

        assert_eq!(
            apply_dark_mode(&config, &storage, Some(DarkModeSetting::Toggle))?,
            "Dark mode on\n"
        );
        assert_eq!(
            apply_dark_mode(&config, &storage, Some(DarkModeSetting::On))?,
            "Dark mode on\n"
        );
        assert!(storage.load_state().dark_mode);
        Ok(())
    }

    #[test]
    fn cli_new_surfaces_quota_failures() -> TestResult {
        let (_dir, storage) = init_storage_with_quota(64)?;
        let err = create_note(&AppConfig::default(), &storage, "x".repeat(200))
            .expect_err("over quota");
        assert!(err.to_string().starts_with("Could not save"), "{err}");
        Ok(())
    }
}
