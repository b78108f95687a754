use bitflags::bitflags;

use crate::app::notes::NoteStore;
use crate::storage::{StorageError, StorageHandle};

bitflags! {
    /// Persisted pieces of state an operation touched.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Slices: u8 {
        const NOTES = 1 << 0;
        const SELECTION = 1 << 1;
        const CURRENT_NOTE = 1 << 2;
        const DARK_MODE = 1 << 3;
    }
}

/// Values to write for a set of slices.
pub struct Snapshot<'s> {
    pub notes: &'s NoteStore,
    pub current_note: &'s str,
    pub dark_mode: bool,
}

pub struct ActionDispatcher<'a> {
    storage: &'a StorageHandle,
}

impl<'a> ActionDispatcher<'a> {
    pub fn new(storage: &'a StorageHandle) -> Self {
        Self { storage }
    }

    /// Writes every requested slice. A failed write does not stop the others;
    /// all failures are returned.
    pub fn persist(&self, slices: Slices, snapshot: &Snapshot<'_>) -> Vec<StorageError> {
        let mut failures = Vec::new();
        if slices.contains(Slices::NOTES) {
            if let Err(err) = self.storage.save_notes(snapshot.notes.notes()) {
                failures.push(err);
            }
        }
        if slices.contains(Slices::SELECTION) {
            if let Err(err) = self.storage.save_selected_index(snapshot.notes.selected()) {
                failures.push(err);
            }
        }
        if slices.contains(Slices::CURRENT_NOTE) {
            if let Err(err) = self.storage.save_current_note(snapshot.current_note) {
                failures.push(err);
            }
        }
        if slices.contains(Slices::DARK_MODE) {
            if let Err(err) = self.storage.save_dark_mode(snapshot.dark_mode) {
                failures.push(err);
            }
        }
        failures
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::tests::{init_storage, init_storage_with_quota};
    use assert_matches::assert_matches;

    #[test]
    fn writes_only_requested_slices() -> anyhow::Result<()> {
        let (_dir, storage) = init_storage()?;
        let notes = NoteStore::from_parts(vec!["a".into()], Some(0));
        let snapshot = Snapshot {
            notes: &notes,
            current_note: "a",
            dark_mode: true,
        };
        let failures =
            ActionDispatcher::new(&storage).persist(Slices::NOTES | Slices::DARK_MODE, &snapshot);
        assert!(failures.is_empty());

        let state = storage.load_state();
        assert_eq!(state.notes, vec!["a".to_string()]);
        assert!(state.dark_mode);
        assert_eq!(state.selected_note_index, None);
        assert_eq!(storage.get_raw(crate::storage::CURRENT_NOTE_KEY)?, None);
        Ok(())
    }

    #[test]
    fn collects_failures_and_keeps_writing() -> anyhow::Result<()> {
        let (_dir, storage) = init_storage_with_quota(64)?;
        let big = "x".repeat(128);
        let notes = NoteStore::from_parts(vec![big.clone()], Some(0));
        let snapshot = Snapshot {
            notes: &notes,
            current_note: &big,
            dark_mode: false,
        };
        let failures = ActionDispatcher::new(&storage).persist(Slices::all(), &snapshot);
        assert_eq!(failures.len(), 2);
        assert_matches!(failures[0], StorageError::QuotaExceeded { .. });
        assert_eq!(
            storage.get_raw(crate::storage::SELECTED_INDEX_KEY)?.as_deref(),
            Some("0")
        );
        assert_eq!(storage.get_raw(crate::storage::NOTES_KEY)?, None);
        Ok(())
    }
}
