use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NoteError {
    #[error("note index {index} is out of range ({len} notes)")]
    IndexOutOfRange { index: usize, len: usize },
}

/// What a delete did to the selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionShift {
    Unchanged,
    Cleared,
    Decremented,
}

/// Ordered note bodies plus the selected index. Position is identity.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NoteStore {
    notes: Vec<String>,
    selected: Option<usize>,
}

impl NoteStore {
    /// Builds a store from restored parts; a selection outside the collection
    /// is dropped.
    pub fn from_parts(notes: Vec<String>, selected: Option<usize>) -> Self {
        let selected = selected.filter(|&index| index < notes.len());
        Self { notes, selected }
    }

    pub fn len(&self) -> usize {
        self.notes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.notes.is_empty()
    }

    pub fn notes(&self) -> &[String] {
        &self.notes
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        self.notes.get(index).map(String::as_str)
    }

    pub fn selected(&self) -> Option<usize> {
        self.selected
    }

    pub fn selected_body(&self) -> Option<&str> {
        self.selected.and_then(|index| self.get(index))
    }

    /// Appends an empty note and selects it.
    pub fn add(&mut self) -> usize {
        self.notes.push(String::new());
        let index = self.notes.len() - 1;
        self.selected = Some(index);
        index
    }

    pub fn delete(&mut self, index: usize) -> Result<SelectionShift, NoteError> {
        self.check(index)?;
        self.notes.remove(index);
        let shift = match self.selected {
            Some(selected) if selected == index => {
                self.selected = None;
                SelectionShift::Cleared
            }
            Some(selected) if selected > index => {
                self.selected = Some(selected - 1);
                SelectionShift::Decremented
            }
            _ => SelectionShift::Unchanged,
        };
        Ok(shift)
    }

    pub fn select(&mut self, index: usize) -> Result<&str, NoteError> {
        self.check(index)?;
        self.selected = Some(index);
        Ok(&self.notes[index])
    }

    /// Mirrors `text` into the selected entry. Returns false when no note is
    /// selected.
    pub fn replace_selected(&mut self, text: &str) -> bool {
        let Some(index) = self.selected else {
            return false;
        };
        let slot = &mut self.notes[index];
        if slot.as_str() != text {
            slot.clear();
            slot.push_str(text);
        }
        true
    }

    fn check(&self, index: usize) -> Result<(), NoteError> {
        if index < self.notes.len() {
            Ok(())
        } else {
            Err(NoteError::IndexOutOfRange {
                index,
                len: self.notes.len(),
            })
        }
    }
}
