use std::collections::{HashMap, VecDeque};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::entity::Note;
use crate::error::{NotesError, Result};

/// In-memory notes, partitioned by user id and kept newest-first.
///
/// Reads share the lock; every mutation holds the write lock only for the
/// map update itself. All operations touch a single user's sequence.
#[derive(Debug, Default)]
pub struct NoteStore {
    notes: RwLock<HashMap<i64, VecDeque<Note>>>,
}

impl NoteStore {
    pub fn new() -> Self {
        Self::default()
    }

    // Every critical section leaves the map consistent, so a poisoned lock
    // still guards valid data.
    fn read(&self) -> RwLockReadGuard<'_, HashMap<i64, VecDeque<Note>>> {
        self.notes.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<i64, VecDeque<Note>>> {
        self.notes.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// A copy of the user's notes, newest first. Empty for unknown users.
    pub fn list(&self, user_id: i64) -> Vec<Note> {
        self.read()
            .get(&user_id)
            .map(|notes| notes.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn count(&self, user_id: i64) -> usize {
        self.read().get(&user_id).map_or(0, VecDeque::len)
    }

    /// Store a new note at the head of the user's sequence.
    ///
    /// `text` must already be trimmed and non-empty.
    pub fn create(&self, user_id: i64, text: String) -> Note {
        debug_assert!(!text.trim().is_empty(), "note text must be non-empty");

        let note = Note::new(user_id, text);
        self.write()
            .entry(user_id)
            .or_default()
            .push_front(note.clone());
        note
    }

    /// Remove one note, keeping the order of the rest.
    pub fn delete(&self, user_id: i64, note_id: &str) -> Result<()> {
        let mut notes = self.write();
        let not_found = || NotesError::NoteNotFound(note_id.to_string());

        let user_notes = notes.get_mut(&user_id).ok_or_else(not_found)?;
        let position = user_notes
            .iter()
            .position(|note| note.id == note_id)
            .ok_or_else(not_found)?;
        user_notes.remove(position);
        Ok(())
    }

    /// Clear the user's notes and return how many were removed.
    pub fn delete_all(&self, user_id: i64) -> usize {
        let mut notes = self.write();
        let user_notes = notes.entry(user_id).or_default();
        let removed = user_notes.len();
        user_notes.clear();
        removed
    }
}
