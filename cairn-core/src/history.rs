//! # History
//!
//! Linear undo/redo. Entries before the cursor are applied, entries at and after it can be redone.
//! Committing anything new while there are redo-able entries discards them.

use std::collections::VecDeque;
use std::num::NonZeroUsize;
use std::sync::Arc;

use crate::commands::Command;

/// One committed transaction, in its recorded form.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Entry {
    description: Arc<str>,
    commands: Box<[Command]>,
}
impl Entry {
    pub(crate) fn new(description: Arc<str>, commands: Box<[Command]>) -> Self {
        Self {
            description,
            commands,
        }
    }
    #[must_use]
    pub fn description(&self) -> &Arc<str> {
        &self.description
    }
    #[must_use]
    pub fn commands(&self) -> &[Command] {
        &self.commands
    }
}

#[derive(Clone, Debug, Default)]
pub(crate) struct History {
    entries: VecDeque<Entry>,
    cursor: usize,
    limit: Option<NonZeroUsize>,
}
impl History {
    pub fn new(limit: Option<NonZeroUsize>) -> Self {
        Self {
            entries: VecDeque::new(),
            cursor: 0,
            limit,
        }
    }
    /// Record a new entry at the cursor, discarding everything that could have been redone.
    pub fn push(&mut self, entry: Entry) {
        let pruned = self.entries.len() - self.cursor;
        if pruned != 0 {
            log::debug!("discarding {pruned} redo entries");
        }
        self.entries.truncate(self.cursor);
        self.entries.push_back(entry);
        self.cursor += 1;
        if let Some(limit) = self.limit {
            while self.entries.len() > limit.get() {
                self.entries.pop_front();
                self.cursor -= 1;
            }
        }
    }
    /// The entry undo would revert.
    pub fn peek_undo(&self) -> Option<&Entry> {
        self.cursor.checked_sub(1).and_then(|idx| self.entries.get(idx))
    }
    /// The entry redo would reapply.
    pub fn peek_redo(&self) -> Option<&Entry> {
        self.entries.get(self.cursor)
    }
    /// Move the cursor back over the entry returned by [`Self::peek_undo`].
    pub fn step_back(&mut self) {
        self.cursor = self.cursor.saturating_sub(1);
    }
    /// Move the cursor forward over the entry returned by [`Self::peek_redo`].
    pub fn step_forward(&mut self) {
        self.cursor = (self.cursor + 1).min(self.entries.len());
    }
    pub fn clear(&mut self) {
        self.entries.clear();
        self.cursor = 0;
    }
    pub fn summary(&self) -> HistorySummary {
        HistorySummary {
            entries: self
                .entries
                .iter()
                .map(|entry| entry.description.clone())
                .collect(),
            cursor: self.cursor,
        }
    }
}

/// A copy of the history's shape, for display. Only [`History`] builds these, so the cursor is always
/// within the entries.
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct HistorySummary {
    /// Descriptions, oldest first.
    entries: Vec<Arc<str>>,
    /// Number of entries currently applied.
    cursor: usize,
}
impl HistorySummary {
    /// Every description, oldest first.
    #[must_use]
    pub fn entries(&self) -> &[Arc<str>] {
        &self.entries
    }
    /// Number of entries currently applied.
    #[must_use]
    pub fn cursor(&self) -> usize {
        self.cursor
    }
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
    #[must_use]
    pub fn can_undo(&self) -> bool {
        self.cursor > 0
    }
    #[must_use]
    pub fn can_redo(&self) -> bool {
        self.cursor < self.entries.len()
    }
    #[must_use]
    pub fn undo_description(&self) -> Option<&str> {
        self.cursor
            .checked_sub(1)
            .and_then(|idx| self.entries.get(idx))
            .map(AsRef::as_ref)
    }
    #[must_use]
    pub fn redo_description(&self) -> Option<&str> {
        self.entries.get(self.cursor).map(AsRef::as_ref)
    }
    /// The applied entries, oldest first.
    pub fn applied(&self) -> impl Iterator<Item = &str> + '_ {
        self.entries[..self.cursor].iter().map(AsRef::as_ref)
    }
    /// The entries that could be redone, next first.
    pub fn redoable(&self) -> impl Iterator<Item = &str> + '_ {
        self.entries[self.cursor..].iter().map(AsRef::as_ref)
    }
}
