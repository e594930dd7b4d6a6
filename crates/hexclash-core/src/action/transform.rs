//! Identity-preserving edits on action lists.
//!
//! Every helper returns `None` when nothing changed, so a chain of card-text
//! rules can tell "no effect applied" apart from "rebuilt the same list"
//! without comparing entries.

use super::{is_bracketed, label_is, normalize_label, wrap_label, ActionEntry, RotationSource};

/// A partial update to an entry. Unset fields are left alone.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntryPatch {
    /// New label.
    pub action: Option<String>,
    /// New rotation label.
    pub rotation: Option<String>,
    /// New rotation source (`Some(None)` clears it).
    pub rotation_source: Option<Option<RotationSource>>,
    /// New priority.
    pub priority: Option<i32>,
    /// New damage.
    pub damage: Option<i32>,
    /// New knockback factor.
    pub kbf: Option<i32>,
}

impl EntryPatch {
    /// An empty patch.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the label.
    #[must_use]
    pub fn action(mut self, action: impl Into<String>) -> Self {
        self.action = Some(action.into());
        self
    }

    /// Sets the rotation and its source.
    #[must_use]
    pub fn rotation(mut self, rotation: impl Into<String>, source: Option<RotationSource>) -> Self {
        self.rotation = Some(rotation.into());
        self.rotation_source = Some(source);
        self
    }

    /// Sets only the rotation label.
    #[must_use]
    pub fn rotation_label(mut self, rotation: impl Into<String>) -> Self {
        self.rotation = Some(rotation.into());
        self
    }

    /// Sets the priority.
    #[must_use]
    pub fn priority(mut self, priority: i32) -> Self {
        self.priority = Some(priority);
        self
    }

    /// Sets damage and knockback factor.
    #[must_use]
    pub fn attack(mut self, damage: i32, kbf: i32) -> Self {
        self.damage = Some(damage);
        self.kbf = Some(kbf);
        self
    }

    /// Sets the knockback factor.
    #[must_use]
    pub fn kbf(mut self, kbf: i32) -> Self {
        self.kbf = Some(kbf);
        self
    }

    /// Applies the patch, returning `None` if every field already matches.
    #[must_use]
    pub fn apply(&self, entry: &ActionEntry) -> Option<ActionEntry> {
        let unchanged = self.action.as_ref().map_or(true, |v| *v == entry.action)
            && self.rotation.as_ref().map_or(true, |v| *v == entry.rotation)
            && self.rotation_source.map_or(true, |v| v == entry.rotation_source)
            && self.priority.map_or(true, |v| v == entry.priority)
            && self.damage.map_or(true, |v| v == entry.damage)
            && self.kbf.map_or(true, |v| v == entry.kbf);
        if unchanged {
            return None;
        }
        let mut next = entry.clone();
        if let Some(action) = &self.action {
            next.action.clone_from(action);
        }
        if let Some(rotation) = &self.rotation {
            next.rotation.clone_from(rotation);
        }
        if let Some(source) = self.rotation_source {
            next.rotation_source = source;
        }
        if let Some(priority) = self.priority {
            next.priority = priority;
        }
        if let Some(damage) = self.damage {
            next.damage = damage;
        }
        if let Some(kbf) = self.kbf {
            next.kbf = kbf;
        }
        Some(next)
    }
}

/// Maps every entry; returns a new list only if some entry changed.
pub fn map_entries<F>(list: &[ActionEntry], mut mapper: F) -> Option<Vec<ActionEntry>>
where
    F: FnMut(usize, &ActionEntry) -> Option<ActionEntry>,
{
    let mut changed: Option<Vec<ActionEntry>> = None;
    for (index, entry) in list.iter().enumerate() {
        if let Some(updated) = mapper(index, entry) {
            changed.get_or_insert_with(|| list[..index].to_vec()).push(updated);
        } else if let Some(next) = changed.as_mut() {
            next.push(entry.clone());
        }
    }
    changed
}

/// Applies `mapper` to the entries at `indices` only.
pub fn update_entries<F>(list: &[ActionEntry], indices: &[usize], mut mapper: F) -> Option<Vec<ActionEntry>>
where
    F: FnMut(&ActionEntry) -> Option<ActionEntry>,
{
    if indices.is_empty() {
        return None;
    }
    map_entries(list, |index, entry| {
        if indices.contains(&index) {
            mapper(entry)
        } else {
            None
        }
    })
}

/// Replaces an entry's label, keeping its bracket marking, and applies `patch`.
#[must_use]
pub fn replace_label(entry: &ActionEntry, label: &str, patch: &EntryPatch) -> Option<ActionEntry> {
    let action = wrap_label(label, is_bracketed(&entry.action));
    patch.clone().action(action).apply(entry)
}

/// Replaces every entry whose label is `label`.
#[must_use]
pub fn replace_all(list: &[ActionEntry], label: &str, next: &str, patch: &EntryPatch) -> Option<Vec<ActionEntry>> {
    map_entries(list, |_, entry| {
        label_is(&entry.action, label)
            .then(|| replace_label(entry, next, patch))
            .flatten()
    })
}

/// Replaces the first entry whose label is `label`.
#[must_use]
pub fn replace_first(list: &[ActionEntry], label: &str, next: &str, patch: &EntryPatch) -> Option<Vec<ActionEntry>> {
    let index = list.iter().position(|entry| label_is(&entry.action, label))?;
    update_entries(list, &[index], |entry| replace_label(entry, next, patch))
}

/// Replaces the last entry whose label is `label`.
#[must_use]
pub fn replace_last(list: &[ActionEntry], label: &str, next: &str, patch: &EntryPatch) -> Option<Vec<ActionEntry>> {
    let index = list.iter().rposition(|entry| label_is(&entry.action, label))?;
    update_entries(list, &[index], |entry| replace_label(entry, next, patch))
}

/// Indices of bracketed entries.
#[must_use]
pub fn bracketed_indices(list: &[ActionEntry]) -> Vec<usize> {
    list.iter()
        .enumerate()
        .filter(|(_, entry)| entry.is_bracketed())
        .map(|(index, _)| index)
        .collect()
}

/// Returns true if the normalized label ends with `suffix`, ignoring case.
#[must_use]
pub fn label_ends_with(action: &str, suffix: char) -> bool {
    normalize_label(action)
        .chars()
        .last()
        .is_some_and(|last| last.eq_ignore_ascii_case(&suffix))
}
