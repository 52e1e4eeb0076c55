//! Checklist model behind the topic picker.
//!
//! Every checked entry carries a process index. The indices in use always form
//! `1..=N`. Edits finish by running [`renumber`], which labels groups in the
//! order they first appear when scanning the checklist from the top, so the
//! labelling never depends on edit history. Restoring a saved selection only
//! closes gaps with [`compact`] and keeps the saved numbers otherwise.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChecklistEntry {
    pub topic: String,
    pub checked: bool,
    pub process_index: Option<u32>,
}

impl ChecklistEntry {
    fn unchecked(topic: &str) -> Self {
        Self {
            topic: topic.to_string(),
            checked: false,
            process_index: None,
        }
    }
}

/// On-disk form of one topic's selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedEntry {
    pub checked: bool,
    #[serde(default)]
    pub index: Option<u32>,
}

pub type PersistedSelection = BTreeMap<String, PersistedEntry>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Left,
    Right,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Checklist {
    entries: Vec<ChecklistEntry>,
}

impl Checklist {
    /// Builds the checklist for `catalog`, carrying over whatever the previous
    /// run persisted for topics that are still present.
    pub fn restore(catalog: &[String], persisted: &PersistedSelection) -> Self {
        let entries = catalog
            .iter()
            .map(|topic| match persisted.get(topic) {
                Some(saved) if saved.checked => ChecklistEntry {
                    topic: topic.clone(),
                    checked: true,
                    // Checked entries saved without an index share one group.
                    process_index: Some(
                        saved.index.filter(|index| *index > 0).unwrap_or(u32::MAX),
                    ),
                },
                _ => ChecklistEntry::unchecked(topic),
            })
            .collect();

        let checklist = Self {
            entries: compact(entries),
        };
        debug_assert!(
            is_contiguous(&checklist.entries),
            "process indices must stay contiguous"
        );
        checklist
    }

    pub fn entries(&self) -> &[ChecklistEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn checked_count(&self) -> usize {
        self.entries.iter().filter(|entry| entry.checked).count()
    }

    pub fn group_count(&self) -> u32 {
        self.max_index()
    }

    /// Flips the entry at `position`. Returns `false` when the position is out
    /// of range.
    pub fn toggle(&mut self, position: usize) -> bool {
        let next_index = self.max_index() + 1;
        let Some(entry) = self.entries.get_mut(position) else {
            return false;
        };

        if entry.checked {
            entry.checked = false;
            entry.process_index = None;
        } else {
            entry.checked = true;
            entry.process_index = Some(next_index);
        }

        self.renumber();
        true
    }

    /// Moves a checked entry into the neighbouring group. Returns `false` when
    /// nothing changed: unchecked entry, out of range, or already at the edge.
    pub fn shift_index(&mut self, position: usize, direction: Direction) -> bool {
        let groups = self.group_count();
        let Some(entry) = self.entries.get_mut(position) else {
            return false;
        };
        let Some(current) = entry.process_index.filter(|_| entry.checked) else {
            return false;
        };

        let target = match direction {
            Direction::Left if current > 1 => current - 1,
            Direction::Right if current < groups => current + 1,
            _ => return false,
        };

        entry.process_index = Some(target);
        self.renumber();
        true
    }

    pub fn renumber(&mut self) {
        self.entries = renumber(std::mem::take(&mut self.entries));
        debug_assert!(
            is_contiguous(&self.entries),
            "process indices must stay contiguous"
        );
    }

    pub fn to_persisted(&self) -> PersistedSelection {
        self.entries
            .iter()
            .map(|entry| {
                (
                    entry.topic.clone(),
                    PersistedEntry {
                        checked: entry.checked,
                        index: entry.process_index,
                    },
                )
            })
            .collect()
    }

    fn max_index(&self) -> u32 {
        self.entries
            .iter()
            .filter_map(|entry| entry.process_index)
            .max()
            .unwrap_or(0)
    }
}

/// Relabels the groups in use as `1..=N` in order of first appearance and
/// clears indices left on unchecked entries.
pub fn renumber(mut entries: Vec<ChecklistEntry>) -> Vec<ChecklistEntry> {
    let mut labels = HashMap::<u32, u32>::new();

    for entry in &mut entries {
        if !entry.checked {
            entry.process_index = None;
            continue;
        }

        let Some(raw) = entry.process_index else {
            continue;
        };
        let next_label = labels.len() as u32 + 1;
        let label = *labels.entry(raw).or_insert(next_label);
        entry.process_index = Some(label);
    }

    entries
}

/// Closes gaps between the indices in use while keeping their numeric order,
/// so `{2, 5}` becomes `{1, 2}` and an already contiguous mapping is returned
/// as is.
pub fn compact(mut entries: Vec<ChecklistEntry>) -> Vec<ChecklistEntry> {
    let mut in_use: Vec<u32> = entries
        .iter()
        .filter(|entry| entry.checked)
        .filter_map(|entry| entry.process_index)
        .collect();
    in_use.sort_unstable();
    in_use.dedup();

    for entry in &mut entries {
        if !entry.checked {
            entry.process_index = None;
            continue;
        }
        entry.process_index = entry
            .process_index
            .and_then(|raw| in_use.binary_search(&raw).ok())
            .map(|rank| rank as u32 + 1);
    }

    entries
}

/// `true` when every checked entry has an index, no unchecked entry has one,
/// and the indices in use are exactly `1..=N`.
pub fn is_contiguous(entries: &[ChecklistEntry]) -> bool {
    let mut seen = Vec::<u32>::new();
    for entry in entries {
        match (entry.checked, entry.process_index) {
            (true, Some(index)) => seen.push(index),
            (false, None) => {}
            _ => return false,
        }
    }

    seen.sort_unstable();
    seen.dedup();
    seen.iter()
        .enumerate()
        .all(|(position, index)| *index == position as u32 + 1)
}
