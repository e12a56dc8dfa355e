//! Per-file result slots and the per-category slot store.
//!
//! A batch of uploaded files produces one slot per file, in file order. Each
//! slot loads independently and transitions exactly once from `Loading` to
//! `Ready` or `Failed`. Collections are replaced wholesale when a new batch
//! starts; writes carry the generation they were dispatched under so a late
//! response from a superseded batch can never touch the current collection.

use std::collections::HashMap;

use serde_json::Value;
use tracing::{debug, warn};

/// One table row: column name to scalar cell value. Missing keys and JSON
/// nulls are both treated as empty cells by the query pipeline.
pub type Row = HashMap<String, Value>;

/// Parsed table contents for a successfully processed file.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TableData {
    /// Column names in source order, unique.
    pub columns: Vec<String>,
    pub rows: Vec<Row>,
    /// Row count reported by the service; may exceed `rows.len()` when the
    /// service returns a preview subset.
    pub total_rows: usize,
}

/// Lifecycle of a single upload slot. Terminal states carry either the table
/// data or an error message, never both.
#[derive(Clone, Debug, PartialEq)]
pub enum SlotState {
    Loading,
    Ready(TableData),
    Failed(String),
}

/// One file's upload result, addressed by its stable index within a batch.
#[derive(Clone, Debug, PartialEq)]
pub struct ResultSlot {
    pub filename: String,
    pub state: SlotState,
}

impl ResultSlot {
    fn loading(filename: String) -> Self {
        Self {
            filename,
            state: SlotState::Loading,
        }
    }

    pub fn is_loading(&self) -> bool {
        matches!(self.state, SlotState::Loading)
    }

    pub fn data(&self) -> Option<&TableData> {
        match &self.state {
            SlotState::Ready(data) => Some(data),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match &self.state {
            SlotState::Failed(msg) => Some(msg),
            _ => None,
        }
    }
}

/// Ordered slots for one category plus the selected index.
#[derive(Clone, Debug, Default)]
pub struct SlotCollection {
    slots: Vec<ResultSlot>,
    selected: usize,
    generation: u64,
}

impl SlotCollection {
    pub fn slots(&self) -> &[ResultSlot] {
        &self.slots
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Selected index, clamped to the collection; `None` when empty.
    pub fn selected(&self) -> Option<usize> {
        if self.slots.is_empty() {
            None
        } else {
            Some(self.selected.min(self.slots.len() - 1))
        }
    }

    pub fn selected_slot(&self) -> Option<&ResultSlot> {
        self.selected().and_then(|i| self.slots.get(i))
    }
}

/// Holds one `SlotCollection` per upload category. All mutation goes through
/// the store so the generation guard is never bypassed.
#[derive(Debug, Default)]
pub struct SlotStore {
    collections: HashMap<String, SlotCollection>,
    next_generation: u64,
}

impl SlotStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn collection(&self, category: &str) -> Option<&SlotCollection> {
        self.collections.get(category)
    }

    /// True iff the category has any slots, regardless of per-slot status.
    pub fn has_results(&self, category: &str) -> bool {
        self.collections
            .get(category)
            .is_some_and(|c| !c.is_empty())
    }

    /// Replace the category's collection with `filenames.len()` loading slots
    /// and reset the selection. Returns the new generation; results from the
    /// batch must be applied under it.
    pub fn begin_batch(&mut self, category: &str, filenames: Vec<String>) -> u64 {
        self.next_generation += 1;
        let generation = self.next_generation;
        let slots = filenames.into_iter().map(ResultSlot::loading).collect();
        self.collections.insert(
            category.to_string(),
            SlotCollection {
                slots,
                selected: 0,
                generation,
            },
        );
        debug!(category, generation, "batch started");
        generation
    }

    /// Write a terminal state into the slot at `index`. The write is dropped
    /// (returning false) when the generation is stale, the index no longer
    /// exists, or the slot already reached a terminal state.
    pub fn apply_result(
        &mut self,
        category: &str,
        generation: u64,
        index: usize,
        state: SlotState,
    ) -> bool {
        let Some(collection) = self.collections.get_mut(category) else {
            warn!(category, generation, index, "result for missing collection dropped");
            return false;
        };
        if collection.generation != generation {
            warn!(
                category,
                generation,
                current = collection.generation,
                index,
                "stale-generation result dropped"
            );
            return false;
        }
        let Some(slot) = collection.slots.get_mut(index) else {
            warn!(category, generation, index, "result for out-of-range slot dropped");
            return false;
        };
        if !slot.is_loading() {
            warn!(category, index, "duplicate result for terminal slot dropped");
            return false;
        }
        slot.state = state;
        debug!(category, index, "slot resolved");
        true
    }

    /// Clamps silently; selecting into an empty collection is a no-op.
    pub fn set_selected(&mut self, category: &str, index: usize) {
        if let Some(collection) = self.collections.get_mut(category) {
            if !collection.slots.is_empty() {
                collection.selected = index.min(collection.slots.len() - 1);
            }
        }
    }

    /// Empty the category's collection and clear its selection.
    pub fn reset(&mut self, category: &str) {
        self.collections.remove(category);
        debug!(category, "collection reset");
    }
}
