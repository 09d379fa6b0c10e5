//! Pending-change queue
//!
//! An insertion-ordered store of changes waiting to be applied to the
//! sheet. Cell entries are keyed by their target reference; a chart
//! payload lives under its own key so both kinds travel through the same
//! queue without sharing a string namespace.

use indexmap::IndexMap;
use magic_sheets_chart::ChartSpecification;

use crate::error::Result;
use crate::update::CellUpdate;

/// Key of a queue entry
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum QueueKey {
    /// Raw cell reference, validated only when applied
    Cell(String),
    /// The single chart slot
    Chart,
}

/// Payload of a queue entry
#[derive(Debug, Clone, PartialEq)]
pub enum QueuePayload {
    /// Formula or literal for a cell
    CellUpdate(String),
    /// JSON-serialized [`ChartSpecification`]
    Chart(String),
}

/// Ordered, deduplicating store of pending changes
#[derive(Debug, Clone, Default)]
pub struct PendingChangeQueue {
    entries: IndexMap<QueueKey, QueuePayload>,
}

impl PendingChangeQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite the entry for `target`
    ///
    /// Overwriting keeps the entry's original position.
    pub fn set<T: Into<String>, F: Into<String>>(&mut self, target: T, formula: F) {
        self.entries.insert(
            QueueKey::Cell(target.into()),
            QueuePayload::CellUpdate(formula.into()),
        );
    }

    /// [`set`](Self::set) every update in order
    pub fn set_many<'a, I>(&mut self, updates: I)
    where
        I: IntoIterator<Item = &'a CellUpdate>,
    {
        for update in updates {
            self.set(update.target.clone(), update.formula.clone());
        }
    }

    /// Remove the entry for one cell reference
    pub fn clear(&mut self, target: &str) -> Option<QueuePayload> {
        self.remove(&QueueKey::Cell(target.to_string()))
    }

    /// Serialize a chart into the chart slot
    pub fn set_chart(&mut self, spec: &ChartSpecification) -> Result<()> {
        let json = serde_json::to_string(spec)?;
        self.set_chart_json(json);
        Ok(())
    }

    /// Store an already-serialized chart payload
    pub fn set_chart_json<S: Into<String>>(&mut self, json: S) {
        self.entries
            .insert(QueueKey::Chart, QueuePayload::Chart(json.into()));
    }

    /// Remove a single entry
    pub fn remove(&mut self, key: &QueueKey) -> Option<QueuePayload> {
        self.entries.shift_remove(key)
    }

    /// Drop every entry
    pub fn reset(&mut self) {
        self.entries.clear();
    }

    pub fn get(&self, key: &QueueKey) -> Option<&QueuePayload> {
        self.entries.get(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (&QueueKey, &QueuePayload)> {
        self.entries.iter()
    }
}
