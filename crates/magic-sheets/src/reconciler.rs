//! Update reconciler
//!
//! Owns the pending-change queue and the sheet it drains into. Every queue
//! mutation made through the reconciler runs a pass immediately. Each entry
//! present at the start of a pass moves `Pending -> Applying -> Applied` or
//! `Pending -> Applying -> Failed`, and is removed from the queue either
//! way: a bad target or a malformed chart cannot succeed on retry.

use magic_sheets_chart::ChartSpecification;
use tracing::{debug, trace, warn};

use crate::error::Result;
use crate::queue::{PendingChangeQueue, QueueKey, QueuePayload};
use crate::sheet::Sheet;
use crate::update::CellUpdate;

/// Lifecycle of one queue entry within a pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryState {
    Pending,
    Applying,
    Applied,
    Failed { reason: String },
}

/// What one reconciliation pass did
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PassReport {
    /// Final state of every entry attempted, in queue order
    pub outcomes: Vec<(QueueKey, EntryState)>,
    /// Ids of charts placed during the pass
    pub charts: Vec<u64>,
}

impl PassReport {
    pub fn applied(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|(_, state)| *state == EntryState::Applied)
            .count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.applied()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }
}

/// Applies queued changes to the sheet
#[derive(Debug, Default)]
pub struct Reconciler {
    queue: PendingChangeQueue,
    sheet: Sheet,
}

impl Reconciler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_sheet(sheet: Sheet) -> Self {
        Self {
            queue: PendingChangeQueue::new(),
            sheet,
        }
    }

    pub fn queue(&self) -> &PendingChangeQueue {
        &self.queue
    }

    pub fn sheet(&self) -> &Sheet {
        &self.sheet
    }

    /// Direct sheet access for loads and chart management
    pub fn sheet_mut(&mut self) -> &mut Sheet {
        &mut self.sheet
    }

    /// Queue one cell assignment and reconcile
    pub fn set(&mut self, target: &str, formula: &str) -> PassReport {
        self.queue.set(target, formula);
        self.reconcile()
    }

    /// Queue a batch of cell assignments and reconcile
    pub fn set_many(&mut self, updates: &[CellUpdate]) -> PassReport {
        self.queue.set_many(updates);
        self.reconcile()
    }

    /// Queue a chart and reconcile
    pub fn set_chart(&mut self, spec: &ChartSpecification) -> Result<PassReport> {
        self.queue.set_chart(spec)?;
        Ok(self.reconcile())
    }

    /// Queue a serialized chart payload and reconcile
    pub fn set_chart_json(&mut self, json: &str) -> PassReport {
        self.queue.set_chart_json(json);
        self.reconcile()
    }

    /// Attempt every entry currently in the queue
    pub fn reconcile(&mut self) -> PassReport {
        let entries: Vec<(QueueKey, QueuePayload)> = self
            .queue
            .iter()
            .map(|(key, payload)| (key.clone(), payload.clone()))
            .collect();

        let mut report = PassReport::default();
        let mut cells_applied = false;

        for (key, payload) in entries {
            let mut state = EntryState::Pending;
            trace!(?key, ?state, "entry queued");
            state = EntryState::Applying;
            trace!(?key, ?state, "applying entry");

            state = match payload {
                QueuePayload::Chart(json) => match self.apply_chart(&json) {
                    Ok(id) => {
                        report.charts.push(id);
                        EntryState::Applied
                    }
                    Err(reason) => EntryState::Failed { reason },
                },
                QueuePayload::CellUpdate(formula) => {
                    let target = match &key {
                        QueueKey::Cell(target) => target.as_str(),
                        QueueKey::Chart => "chart",
                    };
                    match self.sheet.apply(target, &formula) {
                        Ok(addr) => {
                            trace!(cell = %addr, formula = %formula, "cell applied");
                            cells_applied = true;
                            EntryState::Applied
                        }
                        Err(err) => {
                            warn!(cell = target, error = %err, "skipping queued update");
                            EntryState::Failed {
                                reason: err.to_string(),
                            }
                        }
                    }
                }
            };

            self.queue.remove(&key);
            report.outcomes.push((key, state));
        }

        if cells_applied {
            self.sheet.refresh();
        }

        if !report.is_empty() {
            debug!(
                applied = report.applied(),
                failed = report.failed(),
                charts = report.charts.len(),
                "reconciliation pass finished"
            );
        }

        report
    }

    fn apply_chart(&mut self, json: &str) -> std::result::Result<u64, String> {
        let spec: ChartSpecification = serde_json::from_str(json).map_err(|err| {
            warn!(error = %err, "dropping malformed chart payload");
            err.to_string()
        })?;

        match self.sheet.place_chart(spec) {
            Ok(placed) => {
                debug!(id = placed.id, title = %placed.spec.title, "chart placed");
                Ok(placed.id)
            }
            Err(err) => {
                warn!(error = %err, "dropping invalid chart");
                Err(err.to_string())
            }
        }
    }

    /// Drop pending entries and clear the sheet
    pub fn reset(&mut self) {
        self.queue.reset();
        self.sheet.clear();
    }
}
