use crate::core::accumulator::Accumulator;
use crate::core::stats_db::{self, StatsDb};
use crate::models::Category;
use parking_lot::Mutex;
use std::sync::Arc;

/// Outcome of a single flush attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushOutcome {
    /// The batch committed and was subtracted from the in-memory table.
    Flushed,
    /// The table had nothing to persist.
    Empty,
    /// Another flush held the lock. The attempt is dropped, not queued; the
    /// accumulated counts ride along with the next trigger.
    Contended,
}

/// Transactional batch-merge of accumulator tables into the daily store.
///
/// The flush gate is coarse: at most one flush transaction is in flight
/// across all three categories. Acquisition never blocks; contended
/// attempts are skipped.
pub struct SyncEngine {
    db: StatsDb,
    accumulator: Arc<Accumulator>,
    flush_gate: Mutex<()>,
}

impl SyncEngine {
    pub fn new(db: StatsDb, accumulator: Arc<Accumulator>) -> Self {
        Self {
            db,
            accumulator,
            flush_gate: Mutex::new(()),
        }
    }

    pub fn db(&self) -> &StatsDb {
        &self.db
    }

    /// Merges the category's accumulated counts into today's rows.
    pub fn flush(&self, category: Category) -> Result<FlushOutcome, String> {
        self.flush_for_day(category, &stats_db::today_key())
    }

    pub(crate) fn flush_for_day(
        &self,
        category: Category,
        date_key: &str,
    ) -> Result<FlushOutcome, String> {
        let Some(_guard) = self.flush_gate.try_lock() else {
            return Ok(FlushOutcome::Contended);
        };

        let snapshot = self.accumulator.snapshot(category);
        if snapshot.is_empty() {
            return Ok(FlushOutcome::Empty);
        }

        // On error the transaction rolled back and the table is untouched,
        // so the same data is retried on the next trigger.
        self.db.apply_batch(category, date_key, &snapshot)?;

        self.accumulator.subtract(category, &snapshot);
        Ok(FlushOutcome::Flushed)
    }
}
