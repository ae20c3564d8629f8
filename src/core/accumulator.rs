use crate::models::Category;
use parking_lot::Mutex;
use std::collections::HashMap;

#[derive(Default)]
struct Table {
    counts: HashMap<String, u64>,
    /// Total presses accumulated since the last successful flush; this is
    /// the size the flush threshold is evaluated against.
    pending: u64,
}

/// In-memory counting tables, one per category. Entries accumulate between
/// flushes; a flush persists a snapshot of one table as a single unit and
/// never an entry at a time.
///
/// Each table has its own lock so recording into one category never waits
/// on a flush of another.
#[derive(Default)]
pub struct Accumulator {
    simple: Mutex<Table>,
    combination: Mutex<Table>,
    mouse: Mutex<Table>,
}

impl Accumulator {
    pub fn new() -> Self {
        Self::default()
    }

    fn table(&self, category: Category) -> &Mutex<Table> {
        match category {
            Category::Simple => &self.simple,
            Category::Combination => &self.combination,
            Category::Mouse => &self.mouse,
        }
    }

    /// Increments `identity` within `category` by one, creating the entry at
    /// count 1. Returns the table's accumulated press total after the
    /// increment so the caller can evaluate the flush threshold without
    /// re-locking.
    pub fn record(&self, category: Category, identity: &str) -> u64 {
        let mut table = self.table(category).lock();
        table
            .counts
            .entry(identity.to_string())
            .and_modify(|count| *count = count.saturating_add(1))
            .or_insert(1);
        table.pending = table.pending.saturating_add(1);
        table.pending
    }

    /// Presses accumulated since the last successful flush.
    pub fn pending(&self, category: Category) -> u64 {
        self.table(category).lock().pending
    }

    pub fn is_empty(&self, category: Category) -> bool {
        self.table(category).lock().counts.is_empty()
    }

    /// Clones the table's current contents. The snapshot is what a flush
    /// persists; the live table keeps accepting records while the snapshot
    /// is in flight.
    pub fn snapshot(&self, category: Category) -> HashMap<String, u64> {
        self.table(category).lock().counts.clone()
    }

    /// Removes a successfully flushed snapshot from the live table. Only the
    /// snapshotted amounts are subtracted; records that landed after the
    /// snapshot was taken stay queued for the next flush.
    pub fn subtract(&self, category: Category, flushed: &HashMap<String, u64>) {
        let mut table = self.table(category).lock();
        for (identity, flushed_count) in flushed {
            let Some(current) = table.counts.get_mut(identity) else {
                continue;
            };
            let taken = (*current).min(*flushed_count);
            *current -= taken;
            if *current == 0 {
                table.counts.remove(identity);
            }
            table.pending = table.pending.saturating_sub(taken);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn count_equals_records_since_last_flush() {
        let acc = Accumulator::new();
        for _ in 0..3 {
            acc.record(Category::Simple, "A");
        }
        acc.record(Category::Simple, "B");

        let snapshot = acc.snapshot(Category::Simple);
        assert_eq!(snapshot.get("A").copied(), Some(3));
        assert_eq!(snapshot.get("B").copied(), Some(1));
    }

    #[test]
    fn record_reports_accumulated_total_after_increment() {
        let acc = Accumulator::new();
        assert_eq!(acc.record(Category::Simple, "A"), 1);
        assert_eq!(acc.record(Category::Simple, "A"), 2);
        assert_eq!(acc.record(Category::Simple, "B"), 3);
        assert_eq!(acc.pending(Category::Simple), 3);
    }

    #[test]
    fn categories_are_independent() {
        let acc = Accumulator::new();
        acc.record(Category::Simple, "A");
        acc.record(Category::Mouse, "MouseLeft");

        assert_eq!(acc.pending(Category::Simple), 1);
        assert_eq!(acc.pending(Category::Mouse), 1);
        assert!(acc.is_empty(Category::Combination));
    }

    #[test]
    fn subtract_preserves_records_made_after_snapshot() {
        let acc = Accumulator::new();
        acc.record(Category::Simple, "A");
        acc.record(Category::Simple, "A");
        acc.record(Category::Simple, "B");

        let snapshot = acc.snapshot(Category::Simple);

        // Lands between snapshot and commit.
        acc.record(Category::Simple, "A");
        acc.record(Category::Simple, "C");

        acc.subtract(Category::Simple, &snapshot);

        let rest = acc.snapshot(Category::Simple);
        assert_eq!(rest.get("A").copied(), Some(1));
        assert_eq!(rest.get("B").copied(), None);
        assert_eq!(rest.get("C").copied(), Some(1));
        assert_eq!(acc.pending(Category::Simple), 2);
    }

    #[test]
    fn subtract_of_full_snapshot_empties_table() {
        let acc = Accumulator::new();
        acc.record(Category::Combination, "Ctrl+C");
        let snapshot = acc.snapshot(Category::Combination);
        acc.subtract(Category::Combination, &snapshot);
        assert!(acc.is_empty(Category::Combination));
        assert_eq!(acc.pending(Category::Combination), 0);
    }
}
