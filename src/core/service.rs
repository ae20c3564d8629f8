use crate::core::accumulator::Accumulator;
use crate::core::classifier;
use crate::core::event_log;
use crate::core::stats_db::{self, StatsDb, StorageError};
use crate::core::sync_engine::SyncEngine;
use crate::models::{Category, DailyTotals, InputSource, RawInput, Settings};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

enum Op {
    Event(RawInput),
    FlushAll,
}

/// The aggregation service: owns the accumulator, the sync engine and the
/// worker thread that consumes the event channel.
///
/// Construct one instance at process start and hand it to the hook adapter
/// and the shell layer; all state lives on the instance. Producers only
/// enqueue; classification, counting and flushing happen on the worker, so
/// `handle_key_press`/`handle_mouse_event` never block on I/O.
pub struct StatsService {
    tx: Sender<Op>,
    worker: JoinHandle<()>,
    engine: Option<Arc<SyncEngine>>,
    storage_error: Option<StorageError>,
    enable_keyboard: AtomicBool,
    enable_mouse: AtomicBool,
    log_dir: PathBuf,
}

impl StatsService {
    /// Brings the service up. A failed store open is not fatal: the service
    /// keeps accumulating in memory (degraded mode) and reports the failure
    /// through `storage_error`.
    pub fn start(settings: Settings, db_path: &Path, log_dir: &Path) -> Self {
        let accumulator = Arc::new(Accumulator::new());
        let (engine, storage_error) = match StatsDb::open(db_path) {
            Ok(db) => (
                Some(Arc::new(SyncEngine::new(db, Arc::clone(&accumulator)))),
                None,
            ),
            Err(e) => {
                let _ = event_log::error_with(
                    log_dir,
                    "storage",
                    "store unavailable; accumulating in memory only",
                    serde_json::json!({ "error": e.message }),
                );
                (None, Some(e))
            }
        };

        let (tx, rx) = mpsc::channel::<Op>();
        let worker = {
            let accumulator = Arc::clone(&accumulator);
            let engine = engine.clone();
            let log_dir = log_dir.to_path_buf();
            let threshold = settings.flush_threshold.max(1) as u64;
            let interval = Duration::from_secs(settings.flush_interval_secs.max(1));
            thread::spawn(move || {
                run_worker(rx, accumulator, engine, log_dir, threshold, interval)
            })
        };

        Self {
            tx,
            worker,
            engine,
            storage_error,
            enable_keyboard: AtomicBool::new(settings.enable_keyboard),
            enable_mouse: AtomicBool::new(settings.enable_mouse),
            log_dir: log_dir.to_path_buf(),
        }
    }

    /// Fire-and-forget: classifies the identity as simple key or combination
    /// and counts it. Safe to call at keystroke rate.
    pub fn handle_key_press(&self, identity: &str) {
        if !self.enable_keyboard.load(Ordering::SeqCst) {
            return;
        }
        let _ = self.tx.send(Op::Event(RawInput {
            name: identity.to_string(),
            source: InputSource::Keyboard,
        }));
    }

    /// Fire-and-forget: counts a mouse-button press.
    pub fn handle_mouse_event(&self, identity: &str) {
        if !self.enable_mouse.load(Ordering::SeqCst) {
            return;
        }
        let _ = self.tx.send(Op::Event(RawInput {
            name: identity.to_string(),
            source: InputSource::Mouse,
        }));
    }

    /// Entry point for the hook adapter's decoded events.
    pub fn on_event(&self, event: RawInput) {
        match event.source {
            InputSource::Keyboard => self.handle_key_press(&event.name),
            InputSource::Mouse => self.handle_mouse_event(&event.name),
        }
    }

    /// Requests a flush attempt of every non-empty table. Subject to the
    /// same flush-lock skip as threshold and timer triggers.
    pub fn flush_now(&self) {
        let _ = self.tx.send(Op::FlushAll);
    }

    pub fn set_counting_enabled(&self, keyboard: bool, mouse: bool) {
        self.enable_keyboard.store(keyboard, Ordering::SeqCst);
        self.enable_mouse.store(mouse, Ordering::SeqCst);
    }

    pub fn counting_enabled(&self) -> (bool, bool) {
        (
            self.enable_keyboard.load(Ordering::SeqCst),
            self.enable_mouse.load(Ordering::SeqCst),
        )
    }

    /// Degraded-mode signal: set when the store could not be opened at
    /// startup, `None` when persistence is healthy.
    pub fn storage_error(&self) -> Option<StorageError> {
        self.storage_error.clone()
    }

    fn engine(&self) -> Result<&SyncEngine, String> {
        self.engine
            .as_deref()
            .ok_or_else(|| "stats db not available".to_string())
    }

    /// Today's persisted totals. Bypasses the in-memory tables: counts not
    /// yet flushed are not reflected.
    pub fn daily_totals(&self) -> Result<DailyTotals, String> {
        self.engine()?.db().load_totals(&stats_db::today_key())
    }

    pub fn totals_for_day(&self, date_key: &str) -> Result<DailyTotals, String> {
        self.engine()?.db().load_totals(date_key)
    }

    /// Today's most-pressed simple keys, highest count first.
    pub fn top_keys(&self, limit: usize) -> Result<Vec<(String, u64)>, String> {
        self.engine()?.db().top_keys(&stats_db::today_key(), limit)
    }

    /// Stops the worker after a final best-effort flush and releases the
    /// store. Counts that cannot be flushed at this point are lost, which is
    /// accepted for abrupt process exits as well.
    pub fn shutdown(self) {
        let StatsService {
            tx,
            worker,
            log_dir,
            ..
        } = self;
        drop(tx);
        let _ = worker.join();
        let _ = event_log::info(&log_dir, "service", "shutdown complete");
    }
}

fn run_worker(
    rx: mpsc::Receiver<Op>,
    accumulator: Arc<Accumulator>,
    engine: Option<Arc<SyncEngine>>,
    log_dir: PathBuf,
    threshold: u64,
    interval: Duration,
) {
    let mut next_tick = Instant::now() + interval;

    loop {
        let timeout = next_tick.saturating_duration_since(Instant::now());
        match rx.recv_timeout(timeout) {
            Ok(Op::Event(event)) => {
                let category = match event.source {
                    InputSource::Mouse => Category::Mouse,
                    InputSource::Keyboard => classifier::classify(&event.name),
                };
                let size = accumulator.record(category, &event.name);
                if size >= threshold {
                    flush_category(engine.as_deref(), &log_dir, category);
                }
            }
            Ok(Op::FlushAll) => {
                flush_non_empty(engine.as_deref(), &accumulator, &log_dir);
            }
            Err(RecvTimeoutError::Timeout) => {
                flush_non_empty(engine.as_deref(), &accumulator, &log_dir);
                next_tick = Instant::now() + interval;
            }
            Err(RecvTimeoutError::Disconnected) => {
                // Shutdown path: drain what is left before exiting.
                flush_non_empty(engine.as_deref(), &accumulator, &log_dir);
                return;
            }
        }
    }
}

fn flush_non_empty(engine: Option<&SyncEngine>, accumulator: &Accumulator, log_dir: &Path) {
    for category in Category::ALL {
        if !accumulator.is_empty(category) {
            flush_category(engine, log_dir, category);
        }
    }
}

fn flush_category(engine: Option<&SyncEngine>, log_dir: &Path, category: Category) {
    // Degraded mode: nothing to sync into, counts stay in memory.
    let Some(engine) = engine else {
        return;
    };

    if let Err(e) = engine.flush(category) {
        let _ = event_log::error_with(
            log_dir,
            "sync",
            "flush failed; counts kept in memory for retry",
            serde_json::json!({ "category": category, "error": e }),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn settings_with(threshold: usize, interval_secs: u64) -> Settings {
        Settings {
            flush_threshold: threshold,
            flush_interval_secs: interval_secs,
            ..Settings::default()
        }
    }

    #[test]
    fn events_are_classified_counted_and_flushed_on_shutdown() {
        let dir = tempfile::tempdir().expect("tempdir");
        let db_path = dir.path().join("stats.db");

        // Threshold high enough that only the shutdown flush persists.
        let service = StatsService::start(settings_with(100, 3600), &db_path, dir.path());
        for _ in 0..3 {
            service.handle_key_press("A");
        }
        service.handle_key_press("Ctrl+C");
        service.handle_mouse_event("MouseLeft");
        service.shutdown();

        let db = StatsDb::open(&db_path).expect("reopen db");
        let totals = db.load_totals(&stats_db::today_key()).expect("totals");
        assert_eq!(totals.key_presses.get("A").copied(), Some(3));
        assert_eq!(totals.combination_presses.get("Ctrl+C").copied(), Some(1));
        assert_eq!(totals.mouse_presses.get("MouseLeft").copied(), Some(1));
        assert_eq!(totals.total_presses, 3);
    }

    #[test]
    fn reaching_the_threshold_flushes_without_waiting_for_the_timer() {
        let dir = tempfile::tempdir().expect("tempdir");
        let db_path = dir.path().join("stats.db");

        let service = StatsService::start(settings_with(2, 3600), &db_path, dir.path());
        service.handle_key_press("A");
        service.handle_key_press("B");

        // The worker flushes as soon as it counts the second press.
        let deadline = Instant::now() + Duration::from_secs(5);
        let db = StatsDb::open(&db_path).expect("open db");
        let persisted = loop {
            let counts = db
                .load_day_counts(Category::Simple, &stats_db::today_key())
                .expect("load");
            if counts.len() == 2 {
                break counts;
            }
            assert!(Instant::now() < deadline, "threshold flush never landed");
            thread::sleep(Duration::from_millis(10));
        };
        assert_eq!(persisted.get("A").copied(), Some(1));
        assert_eq!(persisted.get("B").copied(), Some(1));

        service.shutdown();
    }

    #[test]
    fn disabled_sources_are_dropped_at_the_door() {
        let dir = tempfile::tempdir().expect("tempdir");
        let db_path = dir.path().join("stats.db");

        let service = StatsService::start(settings_with(100, 3600), &db_path, dir.path());
        service.set_counting_enabled(false, true);
        service.handle_key_press("A");
        service.handle_mouse_event("MouseRight");
        service.shutdown();

        let db = StatsDb::open(&db_path).expect("reopen db");
        let totals = db.load_totals(&stats_db::today_key()).expect("totals");
        assert!(totals.key_presses.is_empty());
        assert_eq!(totals.mouse_presses.get("MouseRight").copied(), Some(1));
    }

    #[test]
    fn store_open_failure_degrades_instead_of_crashing() {
        let dir = tempfile::tempdir().expect("tempdir");
        // A plain file where the db's parent directory should be makes the
        // open fail.
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, b"not a directory").expect("write blocker");
        let db_path = blocker.join("stats.db");

        let service = StatsService::start(settings_with(2, 3600), &db_path, dir.path());
        assert!(service.storage_error().is_some());

        // Recording still works; queries fail instead of pretending zeros.
        service.handle_key_press("A");
        service.handle_key_press("B");
        service.flush_now();
        assert!(service.daily_totals().is_err());
        assert!(service.top_keys(5).is_err());

        service.shutdown();
    }

    #[test]
    fn totals_for_day_reads_an_explicit_bucket() {
        let dir = tempfile::tempdir().expect("tempdir");
        let db_path = dir.path().join("stats.db");

        {
            let db = StatsDb::open(&db_path).expect("seed db");
            let mut deltas = HashMap::new();
            deltas.insert("A".to_string(), 2u64);
            db.apply_batch(Category::Simple, "2026-08-01", &deltas)
                .expect("seed batch");
        }

        let service = StatsService::start(Settings::default(), &db_path, dir.path());
        let totals = service.totals_for_day("2026-08-01").expect("totals");
        assert_eq!(totals.key_presses.get("A").copied(), Some(2));
        assert_eq!(totals.total_presses, 2);

        let other = service.totals_for_day("2026-08-02").expect("empty day");
        assert_eq!(other.total_presses, 0);

        service.shutdown();
    }
}
