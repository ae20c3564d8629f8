pub mod accumulator;
pub mod classifier;
pub mod config;
pub mod event_log;
pub mod service;
pub mod stats_db;
pub mod sync_engine;

pub use service::StatsService;
pub use stats_db::{StatsDb, StorageError, StorageErrorCode};
pub use sync_engine::{FlushOutcome, SyncEngine};
