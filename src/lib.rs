pub mod core;
pub mod models;

pub use crate::core::{FlushOutcome, StatsService, StorageError, StorageErrorCode};
pub use crate::models::{Category, DailyTotals, InputSource, RawInput, Settings};
