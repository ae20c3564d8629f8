use crate::models::{Category, DailyTotals};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OpenFlags};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageErrorCode {
    OpenFailed,
    MigrateFailed,
}

/// Reported to the shell layer when the persistence path is unavailable and
/// the service is running in degraded (memory-only) mode.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageError {
    pub code: StorageErrorCode,
    pub message: String,
}

fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}

/// The current local calendar day as `YYYY-MM-DD`, the key every persistent
/// counter is bucketed under.
pub fn today_key() -> String {
    chrono::Local::now().date_naive().to_string()
}

fn table_name(category: Category) -> &'static str {
    match category {
        Category::Simple => "daily_key_counts",
        Category::Combination => "daily_shortcut_counts",
        Category::Mouse => "daily_mouse_button_counts",
    }
}

fn key_column(category: Category) -> &'static str {
    match category {
        Category::Simple => "key",
        Category::Combination => "shortcut",
        Category::Mouse => "button",
    }
}

fn open_write_conn(path: &Path) -> Result<Connection, String> {
    let conn = Connection::open(path).map_err(|e| format!("Failed to open sqlite db: {}", e))?;
    let _ = conn.busy_timeout(Duration::from_secs(2));
    conn.pragma_update(None, "journal_mode", "WAL")
        .map_err(|e| format!("Failed to set journal_mode=WAL: {}", e))?;
    conn.pragma_update(None, "synchronous", "NORMAL")
        .map_err(|e| format!("Failed to set synchronous=NORMAL: {}", e))?;
    conn.pragma_update(None, "temp_store", "MEMORY")
        .map_err(|e| format!("Failed to set temp_store=MEMORY: {}", e))?;
    Ok(conn)
}

fn open_read_conn(path: &Path) -> Result<Connection, String> {
    let conn = Connection::open_with_flags(path, OpenFlags::SQLITE_OPEN_READ_ONLY)
        .map_err(|e| format!("Failed to open sqlite db (read-only): {}", e))?;
    Ok(conn)
}

fn migrate(conn: &Connection) -> Result<(), String> {
    conn.execute_batch(
        r#"
CREATE TABLE IF NOT EXISTS daily_key_counts (
  date_key TEXT NOT NULL,
  key TEXT NOT NULL,
  count INTEGER NOT NULL,
  updated_at_ms INTEGER NOT NULL,
  PRIMARY KEY(date_key, key)
);
CREATE INDEX IF NOT EXISTS idx_daily_key_counts_date ON daily_key_counts(date_key);

CREATE TABLE IF NOT EXISTS daily_shortcut_counts (
  date_key TEXT NOT NULL,
  shortcut TEXT NOT NULL,
  count INTEGER NOT NULL,
  updated_at_ms INTEGER NOT NULL,
  PRIMARY KEY(date_key, shortcut)
);
CREATE INDEX IF NOT EXISTS idx_daily_shortcut_counts_date ON daily_shortcut_counts(date_key);

CREATE TABLE IF NOT EXISTS daily_mouse_button_counts (
  date_key TEXT NOT NULL,
  button TEXT NOT NULL,
  count INTEGER NOT NULL,
  updated_at_ms INTEGER NOT NULL,
  PRIMARY KEY(date_key, button)
);
CREATE INDEX IF NOT EXISTS idx_daily_mouse_button_counts_date ON daily_mouse_button_counts(date_key);
"#,
    )
    .map_err(|e| format!("Failed to migrate sqlite schema: {}", e))?;

    Ok(())
}

/// Handle over the persistent per-day counter store. One write connection,
/// guarded by a mutex; queries open short-lived read-only connections so a
/// long flush transaction never blocks reads.
pub struct StatsDb {
    path: PathBuf,
    write_conn: Mutex<Connection>,
}

impl StatsDb {
    pub fn open(path: &Path) -> Result<Self, StorageError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| StorageError {
                code: StorageErrorCode::OpenFailed,
                message: format!("Failed to create db dir {}: {}", parent.display(), e),
            })?;
        }

        let conn = open_write_conn(path).map_err(|message| StorageError {
            code: StorageErrorCode::OpenFailed,
            message,
        })?;
        migrate(&conn).map_err(|message| StorageError {
            code: StorageErrorCode::MigrateFailed,
            message,
        })?;

        Ok(Self {
            path: path.to_path_buf(),
            write_conn: Mutex::new(conn),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Merges one category's accumulated deltas into the rows for `date_key`
    /// in a single transaction. Either every delta is applied or none: any
    /// upsert failure rolls the whole batch back.
    pub fn apply_batch(
        &self,
        category: Category,
        date_key: &str,
        deltas: &HashMap<String, u64>,
    ) -> Result<(), String> {
        if deltas.is_empty() {
            return Ok(());
        }

        let table = table_name(category);
        let column = key_column(category);
        let mut conn = self.write_conn.lock();
        let tx = conn
            .transaction()
            .map_err(|e| format!("Failed to start sqlite transaction: {}", e))?;

        {
            let sql = format!(
                r#"
INSERT INTO {table}(date_key, {column}, count, updated_at_ms)
VALUES (?1, ?2, ?3, ?4)
ON CONFLICT(date_key, {column}) DO UPDATE SET
  count = count + excluded.count,
  updated_at_ms = excluded.updated_at_ms
"#
            );
            let mut stmt = tx
                .prepare(&sql)
                .map_err(|e| format!("Failed to prepare {} upsert: {}", table, e))?;

            for (identity, count) in deltas {
                if *count == 0 {
                    continue;
                }
                let identity = identity.trim();
                if identity.is_empty() {
                    continue;
                }
                stmt.execute(params![
                    date_key,
                    identity,
                    i64::try_from(*count).unwrap_or(i64::MAX),
                    now_ms()
                ])
                .map_err(|e| format!("Failed to upsert {}: {}", table, e))?;
            }
        }

        tx.commit()
            .map_err(|e| format!("Failed to commit sqlite transaction: {}", e))
    }

    /// All persisted counters for one category on one day.
    pub fn load_day_counts(
        &self,
        category: Category,
        date_key: &str,
    ) -> Result<HashMap<String, u64>, String> {
        let table = table_name(category);
        let column = key_column(category);
        let conn = open_read_conn(&self.path)?;
        let sql = format!("SELECT {column}, count FROM {table} WHERE date_key=?1");
        let mut stmt = conn
            .prepare(&sql)
            .map_err(|e| format!("Failed to prepare {} query: {}", table, e))?;

        let rows = stmt
            .query_map(params![date_key], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
            })
            .map_err(|e| format!("Failed to query {}: {}", table, e))?;

        let mut out = HashMap::new();
        for row in rows {
            let (identity, count) =
                row.map_err(|e| format!("Failed to read {} row: {}", table, e))?;
            let count_u64 = u64::try_from(count).unwrap_or(u64::MAX);
            if count_u64 == 0 {
                continue;
            }
            out.insert(identity, count_u64);
        }
        Ok(out)
    }

    /// Aggregated counters across all three categories for one day.
    /// `total_presses` sums simple-key counts only.
    pub fn load_totals(&self, date_key: &str) -> Result<DailyTotals, String> {
        let key_presses = self.load_day_counts(Category::Simple, date_key)?;
        let combination_presses = self.load_day_counts(Category::Combination, date_key)?;
        let mouse_presses = self.load_day_counts(Category::Mouse, date_key)?;
        let total_presses = key_presses.values().fold(0u64, |acc, v| acc.saturating_add(*v));

        Ok(DailyTotals {
            date_key: date_key.to_string(),
            key_presses,
            combination_presses,
            mouse_presses,
            total_presses,
        })
    }

    /// The day's most-pressed simple keys, highest count first.
    pub fn top_keys(&self, date_key: &str, limit: usize) -> Result<Vec<(String, u64)>, String> {
        let conn = open_read_conn(&self.path)?;
        let mut stmt = conn
            .prepare(
                r#"
SELECT key, count
FROM daily_key_counts
WHERE date_key=?1
ORDER BY count DESC, key ASC
LIMIT ?2
"#,
            )
            .map_err(|e| format!("Failed to prepare top keys query: {}", e))?;

        let rows = stmt
            .query_map(params![date_key, limit as i64], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
            })
            .map_err(|e| format!("Failed to query top keys: {}", e))?;

        let mut out = Vec::new();
        for row in rows {
            let (key, count) = row.map_err(|e| format!("Failed to read top keys row: {}", e))?;
            out.push((key, u64::try_from(count).unwrap_or(u64::MAX)));
        }
        Ok(out)
    }
}
