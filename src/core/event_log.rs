use chrono::Utc;
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

const LOG_FILE_NAME: &str = "keytally.log.jsonl";
const MAX_LOG_BYTES: u64 = 5 * 1024 * 1024;
const MAX_ROTATIONS: usize = 3;

static LOG_LOCK: Lazy<Mutex<()>> = Lazy::new(|| Mutex::new(()));

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogRecord {
    pub ts_ms: i64,
    pub level: String,
    pub scope: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

fn log_path(dir: &Path) -> PathBuf {
    dir.join(LOG_FILE_NAME)
}

fn rotated_path(dir: &Path, index: usize) -> PathBuf {
    dir.join(format!("keytally.log.{}.jsonl", index))
}

fn rotate_if_needed(dir: &Path) -> Result<(), String> {
    let path = log_path(dir);
    let Ok(meta) = fs::metadata(&path) else {
        return Ok(());
    };
    if meta.len() < MAX_LOG_BYTES {
        return Ok(());
    }

    let oldest = rotated_path(dir, MAX_ROTATIONS);
    if oldest.exists() {
        fs::remove_file(&oldest)
            .map_err(|e| format!("Failed to remove old log {}: {}", oldest.display(), e))?;
    }

    for i in (1..MAX_ROTATIONS).rev() {
        let src = rotated_path(dir, i);
        let dst = rotated_path(dir, i + 1);
        if src.exists() {
            fs::rename(&src, &dst).map_err(|e| {
                format!(
                    "Failed to rotate log ({} -> {}): {}",
                    src.display(),
                    dst.display(),
                    e
                )
            })?;
        }
    }

    let first = rotated_path(dir, 1);
    fs::rename(&path, &first).map_err(|e| {
        format!(
            "Failed to rotate log ({} -> {}): {}",
            path.display(),
            first.display(),
            e
        )
    })?;
    Ok(())
}

pub fn append(dir: &Path, record: LogRecord) -> Result<(), String> {
    let _guard = LOG_LOCK.lock();
    fs::create_dir_all(dir).map_err(|e| format!("Failed to create log dir: {}", e))?;
    rotate_if_needed(dir)?;

    let line = serde_json::to_string(&record)
        .map_err(|e| format!("Failed to serialize log record: {}", e))?;
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_path(dir))
        .map_err(|e| format!("Failed to open log file: {}", e))?;
    writeln!(file, "{}", line).map_err(|e| format!("Failed to write log record: {}", e))?;
    Ok(())
}

fn record(level: &str, scope: &str, message: &str, data: Option<Value>) -> LogRecord {
    LogRecord {
        ts_ms: Utc::now().timestamp_millis(),
        level: level.to_string(),
        scope: scope.to_string(),
        message: message.to_string(),
        data,
    }
}

pub fn info(dir: &Path, scope: &str, message: &str) -> Result<(), String> {
    append(dir, record("info", scope, message, None))
}

pub fn warn(dir: &Path, scope: &str, message: &str) -> Result<(), String> {
    append(dir, record("warn", scope, message, None))
}

pub fn error(dir: &Path, scope: &str, message: &str) -> Result<(), String> {
    append(dir, record("error", scope, message, None))
}

pub fn error_with(dir: &Path, scope: &str, message: &str, data: Value) -> Result<(), String> {
    append(dir, record("error", scope, message, Some(data)))
}
