use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Flush a category table as soon as it holds this many accumulated presses.
    pub flush_threshold: usize,
    /// Flush every non-empty table at least this often, even when the
    /// threshold is never reached.
    pub flush_interval_secs: u64,
    pub enable_keyboard: bool,
    pub enable_mouse: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            flush_threshold: 5,
            flush_interval_secs: 30,
            enable_keyboard: true,
            enable_mouse: true,
        }
    }
}

impl Settings {
    pub fn new() -> Self {
        Self::default()
    }
}
