use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Aggregated persistent counters for one calendar day, as served to the
/// shell layer. Counts accumulated in memory but not yet flushed are not
/// reflected here.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct DailyTotals {
    pub date_key: String,
    #[serde(default)]
    pub key_presses: HashMap<String, u64>,
    #[serde(default)]
    pub combination_presses: HashMap<String, u64>,
    #[serde(default)]
    pub mouse_presses: HashMap<String, u64>,
    /// Sum of simple-key presses only; combinations and mouse buttons are
    /// tracked but intentionally excluded from this figure.
    #[serde(default)]
    pub total_presses: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serde_uses_camel_case_field_names() {
        let mut totals = DailyTotals {
            date_key: "2026-08-06".to_string(),
            ..Default::default()
        };
        totals.key_presses.insert("A".to_string(), 4);
        totals.combination_presses.insert("Ctrl+C".to_string(), 1);
        totals.total_presses = 4;

        let json = serde_json::to_string(&totals).expect("serialize");
        assert!(json.contains("\"keyPresses\""));
        assert!(json.contains("\"combinationPresses\""));
        assert!(json.contains("\"mousePresses\""));
        assert!(json.contains("\"totalPresses\""));
        assert!(json.contains("\"dateKey\""));

        let de: DailyTotals = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(de.key_presses.get("A").copied(), Some(4));
        assert_eq!(de.total_presses, 4);
    }
}
