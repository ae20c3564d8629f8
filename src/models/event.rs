use serde::{Deserialize, Serialize};

/// Which hook delivered a raw event. The adapter suppresses release and
/// repeat events, so one value arrives per logical press.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum InputSource {
    Keyboard,
    Mouse,
}

/// The partition under which an identity's counts are tracked.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Simple,
    Combination,
    Mouse,
}

impl Category {
    /// All categories, in the order flushes walk them.
    pub const ALL: [Category; 3] = [Category::Simple, Category::Combination, Category::Mouse];
}

/// A decoded press as pushed into the aggregation channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawInput {
    pub name: String,
    pub source: InputSource,
}
