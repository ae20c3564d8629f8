pub mod event;
pub mod settings;
pub mod stats;

pub use event::{Category, InputSource, RawInput};
pub use settings::Settings;
pub use stats::DailyTotals;
