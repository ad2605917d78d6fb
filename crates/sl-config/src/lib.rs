mod engine;
mod logging;
mod types;

pub use engine::{ChannelConfig, CsvConfig, EngineConfig, WindowLimits};
pub use logging::{LogFormat, LoggingConfig};
pub use types::HumanDuration;
