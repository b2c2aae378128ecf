// src/utils/mod.rs

pub mod error;
pub mod helpers;
pub mod logger;
pub mod time;

// Re-export commonly used items
pub use error::{CacheEngineError, CacheEngineResult, ErrorKind};
pub use helpers::*;
pub use logger::{init_logger, logger, LogLevel, Logger};
pub use time::{Clock, ManualClock, SystemClock};
