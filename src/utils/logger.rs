// src/utils/logger.rs

use serde_json::{Map, Value};
use std::error::Error;
use std::str::FromStr;
use std::sync::OnceLock;

/// Environment variable read by [`Logger::from_env`]
pub const LOG_LEVEL_ENV: &str = "CACHE_PLANE_LOG_LEVEL";

/// Target every line is emitted under
const LOG_TARGET: &str = "cache_plane";

/// Severity, most severe first
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
}

impl LogLevel {
    fn label(self) -> &'static str {
        match self {
            LogLevel::Error => "ERROR",
            LogLevel::Warn => "WARN",
            LogLevel::Info => "INFO",
            LogLevel::Debug => "DEBUG",
        }
    }
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "error" => Ok(LogLevel::Error),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "info" => Ok(LogLevel::Info),
            "debug" | "trace" => Ok(LogLevel::Debug),
            other => Err(format!("unknown log level '{}'", other)),
        }
    }
}

impl From<LogLevel> for log::Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Error => log::Level::Error,
            LogLevel::Warn => log::Level::Warn,
            LogLevel::Info => log::Level::Info,
            LogLevel::Debug => log::Level::Debug,
        }
    }
}

/// Structured logger for stores and the coordinator.
///
/// Each line is one JSON object handed to the `log` facade under the
/// `cache_plane` target: `ts`, `level`, `msg`, the logger's fixed `fields`
/// (component, store name) and the per-call `meta`. Filtering by level
/// happens here so the host logger never sees lines below the configured
/// level.
#[derive(Debug, Clone)]
pub struct Logger {
    level: LogLevel,
    fields: Map<String, Value>,
}

impl Logger {
    pub fn new(level: LogLevel) -> Self {
        Self {
            level,
            fields: Map::new(),
        }
    }

    /// Level from `CACHE_PLANE_LOG_LEVEL`; unset or unparsable means info
    pub fn from_env() -> Self {
        let level = std::env::var(LOG_LEVEL_ENV)
            .ok()
            .and_then(|raw| raw.parse().ok())
            .unwrap_or(LogLevel::Info);
        Self::new(level)
    }

    /// Copy of the global logger tagged with `component`
    pub fn for_component(component: &str) -> Self {
        logger().clone().with_field("component", component)
    }

    pub fn with_field(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.fields.insert(key.to_string(), value.into());
        self
    }

    pub fn enabled(&self, level: LogLevel) -> bool {
        level <= self.level
    }

    fn render(&self, level: LogLevel, message: &str, meta: Option<&Value>) -> String {
        let mut line = Map::new();
        let ts = chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true);
        line.insert("ts".to_string(), Value::String(ts));
        line.insert("level".to_string(), Value::String(level.label().to_string()));
        line.insert("msg".to_string(), Value::String(message.to_string()));
        if !self.fields.is_empty() {
            line.insert("fields".to_string(), Value::Object(self.fields.clone()));
        }
        if let Some(meta) = meta {
            line.insert("meta".to_string(), meta.clone());
        }
        Value::Object(line).to_string()
    }

    pub fn log(&self, level: LogLevel, message: &str, meta: Option<&Value>) {
        if self.enabled(level) {
            let line = self.render(level, message, meta);
            log::log!(target: LOG_TARGET, log::Level::from(level), "{}", line);
        }
    }

    pub fn error_with_meta(&self, message: &str, meta: Option<&Value>) {
        self.log(LogLevel::Error, message, meta);
    }

    pub fn warn(&self, message: &str) {
        self.log(LogLevel::Warn, message, None);
    }

    pub fn warn_with_meta(&self, message: &str, meta: Option<&Value>) {
        self.log(LogLevel::Warn, message, meta);
    }

    pub fn info(&self, message: &str) {
        self.log(LogLevel::Info, message, None);
    }

    pub fn info_with_meta(&self, message: &str, meta: Option<&Value>) {
        self.log(LogLevel::Info, message, meta);
    }

    pub fn debug_with_meta(&self, message: &str, meta: Option<&Value>) {
        self.log(LogLevel::Debug, message, meta);
    }

    /// Error line carrying `source` and its cause chain under `meta.error`
    pub fn error_with_source(&self, message: &str, source: &dyn Error, meta: Option<&Value>) {
        self.log(LogLevel::Error, message, Some(&with_error(source, meta)));
    }

    /// Warn line carrying `source` and its cause chain under `meta.error`
    pub fn warn_with_source(&self, message: &str, source: &dyn Error, meta: Option<&Value>) {
        self.log(LogLevel::Warn, message, Some(&with_error(source, meta)));
    }
}

fn with_error(source: &dyn Error, meta: Option<&Value>) -> Value {
    let chain: Vec<Value> = std::iter::successors(Some(source), |err| (*err).source())
        .map(|err| Value::String(err.to_string()))
        .collect();
    let mut merged = match meta {
        Some(Value::Object(map)) => map.clone(),
        Some(other) => {
            let mut map = Map::new();
            map.insert("context".to_string(), other.clone());
            map
        }
        None => Map::new(),
    };
    merged.insert("error".to_string(), Value::Array(chain));
    Value::Object(merged)
}

static GLOBAL_LOGGER: OnceLock<Logger> = OnceLock::new();

/// Pin the global level before the first store or coordinator is built.
/// Returns false when the global logger already exists.
pub fn init_logger(level: LogLevel) -> bool {
    GLOBAL_LOGGER.set(Logger::new(level)).is_ok()
}

pub fn logger() -> &'static Logger {
    GLOBAL_LOGGER.get_or_init(Logger::from_env)
}

#[macro_export]
macro_rules! log_error {
    ($msg:expr) => {
        $crate::utils::logger::logger().log($crate::utils::logger::LogLevel::Error, $msg, None)
    };
    ($msg:expr, $meta:expr) => {
        $crate::utils::logger::logger().error_with_meta($msg, Some(&$meta))
    };
}

#[macro_export]
macro_rules! log_warn {
    ($msg:expr) => {
        $crate::utils::logger::logger().warn($msg)
    };
    ($msg:expr, $meta:expr) => {
        $crate::utils::logger::logger().warn_with_meta($msg, Some(&$meta))
    };
}

#[macro_export]
macro_rules! log_debug {
    ($msg:expr) => {
        $crate::utils::logger::logger().log($crate::utils::logger::LogLevel::Debug, $msg, None)
    };
    ($msg:expr, $meta:expr) => {
        $crate::utils::logger::logger().debug_with_meta($msg, Some(&$meta))
    };
}
