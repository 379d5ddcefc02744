use crate::log::log_level::LogLevel;

/// Destination for log records. Implementations must never block the caller
/// for long: the relay logs from its routing path.
pub trait LogSink: Send + Sync {
    fn log(&self, level: LogLevel, msg: &str, target: &'static str);
}
