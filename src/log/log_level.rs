/// Defines the severity levels for log messages.
///
/// Levels are ordered from least to most severe, so `level >= LogLevel::Warn`
/// selects warnings and errors.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    /// Designates very fine-grained informational events (per-frame routing).
    Trace,
    /// Designates fine-grained informational events that are most useful to debug the relay.
    Debug,
    /// Designates informational messages such as peer connects and disconnects.
    Info,
    /// Designates potentially harmful situations, e.g. dropped frames.
    Warn,
    /// Designates error events that might still allow the relay to continue running.
    Error,
}

impl LogLevel {
    /// Parses a level name as written in the config file (`trace`, `debug`,
    /// `info`, `warn`/`warning`, `error`). Case-insensitive.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "trace" => Some(Self::Trace),
            "debug" => Some(Self::Debug),
            "info" => Some(Self::Info),
            "warn" | "warning" => Some(Self::Warn),
            "error" => Some(Self::Error),
            _ => None,
        }
    }
}
