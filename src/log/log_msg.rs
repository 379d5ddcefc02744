use crate::log::log_level::LogLevel;

/// A single log record travelling from a relay thread to the logger worker.
#[derive(Debug, Clone)]
pub struct LogMsg {
    /// The severity level of the record.
    pub level: LogLevel,
    /// Wall-clock time of the event in milliseconds since the Unix epoch.
    pub ts_ms: u64,
    /// The formatted message text.
    pub text: String,
    /// The static module path the record originated from.
    pub target: &'static str,
}

impl LogMsg {
    /// Creates a new `LogMsg`.
    ///
    /// # Example
    ///
    /// ```rust,ignore
    /// let msg = LogMsg::new(LogLevel::Info, "peer connected", module_path!(), 1_700_000_000_000);
    /// ```
    pub fn new(level: LogLevel, text: impl Into<String>, target: &'static str, ts_ms: u64) -> Self {
        Self {
            level,
            ts_ms,
            text: text.into(),
            target,
        }
    }

    /// Renders the record as one log-file line (without trailing newline).
    pub fn to_line(&self) -> String {
        format!(
            "[{:?}] {} {} | {}",
            self.level, self.ts_ms, self.target, self.text
        )
    }
}
