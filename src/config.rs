use std::collections::HashMap;
use std::fs;
use std::str::FromStr;
use std::time::Duration;

/// INI-style configuration: `[Section]` headers, `key = value` lines, `#`
/// comments. Keys before the first section are globals.
#[derive(Debug)]
pub struct Config {
    pub globals: HashMap<String, String>,
    pub sections: HashMap<String, HashMap<String, String>>,
}

impl Config {
    pub fn load(path: &str) -> Result<Self, String> {
        let content =
            fs::read_to_string(path).map_err(|e| format!("Error reading file {path}: {e}"))?;
        Ok(Self::parse(&content))
    }

    pub fn parse(content: &str) -> Self {
        let mut globals = HashMap::new();
        let mut sections: HashMap<String, HashMap<String, String>> = HashMap::new();
        let mut current_section: Option<String> = None;

        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            if line.starts_with('[') && line.ends_with(']') {
                let name = &line[1..line.len() - 1];
                current_section = Some(name.trim().to_string());
                continue;
            }

            if let Some(pos) = line.find('=') {
                let key = line[..pos].trim().to_string();
                let value = line[pos + 1..].trim().trim_matches('"').to_string();

                match &current_section {
                    None => {
                        globals.insert(key, value);
                    }
                    Some(sec) => {
                        sections.entry(sec.clone()).or_default().insert(key, value);
                    }
                }
            }
        }
        Config { globals, sections }
    }

    pub fn empty() -> Self {
        Self {
            globals: HashMap::new(),
            sections: HashMap::new(),
        }
    }

    #[must_use]
    pub fn get(&self, section: &str, key: &str) -> Option<&str> {
        self.sections
            .get(section)
            .and_then(|sec| sec.get(key))
            .map(|s| s.as_str())
    }

    #[must_use]
    pub fn get_non_empty(&self, section: &str, key: &str) -> Option<&str> {
        self.get(section, key).filter(|s| !s.is_empty())
    }

    #[must_use]
    pub fn get_global(&self, key: &str) -> Option<&str> {
        self.globals.get(key).map(|s| s.as_str())
    }

    #[must_use]
    pub fn get_non_empty_or_default<'a>(
        &'a self,
        section: &str,
        key: &str,
        default: &'a str,
    ) -> &'a str {
        self.get_non_empty(section, key)
            .or_else(|| self.get_global(key).filter(|s| !s.is_empty()))
            .unwrap_or(default)
    }

    /// Parses `section.key` (falling back to the global `key`) into `T`.
    ///
    /// Missing keys yield `Ok(default)`; present but unparsable values are an
    /// error so a typo in the config file does not silently become a default.
    pub fn get_parsed_or<T: FromStr>(&self, section: &str, key: &str, default: T) -> Result<T, String> {
        match self
            .get_non_empty(section, key)
            .or_else(|| self.get_global(key).filter(|s| !s.is_empty()))
        {
            None => Ok(default),
            Some(raw) => raw
                .parse::<T>()
                .map_err(|_| format!("invalid value for [{section}] {key}: {raw:?}")),
        }
    }
}

pub const DEFAULT_LISTEN_ADDR: &str = "0.0.0.0:8080";
pub const DEFAULT_WS_PATH: &str = "/ws/data";
pub const DEFAULT_QUEUE_CAPACITY: usize = 256;
pub const DEFAULT_KEEPALIVE_SECS: u64 = 30;
pub const DEFAULT_INACTIVITY_SECS: u64 = 60;
pub const DEFAULT_HANDSHAKE_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_READ_POLL_MS: u64 = 250;

/// Runtime settings of the relay, resolved from the `[Relay]` section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayConfig {
    pub listen_addr: String,
    /// Upgrade path accepted by the WebSocket handshake.
    pub ws_path: String,
    /// Capacity of every peer's outbound queue.
    pub queue_capacity: usize,
    /// Writer emits a ping when its queue stays idle this long.
    pub keepalive: Duration,
    /// Reader terminates the peer when nothing was read for this long.
    pub inactivity_timeout: Duration,
    pub handshake_timeout: Duration,
    /// Socket read timeout used by the Reader to re-check its deadline.
    pub read_poll: Duration,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            listen_addr: DEFAULT_LISTEN_ADDR.to_owned(),
            ws_path: DEFAULT_WS_PATH.to_owned(),
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            keepalive: Duration::from_secs(DEFAULT_KEEPALIVE_SECS),
            inactivity_timeout: Duration::from_secs(DEFAULT_INACTIVITY_SECS),
            handshake_timeout: Duration::from_secs(DEFAULT_HANDSHAKE_TIMEOUT_SECS),
            read_poll: Duration::from_millis(DEFAULT_READ_POLL_MS),
        }
    }
}

impl RelayConfig {
    pub fn from_config(config: &Config) -> Result<Self, String> {
        let listen_addr = config
            .get_non_empty_or_default("Relay", "listen_addr", DEFAULT_LISTEN_ADDR)
            .to_owned();
        let mut ws_path = config
            .get_non_empty_or_default("Relay", "ws_path", DEFAULT_WS_PATH)
            .to_owned();
        if !ws_path.starts_with('/') {
            ws_path.insert(0, '/');
        }

        let queue_capacity: usize =
            config.get_parsed_or("Relay", "queue_capacity", DEFAULT_QUEUE_CAPACITY)?;
        if queue_capacity == 0 {
            return Err("[Relay] queue_capacity must be at least 1".to_owned());
        }

        let keepalive_secs = config.get_parsed_or("Relay", "keepalive_secs", DEFAULT_KEEPALIVE_SECS)?;
        let inactivity_secs =
            config.get_parsed_or("Relay", "inactivity_secs", DEFAULT_INACTIVITY_SECS)?;
        let handshake_secs = config.get_parsed_or(
            "Relay",
            "handshake_timeout_secs",
            DEFAULT_HANDSHAKE_TIMEOUT_SECS,
        )?;
        let read_poll_ms = config.get_parsed_or("Relay", "read_poll_ms", DEFAULT_READ_POLL_MS)?;

        if inactivity_secs <= keepalive_secs {
            return Err(format!(
                "[Relay] inactivity_secs ({inactivity_secs}) must exceed keepalive_secs ({keepalive_secs})"
            ));
        }

        Ok(Self {
            listen_addr,
            ws_path,
            queue_capacity,
            keepalive: Duration::from_secs(keepalive_secs),
            inactivity_timeout: Duration::from_secs(inactivity_secs),
            handshake_timeout: Duration::from_secs(handshake_secs),
            read_poll: Duration::from_millis(read_poll_ms.max(1)),
        })
    }

    /// Replaces the port of `listen_addr`, keeping its host part.
    ///
    /// Used for the `PORT` environment override.
    pub fn with_port(mut self, port: &str) -> Self {
        let host = self
            .listen_addr
            .rsplit_once(':')
            .map(|(host, _)| host.to_owned())
            .unwrap_or_else(|| "0.0.0.0".to_owned());
        self.listen_addr = format!("{host}:{port}");
        self
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]
    use super::*;

    #[test]
    fn parses_sections_globals_and_comments() {
        let cfg = Config::parse(
            "# relay settings\nqueue_capacity = 8\n[Relay]\nlisten_addr = \"127.0.0.1:9000\"\n\n[Logging]\nstderr_level=info\n",
        );
        assert_eq!(cfg.get_global("queue_capacity"), Some("8"));
        assert_eq!(cfg.get("Relay", "listen_addr"), Some("127.0.0.1:9000"));
        assert_eq!(cfg.get("Logging", "stderr_level"), Some("info"));
        assert_eq!(cfg.get("Relay", "missing"), None);
    }

    #[test]
    fn relay_config_defaults_from_empty_file() {
        let rc = RelayConfig::from_config(&Config::empty()).unwrap();
        assert_eq!(rc, RelayConfig::default());
        assert_eq!(rc.keepalive, Duration::from_secs(30));
        assert_eq!(rc.inactivity_timeout, Duration::from_secs(60));
        assert_eq!(rc.queue_capacity, 256);
        assert_eq!(rc.ws_path, "/ws/data");
    }

    #[test]
    fn relay_config_reads_overrides_and_globals() {
        let cfg = Config::parse(
            "queue_capacity = 4\n[Relay]\nws_path = relay\nkeepalive_secs = 5\ninactivity_secs = 12\n",
        );
        let rc = RelayConfig::from_config(&cfg).unwrap();
        assert_eq!(rc.queue_capacity, 4);
        assert_eq!(rc.ws_path, "/relay");
        assert_eq!(rc.keepalive, Duration::from_secs(5));
        assert_eq!(rc.inactivity_timeout, Duration::from_secs(12));
    }

    #[test]
    fn relay_config_rejects_bad_values() {
        let cfg = Config::parse("[Relay]\nqueue_capacity = lots\n");
        assert!(RelayConfig::from_config(&cfg).is_err());

        let cfg = Config::parse("[Relay]\nqueue_capacity = 0\n");
        assert!(RelayConfig::from_config(&cfg).is_err());

        let cfg = Config::parse("[Relay]\nkeepalive_secs = 60\ninactivity_secs = 30\n");
        assert!(RelayConfig::from_config(&cfg).is_err());
    }

    #[test]
    fn with_port_keeps_host() {
        let rc = RelayConfig::default().with_port("9100");
        assert_eq!(rc.listen_addr, "0.0.0.0:9100");
    }
}
