//! Gateway configuration: defaults, TOML file, environment overrides.
//!
//! ```toml
//! [upstream]
//! base_url = "https://lichess.org"
//! request_timeout_ms = 15000
//!
//! [client]
//! transport_quiesce_ms = 200
//!
//! [sessions]
//! max_sessions = 3
//! admin_list = "/etc/boardcast/admins"
//! ```
//!
//! Every key is optional. `BOARDCAST_API_TOKEN` and `BOARDCAST_BASE_URL`
//! win over the file.

use std::path::{Path, PathBuf};
use std::time::Duration;

use boardcast_client::ClientConfig;
use boardcast_session::SessionConfig;
use boardcast_transport::TransportConfig;
use serde::Deserialize;
use tracing::debug;

use crate::{BoardcastError, SignalConfig};

pub const ENV_API_TOKEN: &str = "BOARDCAST_API_TOKEN";
pub const ENV_BASE_URL: &str = "BOARDCAST_BASE_URL";

/// Everything a [`Gateway`](crate::Gateway) needs.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub transport: TransportConfig,
    pub client: ClientConfig,
    pub session: SessionConfig,
    pub signal: SignalConfig,
    /// How often each session's state machine is advanced.
    pub session_tick: Duration,
    /// How often the reaper and signaling cleanup run.
    pub maintenance_tick: Duration,
    /// Fan-out messages buffered per subscriber before it starts lagging.
    pub event_capacity: usize,
    /// Commands buffered per session actor.
    pub command_capacity: usize,
    /// File of admin IPs, one per line.
    pub admin_list: Option<PathBuf>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            transport: TransportConfig::default(),
            client: ClientConfig::default(),
            session: SessionConfig::default(),
            signal: SignalConfig::default(),
            session_tick: Duration::from_millis(50),
            maintenance_tick: Duration::from_secs(1),
            event_capacity: 256,
            command_capacity: 32,
            admin_list: None,
        }
    }
}

impl GatewayConfig {
    /// Reads `path`, applies environment overrides and validates.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, BoardcastError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            BoardcastError::Config(format!("failed to read {}: {e}", path.display()))
        })?;

        let mut config = Self::from_toml_str(&text)?;
        config.apply_env_overrides();
        config.validate()?;
        debug!(path = %path.display(), ?config, "configuration loaded");
        Ok(config)
    }

    /// Parses a config file body over the defaults. Does not validate.
    pub fn from_toml_str(text: &str) -> Result<Self, BoardcastError> {
        let file: ConfigFile = toml::from_str(text)
            .map_err(|e| BoardcastError::Config(format!("failed to parse config: {e}")))?;
        let mut config = Self::default();
        file.apply_to(&mut config);
        Ok(config)
    }

    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|key| std::env::var(key).ok());
    }

    /// Applies overrides from any key lookup. Empty values are ignored.
    pub fn apply_overrides_from(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        if let Some(token) = non_empty(ENV_API_TOKEN) {
            self.transport.api_token = Some(token);
        }
        if let Some(url) = non_empty(ENV_BASE_URL) {
            self.transport.base_url = url.trim_end_matches('/').to_string();
        }
    }

    pub fn validate(&self) -> Result<(), BoardcastError> {
        let url = &self.transport.base_url;
        if !(url.starts_with("https://") || url.starts_with("http://")) {
            return Err(invalid(format!("base_url must be http(s), got {url:?}")));
        }
        if self.session.max_sessions == 0 {
            return Err(invalid("max_sessions must be greater than 0"));
        }
        if self.client.max_attempts == 0 {
            return Err(invalid("max_attempts must be greater than 0"));
        }
        if self.client.operation_timeout.is_zero() {
            return Err(invalid("operation_timeout_ms must be greater than 0"));
        }
        if self.client.queue_capacity == 0 {
            return Err(invalid("queue_capacity must be greater than 0"));
        }
        if self.session_tick.is_zero() {
            return Err(invalid("tick_ms must be greater than 0"));
        }
        if self.event_capacity == 0 {
            return Err(invalid("event_capacity must be greater than 0"));
        }
        Ok(())
    }
}

fn invalid(msg: impl Into<String>) -> BoardcastError {
    BoardcastError::Config(msg.into())
}

// ---------------------------------------------------------------------------
// File layout
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct ConfigFile {
    upstream: UpstreamSection,
    client: ClientSection,
    sessions: SessionsSection,
    gateway: GatewaySection,
    signaling: SignalingSection,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct UpstreamSection {
    base_url: Option<String>,
    api_token: Option<String>,
    accept_invalid_certs: Option<bool>,
    connect_timeout_ms: Option<u64>,
    request_timeout_ms: Option<u64>,
    max_line_len: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct ClientSection {
    stream_stop_delay_ms: Option<u64>,
    transport_quiesce_ms: Option<u64>,
    stream_resume_delay_ms: Option<u64>,
    operation_timeout_ms: Option<u64>,
    max_attempts: Option<u32>,
    initial_backoff_ms: Option<u64>,
    max_consecutive_failures: Option<u32>,
    stale_after_secs: Option<u64>,
    max_events_per_tick: Option<usize>,
    queue_capacity: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct SessionsSection {
    max_sessions: Option<usize>,
    inactivity_timeout_secs: Option<u64>,
    reap_interval_secs: Option<u64>,
    admin_list: Option<PathBuf>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct GatewaySection {
    tick_ms: Option<u64>,
    maintenance_ms: Option<u64>,
    event_capacity: Option<usize>,
    command_capacity: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct SignalingSection {
    ttl_secs: Option<u64>,
    cleanup_interval_secs: Option<u64>,
}

fn set<T>(target: &mut T, value: Option<T>) {
    if let Some(value) = value {
        *target = value;
    }
}

fn set_ms(target: &mut Duration, value: Option<u64>) {
    set(target, value.map(Duration::from_millis));
}

fn set_secs(target: &mut Duration, value: Option<u64>) {
    set(target, value.map(Duration::from_secs));
}

impl ConfigFile {
    fn apply_to(self, config: &mut GatewayConfig) {
        let u = self.upstream;
        let t = &mut config.transport;
        set(&mut t.base_url, u.base_url.map(|s| s.trim_end_matches('/').to_string()));
        if u.api_token.is_some() {
            t.api_token = u.api_token;
        }
        set(&mut t.accept_invalid_certs, u.accept_invalid_certs);
        set_ms(&mut t.connect_timeout, u.connect_timeout_ms);
        set_ms(&mut t.request_timeout, u.request_timeout_ms);
        set(&mut t.max_line_len, u.max_line_len);

        let c = self.client;
        let m = &mut config.client;
        set_ms(&mut m.stream_stop_delay, c.stream_stop_delay_ms);
        set_ms(&mut m.transport_quiesce, c.transport_quiesce_ms);
        set_ms(&mut m.stream_resume_delay, c.stream_resume_delay_ms);
        set_ms(&mut m.operation_timeout, c.operation_timeout_ms);
        set(&mut m.max_attempts, c.max_attempts);
        set_ms(&mut m.initial_backoff, c.initial_backoff_ms);
        set(&mut m.max_consecutive_failures, c.max_consecutive_failures);
        set_secs(&mut m.stale_after, c.stale_after_secs);
        set(&mut m.max_events_per_tick, c.max_events_per_tick);
        set(&mut m.queue_capacity, c.queue_capacity);

        let s = self.sessions;
        set(&mut config.session.max_sessions, s.max_sessions);
        set_secs(&mut config.session.inactivity_timeout, s.inactivity_timeout_secs);
        set_secs(&mut config.session.reap_interval, s.reap_interval_secs);
        if s.admin_list.is_some() {
            config.admin_list = s.admin_list;
        }

        let g = self.gateway;
        set_ms(&mut config.session_tick, g.tick_ms);
        set_ms(&mut config.maintenance_tick, g.maintenance_ms);
        set(&mut config.event_capacity, g.event_capacity);
        set(&mut config.command_capacity, g.command_capacity);

        set_secs(&mut config.signal.ttl, self.signaling.ttl_secs);
        set_secs(&mut config.signal.cleanup_interval, self.signaling.cleanup_interval_secs);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_toml_str_empty_keeps_defaults() {
        let config = GatewayConfig::from_toml_str("").unwrap();
        assert_eq!(config.session.max_sessions, 3);
        assert_eq!(config.client.transport_quiesce, Duration::from_millis(500));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_toml_str_overrides_sections() {
        let config = GatewayConfig::from_toml_str(
            r#"
            [upstream]
            base_url = "https://example.test/"
            request_timeout_ms = 2500

            [client]
            transport_quiesce_ms = 100
            max_attempts = 5

            [sessions]
            max_sessions = 2
            inactivity_timeout_secs = 60
            admin_list = "admins.txt"

            [gateway]
            tick_ms = 20

            [signaling]
            ttl_secs = 30
            "#,
        )
        .unwrap();

        assert_eq!(config.transport.base_url, "https://example.test");
        assert_eq!(config.transport.request_timeout, Duration::from_millis(2500));
        assert_eq!(config.client.transport_quiesce, Duration::from_millis(100));
        assert_eq!(config.client.max_attempts, 5);
        assert_eq!(config.client.stream_resume_delay, Duration::from_millis(500));
        assert_eq!(config.session.max_sessions, 2);
        assert_eq!(config.session.inactivity_timeout, Duration::from_secs(60));
        assert_eq!(config.admin_list, Some(PathBuf::from("admins.txt")));
        assert_eq!(config.session_tick, Duration::from_millis(20));
        assert_eq!(config.signal.ttl, Duration::from_secs(30));
    }

    #[test]
    fn test_from_toml_str_unknown_key_is_error() {
        let err = GatewayConfig::from_toml_str("[client]\nquiesce = 1\n").unwrap_err();
        assert!(matches!(err, BoardcastError::Config(_)));
    }

    #[test]
    fn test_apply_overrides_from_env_wins_over_file() {
        let mut config =
            GatewayConfig::from_toml_str("[upstream]\napi_token = \"from-file\"\n").unwrap();
        config.apply_overrides_from(|key| match key {
            ENV_API_TOKEN => Some("from-env".to_string()),
            ENV_BASE_URL => Some(String::new()),
            _ => None,
        });
        assert_eq!(config.transport.api_token.as_deref(), Some("from-env"));
        assert_eq!(config.transport.base_url, "https://lichess.org");
    }

    #[test]
    fn test_validate_rejects_zero_sessions() {
        let mut config = GatewayConfig::default();
        config.session.max_sessions = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_non_http_url() {
        let mut config = GatewayConfig::default();
        config.transport.base_url = "ftp://example.test".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_missing_file_is_config_error() {
        let err = GatewayConfig::load("/definitely/not/here.toml").unwrap_err();
        assert!(err.to_string().contains("failed to read"));
    }
}
