//! Client configuration.

/// Environment variable overriding [`ClientConfig::hub_url`].
pub const HUB_URL_VAR: &str = "CODIFY_HUB_URL";
/// Environment variable overriding [`ClientConfig::inbound_capacity`].
pub const INBOUND_CAPACITY_VAR: &str = "CODIFY_INBOUND_CAPACITY";

/// Client configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// WebSocket URL of the relay hub
    pub hub_url: String,
    /// Hub messages buffered before the reader task waits on the app
    pub inbound_capacity: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            hub_url: "ws://127.0.0.1:9090".to_string(),
            inbound_capacity: 256,
        }
    }
}

impl ClientConfig {
    /// Defaults, overridden by `CODIFY_HUB_URL` / `CODIFY_INBOUND_CAPACITY`.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) with an explicit variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(url) = lookup(HUB_URL_VAR).filter(|v| !v.trim().is_empty()) {
            config.hub_url = url;
        }
        if let Some(raw) = lookup(INBOUND_CAPACITY_VAR) {
            match raw.trim().parse::<usize>() {
                Ok(n) if n > 0 => config.inbound_capacity = n,
                _ => log::warn!("Ignoring {INBOUND_CAPACITY_VAR}={raw:?}: expected a positive integer"),
            }
        }
        config
    }
}
