// ABOUTME: Gateway runtime configuration derived from the startup secret store snapshot
// ABOUTME: Listen address, debug mode, upstream timeout, and comma-list / timeout parsing
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2026 dravr.ai

use std::num::ParseIntError;
use std::time::Duration;

use crate::secrets::SecretStore;
use crate::types::GatewayError;

/// Default upstream timeout (30 minutes) tolerating slow generative backends
const DEFAULT_UPSTREAM_TIMEOUT_SECS: u64 = 30 * 60;

/// Default HTTP listen port
const DEFAULT_PORT: u16 = 8000;

/// Default HTTP listen host
const DEFAULT_HOST: &str = "0.0.0.0";

/// Version reported by `/status` when `API_GATEWAY_VERSION` is unset
const DEFAULT_VERSION: &str = "1.0.0";

/// Configuration name for the fallback base URL used by target resolution
pub const DEFAULT_API_URL_KEY: &str = "DEFAULT_API_URL";

/// Runtime settings for the gateway
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// HTTP listen host
    pub host: String,
    /// HTTP listen port
    pub port: u16,
    /// Verbose request/response logging
    pub debug: bool,
    /// Version string reported by `/status`
    pub version: String,
    /// Maximum time to wait for an upstream backend
    pub upstream_timeout: Duration,
    /// Base64 Ed25519 keypair for the signing endpoints
    pub ed25519_private_key: Option<String>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_owned(),
            port: DEFAULT_PORT,
            debug: false,
            version: DEFAULT_VERSION.to_owned(),
            upstream_timeout: Duration::from_secs(DEFAULT_UPSTREAM_TIMEOUT_SECS),
            ed25519_private_key: None,
        }
    }
}

impl GatewayConfig {
    /// Derive configuration from the startup snapshot
    ///
    /// # Errors
    ///
    /// Returns a config error if the port or timeout cannot be parsed.
    pub fn from_store(store: &SecretStore) -> Result<Self, GatewayError> {
        let mut config = Self::default();

        if let Some(host) = store.get("MAGIC_GATEWAY_HOST").filter(|h| !h.is_empty()) {
            host.clone_into(&mut config.host);
        }
        if let Some(port) = store.get("MAGIC_GATEWAY_PORT") {
            config.port = port
                .trim()
                .parse()
                .map_err(|e| GatewayError::config(format!("Invalid MAGIC_GATEWAY_PORT: {e}")))?;
        }
        config.debug = store.get("MAGIC_GATEWAY_DEBUG") == Some("true");
        if let Some(version) = store.get("API_GATEWAY_VERSION") {
            version.clone_into(&mut config.version);
        }
        if let Some(timeout) = store.get("MAGIC_GATEWAY_UPSTREAM_TIMEOUT_SECS") {
            config.upstream_timeout = parse_timeout(timeout).map_err(|e| {
                GatewayError::config(format!("Invalid MAGIC_GATEWAY_UPSTREAM_TIMEOUT_SECS: {e}"))
            })?;
        }
        config.ed25519_private_key = store
            .get("ED25519_PRIVATE_KEY")
            .filter(|k| !k.is_empty())
            .map(ToOwned::to_owned);

        Ok(config)
    }

    /// Override the listen port
    #[must_use]
    pub const fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Override the listen host
    #[must_use]
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    /// Enable debug logging
    #[must_use]
    pub const fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    /// Set the upstream timeout
    #[must_use]
    pub const fn with_upstream_timeout(mut self, timeout: Duration) -> Self {
        self.upstream_timeout = timeout;
        self
    }

    /// `host:port` listen address
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Parse a comma-separated list of configuration names
#[must_use]
pub fn parse_name_list(input: &str) -> Vec<String> {
    input
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToOwned::to_owned)
        .collect()
}

/// Parse a timeout value from a string (in seconds)
///
/// # Errors
///
/// Returns an error if the string cannot be parsed as a `u64`.
pub fn parse_timeout(input: &str) -> Result<Duration, ParseIntError> {
    input.trim().parse::<u64>().map(Duration::from_secs)
}
