// ABOUTME: Process-wide secret store snapshotted once at startup from .env and the environment
// ABOUTME: Holds the signing secret apart from substitutable entries and derives its key id
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2026 dravr.ai

use std::collections::HashMap;
use std::env;

use sha2::{Digest, Sha256};
use tracing::{debug, info};

use crate::types::{GatewayError, ServiceInfo};

/// Environment variable holding the gateway's own signing secret
pub const SIGNING_SECRET_KEY: &str = "MAGIC_GATEWAY_API_KEY";

/// Backend services reachable by name through `/{service}/...` paths
pub const SUPPORTED_SERVICES: &[&str] = &["OPENAI", "MAGIC", "DEEPSEEK"];

/// Name prefixes reported by the availability endpoints
const REPORTED_PREFIXES: &[&str] = &["OPENAI_", "MAGIC_", "DEEPSEEK_", "API_", "PUBLIC_"];

/// Suffix naming a backend base URL entry
pub const BASE_URL_SUFFIX: &str = "_API_BASE_URL";

/// Suffix naming a backend API key entry
pub const API_KEY_SUFFIX: &str = "_API_KEY";

/// Suffix naming a backend default model entry
pub const MODEL_SUFFIX: &str = "_MODEL";

/// Number of SHA-256 bytes kept for the key fingerprint
const KEY_ID_BYTES: usize = 8;

/// Immutable mapping of configuration names to values
///
/// Built once before the server accepts connections and shared by
/// reference afterwards. The signing secret is kept out of the
/// substitutable entries so no reference syntax can disclose it.
#[derive(Clone)]
pub struct SecretStore {
    entries: HashMap<String, String>,
    signing_secret: String,
    key_id: String,
}

impl SecretStore {
    /// Load `.env` (if present) and snapshot the process environment
    ///
    /// # Errors
    ///
    /// Returns a config error when `MAGIC_GATEWAY_API_KEY` is missing or empty.
    pub fn from_env() -> Result<Self, GatewayError> {
        match dotenvy::dotenv() {
            Ok(path) => debug!(path = %path.display(), "Loaded .env file"),
            Err(e) => debug!(error = %e, "No .env file loaded"),
        }
        Self::from_pairs(env::vars())
    }

    /// Build a store from explicit name/value pairs
    ///
    /// # Errors
    ///
    /// Returns a config error when `MAGIC_GATEWAY_API_KEY` is missing or empty.
    pub fn from_pairs<I, K, V>(pairs: I) -> Result<Self, GatewayError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut entries: HashMap<String, String> = pairs
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();

        let signing_secret = entries
            .remove(SIGNING_SECRET_KEY)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| GatewayError::config(format!("{SIGNING_SECRET_KEY} must be set")))?;
        let key_id = fingerprint(&signing_secret);

        info!(
            entries = entries.len(),
            key_id = %key_id,
            "Secret store initialised"
        );

        Ok(Self {
            entries,
            signing_secret,
            key_id,
        })
    }

    /// Look up a substitutable entry by exact name
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries.get(name).map(String::as_str)
    }

    /// Number of substitutable entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the store has no substitutable entries
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The gateway's own signing secret
    pub fn signing_secret(&self) -> &str {
        &self.signing_secret
    }

    /// Fingerprint of the signing secret, stable until restart
    pub fn key_id(&self) -> &str {
        &self.key_id
    }

    /// Base URL and key for a service name, only when both are configured
    pub fn service_credentials(&self, service: &str) -> Option<(&str, &str)> {
        let service = service.to_uppercase();
        let base_url = self.get(&format!("{service}{BASE_URL_SUFFIX}"))?;
        let api_key = self.get(&format!("{service}{API_KEY_SUFFIX}"))?;
        Some((base_url, api_key))
    }

    /// Entry names safe to report, sorted
    pub fn available_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .entries
            .keys()
            .filter(|k| REPORTED_PREFIXES.iter().any(|p| k.starts_with(p)))
            .cloned()
            .collect();
        names.sort_unstable();
        names
    }

    /// Supported services that have both a base URL and a key configured
    pub fn available_services(&self) -> Vec<&'static str> {
        SUPPORTED_SERVICES
            .iter()
            .copied()
            .filter(|s| self.service_credentials(s).is_some())
            .collect()
    }

    /// Public descriptors of the available services
    pub fn service_descriptors(&self) -> Vec<ServiceInfo> {
        self.available_services()
            .into_iter()
            .filter_map(|name| {
                let (base_url, _) = self.service_credentials(name)?;
                Some(ServiceInfo {
                    name: name.to_owned(),
                    base_url: bare_host(base_url),
                    model: self.get(&format!("{name}{MODEL_SUFFIX}")).map(ToOwned::to_owned),
                })
            })
            .collect()
    }
}

impl std::fmt::Debug for SecretStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecretStore")
            .field("entries", &self.entries.len())
            .field("key_id", &self.key_id)
            .finish_non_exhaustive()
    }
}

/// Hex of the first bytes of SHA-256 over the secret
fn fingerprint(secret: &str) -> String {
    let digest = Sha256::digest(secret.as_bytes());
    hex::encode(&digest[..KEY_ID_BYTES])
}

/// Host portion of a URL, falling back to the raw text between `//` and the next `/`
fn bare_host(base_url: &str) -> String {
    if let Some(host) = url::Url::parse(base_url)
        .ok()
        .and_then(|u| u.host_str().map(ToOwned::to_owned))
    {
        return host;
    }
    base_url
        .split('/')
        .nth(2)
        .unwrap_or(base_url)
        .to_owned()
}
