// ABOUTME: Maps a proxied request path and query to a backend base URL and optional API key
// ABOUTME: Tries six strategies in fixed precedence and fails closed when none applies
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2026 dravr.ai

//! # Target Resolution
//!
//! Strategies, in order:
//!
//! 1. `target` query parameter, used verbatim, no key
//! 2. first path segment equal to a configuration name holding a URL
//! 3. first path segment naming a supported service (`/openai/...`)
//! 4. `service` query parameter naming a supported service
//! 5. first path segment deriving `{SEGMENT}_API_URL`
//! 6. `DEFAULT_API_URL`
//!
//! The winning base URL is interpolated before use. An empty result is a
//! [`ErrorKind::NoRoute`](crate::types::ErrorKind::NoRoute) error.

use std::fmt;
use std::sync::Arc;

use tracing::{debug, info};
use url::form_urlencoded;

use crate::config::DEFAULT_API_URL_KEY;
use crate::secrets::{SecretStore, API_KEY_SUFFIX, BASE_URL_SUFFIX, SUPPORTED_SERVICES};
use crate::substitution::Substituter;
use crate::types::GatewayError;

/// Suffix of URL entries found by derived lookup
const API_URL_SUFFIX: &str = "_API_URL";

/// Which strategy produced a target
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// `target` query parameter
    TargetParam,
    /// Path segment equal to a configuration name
    ConfigName,
    /// Path segment naming a supported service
    ServicePath,
    /// `service` query parameter
    ServiceParam,
    /// `{SEGMENT}_API_URL` lookup
    DerivedUrl,
    /// Configured default base URL
    Default,
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::TargetParam => "target_param",
            Self::ConfigName => "config_name",
            Self::ServicePath => "service_path",
            Self::ServiceParam => "service_param",
            Self::DerivedUrl => "derived_url",
            Self::Default => "default",
        };
        f.write_str(name)
    }
}

/// Outcome of target resolution for one request
#[derive(Clone, PartialEq, Eq)]
pub struct ResolvedTarget {
    /// Interpolated backend base URL
    pub base_url: String,
    /// Backend key to inject as a bearer credential
    pub api_key: Option<String>,
    /// Path left after any consumed segment, without a leading `/`
    pub remaining_path: String,
    /// Strategy that matched
    pub strategy: Strategy,
}

impl ResolvedTarget {
    /// Whether a bearer credential should be added when the request has none
    pub const fn inject_auth(&self) -> bool {
        self.api_key.is_some()
    }

    /// Join base URL, remaining path and an optional query string
    pub fn url(&self, query: Option<&str>) -> String {
        let mut url = format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            self.remaining_path.trim_start_matches('/')
        );
        if let Some(query) = query.filter(|q| !q.is_empty()) {
            url.push('?');
            url.push_str(query);
        }
        url
    }
}

impl fmt::Debug for ResolvedTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolvedTarget")
            .field("base_url", &self.base_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("remaining_path", &self.remaining_path)
            .field("strategy", &self.strategy)
            .finish()
    }
}

/// Resolves proxied requests against the secret store
#[derive(Debug, Clone)]
pub struct TargetResolver {
    store: Arc<SecretStore>,
    substituter: Substituter,
}

impl TargetResolver {
    /// Create a resolver reading from `store`
    pub fn new(store: Arc<SecretStore>) -> Self {
        let substituter = Substituter::new(Arc::clone(&store));
        Self { store, substituter }
    }

    /// Resolve `path` (leading and trailing `/` ignored) with its raw query string
    pub fn resolve(&self, path: &str, raw_query: Option<&str>) -> Result<ResolvedTarget, GatewayError> {
        let path = path.trim_matches('/');
        let query: Vec<(String, String)> = raw_query
            .map(|q| form_urlencoded::parse(q.as_bytes()).into_owned().collect())
            .unwrap_or_default();

        let (segment, rest) = match path.split_once('/') {
            Some((segment, rest)) => (segment, Some(rest)),
            None => (path, None),
        };

        let candidate = match Self::from_target_param(&query, path) {
            Some(target) => Some(target),
            None => self
                .from_config_name(segment, rest, path)?
                .or_else(|| rest.and_then(|rest| self.from_service_path(segment, rest)))
                .or_else(|| self.from_service_param(&query, path))
                .or_else(|| rest.and_then(|rest| self.from_derived_url(segment, rest)))
                .or_else(|| self.from_default(path)),
        };

        let Some(mut target) = candidate else {
            return Err(GatewayError::no_route(path));
        };

        target.base_url = self.substituter.interpolate(&target.base_url).into_owned();
        if target.base_url.trim().is_empty() {
            return Err(GatewayError::no_route(path));
        }

        info!(
            strategy = %target.strategy,
            base_url = %target.base_url,
            inject_auth = target.inject_auth(),
            "Resolved proxy target"
        );
        Ok(target)
    }

    fn from_target_param(query: &[(String, String)], path: &str) -> Option<ResolvedTarget> {
        let base_url = query_param(query, "target")?;
        Some(ResolvedTarget {
            base_url: base_url.to_owned(),
            api_key: None,
            remaining_path: path.to_owned(),
            strategy: Strategy::TargetParam,
        })
    }

    /// A segment naming a store entry is the route. Entries whose interpolated
    /// value is not an http(s) URL fail closed, so a credential entry can
    /// never become a request target nor fall through to another backend.
    fn from_config_name(
        &self,
        segment: &str,
        rest: Option<&str>,
        path: &str,
    ) -> Result<Option<ResolvedTarget>, GatewayError> {
        let Some(value) = self.store.get(segment) else {
            return Ok(None);
        };
        if !is_http_url(&self.substituter.interpolate(value)) {
            debug!(name = segment, "Configuration name is not a URL, refusing to route");
            return Err(GatewayError::no_route(path));
        }

        let api_key = [BASE_URL_SUFFIX, API_URL_SUFFIX]
            .iter()
            .find_map(|suffix| segment.strip_suffix(suffix))
            .and_then(|prefix| self.store.get(&format!("{prefix}{API_KEY_SUFFIX}")))
            .map(ToOwned::to_owned);

        Ok(Some(ResolvedTarget {
            base_url: value.to_owned(),
            api_key,
            remaining_path: rest.unwrap_or_default().to_owned(),
            strategy: Strategy::ConfigName,
        }))
    }

    fn from_service_path(&self, segment: &str, rest: &str) -> Option<ResolvedTarget> {
        let service = segment.to_uppercase();
        if !SUPPORTED_SERVICES.contains(&service.as_str()) {
            return None;
        }
        let (base_url, api_key) = self.store.service_credentials(&service)?;
        Some(ResolvedTarget {
            base_url: base_url.to_owned(),
            api_key: Some(api_key.to_owned()),
            remaining_path: rest.to_owned(),
            strategy: Strategy::ServicePath,
        })
    }

    fn from_service_param(&self, query: &[(String, String)], path: &str) -> Option<ResolvedTarget> {
        let service = query_param(query, "service")?;
        let (base_url, api_key) = self.store.service_credentials(service)?;
        Some(ResolvedTarget {
            base_url: base_url.to_owned(),
            api_key: Some(api_key.to_owned()),
            remaining_path: path.to_owned(),
            strategy: Strategy::ServiceParam,
        })
    }

    fn from_derived_url(&self, segment: &str, rest: &str) -> Option<ResolvedTarget> {
        let prefix = segment.to_uppercase();
        let base_url = self.store.get(&format!("{prefix}{API_URL_SUFFIX}"))?;
        Some(ResolvedTarget {
            base_url: base_url.to_owned(),
            api_key: self
                .store
                .get(&format!("{prefix}{API_KEY_SUFFIX}"))
                .map(ToOwned::to_owned),
            remaining_path: rest.to_owned(),
            strategy: Strategy::DerivedUrl,
        })
    }

    fn from_default(&self, path: &str) -> Option<ResolvedTarget> {
        let base_url = self.store.get(DEFAULT_API_URL_KEY).filter(|u| !u.is_empty())?;
        Some(ResolvedTarget {
            base_url: base_url.to_owned(),
            api_key: None,
            remaining_path: path.to_owned(),
            strategy: Strategy::Default,
        })
    }
}

/// First non-empty value of a query parameter
fn query_param<'a>(query: &'a [(String, String)], name: &str) -> Option<&'a str> {
    query
        .iter()
        .find(|(k, _)| k == name)
        .map(|(_, v)| v.as_str())
        .filter(|v| !v.is_empty())
}

fn is_http_url(value: &str) -> bool {
    url::Url::parse(value).is_ok_and(|u| matches!(u.scheme(), "http" | "https"))
}
