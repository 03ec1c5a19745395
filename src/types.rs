// ABOUTME: Core types for the gateway: errors, caller identity, service descriptors
// ABOUTME: Shared by the token authority, resolver, and the HTTP server crate
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2026 dravr.ai

//! # Core Types
//!
//! Self-contained type definitions shared across the gateway core.
//! The HTTP layer maps [`ErrorKind`] to status codes; nothing in this
//! crate depends on an HTTP framework.

use std::fmt;

use serde::{Deserialize, Serialize};

// ============================================================================
// Error Type
// ============================================================================

/// Error type for gateway operations
#[derive(Debug, Clone)]
pub struct GatewayError {
    /// Error category
    pub kind: ErrorKind,
    /// Human-readable error message
    pub message: String,
}

/// Categories of errors produced by the gateway
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Internal error (bug, unexpected state)
    Internal,
    /// Startup configuration is missing or malformed
    Config,
    /// Credential missing, forged, expired, or revoked
    AuthFailure,
    /// No backend could be resolved for a proxied request
    NoRoute,
    /// Caller sent a request the gateway cannot act on
    InvalidRequest,
    /// Upstream backend unreachable or failed mid-transfer
    ExternalService,
    /// Upstream backend did not answer within the configured timeout
    Timeout,
}

impl GatewayError {
    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::Internal,
            message: message.into(),
        }
    }

    /// Create a config error
    pub fn config(message: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::Config,
            message: message.into(),
        }
    }

    /// Create an auth failure error
    pub fn auth_failure(message: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::AuthFailure,
            message: message.into(),
        }
    }

    /// Create a no-route error for an unresolvable proxy path
    pub fn no_route(path: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::NoRoute,
            message: format!("No backend configured for path: /{}", path.into()),
        }
    }

    /// Create an invalid request error
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::InvalidRequest,
            message: message.into(),
        }
    }

    /// Create an external service error
    pub fn external_service(service: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::ExternalService,
            message: format!("{}: {}", service.into(), message.into()),
        }
    }

    /// Create a timeout error
    pub fn timeout(message: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::Timeout,
            message: message.into(),
        }
    }
}

impl fmt::Display for GatewayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}: {}", self.kind, self.message)
    }
}

impl std::error::Error for GatewayError {}

// ============================================================================
// Caller Identity
// ============================================================================

/// Subject used when a caller presents no identity at all
pub const DEFAULT_SUBJECT: &str = "default-user";

/// Identity attributes a caller presents when exchanging the gateway key for a token
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallerIdentity {
    /// Explicit user id (`X-USER-ID`)
    pub user_id: Option<String>,
    /// Identity asserted by an upstream service (`magic-user-id`)
    pub upstream_user_id: Option<String>,
    /// Organization code (`magic-organization-code`)
    pub organization_code: Option<String>,
}

impl CallerIdentity {
    /// Resolve the token subject: explicit id, else upstream id, else the default
    pub fn subject(&self) -> &str {
        non_empty(self.user_id.as_deref())
            .or_else(|| non_empty(self.upstream_user_id.as_deref()))
            .unwrap_or(DEFAULT_SUBJECT)
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}

// ============================================================================
// Service Descriptors
// ============================================================================

/// Public description of a configured backend service; never carries its key
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceInfo {
    /// Upper-case service identifier (e.g. `OPENAI`)
    pub name: String,
    /// Bare host of the configured base URL
    pub base_url: String,
    /// Default model, when `{SERVICE}_MODEL` is configured
    #[serde(rename = "default_model", skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}
