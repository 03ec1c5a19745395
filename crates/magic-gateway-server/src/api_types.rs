// ABOUTME: Request/response envelope types for the gateway's own endpoints
// ABOUTME: Shared JSON error envelope and the mapping from gateway error kinds to HTTP statuses
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2026 dravr.ai

use std::collections::BTreeMap;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use magic_gateway::types::{ErrorKind, GatewayError, ServiceInfo};
use serde::{Deserialize, Serialize};
use tracing::{error, warn};

// ============================================================================
// Token Exchange
// ============================================================================

/// Response to `POST /auth`
#[derive(Debug, Serialize, Deserialize)]
pub struct AuthResponse {
    /// Signed bearer token
    pub token: String,
    /// Header the token should be sent in
    pub header: String,
    /// Ready-to-use header line
    pub example: String,
    /// Usage hint
    pub note: String,
    /// Security properties of the token
    pub security: String,
}

// ============================================================================
// Reporting
// ============================================================================

/// Response to `GET /status`
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    /// Always "ok"
    pub status: &'static str,
    /// Gateway version
    pub version: String,
    /// Always `stateless_jwt`
    pub auth_mode: &'static str,
    /// Human-readable validity window
    pub token_validity: String,
    /// Reportable configuration names
    pub env_vars_available: Vec<String>,
    /// Services with both base URL and key configured
    pub services_available: Vec<&'static str>,
    /// Latest issued token version
    pub current_token_version: u64,
    /// Active revocation cutoff
    pub global_revoke_timestamp: u64,
    /// Signing key fingerprint
    pub jwt_key_id: String,
    /// Token signing algorithm
    pub jwt_algorithm: &'static str,
}

/// Response to `GET /env` without `vars`
#[derive(Debug, Serialize)]
pub struct EnvListResponse {
    /// Reportable configuration names
    pub available_vars: Vec<String>,
    /// Usage hint
    pub message: &'static str,
}

/// Response to `GET /env?vars=...`
#[derive(Debug, Serialize)]
pub struct EnvStatusResponse {
    /// Availability per requested name
    pub available_status: BTreeMap<String, bool>,
    /// Usage hint
    pub message: &'static str,
}

/// Response to `GET /services`
#[derive(Debug, Serialize)]
pub struct ServicesResponse {
    /// Configured backend services
    pub available_services: Vec<ServiceInfo>,
    /// Usage hint
    pub message: &'static str,
}

// ============================================================================
// Revocation
// ============================================================================

/// Body of `POST /revoke`
#[derive(Debug, Deserialize)]
pub struct RevokeRequest {
    /// Token id the caller wants revoked
    pub token_id: String,
}

/// Response to `POST /revoke`
#[derive(Debug, Serialize)]
pub struct RevokeResponse {
    /// Always true
    pub success: bool,
    /// Explains that single tokens cannot be revoked
    pub message: &'static str,
}

/// Response to `POST /revoke-all`
#[derive(Debug, Serialize)]
pub struct RevokeAllResponse {
    /// Always true
    pub success: bool,
    /// Confirmation
    pub message: &'static str,
    /// New revocation cutoff
    pub revoke_timestamp: u64,
}

// ============================================================================
// Signing
// ============================================================================

/// Body of `POST /api/ai-generated/sign-metadata`
#[derive(Debug, Deserialize)]
pub struct SignMetadataRequest {
    /// Metadata object to sign
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

/// Body of `POST /api/ai-generated/sign-payload`
#[derive(Debug, Deserialize)]
pub struct SignPayloadRequest {
    /// Payload text to sign
    pub payload: String,
}

/// Response from both signing endpoints
#[derive(Debug, Serialize)]
pub struct SignResponse {
    /// Base64 Ed25519 signature
    pub signature: String,
}

// ============================================================================
// Error Response
// ============================================================================

/// Error envelope returned by every gateway-generated failure
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Error details
    pub error: ErrorDetail,
}

/// Error detail within an [`ErrorResponse`]
#[derive(Debug, Serialize)]
pub struct ErrorDetail {
    /// Error message
    pub message: String,
    /// Error type
    #[serde(rename = "type")]
    pub error_type: String,
}

impl ErrorResponse {
    /// Build an error response with the given type and message
    pub fn new(error_type: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: ErrorDetail {
                message: message.into(),
                error_type: error_type.into(),
            },
        }
    }
}

/// Convert a gateway error into an HTTP response
pub fn gateway_error_to_response(err: &GatewayError) -> Response {
    let (status, error_type) = match err.kind {
        ErrorKind::Config => (StatusCode::INTERNAL_SERVER_ERROR, "configuration_error"),
        ErrorKind::AuthFailure => (StatusCode::UNAUTHORIZED, "authentication_error"),
        ErrorKind::NoRoute => (StatusCode::NOT_FOUND, "no_route_error"),
        ErrorKind::InvalidRequest => (StatusCode::BAD_REQUEST, "invalid_request_error"),
        ErrorKind::ExternalService => (StatusCode::BAD_GATEWAY, "external_service_error"),
        ErrorKind::Timeout => (StatusCode::GATEWAY_TIMEOUT, "timeout_error"),
        ErrorKind::Internal => (StatusCode::INTERNAL_SERVER_ERROR, "server_error"),
    };

    if is_server_fault(err.kind) {
        error!(kind = ?err.kind, message = %err.message, "Gateway error");
    } else {
        warn!(kind = ?err.kind, message = %err.message, "Request failed");
    }
    let body = ErrorResponse::new(error_type, &err.message);
    (status, Json(body)).into_response()
}

/// Failures caused by the gateway itself rather than the caller or a backend
const fn is_server_fault(kind: ErrorKind) -> bool {
    matches!(kind, ErrorKind::Config | ErrorKind::Internal)
}

/// Build an error response with a given status, type, and message
pub fn error_response(status: StatusCode, error_type: &str, message: &str) -> Response {
    let body = ErrorResponse::new(error_type, message);
    (status, Json(body)).into_response()
}
