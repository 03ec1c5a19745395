// ABOUTME: Bearer token middleware plus the POST /auth token exchange handler
// ABOUTME: Verifies gateway tokens, republishes caller identity headers, and logs requests in debug mode
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2026 dravr.ai

use axum::extract::{Request, State};
use axum::http::{HeaderMap, HeaderName, HeaderValue};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use magic_gateway::types::{CallerIdentity, GatewayError};
use magic_gateway::Claims;
use subtle::ConstantTimeEq;
use tracing::{debug, info, warn};

use crate::api_types::{gateway_error_to_response, AuthResponse};
use crate::state::SharedState;

/// Preferred header carrying the gateway token
pub const GATEWAY_AUTH_HEADER: &str = "magic-authorization";

/// Header carrying the shared gateway key at `/auth`
pub const GATEWAY_KEY_HEADER: &str = "x-gateway-api-key";

/// Explicit caller id
pub const USER_ID_HEADER: &str = "x-user-id";

/// Identity asserted by an upstream service
pub const MAGIC_USER_ID_HEADER: &str = "magic-user-id";

/// Caller organization
pub const ORGANIZATION_HEADER: &str = "magic-organization-code";

/// Routes reachable without a bearer token
const PUBLIC_PATHS: &[&str] = &["/auth", "/status"];

/// Headers whose values are never logged
const REDACTED_HEADERS: &[&str] = &[GATEWAY_AUTH_HEADER, GATEWAY_KEY_HEADER, "authorization"];

/// Which header carried the verified gateway token
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialSource {
    /// `Magic-Authorization`
    GatewayHeader,
    /// Standard `Authorization` fallback
    AuthorizationHeader,
}

/// Middleware enforcing a valid gateway token on every non-public route
///
/// On success the verified [`Claims`] and [`CredentialSource`] are stored
/// in request extensions, and identity headers are added only where the
/// caller did not already send them.
pub async fn require_token(
    State(state): State<SharedState>,
    mut request: Request,
    next: Next,
) -> Response {
    if PUBLIC_PATHS.contains(&request.uri().path()) {
        return next.run(request).await;
    }

    let Some((credential, source)) = presented_credential(request.headers()) else {
        return auth_error("Missing authorization header");
    };

    let Ok(claims) = state.authority().verify(&credential) else {
        return auth_error("Invalid or expired token");
    };

    if state.config().debug {
        log_request(&request, &claims);
    }

    publish_identity(request.headers_mut(), &claims);
    request.extensions_mut().insert(source);
    request.extensions_mut().insert(claims);
    next.run(request).await
}

/// Handle POST /auth
///
/// Exchanges the shared gateway key for a signed token bound to the
/// caller identity presented in headers.
pub async fn issue_token(State(state): State<SharedState>, headers: HeaderMap) -> Response {
    let presented = header_str(&headers, GATEWAY_KEY_HEADER).unwrap_or_default();
    if !keys_match(presented, state.store().signing_secret()) {
        warn!("Gateway API key missing or mismatched at /auth");
        return auth_error("Invalid gateway API key");
    }

    let identity = CallerIdentity {
        user_id: header_string(&headers, USER_ID_HEADER),
        upstream_user_id: header_string(&headers, MAGIC_USER_ID_HEADER),
        organization_code: header_string(&headers, ORGANIZATION_HEADER),
    };

    match state.authority().issue(&identity) {
        Ok(issued) => {
            info!(subject = %issued.claims.subject_id, "Token exchange succeeded");
            Json(AuthResponse {
                example: format!("Magic-Authorization: Bearer {}", issued.token),
                token: issued.token,
                header: "Magic-Authorization".to_owned(),
                note: "Send the token with a Bearer prefix; the gateway adds it when missing"
                    .to_owned(),
                security: "Token carries an anti-replay nonce and the signing key version"
                    .to_owned(),
            })
            .into_response()
        }
        Err(e) => gateway_error_to_response(&e),
    }
}

/// Token from `Magic-Authorization`, else from `Authorization`
fn presented_credential(headers: &HeaderMap) -> Option<(String, CredentialSource)> {
    let (value, source) = header_str(headers, GATEWAY_AUTH_HEADER)
        .filter(|v| !v.is_empty())
        .map(|v| (v, CredentialSource::GatewayHeader))
        .or_else(|| {
            header_str(headers, "authorization")
                .filter(|v| !v.is_empty())
                .map(|v| (v, CredentialSource::AuthorizationHeader))
        })?;
    Some((value.to_owned(), source))
}

fn publish_identity(headers: &mut HeaderMap, claims: &Claims) {
    let upstream = claims
        .upstream_user_id
        .as_deref()
        .unwrap_or(&claims.subject_id);
    set_if_absent(headers, USER_ID_HEADER, &claims.subject_id);
    set_if_absent(headers, MAGIC_USER_ID_HEADER, upstream);
    if let Some(org) = claims.org_code.as_deref() {
        set_if_absent(headers, ORGANIZATION_HEADER, org);
    }
}

fn set_if_absent(headers: &mut HeaderMap, name: &'static str, value: &str) {
    if headers.get(name).is_some_and(|v| !v.is_empty()) {
        return;
    }
    match HeaderValue::from_str(value) {
        Ok(value) => {
            headers.insert(HeaderName::from_static(name), value);
        }
        Err(e) => warn!(header = name, error = %e, "Identity claim is not a valid header value"),
    }
}

fn log_request(request: &Request, claims: &Claims) {
    debug!(
        method = %request.method(),
        uri = %request.uri(),
        subject = %claims.subject_id,
        headers = ?loggable_headers(request.headers()),
        "Inbound request"
    );
}

/// `name: value` lines with credential-bearing values replaced
fn loggable_headers(headers: &HeaderMap) -> Vec<String> {
    headers
        .iter()
        .map(|(name, value)| {
            let shown = if REDACTED_HEADERS.contains(&name.as_str()) {
                "<redacted>"
            } else {
                value.to_str().unwrap_or("<binary>")
            };
            format!("{name}: {shown}")
        })
        .collect()
}

fn keys_match(presented: &str, expected: &str) -> bool {
    !presented.is_empty() && bool::from(presented.as_bytes().ct_eq(expected.as_bytes()))
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

fn header_string(headers: &HeaderMap, name: &str) -> Option<String> {
    header_str(headers, name)
        .filter(|v| !v.is_empty())
        .map(ToOwned::to_owned)
}

/// Build a 401 error response
fn auth_error(message: &str) -> Response {
    gateway_error_to_response(&GatewayError::auth_failure(message))
}
