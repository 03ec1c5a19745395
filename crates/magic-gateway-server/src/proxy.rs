// ABOUTME: Fallback proxy handler forwarding authenticated requests to resolved backends
// ABOUTME: Resolves the target, substitutes references in headers/query/body, injects keys, relays the response
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2026 dravr.ai

//! # Proxy Forwarder
//!
//! Stages run strictly in order for each request: resolve the target,
//! rewrite headers and query, rewrite the JSON body, inject inline
//! credentials for special backends, send, then stream the response back.
//! The inbound body is buffered once so it can be both inspected and sent.

use std::borrow::Cow;

use axum::body::{Body, Bytes};
use axum::extract::{Request, State};
use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::http::{HeaderMap, HeaderValue};
use axum::response::Response;
use futures::TryStreamExt;
use magic_gateway::types::GatewayError;
use magic_gateway::{Claims, ResolvedTarget};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::api_types::gateway_error_to_response;
use crate::auth::{CredentialSource, GATEWAY_AUTH_HEADER, GATEWAY_KEY_HEADER};
use crate::state::{ServerState, SharedState};

/// Gateway endpoint names that are never proxied
const RESERVED_PATHS: &[&str] = &["auth", "env", "status", "revoke", "revoke-all", "services"];

/// Headers never copied between the caller and the backend
const SKIP_HEADERS: &[&str] = &["host", "content-length", "connection", "x-forwarded-for"];

/// Credentials meant for the gateway only
const GATEWAY_ONLY_HEADERS: &[&str] = &[GATEWAY_AUTH_HEADER, GATEWAY_KEY_HEADER];

/// Caller context forwarded without substitution
const PASS_THROUGH_HEADERS: &[&str] = &[
    "magic-task-id",
    "magic-topic-id",
    "magic-chat-topic-id",
    "magic-language",
];

/// Handle any request not matched by a gateway route
pub async fn handle(State(state): State<SharedState>, request: Request) -> Response {
    match forward(&state, request).await {
        Ok(response) => response,
        Err(e) => gateway_error_to_response(&e),
    }
}

async fn forward(state: &ServerState, request: Request) -> Result<Response, GatewayError> {
    let path = request.uri().path().trim_matches('/').to_owned();
    if RESERVED_PATHS.contains(&path.as_str()) {
        return Err(GatewayError::no_route(path));
    }
    let raw_query = request.uri().query().map(ToOwned::to_owned);

    let target = state.resolver().resolve(&path, raw_query.as_deref())?;

    let (parts, body) = request.into_parts();
    let source = parts.extensions.get::<CredentialSource>().copied();
    let subject = parts
        .extensions
        .get::<Claims>()
        .map(|c| c.subject_id.clone())
        .unwrap_or_default();

    let mut headers = outbound_headers(state, &parts.headers, source);
    inject_authorization(&mut headers, &target);

    let query = raw_query
        .as_deref()
        .map(|q| state.substituter().rewrite_query(q));
    let url = target.url(query.as_deref());

    let body = axum::body::to_bytes(body, usize::MAX)
        .await
        .map_err(|e| GatewayError::invalid_request(format!("Failed to read request body: {e}")))?;
    let body = rewrite_body(state, &parts.headers, &target, body);

    info!(
        method = %parts.method,
        path = %path,
        subject = %subject,
        strategy = %target.strategy,
        upstream = %target.url(None),
        "Proxying request"
    );

    let upstream = state
        .client()
        .request(parts.method, url)
        .headers(headers)
        .body(body)
        .send()
        .await
        .map_err(|e| transport_error(e.without_url()))?;

    relay(state, upstream)
}

/// Copy inbound headers, substituting references in every value
fn outbound_headers(
    state: &ServerState,
    inbound: &HeaderMap,
    source: Option<CredentialSource>,
) -> HeaderMap {
    let mut out = HeaderMap::with_capacity(inbound.len());
    for (name, value) in inbound {
        let key = name.as_str();
        if SKIP_HEADERS.contains(&key) || GATEWAY_ONLY_HEADERS.contains(&key) {
            continue;
        }
        // The gateway token itself arrived in Authorization
        if *name == AUTHORIZATION && source == Some(CredentialSource::AuthorizationHeader) {
            continue;
        }
        if PASS_THROUGH_HEADERS.contains(&key) {
            out.append(name.clone(), value.clone());
            continue;
        }

        let rewritten = value
            .to_str()
            .ok()
            .map(|text| state.substituter().substitute_header(key, text));
        match rewritten {
            Some(Cow::Owned(new_value)) => match HeaderValue::from_str(&new_value) {
                Ok(mut v) => {
                    v.set_sensitive(true);
                    debug!(header = key, "Substituted header value");
                    out.append(name.clone(), v);
                }
                Err(e) => {
                    warn!(header = key, error = %e, "Substituted value is not a valid header");
                    out.append(name.clone(), value.clone());
                }
            },
            Some(Cow::Borrowed(_)) | None => {
                out.append(name.clone(), value.clone());
            }
        }
    }
    out
}

/// Add the resolved backend key unless the request already carries Authorization
fn inject_authorization(headers: &mut HeaderMap, target: &ResolvedTarget) {
    let Some(key) = target.api_key.as_deref() else {
        return;
    };
    if headers.contains_key(AUTHORIZATION) {
        debug!("Request already carries Authorization, backend key not injected");
        return;
    }
    match HeaderValue::from_str(&format!("Bearer {key}")) {
        Ok(mut value) => {
            value.set_sensitive(true);
            headers.insert(AUTHORIZATION, value);
            info!("Injected backend API key");
        }
        Err(e) => warn!(error = %e, "Backend API key is not a valid header value"),
    }
}

/// Substitute references and inject inline credentials in a JSON body
///
/// Unparseable bodies and failed re-encodings forward the original bytes.
fn rewrite_body(
    state: &ServerState,
    headers: &HeaderMap,
    target: &ResolvedTarget,
    body: Bytes,
) -> Bytes {
    if body.is_empty() || !is_json(headers) {
        return body;
    }
    let mut value: Value = match serde_json::from_slice(&body) {
        Ok(v) => v,
        Err(e) => {
            debug!(error = %e, "Body is not JSON, forwarding unchanged");
            return body;
        }
    };

    let substituted = state.substituter().substitute_value(&mut value);
    let injected = state.injector().inject(&target.base_url, &mut value);
    if !substituted && !injected {
        return body;
    }

    match serde_json::to_vec(&value) {
        Ok(encoded) => Bytes::from(encoded),
        Err(e) => {
            warn!(error = %e, "Failed to re-encode substituted body, forwarding original");
            body
        }
    }
}

/// JSON content type, or none declared
fn is_json(headers: &HeaderMap) -> bool {
    headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_none_or(|ct| ct.to_ascii_lowercase().contains("json"))
}

fn transport_error(e: reqwest::Error) -> GatewayError {
    warn!(error = %e, "Upstream request failed");
    if e.is_timeout() {
        GatewayError::timeout(format!("Upstream request timed out: {e}"))
    } else {
        GatewayError::external_service("Proxy error", e.to_string())
    }
}

/// Stream the backend response back with its status and headers
fn relay(state: &ServerState, upstream: reqwest::Response) -> Result<Response, GatewayError> {
    let status = upstream.status();
    info!(status = status.as_u16(), "Upstream responded");
    if state.config().debug {
        debug!(headers = ?upstream.headers(), "Upstream response headers");
    }

    let mut builder = axum::http::Response::builder().status(status);
    if let Some(headers) = builder.headers_mut() {
        for (name, value) in upstream.headers() {
            let key = name.as_str();
            if SKIP_HEADERS.contains(&key) || key == "transfer-encoding" {
                continue;
            }
            headers.append(name.clone(), value.clone());
        }
    }

    let stream = upstream
        .bytes_stream()
        .inspect_err(|e| warn!(error = %e, "Upstream body failed mid-transfer"));
    builder
        .body(Body::from_stream(stream))
        .map_err(|e| GatewayError::internal(format!("Failed to build response: {e}")))
}
