// ABOUTME: Axum router wiring the gateway endpoints and the fallback proxy
// ABOUTME: Applies the bearer token middleware globally, skipping only /auth and /status
//
// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2026 dravr.ai

use axum::middleware;
use axum::routing::{get, post};
use axum::Router;

use crate::auth;
use crate::env;
use crate::proxy;
use crate::revoke;
use crate::services;
use crate::sign;
use crate::status;
use crate::state::SharedState;

/// Build the application router with all endpoints
///
/// Routes:
/// - `POST /auth`: exchange the gateway key for a token (public)
/// - `GET /status`: counters, key id, available names (public)
/// - `GET /env`: configuration name availability
/// - `GET /services`: configured backend services
/// - `POST /revoke`: acknowledged no-op
/// - `POST /revoke-all`: invalidate every earlier token
/// - `POST /api/ai-generated/sign-metadata` and `sign-payload`: Ed25519 signatures
/// - anything else: proxied to a resolved backend
pub fn build(state: SharedState) -> Router {
    Router::new()
        .route("/auth", post(auth::issue_token))
        .route("/status", get(status::handle))
        .route("/env", get(env::handle))
        .route("/services", get(services::handle))
        .route("/revoke", post(revoke::handle))
        .route("/revoke-all", post(revoke::handle_all))
        .route("/api/ai-generated/sign-metadata", post(sign::metadata))
        .route("/api/ai-generated/sign-payload", post(sign::payload))
        .fallback(proxy::handle)
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_token,
        ))
        .with_state(state)
}
