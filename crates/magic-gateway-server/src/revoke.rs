// ABOUTME: POST /revoke and POST /revoke-all handlers
// ABOUTME: Single-token revocation is acknowledged only; revoke-all moves the global cutoff to now
//
// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2026 dravr.ai

use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use tracing::{info, warn};

use crate::api_types::{error_response, RevokeAllResponse, RevokeRequest, RevokeResponse};
use crate::state::SharedState;

/// Handle POST /revoke
///
/// Tokens are not stored, so a single id cannot be revoked. The request
/// is validated and acknowledged, pointing callers at `/revoke-all`.
pub async fn handle(body: Bytes) -> Response {
    let request: RevokeRequest = match serde_json::from_slice(&body) {
        Ok(r) => r,
        Err(e) => {
            warn!(error = %e, "Invalid /revoke body");
            return error_response(
                StatusCode::BAD_REQUEST,
                "invalid_request_error",
                "Request body must be JSON with a token_id field",
            );
        }
    };

    info!(token_id = %request.token_id, "Single-token revocation requested (not supported)");
    Json(RevokeResponse {
        success: true,
        message: "Single tokens cannot be revoked in stateless mode; use /revoke-all",
    })
    .into_response()
}

/// Handle POST /revoke-all
pub async fn handle_all(State(state): State<SharedState>) -> impl IntoResponse {
    let revoke_timestamp = state.authority().revoke_all();
    Json(RevokeAllResponse {
        success: true,
        message: "All previously issued tokens have been revoked",
        revoke_timestamp,
    })
}
