// ABOUTME: GET /status handler reporting gateway version, counters, key id, and available names
// ABOUTME: Public endpoint; reports configuration names and services but never values or keys
//
// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2026 dravr.ai

use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use magic_gateway::token::TOKEN_VALIDITY;

use crate::api_types::StatusResponse;
use crate::state::SharedState;

const SECONDS_PER_DAY: u64 = 24 * 60 * 60;

/// Handle GET /status
pub async fn handle(State(state): State<SharedState>) -> impl IntoResponse {
    let authority = state.authority();
    Json(StatusResponse {
        status: "ok",
        version: state.config().version.clone(),
        auth_mode: "stateless_jwt",
        token_validity: format!("{} days", TOKEN_VALIDITY.as_secs() / SECONDS_PER_DAY),
        env_vars_available: state.store().available_names(),
        services_available: state.store().available_services(),
        current_token_version: authority.current_version(),
        global_revoke_timestamp: authority.revoke_timestamp(),
        jwt_key_id: authority.key_id().to_owned(),
        jwt_algorithm: "HS256",
    })
}
