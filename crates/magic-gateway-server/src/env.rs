// ABOUTME: GET /env handler reporting which configuration names can be referenced
// ABOUTME: Lists reportable names or answers per-name availability for `vars=A,B`; never returns values
//
// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2026 dravr.ai

use std::collections::HashMap;

use axum::extract::{Query, State};
use axum::response::{IntoResponse, Response};
use axum::Json;
use magic_gateway::config::parse_name_list;
use tracing::info;

use crate::api_types::{EnvListResponse, EnvStatusResponse};
use crate::state::SharedState;

const ENV_MESSAGE: &str =
    "Configuration values are never returned; reference these names through proxied requests";

/// Handle GET /env
pub async fn handle(
    State(state): State<SharedState>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    let available = state.store().available_names();
    let requested = params
        .get("vars")
        .map(|v| parse_name_list(v))
        .unwrap_or_default();

    if requested.is_empty() {
        return Json(EnvListResponse {
            available_vars: available,
            message: ENV_MESSAGE,
        })
        .into_response();
    }

    info!(requested = requested.len(), "Configuration availability check");
    let available_status = requested
        .into_iter()
        .map(|name| {
            let found = available.contains(&name);
            (name, found)
        })
        .collect();

    Json(EnvStatusResponse {
        available_status,
        message: ENV_MESSAGE,
    })
    .into_response()
}
