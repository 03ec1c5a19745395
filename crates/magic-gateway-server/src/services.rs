// ABOUTME: GET /services handler listing configured backend services
// ABOUTME: Reports service name, bare host, and default model; keys are never included
//
// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2026 dravr.ai

use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;

use crate::api_types::ServicesResponse;
use crate::state::SharedState;

/// Handle GET /services
pub async fn handle(State(state): State<SharedState>) -> impl IntoResponse {
    Json(ServicesResponse {
        available_services: state.store().service_descriptors(),
        message: "Call these services through the proxy as /{service}/path or with env: references",
    })
}
