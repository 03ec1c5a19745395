// ABOUTME: POST /api/ai-generated/sign-metadata and sign-payload handlers
// ABOUTME: Produce base64 Ed25519 detached signatures; answer 503 when no key is configured
//
// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2026 dravr.ai

use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::de::DeserializeOwned;
use tracing::{info, warn};

use crate::api_types::{
    error_response, gateway_error_to_response, SignMetadataRequest, SignPayloadRequest,
    SignResponse,
};
use crate::state::SharedState;

/// Handle POST /api/ai-generated/sign-metadata
pub async fn metadata(State(state): State<SharedState>, body: Bytes) -> Response {
    let Some(signer) = state.signer() else {
        return signing_unavailable();
    };
    let request: SignMetadataRequest = match parse_body(&body) {
        Ok(r) => r,
        Err(response) => return response,
    };

    match signer.sign_metadata(&serde_json::Value::Object(request.metadata)) {
        Ok(signature) => {
            info!("Signed AI-generated metadata");
            Json(SignResponse { signature }).into_response()
        }
        Err(e) => gateway_error_to_response(&e),
    }
}

/// Handle POST /api/ai-generated/sign-payload
pub async fn payload(State(state): State<SharedState>, body: Bytes) -> Response {
    let Some(signer) = state.signer() else {
        return signing_unavailable();
    };
    let request: SignPayloadRequest = match parse_body(&body) {
        Ok(r) => r,
        Err(response) => return response,
    };
    if request.payload.is_empty() {
        return error_response(
            StatusCode::BAD_REQUEST,
            "invalid_request_error",
            "payload is required",
        );
    }

    info!(bytes = request.payload.len(), "Signed AI-generated payload");
    Json(SignResponse {
        signature: signer.sign_bytes(request.payload.as_bytes()),
    })
    .into_response()
}

fn parse_body<T: DeserializeOwned>(body: &[u8]) -> Result<T, Response> {
    serde_json::from_slice(body).map_err(|e| {
        warn!(error = %e, "Invalid signing request body");
        error_response(
            StatusCode::BAD_REQUEST,
            "invalid_request_error",
            "Invalid request body",
        )
    })
}

fn signing_unavailable() -> Response {
    error_response(
        StatusCode::SERVICE_UNAVAILABLE,
        "signing_unavailable",
        "Signing is not configured on this gateway",
    )
}
