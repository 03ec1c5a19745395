// ABOUTME: Integration tests for the magic-gateway-server HTTP endpoints and proxy
// ABOUTME: Drives the router with tower oneshot and forwards to a throwaway local axum upstream
//
// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2026 dravr.ai

use std::sync::Arc;
use std::time::Duration;

use axum::body::{Body, Bytes};
use axum::http::{HeaderMap, Method, Request, StatusCode, Uri};
use axum::routing::any;
use axum::{Json, Router};
use http_body_util::BodyExt;
use magic_gateway::secrets::SIGNING_SECRET_KEY;
use magic_gateway::token::unix_timestamp;
use magic_gateway::types::CallerIdentity;
use magic_gateway::{ContentSigner, GatewayConfig, SecretStore};
use serde_json::{json, Value};
use tower::ServiceExt;

use magic_gateway_server::router;
use magic_gateway_server::state::{ServerState, SharedState};

const SECRET: &str = "integration-gateway-secret";
const SIGNING_SEED: &str = "BwcHBwcHBwcHBwcHBwcHBwcHBwcHBwcHBwcHBwcHBwc=";

/// Build shared state from extra store entries
fn test_state(pairs: &[(&str, String)]) -> SharedState {
    test_state_with(pairs, GatewayConfig::default())
}

fn test_state_with(pairs: &[(&str, String)], config: GatewayConfig) -> SharedState {
    let mut all: Vec<(String, String)> = vec![(SIGNING_SECRET_KEY.to_owned(), SECRET.to_owned())];
    all.extend(pairs.iter().map(|(k, v)| ((*k).to_owned(), v.clone())));
    let store = SecretStore::from_pairs(all).expect("store");
    Arc::new(ServerState::new(store, config).expect("state"))
}

fn issue_token(state: &SharedState) -> String {
    let identity = CallerIdentity {
        user_id: Some("user-1".to_owned()),
        upstream_user_id: None,
        organization_code: Some("org-1".to_owned()),
    };
    state.authority().issue(&identity).expect("issue").token
}

/// Send a request and parse the response body as JSON
async fn send_and_parse(app: Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.oneshot(request).await.expect("send request");
    let status = response.status();
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("collect")
        .to_bytes();
    let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, json)
}

fn authed(method: &str, uri: &str, token: &str) -> axum::http::request::Builder {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("magic-authorization", format!("Bearer {token}"))
}

/// Echo every detail of the forwarded request back as JSON
async fn echo(method: Method, uri: Uri, headers: HeaderMap, body: Bytes) -> Json<Value> {
    let headers: serde_json::Map<String, Value> = headers
        .iter()
        .map(|(k, v)| {
            (
                k.to_string(),
                Value::String(v.to_str().unwrap_or_default().to_owned()),
            )
        })
        .collect();
    Json(json!({
        "method": method.as_str(),
        "path": uri.path(),
        "query": uri.query(),
        "headers": headers,
        "body": String::from_utf8_lossy(&body),
    }))
}

/// Start a local upstream and return its base URL
async fn spawn_upstream() -> String {
    let app = Router::new()
        .route(
            "/slow",
            any(|| async {
                tokio::time::sleep(Duration::from_secs(3)).await;
                "too late"
            }),
        )
        .route(
            "/teapot",
            any(|| async { (StatusCode::IM_A_TEAPOT, [("x-upstream", "yes")], "short and stout") }),
        )
        .fallback(echo);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind upstream");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("serve upstream");
    });
    format!("http://{addr}")
}

fn forwarded_body(echoed: &Value) -> Value {
    serde_json::from_str(echoed["body"].as_str().expect("body string")).expect("json body")
}

// ============================================================================
// Public Endpoints
// ============================================================================

#[tokio::test]
async fn status_is_public_and_reports_counters() {
    let state = test_state(&[
        ("OPENAI_API_BASE_URL", "https://api.openai.com/v1".to_owned()),
        ("OPENAI_API_KEY", "sk-abc".to_owned()),
    ]);
    issue_token(&state);
    let key_id = state.authority().key_id().to_owned();

    let request = Request::builder()
        .uri("/status")
        .body(Body::empty())
        .expect("build request");
    let (status, json) = send_and_parse(router::build(state), request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "ok");
    assert_eq!(json["auth_mode"], "stateless_jwt");
    assert_eq!(json["jwt_algorithm"], "HS256");
    assert_eq!(json["jwt_key_id"], key_id);
    assert_eq!(json["current_token_version"], 1);
    assert_eq!(json["global_revoke_timestamp"], 0);
    assert_eq!(json["services_available"], json!(["OPENAI"]));
    assert_eq!(
        json["env_vars_available"],
        json!(["OPENAI_API_BASE_URL", "OPENAI_API_KEY"])
    );
}

#[tokio::test]
async fn auth_exchanges_gateway_key_for_token() {
    let state = test_state(&[]);
    let request = Request::builder()
        .method("POST")
        .uri("/auth")
        .header("x-gateway-api-key", SECRET)
        .header("x-user-id", "alice")
        .header("magic-organization-code", "acme")
        .body(Body::empty())
        .expect("build request");
    let (status, json) = send_and_parse(router::build(Arc::clone(&state)), request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["header"], "Magic-Authorization");
    let token = json["token"].as_str().expect("token");
    assert!(json["example"].as_str().expect("example").ends_with(token));

    let claims = state.authority().verify(token).expect("verify");
    assert_eq!(claims.subject_id, "alice");
    assert_eq!(claims.org_code.as_deref(), Some("acme"));
}

#[tokio::test]
async fn auth_rejects_wrong_or_missing_gateway_key() {
    let state = test_state(&[]);
    for key in [Some("wrong-secret"), None] {
        let mut builder = Request::builder().method("POST").uri("/auth");
        if let Some(key) = key {
            builder = builder.header("x-gateway-api-key", key);
        }
        let request = builder.body(Body::empty()).expect("build request");
        let (status, json) = send_and_parse(router::build(Arc::clone(&state)), request).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(json["error"]["type"], "authentication_error");
    }
    assert_eq!(state.authority().current_version(), 0);
}

// ============================================================================
// Auth Middleware
// ============================================================================

#[tokio::test]
async fn protected_routes_require_token() {
    let state = test_state(&[]);
    let request = Request::builder()
        .uri("/env")
        .body(Body::empty())
        .expect("build request");
    let (status, json) = send_and_parse(router::build(state), request).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(json["error"]["type"], "authentication_error");
}

#[tokio::test]
async fn forged_token_gets_generic_rejection() {
    let state = test_state(&[]);
    let request = authed("GET", "/env", "eyJhbGciOiJub25lIn0.e30.")
        .body(Body::empty())
        .expect("build request");
    let (status, json) = send_and_parse(router::build(state), request).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(json["error"]["message"], "Invalid or expired token");
}

#[tokio::test]
async fn authorization_fallback_accepts_token_without_bearer_prefix() {
    let state = test_state(&[]);
    let token = issue_token(&state);
    let request = Request::builder()
        .uri("/services")
        .header("authorization", token)
        .body(Body::empty())
        .expect("build request");
    let (status, _) = send_and_parse(router::build(state), request).await;

    assert_eq!(status, StatusCode::OK);
}

// ============================================================================
// Reporting Endpoints
// ============================================================================

#[tokio::test]
async fn env_reports_availability_without_values() {
    let state = test_state(&[("OPENAI_API_KEY", "sk-secret-value".to_owned())]);
    let token = issue_token(&state);
    let app = router::build(state);

    let request = authed("GET", "/env?vars=OPENAI_API_KEY,%20HOME,MAGIC_GATEWAY_API_KEY", &token)
        .body(Body::empty())
        .expect("build request");
    let (status, json) = send_and_parse(app.clone(), request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        json["available_status"],
        json!({"OPENAI_API_KEY": true, "HOME": false, "MAGIC_GATEWAY_API_KEY": false})
    );
    assert!(!json.to_string().contains("sk-secret-value"));

    let request = authed("GET", "/env", &token)
        .body(Body::empty())
        .expect("build request");
    let (_, json) = send_and_parse(app, request).await;
    assert_eq!(json["available_vars"], json!(["OPENAI_API_KEY"]));
}

#[tokio::test]
async fn services_lists_hosts_and_models_only() {
    let state = test_state(&[
        ("DEEPSEEK_API_BASE_URL", "https://api.deepseek.com/v1".to_owned()),
        ("DEEPSEEK_API_KEY", "ds-secret".to_owned()),
        ("DEEPSEEK_MODEL", "deepseek-chat".to_owned()),
        ("MAGIC_API_BASE_URL", "https://magic.example.com".to_owned()),
    ]);
    let token = issue_token(&state);
    let request = authed("GET", "/services", &token)
        .body(Body::empty())
        .expect("build request");
    let (status, json) = send_and_parse(router::build(state), request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        json["available_services"],
        json!([{"name": "DEEPSEEK", "base_url": "api.deepseek.com", "default_model": "deepseek-chat"}])
    );
    assert!(!json.to_string().contains("ds-secret"));
}

// ============================================================================
// Revocation
// ============================================================================

#[tokio::test]
async fn revoke_requires_token_id_body() {
    let state = test_state(&[]);
    let token = issue_token(&state);
    let app = router::build(state);

    let request = authed("POST", "/revoke", &token)
        .body(Body::from("not json"))
        .expect("build request");
    let (status, json) = send_and_parse(app.clone(), request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"]["type"], "invalid_request_error");

    let request = authed("POST", "/revoke", &token)
        .header("content-type", "application/json")
        .body(Body::from(r#"{"token_id":"123-user-1"}"#))
        .expect("build request");
    let (status, json) = send_and_parse(app, request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["success"], true);
}

#[tokio::test]
async fn revoke_all_invalidates_earlier_tokens() {
    let state = test_state(&[]);
    let old = state
        .authority()
        .issue_at(&CallerIdentity::default(), unix_timestamp() - 100)
        .expect("issue old")
        .token;
    let current = issue_token(&state);
    let app = router::build(Arc::clone(&state));

    let request = authed("POST", "/revoke-all", &current)
        .body(Body::empty())
        .expect("build request");
    let (status, json) = send_and_parse(app.clone(), request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["success"], true);
    let cutoff = json["revoke_timestamp"].as_u64().expect("timestamp");
    assert_eq!(cutoff, state.authority().revoke_timestamp());

    let request = authed("GET", "/services", &old)
        .body(Body::empty())
        .expect("build request");
    let (status, _) = send_and_parse(app, request).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

// ============================================================================
// Signing
// ============================================================================

#[tokio::test]
async fn signing_unavailable_without_key() {
    let state = test_state(&[]);
    let token = issue_token(&state);
    let request = authed("POST", "/api/ai-generated/sign-payload", &token)
        .header("content-type", "application/json")
        .body(Body::from(r#"{"payload":"hello"}"#))
        .expect("build request");
    let (status, json) = send_and_parse(router::build(state), request).await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(json["error"]["type"], "signing_unavailable");
}

#[tokio::test]
async fn signing_endpoints_return_deterministic_signatures() {
    let config = GatewayConfig {
        ed25519_private_key: Some(SIGNING_SEED.to_owned()),
        ..GatewayConfig::default()
    };
    let state = test_state_with(&[], config);
    let token = issue_token(&state);
    let app = router::build(state);
    let signer = ContentSigner::from_base64(SIGNING_SEED).expect("signer");

    let request = authed("POST", "/api/ai-generated/sign-payload", &token)
        .body(Body::from(r#"{"payload":"generated text"}"#))
        .expect("build request");
    let (status, json) = send_and_parse(app.clone(), request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["signature"], signer.sign_bytes(b"generated text"));

    let request = authed("POST", "/api/ai-generated/sign-metadata", &token)
        .body(Body::from(r#"{"metadata":{"model":"gpt-4","author":"ai"}}"#))
        .expect("build request");
    let (status, json) = send_and_parse(app, request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        json["signature"],
        signer.sign_bytes(br#"{"author":"ai","model":"gpt-4"}"#)
    );
}

// ============================================================================
// Proxy
// ============================================================================

#[tokio::test]
async fn proxy_substitutes_body_and_injects_service_key() {
    let upstream = spawn_upstream().await;
    let state = test_state(&[
        ("OPENAI_API_BASE_URL", format!("{upstream}/v1")),
        ("OPENAI_API_KEY", "sk-abc".to_owned()),
        ("OPENAI_MODEL", "gpt-4".to_owned()),
    ]);
    let token = issue_token(&state);

    let request = authed("POST", "/openai/v1/chat/completions", &token)
        .header("content-type", "application/json")
        .header("magic-task-id", "task-9")
        .body(Body::from(r#"{"model":"env:OPENAI_MODEL"}"#))
        .expect("build request");
    let (status, echoed) = send_and_parse(router::build(state), request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(echoed["method"], "POST");
    assert_eq!(echoed["path"], "/v1/v1/chat/completions");
    assert_eq!(forwarded_body(&echoed), json!({"model": "gpt-4"}));

    let headers = &echoed["headers"];
    assert_eq!(headers["authorization"], "Bearer sk-abc");
    assert_eq!(headers["x-user-id"], "user-1");
    assert_eq!(headers["magic-user-id"], "user-1");
    assert_eq!(headers["magic-organization-code"], "org-1");
    assert_eq!(headers["magic-task-id"], "task-9");
    assert!(headers.get("magic-authorization").is_none());
}

#[tokio::test]
async fn caller_authorization_is_preserved_and_substituted() {
    let upstream = spawn_upstream().await;
    let state = test_state(&[
        ("OPENAI_API_BASE_URL", upstream),
        ("OPENAI_API_KEY", "sk-service".to_owned()),
        ("OTHER_KEY", "sk-other".to_owned()),
    ]);
    let token = issue_token(&state);

    let request = authed("GET", "/openai/models?region=$OTHER_KEY", &token)
        .header("authorization", "Bearer env:OTHER_KEY")
        .header("magic-user-id", "caller-supplied")
        .body(Body::empty())
        .expect("build request");
    let (status, echoed) = send_and_parse(router::build(state), request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(echoed["path"], "/models");
    assert_eq!(echoed["query"], "region=sk-other");
    assert_eq!(echoed["headers"]["authorization"], "Bearer sk-other");
    assert_eq!(echoed["headers"]["magic-user-id"], "caller-supplied");
}

#[tokio::test]
async fn gateway_token_in_authorization_is_not_forwarded() {
    let upstream = spawn_upstream().await;
    let state = test_state(&[("DEFAULT_API_URL", upstream)]);
    let token = issue_token(&state);

    let request = Request::builder()
        .uri("/v1/models")
        .header("authorization", format!("Bearer {token}"))
        .body(Body::empty())
        .expect("build request");
    let (status, echoed) = send_and_parse(router::build(state), request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(echoed["path"], "/v1/models");
    assert!(echoed["headers"].get("authorization").is_none());
}

#[tokio::test]
async fn special_backend_receives_inline_key() {
    let upstream = spawn_upstream().await;
    let state = test_state(&[
        ("TEXT_TO_IMAGE_API_BASE_URL", format!("{upstream}/img")),
        ("TEXT_TO_IMAGE_ACCESS_KEY", "img-key".to_owned()),
    ]);
    let token = issue_token(&state);

    let request = authed("POST", "/TEXT_TO_IMAGE_API_BASE_URL/generate", &token)
        .header("content-type", "application/json")
        .body(Body::from(r#"{"prompt":"a cat","access_key":""}"#))
        .expect("build request");
    let (status, echoed) = send_and_parse(router::build(state), request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(echoed["path"], "/img/generate");
    assert_eq!(
        forwarded_body(&echoed),
        json!({"prompt": "a cat", "access_key": "img-key"})
    );
    assert!(echoed["headers"].get("authorization").is_none());
}

#[tokio::test]
async fn non_json_body_is_forwarded_verbatim() {
    let upstream = spawn_upstream().await;
    let state = test_state(&[("DEFAULT_API_URL", upstream)]);
    let token = issue_token(&state);

    let request = authed("POST", "/upload", &token)
        .header("content-type", "text/plain")
        .body(Body::from("OPENAI_API_KEY {not json"))
        .expect("build request");
    let (_, echoed) = send_and_parse(router::build(state), request).await;

    assert_eq!(echoed["body"], "OPENAI_API_KEY {not json");
}

#[tokio::test]
async fn malformed_json_body_is_forwarded_verbatim() {
    let upstream = spawn_upstream().await;
    let state = test_state(&[
        ("DEFAULT_API_URL", upstream),
        ("X", "must-not-appear".to_owned()),
    ]);
    let token = issue_token(&state);

    let request = authed("POST", "/chat", &token)
        .header("content-type", "application/json")
        .body(Body::from(r#"{"a": env:X"#))
        .expect("build request");
    let (status, echoed) = send_and_parse(router::build(state), request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(echoed["body"], r#"{"a": env:X"#);
}

#[tokio::test]
async fn slow_upstream_times_out() {
    let upstream = spawn_upstream().await;
    let config = GatewayConfig::default().with_upstream_timeout(Duration::from_millis(500));
    let state = test_state_with(&[("DEFAULT_API_URL", upstream)], config);
    let token = issue_token(&state);

    let request = authed("GET", "/slow", &token)
        .body(Body::empty())
        .expect("build request");
    let (status, json) = send_and_parse(router::build(state), request).await;

    assert_eq!(status, StatusCode::GATEWAY_TIMEOUT);
    assert_eq!(json["error"]["type"], "timeout_error");
}

#[tokio::test]
async fn secret_named_segment_is_not_rerouted_to_default() {
    let state = test_state(&[
        ("OPENAI_API_KEY", "sk-abc".to_owned()),
        ("DEFAULT_API_URL", "http://127.0.0.1:1".to_owned()),
    ]);
    let token = issue_token(&state);
    let request = authed("POST", "/OPENAI_API_KEY/chat", &token)
        .body(Body::empty())
        .expect("build request");
    let (status, json) = send_and_parse(router::build(state), request).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["error"]["type"], "no_route_error");
    assert!(!json.to_string().contains("sk-abc"));
}

#[tokio::test]
async fn upstream_status_and_headers_are_relayed() {
    let upstream = spawn_upstream().await;
    let state = test_state(&[("DEFAULT_API_URL", upstream)]);
    let token = issue_token(&state);

    let request = authed("GET", "/teapot", &token)
        .body(Body::empty())
        .expect("build request");
    let response = router::build(state)
        .oneshot(request)
        .await
        .expect("send request");

    assert_eq!(response.status(), StatusCode::IM_A_TEAPOT);
    assert_eq!(response.headers()["x-upstream"], "yes");
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("collect")
        .to_bytes();
    assert_eq!(&bytes[..], b"short and stout");
}

#[tokio::test]
async fn unresolvable_path_fails_closed() {
    let state = test_state(&[]);
    let token = issue_token(&state);
    let request = authed("GET", "/nowhere/chat", &token)
        .body(Body::empty())
        .expect("build request");
    let (status, json) = send_and_parse(router::build(state), request).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["error"]["type"], "no_route_error");
}

#[tokio::test]
async fn reserved_names_are_not_proxied() {
    let state = test_state(&[("DEFAULT_API_URL", "http://127.0.0.1:1".to_owned())]);
    let token = issue_token(&state);
    let request = authed("GET", "/services/", &token)
        .body(Body::empty())
        .expect("build request");
    let (status, _) = send_and_parse(router::build(state), request).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn unreachable_upstream_is_bad_gateway() {
    let state = test_state(&[]);
    let token = issue_token(&state);
    let request = authed("GET", "/v1/models?target=http%3A%2F%2F127.0.0.1%3A1", &token)
        .body(Body::empty())
        .expect("build request");
    let (status, json) = send_and_parse(router::build(state), request).await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(json["error"]["type"], "external_service_error");
}
