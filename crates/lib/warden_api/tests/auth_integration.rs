//! Router-level tests for login, logout and the access policy.
//!
//! Backed by the in-memory session store and a fixed-answer country lookup:
//! `10.0.0.1` resolves to Cyprus, `10.0.0.2` to Greece, anything else fails.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Method, Request, StatusCode};
use axum::response::Response;
use axum::routing::{delete, post};
use chrono::Utc;
use serde_json::{Value, json};
use tower::ServiceExt;
use warden_api::config::ApiConfig;
use warden_api::{AUTH_ROUTE, AppState, router_with};
use warden_core::auth::seed::seed_user;
use warden_core::auth::{DEFAULT_TOKEN_HEADER, TokenCodec};
use warden_core::geofence::{CountryLookup, CountryWithIp, GeoError, GeofencePolicy};
use warden_core::models::auth::{NewSession, UserStatus};
use warden_core::store::{MemorySessionStore, SessionStore};

const SECRET: &str = "integration-secret";
const CYPRUS_IP: &str = "10.0.0.1";
const GREECE_IP: &str = "10.0.0.2";

struct FixedLookup;

#[async_trait]
impl CountryLookup for FixedLookup {
    async fn country_for_ip(&self, ip: &str) -> Result<CountryWithIp, GeoError> {
        let country = match ip {
            CYPRUS_IP => "Cyprus",
            GREECE_IP => "Greece",
            other => {
                return Err(GeoError::Rejected {
                    ip: other.to_string(),
                    reason: "unknown".into(),
                });
            }
        };
        Ok(CountryWithIp {
            ip: ip.to_string(),
            country_name: Some(country.to_string()),
            ..Default::default()
        })
    }
}

fn test_config() -> ApiConfig {
    ApiConfig {
        bind_addr: "127.0.0.1:0".into(),
        pg_connection_url: String::new(),
        jwt_signing_key: SECRET.into(),
        token_header: DEFAULT_TOKEN_HEADER.parse().unwrap(),
        ip_lookup_url: String::new(),
        trust_forwarded_for: true,
        request_timeout: Duration::from_secs(30),
        geofence: GeofencePolicy::default(),
    }
}

async fn exploding_handler() -> &'static str {
    panic!("handler blew up")
}

struct Harness {
    app: Router,
    store: MemorySessionStore,
    user_id: i64,
}

async fn harness_with(config: ApiConfig) -> Harness {
    let store = MemorySessionStore::new();
    let user = seed_user(&store, "alice", "correct horse").await.unwrap();
    let state = AppState::new(config, Arc::new(store.clone()), Arc::new(FixedLookup)).unwrap();

    let companies = Router::new()
        .route("/v1/companies", post(|| async { "created" }))
        .route("/v1/companies/{id}", delete(|| async { "deleted" }))
        .route(
            "/v1/boom",
            post(exploding_handler),
        )
        .route(
            "/v1/slow",
            post(|| async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                "done"
            }),
        );

    Harness {
        app: router_with(state, companies),
        store,
        user_id: user.id,
    }
}

async fn harness() -> Harness {
    harness_with(test_config()).await
}

async fn send(app: &Router, request: Request<Body>) -> Response {
    app.clone().oneshot(request).await.unwrap()
}

async fn json_body(response: Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn login_request(username: &str, password: &str) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri(AUTH_ROUTE)
        .header("content-type", "application/json")
        .header("x-forwarded-for", GREECE_IP)
        .body(Body::from(
            json!({ "username": username, "password": password }).to_string(),
        ))
        .unwrap()
}

fn request(method: Method, uri: &str, token: Option<&str>, ip: &str) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("x-forwarded-for", ip);
    if let Some(token) = token {
        builder = builder.header(DEFAULT_TOKEN_HEADER, token);
    }
    builder.body(Body::empty()).unwrap()
}

async fn login(app: &Router) -> String {
    let response = send(app, login_request("alice", "correct horse")).await;
    assert_eq!(response.status(), StatusCode::OK);
    response
        .headers()
        .get(DEFAULT_TOKEN_HEADER)
        .expect("token header")
        .to_str()
        .unwrap()
        .to_string()
}

#[tokio::test]
async fn login_returns_token_header() {
    let h = harness().await;
    let response = send(&h.app, login_request("  alice ", "correct horse")).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().contains_key(DEFAULT_TOKEN_HEADER));
    assert!(response.headers().contains_key("x-request-id"));
    assert_eq!(json_body(response).await, json!({ "success": true }));
}

#[tokio::test]
async fn login_with_wrong_password_is_rejected() {
    let h = harness().await;
    let response = send(&h.app, login_request("alice", "wrong")).await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(!response.headers().contains_key(DEFAULT_TOKEN_HEADER));
    let body = json_body(response).await;
    assert_eq!(body["error_code"], "invalid_credentials");
}

#[tokio::test]
async fn login_with_unknown_user_is_rejected() {
    let h = harness().await;
    let response = send(&h.app, login_request("mallory", "correct horse")).await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(json_body(response).await["error_code"], "invalid_credentials");
}

#[tokio::test]
async fn malformed_login_body_is_invalid_form() {
    let h = harness().await;
    let request = Request::builder()
        .method(Method::POST)
        .uri(AUTH_ROUTE)
        .header("content-type", "application/json")
        .body(Body::from("{\"username\": 42"))
        .unwrap();
    let response = send(&h.app, request).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(response).await["error_code"], "invalid_form");
}

#[tokio::test]
async fn deactivated_user_cannot_login() {
    let h = harness().await;
    h.store
        .set_user_status(h.user_id, UserStatus::Deactivated)
        .await;
    let response = send(&h.app, login_request("alice", "correct horse")).await;

    assert_eq!(response.status(), StatusCode::NOT_ACCEPTABLE);
    assert_eq!(json_body(response).await["error_code"], "invalid_user_status");
}

#[tokio::test]
async fn protected_route_requires_token() {
    let h = harness().await;
    let response = send(&h.app, request(Method::GET, AUTH_ROUTE, None, GREECE_IP)).await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(json_body(response).await["error_code"], "invalid_credentials");
}

#[tokio::test]
async fn garbage_token_is_rejected() {
    let h = harness().await;
    let response = send(
        &h.app,
        request(Method::GET, AUTH_ROUTE, Some("not-a-token"), GREECE_IP),
    )
    .await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn valid_token_reaches_handler() {
    let h = harness().await;
    let token = login(&h.app).await;
    let response = send(&h.app, request(Method::GET, AUTH_ROUTE, Some(&token), GREECE_IP)).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert!(!response.headers().contains_key(DEFAULT_TOKEN_HEADER));
    let body = json_body(response).await;
    assert_eq!(body["user_id"], h.user_id);
    assert_eq!(body["status"], "active");
}

#[tokio::test]
async fn logout_ends_the_session() {
    let h = harness().await;
    let token = login(&h.app).await;

    let response = send(&h.app, request(Method::DELETE, AUTH_ROUTE, Some(&token), GREECE_IP)).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await, json!({ "success": true }));

    let response = send(&h.app, request(Method::GET, AUTH_ROUTE, Some(&token), GREECE_IP)).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(json_body(response).await["error_code"], "session_expired");
}

#[tokio::test]
async fn deactivated_user_token_is_rejected() {
    let h = harness().await;
    let token = login(&h.app).await;
    h.store
        .set_user_status(h.user_id, UserStatus::Deactivated)
        .await;

    let response = send(&h.app, request(Method::GET, AUTH_ROUTE, Some(&token), GREECE_IP)).await;
    assert_eq!(response.status(), StatusCode::NOT_ACCEPTABLE);
    assert_eq!(json_body(response).await["error_code"], "invalid_user_status");
}

#[tokio::test]
async fn stale_token_is_refreshed_on_response() {
    let h = harness().await;
    let token = login(&h.app).await;
    let claims = TokenCodec::new(SECRET.as_bytes())
        .unwrap()
        .decode(&token)
        .unwrap();

    let issued = Utc::now() - chrono::Duration::hours(2);
    let stale = TokenCodec::new(SECRET.as_bytes())
        .unwrap()
        .issue_at(claims.user_id, claims.session_id, claims.status, issued)
        .unwrap();

    let response = send(&h.app, request(Method::GET, AUTH_ROUTE, Some(&stale), GREECE_IP)).await;
    assert_eq!(response.status(), StatusCode::OK);
    let fresh = response
        .headers()
        .get(DEFAULT_TOKEN_HEADER)
        .expect("refreshed token header")
        .to_str()
        .unwrap()
        .to_string();

    let fresh_claims = TokenCodec::new(SECRET.as_bytes())
        .unwrap()
        .decode(&fresh)
        .unwrap();
    assert_eq!(fresh_claims.session_id, claims.session_id);
    assert!(fresh_claims.refresh > Utc::now().timestamp());

    let session = h
        .store
        .session_by_id(claims.session_id)
        .await
        .unwrap()
        .unwrap();
    assert!(session.last_refreshed_at > issued);
}

#[tokio::test]
async fn refresh_write_failure_still_serves_request() {
    let h = harness().await;
    let token = login(&h.app).await;
    let claims = TokenCodec::new(SECRET.as_bytes())
        .unwrap()
        .decode(&token)
        .unwrap();
    let stale = TokenCodec::new(SECRET.as_bytes())
        .unwrap()
        .issue_at(
            claims.user_id,
            claims.session_id,
            claims.status,
            Utc::now() - chrono::Duration::hours(2),
        )
        .unwrap();

    h.store.fail_session_updates(true);
    let response = send(&h.app, request(Method::GET, AUTH_ROUTE, Some(&stale), GREECE_IP)).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().contains_key(DEFAULT_TOKEN_HEADER));
}

#[tokio::test]
async fn exempt_country_reaches_exempt_routes_without_token() {
    let h = harness().await;

    let response = send(&h.app, request(Method::POST, "/v1/companies", None, CYPRUS_IP)).await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = send(&h.app, request(Method::DELETE, "/v1/companies/17", None, CYPRUS_IP)).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn exemption_does_not_cover_other_routes() {
    let h = harness().await;
    let response = send(&h.app, request(Method::GET, AUTH_ROUTE, None, CYPRUS_IP)).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn other_countries_need_a_token_on_exempt_routes() {
    let h = harness().await;
    let response = send(&h.app, request(Method::POST, "/v1/companies", None, GREECE_IP)).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let token = login(&h.app).await;
    let response = send(
        &h.app,
        request(Method::POST, "/v1/companies", Some(&token), GREECE_IP),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn failed_country_lookup_denies_exemption() {
    let h = harness().await;
    let response = send(&h.app, request(Method::POST, "/v1/companies", None, "192.0.2.1")).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn unknown_route_returns_json_404() {
    let h = harness().await;
    let response = send(&h.app, request(Method::GET, "/v1/nope", None, GREECE_IP)).await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(
        json_body(response).await,
        json!({ "error_message": "Endpoint not found" })
    );
}

#[tokio::test]
async fn slow_requests_time_out() {
    let mut config = test_config();
    config.request_timeout = Duration::from_millis(50);
    let h = harness_with(config).await;
    let session = h
        .store
        .create_session(NewSession {
            user_id: h.user_id,
            ip_address: GREECE_IP.into(),
            user_agent: String::new(),
            last_refreshed_at: Utc::now(),
        })
        .await
        .unwrap();
    let token = TokenCodec::new(SECRET.as_bytes())
        .unwrap()
        .issue(h.user_id, session.id, UserStatus::Active)
        .unwrap();

    let response = send(&h.app, request(Method::POST, "/v1/slow", Some(&token), GREECE_IP)).await;
    assert_eq!(response.status(), StatusCode::REQUEST_TIMEOUT);
    assert_eq!(json_body(response).await["error_code"], "request_failed");
}

#[tokio::test]
async fn panicking_handler_returns_structured_500() {
    let h = harness().await;
    let token = login(&h.app).await;

    let response = send(&h.app, request(Method::POST, "/v1/boom", Some(&token), GREECE_IP)).await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(response.headers().contains_key("x-request-id"));
    let body = json_body(response).await;
    assert_eq!(body["error_code"], "request_failed");
    assert!(!body.to_string().contains("blew up"));
}

#[tokio::test]
async fn responses_carry_security_headers() {
    let h = harness().await;
    for response in [
        send(&h.app, login_request("alice", "correct horse")).await,
        send(&h.app, request(Method::GET, "/v1/nope", None, GREECE_IP)).await,
    ] {
        let headers = response.headers();
        assert_eq!(headers["cache-control"], "no-cache, no-store, must-revalidate");
        assert_eq!(headers["x-frame-options"], "DENY");
        assert_eq!(headers["x-content-type-options"], "nosniff");
        assert!(headers.contains_key("strict-transport-security"));
    }
}

#[tokio::test]
async fn untrusted_forwarded_header_cannot_claim_exemption() {
    let mut config = test_config();
    config.trust_forwarded_for = false;
    let h = harness_with(config).await;

    let response = send(&h.app, request(Method::POST, "/v1/companies", None, CYPRUS_IP)).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}
