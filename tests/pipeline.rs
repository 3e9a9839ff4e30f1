//! End-to-end behaviour of the edge pipeline: request id → rate limit →
//! verification → role decision → identity propagation → forwarding, with every
//! failure rendered by the error boundary.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::{
    Json, Router,
    body::Body,
    extract::ConnectInfo,
    http::{HeaderMap, Method, Request, StatusCode, header},
    response::{IntoResponse, Response},
};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use parking_lot::Mutex;
use serde_json::{Value, json};
use tower::ServiceExt;
use url::Url;

use order_edge::api::v1::route_table;
use order_edge::app::build_router;
use order_edge::config::Upstreams;
use order_edge::error::AppError;
use order_edge::services::auth::ClaimsVerifier;
use order_edge::services::rate_limit::{ManualClock, RateLimitPolicy, RateLimiter};
use order_edge::middleware::http::MAX_BODY_BYTES;
use order_edge::services::upstream::{Forwarder, HttpForwarder};
use order_edge::state::AppState;

const SECRET: &[u8] = b"pipeline-secret-pipeline-secret!";

#[derive(Debug, Clone)]
struct Forwarded {
    upstream: Url,
    method: Method,
    path: String,
    headers: HeaderMap,
}

#[derive(Default)]
struct RecordingForwarder {
    seen: Mutex<Vec<Forwarded>>,
}

impl RecordingForwarder {
    fn calls(&self) -> Vec<Forwarded> {
        self.seen.lock().clone()
    }
}

#[async_trait]
impl Forwarder for RecordingForwarder {
    async fn forward(&self, upstream: &Url, req: Request<Body>) -> Result<Response, AppError> {
        self.seen.lock().push(Forwarded {
            upstream: upstream.clone(),
            method: req.method().clone(),
            path: req.uri().path().to_string(),
            headers: req.headers().clone(),
        });
        Ok((StatusCode::OK, Json(json!({"forwarded": true}))).into_response())
    }
}

struct Harness {
    app: Router,
    forwarder: Arc<RecordingForwarder>,
    clock: Arc<ManualClock>,
}

fn upstreams() -> Upstreams {
    Upstreams {
        users: Url::parse("http://users.internal:4001").unwrap(),
        menu: Url::parse("http://menu.internal:4002").unwrap(),
        cart: Url::parse("http://cart.internal:4003").unwrap(),
        orders: Url::parse("http://orders.internal:4004").unwrap(),
    }
}

fn harness(max_requests: usize) -> Harness {
    let forwarder = Arc::new(RecordingForwarder::default());
    let clock = Arc::new(ManualClock::new());
    let limiter = RateLimiter::with_clock(
        RateLimitPolicy {
            window: Duration::from_secs(15 * 60),
            max_requests,
            sweep_probability: 0.0,
        },
        clock.clone(),
    );
    let verifier = ClaimsVerifier::new(SECRET, Algorithm::HS256, 0).unwrap();

    let state = AppState::new(Arc::new(verifier), Arc::new(limiter), forwarder.clone());
    let app = build_router(state, &route_table(&upstreams()), Duration::from_secs(5)).unwrap();

    Harness {
        app,
        forwarder,
        clock,
    }
}

fn token(sub: &str, role: &str) -> String {
    let exp = chrono::Utc::now().timestamp() + 600;
    jsonwebtoken::encode(
        &Header::new(Algorithm::HS256),
        &json!({"sub": sub, "email": format!("{sub}@example.com"), "role": role, "exp": exp}),
        &EncodingKey::from_secret(SECRET),
    )
    .unwrap()
}

fn request(method: Method, uri: &str) -> axum::http::request::Builder {
    Request::builder().method(method).uri(uri)
}

fn from_peer(mut req: Request<Body>, ip: [u8; 4]) -> Request<Body> {
    req.extensions_mut()
        .insert(ConnectInfo(SocketAddr::from((ip, 50000))));
    req
}

async fn json_body(res: Response) -> Value {
    let bytes = axum::body::to_bytes(res.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn missing_credential_is_401_with_correlation_id() {
    let h = harness(100);
    let res = h
        .app
        .oneshot(
            request(Method::GET, "/api/v1/orders")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    assert!(res.headers().contains_key("x-request-id"));

    let body = json_body(res).await;
    assert_eq!(body["success"], false);
    assert_eq!(body["statusCode"], 401);
    assert_eq!(body["errorCode"], "UNAUTHORIZED");
    assert_eq!(body["message"], "Authentication required");
    assert_eq!(body["path"], "/api/v1/orders");
    assert!(h.forwarder.calls().is_empty());
}

#[tokio::test]
async fn tampered_token_is_401_without_leaking_the_cause() {
    let h = harness(100);
    let mut bad = token("u-1", "USER");
    bad.push('x');

    let res = h
        .app
        .oneshot(
            request(Method::GET, "/api/v1/cart")
                .header(header::AUTHORIZATION, format!("Bearer {bad}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    let body = json_body(res).await;
    assert_eq!(body["message"], "Invalid or expired token");
    assert!(!body.to_string().to_lowercase().contains("signature"));
}

#[tokio::test]
async fn user_on_admin_route_is_403() {
    let h = harness(100);
    let res = h
        .app
        .oneshot(
            request(Method::GET, "/api/v1/orders/all")
                .header(header::AUTHORIZATION, format!("Bearer {}", token("u-1", "USER")))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::FORBIDDEN);
    let body = json_body(res).await;
    assert_eq!(body["errorCode"], "FORBIDDEN");
    assert!(h.forwarder.calls().is_empty());
}

#[tokio::test]
async fn admin_is_forwarded_with_identity_and_without_credential() {
    let h = harness(100);
    let res = h
        .app
        .clone()
        .oneshot(
            request(Method::GET, "/api/v1/orders/all")
                .header(header::AUTHORIZATION, format!("Bearer {}", token("admin-1", "ADMIN")))
                .header("x-request-id", "abc")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.headers()["x-request-id"], "abc");

    let calls = h.forwarder.calls();
    assert_eq!(calls.len(), 1);
    let call = &calls[0];
    assert_eq!(call.upstream.host_str(), Some("orders.internal"));
    assert_eq!(call.method, Method::GET);
    assert_eq!(call.path, "/api/v1/orders/all");
    assert_eq!(call.headers["x-user-id"], "admin-1");
    assert_eq!(call.headers["x-user-email"], "admin-1@example.com");
    assert_eq!(call.headers["x-user-role"], "ADMIN");
    assert_eq!(call.headers["x-request-id"], "abc");
}

#[tokio::test]
async fn handler_override_admits_any_authenticated_role() {
    let h = harness(100);
    let res = h
        .app
        .oneshot(
            request(Method::GET, "/api/v1/orders/whoami")
                .header(header::AUTHORIZATION, format!("Bearer {}", token("u-2", "user")))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(h.forwarder.calls()[0].headers["x-user-role"], "USER");
}

#[tokio::test]
async fn forged_identity_headers_never_reach_downstream() {
    let h = harness(100);
    let res = h
        .app
        .clone()
        .oneshot(
            request(Method::GET, "/api/v1/foods")
                .header("x-user-id", "forged")
                .header("x-user-role", "ADMIN")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let res = h
        .app
        .oneshot(
            request(Method::GET, "/api/v1/cart")
                .header(header::AUTHORIZATION, format!("Bearer {}", token("u-3", "USER")))
                .header("x-user-id", "forged")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let calls = h.forwarder.calls();
    assert!(calls[0].headers.get("x-user-id").is_none());
    assert!(calls[0].headers.get("x-user-role").is_none());
    let ids: Vec<_> = calls[1].headers.get_all("x-user-id").iter().collect();
    assert_eq!(ids, vec!["u-3"]);
}

#[tokio::test]
async fn quota_is_enforced_per_client_and_recovers() {
    let h = harness(100);
    for i in 0..100 {
        let res = h
            .app
            .clone()
            .oneshot(from_peer(
                request(Method::GET, "/health").body(Body::empty()).unwrap(),
                [203, 0, 113, 9],
            ))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK, "request {i}");
    }

    let res = h
        .app
        .clone()
        .oneshot(from_peer(
            request(Method::GET, "/health").body(Body::empty()).unwrap(),
            [203, 0, 113, 9],
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(res.headers()["retry-after"], "900");
    assert!(res.headers().contains_key("x-request-id"));
    let body = json_body(res).await;
    assert_eq!(body["errorCode"], "TOO_MANY_REQUESTS");

    // a different client is unaffected
    let res = h
        .app
        .clone()
        .oneshot(from_peer(
            request(Method::GET, "/health").body(Body::empty()).unwrap(),
            [203, 0, 113, 10],
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    h.clock
        .advance(Duration::from_secs(15 * 60) + Duration::from_millis(1));
    let res = h
        .app
        .oneshot(from_peer(
            request(Method::GET, "/health").body(Body::empty()).unwrap(),
            [203, 0, 113, 9],
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test]
async fn rate_limit_runs_before_verification() {
    let h = harness(1);
    let first = h
        .app
        .clone()
        .oneshot(
            request(Method::GET, "/api/v1/orders")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(first.status(), StatusCode::UNAUTHORIZED);

    let second = h
        .app
        .oneshot(
            request(Method::GET, "/api/v1/orders")
                .header(header::AUTHORIZATION, format!("Bearer {}", token("u-1", "USER")))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(second.status(), StatusCode::TOO_MANY_REQUESTS);
}

#[tokio::test]
async fn generated_correlation_ids_are_distinct() {
    let h = harness(100);
    let mut ids = Vec::new();
    for _ in 0..2 {
        let res = h
            .app
            .clone()
            .oneshot(request(Method::GET, "/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        ids.push(res.headers()["x-request-id"].to_str().unwrap().to_string());
    }
    assert_ne!(ids[0], ids[1]);
}

#[tokio::test]
async fn unknown_path_and_undeclared_method_are_normalized() {
    let h = harness(100);
    let res = h
        .app
        .clone()
        .oneshot(
            request(Method::GET, "/api/v1/nope")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    let body = json_body(res).await;
    assert_eq!(body["errorCode"], "NOT_FOUND");
    assert_eq!(body["path"], "/api/v1/nope");

    let res = h
        .app
        .oneshot(
            request(Method::DELETE, "/api/v1/orders")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::METHOD_NOT_ALLOWED);
    let body = json_body(res).await;
    assert_eq!(body["errorCode"], "METHOD_NOT_ALLOWED");
    assert!(h.forwarder.calls().is_empty());
}

fn edge_with_http_forwarder() -> Router {
    let verifier = ClaimsVerifier::new(SECRET, Algorithm::HS256, 0).unwrap();
    let limiter = RateLimiter::new(RateLimitPolicy::default());
    let forwarder = HttpForwarder::new(Duration::from_secs(5), MAX_BODY_BYTES).unwrap();
    let state = AppState::new(Arc::new(verifier), Arc::new(limiter), Arc::new(forwarder));
    build_router(state, &route_table(&upstreams()), Duration::from_secs(5)).unwrap()
}

async fn assert_payload_too_large(res: Response) {
    assert_eq!(res.status(), StatusCode::PAYLOAD_TOO_LARGE);
    assert!(res.headers().contains_key("x-request-id"));
    let body = json_body(res).await;
    assert_eq!(body["success"], false);
    assert_eq!(body["statusCode"], 413);
    assert_eq!(body["errorCode"], "PAYLOAD_TOO_LARGE");
    assert_eq!(body["path"], "/api/v1/auth/login");
}

#[tokio::test]
async fn oversized_body_with_content_length_is_413() {
    let size = 2 * 1024 * 1024;
    let res = edge_with_http_forwarder()
        .oneshot(
            request(Method::POST, "/api/v1/auth/login")
                .header(header::CONTENT_LENGTH, size)
                .body(Body::from(vec![b'x'; size]))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_payload_too_large(res).await;
}

#[tokio::test]
async fn oversized_streamed_body_is_413() {
    let res = edge_with_http_forwarder()
        .oneshot(
            request(Method::POST, "/api/v1/auth/login")
                .body(Body::from(vec![b'x'; 2 * 1024 * 1024]))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_payload_too_large(res).await;
}
