use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

use murmur::{config::Config, repositories::user::UserRepository, routes, state::AppState};

const SECRET: &[u8] = b"integration-secret-0123456789abcdef";
const BOUNDARY: &str = "murmur-test-boundary";

/// Encodes a multipart form with a `message` field and an optional file.
fn multipart_body(message: &str, media: Option<(&str, &[u8])>) -> Vec<u8> {
    let mut body = format!(
        "--{b}\r\nContent-Disposition: form-data; name=\"message\"\r\n\r\n{m}\r\n",
        b = BOUNDARY,
        m = message
    )
    .into_bytes();
    if let Some((file_name, bytes)) = media {
        body.extend_from_slice(
            format!(
                "--{b}\r\nContent-Disposition: form-data; name=\"media\"; filename=\"{f}\"\r\nContent-Type: application/octet-stream\r\n\r\n",
                b = BOUNDARY,
                f = file_name
            )
            .as_bytes(),
        );
        body.extend_from_slice(bytes);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
    body
}

// Shared test context
struct TestContext {
    state: AppState,
    app: Router,
    _media_dir: tempfile::TempDir,
}

impl TestContext {
    fn new() -> Self {
        let media_dir = tempfile::tempdir().unwrap();
        let mut config = Config::in_memory(SECRET);
        config.media_dir = media_dir.path().to_path_buf();
        let state = AppState::in_memory(&config).unwrap();
        let app = routes::router(state.clone());
        Self {
            state,
            app,
            _media_dir: media_dir,
        }
    }

    fn now() -> i64 {
        chrono::Utc::now().timestamp()
    }

    /// Builds a request signed at `timestamp`.
    fn signed_at(&self, method: &str, uri: &str, token: &str, body: Option<Value>, timestamp: i64) -> Request<Body> {
        let body = body.map(|b| b.to_string()).unwrap_or_default();
        let ts = timestamp.to_string();
        let digest = self.state.authenticator.sign(&ts, token, body.as_bytes());

        let mut builder = Request::builder()
            .method(method)
            .uri(uri)
            .header("x-request-hmac", digest)
            .header("x-request-timestamp", ts)
            .header("content-type", "application/json");
        if !token.is_empty() {
            builder = builder.header("x-session-token", token);
        }
        builder.body(Body::from(body)).unwrap()
    }

    fn signed(&self, method: &str, uri: &str, token: &str, body: Option<Value>) -> Request<Body> {
        self.signed_at(method, uri, token, body, Self::now())
    }

    /// Builds a signed multipart request.
    fn signed_multipart(&self, uri: &str, token: &str, body: Vec<u8>) -> Request<Body> {
        let ts = Self::now().to_string();
        let digest = self.state.authenticator.sign(&ts, token, &body);

        Request::builder()
            .method("POST")
            .uri(uri)
            .header("x-request-hmac", digest)
            .header("x-request-timestamp", ts)
            .header("x-session-token", token)
            .header("content-type", format!("multipart/form-data; boundary={}", BOUNDARY))
            .body(Body::from(body))
            .unwrap()
    }

    async fn send_raw(&self, request: Request<Body>) -> (StatusCode, Vec<u8>) {
        let response = self.app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, bytes.to_vec())
    }

    async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let (status, bytes) = self.send_raw(request).await;
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, body)
    }

    async fn register(&self, email: &str) {
        let (status, body) = self
            .send(self.signed(
                "POST",
                "/api/register",
                "",
                Some(json!({
                    "email": email,
                    "password": "orbital",
                    "first_name": "Grace",
                    "family_name": "Hopper",
                    "gender": "f",
                    "city": "Arlington",
                    "country": "US"
                })),
            ))
            .await;
        assert_eq!(status, StatusCode::CREATED, "Registration failed: {}", body);
    }

    async fn login(&self, email: &str) -> String {
        let (status, body) = self
            .send(self.signed(
                "POST",
                "/api/login",
                "",
                Some(json!({ "email": email, "password": "orbital" })),
            ))
            .await;
        assert_eq!(status, StatusCode::OK, "Login failed: {}", body);
        body["data"].as_str().unwrap().to_string()
    }
}

#[tokio::test]
async fn test_register_login_profile_logout() {
    let ctx = TestContext::new();
    ctx.register("grace@example.com").await;
    let token = ctx.login("grace@example.com").await;

    let (status, body) = ctx.send(ctx.signed("GET", "/api/profile", &token, None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["email"], "grace@example.com");
    assert!(body["data"].get("password").is_none());

    let (status, _) = ctx.send(ctx.signed("POST", "/api/logout", &token, None)).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = ctx.send(ctx.signed("GET", "/api/profile", &token, None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn test_duplicate_and_invalid_registration() {
    let ctx = TestContext::new();
    ctx.register("grace@example.com").await;

    let (status, body) = ctx
        .send(ctx.signed(
            "POST",
            "/api/register",
            "",
            Some(json!({
                "email": "grace@example.com",
                "password": "orbital",
                "first_name": "Grace",
                "family_name": "Hopper",
                "gender": "f",
                "city": "Arlington",
                "country": "US"
            })),
        ))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);

    let (status, _) = ctx
        .send(ctx.signed(
            "POST",
            "/api/register",
            "",
            Some(json!({ "email": "short@example.com", "password": "orbital" })),
        ))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_wrong_password_cannot_login() {
    let ctx = TestContext::new();
    ctx.register("grace@example.com").await;

    let (status, body) = ctx
        .send(ctx.signed(
            "POST",
            "/api/login",
            "",
            Some(json!({ "email": "grace@example.com", "password": "guessed" })),
        ))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn test_stale_timestamp_rejected() {
    let ctx = TestContext::new();
    ctx.register("grace@example.com").await;
    let token = ctx.login("grace@example.com").await;

    let stale = ctx.signed_at("GET", "/api/profile", &token, None, TestContext::now() - 600);
    let (status, body) = ctx.send(stale).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn test_unsigned_request_rejected() {
    let ctx = TestContext::new();
    let request = Request::builder()
        .method("POST")
        .uri("/api/login")
        .header("content-type", "application/json")
        .body(Body::from(r#"{"email":"a@b.c","password":"x"}"#))
        .unwrap();

    let (status, _) = ctx.send(request).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_token_swapped_after_signing_rejected() {
    let ctx = TestContext::new();
    ctx.register("grace@example.com").await;
    ctx.register("alan@example.com").await;
    let grace = ctx.login("grace@example.com").await;
    let alan = ctx.login("alan@example.com").await;

    let mut request = ctx.signed("GET", "/api/profile", &grace, None);
    request
        .headers_mut()
        .insert("x-session-token", alan.parse().unwrap());

    let (status, _) = ctx.send(request).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_second_login_supersedes_first_token() {
    let ctx = TestContext::new();
    ctx.register("grace@example.com").await;
    let first = ctx.login("grace@example.com").await;
    let second = ctx.login("grace@example.com").await;
    assert_ne!(first, second);

    let (status, _) = ctx.send(ctx.signed("GET", "/api/profile", &first, None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, _) = ctx.send(ctx.signed("GET", "/api/profile", &second, None)).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_posting_updates_wall_and_views() {
    let ctx = TestContext::new();
    ctx.register("grace@example.com").await;
    ctx.register("alan@example.com").await;
    let grace = ctx.login("grace@example.com").await;
    let alan = ctx.login("alan@example.com").await;

    let (status, _) = ctx
        .send(ctx.signed(
            "POST",
            "/api/messages/alan@example.com",
            &grace,
            Some(json!({ "message": "Nice machine." })),
        ))
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = ctx.send(ctx.signed("GET", "/api/messages", &alan, None)).await;
    assert_eq!(status, StatusCode::OK);
    let posts = body["data"].as_array().unwrap();
    assert_eq!(posts.len(), 1);
    assert_eq!(posts[0]["from_user"], "grace@example.com");
    assert_eq!(posts[0]["content"], "Nice machine.");

    let (status, _) = ctx
        .send(ctx.signed(
            "POST",
            "/api/messages/alan@example.com",
            &grace,
            Some(json!({ "message": "   " })),
        ))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = ctx
        .send(ctx.signed("GET", "/api/profile/alan@example.com", &grace, None))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["email"], "alan@example.com");
    let counters = ctx.state.users.counters("alan@example.com").await.unwrap();
    assert_eq!(counters.posts, 1);
    assert_eq!(counters.views, 1);
}

#[tokio::test]
async fn test_change_password() {
    let ctx = TestContext::new();
    ctx.register("grace@example.com").await;
    let token = ctx.login("grace@example.com").await;

    let (status, _) = ctx
        .send(ctx.signed(
            "PUT",
            "/api/change-password",
            &token,
            Some(json!({ "old_password": "wrong!", "new_password": "compiler" })),
        ))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = ctx
        .send(ctx.signed(
            "PUT",
            "/api/change-password",
            &token,
            Some(json!({ "old_password": "orbital", "new_password": "compiler" })),
        ))
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = ctx
        .send(ctx.signed(
            "POST",
            "/api/login",
            "",
            Some(json!({ "email": "grace@example.com", "password": "compiler" })),
        ))
        .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_unknown_api_path_is_404() {
    let ctx = TestContext::new();
    let request = Request::builder()
        .uri("/api/nowhere")
        .body(Body::empty())
        .unwrap();

    let (status, body) = ctx.send(request).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn test_signature_and_session_rejections_look_the_same() {
    let ctx = TestContext::new();
    ctx.register("grace@example.com").await;

    let unknown_token = ctx.signed("GET", "/api/profile", "not-a-session", None);
    let (session_status, session_body) = ctx.send_raw(unknown_token).await;

    let token = ctx.login("grace@example.com").await;
    let mut forged = ctx.signed("GET", "/api/profile", &token, None);
    forged
        .headers_mut()
        .insert("x-request-hmac", "AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA=".parse().unwrap());
    let (auth_status, auth_body) = ctx.send_raw(forged).await;

    assert_eq!(session_status, StatusCode::UNAUTHORIZED);
    assert_eq!(auth_status, StatusCode::UNAUTHORIZED);
    assert_eq!(session_body, auth_body);
}

#[tokio::test]
async fn test_post_with_media_is_served() {
    let ctx = TestContext::new();
    ctx.register("grace@example.com").await;
    ctx.register("alan@example.com").await;
    let grace = ctx.login("grace@example.com").await;

    let body = multipart_body("Look <here>", Some(("bug.png", &b"moth-in-relay"[..])));
    let (status, response) = ctx
        .send(ctx.signed_multipart("/api/messages/alan@example.com", &grace, body))
        .await;
    assert_eq!(status, StatusCode::OK, "Post failed: {}", response);

    let (_, wall) = ctx
        .send(ctx.signed("GET", "/api/messages/alan@example.com", &grace, None))
        .await;
    let post = &wall["data"][0];
    assert_eq!(post["content"], "Look &lt;here&gt;");
    let name = post["media"].as_str().unwrap().to_string();
    assert!(name.ends_with(".png"));

    let fetch = Request::builder()
        .uri(format!("/media/{}", name))
        .body(Body::empty())
        .unwrap();
    let (status, bytes) = ctx.send_raw(fetch).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(bytes, b"moth-in-relay");
}

#[tokio::test]
async fn test_media_only_post_and_rejected_extension() {
    let ctx = TestContext::new();
    ctx.register("grace@example.com").await;
    let grace = ctx.login("grace@example.com").await;

    let body = multipart_body("", Some(("clip.webm", &b"frames"[..])));
    let (status, _) = ctx
        .send(ctx.signed_multipart("/api/messages/grace@example.com", &grace, body))
        .await;
    assert_eq!(status, StatusCode::OK);

    let body = multipart_body("run me", Some(("install.sh", &b"#!/bin/sh"[..])));
    let (status, response) = ctx
        .send(ctx.signed_multipart("/api/messages/grace@example.com", &grace, body))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(response["message"], "Could not post message.");

    let (_, wall) = ctx.send(ctx.signed("GET", "/api/messages", &grace, None)).await;
    assert_eq!(wall["data"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_unknown_media_is_404() {
    let ctx = TestContext::new();
    let request = Request::builder()
        .uri("/media/missing.png")
        .body(Body::empty())
        .unwrap();

    let (status, body) = ctx.send(request).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "Could not find media!");
}
