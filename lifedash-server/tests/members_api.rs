use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use lifedash_core::database::Schema;
use lifedash_server::config::{Environment, Secrets, ServerConfig};
use lifedash_server::notify::Notifier;
use lifedash_server::server::build_members_router;
use lifedash_server::state::MembersState;
use lifedash_server::storage::Storage;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tower::ServiceExt;

/// Keeps the last message sent to each recipient.
#[derive(Default)]
struct RecordingNotifier {
    sent: Mutex<HashMap<String, String>>,
}

impl RecordingNotifier {
    fn last(&self, recipient: &str) -> String {
        self.sent.lock().unwrap().get(recipient).cloned().unwrap()
    }

    fn record(&self, recipient: &str, message: &str) {
        self.sent
            .lock()
            .unwrap()
            .insert(recipient.to_string(), message.to_string());
    }
}

impl Notifier for RecordingNotifier {
    fn send_email_code(&self, email: &str, code: &str) {
        self.record(&format!("email:{}", email), code);
    }

    fn send_phone_code(&self, phone: &str, code: &str) {
        self.record(&format!("phone:{}", phone), code);
    }

    fn send_reset_token(&self, email: &str, token: &str) {
        self.record(&format!("reset:{}", email), token);
    }
}

struct TestApp {
    router: Router,
    notifier: Arc<RecordingNotifier>,
}

fn test_app_with(config: ServerConfig) -> TestApp {
    let secrets = Secrets {
        jwt_secret: "members-test-secret-0123456789abcdef".to_string(),
        encryption_key: "members-test-encryption-key".to_string(),
    };
    let notifier = Arc::new(RecordingNotifier::default());
    let storage = Storage::in_memory(Schema::Membership).unwrap();
    let state = MembersState::new(storage, &config, &secrets, notifier.clone());
    TestApp {
        router: build_members_router(state, &config.frontend_url, config.max_payload_size),
        notifier,
    }
}

fn test_app() -> TestApp {
    test_app_with(ServerConfig::default())
}

fn registration(email: &str, mobile: &str) -> Value {
    json!({
        "first_name": "Grace",
        "last_name": "Hopper",
        "mobile": mobile,
        "email": email,
        "password": "original-pass",
        "location": {
            "country": "US",
            "state": "NY",
            "city": "New York",
            "country_code": "+1",
            "time_zone": "America/New_York",
        },
    })
}

impl TestApp {
    async fn send(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }

    async fn login(&self, email: &str, password: &str) -> (StatusCode, Value) {
        self.send(
            Method::POST,
            "/auth/member/login",
            None,
            Some(json!({ "email": email, "password": password })),
        )
        .await
    }

    async fn register_and_login(&self, email: &str, mobile: &str) -> String {
        let (status, body) = self
            .send(
                Method::POST,
                "/auth/member/register",
                None,
                Some(registration(email, mobile)),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{}", body);
        let (status, body) = self.login(email, "original-pass").await;
        assert_eq!(status, StatusCode::OK);
        body["access_token"].as_str().unwrap().to_string()
    }
}

#[tokio::test]
async fn register_returns_profile_and_sends_codes() {
    let app = test_app();
    let (status, body) = app
        .send(
            Method::POST,
            "/auth/member/register",
            None,
            Some(registration("Grace@Example.com", "5550001")),
        )
        .await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["email"], "grace@example.com");
    assert_eq!(body["role"], "member");
    assert_eq!(body["email_verified"], false);
    assert_eq!(body["location"]["city"], "New York");
    assert!(body.get("password_hash").is_none());

    let code = app.notifier.last("email:grace@example.com");
    assert_eq!(code.len(), 4);
    app.notifier.last("phone:5550001");
}

#[tokio::test]
async fn duplicate_email_and_phone_are_rejected() {
    let app = test_app();
    app.register_and_login("grace@example.com", "5550001").await;

    let (status, body) = app
        .send(
            Method::POST,
            "/auth/member/register",
            None,
            Some(registration("grace@example.com", "5550002")),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Email already registered");

    let (status, body) = app
        .send(
            Method::POST,
            "/auth/member/register",
            None,
            Some(registration("ada@example.com", "5550001")),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Mobile number already registered");
}

#[tokio::test]
async fn login_issues_bearer_token() {
    let app = test_app();
    let token = app.register_and_login("grace@example.com", "5550001").await;

    let (status, body) = app.login("grace@example.com", "wrong").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Invalid credentials");

    let (_, body) = app.login("GRACE@example.com", "original-pass").await;
    assert_eq!(body["token_type"], "bearer");

    let (status, body) = app.send(Method::GET, "/me", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["first_name"], "Grace");

    let (status, _) = app.send(Method::GET, "/member/profile", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn changing_phone_clears_its_verification() {
    let app = test_app();
    let token = app.register_and_login("grace@example.com", "5550001").await;

    let code = app.notifier.last("phone:5550001");
    let (status, _) = app
        .send(
            Method::POST,
            "/verify/phone",
            None,
            Some(json!({ "email": "grace@example.com", "code": code })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let (_, body) = app.send(Method::GET, "/me", Some(&token), None).await;
    assert_eq!(body["phone_verified"], true);

    let (status, body) = app
        .send(
            Method::PATCH,
            "/member/profile",
            Some(&token),
            Some(json!({ "mobile": "5550009", "location": { "country": "CA" } })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["phone_number"], "5550009");
    assert_eq!(body["phone_verified"], false);
    assert_eq!(body["location"]["country"], "CA");
    assert!(body["location"]["city"].is_null());
}

#[tokio::test]
async fn verification_codes_are_single_use() {
    let app = test_app();
    app.register_and_login("grace@example.com", "5550001").await;
    let code = app.notifier.last("email:grace@example.com");
    let request = json!({ "email": "grace@example.com", "code": code });

    let (status, _) = app
        .send(Method::POST, "/verify/email", None, Some(request.clone()))
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app
        .send(Method::POST, "/verify/email", None, Some(request))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn verification_guesses_are_rate_limited() {
    let app = test_app_with(ServerConfig {
        verify_attempts_per_minute: 3,
        ..ServerConfig::default()
    });
    app.register_and_login("grace@example.com", "5550001").await;
    let code = app.notifier.last("email:grace@example.com");
    let wrong = if code == "1000" { "1001" } else { "1000" };

    for _ in 0..3 {
        let (status, _) = app
            .send(
                Method::POST,
                "/verify/email",
                None,
                Some(json!({ "email": "grace@example.com", "code": wrong })),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    let (status, _) = app
        .send(
            Method::POST,
            "/verify/email",
            None,
            Some(json!({ "email": "grace@example.com", "code": code })),
        )
        .await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);

    // Phone codes have their own allowance.
    let phone_code = app.notifier.last("phone:5550001");
    let (status, _) = app
        .send(
            Method::POST,
            "/verify/phone",
            None,
            Some(json!({ "email": "grace@example.com", "code": phone_code })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_reset_confirms_accept_the_token_once() {
    let app = test_app();
    app.register_and_login("grace@example.com", "5550001").await;
    let (_, body) = app
        .send(
            Method::POST,
            "/password/reset-request",
            None,
            Some(json!({ "email": "grace@example.com" })),
        )
        .await;
    let token = body["reset_token"].as_str().unwrap().to_string();

    let confirm = |password: &'static str| {
        let body = json!({
            "email": "grace@example.com",
            "token": token.clone(),
            "new_password": password,
        });
        app.send(Method::POST, "/password/reset-confirm", None, Some(body))
    };
    let ((first, _), (second, _)) =
        tokio::join!(confirm("first-new-pass"), confirm("second-new-pass"));

    let mut statuses = [first, second];
    statuses.sort();
    assert_eq!(statuses, [StatusCode::OK, StatusCode::BAD_REQUEST]);
}

#[tokio::test]
async fn password_reset_flow() {
    let app = test_app();
    app.register_and_login("grace@example.com", "5550001").await;

    let (status, _) = app
        .send(
            Method::POST,
            "/password/reset-request",
            None,
            Some(json!({ "email": "nobody@example.com" })),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = app
        .send(
            Method::POST,
            "/password/reset-request",
            None,
            Some(json!({ "email": "grace@example.com" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let token = body["reset_token"].as_str().unwrap().to_string();
    assert_eq!(token, app.notifier.last("reset:grace@example.com"));

    let (status, _) = app
        .send(
            Method::POST,
            "/password/reset-confirm",
            None,
            Some(json!({ "email": "grace@example.com", "token": "deadbeef", "new_password": "x" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let confirm = json!({
        "email": "grace@example.com",
        "token": token,
        "new_password": "brand-new-pass",
    });
    let (status, _) = app
        .send(Method::POST, "/password/reset-confirm", None, Some(confirm.clone()))
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app.login("grace@example.com", "brand-new-pass").await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = app.login("grace@example.com", "original-pass").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .send(Method::POST, "/password/reset-confirm", None, Some(confirm))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn reset_token_is_not_echoed_in_production() {
    let app = test_app_with(ServerConfig {
        environment: Environment::Production,
        ..ServerConfig::default()
    });
    app.register_and_login("grace@example.com", "5550001").await;

    let (status, body) = app
        .send(
            Method::POST,
            "/password/reset-request",
            None,
            Some(json!({ "email": "grace@example.com" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.get("reset_token").is_none());
    app.notifier.last("reset:grace@example.com");
}

#[tokio::test]
async fn change_password_checks_current_and_rejects_reuse() {
    let app = test_app();
    let token = app.register_and_login("grace@example.com", "5550001").await;

    let (status, body) = app
        .send(
            Method::POST,
            "/password/change",
            Some(&token),
            Some(json!({ "current_password": "nope", "new_password": "next-pass" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Current password is incorrect");

    let (status, _) = app
        .send(
            Method::POST,
            "/password/change",
            Some(&token),
            Some(json!({ "current_password": "original-pass", "new_password": "original-pass" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .send(
            Method::POST,
            "/password/change",
            Some(&token),
            Some(json!({ "current_password": "original-pass", "new_password": "next-pass" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app.login("grace@example.com", "next-pass").await;
    assert_eq!(status, StatusCode::OK);
}
