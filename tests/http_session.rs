use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;
use vidshare::{build_app, AppState};

struct TestApp {
    router: Router,
}

struct TestResponse {
    status: StatusCode,
    cookies: Vec<String>,
    body: Value,
}

impl TestApp {
    fn new() -> Self {
        Self {
            router: build_app(AppState::fake()),
        }
    }

    async fn send(&self, req: Request<Body>) -> TestResponse {
        let res = self.router.clone().oneshot(req).await.unwrap();
        let status = res.status();
        let cookies = res
            .headers()
            .get_all(header::SET_COOKIE)
            .iter()
            .map(|v| v.to_str().unwrap().to_string())
            .collect();
        let bytes = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        TestResponse {
            status,
            cookies,
            body,
        }
    }

    async fn post_json(&self, uri: &str, body: Value, bearer: Option<&str>) -> TestResponse {
        let mut req = Request::post(uri).header(header::CONTENT_TYPE, "application/json");
        if let Some(token) = bearer {
            req = req.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        self.send(req.body(Body::from(body.to_string())).unwrap()).await
    }

    async fn get(&self, uri: &str, headers: &[(header::HeaderName, String)]) -> TestResponse {
        let mut req = Request::get(uri);
        for (name, value) in headers {
            req = req.header(name, value);
        }
        self.send(req.body(Body::empty()).unwrap()).await
    }

    async fn register_alice(&self) -> TestResponse {
        self.post_json(
            "/api/v1/users/register",
            json!({
                "fullName": "Alice Liddell",
                "email": "alice@example.com",
                "username": "Alice",
                "password": "correct",
                "avatar": "https://cdn.example.com/alice.png"
            }),
            None,
        )
        .await
    }

    async fn login(&self, username: &str, password: &str) -> TestResponse {
        self.post_json(
            "/api/v1/users/login",
            json!({ "username": username, "password": password }),
            None,
        )
        .await
    }
}

fn assert_no_credentials(user: &Value) {
    let obj = user.as_object().expect("user object");
    for key in ["password", "passwordHash", "password_hash", "refreshToken", "refresh_token"] {
        assert!(!obj.contains_key(key), "user object leaks {key}");
    }
}

#[tokio::test]
async fn register_then_duplicate_conflicts() {
    let app = TestApp::new();

    let res = app.register_alice().await;
    assert_eq!(res.status, StatusCode::CREATED);
    assert_eq!(res.body["status"], 201);
    assert_eq!(res.body["data"]["username"], "alice");
    assert_no_credentials(&res.body["data"]);

    let res = app.register_alice().await;
    assert_eq!(res.status, StatusCode::CONFLICT);
    assert_eq!(
        res.body,
        json!({ "status": 409, "message": "User with email or username already exists" })
    );
}

#[tokio::test]
async fn login_success_sets_cookies_and_hides_credentials() {
    let app = TestApp::new();
    app.register_alice().await;

    let res = app.login("alice", "correct").await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["status"], 200);
    assert!(res.body["data"]["accessToken"].is_string());
    assert!(res.body["data"]["refreshToken"].is_string());
    assert_no_credentials(&res.body["data"]["user"]);

    assert!(res.cookies.iter().any(|c| c.starts_with("accessToken=")));
    assert!(res.cookies.iter().any(|c| c.starts_with("refreshToken=")));
    for cookie in &res.cookies {
        assert!(cookie.contains("HttpOnly"));
        assert!(cookie.contains("Secure"));
    }
}

#[tokio::test]
async fn login_with_wrong_password_is_401_without_cookies() {
    let app = TestApp::new();
    app.register_alice().await;

    let res = app.login("alice", "incorrect").await;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);
    assert_eq!(res.body, json!({ "status": 401, "message": "Invalid user credentials" }));
    assert!(res.cookies.is_empty());
}

#[tokio::test]
async fn login_unknown_user_is_404() {
    let app = TestApp::new();
    let res = app.login("nobody", "whatever").await;
    assert_eq!(res.status, StatusCode::NOT_FOUND);
    assert_eq!(res.body["message"], "User does not exist");
}

#[tokio::test]
async fn gate_blocks_requests_without_valid_token() {
    let app = TestApp::new();

    let res = app.get("/api/v1/users/current-user", &[]).await;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);
    assert_eq!(res.body, json!({ "status": 401, "message": "Unauthorized request" }));

    let res = app
        .get(
            "/api/v1/users/current-user",
            &[(header::AUTHORIZATION, "Bearer garbage".to_string())],
        )
        .await;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);
    assert!(res.body.get("data").is_none());
}

#[tokio::test]
async fn gate_accepts_cookie_or_bearer() {
    let app = TestApp::new();
    app.register_alice().await;
    let login = app.login("alice", "correct").await;
    let access = login.body["data"]["accessToken"].as_str().unwrap().to_string();

    let res = app
        .get(
            "/api/v1/users/current-user",
            &[(header::AUTHORIZATION, format!("Bearer {access}"))],
        )
        .await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["data"]["username"], "alice");
    assert_no_credentials(&res.body["data"]);

    // a valid cookie wins over a bogus header
    let res = app
        .get(
            "/api/v1/users/current-user",
            &[
                (header::COOKIE, format!("accessToken={access}")),
                (header::AUTHORIZATION, "Bearer garbage".to_string()),
            ],
        )
        .await;
    assert_eq!(res.status, StatusCode::OK);
}

#[tokio::test]
async fn refresh_rotation_and_logout_revocation() {
    let app = TestApp::new();
    app.register_alice().await;
    let login = app.login("alice", "correct").await;
    let access = login.body["data"]["accessToken"].as_str().unwrap().to_string();
    let original = login.body["data"]["refreshToken"].as_str().unwrap().to_string();

    // body fallback
    let res = app
        .post_json("/api/v1/users/refresh-token", json!({ "refreshToken": original }), None)
        .await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["message"], "Access token refreshed");
    let rotated = res.body["data"]["refreshToken"].as_str().unwrap().to_string();
    assert_ne!(rotated, original);
    assert!(res.cookies.iter().any(|c| c.starts_with("refreshToken=")));

    // the superseded token is single use
    let res = app
        .post_json("/api/v1/users/refresh-token", json!({ "refreshToken": original }), None)
        .await;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);

    let res = app.post_json("/api/v1/users/logout", json!({}), Some(&access)).await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["message"], "User logged out");

    let res = app
        .post_json("/api/v1/users/refresh-token", json!({ "refreshToken": rotated }), None)
        .await;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn refresh_without_any_token_is_401() {
    let app = TestApp::new();
    let req = Request::post("/api/v1/users/refresh-token")
        .body(Body::empty())
        .unwrap();
    let res = app.send(req).await;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);
    assert_eq!(res.body["message"], "Unauthorized request");
}

#[tokio::test]
async fn change_password_flow() {
    let app = TestApp::new();
    app.register_alice().await;
    let login = app.login("alice", "correct").await;
    let access = login.body["data"]["accessToken"].as_str().unwrap().to_string();

    let res = app
        .post_json(
            "/api/v1/users/change-password",
            json!({ "oldPassword": "correct", "newPassword": "brand-new" }),
            None,
        )
        .await;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);

    let res = app
        .post_json(
            "/api/v1/users/change-password",
            json!({ "oldPassword": "correct", "newPassword": "brand-new" }),
            Some(&access),
        )
        .await;
    assert_eq!(res.status, StatusCode::OK);

    assert_eq!(app.login("alice", "brand-new").await.status, StatusCode::OK);
    assert_eq!(app.login("alice", "correct").await.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn update_account_details() {
    let app = TestApp::new();
    app.register_alice().await;
    let login = app.login("alice", "correct").await;
    let access = login.body["data"]["accessToken"].as_str().unwrap().to_string();

    let req = Request::patch("/api/v1/users/update-account")
        .header(header::CONTENT_TYPE, "application/json")
        .header(header::AUTHORIZATION, format!("Bearer {access}"))
        .body(Body::from(
            json!({ "fullName": "Alice P. Liddell", "email": "ALICE.P@example.com" }).to_string(),
        ))
        .unwrap();
    let res = app.send(req).await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["data"]["fullName"], "Alice P. Liddell");
    assert_eq!(res.body["data"]["email"], "alice.p@example.com");
    assert_no_credentials(&res.body["data"]);
}

#[tokio::test]
async fn health() {
    let app = TestApp::new();
    let res = app.get("/api/v1/health", &[]).await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["status"], 200);
}

#[tokio::test]
async fn unreadable_bodies_get_the_error_envelope() {
    let app = TestApp::new();

    let req = Request::post("/api/v1/users/login")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let res = app.send(req).await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert_eq!(res.body, json!({ "status": 400, "message": "Malformed JSON body" }));

    // no content type
    let req = Request::post("/api/v1/users/login")
        .body(Body::from(json!({ "username": "alice", "password": "x" }).to_string()))
        .unwrap();
    let res = app.send(req).await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert_eq!(res.body["status"], 400);
    assert!(res.body["message"].is_string());

    // well-formed JSON of the wrong shape
    let res = app
        .post_json("/api/v1/users/register", json!({ "username": 7 }), None)
        .await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert_eq!(res.body["status"], 400);
    assert!(res.body.get("data").is_none());

    let req = Request::post("/api/v1/users/refresh-token")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let res = app.send(req).await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert_eq!(res.body["status"], 400);
}

#[tokio::test]
async fn logout_expires_session_cookies() {
    let app = TestApp::new();
    app.register_alice().await;
    let login = app.login("alice", "correct").await;
    let access = login.body["data"]["accessToken"].as_str().unwrap().to_string();
    let refresh = login.body["data"]["refreshToken"].as_str().unwrap().to_string();

    let req = Request::post("/api/v1/users/logout")
        .header(header::COOKIE, format!("accessToken={access}; refreshToken={refresh}"))
        .body(Body::empty())
        .unwrap();
    let res = app.send(req).await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.cookies.len(), 2);
    for cookie in &res.cookies {
        assert!(cookie.contains("Max-Age=0"));
        assert!(cookie.contains("HttpOnly"));
        assert!(cookie.contains("Secure"));
    }
}
