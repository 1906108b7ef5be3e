//! End-to-end tests over the assembled router.

use std::path::PathBuf;

use aegis_auth::{Claims, Environment, TokenConfig};
use aegis_server::{AppConfig, AppState, bootstrap, build_router};
use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header::AUTHORIZATION};
use tower::ServiceExt;

struct TestApp {
    router: Router,
    state: AppState,
    policies_path: PathBuf,
    _dir: tempfile::TempDir,
}

async fn spawn_app() -> TestApp {
    let dir = tempfile::tempdir().unwrap();
    let policies_path = dir.path().join("policies.json");

    let config = AppConfig {
        app_name: "aegis-test".to_string(),
        host: "127.0.0.1".to_string(),
        port: 0,
        environment: Environment::Testing,
        db_path: dir.path().join("identity.db"),
        policies_path: policies_path.clone(),
        log_level: "info".to_string(),
        cors_origins: vec!["http://localhost:3000".to_string()],
        token: TokenConfig {
            secret: Some("integration-test-secret".to_string()),
            environment: Environment::Testing,
            ..TokenConfig::default()
        },
    };

    let state = bootstrap::build_state(config).await.unwrap();
    TestApp {
        router: build_router(state.clone()),
        state,
        policies_path,
        _dir: dir,
    }
}

async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn json_request(method: &str, uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn with_bearer(mut request: Request<Body>, token: &str) -> Request<Body> {
    request.headers_mut().insert(
        AUTHORIZATION,
        format!("Bearer {token}").parse().unwrap(),
    );
    request
}

async fn password_token(app: &TestApp, username: &str, password: &str) -> String {
    let response = app
        .router
        .clone()
        .oneshot(json_request(
            "POST",
            "/auth/token",
            serde_json::json!({
                "grant_type": "password",
                "username": username,
                "password": password,
                "scope": "read write"
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    body_json(response).await["access_token"]
        .as_str()
        .unwrap()
        .to_string()
}

/// Signs a token for an ADMINS-group subject directly, bypassing the
/// credential table (the seeded admin account is intentionally inactive).
fn admin_token(app: &TestApp) -> String {
    let claims = Claims {
        sub: "ops-admin".to_string(),
        scope: "read write".to_string(),
        groups: vec!["ADMINS".to_string()],
        dept: "IT".to_string(),
        risk_score: 5,
        iss: None,
        aud: None,
        exp: None,
        iat: None,
    };
    app.state
        .auth_service
        .token_manager()
        .issue(&claims.to_payload(), Some(5))
        .unwrap()
}

#[tokio::test]
async fn test_token_and_me_roundtrip() {
    let app = spawn_app().await;
    let token = password_token(&app, "jdoe", "password123").await;

    let response = app
        .router
        .clone()
        .oneshot(with_bearer(
            Request::get("/auth/me").body(Body::empty()).unwrap(),
            &token,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["sub"], "jdoe");
    assert_eq!(body["dept"], "HR");
    assert_eq!(body["riskScore"], 20);
    assert_eq!(body["iss"], "aegis-identity");
    assert_eq!(body["aud"], "aegis-api");
    assert!(body["exp"].is_i64());
}

#[tokio::test]
async fn test_me_requires_bearer() {
    let app = spawn_app().await;
    let response = app
        .router
        .clone()
        .oneshot(Request::get("/auth/me").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_invalid_credentials_is_oauth_error() {
    let app = spawn_app().await;
    let response = app
        .router
        .clone()
        .oneshot(json_request(
            "POST",
            "/auth/token",
            serde_json::json!({
                "grant_type": "password",
                "username": "jdoe",
                "password": "wrong"
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let body = body_json(response).await;
    assert_eq!(body["error"], "invalid_client");
}

#[tokio::test]
async fn test_inactive_seeded_user_cannot_authenticate() {
    let app = spawn_app().await;
    // mrios is seeded inactive in the directory; the password grant
    // consults it and refuses.
    let response = app
        .router
        .clone()
        .oneshot(json_request(
            "POST",
            "/auth/token",
            serde_json::json!({
                "grant_type": "password",
                "username": "mrios",
                "password": "admin_pass"
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let body = body_json(response).await;
    assert_eq!(body["error"], "invalid_grant");
    assert_eq!(body["error_description"], "User account is inactive");
}

#[tokio::test]
async fn test_expired_token_rejected_on_me() {
    let app = spawn_app().await;
    let claims = Claims {
        sub: "jdoe".to_string(),
        scope: "read".to_string(),
        groups: vec![],
        dept: "HR".to_string(),
        risk_score: 20,
        iss: None,
        aud: None,
        exp: None,
        iat: None,
    };
    let expired = app
        .state
        .auth_service
        .token_manager()
        .issue(&claims.to_payload(), Some(-2))
        .unwrap();

    let response = app
        .router
        .clone()
        .oneshot(with_bearer(
            Request::get("/auth/me").body(Body::empty()).unwrap(),
            &expired,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_evaluate_permit_flow() {
    let app = spawn_app().await;
    let token = password_token(&app, "jdoe", "password123").await;

    let response = app
        .router
        .clone()
        .oneshot(with_bearer(
            json_request(
                "POST",
                "/authz/evaluate",
                serde_json::json!({
                    "subject": {"dept": "HR", "riskScore": 20},
                    "resource": {"type": "payroll"},
                    "context": {"deviceTrusted": true, "geo": "CL"}
                }),
            ),
            &token,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["decision"], "Permit");
    assert_eq!(body["reasons"][0], "ruleId: HR-Payroll-01");
}

#[tokio::test]
async fn test_evaluate_honours_correlation_header() {
    let app = spawn_app().await;
    let token = password_token(&app, "jdoe", "password123").await;

    let mut request = with_bearer(
        json_request(
            "POST",
            "/authz/evaluate",
            serde_json::json!({
                "subject": {"dept": "IT", "riskScore": 85},
                "resource": {"type": "data"},
                "context": {"geo": "US"}
            }),
        ),
        &token,
    );
    request
        .headers_mut()
        .insert("x-correlation-id", "corr-e2e-1".parse().unwrap());

    let response = app.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["decision"], "Challenge");
    let obligations: Vec<String> = body["obligations"]
        .as_array()
        .unwrap()
        .iter()
        .map(|o| o.as_str().unwrap().to_string())
        .collect();
    assert!(obligations.contains(&"correlation_id: corr-e2e-1".to_string()));
    assert!(obligations.contains(&"Log challenge requirement".to_string()));
}

#[tokio::test]
async fn test_evaluate_rejects_out_of_range_risk_score() {
    let app = spawn_app().await;
    let token = password_token(&app, "jdoe", "password123").await;

    let response = app
        .router
        .clone()
        .oneshot(with_bearer(
            json_request(
                "POST",
                "/authz/evaluate",
                serde_json::json!({
                    "subject": {"riskScore": 101},
                    "resource": {},
                    "context": {}
                }),
            ),
            &token,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_evaluate_requires_bearer() {
    let app = spawn_app().await;
    let response = app
        .router
        .clone()
        .oneshot(json_request(
            "POST",
            "/authz/evaluate",
            serde_json::json!({"subject": {}, "resource": {}, "context": {}}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_policy_reload_is_admin_only() {
    let app = spawn_app().await;

    let user_token = password_token(&app, "jdoe", "password123").await;
    let response = app
        .router
        .clone()
        .oneshot(with_bearer(
            Request::post("/authz/policies/reload")
                .body(Body::empty())
                .unwrap(),
            &user_token,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = app
        .router
        .clone()
        .oneshot(with_bearer(
            Request::post("/authz/policies/reload")
                .body(Body::empty())
                .unwrap(),
            &admin_token(&app),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["cache_cleared"], true);
    assert_eq!(body["reload_result"]["valid"], true);
    assert_eq!(body["reload_result"]["policies_count"], 3);
}

#[tokio::test]
async fn test_hot_reload_after_file_rewrite() {
    let app = spawn_app().await;
    let token = password_token(&app, "jdoe", "password123").await;

    let permit_request = serde_json::json!({
        "subject": {"dept": "HR", "riskScore": 20},
        "resource": {"type": "payroll"},
        "context": {"deviceTrusted": true, "geo": "CL"}
    });

    let response = app
        .router
        .clone()
        .oneshot(with_bearer(
            json_request("POST", "/authz/evaluate", permit_request.clone()),
            &token,
        ))
        .await
        .unwrap();
    assert_eq!(body_json(response).await["decision"], "Permit");

    // Replace the policy file with a single Deny rule and push its mtime
    // past the loaded snapshot.
    std::fs::write(
        &app.policies_path,
        serde_json::json!({
            "policies": [{
                "ruleId": "HR-Lockdown-01",
                "effect": "Deny",
                "description": "Payroll locked down",
                "conditions": {"resource.type": {"eq": "payroll"}}
            }]
        })
        .to_string(),
    )
    .unwrap();
    let future = filetime::FileTime::from_system_time(
        std::time::SystemTime::now() + std::time::Duration::from_secs(2),
    );
    filetime::set_file_mtime(&app.policies_path, future).unwrap();

    let response = app
        .router
        .clone()
        .oneshot(with_bearer(
            json_request("POST", "/authz/evaluate", permit_request),
            &token,
        ))
        .await
        .unwrap();
    let body = body_json(response).await;
    assert_eq!(body["decision"], "Deny");
    assert_eq!(body["reasons"][0], "ruleId: HR-Lockdown-01");
}

#[tokio::test]
async fn test_metrics_and_health_endpoints() {
    let app = spawn_app().await;
    let token = password_token(&app, "jdoe", "password123").await;

    let response = app
        .router
        .clone()
        .oneshot(with_bearer(
            Request::get("/authz/metrics").body(Body::empty()).unwrap(),
            &token,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["policies"]["total_count"], 3);
    assert_eq!(body["service"]["status"], "healthy");

    // Health endpoints are public.
    for uri in ["/health", "/authz/health", "/auth/health"] {
        let response = app
            .router
            .clone()
            .oneshot(Request::get(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK, "{uri}");
    }
}

#[tokio::test]
async fn test_scim_surface_requires_bearer() {
    let app = spawn_app().await;
    let response = app
        .router
        .clone()
        .oneshot(Request::get("/scim/v2/Users").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_scim_user_lifecycle() {
    let app = spawn_app().await;
    let token = password_token(&app, "jdoe", "password123").await;

    // Create.
    let response = app
        .router
        .clone()
        .oneshot(with_bearer(
            json_request(
                "POST",
                "/scim/v2/Users",
                serde_json::json!({
                    "userName": "nlopez",
                    "name": {"givenName": "Nadia", "familyName": "López"},
                    "emails": [{"value": "nadia.lopez@company.com", "primary": true}],
                    "dept": "Legal",
                    "riskScore": 35
                }),
            ),
            &token,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let created = body_json(response).await;
    let id = created["id"].as_str().unwrap().to_string();

    // Duplicate userName conflicts.
    let response = app
        .router
        .clone()
        .oneshot(with_bearer(
            json_request(
                "POST",
                "/scim/v2/Users",
                serde_json::json!({"userName": "nlopez"}),
            ),
            &token,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);

    // Filtered listing finds it.
    let response = app
        .router
        .clone()
        .oneshot(with_bearer(
            Request::get("/scim/v2/Users?filter=userName%20eq%20%22nlopez%22")
                .body(Body::empty())
                .unwrap(),
            &token,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let listing = body_json(response).await;
    assert_eq!(listing["totalResults"], 1);

    // Delete, then 404.
    let response = app
        .router
        .clone()
        .oneshot(with_bearer(
            Request::delete(format!("/scim/v2/Users/{id}"))
                .body(Body::empty())
                .unwrap(),
            &token,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = app
        .router
        .clone()
        .oneshot(with_bearer(
            Request::get(format!("/scim/v2/Users/{id}"))
                .body(Body::empty())
                .unwrap(),
            &token,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_token_endpoint_rate_limit() {
    let app = spawn_app().await;

    let request = || {
        let mut req = json_request(
            "POST",
            "/auth/token",
            serde_json::json!({
                "grant_type": "password",
                "username": "jdoe",
                "password": "wrong"
            }),
        );
        req.headers_mut()
            .insert("x-forwarded-for", "198.51.100.7".parse().unwrap());
        req
    };

    for _ in 0..10 {
        let response = app.router.clone().oneshot(request()).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    let response = app.router.clone().oneshot(request()).await.unwrap();
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);

    // A different client IP is unaffected.
    let mut other = json_request(
        "POST",
        "/auth/token",
        serde_json::json!({
            "grant_type": "password",
            "username": "jdoe",
            "password": "wrong"
        }),
    );
    other
        .headers_mut()
        .insert("x-forwarded-for", "198.51.100.8".parse().unwrap());
    let response = app.router.clone().oneshot(other).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_root_and_config_are_public_and_redacted() {
    let app = spawn_app().await;

    let response = app
        .router
        .clone()
        .oneshot(Request::get("/").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["name"], "aegis-test");

    let response = app
        .router
        .clone()
        .oneshot(Request::get("/config").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["jwt"]["algorithm"], "HS256");
    // No secret material in the view.
    assert!(body.to_string().find("integration-test-secret").is_none());
}
