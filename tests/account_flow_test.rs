//! # 账户生命周期集成测试
//!
//! 注册、登录、资料、改密、用量查询与停用的端到端行为。

use axum::Router;
use axum::http::StatusCode;
use tower::ServiceExt;

use speed_formatter::testing::{
    empty_request, json_request, read_json, test_context, test_router, with_bearer,
};

/// 账户流程测试套件
struct AccountSuite {
    router: Router,
}

impl AccountSuite {
    async fn setup() -> Self {
        let context = test_context().await;
        let router = test_router(context);
        Self { router }
    }

    /// 注册并登录，返回访问令牌
    async fn register_and_login(&self, email: &str, password: &str) -> String {
        let response = self
            .router
            .clone()
            .oneshot(json_request(
                "POST",
                "/auth/register",
                &serde_json::json!({ "email": email, "password": password }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);

        let response = self
            .router
            .clone()
            .oneshot(json_request(
                "POST",
                "/auth/login",
                &serde_json::json!({ "email": email, "password": password }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = read_json(response).await;
        body["access_token"].as_str().unwrap().to_string()
    }
}

#[tokio::test]
async fn test_registration_returns_201_with_free_plan() {
    let suite = AccountSuite::setup().await;

    let response = suite
        .router
        .clone()
        .oneshot(json_request(
            "POST",
            "/auth/register",
            &serde_json::json!({
                "email": "new@example.com",
                "password": "password123",
                "display_name": "New User"
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CREATED);
    let body = read_json(response).await;
    assert_eq!(body["email"], "new@example.com");
    assert_eq!(body["plan"], "free");
    assert_eq!(body["display_name"], "New User");
    assert!(body["uuid"].as_str().is_some());
}

#[tokio::test]
async fn test_duplicate_email_is_conflict_case_insensitive() {
    let suite = AccountSuite::setup().await;

    let first = suite
        .router
        .clone()
        .oneshot(json_request(
            "POST",
            "/auth/register",
            &serde_json::json!({ "email": "Dup@Example.com", "password": "password123" }),
        ))
        .await
        .unwrap();
    assert_eq!(first.status(), StatusCode::CREATED);

    // 同一邮箱换大小写再注册
    let second = suite
        .router
        .clone()
        .oneshot(json_request(
            "POST",
            "/auth/register",
            &serde_json::json!({ "email": "dup@example.COM", "password": "password123" }),
        ))
        .await
        .unwrap();
    assert_eq!(second.status(), StatusCode::CONFLICT);

    let body = read_json(second).await;
    assert_eq!(body["error"], "conflict");
}

#[tokio::test]
async fn test_short_password_is_rejected() {
    let suite = AccountSuite::setup().await;

    let response = suite
        .router
        .clone()
        .oneshot(json_request(
            "POST",
            "/auth/register",
            &serde_json::json!({ "email": "short@example.com", "password": "1234567" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = read_json(response).await;
    assert_eq!(body["details"], "password must be at least 8 characters");
}

#[tokio::test]
async fn test_login_failures_are_uniform() {
    let suite = AccountSuite::setup().await;
    suite
        .register_and_login("known@example.com", "password123")
        .await;

    // 未知邮箱与错误密码返回同一段文字
    let wrong_email = suite
        .router
        .clone()
        .oneshot(json_request(
            "POST",
            "/auth/login",
            &serde_json::json!({ "email": "unknown@example.com", "password": "password123" }),
        ))
        .await
        .unwrap();
    let wrong_password = suite
        .router
        .clone()
        .oneshot(json_request(
            "POST",
            "/auth/login",
            &serde_json::json!({ "email": "known@example.com", "password": "wrong-password" }),
        ))
        .await
        .unwrap();

    assert_eq!(wrong_email.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(wrong_password.status(), StatusCode::UNAUTHORIZED);

    let first = read_json(wrong_email).await;
    let second = read_json(wrong_password).await;
    assert_eq!(first["details"], "invalid email or password");
    assert_eq!(first["details"], second["details"]);
}

#[tokio::test]
async fn test_profile_roundtrip_and_update() {
    let suite = AccountSuite::setup().await;
    let token = suite
        .register_and_login("profile@example.com", "password123")
        .await;

    let response = suite
        .router
        .clone()
        .oneshot(with_bearer(empty_request("GET", "/auth/profile"), &token))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json(response).await;
    assert_eq!(body["email"], "profile@example.com");
    assert_eq!(body["plan"], "free");

    let response = suite
        .router
        .clone()
        .oneshot(with_bearer(
            json_request(
                "PATCH",
                "/auth/profile",
                &serde_json::json!({ "display_name": "Renamed" }),
            ),
            &token,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json(response).await;
    assert_eq!(body["display_name"], "Renamed");
}

#[tokio::test]
async fn test_protected_routes_require_bearer() {
    let suite = AccountSuite::setup().await;

    let response = suite
        .router
        .clone()
        .oneshot(empty_request("GET", "/auth/profile"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = suite
        .router
        .clone()
        .oneshot(with_bearer(empty_request("GET", "/auth/profile"), "garbage"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_change_password_requires_current() {
    let suite = AccountSuite::setup().await;
    let token = suite
        .register_and_login("pw@example.com", "password123")
        .await;

    let wrong = suite
        .router
        .clone()
        .oneshot(with_bearer(
            json_request(
                "POST",
                "/auth/change-password",
                &serde_json::json!({ "current_password": "nope", "new_password": "password456" }),
            ),
            &token,
        ))
        .await
        .unwrap();
    assert_eq!(wrong.status(), StatusCode::UNAUTHORIZED);

    let right = suite
        .router
        .clone()
        .oneshot(with_bearer(
            json_request(
                "POST",
                "/auth/change-password",
                &serde_json::json!({
                    "current_password": "password123",
                    "new_password": "password456"
                }),
            ),
            &token,
        ))
        .await
        .unwrap();
    assert_eq!(right.status(), StatusCode::OK);

    // 新密码生效
    let login = suite
        .router
        .clone()
        .oneshot(json_request(
            "POST",
            "/auth/login",
            &serde_json::json!({ "email": "pw@example.com", "password": "password456" }),
        ))
        .await
        .unwrap();
    assert_eq!(login.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_usage_endpoint_reports_subscription_standing() {
    let suite = AccountSuite::setup().await;
    let token = suite
        .register_and_login("usage@example.com", "password123")
        .await;

    let response = suite
        .router
        .clone()
        .oneshot(with_bearer(empty_request("GET", "/auth/usage"), &token))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json(response).await;
    assert_eq!(body["plan"], "free");
    assert_eq!(body["current_usage"], 0);
    assert_eq!(body["monthly_limit"], 100);
    assert_eq!(body["totals"]["total_requests"], 0);
}

#[tokio::test]
async fn test_deactivation_cancels_subscription_and_blocks_login() {
    let suite = AccountSuite::setup().await;
    let token = suite
        .register_and_login("gone@example.com", "password123")
        .await;

    let response = suite
        .router
        .clone()
        .oneshot(with_bearer(empty_request("DELETE", "/auth/account"), &token))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    // 停用后令牌解析按账户不存在处理
    let profile = suite
        .router
        .clone()
        .oneshot(with_bearer(empty_request("GET", "/auth/profile"), &token))
        .await
        .unwrap();
    assert_eq!(profile.status(), StatusCode::NOT_FOUND);

    // 登录也一并失效
    let login = suite
        .router
        .clone()
        .oneshot(json_request(
            "POST",
            "/auth/login",
            &serde_json::json!({ "email": "gone@example.com", "password": "password123" }),
        ))
        .await
        .unwrap();
    assert_eq!(login.status(), StatusCode::UNAUTHORIZED);
}
