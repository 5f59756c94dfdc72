//! # 格式化流水线集成测试
//!
//! 覆盖公共端点与 API 端点的限流、认证、配额与用量记录行为。
//! 测试统一用 Python 语言，走进程内正则引擎，不派生子进程。

use axum::Router;
use axum::http::StatusCode;
use sea_orm::EntityTrait;
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

use entity::{api_keys, subscriptions};
use speed_formatter::app::AppContext;
use speed_formatter::auth::PlanTier;
use speed_formatter::testing::{
    ApiKeyFixture, SubscriptionFixture, json_request, json_request_from, read_json,
    seed_account_with_plan, test_context, test_router, with_api_key, with_bearer,
};

/// 流水线测试套件
struct PipelineSuite {
    context: Arc<AppContext>,
    router: Router,
}

impl PipelineSuite {
    async fn setup() -> Self {
        let context = test_context().await;
        let router = test_router(context.clone());
        Self { context, router }
    }

    fn format_body() -> serde_json::Value {
        serde_json::json!({ "code": "x=1,2\n", "language": "python" })
    }

    async fn subscription_usage(&self, subscription_id: i32) -> i64 {
        subscriptions::Entity::find_by_id(subscription_id)
            .one(self.context.db.as_ref())
            .await
            .unwrap()
            .unwrap()
            .current_usage
    }

    /// 等待异步用量提交落库
    async fn wait_for_usage(&self, subscription_id: i32, expected: i64) {
        for _ in 0..50 {
            if self.subscription_usage(subscription_id).await == expected {
                return;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        panic!(
            "usage never reached {expected}, still {}",
            self.subscription_usage(subscription_id).await
        );
    }
}

#[tokio::test]
async fn test_anonymous_format_succeeds_with_anonymous_plan() {
    let suite = PipelineSuite::setup().await;

    let response = suite
        .router
        .clone()
        .oneshot(json_request("POST", "/format", &PipelineSuite::format_body()))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json(response).await;
    assert_eq!(body["status"], "success");
    assert_eq!(body["formatted_code"], "x=1, 2\n");
    assert_eq!(body["formatter_used"], "regex");
    assert_eq!(body["user_plan"], "anonymous");
    assert_eq!(body["input_length"], 6);
}

#[tokio::test]
async fn test_anonymous_eleventh_request_is_throttled_by_ip() {
    let suite = PipelineSuite::setup().await;
    let body = PipelineSuite::format_body();

    for _ in 0..10 {
        let response = suite
            .router
            .clone()
            .oneshot(json_request_from("POST", "/format", &body, "198.51.100.1:9000"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    // 同一 IP 的第 11 次被限流
    let response = suite
        .router
        .clone()
        .oneshot(json_request_from("POST", "/format", &body, "198.51.100.1:9001"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    assert!(response.headers().contains_key("retry-after"));

    let payload = read_json(response).await;
    assert_eq!(payload["error"], "throttled");
    assert_eq!(payload["ceiling"], 10);

    // 不同 IP 不受影响
    let response = suite
        .router
        .clone()
        .oneshot(json_request_from("POST", "/format", &body, "198.51.100.2:9000"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_anonymous_caller_never_hits_quota() {
    let suite = PipelineSuite::setup().await;

    // 匿名请求在窗口额度内全部到达委托阶段，绝不报配额耗尽
    for _ in 0..10 {
        let response = suite
            .router
            .clone()
            .oneshot(json_request_from(
                "POST",
                "/format",
                &PipelineSuite::format_body(),
                "198.51.100.3:9000",
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}

#[tokio::test]
async fn test_api_endpoint_requires_api_key() {
    let suite = PipelineSuite::setup().await;

    let response = suite
        .router
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/v1/format",
            &PipelineSuite::format_body(),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = read_json(response).await;
    assert_eq!(body["error"], "unauthenticated");
}

#[tokio::test]
async fn test_api_key_format_succeeds_and_commits_usage() {
    let suite = PipelineSuite::setup().await;
    let (account, subscription) =
        seed_account_with_plan(suite.context.db.as_ref(), "pro@example.com", PlanTier::Pro).await;
    let key = ApiKeyFixture::new(account.id)
        .insert(suite.context.db.as_ref())
        .await;

    let request = with_api_key(
        json_request("POST", "/api/v1/format", &PipelineSuite::format_body()),
        &key.key,
    );
    let response = suite.router.clone().oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json(response).await;
    assert_eq!(body["user_plan"], "pro");

    // 配额计数经用量记录路径异步提交
    suite.wait_for_usage(subscription.id, 1).await;
}

#[tokio::test]
async fn test_exhausted_quota_returns_429_and_never_increments() {
    let suite = PipelineSuite::setup().await;
    let (account, _) =
        seed_account_with_plan(suite.context.db.as_ref(), "maxed@example.com", PlanTier::Free)
            .await;

    // 替换订阅为耗尽状态
    subscriptions::Entity::delete_many()
        .exec(suite.context.db.as_ref())
        .await
        .unwrap();
    let subscription = SubscriptionFixture::new(account.id)
        .plan(PlanTier::Free)
        .exhausted()
        .insert(suite.context.db.as_ref())
        .await;
    let key = ApiKeyFixture::new(account.id)
        .insert(suite.context.db.as_ref())
        .await;

    let request = with_api_key(
        json_request("POST", "/api/v1/format", &PipelineSuite::format_body()),
        &key.key,
    );
    let response = suite.router.clone().oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    let body = read_json(response).await;
    assert_eq!(body["error"], "quota_exceeded");
    assert_eq!(body["current_usage"], 100);
    assert_eq!(body["monthly_limit"], 100);

    // 被拒绝的请求不触发用量记录，计数保持不变
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(suite.subscription_usage(subscription.id).await, 100);
}

#[tokio::test]
async fn test_deactivated_api_key_is_unauthenticated() {
    let suite = PipelineSuite::setup().await;
    let (account, _) =
        seed_account_with_plan(suite.context.db.as_ref(), "revoked@example.com", PlanTier::Basic)
            .await;
    let key = ApiKeyFixture::new(account.id)
        .inactive()
        .insert(suite.context.db.as_ref())
        .await;

    let request = with_api_key(
        json_request("POST", "/api/v1/format", &PipelineSuite::format_body()),
        &key.key,
    );
    let response = suite.router.clone().oneshot(request).await.unwrap();

    // 停用密钥报 401 而非 404
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = read_json(response).await;
    assert_eq!(body["error"], "unauthenticated");
    assert_eq!(body["details"], "API key is not recognized");
}

#[tokio::test]
async fn test_malformed_api_key_rejected_without_store_lookup() {
    let suite = PipelineSuite::setup().await;
    let (account, _) =
        seed_account_with_plan(suite.context.db.as_ref(), "fmt@example.com", PlanTier::Free).await;
    let key = ApiKeyFixture::new(account.id)
        .insert(suite.context.db.as_ref())
        .await;

    let request = with_api_key(
        json_request("POST", "/api/v1/format", &PipelineSuite::format_body()),
        "sfk-not-hex-at-all",
    );
    let response = suite.router.clone().oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = read_json(response).await;
    assert_eq!(body["error"], "malformed");

    // 无存储查询，任何密钥的最后使用时间都不会被补记
    tokio::time::sleep(Duration::from_millis(100)).await;
    let stored = api_keys::Entity::find_by_id(key.id)
        .one(suite.context.db.as_ref())
        .await
        .unwrap()
        .unwrap();
    assert!(stored.last_used_at.is_none());
}

#[tokio::test]
async fn test_api_key_takes_precedence_over_bearer() {
    let suite = PipelineSuite::setup().await;

    // 两个账户：密钥属于 team 档，令牌属于 free 档
    let (key_account, _) =
        seed_account_with_plan(suite.context.db.as_ref(), "team@example.com", PlanTier::Team)
            .await;
    let key = ApiKeyFixture::new(key_account.id)
        .insert(suite.context.db.as_ref())
        .await;

    let (token_account, _) =
        seed_account_with_plan(suite.context.db.as_ref(), "free@example.com", PlanTier::Free)
            .await;
    let token = suite
        .context
        .jwt
        .sign(token_account.id, token_account.email.clone(), PlanTier::Free)
        .unwrap();

    let request = with_bearer(
        with_api_key(
            json_request("POST", "/format", &PipelineSuite::format_body()),
            &key.key,
        ),
        &token,
    );
    let response = suite.router.clone().oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json(response).await;
    // 身份经 API 密钥解析，套餐为密钥所有者的 team
    assert_eq!(body["user_plan"], "team");
}

#[tokio::test]
async fn test_api_key_in_query_parameter_is_accepted() {
    let suite = PipelineSuite::setup().await;
    let (account, _) =
        seed_account_with_plan(suite.context.db.as_ref(), "query@example.com", PlanTier::Basic)
            .await;
    let key = ApiKeyFixture::new(account.id)
        .insert(suite.context.db.as_ref())
        .await;

    let uri = format!("/api/v1/format?api_key={}", key.key);
    let response = suite
        .router
        .clone()
        .oneshot(json_request("POST", &uri, &PipelineSuite::format_body()))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json(response).await;
    assert_eq!(body["user_plan"], "basic");
}

#[tokio::test]
async fn test_unsupported_language_is_malformed() {
    let suite = PipelineSuite::setup().await;

    let response = suite
        .router
        .clone()
        .oneshot(json_request(
            "POST",
            "/format",
            &serde_json::json!({ "code": "x", "language": "cobol" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = read_json(response).await;
    assert_eq!(body["error"], "malformed");
    assert!(body["details"].as_str().unwrap().contains("supported"));
}

#[tokio::test]
async fn test_repeated_format_is_byte_identical() {
    let suite = PipelineSuite::setup().await;
    let body = serde_json::json!({ "code": "a,b\n\n\n\nc", "language": "python" });

    let first = read_json(
        suite
            .router
            .clone()
            .oneshot(json_request("POST", "/format", &body))
            .await
            .unwrap(),
    )
    .await;
    let second = read_json(
        suite
            .router
            .clone()
            .oneshot(json_request("POST", "/format", &body))
            .await
            .unwrap(),
    )
    .await;

    assert_eq!(first["formatted_code"], second["formatted_code"]);
}

#[tokio::test]
async fn test_account_without_subscription_is_quota_denied() {
    let suite = PipelineSuite::setup().await;
    let (account, _) =
        seed_account_with_plan(suite.context.db.as_ref(), "lapsed@example.com", PlanTier::Free)
            .await;
    // 订阅转为已取消，密钥解析即失败
    subscriptions::Entity::delete_many()
        .exec(suite.context.db.as_ref())
        .await
        .unwrap();
    SubscriptionFixture::new(account.id)
        .cancelled()
        .insert(suite.context.db.as_ref())
        .await;
    let key = ApiKeyFixture::new(account.id)
        .insert(suite.context.db.as_ref())
        .await;

    let request = with_api_key(
        json_request("POST", "/api/v1/format", &PipelineSuite::format_body()),
        &key.key,
    );
    let response = suite.router.clone().oneshot(request).await.unwrap();

    // 无活跃订阅的密钥按认证失败处理
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}
