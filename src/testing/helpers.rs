//! # 测试辅助函数
//!
//! 内存数据库、应用上下文与 HTTP 请求构造。集成测试通过
//! `tower::ServiceExt::oneshot` 直接驱动路由器，不真正监听端口。

use axum::Router;
use axum::body::Body;
use axum::extract::ConnectInfo;
use axum::http::{Request, Response, header};
use sea_orm::{ConnectOptions, Database, DatabaseConnection, DbErr};
use sea_orm_migration::MigratorTrait;
use std::net::SocketAddr;
use std::sync::{Arc, Once};

use crate::app::AppContext;
use crate::config::AppConfig;
use crate::server::{AppState, routes};

static INIT: Once = Once::new();

/// 初始化测试日志，进程内只执行一次
pub fn init_test_env() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::WARN)
            .with_test_writer()
            .try_init()
            .ok();
    });
}

/// 创建已迁移的内存数据库
///
/// 连接池收敛为单连接，内存库在多个池化连接间不共享。
pub async fn create_test_db() -> Result<DatabaseConnection, DbErr> {
    let mut options = ConnectOptions::new("sqlite::memory:");
    options.max_connections(1).sqlx_logging(false);

    let db = Database::connect(options).await?;
    ::migration::Migrator::up(&db, None).await?;
    Ok(db)
}

/// 测试配置：低 bcrypt 成本与固定密钥，行为与默认配置一致
pub fn test_config() -> AppConfig {
    let mut config = AppConfig::default();
    config.auth.jwt_secret = "test-secret-key-for-integration".to_string();
    config.auth.bcrypt_cost = 4;
    config
}

/// 组装测试用的应用上下文
pub async fn test_context() -> Arc<AppContext> {
    init_test_env();
    let db = create_test_db().await.expect("in-memory database");
    Arc::new(AppContext::build(Arc::new(test_config()), Arc::new(db)))
}

/// 上下文对应的路由器
pub fn test_router(context: Arc<AppContext>) -> Router {
    routes::create_routes(AppState::new(context))
}

/// 测试请求的默认对端地址
pub const TEST_ADDR: &str = "203.0.113.7:4000";

/// 构造 JSON 请求，带上 connect-info 扩展供限流取对端地址
pub fn json_request(method: &str, uri: &str, body: &serde_json::Value) -> Request<Body> {
    json_request_from(method, uri, body, TEST_ADDR)
}

/// 构造带指定对端地址的 JSON 请求
pub fn json_request_from(
    method: &str,
    uri: &str,
    body: &serde_json::Value,
    addr: &str,
) -> Request<Body> {
    let addr: SocketAddr = addr.parse().expect("valid socket address");
    let mut request = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .expect("valid request");
    request.extensions_mut().insert(ConnectInfo(addr));
    request
}

/// 构造无请求体的请求
pub fn empty_request(method: &str, uri: &str) -> Request<Body> {
    let addr: SocketAddr = TEST_ADDR.parse().expect("valid socket address");
    let mut request = Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .expect("valid request");
    request.extensions_mut().insert(ConnectInfo(addr));
    request
}

/// 给请求补上 Bearer 令牌
#[must_use]
pub fn with_bearer(mut request: Request<Body>, token: &str) -> Request<Body> {
    let value = format!("Bearer {token}");
    request.headers_mut().insert(
        header::AUTHORIZATION,
        value.parse().expect("valid header value"),
    );
    request
}

/// 给请求补上 API 密钥头
#[must_use]
pub fn with_api_key(mut request: Request<Body>, key: &str) -> Request<Body> {
    request
        .headers_mut()
        .insert("x-api-key", key.parse().expect("valid header value"));
    request
}

/// 读取响应体为 JSON
pub async fn read_json(response: Response<Body>) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("readable body");
    serde_json::from_slice(&bytes).expect("JSON body")
}
