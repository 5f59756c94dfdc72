//! # 路由配置
//!
//! 格式化端点与注册登录开放访问，账户、密钥与管理端点统一挂
//! Bearer 认证中间件。

use axum::Router;
use axum::middleware::from_fn_with_state;
use axum::routing::{delete, get, patch, post};

use super::AppState;
use super::handlers::{api_keys, auth, format, system};
use super::middleware::bearer_auth;

/// 创建所有路由
pub fn create_routes(state: AppState) -> Router {
    let protected = Router::new()
        .route("/auth/profile", get(auth::profile).patch(auth::update_profile))
        .route("/auth/change-password", post(auth::change_password))
        .route("/auth/usage", get(auth::usage))
        .route("/auth/account", delete(auth::deactivate))
        .route("/api-keys", get(api_keys::list).post(api_keys::create))
        .route("/api-keys/{id}", patch(api_keys::rename).delete(api_keys::remove))
        .route("/api-keys/{id}/usage", get(api_keys::usage))
        .route("/api-keys/{id}/deactivate", patch(api_keys::deactivate))
        .route("/admin/stats", get(system::admin_stats))
        .layer(from_fn_with_state(state.clone(), bearer_auth));

    Router::new()
        .route("/format", post(format::public_format))
        .route("/api/v1/format", post(format::api_format))
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/health", get(system::health))
        .route("/benchmark", get(system::benchmark))
        .merge(protected)
        .with_state(state)
}
