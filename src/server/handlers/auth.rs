//! # 账户端点
//!
//! 注册与登录开放访问，其余端点经 Bearer 认证中间件保护。

use axum::extract::State;
use axum::http::StatusCode;
use axum::{Extension, Json};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::auth::{AccountProfile, IssuedToken};
use crate::error::Result;
use crate::server::AppState;
use crate::server::middleware::AuthContext;
use crate::usage::UsageSummary;

/// 注册请求体
#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    /// 邮箱，大小写视为同一地址
    pub email: String,
    /// 密码，至少 8 个字符
    pub password: String,
    /// 显示名，可选
    pub display_name: Option<String>,
}

/// 登录请求体
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// 登录响应：令牌加账户摘要
#[derive(Debug, Serialize)]
pub struct LoginResponse {
    #[serde(flatten)]
    pub token: IssuedToken,
    pub account: AccountProfile,
}

/// 资料更新请求体
#[derive(Debug, Deserialize)]
pub struct UpdateProfileRequest {
    pub display_name: Option<String>,
}

/// 改密请求体
#[derive(Debug, Deserialize)]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

/// `/auth/usage` 响应：订阅当期状态加历史聚合
#[derive(Debug, Serialize)]
pub struct UsageResponse {
    /// 当前套餐
    pub plan: String,
    /// 当期已用计数
    pub current_usage: i64,
    /// 月度上限
    pub monthly_limit: i64,
    /// 周期重置时间
    pub period_resets_at: chrono::NaiveDateTime,
    /// 历史聚合用量
    pub totals: UsageSummary,
}

/// `POST /auth/register`
pub async fn register(
    State(state): State<AppState>,
    Json(body): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<AccountProfile>)> {
    let (account, subscription) = state
        .accounts
        .register(&body.email, &body.password, body.display_name.as_deref())
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(AccountProfile {
            uuid: account.uuid,
            email: account.email,
            display_name: account.display_name,
            plan: subscription.plan,
            created_at: account.created_at,
        }),
    ))
}

/// `POST /auth/login`
pub async fn login(
    State(state): State<AppState>,
    Json(body): Json<LoginRequest>,
) -> Result<Json<LoginResponse>> {
    let (token, account) = state.accounts.login(&body.email, &body.password).await?;
    let profile = state.accounts.profile(account.id).await?;

    Ok(Json(LoginResponse {
        token,
        account: profile,
    }))
}

/// `GET /auth/profile`
pub async fn profile(
    State(state): State<AppState>,
    Extension(auth): Extension<Arc<AuthContext>>,
) -> Result<Json<AccountProfile>> {
    Ok(Json(state.accounts.profile(auth.account_id).await?))
}

/// `PATCH /auth/profile`
pub async fn update_profile(
    State(state): State<AppState>,
    Extension(auth): Extension<Arc<AuthContext>>,
    Json(body): Json<UpdateProfileRequest>,
) -> Result<Json<AccountProfile>> {
    let profile = state
        .accounts
        .update_profile(auth.account_id, body.display_name.as_deref())
        .await?;
    Ok(Json(profile))
}

/// `POST /auth/change-password`
pub async fn change_password(
    State(state): State<AppState>,
    Extension(auth): Extension<Arc<AuthContext>>,
    Json(body): Json<ChangePasswordRequest>,
) -> Result<Json<serde_json::Value>> {
    state
        .accounts
        .change_password(auth.account_id, &body.current_password, &body.new_password)
        .await?;
    Ok(Json(serde_json::json!({ "message": "password updated" })))
}

/// `GET /auth/usage`
pub async fn usage(
    State(state): State<AppState>,
    Extension(auth): Extension<Arc<AuthContext>>,
) -> Result<Json<UsageResponse>> {
    let subscription = state
        .quota
        .current_standing(auth.account_id)
        .await?
        .ok_or_else(|| crate::not_found_error!("no active subscription"))?;
    let totals = state.usage.account_summary(auth.account_id).await?;

    Ok(Json(UsageResponse {
        plan: subscription.plan,
        current_usage: subscription.current_usage,
        monthly_limit: subscription.monthly_limit,
        period_resets_at: subscription.period_resets_at,
        totals,
    }))
}

/// `DELETE /auth/account`：软删除，订阅同步取消
pub async fn deactivate(
    State(state): State<AppState>,
    Extension(auth): Extension<Arc<AuthContext>>,
) -> Result<Json<serde_json::Value>> {
    state.accounts.deactivate(auth.account_id).await?;
    Ok(Json(serde_json::json!({ "message": "account deactivated" })))
}
