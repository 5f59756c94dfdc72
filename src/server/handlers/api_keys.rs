//! # API 密钥端点
//!
//! 全部按所有者账户限定范围。完整密钥串只在创建响应中出现一次，
//! 之后任何端点都只给预览。

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::{Extension, Json};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::auth::ApiKeyView;
use crate::auth::api_key::key_preview;
use crate::error::Result;
use crate::server::AppState;
use crate::server::middleware::AuthContext;
use crate::usage::UsageSummary;

/// 创建与重命名共用的请求体
#[derive(Debug, Deserialize)]
pub struct KeyLabelRequest {
    pub label: String,
}

/// 创建响应，唯一一次携带完整密钥串
#[derive(Debug, Serialize)]
pub struct CreatedKeyResponse {
    pub id: i32,
    /// 完整密钥串，仅此一次
    pub key: String,
    pub key_preview: String,
    pub label: String,
    pub created_at: chrono::NaiveDateTime,
}

/// 密钥维度的用量响应
#[derive(Debug, Serialize)]
pub struct KeyUsageResponse {
    pub id: i32,
    pub key_preview: String,
    pub label: String,
    pub totals: UsageSummary,
}

/// `GET /api-keys`
pub async fn list(
    State(state): State<AppState>,
    Extension(auth): Extension<Arc<AuthContext>>,
) -> Result<Json<Vec<ApiKeyView>>> {
    let keys = state.api_keys.list(auth.account_id).await?;
    Ok(Json(keys.iter().map(ApiKeyView::from).collect()))
}

/// `POST /api-keys`
pub async fn create(
    State(state): State<AppState>,
    Extension(auth): Extension<Arc<AuthContext>>,
    Json(body): Json<KeyLabelRequest>,
) -> Result<(StatusCode, Json<CreatedKeyResponse>)> {
    let created = state.api_keys.create(auth.account_id, &body.label).await?;

    Ok((
        StatusCode::CREATED,
        Json(CreatedKeyResponse {
            id: created.id,
            key_preview: key_preview(&created.key),
            key: created.key,
            label: created.label,
            created_at: created.created_at,
        }),
    ))
}

/// `GET /api-keys/{id}/usage`
pub async fn usage(
    State(state): State<AppState>,
    Extension(auth): Extension<Arc<AuthContext>>,
    Path(key_id): Path<i32>,
) -> Result<Json<KeyUsageResponse>> {
    let key = state.api_keys.find_owned(auth.account_id, key_id).await?;
    let totals = state.usage.key_summary(key.id).await?;

    Ok(Json(KeyUsageResponse {
        id: key.id,
        key_preview: key_preview(&key.key),
        label: key.label,
        totals,
    }))
}

/// `PATCH /api-keys/{id}`：只改标签
pub async fn rename(
    State(state): State<AppState>,
    Extension(auth): Extension<Arc<AuthContext>>,
    Path(key_id): Path<i32>,
    Json(body): Json<KeyLabelRequest>,
) -> Result<Json<ApiKeyView>> {
    let key = state
        .api_keys
        .rename(auth.account_id, key_id, &body.label)
        .await?;
    Ok(Json(ApiKeyView::from(&key)))
}

/// `PATCH /api-keys/{id}/deactivate`：单向停用
pub async fn deactivate(
    State(state): State<AppState>,
    Extension(auth): Extension<Arc<AuthContext>>,
    Path(key_id): Path<i32>,
) -> Result<Json<ApiKeyView>> {
    let key = state.api_keys.deactivate(auth.account_id, key_id).await?;
    Ok(Json(ApiKeyView::from(&key)))
}

/// `DELETE /api-keys/{id}`
pub async fn remove(
    State(state): State<AppState>,
    Extension(auth): Extension<Arc<AuthContext>>,
    Path(key_id): Path<i32>,
) -> Result<Json<serde_json::Value>> {
    state.api_keys.delete(auth.account_id, key_id).await?;
    Ok(Json(serde_json::json!({ "message": "API key deleted" })))
}
