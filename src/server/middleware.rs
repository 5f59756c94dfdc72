//! # 认证中间件
//!
//! 校验 Bearer 令牌并把实时账户信息注入请求扩展。令牌只是身份
//! 指针，管理员标记等状态每次都从存储重新读取。

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::Response;
use std::sync::Arc;

use super::AppState;
use crate::error::ServiceError;

/// 认证后注入请求扩展的上下文
#[derive(Debug, Clone)]
pub struct AuthContext {
    /// 账户ID
    pub account_id: i32,
    /// 管理员能力标记
    pub is_admin: bool,
}

impl AuthContext {
    /// 管理端点的能力判定
    pub const fn can_view_admin(&self) -> bool {
        self.is_admin
    }
}

/// Bearer 认证中间件
///
/// 缺失或无效的令牌直接短路为 401；账户已停用按不存在处理，
/// 与凭证解析器的语义保持一致。
pub async fn bearer_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ServiceError> {
    let token = request
        .headers()
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|header| header.to_str().ok())
        .and_then(|header| header.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or_else(|| crate::unauthenticated_error!("bearer token is required"))?;

    let bearer = state.resolver.resolve_bearer(token).await?;

    let context = Arc::new(AuthContext {
        account_id: bearer.account.id,
        is_admin: bearer.account.is_admin,
    });
    request.extensions_mut().insert(context);

    Ok(next.run(request).await)
}
