//! # 格式化端点
//!
//! 公共端点与 API 专用端点共用同一条流水线函数，区别只在凭证
//! 要求与窗口参数。匿名请求先过 IP 限流再做其他任何事；携带凭证
//! 的请求先解析身份，再用真实套餐上限限流，最后查配额。配额计数
//! 的唯一提交点在用量记录路径上，两个端点不会重复计数。

use axum::Json;
use axum::extract::{ConnectInfo, Query, State};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::time::Duration;

use crate::auth::types::{CallerIdentity, PlanTier, PresentedCredentials};
use crate::error::Result;
use crate::formatter::Language;
use crate::quota::QuotaDecision;
use crate::ratelimit::Admission;
use crate::server::AppState;
use crate::usage::UsageEvent;

/// 公共端点的 15 分钟窗口
const PUBLIC_WINDOW: Duration = Duration::from_secs(15 * 60);
/// API 端点的 60 秒窗口
const API_WINDOW: Duration = Duration::from_secs(60);
/// 匿名调用者在公共窗口内的上限
const ANONYMOUS_PUBLIC_CEILING: u32 = 10;

/// 格式化请求体
#[derive(Debug, Deserialize)]
pub struct FormatRequest {
    /// 待格式化的代码
    pub code: String,
    /// 语言标识，接受常见别名
    pub language: String,
}

/// 查询参数中的备用凭证位置
#[derive(Debug, Default, Deserialize)]
pub struct FormatQuery {
    /// `X-API-Key` 头的查询参数替代
    pub api_key: Option<String>,
}

/// 格式化成功响应
#[derive(Debug, Serialize)]
pub struct FormatResponse {
    /// 格式化后的代码
    pub formatted_code: String,
    /// 格式化耗时（毫秒）
    pub execution_time_ms: u64,
    /// 实际执行的引擎
    pub formatter_used: String,
    /// 固定为 `success`
    pub status: &'static str,
    /// 输入字节数
    pub input_length: usize,
    /// 输出字节数
    pub output_length: usize,
    /// 调用者套餐标签，匿名为 `anonymous`
    pub user_plan: String,
}

/// `POST /format`：公共端点，接受匿名调用
pub async fn public_format(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    Query(query): Query<FormatQuery>,
    headers: axum::http::HeaderMap,
    Json(body): Json<FormatRequest>,
) -> Result<Json<FormatResponse>> {
    let credentials = extract_credentials(&headers, query.api_key.as_deref());
    run_pipeline(&state, credentials, Endpoint::Public, addr, &headers, body).await
}

/// `POST /api/v1/format`：API 密钥强制，匿名与纯 Bearer 一律拒绝
pub async fn api_format(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    Query(query): Query<FormatQuery>,
    headers: axum::http::HeaderMap,
    Json(body): Json<FormatRequest>,
) -> Result<Json<FormatResponse>> {
    let credentials = extract_credentials(&headers, query.api_key.as_deref());
    if credentials.api_key.is_none() {
        return Err(crate::unauthenticated_error!("API key is required"));
    }
    run_pipeline(&state, credentials, Endpoint::Api, addr, &headers, body).await
}

/// 两个格式化端点的窗口参数差异
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Endpoint {
    Public,
    Api,
}

impl Endpoint {
    /// 窗口键的命名空间前缀，隔离两套窗口
    const fn namespace(self) -> &'static str {
        match self {
            Self::Public => "public",
            Self::Api => "api",
        }
    }

    const fn window(self) -> Duration {
        match self {
            Self::Public => PUBLIC_WINDOW,
            Self::Api => API_WINDOW,
        }
    }

    const fn ceiling(self, plan: PlanTier) -> u32 {
        match self {
            Self::Public => plan.public_window_ceiling(),
            Self::Api => plan.api_window_ceiling(),
        }
    }
}

/// 共享的请求流水线
///
/// 匿名路径：IP 限流（粗粒度、零存储开销）即为第一步。凭证路径：
/// 先解析身份（无效凭证优先于窗口耗尽上报），再按套餐上限限流，
/// 再查月度配额。配额检查失败不产生任何副作用，用量记录只在
/// 委托成功后触发。
async fn run_pipeline(
    state: &AppState,
    credentials: PresentedCredentials,
    endpoint: Endpoint,
    addr: SocketAddr,
    headers: &axum::http::HeaderMap,
    body: FormatRequest,
) -> Result<Json<FormatResponse>> {
    let client_ip = addr.ip().to_string();

    let identity = if credentials.is_empty() {
        rate_gate(
            state,
            &format!("{}:ip:{client_ip}", endpoint.namespace()),
            endpoint.window(),
            ANONYMOUS_PUBLIC_CEILING,
        )?;
        CallerIdentity::Anonymous
    } else {
        let identity = state.resolver.resolve(&credentials).await?;
        let plan = match identity {
            CallerIdentity::Account { plan, .. } => plan,
            // 仅携带空白凭证字段时退化为匿名
            CallerIdentity::Anonymous => PlanTier::Free,
        };

        // 窗口键优先级：API 密钥串 > 账户ID > IP
        let rate_key = credentials.api_key.as_ref().map_or_else(
            || {
                identity.account_id().map_or_else(
                    || format!("{}:ip:{client_ip}", endpoint.namespace()),
                    |id| format!("{}:account:{id}", endpoint.namespace()),
                )
            },
            |key| format!("{}:key:{key}", endpoint.namespace()),
        );

        rate_gate(state, &rate_key, endpoint.window(), endpoint.ceiling(plan))?;
        identity
    };

    let language: Language = body.language.parse()?;

    // 匿名调用者完全绕过配额账本，只受窗口限流约束
    if let Some(account_id) = identity.account_id() {
        match state.quota.check_and_reserve(account_id).await? {
            QuotaDecision::Allowed { .. } => {}
            QuotaDecision::Denied {
                current_usage,
                monthly_limit,
            } => {
                return Err(crate::error::ServiceError::quota_exceeded(
                    current_usage,
                    monthly_limit,
                ));
            }
        }
    }

    let outcome = state.formatter.format(language, &body.code).await?;

    let user_agent = headers
        .get(axum::http::header::USER_AGENT)
        .and_then(|value| value.to_str().ok())
        .map(ToString::to_string);

    state.usage.record(UsageEvent {
        account_id: identity.account_id(),
        api_key_id: identity.api_key_id(),
        language: language.as_str().to_string(),
        formatter: outcome.formatter_used.clone(),
        input_bytes: body.code.len(),
        output_bytes: outcome.formatted_code.len(),
        execution_time_ms: outcome.execution_time_ms,
        client_ip: Some(client_ip),
        user_agent,
    });

    Ok(Json(FormatResponse {
        input_length: body.code.len(),
        output_length: outcome.formatted_code.len(),
        formatted_code: outcome.formatted_code,
        execution_time_ms: outcome.execution_time_ms,
        formatter_used: outcome.formatter_used,
        status: "success",
        user_plan: identity.plan_label(),
    }))
}

/// 限流判定，拒绝时映射为限流错误
fn rate_gate(state: &AppState, key: &str, window: Duration, ceiling: u32) -> Result<()> {
    match state.limiter.admit(key, window, ceiling) {
        Admission::Admitted { .. } => Ok(()),
        Admission::Throttled {
            current,
            ceiling,
            retry_after,
        } => Err(crate::error::ServiceError::throttled(
            current,
            ceiling,
            retry_after.as_secs().max(1),
        )),
    }
}

/// 从请求头与查询参数提取凭证
fn extract_credentials(
    headers: &axum::http::HeaderMap,
    query_api_key: Option<&str>,
) -> PresentedCredentials {
    PresentedCredentials::from_parts(
        headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok()),
        headers.get("x-api-key").and_then(|value| value.to_str().ok()),
        query_api_key,
    )
}
