//! # 错误类型定义

use axum::http::StatusCode;
use thiserror::Error;

/// 应用主要错误类型
///
/// 变体集合与对外错误分类一一对应，限流与配额变体携带机器可读的载荷。
#[derive(Debug, Error)]
pub enum ServiceError {
    /// 请求格式错误（纯客户端问题，不应重试）
    #[error("malformed request: {message}")]
    Malformed { message: String },

    /// 凭证缺失、无效或过期
    #[error("unauthenticated: {message}")]
    Unauthenticated { message: String },

    /// 短窗口限流命中
    #[error("rate limit exceeded: {current} of {ceiling} requests in the current window")]
    Throttled {
        current: u32,
        ceiling: u32,
        retry_after_secs: u64,
    },

    /// 月度配额耗尽（本周期内重试无意义）
    #[error("monthly quota exhausted: {current_usage} of {monthly_limit} requests used")]
    QuotaExceeded {
        current_usage: i64,
        monthly_limit: i64,
    },

    /// 资源不存在或不属于调用者
    #[error("not found: {message}")]
    NotFound { message: String },

    /// 唯一性约束冲突
    #[error("conflict: {message}")]
    Conflict { message: String },

    /// 下游存储超时或不可达
    #[error("service unavailable: {message}")]
    Unavailable { message: String },

    /// 系统内部错误
    #[error("internal error: {message}")]
    Internal {
        message: String,
        #[source]
        source: Option<anyhow::Error>,
    },
}

impl ServiceError {
    /// 稳定的机器可读错误类别，进入响应体的 `error` 字段
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Malformed { .. } => "malformed",
            Self::Unauthenticated { .. } => "unauthenticated",
            Self::Throttled { .. } => "throttled",
            Self::QuotaExceeded { .. } => "quota_exceeded",
            Self::NotFound { .. } => "not_found",
            Self::Conflict { .. } => "conflict",
            Self::Unavailable { .. } => "unavailable",
            Self::Internal { .. } => "internal",
        }
    }

    /// 映射为 HTTP 状态码
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::Malformed { .. } => StatusCode::BAD_REQUEST,
            Self::Unauthenticated { .. } => StatusCode::UNAUTHORIZED,
            Self::Throttled { .. } | Self::QuotaExceeded { .. } => StatusCode::TOO_MANY_REQUESTS,
            Self::NotFound { .. } => StatusCode::NOT_FOUND,
            Self::Conflict { .. } => StatusCode::CONFLICT,
            Self::Unavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
            Self::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// 进入响应体 `details` 字段的说明文字
    ///
    /// `Internal` 一律脱敏，真实原因只进日志。
    pub fn details(&self) -> String {
        match self {
            Self::Malformed { message }
            | Self::Unauthenticated { message }
            | Self::NotFound { message }
            | Self::Conflict { message }
            | Self::Unavailable { message } => message.clone(),
            Self::Throttled {
                ceiling,
                retry_after_secs,
                ..
            } => format!(
                "rate limit of {ceiling} requests per window exceeded, retry in {retry_after_secs} seconds"
            ),
            Self::QuotaExceeded { monthly_limit, .. } => {
                format!("monthly limit of {monthly_limit} requests reached")
            }
            Self::Internal { .. } => "an unexpected error occurred".to_string(),
        }
    }

    /// 错误归属：客户端问题还是服务端问题
    pub const fn category(&self) -> super::ErrorCategory {
        match self {
            Self::Unavailable { .. } | Self::Internal { .. } => super::ErrorCategory::Server,
            _ => super::ErrorCategory::Client,
        }
    }

    /// 创建请求格式错误
    pub fn malformed<T: Into<String>>(message: T) -> Self {
        Self::Malformed {
            message: message.into(),
        }
    }

    /// 创建认证错误
    pub fn unauthenticated<T: Into<String>>(message: T) -> Self {
        Self::Unauthenticated {
            message: message.into(),
        }
    }

    /// 创建限流错误
    pub const fn throttled(current: u32, ceiling: u32, retry_after_secs: u64) -> Self {
        Self::Throttled {
            current,
            ceiling,
            retry_after_secs,
        }
    }

    /// 创建配额耗尽错误
    pub const fn quota_exceeded(current_usage: i64, monthly_limit: i64) -> Self {
        Self::QuotaExceeded {
            current_usage,
            monthly_limit,
        }
    }

    /// 创建资源未找到错误
    pub fn not_found<T: Into<String>>(message: T) -> Self {
        Self::NotFound {
            message: message.into(),
        }
    }

    /// 创建资源冲突错误
    pub fn conflict<T: Into<String>>(message: T) -> Self {
        Self::Conflict {
            message: message.into(),
        }
    }

    /// 创建服务不可用错误
    pub fn unavailable<T: Into<String>>(message: T) -> Self {
        Self::Unavailable {
            message: message.into(),
        }
    }

    /// 创建内部错误
    pub fn internal<T: Into<String>>(message: T) -> Self {
        Self::Internal {
            message: message.into(),
            source: None,
        }
    }

    /// 创建带来源的内部错误
    pub fn internal_with_source<T: Into<String>, E: Into<anyhow::Error>>(
        message: T,
        source: E,
    ) -> Self {
        Self::Internal {
            message: message.into(),
            source: Some(source.into()),
        }
    }
}

// 自动转换常见错误类型
impl From<std::io::Error> for ServiceError {
    fn from(err: std::io::Error) -> Self {
        Self::internal_with_source("io operation failed", err)
    }
}

impl From<toml::de::Error> for ServiceError {
    fn from(err: toml::de::Error) -> Self {
        Self::internal_with_source("config parse failed", err)
    }
}

impl From<sea_orm::error::DbErr> for ServiceError {
    fn from(err: sea_orm::error::DbErr) -> Self {
        Self::internal_with_source("database operation failed", err)
    }
}

impl From<bcrypt::BcryptError> for ServiceError {
    fn from(err: bcrypt::BcryptError) -> Self {
        Self::internal_with_source("password hashing failed", err)
    }
}
