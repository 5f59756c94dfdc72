//! # 认证类型定义
//!
//! 定义身份解析相关的数据结构和套餐常量

use serde::{Deserialize, Serialize};

/// 套餐档位
///
/// 月度配额与短窗口限流上限都由档位决定，数值随档位单调不减。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlanTier {
    /// 免费档
    Free,
    /// 基础档
    Basic,
    /// 专业档
    Pro,
    /// 团队档
    Team,
}

impl PlanTier {
    /// 档位的存储字符串
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Free => "free",
            Self::Basic => "basic",
            Self::Pro => "pro",
            Self::Team => "team",
        }
    }

    /// 月度请求配额
    pub const fn monthly_limit(self) -> i64 {
        match self {
            Self::Free => 100,
            Self::Basic => 5_000,
            Self::Pro => 50_000,
            Self::Team => 500_000,
        }
    }

    /// `/api/v1/format` 的 60 秒窗口上限
    pub const fn api_window_ceiling(self) -> u32 {
        match self {
            Self::Free => 10,
            Self::Basic => 100,
            Self::Pro => 1_000,
            Self::Team => 10_000,
        }
    }

    /// `/format` 公共端点的 15 分钟窗口上限
    pub const fn public_window_ceiling(self) -> u32 {
        if self.is_paid() { 200 } else { 50 }
    }

    /// 是否为付费档位
    pub const fn is_paid(self) -> bool {
        !matches!(self, Self::Free)
    }
}

impl std::str::FromStr for PlanTier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "free" => Ok(Self::Free),
            "basic" => Ok(Self::Basic),
            "pro" => Ok(Self::Pro),
            "team" => Ok(Self::Team),
            other => Err(format!("unknown plan tier: {other}")),
        }
    }
}

impl std::fmt::Display for PlanTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 解析后的调用者身份
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallerIdentity {
    /// 已认证账户
    Account {
        /// 账户ID
        account_id: i32,
        /// 套餐档位
        plan: PlanTier,
        /// 经由 API 密钥解析时的密钥ID
        api_key_id: Option<i32>,
    },
    /// 匿名调用者，仅公共端点接受
    Anonymous,
}

impl CallerIdentity {
    /// 账户ID（匿名为 None）
    pub const fn account_id(&self) -> Option<i32> {
        match self {
            Self::Account { account_id, .. } => Some(*account_id),
            Self::Anonymous => None,
        }
    }

    /// 解析身份所用的 API 密钥ID
    pub const fn api_key_id(&self) -> Option<i32> {
        match self {
            Self::Account { api_key_id, .. } => *api_key_id,
            Self::Anonymous => None,
        }
    }

    /// 是否匿名
    pub const fn is_anonymous(&self) -> bool {
        matches!(self, Self::Anonymous)
    }

    /// 响应中展示的套餐标签
    pub fn plan_label(&self) -> String {
        match self {
            Self::Account { plan, .. } => plan.as_str().to_string(),
            Self::Anonymous => "anonymous".to_string(),
        }
    }
}

/// 请求携带的原始凭证
///
/// 同时出现 API 密钥与 Bearer 令牌时，解析阶段固定优先走 API 密钥。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PresentedCredentials {
    /// `X-API-Key` 头或 `api_key` 查询参数
    pub api_key: Option<String>,
    /// `Authorization: Bearer` 令牌
    pub bearer_token: Option<String>,
}

impl PresentedCredentials {
    /// 从请求头与查询参数提取凭证
    ///
    /// `X-API-Key` 头优先于 `api_key` 查询参数，空白值视为未携带。
    pub fn from_parts(
        auth_header: Option<&str>,
        api_key_header: Option<&str>,
        query_api_key: Option<&str>,
    ) -> Self {
        let api_key = api_key_header
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .or_else(|| query_api_key.map(str::trim).filter(|v| !v.is_empty()))
            .map(ToString::to_string);

        let bearer_token = auth_header
            .and_then(|header| header.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(ToString::to_string);

        Self {
            api_key,
            bearer_token,
        }
    }

    /// 是否未携带任何凭证
    pub const fn is_empty(&self) -> bool {
        self.api_key.is_none() && self.bearer_token.is_none()
    }
}

/// JWT 载荷
///
/// 令牌只是签名的身份指针，套餐与配额每次调用都从存储重新读取。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JwtClaims {
    /// 账户ID
    pub sub: String,
    /// 邮箱
    pub email: String,
    /// 签发时刻的套餐档位
    pub plan: String,
    /// 签发时间
    pub iat: i64,
    /// 过期时间
    pub exp: i64,
    /// 签发者
    pub iss: String,
    /// 受众
    pub aud: String,
    /// JWT ID
    pub jti: String,
}

impl JwtClaims {
    /// 创建新的 JWT 载荷
    pub fn new(account_id: i32, email: String, plan: PlanTier, expires_in_seconds: i64) -> Self {
        let now = chrono::Utc::now().timestamp();
        Self {
            sub: account_id.to_string(),
            email,
            plan: plan.as_str().to_string(),
            iat: now,
            exp: now + expires_in_seconds,
            iss: "speed-formatter".to_string(),
            aud: "speed-formatter-users".to_string(),
            jti: uuid::Uuid::new_v4().to_string(),
        }
    }

    /// 检查 JWT 是否过期
    pub fn is_expired(&self) -> bool {
        chrono::Utc::now().timestamp() > self.exp
    }

    /// 获取账户ID
    pub fn account_id(&self) -> Result<i32, std::num::ParseIntError> {
        self.sub.parse()
    }
}
