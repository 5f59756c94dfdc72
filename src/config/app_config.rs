//! # 应用配置结构定义

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// 应用主配置结构
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// HTTP 服务配置
    pub server: ServerConfig,
    /// 数据库配置
    pub database: DatabaseConfig,
    /// 认证配置
    pub auth: AuthConfig,
    /// 月度配额配置
    pub quota: QuotaConfig,
    /// 短窗口限流配置
    pub ratelimit: RateLimitConfig,
    /// 格式化引擎配置
    pub formatter: FormatterConfig,
}

/// HTTP 服务配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// 监听地址
    pub host: String,
    /// 监听端口
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

/// 数据库配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// 数据库连接URL
    pub url: String,
    /// 最大连接数
    pub max_connections: u32,
    /// 建立连接超时（秒）
    pub connect_timeout_secs: u64,
    /// 单次查询超时（秒），身份与配额读取超过此值按服务不可用处理
    pub query_timeout_secs: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite://data/formatter.db".to_string(),
            max_connections: 10,
            connect_timeout_secs: 30,
            query_timeout_secs: 5,
        }
    }
}

impl DatabaseConfig {
    /// 查询超时时长
    pub const fn query_timeout(&self) -> Duration {
        Duration::from_secs(self.query_timeout_secs)
    }
}

/// 认证配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// JWT 签名密钥
    pub jwt_secret: String,
    /// 访问令牌有效期（秒）
    pub token_ttl_secs: i64,
    /// bcrypt 哈希成本
    pub bcrypt_cost: u32,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: "speed-formatter-dev-secret-change-me".to_string(),
            token_ttl_secs: 86_400,
            bcrypt_cost: 12,
        }
    }
}

/// 月度配额配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QuotaConfig {
    /// 严格预占模式：配额检查即原子占用一次
    ///
    /// 默认关闭，检查与计数分离，接近上限时并发请求可能轻微超额。
    pub strict_reservation: bool,
    /// 订阅周期重置任务的扫描间隔（秒）
    pub reset_check_interval_secs: u64,
}

impl Default for QuotaConfig {
    fn default() -> Self {
        Self {
            strict_reservation: false,
            reset_check_interval_secs: 3600,
        }
    }
}

/// 短窗口限流配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// 空闲窗口清理任务的执行间隔（秒）
    pub prune_interval_secs: u64,
    /// 窗口空闲多久后可被清理（秒）
    pub max_idle_secs: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            prune_interval_secs: 900,
            max_idle_secs: 1800,
        }
    }
}

/// 格式化引擎配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FormatterConfig {
    /// prettier 可执行文件
    pub prettier_bin: String,
    /// rustfmt 可执行文件
    pub rustfmt_bin: String,
    /// 单次格式化子进程超时（秒）
    pub timeout_secs: u64,
    /// 允许的最大输入字节数
    pub max_input_bytes: usize,
}

impl Default for FormatterConfig {
    fn default() -> Self {
        Self {
            prettier_bin: "npx".to_string(),
            rustfmt_bin: "rustfmt".to_string(),
            timeout_secs: 10,
            max_input_bytes: 1_000_000,
        }
    }
}

impl FormatterConfig {
    /// 子进程超时时长
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl AppConfig {
    /// 验证配置的有效性
    pub fn validate(&self) -> crate::error::Result<()> {
        if self.server.port == 0 {
            return Err(crate::internal_error!("server.port 不能为 0"));
        }
        if self.database.url.is_empty() {
            return Err(crate::internal_error!("database.url 不能为空"));
        }
        if self.database.max_connections == 0 {
            return Err(crate::internal_error!("database.max_connections 必须大于 0"));
        }
        if self.auth.jwt_secret.len() < 16 {
            return Err(crate::internal_error!("auth.jwt_secret 长度至少 16 字符"));
        }
        if self.auth.token_ttl_secs <= 0 {
            return Err(crate::internal_error!("auth.token_ttl_secs 必须大于 0"));
        }
        if !(4..=31).contains(&self.auth.bcrypt_cost) {
            return Err(crate::internal_error!(
                "auth.bcrypt_cost 必须在 4 到 31 之间: {}",
                self.auth.bcrypt_cost
            ));
        }
        if self.formatter.timeout_secs == 0 {
            return Err(crate::internal_error!("formatter.timeout_secs 必须大于 0"));
        }
        if self.formatter.max_input_bytes == 0 {
            return Err(crate::internal_error!("formatter.max_input_bytes 必须大于 0"));
        }
        Ok(())
    }
}
