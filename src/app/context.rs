//! # 应用上下文（DI 容器）
//!
//! 统一持有跨模块共享的服务实例，在 `main` 中构建一次，
//! 便于测试中以内存数据库整体替换。

use sea_orm::DatabaseConnection;
use std::sync::Arc;

use crate::auth::{AccountService, ApiKeyService, CredentialResolver, JwtManager};
use crate::config::AppConfig;
use crate::formatter::FormatService;
use crate::quota::QuotaLedger;
use crate::ratelimit::RateLimiter;
use crate::usage::UsageRecorder;

/// 应用上下文
#[derive(Clone)]
pub struct AppContext {
    /// 应用配置
    pub config: Arc<AppConfig>,
    /// 数据库连接
    pub db: Arc<DatabaseConnection>,
    /// JWT 管理器
    pub jwt: Arc<JwtManager>,
    /// 凭证解析器
    pub resolver: Arc<CredentialResolver>,
    /// 账户服务
    pub accounts: Arc<AccountService>,
    /// API 密钥服务
    pub api_keys: Arc<ApiKeyService>,
    /// 月度配额账本
    pub quota: Arc<QuotaLedger>,
    /// 用量记录器
    pub usage: Arc<UsageRecorder>,
    /// 短窗口限流器
    pub limiter: Arc<RateLimiter>,
    /// 格式化服务
    pub formatter: Arc<FormatService>,
}

impl AppContext {
    /// 从配置与已建立的数据库连接组装全部服务
    pub fn build(config: Arc<AppConfig>, db: Arc<DatabaseConnection>) -> Self {
        let query_timeout = config.database.query_timeout();

        let jwt = Arc::new(JwtManager::new(
            &config.auth.jwt_secret,
            config.auth.token_ttl_secs,
        ));
        let resolver = Arc::new(CredentialResolver::new(
            db.clone(),
            jwt.clone(),
            query_timeout,
        ));
        let accounts = Arc::new(AccountService::new(
            db.clone(),
            jwt.clone(),
            config.auth.bcrypt_cost,
        ));
        let api_keys = Arc::new(ApiKeyService::new(db.clone()));
        let quota = Arc::new(QuotaLedger::new(
            db.clone(),
            config.quota.strict_reservation,
            query_timeout,
        ));
        let usage = Arc::new(UsageRecorder::new(db.clone(), quota.clone()));
        let limiter = Arc::new(RateLimiter::new());
        let formatter = Arc::new(FormatService::new(&config.formatter));

        Self {
            config,
            db,
            jwt,
            resolver,
            accounts,
            api_keys,
            quota,
            usage,
            limiter,
            formatter,
        }
    }
}
