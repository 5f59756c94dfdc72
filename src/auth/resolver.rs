//! # 凭证解析器
//!
//! 把请求携带的原始凭证解析为规范化的调用者身份。
//! 同时携带两种凭证时固定优先 API 密钥；两者都缺席时为匿名身份。
//! 所有存储读取都包裹有界超时，超时按服务不可用上报，绝不降级为认证失败。

use sea_orm::{ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::auth::api_key::{self, key_preview};
use crate::auth::jwt::JwtManager;
use crate::auth::types::{CallerIdentity, PlanTier, PresentedCredentials};
use crate::error::Result;
use entity::{accounts, api_keys, subscriptions};

/// Bearer 路径的解析结果：账户实况加当前套餐
#[derive(Debug, Clone)]
pub struct BearerAccount {
    /// 账户记录（实时读取，不信任令牌内嵌的旧状态）
    pub account: accounts::Model,
    /// 当前套餐档位，无活跃订阅时回退为免费档
    pub plan: PlanTier,
}

/// 凭证解析器
pub struct CredentialResolver {
    db: Arc<DatabaseConnection>,
    jwt: Arc<JwtManager>,
    query_timeout: Duration,
}

impl CredentialResolver {
    /// 创建新的解析器
    pub const fn new(
        db: Arc<DatabaseConnection>,
        jwt: Arc<JwtManager>,
        query_timeout: Duration,
    ) -> Self {
        Self {
            db,
            jwt,
            query_timeout,
        }
    }

    /// 解析调用者身份
    ///
    /// API 密钥优先于 Bearer 令牌；两者都未携带时返回匿名身份，
    /// 是否接受匿名由各端点自行决定。
    pub async fn resolve(&self, credentials: &PresentedCredentials) -> Result<CallerIdentity> {
        if let Some(key) = &credentials.api_key {
            return self.resolve_api_key(key).await;
        }
        if let Some(token) = &credentials.bearer_token {
            let bearer = self.resolve_bearer(token).await?;
            return Ok(CallerIdentity::Account {
                account_id: bearer.account.id,
                plan: bearer.plan,
                api_key_id: None,
            });
        }
        Ok(CallerIdentity::Anonymous)
    }

    /// API 密钥路径
    ///
    /// 格式非法的密钥在任何存储查询之前即被拒绝。合法格式的密钥必须
    /// 对应活跃密钥、活跃账户与活跃订阅，否则一律按认证失败处理，
    /// 不区分具体缺了哪一环。
    pub async fn resolve_api_key(&self, key: &str) -> Result<CallerIdentity> {
        if !api_key::is_valid_key_format(key) {
            return Err(crate::malformed_error!("API key format is invalid"));
        }

        let found = self
            .timed(
                api_keys::Entity::find()
                    .filter(api_keys::Column::Key.eq(key))
                    .filter(api_keys::Column::IsActive.eq(true))
                    .find_also_related(accounts::Entity)
                    .one(self.db.as_ref()),
            )
            .await?;

        let Some((key_model, Some(account))) = found else {
            return Err(crate::unauthenticated_error!("API key is not recognized"));
        };

        if !account.is_active {
            return Err(crate::unauthenticated_error!("API key is not recognized"));
        }

        let Some(subscription) = self.active_subscription(account.id).await? else {
            return Err(crate::unauthenticated_error!("API key is not recognized"));
        };

        let plan = subscription
            .plan
            .parse::<PlanTier>()
            .unwrap_or(PlanTier::Free);

        // 最后使用时间异步补记，失败不影响本次请求
        let db = self.db.clone();
        let key_id = key_model.id;
        tokio::spawn(async move {
            crate::auth::api_key::ApiKeyService::stamp_last_used(db.as_ref(), key_id).await;
        });

        tracing::debug!(
            account_id = account.id,
            key = %key_preview(key),
            plan = %plan,
            "API 密钥解析成功"
        );

        Ok(CallerIdentity::Account {
            account_id: account.id,
            plan,
            api_key_id: Some(key_model.id),
        })
    }

    /// Bearer 令牌路径
    ///
    /// 先验签名与过期，再按令牌中的账户ID实时取回账户；账户消失或
    /// 已停用返回不存在，与签名类失败区分开。
    pub async fn resolve_bearer(&self, token: &str) -> Result<BearerAccount> {
        let claims = self.jwt.verify(token)?;
        let account_id = claims
            .account_id()
            .map_err(|_| crate::unauthenticated_error!("bearer token is invalid"))?;

        let account = self
            .timed(accounts::Entity::find_by_id(account_id).one(self.db.as_ref()))
            .await?
            .filter(|a| a.is_active)
            .ok_or_else(|| crate::not_found_error!("account no longer exists"))?;

        let plan = match self.active_subscription(account.id).await? {
            Some(sub) => sub.plan.parse::<PlanTier>().unwrap_or(PlanTier::Free),
            None => PlanTier::Free,
        };

        Ok(BearerAccount { account, plan })
    }

    /// 账户的活跃订阅
    async fn active_subscription(&self, account_id: i32) -> Result<Option<subscriptions::Model>> {
        self.timed(
            subscriptions::Entity::find()
                .filter(subscriptions::Column::AccountId.eq(account_id))
                .filter(subscriptions::Column::Status.eq("active"))
                .one(self.db.as_ref()),
        )
        .await
    }

    /// 有界超时的存储读取，超时映射为服务不可用
    async fn timed<T, F>(&self, fut: F) -> Result<T>
    where
        F: Future<Output = std::result::Result<T, DbErr>>,
    {
        match tokio::time::timeout(self.query_timeout, fut).await {
            Ok(result) => result.map_err(Into::into),
            Err(_) => Err(crate::unavailable_error!("identity store timed out")),
        }
    }
}
