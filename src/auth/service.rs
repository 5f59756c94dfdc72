//! # 账户服务
//!
//! 注册、登录与账户生命周期。登录失败的提示对外统一，
//! 不泄露邮箱是否存在或密码哪一步校验失败。

use bcrypt::{hash, verify};
use chrono::{Months, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set, SqlErr,
};
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

use crate::auth::jwt::{IssuedToken, JwtManager};
use crate::auth::types::PlanTier;
use crate::error::{Result, ServiceError};
use entity::{accounts, subscriptions};

/// 对外暴露的账户公开字段
#[derive(Debug, Clone, Serialize)]
pub struct AccountProfile {
    /// 公开 UUID
    pub uuid: String,
    /// 邮箱
    pub email: String,
    /// 显示名
    pub display_name: Option<String>,
    /// 当前套餐
    pub plan: String,
    /// 创建时间
    pub created_at: chrono::NaiveDateTime,
}

/// 账户服务
pub struct AccountService {
    db: Arc<DatabaseConnection>,
    jwt: Arc<JwtManager>,
    bcrypt_cost: u32,
}

impl AccountService {
    /// 创建新的账户服务
    pub const fn new(db: Arc<DatabaseConnection>, jwt: Arc<JwtManager>, bcrypt_cost: u32) -> Self {
        Self {
            db,
            jwt,
            bcrypt_cost,
        }
    }

    /// 注册新账户
    ///
    /// 邮箱统一小写后存储，大小写只视为同一邮箱；新账户自动获得
    /// 一份活跃的免费订阅，周期重置日为一个月后。
    pub async fn register(
        &self,
        email: &str,
        password: &str,
        display_name: Option<&str>,
    ) -> Result<(accounts::Model, subscriptions::Model)> {
        let email = normalize_email(email);
        crate::ensure_valid!(is_plausible_email(&email), "email format is invalid");
        crate::ensure_valid!(password.len() >= 8, "password must be at least 8 characters");

        let password_hash = hash(password, self.bcrypt_cost)?;
        let now = Utc::now().naive_utc();

        let account = accounts::ActiveModel {
            uuid: Set(Uuid::new_v4().to_string()),
            email: Set(email.clone()),
            password_hash: Set(password_hash),
            display_name: Set(display_name.map(str::to_string)),
            is_active: Set(true),
            is_admin: Set(false),
            last_login_at: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        };

        let account = match account.insert(self.db.as_ref()).await {
            Ok(model) => model,
            Err(e) => {
                if matches!(e.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) {
                    return Err(crate::conflict_error!("email is already registered"));
                }
                return Err(e.into());
            }
        };

        let subscription = self
            .start_subscription(account.id, PlanTier::Free)
            .await?;

        tracing::info!(account_id = account.id, email = %account.email, "新账户注册");
        Ok((account, subscription))
    }

    /// 登录并签发访问令牌
    pub async fn login(&self, email: &str, password: &str) -> Result<(IssuedToken, accounts::Model)> {
        let email = normalize_email(email);

        let account = accounts::Entity::find()
            .filter(accounts::Column::Email.eq(&email))
            .filter(accounts::Column::IsActive.eq(true))
            .one(self.db.as_ref())
            .await?
            .ok_or_else(invalid_credentials)?;

        let password_valid = verify(password, &account.password_hash)?;
        if !password_valid {
            return Err(invalid_credentials());
        }

        let plan = self.active_plan(account.id).await?;
        let token = self
            .jwt
            .sign(account.id, account.email.clone(), plan)?;

        // 更新最后登录时间
        let mut active: accounts::ActiveModel = account.clone().into();
        active.last_login_at = Set(Some(Utc::now().naive_utc()));
        let account = active.update(self.db.as_ref()).await?;

        Ok((
            IssuedToken::bearer(token, self.jwt.token_ttl_secs()),
            account,
        ))
    }

    /// 取回活跃账户
    pub async fn find_active(&self, account_id: i32) -> Result<accounts::Model> {
        accounts::Entity::find_by_id(account_id)
            .one(self.db.as_ref())
            .await?
            .filter(|a| a.is_active)
            .ok_or_else(|| crate::not_found_error!("account not found"))
    }

    /// 账户资料视图
    pub async fn profile(&self, account_id: i32) -> Result<AccountProfile> {
        let account = self.find_active(account_id).await?;
        let plan = self.active_plan(account_id).await?;
        Ok(AccountProfile {
            uuid: account.uuid,
            email: account.email,
            display_name: account.display_name,
            plan: plan.as_str().to_string(),
            created_at: account.created_at,
        })
    }

    /// 更新显示名
    pub async fn update_profile(
        &self,
        account_id: i32,
        display_name: Option<&str>,
    ) -> Result<AccountProfile> {
        let account = self.find_active(account_id).await?;
        let mut active: accounts::ActiveModel = account.into();
        active.display_name = Set(display_name.map(str::to_string));
        active.updated_at = Set(Utc::now().naive_utc());
        active.update(self.db.as_ref()).await?;
        self.profile(account_id).await
    }

    /// 修改密码，需要先通过当前密码校验
    pub async fn change_password(
        &self,
        account_id: i32,
        current_password: &str,
        new_password: &str,
    ) -> Result<()> {
        crate::ensure_valid!(new_password.len() >= 8, "new password must be at least 8 characters");

        let account = self.find_active(account_id).await?;
        let current_valid = verify(current_password, &account.password_hash)?;
        if !current_valid {
            return Err(crate::unauthenticated_error!("current password is incorrect"));
        }

        let mut active: accounts::ActiveModel = account.into();
        active.password_hash = Set(hash(new_password, self.bcrypt_cost)?);
        active.updated_at = Set(Utc::now().naive_utc());
        active.update(self.db.as_ref()).await?;

        tracing::info!(account_id = account_id, "账户密码已更新");
        Ok(())
    }

    /// 停用账户（软删除）
    ///
    /// 活跃订阅同时转为已取消；已签发的密钥原样保留，
    /// 解析阶段会拒绝停用账户的密钥。
    pub async fn deactivate(&self, account_id: i32) -> Result<()> {
        let account = self.find_active(account_id).await?;
        let mut active: accounts::ActiveModel = account.into();
        active.is_active = Set(false);
        active.updated_at = Set(Utc::now().naive_utc());
        active.update(self.db.as_ref()).await?;

        subscriptions::Entity::update_many()
            .col_expr(
                subscriptions::Column::Status,
                sea_orm::sea_query::Expr::value("cancelled"),
            )
            .col_expr(
                subscriptions::Column::UpdatedAt,
                sea_orm::sea_query::Expr::value(Utc::now().naive_utc()),
            )
            .filter(subscriptions::Column::AccountId.eq(account_id))
            .filter(subscriptions::Column::Status.eq("active"))
            .exec(self.db.as_ref())
            .await?;

        tracing::info!(account_id = account_id, "账户已停用");
        Ok(())
    }

    /// 账户当前套餐，无活跃订阅时回退为免费档
    pub async fn active_plan(&self, account_id: i32) -> Result<PlanTier> {
        let subscription = subscriptions::Entity::find()
            .filter(subscriptions::Column::AccountId.eq(account_id))
            .filter(subscriptions::Column::Status.eq("active"))
            .one(self.db.as_ref())
            .await?;

        Ok(subscription
            .and_then(|s| s.plan.parse::<PlanTier>().ok())
            .unwrap_or(PlanTier::Free))
    }

    /// 开启一份活跃订阅
    async fn start_subscription(
        &self,
        account_id: i32,
        plan: PlanTier,
    ) -> Result<subscriptions::Model> {
        let now = Utc::now();
        let resets_at = now
            .checked_add_months(Months::new(1))
            .unwrap_or(now)
            .naive_utc();

        let subscription = subscriptions::ActiveModel {
            account_id: Set(account_id),
            plan: Set(plan.as_str().to_string()),
            monthly_limit: Set(plan.monthly_limit()),
            current_usage: Set(0),
            status: Set("active".to_string()),
            period_resets_at: Set(resets_at),
            created_at: Set(now.naive_utc()),
            updated_at: Set(now.naive_utc()),
            ..Default::default()
        };

        Ok(subscription.insert(self.db.as_ref()).await?)
    }
}

/// 统一的登录失败错误，不区分失败原因
fn invalid_credentials() -> ServiceError {
    ServiceError::unauthenticated("invalid email or password")
}

/// 邮箱规范化：去空白并小写
fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// 粗粒度的邮箱形状检查
fn is_plausible_email(email: &str) -> bool {
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    !local.is_empty() && domain.contains('.') && !domain.starts_with('.') && !domain.ends_with('.')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_email_normalization() {
        assert_eq!(normalize_email("  User@Example.COM "), "user@example.com");
    }

    #[test]
    fn test_email_plausibility() {
        assert!(is_plausible_email("user@example.com"));
        assert!(is_plausible_email("a.b+c@sub.example.org"));
        assert!(!is_plausible_email("no-at-sign"));
        assert!(!is_plausible_email("@example.com"));
        assert!(!is_plausible_email("user@nodot"));
        assert!(!is_plausible_email("user@.example"));
    }

    #[test]
    fn test_invalid_credentials_is_uniform() {
        let err = invalid_credentials();
        assert_eq!(err.kind(), "unauthenticated");
        assert_eq!(err.details(), "invalid email or password");
    }
}
