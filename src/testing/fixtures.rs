//! # 测试数据构建器
//!
//! 账户、订阅与密钥的预设数据，字段可链式覆盖

use chrono::{Months, Utc};
use sea_orm::{ActiveModelTrait, DatabaseConnection, Set};

use crate::auth::types::PlanTier;
use entity::{accounts, api_keys, subscriptions};

/// 账户构建器
pub struct AccountFixture {
    pub email: String,
    pub password: String,
    pub display_name: Option<String>,
    pub is_active: bool,
    pub is_admin: bool,
}

impl Default for AccountFixture {
    fn default() -> Self {
        Self {
            email: "test@example.com".to_string(),
            password: "password123".to_string(),
            display_name: Some("Test User".to_string()),
            is_active: true,
            is_admin: false,
        }
    }
}

impl AccountFixture {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn email(mut self, email: &str) -> Self {
        self.email = email.to_string();
        self
    }

    #[must_use]
    pub fn password(mut self, password: &str) -> Self {
        self.password = password.to_string();
        self
    }

    #[must_use]
    pub const fn inactive(mut self) -> Self {
        self.is_active = false;
        self
    }

    #[must_use]
    pub const fn admin(mut self) -> Self {
        self.is_admin = true;
        self
    }

    /// 写入数据库，密码用最低成本哈希
    pub async fn insert(self, db: &DatabaseConnection) -> accounts::Model {
        let now = Utc::now().naive_utc();
        accounts::ActiveModel {
            uuid: Set(uuid::Uuid::new_v4().to_string()),
            email: Set(self.email),
            password_hash: Set(bcrypt::hash(&self.password, 4).expect("bcrypt hash")),
            display_name: Set(self.display_name),
            is_active: Set(self.is_active),
            is_admin: Set(self.is_admin),
            last_login_at: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(db)
        .await
        .expect("insert account fixture")
    }
}

/// 订阅构建器
pub struct SubscriptionFixture {
    pub account_id: i32,
    pub plan: PlanTier,
    pub monthly_limit: i64,
    pub current_usage: i64,
    pub status: String,
}

impl SubscriptionFixture {
    pub fn new(account_id: i32) -> Self {
        Self {
            account_id,
            plan: PlanTier::Free,
            monthly_limit: PlanTier::Free.monthly_limit(),
            current_usage: 0,
            status: "active".to_string(),
        }
    }

    #[must_use]
    pub const fn plan(mut self, plan: PlanTier) -> Self {
        self.plan = plan;
        self.monthly_limit = plan.monthly_limit();
        self
    }

    #[must_use]
    pub const fn usage(mut self, current_usage: i64) -> Self {
        self.current_usage = current_usage;
        self
    }

    /// 配额耗尽状态
    #[must_use]
    pub const fn exhausted(mut self) -> Self {
        self.current_usage = self.monthly_limit;
        self
    }

    #[must_use]
    pub fn cancelled(mut self) -> Self {
        self.status = "cancelled".to_string();
        self
    }

    pub async fn insert(self, db: &DatabaseConnection) -> subscriptions::Model {
        let now = Utc::now();
        subscriptions::ActiveModel {
            account_id: Set(self.account_id),
            plan: Set(self.plan.as_str().to_string()),
            monthly_limit: Set(self.monthly_limit),
            current_usage: Set(self.current_usage),
            status: Set(self.status),
            period_resets_at: Set(now
                .checked_add_months(Months::new(1))
                .unwrap_or(now)
                .naive_utc()),
            created_at: Set(now.naive_utc()),
            updated_at: Set(now.naive_utc()),
            ..Default::default()
        }
        .insert(db)
        .await
        .expect("insert subscription fixture")
    }
}

/// API 密钥构建器
pub struct ApiKeyFixture {
    pub account_id: i32,
    pub key: String,
    pub label: String,
    pub is_active: bool,
}

impl ApiKeyFixture {
    pub fn new(account_id: i32) -> Self {
        Self {
            account_id,
            key: crate::auth::api_key::generate_key(),
            label: "test key".to_string(),
            is_active: true,
        }
    }

    #[must_use]
    pub fn key(mut self, key: &str) -> Self {
        self.key = key.to_string();
        self
    }

    #[must_use]
    pub const fn inactive(mut self) -> Self {
        self.is_active = false;
        self
    }

    pub async fn insert(self, db: &DatabaseConnection) -> api_keys::Model {
        let now = Utc::now().naive_utc();
        api_keys::ActiveModel {
            account_id: Set(self.account_id),
            key: Set(self.key),
            label: Set(self.label),
            is_active: Set(self.is_active),
            last_used_at: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(db)
        .await
        .expect("insert api key fixture")
    }
}

/// 一步建好账户加活跃订阅
pub async fn seed_account_with_plan(
    db: &DatabaseConnection,
    email: &str,
    plan: PlanTier,
) -> (accounts::Model, subscriptions::Model) {
    let account = AccountFixture::new().email(email).insert(db).await;
    let subscription = SubscriptionFixture::new(account.id)
        .plan(plan)
        .insert(db)
        .await;
    (account, subscription)
}
