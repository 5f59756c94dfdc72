//! # API 密钥管理
//!
//! 密钥生成、纯格式校验与密钥生命周期服务。
//! 格式校验是 O(1) 的纯函数，发生在任何存储查询之前。

use chrono::Utc;
use rand::RngCore;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Set,
};
use serde::Serialize;
use std::sync::Arc;

use crate::error::Result;
use entity::api_keys;

/// 密钥前缀，固定 3 字符
pub const KEY_PREFIX: &str = "sfk";
/// 密钥总长度：3 字符前缀 + 64 位小写十六进制
pub const KEY_LENGTH: usize = 67;
/// 每账户可同时持有的活跃密钥上限
pub const MAX_LIVE_KEYS: u64 = 10;

/// 生成新的 API 密钥：`sfk` + 32 随机字节的十六进制编码
pub fn generate_key() -> String {
    let mut secret = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut secret);
    format!("{KEY_PREFIX}{}", hex::encode(secret))
}

/// 纯格式校验，不触发任何存储查询
///
/// 合法格式：`sfk` 前缀 + 64 位小写十六进制，共 67 字符。
pub fn is_valid_key_format(key: &str) -> bool {
    key.len() == KEY_LENGTH
        && key.starts_with(KEY_PREFIX)
        && key[KEY_PREFIX.len()..]
            .bytes()
            .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
}

/// 密钥预览：仅展示首 7 位与末 4 位，用于列表与日志
pub fn key_preview(key: &str) -> String {
    if key.len() >= KEY_LENGTH {
        format!("{}...{}", &key[..7], &key[key.len() - 4..])
    } else {
        "***".to_string()
    }
}

/// 列表与详情响应中的密钥视图，绝不包含完整密钥串
#[derive(Debug, Clone, Serialize)]
pub struct ApiKeyView {
    /// 密钥ID
    pub id: i32,
    /// 密钥预览
    pub key_preview: String,
    /// 标签
    pub label: String,
    /// 是否活跃
    pub is_active: bool,
    /// 最后使用时间
    pub last_used_at: Option<chrono::NaiveDateTime>,
    /// 创建时间
    pub created_at: chrono::NaiveDateTime,
}

impl From<&api_keys::Model> for ApiKeyView {
    fn from(model: &api_keys::Model) -> Self {
        Self {
            id: model.id,
            key_preview: key_preview(&model.key),
            label: model.label.clone(),
            is_active: model.is_active,
            last_used_at: model.last_used_at,
            created_at: model.created_at,
        }
    }
}

/// API 密钥生命周期服务，所有操作按所有者账户限定范围
pub struct ApiKeyService {
    db: Arc<DatabaseConnection>,
}

impl ApiKeyService {
    /// 创建新的密钥服务
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// 列出账户的全部密钥，新的在前
    pub async fn list(&self, account_id: i32) -> Result<Vec<api_keys::Model>> {
        let keys = api_keys::Entity::find()
            .filter(api_keys::Column::AccountId.eq(account_id))
            .order_by_desc(api_keys::Column::CreatedAt)
            .all(self.db.as_ref())
            .await?;
        Ok(keys)
    }

    /// 签发新密钥
    ///
    /// 活跃密钥数量达到上限时拒绝，完整密钥串只在本次响应中出现一次。
    pub async fn create(&self, account_id: i32, label: &str) -> Result<api_keys::Model> {
        let label = label.trim();
        crate::ensure_valid!(!label.is_empty(), "key label must not be empty");
        crate::ensure_valid!(label.len() <= 100, "key label must not exceed 100 characters");

        let live = api_keys::Entity::find()
            .filter(api_keys::Column::AccountId.eq(account_id))
            .filter(api_keys::Column::IsActive.eq(true))
            .count(self.db.as_ref())
            .await?;
        if live >= MAX_LIVE_KEYS {
            return Err(crate::conflict_error!(
                "active API key limit of {} reached",
                MAX_LIVE_KEYS
            ));
        }

        let now = Utc::now().naive_utc();
        let model = api_keys::ActiveModel {
            account_id: Set(account_id),
            key: Set(generate_key()),
            label: Set(label.to_string()),
            is_active: Set(true),
            last_used_at: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        };

        let created = model.insert(self.db.as_ref()).await?;
        tracing::info!(
            account_id = account_id,
            key_id = created.id,
            key = %key_preview(&created.key),
            "签发新 API 密钥"
        );
        Ok(created)
    }

    /// 按所有者取回单个密钥，不属于该账户时按不存在处理
    pub async fn find_owned(&self, account_id: i32, key_id: i32) -> Result<api_keys::Model> {
        api_keys::Entity::find_by_id(key_id)
            .filter(api_keys::Column::AccountId.eq(account_id))
            .one(self.db.as_ref())
            .await?
            .ok_or_else(|| crate::not_found_error!("API key {} not found", key_id))
    }

    /// 重命名密钥标签
    pub async fn rename(&self, account_id: i32, key_id: i32, label: &str) -> Result<api_keys::Model> {
        let label = label.trim();
        crate::ensure_valid!(!label.is_empty(), "key label must not be empty");
        crate::ensure_valid!(label.len() <= 100, "key label must not exceed 100 characters");

        let key = self.find_owned(account_id, key_id).await?;
        let mut active: api_keys::ActiveModel = key.into();
        active.label = Set(label.to_string());
        active.updated_at = Set(Utc::now().naive_utc());
        Ok(active.update(self.db.as_ref()).await?)
    }

    /// 停用密钥，单向操作，已停用的密钥不再恢复
    pub async fn deactivate(&self, account_id: i32, key_id: i32) -> Result<api_keys::Model> {
        let key = self.find_owned(account_id, key_id).await?;
        let mut active: api_keys::ActiveModel = key.into();
        active.is_active = Set(false);
        active.updated_at = Set(Utc::now().naive_utc());
        Ok(active.update(self.db.as_ref()).await?)
    }

    /// 删除密钥，历史用量记录经由置空外键保留
    pub async fn delete(&self, account_id: i32, key_id: i32) -> Result<()> {
        let key = self.find_owned(account_id, key_id).await?;
        api_keys::Entity::delete_by_id(key.id)
            .exec(self.db.as_ref())
            .await?;
        tracing::info!(account_id = account_id, key_id = key_id, "删除 API 密钥");
        Ok(())
    }

    /// 异步补记最后使用时间
    ///
    /// 从独立任务调用，失败只记日志，绝不影响所描述的请求。
    pub async fn stamp_last_used(db: &DatabaseConnection, key_id: i32) {
        let stamp = api_keys::Entity::update_many()
            .col_expr(
                api_keys::Column::LastUsedAt,
                sea_orm::sea_query::Expr::value(Utc::now().naive_utc()),
            )
            .filter(api_keys::Column::Id.eq(key_id))
            .exec(db)
            .await;

        if let Err(e) = stamp {
            tracing::warn!(key_id = key_id, error = %e, "补记密钥最后使用时间失败");
        }
    }
}
