//! # 订阅实体定义
//!
//! 账户订阅表：套餐、月度配额与当期用量。每个账户至多一条 active 记录

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// 订阅实体
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "subscriptions")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub account_id: i32,
    /// 套餐档位: free / basic / pro / team
    pub plan: String,
    pub monthly_limit: i64,
    pub current_usage: i64,
    /// 生命周期状态: active / cancelled / expired
    pub status: String,
    pub period_resets_at: DateTime,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::accounts::Entity",
        from = "Column::AccountId",
        to = "super::accounts::Column::Id",
        on_update = "Cascade",
        on_delete = "Cascade"
    )]
    Accounts,
}

impl Related<super::accounts::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Accounts.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
