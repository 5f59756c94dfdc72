//! # 用量记录实体定义
//!
//! 追加写入的请求用量事实表，账户与密钥外键可空（匿名调用、删除置空）

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// 用量记录实体
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "usage_records")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub account_id: Option<i32>,
    pub api_key_id: Option<i32>,
    pub language: String,
    pub formatter: String,
    pub input_bytes: i32,
    pub output_bytes: i32,
    pub execution_time_ms: i32,
    pub client_ip: Option<String>,
    pub user_agent: Option<String>,
    pub created_at: DateTime,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::accounts::Entity",
        from = "Column::AccountId",
        to = "super::accounts::Column::Id",
        on_update = "Cascade",
        on_delete = "SetNull"
    )]
    Accounts,
    #[sea_orm(
        belongs_to = "super::api_keys::Entity",
        from = "Column::ApiKeyId",
        to = "super::api_keys::Column::Id",
        on_update = "Cascade",
        on_delete = "SetNull"
    )]
    ApiKeys,
}

impl Related<super::accounts::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Accounts.def()
    }
}

impl Related<super::api_keys::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ApiKeys.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
