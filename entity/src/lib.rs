//! # Entity 模块
//!
//! 包含所有 Sea-ORM 实体定义

pub mod accounts;
pub mod api_keys;
pub mod subscriptions;
pub mod usage_records;

pub use accounts::Entity as Accounts;
pub use api_keys::Entity as ApiKeys;
pub use subscriptions::Entity as Subscriptions;
pub use usage_records::Entity as UsageRecords;
