//! # HTTP 处理器

pub mod api_keys;
pub mod auth;
pub mod format;
pub mod system;
