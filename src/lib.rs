//! # Speed Formatter
//!
//! 代码格式化 SaaS 后端：多层访问控制流水线（凭证解析、窗口限流、
//! 月度配额、用量记录）包裹一组外部格式化引擎。

pub mod app;
pub mod auth;
pub mod config;
pub mod database;
pub mod error;
pub mod formatter;
pub mod logging;
pub mod quota;
pub mod ratelimit;
pub mod server;
pub mod testing;
pub mod usage;

// Re-export commonly used types
pub use config::AppConfig;
pub use error::{Result, ServiceError};
