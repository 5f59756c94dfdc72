//! # 测试框架模块
//!
//! 内存数据库、数据构建器与请求辅助函数

#[cfg(any(test, feature = "testing"))]
pub mod fixtures;
#[cfg(any(test, feature = "testing"))]
pub mod helpers;

#[cfg(any(test, feature = "testing"))]
pub use fixtures::*;
#[cfg(any(test, feature = "testing"))]
pub use helpers::*;
