//! # 应用组装

pub mod context;
pub mod tasks;

pub use context::AppContext;
pub use tasks::spawn_background_jobs;
