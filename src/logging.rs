//! # 日志配置模块
//!
//! 统一初始化 tracing 订阅器，默认压制数据库查询噪音

use std::env;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// 初始化日志系统
///
/// `RUST_LOG` 存在时优先生效，否则使用给定级别加默认过滤规则。
pub fn init_logging(log_level: Option<&str>) {
    let level = log_level.unwrap_or("info");

    // 默认配置：压制数据库查询的详细日志
    let default_filter = format!(
        "{level},speed_formatter=debug,sqlx::query=off,sea_orm::query=warn,sqlx=warn"
    );

    let log_filter = env::var("RUST_LOG").unwrap_or(default_filter);

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| log_filter.into()))
        .with(
            fmt::layer()
                .with_target(true)
                .with_level(true)
                .with_thread_ids(false)
                .with_thread_names(false)
                .with_file(false)
                .with_line_number(false)
                .compact(),
        )
        .init();
}
