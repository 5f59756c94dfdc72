//! # 配置管理模块
//!
//! 处理应用配置加载、验证和管理

mod app_config;

pub use app_config::{
    AppConfig, AuthConfig, DatabaseConfig, FormatterConfig, QuotaConfig, RateLimitConfig,
    ServerConfig,
};

use std::env;
use std::path::Path;

/// 加载配置：可选 TOML 文件，环境变量覆盖，最后验证
///
/// 未提供配置文件时全部使用默认值，适合本地开发直接启动。
pub fn load_config(path: Option<&Path>) -> crate::error::Result<AppConfig> {
    let mut config = match path {
        Some(file) => {
            if !file.exists() {
                return Err(crate::internal_error!("配置文件不存在: {}", file.display()));
            }
            let content = std::fs::read_to_string(file).map_err(|e| {
                crate::error::ServiceError::internal_with_source(
                    format!("读取配置文件失败: {}", file.display()),
                    e,
                )
            })?;
            toml::from_str::<AppConfig>(&content)?
        }
        None => AppConfig::default(),
    };

    apply_env_overrides(&mut config);
    config.validate()?;
    Ok(config)
}

/// 环境变量覆盖，部署时无需改动配置文件
fn apply_env_overrides(config: &mut AppConfig) {
    if let Ok(url) = env::var("DATABASE_URL") {
        config.database.url = url;
    }
    if let Ok(secret) = env::var("JWT_SECRET") {
        config.auth.jwt_secret = secret;
    }
    if let Ok(host) = env::var("HOST") {
        config.server.host = host;
    }
    if let Ok(port) = env::var("PORT") {
        match port.parse() {
            Ok(parsed) => config.server.port = parsed,
            Err(_) => tracing::warn!("PORT 环境变量无法解析为端口号: {port}"),
        }
    }
}
