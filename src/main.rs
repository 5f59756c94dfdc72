//! # Speed Formatter 主程序
//!
//! 代码格式化 SaaS 后端服务

use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

use speed_formatter::app::{AppContext, spawn_background_jobs};
use speed_formatter::server::HttpServer;
use speed_formatter::{Result, config, database, logging};

/// 命令行参数
#[derive(Debug, Parser)]
#[command(name = "speed-formatter", version, about = "代码格式化 SaaS 后端")]
struct Cli {
    /// TOML 配置文件路径，缺省时使用内置默认值
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// 覆盖监听端口
    #[arg(short, long)]
    port: Option<u16>,

    /// 日志级别（trace/debug/info/warn/error）
    #[arg(long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    logging::init_logging(cli.log_level.as_deref());
    speed_formatter::server::handlers::system::init_start_time();

    let mut config = config::load_config(cli.config.as_deref())?;
    if let Some(port) = cli.port {
        config.server.port = port;
    }

    let db = database::init_database(&config.database)
        .await
        .map_err(|e| speed_formatter::internal_error!("数据库初始化失败: {}", e))?;
    database::run_migrations(&db)
        .await
        .map_err(|e| speed_formatter::internal_error!("数据库迁移失败: {}", e))?;

    let context = Arc::new(AppContext::build(Arc::new(config), Arc::new(db)));

    let jobs = spawn_background_jobs(&context);
    info!("已启动 {} 个后台任务", jobs.len());

    let server = HttpServer::new(context)?;
    info!("服务就绪, 监听 {}", server.bind_address());
    server.serve().await?;

    Ok(())
}
