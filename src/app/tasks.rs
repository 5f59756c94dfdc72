//! # 后台周期任务
//!
//! 两个常驻循环：按到期时间滚动订阅计费周期、清理长期空闲的
//! 限流窗口。任务只记录日志，任何一次迭代失败都不会终止循环。

use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::context::AppContext;

/// 启动全部后台任务，返回句柄便于测试中取消
pub fn spawn_background_jobs(context: &AppContext) -> Vec<tokio::task::JoinHandle<()>> {
    vec![
        spawn_period_roll_job(
            context.quota.clone(),
            Duration::from_secs(context.config.quota.reset_check_interval_secs),
        ),
        spawn_window_prune_job(
            context.limiter.clone(),
            Duration::from_secs(context.config.ratelimit.prune_interval_secs),
            Duration::from_secs(context.config.ratelimit.max_idle_secs),
        ),
    ]
}

/// 订阅计费周期滚动任务
fn spawn_period_roll_job(
    quota: Arc<crate::quota::QuotaLedger>,
    interval: Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        info!("订阅周期滚动任务已启动, interval={:?}", interval);
        let mut ticker = tokio::time::interval(interval);
        // 首个 tick 立即触发，进程重启后不会漏掉已到期的周期
        loop {
            ticker.tick().await;
            match quota.reset_due_periods().await {
                Ok(0) => debug!("无到期订阅周期"),
                Ok(rolled) => info!("已滚动 {} 个到期订阅周期", rolled),
                Err(e) => warn!("订阅周期滚动失败: {}", e),
            }
        }
    })
}

/// 限流窗口清理任务
fn spawn_window_prune_job(
    limiter: Arc<crate::ratelimit::RateLimiter>,
    interval: Duration,
    max_idle: Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        info!("限流窗口清理任务已启动, interval={:?}", interval);
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            let pruned = limiter.prune(max_idle);
            if pruned > 0 {
                debug!("已清理 {} 个空闲限流窗口", pruned);
            }
        }
    })
}
