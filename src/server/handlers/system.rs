//! # 运维端点
//!
//! 健康检查、基准测试与管理统计。`/admin/stats` 要求账户带管理员
//! 能力标记，非管理员按资源不存在处理，不暴露端点的存在性。

use axum::extract::State;
use axum::{Extension, Json};
use sea_orm::sea_query::Expr;
use sea_orm::{ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, QuerySelect};
use serde::Serialize;
use std::sync::{Arc, Mutex, OnceLock};
use std::time::Instant;
use sysinfo::System;

use crate::error::Result;
use crate::server::AppState;
use crate::server::middleware::AuthContext;
use crate::usage::UsageSummary;
use entity::{accounts, subscriptions};

/// 进程启动时间，进程内只设置一次
static START_TIME: OnceLock<Instant> = OnceLock::new();
/// 系统信息采集器，sysinfo 的刷新需要独占访问
static SYS_INFO: OnceLock<Mutex<System>> = OnceLock::new();

/// `/benchmark` 的固定迭代轮数
const BENCHMARK_ITERATIONS: u32 = 100;

/// 记录进程启动时间，`main` 启动早期调用
pub fn init_start_time() {
    START_TIME.set(Instant::now()).ok();
}

fn uptime_seconds() -> u64 {
    START_TIME.get().map_or(0, |start| start.elapsed().as_secs())
}

fn sys_info() -> &'static Mutex<System> {
    SYS_INFO.get_or_init(|| Mutex::new(System::new()))
}

/// 健康检查响应
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: &'static str,
    pub version: &'static str,
    /// 实时连接探测的结果
    pub database: &'static str,
}

/// `GET /health`
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let database_up = state.db.ping().await.is_ok();

    Json(HealthResponse {
        status: if database_up { "ok" } else { "degraded" },
        service: env!("CARGO_PKG_NAME"),
        version: env!("CARGO_PKG_VERSION"),
        database: if database_up { "up" } else { "down" },
    })
}

/// 基准测试响应
#[derive(Debug, Serialize)]
pub struct BenchmarkResponse {
    pub status: &'static str,
    pub iterations: u32,
    pub total_ms: u64,
    pub avg_ms: f64,
    pub formatter_used: &'static str,
}

/// `GET /benchmark`：只压进程内引擎，不派生子进程
pub async fn benchmark(State(state): State<AppState>) -> Result<Json<BenchmarkResponse>> {
    let (total_ms, avg_ms) = state.formatter.benchmark(BENCHMARK_ITERATIONS).await?;

    Ok(Json(BenchmarkResponse {
        status: "success",
        iterations: BENCHMARK_ITERATIONS,
        total_ms,
        avg_ms,
        formatter_used: "regex",
    }))
}

/// 管理统计响应
#[derive(Debug, Serialize)]
pub struct AdminStatsResponse {
    pub accounts: AccountStats,
    /// 活跃订阅按套餐分布
    pub subscriptions_by_plan: Vec<PlanCount>,
    pub usage: UsageStats,
    pub runtime: RuntimeStats,
}

#[derive(Debug, Serialize)]
pub struct AccountStats {
    pub total: u64,
    pub active: u64,
}

#[derive(Debug, Serialize)]
pub struct PlanCount {
    pub plan: String,
    pub count: i64,
}

#[derive(Debug, Serialize)]
pub struct UsageStats {
    pub lifetime: UsageSummary,
    pub last_24h: UsageSummary,
}

#[derive(Debug, Serialize)]
pub struct RuntimeStats {
    pub uptime_seconds: u64,
    pub memory_used_mb: u64,
    pub memory_total_mb: u64,
}

/// `GET /admin/stats`
pub async fn admin_stats(
    State(state): State<AppState>,
    Extension(auth): Extension<Arc<AuthContext>>,
) -> Result<Json<AdminStatsResponse>> {
    if !auth.can_view_admin() {
        return Err(crate::not_found_error!("resource not found"));
    }

    let total = accounts::Entity::find().count(state.db.as_ref()).await?;
    let active = accounts::Entity::find()
        .filter(accounts::Column::IsActive.eq(true))
        .count(state.db.as_ref())
        .await?;

    let by_plan: Vec<(String, i64)> = subscriptions::Entity::find()
        .select_only()
        .column(subscriptions::Column::Plan)
        .column_as(Expr::col(subscriptions::Column::Id).count(), "count")
        .filter(subscriptions::Column::Status.eq("active"))
        .group_by(subscriptions::Column::Plan)
        .into_tuple()
        .all(state.db.as_ref())
        .await?;

    let (lifetime, last_24h) = state.usage.platform_totals().await?;

    // sysinfo 的刷新是阻塞调用，移出异步运行时执行
    let (memory_used_mb, memory_total_mb) = tokio::task::spawn_blocking(|| {
        let mut sys = sys_info().lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        sys.refresh_memory();
        (
            sys.used_memory() / 1024 / 1024,
            sys.total_memory() / 1024 / 1024,
        )
    })
    .await
    .map_err(|e| crate::internal_error!("stats collection task failed: {}", e))?;

    Ok(Json(AdminStatsResponse {
        accounts: AccountStats { total, active },
        subscriptions_by_plan: by_plan
            .into_iter()
            .map(|(plan, count)| PlanCount { plan, count })
            .collect(),
        usage: UsageStats { lifetime, last_24h },
        runtime: RuntimeStats {
            uptime_seconds: uptime_seconds(),
            memory_used_mb,
            memory_total_mb,
        },
    }))
}
