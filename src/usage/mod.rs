//! # 用量记录器
//!
//! 请求元数据的异步追加写入。记录动作在响应路径之外的独立任务中
//! 执行，永不阻塞响应，也永不使其描述的请求失败；父请求被取消
//! 不会波及进行中的写入。已知账户的记录会顺带触发配额计数提交，
//! 同为尽力而为。

use chrono::{Duration as ChronoDuration, Utc};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, FromQueryResult, QueryFilter,
    QuerySelect, Set,
};
use serde::Serialize;
use std::sync::Arc;

use crate::error::Result;
use crate::quota::QuotaLedger;
use entity::usage_records;

/// 一次格式化请求的用量事实
#[derive(Debug, Clone)]
pub struct UsageEvent {
    /// 解析出的账户（匿名为 None）
    pub account_id: Option<i32>,
    /// 解析所用的 API 密钥
    pub api_key_id: Option<i32>,
    /// 请求语言
    pub language: String,
    /// 实际执行的格式化引擎
    pub formatter: String,
    /// 输入字节数
    pub input_bytes: usize,
    /// 输出字节数
    pub output_bytes: usize,
    /// 格式化耗时（毫秒）
    pub execution_time_ms: u64,
    /// 调用方 IP
    pub client_ip: Option<String>,
    /// User-Agent
    pub user_agent: Option<String>,
}

/// 聚合用量视图
#[derive(Debug, Clone, Default, Serialize, FromQueryResult)]
pub struct UsageSummary {
    /// 请求总数
    pub total_requests: i64,
    /// 输入字节总数
    pub total_input_bytes: i64,
    /// 输出字节总数
    pub total_output_bytes: i64,
    /// 平均格式化耗时（毫秒）
    pub avg_execution_time_ms: Option<f64>,
}

/// 用量记录器
pub struct UsageRecorder {
    db: Arc<DatabaseConnection>,
    ledger: Arc<QuotaLedger>,
}

impl UsageRecorder {
    /// 创建新的记录器
    pub const fn new(db: Arc<DatabaseConnection>, ledger: Arc<QuotaLedger>) -> Self {
        Self { db, ledger }
    }

    /// 记录一次请求，立即返回
    ///
    /// 持久化失败只记日志并吞掉；配额提交是依赖步骤，同样尽力而为。
    /// 这是全流水线唯一的计数提交点。
    pub fn record(&self, event: UsageEvent) {
        let db = self.db.clone();
        let ledger = self.ledger.clone();

        tokio::spawn(async move {
            let account_id = event.account_id;
            let now = Utc::now().naive_utc();

            let row = usage_records::ActiveModel {
                account_id: Set(event.account_id),
                api_key_id: Set(event.api_key_id),
                language: Set(event.language),
                formatter: Set(event.formatter),
                input_bytes: Set(i32::try_from(event.input_bytes).unwrap_or(i32::MAX)),
                output_bytes: Set(i32::try_from(event.output_bytes).unwrap_or(i32::MAX)),
                execution_time_ms: Set(i32::try_from(event.execution_time_ms).unwrap_or(i32::MAX)),
                client_ip: Set(event.client_ip),
                user_agent: Set(event.user_agent),
                created_at: Set(now),
                ..Default::default()
            };

            if let Err(e) = row.insert(db.as_ref()).await {
                tracing::warn!(error = %e, "用量记录写入失败");
            }

            if let Some(account_id) = account_id {
                if let Err(e) = ledger.commit(account_id).await {
                    tracing::warn!(account_id = account_id, error = %e, "配额计数提交失败");
                }
            }
        });
    }

    /// 账户维度的聚合用量
    pub async fn account_summary(&self, account_id: i32) -> Result<UsageSummary> {
        let summary = self
            .summary_query()
            .filter(usage_records::Column::AccountId.eq(account_id))
            .into_model::<UsageSummary>()
            .one(self.db.as_ref())
            .await?;
        Ok(summary.unwrap_or_default())
    }

    /// 密钥维度的聚合用量
    pub async fn key_summary(&self, api_key_id: i32) -> Result<UsageSummary> {
        let summary = self
            .summary_query()
            .filter(usage_records::Column::ApiKeyId.eq(api_key_id))
            .into_model::<UsageSummary>()
            .one(self.db.as_ref())
            .await?;
        Ok(summary.unwrap_or_default())
    }

    /// 全平台聚合：历史总量与最近 24 小时
    pub async fn platform_totals(&self) -> Result<(UsageSummary, UsageSummary)> {
        let lifetime = self
            .summary_query()
            .into_model::<UsageSummary>()
            .one(self.db.as_ref())
            .await?
            .unwrap_or_default();

        let day_ago = (Utc::now() - ChronoDuration::hours(24)).naive_utc();
        let last_24h = self
            .summary_query()
            .filter(usage_records::Column::CreatedAt.gte(day_ago))
            .into_model::<UsageSummary>()
            .one(self.db.as_ref())
            .await?
            .unwrap_or_default();

        Ok((lifetime, last_24h))
    }

    fn summary_query(&self) -> sea_orm::Select<usage_records::Entity> {
        usage_records::Entity::find()
            .select_only()
            .column_as(Expr::col(usage_records::Column::Id).count(), "total_requests")
            .column_as(
                Expr::cust("COALESCE(SUM(input_bytes), 0)"),
                "total_input_bytes",
            )
            .column_as(
                Expr::cust("COALESCE(SUM(output_bytes), 0)"),
                "total_output_bytes",
            )
            .column_as(
                Expr::cust("AVG(execution_time_ms)"),
                "avg_execution_time_ms",
            )
    }
}
