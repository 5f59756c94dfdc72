//! # 月度配额账本
//!
//! 按账户的活跃订阅跟踪当期请求计数。默认乐观模式：检查与计数
//! 是流水线上的两个独立步骤，接近上限时并发请求可能双双通过检查
//! 并各自计数，造成轻微超额——这是偏向可用性的既定取舍。严格预占
//! 模式改用单条带条件的原子自增，检查即占用，换来硬上限保证。

use chrono::{Months, Utc};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter, Set,
};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::error::Result;
use entity::subscriptions;

/// 配额判定结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuotaDecision {
    /// 当期仍有余量
    Allowed {
        /// 当期已用计数（严格模式下已含本次占用）
        current_usage: i64,
        /// 月度上限
        monthly_limit: i64,
    },
    /// 当期配额耗尽，周期重置前重试无意义
    Denied {
        /// 当期已用计数
        current_usage: i64,
        /// 月度上限
        monthly_limit: i64,
    },
}

/// 月度配额账本
pub struct QuotaLedger {
    db: Arc<DatabaseConnection>,
    /// 严格预占模式开关
    strict_reservation: bool,
    query_timeout: Duration,
}

impl QuotaLedger {
    /// 创建新的账本
    pub const fn new(
        db: Arc<DatabaseConnection>,
        strict_reservation: bool,
        query_timeout: Duration,
    ) -> Self {
        Self {
            db,
            strict_reservation,
            query_timeout,
        }
    }

    /// 是否运行在严格预占模式
    pub const fn is_strict(&self) -> bool {
        self.strict_reservation
    }

    /// 配额检查
    ///
    /// 没有活跃订阅按拒绝处理，不存在静默放行。乐观模式只读不写；
    /// 严格模式用 `usage < limit` 条件自增一步完成检查与占用。
    pub async fn check_and_reserve(&self, account_id: i32) -> Result<QuotaDecision> {
        if self.strict_reservation {
            return self.reserve_strict(account_id).await;
        }

        let Some(subscription) = self.active_subscription(account_id).await? else {
            return Ok(QuotaDecision::Denied {
                current_usage: 0,
                monthly_limit: 0,
            });
        };

        if subscription.current_usage < subscription.monthly_limit {
            Ok(QuotaDecision::Allowed {
                current_usage: subscription.current_usage,
                monthly_limit: subscription.monthly_limit,
            })
        } else {
            Ok(QuotaDecision::Denied {
                current_usage: subscription.current_usage,
                monthly_limit: subscription.monthly_limit,
            })
        }
    }

    /// 计数提交：对活跃订阅的用量计数原子加一
    ///
    /// 乐观模式下由用量记录路径在请求成功后调用；严格模式下检查
    /// 阶段已占用，这里是空操作，保证每个请求至多计数一次。
    pub async fn commit(&self, account_id: i32) -> Result<()> {
        if self.strict_reservation {
            return Ok(());
        }

        let updated = self
            .timed(
                subscriptions::Entity::update_many()
                    .col_expr(
                        subscriptions::Column::CurrentUsage,
                        Expr::col(subscriptions::Column::CurrentUsage).add(1),
                    )
                    .col_expr(
                        subscriptions::Column::UpdatedAt,
                        Expr::value(Utc::now().naive_utc()),
                    )
                    .filter(subscriptions::Column::AccountId.eq(account_id))
                    .filter(subscriptions::Column::Status.eq("active"))
                    .exec(self.db.as_ref()),
            )
            .await?;

        if updated.rows_affected == 0 {
            tracing::warn!(account_id = account_id, "配额提交未命中活跃订阅");
        }
        Ok(())
    }

    /// 严格预占：单条带条件的原子自增
    async fn reserve_strict(&self, account_id: i32) -> Result<QuotaDecision> {
        let updated = self
            .timed(
                subscriptions::Entity::update_many()
                    .col_expr(
                        subscriptions::Column::CurrentUsage,
                        Expr::col(subscriptions::Column::CurrentUsage).add(1),
                    )
                    .col_expr(
                        subscriptions::Column::UpdatedAt,
                        Expr::value(Utc::now().naive_utc()),
                    )
                    .filter(subscriptions::Column::AccountId.eq(account_id))
                    .filter(subscriptions::Column::Status.eq("active"))
                    .filter(
                        Expr::col(subscriptions::Column::CurrentUsage)
                            .lt(Expr::col(subscriptions::Column::MonthlyLimit)),
                    )
                    .exec(self.db.as_ref()),
            )
            .await?;

        // 条件自增未命中：要么配额耗尽，要么没有活跃订阅，重读区分数值
        let subscription = self.active_subscription(account_id).await?;
        match subscription {
            Some(sub) if updated.rows_affected > 0 => Ok(QuotaDecision::Allowed {
                current_usage: sub.current_usage,
                monthly_limit: sub.monthly_limit,
            }),
            Some(sub) => Ok(QuotaDecision::Denied {
                current_usage: sub.current_usage,
                monthly_limit: sub.monthly_limit,
            }),
            None => Ok(QuotaDecision::Denied {
                current_usage: 0,
                monthly_limit: 0,
            }),
        }
    }

    /// 当期用量快照，供 `/auth/usage` 查询
    pub async fn current_standing(&self, account_id: i32) -> Result<Option<subscriptions::Model>> {
        self.active_subscription(account_id).await
    }

    /// 周期重置：到期订阅用量清零，重置日推后一个月
    ///
    /// 由后台任务周期性调用，返回重置的订阅数量。
    pub async fn reset_due_periods(&self) -> Result<u64> {
        let now = Utc::now();
        let due = subscriptions::Entity::find()
            .filter(subscriptions::Column::Status.eq("active"))
            .filter(subscriptions::Column::PeriodResetsAt.lte(now.naive_utc()))
            .all(self.db.as_ref())
            .await?;

        let mut reset = 0u64;
        for subscription in due {
            let resets_at = subscription.period_resets_at;
            let next_reset = resets_at
                .checked_add_months(Months::new(1))
                .unwrap_or(resets_at);

            let mut active: subscriptions::ActiveModel = subscription.into();
            active.current_usage = Set(0);
            active.period_resets_at = Set(next_reset);
            active.updated_at = Set(now.naive_utc());
            active.update(self.db.as_ref()).await?;
            reset += 1;
        }

        if reset > 0 {
            tracing::info!(count = reset, "订阅周期已重置");
        }
        Ok(reset)
    }

    async fn active_subscription(&self, account_id: i32) -> Result<Option<subscriptions::Model>> {
        self.timed(
            subscriptions::Entity::find()
                .filter(subscriptions::Column::AccountId.eq(account_id))
                .filter(subscriptions::Column::Status.eq("active"))
                .one(self.db.as_ref()),
        )
        .await
    }

    /// 有界超时的存储访问，超时映射为服务不可用
    async fn timed<T, F>(&self, fut: F) -> Result<T>
    where
        F: Future<Output = std::result::Result<T, DbErr>>,
    {
        match tokio::time::timeout(self.query_timeout, fut).await {
            Ok(result) => result.map_err(Into::into),
            Err(_) => Err(crate::unavailable_error!("quota store timed out")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::PlanTier;
    use crate::testing::{SubscriptionFixture, create_test_db, seed_account_with_plan};
    use chrono::Duration as ChronoDuration;

    const TIMEOUT: Duration = Duration::from_secs(5);

    async fn ledger(strict: bool) -> (QuotaLedger, Arc<DatabaseConnection>) {
        let db = Arc::new(create_test_db().await.expect("test db"));
        (QuotaLedger::new(db.clone(), strict, TIMEOUT), db)
    }

    async fn current_usage(db: &DatabaseConnection, account_id: i32) -> i64 {
        subscriptions::Entity::find()
            .filter(subscriptions::Column::AccountId.eq(account_id))
            .one(db)
            .await
            .unwrap()
            .unwrap()
            .current_usage
    }

    #[tokio::test]
    async fn test_optimistic_check_does_not_write() {
        let (ledger, db) = ledger(false).await;
        let (account, _) = seed_account_with_plan(&db, "opt@example.com", PlanTier::Free).await;

        let decision = ledger.check_and_reserve(account.id).await.unwrap();
        assert_eq!(
            decision,
            QuotaDecision::Allowed {
                current_usage: 0,
                monthly_limit: 100
            }
        );
        // 乐观模式检查只读，计数留给提交
        assert_eq!(current_usage(&db, account.id).await, 0);

        ledger.commit(account.id).await.unwrap();
        assert_eq!(current_usage(&db, account.id).await, 1);
    }

    #[tokio::test]
    async fn test_exhausted_subscription_is_denied() {
        let (ledger, db) = ledger(false).await;
        let (account, _) = seed_account_with_plan(&db, "full@example.com", PlanTier::Free).await;
        subscriptions::Entity::update_many()
            .col_expr(subscriptions::Column::CurrentUsage, Expr::value(100i64))
            .filter(subscriptions::Column::AccountId.eq(account.id))
            .exec(db.as_ref())
            .await
            .unwrap();

        let decision = ledger.check_and_reserve(account.id).await.unwrap();
        assert_eq!(
            decision,
            QuotaDecision::Denied {
                current_usage: 100,
                monthly_limit: 100
            }
        );
    }

    #[tokio::test]
    async fn test_missing_subscription_is_denied_not_allowed() {
        let (ledger, _db) = ledger(false).await;

        let decision = ledger.check_and_reserve(4242).await.unwrap();
        assert_eq!(
            decision,
            QuotaDecision::Denied {
                current_usage: 0,
                monthly_limit: 0
            }
        );
    }

    #[tokio::test]
    async fn test_strict_mode_reserves_at_check_and_commit_is_noop() {
        let (ledger, db) = ledger(true).await;
        let (account, _) = seed_account_with_plan(&db, "strict@example.com", PlanTier::Free).await;
        subscriptions::Entity::update_many()
            .col_expr(subscriptions::Column::CurrentUsage, Expr::value(99i64))
            .filter(subscriptions::Column::AccountId.eq(account.id))
            .exec(db.as_ref())
            .await
            .unwrap();

        // 检查即占用最后一个名额
        let decision = ledger.check_and_reserve(account.id).await.unwrap();
        assert_eq!(
            decision,
            QuotaDecision::Allowed {
                current_usage: 100,
                monthly_limit: 100
            }
        );
        assert_eq!(current_usage(&db, account.id).await, 100);

        // 提交不再计数
        ledger.commit(account.id).await.unwrap();
        assert_eq!(current_usage(&db, account.id).await, 100);

        // 上限之后条件自增不命中
        let decision = ledger.check_and_reserve(account.id).await.unwrap();
        assert_eq!(
            decision,
            QuotaDecision::Denied {
                current_usage: 100,
                monthly_limit: 100
            }
        );
    }

    #[tokio::test]
    async fn test_reset_due_periods_rolls_only_due_subscriptions() {
        let (ledger, db) = ledger(false).await;
        let (due_account, _) = seed_account_with_plan(&db, "due@example.com", PlanTier::Basic).await;
        let (fresh_account, _) =
            seed_account_with_plan(&db, "fresh@example.com", PlanTier::Basic).await;

        let past = (Utc::now() - ChronoDuration::days(1)).naive_utc();
        subscriptions::Entity::update_many()
            .col_expr(subscriptions::Column::CurrentUsage, Expr::value(42i64))
            .col_expr(subscriptions::Column::PeriodResetsAt, Expr::value(past))
            .filter(subscriptions::Column::AccountId.eq(due_account.id))
            .exec(db.as_ref())
            .await
            .unwrap();
        ledger.commit(fresh_account.id).await.unwrap();

        let reset = ledger.reset_due_periods().await.unwrap();
        assert_eq!(reset, 1);

        let rolled = ledger
            .current_standing(due_account.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(rolled.current_usage, 0);
        assert!(rolled.period_resets_at > Utc::now().naive_utc());

        // 未到期的订阅原样保留
        assert_eq!(current_usage(&db, fresh_account.id).await, 1);
    }

    #[tokio::test]
    async fn test_cancelled_subscription_never_resets_or_commits() {
        let (ledger, db) = ledger(false).await;
        let account = crate::testing::AccountFixture::new()
            .email("cancelled@example.com")
            .insert(db.as_ref())
            .await;
        SubscriptionFixture::new(account.id)
            .usage(7)
            .cancelled()
            .insert(db.as_ref())
            .await;

        let decision = ledger.check_and_reserve(account.id).await.unwrap();
        assert_eq!(
            decision,
            QuotaDecision::Denied {
                current_usage: 0,
                monthly_limit: 0
            }
        );

        ledger.commit(account.id).await.unwrap();
        let row = subscriptions::Entity::find()
            .filter(subscriptions::Column::AccountId.eq(account.id))
            .one(db.as_ref())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(row.current_usage, 7);
    }
}
