//! # 短窗口限流器
//!
//! 进程内固定窗口计数，按调用者标识分键。单节点设计：
//! 窗口状态不跨进程共享，也不要求在重启后存活。

use dashmap::DashMap;
use std::time::{Duration, Instant};

/// 单个窗口的状态
#[derive(Debug, Clone, Copy)]
struct WindowState {
    /// 窗口起点
    window_start: Instant,
    /// 窗口内已放行的请求数
    count: u32,
    /// 最后一次访问，供空闲清理使用
    last_seen: Instant,
}

/// 放行判定结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// 放行，附带窗口内剩余额度
    Admitted {
        /// 本窗口剩余可放行次数
        remaining: u32,
    },
    /// 拒绝，附带当前计数、被触及的上限与建议重试间隔
    Throttled {
        /// 窗口内当前计数
        current: u32,
        /// 被触及的上限
        ceiling: u32,
        /// 距窗口翻转的剩余时间
        retry_after: Duration,
    },
}

/// 短窗口限流器
///
/// 同一实例可服务多种窗口参数，调用方负责用键前缀把
/// 不同端点的窗口隔开。计数只在放行时前进，被拒绝的
/// 请求不消耗额度。
#[derive(Debug, Default)]
pub struct RateLimiter {
    windows: DashMap<String, WindowState>,
}

impl RateLimiter {
    /// 创建新的限流器
    pub fn new() -> Self {
        Self {
            windows: DashMap::new(),
        }
    }

    /// 判定一次请求是否放行
    pub fn admit(&self, key: &str, window: Duration, ceiling: u32) -> Admission {
        let now = Instant::now();
        let mut entry = self
            .windows
            .entry(key.to_string())
            .or_insert_with(|| WindowState {
                window_start: now,
                count: 0,
                last_seen: now,
            });

        let elapsed = now.duration_since(entry.window_start);
        if elapsed >= window {
            entry.window_start = now;
            entry.count = 0;
        }
        entry.last_seen = now;

        if entry.count >= ceiling {
            let consumed = now.duration_since(entry.window_start);
            return Admission::Throttled {
                current: entry.count,
                ceiling,
                retry_after: window.saturating_sub(consumed),
            };
        }

        entry.count += 1;
        Admission::Admitted {
            remaining: ceiling - entry.count,
        }
    }

    /// 清理空闲超过给定时长的窗口，返回清理数量
    pub fn prune(&self, max_idle: Duration) -> usize {
        let before = self.windows.len();
        let now = Instant::now();
        self.windows
            .retain(|_, state| now.duration_since(state.last_seen) < max_idle);
        before - self.windows.len()
    }

    /// 当前追踪的窗口数量
    pub fn tracked_windows(&self) -> usize {
        self.windows.len()
    }
}
