//! # 格式化引擎模块
//!
//! 格式化本身委托给外部协作者：JavaScript/TypeScript 走 prettier
//! 子进程，Rust 走 rustfmt 子进程，Python 用进程内正则整形。
//! 服务按语言分发到 trait 对象，便于测试时注入替身引擎。

pub mod language;
pub mod python;
pub mod subprocess;

pub use language::{Language, SUPPORTED_LANGUAGES};

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use crate::config::FormatterConfig;
use crate::error::Result;
use python::PythonRegexEngine;
use subprocess::{PrettierEngine, RustfmtEngine};

/// 格式化引擎契约
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait FormatEngine: Send + Sync {
    /// 引擎标识，进入响应与用量记录
    fn name(&self) -> &'static str;

    /// 格式化一段代码
    async fn format(&self, code: &str) -> Result<String>;
}

/// 一次成功格式化的结果
#[derive(Debug, Clone)]
pub struct FormatOutcome {
    /// 格式化后的代码
    pub formatted_code: String,
    /// 实际执行的引擎
    pub formatter_used: String,
    /// 耗时（毫秒）
    pub execution_time_ms: u64,
}

/// 格式化服务：语言到引擎的分发表
pub struct FormatService {
    engines: HashMap<Language, Arc<dyn FormatEngine>>,
    max_input_bytes: usize,
}

impl FormatService {
    /// 按配置组装全部引擎
    pub fn new(config: &FormatterConfig) -> Self {
        let timeout = config.timeout();
        let mut engines: HashMap<Language, Arc<dyn FormatEngine>> = HashMap::new();
        engines.insert(
            Language::Javascript,
            Arc::new(PrettierEngine::new(
                config.prettier_bin.clone(),
                Language::Javascript,
                timeout,
            )),
        );
        engines.insert(
            Language::Typescript,
            Arc::new(PrettierEngine::new(
                config.prettier_bin.clone(),
                Language::Typescript,
                timeout,
            )),
        );
        engines.insert(
            Language::Rust,
            Arc::new(RustfmtEngine::new(config.rustfmt_bin.clone(), timeout)),
        );
        engines.insert(Language::Python, Arc::new(PythonRegexEngine));

        Self {
            engines,
            max_input_bytes: config.max_input_bytes,
        }
    }

    /// 测试用：注入自定义引擎表
    #[cfg(any(test, feature = "testing"))]
    pub fn with_engines(
        engines: HashMap<Language, Arc<dyn FormatEngine>>,
        max_input_bytes: usize,
    ) -> Self {
        Self {
            engines,
            max_input_bytes,
        }
    }

    /// 格式化一段代码
    pub async fn format(&self, language: Language, code: &str) -> Result<FormatOutcome> {
        crate::ensure_valid!(!code.is_empty(), "code must not be empty");
        if code.len() > self.max_input_bytes {
            return Err(crate::malformed_error!(
                "input of {} bytes exceeds the {} byte limit",
                code.len(),
                self.max_input_bytes
            ));
        }

        let engine = self
            .engines
            .get(&language)
            .ok_or_else(|| crate::internal_error!("no engine registered for {}", language))?;

        let started = Instant::now();
        let formatted_code = engine.format(code).await?;
        let execution_time_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

        Ok(FormatOutcome {
            formatted_code,
            formatter_used: engine.name().to_string(),
            execution_time_ms,
        })
    }

    /// `/benchmark` 端点：进程内引擎跑固定轮数
    pub async fn benchmark(&self, iterations: u32) -> Result<(u64, f64)> {
        let started = Instant::now();
        for _ in 0..iterations {
            // 只压进程内引擎，基准测试不派生子进程
            let _ = python::apply_substitutions(python::BENCHMARK_SAMPLE);
        }
        let total = started.elapsed();
        let total_ms = u64::try_from(total.as_millis()).unwrap_or(u64::MAX);
        let avg_ms = if iterations == 0 {
            0.0
        } else {
            total.as_secs_f64() * 1000.0 / f64::from(iterations)
        };
        Ok((total_ms, avg_ms))
    }
}
