//! # 子进程格式化引擎
//!
//! prettier 与 rustfmt 都通过 stdin/stdout 协议调用。子进程带
//! 有界超时并在丢弃时被杀死；引擎自身的语法诊断归为客户端错误，
//! 进程无法启动或超时归为服务不可用。

use async_trait::async_trait;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use super::FormatEngine;
use super::language::Language;
use crate::error::Result;

/// 运行一个 stdin 进 stdout 出的格式化子进程
async fn run_formatter(
    program: &str,
    args: &[&str],
    code: &str,
    timeout: Duration,
) -> Result<String> {
    let mut child = Command::new(program)
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| crate::unavailable_error!("formatter '{}' failed to start: {}", program, e))?;

    if let Some(mut stdin) = child.stdin.take() {
        stdin
            .write_all(code.as_bytes())
            .await
            .map_err(|e| crate::unavailable_error!("formatter '{}' rejected input: {}", program, e))?;
        drop(stdin);
    }

    let output = tokio::time::timeout(timeout, child.wait_with_output())
        .await
        .map_err(|_| crate::unavailable_error!("formatter '{}' timed out", program))?
        .map_err(|e| crate::unavailable_error!("formatter '{}' failed: {}", program, e))?;

    if !output.status.success() {
        // 非零退出码视为输入代码的语法问题
        let stderr = String::from_utf8_lossy(&output.stderr);
        let diagnostic = stderr.lines().next().unwrap_or("syntax error").trim();
        return Err(crate::malformed_error!(
            "code could not be formatted: {}",
            diagnostic
        ));
    }

    String::from_utf8(output.stdout)
        .map_err(|_| crate::internal_error!("formatter '{}' produced non-utf8 output", program))
}

/// prettier 引擎，处理 JavaScript 与 TypeScript
pub struct PrettierEngine {
    bin: String,
    language: Language,
    timeout: Duration,
}

impl PrettierEngine {
    /// 创建 prettier 引擎，`bin` 默认为 `npx`
    pub const fn new(bin: String, language: Language, timeout: Duration) -> Self {
        Self {
            bin,
            language,
            timeout,
        }
    }
}

#[async_trait]
impl FormatEngine for PrettierEngine {
    fn name(&self) -> &'static str {
        "prettier"
    }

    async fn format(&self, code: &str) -> Result<String> {
        let stdin_filepath = format!("code.{}", self.language.file_extension());
        run_formatter(
            &self.bin,
            &["prettier", "--stdin-filepath", &stdin_filepath],
            code,
            self.timeout,
        )
        .await
    }
}

/// rustfmt 引擎
pub struct RustfmtEngine {
    bin: String,
    timeout: Duration,
}

impl RustfmtEngine {
    /// 创建 rustfmt 引擎
    pub const fn new(bin: String, timeout: Duration) -> Self {
        Self { bin, timeout }
    }
}

#[async_trait]
impl FormatEngine for RustfmtEngine {
    fn name(&self) -> &'static str {
        "rustfmt"
    }

    async fn format(&self, code: &str) -> Result<String> {
        run_formatter(
            &self.bin,
            &["--emit", "stdout", "--edition", "2021"],
            code,
            self.timeout,
        )
        .await
    }
}
