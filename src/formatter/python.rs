//! # Python 正则格式化引擎
//!
//! 进程内的轻量整形：逐行去尾随空白、压缩连续空行、逗号后补
//! 空格、保证结尾换行。不做语法解析，永不因输入内容失败。

use async_trait::async_trait;
use regex::Regex;
use std::sync::OnceLock;

use super::FormatEngine;
use crate::error::Result;

/// `/benchmark` 端点使用的内置样例
pub const BENCHMARK_SAMPLE: &str = "\
import os,sys\n\
def main(a,b,c):   \n\
    result=compute(a,b,c)\n\
\n\
\n\
\n\
    print(result)   \n\
    return result";

fn trailing_ws() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[ \t]+\n").unwrap())
}

fn blank_runs() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\n{3,}").unwrap())
}

fn comma_spacing() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r",(\S)").unwrap())
}

/// 纯函数形式的整形步骤，引擎与基准测试共用
pub fn apply_substitutions(code: &str) -> String {
    let normalized = format!("{code}\n");
    let stripped = trailing_ws().replace_all(&normalized, "\n");
    let collapsed = blank_runs().replace_all(&stripped, "\n\n");
    let spaced = comma_spacing().replace_all(&collapsed, ", $1");

    let mut result = spaced.trim_end().to_string();
    result.push('\n');
    result
}

/// Python 引擎
#[derive(Debug, Default)]
pub struct PythonRegexEngine;

#[async_trait]
impl FormatEngine for PythonRegexEngine {
    fn name(&self) -> &'static str {
        "regex"
    }

    async fn format(&self, code: &str) -> Result<String> {
        Ok(apply_substitutions(code))
    }
}
