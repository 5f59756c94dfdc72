//! # 语言标识
//!
//! 请求中的语言字段解析，接受常见别名

use serde::{Deserialize, Serialize};

/// 支持的格式化语言
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    /// JavaScript
    Javascript,
    /// TypeScript
    Typescript,
    /// Python
    Python,
    /// Rust
    Rust,
}

/// 支持的语言清单，错误详情中原样展示
pub const SUPPORTED_LANGUAGES: &str = "javascript (js), typescript (ts), python (py), rust";

impl Language {
    /// 语言的规范名称
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Javascript => "javascript",
            Self::Typescript => "typescript",
            Self::Python => "python",
            Self::Rust => "rust",
        }
    }

    /// stdin 虚拟文件名的扩展名，prettier 据此选择解析器
    pub const fn file_extension(self) -> &'static str {
        match self {
            Self::Javascript => "js",
            Self::Typescript => "ts",
            Self::Python => "py",
            Self::Rust => "rs",
        }
    }
}

impl std::str::FromStr for Language {
    type Err = crate::error::ServiceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "javascript" | "js" => Ok(Self::Javascript),
            "typescript" | "ts" => Ok(Self::Typescript),
            "python" | "py" => Ok(Self::Python),
            "rust" | "rs" => Ok(Self::Rust),
            other => Err(crate::malformed_error!(
                "unsupported language '{}', supported: {}",
                other,
                SUPPORTED_LANGUAGES
            )),
        }
    }
}

impl std::fmt::Display for Language {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
