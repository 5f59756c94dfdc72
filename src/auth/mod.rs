//! # 认证模块
//!
//! 凭证解析、令牌管理、API 密钥与账户生命周期

pub mod api_key;
pub mod jwt;
pub mod resolver;
pub mod service;
pub mod types;

pub use api_key::{ApiKeyService, ApiKeyView};
pub use jwt::{IssuedToken, JwtManager};
pub use resolver::{BearerAccount, CredentialResolver};
pub use service::{AccountProfile, AccountService};
pub use types::{CallerIdentity, JwtClaims, PlanTier, PresentedCredentials};
