//! # JWT 令牌管理
//!
//! 提供访问令牌的签发与校验。令牌只承载签名的身份指针，
//! 套餐与配额状态每次请求都从存储重新读取。

use jsonwebtoken::{
    Algorithm, DecodingKey, EncodingKey, Header, TokenData, Validation, decode, encode,
};

use crate::auth::types::{JwtClaims, PlanTier};
use crate::error::Result;

/// JWT 管理器
pub struct JwtManager {
    /// 编码密钥
    encoding_key: EncodingKey,
    /// 解码密钥
    decoding_key: DecodingKey,
    /// 校验配置
    validation: Validation,
    /// 访问令牌有效期（秒）
    token_ttl_secs: i64,
}

impl JwtManager {
    /// 创建新的 JWT 管理器
    pub fn new(jwt_secret: &str, token_ttl_secs: i64) -> Self {
        let encoding_key = EncodingKey::from_secret(jwt_secret.as_bytes());
        let decoding_key = DecodingKey::from_secret(jwt_secret.as_bytes());

        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&["speed-formatter"]);
        validation.set_audience(&["speed-formatter-users"]);
        validation.validate_exp = true;
        validation.validate_nbf = false;
        validation.leeway = 30; // 30 秒时钟容差

        Self {
            encoding_key,
            decoding_key,
            validation,
            token_ttl_secs,
        }
    }

    /// 签发访问令牌
    pub fn sign(&self, account_id: i32, email: String, plan: PlanTier) -> Result<String> {
        let claims = JwtClaims::new(account_id, email, plan, self.token_ttl_secs);
        let header = Header::new(Algorithm::HS256);

        encode(&header, &claims, &self.encoding_key)
            .map_err(|e| crate::error::ServiceError::internal_with_source("令牌签发失败", e))
    }

    /// 校验并解析令牌
    ///
    /// 签名无效与过期给出不同的提示文字，但同属认证失败。
    pub fn verify(&self, token: &str) -> Result<JwtClaims> {
        let token_data: TokenData<JwtClaims> = decode(token, &self.decoding_key, &self.validation)
            .map_err(|e| match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => {
                    crate::unauthenticated_error!("bearer token has expired")
                }
                _ => crate::unauthenticated_error!("bearer token is invalid"),
            })?;

        let claims = token_data.claims;

        if claims.is_expired() {
            return Err(crate::unauthenticated_error!("bearer token has expired"));
        }

        Ok(claims)
    }

    /// 访问令牌有效期（秒）
    pub const fn token_ttl_secs(&self) -> i64 {
        self.token_ttl_secs
    }
}

/// 登录响应中的令牌部分
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct IssuedToken {
    /// 访问令牌
    pub access_token: String,
    /// 令牌类型，固定为 Bearer
    pub token_type: String,
    /// 有效期（秒）
    pub expires_in: i64,
}

impl IssuedToken {
    /// 包装签发结果
    pub fn bearer(access_token: String, expires_in: i64) -> Self {
        Self {
            access_token,
            token_type: "Bearer".to_string(),
            expires_in,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_manager() -> JwtManager {
        JwtManager::new("test-secret-key-for-jwt-testing", 3600)
    }

    #[test]
    fn test_sign_and_verify_round_trip() {
        let manager = create_test_manager();

        let token = manager
            .sign(7, "user@example.com".to_string(), PlanTier::Pro)
            .unwrap();

        let claims = manager.verify(&token).unwrap();
        assert_eq!(claims.account_id().unwrap(), 7);
        assert_eq!(claims.email, "user@example.com");
        assert_eq!(claims.plan, "pro");
        assert_eq!(claims.iss, "speed-formatter");
    }

    #[test]
    fn test_expired_token_is_rejected() {
        // 有效期为负值，签发即已超出 30 秒容差
        let manager = JwtManager::new("test-secret-key-for-jwt-testing", -120);

        let token = manager
            .sign(1, "user@example.com".to_string(), PlanTier::Free)
            .unwrap();

        let err = manager.verify(&token).unwrap_err();
        assert_eq!(err.kind(), "unauthenticated");
        assert!(err.details().contains("expired"));
    }

    #[test]
    fn test_wrong_secret_is_rejected() {
        let manager = create_test_manager();
        let other = JwtManager::new("another-secret-entirely-different", 3600);

        let token = manager
            .sign(1, "user@example.com".to_string(), PlanTier::Free)
            .unwrap();

        assert!(other.verify(&token).is_err());
    }

    #[test]
    fn test_garbage_token_is_rejected() {
        let manager = create_test_manager();

        assert!(manager.verify("not-a-jwt").is_err());
        assert!(manager.verify("").is_err());
    }

    #[test]
    fn test_issued_token_shape() {
        let issued = IssuedToken::bearer("abc".to_string(), 3600);
        assert_eq!(issued.token_type, "Bearer");
        assert_eq!(issued.expires_in, 3600);
    }
}
