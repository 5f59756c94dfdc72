//! # 错误响应序列化
//!
//! 所有失败响应统一为 `{error, details}` JSON，限流与配额变体附带
//! 机器可读的数值字段。内部错误细节只进日志，响应一律脱敏。

use axum::Json;
use axum::http::header;
use axum::response::{IntoResponse, Response};

use crate::error::{ErrorCategory, ServiceError};

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        if self.category() == ErrorCategory::Server {
            tracing::error!(kind = self.kind(), error = %self, "请求以服务端错误结束");
        }

        let mut body = serde_json::json!({
            "error": self.kind(),
            "details": self.details(),
        });

        match &self {
            ServiceError::QuotaExceeded {
                current_usage,
                monthly_limit,
            } => {
                body["current_usage"] = (*current_usage).into();
                body["monthly_limit"] = (*monthly_limit).into();
            }
            ServiceError::Throttled {
                current,
                ceiling,
                retry_after_secs,
            } => {
                body["current"] = (*current).into();
                body["ceiling"] = (*ceiling).into();
                body["retry_after_secs"] = (*retry_after_secs).into();
            }
            _ => {}
        }

        let mut response = (self.status_code(), Json(body)).into_response();

        if let ServiceError::Throttled {
            retry_after_secs, ..
        } = &self
        {
            if let Ok(value) = header::HeaderValue::from_str(&retry_after_secs.to_string()) {
                response.headers_mut().insert(header::RETRY_AFTER, value);
            }
        }

        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_quota_exceeded_carries_usage_fields() {
        let response = ServiceError::quota_exceeded(100, 100).into_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);

        let body = body_json(response).await;
        assert_eq!(body["error"], "quota_exceeded");
        assert_eq!(body["current_usage"], 100);
        assert_eq!(body["monthly_limit"], 100);
    }

    #[tokio::test]
    async fn test_throttled_sets_retry_after_header() {
        let response = ServiceError::throttled(10, 10, 42).into_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers()[header::RETRY_AFTER], "42");

        let body = body_json(response).await;
        assert_eq!(body["error"], "throttled");
        assert_eq!(body["current"], 10);
        assert_eq!(body["ceiling"], 10);
    }

    #[tokio::test]
    async fn test_internal_error_is_sanitized() {
        let response = ServiceError::internal("secret table missing").into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body = body_json(response).await;
        assert_eq!(body["error"], "internal");
        assert_eq!(body["details"], "an unexpected error occurred");
    }

    #[tokio::test]
    async fn test_unauthenticated_maps_to_401() {
        let response = ServiceError::unauthenticated("API key is not recognized").into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let body = body_json(response).await;
        assert_eq!(body["error"], "unauthenticated");
        assert_eq!(body["details"], "API key is not recognized");
    }
}
