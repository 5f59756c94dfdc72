//! # 错误处理测试

use crate::error::{ErrorCategory, ServiceError};
use axum::http::StatusCode;
use std::error::Error;

#[test]
fn test_malformed_error_creation() {
    let err = ServiceError::malformed("code must not be empty");
    assert!(matches!(err, ServiceError::Malformed { .. }));
    assert_eq!(err.kind(), "malformed");
    assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
    assert_eq!(err.details(), "code must not be empty");
}

#[test]
fn test_unauthenticated_error_creation() {
    let err = ServiceError::unauthenticated("invalid API key");
    assert_eq!(err.kind(), "unauthenticated");
    assert_eq!(err.status_code(), StatusCode::UNAUTHORIZED);
    assert_eq!(err.category(), ErrorCategory::Client);
}

#[test]
fn test_throttled_carries_window_state() {
    let err = ServiceError::throttled(11, 10, 540);
    assert_eq!(err.kind(), "throttled");
    assert_eq!(err.status_code(), StatusCode::TOO_MANY_REQUESTS);
    assert!(err.details().contains("10 requests per window"));
    assert!(err.details().contains("540 seconds"));
}

#[test]
fn test_quota_exceeded_carries_ledger_state() {
    let err = ServiceError::quota_exceeded(100, 100);
    assert_eq!(err.kind(), "quota_exceeded");
    assert_eq!(err.status_code(), StatusCode::TOO_MANY_REQUESTS);
    assert!(err.details().contains("monthly limit of 100"));
}

#[test]
fn test_throttled_and_quota_are_distinct_kinds() {
    // 两种 429 必须可区分
    let throttled = ServiceError::throttled(51, 50, 60);
    let quota = ServiceError::quota_exceeded(100, 100);
    assert_ne!(throttled.kind(), quota.kind());
}

#[test]
fn test_internal_details_are_sanitized() {
    let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "权限不足");
    let err = ServiceError::internal_with_source("sqlite file unreadable", io_err);

    assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(err.category(), ErrorCategory::Server);
    assert_eq!(err.details(), "an unexpected error occurred");
    assert!(err.source().is_some());
}

#[test]
fn test_unavailable_is_server_category() {
    let err = ServiceError::unavailable("identity store timed out");
    assert_eq!(err.status_code(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(err.category(), ErrorCategory::Server);
}

#[test]
fn test_auto_conversion_from_db_error() {
    let db_err = sea_orm::error::DbErr::Custom("connection closed".to_string());
    let err: ServiceError = db_err.into();

    assert!(matches!(err, ServiceError::Internal { .. }));
    assert!(err.source().is_some());
}

#[test]
fn test_auto_conversion_from_toml_error() {
    let invalid_toml = "invalid = toml = syntax";
    let toml_err = toml::from_str::<toml::Value>(invalid_toml).unwrap_err();
    let err: ServiceError = toml_err.into();

    assert!(matches!(err, ServiceError::Internal { .. }));
    assert!(err.to_string().contains("config parse failed"));
}

#[test]
fn test_conflict_error_macro() {
    let err = crate::conflict_error!("email {} already registered", "a@b.dev");
    assert_eq!(err.kind(), "conflict");
    assert_eq!(err.status_code(), StatusCode::CONFLICT);
    assert!(err.details().contains("a@b.dev"));
}

#[test]
fn test_macro_arguments_interpolate_into_details() {
    // 占位符必须被实参替换，不能原样出现在响应里
    let err = crate::not_found_error!("API key {} not found", 42);
    assert_eq!(err.details(), "API key 42 not found");

    let err = crate::unavailable_error!("formatter '{}' timed out", "rustfmt");
    assert_eq!(err.details(), "formatter 'rustfmt' timed out");

    let err = crate::conflict_error!("active API key limit of {} reached", 10);
    assert_eq!(err.details(), "active API key limit of 10 reached");
}

#[test]
fn test_single_argument_macro_keeps_message_verbatim() {
    let err = crate::malformed_error!("code must not be empty");
    assert_eq!(err.details(), "code must not be empty");
}
