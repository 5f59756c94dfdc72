//! # 错误处理宏

/// 快速创建请求格式错误的宏
#[macro_export]
macro_rules! malformed_error {
    ($msg:expr) => {
        $crate::error::ServiceError::malformed(format!($msg))
    };
    ($fmt:expr, $($arg:tt)*) => {
        $crate::error::ServiceError::malformed(format!($fmt, $($arg)*))
    };
}

/// 快速创建认证错误的宏
#[macro_export]
macro_rules! unauthenticated_error {
    ($msg:expr) => {
        $crate::error::ServiceError::unauthenticated(format!($msg))
    };
    ($fmt:expr, $($arg:tt)*) => {
        $crate::error::ServiceError::unauthenticated(format!($fmt, $($arg)*))
    };
}

/// 快速创建资源未找到错误的宏
#[macro_export]
macro_rules! not_found_error {
    ($msg:expr) => {
        $crate::error::ServiceError::not_found(format!($msg))
    };
    ($fmt:expr, $($arg:tt)*) => {
        $crate::error::ServiceError::not_found(format!($fmt, $($arg)*))
    };
}

/// 快速创建资源冲突错误的宏
#[macro_export]
macro_rules! conflict_error {
    ($msg:expr) => {
        $crate::error::ServiceError::conflict(format!($msg))
    };
    ($fmt:expr, $($arg:tt)*) => {
        $crate::error::ServiceError::conflict(format!($fmt, $($arg)*))
    };
}

/// 快速创建服务不可用错误的宏
#[macro_export]
macro_rules! unavailable_error {
    ($msg:expr) => {
        $crate::error::ServiceError::unavailable(format!($msg))
    };
    ($fmt:expr, $($arg:tt)*) => {
        $crate::error::ServiceError::unavailable(format!($fmt, $($arg)*))
    };
}

/// 快速创建内部错误的宏
#[macro_export]
macro_rules! internal_error {
    ($msg:expr) => {
        $crate::error::ServiceError::internal(format!($msg))
    };
    ($fmt:expr, $($arg:tt)*) => {
        $crate::error::ServiceError::internal(format!($fmt, $($arg)*))
    };
}

/// 确保条件成立，否则返回请求格式错误
#[macro_export]
macro_rules! ensure_valid {
    ($cond:expr, $msg:expr) => {
        if !($cond) {
            return Err($crate::malformed_error!($msg));
        }
    };
    ($cond:expr, $fmt:expr, $($arg:tt)*) => {
        if !($cond) {
            return Err($crate::malformed_error!($fmt, $($arg)*));
        }
    };
}
