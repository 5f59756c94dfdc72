//! The unified error handling system for the application.

pub use types::ServiceError;

/// A unified `Result` type for the entire application.
///
/// All functions that can fail should return this type.
pub type Result<T> = std::result::Result<T, ServiceError>;

pub mod macros;
pub mod types;

/// Error category for logging and monitoring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Errors caused by the client (bad input, invalid credentials, exhausted
    /// windows or quotas). Correspond to 4xx HTTP status codes.
    Client,
    /// Errors caused by the server or its dependencies.
    /// Correspond to 5xx HTTP status codes.
    Server,
}

#[cfg(test)]
mod tests;
