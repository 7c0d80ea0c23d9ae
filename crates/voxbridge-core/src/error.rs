use thiserror::Error;

/// Error types for VoxBridge cache operations
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Connection pool error: {0}")]
    Pool(#[from] deadpool_redis::PoolError),

    #[error("Redis backend error: {0}")]
    Backend(#[from] redis::RedisError),

    #[error("Circuit breaker {name} is OPEN")]
    CircuitOpen { name: String },

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("JSON encoding error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("MessagePack encode error: {0}")]
    MsgPackEncode(#[from] rmp_serde::encode::Error),

    #[error("MessagePack decode error: {0}")]
    MsgPackDecode(#[from] rmp_serde::decode::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Compute function failed: {0}")]
    Compute(String),

    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl CacheError {
    /// Create a new Connection error
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection(message.into())
    }

    /// Create a new CircuitOpen error for the named breaker
    pub fn circuit_open(name: impl Into<String>) -> Self {
        Self::CircuitOpen { name: name.into() }
    }

    /// Create a new Serialization error
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization(message.into())
    }

    /// Create a new Compute error
    pub fn compute(message: impl Into<String>) -> Self {
        Self::Compute(message.into())
    }

    /// Create a new Configuration error
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    /// Check whether this error means the backend is unreachable.
    ///
    /// Connection-class errors fail fast: the retry executor does not
    /// re-attempt them and the coordinator treats them as a tier miss.
    pub fn is_connection(&self) -> bool {
        match self {
            Self::Connection(_) | Self::Pool(_) => true,
            Self::Backend(e) => {
                e.is_io_error() || e.is_connection_refusal() || e.is_connection_dropped()
            }
            _ => false,
        }
    }

    /// Check whether a retry could plausibly succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Backend(_)) && !self.is_connection()
    }

    /// Get error category for logging/monitoring
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Connection(_) | Self::Pool(_) => ErrorCategory::Connection,
            Self::Backend(e)
                if e.is_io_error() || e.is_connection_refusal() || e.is_connection_dropped() =>
            {
                ErrorCategory::Connection
            }
            Self::Backend(_) => ErrorCategory::Backend,
            Self::CircuitOpen { .. } => ErrorCategory::CircuitOpen,
            Self::Serialization(_)
            | Self::Json(_)
            | Self::MsgPackEncode(_)
            | Self::MsgPackDecode(_)
            | Self::Io(_) => ErrorCategory::Serialization,
            Self::Compute(_) => ErrorCategory::Compute,
            Self::Configuration(_) => ErrorCategory::Configuration,
        }
    }
}

/// Error categories used as stats keys and log fields
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Connection,
    Backend,
    CircuitOpen,
    Serialization,
    Compute,
    Configuration,
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Connection => write!(f, "connection_error"),
            Self::Backend => write!(f, "backend_error"),
            Self::CircuitOpen => write!(f, "circuit_open"),
            Self::Serialization => write!(f, "serialization_error"),
            Self::Compute => write!(f, "compute_error"),
            Self::Configuration => write!(f, "configuration_error"),
        }
    }
}

/// Convenience result type for cache operations
pub type Result<T> = std::result::Result<T, CacheError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let err = CacheError::connection("refused");
        assert_eq!(err.to_string(), "Connection error: refused");
        assert!(err.is_connection());
        assert!(!err.is_retryable());
        assert_eq!(err.category(), ErrorCategory::Connection);
    }

    #[test]
    fn test_circuit_open_error() {
        let err = CacheError::circuit_open("redis_cache");
        assert_eq!(err.to_string(), "Circuit breaker redis_cache is OPEN");
        assert!(!err.is_connection());
        assert!(!err.is_retryable());
        assert_eq!(err.category(), ErrorCategory::CircuitOpen);
    }

    #[test]
    fn test_json_error_conversion() {
        let json_err: serde_json::Error =
            serde_json::from_str::<serde_json::Value>("{ invalid }").unwrap_err();
        let err: CacheError = json_err.into();

        assert!(matches!(err, CacheError::Json(_)));
        assert_eq!(err.category(), ErrorCategory::Serialization);
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_compute_error() {
        let err = CacheError::compute("lookup failed");
        assert_eq!(err.to_string(), "Compute function failed: lookup failed");
        assert_eq!(err.category(), ErrorCategory::Compute);
    }

    #[test]
    fn test_category_display() {
        assert_eq!(ErrorCategory::Connection.to_string(), "connection_error");
        assert_eq!(ErrorCategory::Backend.to_string(), "backend_error");
        assert_eq!(ErrorCategory::CircuitOpen.to_string(), "circuit_open");
        assert_eq!(
            ErrorCategory::Serialization.to_string(),
            "serialization_error"
        );
        assert_eq!(ErrorCategory::Compute.to_string(), "compute_error");
        assert_eq!(
            ErrorCategory::Configuration.to_string(),
            "configuration_error"
        );
    }

    #[test]
    fn test_result_type_usage() {
        fn ok_fn() -> Result<u32> {
            Ok(7)
        }

        fn err_fn() -> Result<u32> {
            Err(CacheError::configuration("bad value"))
        }

        assert!(ok_fn().is_ok());
        assert!(err_fn().is_err());
    }
}
