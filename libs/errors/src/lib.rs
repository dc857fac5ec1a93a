//! Unified error handling for the related-values engine
//!
//! Every library crate in the workspace reports failures through
//! [`RelvalError`]; the CLI wraps it in `anyhow` with context.

use thiserror::Error;

// ============================================================================
// RelvalError - Main error type
// ============================================================================

/// Main error type for metadata set-up, processing and decoding
#[derive(Debug, Error)]
pub enum RelvalError {
    // ======================================
    // Configuration Errors
    // ======================================
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Invalid parameter: {param}: {reason}")]
    InvalidParameter { param: String, reason: String },

    #[error("Missing required parameter: {0}")]
    MissingParameter(String),

    #[error("Conflicting parameters: {first} and {second}")]
    ConflictingParameters { first: String, second: String },

    // ======================================
    // Metadata Errors
    // ======================================
    #[error("Point not found: {0}")]
    PointNotFound(String),

    #[error("Duplicate point: {0}")]
    DuplicatePoint(String),

    #[error("Transform not found: {0}")]
    TransformNotFound(String),

    #[error("Behavior {behavior} incompatible: {reason}")]
    BehaviorIncompatible { behavior: String, reason: String },

    #[error("Dependency loop through point {0}")]
    DependencyLoop(String),

    // ======================================
    // Calculation & Processing Errors
    // ======================================
    #[error("Invalid program: {program}: {error}")]
    InvalidProgram { program: String, error: String },

    #[error("Program evaluation failed: {0}")]
    Evaluation(String),

    #[error("Lookup did not settle after {0} passes")]
    LookupPassLimit(u32),

    #[error("Decode error: {0}")]
    Decode(String),

    // ======================================
    // Store Errors
    // ======================================
    #[error("Store error: {0}")]
    Store(String),

    // ======================================
    // File & I/O Errors
    // ======================================
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {what}: {error}")]
    Parse { what: String, error: String },

    #[error("Deserialization error: {0}")]
    Deserialization(String),
}

/// Result type alias using RelvalError
pub type Result<T> = std::result::Result<T, RelvalError>;

impl RelvalError {
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    pub fn invalid_parameter(param: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidParameter {
            param: param.into(),
            reason: reason.into(),
        }
    }

    pub fn missing_parameter(param: impl Into<String>) -> Self {
        Self::MissingParameter(param.into())
    }

    pub fn conflicting_parameters(first: impl Into<String>, second: impl Into<String>) -> Self {
        Self::ConflictingParameters {
            first: first.into(),
            second: second.into(),
        }
    }

    pub fn incompatible(behavior: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::BehaviorIncompatible {
            behavior: behavior.into(),
            reason: reason.into(),
        }
    }

    pub fn parse(what: impl Into<String>, error: impl ToString) -> Self {
        Self::Parse {
            what: what.into(),
            error: error.to_string(),
        }
    }

    pub fn store(msg: impl Into<String>) -> Self {
        Self::Store(msg.into())
    }

    /// Whether the error is caused by metadata rather than by data or I/O
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::Configuration(_)
                | Self::InvalidParameter { .. }
                | Self::MissingParameter(_)
                | Self::ConflictingParameters { .. }
                | Self::PointNotFound(_)
                | Self::DuplicatePoint(_)
                | Self::TransformNotFound(_)
                | Self::BehaviorIncompatible { .. }
                | Self::DependencyLoop(_)
                | Self::InvalidProgram { .. }
        )
    }
}

// Conversion traits for common error types
impl From<serde_json::Error> for RelvalError {
    fn from(err: serde_json::Error) -> Self {
        Self::Deserialization(err.to_string())
    }
}

impl From<serde_yaml::Error> for RelvalError {
    fn from(err: serde_yaml::Error) -> Self {
        Self::Deserialization(err.to_string())
    }
}

// Helper macros for creating errors
#[macro_export]
macro_rules! config_error {
    ($msg:expr) => {
        $crate::RelvalError::Configuration($msg.to_string())
    };
    ($fmt:expr, $($arg:tt)*) => {
        $crate::RelvalError::Configuration(format!($fmt, $($arg)*))
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = RelvalError::invalid_parameter("Size", "must be 1..=4");
        assert_eq!(err.to_string(), "Invalid parameter: Size: must be 1..=4");

        let err = RelvalError::incompatible("Summarizes", "reverse interval with BEGINNING");
        assert_eq!(
            err.to_string(),
            "Behavior Summarizes incompatible: reverse interval with BEGINNING"
        );
    }

    #[test]
    fn test_is_configuration() {
        assert!(RelvalError::missing_parameter("Offset").is_configuration());
        assert!(RelvalError::DependencyLoop("R".into()).is_configuration());
        assert!(!RelvalError::store("closed").is_configuration());
        assert!(!RelvalError::LookupPassLimit(8).is_configuration());
    }

    #[test]
    fn test_config_error_macro() {
        let err = config_error!("bad {} value", "Steps");
        assert!(matches!(err, RelvalError::Configuration(ref m) if m == "bad Steps value"));
    }

    #[test]
    fn test_from_serde_errors() {
        let err: RelvalError = serde_json::from_str::<i32>("x").unwrap_err().into();
        assert!(matches!(err, RelvalError::Deserialization(_)));
    }
}
