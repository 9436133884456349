//! Error types for shapegraph-core
//!
//! Only modeling-capability failures live here. Memory-safety violations found
//! in the analysed program are data (`ErrorInfo` on a state), never an `Err`.

use crate::config::ConfigError;
use thiserror::Error;

/// Hard failure: the analysis cannot represent the construct on this path
#[derive(Debug, Error)]
pub enum SmgError {
    /// Construct intentionally not modeled (e.g. `va_arg`)
    #[error("Unsupported operation: {0}")]
    Unsupported(String),

    /// Identifier without declaration in any visible scope
    #[error("Use of undeclared identifier '{0}'")]
    UndeclaredIdentifier(String),

    /// Builtin called with a wrong number of arguments
    #[error("Function '{function}' expects {expected} argument(s), got {found}")]
    ArgumentCount {
        function: String,
        expected: usize,
        found: usize,
    },

    /// Symbolic size where the configuration forbids symbolic handling
    #[error("Symbolic size in '{function}' is not supported: {reason}")]
    SymbolicSizeUnsupported { function: String, reason: String },

    /// memcmp operands whose edges cannot be paired
    #[error("memcmp operands cannot be compared: {0}")]
    UnresolvableMemcmp(String),

    /// Unknown function rejected by the strict handling policy
    #[error("Unknown function '{0}' may not be approximated")]
    UnknownFunction(String),

    /// Points-to edge re-added with a different target
    #[error("Value {value} already points to another target")]
    PointerRedefinition { value: String },

    /// Symbolic case split exceeded the configured bound
    #[error("Symbolic case split in '{function}' exceeded {limit} assignments")]
    TooManySymbolicAssignments { function: String, limit: usize },

    /// Structurally malformed expression
    #[error("Invalid expression: {0}")]
    InvalidExpression(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl SmgError {
    /// Create an unsupported-operation error
    pub fn unsupported(msg: impl Into<String>) -> Self {
        SmgError::Unsupported(msg.into())
    }

    /// Create an invalid-expression error
    pub fn invalid_expression(msg: impl Into<String>) -> Self {
        SmgError::InvalidExpression(msg.into())
    }

    /// Create a symbolic-size error
    pub fn symbolic_size(function: impl Into<String>, reason: impl Into<String>) -> Self {
        SmgError::SymbolicSizeUnsupported {
            function: function.into(),
            reason: reason.into(),
        }
    }

    /// Check argument count against a fixed builtin signature
    pub fn check_arity(function: &str, expected: usize, found: usize) -> SmgResult<()> {
        if expected == found {
            Ok(())
        } else {
            Err(SmgError::ArgumentCount {
                function: function.to_string(),
                expected,
                found,
            })
        }
    }
}

/// Result type alias for shape-graph operations
pub type SmgResult<T> = std::result::Result<T, SmgError>;
