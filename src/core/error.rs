use thiserror::Error;

use crate::core::joinpoint::Failure;

/// Result type alias for weaving and dispatch operations
pub type AopResult<T> = Result<T, AopError>;

/// Errors raised while registering metadata, building stand-ins or calling
/// through them.
///
/// Registration and construction errors (`NotFound`, `Unproxyable`,
/// `InvalidPointcut`, `InvalidConfiguration`) abort the build; no partially
/// woven stand-in is ever returned. `TypeMismatch` is raised at the view site
/// and is recoverable. `Target` carries whatever the real operation or an
/// advice body raised, unchanged.
#[derive(Error, Debug, Clone)]
#[non_exhaustive]
pub enum AopError {
    /// A type, operation, bean or named pointcut does not exist
    #[error("{kind} not found: {name}")]
    NotFound { kind: &'static str, name: String },

    /// A stand-in was viewed as a type it was not built to expose
    #[error("bean '{bean}' ({strategy} stand-in) cannot be viewed as '{requested}'")]
    TypeMismatch {
        bean: String,
        requested: String,
        strategy: &'static str,
    },

    /// The target cannot be wrapped with the selected dispatch strategy
    #[error("cannot build stand-in for '{type_name}': {reason}")]
    Unproxyable { type_name: String, reason: String },

    /// A pointcut expression failed to parse or to bind against the registry
    #[error("invalid pointcut '{expression}' at {position}: {message}")]
    InvalidPointcut {
        expression: String,
        position: usize,
        message: String,
    },

    /// A registration-time setting is out of range or inconsistent
    #[error("invalid configuration: {message}")]
    InvalidConfiguration { message: String },

    /// Raised by the target operation or by an advice body
    #[error(transparent)]
    Target(#[from] Failure),
}

impl AopError {
    pub fn not_found(kind: &'static str, name: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            name: name.into(),
        }
    }

    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfiguration {
            message: message.into(),
        }
    }

    /// The target failure, if this error came from a call.
    pub fn as_failure(&self) -> Option<&Failure> {
        match self {
            AopError::Target(failure) => Some(failure),
            _ => None,
        }
    }
}
