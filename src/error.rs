//! Error types for routegate

use thiserror::Error;

/// The main error type for routegate operations.
///
/// Store and network failures are absorbed by the layers that can supply a
/// safe default. Business-rule violations surface as one of these variants
/// with a message fit for display.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RbacError {
    /// The remote permission authority could not be reached.
    #[error("{0}")]
    StoreUnavailable(String),
    /// A role or route with the same key already exists.
    #[error("{0}")]
    DuplicateEntity(String),
    #[error("{0}")]
    NotFound(String),
    /// System roles and the default administrator cannot be removed.
    #[error("{0}")]
    ProtectedEntity(String),
    #[error("{0}")]
    AccountDisabled(String),
    /// The requester is not allowed to perform the mutation.
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    Invalid(String),
    /// Local persistence failure (LMDB, serialization).
    #[error("{0}")]
    Storage(String),
}

impl RbacError {
    /// Stable machine-readable code, used on the wire.
    pub fn code(&self) -> &'static str {
        match self {
            Self::StoreUnavailable(_) => "store_unavailable",
            Self::DuplicateEntity(_) => "duplicate",
            Self::NotFound(_) => "not_found",
            Self::ProtectedEntity(_) => "protected",
            Self::AccountDisabled(_) => "account_disabled",
            Self::Forbidden(_) => "forbidden",
            Self::Invalid(_) => "invalid",
            Self::Storage(_) => "storage",
        }
    }

    /// Rebuild an error from its wire code. Unknown codes map to `StoreUnavailable`.
    pub fn from_code(code: &str, message: impl Into<String>) -> Self {
        let m = message.into();
        match code {
            "duplicate" => Self::DuplicateEntity(m),
            "not_found" => Self::NotFound(m),
            "protected" => Self::ProtectedEntity(m),
            "account_disabled" => Self::AccountDisabled(m),
            "forbidden" => Self::Forbidden(m),
            "invalid" => Self::Invalid(m),
            "storage" => Self::Storage(m),
            _ => Self::StoreUnavailable(m),
        }
    }

    pub fn message(&self) -> &str {
        match self {
            Self::StoreUnavailable(m)
            | Self::DuplicateEntity(m)
            | Self::NotFound(m)
            | Self::ProtectedEntity(m)
            | Self::AccountDisabled(m)
            | Self::Forbidden(m)
            | Self::Invalid(m)
            | Self::Storage(m) => m,
        }
    }
}

/// Result type alias for routegate operations
pub type Result<T> = std::result::Result<T, RbacError>;

/// Convert any backend error to `RbacError::Storage`
pub fn err<E: std::error::Error>(e: E) -> RbacError {
    RbacError::Storage(e.to_string())
}
