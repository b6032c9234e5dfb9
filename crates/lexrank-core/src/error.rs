use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid configuration: {reason}")]
    Configuration { reason: String },

    #[error("registry is sealed; cannot register space '{space}'")]
    RegistrySealed { space: String },

    #[error("unknown space '{name}'")]
    UnknownSpace { name: String },

    #[error("invalid filter on '{attribute}': {reason}")]
    InvalidFilter { attribute: String, reason: String },

    #[error("invalid weight for space '{space}': {reason}")]
    InvalidWeight { space: String, reason: String },

    #[error("query cannot produce an ordering: {reason}")]
    EmptyQuery { reason: String },

    #[error("backend unavailable for space '{space}' ({code}): {message}")]
    BackendUnavailable {
        space: String,
        code: String,
        message: String,
    },

    #[error("query cancelled")]
    QueryCancelled,

    #[error("invalid document '{id}': {reason}")]
    InvalidDocument { id: String, reason: String },
}

impl Error {
    pub fn config(reason: impl Into<String>) -> Self {
        Self::Configuration { reason: reason.into() }
    }

    pub fn invalid_filter(attribute: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidFilter {
            attribute: attribute.into(),
            reason: reason.into(),
        }
    }

    pub fn invalid_document(id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidDocument {
            id: id.into(),
            reason: reason.into(),
        }
    }

    /// Stable machine-readable code for rendering by outer layers.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Configuration { .. } => "configuration",
            Self::RegistrySealed { .. } => "registry_sealed",
            Self::UnknownSpace { .. } => "unknown_space",
            Self::InvalidFilter { .. } => "invalid_filter",
            Self::InvalidWeight { .. } => "invalid_weight",
            Self::EmptyQuery { .. } => "empty_query",
            Self::BackendUnavailable { .. } => "backend_unavailable",
            Self::QueryCancelled => "query_cancelled",
            Self::InvalidDocument { .. } => "invalid_document",
        }
    }

    /// Errors raised while composing a query from caller input.
    pub fn is_caller_error(&self) -> bool {
        matches!(
            self,
            Self::UnknownSpace { .. }
                | Self::InvalidFilter { .. }
                | Self::InvalidWeight { .. }
                | Self::EmptyQuery { .. }
        )
    }

    /// Only backend failures are worth retrying, and only by the caller.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::BackendUnavailable { .. })
    }
}

/// Failure reported by a similarity backend adapter.
#[derive(Debug, Clone, Error)]
#[error("{code}: {message}")]
pub struct BackendError {
    pub code: String,
    pub message: String,
}

impl BackendError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new("unavailable", message)
    }

    /// Attach the space the failing call was issued for.
    pub fn into_error(self, space: impl Into<String>) -> Error {
        Error::BackendUnavailable {
            space: space.into(),
            code: self.code,
            message: self.message,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
