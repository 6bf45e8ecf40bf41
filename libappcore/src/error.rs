//! Error types for Appcore

use thiserror::Error;

pub type Result<T> = std::result::Result<T, AppCoreError>;

#[derive(Error, Debug)]
pub enum AppCoreError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Request failures display without a prefix so callers see `"<status>: <text>"`
    #[error(transparent)]
    Request(#[from] RequestError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl AppCoreError {
    /// Returns the appropriate exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            AppCoreError::InvalidInput(_) => 3,
            AppCoreError::Request(RequestError::Http { status: 401 | 403, .. }) => 2,
            AppCoreError::Request(_) => 1,
            AppCoreError::Config(_) => 1,
            AppCoreError::Storage(_) => 1,
        }
    }

    /// The underlying request error, if this is one
    pub fn as_request(&self) -> Option<&RequestError> {
        match self {
            AppCoreError::Request(e) => Some(e),
            _ => None,
        }
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid value: {0}")]
    InvalidValue(String),
}

/// Outcome classification of a failed HTTP exchange
///
/// Cloneable so a single in-flight result can be handed to every waiter.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RequestError {
    /// No response was obtained (DNS, connect, TLS, timeout below this layer)
    #[error("Network error: {0}")]
    Network(String),

    /// A response arrived with a non-success status
    #[error("{status}: {text}")]
    Http { status: u16, text: String },

    /// A success response whose body could not be decoded as JSON
    #[error("Invalid response body: {0}")]
    Decode(String),
}

impl RequestError {
    /// HTTP status carried by this error, if a response was obtained
    pub fn status(&self) -> Option<u16> {
        match self {
            RequestError::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        self.status() == Some(401)
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StorageError {
    #[error("Failed to read stored value: {0}")]
    Read(String),

    #[error("Failed to write stored value: {0}")]
    Write(String),
}
