//! Registry error types

/// Error type for format registry operations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    /// A format with this name is already installed
    #[error("format already registered: {0}")]
    AlreadyRegistered(String),
    /// No format with this name is installed
    #[error("format not registered: {0}")]
    NotFound(String),
}
