//! Error types for the `newsrag` crate.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur in vector store and retrieval operations.
///
/// The [`VectorStore`](crate::VectorStore) orchestrator never returns these to
/// its callers; it classifies them to decide between degradation and an empty
/// result. The retrieval pipeline does surface embedding and configuration
/// errors.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The persistent engine is not available in this build or environment.
    #[error("Persistent engine unavailable: {0}")]
    CapabilityUnavailable(String),

    /// Connecting to (or opening the collection in) the persistent engine failed.
    #[error("Failed to connect vector engine at {}: {message}", path.display())]
    ConnectFailure {
        /// The directory the engine was asked to open.
        path: PathBuf,
        /// A description of the failure.
        message: String,
    },

    /// Inserting rows into an initialized backend failed.
    #[error("Write failed ({backend}): {message}")]
    WriteFailure {
        /// The backend that rejected the write.
        backend: String,
        /// A description of the failure.
        message: String,
    },

    /// A nearest-neighbor search failed.
    #[error("Read failed ({backend}): {message}")]
    ReadFailure {
        /// The backend that failed the read.
        backend: String,
        /// A description of the failure.
        message: String,
    },

    /// A raw error reported by a backend or engine.
    #[error("Vector store error ({backend}): {message}")]
    Backend {
        /// The backend that produced the error.
        backend: String,
        /// A description of the failure.
        message: String,
    },

    /// An error occurred during embedding generation.
    #[error("Embedding error ({provider}): {message}")]
    Embedding {
        /// The embedding provider that produced the error.
        provider: String,
        /// A description of the failure.
        message: String,
    },

    /// A configuration validation error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// An error in the retrieval pipeline orchestration.
    #[error("Pipeline error: {0}")]
    Pipeline(String),
}

impl StoreError {
    /// Build a [`StoreError::Backend`] for the named backend.
    pub fn backend(backend: &str, message: impl Into<String>) -> Self {
        Self::Backend { backend: backend.to_string(), message: message.into() }
    }
}

/// A convenience result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
