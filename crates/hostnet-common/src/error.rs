//! Error types for hostnet operations.
//!
//! Reconciliation errors split into two levels: step-level errors abort the
//! current sync pass (the next tick retries from scratch), while entry-level
//! errors are logged by the caller and processing continues with the next
//! item. No error here is ever fatal to the process.

use std::io;
use thiserror::Error;

/// Result type alias for hostnet operations.
pub type Result<T> = std::result::Result<T, HostnetError>;

/// Errors that can occur during reconciliation.
#[derive(Debug, Error)]
pub enum HostnetError {
    /// The metadata service could not be reached or returned garbage.
    #[error("metadata unavailable: {message}")]
    MetadataUnavailable {
        /// What went wrong with the request.
        message: String,
    },

    /// A kernel table operation failed (netlink or conntrack).
    #[error("kernel I/O failed: {operation}: {message}")]
    KernelIo {
        /// The operation that failed (e.g. "list_links", "neighbor_set").
        operation: String,
        /// Error message.
        message: String,
    },

    /// Entering a container's network namespace failed.
    #[error("namespace entry failed for container {container}: {message}")]
    NsEntry {
        /// The container whose namespace could not be entered.
        container: String,
        /// Error message.
        message: String,
    },

    /// A kernel link lookup came up empty.
    #[error("link not found: {name}")]
    LinkNotFound {
        /// The link name that did not resolve.
        name: String,
    },

    /// A container runtime query failed.
    #[error("container runtime operation failed: {operation}: {message}")]
    Runtime {
        /// The operation that failed (e.g. "list_containers").
        operation: String,
        /// Error message.
        message: String,
    },

    /// No local bridge link could be resolved from the CNI configuration.
    #[error("couldn't find any local bridge link")]
    NoLocalBridge,

    /// No network on this host matches the network-driver service.
    #[error("couldn't find any local networks")]
    NoLocalNetwork,

    /// The CNI configuration names no bridge plugin.
    #[error("couldn't find bridge info in CNI config")]
    BridgeMissing,

    /// The CNI configuration has a bridge plugin with unusable fields.
    #[error("invalid CNI config: {message}")]
    InvalidCniConfig {
        /// Which field was unusable.
        message: String,
    },

    /// A value from metadata or the kernel did not parse.
    #[error(transparent)]
    Parse(#[from] hostnet_types::ParseError),

    /// Failed to spawn a shell command.
    #[error("failed to execute shell command '{command}': {source}")]
    ShellExec {
        /// The command that failed to execute.
        command: String,
        /// The underlying IO error.
        #[source]
        source: io::Error,
    },

    /// Shell command returned non-zero exit code.
    #[error("shell command failed: '{command}' (exit code {exit_code}): {output}")]
    ShellCommandFailed {
        /// The command that failed.
        command: String,
        /// The exit code.
        exit_code: i32,
        /// Combined stdout/stderr output.
        output: String,
    },
}

impl HostnetError {
    /// Creates a metadata-unavailable error.
    pub fn metadata_unavailable(message: impl Into<String>) -> Self {
        Self::MetadataUnavailable {
            message: message.into(),
        }
    }

    /// Creates a kernel I/O error.
    pub fn kernel_io(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::KernelIo {
            operation: operation.into(),
            message: message.into(),
        }
    }

    /// Creates a namespace-entry error.
    pub fn ns_entry(container: impl Into<String>, message: impl Into<String>) -> Self {
        Self::NsEntry {
            container: container.into(),
            message: message.into(),
        }
    }

    /// Creates a container runtime error.
    pub fn runtime(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Runtime {
            operation: operation.into(),
            message: message.into(),
        }
    }

    /// Creates an invalid-CNI-config error.
    pub fn invalid_cni_config(message: impl Into<String>) -> Self {
        Self::InvalidCniConfig {
            message: message.into(),
        }
    }

    /// Returns true if this error indicates a transient condition that the
    /// next reconciliation tick is expected to clear on its own.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            HostnetError::MetadataUnavailable { .. }
                | HostnetError::KernelIo { .. }
                | HostnetError::Runtime { .. }
                | HostnetError::ShellCommandFailed { .. }
        )
    }
}
