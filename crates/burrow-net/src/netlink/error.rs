//! Error types for netlink operations.

use std::io;
use std::time::Duration;

use crate::util::ifname::IfError;

/// Result type for netlink operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur during netlink operations.
///
/// Nothing in this crate retries on its own: kernel rejections repeat
/// unless the request changes, and a timed-out request may still have
/// completed kernel-side, so retry policy belongs to the orchestrator.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// I/O error from socket operations.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Kernel returned an error code.
    #[error("kernel error: {message} (errno {errno})")]
    Kernel {
        /// The errno value from the kernel.
        errno: i32,
        /// Human-readable error message.
        message: String,
    },

    /// Kernel error with operation context.
    #[error("{operation}: {message} (errno {errno})")]
    KernelWithContext {
        /// The operation that failed.
        operation: String,
        /// The errno value from the kernel.
        errno: i32,
        /// Human-readable error message.
        message: String,
    },

    /// Buffer too short for a fixed-size header.
    #[error("message truncated: expected {expected} bytes, got {actual}")]
    Truncated {
        /// Expected length.
        expected: usize,
        /// Actual bytes available.
        actual: usize,
    },

    /// An attribute's declared length is inconsistent with its buffer.
    #[error("malformed attribute: {0}")]
    MalformedAttribute(String),

    /// Semantically invalid message.
    #[error("invalid message: {0}")]
    InvalidMessage(String),

    /// Feature absent on this kernel; callers fall back.
    #[error("operation not supported by this kernel: {0}")]
    NotSupported(String),

    /// No reply arrived before the deadline. The request may still have
    /// completed kernel-side; a retry can see an already-exists rejection.
    #[error("timed out after {timeout:?} waiting for reply to sequence {seq}")]
    Timeout {
        /// Sequence number of the outstanding request.
        seq: u32,
        /// The deadline that expired.
        timeout: Duration,
    },
}

impl Error {
    /// Create a kernel error from a raw (negative) errno value.
    pub fn from_errno(errno: i32) -> Self {
        let message = io::Error::from_raw_os_error(-errno).to_string();
        Self::Kernel {
            errno: -errno,
            message,
        }
    }

    /// Create a kernel error with operation context.
    pub fn from_errno_with_context(errno: i32, operation: impl Into<String>) -> Self {
        let message = io::Error::from_raw_os_error(-errno).to_string();
        Self::KernelWithContext {
            operation: operation.into(),
            errno: -errno,
            message,
        }
    }

    /// Add context to this error.
    ///
    /// Wraps kernel errors with operation context. Other errors are
    /// returned unchanged.
    pub fn with_context(self, operation: impl Into<String>) -> Self {
        match self {
            Self::Kernel { errno, message } => Self::KernelWithContext {
                operation: operation.into(),
                errno,
                message,
            },
            other => other,
        }
    }

    /// Get the errno value if this is a kernel error.
    pub fn errno(&self) -> Option<i32> {
        match self {
            Self::Kernel { errno, .. } | Self::KernelWithContext { errno, .. } => Some(*errno),
            _ => None,
        }
    }

    /// Check if this is a "not found" error (ENOENT, ENODEV).
    pub fn is_not_found(&self) -> bool {
        matches!(self.errno(), Some(libc::ENOENT) | Some(libc::ENODEV))
    }

    /// Check if this is a permission error (EPERM, EACCES).
    pub fn is_permission_denied(&self) -> bool {
        matches!(self.errno(), Some(libc::EPERM) | Some(libc::EACCES))
    }

    /// Check if this is an "already exists" error (EEXIST).
    pub fn is_already_exists(&self) -> bool {
        self.errno() == Some(libc::EEXIST)
    }

    /// Check if the kernel lacks the requested feature (EOPNOTSUPP), or
    /// the error was already surfaced as [`Error::NotSupported`].
    pub fn is_not_supported(&self) -> bool {
        matches!(self, Self::NotSupported(_)) || self.errno() == Some(libc::EOPNOTSUPP)
    }
}

impl From<IfError> for Error {
    fn from(err: IfError) -> Self {
        match err {
            IfError::Io(e) => Self::Io(e),
            other => Self::InvalidMessage(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_errno() {
        let err = Error::from_errno(-libc::EPERM);
        assert!(err.is_permission_denied());
        assert_eq!(err.errno(), Some(libc::EPERM));
    }

    #[test]
    fn from_errno_with_context() {
        let err = Error::from_errno_with_context(-libc::ENOENT, "deleting interface eth0");
        assert!(err.is_not_found());
        let msg = err.to_string();
        assert!(msg.contains("deleting interface eth0"));
    }

    #[test]
    fn with_context_wraps_kernel_errors() {
        let err = Error::from_errno(-libc::EACCES).with_context("bringing up veth0");
        assert!(err.is_permission_denied());
        assert!(err.to_string().contains("bringing up veth0"));
    }

    #[test]
    fn with_context_leaves_other_errors_alone() {
        let err = Error::MalformedAttribute("overrun".into()).with_context("parsing reply");
        assert!(matches!(err, Error::MalformedAttribute(_)));
    }

    #[test]
    fn not_supported_detection() {
        assert!(Error::from_errno(-libc::EOPNOTSUPP).is_not_supported());
        assert!(Error::NotSupported("namespace id queries".into()).is_not_supported());
        assert!(!Error::from_errno(-libc::EPERM).is_not_supported());
    }

    #[test]
    fn already_exists_detection() {
        assert!(Error::from_errno(-libc::EEXIST).is_already_exists());
        assert!(!Error::from_errno(-libc::EBUSY).is_already_exists());
    }
}
