//! Network namespace references.
//!
//! The runtime's orchestrator hands this crate a reference to a target
//! namespace — by process id or by open descriptor — and the kernel
//! resolves it at request time. [`NamespaceFd`] keeps a namespace file
//! open so a descriptor reference stays valid for the whole provisioning
//! sequence, even if the referenced process exits.

use std::fs::File;
use std::os::unix::io::{AsRawFd, RawFd};
use std::path::Path;

use super::error::{Error, Result};

/// A reference to a network namespace.
#[derive(Debug, Clone, Copy)]
pub enum NetnsRef {
    /// The network namespace of a process.
    Pid(u32),
    /// An open descriptor to a namespace file.
    Fd(RawFd),
}

/// An open handle to a namespace file.
///
/// Holding the handle pins the namespace: the kernel keeps it alive as
/// long as the descriptor is open.
#[derive(Debug)]
pub struct NamespaceFd {
    file: File,
}

impl NamespaceFd {
    /// Reference this namespace by its descriptor.
    pub fn netns_ref(&self) -> NetnsRef {
        NetnsRef::Fd(self.file.as_raw_fd())
    }
}

impl AsRawFd for NamespaceFd {
    fn as_raw_fd(&self) -> RawFd {
        self.file.as_raw_fd()
    }
}

/// Open a namespace file by path.
///
/// Works with any namespace file: `/proc/<pid>/ns/net`, or a
/// bind-mounted named namespace.
pub fn open_path<P: AsRef<Path>>(path: P) -> Result<NamespaceFd> {
    let file = File::open(path.as_ref()).map_err(|e| {
        Error::InvalidMessage(format!(
            "cannot open namespace '{}': {}",
            path.as_ref().display(),
            e
        ))
    })?;
    Ok(NamespaceFd { file })
}

/// Open a process's network namespace.
pub fn open_pid(pid: u32) -> Result<NamespaceFd> {
    open_path(format!("/proc/{}/ns/net", pid))
}
