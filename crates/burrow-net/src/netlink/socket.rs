//! Low-level async netlink socket operations.

use std::fs::File;
use std::future::Future;
use std::os::unix::io::{AsRawFd, RawFd};
use std::path::Path;
use std::sync::atomic::{AtomicU32, Ordering};

use bytes::BytesMut;
use netlink_sys::{Socket, SocketAddr, protocols};
use tokio::io::Interest;
use tokio::io::unix::AsyncFd;

use super::error::{Error, Result};

/// The request/reply seam between protocol logic and the kernel socket.
///
/// One implementor is the live [`NetlinkSocket`]; tests substitute a mock
/// that replays captured reply frames, so everything above this trait runs
/// without a kernel.
///
/// An implementor is one requester: the sequence counter and reply stream
/// are owned by a single in-flight request at a time, so concurrent
/// callers need a socket each (or external locking).
pub trait Transport {
    /// Allocate the next sequence number for this socket.
    fn next_seq(&self) -> u32;

    /// The local port id replies will be addressed to.
    fn port_id(&self) -> u32;

    /// Write one encoded request.
    fn send(&self, msg: &[u8]) -> impl Future<Output = Result<()>> + Send;

    /// Read one datagram, which may pack several messages.
    fn recv(&self) -> impl Future<Output = Result<Vec<u8>>> + Send;
}

/// Async socket bound to the NETLINK_ROUTE family.
///
/// Each instance owns a dedicated socket with a kernel-assigned port id
/// and a socket-scoped, monotonically increasing sequence counter.
pub struct NetlinkSocket {
    /// The underlying async file descriptor.
    fd: AsyncFd<Socket>,
    /// Sequence number counter.
    seq: AtomicU32,
    /// Local port ID (assigned by kernel).
    pid: u32,
}

impl NetlinkSocket {
    /// Create a new routing-protocol socket in the current namespace.
    pub fn new() -> Result<Self> {
        Self::create_socket()
    }

    /// Create a socket that operates in a specific network namespace.
    ///
    /// The namespace is specified by an open file descriptor to a
    /// namespace file (e.g. `/proc/<pid>/ns/net`). The calling thread
    /// temporarily switches into the target namespace, creates the
    /// socket, then switches back; the socket keeps operating in the
    /// target namespace for its whole lifetime.
    pub fn new_in_namespace(ns_fd: RawFd) -> Result<Self> {
        // Save the current namespace so we can restore it.
        let current_ns = File::open("/proc/self/ns/net")
            .map_err(|e| Error::InvalidMessage(format!("cannot open current namespace: {}", e)))?;
        let current_ns_fd = current_ns.as_raw_fd();

        // SAFETY: setns switches the calling thread to the namespace
        // behind ns_fd, which the caller guarantees is a netns fd.
        let ret = unsafe { libc::setns(ns_fd, libc::CLONE_NEWNET) };
        if ret < 0 {
            return Err(Error::Io(std::io::Error::last_os_error()));
        }

        let result = Self::create_socket();

        // SAFETY: current_ns_fd was opened from /proc/self/ns/net above.
        let restore_ret = unsafe { libc::setns(current_ns_fd, libc::CLONE_NEWNET) };
        if restore_ret < 0 {
            // The socket is usable either way; the thread being stuck in
            // the wrong namespace is the caller's larger problem.
            tracing::warn!(
                error = %std::io::Error::last_os_error(),
                "failed to restore original network namespace"
            );
        }

        result
    }

    /// Create a socket operating in the namespace at the given path.
    ///
    /// Accepts any namespace file: `/proc/<pid>/ns/net` for a process,
    /// or a bind-mounted path for a named namespace.
    pub fn new_in_namespace_path<P: AsRef<Path>>(ns_path: P) -> Result<Self> {
        let ns_file = File::open(ns_path.as_ref()).map_err(|e| {
            Error::InvalidMessage(format!(
                "cannot open namespace '{}': {}",
                ns_path.as_ref().display(),
                e
            ))
        })?;
        Self::new_in_namespace(ns_file.as_raw_fd())
    }

    fn create_socket() -> Result<Self> {
        let mut socket = Socket::new(protocols::NETLINK_ROUTE)?;
        socket.set_non_blocking(true)?;

        // Bind to get a port ID
        let mut addr = SocketAddr::new(0, 0);
        socket.bind(&addr)?;
        socket.get_address(&mut addr)?;
        let pid = addr.port_number();

        // Enable extended ACK for better error messages
        socket.set_ext_ack(true).ok(); // Ignore if not supported

        let fd = AsyncFd::new(socket)?;

        Ok(Self {
            fd,
            seq: AtomicU32::new(1),
            pid,
        })
    }
}

impl Transport for NetlinkSocket {
    fn next_seq(&self) -> u32 {
        self.seq.fetch_add(1, Ordering::Relaxed)
    }

    fn port_id(&self) -> u32 {
        self.pid
    }

    async fn send(&self, msg: &[u8]) -> Result<()> {
        loop {
            let mut guard = self.fd.ready(Interest::WRITABLE).await?;

            match guard.try_io(|inner| inner.get_ref().send(msg, 0)) {
                Ok(result) => {
                    let n = result?;
                    tracing::trace!(bytes = n, "sent netlink request");
                    return Ok(());
                }
                Err(_would_block) => continue,
            }
        }
    }

    async fn recv(&self) -> Result<Vec<u8>> {
        // Allocate buffer with capacity - don't resize, let recv fill it
        let mut buf = BytesMut::with_capacity(32768);

        loop {
            let mut guard = self.fd.ready(Interest::READABLE).await?;

            match guard.try_io(|inner| inner.get_ref().recv(&mut buf, 0)) {
                Ok(result) => {
                    let n = result?;
                    tracing::trace!(bytes = n, "received netlink datagram");
                    return Ok(buf.to_vec());
                }
                Err(_would_block) => continue,
            }
        }
    }
}

impl AsRawFd for NetlinkSocket {
    fn as_raw_fd(&self) -> RawFd {
        self.fd.get_ref().as_raw_fd()
    }
}
