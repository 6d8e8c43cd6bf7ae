//! Namespace id message types and constants (RTM_*NSID).

use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

/// Request attributes for namespace id queries (NETNSA_*).
pub mod netnsa {
    /// Reference the namespace of a process (u32 pid).
    pub const PID: u16 = 2;
    /// Reference the namespace behind a descriptor (u32 fd).
    pub const FD: u16 = 3;
}

/// Tags kernels have carried the assigned id under in RTM_NEWNSID
/// replies. Both occur in the wild, so a resolver accepts either.
pub const IFLA_NEW_NETNSID: u16 = 45;
pub const IFLA_IF_NETNSID: u16 = 46;

/// rtgenmsg header used for RTM_*NSID messages.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, FromBytes, IntoBytes, Immutable, KnownLayout)]
pub struct RtGenMsg {
    /// Address family (AF_UNSPEC).
    pub rtgen_family: u8,
}

impl RtGenMsg {
    /// Create a new rtgenmsg with AF_UNSPEC family.
    pub fn new() -> Self {
        Self::default()
    }

    /// Size of this struct in a message, including padding to 4 bytes.
    pub const fn padded_size() -> usize {
        4 // 1 byte + 3 bytes padding
    }
}
