//! Link message types and constants (RTM_*LINK).

use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

/// Interface info message header (mirrors struct ifinfomsg).
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, FromBytes, IntoBytes, Immutable, KnownLayout)]
pub struct IfInfoMsg {
    /// Address family (AF_UNSPEC).
    pub ifi_family: u8,
    /// Padding byte.
    pub ifi_pad: u8,
    /// Device type (ARPHRD_*).
    pub ifi_type: u16,
    /// Interface index, or 0 when the kernel assigns one.
    pub ifi_index: i32,
    /// Device flags (IFF_*).
    pub ifi_flags: u32,
    /// Mask of flags to change.
    pub ifi_change: u32,
}

impl IfInfoMsg {
    /// Create a zeroed header (kernel picks the index).
    pub fn new() -> Self {
        Self::default()
    }

    /// Address an existing interface by index.
    pub fn with_index(mut self, index: i32) -> Self {
        self.ifi_index = index;
        self
    }
}

/// Interface flags.
pub mod iff {
    /// Interface is administratively up.
    pub const UP: u32 = 0x1;
}

/// Link attribute types (IFLA_*).
#[repr(u16)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IflaAttr {
    /// Hardware address.
    Address = 1,
    /// Interface name.
    Ifname = 3,
    /// MTU.
    Mtu = 4,
    /// Parent interface index.
    Link = 5,
    /// Container for kind string and kind-specific data.
    Linkinfo = 18,
    /// Place the device into the namespace of this process.
    NetNsPid = 19,
    /// Place the device into the namespace behind this descriptor.
    NetNsFd = 28,
}

/// Attributes nested inside IFLA_LINKINFO.
#[repr(u16)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IflaInfo {
    /// Kind string ("veth", "macvlan", ...).
    Kind = 1,
    /// Kind-specific attribute block.
    Data = 2,
}
