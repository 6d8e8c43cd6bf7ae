//! Device creation and the per-device provisioning sequence.
//!
//! The runtime creates two kinds of virtual device for a container: a
//! veth pair (one end per namespace) and a macvlan device layered on a
//! host interface. Creation is a single create-link round trip; the peer
//! or device end can be placed directly into the target namespace by the
//! kernel. Follow-up steps (rename, bring up) are separate round trips,
//! and a failure between steps is reported as a partial result so the
//! orchestrator can tear down what already exists — nothing is rolled
//! back or retried here.
//!
//! Name-based helpers resolve the interface index in the calling
//! thread's namespace. When a connection's socket lives in another
//! namespace, resolve the index there and use the `*_by_index`
//! variants.
//!
//! # Example
//!
//! ```ignore
//! use burrow_net::netlink::Connection;
//! use burrow_net::netlink::namespace::NetnsRef;
//! use burrow_net::netlink::provision::{DevicePlan, VethConfig};
//!
//! let conn = Connection::new()?;
//! let plan = DevicePlan::veth(
//!     VethConfig::new("veth0", "veth1").peer_netns(NetnsRef::Pid(container_pid)),
//! );
//! match conn.provision(&plan).await {
//!     Ok(created) => println!("created {:?}", created),
//!     Err(partial) => {
//!         // partial.created lists what must be torn down
//!         for name in &partial.created {
//!             conn.del_link(name).await.ok();
//!         }
//!         return Err(partial.source);
//!     }
//! }
//! ```

use tracing::debug;

use super::builder::MessageBuilder;
use super::connection::{Connection, ack_request, create_request};
use super::error::{Error, Result};
use super::message::NlMsgType;
use super::namespace::NetnsRef;
use super::socket::Transport;
use super::types::link::{IfInfoMsg, IflaAttr, IflaInfo, iff};
use crate::util::ifname;

/// VETH-specific nested attributes
mod veth {
    pub const VETH_INFO_PEER: u16 = 1;
}

/// Macvlan-specific attributes
mod macvlan {
    pub const IFLA_MACVLAN_MODE: u16 = 1;
}

/// Macvlan isolation mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MacvlanMode {
    /// No communication between macvlans on the same parent.
    Private = 1,
    /// Traffic goes out to the external switch and back.
    Vepa = 2,
    /// Macvlans on the same parent talk to each other directly.
    Bridge = 4,
    /// Single macvlan takes over the parent.
    Passthru = 8,
}

/// Trait for link configurations that can be created.
pub trait LinkConfig {
    /// The name of the device this configuration creates.
    fn name(&self) -> &str;

    /// The kind string for this link type ("veth", "macvlan").
    fn kind(&self) -> &str;

    /// Names of every device that exists once creation is acknowledged.
    fn created_names(&self) -> Vec<String>;

    /// Build the create-link message.
    fn build(&self) -> Result<MessageBuilder>;
}

// ============================================================================
// Veth
// ============================================================================

/// Configuration for a veth (virtual ethernet) pair.
///
/// Veth devices are created in pairs acting as the two ends of a virtual
/// cable; the peer end is typically placed into a container's namespace
/// at creation time.
#[derive(Debug, Clone)]
pub struct VethConfig {
    name: String,
    peer_name: String,
    mtu: Option<u32>,
    address: Option<[u8; 6]>,
    peer_netns: Option<NetnsRef>,
}

impl VethConfig {
    /// Configure a veth pair with the given end names.
    pub fn new(name: impl Into<String>, peer_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            peer_name: peer_name.into(),
            mtu: None,
            address: None,
            peer_netns: None,
        }
    }

    /// Set the MTU for both ends.
    pub fn mtu(mut self, mtu: u32) -> Self {
        self.mtu = Some(mtu);
        self
    }

    /// Set the hardware address of the first end.
    pub fn address(mut self, addr: [u8; 6]) -> Self {
        self.address = Some(addr);
        self
    }

    /// Place the peer end into a target namespace at creation time.
    pub fn peer_netns(mut self, ns: NetnsRef) -> Self {
        self.peer_netns = Some(ns);
        self
    }
}

impl LinkConfig for VethConfig {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> &str {
        "veth"
    }

    fn created_names(&self) -> Vec<String> {
        vec![self.name.clone(), self.peer_name.clone()]
    }

    fn build(&self) -> Result<MessageBuilder> {
        ifname::validate(&self.name)?;
        ifname::validate(&self.peer_name)?;

        let mut builder = create_link_message(&self.name);

        if let Some(mtu) = self.mtu {
            builder.append_attr_u32(IflaAttr::Mtu as u16, mtu);
        }
        if let Some(ref addr) = self.address {
            builder.append_attr(IflaAttr::Address as u16, addr);
        }

        // IFLA_LINKINFO
        let linkinfo = builder.nest_start(IflaAttr::Linkinfo as u16);
        builder.append_attr_str(IflaInfo::Kind as u16, "veth");

        // IFLA_INFO_DATA -> VETH_INFO_PEER -> ifinfomsg + peer attrs.
        // The peer block opens with a fixed struct, so it is an envelope,
        // not a plain attribute list.
        let data = builder.nest_start(IflaInfo::Data as u16);
        let peer = builder.envelope_start(veth::VETH_INFO_PEER);

        builder.append(&IfInfoMsg::new());
        builder.append_attr_str(IflaAttr::Ifname as u16, &self.peer_name);

        if let Some(mtu) = self.mtu {
            builder.append_attr_u32(IflaAttr::Mtu as u16, mtu);
        }

        match self.peer_netns {
            Some(NetnsRef::Pid(pid)) => {
                builder.append_attr_u32(IflaAttr::NetNsPid as u16, pid);
            }
            Some(NetnsRef::Fd(fd)) => {
                builder.append_attr_u32(IflaAttr::NetNsFd as u16, fd as u32);
            }
            None => {}
        }

        builder.nest_end(peer);
        builder.nest_end(data);
        builder.nest_end(linkinfo);

        Ok(builder)
    }
}

// ============================================================================
// Macvlan
// ============================================================================

/// Configuration for a macvlan device layered on a parent interface.
#[derive(Debug, Clone)]
pub struct MacvlanConfig {
    name: String,
    parent: String,
    mode: MacvlanMode,
    mtu: Option<u32>,
    address: Option<[u8; 6]>,
    netns: Option<NetnsRef>,
}

impl MacvlanConfig {
    /// Configure a macvlan device on the given parent interface.
    pub fn new(name: impl Into<String>, parent: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parent: parent.into(),
            mode: MacvlanMode::Bridge,
            mtu: None,
            address: None,
            netns: None,
        }
    }

    /// Set the isolation mode (default bridge).
    pub fn mode(mut self, mode: MacvlanMode) -> Self {
        self.mode = mode;
        self
    }

    /// Set the MTU.
    pub fn mtu(mut self, mtu: u32) -> Self {
        self.mtu = Some(mtu);
        self
    }

    /// Set the hardware address.
    pub fn address(mut self, addr: [u8; 6]) -> Self {
        self.address = Some(addr);
        self
    }

    /// Place the device into a target namespace at creation time.
    ///
    /// The parent is still resolved in the current namespace, so this
    /// avoids the separate create-then-move round trip.
    pub fn netns(mut self, ns: NetnsRef) -> Self {
        self.netns = Some(ns);
        self
    }
}

impl LinkConfig for MacvlanConfig {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> &str {
        "macvlan"
    }

    fn created_names(&self) -> Vec<String> {
        vec![self.name.clone()]
    }

    fn build(&self) -> Result<MessageBuilder> {
        ifname::validate(&self.name)?;
        let parent_index = ifname::index(&self.parent)?;

        let mut builder = create_link_message(&self.name);

        builder.append_attr_u32(IflaAttr::Link as u16, parent_index);

        if let Some(mtu) = self.mtu {
            builder.append_attr_u32(IflaAttr::Mtu as u16, mtu);
        }
        if let Some(ref addr) = self.address {
            builder.append_attr(IflaAttr::Address as u16, addr);
        }
        match self.netns {
            Some(NetnsRef::Pid(pid)) => {
                builder.append_attr_u32(IflaAttr::NetNsPid as u16, pid);
            }
            Some(NetnsRef::Fd(fd)) => {
                builder.append_attr_u32(IflaAttr::NetNsFd as u16, fd as u32);
            }
            None => {}
        }

        // IFLA_LINKINFO -> kind + IFLA_INFO_DATA -> mode
        let linkinfo = builder.nest_start(IflaAttr::Linkinfo as u16);
        builder.append_attr_str(IflaInfo::Kind as u16, "macvlan");

        let data = builder.nest_start(IflaInfo::Data as u16);
        builder.append_attr_u32(macvlan::IFLA_MACVLAN_MODE, self.mode as u32);
        builder.nest_end(data);

        builder.nest_end(linkinfo);

        Ok(builder)
    }
}

/// Start an exclusive create-link message carrying the device name.
fn create_link_message(name: &str) -> MessageBuilder {
    let mut builder = create_request(NlMsgType::RTM_NEWLINK);
    builder.append(&IfInfoMsg::new());
    builder.append_attr_str(IflaAttr::Ifname as u16, name);
    builder
}

// ============================================================================
// Provisioning sequence
// ============================================================================

/// The step of a provisioning sequence that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProvisionStep {
    /// The create-link round trip.
    Create,
    /// The follow-up rename round trip.
    Rename,
    /// The follow-up bring-up round trip.
    Activate,
}

impl std::fmt::Display for ProvisionStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Create => "create",
            Self::Rename => "rename",
            Self::Activate => "activate",
        };
        f.write_str(name)
    }
}

/// A provisioning sequence failed partway through.
///
/// `created` lists every device that already exists; the caller owns
/// tearing those down (see [`Connection::del_link`]).
#[derive(Debug, thiserror::Error)]
#[error("{step} step failed with {created:?} already created: {source}")]
pub struct ProvisionError {
    /// The step that failed.
    pub step: ProvisionStep,
    /// Devices created by earlier steps, newest name last.
    pub created: Vec<String>,
    /// The underlying failure.
    pub source: Error,
}

/// One device to provision: a creation config plus optional follow-ups.
#[derive(Debug, Clone)]
pub struct DevicePlan {
    link: DeviceConfig,
    rename_to: Option<String>,
    bring_up: bool,
}

/// Creation config of a planned device.
#[derive(Debug, Clone)]
pub enum DeviceConfig {
    /// A veth pair.
    Veth(VethConfig),
    /// A macvlan device.
    Macvlan(MacvlanConfig),
}

impl LinkConfig for DeviceConfig {
    fn name(&self) -> &str {
        match self {
            Self::Veth(c) => c.name(),
            Self::Macvlan(c) => c.name(),
        }
    }

    fn kind(&self) -> &str {
        match self {
            Self::Veth(c) => c.kind(),
            Self::Macvlan(c) => c.kind(),
        }
    }

    fn created_names(&self) -> Vec<String> {
        match self {
            Self::Veth(c) => c.created_names(),
            Self::Macvlan(c) => c.created_names(),
        }
    }

    fn build(&self) -> Result<MessageBuilder> {
        match self {
            Self::Veth(c) => c.build(),
            Self::Macvlan(c) => c.build(),
        }
    }
}

impl DevicePlan {
    /// Plan a veth pair.
    pub fn veth(config: VethConfig) -> Self {
        Self {
            link: DeviceConfig::Veth(config),
            rename_to: None,
            bring_up: false,
        }
    }

    /// Plan a macvlan device.
    pub fn macvlan(config: MacvlanConfig) -> Self {
        Self {
            link: DeviceConfig::Macvlan(config),
            rename_to: None,
            bring_up: false,
        }
    }

    /// Rename the primary device after creation (scratch-name flows).
    ///
    /// The rename addresses the device in the connection's namespace; a
    /// device placed elsewhere at creation must be renamed through a
    /// connection in that namespace.
    pub fn rename_to(mut self, name: impl Into<String>) -> Self {
        self.rename_to = Some(name.into());
        self
    }

    /// Administratively bring the primary device up as a final step.
    pub fn bring_up(mut self) -> Self {
        self.bring_up = true;
        self
    }
}

impl<T: Transport> Connection<T> {
    /// Create a new network interface.
    pub async fn add_link<L: LinkConfig>(&self, config: &L) -> Result<()> {
        debug!(name = config.name(), kind = config.kind(), "creating link");
        let builder = config.build()?;
        let operation = format!("creating {} {}", config.kind(), config.name());
        self.request_ack(builder, &operation).await
    }

    /// Run a device plan: create, then the optional follow-up steps.
    ///
    /// Returns the names of every created device. On failure, the
    /// [`ProvisionError`] reports the failing step and the devices that
    /// already exist; they are left in place for the caller to tear down.
    pub async fn provision(
        &self,
        plan: &DevicePlan,
    ) -> std::result::Result<Vec<String>, ProvisionError> {
        self.add_link(&plan.link).await.map_err(|source| ProvisionError {
            step: ProvisionStep::Create,
            created: Vec::new(),
            source,
        })?;

        let mut created = plan.link.created_names();
        let mut primary = created[0].clone();
        debug!(devices = ?created, "links created");

        if let Some(new_name) = &plan.rename_to {
            self.set_link_name(&primary, new_name)
                .await
                .map_err(|source| ProvisionError {
                    step: ProvisionStep::Rename,
                    created: created.clone(),
                    source,
                })?;
            debug!(from = %primary, to = %new_name, "link renamed");
            created[0] = new_name.clone();
            primary = new_name.clone();
        }

        if plan.bring_up {
            self.set_link_up(&primary)
                .await
                .map_err(|source| ProvisionError {
                    step: ProvisionStep::Activate,
                    created: created.clone(),
                    source,
                })?;
            debug!(name = %primary, "link up");
        }

        Ok(created)
    }

    /// Delete a network interface.
    pub async fn del_link(&self, name: &str) -> Result<()> {
        let ifindex = ifname::index(name)?;
        self.del_link_by_index(ifindex as i32)
            .await
            .map_err(|e| e.with_context(format!("deleting {}", name)))
    }

    /// Delete a network interface by index.
    pub async fn del_link_by_index(&self, ifindex: i32) -> Result<()> {
        let mut builder = ack_request(NlMsgType::RTM_DELLINK);
        builder.append(&IfInfoMsg::new().with_index(ifindex));
        self.request_ack(builder, "deleting link").await
    }

    /// Rename a network interface.
    ///
    /// The interface must be down to be renamed.
    pub async fn set_link_name(&self, name: &str, new_name: &str) -> Result<()> {
        ifname::validate(new_name)?;
        let ifindex = ifname::index(name)?;
        self.set_link_name_by_index(ifindex as i32, new_name)
            .await
            .map_err(|e| e.with_context(format!("renaming {} to {}", name, new_name)))
    }

    /// Rename a network interface by index.
    pub async fn set_link_name_by_index(&self, ifindex: i32, new_name: &str) -> Result<()> {
        let mut builder = ack_request(NlMsgType::RTM_SETLINK);
        builder.append(&IfInfoMsg::new().with_index(ifindex));
        builder.append_attr_str(IflaAttr::Ifname as u16, new_name);
        self.request_ack(builder, "renaming link").await
    }

    /// Bring a network interface up.
    pub async fn set_link_up(&self, name: &str) -> Result<()> {
        let ifindex = ifname::index(name)?;
        self.set_link_state_by_index(ifindex as i32, true)
            .await
            .map_err(|e| e.with_context(format!("bringing up {}", name)))
    }

    /// Bring a network interface down.
    pub async fn set_link_down(&self, name: &str) -> Result<()> {
        let ifindex = ifname::index(name)?;
        self.set_link_state_by_index(ifindex as i32, false)
            .await
            .map_err(|e| e.with_context(format!("bringing down {}", name)))
    }

    /// Set the administrative state of an interface by index.
    pub async fn set_link_state_by_index(&self, ifindex: i32, up: bool) -> Result<()> {
        let mut ifinfo = IfInfoMsg::new().with_index(ifindex);
        ifinfo.ifi_flags = if up { iff::UP } else { 0 };
        ifinfo.ifi_change = iff::UP;

        let mut builder = ack_request(NlMsgType::RTM_SETLINK);
        builder.append(&ifinfo);
        self.request_ack(builder, "setting link state").await
    }

    /// Move an existing interface into another network namespace.
    ///
    /// Used for devices that must be created in the host namespace first
    /// because their parent lives there.
    pub async fn set_link_netns(&self, name: &str, ns: NetnsRef) -> Result<()> {
        let ifindex = ifname::index(name)?;
        self.set_link_netns_by_index(ifindex as i32, ns)
            .await
            .map_err(|e| e.with_context(format!("moving {} to namespace", name)))
    }

    /// Move an interface into another namespace by index.
    pub async fn set_link_netns_by_index(&self, ifindex: i32, ns: NetnsRef) -> Result<()> {
        let mut builder = ack_request(NlMsgType::RTM_SETLINK);
        builder.append(&IfInfoMsg::new().with_index(ifindex));
        match ns {
            NetnsRef::Pid(pid) => builder.append_attr_u32(IflaAttr::NetNsPid as u16, pid),
            NetnsRef::Fd(fd) => builder.append_attr_u32(IflaAttr::NetNsFd as u16, fd as u32),
        }
        self.request_ack(builder, "moving link to namespace").await
    }
}
