//! Netlink protocol client for network provisioning.
//!
//! This module implements the rtnetlink request/reply protocol from
//! scratch: message and attribute codec, a sequence-stamped transport
//! over a dedicated socket, reply classification, and the device
//! provisioning and namespace-id operations the runtime builds on.
//!
//! # Quick Start
//!
//! ```ignore
//! use burrow_net::netlink::Connection;
//! use burrow_net::netlink::namespace::NetnsRef;
//! use burrow_net::netlink::provision::{DevicePlan, VethConfig};
//!
//! let conn = Connection::new()?;
//!
//! // Create a veth pair with the peer end inside the container.
//! let plan = DevicePlan::veth(
//!     VethConfig::new("veth0", "veth1").peer_netns(NetnsRef::Pid(container_pid)),
//! );
//! let created = conn.provision(&plan).await?;
//!
//! // Ask the kernel for the container namespace's id.
//! let nsid = conn.namespace_id(NetnsRef::Pid(container_pid)).await?;
//! ```
//!
//! Each [`Connection`] owns one socket and serves one request at a time;
//! concurrent provisioning flows should each open their own. Failures
//! carry the failing step and the devices already created, and nothing
//! is retried or rolled back internally — that policy belongs to the
//! orchestrator driving this module.

pub mod attr;
mod builder;
pub mod connection;
mod error;
#[cfg(test)]
mod fixtures;
pub mod message;
pub mod namespace;
pub mod nsid;
pub mod provision;
pub mod reply;
mod socket;
pub mod types;

pub use attr::{Attr, AttrValue, NlAttr};
pub use builder::{MessageBuilder, NestToken};
pub use connection::Connection;
pub use error::{Error, Result};
pub use message::{Frame, MessageIter, NLMSG_HDRLEN, NlMsgHdr, NlMsgType};
pub use namespace::{NamespaceFd, NetnsRef};
pub use provision::{
    DevicePlan, LinkConfig, MacvlanConfig, MacvlanMode, ProvisionError, ProvisionStep, VethConfig,
};
pub use reply::Reply;
pub use socket::{NetlinkSocket, Transport};
