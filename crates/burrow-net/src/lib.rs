//! Netlink-based network provisioning for the burrow container runtime.
//!
//! This crate gives the runtime its virtual network topology — veth
//! pairs spanning the host and container namespaces, macvlan devices on
//! host interfaces, and kernel namespace-id lookups — by speaking
//! rtnetlink directly instead of shelling out to `ip`.
//!
//! The orchestrator hands in device names, a kind, and a target
//! namespace reference (pid or open descriptor), and gets back either
//! the list of created devices or a typed failure plus the partial list
//! for teardown. No state persists between calls, and nothing is
//! retried internally.
//!
//! # Example
//!
//! ```ignore
//! use burrow_net::netlink::Connection;
//! use burrow_net::netlink::namespace::NetnsRef;
//! use burrow_net::netlink::provision::{DevicePlan, VethConfig};
//!
//! #[tokio::main]
//! async fn main() -> burrow_net::Result<()> {
//!     let conn = Connection::new()?;
//!     let plan = DevicePlan::veth(
//!         VethConfig::new("veth0", "veth1").peer_netns(NetnsRef::Pid(container_pid)),
//!     );
//!     match conn.provision(&plan).await {
//!         Ok(created) => println!("created {:?}", created),
//!         Err(partial) => {
//!             for name in &partial.created {
//!                 conn.del_link(name).await.ok();
//!             }
//!             return Err(partial.source);
//!         }
//!     }
//!     Ok(())
//! }
//! ```

pub mod netlink;
pub mod util;

// Re-export common types at crate root for convenience
pub use netlink::{Connection, Error, NetnsRef, Result};
