//! Namespace identifier queries (RTM_GETNSID).
//!
//! The kernel assigns each peered network namespace an integer id. The
//! runtime queries it to address a container's namespace in later
//! requests and to report it to the monitor. Kernels before 4.0 do not
//! implement the query; that case is surfaced as a distinguished
//! [`Error::NotSupported`] so callers can fall back to identifying the
//! namespace by device inode instead.

use tracing::debug;

use super::attr::Attr;
use super::builder::MessageBuilder;
use super::connection::Connection;
use super::error::{Error, Result};
use super::message::{Frame, NLM_F_REQUEST, NlMsgType};
use super::namespace::NetnsRef;
use super::reply::Reply;
use super::socket::Transport;
use super::types::nsid::{IFLA_IF_NETNSID, IFLA_NEW_NETNSID, RtGenMsg, netnsa};

impl<T: Transport> Connection<T> {
    /// Query the kernel-assigned id of a network namespace.
    ///
    /// Returns the id as reported by the kernel: non-negative once an id
    /// has been assigned, -1 if the namespace has no id yet.
    ///
    /// # Errors
    ///
    /// [`Error::NotSupported`] on kernels without namespace id queries;
    /// any other rejection carries the kernel errno.
    pub async fn namespace_id(&self, target: NetnsRef) -> Result<i32> {
        let mut builder = MessageBuilder::new(NlMsgType::RTM_GETNSID, NLM_F_REQUEST);
        builder.append(&RtGenMsg::new());
        match target {
            NetnsRef::Pid(pid) => builder.append_attr_u32(netnsa::PID, pid),
            NetnsRef::Fd(fd) => builder.append_attr_u32(netnsa::FD, fd as u32),
        }

        let frames = match self.request(builder).await? {
            Reply::Rejected { errno } if errno == libc::EOPNOTSUPP => {
                return Err(Error::NotSupported(
                    "namespace id queries (RTM_GETNSID)".into(),
                ));
            }
            Reply::Rejected { errno } => {
                return Err(Error::from_errno_with_context(
                    -errno,
                    "querying namespace id",
                ));
            }
            Reply::Ack => {
                return Err(Error::InvalidMessage(
                    "namespace id reply carried no data".into(),
                ));
            }
            Reply::Data { frames } => frames,
        };

        let nsid = extract_nsid(&frames)?;
        debug!(?target, nsid, "resolved namespace id");
        Ok(nsid)
    }
}

/// Pull the namespace id attribute out of a reply.
///
/// Kernels have used two tags for it over time; accept either.
fn extract_nsid(frames: &[Frame]) -> Result<i32> {
    for frame in frames {
        if frame.header.nlmsg_type != NlMsgType::RTM_NEWNSID {
            continue;
        }
        let attr_region = frame
            .payload
            .get(RtGenMsg::padded_size()..)
            .ok_or(Error::Truncated {
                expected: RtGenMsg::padded_size(),
                actual: frame.payload.len(),
            })?;

        for attr in Attr::parse_all(attr_region)? {
            if attr.kind == IFLA_NEW_NETNSID || attr.kind == IFLA_IF_NETNSID {
                return attr.as_i32();
            }
        }
    }

    Err(Error::InvalidMessage(
        "namespace id attribute missing from reply".into(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::netlink::fixtures::{MockTransport, errno_frame, nsid_frame};
    use crate::netlink::message::{NLMSG_HDRLEN, NlMsgHdr};

    const PORT: u32 = 4242;

    #[tokio::test]
    async fn resolves_an_assigned_id() {
        let transport = MockTransport::new(PORT);
        transport.push_reply(nsid_frame(1, PORT, IFLA_NEW_NETNSID, 3));
        let conn = Connection::with_transport(transport);

        let nsid = conn.namespace_id(NetnsRef::Pid(4321)).await.unwrap();
        assert_eq!(nsid, 3);

        // The request carried the pid reference after the rtgenmsg header.
        let sent = conn.transport().sent();
        let header = NlMsgHdr::from_bytes(&sent[0]).unwrap();
        assert_eq!(header.nlmsg_type, NlMsgType::RTM_GETNSID);
        let attrs =
            Attr::parse_all(&sent[0][NLMSG_HDRLEN + RtGenMsg::padded_size()..]).unwrap();
        assert_eq!(
            Attr::find(&attrs, netnsa::PID).unwrap().as_u32().unwrap(),
            4321
        );
    }

    #[tokio::test]
    async fn accepts_the_alternate_id_tag() {
        let transport = MockTransport::new(PORT);
        transport.push_reply(nsid_frame(1, PORT, IFLA_IF_NETNSID, 12));
        let conn = Connection::with_transport(transport);

        assert_eq!(conn.namespace_id(NetnsRef::Fd(7)).await.unwrap(), 12);
    }

    #[tokio::test]
    async fn unassigned_namespace_reports_minus_one() {
        let transport = MockTransport::new(PORT);
        transport.push_reply(nsid_frame(1, PORT, IFLA_NEW_NETNSID, -1));
        let conn = Connection::with_transport(transport);

        assert_eq!(conn.namespace_id(NetnsRef::Fd(7)).await.unwrap(), -1);
    }

    #[tokio::test]
    async fn unsupported_kernels_are_distinguished() {
        let transport = MockTransport::new(PORT);
        transport.push_reply(errno_frame(1, PORT, libc::EOPNOTSUPP));
        let conn = Connection::with_transport(transport);

        let err = conn.namespace_id(NetnsRef::Pid(4321)).await.unwrap_err();
        assert!(matches!(err, Error::NotSupported(_)));
        assert!(err.is_not_supported());
    }

    #[tokio::test]
    async fn other_rejections_carry_the_errno() {
        let transport = MockTransport::new(PORT);
        transport.push_reply(errno_frame(1, PORT, libc::EPERM));
        let conn = Connection::with_transport(transport);

        let err = conn.namespace_id(NetnsRef::Pid(4321)).await.unwrap_err();
        assert_eq!(err.errno(), Some(libc::EPERM));
        assert!(!err.is_not_supported());
    }

    #[tokio::test]
    async fn reply_without_the_id_attribute_is_invalid() {
        let transport = MockTransport::new(PORT);
        // An RTM_NEWNSID frame whose only attribute is an unrelated tag.
        transport.push_reply(nsid_frame(1, PORT, 900, 3));
        let conn = Connection::with_transport(transport);

        let err = conn.namespace_id(NetnsRef::Fd(7)).await.unwrap_err();
        assert!(matches!(err, Error::InvalidMessage(_)));
    }
}
