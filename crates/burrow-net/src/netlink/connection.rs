//! Request/reply handling on top of a [`Transport`].

use std::os::unix::io::RawFd;
use std::path::Path;
use std::time::Duration;

use tracing::trace;

use super::builder::MessageBuilder;
use super::error::{Error, Result};
use super::message::{
    Frame, MessageIter, NLM_F_ACK, NLM_F_CREATE, NLM_F_EXCL, NLM_F_REQUEST, NlMsgType,
};
use super::reply::Reply;
use super::socket::{NetlinkSocket, Transport};

/// Default deadline for a single request/reply round trip.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// A request/reply connection over one netlink socket.
///
/// Each request is stamped with the socket's next sequence number and the
/// local port id; the reply is reassembled (multipart replies end with a
/// DONE frame), classified, and returned as a typed [`Reply`]. Frames that
/// belong to other requesters are discarded.
///
/// A connection is one requester: issue requests one at a time, and give
/// each concurrent provisioning flow its own connection.
pub struct Connection<T = NetlinkSocket> {
    transport: T,
    timeout: Duration,
}

impl Connection<NetlinkSocket> {
    /// Open a connection in the current network namespace.
    pub fn new() -> Result<Self> {
        Ok(Self::with_transport(NetlinkSocket::new()?))
    }

    /// Open a connection whose socket lives in the namespace behind `ns_fd`.
    ///
    /// Use this for follow-up steps (rename, bring up) that must address a
    /// device already placed into a container's namespace.
    pub fn in_namespace(ns_fd: RawFd) -> Result<Self> {
        Ok(Self::with_transport(NetlinkSocket::new_in_namespace(
            ns_fd,
        )?))
    }

    /// Open a connection for the namespace file at `ns_path`.
    pub fn in_namespace_path<P: AsRef<Path>>(ns_path: P) -> Result<Self> {
        Ok(Self::with_transport(NetlinkSocket::new_in_namespace_path(
            ns_path,
        )?))
    }
}

impl<T: Transport> Connection<T> {
    /// Build a connection over an existing transport.
    pub fn with_transport(transport: T) -> Self {
        Self {
            transport,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Replace the per-request deadline (default 5 seconds).
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Get the underlying transport.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Send a request and classify its reply.
    pub async fn request(&self, mut builder: MessageBuilder) -> Result<Reply> {
        let seq = self.transport.next_seq();
        builder.set_seq(seq);
        builder.set_pid(self.transport.port_id());

        let msg = builder.finish();
        trace!(seq, len = msg.len(), "sending request");
        self.transport.send(&msg).await?;

        let frames = self.receive_reply(seq).await?;
        Reply::classify(frames)
    }

    /// Send a request that must be answered with a plain acknowledgement.
    ///
    /// `operation` names the step for error context ("creating veth pair
    /// veth0/veth1"), so a rejection tells the caller what to roll back.
    pub async fn request_ack(&self, builder: MessageBuilder, operation: &str) -> Result<()> {
        self.request(builder).await?.expect_ack(operation)
    }

    /// Collect the frames answering `seq`, within the configured deadline.
    ///
    /// A reply is complete when a DONE frame arrives (multipart) or when a
    /// single frame without the multipart flag matches the sequence number
    /// and our port id. Frames addressed to other sequence numbers or
    /// ports are foreign traffic and are dropped.
    async fn receive_reply(&self, seq: u32) -> Result<Vec<Frame>> {
        let deadline = tokio::time::Instant::now() + self.timeout;
        let mut frames = Vec::new();

        loop {
            let datagram = tokio::time::timeout_at(deadline, self.transport.recv())
                .await
                .map_err(|_| Error::Timeout {
                    seq,
                    timeout: self.timeout,
                })??;

            for result in MessageIter::new(&datagram) {
                let (header, payload) = result?;

                if header.nlmsg_seq != seq || header.nlmsg_pid != self.transport.port_id() {
                    trace!(
                        seq = header.nlmsg_seq,
                        pid = header.nlmsg_pid,
                        "discarding foreign frame"
                    );
                    continue;
                }

                if header.nlmsg_type == NlMsgType::NOOP {
                    continue;
                }
                if header.is_done() {
                    return Ok(frames);
                }

                let multi = header.is_multi();
                frames.push(Frame {
                    header: *header,
                    payload: payload.to_vec(),
                });
                if !multi {
                    return Ok(frames);
                }
            }
        }
    }
}

/// Helper to build a request expecting an ACK.
pub fn ack_request(msg_type: u16) -> MessageBuilder {
    MessageBuilder::new(msg_type, NLM_F_REQUEST | NLM_F_ACK)
}

/// Helper to build an exclusive create request.
pub fn create_request(msg_type: u16) -> MessageBuilder {
    MessageBuilder::new(msg_type, NLM_F_REQUEST | NLM_F_ACK | NLM_F_CREATE | NLM_F_EXCL)
}
