//! Test fixtures: a replay transport and canned reply frames.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};

use super::builder::MessageBuilder;
use super::error::{Error, Result};
use super::message::{NLM_F_MULTI, NlMsgError, NlMsgHdr, NlMsgType};
use super::socket::Transport;

/// A transport that records sent requests and replays canned replies.
pub(crate) struct MockTransport {
    port: u32,
    seq: AtomicU32,
    sent: Mutex<Vec<Vec<u8>>>,
    replies: Mutex<VecDeque<Vec<u8>>>,
}

impl MockTransport {
    pub(crate) fn new(port: u32) -> Self {
        Self {
            port,
            seq: AtomicU32::new(1),
            sent: Mutex::new(Vec::new()),
            replies: Mutex::new(VecDeque::new()),
        }
    }

    /// Queue a datagram to be returned by the next `recv`.
    pub(crate) fn push_reply(&self, datagram: Vec<u8>) {
        self.replies.lock().unwrap().push_back(datagram);
    }

    /// Requests sent so far, in order.
    pub(crate) fn sent(&self) -> Vec<Vec<u8>> {
        self.sent.lock().unwrap().clone()
    }
}

impl Transport for MockTransport {
    fn next_seq(&self) -> u32 {
        self.seq.fetch_add(1, Ordering::Relaxed)
    }

    fn port_id(&self) -> u32 {
        self.port
    }

    async fn send(&self, msg: &[u8]) -> Result<()> {
        self.sent.lock().unwrap().push(msg.to_vec());
        Ok(())
    }

    async fn recv(&self) -> Result<Vec<u8>> {
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| Error::InvalidMessage("mock transport ran out of replies".into()))
    }
}

/// A transport whose `recv` never completes, for deadline tests.
pub(crate) struct PendingTransport {
    port: u32,
    seq: AtomicU32,
}

impl PendingTransport {
    pub(crate) fn new(port: u32) -> Self {
        Self {
            port,
            seq: AtomicU32::new(1),
        }
    }
}

impl Transport for PendingTransport {
    fn next_seq(&self) -> u32 {
        self.seq.fetch_add(1, Ordering::Relaxed)
    }

    fn port_id(&self) -> u32 {
        self.port
    }

    async fn send(&self, _msg: &[u8]) -> Result<()> {
        Ok(())
    }

    async fn recv(&self) -> Result<Vec<u8>> {
        std::future::pending().await
    }
}

/// An ERROR frame with code zero: an acknowledgement.
pub(crate) fn ack_frame(seq: u32, port: u32) -> Vec<u8> {
    errno_frame(seq, port, 0)
}

/// An ERROR frame carrying `-errno`, echoing a fake original header.
pub(crate) fn errno_frame(seq: u32, port: u32, errno: i32) -> Vec<u8> {
    let mut echoed = NlMsgHdr::new(NlMsgType::RTM_NEWLINK, 0);
    echoed.nlmsg_seq = seq;

    let mut builder = MessageBuilder::new(NlMsgType::ERROR, 0);
    builder.set_seq(seq);
    builder.set_pid(port);
    builder.append(&NlMsgError {
        error: -errno,
        msg: echoed,
    });
    builder.finish()
}

/// A DONE frame terminating a multipart reply.
pub(crate) fn done_frame(seq: u32, port: u32) -> Vec<u8> {
    let mut builder = MessageBuilder::new(NlMsgType::DONE, NLM_F_MULTI);
    builder.set_seq(seq);
    builder.set_pid(port);
    builder.append_bytes(&0i32.to_ne_bytes());
    builder.finish()
}

/// A data frame with an arbitrary payload.
pub(crate) fn data_frame(seq: u32, port: u32, multi: bool, payload: &[u8]) -> Vec<u8> {
    let flags = if multi { NLM_F_MULTI } else { 0 };
    let mut builder = MessageBuilder::new(NlMsgType::RTM_NEWLINK, flags);
    builder.set_seq(seq);
    builder.set_pid(port);
    builder.append_bytes(payload);
    builder.finish()
}

/// An RTM_NEWNSID reply carrying the id under the given tag.
pub(crate) fn nsid_frame(seq: u32, port: u32, tag: u16, nsid: i32) -> Vec<u8> {
    let mut builder = MessageBuilder::new(NlMsgType::RTM_NEWNSID, 0);
    builder.set_seq(seq);
    builder.set_pid(port);
    builder.append(&super::types::nsid::RtGenMsg::new());
    builder.append_attr(tag, &nsid.to_ne_bytes());
    builder.finish()
}
