//! Reply classification.

use super::error::{Error, Result};
use super::message::{Frame, NlMsgError};

/// A classified reply to one request.
#[derive(Debug)]
pub enum Reply {
    /// Acknowledgement: an ERROR frame with code zero.
    Ack,
    /// The kernel refused the request; carries the positive errno.
    Rejected {
        /// Positive errno value.
        errno: i32,
    },
    /// Data-bearing reply (one frame, or several for multipart).
    Data {
        /// The frames addressed to the request, in arrival order.
        frames: Vec<Frame>,
    },
}

impl Reply {
    /// Classify the reassembled frames of one reply.
    ///
    /// An ERROR frame's embedded code of zero means success; a multipart
    /// reply that ended with DONE and carried nothing is an empty data
    /// reply.
    pub fn classify(frames: Vec<Frame>) -> Result<Self> {
        let is_error = matches!(frames.first(), Some(first) if first.header.is_error());
        if !is_error {
            return Ok(Reply::Data { frames });
        }

        let err = NlMsgError::from_bytes(&frames[0].payload)?;
        if err.is_ack() {
            Ok(Reply::Ack)
        } else {
            Ok(Reply::Rejected { errno: -err.error })
        }
    }

    /// Require an acknowledgement, attaching `operation` to any rejection.
    pub fn expect_ack(self, operation: &str) -> Result<()> {
        match self {
            Reply::Ack => Ok(()),
            Reply::Rejected { errno } => Err(Error::from_errno_with_context(-errno, operation)),
            Reply::Data { .. } => Err(Error::InvalidMessage(format!(
                "{}: expected acknowledgement, got data reply",
                operation
            ))),
        }
    }

    /// Require a data reply, attaching `operation` to any rejection.
    pub fn into_frames(self, operation: &str) -> Result<Vec<Frame>> {
        match self {
            Reply::Ack => Ok(Vec::new()),
            Reply::Rejected { errno } => Err(Error::from_errno_with_context(-errno, operation)),
            Reply::Data { frames } => Ok(frames),
        }
    }
}
