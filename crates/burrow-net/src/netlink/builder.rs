//! Request message construction.

use zerocopy::{Immutable, IntoBytes};

use super::attr::{NLA_F_NESTED, NlAttr, nla_align};
use super::message::{NLMSG_HDRLEN, NlMsgHdr, nlmsg_align};

/// Token returned when starting a nested attribute.
/// Used to finalize the nested attribute length.
#[derive(Debug, Clone, Copy)]
pub struct NestToken {
    /// Offset of the nested attribute header in the buffer.
    offset: usize,
}

/// Builder for netlink request messages.
///
/// Appends attributes after the fixed header(s), keeping every attribute
/// and the finished message padded to the protocol's 4-byte alignment.
/// `finish()` patches the total length into the header.
#[derive(Debug, Clone)]
pub struct MessageBuilder {
    buf: Vec<u8>,
}

impl MessageBuilder {
    /// Create a new message builder with the given type and flags.
    pub fn new(msg_type: u16, flags: u16) -> Self {
        let header = NlMsgHdr::new(msg_type, flags);
        let mut buf = vec![0u8; NLMSG_HDRLEN];
        buf[..std::mem::size_of::<NlMsgHdr>()].copy_from_slice(header.as_bytes());
        Self { buf }
    }

    /// Get the current message length.
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// Check if the message is empty (header only).
    pub fn is_empty(&self) -> bool {
        self.buf.len() == NLMSG_HDRLEN
    }

    /// Append raw bytes to the message (with alignment padding).
    pub fn append_bytes(&mut self, data: &[u8]) {
        self.buf.extend_from_slice(data);
        let aligned = nlmsg_align(self.buf.len());
        self.buf.resize(aligned, 0);
    }

    /// Append a fixed-layout struct (e.g. ifinfomsg, rtgenmsg) to the
    /// message, padded to alignment.
    pub fn append<T: IntoBytes + Immutable>(&mut self, data: &T) {
        self.append_bytes(data.as_bytes());
    }

    /// Append an attribute with the given type and payload.
    pub fn append_attr(&mut self, attr_type: u16, data: &[u8]) {
        let attr = NlAttr::new(attr_type, data.len());
        self.buf.extend_from_slice(attr.as_bytes());
        self.buf.extend_from_slice(data);
        let aligned = nla_align(self.buf.len());
        self.buf.resize(aligned, 0);
    }

    /// Append a u8 attribute.
    pub fn append_attr_u8(&mut self, attr_type: u16, value: u8) {
        self.append_attr(attr_type, &[value]);
    }

    /// Append a u16 attribute (native endian).
    pub fn append_attr_u16(&mut self, attr_type: u16, value: u16) {
        self.append_attr(attr_type, &value.to_ne_bytes());
    }

    /// Append a u32 attribute (native endian).
    pub fn append_attr_u32(&mut self, attr_type: u16, value: u32) {
        self.append_attr(attr_type, &value.to_ne_bytes());
    }

    /// Append a null-terminated string attribute.
    pub fn append_attr_str(&mut self, attr_type: u16, value: &str) {
        let mut data = value.as_bytes().to_vec();
        data.push(0);
        self.append_attr(attr_type, &data);
    }

    /// Start a nested attribute whose payload is an attribute list.
    /// Returns a token to finalize it with [`nest_end`](Self::nest_end).
    pub fn nest_start(&mut self, attr_type: u16) -> NestToken {
        self.envelope_start(attr_type | NLA_F_NESTED)
    }

    /// Start a length-prefixed envelope without the nested flag.
    ///
    /// Some kind-specific containers (e.g. a veth peer block) carry a
    /// fixed struct before their attributes, so their payload is not a
    /// plain attribute list and must not be flagged as one.
    pub fn envelope_start(&mut self, attr_type: u16) -> NestToken {
        let offset = self.buf.len();
        let attr = NlAttr::new(attr_type, 0);
        self.buf.extend_from_slice(attr.as_bytes());
        NestToken { offset }
    }

    /// End a container started with `nest_start` or `envelope_start`.
    pub fn nest_end(&mut self, token: NestToken) {
        let len = self.buf.len() - token.offset;
        let len_bytes = (len as u16).to_ne_bytes();
        self.buf[token.offset] = len_bytes[0];
        self.buf[token.offset + 1] = len_bytes[1];
        let aligned = nla_align(self.buf.len());
        self.buf.resize(aligned, 0);
    }

    /// Set the sequence number.
    pub fn set_seq(&mut self, seq: u32) {
        self.buf[8..12].copy_from_slice(&seq.to_ne_bytes());
    }

    /// Set the originating port ID.
    pub fn set_pid(&mut self, pid: u32) {
        self.buf[12..16].copy_from_slice(&pid.to_ne_bytes());
    }

    /// Finalize and return the message bytes.
    pub fn finish(mut self) -> Vec<u8> {
        let len = self.buf.len() as u32;
        self.buf[0..4].copy_from_slice(&len.to_ne_bytes());
        self.buf
    }

    /// Get the current buffer for inspection.
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::netlink::attr::{Attr, AttrValue, NLA_HDRLEN};
    use crate::netlink::message::{NLM_F_REQUEST, NlMsgType};

    #[test]
    fn header_only_message() {
        let msg = MessageBuilder::new(NlMsgType::RTM_GETLINK, NLM_F_REQUEST).finish();
        assert_eq!(msg.len(), NLMSG_HDRLEN);

        let header = NlMsgHdr::from_bytes(&msg).unwrap();
        assert_eq!(header.nlmsg_len as usize, NLMSG_HDRLEN);
        assert_eq!(header.nlmsg_type, NlMsgType::RTM_GETLINK);
        assert_eq!(header.nlmsg_flags, NLM_F_REQUEST);
    }

    #[test]
    fn length_field_tracks_content() {
        let mut builder = MessageBuilder::new(NlMsgType::RTM_NEWLINK, NLM_F_REQUEST);
        builder.append_attr_u32(1, 0x12345678);
        builder.append_attr_str(3, "eth0");
        let msg = builder.finish();

        let header = NlMsgHdr::from_bytes(&msg).unwrap();
        assert_eq!(header.nlmsg_len as usize, msg.len());
    }

    #[test]
    fn messages_are_aligned() {
        // Payload sizes chosen to land on every alignment residue.
        for pad in 0..8usize {
            let mut builder = MessageBuilder::new(NlMsgType::RTM_NEWLINK, NLM_F_REQUEST);
            builder.append_attr(1, &vec![0u8; pad]);
            let msg = builder.finish();
            assert_eq!(msg.len() % 4, 0, "payload of {} bytes", pad);
        }
    }

    #[test]
    fn nested_attribute_decodes_as_container() {
        let mut builder = MessageBuilder::new(NlMsgType::RTM_NEWLINK, NLM_F_REQUEST);
        let nest = builder.nest_start(18);
        builder.append_attr_str(1, "veth");
        builder.nest_end(nest);
        let msg = builder.finish();

        let attrs = Attr::parse_all(&msg[NLMSG_HDRLEN..]).unwrap();
        assert_eq!(attrs.len(), 1);
        assert_eq!(attrs[0].kind, 18);
        match &attrs[0].value {
            AttrValue::Nested(children) => {
                assert_eq!(children[0].as_str().unwrap(), "veth");
            }
            AttrValue::Bytes(_) => panic!("container not flagged as nested"),
        }
    }

    #[test]
    fn envelope_is_opaque_to_the_decoder() {
        let mut builder = MessageBuilder::new(NlMsgType::RTM_NEWLINK, NLM_F_REQUEST);
        let envelope = builder.envelope_start(1);
        builder.append_bytes(&[0u8; 16]);
        builder.nest_end(envelope);
        let msg = builder.finish();

        let attrs = Attr::parse_all(&msg[NLMSG_HDRLEN..]).unwrap();
        assert!(matches!(attrs[0].value, AttrValue::Bytes(_)));
        assert_eq!(attrs[0].kind, 1);
    }

    #[test]
    fn seq_and_pid_are_patched_in_place() {
        let mut builder = MessageBuilder::new(NlMsgType::RTM_NEWLINK, NLM_F_REQUEST);
        builder.append_attr_u32(4, 1500);
        builder.set_seq(99);
        builder.set_pid(1234);
        let msg = builder.finish();

        let header = NlMsgHdr::from_bytes(&msg).unwrap();
        assert_eq!(header.nlmsg_seq, 99);
        assert_eq!(header.nlmsg_pid, 1234);
    }

    #[test]
    fn empty_attr_is_header_only() {
        let mut builder = MessageBuilder::new(NlMsgType::RTM_NEWLINK, NLM_F_REQUEST);
        builder.append_attr(7, &[]);
        let msg = builder.finish();
        assert_eq!(msg.len(), NLMSG_HDRLEN + NLA_HDRLEN);
    }
}
