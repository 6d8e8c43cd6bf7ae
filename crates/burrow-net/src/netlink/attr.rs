//! Netlink attribute (nlattr/rtattr) encoding and strict decoding.
//!
//! Received attribute regions are decoded into a recursive [`Attr`] tree:
//! every attribute carries a type tag and either raw payload bytes or, when
//! the nested flag is set, a list of sub-attributes. Unknown tags are kept
//! opaquely; malformed lengths fail decoding instead of being skipped, so a
//! corrupt reply can never cause an out-of-bounds walk.

use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

use super::error::{Error, Result};

/// Netlink attribute alignment.
pub const NLA_ALIGNTO: usize = 4;

/// Align a length to NLA_ALIGNTO boundary.
#[inline]
pub const fn nla_align(len: usize) -> usize {
    (len + NLA_ALIGNTO - 1) & !(NLA_ALIGNTO - 1)
}

/// Size of the attribute header.
pub const NLA_HDRLEN: usize = 4; // nla_align(size_of::<NlAttr>())

/// Netlink attribute header (mirrors struct nlattr / struct rtattr).
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, FromBytes, IntoBytes, Immutable, KnownLayout)]
pub struct NlAttr {
    /// Length including header.
    pub nla_len: u16,
    /// Attribute type.
    pub nla_type: u16,
}

/// Attribute type flags.
pub const NLA_F_NESTED: u16 = 1 << 15;
pub const NLA_F_NET_BYTEORDER: u16 = 1 << 14;
pub const NLA_TYPE_MASK: u16 = !(NLA_F_NESTED | NLA_F_NET_BYTEORDER);

impl NlAttr {
    /// Create a new attribute header.
    pub fn new(attr_type: u16, data_len: usize) -> Self {
        Self {
            nla_len: (NLA_HDRLEN + data_len) as u16,
            nla_type: attr_type,
        }
    }

    /// Get the attribute type without flags.
    pub fn kind(&self) -> u16 {
        self.nla_type & NLA_TYPE_MASK
    }

    /// Check if this attribute's payload is itself an attribute list.
    pub fn is_nested(&self) -> bool {
        self.nla_type & NLA_F_NESTED != 0
    }

    /// Convert to bytes.
    pub fn as_bytes(&self) -> &[u8] {
        <Self as IntoBytes>::as_bytes(self)
    }

    /// Parse from the start of a buffer.
    pub fn from_bytes(data: &[u8]) -> Result<&Self> {
        Self::ref_from_prefix(data)
            .map(|(r, _)| r)
            .map_err(|_| Error::Truncated {
                expected: std::mem::size_of::<Self>(),
                actual: data.len(),
            })
    }
}

/// Payload of a decoded attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttrValue {
    /// Raw value bytes, kept verbatim for unknown or scalar tags.
    Bytes(Vec<u8>),
    /// Sub-attributes of a nested container.
    Nested(Vec<Attr>),
}

/// A decoded netlink attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attr {
    /// Type tag with flag bits stripped.
    pub kind: u16,
    /// Decoded payload.
    pub value: AttrValue,
}

impl Attr {
    /// Attribute with raw payload bytes.
    pub fn bytes(kind: u16, value: impl Into<Vec<u8>>) -> Self {
        Self {
            kind,
            value: AttrValue::Bytes(value.into()),
        }
    }

    /// Attribute holding a native-endian u32.
    pub fn u32(kind: u16, value: u32) -> Self {
        Self::bytes(kind, value.to_ne_bytes().to_vec())
    }

    /// Attribute holding a null-terminated string.
    pub fn string(kind: u16, value: &str) -> Self {
        let mut data = value.as_bytes().to_vec();
        data.push(0);
        Self::bytes(kind, data)
    }

    /// Nested container attribute.
    pub fn nested(kind: u16, children: Vec<Attr>) -> Self {
        Self {
            kind,
            value: AttrValue::Nested(children),
        }
    }

    /// Decode an attribute region into a tree.
    ///
    /// Every declared length is checked against the remaining buffer before
    /// the payload is touched, and nested containers are decoded
    /// recursively under the same rule. Trailing bytes that cannot form an
    /// attribute header are rejected.
    pub fn parse_all(data: &[u8]) -> Result<Vec<Attr>> {
        let mut rest = data;
        let mut attrs = Vec::new();

        while !rest.is_empty() {
            if rest.len() < NLA_HDRLEN {
                return Err(Error::MalformedAttribute(format!(
                    "{} trailing bytes after last attribute",
                    rest.len()
                )));
            }

            let header = NlAttr::from_bytes(rest)?;
            let len = header.nla_len as usize;
            if len < NLA_HDRLEN {
                return Err(Error::MalformedAttribute(format!(
                    "declared attribute length {} is shorter than its header",
                    len
                )));
            }
            if len > rest.len() {
                return Err(Error::MalformedAttribute(format!(
                    "declared attribute length {} overruns remaining buffer of {} bytes",
                    len,
                    rest.len()
                )));
            }

            let payload = &rest[NLA_HDRLEN..len];
            let value = if header.is_nested() {
                AttrValue::Nested(Self::parse_all(payload)?)
            } else {
                AttrValue::Bytes(payload.to_vec())
            };
            attrs.push(Attr {
                kind: header.kind(),
                value,
            });

            // The final attribute may omit its trailing padding.
            let advance = nla_align(len).min(rest.len());
            rest = &rest[advance..];
        }

        Ok(attrs)
    }

    /// Encode a list of attributes, the inverse of [`Attr::parse_all`].
    pub fn encode_all(attrs: &[Attr]) -> Vec<u8> {
        let mut buf = Vec::new();
        for attr in attrs {
            attr.encode_into(&mut buf);
        }
        buf
    }

    /// Append this attribute (and any nested children) to a buffer.
    pub fn encode_into(&self, buf: &mut Vec<u8>) {
        let start = buf.len();
        let (flag, payload_len) = match &self.value {
            AttrValue::Bytes(bytes) => (0, bytes.len()),
            AttrValue::Nested(_) => (NLA_F_NESTED, 0),
        };
        buf.extend_from_slice(NlAttr::new(self.kind | flag, payload_len).as_bytes());

        match &self.value {
            AttrValue::Bytes(bytes) => buf.extend_from_slice(bytes),
            AttrValue::Nested(children) => {
                for child in children {
                    child.encode_into(buf);
                }
                // Patch the container length now that the children are in.
                let total = (buf.len() - start) as u16;
                buf[start..start + 2].copy_from_slice(&total.to_ne_bytes());
            }
        }

        buf.resize(nla_align(buf.len()), 0);
    }

    /// Find an attribute by type tag in a decoded list.
    pub fn find(attrs: &[Attr], kind: u16) -> Option<&Attr> {
        attrs.iter().find(|a| a.kind == kind)
    }

    /// Interpret the payload as a native-endian u32.
    pub fn as_u32(&self) -> Result<u32> {
        let data = self.raw()?;
        if data.len() < 4 {
            return Err(Error::MalformedAttribute(format!(
                "u32 attribute {} holds only {} bytes",
                self.kind,
                data.len()
            )));
        }
        Ok(u32::from_ne_bytes([data[0], data[1], data[2], data[3]]))
    }

    /// Interpret the payload as a native-endian i32.
    pub fn as_i32(&self) -> Result<i32> {
        self.as_u32().map(|v| v as i32)
    }

    /// Interpret the payload as a null-terminated string.
    pub fn as_str(&self) -> Result<&str> {
        let data = self.raw()?;
        let len = data.iter().position(|&b| b == 0).unwrap_or(data.len());
        std::str::from_utf8(&data[..len])
            .map_err(|e| Error::MalformedAttribute(format!("string attribute is not UTF-8: {}", e)))
    }

    fn raw(&self) -> Result<&[u8]> {
        match &self.value {
            AttrValue::Bytes(bytes) => Ok(bytes),
            AttrValue::Nested(_) => Err(Error::MalformedAttribute(format!(
                "attribute {} is a nested container, not a scalar",
                self.kind
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_tree() -> Vec<Attr> {
        vec![
            Attr::string(3, "veth0"),
            Attr::u32(4, 1500),
            Attr::nested(
                18,
                vec![
                    Attr::string(1, "veth"),
                    Attr::nested(2, vec![Attr::u32(1, 4)]),
                ],
            ),
            // Unknown tag with an odd-length payload to exercise padding.
            Attr::bytes(900, vec![0xaa, 0xbb, 0xcc]),
        ]
    }

    #[test]
    fn round_trip() {
        let tree = sample_tree();
        let encoded = Attr::encode_all(&tree);
        assert_eq!(Attr::parse_all(&encoded).unwrap(), tree);
    }

    #[test]
    fn encoding_is_aligned() {
        for attr in sample_tree() {
            let mut buf = Vec::new();
            attr.encode_into(&mut buf);
            assert_eq!(buf.len() % NLA_ALIGNTO, 0, "attr {} unaligned", attr.kind);
        }
        assert_eq!(Attr::encode_all(&sample_tree()).len() % NLA_ALIGNTO, 0);
    }

    #[test]
    fn empty_nested_container_round_trips() {
        let tree = vec![Attr::nested(18, Vec::new())];
        let encoded = Attr::encode_all(&tree);
        assert_eq!(Attr::parse_all(&encoded).unwrap(), tree);
    }

    #[test]
    fn length_overrun_is_rejected() {
        // Claims 64 bytes of payload but provides 4.
        let mut buf = NlAttr::new(1, 64).as_bytes().to_vec();
        buf.extend_from_slice(&[0u8; 4]);

        let err = Attr::parse_all(&buf).unwrap_err();
        assert!(matches!(err, Error::MalformedAttribute(_)));
    }

    #[test]
    fn nested_overrun_is_rejected() {
        // Outer container is fine; inner attribute overruns it.
        let mut inner = NlAttr::new(7, 32).as_bytes().to_vec();
        inner.extend_from_slice(&[0u8; 4]);
        let mut buf = NlAttr::new(2 | NLA_F_NESTED, inner.len()).as_bytes().to_vec();
        buf.extend_from_slice(&inner);

        let err = Attr::parse_all(&buf).unwrap_err();
        assert!(matches!(err, Error::MalformedAttribute(_)));
    }

    #[test]
    fn header_shorter_than_minimum_is_rejected() {
        let attr = NlAttr {
            nla_len: 2,
            nla_type: 1,
        };
        let err = Attr::parse_all(attr.as_bytes()).unwrap_err();
        assert!(matches!(err, Error::MalformedAttribute(_)));
    }

    #[test]
    fn truncated_buffers_never_panic() {
        let encoded = Attr::encode_all(&sample_tree());
        for cut in 0..encoded.len() {
            // Either parses (a prefix may be self-consistent) or errors;
            // must never read past the slice.
            let _ = Attr::parse_all(&encoded[..cut]);
        }
    }

    #[test]
    fn unknown_tags_are_preserved() {
        let tree = vec![Attr::bytes(0x3fff, vec![1, 2, 3, 4, 5])];
        let decoded = Attr::parse_all(&Attr::encode_all(&tree)).unwrap();
        assert_eq!(decoded, tree);
    }

    #[test]
    fn scalar_accessors() {
        let attr = Attr::u32(1, 0x12345678);
        assert_eq!(attr.as_u32().unwrap(), 0x12345678);

        let attr = Attr::string(3, "eth0");
        assert_eq!(attr.as_str().unwrap(), "eth0");

        let nested = Attr::nested(18, Vec::new());
        assert!(nested.as_u32().is_err());
    }
}
