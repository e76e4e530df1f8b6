//! Netlink attribute (TLV) layout and decoding.
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │  Length (2 bytes) │  Type (2 bytes)     │  <- attribute header (4 bytes)
//! ├─────────────────────────────────────────┤
//! │  Value (variable length, padded to 4)   │
//! └─────────────────────────────────────────┘
//! ```
//!
//! The length covers the header and the value, but not the padding. A value may itself be a
//! chain of attributes, which is how nesting is expressed.

use bytes::{Buf, BufMut};

use crate::{align, constants::NLA_HDRLEN, ensure_len, Result};

/// The header of a single attribute (`struct rtattr`).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AttributeHeader {
    pub length: u16,
    pub kind: u16,
}

impl AttributeHeader {
    /// Returns the length of the header in bytes.
    #[inline]
    pub const fn len() -> usize {
        NLA_HDRLEN
    }

    pub fn parse(buf: &[u8]) -> Result<Self> {
        ensure_len(buf, NLA_HDRLEN)?;

        let mut buf = &buf[..NLA_HDRLEN];
        Ok(Self { length: buf.get_u16_ne(), kind: buf.get_u16_ne() })
    }

    pub fn emit(&self, buf: &mut [u8]) {
        let mut buf = &mut buf[..NLA_HDRLEN];
        buf.put_u16_ne(self.length);
        buf.put_u16_ne(self.kind);
    }
}

/// A decoded attribute, borrowing its value from the enclosing buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Attribute<'a> {
    /// Offset of the attribute header from the start of the chain it was decoded from.
    pub offset: usize,
    pub kind: u16,
    pub value: &'a [u8],
}

impl<'a> Attribute<'a> {
    /// Declared length of the attribute: header plus value, without padding.
    pub fn length(&self) -> usize {
        NLA_HDRLEN + self.value.len()
    }

    /// Decodes the value as a chain of nested attributes.
    pub fn nested(&self) -> Attributes<'a> {
        Attributes::new(self.value)
    }

    /// Decodes the value as a native-endian `u32`.
    pub fn as_u32(&self) -> Result<u32> {
        ensure_len(self.value, 4)?;
        Ok((&self.value[..4]).get_u32_ne())
    }

    /// Decodes the value as a string, dropping the trailing NUL if present.
    pub fn as_str(&self) -> Option<&'a str> {
        let value = self.value.strip_suffix(&[0]).unwrap_or(self.value);
        std::str::from_utf8(value).ok()
    }
}

/// Iterator over a chain of attributes.
///
/// Iteration stops at the first header that does not fit in the remaining bytes, like the
/// kernel's `RTA_OK` macro.
#[derive(Debug, Clone)]
pub struct Attributes<'a> {
    buf: &'a [u8],
    offset: usize,
}

impl<'a> Attributes<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, offset: 0 }
    }

    /// Finds the first attribute of the given kind in the chain.
    pub fn get(mut self, kind: u16) -> Option<Attribute<'a>> {
        self.find(|attr| attr.kind == kind)
    }
}

impl<'a> Iterator for Attributes<'a> {
    type Item = Attribute<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let remaining = self.buf.get(self.offset..)?;
        let header = AttributeHeader::parse(remaining).ok()?;

        let length = header.length as usize;
        if length < NLA_HDRLEN || length > remaining.len() {
            tracing::trace!(length, remaining = remaining.len(), "malformed attribute, stopping");
            return None;
        }

        let attr = Attribute {
            offset: self.offset,
            kind: header.kind,
            value: &remaining[NLA_HDRLEN..length],
        };
        self.offset += align(length);

        Some(attr)
    }
}
