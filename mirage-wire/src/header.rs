use bytes::{Buf, BufMut};

use crate::{constants::NLMSG_HDRLEN, ensure_len, Result};

/// The fixed header in front of every netlink message (`struct nlmsghdr`).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NetlinkHeader {
    /// Length of the message including this header, unaligned.
    pub length: u32,
    pub message_type: u16,
    pub flags: u16,
    pub sequence: u32,
    /// Port id of the sender. Zero for messages coming from the kernel.
    pub port_id: u32,
}

impl NetlinkHeader {
    /// Returns the length of the header in bytes.
    #[inline]
    pub const fn len() -> usize {
        NLMSG_HDRLEN
    }

    pub fn parse(buf: &[u8]) -> Result<Self> {
        ensure_len(buf, NLMSG_HDRLEN)?;

        let mut buf = &buf[..NLMSG_HDRLEN];
        Ok(Self {
            length: buf.get_u32_ne(),
            message_type: buf.get_u16_ne(),
            flags: buf.get_u16_ne(),
            sequence: buf.get_u32_ne(),
            port_id: buf.get_u32_ne(),
        })
    }

    /// Writes the header into the first [`NetlinkHeader::len`] bytes of `buf`.
    ///
    /// # Panics
    /// If `buf` is shorter than the header.
    pub fn emit(&self, buf: &mut [u8]) {
        let mut buf = &mut buf[..NLMSG_HDRLEN];
        buf.put_u32_ne(self.length);
        buf.put_u16_ne(self.message_type);
        buf.put_u16_ne(self.flags);
        buf.put_u32_ne(self.sequence);
        buf.put_u32_ne(self.port_id);
    }

    /// Length of the payload that follows the header, according to the length field.
    pub fn payload_len(&self) -> usize {
        (self.length as usize).saturating_sub(NLMSG_HDRLEN)
    }
}
