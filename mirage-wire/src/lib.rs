#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]

//! Wire formats of the kernel's routing-configuration protocol (rtnetlink).
//!
//! Everything in this crate is pure: it lays out and decodes bytes, but never talks to a socket.
//! All multi-byte fields are in native byte order, as dictated by the kernel.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │ length: u32 │ type: u16 │ flags: u16 │ seq: u32 │ port: u32  │  <- nlmsghdr (16 bytes)
//! ├──────────────────────────────────────────────────────────────┤
//! │ family header (ifinfomsg, tcmsg, ...)                        │  <- netlink-packet-route
//! ├──────────────────────────────────────────────────────────────┤
//! │ attr length: u16 │ attr type: u16 │ payload │ pad to 4       │  <- one TLV per attribute,
//! │ ...                                                          │     nested to any depth
//! └──────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

pub mod attr;
pub mod constants;
pub mod header;
pub mod message;
pub mod record;

pub use attr::{Attribute, AttributeHeader, Attributes};
pub use header::NetlinkHeader;
pub use message::{emit_to_vec, NetemQopt, NetemRate};
pub use netlink_packet_utils::Emitable;
pub use record::{ErrorMessage, Record, Records};

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    #[error("buffer too short: needed {needed} bytes, {available} available")]
    Truncated { needed: usize, available: usize },
    #[error("invalid length field: {0}")]
    InvalidLength(usize),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Rounds `len` up to the 4-byte boundary used by both messages and attributes.
#[inline]
pub const fn align(len: usize) -> usize {
    (len + constants::NLMSG_ALIGNTO - 1) & !(constants::NLMSG_ALIGNTO - 1)
}

/// Returns an error if `buf` is shorter than `needed`.
#[inline]
pub(crate) fn ensure_len(buf: &[u8], needed: usize) -> Result<()> {
    if buf.len() < needed {
        return Err(Error::Truncated { needed, available: buf.len() });
    }

    Ok(())
}
