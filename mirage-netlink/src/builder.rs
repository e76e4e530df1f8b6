//! Construction of request messages in a session's arena.
//!
//! A [`Request`] is started with [`Session::begin_message`]. Payload is appended with
//! [`Request::append`] and friends, and attributes are opened and closed either manually
//! ([`Request::push_attribute`] / [`Request::pop_attribute`]) or through the [`Nested`] guard
//! returned by [`Request::nest`], which closes the attribute when it goes out of scope.
//!
//! ```no_run
//! use mirage_netlink::{wire::constants::*, Session};
//! use netlink_packet_route::link::LinkHeader;
//!
//! let mut session = Session::open()?;
//! let mut request = session.begin_message(RTM_NEWLINK, NLM_F_CREATE | NLM_F_EXCL | NLM_F_ACK);
//! request.append_header(&LinkHeader::default());
//! request.attribute(IFLA_IFNAME, b"veth0\0")?;
//! {
//!     let mut link_info = request.nest(IFLA_LINKINFO)?;
//!     link_info.attribute(IFLA_INFO_KIND, b"veth")?;
//! }
//! request.send_and_wait()?;
//! # Ok::<(), mirage_netlink::Error>(())
//! ```

use std::ops::{Deref, DerefMut};

use mirage_wire::{
    align,
    constants::{NLA_HDRLEN, NLMSG_HDRLEN, NLM_F_REQUEST},
    AttributeHeader, NetlinkHeader,
};
use netlink_packet_utils::Emitable;

use crate::{session::MAX_ATTR_NEST, Misuse, Result, Session, Transport};

impl<T: Transport> Session<T> {
    /// Starts a new message, discarding whatever message was under construction.
    ///
    /// `NLM_F_REQUEST` is always added to `flags`. Callers that intend to wait for the kernel's
    /// answer should include `NLM_F_ACK`.
    pub fn begin_message(&mut self, message_type: u16, flags: u16) -> Request<'_, T> {
        let sequence = self.next_sequence;
        self.next_sequence = self.next_sequence.wrapping_add(1);

        self.arena.reset(self.options.send_buffer_size.max(NLMSG_HDRLEN));
        self.depth = 0;

        // The length is patched in right before sending.
        let header = NetlinkHeader {
            length: 0,
            message_type,
            flags: flags | NLM_F_REQUEST,
            sequence,
            port_id: self.port_id(),
        };
        header.emit(self.arena.tail_mut());
        self.arena.commit(NLMSG_HDRLEN);

        Request { session: self }
    }
}

/// A message under construction. Dropping it without sending discards it.
#[derive(Debug)]
pub struct Request<'s, T: Transport> {
    pub(crate) session: &'s mut Session<T>,
}

impl<'s, T: Transport> Request<'s, T> {
    /// Sequence number carried by this message.
    pub fn sequence(&self) -> u32 {
        let header = &self.session.arena.as_slice()[8..12];
        u32::from_ne_bytes([header[0], header[1], header[2], header[3]])
    }

    /// Number of attributes currently open.
    pub fn depth(&self) -> usize {
        self.session.depth
    }

    /// Number of bytes committed so far, header included.
    pub fn len(&self) -> usize {
        self.session.arena.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == NLMSG_HDRLEN
    }

    /// The bytes committed so far. The header's length field is only filled in when sending.
    pub fn as_bytes(&self) -> &[u8] {
        self.session.arena.as_slice()
    }

    /// Appends raw payload bytes.
    pub fn append(&mut self, bytes: &[u8]) -> &mut Self {
        self.session.arena.extend_from_slice(bytes);
        self
    }

    /// Appends a fixed-layout value such as a family header from `netlink_packet_route`.
    pub fn append_header(&mut self, value: &impl Emitable) -> &mut Self {
        let len = value.buffer_len();

        let arena = &mut self.session.arena;
        arena.reserve(len);
        value.emit(&mut arena.tail_mut()[..len]);
        arena.commit(len);

        self
    }

    /// Opens an attribute of the given type. Bytes appended until the matching
    /// [`Request::pop_attribute`] form its value.
    ///
    /// Fails without touching the message if [`MAX_ATTR_NEST`] attributes are already open.
    pub fn push_attribute(&mut self, kind: u16) -> Result<()> {
        let session = &mut *self.session;
        if session.depth >= MAX_ATTR_NEST {
            tracing::error!(kind, depth = session.depth, "BUG: attribute exceeded allowed nesting depth");
            return Err(Misuse::NestingTooDeep { max: MAX_ATTR_NEST }.into());
        }

        session.arena.reserve(NLA_HDRLEN);
        AttributeHeader { length: 0, kind }.emit(session.arena.tail_mut());

        session.nest[session.depth] = session.arena.len();
        session.depth += 1;
        session.arena.commit(NLA_HDRLEN);

        Ok(())
    }

    /// Closes the most recently opened attribute: writes its length and pads the message to the
    /// next 4-byte boundary.
    pub fn pop_attribute(&mut self) -> Result<()> {
        let session = &mut *self.session;
        if session.depth == 0 {
            tracing::error!("BUG: attribute was closed when the stack was empty");
            return Err(Misuse::PopWithoutPush.into());
        }

        let start = session.nest[session.depth - 1];
        let length = session.arena.len() - start;
        let Ok(encoded) = u16::try_from(length) else {
            tracing::error!(length, "BUG: attribute too large for its length field");
            return Err(Misuse::AttributeTooLarge { length }.into());
        };

        session.depth -= 1;
        session.arena.as_mut_slice()[start..start + 2].copy_from_slice(&encoded.to_ne_bytes());

        let tail = session.arena.len();
        session.arena.extend_zeroed(align(tail) - tail);

        Ok(())
    }

    /// Opens an attribute that is closed when the returned guard is dropped.
    pub fn nest(&mut self, kind: u16) -> Result<Nested<'_, 's, T>> {
        self.push_attribute(kind)?;
        let level = self.depth();

        Ok(Nested { request: self, level })
    }

    /// Appends a complete attribute with the given value.
    pub fn attribute(&mut self, kind: u16, value: &[u8]) -> Result<&mut Self> {
        self.push_attribute(kind)?;
        self.append(value);
        self.pop_attribute()?;

        Ok(self)
    }

    /// Appends a complete attribute whose value is a fixed-layout struct.
    pub fn attribute_header(&mut self, kind: u16, value: &impl Emitable) -> Result<&mut Self> {
        self.push_attribute(kind)?;
        self.append_header(value);
        self.pop_attribute()?;

        Ok(self)
    }
}

/// An open attribute that is closed on drop, on every exit path.
///
/// Dereferences to the [`Request`], so payload and child attributes are added through it. Any
/// attribute opened inside and left open is closed along with it.
#[derive(Debug)]
pub struct Nested<'r, 's, T: Transport> {
    request: &'r mut Request<'s, T>,
    /// Depth right after this attribute was opened.
    level: usize,
}

impl<'s, T: Transport> Deref for Nested<'_, 's, T> {
    type Target = Request<'s, T>;

    fn deref(&self) -> &Self::Target {
        self.request
    }
}

impl<T: Transport> DerefMut for Nested<'_, '_, T> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.request
    }
}

impl<T: Transport> Drop for Nested<'_, '_, T> {
    fn drop(&mut self) {
        while self.request.depth() >= self.level {
            if let Err(e) = self.request.pop_attribute() {
                // Leaves the attribute open, which makes the send fail.
                tracing::error!(?e, "failed to close nested attribute");
                break;
            }
        }
    }
}
