//! Netem option payloads carried inside the `TCA_OPTIONS` attribute of a qdisc request.
//!
//! The rtnetlink family headers (`ifinfomsg`, `ifaddrmsg`, `rtmsg`, `tcmsg`) come from
//! [`netlink_packet_route`]. Only the netem structures, which that crate exposes as opaque
//! attributes, are laid out here.

use bytes::BufMut;
use netlink_packet_utils::Emitable;

/// `struct tc_netem_qopt`, the fixed part of the netem `TCA_OPTIONS` attribute.
///
/// Latency and jitter are expressed in packet scheduler ticks, loss as a fraction of
/// [`u32::MAX`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NetemQopt {
    pub latency: u32,
    pub limit: u32,
    pub loss: u32,
    pub gap: u32,
    pub duplicate: u32,
    pub jitter: u32,
}

impl NetemQopt {
    pub const LEN: usize = 24;
}

impl Emitable for NetemQopt {
    fn buffer_len(&self) -> usize {
        Self::LEN
    }

    fn emit(&self, buf: &mut [u8]) {
        let mut buf = &mut buf[..Self::LEN];
        buf.put_u32_ne(self.latency);
        buf.put_u32_ne(self.limit);
        buf.put_u32_ne(self.loss);
        buf.put_u32_ne(self.gap);
        buf.put_u32_ne(self.duplicate);
        buf.put_u32_ne(self.jitter);
    }
}

/// `struct tc_netem_rate`. The rate is in bytes per second.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NetemRate {
    pub rate: u32,
    pub packet_overhead: i32,
    pub cell_size: u32,
    pub cell_overhead: i32,
}

impl NetemRate {
    pub const LEN: usize = 16;
}

impl Emitable for NetemRate {
    fn buffer_len(&self) -> usize {
        Self::LEN
    }

    fn emit(&self, buf: &mut [u8]) {
        let mut buf = &mut buf[..Self::LEN];
        buf.put_u32_ne(self.rate);
        buf.put_i32_ne(self.packet_overhead);
        buf.put_u32_ne(self.cell_size);
        buf.put_i32_ne(self.cell_overhead);
    }
}

/// Emits `value` into a freshly allocated buffer of exactly [`Emitable::buffer_len`] bytes.
pub fn emit_to_vec(value: &impl Emitable) -> Vec<u8> {
    let mut buf = vec![0u8; value.buffer_len()];
    value.emit(&mut buf);
    buf
}
