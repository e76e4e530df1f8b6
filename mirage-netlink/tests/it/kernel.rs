//! A scripted stand-in for the kernel side of a netlink socket.

use std::collections::VecDeque;

use mirage_netlink::{
    wire::{align, constants::*, NetlinkHeader},
    Session, SessionOptions, Transport,
};
use nix::{errno::Errno, sys::socket::NetlinkAddr};

pub const PORT_ID: u32 = 4242;

pub type Batch = nix::Result<(Vec<u8>, Option<NetlinkAddr>)>;

#[derive(Debug, Default)]
pub struct ScriptedKernel {
    /// Outcomes of successive send calls. Once exhausted, sends succeed.
    pub send_results: VecDeque<nix::Result<()>>,
    /// Messages that were sent successfully.
    pub sent: Vec<Vec<u8>>,
    pub send_attempts: usize,
    /// Outcomes of successive receive calls. Once exhausted, receives fail.
    pub batches: VecDeque<Batch>,
    pub recv_calls: usize,
}

impl ScriptedKernel {
    pub fn with_batches(batches: impl IntoIterator<Item = Batch>) -> Self {
        Self { batches: batches.into_iter().collect(), ..Default::default() }
    }
}

impl Transport for ScriptedKernel {
    fn send(&mut self, buf: &[u8]) -> nix::Result<usize> {
        self.send_attempts += 1;
        if let Some(Err(errno)) = self.send_results.pop_front() {
            return Err(errno);
        }

        self.sent.push(buf.to_vec());
        Ok(buf.len())
    }

    fn recv(&mut self, buf: &mut [u8]) -> nix::Result<(usize, Option<NetlinkAddr>)> {
        self.recv_calls += 1;
        let (bytes, from) = self.batches.pop_front().unwrap_or(Err(Errno::ECONNRESET))?;

        let len = bytes.len().min(buf.len());
        buf[..len].copy_from_slice(&bytes[..len]);
        Ok((len, from))
    }
}

pub fn session(kernel: ScriptedKernel) -> Session<ScriptedKernel> {
    Session::with_transport(kernel, PORT_ID, SessionOptions::default())
}

/// The address the kernel answers from.
pub fn from_kernel() -> Option<NetlinkAddr> {
    Some(NetlinkAddr::new(0, 0))
}

pub fn record(message_type: u16, sequence: u32, flags: u16, payload: &[u8]) -> Vec<u8> {
    let length = NLMSG_HDRLEN + payload.len();
    let mut buf = vec![0u8; align(length)];
    NetlinkHeader { length: length as u32, message_type, flags, sequence, port_id: 0 }
        .emit(&mut buf);
    buf[NLMSG_HDRLEN..length].copy_from_slice(payload);
    buf
}

/// An `NLMSG_ERROR` record with the given status, echoing a bare request header.
pub fn status(sequence: u32, code: i32) -> Vec<u8> {
    let mut payload = code.to_ne_bytes().to_vec();
    payload.resize(4 + NLMSG_HDRLEN, 0);
    NetlinkHeader {
        length: NLMSG_HDRLEN as u32,
        message_type: RTM_NEWLINK,
        flags: NLM_F_REQUEST | NLM_F_ACK,
        sequence,
        port_id: PORT_ID,
    }
    .emit(&mut payload[4..]);

    record(NLMSG_ERROR, sequence, 0, &payload)
}

pub fn done(sequence: u32) -> Vec<u8> {
    record(NLMSG_DONE, sequence, NLM_F_MULTI, &0i32.to_ne_bytes())
}

pub fn batch(records: &[Vec<u8>]) -> Batch {
    Ok((records.concat(), from_kernel()))
}
