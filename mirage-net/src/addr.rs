//! IPv4 interface addresses.

use std::net::Ipv4Addr;

use mirage_netlink::{wire::constants::*, Session, Transport};
use netlink_packet_route::{address::AddressHeader, AddressFamily};

use crate::{ack_flag, submit, Result};

/// An IPv4 address assigned to an interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InterfaceAddrV4 {
    pub address: Ipv4Addr,
    pub prefix_len: u8,
    pub broadcast: Option<Ipv4Addr>,
    pub anycast: Option<Ipv4Addr>,
}

impl InterfaceAddrV4 {
    /// Creates an address in a subnet with the given prefix length. Lengths above 32 are clamped.
    pub fn new(address: Ipv4Addr, prefix_len: u8) -> Self {
        Self { address, prefix_len: prefix_len.min(32), broadcast: None, anycast: None }
    }

    pub fn with_broadcast(mut self, broadcast: Ipv4Addr) -> Self {
        self.broadcast = Some(broadcast);
        self
    }

    pub fn with_anycast(mut self, anycast: Ipv4Addr) -> Self {
        self.anycast = Some(anycast);
        self
    }
}

/// An IPv4 `ifaddrmsg` for the interface with the given index.
fn address_header(index: u32, prefix_len: u8) -> AddressHeader {
    let mut header = AddressHeader::default();
    header.family = AddressFamily::Inet;
    header.prefix_len = prefix_len;
    header.index = index;
    header
}

/// Assigns `addr` to the interface with the given index, replacing an existing assignment of
/// the same address.
pub fn add_interface_addr_v4<T: Transport>(
    session: &mut Session<T>,
    index: u32,
    addr: &InterfaceAddrV4,
    sync: bool,
) -> Result<()> {
    tracing::debug!(index, address = %addr.address, prefix_len = addr.prefix_len, "adding interface address");

    let mut request =
        session.begin_message(RTM_NEWADDR, NLM_F_CREATE | NLM_F_REPLACE | ack_flag(sync));
    request.append_header(&address_header(index, addr.prefix_len.min(32)));

    if !addr.address.is_unspecified() {
        request.attribute(IFA_LOCAL, &addr.address.octets())?;
        request.attribute(IFA_ADDRESS, &addr.address.octets())?;
    }
    if let Some(broadcast) = addr.broadcast.filter(|a| !a.is_unspecified()) {
        request.attribute(IFA_BROADCAST, &broadcast.octets())?;
    }
    if let Some(anycast) = addr.anycast.filter(|a| !a.is_unspecified()) {
        request.attribute(IFA_ANYCAST, &anycast.octets())?;
    }

    submit(request, sync)
}

/// Removes the IPv4 address of the interface with the given index.
pub fn del_interface_addr_v4<T: Transport>(
    session: &mut Session<T>,
    index: u32,
    sync: bool,
) -> Result<()> {
    tracing::debug!(index, "deleting interface address");

    let mut request = session.begin_message(RTM_DELADDR, ack_flag(sync));
    request.append_header(&address_header(index, 0));
    submit(request, sync)
}
