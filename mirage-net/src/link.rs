//! Virtual ethernet links and interface state.

use std::os::fd::{AsRawFd, BorrowedFd};

use mirage_netlink::{wire::constants::*, Session, Transport};
use netlink_packet_route::{
    link::{LinkFlags, LinkHeader, LinkMessageBuffer},
    AddressFamily,
};
use netlink_packet_utils::Parseable;
use nix::{
    errno::Errno,
    libc,
    sys::socket::{socket, AddressFamily as SocketFamily, SockFlag, SockType},
};

use crate::{ack_flag, submit, Error, Result};

/// Maximum length of an interface name, without the trailing NUL.
pub const MAX_INTERFACE_NAME_LEN: usize = 15;

/// `ETHTOOL_SGRO` from `<linux/ethtool.h>`, not exported by libc.
const ETHTOOL_SGRO: u32 = 0x0000_002c;

mod ioctl {
    use nix::libc;

    nix::ioctl_readwrite_bad!(ethtool, libc::SIOCETHTOOL, libc::ifreq);
}

/// One end of a veth pair: its name and the network namespace it is placed in.
#[derive(Debug, Clone, Copy)]
pub struct VethEnd<'a> {
    pub name: &'a str,
    pub namespace: BorrowedFd<'a>,
}

impl<'a> VethEnd<'a> {
    pub const fn new(name: &'a str, namespace: BorrowedFd<'a>) -> Self {
        Self { name, namespace }
    }
}

/// Returns the name as a NUL-terminated attribute value.
fn interface_name(name: &str) -> Result<Vec<u8>> {
    if name.is_empty() || name.len() > MAX_INTERFACE_NAME_LEN || name.contains('\0') {
        return Err(Error::InvalidInterfaceName(name.to_owned()));
    }

    let mut value = Vec::with_capacity(name.len() + 1);
    value.extend_from_slice(name.as_bytes());
    value.push(0);
    Ok(value)
}

/// An `ifinfomsg` addressing the interface with the given index (0 for none).
fn link_header(index: u32) -> LinkHeader {
    let mut header = LinkHeader::default();
    header.interface_family = AddressFamily::Unspec;
    header.index = index;
    header
}

/// Creates a pair of connected virtual ethernet devices, each end placed directly in its own
/// namespace.
///
/// The session used does not matter: the namespaces are passed explicitly by descriptor.
pub fn create_veth_pair<T: Transport>(
    session: &mut Session<T>,
    first: VethEnd<'_>,
    second: VethEnd<'_>,
    sync: bool,
) -> Result<()> {
    let first_name = interface_name(first.name)?;
    let second_name = interface_name(second.name)?;
    tracing::debug!(first = first.name, second = second.name, "creating veth pair");

    let mut info = link_header(0);
    info.change_mask = LinkFlags::from_bits_retain(u32::MAX);

    let mut request =
        session.begin_message(RTM_NEWLINK, NLM_F_CREATE | NLM_F_EXCL | ack_flag(sync));
    request.append_header(&info);
    request.attribute(IFLA_IFNAME, &first_name)?;
    request.attribute(IFLA_NET_NS_FD, &first.namespace.as_raw_fd().to_ne_bytes())?;
    {
        let mut link_info = request.nest(IFLA_LINKINFO)?;
        link_info.attribute(IFLA_INFO_KIND, b"veth")?;

        let mut data = link_info.nest(IFLA_INFO_DATA)?;
        let mut peer = data.nest(VETH_INFO_PEER)?;
        peer.append_header(&info);
        peer.attribute(IFLA_IFNAME, &second_name)?;
        peer.attribute(IFLA_NET_NS_FD, &second.namespace.as_raw_fd().to_ne_bytes())?;
    }

    submit(request, sync)
}

/// Looks up the index of the interface with the given name.
pub fn interface_index<T: Transport>(session: &mut Session<T>, name: &str) -> Result<u32> {
    let value = interface_name(name)?;

    let mut request = session.begin_message(RTM_GETLINK, 0);
    request.append_header(&link_header(0));
    request.attribute(IFLA_IFNAME, &value)?;

    let mut index = None;
    let result = request.send_with(|response| {
        if response.message_type == RTM_NEWLINK {
            let buffer = LinkMessageBuffer::new_checked(&response.payload[..])?;
            index = Some(LinkHeader::parse(&buffer)?.index);
        }
        Ok(())
    });

    match result {
        Ok(()) => {}
        Err(mirage_netlink::Error::Kernel(Errno::ENODEV)) => {
            return Err(Error::InterfaceNotFound(name.to_owned()))
        }
        Err(e) => return Err(e.into()),
    }

    let index = index
        .filter(|&index| index != 0)
        .ok_or_else(|| Error::InterfaceNotFound(name.to_owned()))?;

    tracing::debug!(name, index, "resolved interface index");
    Ok(index)
}

/// Brings the interface with the given index up or down.
pub fn set_interface_up<T: Transport>(
    session: &mut Session<T>,
    index: u32,
    up: bool,
    sync: bool,
) -> Result<()> {
    tracing::debug!(index, up, "setting interface state");

    let mut info = link_header(index);
    info.flags = LinkFlags::from_bits_retain(if up { IFF_UP } else { 0 });
    info.change_mask = LinkFlags::from_bits_retain(IFF_UP);

    let mut request = session.begin_message(RTM_NEWLINK, ack_flag(sync));
    request.append_header(&info);
    submit(request, sync)
}

/// `struct ethtool_value`, the argument of simple ethtool get/set commands.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct EthtoolValue {
    cmd: u32,
    data: u32,
}

/// An `ifreq` naming the interface and pointing at `value`.
fn ethtool_request(name: &str, value: &mut EthtoolValue) -> Result<libc::ifreq> {
    interface_name(name)?;

    // SAFETY: `ifreq` is plain old data, all zeroes is a valid value.
    let mut request: libc::ifreq = unsafe { std::mem::zeroed() };
    for (dst, &src) in request.ifr_name.iter_mut().zip(name.as_bytes()) {
        *dst = src as libc::c_char;
    }
    request.ifr_ifru.ifru_data = (value as *mut EthtoolValue).cast();

    Ok(request)
}

/// Turns generic receive offload on or off for the named interface.
///
/// Acts on the network namespace of the calling thread. Emulated links usually have GRO turned
/// off, so that shaping applies to individual packets rather than coalesced segments.
pub fn set_interface_gro(name: &str, enabled: bool) -> Result<()> {
    let mut value = EthtoolValue { cmd: ETHTOOL_SGRO, data: u32::from(enabled) };
    let mut request = ethtool_request(name, &mut value)?;

    let fd = socket(SocketFamily::Inet, SockType::Datagram, SockFlag::SOCK_CLOEXEC, None)?;

    // SAFETY: `request` is a valid `ifreq` whose data pointer refers to `value`, which outlives
    // the call.
    match unsafe { ioctl::ethtool(fd.as_raw_fd(), &mut request) } {
        Ok(_) => {}
        Err(Errno::ENODEV) => return Err(Error::InterfaceNotFound(name.to_owned())),
        Err(errno) => {
            tracing::error!(%errno, name, "failed to set generic receive offload");
            return Err(errno.into());
        }
    }

    tracing::debug!(name, enabled, "set generic receive offload");
    Ok(())
}
