//! Static IPv4 routes.

use std::net::Ipv4Addr;

use mirage_netlink::{wire::constants::*, Session, Transport};
use netlink_packet_route::{
    route::{RouteHeader, RouteProtocol, RouteScope, RouteType},
    AddressFamily,
};

use crate::{ack_flag, ip::Subnet, submit, Result};

/// Adds a static unicast route for `destination` to the main table, leaving through the interface
/// `oif`, optionally via `gateway`. Fails if the route already exists.
pub fn add_route_v4<T: Transport>(
    session: &mut Session<T>,
    destination: Subnet,
    gateway: Option<Ipv4Addr>,
    oif: u32,
    sync: bool,
) -> Result<()> {
    tracing::debug!(%destination, ?gateway, oif, "adding route");

    let mut request =
        session.begin_message(RTM_NEWROUTE, NLM_F_CREATE | NLM_F_EXCL | ack_flag(sync));
    let mut header = RouteHeader::default();
    header.address_family = AddressFamily::Inet;
    header.destination_prefix_length = destination.prefix_len();
    header.table = RT_TABLE_MAIN;
    header.protocol = RouteProtocol::Static;
    header.scope = RouteScope::Universe;
    header.kind = RouteType::Unicast;
    request.append_header(&header);

    request.attribute(RTA_DST, &destination.network_address().octets())?;
    if let Some(gateway) = gateway.filter(|g| !g.is_unspecified()) {
        request.attribute(RTA_GATEWAY, &gateway.octets())?;
    }
    request.attribute(RTA_OIF, &oif.to_ne_bytes())?;

    submit(request, sync)
}
