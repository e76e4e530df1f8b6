//! Requests through a real `NETLINK_ROUTE` socket. Reading links needs no privileges.

use mirage_netlink::{wire::constants::*, Error, Session};
use netlink_packet_route::link::{LinkHeader, LinkMessageBuffer};
use netlink_packet_utils::Parseable;
use nix::errno::Errno;

/// Looks up `name` with `RTM_GETLINK`, returning its index and the name the kernel reports.
fn get_link(session: &mut Session, name: &str) -> Result<(u32, String), Error> {
    let mut value = name.as_bytes().to_vec();
    value.push(0);

    let mut request = session.begin_message(RTM_GETLINK, 0);
    request.append_header(&LinkHeader::default());
    request.attribute(IFLA_IFNAME, &value)?;

    let mut link = None;
    request.send_with(|response| {
        if response.message_type == RTM_NEWLINK {
            let header = LinkHeader::parse(&LinkMessageBuffer::new_checked(&response.payload[..])?)?;
            let name = response
                .attributes(16)
                .get(IFLA_IFNAME)
                .and_then(|attr| attr.as_str())
                .ok_or("link without a name")?;
            link = Some((header.index, name.to_owned()));
        }
        Ok(())
    })?;

    Ok(link.expect("kernel answered without a link record"))
}

#[test]
fn loopback_lookup_over_netlink_socket() {
    let _ = tracing_subscriber::fmt::try_init();

    let mut session = Session::open().unwrap();
    assert_ne!(session.port_id(), 0);

    let (index, name) = get_link(&mut session, "lo").unwrap();
    assert_ne!(index, 0);
    assert_eq!(name, "lo");

    // Sequence numbers keep counting on the same socket.
    let (again, _) = get_link(&mut session, "lo").unwrap();
    assert_eq!(again, index);
    assert_eq!(session.next_sequence(), 2);

    session.close().unwrap();
}

#[test]
fn unknown_link_is_a_kernel_error() {
    let mut session = Session::open().unwrap();

    let err = get_link(&mut session, "mirage-none0").unwrap_err();
    assert!(matches!(err, Error::Kernel(Errno::ENODEV)));

    // The session stays usable after the kernel rejected a request.
    assert!(get_link(&mut session, "lo").is_ok());
    session.close().unwrap();
}

#[test]
fn sessions_get_distinct_port_ids() {
    let first = Session::open().unwrap();
    let second = Session::open().unwrap();
    assert_ne!(first.port_id(), second.port_id());

    first.close().unwrap();
    second.close().unwrap();
}
