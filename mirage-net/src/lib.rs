#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]

//! Building blocks for emulated network topologies on a single Linux host.
//!
//! Every host of an emulated topology lives in its own named network [`namespace`], connected to
//! its neighbours through veth [`link`]s. Interfaces get IPv4 [`addr`]esses, [`route`]s point
//! remote subnets at the right interface, and [`shaping`] applies delay, jitter, loss and rate
//! limits to egress traffic.
//!
//! All operations talk to the kernel through a [`mirage_netlink::Session`]. Each of them takes a
//! `sync` flag: when set, the request asks for an acknowledgment and the call blocks until the
//! kernel answers, so failures are reported. Otherwise the request is fired and forgotten, which
//! is considerably faster when configuring thousands of interfaces.

pub mod addr;
pub mod ip;
pub mod link;
pub mod namespace;
pub mod route;
pub mod shaping;

mod error;
pub use error::*;

use mirage_netlink::{wire::constants::NLM_F_ACK, Request, Transport};


/// Header flags requesting an acknowledgment if `sync` is set.
const fn ack_flag(sync: bool) -> u16 {
    if sync {
        NLM_F_ACK
    } else {
        0
    }
}

/// Sends a finished request, waiting for the acknowledgment if `sync` is set.
fn submit<T: Transport>(request: Request<'_, T>, sync: bool) -> Result<()> {
    if sync {
        request.send_and_wait()?;
    } else {
        request.send()?;
    }

    Ok(())
}
