#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]

//! A synchronous rtnetlink transport.
//!
//! A [`Session`] owns a `NETLINK_ROUTE` socket, a sequence counter and a reusable message arena.
//! Requests are assembled with [`Session::begin_message`] and sent with one of the `send*`
//! methods of [`Request`]. When an answer is awaited, the kernel's records are correlated by
//! sequence number and delivered either through the [`Responses`] iterator or a handler closure.
//!
//! All calls block. Interrupted system calls are retried according to the session's
//! [`RetryPolicy`].

pub use mirage_wire as wire;

pub mod arena;
mod builder;
mod engine;
mod error;
mod options;
mod session;
mod transport;

pub use builder::*;
pub use engine::*;
pub use error::*;
pub use options::*;
pub use session::*;
pub use transport::*;
