#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]

pub use mirage_net as net;
pub use mirage_netlink::*;
