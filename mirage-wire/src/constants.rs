//! Protocol constants.
//!
//! Reference: <linux/netlink.h>, <linux/rtnetlink.h>, <linux/if_link.h>, <linux/pkt_sched.h>.

use nix::libc;

pub const NLMSG_ALIGNTO: usize = 4;
/// Size of `struct nlmsghdr`.
pub const NLMSG_HDRLEN: usize = 16;
/// Size of `struct rtattr` / `struct nlattr`.
pub const NLA_HDRLEN: usize = 4;

// Control message types.
pub const NLMSG_NOOP: u16 = libc::NLMSG_NOOP as u16;
pub const NLMSG_ERROR: u16 = libc::NLMSG_ERROR as u16;
pub const NLMSG_DONE: u16 = libc::NLMSG_DONE as u16;
pub const NLMSG_OVERRUN: u16 = libc::NLMSG_OVERRUN as u16;

// Header flags.
pub const NLM_F_REQUEST: u16 = libc::NLM_F_REQUEST as u16;
pub const NLM_F_MULTI: u16 = libc::NLM_F_MULTI as u16;
pub const NLM_F_ACK: u16 = libc::NLM_F_ACK as u16;
pub const NLM_F_ECHO: u16 = libc::NLM_F_ECHO as u16;
pub const NLM_F_ROOT: u16 = libc::NLM_F_ROOT as u16;
pub const NLM_F_MATCH: u16 = libc::NLM_F_MATCH as u16;
pub const NLM_F_DUMP: u16 = NLM_F_ROOT | NLM_F_MATCH;
pub const NLM_F_REPLACE: u16 = libc::NLM_F_REPLACE as u16;
pub const NLM_F_EXCL: u16 = libc::NLM_F_EXCL as u16;
pub const NLM_F_CREATE: u16 = libc::NLM_F_CREATE as u16;
pub const NLM_F_APPEND: u16 = libc::NLM_F_APPEND as u16;

// rtnetlink message types.
pub const RTM_NEWLINK: u16 = libc::RTM_NEWLINK;
pub const RTM_DELLINK: u16 = libc::RTM_DELLINK;
pub const RTM_GETLINK: u16 = libc::RTM_GETLINK;
pub const RTM_NEWADDR: u16 = libc::RTM_NEWADDR;
pub const RTM_DELADDR: u16 = libc::RTM_DELADDR;
pub const RTM_NEWROUTE: u16 = libc::RTM_NEWROUTE;
pub const RTM_DELROUTE: u16 = libc::RTM_DELROUTE;
pub const RTM_NEWQDISC: u16 = libc::RTM_NEWQDISC;
pub const RTM_DELQDISC: u16 = libc::RTM_DELQDISC;

// Address families.
pub const AF_UNSPEC: u8 = libc::AF_UNSPEC as u8;
pub const AF_INET: u8 = libc::AF_INET as u8;

// Link attributes.
pub const IFLA_IFNAME: u16 = libc::IFLA_IFNAME;
pub const IFLA_LINKINFO: u16 = libc::IFLA_LINKINFO;
pub const IFLA_NET_NS_FD: u16 = libc::IFLA_NET_NS_FD;
pub const IFLA_INFO_KIND: u16 = libc::IFLA_INFO_KIND;
pub const IFLA_INFO_DATA: u16 = libc::IFLA_INFO_DATA;
/// `<linux/veth.h>`, not exported by libc.
pub const VETH_INFO_PEER: u16 = 1;

/// Interface is administratively up.
pub const IFF_UP: u32 = libc::IFF_UP as u32;

// Address attributes.
pub const IFA_ADDRESS: u16 = libc::IFA_ADDRESS;
pub const IFA_LOCAL: u16 = libc::IFA_LOCAL;
pub const IFA_BROADCAST: u16 = libc::IFA_BROADCAST;
pub const IFA_ANYCAST: u16 = libc::IFA_ANYCAST;

// Route attributes and header values.
pub const RTA_DST: u16 = libc::RTA_DST;
pub const RTA_OIF: u16 = libc::RTA_OIF;
pub const RTA_GATEWAY: u16 = libc::RTA_GATEWAY;
pub const RT_TABLE_MAIN: u8 = libc::RT_TABLE_MAIN;
pub const RTPROT_STATIC: u8 = libc::RTPROT_STATIC;
pub const RT_SCOPE_UNIVERSE: u8 = libc::RT_SCOPE_UNIVERSE;
pub const RTN_UNICAST: u8 = libc::RTN_UNICAST;

// Traffic control.
pub const TCA_KIND: u16 = libc::TCA_KIND;
pub const TCA_OPTIONS: u16 = libc::TCA_OPTIONS;
/// `<linux/pkt_sched.h>`, not exported by libc.
pub const TCA_NETEM_RATE: u16 = 6;
/// `TC_H_ROOT` from `<linux/pkt_sched.h>`, not exported by libc.
pub const TC_H_ROOT: u32 = 0xFFFF_FFFF;
