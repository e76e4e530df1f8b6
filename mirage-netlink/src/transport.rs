use std::os::fd::{AsFd, AsRawFd, BorrowedFd, IntoRawFd, OwnedFd};

use nix::sys::socket::{
    bind, getsockname, recvfrom, sendto, socket, AddressFamily, MsgFlags, NetlinkAddr, SockFlag,
    SockProtocol, SockType,
};

use crate::{Error, Result, SetupStep};

/// The datagram channel a [`Session`](crate::Session) talks to the kernel through.
///
/// [`NetlinkSocket`] is the real implementation. Tests substitute a scripted kernel.
pub trait Transport {
    /// Sends one complete message to the kernel.
    fn send(&mut self, buf: &[u8]) -> nix::Result<usize>;

    /// Reads one batch of records into `buf`. Returns the number of bytes read and the sender
    /// address, which is `None` if the sender did not use a netlink address.
    fn recv(&mut self, buf: &mut [u8]) -> nix::Result<(usize, Option<NetlinkAddr>)>;

    /// Releases the underlying resource.
    fn close(self) -> nix::Result<()>
    where
        Self: Sized,
    {
        Ok(())
    }
}

/// A raw `NETLINK_ROUTE` socket bound to a kernel-assigned port id.
#[derive(Debug)]
pub struct NetlinkSocket {
    fd: OwnedFd,
    local: NetlinkAddr,
}

impl NetlinkSocket {
    /// Opens and binds a socket in the current network namespace.
    ///
    /// The descriptor is closed again if binding or address retrieval fails.
    pub fn open() -> Result<Self> {
        let fd = socket(
            AddressFamily::Netlink,
            SockType::Raw,
            SockFlag::SOCK_CLOEXEC,
            SockProtocol::NetlinkRoute,
        )
        .map_err(|errno| Error::Setup { step: SetupStep::Socket, errno })?;

        // Port id 0 lets the kernel pick one, so several sockets can coexist in one process.
        bind(fd.as_raw_fd(), &NetlinkAddr::new(0, 0))
            .map_err(|errno| Error::Setup { step: SetupStep::Bind, errno })?;
        let local = getsockname::<NetlinkAddr>(fd.as_raw_fd())
            .map_err(|errno| Error::Setup { step: SetupStep::GetSockName, errno })?;

        Ok(Self { fd, local })
    }

    /// The kernel-assigned port id.
    pub fn port_id(&self) -> u32 {
        self.local.pid()
    }
}

impl AsFd for NetlinkSocket {
    fn as_fd(&self) -> BorrowedFd<'_> {
        self.fd.as_fd()
    }
}

impl Transport for NetlinkSocket {
    fn send(&mut self, buf: &[u8]) -> nix::Result<usize> {
        // The kernel listens on port id 0.
        let kernel = NetlinkAddr::new(0, 0);
        sendto(self.fd.as_raw_fd(), buf, &kernel, MsgFlags::empty())
    }

    fn recv(&mut self, buf: &mut [u8]) -> nix::Result<(usize, Option<NetlinkAddr>)> {
        recvfrom::<NetlinkAddr>(self.fd.as_raw_fd(), buf)
    }

    fn close(self) -> nix::Result<()> {
        nix::unistd::close(self.fd.into_raw_fd())
    }
}
