use crate::{
    arena::Arena, transport::NetlinkSocket, Error, Result, SessionOptions, Transport,
};

/// Maximum depth of nested attributes in one message. Exceeding it is a caller bug.
pub const MAX_ATTR_NEST: usize = 10;

/// One conversation with the kernel's routing subsystem.
///
/// A session owns its socket, its sequence counter and the arena its messages are staged in, so
/// sessions used from different threads never share state. A single session is driven through
/// `&mut self` and is not meant to be shared.
///
/// The socket is bound to the network namespace that was active when the session was opened and
/// stays there for its whole life.
#[derive(Debug)]
pub struct Session<T = NetlinkSocket> {
    pub(crate) transport: T,
    port_id: u32,
    pub(crate) next_sequence: u32,
    pub(crate) arena: Arena,
    /// Offsets of the headers of the currently open attributes.
    pub(crate) nest: [usize; MAX_ATTR_NEST],
    pub(crate) depth: usize,
    pub(crate) options: SessionOptions,
}

impl Session<NetlinkSocket> {
    /// Opens a session in the current network namespace with default options.
    pub fn open() -> Result<Self> {
        Self::open_with(SessionOptions::default())
    }

    pub fn open_with(options: SessionOptions) -> Result<Self> {
        tracing::debug!("opening rtnetlink socket");

        let socket = NetlinkSocket::open().map_err(|e| {
            tracing::error!(?e, "failed to open rtnetlink session");
            e
        })?;
        let port_id = socket.port_id();

        tracing::debug!(port_id, "rtnetlink socket bound");
        Ok(Self::with_transport(socket, port_id, options))
    }
}

impl<T: Transport> Session<T> {
    /// Builds a session on top of an already bound transport.
    pub fn with_transport(transport: T, port_id: u32, options: SessionOptions) -> Self {
        Self {
            transport,
            port_id,
            next_sequence: 0,
            arena: Arena::with_capacity(options.send_buffer_size),
            nest: [0; MAX_ATTR_NEST],
            depth: 0,
            options,
        }
    }

    /// Port id the kernel assigned to this session. Used as the sender of every request.
    pub fn port_id(&self) -> u32 {
        self.port_id
    }

    /// Sequence number the next message will carry.
    pub fn next_sequence(&self) -> u32 {
        self.next_sequence
    }

    pub fn options(&self) -> &SessionOptions {
        &self.options
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Closes the session and its socket.
    pub fn close(self) -> Result<()> {
        tracing::debug!(port_id = self.port_id, "closing rtnetlink socket");
        self.transport.close().map_err(Error::Io)
    }
}
