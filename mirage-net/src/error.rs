use std::io;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("netlink error: {0}")]
    Netlink(#[from] mirage_netlink::Error),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("nix error: {0}")]
    Nix(#[from] nix::Error),
    #[error("invalid namespace name {0:?}")]
    InvalidNamespaceName(String),
    /// Interface names are at most 15 bytes and contain no NUL.
    #[error("invalid interface name {0:?}")]
    InvalidInterfaceName(String),
    #[error("interface {0:?} not found")]
    InterfaceNotFound(String),
    #[error("invalid packet scheduler parameters: {0}")]
    Psched(String),
}

impl Error {
    /// The OS error code carried by this error, if any.
    pub fn raw_os_error(&self) -> Option<i32> {
        match self {
            Self::Netlink(e) => e.raw_os_error(),
            Self::Io(e) => e.raw_os_error(),
            Self::Nix(errno) => Some(*errno as i32),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
