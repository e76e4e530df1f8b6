use std::fmt;

use nix::errno::Errno;
use thiserror::Error;

/// Boxed error returned by response handlers.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// The session setup step that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetupStep {
    /// Creating the `AF_NETLINK` socket.
    Socket,
    /// Binding to a kernel-assigned port id.
    Bind,
    /// Reading back the assigned port id.
    GetSockName,
}

impl fmt::Display for SetupStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Socket => f.write_str("open"),
            Self::Bind => f.write_str("bind"),
            Self::GetSockName => f.write_str("retrieve the kernel-assigned address of"),
        }
    }
}

/// Contract violations by the caller. These are bugs, never runtime conditions.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum Misuse {
    #[error("attribute nesting exceeded the maximum depth of {max}")]
    NestingTooDeep { max: usize },
    #[error("attribute closed while none was open")]
    PopWithoutPush,
    #[error("message sent with {depth} attribute(s) still open")]
    OpenAttribute { depth: usize },
    #[error("attribute of {length} bytes does not fit its 16-bit length field")]
    AttributeTooLarge { length: usize },
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("failed to {step} netlink socket: {errno}")]
    Setup { step: SetupStep, errno: Errno },
    #[error("BUG: {0}")]
    Misuse(#[from] Misuse),
    #[error("netlink-reported error: {0}")]
    Kernel(Errno),
    #[error("netlink socket was closed by the kernel")]
    Closed,
    #[error("netlink response used wrong address protocol")]
    WrongAddress,
    #[error("malformed netlink response: {0}")]
    Wire(#[from] mirage_wire::Error),
    #[error("netlink socket error: {0}")]
    Io(Errno),
    #[error("response handler error: {0}")]
    Handler(BoxError),
}

/// The coarse class of an [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// The session could not be constructed.
    Setup,
    /// The caller broke the builder or send contract.
    Misuse,
    /// The kernel rejected the request.
    Kernel,
    /// The socket failed or the kernel sent something unusable. The session should be dropped.
    Transport,
    /// The response handler failed.
    Handler,
}

impl Error {
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::Setup { .. } => ErrorClass::Setup,
            Self::Misuse(_) => ErrorClass::Misuse,
            Self::Kernel(_) => ErrorClass::Kernel,
            Self::Closed | Self::WrongAddress | Self::Wire(_) | Self::Io(_) => ErrorClass::Transport,
            Self::Handler(_) => ErrorClass::Handler,
        }
    }

    /// The OS error code carried by this error, if any.
    pub fn raw_os_error(&self) -> Option<i32> {
        match self {
            Self::Setup { errno, .. } | Self::Kernel(errno) | Self::Io(errno) => Some(*errno as i32),
            _ => None,
        }
    }
}

impl From<Error> for std::io::Error {
    fn from(value: Error) -> Self {
        match value.raw_os_error() {
            Some(code) => Self::from_raw_os_error(code),
            None => Self::other(value),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
