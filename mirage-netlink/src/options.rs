use nix::errno::Errno;

use mirage_wire::constants::NLMSG_HDRLEN;

/// Default number of bytes reserved when a receive starts.
const DEFAULT_RECV_BUFFER_SIZE: usize = 4096;

/// Returns whether `errno` is an interruption that should simply be retried.
pub fn is_transient(errno: Errno) -> bool {
    matches!(errno, Errno::EINTR | Errno::EAGAIN)
}

/// Decides which failed socket calls are retried, and how often.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    is_transient: fn(Errno) -> bool,
    max_retries: Option<usize>,
}

impl RetryPolicy {
    pub fn new(is_transient: fn(Errno) -> bool) -> Self {
        Self { is_transient, max_retries: None }
    }

    /// Gives up after `max_retries` consecutive transient failures. Unbounded by default.
    pub fn with_max_retries(mut self, max_retries: usize) -> Self {
        self.max_retries = Some(max_retries);
        self
    }

    pub fn is_transient(&self, errno: Errno) -> bool {
        (self.is_transient)(errno)
    }

    /// Returns whether a call that has already been retried `retries` times should be retried
    /// after failing with `errno`.
    pub fn should_retry(&self, errno: Errno, retries: usize) -> bool {
        self.is_transient(errno) && self.max_retries.map_or(true, |max| retries < max)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(is_transient)
    }
}

/// Options of a [`Session`](crate::Session).
#[derive(Debug, Clone)]
pub struct SessionOptions {
    /// Bytes reserved when a new message is started.
    pub send_buffer_size: usize,
    /// Bytes reserved for every batch read from the kernel.
    pub recv_buffer_size: usize,
    pub retry: RetryPolicy,
}

impl SessionOptions {
    pub fn with_send_buffer_size(mut self, size: usize) -> Self {
        self.send_buffer_size = size;
        self
    }

    pub fn with_recv_buffer_size(mut self, size: usize) -> Self {
        self.recv_buffer_size = size;
        self
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            send_buffer_size: NLMSG_HDRLEN,
            recv_buffer_size: DEFAULT_RECV_BUFFER_SIZE,
            retry: RetryPolicy::default(),
        }
    }
}
