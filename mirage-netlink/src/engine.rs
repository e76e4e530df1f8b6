//! Transmission of finished requests and correlation of the kernel's responses.
//!
//! # State machine
//!
//! ```text
//! Idle ──send──▶ Sending ──(no ack requested)──────────────────────────▶ Done
//!                   │
//!                   └──(ack requested)──▶ Receiving ──(matching batch)──▶ Done
//! ```
//!
//! Any error ends the call. Responses are matched by sequence number: records answering older,
//! unacknowledged requests are skipped, and the call completes once a batch containing at least
//! one record for the awaited sequence has been consumed. There is no timeout.

use bytes::Bytes;
use nix::errno::Errno;

use mirage_wire::{
    constants::{NLMSG_DONE, NLMSG_ERROR},
    Attributes, NetlinkHeader, Record, Records,
};

use crate::{BoxError, Error, Misuse, Request, Result, Session, Transport};

/// A record received in answer to a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub message_type: u16,
    pub flags: u16,
    pub sequence: u32,
    /// Everything after the netlink header.
    pub payload: Bytes,
}

impl Response {
    fn from_record(record: &Record<'_>) -> Self {
        Self {
            message_type: record.header.message_type,
            flags: record.header.flags,
            sequence: record.header.sequence,
            payload: Bytes::copy_from_slice(record.payload),
        }
    }

    /// Whether this is the kernel's plain acknowledgment of the request.
    pub fn is_ack(&self) -> bool {
        self.message_type == NLMSG_ERROR
    }

    /// The attributes following a family header of `header_len` bytes.
    pub fn attributes(&self, header_len: usize) -> Attributes<'_> {
        Attributes::new(self.payload.get(header_len..).unwrap_or_default())
    }
}

impl<'s, T: Transport> Request<'s, T> {
    /// Sends the message without waiting for an answer.
    ///
    /// Kernel errors are not reported in this mode: the kernel may reject or drop the request
    /// silently.
    pub fn send(mut self) -> Result<()> {
        self.transmit()?;
        Ok(())
    }

    /// Sends the message and returns the records the kernel answers with.
    ///
    /// The iterator blocks while reading from the socket. It yields every record carrying this
    /// message's sequence number, including the acknowledgment, and ends with an error if the
    /// kernel reports one.
    pub fn send_acked(mut self) -> Result<Responses<'s, T>> {
        let sequence = self.transmit()?;

        // The arena is reused for receiving.
        let session = self.session;
        session.arena.reset(session.options.recv_buffer_size);

        Ok(Responses {
            session,
            sequence,
            offset: 0,
            batch_len: 0,
            found: false,
            finished: false,
        })
    }

    /// Sends the message and calls `handler` for every record of the answer.
    ///
    /// An error returned by the handler stops processing and is returned as
    /// [`Error::Handler`].
    pub fn send_with<F>(self, mut handler: F) -> Result<()>
    where
        F: FnMut(&Response) -> std::result::Result<(), BoxError>,
    {
        for response in self.send_acked()? {
            handler(&response?).map_err(Error::Handler)?;
        }

        Ok(())
    }

    /// Sends the message and blocks until the kernel acknowledges it.
    pub fn send_and_wait(self) -> Result<()> {
        self.send_with(|_| Ok(()))
    }

    /// Finalizes the header and writes the message to the transport. Returns its sequence.
    fn transmit(&mut self) -> Result<u32> {
        let session = &mut *self.session;
        if session.depth > 0 {
            tracing::error!(
                depth = session.depth,
                "BUG: attempted to send netlink message with open attributes"
            );
            return Err(Misuse::OpenAttribute { depth: session.depth }.into());
        }

        let length = session.arena.len();
        session.arena.as_mut_slice()[..4].copy_from_slice(&(length as u32).to_ne_bytes());
        let header = NetlinkHeader::parse(session.arena.as_slice())?;

        let mut retries = 0;
        loop {
            tracing::debug!(
                seq = header.sequence,
                ty = header.message_type,
                length,
                "sending netlink message"
            );

            match session.transport.send(session.arena.as_slice()) {
                Ok(_) => break,
                Err(errno) if session.options.retry.should_retry(errno, retries) => {
                    retries += 1;
                    tracing::trace!(?errno, retries, "retrying netlink send");
                }
                Err(errno) => {
                    tracing::error!(%errno, "error when sending netlink request to the kernel");
                    return Err(Error::Io(errno));
                }
            }
        }

        Ok(header.sequence)
    }
}

impl<T: Transport> Session<T> {
    /// Reads one batch into the arena. Returns the number of bytes received.
    fn receive_batch(&mut self) -> Result<usize> {
        self.arena.reset(self.options.recv_buffer_size);

        let mut retries = 0;
        loop {
            match self.transport.recv(self.arena.storage_mut()) {
                Ok((0, _)) => {
                    tracing::error!("netlink socket was closed by the kernel");
                    return Err(Error::Closed);
                }
                Ok((_, None)) => {
                    tracing::error!("netlink response used wrong address protocol");
                    return Err(Error::WrongAddress);
                }
                Ok((len, Some(_))) => {
                    let len = len.min(self.arena.capacity());
                    self.arena.commit(len);
                    return Ok(len);
                }
                Err(Errno::ENOBUFS) => {
                    tracing::warn!(
                        "kernel ran out of memory when sending netlink responses, view of state may be desynchronized"
                    );
                }
                Err(errno) if self.options.retry.should_retry(errno, retries) => {
                    retries += 1;
                    tracing::trace!(?errno, retries, "retrying netlink receive");
                }
                Err(errno) => {
                    tracing::error!(%errno, "netlink socket read error");
                    return Err(Error::Io(errno));
                }
            }
        }
    }
}

/// The records answering one request, read lazily from the kernel.
///
/// Returned by [`Request::send_acked`]. The iterator is finite and ends after the first batch
/// that contained a record for the awaited sequence, or after the first error.
#[derive(Debug)]
pub struct Responses<'s, T: Transport> {
    session: &'s mut Session<T>,
    sequence: u32,
    /// Read position in the current batch.
    offset: usize,
    batch_len: usize,
    found: bool,
    finished: bool,
}

impl<T: Transport> Responses<'_, T> {
    /// Sequence number of the request being answered.
    pub fn sequence(&self) -> u32 {
        self.sequence
    }

    fn fail(&mut self, error: Error) -> Option<Result<Response>> {
        self.finished = true;
        Some(Err(error))
    }
}

impl<T: Transport> Iterator for Responses<'_, T> {
    type Item = Result<Response>;

    fn next(&mut self) -> Option<Self::Item> {
        while !self.finished {
            if self.offset >= self.batch_len {
                if self.found {
                    tracing::debug!(seq = self.sequence, "kernel acknowledged netlink message");
                    self.finished = true;
                    break;
                }

                match self.session.receive_batch() {
                    Ok(len) => {
                        self.batch_len = len;
                        self.offset = 0;
                    }
                    Err(e) => return self.fail(e),
                }
                continue;
            }

            let batch = &self.session.arena.as_slice()[self.offset..self.batch_len];
            let Some(record) = Records::new(batch).next() else {
                self.offset = self.batch_len;
                continue;
            };
            self.offset += record.aligned_len();

            if record.header.message_type == NLMSG_DONE {
                self.offset = self.batch_len;
                continue;
            }
            if record.header.sequence != self.sequence {
                // Answers to earlier requests nobody waited for.
                tracing::trace!(seq = record.header.sequence, "skipping stale netlink response");
                continue;
            }
            self.found = true;

            let response = match record.error() {
                Some(Err(e)) => return self.fail(e.into()),
                Some(Ok(error)) => match error.errno() {
                    Some(code) => {
                        let errno = Errno::from_raw(code);
                        tracing::error!(%errno, seq = self.sequence, "netlink-reported error");
                        return self.fail(Error::Kernel(errno));
                    }
                    None => Response::from_record(&record),
                },
                None => Response::from_record(&record),
            };

            return Some(Ok(response));
        }

        None
    }
}
