//! Decoding of the records contained in a batch received from the kernel.

use bytes::Buf;

use crate::{
    align,
    constants::{NLMSG_DONE, NLMSG_ERROR, NLMSG_HDRLEN},
    ensure_len, Error, NetlinkHeader, Result,
};

/// One message out of a received batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Record<'a> {
    pub header: NetlinkHeader,
    /// The bytes after the header, bounded by the header's length field.
    pub payload: &'a [u8],
}

impl<'a> Record<'a> {
    /// Parses the record at the start of `buf`.
    ///
    /// Fails if the header does not fit, or if its length field is smaller than the header or
    /// larger than `buf` (the kernel's `NLMSG_OK` check).
    pub fn parse(buf: &'a [u8]) -> Result<Self> {
        let header = NetlinkHeader::parse(buf)?;

        let length = header.length as usize;
        if length < NLMSG_HDRLEN {
            return Err(Error::InvalidLength(length));
        }
        ensure_len(buf, length)?;

        Ok(Self { header, payload: &buf[NLMSG_HDRLEN..NLMSG_HDRLEN + header.payload_len()] })
    }

    /// Number of bytes this record occupies in the batch, including alignment padding.
    pub fn aligned_len(&self) -> usize {
        align(self.header.length as usize)
    }

    /// Whether this is the end-of-batch sentinel of a multi-part response.
    pub fn is_done(&self) -> bool {
        self.header.message_type == NLMSG_DONE
    }

    /// Whether this is an error descriptor (possibly a plain acknowledgment).
    pub fn is_error(&self) -> bool {
        self.header.message_type == NLMSG_ERROR
    }

    /// Decodes the payload of an error record. Returns `None` for other record types.
    pub fn error(&self) -> Option<Result<ErrorMessage>> {
        self.is_error().then(|| ErrorMessage::parse(self.payload))
    }
}

/// Payload of an `NLMSG_ERROR` record (`struct nlmsgerr`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ErrorMessage {
    /// Zero for an acknowledgment, otherwise a negated errno.
    pub code: i32,
    /// Header of the request this record answers, if the kernel echoed it.
    pub request: Option<NetlinkHeader>,
}

impl ErrorMessage {
    pub const CODE_LEN: usize = 4;

    pub fn parse(buf: &[u8]) -> Result<Self> {
        ensure_len(buf, Self::CODE_LEN)?;

        let code = (&buf[..Self::CODE_LEN]).get_i32_ne();
        let request = NetlinkHeader::parse(&buf[Self::CODE_LEN..]).ok();

        Ok(Self { code, request })
    }

    /// Whether this record is a pure acknowledgment.
    pub fn is_ack(&self) -> bool {
        self.code == 0
    }

    /// The positive errno carried by the record, or `None` for an acknowledgment.
    pub fn errno(&self) -> Option<i32> {
        (self.code != 0).then(|| self.code.saturating_neg())
    }
}

/// Iterator over the records of a received batch.
///
/// Like `NLMSG_OK`/`NLMSG_NEXT`, iteration ends at the first record whose header does not fit in
/// the remaining bytes.
#[derive(Debug, Clone)]
pub struct Records<'a> {
    buf: &'a [u8],
}

impl<'a> Records<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf }
    }
}

impl<'a> Iterator for Records<'a> {
    type Item = Record<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let record = match Record::parse(self.buf) {
            Ok(record) => record,
            Err(e) => {
                if !self.buf.is_empty() {
                    tracing::trace!(?e, remaining = self.buf.len(), "discarding batch tail");
                }
                self.buf = &[];
                return None;
            }
        };

        self.buf = self.buf.get(record.aligned_len()..).unwrap_or_default();
        Some(record)
    }
}
