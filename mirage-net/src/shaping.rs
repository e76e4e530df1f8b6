//! Egress traffic shaping with the netem queueing discipline.
//!
//! A single root netem qdisc provides delay, jitter, loss and rate limiting. Since Linux 3.3
//! netem limits the rate on its own, so no HTB or TBF qdiscs are stacked around it.

use std::sync::OnceLock;

use mirage_netlink::{
    wire::{constants::*, NetemQopt, NetemRate},
    Session, Transport,
};
use netlink_packet_route::{
    tc::{TcHandle, TcHeader},
    AddressFamily,
};

use crate::{ack_flag, submit, Error, Result};

/// Path to the kernel's packet scheduler timing information.
pub const PSCHED_PATH: &str = "/proc/net/psched";

/// Queue length tc uses for netem when none is given.
pub const DEFAULT_QUEUE_LEN: u32 = 1_000;

/// Handle of the installed qdisc, `1:0`.
const NETEM_HANDLE: u32 = 0x0001_0000;

/// Conversion between time and packet scheduler ticks.
///
/// Traffic control expresses delays in ticks. The conversion factor is exposed by the kernel in
/// [`PSCHED_PATH`] as four hex values, `t2us us2t clock resolution`, where `t2us / us2t` is the
/// number of ticks per microsecond (adapted from `iproute2/tc/tc_core.c`).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Psched {
    ticks_per_usec: f64,
}

impl Psched {
    pub const fn new(ticks_per_usec: f64) -> Self {
        Self { ticks_per_usec }
    }

    /// Reads the timing parameters of the running kernel.
    pub fn read() -> Result<Self> {
        Self::parse(&std::fs::read_to_string(PSCHED_PATH)?)
    }

    /// Returns the running kernel's parameters, reading them on first use only.
    pub fn system() -> Result<Self> {
        static SYSTEM: OnceLock<Psched> = OnceLock::new();

        if let Some(psched) = SYSTEM.get() {
            return Ok(*psched);
        }
        let psched = Self::read()?;
        Ok(*SYSTEM.get_or_init(|| psched))
    }

    /// Parses the contents of [`PSCHED_PATH`].
    pub fn parse(contents: &str) -> Result<Self> {
        let mut fields = contents.split_whitespace().map(|field| u32::from_str_radix(field, 16));

        let (Some(Ok(t2us)), Some(Ok(us2t))) = (fields.next(), fields.next()) else {
            return Err(Error::Psched(contents.trim().to_owned()));
        };
        if us2t == 0 {
            return Err(Error::Psched(contents.trim().to_owned()));
        }

        let ticks_per_usec = t2us as f64 / us2t as f64;
        tracing::debug!(t2us, us2t, ticks_per_usec, "read {PSCHED_PATH}");

        Ok(Self { ticks_per_usec })
    }

    pub const fn ticks_per_usec(&self) -> f64 {
        self.ticks_per_usec
    }

    /// Converts milliseconds to ticks, rounding to the nearest tick.
    pub fn ms_to_ticks(&self, ms: f64) -> u32 {
        (ms * 1_000.0 * self.ticks_per_usec).round() as u32
    }
}

/// Egress impairments of one interface.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Shaping {
    /// Fixed delay in milliseconds.
    pub delay_ms: f64,
    /// Random delay variation in milliseconds.
    pub jitter_ms: f64,
    /// Fraction of dropped packets, between 0 and 1.
    pub loss: f64,
    /// Rate limit in megabits per second. Zero means unlimited.
    pub rate_mbit: f64,
    /// Queue length in packets. Zero means [`DEFAULT_QUEUE_LEN`].
    pub queue_len: u32,
}

impl Default for Shaping {
    fn default() -> Self {
        Self { delay_ms: 0.0, jitter_ms: 0.0, loss: 0.0, rate_mbit: 0.0, queue_len: DEFAULT_QUEUE_LEN }
    }
}

impl Shaping {
    pub fn with_delay_ms(mut self, delay_ms: f64) -> Self {
        self.delay_ms = delay_ms;
        self
    }

    pub fn with_jitter_ms(mut self, jitter_ms: f64) -> Self {
        self.jitter_ms = jitter_ms;
        self
    }

    pub fn with_loss(mut self, loss: f64) -> Self {
        self.loss = loss;
        self
    }

    pub fn with_rate_mbit(mut self, rate_mbit: f64) -> Self {
        self.rate_mbit = rate_mbit;
        self
    }

    pub fn with_queue_len(mut self, queue_len: u32) -> Self {
        self.queue_len = queue_len;
        self
    }

    /// The kernel representation of these options.
    pub fn qopt(&self, psched: &Psched) -> NetemQopt {
        NetemQopt {
            latency: psched.ms_to_ticks(self.delay_ms),
            jitter: psched.ms_to_ticks(self.jitter_ms),
            loss: (self.loss.clamp(0.0, 1.0) * u32::MAX as f64).round() as u32,
            limit: if self.queue_len == 0 { DEFAULT_QUEUE_LEN } else { self.queue_len },
            ..Default::default()
        }
    }

    /// The rate limit in bytes per second, if any.
    pub fn rate(&self) -> Option<NetemRate> {
        (self.rate_mbit > 0.0).then(|| NetemRate {
            rate: (self.rate_mbit * 1_000_000.0 / 8.0).round() as u32,
            ..Default::default()
        })
    }
}

/// Installs (or replaces) the root netem qdisc of the interface with the given index.
pub fn set_egress_shaping<T: Transport>(
    session: &mut Session<T>,
    index: u32,
    shaping: &Shaping,
    sync: bool,
) -> Result<()> {
    set_egress_shaping_with(session, &Psched::system()?, index, shaping, sync)
}

/// Like [`set_egress_shaping`], with explicit scheduler timing parameters.
pub fn set_egress_shaping_with<T: Transport>(
    session: &mut Session<T>,
    psched: &Psched,
    index: u32,
    shaping: &Shaping,
    sync: bool,
) -> Result<()> {
    tracing::debug!(index, ?shaping, "setting egress shaping");

    let mut request =
        session.begin_message(RTM_NEWQDISC, NLM_F_CREATE | NLM_F_REPLACE | ack_flag(sync));
    let mut header = TcHeader::default();
    header.family = AddressFamily::Unspec;
    header.index = index as i32;
    header.handle = TcHandle::from(NETEM_HANDLE);
    header.parent = TcHandle::from(TC_H_ROOT);
    request.append_header(&header);
    request.attribute(TCA_KIND, b"netem\0")?;
    {
        let mut options = request.nest(TCA_OPTIONS)?;
        options.append_header(&shaping.qopt(psched));
        if let Some(rate) = shaping.rate() {
            options.attribute_header(TCA_NETEM_RATE, &rate)?;
        }
    }

    submit(request, sync)
}
