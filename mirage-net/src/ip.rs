//! IPv4 subnets and MAC addresses used to number emulated hosts.

use std::{fmt, net::Ipv4Addr, str::FromStr};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("invalid CIDR notation (no slash found): {0:?}")]
    MissingPrefix(String),
    #[error("invalid IPv4 address: {0:?}")]
    InvalidAddress(String),
    #[error("invalid prefix length: {0:?}")]
    InvalidPrefix(String),
    #[error("invalid MAC address: {0:?}")]
    InvalidMac(String),
}

/// An IPv4 subnet, composed of a network address and a prefix length.
///
/// Host bits of the address are always cleared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Subnet {
    network_address: Ipv4Addr,
    prefix_len: u8,
}

impl Subnet {
    /// Creates the subnet containing `address`. Prefix lengths above 32 are clamped.
    pub fn new(address: Ipv4Addr, prefix_len: u8) -> Self {
        let prefix_len = prefix_len.min(32);
        let mask = !host_bits(prefix_len);

        Self { network_address: Ipv4Addr::from(u32::from(address) & mask), prefix_len }
    }

    pub const fn network_address(&self) -> Ipv4Addr {
        self.network_address
    }

    pub const fn prefix_len(&self) -> u8 {
        self.prefix_len
    }

    /// The subnet mask, e.g. `255.255.255.0` for a `/24`.
    pub fn netmask(&self) -> Ipv4Addr {
        Ipv4Addr::from(!host_bits(self.prefix_len))
    }

    /// The negation of the subnet mask.
    pub fn host_mask(&self) -> Ipv4Addr {
        Ipv4Addr::from(host_bits(self.prefix_len))
    }

    /// First address of the subnet.
    pub const fn start(&self) -> Ipv4Addr {
        self.network_address
    }

    /// Last address of the subnet, i.e. its broadcast address.
    pub fn end(&self) -> Ipv4Addr {
        Ipv4Addr::from(u32::from(self.network_address) | host_bits(self.prefix_len))
    }

    /// Number of addresses in the subnet.
    pub const fn size(&self) -> u64 {
        1 << (32 - self.prefix_len as u64)
    }

    /// Whether the first and last address are reserved for the network and broadcast addresses.
    /// `/31` and `/32` subnets have no reserved addresses.
    pub const fn has_reserved(&self) -> bool {
        self.size() > 2
    }

    /// Number of addresses available to hosts.
    pub const fn usable_size(&self) -> u64 {
        if self.has_reserved() {
            self.size() - 2
        } else {
            self.size()
        }
    }

    pub fn contains(&self, address: Ipv4Addr) -> bool {
        u32::from(address) & !host_bits(self.prefix_len) == u32::from(self.network_address)
    }

    /// Iterates over every address of the subnet in ascending order, skipping all addresses that
    /// fall into one of the `avoid` subnets.
    pub fn hosts(&self, avoid: &[Self]) -> Hosts {
        let mut avoid: Vec<(u64, u64)> = avoid
            .iter()
            .map(|subnet| (u32::from(subnet.start()) as u64, u32::from(subnet.end()) as u64))
            .collect();
        // Largest range first for equal starts, so the biggest possible block is skipped.
        avoid.sort_by(|a, b| a.0.cmp(&b.0).then(b.1.cmp(&a.1)));

        Hosts {
            next: u32::from(self.start()) as u64,
            end: u32::from(self.end()) as u64,
            avoid,
            avoid_index: 0,
        }
    }

    /// Splits the subnet into `count` smaller subnets.
    ///
    /// If `count` is a power of two all fragments have the same size. Otherwise some fragments
    /// are twice as large as the others, and they come first. Returns `None` if the subnet has
    /// fewer addresses than `count`.
    pub fn fragment(&self, count: u32) -> Option<Fragments> {
        let parent = self.size();
        if count == 0 || parent < count as u64 {
            return None;
        }

        // The largest power of two that fits `count` times, then double some fragments to use
        // the leftover space.
        let ideal = parent / count as u64;
        let small_bits = 63 - ideal.leading_zeros();
        let small_size = 1u64 << small_bits;
        let leftover = parent - small_size * count as u64;

        Some(Fragments {
            next: u32::from(self.network_address) as u64,
            small_prefix_len: (32 - small_bits) as u8,
            large_remaining: leftover / small_size,
            remaining: count,
        })
    }
}

/// Bits of an address that belong to the host part, in host order.
const fn host_bits(prefix_len: u8) -> u32 {
    ((1u64 << (32 - prefix_len as u64)) - 1) as u32
}

impl FromStr for Subnet {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (address, prefix_len) =
            s.split_once('/').ok_or_else(|| ParseError::MissingPrefix(s.to_owned()))?;

        let address: Ipv4Addr =
            address.parse().map_err(|_| ParseError::InvalidAddress(s.to_owned()))?;
        let prefix_len = prefix_len
            .parse::<u8>()
            .ok()
            .filter(|len| *len <= 32)
            .ok_or_else(|| ParseError::InvalidPrefix(s.to_owned()))?;

        Ok(Self::new(address, prefix_len))
    }
}

impl fmt::Display for Subnet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.network_address, self.prefix_len)
    }
}

/// Iterator returned by [`Subnet::hosts`].
#[derive(Debug, Clone)]
pub struct Hosts {
    next: u64,
    end: u64,
    /// Avoided ranges, sorted by start.
    avoid: Vec<(u64, u64)>,
    avoid_index: usize,
}

impl Iterator for Hosts {
    type Item = Ipv4Addr;

    fn next(&mut self) -> Option<Self::Item> {
        while self.next <= self.end {
            // Ranges can overlap, so several may be left behind at once.
            while self.avoid.get(self.avoid_index).is_some_and(|(_, end)| *end < self.next) {
                self.avoid_index += 1;
            }

            match self.avoid.get(self.avoid_index) {
                Some(&(start, end)) if start <= self.next => self.next = end + 1,
                _ => {
                    let address = Ipv4Addr::from(self.next as u32);
                    self.next += 1;
                    return Some(address);
                }
            }
        }

        None
    }
}

/// Iterator returned by [`Subnet::fragment`].
#[derive(Debug, Clone)]
pub struct Fragments {
    next: u64,
    small_prefix_len: u8,
    large_remaining: u64,
    remaining: u32,
}

impl Iterator for Fragments {
    type Item = Subnet;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        self.remaining -= 1;

        let fragment = if self.large_remaining > 0 {
            self.large_remaining -= 1;
            Subnet::new(Ipv4Addr::from(self.next as u32), self.small_prefix_len - 1)
        } else {
            Subnet::new(Ipv4Addr::from(self.next as u32), self.small_prefix_len)
        };
        self.next += fragment.size();

        Some(fragment)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining as usize, Some(self.remaining as usize))
    }
}

impl ExactSizeIterator for Fragments {}

/// A 48-bit IEEE 802 MAC address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct MacAddr(pub [u8; 6]);

impl MacAddr {
    pub const fn octets(&self) -> [u8; 6] {
        self.0
    }

    /// The address following this one, or `None` on overflow.
    pub fn checked_next(&self) -> Option<Self> {
        let mut octets = self.0;
        for octet in octets.iter_mut().rev() {
            let (value, carry) = octet.overflowing_add(1);
            *octet = value;
            if !carry {
                return Some(Self(octets));
            }
        }

        None
    }

    /// Sequentially allocated addresses, starting with this one.
    pub fn sequence(self) -> impl Iterator<Item = Self> {
        std::iter::successors(Some(self), Self::checked_next)
    }
}

impl FromStr for MacAddr {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ParseError::InvalidMac(s.to_owned());

        let mut octets = [0u8; 6];
        let mut parts = s.split(':');
        for octet in &mut octets {
            // `from_str_radix` alone would accept a leading sign.
            let part = parts
                .next()
                .filter(|p| (1..=2).contains(&p.len()))
                .filter(|p| p.bytes().all(|b| b.is_ascii_hexdigit()))
                .ok_or_else(invalid)?;
            *octet = u8::from_str_radix(part, 16).map_err(|_| invalid())?;
        }
        if parts.next().is_some() {
            return Err(invalid());
        }

        Ok(Self(octets))
    }
}

impl fmt::Display for MacAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(f, "{a:02x}:{b:02x}:{c:02x}:{d:02x}:{e:02x}:{g:02x}")
    }
}
