//! IP address ranges for `user_ip_addr` filters.
//!
//! Accepts a bare address (`10.0.0.1`, `::1`) or CIDR notation
//! (`10.0.0.0/8`, `2001:db8::/32`). Containment is "within or equal",
//! and IPv4 never matches an IPv6 network or the reverse.

use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;

/// SQL function `inet_contains(network, addr)`: 1 when addr is inside network.
pub const SQL_CONTAINS_FN: &str = "inet_contains";

/// SQL function `inet_key(addr)`: BLOB that sorts addresses numerically.
pub const SQL_SORT_KEY_FN: &str = "inet_key";

/// A network: base address plus prefix length.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IpRange {
    network: IpAddr,
    prefix: u8,
}

impl IpRange {
    /// Parse an address or CIDR range. Returns `None` on anything malformed.
    pub fn parse(input: &str) -> Option<Self> {
        let input = input.trim();
        let (addr, prefix) = match input.split_once('/') {
            Some((addr, bits)) => (addr, Some(bits.parse::<u8>().ok()?)),
            None => (input, None),
        };
        let addr = IpAddr::from_str(addr).ok()?;
        let max = max_prefix(&addr);
        let prefix = prefix.unwrap_or(max);
        if prefix > max {
            return None;
        }
        Some(Self {
            network: mask(addr, prefix),
            prefix,
        })
    }

    pub fn network(&self) -> IpAddr {
        self.network
    }

    pub fn prefix(&self) -> u8 {
        self.prefix
    }

    /// Whether `addr` lies within this network.
    pub fn contains(&self, addr: &IpAddr) -> bool {
        match (self.network, addr) {
            (IpAddr::V4(_), IpAddr::V4(_)) | (IpAddr::V6(_), IpAddr::V6(_)) => {
                mask(*addr, self.prefix) == self.network
            }
            _ => false,
        }
    }
}

impl fmt::Display for IpRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.network, self.prefix)
    }
}

/// Byte key that sorts addresses numerically, IPv4 before IPv6.
pub fn sort_key(addr: &IpAddr) -> Vec<u8> {
    match addr {
        IpAddr::V4(v4) => {
            let mut key = vec![4u8];
            key.extend_from_slice(&v4.octets());
            key
        }
        IpAddr::V6(v6) => {
            let mut key = vec![6u8];
            key.extend_from_slice(&v6.octets());
            key
        }
    }
}

fn max_prefix(addr: &IpAddr) -> u8 {
    match addr {
        IpAddr::V4(_) => 32,
        IpAddr::V6(_) => 128,
    }
}

fn mask(addr: IpAddr, prefix: u8) -> IpAddr {
    match addr {
        IpAddr::V4(v4) => {
            let bits = u32::from(v4);
            let masked = if prefix == 0 { 0 } else { bits & (u32::MAX << (32 - prefix)) };
            IpAddr::V4(masked.into())
        }
        IpAddr::V6(v6) => {
            let bits = u128::from(v6);
            let masked = if prefix == 0 { 0 } else { bits & (u128::MAX << (128 - prefix)) };
            IpAddr::V6(masked.into())
        }
    }
}
