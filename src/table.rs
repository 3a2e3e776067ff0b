//! IP prefix table
//!
//! Pairs an IPv4 and an IPv6 [`RadixTree`] behind an address-typed API:
//! textual CIDR parsing, prefix-length validation, mask construction,
//! replace-on-duplicate record loading, and lookups by `IpAddr`, text, or a
//! numeric IPv4 address in network byte order.
//!
//! # Example
//!
//! ```rust
//! use cidrtree::IpTable;
//!
//! let mut table = IpTable::new()?;
//! table.add_record("10.0.0.0/8", 1)?;
//! table.add_record("10.10.0.0/16", 2)?;
//! table.add_record("2001:db8::/32", 3)?;
//!
//! assert_eq!(table.lookup_str("10.10.5.5")?, Some(2));
//! assert_eq!(table.lookup_str("10.5.5.5")?, Some(1));
//! assert_eq!(table.lookup_str("2001:db8::1")?, Some(3));
//! assert_eq!(table.lookup_str("11.0.0.1")?, None);
//!
//! // Records replace earlier values for the same prefix
//! table.add_record("10.0.0.0/8", 9)?;
//! assert_eq!(table.lookup_str("10.5.5.5")?, Some(9));
//! # Ok::<(), cidrtree::RadixError>(())
//! ```

use crate::allocator::{Allocator, SystemAllocator};
use crate::arena::NO_VALUE;
use crate::config::TreeConfig;
use crate::error::{RadixError, Result};
use crate::key::RadixKey;
use crate::tree::{Radix128Tree, Radix32Tree, TreeStats};
use log::debug;
use serde::Serialize;
use std::io::BufRead;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

/// Parse `addr` or `addr/len` into an address and prefix length
///
/// A bare address is a host route (/32 or /128).
pub fn parse_cidr(text: &str) -> Result<(IpAddr, u8)> {
    let text = text.trim();

    let (addr_str, len_str) = match text.split_once('/') {
        Some((addr, len)) => (addr, Some(len)),
        None => (text, None),
    };

    let addr: IpAddr = addr_str
        .parse()
        .map_err(|_| RadixError::InvalidPrefix(format!("bad address '{}'", addr_str)))?;
    let max_len = max_prefix_len(addr);

    let prefix_len = match len_str {
        None => max_len,
        Some(len) => len
            .parse::<u8>()
            .map_err(|_| RadixError::InvalidPrefix(format!("bad prefix length in '{}'", text)))?,
    };

    if prefix_len > max_len {
        return Err(RadixError::InvalidPrefix(format!(
            "prefix length {} exceeds {} in '{}'",
            prefix_len, max_len, text
        )));
    }

    Ok((addr, prefix_len))
}

fn max_prefix_len(addr: IpAddr) -> u8 {
    match addr {
        IpAddr::V4(_) => 32,
        IpAddr::V6(_) => 128,
    }
}

/// IPv4 address as a 32-bit key, most significant octet first
pub fn v4_key(addr: Ipv4Addr) -> u32 {
    u32::from(addr)
}

/// IPv6 address as a 128-bit key
pub fn v6_key(addr: Ipv6Addr) -> [u8; 16] {
    addr.octets()
}

/// Record counts and per-family tree accounting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TableStats {
    /// Prefixes currently holding a value
    pub records: usize,
    /// IPv4 tree
    pub v4: TreeStats,
    /// IPv6 tree
    pub v6: TreeStats,
}

/// Longest-prefix-match table for IPv4 and IPv6 prefixes
pub struct IpTable<A: Allocator + Clone = SystemAllocator> {
    v4: Radix32Tree<A>,
    v6: Radix128Tree<A>,
}

impl IpTable<SystemAllocator> {
    /// Table on the system allocator with the default config
    pub fn new() -> Result<Self> {
        Self::with_config(SystemAllocator, &TreeConfig::default())
    }
}

impl<A: Allocator + Clone> IpTable<A> {
    /// Table whose trees both draw slabs from clones of `allocator`
    pub fn with_config(allocator: A, config: &TreeConfig) -> Result<Self> {
        Ok(Self {
            v4: Radix32Tree::with_config(allocator.clone(), config)?,
            v6: Radix128Tree::with_config(allocator, config)?,
        })
    }

    /// Store `value` for `addr/prefix_len`; [`RadixError::Busy`] if already set
    pub fn insert(&mut self, addr: IpAddr, prefix_len: u8, value: usize) -> Result<()> {
        check_prefix_len(addr, prefix_len)?;
        if value == NO_VALUE {
            return Err(RadixError::InvalidPrefix(format!(
                "value {} is reserved as the no-value marker",
                value
            )));
        }

        match addr {
            IpAddr::V4(v4) => self.v4.insert(
                v4_key(v4),
                u32::prefix_mask(u32::from(prefix_len)),
                value,
            ),
            IpAddr::V6(v6) => self.v6.insert(
                v6_key(v6),
                <[u8; 16]>::prefix_mask(u32::from(prefix_len)),
                value,
            ),
        }
    }

    /// Store `value` for `addr/prefix_len`, replacing any existing value
    pub fn replace(&mut self, addr: IpAddr, prefix_len: u8, value: usize) -> Result<()> {
        match self.insert(addr, prefix_len, value) {
            Err(RadixError::Busy) => {
                debug!("replacing value at {}/{}", addr, prefix_len);
                self.remove(addr, prefix_len)?;
                self.insert(addr, prefix_len, value)
            }
            other => other,
        }
    }

    /// Parse a CIDR and store `value` for it, replacing any existing value
    pub fn add_record(&mut self, cidr: &str, value: usize) -> Result<()> {
        let (addr, prefix_len) = parse_cidr(cidr)?;
        self.replace(addr, prefix_len, value)
    }

    /// Remove the value stored for exactly `addr/prefix_len`
    pub fn remove(&mut self, addr: IpAddr, prefix_len: u8) -> Result<()> {
        check_prefix_len(addr, prefix_len)?;
        match addr {
            IpAddr::V4(v4) => self
                .v4
                .delete(v4_key(v4), u32::prefix_mask(u32::from(prefix_len))),
            IpAddr::V6(v6) => self.v6.delete(
                v6_key(v6),
                <[u8; 16]>::prefix_mask(u32::from(prefix_len)),
            ),
        }
    }

    /// Parse a CIDR and remove its value
    pub fn remove_cidr(&mut self, cidr: &str) -> Result<()> {
        let (addr, prefix_len) = parse_cidr(cidr)?;
        self.remove(addr, prefix_len)
    }

    /// Value of the longest stored prefix covering `addr`
    pub fn lookup(&self, addr: IpAddr) -> Option<usize> {
        match addr {
            IpAddr::V4(v4) => self.v4.find(v4_key(v4)),
            IpAddr::V6(v6) => self.v6.find(v6_key(v6)),
        }
    }

    /// Parse an address and look it up
    pub fn lookup_str(&self, addr: &str) -> Result<Option<usize>> {
        let addr: IpAddr = addr
            .trim()
            .parse()
            .map_err(|_| RadixError::InvalidPrefix(format!("bad address '{}'", addr)))?;
        Ok(self.lookup(addr))
    }

    /// Look up an IPv4 address given as a number in network byte order
    pub fn lookup_numeric(&self, addr: u32) -> Option<usize> {
        self.v4.find(u32::from_be(addr))
    }

    /// Load `<cidr> <value>` records, one per line
    ///
    /// Blank lines and `#` comments are skipped; later records replace
    /// earlier ones for the same prefix. Returns the number of records read.
    pub fn load_text<R: BufRead>(&mut self, reader: R) -> Result<usize> {
        let mut loaded = 0;

        for (line_no, line) in reader.lines().enumerate() {
            let line = line?;
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let mut fields = line.split_whitespace();
            let (cidr, value) = match (fields.next(), fields.next(), fields.next()) {
                (Some(cidr), Some(value), None) => (cidr, value),
                _ => {
                    return Err(RadixError::InvalidPrefix(format!(
                        "line {}: expected '<cidr> <value>', got '{}'",
                        line_no + 1,
                        line
                    )))
                }
            };
            let value = value.parse::<usize>().map_err(|_| {
                RadixError::InvalidPrefix(format!("line {}: bad value '{}'", line_no + 1, value))
            })?;

            self.add_record(cidr, value)
                .map_err(|e| with_line(e, line_no + 1))?;
            loaded += 1;
        }

        debug!("loaded {} prefix record(s)", loaded);
        Ok(loaded)
    }

    /// The IPv4 tree
    pub fn v4(&self) -> &Radix32Tree<A> {
        &self.v4
    }

    /// The IPv6 tree
    pub fn v6(&self) -> &Radix128Tree<A> {
        &self.v6
    }

    /// Record counts and tree accounting
    pub fn stats(&self) -> TableStats {
        let v4 = self.v4.stats();
        let v6 = self.v6.stats();
        TableStats {
            records: v4.valued_nodes + v6.valued_nodes,
            v4,
            v6,
        }
    }
}

fn check_prefix_len(addr: IpAddr, prefix_len: u8) -> Result<()> {
    let max_len = max_prefix_len(addr);
    if prefix_len > max_len {
        return Err(RadixError::InvalidPrefix(format!(
            "prefix length {} exceeds {} for {}",
            prefix_len, max_len, addr
        )));
    }
    Ok(())
}

fn with_line(err: RadixError, line_no: usize) -> RadixError {
    match err {
        RadixError::InvalidPrefix(msg) => {
            RadixError::InvalidPrefix(format!("line {}: {}", line_no, msg))
        }
        other => other,
    }
}
