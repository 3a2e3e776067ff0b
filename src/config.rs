//! Tree configuration
//!
//! A [`TreeConfig`] controls slab size and the warm-up pass run at tree
//! creation. It deserializes from JSON so deployments can keep it next to
//! their prefix lists:
//!
//! ```json
//! { "preallocate": { "levels": 7 }, "page_size": 8192 }
//! ```
//!
//! Every field is optional; missing fields fall back to [`TreeConfig::default`].

use crate::allocator::page_size;
use crate::error::{RadixError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// Upper bound on warm-up depth; 24 levels is already ~32M nodes
pub const MAX_PREALLOCATE_LEVELS: u32 = 24;

/// How many top trie levels to build at creation time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Preallocate {
    /// No warm-up
    Disabled,
    /// Build exactly this many levels
    Levels(u32),
    /// Pick the depth whose dense subtree fills about one page
    #[default]
    Auto,
}

impl Preallocate {
    /// Interpret the integer hint used by the C ABI: 0 off, positive levels, negative auto
    pub fn from_hint(hint: i32) -> Self {
        match hint {
            0 => Preallocate::Disabled,
            n if n > 0 => Preallocate::Levels(n as u32),
            _ => Preallocate::Auto,
        }
    }

    /// Number of levels to build for a slab holding `slots_per_page` nodes
    ///
    /// The dense subtree for K levels has 2^(K+1) - 1 nodes, so a page of
    /// 128 slots fits 6 levels and 256 slots fit 7.
    pub fn levels(self, slots_per_page: usize) -> u32 {
        match self {
            Preallocate::Disabled => 0,
            Preallocate::Levels(n) => n,
            Preallocate::Auto => match slots_per_page {
                128 => 6,
                256 => 7,
                _ => 8,
            },
        }
    }
}

impl fmt::Display for Preallocate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Preallocate::Disabled => write!(f, "off"),
            Preallocate::Levels(n) => write!(f, "{}", n),
            Preallocate::Auto => write!(f, "auto"),
        }
    }
}

impl FromStr for Preallocate {
    type Err = RadixError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(Preallocate::Auto),
            "off" | "none" | "disabled" | "0" => Ok(Preallocate::Disabled),
            other => other.parse::<u32>().map(Preallocate::Levels).map_err(|_| {
                RadixError::Config(format!(
                    "preallocate must be 'auto', 'off' or a level count, got '{}'",
                    s
                ))
            }),
        }
    }
}

/// Creation-time settings for a [`crate::RadixTree`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TreeConfig {
    /// Warm-up policy
    pub preallocate: Preallocate,
    /// Slab size in bytes; the platform page size when unset
    pub page_size: Option<usize>,
}

impl TreeConfig {
    /// Config with the given warm-up policy and platform page size
    pub fn with_preallocate(preallocate: Preallocate) -> Self {
        Self {
            preallocate,
            page_size: None,
        }
    }

    /// Parse a JSON document
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Load a JSON config file
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            RadixError::Io(format!("failed to read config {}: {}", path.display(), e))
        })?;
        Self::from_json_str(&text)
    }

    /// Slab size this config resolves to
    pub fn resolved_page_size(&self) -> usize {
        self.page_size.unwrap_or_else(page_size)
    }
}
