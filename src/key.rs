//! Fixed-width bit keys
//!
//! The trie algorithm is written once against [`RadixKey`] and instantiated
//! for 32-bit IPv4 keys (`u32`) and 128-bit IPv6 keys (`[u8; 16]`). Bits are
//! numbered most-significant first: bit 0 of a `u32` is `0x8000_0000`, bit 0 of
//! a `[u8; 16]` is `0x80` in byte 0.

use std::fmt::Debug;

/// A fixed-width key the trie can descend
pub trait RadixKey: Copy + Debug {
    /// Key width in bits
    const BITS: u32;

    /// Bit at `index` (0 = most significant); `index < Self::BITS`
    fn bit(&self, index: u32) -> bool;

    /// Key whose leading `len` bits are the low `len` bits of `prefix`, rest zero
    ///
    /// `len` is at most 64 and at most `Self::BITS`.
    fn from_prefix(prefix: u64, len: u32) -> Self;

    /// Canonical CIDR mask with the leading `len` bits set
    fn prefix_mask(len: u32) -> Self;

    /// Number of leading bits a mask lets the descent consume
    ///
    /// Stops at the first clear bit, so non-contiguous masks are truncated.
    fn mask_len(&self) -> u32 {
        (0..Self::BITS).take_while(|&i| self.bit(i)).count() as u32
    }
}

impl RadixKey for u32 {
    const BITS: u32 = 32;

    #[inline]
    fn bit(&self, index: u32) -> bool {
        self & (0x8000_0000 >> index) != 0
    }

    fn from_prefix(prefix: u64, len: u32) -> Self {
        if len == 0 {
            0
        } else {
            (prefix as u32) << (32 - len)
        }
    }

    fn prefix_mask(len: u32) -> Self {
        match len {
            0 => 0,
            len if len >= 32 => u32::MAX,
            len => u32::MAX << (32 - len),
        }
    }

    fn mask_len(&self) -> u32 {
        self.leading_ones()
    }
}

impl RadixKey for [u8; 16] {
    const BITS: u32 = 128;

    #[inline]
    fn bit(&self, index: u32) -> bool {
        self[(index / 8) as usize] & (0x80 >> (index % 8)) != 0
    }

    fn from_prefix(prefix: u64, len: u32) -> Self {
        if len == 0 {
            [0; 16]
        } else {
            let low = u128::from(prefix) & (u128::MAX >> (128 - len));
            (low << (128 - len)).to_be_bytes()
        }
    }

    fn prefix_mask(len: u32) -> Self {
        match len {
            0 => [0; 16],
            len if len >= 128 => [0xFF; 16],
            len => (u128::MAX << (128 - len)).to_be_bytes(),
        }
    }

    fn mask_len(&self) -> u32 {
        u128::from_be_bytes(*self).leading_ones()
    }
}
