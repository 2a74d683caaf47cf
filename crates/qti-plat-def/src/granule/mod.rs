// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Translation granule and level geometry.
//!
//! # Levels (4 KB granule, 48-bit input address)
//!
//! ```text
//! Level 0: 512 GB per entry, table descriptors only
//! Level 1:   1 GB per entry, block or table
//! Level 2:   2 MB per entry, block or table
//! Level 3:   4 KB per entry, page
//! ```
//!
//! Every level resolves `granule_shift - 3` address bits because a table
//! occupies exactly one granule of 8-byte descriptors. The initial lookup
//! level follows from the size of the virtual address space: the root is the
//! coarsest level whose entries still subdivide it.

use core::fmt;

/// Smallest supported virtual address space (`T0SZ` = 39).
pub const MIN_VA_BITS: u32 = 25;

/// Largest supported virtual address space without `FEAT_LPA`.
pub const MAX_VA_BITS: u32 = 48;

/// Translation granule size.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Granule {
    /// 4 KB granule, 512 entries per table.
    Size4K,
    /// 16 KB granule, 2048 entries per table.
    Size16K,
    /// 64 KB granule, 8192 entries per table.
    Size64K,
}

impl Granule {
    /// log2 of the granule size.
    #[inline]
    #[must_use]
    pub const fn shift(self) -> u32 {
        match self {
            Self::Size4K => 12,
            Self::Size16K => 14,
            Self::Size64K => 16,
        }
    }

    /// Granule size in bytes.
    #[inline]
    #[must_use]
    pub const fn size(self) -> u64 {
        1 << self.shift()
    }

    /// Address bits resolved by one table.
    #[inline]
    #[must_use]
    pub const fn bits_per_level(self) -> u32 {
        self.shift() - 3
    }

    /// Number of descriptors in a full table.
    #[inline]
    #[must_use]
    pub const fn entries_per_table(self) -> usize {
        1 << self.bits_per_level()
    }

    /// Coarsest level at which a block descriptor is architecturally legal.
    #[inline]
    #[must_use]
    pub const fn min_block_level(self) -> XlatLevel {
        match self {
            Self::Size4K => XlatLevel::L1,
            Self::Size16K | Self::Size64K => XlatLevel::L2,
        }
    }
}

/// A translation table level, 0 (coarsest) to 3 (pages).
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct XlatLevel(u8);

impl XlatLevel {
    /// Level 0.
    pub const L0: Self = Self(0);
    /// Level 1.
    pub const L1: Self = Self(1);
    /// Level 2.
    pub const L2: Self = Self(2);
    /// Level 3, the page level.
    pub const L3: Self = Self(3);

    /// Creates a level, returning `None` above level 3.
    #[inline]
    #[must_use]
    pub const fn new(level: u8) -> Option<Self> {
        if level <= 3 { Some(Self(level)) } else { None }
    }

    /// Returns the raw level number.
    #[inline]
    #[must_use]
    pub const fn as_u8(self) -> u8 {
        self.0
    }

    /// Returns true for the page level.
    #[inline]
    #[must_use]
    pub const fn is_leaf(self) -> bool {
        self.0 == 3
    }

    /// Returns the next finer level, or `None` at the page level.
    #[inline]
    #[must_use]
    pub const fn finer(self) -> Option<Self> {
        if self.0 < 3 { Some(Self(self.0 + 1)) } else { None }
    }
}

impl fmt::Debug for XlatLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "L{}", self.0)
    }
}

impl fmt::Display for XlatLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "L{}", self.0)
    }
}

/// Geometry of one translation regime: granule plus input address size.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AddressSpace {
    granule: Granule,
    va_bits: u32,
}

impl AddressSpace {
    /// Creates an address space geometry.
    ///
    /// Returns `None` if `va_bits` is outside `MIN_VA_BITS..=MAX_VA_BITS` or
    /// the root would have to start at the page level.
    #[must_use]
    pub const fn new(granule: Granule, va_bits: u32) -> Option<Self> {
        if va_bits < MIN_VA_BITS || va_bits > MAX_VA_BITS {
            return None;
        }
        let space = Self { granule, va_bits };
        if space.root_level().is_leaf() {
            return None;
        }
        Some(space)
    }

    /// The translation granule.
    #[inline]
    #[must_use]
    pub const fn granule(self) -> Granule {
        self.granule
    }

    /// Width of the input address in bits.
    #[inline]
    #[must_use]
    pub const fn va_bits(self) -> u32 {
        self.va_bits
    }

    /// Size of the address space in bytes.
    #[inline]
    #[must_use]
    pub const fn size(self) -> u64 {
        1 << self.va_bits
    }

    /// log2 of the region covered by one entry at `level`.
    #[inline]
    #[must_use]
    pub const fn level_shift(self, level: XlatLevel) -> u32 {
        self.granule.shift() + (3 - level.as_u8() as u32) * self.granule.bits_per_level()
    }

    /// Bytes covered by one entry at `level`.
    #[inline]
    #[must_use]
    pub const fn block_size(self, level: XlatLevel) -> u64 {
        1 << self.level_shift(level)
    }

    /// Whether an entry at `level` may terminate the walk.
    #[inline]
    #[must_use]
    pub const fn allows_leaf(self, level: XlatLevel) -> bool {
        level.is_leaf() || level.as_u8() >= self.granule.min_block_level().as_u8()
    }

    /// Initial lookup level.
    #[must_use]
    pub const fn root_level(self) -> XlatLevel {
        let mut level = 3u8;
        while level > 0 {
            let coarser = XlatLevel(level - 1);
            if self.level_shift(coarser) >= self.va_bits {
                break;
            }
            level -= 1;
        }
        XlatLevel(level)
    }

    /// Number of descriptors in the root table.
    #[inline]
    #[must_use]
    pub const fn root_entries(self) -> usize {
        1 << (self.va_bits - self.level_shift(self.root_level()))
    }

    /// Number of descriptors in a table at `level`.
    #[inline]
    #[must_use]
    pub const fn entries_at(self, level: XlatLevel) -> usize {
        if level.as_u8() == self.root_level().as_u8() {
            self.root_entries()
        } else {
            self.granule.entries_per_table()
        }
    }
}
