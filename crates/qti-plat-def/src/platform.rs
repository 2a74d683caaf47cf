// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Boot sizing constants for QTI platforms.
//!
//! These are the build-time knobs of every boot stage. The raw constants keep
//! their platform names so they can be matched against board documentation;
//! code consumes them through [`PlatformConfig`], which validates ranges once
//! instead of trusting textual substitution.

use crate::granule::{AddressSpace, Granule, MAX_VA_BITS, MIN_VA_BITS};
use core::fmt;

/// Size of each execution-context stack (4 KB).
pub const PLATFORM_STACK_SIZE: u64 = 0x1000;

/// Maximum number of region descriptors in a boot stage's memory map.
pub const PLAT_QTI_MMAP_ENTRIES: usize = 12;

/// Maximum number of translation tables a boot stage may allocate.
///
/// The root table is allocated separately and does not count.
pub const MAX_XLAT_TABLES: usize = 12;

/// Number of CPU cores that receive their own stack.
pub const PLATFORM_CORE_COUNT: usize = 8;

/// Size of the physical address space (64 GB).
pub const PLAT_PHY_ADDR_SPACE_SIZE: u64 = 1 << 36;

/// Size of the virtual address space (64 GB).
pub const PLAT_VIRT_ADDR_SPACE_SIZE: u64 = 1 << 36;

/// `AArch64` requires the stack pointer to be 16-byte aligned.
pub const MIN_STACK_ALIGN: u64 = 16;

/// Translation granule used by all boot stages.
pub const PLAT_GRANULE: Granule = Granule::Size4K;

/// Smallest supported physical address size.
const MIN_PA_BITS: u32 = 32;

/// Largest supported physical address size.
const MAX_PA_BITS: u32 = 48;

/// Invalid configuration constant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// `PLATFORM_STACK_SIZE` is not a power-of-two multiple of `MIN_STACK_ALIGN`.
    InvalidStackSize(u64),
    /// `PLAT_QTI_MMAP_ENTRIES` is zero.
    ZeroMmapEntries,
    /// Virtual address space size is not supported for the granule.
    InvalidVirtualAddressSpace(u32),
    /// Physical address space size is not supported.
    InvalidPhysicalAddressSpace(u32),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidStackSize(size) => write!(
                f,
                "PLATFORM_STACK_SIZE ({size:#x}) must be a power-of-two multiple of {MIN_STACK_ALIGN}"
            ),
            Self::ZeroMmapEntries => write!(f, "PLAT_QTI_MMAP_ENTRIES must be non-zero"),
            Self::InvalidVirtualAddressSpace(bits) => write!(
                f,
                "virtual address space of {bits} bits not supported ({MIN_VA_BITS}..={MAX_VA_BITS})"
            ),
            Self::InvalidPhysicalAddressSpace(bits) => write!(
                f,
                "physical address space of {bits} bits not supported ({MIN_PA_BITS}..={MAX_PA_BITS})"
            ),
        }
    }
}

impl core::error::Error for ConfigError {}

/// Typed, validated form of the boot sizing constants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlatformConfig {
    /// Bytes per execution-context stack.
    pub stack_size: u64,
    /// Region descriptor capacity of a memory map.
    pub mmap_entries: usize,
    /// Translation table budget, excluding the root table.
    pub max_xlat_tables: usize,
    /// Number of cores that get a stack.
    pub core_count: usize,
    /// Translation granule.
    pub granule: Granule,
    /// log2 of the virtual address space size.
    pub va_bits: u32,
    /// log2 of the physical address space size.
    pub pa_bits: u32,
}

impl PlatformConfig {
    /// The configuration every QTI boot stage is built with.
    pub const QTI: Self = Self {
        stack_size: PLATFORM_STACK_SIZE,
        mmap_entries: PLAT_QTI_MMAP_ENTRIES,
        max_xlat_tables: MAX_XLAT_TABLES,
        core_count: PLATFORM_CORE_COUNT,
        granule: PLAT_GRANULE,
        va_bits: PLAT_VIRT_ADDR_SPACE_SIZE.trailing_zeros(),
        pa_bits: PLAT_PHY_ADDR_SPACE_SIZE.trailing_zeros(),
    };

    /// Checks every field against its allowed range.
    ///
    /// # Errors
    ///
    /// Returns the first invalid constant.
    pub const fn validate(&self) -> Result<(), ConfigError> {
        if !self.stack_size.is_power_of_two() || self.stack_size < MIN_STACK_ALIGN {
            return Err(ConfigError::InvalidStackSize(self.stack_size));
        }
        if self.mmap_entries == 0 {
            return Err(ConfigError::ZeroMmapEntries);
        }
        if self.pa_bits < MIN_PA_BITS || self.pa_bits > MAX_PA_BITS {
            return Err(ConfigError::InvalidPhysicalAddressSpace(self.pa_bits));
        }
        match AddressSpace::new(self.granule, self.va_bits) {
            Some(_) => Ok(()),
            None => Err(ConfigError::InvalidVirtualAddressSpace(self.va_bits)),
        }
    }

    /// Returns the translation geometry described by this configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub const fn address_space(&self) -> Result<AddressSpace, ConfigError> {
        if let Err(err) = self.validate() {
            return Err(err);
        }
        match AddressSpace::new(self.granule, self.va_bits) {
            Some(space) => Ok(space),
            None => Err(ConfigError::InvalidVirtualAddressSpace(self.va_bits)),
        }
    }

    /// Exclusive upper bound of addresses a flat mapping can reach.
    #[inline]
    #[must_use]
    pub const fn mapping_limit(&self) -> u64 {
        let va = 1u64 << self.va_bits;
        let pa = 1u64 << self.pa_bits;
        if va < pa { va } else { pa }
    }
}

impl Default for PlatformConfig {
    fn default() -> Self {
        Self::QTI
    }
}

// Compile-time verification of the shipped constants
const _: () = {
    assert!(PLATFORM_STACK_SIZE.is_power_of_two());
    assert!(PLATFORM_STACK_SIZE % MIN_STACK_ALIGN == 0);
    assert!(PLAT_PHY_ADDR_SPACE_SIZE.is_power_of_two());
    assert!(PLAT_VIRT_ADDR_SPACE_SIZE.is_power_of_two());
    assert!(PlatformConfig::QTI.validate().is_ok());
};
