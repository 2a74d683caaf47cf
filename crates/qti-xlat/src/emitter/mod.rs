// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! MMU programming seam.
//!
//! [`MmuEmitter`] is the boundary between the pure planner and hardware.
//! Real firmware implements it by writing the descriptors into its table pool
//! and programming `MAIR_EL3`, `TCR_EL3` and `TTBR0_EL3`.
//!
//! [`DescriptorImage`] is the shipped emitter: it serializes a plan into
//! VMSAv8-64 stage-1 descriptors for the EL3 translation regime, laid out one
//! granule-sized table after another in a caller-provided pool (root first).
//! It does not touch system registers, so it also runs on the host, where
//! [`DescriptorImage::translate`] walks the raw descriptors the way the
//! hardware table walker would.

#[cfg(any(test, feature = "std"))]
mod mock;

#[cfg(any(test, feature = "std"))]
pub use mock::MockMmu;

#[cfg(not(any(test, feature = "std")))]
use alloc::vec::Vec;

use crate::planner::{Entry, LeafMapping, XlatPlan};
use bitflags::bitflags;
use core::fmt;
use qti_plat_def::{
    Access, AddressSpace, Attributes, MemoryType, Paddr, Security, XlatLevel,
};

bitflags! {
    /// Stage-1 VMSAv8-64 descriptor fields used by the EL3 regime.
    pub struct DescriptorAttr: u64 {
        /// Descriptor is valid.
        const VALID =       1 << 0;
        /// Table descriptor, or page descriptor at level 3.
        const NON_BLOCK =   1 << 1;
        /// Memory attributes index into `MAIR_EL3`.
        const ATTR_INDX =   0b111 << 2;
        /// Output address is in the Non-secure physical address space.
        const NS =          1 << 5;
        /// AP[1], RES1 in single VA range regimes.
        const AP_RES1 =     1 << 6;
        /// AP[2], read-only.
        const AP_RO =       1 << 7;
        /// Shareability: Inner (with `SHAREABLE`).
        const INNER =       1 << 8;
        /// Shareability: Inner or Outer Shareable.
        const SHAREABLE =   1 << 9;
        /// Access flag.
        const AF =          1 << 10;
        /// Execute-never.
        const XN =          1 << 54;
    }
}

/// `MAIR_EL3` index of Device-nGnRE memory.
pub const ATTR_DEVICE_INDEX: u64 = 0;
/// `MAIR_EL3` index of Normal inner/outer write-back write-allocate memory.
pub const ATTR_NORMAL_WB_INDEX: u64 = 1;
/// `MAIR_EL3` index of Normal non-cacheable memory.
pub const ATTR_NON_CACHEABLE_INDEX: u64 = 2;

/// `MAIR_EL3` value matching the attribute indices above.
pub const MAIR_EL3: u64 = 0x04 << (8 * ATTR_DEVICE_INDEX)
    | 0xff << (8 * ATTR_NORMAL_WB_INDEX)
    | 0x44 << (8 * ATTR_NON_CACHEABLE_INDEX);

/// Output address bits of a descriptor (48-bit physical addresses).
const OUTPUT_ADDR_MASK: u64 = 0x0000_ffff_ffff_f000;

impl DescriptorAttr {
    /// Descriptor attributes for a leaf carrying `attrs`.
    #[must_use]
    pub const fn from_attributes(attrs: Attributes) -> Self {
        let mut bits = Self::VALID.bits() | Self::AP_RES1.bits() | Self::AF.bits();
        bits |= match attrs.memory {
            MemoryType::Device => (ATTR_DEVICE_INDEX << 2) | Self::SHAREABLE.bits(),
            MemoryType::NormalCached => {
                (ATTR_NORMAL_WB_INDEX << 2) | Self::SHAREABLE.bits() | Self::INNER.bits()
            }
            MemoryType::NormalUncached => {
                (ATTR_NON_CACHEABLE_INDEX << 2) | Self::SHAREABLE.bits()
            }
        };
        if matches!(attrs.security, Security::NonSecure) {
            bits |= Self::NS.bits();
        }
        if !attrs.access.write {
            bits |= Self::AP_RO.bits();
        }
        if !attrs.access.execute {
            bits |= Self::XN.bits();
        }
        Self::from_bits_truncate(bits)
    }

    /// Attributes carried by a leaf with these descriptor bits.
    ///
    /// Returns `None` for an attribute index outside the fixed MAIR layout.
    #[must_use]
    pub fn to_attributes(self) -> Option<Attributes> {
        let memory = match (self & Self::ATTR_INDX).bits() >> 2 {
            ATTR_DEVICE_INDEX => MemoryType::Device,
            ATTR_NORMAL_WB_INDEX => MemoryType::NormalCached,
            ATTR_NON_CACHEABLE_INDEX => MemoryType::NormalUncached,
            _ => return None,
        };
        let access = Access {
            read: true,
            write: !self.contains(Self::AP_RO),
            execute: !self.contains(Self::XN),
        };
        let security = if self.contains(Self::NS) {
            Security::NonSecure
        } else {
            Security::Secure
        };
        Some(Attributes::new(memory, access, security))
    }
}

/// Raw block or page descriptor mapping `addr` flat with `attrs`.
#[must_use]
pub const fn leaf_descriptor(addr: Paddr, attrs: Attributes, level: XlatLevel) -> u64 {
    let mut attr = DescriptorAttr::from_attributes(attrs).bits();
    if level.is_leaf() {
        attr |= DescriptorAttr::NON_BLOCK.bits();
    }
    attr | (addr.as_u64() & OUTPUT_ADDR_MASK)
}

/// Raw table descriptor pointing at the table stored at `table`.
#[must_use]
pub const fn table_descriptor(table: Paddr) -> u64 {
    DescriptorAttr::VALID.bits()
        | DescriptorAttr::NON_BLOCK.bits()
        | (table.as_u64() & OUTPUT_ADDR_MASK)
}

/// Error while activating a plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivationError {
    /// The table pool is not aligned to the translation granule.
    MisalignedPool {
        /// Pool base.
        base: Paddr,
        /// Required alignment.
        alignment: u64,
    },
    /// The table pool cannot hold every table of the plan.
    PoolTooSmall {
        /// Bytes needed.
        needed: u64,
        /// Bytes in the pool.
        available: u64,
    },
}

impl fmt::Display for ActivationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MisalignedPool { base, alignment } => {
                write!(f, "table pool {base} is not aligned to {alignment:#x}")
            }
            Self::PoolTooSmall { needed, available } => write!(
                f,
                "table pool of {available:#x} bytes cannot hold {needed:#x} bytes of tables"
            ),
        }
    }
}

impl core::error::Error for ActivationError {}

/// Applies a plan to the MMU.
pub trait MmuEmitter {
    /// Makes `plan` the active translation regime.
    ///
    /// # Errors
    ///
    /// Returns an error if the plan cannot be installed. The previous regime
    /// stays active in that case.
    fn activate(&mut self, plan: &XlatPlan) -> Result<(), ActivationError>;
}

/// Descriptors written by a successful activation.
#[derive(Debug, Clone, PartialEq, Eq)]
struct ActiveImage {
    space: AddressSpace,
    /// One granule-sized table after another, root first.
    words: Vec<u64>,
}

/// Serializes plans into raw stage-1 descriptors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DescriptorImage {
    pool_base: Paddr,
    pool_size: u64,
    active: Option<ActiveImage>,
}

impl DescriptorImage {
    /// Creates an emitter writing into the pool `[pool_base, pool_base + pool_size)`.
    #[must_use]
    pub const fn new(pool_base: Paddr, pool_size: u64) -> Self {
        Self {
            pool_base,
            pool_size,
            active: None,
        }
    }

    /// Returns true once a plan has been activated.
    #[inline]
    #[must_use]
    pub const fn is_active(&self) -> bool {
        self.active.is_some()
    }

    /// Value for `TTBR0_EL3`: the root table address.
    #[must_use]
    pub const fn ttbr0(&self) -> Option<Paddr> {
        if self.active.is_some() {
            Some(self.pool_base)
        } else {
            None
        }
    }

    /// Raw descriptors of every table, root first.
    #[must_use]
    pub fn descriptors(&self) -> &[u64] {
        self.active.as_ref().map_or(&[][..], |image| image.words.as_slice())
    }

    /// Walks the raw descriptors for `addr`.
    ///
    /// Returns `None` if nothing is active, the address is unmapped, or a
    /// descriptor is malformed.
    #[must_use]
    pub fn translate(&self, addr: Paddr) -> Option<LeafMapping> {
        let image = self.active.as_ref()?;
        let space = image.space;
        if addr.as_u64() >= space.size() {
            return None;
        }

        let granule = space.granule();
        let mut level = space.root_level();
        let mut table_base = self.pool_base;
        loop {
            let table = usize::try_from(table_base.offset_from(self.pool_base)? / granule.size())
                .ok()?;
            let shift = space.level_shift(level);
            let index = usize::try_from((addr.as_u64() >> shift) & ((1 << granule.bits_per_level()) - 1))
                .ok()?;
            let word = *image.words.get(table * granule.entries_per_table() + index)?;
            let attr = DescriptorAttr::from_bits_truncate(word);

            if !attr.contains(DescriptorAttr::VALID) {
                return None;
            }
            let output = Paddr::new(word & OUTPUT_ADDR_MASK);
            let is_table = attr.contains(DescriptorAttr::NON_BLOCK) && !level.is_leaf();
            if is_table {
                table_base = output;
                level = level.finer()?;
                continue;
            }
            if !space.allows_leaf(level) {
                return None;
            }
            return Some(LeafMapping {
                base: output,
                size: space.block_size(level),
                level,
                attrs: attr.to_attributes()?,
            });
        }
    }

    fn table_address(&self, table: usize, granule: u64) -> Paddr {
        Paddr::new(self.pool_base.as_u64() + table as u64 * granule)
    }
}

impl MmuEmitter for DescriptorImage {
    fn activate(&mut self, plan: &XlatPlan) -> Result<(), ActivationError> {
        let space = plan.address_space();
        let granule = space.granule().size();
        let entries_per_table = space.granule().entries_per_table();

        if self.pool_base.is_aligned(granule) != Some(true) {
            return Err(ActivationError::MisalignedPool {
                base: self.pool_base,
                alignment: granule,
            });
        }
        let needed = (plan.tables().len() as u64).saturating_mul(granule);
        if needed > self.pool_size || self.pool_base.checked_add(needed).is_none() {
            return Err(ActivationError::PoolTooSmall {
                needed,
                available: self.pool_size,
            });
        }

        let mut words = Vec::new();
        words.resize(plan.tables().len() * entries_per_table, 0);
        for (index, table) in plan.tables().iter().enumerate() {
            let words = &mut words[index * entries_per_table..(index + 1) * entries_per_table];
            for (slot, entry) in table.entries().iter().enumerate() {
                let addr = Paddr::new(table.base().as_u64() + slot as u64 * table.block_size());
                words[slot] = match *entry {
                    Entry::Invalid => 0,
                    Entry::Table(child) => {
                        table_descriptor(self.table_address(child.index(), granule))
                    }
                    Entry::Leaf(attrs) => leaf_descriptor(addr, attrs, table.level()),
                };
            }
        }

        self.active = Some(ActiveImage { space, words });
        tracing::info!(
            ttbr0 = %self.pool_base,
            tables = plan.tables().len(),
            mair = MAIR_EL3,
            "mmu: descriptors emitted"
        );
        Ok(())
    }
}
