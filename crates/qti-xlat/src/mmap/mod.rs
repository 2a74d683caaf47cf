// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Memory map table.
//!
//! A boot stage declares the physical regions it needs mapped into a
//! [`MemoryMapBuilder`]. The builder enforces the descriptor invariants at
//! every `add`:
//! - base and size are granule aligned, size is non-zero
//! - the region fits the configured address space without overflow
//! - the attributes are representable by a stage-1 descriptor
//! - regions with different attributes never overlap
//! - the table never holds more than `PLAT_QTI_MMAP_ENTRIES` descriptors
//!
//! Regions with identical attributes that overlap or touch are coalesced into
//! one descriptor so they consume a single table slot.
//!
//! [`MemoryMapBuilder::finalize`] consumes the builder and returns the sorted,
//! immutable [`MemoryMap`] that the planner accepts.


#[cfg(not(any(test, feature = "std")))]
use alloc::vec::Vec;

use core::fmt;
use qti_plat_def::{AddressSpace, AttrViolation, Attributes, ConfigError, Paddr, PlatformConfig};

/// A single region descriptor: flat-mapped physical range plus attributes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Region {
    /// Diagnostic name, reported when the region triggers a failure.
    name: &'static str,
    /// Granule-aligned base address.
    base: Paddr,
    /// Size in bytes, a non-zero multiple of the granule.
    size: u64,
    /// Mapping attributes.
    attrs: Attributes,
}

impl Region {
    /// Declares a region. Validation happens when it is added to a map.
    #[inline]
    #[must_use]
    pub const fn new(name: &'static str, base: u64, size: u64, attrs: Attributes) -> Self {
        Self {
            name,
            base: Paddr::new(base),
            size,
            attrs,
        }
    }

    /// Diagnostic name.
    #[inline]
    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }

    /// First byte of the region.
    #[inline]
    #[must_use]
    pub const fn base(&self) -> Paddr {
        self.base
    }

    /// Size in bytes.
    #[inline]
    #[must_use]
    pub const fn size(&self) -> u64 {
        self.size
    }

    /// Mapping attributes.
    #[inline]
    #[must_use]
    pub const fn attrs(&self) -> Attributes {
        self.attrs
    }

    /// One past the last byte (saturates for regions that failed validation).
    #[inline]
    #[must_use]
    pub const fn end(&self) -> Paddr {
        Paddr::new(self.base.as_u64().saturating_add(self.size))
    }

    /// Checks if the region contains `addr`.
    #[inline]
    #[must_use]
    pub const fn contains(&self, addr: Paddr) -> bool {
        addr.as_u64() >= self.base.as_u64() && addr.as_u64() < self.end().as_u64()
    }

    /// Checks if the two regions share at least one byte.
    #[inline]
    #[must_use]
    pub const fn overlaps(&self, other: &Self) -> bool {
        self.base.as_u64() < other.end().as_u64() && other.base.as_u64() < self.end().as_u64()
    }

    /// Checks if the two regions overlap or are directly adjacent.
    #[inline]
    #[must_use]
    const fn touches(&self, other: &Self) -> bool {
        self.base.as_u64() <= other.end().as_u64() && other.base.as_u64() <= self.end().as_u64()
    }

    /// Smallest region covering both, named after `self`.
    const fn union(&self, other: &Self) -> Self {
        let base = if self.base.as_u64() < other.base.as_u64() {
            self.base
        } else {
            other.base
        };
        let end = if self.end().as_u64() > other.end().as_u64() {
            self.end()
        } else {
            other.end()
        };
        Self {
            name: self.name,
            base,
            size: end.as_u64() - base.as_u64(),
            attrs: self.attrs,
        }
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "'{}' [{:#x}..{:#x}) {}",
            self.name,
            self.base.as_u64(),
            self.end().as_u64(),
            self.attrs
        )
    }
}

/// Error while declaring the memory map.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MmapError {
    /// The platform configuration is invalid.
    Config(ConfigError),
    /// Region has zero size.
    ZeroSize(Region),
    /// Base or size is not a multiple of the granule.
    Misaligned {
        /// Offending region.
        region: Region,
        /// Required alignment in bytes.
        granule: u64,
    },
    /// `base + size` overflows the 64-bit address width.
    AddressOverflow(Region),
    /// Region ends beyond the configured address space.
    OutOfAddressSpace {
        /// Offending region.
        region: Region,
        /// Exclusive limit of mappable addresses.
        limit: u64,
    },
    /// Attributes cannot be expressed exactly by a descriptor.
    InvalidAttributes {
        /// Offending region.
        region: Region,
        /// Violated rule.
        violation: AttrViolation,
    },
    /// Adding the region would exceed `PLAT_QTI_MMAP_ENTRIES`.
    CapacityExceeded {
        /// Region that did not fit.
        region: Region,
        /// Configured capacity.
        capacity: usize,
    },
    /// Region overlaps an existing one with different attributes.
    OverlapConflict {
        /// Region being added.
        region: Region,
        /// Region already in the table.
        existing: Region,
    },
    /// The map was already finalized.
    AlreadyFinalized(Region),
}

impl fmt::Display for MmapError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config(err) => write!(f, "invalid platform configuration: {err}"),
            Self::ZeroSize(region) => write!(f, "region {region} has zero size"),
            Self::Misaligned { region, granule } => {
                write!(f, "region {region} is not aligned to the {granule:#x} granule")
            }
            Self::AddressOverflow(region) => write!(
                f,
                "region '{}' at {} overflows the address width",
                region.name(),
                region.base()
            ),
            Self::OutOfAddressSpace { region, limit } => {
                write!(f, "region {region} ends beyond the address space limit {limit:#x}")
            }
            Self::InvalidAttributes { region, violation } => {
                write!(f, "region {region} has invalid attributes: {violation}")
            }
            Self::CapacityExceeded { region, capacity } => write!(
                f,
                "region {region} exceeds PLAT_QTI_MMAP_ENTRIES ({capacity})"
            ),
            Self::OverlapConflict { region, existing } => {
                write!(f, "region {region} overlaps {existing} with different attributes")
            }
            Self::AlreadyFinalized(region) => {
                write!(f, "region {region} declared after the memory map was finalized")
            }
        }
    }
}

impl core::error::Error for MmapError {}

impl From<ConfigError> for MmapError {
    fn from(err: ConfigError) -> Self {
        Self::Config(err)
    }
}

/// Mutable memory map under construction.
#[derive(Debug, Clone)]
pub struct MemoryMapBuilder {
    /// Translation geometry regions are validated against.
    space: AddressSpace,
    /// Exclusive limit of mappable addresses.
    limit: u64,
    /// Maximum number of descriptors.
    capacity: usize,
    /// Descriptors in declaration order (coalesced descriptors move to the end).
    regions: Vec<Region>,
}

impl MemoryMapBuilder {
    /// Creates an empty memory map for the given platform.
    ///
    /// # Errors
    ///
    /// Returns `MmapError::Config` if the configuration is invalid.
    pub fn new(config: &PlatformConfig) -> Result<Self, MmapError> {
        let space = config.address_space()?;
        Ok(Self {
            space,
            limit: config.mapping_limit(),
            capacity: config.mmap_entries,
            regions: Vec::with_capacity(config.mmap_entries),
        })
    }

    /// Number of descriptors currently held.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.regions.len()
    }

    /// Returns true if no region was declared yet.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }

    /// Maximum number of descriptors.
    #[inline]
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Descriptors held so far, unsorted.
    #[inline]
    #[must_use]
    pub fn regions(&self) -> &[Region] {
        &self.regions
    }

    /// Adds a region, coalescing it with identical-attribute neighbours.
    ///
    /// The table is left unchanged if an error is returned.
    ///
    /// # Errors
    ///
    /// Returns a validation error for malformed regions, `OverlapConflict`
    /// for overlaps with differing attributes and `CapacityExceeded` if the
    /// resulting table would not fit.
    pub fn add(&mut self, region: Region) -> Result<(), MmapError> {
        self.validate(&region)?;

        let mut merged = region;
        let mut absorbed = 0usize;
        for existing in &self.regions {
            if existing.attrs() != region.attrs() {
                if existing.overlaps(&region) {
                    return Err(MmapError::OverlapConflict {
                        region,
                        existing: *existing,
                    });
                }
                continue;
            }
            if existing.touches(&region) {
                // Keep the name of the descriptor already in the table
                merged = if absorbed == 0 {
                    existing.union(&merged)
                } else {
                    merged.union(existing)
                };
                absorbed += 1;
            }
        }

        if self.regions.len() - absorbed + 1 > self.capacity {
            return Err(MmapError::CapacityExceeded {
                region,
                capacity: self.capacity,
            });
        }

        if absorbed > 0 {
            tracing::debug!(
                region = region.name(),
                into = merged.name(),
                base = %merged.base(),
                size = merged.size(),
                absorbed,
                "mmap: coalesced region"
            );
            self.regions
                .retain(|existing| existing.attrs() != region.attrs() || !existing.touches(&region));
        } else {
            tracing::debug!(
                region = region.name(),
                base = %region.base(),
                size = region.size(),
                attrs = %region.attrs(),
                "mmap: added region"
            );
        }
        self.regions.push(merged);
        Ok(())
    }

    /// Adds every region in order, stopping at the first error.
    ///
    /// # Errors
    ///
    /// Returns the error of the first region that could not be added.
    pub fn add_all(&mut self, regions: &[Region]) -> Result<(), MmapError> {
        for region in regions {
            self.add(*region)?;
        }
        Ok(())
    }

    /// Sorts the descriptors by base address and freezes the table.
    #[must_use]
    pub fn finalize(self) -> MemoryMap {
        let Self {
            space,
            capacity,
            mut regions,
            ..
        } = self;
        regions.sort_unstable_by_key(Region::base);
        tracing::debug!(regions = regions.len(), capacity, "mmap: finalized");
        MemoryMap {
            space,
            capacity,
            regions,
        }
    }

    /// Checks the per-descriptor invariants.
    fn validate(&self, region: &Region) -> Result<(), MmapError> {
        if region.size() == 0 {
            return Err(MmapError::ZeroSize(*region));
        }
        let granule = self.space.granule().size();
        if region.base().as_u64() % granule != 0 || region.size() % granule != 0 {
            return Err(MmapError::Misaligned {
                region: *region,
                granule,
            });
        }
        let end = region
            .base()
            .checked_add(region.size())
            .ok_or(MmapError::AddressOverflow(*region))?;
        if end.as_u64() > self.limit {
            return Err(MmapError::OutOfAddressSpace {
                region: *region,
                limit: self.limit,
            });
        }
        region
            .attrs()
            .check_representable()
            .map_err(|violation| MmapError::InvalidAttributes {
                region: *region,
                violation,
            })
    }
}

/// Finalized memory map: sorted by base, non-overlapping, immutable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryMap {
    space: AddressSpace,
    capacity: usize,
    regions: Vec<Region>,
}

impl MemoryMap {
    /// Descriptors in ascending base order.
    #[inline]
    #[must_use]
    pub fn regions(&self) -> &[Region] {
        &self.regions
    }

    /// Number of descriptors.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.regions.len()
    }

    /// Returns true if the map declares no region.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }

    /// Capacity the map was declared with.
    #[inline]
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Translation geometry the regions were validated against.
    #[inline]
    #[must_use]
    pub const fn address_space(&self) -> AddressSpace {
        self.space
    }

    /// Returns the region containing `addr`, if any.
    #[must_use]
    pub fn find(&self, addr: Paddr) -> Option<&Region> {
        let index = self.regions.partition_point(|region| region.end() <= addr);
        self.regions.get(index).filter(|region| region.contains(addr))
    }

    /// Iterates over the regions declared as device memory.
    pub fn device_regions(&self) -> impl Iterator<Item = &Region> {
        self.regions
            .iter()
            .filter(|region| !region.attrs().memory.is_normal())
    }
}

impl fmt::Display for MemoryMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "mmap ({}/{} entries):", self.regions.len(), self.capacity)?;
        for region in &self.regions {
            writeln!(
                f,
                "  PA:{:#014x} size:{:#012x} attr:{} '{}'",
                region.base().as_u64(),
                region.size(),
                region.attrs(),
                region.name()
            )?;
        }
        Ok(())
    }
}
