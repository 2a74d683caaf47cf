// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Per-context stack carving.
//!
//! Every execution context (one per core) gets a `PLATFORM_STACK_SIZE` stack
//! cut from a contiguous pool. Stack `i` starts at `pool_base + i * size`.
//! AArch64 stacks grow down, so the initial stack pointer is the exclusive
//! end of the region.

#[cfg(test)]
mod stacks_test;

#[cfg(not(any(test, feature = "std")))]
use alloc::vec::Vec;

use crate::mmap::{MemoryMap, Region};
use core::fmt;
use qti_plat_def::platform::MIN_STACK_ALIGN;
use qti_plat_def::{ConfigError, Paddr, PlatformConfig};

/// Stack of one execution context.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StackRegion {
    context: usize,
    base: Paddr,
    size: u64,
}

impl StackRegion {
    /// Index of the owning context.
    #[inline]
    #[must_use]
    pub const fn context(&self) -> usize {
        self.context
    }

    /// Lowest address of the stack.
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

    /// Initial stack pointer (exclusive end).
    #[inline]
    #[must_use]
    pub const fn top(&self) -> Paddr {
        Paddr::new(self.base.as_u64() + self.size)
    }

    fn overlaps(&self, region: &Region) -> bool {
        self.base < region.end() && region.base() < self.top()
    }
}

impl fmt::Display for StackRegion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "stack #{} [{}..{})", self.context, self.base, self.top())
    }
}

/// Error while carving stacks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StackError {
    /// The platform configuration is invalid.
    Config(ConfigError),
    /// The pool cannot hold one stack per context.
    InsufficientStackPool {
        /// Requested number of contexts.
        contexts: usize,
        /// Bytes needed, `None` if the product overflows.
        needed: Option<u64>,
        /// Bytes in the pool.
        available: u64,
    },
    /// The pool base violates the minimum stack alignment.
    MisalignedPool(Paddr),
    /// A stack overlaps a DEVICE region.
    AliasesDevice {
        /// Offending context.
        context: usize,
        /// Device region it overlaps.
        region: Region,
    },
}

impl fmt::Display for StackError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config(err) => write!(f, "invalid platform configuration: {err}"),
            Self::InsufficientStackPool {
                contexts,
                needed: Some(needed),
                available,
            } => write!(
                f,
                "stack pool of {available:#x} bytes cannot hold {contexts} x PLATFORM_STACK_SIZE ({needed:#x} bytes)"
            ),
            Self::InsufficientStackPool {
                contexts,
                needed: None,
                available,
            } => write!(
                f,
                "stack pool of {available:#x} bytes cannot hold {contexts} x PLATFORM_STACK_SIZE (overflow)"
            ),
            Self::MisalignedPool(base) => write!(
                f,
                "stack pool base {base} is not aligned to MIN_STACK_ALIGN ({MIN_STACK_ALIGN})"
            ),
            Self::AliasesDevice { context, region } => {
                write!(f, "stack of context {context} aliases device region {region}")
            }
        }
    }
}

impl core::error::Error for StackError {}

impl From<ConfigError> for StackError {
    fn from(err: ConfigError) -> Self {
        Self::Config(err)
    }
}

/// Carves fixed-size stacks out of a pool.
#[derive(Debug, Clone, Copy)]
pub struct StackAllocator {
    stack_size: u64,
    core_count: usize,
}

impl StackAllocator {
    /// Creates an allocator for the given platform.
    ///
    /// # Errors
    ///
    /// Returns `StackError::Config` if the configuration is invalid.
    pub const fn new(config: &PlatformConfig) -> Result<Self, StackError> {
        match config.validate() {
            Ok(()) => Ok(Self {
                stack_size: config.stack_size,
                core_count: config.core_count,
            }),
            Err(err) => Err(StackError::Config(err)),
        }
    }

    /// Bytes per stack.
    #[inline]
    #[must_use]
    pub const fn stack_size(&self) -> u64 {
        self.stack_size
    }

    /// Splits the pool into `contexts` stacks, ordered by context index.
    ///
    /// # Errors
    ///
    /// - `MisalignedPool` if `pool_base` is not 16-byte aligned
    /// - `InsufficientStackPool` if the pool is smaller than
    ///   `contexts * stack_size` (or that product overflows)
    pub fn allocate(
        &self,
        contexts: usize,
        pool_base: Paddr,
        pool_size: u64,
    ) -> Result<StackRegions, StackError> {
        if pool_base.is_aligned(MIN_STACK_ALIGN) != Some(true) {
            return Err(StackError::MisalignedPool(pool_base));
        }

        let needed = (contexts as u64).checked_mul(self.stack_size);
        let fits = needed.is_some_and(|needed| {
            needed <= pool_size && pool_base.checked_add(needed).is_some()
        });
        if !fits {
            tracing::error!(
                contexts,
                pool_size,
                stack_size = self.stack_size,
                "stacks: pool too small"
            );
            return Err(StackError::InsufficientStackPool {
                contexts,
                needed,
                available: pool_size,
            });
        }

        let regions = (0..contexts)
            .map(|context| StackRegion {
                context,
                base: Paddr::new(pool_base.as_u64() + context as u64 * self.stack_size),
                size: self.stack_size,
            })
            .collect();

        tracing::info!(
            contexts,
            pool = %pool_base,
            stack_size = self.stack_size,
            "stacks: allocated"
        );
        Ok(StackRegions { regions })
    }

    /// Splits the pool into one stack per core (`PLATFORM_CORE_COUNT`).
    ///
    /// # Errors
    ///
    /// See [`StackAllocator::allocate`].
    pub fn allocate_for_cores(
        &self,
        pool_base: Paddr,
        pool_size: u64,
    ) -> Result<StackRegions, StackError> {
        self.allocate(self.core_count, pool_base, pool_size)
    }
}

/// The stacks of every context, ordered by context index.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StackRegions {
    regions: Vec<StackRegion>,
}

impl StackRegions {
    /// All stacks.
    #[inline]
    #[must_use]
    pub fn regions(&self) -> &[StackRegion] {
        &self.regions
    }

    /// Number of contexts.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.regions.len()
    }

    /// Returns true if no stack was carved.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }

    /// Stack of `context`.
    #[inline]
    #[must_use]
    pub fn region(&self, context: usize) -> Option<&StackRegion> {
        self.regions.get(context)
    }

    /// Initial stack pointer of `context`.
    #[inline]
    #[must_use]
    pub fn stack_top(&self, context: usize) -> Option<Paddr> {
        self.region(context).map(StackRegion::top)
    }

    /// Checks that no stack overlaps a DEVICE region of `map`.
    ///
    /// # Errors
    ///
    /// Returns `AliasesDevice` for the lowest context that aliases one.
    pub fn check_device_aliasing(&self, map: &MemoryMap) -> Result<(), StackError> {
        for stack in &self.regions {
            if let Some(region) = map.device_regions().find(|region| stack.overlaps(region)) {
                return Err(StackError::AliasesDevice {
                    context: stack.context,
                    region: *region,
                });
            }
        }
        Ok(())
    }
}
