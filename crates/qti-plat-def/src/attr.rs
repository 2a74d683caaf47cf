// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Mapping attributes for memory map regions.
//!
//! An attribute set is the combination of three independent properties:
//!
//! ```text
//! MemoryType   NORMAL_CACHED | NORMAL_UNCACHED | DEVICE
//! Access       READ | WRITE | EXECUTE
//! Security     SECURE | NON_SECURE
//! ```
//!
//! Two regions may only share a block or be coalesced when their attribute
//! sets compare equal. There is no notion of a "compatible" or "wider"
//! attribute set.

use core::fmt;

/// Memory type (caching policy) of a region.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum MemoryType {
    /// Normal memory, write-back cacheable.
    NormalCached = 0,

    /// Normal memory, non-cacheable (shared buffers with other masters).
    NormalUncached = 1,

    /// Device memory (MMIO). Never executable.
    Device = 2,
}

impl MemoryType {
    /// Returns true for both normal memory types.
    #[inline]
    #[must_use]
    pub const fn is_normal(self) -> bool {
        !matches!(self, Self::Device)
    }
}

/// Access permissions of a region.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Access {
    /// Allow reads.
    pub read: bool,
    /// Allow writes.
    pub write: bool,
    /// Allow instruction fetches.
    pub execute: bool,
}

impl Access {
    /// Read-only.
    pub const RO: Self = Self {
        read: true,
        write: false,
        execute: false,
    };

    /// Read-write.
    pub const RW: Self = Self {
        read: true,
        write: true,
        execute: false,
    };

    /// Read-execute (code).
    pub const RX: Self = Self {
        read: true,
        write: false,
        execute: true,
    };
}

/// Security state of the physical address space a region lives in.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Security {
    /// Secure physical address space.
    Secure = 0,

    /// Non-secure physical address space.
    NonSecure = 1,
}

/// Reason an attribute set cannot be expressed by a stage-1 descriptor
/// without silently changing the declared permissions.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AttrViolation {
    /// The descriptor format has no write-only or execute-only encoding.
    NotReadable,
    /// Writable memory is always mapped execute-never.
    WritableExecutable,
    /// Device memory is always mapped execute-never.
    ExecutableDevice,
}

impl fmt::Display for AttrViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotReadable => write!(f, "region must be readable"),
            Self::WritableExecutable => write!(f, "region cannot be both writable and executable"),
            Self::ExecutableDevice => write!(f, "device memory cannot be executable"),
        }
    }
}

/// Full attribute set of a region.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Attributes {
    /// Caching policy.
    pub memory: MemoryType,
    /// Access permissions.
    pub access: Access,
    /// Security state.
    pub security: Security,
}

impl Attributes {
    /// Creates an attribute set.
    #[inline]
    #[must_use]
    pub const fn new(memory: MemoryType, access: Access, security: Security) -> Self {
        Self {
            memory,
            access,
            security,
        }
    }

    /// Secure read-write device memory (`MT_DEVICE | MT_RW | MT_SECURE`).
    #[inline]
    #[must_use]
    pub const fn secure_device() -> Self {
        Self::new(MemoryType::Device, Access::RW, Security::Secure)
    }

    /// Secure cacheable code (`MT_CODE | MT_SECURE`).
    #[inline]
    #[must_use]
    pub const fn secure_code() -> Self {
        Self::new(MemoryType::NormalCached, Access::RX, Security::Secure)
    }

    /// Secure cacheable read-only data (`MT_RO_DATA | MT_SECURE`).
    #[inline]
    #[must_use]
    pub const fn secure_ro_data() -> Self {
        Self::new(MemoryType::NormalCached, Access::RO, Security::Secure)
    }

    /// Secure cacheable read-write data (`MT_MEMORY | MT_RW | MT_SECURE`).
    #[inline]
    #[must_use]
    pub const fn secure_rw_data() -> Self {
        Self::new(MemoryType::NormalCached, Access::RW, Security::Secure)
    }

    /// Checks that a stage-1 descriptor can carry this set exactly.
    ///
    /// # Errors
    ///
    /// Returns the first violated rule.
    pub const fn check_representable(self) -> Result<(), AttrViolation> {
        if !self.access.read {
            return Err(AttrViolation::NotReadable);
        }
        if self.access.execute {
            if self.access.write {
                return Err(AttrViolation::WritableExecutable);
            }
            if matches!(self.memory, MemoryType::Device) {
                return Err(AttrViolation::ExecutableDevice);
            }
        }
        Ok(())
    }
}

impl fmt::Display for Attributes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let memory = match self.memory {
            MemoryType::NormalCached => "MEM",
            MemoryType::NormalUncached => "NC",
            MemoryType::Device => "DEV",
        };
        let access = if self.access.write { "RW" } else { "RO" };
        let exec = if self.access.execute { "EXEC" } else { "XN" };
        let security = match self.security {
            Security::Secure => "S",
            Security::NonSecure => "NS",
        };
        write!(f, "{memory}-{access}-{exec}-{security}")
    }
}
