// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! QTI platform definitions shared by every boot stage.
//!
//! This crate defines the vocabulary the memory map and translation table
//! code is written in:
//! - Physical address newtype
//! - Mapping attributes (memory type, access permissions, security state)
//! - Translation granule and level geometry
//! - Boot sizing constants and the validated `PlatformConfig`
//!
//! # Design Principles
//!
//! - **No dependencies**: Pure data types, 100% host-testable
//! - **Closed attribute set**: every attribute is an enum or a fixed struct,
//!   so consumers can match exhaustively
//! - **64-bit only**: QTI boot stages run in `AArch64` state
//!
//! # Modules
//!
//! - [`types`]: Address newtype (`Paddr`)
//! - [`attr`]: Region attributes (`MemoryType`, `Access`, `Security`)
//! - [`granule`]: Granule sizes and per-level block geometry
//! - [`platform`]: `PLATFORM_STACK_SIZE`, `PLAT_QTI_MMAP_ENTRIES`,
//!   `MAX_XLAT_TABLES` and friends

#![no_std]

pub mod attr;
pub mod granule;
pub mod platform;
pub mod types;

// Re-export commonly used types at crate root
pub use attr::{Access, AttrViolation, Attributes, MemoryType, Security};
pub use granule::{AddressSpace, Granule, XlatLevel};
pub use platform::{ConfigError, PlatformConfig};
pub use types::Paddr;
