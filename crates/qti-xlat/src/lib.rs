// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! # QTI Translation Table Planner
//!
//! Boot-time memory map and translation table budget for QTI boot stages.
//!
//! This crate turns a bounded, statically declared list of physical address
//! regions into a multi-level translation table layout before any dynamic
//! memory allocator exists in the firmware. It:
//! - Collects region descriptors into a capacity-bounded memory map
//! - Plans translation tables within the `MAX_XLAT_TABLES` budget
//! - Carves per-context stacks out of the stack pool
//! - Emits `AArch64` stage-1 descriptors through the [`emitter::MmuEmitter`] seam
//! - Sequences a boot stage through declare, finalize, plan and activate
//!
//! ## `no_std` Support
//!
//! The crate is `no_std` unless the `std` feature (default) is enabled or
//! tests are being built. Only `alloc` collections are required.

#![cfg_attr(not(any(test, feature = "std")), no_std)]

#[cfg(any(test, feature = "std"))]
extern crate std;

#[cfg(not(any(test, feature = "std")))]
extern crate alloc;

pub mod boot;
pub mod emitter;
pub mod mmap;
pub mod planner;
pub mod platform;
pub mod stacks;

// Re-export commonly used types at crate root
pub use boot::{BootError, BootStage, Phase};
#[cfg(any(test, feature = "std"))]
pub use emitter::MockMmu;
pub use emitter::{ActivationError, DescriptorImage, MmuEmitter};
pub use mmap::{MemoryMap, MemoryMapBuilder, MmapError, Region};
pub use planner::{LeafMapping, PlanError, XlatPlan, XlatPlanner};
pub use stacks::{StackAllocator, StackError, StackRegion, StackRegions};

/// Crate version.
pub const VERSION: &str = match option_env!("QTI_XLAT_VERSION") {
    Some(v) => v,
    None => "unknown",
};
