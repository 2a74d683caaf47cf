// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! QTI SoC memory map.

#[cfg(not(any(test, feature = "std")))]
use alloc::vec::Vec;

use crate::boot::{BootError, BootStage};
use crate::mmap::Region;
use qti_plat_def::{Access, Attributes, MemoryType, Security};

/// Start of the peripheral window.
pub const QTI_DEVICE_BASE: u64 = 0x1700_0000;
/// Size of the peripheral window (up to DDR).
pub const QTI_DEVICE_SIZE: u64 = 0x8000_0000 - QTI_DEVICE_BASE;

/// AOP command database, shared read-only with the non-secure world.
pub const QTI_AOP_CMD_DB_BASE: u64 = 0x8082_0000;
/// Size of the AOP command database.
pub const QTI_AOP_CMD_DB_SIZE: u64 = 0x0002_0000;

/// Load address of BL31.
pub const BL31_BASE: u64 = 0x80b0_0000;
/// End of the BL31 carve-out.
pub const BL31_LIMIT: u64 = 0x80c0_0000;

/// Regions every QTI stage maps besides its own image.
pub const PLAT_QTI_MMAP: [Region; 2] = [
    Region::new(
        "qti-device",
        QTI_DEVICE_BASE,
        QTI_DEVICE_SIZE,
        Attributes::secure_device(),
    ),
    Region::new(
        "aop-cmd-db",
        QTI_AOP_CMD_DB_BASE,
        QTI_AOP_CMD_DB_SIZE,
        Attributes::new(MemoryType::NormalCached, Access::RO, Security::NonSecure),
    ),
];

const _: () = {
    assert!(QTI_DEVICE_BASE + QTI_DEVICE_SIZE <= QTI_AOP_CMD_DB_BASE);
    assert!(QTI_AOP_CMD_DB_BASE + QTI_AOP_CMD_DB_SIZE <= BL31_BASE);
};

/// Section boundaries of a linked BL31 image.
///
/// The sections are contiguous: code `[code_start, code_end)`, read-only
/// data up to `rodata_end`, read-write data up to `rw_end`, then coherent
/// memory up to `coherent_end`. Empty sections are skipped.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Bl31Layout {
    /// First byte of code.
    pub code_start: u64,
    /// End of code, start of read-only data.
    pub code_end: u64,
    /// End of read-only data, start of read-write data.
    pub rodata_end: u64,
    /// End of read-write data, start of coherent memory.
    pub rw_end: u64,
    /// End of coherent memory.
    pub coherent_end: u64,
}

impl Bl31Layout {
    /// Reference layout of a 1 MB BL31 carve-out.
    pub const QTI: Self = Self {
        code_start: BL31_BASE,
        code_end: 0x80b2_c000,
        rodata_end: 0x80b3_a000,
        rw_end: 0x80bf_8000,
        coherent_end: BL31_LIMIT,
    };

    /// Regions of the image with their attributes, in address order.
    #[must_use]
    pub fn regions(&self) -> Vec<Region> {
        let sections = [
            ("bl31-code", self.code_start, self.code_end, Attributes::secure_code()),
            ("bl31-rodata", self.code_end, self.rodata_end, Attributes::secure_ro_data()),
            ("bl31-rw", self.rodata_end, self.rw_end, Attributes::secure_rw_data()),
            ("bl31-coherent", self.rw_end, self.coherent_end, Attributes::secure_device()),
        ];
        sections
            .into_iter()
            .filter(|&(_, start, end, _)| end > start)
            .map(|(name, start, end, attrs)| Region::new(name, start, end - start, attrs))
            .collect()
    }
}

/// Declares the BL31 image and the platform regions on `stage`.
///
/// # Errors
///
/// Returns the first declaration error.
pub fn declare_regions(stage: &mut BootStage, layout: &Bl31Layout) -> Result<(), BootError> {
    stage.add_regions(&layout.regions())?;
    stage.add_regions(&PLAT_QTI_MMAP)
}
