// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Tests for the QTI memory map.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use super::*;
use crate::boot::{BootError, BootStage};
use crate::emitter::DescriptorImage;
use crate::mmap::{MmapError, Region};
use qti_plat_def::{Attributes, Paddr, PlatformConfig, XlatLevel};

fn declared() -> BootStage {
    let mut stage = BootStage::new(&PlatformConfig::QTI).unwrap();
    declare_regions(&mut stage, &Bl31Layout::QTI).unwrap();
    stage
}

#[test]
fn reference_layout_has_four_sections() {
    let names: Vec<_> = Bl31Layout::QTI
        .regions()
        .iter()
        .map(Region::name)
        .collect();
    assert_eq!(
        names,
        ["bl31-code", "bl31-rodata", "bl31-rw", "bl31-coherent"]
    );
}

#[test]
fn empty_sections_are_skipped() {
    let layout = Bl31Layout {
        rw_end: BL31_LIMIT,
        ..Bl31Layout::QTI
    };
    assert_eq!(layout.regions().len(), 3);
}

#[test]
fn reference_map_fits_budget() {
    let mut stage = declared();
    assert_eq!(stage.finalize().unwrap().len(), 6);

    let plan = stage.plan().unwrap();
    assert_eq!(plan.table_count(), 4);

    // Second GB of the device window is a single block
    let leaf = plan.translate(Paddr::new(0x4000_0000)).unwrap();
    assert_eq!(leaf.level, XlatLevel::L1);
    assert_eq!(leaf.attrs, Attributes::secure_device());
}

#[test]
fn reference_map_activates() {
    let mut stage = declared();
    stage.finalize().unwrap();
    stage.plan().unwrap();

    let mut image = DescriptorImage::new(Paddr::new(0x8100_0000), 0x5000);
    stage.activate(&mut image).unwrap();

    let code = image.translate(Paddr::new(BL31_BASE)).unwrap();
    assert_eq!(code.attrs, Attributes::secure_code());
    let aop = image.translate(Paddr::new(QTI_AOP_CMD_DB_BASE)).unwrap();
    assert_eq!(aop.attrs, PLAT_QTI_MMAP[1].attrs());
}

#[test]
fn overlapping_layout_is_rejected() {
    let mut stage = BootStage::new(&PlatformConfig::QTI).unwrap();
    let layout = Bl31Layout {
        code_start: QTI_AOP_CMD_DB_BASE,
        ..Bl31Layout::QTI
    };
    let err = declare_regions(&mut stage, &layout).unwrap_err();
    assert!(matches!(
        err,
        BootError::Mmap(MmapError::OverlapConflict { .. })
    ));
}
