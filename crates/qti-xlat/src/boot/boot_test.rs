// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Tests for boot stage sequencing.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use super::*;
use crate::emitter::{DescriptorImage, MockMmu};
use qti_plat_def::Attributes;

fn stage() -> BootStage {
    BootStage::new(&PlatformConfig::QTI).unwrap()
}

fn uart() -> Region {
    Region::new("uart", 0x0890_0000, 0x1000, Attributes::secure_device())
}

fn ram() -> Region {
    Region::new("ram", 0x1410_0000, 0x10_0000, Attributes::secure_rw_data())
}

#[test]
fn full_sequence() {
    let mut stage = stage();
    assert_eq!(stage.phase(), Phase::Declaring);

    stage.add_regions(&[uart(), ram()]).unwrap();
    assert_eq!(stage.finalize().unwrap().len(), 2);
    assert_eq!(stage.phase(), Phase::Finalized);

    assert_eq!(stage.plan().unwrap().table_count(), 3);
    assert_eq!(stage.phase(), Phase::Planned);

    let mut mmu = MockMmu::new();
    stage.activate(&mut mmu).unwrap();
    assert_eq!(stage.phase(), Phase::Active);
    assert_eq!(mmu.current(), stage.xlat_plan());
}

#[test]
fn add_after_finalize_names_region() {
    let mut stage = stage();
    stage.finalize().unwrap();
    assert_eq!(
        stage.add_region(uart()),
        Err(BootError::Mmap(MmapError::AlreadyFinalized(uart())))
    );
}

#[test]
fn finalize_twice_rejected() {
    let mut stage = stage();
    stage.finalize().unwrap();
    assert_eq!(stage.finalize().unwrap_err(), BootError::AlreadyFinalized);
}

#[test]
fn plan_before_finalize_rejected() {
    let mut stage = stage();
    stage.add_region(uart()).unwrap();
    assert_eq!(stage.plan().unwrap_err(), BootError::NotFinalized);
    assert!(stage.xlat_plan().is_none());
}

#[test]
fn plan_twice_returns_same_plan() {
    let mut stage = stage();
    stage.add_region(uart()).unwrap();
    stage.finalize().unwrap();
    let first = stage.plan().unwrap().clone();
    assert_eq!(stage.plan().unwrap(), &first);
}

#[test]
fn activate_before_plan_rejected() {
    let mut stage = stage();
    stage.finalize().unwrap();
    let mut mmu = MockMmu::new();
    assert_eq!(stage.activate(&mut mmu), Err(BootError::NotPlanned));
    assert!(mmu.activated().is_empty());
}

#[test]
fn activate_twice_rejected() {
    let mut stage = stage();
    stage.finalize().unwrap();
    stage.plan().unwrap();
    let mut mmu = MockMmu::new();
    stage.activate(&mut mmu).unwrap();
    assert_eq!(stage.activate(&mut mmu), Err(BootError::AlreadyActive));
    assert_eq!(mmu.activated().len(), 1);
}

#[test]
fn emitter_failure_keeps_stage_planned() {
    let mut stage = stage();
    stage.add_region(uart()).unwrap();
    stage.finalize().unwrap();
    stage.plan().unwrap();

    let err = ActivationError::PoolTooSmall {
        needed: 0x3000,
        available: 0,
    };
    let mut mmu = MockMmu::failing(err);
    assert_eq!(
        stage.activate(&mut mmu),
        Err(BootError::ActivationFailed(err))
    );
    assert_eq!(stage.phase(), Phase::Planned);

    // The retry goes through
    stage.activate(&mut mmu).unwrap();
    assert_eq!(stage.phase(), Phase::Active);
}

#[test]
fn activate_through_descriptor_image() {
    let mut stage = stage();
    stage.add_regions(&[uart(), ram()]).unwrap();
    stage.finalize().unwrap();
    stage.plan().unwrap();

    let mut image = DescriptorImage::new(Paddr::new(0x1420_0000), 0x4000);
    stage.activate(&mut image).unwrap();
    let leaf = image.translate(Paddr::new(0x0890_0000)).unwrap();
    assert_eq!(leaf.attrs, Attributes::secure_device());
}

#[test]
fn declare_errors_propagate() {
    let mut stage = stage();
    let empty = Region::new("empty", 0x8000_0000, 0, Attributes::secure_rw_data());
    assert_eq!(
        stage.add_region(empty),
        Err(BootError::Mmap(MmapError::ZeroSize(empty)))
    );
}

#[test]
fn stacks_need_finalized_map() {
    let stage = stage();
    assert_eq!(
        stage.allocate_stacks(Paddr::new(0x1430_0000), 0x8000),
        Err(BootError::NotFinalized)
    );
}

#[test]
fn stacks_are_checked_against_devices() {
    let mut stage = stage();
    stage.add_regions(&[uart(), ram()]).unwrap();
    stage.finalize().unwrap();

    let stacks = stage
        .allocate_stacks(Paddr::new(0x1430_0000), 0x8000)
        .unwrap();
    assert_eq!(stacks.len(), 8);

    let err = stage
        .allocate_stacks(Paddr::new(0x088f_c000), 0x8000)
        .unwrap_err();
    assert_eq!(
        err,
        BootError::Stack(StackError::AliasesDevice {
            context: 4,
            region: uart()
        })
    );
}

#[test]
fn invalid_config_rejected() {
    let config = PlatformConfig {
        mmap_entries: 0,
        ..PlatformConfig::QTI
    };
    assert_eq!(
        BootStage::new(&config).unwrap_err(),
        BootError::Config(ConfigError::ZeroMmapEntries)
    );
}

#[test]
fn error_display_names_region() {
    let err = BootError::from(MmapError::AlreadyFinalized(uart()));
    let text = err.to_string();
    assert!(text.starts_with("memory map: "));
    assert!(text.contains("'uart'"));
}
