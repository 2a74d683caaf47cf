// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Boot stage integration tests.
//!
//! Drives whole stages through declare, finalize, plan and activate under
//! the QTI configuration.

// Test code prioritizes clarity over defensive programming
#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic, missing_docs)]

use qti_plat_def::{Attributes, Paddr, PlatformConfig, XlatLevel};
use qti_xlat::platform::{BL31_LIMIT, Bl31Layout, declare_regions};
use qti_xlat::{
    BootError, BootStage, DescriptorImage, MmapError, MockMmu, Phase, PlanError, Region,
    StackError,
};

const PAGE: u64 = 0x1000;
const L2_BLOCK: u64 = 0x20_0000;
const L1_BLOCK: u64 = 0x4000_0000;

fn stage() -> BootStage {
    BootStage::new(&PlatformConfig::QTI).unwrap()
}

// ============================================================================
// Memory map capacity
// ============================================================================

#[test]
fn twelve_device_pages_then_capacity_exceeded() {
    let mut stage = stage();
    for i in 0..12 {
        stage
            .add_region(Region::new(
                "dev",
                0x0800_0000 + i * 2 * PAGE,
                PAGE,
                Attributes::secure_device(),
            ))
            .unwrap();
    }

    let extra = Region::new("extra", 0x0900_0000, PAGE, Attributes::secure_device());
    let err = stage.add_region(extra).unwrap_err();
    assert_eq!(
        err,
        BootError::Mmap(MmapError::CapacityExceeded {
            region: extra,
            capacity: 12
        })
    );
    assert_eq!(stage.finalize().unwrap().len(), 12);
}

#[test]
fn conflicting_overlap_halts_declaration() {
    let mut stage = stage();
    let uart = Region::new("uart", 0x0890_0000, 4 * PAGE, Attributes::secure_device());
    stage.add_region(uart).unwrap();

    let ram = Region::new("ram", 0x0890_2000, PAGE, Attributes::secure_rw_data());
    assert_eq!(
        stage.add_region(ram),
        Err(BootError::Mmap(MmapError::OverlapConflict {
            region: ram,
            existing: uart
        }))
    );
}

// ============================================================================
// Translation table budget
// ============================================================================

#[test]
fn exactly_twelve_tables_plan() {
    let mut stage = stage();
    for i in 0..11 {
        stage
            .add_region(Region::new(
                "page",
                L1_BLOCK + i * L2_BLOCK,
                PAGE,
                Attributes::secure_rw_data(),
            ))
            .unwrap();
    }
    stage.finalize().unwrap();
    assert_eq!(stage.plan().unwrap().table_count(), 12);
}

#[test]
fn thirteenth_table_exceeds_budget() {
    let mut stage = stage();
    for i in 0..12 {
        stage
            .add_region(Region::new(
                "page",
                L1_BLOCK + i * L2_BLOCK,
                PAGE,
                Attributes::secure_rw_data(),
            ))
            .unwrap();
    }
    stage.finalize().unwrap();

    let err = stage.plan().unwrap_err();
    let BootError::Plan(PlanError::TableBudgetExceeded {
        index,
        region,
        level,
        limit,
        ..
    }) = err
    else {
        panic!("unexpected error: {err}");
    };
    assert_eq!(index, 11);
    assert_eq!(region.base(), Paddr::new(L1_BLOCK + 11 * L2_BLOCK));
    assert_eq!(level, XlatLevel::L3);
    assert_eq!(limit, 12);
    assert_eq!(stage.phase(), Phase::Finalized);
    assert!(err.to_string().contains("MAX_XLAT_TABLES (12)"));
}

#[test]
fn mixed_attributes_in_a_block_cost_a_table() {
    // A 2 MB block split between code and data cannot be one block
    let mut stage = stage();
    stage
        .add_regions(&[
            Region::new("code", 0x1400_0000, L2_BLOCK / 2, Attributes::secure_code()),
            Region::new(
                "data",
                0x1400_0000 + L2_BLOCK / 2,
                L2_BLOCK / 2,
                Attributes::secure_rw_data(),
            ),
        ])
        .unwrap();
    stage.finalize().unwrap();

    let plan = stage.plan().unwrap();
    assert_eq!(plan.table_count(), 2);
    assert_eq!(
        plan.translate(Paddr::new(0x1400_0000)).unwrap().attrs,
        Attributes::secure_code()
    );
    assert_eq!(
        plan.translate(Paddr::new(0x1410_0000)).unwrap().attrs,
        Attributes::secure_rw_data()
    );
}

// ============================================================================
// Stacks
// ============================================================================

#[test]
fn four_stacks_in_a_four_page_pool() {
    let allocator = qti_xlat::StackAllocator::new(&PlatformConfig::QTI).unwrap();
    let stacks = allocator.allocate(4, Paddr::new(0), 0x4000).unwrap();
    let offsets: Vec<_> = stacks
        .regions()
        .iter()
        .map(|stack| stack.base().as_u64())
        .collect();
    assert_eq!(offsets, [0, 0x1000, 0x2000, 0x3000]);

    assert!(matches!(
        allocator.allocate(5, Paddr::new(0), 0x4000),
        Err(StackError::InsufficientStackPool { .. })
    ));
}

// ============================================================================
// Full QTI stage
// ============================================================================

#[test]
fn qti_bl31_stage_boots() {
    let mut stage = stage();
    declare_regions(&mut stage, &Bl31Layout::QTI).unwrap();
    stage.finalize().unwrap();
    let plan = stage.plan().unwrap().clone();

    let mut image = DescriptorImage::new(Paddr::new(0x8100_0000), 0x10_0000);
    stage.activate(&mut image).unwrap();
    assert_eq!(stage.phase(), Phase::Active);

    // Declared attributes are the activated attributes
    for region in stage.memory_map().unwrap().regions() {
        let mut addr = region.base().as_u64();
        while addr < region.end().as_u64() {
            let leaf = image.translate(Paddr::new(addr)).unwrap();
            assert_eq!(leaf.attrs, region.attrs(), "{region}");
            addr = leaf.base.as_u64() + leaf.size;
        }
    }
    assert_eq!(image.translate(Paddr::new(0x1000_0000)), None);
    assert_eq!(plan.table_count(), 4);

    let stacks = stage
        .allocate_stacks(Paddr::new(BL31_LIMIT), 0x8000)
        .unwrap();
    assert_eq!(stacks.stack_top(7), Some(Paddr::new(BL31_LIMIT + 0x8000)));
}

#[test]
fn next_stage_starts_fresh() {
    let mut first = stage();
    declare_regions(&mut first, &Bl31Layout::QTI).unwrap();
    first.finalize().unwrap();
    first.plan().unwrap();
    first.activate(&mut MockMmu::new()).unwrap();

    let mut second = stage();
    assert_eq!(second.phase(), Phase::Declaring);
    declare_regions(&mut second, &Bl31Layout::QTI).unwrap();
    second.finalize().unwrap();
    assert_eq!(second.plan().unwrap(), first.xlat_plan().unwrap());
}
