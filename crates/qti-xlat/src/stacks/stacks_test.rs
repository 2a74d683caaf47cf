// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Tests for the stack allocator.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use super::*;
use crate::mmap::MemoryMapBuilder;
use qti_plat_def::Attributes;

fn allocator() -> StackAllocator {
    StackAllocator::new(&PlatformConfig::QTI).unwrap()
}

#[test]
fn four_contexts_fill_pool() {
    let stacks = allocator()
        .allocate(4, Paddr::new(0), 0x4000)
        .unwrap();

    let bases: Vec<_> = stacks.regions().iter().map(|s| s.base().as_u64()).collect();
    assert_eq!(bases, [0, 0x1000, 0x2000, 0x3000]);
    assert!(stacks.regions().iter().all(|s| s.size() == 0x1000));
    assert_eq!(stacks.stack_top(3), Some(Paddr::new(0x4000)));
}

#[test]
fn fifth_context_exceeds_pool() {
    assert_eq!(
        allocator().allocate(5, Paddr::new(0), 0x4000),
        Err(StackError::InsufficientStackPool {
            contexts: 5,
            needed: Some(0x5000),
            available: 0x4000,
        })
    );
}

#[test]
fn stacks_are_offset_from_pool_base() {
    let stacks = allocator()
        .allocate(2, Paddr::new(0x1410_0000), 0x2000)
        .unwrap();
    let first = stacks.region(0).unwrap();
    let second = stacks.region(1).unwrap();
    assert_eq!(first.context(), 0);
    assert_eq!(first.top(), second.base());
    assert_eq!(second.top(), Paddr::new(0x1410_2000));
    assert!(stacks.region(2).is_none());
}

#[test]
fn zero_contexts_is_empty() {
    let stacks = allocator().allocate(0, Paddr::new(0), 0).unwrap();
    assert!(stacks.is_empty());
}

#[test]
fn cores_get_one_stack_each() {
    let stacks = allocator()
        .allocate_for_cores(Paddr::new(0x1420_0000), 0x8000)
        .unwrap();
    assert_eq!(stacks.len(), 8);
}

#[test]
fn misaligned_pool_rejected() {
    assert_eq!(
        allocator().allocate(1, Paddr::new(0x1008), 0x1000),
        Err(StackError::MisalignedPool(Paddr::new(0x1008)))
    );
}

#[test]
fn overflowing_request_rejected() {
    let err = allocator()
        .allocate(usize::MAX, Paddr::new(0), u64::MAX)
        .unwrap_err();
    assert!(matches!(
        err,
        StackError::InsufficientStackPool { needed: None, .. }
    ));
}

#[test]
fn pool_wrapping_address_space_rejected() {
    let err = allocator()
        .allocate(2, Paddr::new(u64::MAX - 0xfff), 0x2000)
        .unwrap_err();
    assert!(matches!(err, StackError::InsufficientStackPool { .. }));
}

#[test]
fn device_aliasing_detected() {
    let mut builder = MemoryMapBuilder::new(&PlatformConfig::QTI).unwrap();
    let uart = Region::new("uart", 0x0890_1000, 0x1000, Attributes::secure_device());
    builder.add(uart).unwrap();
    builder
        .add(Region::new(
            "ram",
            0x0890_2000,
            0x1000,
            Attributes::secure_rw_data(),
        ))
        .unwrap();
    let map = builder.finalize();

    let clear = allocator()
        .allocate(1, Paddr::new(0x0890_2000), 0x1000)
        .unwrap();
    assert_eq!(clear.check_device_aliasing(&map), Ok(()));

    let aliased = allocator()
        .allocate(2, Paddr::new(0x0890_0000), 0x2000)
        .unwrap();
    assert_eq!(
        aliased.check_device_aliasing(&map),
        Err(StackError::AliasesDevice {
            context: 1,
            region: uart
        })
    );
}

#[test]
fn invalid_config_rejected() {
    let config = PlatformConfig {
        stack_size: 0x1800,
        ..PlatformConfig::QTI
    };
    assert_eq!(
        StackAllocator::new(&config).unwrap_err(),
        StackError::Config(ConfigError::InvalidStackSize(0x1800))
    );
}

#[test]
fn error_messages_name_constants() {
    let err = allocator().allocate(5, Paddr::new(0), 0x4000).unwrap_err();
    assert!(err.to_string().contains("PLATFORM_STACK_SIZE"));

    let err = StackError::MisalignedPool(Paddr::new(0x8));
    assert!(err.to_string().contains("MIN_STACK_ALIGN (16)"));
}
