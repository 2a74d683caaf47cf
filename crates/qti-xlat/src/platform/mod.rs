// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Platform memory maps.
//!
//! Static region tables of the supported SoCs and the BL31 image layout the
//! boot stage declares on top of them.

mod qti;
#[cfg(test)]
mod qti_test;

pub use qti::{
    BL31_BASE, BL31_LIMIT, Bl31Layout, PLAT_QTI_MMAP, QTI_AOP_CMD_DB_BASE, QTI_AOP_CMD_DB_SIZE,
    QTI_DEVICE_BASE, QTI_DEVICE_SIZE, declare_regions,
};
