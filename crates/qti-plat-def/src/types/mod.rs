// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Core type definitions for addresses.
//!
//! These newtypes prevent accidentally mixing addresses with sizes and
//! table indices at compile time.

mod addr;


pub use addr::Paddr;
