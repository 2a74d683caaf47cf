// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Mock MMU for testing.
//!
//! Records every plan it is asked to activate, allowing boot sequencing to be
//! tested without touching system registers.

use super::{ActivationError, MmuEmitter};
use crate::planner::XlatPlan;
use std::vec::Vec;

/// Mock MMU that remembers activated plans.
#[derive(Debug, Default)]
pub struct MockMmu {
    /// Plans activated so far, oldest first.
    activated: Vec<XlatPlan>,
    /// Error returned by the next activation, if any.
    fail_with: Option<ActivationError>,
}

impl MockMmu {
    /// Create a mock MMU that accepts every plan.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            activated: Vec::new(),
            fail_with: None,
        }
    }

    /// Create a mock MMU whose next activation fails with `err`.
    #[must_use]
    pub const fn failing(err: ActivationError) -> Self {
        Self {
            activated: Vec::new(),
            fail_with: Some(err),
        }
    }

    /// Plans activated so far.
    #[must_use]
    pub fn activated(&self) -> &[XlatPlan] {
        &self.activated
    }

    /// The most recently activated plan.
    #[must_use]
    pub fn current(&self) -> Option<&XlatPlan> {
        self.activated.last()
    }
}

impl MmuEmitter for MockMmu {
    fn activate(&mut self, plan: &XlatPlan) -> Result<(), ActivationError> {
        if let Some(err) = self.fail_with.take() {
            return Err(err);
        }
        self.activated.push(plan.clone());
        Ok(())
    }
}
