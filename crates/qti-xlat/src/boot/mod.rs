// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Boot stage sequencing.
//!
//! A [`BootStage`] owns the memory map and translation plan of one boot stage
//! and walks them through declare, finalize, plan and activate. The typed
//! builder API already rules out most misuse; this is the dynamic front end
//! platform setup code calls, so it reports out-of-order calls as errors.
//!
//! Every failure is fatal to the stage. A later stage starts over with a
//! fresh `BootStage`.

#[cfg(test)]
mod boot_test;

use crate::emitter::{ActivationError, MmuEmitter};
use crate::mmap::{MemoryMap, MemoryMapBuilder, MmapError, Region};
use crate::planner::{PlanError, XlatPlan, XlatPlanner};
use crate::stacks::{StackAllocator, StackError, StackRegions};
use core::fmt;
use qti_plat_def::{ConfigError, Paddr, PlatformConfig};

/// Progress of a boot stage.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    /// Regions are being declared.
    Declaring,
    /// The memory map is sorted and frozen.
    Finalized,
    /// Translation tables are planned.
    Planned,
    /// The plan is installed in the MMU.
    Active,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Declaring => "declaring",
            Self::Finalized => "finalized",
            Self::Planned => "planned",
            Self::Active => "active",
        };
        f.write_str(name)
    }
}

/// Any error that halts a boot stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootError {
    /// The platform configuration is invalid.
    Config(ConfigError),
    /// Declaring a region failed.
    Mmap(MmapError),
    /// Planning translation tables failed.
    Plan(PlanError),
    /// Carving stacks failed.
    Stack(StackError),
    /// The MMU emitter rejected the plan.
    ActivationFailed(ActivationError),
    /// The memory map was already finalized.
    AlreadyFinalized,
    /// The operation needs a finalized memory map.
    NotFinalized,
    /// The operation needs a translation plan.
    NotPlanned,
    /// A plan is already active.
    AlreadyActive,
}

impl fmt::Display for BootError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config(err) => write!(f, "invalid platform configuration: {err}"),
            Self::Mmap(err) => write!(f, "memory map: {err}"),
            Self::Plan(err) => write!(f, "translation tables: {err}"),
            Self::Stack(err) => write!(f, "stacks: {err}"),
            Self::ActivationFailed(err) => write!(f, "MMU activation failed: {err}"),
            Self::AlreadyFinalized => write!(f, "memory map already finalized"),
            Self::NotFinalized => write!(f, "memory map not finalized yet"),
            Self::NotPlanned => write!(f, "translation tables not planned yet"),
            Self::AlreadyActive => write!(f, "translation tables already active"),
        }
    }
}

impl core::error::Error for BootError {}

impl From<ConfigError> for BootError {
    fn from(err: ConfigError) -> Self {
        Self::Config(err)
    }
}

impl From<MmapError> for BootError {
    fn from(err: MmapError) -> Self {
        Self::Mmap(err)
    }
}

impl From<PlanError> for BootError {
    fn from(err: PlanError) -> Self {
        Self::Plan(err)
    }
}

impl From<StackError> for BootError {
    fn from(err: StackError) -> Self {
        Self::Stack(err)
    }
}

impl From<ActivationError> for BootError {
    fn from(err: ActivationError) -> Self {
        Self::ActivationFailed(err)
    }
}

/// Memory setup of one boot stage.
#[derive(Debug)]
pub struct BootStage {
    planner: XlatPlanner,
    stacks: StackAllocator,
    builder: Option<MemoryMapBuilder>,
    map: Option<MemoryMap>,
    plan: Option<XlatPlan>,
    active: bool,
}

impl BootStage {
    /// Starts a stage for the given platform.
    ///
    /// # Errors
    ///
    /// Returns `BootError::Config` if the configuration is invalid.
    pub fn new(config: &PlatformConfig) -> Result<Self, BootError> {
        config.validate()?;
        let stage = Self {
            planner: XlatPlanner::new(config)?,
            stacks: StackAllocator::new(config)?,
            builder: Some(MemoryMapBuilder::new(config)?),
            map: None,
            plan: None,
            active: false,
        };
        tracing::debug!(
            mmap_entries = config.mmap_entries,
            max_xlat_tables = config.max_xlat_tables,
            va_bits = config.va_bits,
            "boot: stage started"
        );
        Ok(stage)
    }

    /// Current phase.
    #[must_use]
    pub const fn phase(&self) -> Phase {
        if self.active {
            Phase::Active
        } else if self.plan.is_some() {
            Phase::Planned
        } else if self.map.is_some() {
            Phase::Finalized
        } else {
            Phase::Declaring
        }
    }

    /// Declares a region.
    ///
    /// # Errors
    ///
    /// Any [`MmapError`] from [`MemoryMapBuilder::add`], or
    /// `MmapError::AlreadyFinalized` naming the region once the map is
    /// frozen.
    pub fn add_region(&mut self, region: Region) -> Result<(), BootError> {
        let Some(builder) = self.builder.as_mut() else {
            tracing::error!(region = region.name(), "boot: region declared after finalize");
            return Err(MmapError::AlreadyFinalized(region).into());
        };
        builder.add(region)?;
        Ok(())
    }

    /// Declares every region in order, stopping at the first error.
    ///
    /// # Errors
    ///
    /// See [`BootStage::add_region`].
    pub fn add_regions(&mut self, regions: &[Region]) -> Result<(), BootError> {
        regions
            .iter()
            .try_for_each(|region| self.add_region(*region))
    }

    /// Freezes the memory map.
    ///
    /// # Errors
    ///
    /// Returns `AlreadyFinalized` on a second call.
    pub fn finalize(&mut self) -> Result<&MemoryMap, BootError> {
        let builder = self.builder.take().ok_or(BootError::AlreadyFinalized)?;
        let map = builder.finalize();
        tracing::info!(
            regions = map.len(),
            capacity = map.capacity(),
            "boot: memory map finalized"
        );
        Ok(self.map.insert(map))
    }

    /// Plans translation tables for the finalized map.
    ///
    /// Planning is a pure function of the map, so a second call returns the
    /// existing plan.
    ///
    /// # Errors
    ///
    /// Returns `NotFinalized` before [`BootStage::finalize`], or the
    /// [`PlanError`] of the planner.
    pub fn plan(&mut self) -> Result<&XlatPlan, BootError> {
        let map = self.map.as_ref().ok_or(BootError::NotFinalized)?;
        if self.plan.is_none() {
            let plan = self.planner.plan(map)?;
            tracing::info!(
                tables = plan.table_count(),
                budget = plan.budget(),
                "boot: translation tables planned"
            );
            self.plan = Some(plan);
        }
        self.plan.as_ref().ok_or(BootError::NotPlanned)
    }

    /// Installs the plan through `emitter`.
    ///
    /// # Errors
    ///
    /// Returns `NotPlanned` before [`BootStage::plan`], `AlreadyActive` on a
    /// second call, or `ActivationFailed` if the emitter rejects the plan.
    pub fn activate<E: MmuEmitter + ?Sized>(&mut self, emitter: &mut E) -> Result<(), BootError> {
        if self.active {
            return Err(BootError::AlreadyActive);
        }
        let plan = self.plan.as_ref().ok_or(BootError::NotPlanned)?;
        emitter
            .activate(plan)
            .inspect_err(|err| tracing::error!(%err, "boot: MMU activation failed"))?;
        self.active = true;
        tracing::info!(tables = plan.table_count(), "boot: MMU active");
        Ok(())
    }

    /// Carves one stack per core from the pool and checks that none aliases
    /// a DEVICE region of the map.
    ///
    /// # Errors
    ///
    /// Returns `NotFinalized` before [`BootStage::finalize`], or the
    /// [`StackError`] of the allocator.
    pub fn allocate_stacks(
        &self,
        pool_base: Paddr,
        pool_size: u64,
    ) -> Result<StackRegions, BootError> {
        let map = self.map.as_ref().ok_or(BootError::NotFinalized)?;
        let stacks = self.stacks.allocate_for_cores(pool_base, pool_size)?;
        stacks.check_device_aliasing(map)?;
        Ok(stacks)
    }

    /// The finalized memory map, if any.
    #[must_use]
    pub const fn memory_map(&self) -> Option<&MemoryMap> {
        self.map.as_ref()
    }

    /// The translation plan, if any.
    #[must_use]
    pub const fn xlat_plan(&self) -> Option<&XlatPlan> {
        self.plan.as_ref()
    }
}
