// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Translation table budget planner.
//!
//! Turns a finalized [`MemoryMap`] into a tree of translation tables without
//! touching hardware. Regions are mapped in ascending address order, top-down
//! from the root:
//!
//! 1. An invalid entry whose whole block lies inside the region becomes a
//!    leaf (block or page) carrying the region's attributes, provided the
//!    granule allows a leaf at that level.
//! 2. Otherwise the entry needs a finer table. One table is allocated per
//!    (level, block) pair and shared by every region touching that block.
//! 3. Every allocation is checked against `MAX_XLAT_TABLES` before it
//!    happens, so a budget failure names the region that needed the table.
//!
//! Distinct regions never share a leaf, even if merging them would save a
//! table: a leaf always carries exactly one region's declared attributes.
//!
//! The root table is sized by the address space and not charged to the
//! budget.


#[cfg(not(any(test, feature = "std")))]
use alloc::vec::Vec;

use crate::mmap::{MemoryMap, Region};
use core::fmt;
use qti_plat_def::{AddressSpace, Attributes, ConfigError, Paddr, PlatformConfig, XlatLevel};

/// Index of a table within a plan. The root is always `TableId::ROOT`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct TableId(usize);

impl TableId {
    /// The root (base) table.
    pub const ROOT: Self = Self(0);

    /// Position in [`XlatPlan::tables`].
    #[inline]
    #[must_use]
    pub const fn index(self) -> usize {
        self.0
    }
}

/// A planned translation table entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Entry {
    /// Unmapped, accesses fault.
    Invalid,
    /// Points at a finer table.
    Table(TableId),
    /// Terminates the walk: block descriptor, or page descriptor at level 3.
    Leaf(Attributes),
}

/// One translation table of the plan.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct XlatTable {
    level: XlatLevel,
    base: Paddr,
    block_size: u64,
    entries: Vec<Entry>,
}

impl XlatTable {
    fn new(space: AddressSpace, level: XlatLevel, base: Paddr) -> Self {
        let mut entries = Vec::new();
        entries.resize(space.entries_at(level), Entry::Invalid);
        Self {
            level,
            base,
            block_size: space.block_size(level),
            entries,
        }
    }

    /// Translation level of the table.
    #[inline]
    #[must_use]
    pub const fn level(&self) -> XlatLevel {
        self.level
    }

    /// First input address translated by the table.
    #[inline]
    #[must_use]
    pub const fn base(&self) -> Paddr {
        self.base
    }

    /// Bytes covered by each entry.
    #[inline]
    #[must_use]
    pub const fn block_size(&self) -> u64 {
        self.block_size
    }

    /// All entries, in address order.
    #[inline]
    #[must_use]
    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    /// Entry slot translating `addr`. The caller guarantees `addr` is inside.
    fn slot_of(&self, addr: u64) -> usize {
        ((addr - self.base.as_u64()) / self.block_size) as usize
    }

    /// First address translated by entry `slot`.
    fn slot_base(&self, slot: usize) -> u64 {
        self.base.as_u64() + slot as u64 * self.block_size
    }

    fn leaf(&self, slot: usize, attrs: Attributes) -> LeafMapping {
        LeafMapping {
            base: Paddr::new(self.slot_base(slot)),
            size: self.block_size,
            level: self.level,
            attrs,
        }
    }
}

/// A leaf entry resolved to the address range it maps.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LeafMapping {
    /// First mapped byte (input and output, mappings are flat).
    pub base: Paddr,
    /// Bytes mapped by the entry.
    pub size: u64,
    /// Level the entry lives at.
    pub level: XlatLevel,
    /// Attributes the entry carries.
    pub attrs: Attributes,
}

/// Error while planning translation tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlanError {
    /// The platform configuration is invalid.
    Config(ConfigError),
    /// The map was declared against a different translation geometry.
    GeometryMismatch {
        /// Geometry of the memory map.
        map: AddressSpace,
        /// Geometry of the planner.
        planner: AddressSpace,
    },
    /// Mapping a region needs more tables than `MAX_XLAT_TABLES`.
    TableBudgetExceeded {
        /// Position of the region in the finalized map.
        index: usize,
        /// Region that needed the table.
        region: Region,
        /// Level of the table that could not be allocated.
        level: XlatLevel,
        /// First address the missing table would translate.
        block: Paddr,
        /// Configured budget.
        limit: usize,
    },
    /// A region reaches an address another region already maps.
    OverlapConflict {
        /// Region being mapped.
        region: Region,
        /// First address already mapped.
        at: Paddr,
    },
    /// A region is not aligned to the page granule of the planner.
    Unmappable(Region),
}

impl fmt::Display for PlanError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config(err) => write!(f, "invalid platform configuration: {err}"),
            Self::GeometryMismatch { map, planner } => write!(
                f,
                "memory map geometry ({:?}, {} bits) differs from planner ({:?}, {} bits)",
                map.granule(),
                map.va_bits(),
                planner.granule(),
                planner.va_bits()
            ),
            Self::TableBudgetExceeded {
                index,
                region,
                level,
                block,
                limit,
            } => write!(
                f,
                "region #{index} {region} needs a {level} table at {block} beyond MAX_XLAT_TABLES ({limit})"
            ),
            Self::OverlapConflict { region, at } => {
                write!(f, "region {region} overlaps an existing mapping at {at}")
            }
            Self::Unmappable(region) => {
                write!(f, "region {region} is not aligned to the translation granule")
            }
        }
    }
}

impl core::error::Error for PlanError {}

impl From<ConfigError> for PlanError {
    fn from(err: ConfigError) -> Self {
        Self::Config(err)
    }
}

/// Plans translation tables for memory maps of one platform.
#[derive(Debug, Clone, Copy)]
pub struct XlatPlanner {
    space: AddressSpace,
    budget: usize,
}

impl XlatPlanner {
    /// Creates a planner for the given platform.
    ///
    /// # Errors
    ///
    /// Returns `PlanError::Config` if the configuration is invalid.
    pub const fn new(config: &PlatformConfig) -> Result<Self, PlanError> {
        match config.address_space() {
            Ok(space) => Ok(Self {
                space,
                budget: config.max_xlat_tables,
            }),
            Err(err) => Err(PlanError::Config(err)),
        }
    }

    /// Table budget, excluding the root.
    #[inline]
    #[must_use]
    pub const fn budget(&self) -> usize {
        self.budget
    }

    /// Computes the translation tables for `map`.
    ///
    /// Pure function of the map: the same map always yields the same plan or
    /// the same error.
    ///
    /// # Errors
    ///
    /// Returns `TableBudgetExceeded` naming the first region whose mapping
    /// would exceed the budget, or `GeometryMismatch` if the map was declared
    /// for another configuration.
    pub fn plan(&self, map: &MemoryMap) -> Result<XlatPlan, PlanError> {
        if map.address_space() != self.space {
            return Err(PlanError::GeometryMismatch {
                map: map.address_space(),
                planner: self.space,
            });
        }

        let mut plan = XlatPlan {
            space: self.space,
            budget: self.budget,
            tables: Vec::new(),
        };
        plan.tables.push(XlatTable::new(
            self.space,
            self.space.root_level(),
            Paddr::new(0),
        ));

        for (index, region) in map.regions().iter().enumerate() {
            tracing::debug!(
                index,
                region = region.name(),
                base = %region.base(),
                size = region.size(),
                "xlat: mapping region"
            );
            plan.map_range(
                TableId::ROOT,
                index,
                region,
                region.base().as_u64(),
                region.end().as_u64(),
            )
            .inspect_err(|err| tracing::error!(%err, "xlat: planning failed"))?;
        }

        tracing::info!(
            tables = plan.table_count(),
            budget = self.budget,
            regions = map.len(),
            "xlat: plan complete"
        );
        Ok(plan)
    }
}

/// Planned translation tables of one boot stage.
///
/// Immutable once returned by [`XlatPlanner::plan`]; safe to share read-only
/// with secondary cores after activation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct XlatPlan {
    space: AddressSpace,
    budget: usize,
    /// Root first, then sub-tables in allocation order.
    tables: Vec<XlatTable>,
}

impl XlatPlan {
    /// Translation geometry of the plan.
    #[inline]
    #[must_use]
    pub const fn address_space(&self) -> AddressSpace {
        self.space
    }

    /// Table budget the plan was computed against.
    #[inline]
    #[must_use]
    pub const fn budget(&self) -> usize {
        self.budget
    }

    /// Number of tables charged to the budget (all but the root).
    #[inline]
    #[must_use]
    pub fn table_count(&self) -> usize {
        self.tables.len() - 1
    }

    /// The root table.
    #[inline]
    #[must_use]
    pub fn root(&self) -> &XlatTable {
        &self.tables[TableId::ROOT.0]
    }

    /// All tables, root first.
    #[inline]
    #[must_use]
    pub fn tables(&self) -> &[XlatTable] {
        &self.tables
    }

    /// Looks up a table by id.
    #[inline]
    #[must_use]
    pub fn table(&self, id: TableId) -> Option<&XlatTable> {
        self.tables.get(id.0)
    }

    /// Walks the tables like the hardware would for `addr`.
    ///
    /// Returns `None` if the address is unmapped.
    #[must_use]
    pub fn translate(&self, addr: Paddr) -> Option<LeafMapping> {
        if addr.as_u64() >= self.space.size() {
            return None;
        }
        let mut table = self.root();
        loop {
            let slot = table.slot_of(addr.as_u64());
            match table.entries[slot] {
                Entry::Invalid => return None,
                Entry::Table(child) => table = &self.tables[child.0],
                Entry::Leaf(attrs) => return Some(table.leaf(slot, attrs)),
            }
        }
    }

    /// Iterates over every leaf mapping in ascending address order.
    #[must_use]
    pub fn leaves(&self) -> Leaves<'_> {
        let mut stack = Vec::with_capacity(4);
        stack.push((TableId::ROOT.0, 0));
        Leaves { plan: self, stack }
    }

    /// Maps `[start, end)` of `region` below `table`.
    fn map_range(
        &mut self,
        table: TableId,
        index: usize,
        region: &Region,
        start: u64,
        end: u64,
    ) -> Result<(), PlanError> {
        let (level, block_size) = {
            let table = &self.tables[table.0];
            (table.level, table.block_size)
        };

        let mut addr = start;
        while addr < end {
            let slot = self.tables[table.0].slot_of(addr);
            let block_base = self.tables[table.0].slot_base(slot);
            let chunk_end = end.min(block_base + block_size);
            let covers_block = addr == block_base && chunk_end == block_base + block_size;

            let entry = self.tables[table.0].entries[slot];
            match entry {
                Entry::Invalid if covers_block && self.space.allows_leaf(level) => {
                    self.tables[table.0].entries[slot] = Entry::Leaf(region.attrs());
                }
                Entry::Invalid => {
                    let child = self.allocate(level, block_base, index, region)?;
                    self.tables[table.0].entries[slot] = Entry::Table(child);
                    self.map_range(child, index, region, addr, chunk_end)?;
                }
                Entry::Table(child) => self.map_range(child, index, region, addr, chunk_end)?,
                Entry::Leaf(_) => {
                    return Err(PlanError::OverlapConflict {
                        region: *region,
                        at: Paddr::new(addr),
                    });
                }
            }
            addr = chunk_end;
        }
        Ok(())
    }

    /// Allocates the table below a `parent`-level entry at `block_base`.
    fn allocate(
        &mut self,
        parent: XlatLevel,
        block_base: u64,
        index: usize,
        region: &Region,
    ) -> Result<TableId, PlanError> {
        let level = parent.finer().ok_or(PlanError::Unmappable(*region))?;
        if self.table_count() >= self.budget {
            return Err(PlanError::TableBudgetExceeded {
                index,
                region: *region,
                level,
                block: Paddr::new(block_base),
                limit: self.budget,
            });
        }

        let id = TableId(self.tables.len());
        self.tables
            .push(XlatTable::new(self.space, level, Paddr::new(block_base)));
        tracing::trace!(
            table = id.0,
            %level,
            base = %Paddr::new(block_base),
            used = self.table_count(),
            "xlat: allocated table"
        );
        Ok(id)
    }

    fn fmt_table(&self, f: &mut fmt::Formatter<'_>, table: &XlatTable, depth: usize) -> fmt::Result {
        let mut invalid_run = 0usize;
        for (slot, entry) in table.entries.iter().enumerate() {
            if *entry == Entry::Invalid {
                invalid_run += 1;
                continue;
            }
            if invalid_run > 0 {
                write_indent(f, depth)?;
                writeln!(f, "({invalid_run} invalid descriptors omitted)")?;
                invalid_run = 0;
            }
            write_indent(f, depth)?;
            write!(
                f,
                "[{}] VA:{:#x} size:{:#x}",
                table.level,
                table.slot_base(slot),
                table.block_size
            )?;
            match *entry {
                Entry::Leaf(attrs) => writeln!(f, " {attrs}")?,
                Entry::Table(child) => {
                    writeln!(f)?;
                    self.fmt_table(f, &self.tables[child.0], depth + 1)?;
                }
                Entry::Invalid => {}
            }
        }
        if invalid_run > 0 {
            write_indent(f, depth)?;
            writeln!(f, "({invalid_run} invalid descriptors omitted)")?;
        }
        Ok(())
    }
}

fn write_indent(f: &mut fmt::Formatter<'_>, depth: usize) -> fmt::Result {
    for _ in 0..depth {
        f.write_str("  ")?;
    }
    Ok(())
}

impl fmt::Display for XlatPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "xlat: {}/{} tables, root {} with {} entries",
            self.table_count(),
            self.budget,
            self.root().level,
            self.root().entries.len()
        )?;
        self.fmt_table(f, self.root(), 1)
    }
}

/// Depth-first iterator over the leaf mappings of a plan.
#[derive(Debug, Clone)]
pub struct Leaves<'p> {
    plan: &'p XlatPlan,
    /// (table index, next slot) per level being walked.
    stack: Vec<(usize, usize)>,
}

impl Iterator for Leaves<'_> {
    type Item = LeafMapping;

    fn next(&mut self) -> Option<Self::Item> {
        let plan = self.plan;
        loop {
            let (table_index, slot) = {
                let top = self.stack.last_mut()?;
                let current = *top;
                top.1 += 1;
                current
            };
            let table = &plan.tables[table_index];
            let Some(entry) = table.entries.get(slot) else {
                self.stack.pop();
                continue;
            };
            match *entry {
                Entry::Invalid => {}
                Entry::Table(child) => self.stack.push((child.0, 0)),
                Entry::Leaf(attrs) => return Some(table.leaf(slot, attrs)),
            }
        }
    }
}
