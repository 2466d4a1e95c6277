//! The group ledger: a partition of every cell index into named groups.
//!
//! Two background groups, one per polarity, hold the unclaimed masses. Any
//! number of shape groups hold falling figures. At every state boundary each
//! index belongs to exactly one group, and every cell holds the polarity of
//! its group.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::fmt;

use crate::error::{InvariantViolation, SimulationError};
use crate::{Grid, Polarity};

static NO_CELLS: BTreeSet<usize> = BTreeSet::new();

/// Identifier of an active falling shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ShapeId(pub u32);

impl fmt::Display for ShapeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "shape#{}", self.0)
    }
}

/// Key of a group in the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum GroupId {
    Background(Polarity),
    Shape(ShapeId),
}

impl fmt::Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GroupId::Background(p) => write!(f, "background({p})"),
            GroupId::Shape(id) => write!(f, "{id}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupLedger {
    groups: BTreeMap<GroupId, BTreeSet<usize>>,
    next_shape: u32,
}

impl Default for GroupLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl GroupLedger {
    /// Empty ledger with both background groups present.
    pub fn new() -> Self {
        let groups = Polarity::ALL
            .iter()
            .map(|&p| (GroupId::Background(p), BTreeSet::new()))
            .collect();
        Self {
            groups,
            next_shape: 0,
        }
    }

    /// Rebuild a ledger from explicit group contents. Shape ids allocated
    /// later continue after the highest id present, so that id must leave
    /// room for a successor.
    pub fn from_groups(
        groups: impl IntoIterator<Item = (GroupId, BTreeSet<usize>)>,
    ) -> Result<Self, SimulationError> {
        let mut ledger = Self::new();
        for (id, cells) in groups {
            if let GroupId::Shape(shape) = id {
                let next = shape
                    .0
                    .checked_add(1)
                    .ok_or(SimulationError::ShapeIdOverflow(shape))?;
                ledger.next_shape = ledger.next_shape.max(next);
            }
            ledger.groups.entry(id).or_default().extend(cells);
        }
        Ok(ledger)
    }

    /// Every cell assigned to the background of its polarity.
    pub fn from_grid(grid: &Grid) -> Self {
        let mut ledger = Self::new();
        for (index, &p) in grid.cells().iter().enumerate() {
            ledger.background_mut(p).insert(index);
        }
        ledger
    }

    pub fn get(&self, id: GroupId) -> Option<&BTreeSet<usize>> {
        self.groups.get(&id)
    }

    pub fn shape(&self, id: ShapeId) -> Option<&BTreeSet<usize>> {
        self.groups.get(&GroupId::Shape(id))
    }

    pub fn background(&self, polarity: Polarity) -> &BTreeSet<usize> {
        self.groups
            .get(&GroupId::Background(polarity))
            .unwrap_or(&NO_CELLS)
    }

    fn background_mut(&mut self, polarity: Polarity) -> &mut BTreeSet<usize> {
        self.groups
            .entry(GroupId::Background(polarity))
            .or_default()
    }

    pub fn iter(&self) -> impl Iterator<Item = (GroupId, &BTreeSet<usize>)> {
        self.groups.iter().map(|(id, cells)| (*id, cells))
    }

    pub fn shape_ids(&self) -> impl Iterator<Item = ShapeId> + '_ {
        self.groups.keys().filter_map(|id| match id {
            GroupId::Shape(s) => Some(*s),
            GroupId::Background(_) => None,
        })
    }

    pub fn owner_of(&self, index: usize) -> Option<GroupId> {
        self.groups
            .iter()
            .find(|(_, cells)| cells.contains(&index))
            .map(|(id, _)| *id)
    }

    /// Owner of every index in `0..cell_count`, for filters that need many
    /// lookups in one pass.
    pub(crate) fn owner_table(&self, cell_count: usize) -> Vec<Option<GroupId>> {
        let mut owners = vec![None; cell_count];
        for (id, cells) in &self.groups {
            for &index in cells {
                if let Some(slot) = owners.get_mut(index) {
                    *slot = Some(*id);
                }
            }
        }
        owners
    }

    /// Register `cells` as a new shape group, taking them away from whichever
    /// groups held them.
    pub fn insert_shape(&mut self, cells: impl IntoIterator<Item = usize>) -> ShapeId {
        let cells: BTreeSet<usize> = cells.into_iter().collect();
        for members in self.groups.values_mut() {
            members.retain(|index| !cells.contains(index));
        }
        self.drop_empty_shapes();
        while self.groups.contains_key(&GroupId::Shape(ShapeId(self.next_shape))) {
            self.next_shape = self.next_shape.wrapping_add(1);
        }
        let id = ShapeId(self.next_shape);
        self.next_shape = self.next_shape.wrapping_add(1);
        self.groups.insert(GroupId::Shape(id), cells);
        id
    }

    /// Dissolve a shape into the backgrounds matching each cell's value.
    /// Returns the cells it held, or `None` if the shape does not exist.
    pub fn release_shape(&mut self, id: ShapeId, grid: &Grid) -> Option<BTreeSet<usize>> {
        let cells = self.groups.remove(&GroupId::Shape(id))?;
        for &index in &cells {
            self.background_mut(grid.get(index)).insert(index);
        }
        Some(cells)
    }

    /// Move every index in `cells` to the background of `polarity`,
    /// whatever group held it before.
    pub(crate) fn reassign_to_background(&mut self, cells: &BTreeSet<usize>, polarity: Polarity) {
        for members in self.groups.values_mut() {
            members.retain(|index| !cells.contains(index));
        }
        self.background_mut(polarity).extend(cells.iter().copied());
        self.drop_empty_shapes();
    }

    /// Split the cells of a background group that match `predicate` off into
    /// a new shape group. Returns `None` when nothing matches.
    pub(crate) fn carve_background(
        &mut self,
        polarity: Polarity,
        mut predicate: impl FnMut(usize) -> bool,
    ) -> Option<ShapeId> {
        let carved: BTreeSet<usize> = self
            .background(polarity)
            .iter()
            .copied()
            .filter(|&index| predicate(index))
            .collect();
        if carved.is_empty() {
            return None;
        }
        Some(self.insert_shape(carved))
    }

    /// Ledger after the permitted `(source, target)` moves of one step.
    ///
    /// Each moved index follows its cell to the target. A stationary cell
    /// overrun by a mover is taken from its group. A vacated index nobody
    /// moved into joins the background of the opposite of the value that
    /// left it.
    pub(crate) fn relocate(&self, moves: &[(usize, usize)], before: &Grid) -> GroupLedger {
        let moved: HashMap<usize, usize> = moves.iter().copied().collect();
        let targets: HashSet<usize> = moves.iter().map(|&(_, target)| target).collect();

        let mut groups: BTreeMap<GroupId, BTreeSet<usize>> = self
            .groups
            .iter()
            .map(|(id, cells)| {
                let relocated = cells
                    .iter()
                    .filter_map(|index| match moved.get(index) {
                        Some(&target) => Some(target),
                        None if targets.contains(index) => None,
                        None => Some(*index),
                    })
                    .collect();
                (*id, relocated)
            })
            .collect();

        for &(source, _) in moves {
            if !targets.contains(&source) {
                groups
                    .entry(GroupId::Background(before.get(source).opposite()))
                    .or_default()
                    .insert(source);
            }
        }

        let mut ledger = GroupLedger {
            groups,
            next_shape: self.next_shape,
        };
        ledger.drop_empty_shapes();
        ledger
    }

    fn drop_empty_shapes(&mut self) {
        self.groups
            .retain(|id, cells| matches!(id, GroupId::Background(_)) || !cells.is_empty());
    }

    /// Check that the ledger partitions the grid and that every cell holds
    /// the polarity its group implies.
    pub fn validate(&self, grid: &Grid) -> Result<(), InvariantViolation> {
        let cell_count = grid.size().cell_count();
        if grid.cells().len() != cell_count {
            return Err(InvariantViolation::GridLength {
                expected: cell_count,
                found: grid.cells().len(),
            });
        }

        let mut owners: Vec<Option<GroupId>> = vec![None; cell_count];
        for (&group, cells) in &self.groups {
            let mut shape_polarity = None;
            if let GroupId::Shape(id) = group {
                if cells.is_empty() {
                    return Err(InvariantViolation::EmptyShape(id));
                }
            }
            for &index in cells {
                let Some(slot) = owners.get_mut(index) else {
                    return Err(InvariantViolation::IndexOutOfRange {
                        group,
                        index,
                        cell_count,
                    });
                };
                if let Some(first) = *slot {
                    return Err(InvariantViolation::DuplicateIndex {
                        index,
                        first,
                        second: group,
                    });
                }
                *slot = Some(group);

                let found = grid.get(index);
                let expected = match group {
                    GroupId::Background(p) => p,
                    GroupId::Shape(_) => *shape_polarity.get_or_insert(found),
                };
                if found != expected {
                    return Err(InvariantViolation::PolarityMismatch {
                        index,
                        group,
                        found,
                    });
                }
            }
        }

        match owners.iter().position(Option::is_none) {
            Some(index) => Err(InvariantViolation::Unclaimed { index }),
            None => Ok(()),
        }
    }
}
