//! Simulation controller.
//!
//! A [`Simulation`] is an immutable snapshot. Every command returns a new
//! snapshot alongside its outcome; rejected commands hand back a copy of the
//! input unchanged, so older snapshots double as undo history.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::debug;

use crate::cascade::{fall_to_rest, settle};
use crate::error::SimulationError;
use crate::lateral::{shift_shape, Side};
use crate::rotation::{rotate_shape, Rotation};
use crate::shape::{place_shape, ShapeCatalog};
use crate::{
    Applied, Grid, GroupId, GroupLedger, IntentSet, Polarity, ShapeId, SimulationConfig, Size,
};

/// Result tag of a command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Outcome {
    Success,
    /// A global tick had two or more moves claiming the listed cells.
    Conflict(Vec<usize>),
    /// A rotation or shift could not be carried out.
    Collision,
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success)
    }
}

/// A command's outcome and the snapshot to continue from.
#[derive(Debug, Clone)]
pub struct Step {
    pub outcome: Outcome,
    pub state: Simulation,
}

/// Result of placing a figure.
#[derive(Debug, Clone)]
pub struct Placed {
    pub shape: ShapeId,
    pub state: Simulation,
}

/// Serializable dump of a simulation state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub size: Size,
    pub cells: Vec<Polarity>,
    pub groups: Vec<GroupEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupEntry {
    pub id: GroupId,
    pub cells: Vec<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Simulation {
    config: SimulationConfig,
    grid: Grid,
    groups: GroupLedger,
    catalog: Arc<ShapeCatalog>,
}

impl Simulation {
    /// Start with polarity 0 filling the top half and polarity 1 the bottom.
    pub fn new(config: SimulationConfig) -> Result<Self, SimulationError> {
        config.validate()?;
        let grid = Grid::split_halves(config.size());
        let groups = GroupLedger::from_grid(&grid);
        Ok(Self {
            config,
            grid,
            groups,
            catalog: Arc::new(ShapeCatalog::standard()),
        })
    }

    /// Build a state from an arbitrary grid and ledger, validating both.
    pub fn from_parts(
        config: SimulationConfig,
        grid: Grid,
        groups: GroupLedger,
    ) -> Result<Self, SimulationError> {
        config.validate()?;
        if grid.size() != config.size() {
            return Err(SimulationError::InvalidSize {
                width: grid.size().width,
                height: grid.size().height,
                reason: "grid does not match the configured size",
            });
        }
        groups.validate(&grid)?;
        Ok(Self {
            config,
            grid,
            groups,
            catalog: Arc::new(ShapeCatalog::standard()),
        })
    }

    /// Restore a state previously produced by [`Simulation::snapshot`].
    pub fn restore(config: SimulationConfig, snapshot: Snapshot) -> Result<Self, SimulationError> {
        let grid = Grid::from_cells(snapshot.size, snapshot.cells)?;
        let groups = GroupLedger::from_groups(
            snapshot
                .groups
                .into_iter()
                .map(|entry| (entry.id, entry.cells.into_iter().collect::<BTreeSet<_>>())),
        )?;
        Self::from_parts(config, grid, groups)
    }

    pub fn with_catalog(mut self, catalog: ShapeCatalog) -> Self {
        self.catalog = Arc::new(catalog);
        self
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    pub fn size(&self) -> Size {
        self.grid.size()
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    pub fn groups(&self) -> &GroupLedger {
        &self.groups
    }

    pub fn catalog(&self) -> &ShapeCatalog {
        &self.catalog
    }

    /// Shapes that are still falling.
    pub fn active_shapes(&self) -> Vec<ShapeId> {
        self.groups.shape_ids().collect()
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            size: self.size(),
            cells: self.grid.cells().to_vec(),
            groups: self
                .groups
                .iter()
                .map(|(id, cells)| GroupEntry {
                    id,
                    cells: cells.iter().copied().collect(),
                })
                .collect(),
        }
    }

    fn advance(&self, grid: Grid, groups: GroupLedger) -> Simulation {
        debug_assert_eq!(groups.validate(&grid), Ok(()));
        Simulation {
            config: self.config,
            grid,
            groups,
            catalog: Arc::clone(&self.catalog),
        }
    }

    fn step(&self, outcome: Outcome, state: Simulation) -> Step {
        debug!(?outcome, "command finished");
        Step { outcome, state }
    }

    fn reject(&self, outcome: Outcome) -> Step {
        self.step(outcome, self.clone())
    }

    fn require(&self, shape: ShapeId) -> Result<(), SimulationError> {
        match self.groups.shape(shape) {
            Some(_) => Ok(()),
            None => Err(SimulationError::UnknownShape(shape)),
        }
    }

    /// One global gravity pass. Shapes that could not move land, and the
    /// rows they touch go through the row cascade.
    pub fn tick(&self) -> Step {
        let cell_count = self.size().cell_count();
        let applied = IntentSet::gravity(&self.grid, 0..cell_count, Polarity::direction)
            .validate(&self.grid, &self.groups)
            .apply(&self.grid, &self.groups);
        if !applied.conflicts.is_empty() {
            return self.reject(Outcome::Conflict(applied.conflicts));
        }

        let stuck: BTreeSet<usize> = applied.intents.rejected().map(|i| i.source).collect();
        let landed: Vec<ShapeId> = self
            .groups
            .shape_ids()
            .filter(|&id| {
                self.groups
                    .shape(id)
                    .is_some_and(|cells| cells.iter().any(|c| stuck.contains(c)))
            })
            .collect();

        let Applied {
            mut grid,
            mut groups,
            ..
        } = applied;
        for id in landed {
            let Some(cells) = groups.release_shape(id, &grid) else {
                continue;
            };
            debug!(shape = %id, "shape landed");
            (grid, groups) = settle(grid, groups, &cells);
        }
        self.step(Outcome::Success, self.advance(grid, groups))
    }

    pub fn rotate_cw(&self, shape: ShapeId) -> Result<Step, SimulationError> {
        self.rotate(shape, Rotation::Clockwise)
    }

    pub fn rotate_ccw(&self, shape: ShapeId) -> Result<Step, SimulationError> {
        self.rotate(shape, Rotation::CounterClockwise)
    }

    pub fn rotate(&self, shape: ShapeId, rotation: Rotation) -> Result<Step, SimulationError> {
        self.require(shape)?;
        Ok(match rotate_shape(&self.grid, &self.groups, shape, rotation) {
            Some(applied) => {
                self.step(Outcome::Success, self.advance(applied.grid, applied.groups))
            }
            None => self.reject(Outcome::Collision),
        })
    }

    pub fn move_left(&self, shape: ShapeId) -> Result<Step, SimulationError> {
        self.shift(shape, Side::Left)
    }

    pub fn move_right(&self, shape: ShapeId) -> Result<Step, SimulationError> {
        self.shift(shape, Side::Right)
    }

    pub fn shift(&self, shape: ShapeId, side: Side) -> Result<Step, SimulationError> {
        self.require(shape)?;
        Ok(match shift_shape(&self.grid, &self.groups, shape, side) {
            Some(applied) => {
                self.step(Outcome::Success, self.advance(applied.grid, applied.groups))
            }
            None => self.reject(Outcome::Collision),
        })
    }

    /// Let `shape` fall to rest, merge it into its background and run the
    /// row cascade on the rows it landed on.
    pub fn drop(&self, shape: ShapeId) -> Result<Step, SimulationError> {
        let landing = fall_to_rest(&self.grid, &self.groups, shape)
            .ok_or(SimulationError::UnknownShape(shape))?;
        let (grid, groups) = settle(landing.grid, landing.groups, &landing.cells);
        Ok(self.step(Outcome::Success, self.advance(grid, groups)))
    }

    /// Place the catalog figure `name` with `polarity` as a new shape.
    pub fn place_figure(&self, name: &str, polarity: Polarity) -> Result<Placed, SimulationError> {
        let descriptor = self
            .catalog
            .get(name)
            .ok_or_else(|| SimulationError::UnknownFigure(name.to_string()))?;
        let (grid, groups, shape) = place_shape(
            &self.grid,
            &self.groups,
            name,
            descriptor,
            polarity,
            self.config.spawn_row(),
        )?;
        debug!(%shape, name, %polarity, "figure placed");
        Ok(Placed {
            shape,
            state: self.advance(grid, groups),
        })
    }
}
