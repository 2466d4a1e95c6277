//! Single-step horizontal shift of a shape.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{Applied, Coords, Grid, GroupLedger, IntentSet, ShapeId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    Left,
    Right,
}

impl Side {
    pub fn offset(self) -> Coords {
        match self {
            Side::Left => Coords::new(-1, 0),
            Side::Right => Coords::new(1, 0),
        }
    }
}

/// Shift every cell of `shape` one column towards `side`. All cells share
/// the offset, so bounds and collision checks are enough; any rejection
/// rejects the whole move.
pub fn shift_shape(
    grid: &Grid,
    groups: &GroupLedger,
    shape: ShapeId,
    side: Side,
) -> Option<Applied> {
    let cells = groups.shape(shape)?;
    let intents = IntentSet::shifted(grid.size(), cells.iter().copied(), side.offset())
        .forbid_out_of_bounds(grid.size())
        .collide_same_polarity(grid);
    if !intents.all_permitted() {
        debug!(%shape, ?side, "shift blocked");
        return None;
    }
    let applied = intents.apply(grid, groups);
    applied.conflicts.is_empty().then_some(applied)
}
