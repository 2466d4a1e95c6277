//! Rotation solver.
//!
//! The pivot is the centre of the group's bounding box. On an axis where the
//! centre falls between two cells, the side with more member cells wins; a
//! tie keeps both. Each candidate pivot is tried in turn and the first one
//! whose rotated intents all pass validation is used.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::debug;

use crate::{Applied, Coords, Grid, GroupLedger, Intent, IntentSet, ShapeId, Size};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Rotation {
    Clockwise,
    CounterClockwise,
}

impl Rotation {
    /// Rotate an offset from the pivot by 90 degrees. With y pointing down,
    /// clockwise sends right to down.
    pub fn turn(self, offset: Coords) -> Coords {
        match self {
            Rotation::Clockwise => Coords::new(-offset.y, offset.x),
            Rotation::CounterClockwise => Coords::new(offset.y, -offset.x),
        }
    }
}

/// Candidate pivots for `cells`: the cross product of the per-axis
/// candidates, x-major, lower values first.
pub fn pivot_candidates(cells: &[Coords]) -> Vec<Coords> {
    let xs = axis_candidates(cells.iter().map(|c| c.x));
    let ys = axis_candidates(cells.iter().map(|c| c.y));
    xs.iter()
        .flat_map(|&x| ys.iter().map(move |&y| Coords::new(x, y)))
        .collect()
}

fn axis_candidates(values: impl Iterator<Item = i32> + Clone) -> Vec<i32> {
    let (Some(min), Some(max)) = (values.clone().min(), values.clone().max()) else {
        return Vec::new();
    };
    let span = max - min;
    let low = min + span / 2;
    if span % 2 == 0 {
        return vec![low];
    }
    let high = low + 1;
    let low_weight = values.clone().filter(|&v| v == low).count();
    let high_weight = values.filter(|&v| v == high).count();
    match low_weight.cmp(&high_weight) {
        std::cmp::Ordering::Greater => vec![low],
        std::cmp::Ordering::Less => vec![high],
        std::cmp::Ordering::Equal => vec![low, high],
    }
}

/// Intents moving each cell of `cells` to its rotated position around `pivot`.
pub fn rotation_intents(
    size: Size,
    cells: &BTreeSet<usize>,
    pivot: Coords,
    rotation: Rotation,
) -> IntentSet {
    cells
        .iter()
        .map(|&source| {
            let at = size.coords_of(source);
            let offset = Coords::new(at.x - pivot.x, at.y - pivot.y);
            Intent::proposed(source, pivot + rotation.turn(offset))
        })
        .collect()
}

/// Rotate `shape` around the first candidate pivot that works. Returns
/// `None` when the shape does not exist or every pivot collides.
pub fn rotate_shape(
    grid: &Grid,
    groups: &GroupLedger,
    shape: ShapeId,
    rotation: Rotation,
) -> Option<Applied> {
    let size = grid.size();
    let cells = groups.shape(shape)?;
    let coords: Vec<Coords> = cells.iter().map(|&i| size.coords_of(i)).collect();

    for pivot in pivot_candidates(&coords) {
        let intents = rotation_intents(size, cells, pivot, rotation).validate(grid, groups);
        if !intents.all_permitted() {
            continue;
        }
        let applied = intents.apply(grid, groups);
        if applied.conflicts.is_empty() {
            debug!(%shape, ?rotation, ?pivot, "rotated");
            return Some(applied);
        }
    }
    debug!(%shape, ?rotation, "no pivot permits rotation");
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Polarity;

    fn coords(list: &[(i32, i32)]) -> Vec<Coords> {
        list.iter().map(|&(x, y)| Coords::new(x, y)).collect()
    }

    #[test]
    fn test_integral_centre_is_single_candidate() {
        // Horizontal I3
        let cells = coords(&[(2, 5), (3, 5), (4, 5)]);
        assert_eq!(pivot_candidates(&cells), vec![Coords::new(3, 5)]);
    }

    #[test]
    fn test_heavier_side_wins() {
        // T: three on top, one below the middle. y centre is 0.5, top row heavier.
        let cells = coords(&[(0, 0), (1, 0), (2, 0), (1, 1)]);
        assert_eq!(pivot_candidates(&cells), vec![Coords::new(1, 0)]);
    }

    #[test]
    fn test_tie_offers_both_candidates() {
        // 2x2 square: both axes tie, four candidates.
        let cells = coords(&[(4, 4), (5, 4), (4, 5), (5, 5)]);
        assert_eq!(
            pivot_candidates(&cells),
            coords(&[(4, 4), (4, 5), (5, 4), (5, 5)])
        );
    }

    #[test]
    fn test_turn_directions() {
        let right = Coords::new(1, 0);
        assert_eq!(Rotation::Clockwise.turn(right), Coords::new(0, 1));
        assert_eq!(Rotation::CounterClockwise.turn(right), Coords::new(0, -1));
        let back = Rotation::CounterClockwise.turn(Rotation::Clockwise.turn(Coords::new(2, -1)));
        assert_eq!(back, Coords::new(2, -1));
    }

    #[test]
    fn test_rotation_skips_pivot_blocked_by_wall() {
        // Vertical I4 one column from the left wall of a 4-wide grid. The
        // first candidate pivot (1, 1) would push the bottom cell to x = -1.
        let size = Size::new(4, 4);
        let grid = Grid::parse(size, "_x__ _x__ _x__ _x__").unwrap();
        let mut ledger = GroupLedger::from_grid(&grid);
        let bar = ledger.insert_shape([1, 5, 9, 13]);

        let cells = ledger.shape(bar).unwrap().clone();
        let at: Vec<Coords> = cells.iter().map(|&i| size.coords_of(i)).collect();
        let candidates = pivot_candidates(&at);
        assert_eq!(candidates, coords(&[(1, 1), (1, 2)]));

        let applied = rotate_shape(&grid, &ledger, bar, Rotation::Clockwise).unwrap();
        assert_eq!(applied.grid, Grid::parse(size, "____ ____ xxxx ____").unwrap());
        assert_eq!(applied.groups.shape(bar), Some(&BTreeSet::from([8, 9, 10, 11])));
        assert!(applied.groups.validate(&applied.grid).is_ok());
    }

    #[test]
    fn test_rotation_fails_when_every_pivot_collides() {
        let size = Size::new(3, 3);
        let grid = Grid::parse(size, "x__ x__ x__").unwrap();
        let mut ledger = GroupLedger::from_grid(&grid);
        let bar = ledger.insert_shape([0, 3, 6]);
        assert!(rotate_shape(&grid, &ledger, bar, Rotation::Clockwise).is_none());
        assert!(rotate_shape(&grid, &ledger, bar, Rotation::CounterClockwise).is_none());
    }

    #[test]
    fn test_rotation_falls_back_when_background_blocks_first_pivot() {
        // Vertical pair with background x at its upper left. Pivot (1, 0)
        // would swing the lower cell onto it; pivot (1, 1) swings the upper
        // cell to the right instead.
        let size = Size::new(3, 3);
        let grid = Grid::parse(size, "xx_ _x_ ___").unwrap();
        let mut ledger = GroupLedger::from_grid(&grid);
        let pair = ledger.insert_shape([1, 4]);
        let applied = rotate_shape(&grid, &ledger, pair, Rotation::Clockwise).unwrap();
        assert_eq!(applied.grid, Grid::parse(size, "x__ _xx ___").unwrap());
        assert_eq!(applied.groups.background(Polarity::One).len(), 1);
        assert!(applied.groups.validate(&applied.grid).is_ok());
    }
}
