//! Row cascade: filled-row detection, polarity swap, mass split and the
//! resulting re-drop.
//!
//! A row is filled when every cell shares one polarity. Swapping flips the
//! row, which may cut part of a background mass off from the edge it grows
//! from. That part becomes a new shape, falls until it lands, and its landing
//! rows are checked again.

use std::collections::BTreeSet;
use tracing::debug;

use crate::{Grid, GroupLedger, IntentSet, Polarity, ShapeId};

/// State after a shape has fallen as far as it can and been merged into its
/// background.
#[derive(Debug, Clone)]
pub struct Landing {
    pub grid: Grid,
    pub groups: GroupLedger,
    /// Cells the shape occupied when it came to rest.
    pub cells: BTreeSet<usize>,
    /// Number of single-row steps taken.
    pub steps: usize,
}

/// Rows among `rows` whose cells all share one polarity, in first-seen
/// order with duplicates removed.
pub fn find_filled_rows(rows: impl IntoIterator<Item = usize>, grid: &Grid) -> Vec<usize> {
    let mut checked = BTreeSet::new();
    let mut filled = Vec::new();
    for y in rows {
        if y >= grid.size().height || !checked.insert(y) {
            continue;
        }
        let row = grid.row(y);
        if row.iter().all(|&p| p == row[0]) {
            filled.push(y);
        }
    }
    filled
}

/// Flip every cell of `rows`. Flipped cells leave whatever group held them
/// and join the background of their new polarity. Rows past the bottom edge
/// are ignored.
pub fn swap_rows(rows: &[usize], grid: &Grid, groups: &GroupLedger) -> (Grid, GroupLedger) {
    let size = grid.size();
    let mut next = grid.clone();
    let mut transfers: [BTreeSet<usize>; 2] = Default::default();

    for &y in rows.iter().filter(|&&y| y < size.height) {
        for x in 0..size.width {
            let index = y * size.width + x;
            let flipped = grid.get(index).opposite();
            next.set(index, flipped);
            transfers[u8::from(flipped) as usize].insert(index);
        }
    }

    let mut ledger = groups.clone();
    for polarity in Polarity::ALL {
        let cells = &transfers[u8::from(polarity) as usize];
        if !cells.is_empty() {
            ledger.reassign_to_background(cells, polarity);
        }
    }
    debug!(?rows, "rows swapped");
    (next, ledger)
}

/// After `rows` were swapped, carve the part of the swapped-away polarity's
/// background that lies beyond the swapped band into a new shape.
///
/// Polarity 1 anchors at the bottom edge, so its cells above the topmost
/// swapped row are carved; polarity 0 anchors at the top, so its cells below
/// the bottommost swapped row are. The test is by row index only: separate
/// islands beyond the band all end up in the one new shape. Rows past the
/// bottom edge are ignored.
pub fn split_mass(
    rows: &[usize],
    grid: &Grid,
    groups: &GroupLedger,
) -> Option<(GroupLedger, ShapeId)> {
    let size = grid.size();
    let rows: Vec<usize> = rows.iter().copied().filter(|&y| y < size.height).collect();
    let &first = rows.first()?;
    let detached = grid.get(first * size.width).opposite();

    let mut ledger = groups.clone();
    let id = match detached {
        Polarity::One => {
            let edge = rows.iter().copied().min()?;
            ledger.carve_background(detached, |index| size.row_of(index) < edge)?
        }
        Polarity::Zero => {
            let edge = rows.iter().copied().max()?;
            ledger.carve_background(detached, |index| size.row_of(index) > edge)?
        }
    };
    debug!(shape = %id, polarity = %detached, "mass split");
    Some((ledger, id))
}

/// Let `shape` fall one row at a time until any of its cells is blocked,
/// then merge it into its background. Returns `None` if the shape does not
/// exist.
pub fn fall_to_rest(grid: &Grid, groups: &GroupLedger, shape: ShapeId) -> Option<Landing> {
    let mut grid = grid.clone();
    let mut groups = groups.clone();
    let mut steps = 0;

    loop {
        let members = groups.shape(shape)?;
        let intents = IntentSet::gravity(&grid, members.iter().copied(), Polarity::direction)
            .forbid_out_of_bounds(grid.size())
            .collide_same_polarity(&grid);
        if intents.is_empty() || !intents.all_permitted() {
            break;
        }
        let applied = intents.apply(&grid, &groups);
        if !applied.conflicts.is_empty() {
            break;
        }
        grid = applied.grid;
        groups = applied.groups;
        steps += 1;
    }

    let cells = groups.release_shape(shape, &grid)?;
    debug!(%shape, steps, "shape landed");
    Some(Landing {
        grid,
        groups,
        cells,
        steps,
    })
}

/// Run the cascade starting from the rows a landed shape touches, until no
/// inspected row is filled.
pub fn settle(
    mut grid: Grid,
    mut groups: GroupLedger,
    landed: &BTreeSet<usize>,
) -> (Grid, GroupLedger) {
    let size = grid.size();
    let mut rows = rows_of(landed, size.width);

    loop {
        let filled = find_filled_rows(rows.iter().copied(), &grid);
        if filled.is_empty() {
            break;
        }
        let (swapped, ledger) = swap_rows(&filled, &grid, &groups);
        let Some((ledger, shape)) = split_mass(&filled, &swapped, &ledger) else {
            grid = swapped;
            groups = ledger;
            break;
        };
        let Some(landing) = fall_to_rest(&swapped, &ledger, shape) else {
            grid = swapped;
            groups = ledger;
            break;
        };
        rows = rows_of(&landing.cells, size.width);
        grid = landing.grid;
        groups = landing.groups;
    }
    (grid, groups)
}

fn rows_of(cells: &BTreeSet<usize>, width: usize) -> BTreeSet<usize> {
    cells.iter().map(|&index| index / width).collect()
}
