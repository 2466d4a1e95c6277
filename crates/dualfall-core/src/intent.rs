//! Intent pipeline: propose per-cell moves, filter them, apply survivors.
//!
//! Every filter consumes an [`IntentSet`] and returns a new one. A verdict
//! only ever moves from `Permitted` to a rejection, so composing filters until
//! nothing changes always terminates.

use std::collections::{BTreeMap, HashMap, HashSet};
use tracing::{debug, trace};

use crate::{Coords, Grid, GroupId, GroupLedger, Polarity, Size};

/// Why an intent was (or was not) allowed through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Verdict {
    Permitted,
    /// Target lies outside the grid.
    OutOfBounds,
    /// Another member of the same group cannot move.
    Cohesion,
    /// Target holds the same polarity and nothing clears the way.
    Collision,
    /// Another permitted intent claims the same target.
    Conflict,
}

/// A proposed relocation of the cell at `source` to `target`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Intent {
    pub source: usize,
    pub target: Coords,
    pub verdict: Verdict,
}

impl Intent {
    pub fn proposed(source: usize, target: Coords) -> Self {
        Self {
            source,
            target,
            verdict: Verdict::Permitted,
        }
    }

    pub fn is_permitted(&self) -> bool {
        self.verdict == Verdict::Permitted
    }

    fn demote(&mut self, verdict: Verdict) {
        if self.is_permitted() {
            trace!(source = self.source, ?verdict, "intent demoted");
            self.verdict = verdict;
        }
    }
}

/// The intents of one pipeline run.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct IntentSet {
    intents: Vec<Intent>,
}

/// Result of applying an intent set.
#[derive(Debug, Clone)]
pub struct Applied {
    pub grid: Grid,
    pub groups: GroupLedger,
    /// Targets claimed by more than one intent. Non-empty means the step
    /// must be rejected by the caller.
    pub conflicts: Vec<usize>,
    /// Final verdicts, including conflict demotions.
    pub intents: IntentSet,
}

impl FromIterator<Intent> for IntentSet {
    fn from_iter<I: IntoIterator<Item = Intent>>(iter: I) -> Self {
        Self {
            intents: iter.into_iter().collect(),
        }
    }
}

impl IntentSet {
    /// One gravity intent per source cell, stepping vertically by
    /// `direction` of the cell's polarity.
    pub fn gravity(
        grid: &Grid,
        sources: impl IntoIterator<Item = usize>,
        direction: fn(Polarity) -> i32,
    ) -> Self {
        let size = grid.size();
        sources
            .into_iter()
            .map(|source| {
                let step = Coords::new(0, direction(grid.get(source)));
                Intent::proposed(source, size.coords_of(source) + step)
            })
            .collect()
    }

    /// One intent per source cell, all shifted by the same `offset`.
    pub fn shifted(size: Size, sources: impl IntoIterator<Item = usize>, offset: Coords) -> Self {
        sources
            .into_iter()
            .map(|source| Intent::proposed(source, size.coords_of(source) + offset))
            .collect()
    }

    pub fn intents(&self) -> &[Intent] {
        &self.intents
    }

    pub fn len(&self) -> usize {
        self.intents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.intents.is_empty()
    }

    pub fn all_permitted(&self) -> bool {
        self.intents.iter().all(Intent::is_permitted)
    }

    pub fn permitted(&self) -> impl Iterator<Item = &Intent> {
        self.intents.iter().filter(|i| i.is_permitted())
    }

    pub fn rejected(&self) -> impl Iterator<Item = &Intent> {
        self.intents.iter().filter(|i| !i.is_permitted())
    }

    fn verdicts(&self) -> Vec<Verdict> {
        self.intents.iter().map(|i| i.verdict).collect()
    }

    /// Forbid intents whose target lies outside the grid.
    pub fn forbid_out_of_bounds(mut self, size: Size) -> Self {
        for intent in &mut self.intents {
            if !size.contains(intent.target) {
                intent.demote(Verdict::OutOfBounds);
            }
        }
        self
    }

    /// Forbid every permitted intent whose source shares a group with the
    /// source of a rejected intent.
    pub fn enforce_cohesion(mut self, groups: &GroupLedger, size: Size) -> Self {
        let owners = groups.owner_table(size.cell_count());
        let owner = |source: usize| owners.get(source).copied().flatten();

        let broken: HashSet<GroupId> = self
            .rejected()
            .filter_map(|intent| owner(intent.source))
            .collect();
        if broken.is_empty() {
            return self;
        }
        for intent in &mut self.intents {
            if owner(intent.source).is_some_and(|g| broken.contains(&g)) {
                intent.demote(Verdict::Cohesion);
            }
        }
        self
    }

    /// Forbid intents that run into a cell of their own polarity, unless the
    /// occupant's own permitted intent (followed transitively) ends on a cell
    /// of the other polarity, or the chain closes back on the original intent.
    pub fn collide_same_polarity(mut self, grid: &Grid) -> Self {
        let by_source: HashMap<usize, usize> = self
            .intents
            .iter()
            .enumerate()
            .filter(|(_, intent)| intent.is_permitted())
            .map(|(pos, intent)| (intent.source, pos))
            .collect();

        let blocked: Vec<usize> = (0..self.intents.len())
            .filter(|&pos| self.intents[pos].is_permitted())
            .filter(|&pos| !self.chain_clears(pos, grid, &by_source))
            .collect();

        for pos in blocked {
            self.intents[pos].demote(Verdict::Collision);
        }
        self
    }

    fn chain_clears(&self, origin: usize, grid: &Grid, by_source: &HashMap<usize, usize>) -> bool {
        let size = grid.size();
        let mut visited = HashSet::new();
        let mut current = origin;
        loop {
            let intent = self.intents[current];
            if !size.contains(intent.target) {
                return false;
            }
            visited.insert(intent.source);
            let target = size.index_of(intent.target);
            if grid.get(target) != grid.get(intent.source) {
                return true;
            }
            match by_source.get(&target) {
                None => return false,
                // Closed cycle of same-polarity movers: a permutation.
                Some(&next) if next == origin => return true,
                // A cycle that excludes the origin already claims the target.
                Some(&next) if visited.contains(&self.intents[next].source) => return false,
                Some(&next) => current = next,
            }
        }
    }

    /// Bounds check, then cohesion and collision until no verdict changes.
    pub fn validate(self, grid: &Grid, groups: &GroupLedger) -> Self {
        let size = grid.size();
        let mut set = self.forbid_out_of_bounds(size);
        loop {
            let before = set.verdicts();
            set = set
                .enforce_cohesion(groups, size)
                .collide_same_polarity(grid)
                .enforce_cohesion(groups, size);
            if set.verdicts() == before {
                return set;
            }
        }
    }

    /// Demote every permitted intent that shares its target with another
    /// permitted intent. Returns the contended targets in ascending order.
    fn resolve_conflicts(&mut self, size: Size) -> Vec<usize> {
        let mut by_target: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
        for (pos, intent) in self.intents.iter().enumerate() {
            if intent.is_permitted() {
                by_target
                    .entry(size.index_of(intent.target))
                    .or_default()
                    .push(pos);
            }
        }

        let mut conflicts = Vec::new();
        for (target, claimants) in by_target {
            if claimants.len() > 1 {
                for pos in claimants {
                    self.intents[pos].demote(Verdict::Conflict);
                }
                conflicts.push(target);
            }
        }
        conflicts
    }

    /// Write the surviving moves onto a copy of `grid`: each vacated source
    /// takes the opposite polarity, then each mover lands on its target.
    pub fn apply_to_grid(mut self, grid: &Grid) -> (Grid, Vec<usize>, Vec<(usize, usize)>, Self) {
        let size = grid.size();
        let conflicts = self.resolve_conflicts(size);
        let moves: Vec<(usize, usize)> = self
            .permitted()
            .map(|intent| (intent.source, size.index_of(intent.target)))
            .collect();

        let mut next = grid.clone();
        for &(source, _) in &moves {
            next.set(source, grid.get(source).opposite());
        }
        for &(source, target) in &moves {
            next.set(target, grid.get(source));
        }
        (next, conflicts, moves, self)
    }

    /// Apply the surviving moves to both the grid and the ledger.
    pub fn apply(self, grid: &Grid, groups: &GroupLedger) -> Applied {
        let (next, conflicts, moves, intents) = self.apply_to_grid(grid);
        if !conflicts.is_empty() {
            debug!(?conflicts, "conflicting intents");
        }
        Applied {
            grid: next,
            groups: groups.relocate(&moves, grid),
            conflicts,
            intents,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    // _ x
    // _ x
    // _ _
    // _ _
    fn column_fixture() -> Grid {
        Grid::parse(Size::new(2, 4), "_x _x __ __").unwrap()
    }

    fn ledger_with_zero_shape(grid: &Grid, cells: &[usize]) -> GroupLedger {
        let mut ledger = GroupLedger::from_grid(grid);
        ledger.insert_shape(cells.iter().copied());
        ledger
    }

    fn sources(iter: impl Iterator<Item = Intent>) -> Vec<usize> {
        iter.map(|i| i.source).collect()
    }

    #[test]
    fn test_gravity_builds_one_intent_per_cell() {
        let grid = column_fixture();
        let set = IntentSet::gravity(&grid, 0..8, Polarity::direction);
        let targets: Vec<Coords> = set.intents().iter().map(|i| i.target).collect();
        assert_eq!(
            targets,
            vec![
                Coords::new(0, -1),
                Coords::new(1, 1),
                Coords::new(0, 0),
                Coords::new(1, 2),
                Coords::new(0, 1),
                Coords::new(1, 1),
                Coords::new(0, 2),
                Coords::new(1, 2),
            ]
        );
        assert!(set.all_permitted());
    }

    #[test]
    fn test_gravity_honours_supplied_direction() {
        let grid = column_fixture();
        let set = IntentSet::gravity(&grid, [1], |_| 2);
        assert_eq!(set.intents()[0].target, Coords::new(1, 2));
    }

    #[test]
    fn test_group_with_stuck_cell_cannot_move() {
        let grid = column_fixture();
        let ledger = ledger_with_zero_shape(&grid, &[0, 2, 4, 5, 6, 7]);
        let set = IntentSet::gravity(&grid, 0..8, Polarity::direction)
            .forbid_out_of_bounds(grid.size())
            .enforce_cohesion(&ledger, grid.size());
        assert_eq!(sources(set.rejected().copied()), vec![0, 2, 4, 5, 6, 7]);
        assert_eq!(set.intents()[0].verdict, Verdict::OutOfBounds);
        assert_eq!(set.intents()[2].verdict, Verdict::Cohesion);
    }

    #[test]
    fn test_same_polarity_collision() {
        let grid = column_fixture();
        let set = IntentSet::gravity(&grid, 0..8, Polarity::direction)
            .forbid_out_of_bounds(grid.size())
            .collide_same_polarity(&grid);
        assert_eq!(sources(set.rejected().copied()), vec![0, 2, 4, 6]);
        // Cell 1 runs into cell 3, which itself moves onto polarity 0.
        assert!(set.intents()[1].is_permitted());
    }

    #[test]
    fn test_apply_flips_vacated_cells() {
        let grid = column_fixture();
        let ledger = ledger_with_zero_shape(&grid, &[0, 2, 4, 5, 6, 7]);
        let applied = IntentSet::gravity(&grid, 0..8, Polarity::direction)
            .validate(&grid, &ledger)
            .apply(&grid, &ledger);
        assert!(applied.conflicts.is_empty());
        assert_eq!(
            applied.grid,
            Grid::parse(Size::new(2, 4), "__ _x _x __").unwrap()
        );
        assert!(applied.groups.validate(&applied.grid).is_ok());
    }

    #[test]
    fn test_apply_reports_conflicts() {
        let grid = column_fixture();
        let ledger = ledger_with_zero_shape(&grid, &[0, 2, 4, 6]);
        let set = IntentSet::gravity(&grid, 0..8, Polarity::direction)
            .forbid_out_of_bounds(grid.size())
            .enforce_cohesion(&ledger, grid.size())
            .collide_same_polarity(&grid);
        let (_, conflicts, _, intents) = set.apply_to_grid(&grid);
        assert_eq!(conflicts, vec![3, 5]);
        assert_eq!(intents.intents()[1].verdict, Verdict::Conflict);
        assert_eq!(intents.intents()[5].verdict, Verdict::Conflict);
    }

    #[test]
    fn test_cyclic_permutation_is_permitted() {
        // Four same-polarity cells rotating around a 2x2 block.
        let size = Size::new(2, 2);
        let grid = Grid::filled(size, Polarity::One);
        let set: IntentSet = [
            Intent::proposed(0, Coords::new(1, 0)),
            Intent::proposed(1, Coords::new(1, 1)),
            Intent::proposed(3, Coords::new(0, 1)),
            Intent::proposed(2, Coords::new(0, 0)),
        ]
        .into_iter()
        .collect();
        let set = set.forbid_out_of_bounds(size).collide_same_polarity(&grid);
        assert!(set.all_permitted());
    }

    #[test]
    fn test_chain_into_foreign_cycle_is_blocked() {
        // Cells 1 and 2 swap; cell 0 pushes into cell 1 from outside the cycle.
        let size = Size::new(3, 1);
        let grid = Grid::filled(size, Polarity::One);
        let set: IntentSet = [
            Intent::proposed(0, Coords::new(1, 0)),
            Intent::proposed(1, Coords::new(2, 0)),
            Intent::proposed(2, Coords::new(1, 0)),
        ]
        .into_iter()
        .collect();
        let set = set.collide_same_polarity(&grid);
        assert_eq!(sources(set.rejected().copied()), vec![0]);
    }

    #[test]
    fn test_chain_ending_on_stationary_cell_is_blocked() {
        let size = Size::new(1, 3);
        let grid = Grid::filled(size, Polarity::One);
        let set = IntentSet::gravity(&grid, [0, 1], Polarity::direction)
            .collide_same_polarity(&grid);
        assert_eq!(set.rejected().count(), 2);
    }

    #[test]
    fn test_validate_propagates_cohesion_through_chains() {
        // A two-wide x shape on top. First with open cells below, then with
        // background x under its right cell: cohesion must stop the left one too.
        let size = Size::new(2, 3);
        let grid = Grid::parse(size, "xx __ _x").unwrap();
        let mut ledger = GroupLedger::from_grid(&grid);
        let shape = ledger.insert_shape([0, 1]);
        let members = ledger.shape(shape).unwrap().iter().copied();
        let set = IntentSet::gravity(&grid, members, Polarity::direction)
            .validate(&grid, &ledger);
        assert!(set.all_permitted());

        let grid = Grid::parse(size, "xx _x _x").unwrap();
        let mut ledger = GroupLedger::from_grid(&grid);
        let shape = ledger.insert_shape([0, 1]);
        let members = ledger.shape(shape).unwrap().iter().copied();
        let set = IntentSet::gravity(&grid, members, Polarity::direction)
            .validate(&grid, &ledger);
        assert_eq!(set.rejected().count(), 2);
        assert_eq!(set.intents()[0].verdict, Verdict::Cohesion);
        assert_eq!(set.intents()[1].verdict, Verdict::Collision);
    }

    #[test]
    fn test_stationary_group_loses_overrun_cell() {
        // A falling x shape drops into a stuck _ shape's cell.
        let size = Size::new(1, 3);
        let grid = Grid::parse(size, "x _ _").unwrap();
        let mut ledger = GroupLedger::from_grid(&grid);
        let falling = ledger.insert_shape([0]);
        let stuck = ledger.insert_shape([1, 2]);
        let set = IntentSet::gravity(&grid, [0], Polarity::direction)
            .validate(&grid, &ledger);
        let applied = set.apply(&grid, &ledger);
        assert_eq!(applied.groups.shape(falling), Some(&BTreeSet::from([1])));
        assert_eq!(applied.groups.shape(stuck), Some(&BTreeSet::from([2])));
        assert!(applied.groups.validate(&applied.grid).is_ok());
    }
}
