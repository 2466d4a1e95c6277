//! Figure outlines, the catalog, and placement onto the grid.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::SimulationError;
use crate::{Coords, Grid, GroupLedger, Polarity, ShapeId};

/// A figure reduced to its block cells.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShapeDescriptor {
    /// Block cells; `y` is relative to the topmost block row.
    pub cells: Vec<Coords>,
    /// Row width of the outline the figure came from.
    pub width: usize,
    /// Rows spanned by the block cells.
    pub height: usize,
}

/// Reduce a flat outline with rows of `width` entries to a descriptor.
pub fn import_shape(outline: &[bool], width: usize) -> Result<ShapeDescriptor, SimulationError> {
    if width == 0 {
        return Err(SimulationError::InvalidOutline("row width is zero"));
    }
    let blocks: Vec<usize> = outline
        .iter()
        .enumerate()
        .filter_map(|(i, &block)| block.then_some(i))
        .collect();
    let (Some(&first), Some(&last)) = (blocks.first(), blocks.last()) else {
        return Err(SimulationError::InvalidOutline("outline has no blocks"));
    };
    let top = first / width;
    let cells = blocks
        .iter()
        .map(|&i| Coords::new((i % width) as i32, (i / width - top) as i32))
        .collect();
    Ok(ShapeDescriptor {
        cells,
        width,
        height: last / width - top + 1,
    })
}

/// Named figures available to `place_figure`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ShapeCatalog {
    shapes: BTreeMap<String, ShapeDescriptor>,
}

impl ShapeCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// The seven tetrominoes.
    pub fn standard() -> Self {
        const X: bool = true;
        const O: bool = false;
        let outlines: [(&str, &[bool], usize); 7] = [
            ("I", &[X, X, X, X], 4),
            ("O", &[X, X, X, X], 2),
            ("T", &[X, X, X, O, X, O], 3),
            ("L", &[X, O, X, O, X, X], 2),
            ("J", &[O, X, O, X, X, X], 2),
            ("S", &[O, X, X, X, X, O], 3),
            ("Z", &[X, X, O, O, X, X], 3),
        ];

        let mut catalog = Self::new();
        for (name, outline, width) in outlines {
            if let Ok(shape) = import_shape(outline, width) {
                catalog.shapes.insert(name.to_string(), shape);
            }
        }
        catalog
    }

    pub fn insert(
        &mut self,
        name: impl Into<String>,
        outline: &[bool],
        width: usize,
    ) -> Result<(), SimulationError> {
        let shape = import_shape(outline, width)?;
        self.shapes.insert(name.into(), shape);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&ShapeDescriptor> {
        self.shapes.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.shapes.keys().map(String::as_str)
    }
}

/// Grid indices `shape` covers when placed with `polarity` so that its
/// bottom edge sits on `spawn_row`, centred horizontally.
///
/// Polarity 0 figures use the same arithmetic, then are mirrored through the
/// grid centre so they spawn below the midline and rise.
pub fn placement_cells(
    grid: &Grid,
    shape: &ShapeDescriptor,
    polarity: Polarity,
    spawn_row: i32,
) -> Option<Vec<usize>> {
    let size = grid.size();
    let offset = Coords::new(
        (size.width as i32 - shape.width as i32).div_euclid(2),
        spawn_row - shape.height as i32,
    );
    shape
        .cells
        .iter()
        .map(|&cell| {
            let mut at = cell + offset;
            if polarity == Polarity::Zero {
                at = Coords::new(size.width as i32 - at.x - 1, size.height as i32 - at.y - 1);
            }
            size.contains(at).then(|| size.index_of(at))
        })
        .collect()
}

/// Stamp `shape` onto the grid as a new shape group.
pub fn place_shape(
    grid: &Grid,
    groups: &GroupLedger,
    name: &str,
    shape: &ShapeDescriptor,
    polarity: Polarity,
    spawn_row: i32,
) -> Result<(Grid, GroupLedger, ShapeId), SimulationError> {
    let cells = placement_cells(grid, shape, polarity, spawn_row).ok_or_else(|| {
        SimulationError::FigureDoesNotFit {
            name: name.to_string(),
            spawn_row,
        }
    })?;

    let mut next = grid.clone();
    for &index in &cells {
        next.set(index, polarity);
    }
    let mut ledger = groups.clone();
    let id = ledger.insert_shape(cells);
    Ok((next, ledger, id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Size;

    fn place(
        catalog: &ShapeCatalog,
        name: &str,
        background: Polarity,
    ) -> (Grid, GroupLedger, ShapeId) {
        let grid = Grid::filled(Size::new(4, 8), background);
        let ledger = GroupLedger::from_grid(&grid);
        let shape = catalog.get(name).unwrap();
        place_shape(&grid, &ledger, name, shape, background.opposite(), 4).unwrap()
    }

    #[test]
    fn test_import_shape() {
        let shape = import_shape(&[true, false, true, false, true, true], 2).unwrap();
        assert_eq!(shape.height, 3);
        assert_eq!(shape.width, 2);
        assert_eq!(
            shape.cells,
            vec![Coords::new(0, 0), Coords::new(0, 1), Coords::new(0, 2), Coords::new(1, 2)]
        );
    }

    #[test]
    fn test_import_shape_trims_leading_rows() {
        let shape = import_shape(&[false, false, true, true], 2).unwrap();
        assert_eq!(shape.height, 1);
        assert_eq!(shape.cells, vec![Coords::new(0, 0), Coords::new(1, 0)]);
    }

    #[test]
    fn test_import_shape_rejects_empty_outline() {
        assert!(matches!(
            import_shape(&[false, false], 2),
            Err(SimulationError::InvalidOutline(_))
        ));
        assert!(import_shape(&[true], 0).is_err());
    }

    #[test]
    fn test_place_t_polarity_one() {
        let catalog = ShapeCatalog::standard();
        let (grid, _, _) = place(&catalog, "T", Polarity::Zero);
        let expected = Grid::parse(
            Size::new(4, 8),
            "____ ____ xxx_ _x__ ____ ____ ____ ____",
        )
        .unwrap();
        assert_eq!(grid, expected);
    }

    #[test]
    fn test_place_l_polarity_one() {
        let catalog = ShapeCatalog::standard();
        let (grid, _, _) = place(&catalog, "L", Polarity::Zero);
        let expected = Grid::parse(
            Size::new(4, 8),
            "____ _x__ _x__ _xx_ ____ ____ ____ ____",
        )
        .unwrap();
        assert_eq!(grid, expected);
    }

    #[test]
    fn test_place_cuts_cells_from_background() {
        let catalog = ShapeCatalog::standard();
        let (grid, ledger, id) = place(&catalog, "I", Polarity::Zero);
        let cells: Vec<usize> = ledger.shape(id).unwrap().iter().copied().collect();
        assert_eq!(cells, vec![12, 13, 14, 15]);
        let background = ledger.background(Polarity::Zero);
        assert!(cells.iter().all(|c| !background.contains(c)));
        assert!(ledger.validate(&grid).is_ok());
    }

    #[test]
    fn test_place_polarity_zero_is_mirrored() {
        let catalog = ShapeCatalog::standard();
        let (grid, _, _) = place(&catalog, "T", Polarity::One);
        let expected = Grid::parse(
            Size::new(4, 8),
            "xxxx xxxx xxxx xxxx xx_x x___ xxxx xxxx",
        )
        .unwrap();
        assert_eq!(grid, expected);

        let (grid, _, _) = place(&catalog, "Z", Polarity::One);
        let expected = Grid::parse(
            Size::new(4, 8),
            "xxxx xxxx xxxx xxxx x__x xx__ xxxx xxxx",
        )
        .unwrap();
        assert_eq!(grid, expected);

        let (grid, ledger, id) = place(&catalog, "I", Polarity::One);
        let cells: Vec<usize> = ledger.shape(id).unwrap().iter().copied().collect();
        assert_eq!(cells, vec![16, 17, 18, 19]);
        assert!(ledger.validate(&grid).is_ok());
    }

    #[test]
    fn test_place_rejects_figure_outside_grid() {
        let grid = Grid::filled(Size::new(4, 8), Polarity::Zero);
        let ledger = GroupLedger::from_grid(&grid);
        let catalog = ShapeCatalog::standard();
        let shape = catalog.get("L").unwrap();
        let result = place_shape(&grid, &ledger, "L", shape, Polarity::One, 1);
        assert!(matches!(result, Err(SimulationError::FigureDoesNotFit { .. })));
    }
}
