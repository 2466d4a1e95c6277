//! Grid addressing and cell polarity.
//!
//! Cells are stored row-major: `index = y * width + x`. Coordinates are
//! signed so that proposed targets outside the grid can be represented and
//! rejected later.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Add;

use crate::error::{InvariantViolation, ParseGridError};

/// The value held by a cell. There is no empty cell: vacating a cell leaves
/// the opposite polarity behind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum Polarity {
    /// Rises (y decreasing); its background mass anchors at the top edge.
    Zero,
    /// Falls (y increasing); its background mass anchors at the bottom edge.
    One,
}

impl Polarity {
    pub const ALL: [Polarity; 2] = [Polarity::Zero, Polarity::One];

    pub fn opposite(self) -> Polarity {
        match self {
            Polarity::Zero => Polarity::One,
            Polarity::One => Polarity::Zero,
        }
    }

    /// Vertical gravity step for this polarity.
    pub fn direction(self) -> i32 {
        match self {
            Polarity::Zero => -1,
            Polarity::One => 1,
        }
    }

    /// Symbol used by the text dump.
    pub fn symbol(self) -> char {
        match self {
            Polarity::Zero => '_',
            Polarity::One => 'x',
        }
    }

    pub fn from_symbol(c: char) -> Option<Polarity> {
        match c {
            '_' | '0' => Some(Polarity::Zero),
            'x' | '1' => Some(Polarity::One),
            _ => None,
        }
    }
}

impl From<Polarity> for u8 {
    fn from(p: Polarity) -> u8 {
        match p {
            Polarity::Zero => 0,
            Polarity::One => 1,
        }
    }
}

impl TryFrom<u8> for Polarity {
    type Error = ParseGridError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Polarity::Zero),
            1 => Ok(Polarity::One),
            other => Err(ParseGridError::InvalidPolarity(other)),
        }
    }
}

impl fmt::Display for Polarity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", u8::from(*self))
    }
}

/// A cell position. May lie outside the grid while an intent is being checked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Coords {
    pub x: i32,
    pub y: i32,
}

impl Coords {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

impl Add for Coords {
    type Output = Coords;

    fn add(self, rhs: Coords) -> Coords {
        Coords::new(self.x + rhs.x, self.y + rhs.y)
    }
}

/// Grid dimensions, fixed for the lifetime of a simulation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Size {
    pub width: usize,
    pub height: usize,
}

impl Size {
    pub const fn new(width: usize, height: usize) -> Self {
        Self { width, height }
    }

    pub fn cell_count(&self) -> usize {
        self.width * self.height
    }

    /// Whether `coords` lies inside `[0, width) x [0, height)`.
    pub fn contains(&self, coords: Coords) -> bool {
        coords.x >= 0
            && coords.y >= 0
            && (coords.x as usize) < self.width
            && (coords.y as usize) < self.height
    }

    #[inline]
    pub fn coords_of(&self, index: usize) -> Coords {
        Coords::new((index % self.width) as i32, (index / self.width) as i32)
    }

    /// Callers are responsible for bounds; see [`Size::contains`].
    #[inline]
    pub fn index_of(&self, coords: Coords) -> usize {
        debug_assert!(self.contains(coords), "{coords:?} outside {self:?}");
        coords.y as usize * self.width + coords.x as usize
    }

    #[inline]
    pub fn row_of(&self, index: usize) -> usize {
        index / self.width
    }
}

/// The cell values of a simulation, row-major.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Grid {
    size: Size,
    cells: Vec<Polarity>,
}

impl Grid {
    /// A grid where every cell holds `polarity`.
    pub fn filled(size: Size, polarity: Polarity) -> Self {
        Self {
            size,
            cells: vec![polarity; size.cell_count()],
        }
    }

    /// Rows `0..height/2` hold polarity 0, the remaining rows polarity 1.
    pub fn split_halves(size: Size) -> Self {
        let boundary = size.height / 2;
        let cells = (0..size.cell_count())
            .map(|i| {
                if size.row_of(i) < boundary {
                    Polarity::Zero
                } else {
                    Polarity::One
                }
            })
            .collect();
        Self { size, cells }
    }

    pub fn from_cells(size: Size, cells: Vec<Polarity>) -> Result<Self, InvariantViolation> {
        if cells.len() != size.cell_count() {
            return Err(InvariantViolation::GridLength {
                expected: size.cell_count(),
                found: cells.len(),
            });
        }
        Ok(Self { size, cells })
    }

    /// Parse a grid from `x`/`_` (or `1`/`0`) symbols. Whitespace is ignored,
    /// so fixtures can be laid out one row per line.
    pub fn parse(size: Size, text: &str) -> Result<Self, ParseGridError> {
        let cells = text
            .chars()
            .filter(|c| !c.is_whitespace())
            .map(|c| Polarity::from_symbol(c).ok_or(ParseGridError::UnknownSymbol(c)))
            .collect::<Result<Vec<_>, _>>()?;
        if cells.len() != size.cell_count() {
            return Err(ParseGridError::WrongLength {
                expected: size.cell_count(),
                found: cells.len(),
            });
        }
        Ok(Self { size, cells })
    }

    pub fn size(&self) -> Size {
        self.size
    }

    pub fn cells(&self) -> &[Polarity] {
        &self.cells
    }

    /// Panics if `index` is out of range; indices come from the ledger,
    /// which is validated against the grid size.
    #[inline]
    pub fn get(&self, index: usize) -> Polarity {
        self.cells[index]
    }

    pub(crate) fn set(&mut self, index: usize, polarity: Polarity) {
        self.cells[index] = polarity;
    }

    pub fn row(&self, y: usize) -> &[Polarity] {
        let start = y * self.size.width;
        &self.cells[start..start + self.size.width]
    }

    pub fn count(&self, polarity: Polarity) -> usize {
        self.cells.iter().filter(|&&p| p == polarity).count()
    }
}

impl fmt::Display for Grid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for y in 0..self.size.height {
            let line: String = self.row(y).iter().map(|p| p.symbol()).collect();
            writeln!(f, "{line}")?;
        }
        Ok(())
    }
}
