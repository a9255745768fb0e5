// src/dungeon/src/grid.rs
use serde::{Deserialize, Serialize};
use strum::{EnumIter, IntoEnumIterator};

/// A tile coordinate. `y` grows downward, matching terminal rows.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
pub struct Position {
    pub x: i32,
    pub y: i32,
}

impl Position {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    pub fn offset(self, dir: Direction) -> Self {
        let (dx, dy) = dir.delta();
        Self::new(self.x + dx, self.y + dy)
    }

    /// Orthogonal neighbours in the fixed North, East, South, West order.
    ///
    /// Every flood fill and downhill walk iterates this order, which is what
    /// makes tie-breaking between equal-distance tiles reproducible.
    pub fn neighbors(self) -> [Position; 4] {
        Direction::CARDINALS.map(|d| self.offset(d))
    }

    pub fn manhattan(self, other: Position) -> u32 {
        self.x.abs_diff(other.x) + self.y.abs_diff(other.y)
    }

    pub fn distance_squared(self, other: Position) -> i64 {
        let dx = (self.x - other.x) as i64;
        let dy = (self.y - other.y) as i64;
        dx * dx + dy * dy
    }

    /// Chebyshev distance, the radius of the square containing `other`.
    pub fn chebyshev(self, other: Position) -> u32 {
        self.x.abs_diff(other.x).max(self.y.abs_diff(other.y))
    }

    pub fn is_adjacent(self, other: Position) -> bool {
        self.manhattan(other) == 1
    }

    /// Direction of a single orthogonal step to `other`, if it is one.
    pub fn direction_to(self, other: Position) -> Option<Direction> {
        Direction::iter().find(|d| self.offset(*d) == other)
    }
}

impl From<(i32, i32)> for Position {
    fn from((x, y): (i32, i32)) -> Self {
        Self::new(x, y)
    }
}

/// Orthogonal movement directions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, Serialize, Deserialize)]
pub enum Direction {
    North,
    East,
    South,
    West,
}

impl Direction {
    pub const CARDINALS: [Direction; 4] = [
        Direction::North,
        Direction::East,
        Direction::South,
        Direction::West,
    ];

    pub fn delta(self) -> (i32, i32) {
        match self {
            Direction::North => (0, -1),
            Direction::East => (1, 0),
            Direction::South => (0, 1),
            Direction::West => (-1, 0),
        }
    }

    pub fn opposite(self) -> Direction {
        match self {
            Direction::North => Direction::South,
            Direction::East => Direction::West,
            Direction::South => Direction::North,
            Direction::West => Direction::East,
        }
    }
}

/// Dense row-major grid covering a whole level.
///
/// Out-of-range reads return `None` and out-of-range writes are ignored, so
/// callers never need to bounds-check before asking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Grid<T> {
    width: i32,
    height: i32,
    cells: Vec<T>,
}

impl<T: Clone> Grid<T> {
    pub fn new(width: i32, height: i32, fill: T) -> Self {
        let width = width.max(0);
        let height = height.max(0);
        Self {
            width,
            height,
            cells: vec![fill; (width * height) as usize],
        }
    }

    pub fn fill(&mut self, value: T) {
        self.cells.iter_mut().for_each(|c| *c = value.clone());
    }
}

impl<T> Grid<T> {
    pub fn width(&self) -> i32 {
        self.width
    }

    pub fn height(&self) -> i32 {
        self.height
    }

    pub fn in_bounds(&self, pos: Position) -> bool {
        pos.x >= 0 && pos.y >= 0 && pos.x < self.width && pos.y < self.height
    }

    fn index(&self, pos: Position) -> Option<usize> {
        self.in_bounds(pos)
            .then(|| (pos.y * self.width + pos.x) as usize)
    }

    pub fn get(&self, pos: Position) -> Option<&T> {
        self.index(pos).map(|i| &self.cells[i])
    }

    pub fn get_mut(&mut self, pos: Position) -> Option<&mut T> {
        self.index(pos).map(move |i| &mut self.cells[i])
    }

    /// Writes `value` and returns whether `pos` was on the grid.
    pub fn set(&mut self, pos: Position, value: T) -> bool {
        match self.get_mut(pos) {
            Some(cell) => {
                *cell = value;
                true
            }
            None => false,
        }
    }

    /// All positions in row-major order.
    pub fn positions(&self) -> impl Iterator<Item = Position> + use<T> {
        let (w, h) = (self.width, self.height);
        (0..h).flat_map(move |y| (0..w).map(move |x| Position::new(x, y)))
    }

    pub fn iter(&self) -> impl Iterator<Item = (Position, &T)> {
        self.positions().zip(self.cells.iter())
    }

    pub fn same_shape<U>(&self, other: &Grid<U>) -> bool {
        self.width == other.width && self.height == other.height
    }
}
