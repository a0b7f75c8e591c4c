// amr-fleet/crates/fleet_sim/src/grid.rs
use std::collections::HashSet;

/// Cost of a straight (axis-aligned) step, in milli-units.
pub const STRAIGHT_COST: u32 = 1000;
/// Cost of a diagonal step, in milli-units. `ceil(1000 * sqrt(2))`, so the
/// scaled Euclidean heuristic never overestimates a diagonal move.
pub const DIAGONAL_COST: u32 = 1415;

/// A discrete grid cell. Used for planning and occupancy checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Cell {
    pub x: i32,
    pub y: i32,
}

impl Cell {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    pub fn manhattan(self, other: Cell) -> u32 {
        self.x.abs_diff(other.x) + self.y.abs_diff(other.y)
    }

    pub fn euclidean(self, other: Cell) -> f64 {
        let dx = (self.x - other.x) as f64;
        let dy = (self.y - other.y) as f64;
        (dx * dx + dy * dy).sqrt()
    }

    /// Center of the cell in continuous coordinates.
    pub fn center(self) -> Point {
        Point::new(self.x as f64, self.y as f64)
    }
}

impl std::fmt::Display for Cell {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// A continuous position. Robots move through real-valued space; the derived
/// [`Cell`] (nearest cell center) is what planning and occupancy see.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance_to(self, other: Point) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }

    /// The grid cell this point falls in.
    pub fn cell(self) -> Cell {
        Cell::new(self.x.round() as i32, self.y.round() as i32)
    }
}

/// Movement connectivity for planning and neighbor expansion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Connectivity {
    /// Axis-aligned moves only; Manhattan heuristic.
    Four,
    /// Axis-aligned plus diagonal moves; Euclidean heuristic.
    Eight,
}

const OFFSETS_FOUR: [(i32, i32); 4] = [(1, 0), (-1, 0), (0, 1), (0, -1)];
const OFFSETS_DIAG: [(i32, i32); 4] = [(1, 1), (1, -1), (-1, 1), (-1, -1)];

/// A static 2-D occupancy model: bounds, obstacle set, connectivity.
///
/// Read-only after construction; safe to share behind an `Arc` across any
/// number of concurrent planning calls.
#[derive(Debug, Clone)]
pub struct GridWorkspace {
    width: u32,
    height: u32,
    connectivity: Connectivity,
    obstacles: HashSet<Cell>,
}

impl GridWorkspace {
    pub fn new(
        width: u32,
        height: u32,
        connectivity: Connectivity,
        obstacles: impl IntoIterator<Item = Cell>,
    ) -> Self {
        Self {
            width,
            height,
            connectivity,
            obstacles: obstacles.into_iter().collect(),
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn connectivity(&self) -> Connectivity {
        self.connectivity
    }

    pub fn cell_count(&self) -> u64 {
        u64::from(self.width) * u64::from(self.height)
    }

    pub fn in_bounds(&self, cell: Cell) -> bool {
        cell.x >= 0
            && cell.y >= 0
            && (cell.x as u32) < self.width
            && (cell.y as u32) < self.height
    }

    /// False for out-of-bounds or statically blocked cells.
    pub fn is_traversable(&self, cell: Cell) -> bool {
        self.in_bounds(cell) && !self.obstacles.contains(&cell)
    }

    /// Traversable neighbors of `cell` with their step cost in milli-units.
    ///
    /// Expansion order is fixed (straight moves first, then diagonals) so
    /// planning is reproducible.
    pub fn neighbors(&self, cell: Cell) -> Vec<(Cell, u32)> {
        let mut out = Vec::with_capacity(8);
        for (dx, dy) in OFFSETS_FOUR {
            let n = Cell::new(cell.x + dx, cell.y + dy);
            if self.is_traversable(n) {
                out.push((n, STRAIGHT_COST));
            }
        }
        if self.connectivity == Connectivity::Eight {
            for (dx, dy) in OFFSETS_DIAG {
                let n = Cell::new(cell.x + dx, cell.y + dy);
                if self.is_traversable(n) {
                    out.push((n, DIAGONAL_COST));
                }
            }
        }
        out
    }

    /// Row-major list of every traversable cell. Used for deterministic
    /// fleet placement at startup.
    pub fn traversable_cells(&self) -> Vec<Cell> {
        let mut out = Vec::new();
        for y in 0..self.height as i32 {
            for x in 0..self.width as i32 {
                let c = Cell::new(x, y);
                if self.is_traversable(c) {
                    out.push(c);
                }
            }
        }
        out
    }
}
