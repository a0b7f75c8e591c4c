// amr-fleet/crates/fleet_sim/src/planner.rs
//! A* shortest-path search over a [`GridWorkspace`].
//!
//! Costs are integer milli-units (straight step 1000, diagonal 1415) so the
//! frontier ordering is exact, with no float comparison anywhere in the
//! search. Ties on `f` prefer the smaller heuristic, then earlier insertion,
//! which keeps expansion order fully deterministic.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap, HashSet};

use crate::error::PlanError;
use crate::grid::{Cell, Connectivity, GridWorkspace};

/// An ordered sequence of cells from start to goal inclusive, plus the total
/// traversal cost in milli-units.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    cells: Vec<Cell>,
    cost_millis: u64,
}

impl Route {
    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    pub fn into_cells(self) -> Vec<Cell> {
        self.cells
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn cost_millis(&self) -> u64 {
        self.cost_millis
    }
}

/// Counters from one search, for diagnostics and tests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SearchStats {
    /// Cells moved from the frontier into the closed set. Each cell is
    /// expanded at most once.
    pub expanded: u64,
    /// Stale frontier entries skipped because the cell was already closed.
    pub duplicates_skipped: u64,
}

#[derive(Debug, PartialEq, Eq)]
struct OpenNode {
    f: u64,
    h: u64,
    seq: u64,
    cell: Cell,
}

// BinaryHeap is a max-heap; "greater" here means "expand sooner": the
// smallest f, then the smallest h, then the earliest insertion.
impl Ord for OpenNode {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .f
            .cmp(&self.f)
            .then_with(|| other.h.cmp(&self.h))
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for OpenNode {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Admissible heuristic in milli-units: Manhattan for 4-connected grids,
/// Euclidean (rounded down) for 8-connected.
fn heuristic_millis(from: Cell, goal: Cell, connectivity: Connectivity) -> u64 {
    match connectivity {
        Connectivity::Four => u64::from(from.manhattan(goal)) * 1000,
        Connectivity::Eight => (from.euclidean(goal) * 1000.0).floor() as u64,
    }
}

/// Computes a shortest route from `start` to `goal`.
///
/// Fails with [`PlanError::UnreachableGoal`] once the open set is exhausted
/// without reaching the goal; blocked endpoints are rejected up front.
/// Terminates on any input: the closed set bounds expansions by the
/// workspace cell count.
pub fn plan(grid: &GridWorkspace, start: Cell, goal: Cell) -> Result<Route, PlanError> {
    plan_with_stats(grid, start, goal).0
}

/// Same as [`plan`], also returning search counters.
pub fn plan_with_stats(
    grid: &GridWorkspace,
    start: Cell,
    goal: Cell,
) -> (Result<Route, PlanError>, SearchStats) {
    let mut stats = SearchStats::default();

    if !grid.is_traversable(start) {
        return (Err(PlanError::StartBlocked(start)), stats);
    }
    if !grid.is_traversable(goal) {
        return (Err(PlanError::GoalBlocked(goal)), stats);
    }
    if start == goal {
        return (
            Ok(Route {
                cells: vec![start],
                cost_millis: 0,
            }),
            stats,
        );
    }

    let connectivity = grid.connectivity();
    let mut open = BinaryHeap::new();
    let mut closed: HashSet<Cell> = HashSet::new();
    let mut g_score: HashMap<Cell, u64> = HashMap::new();
    let mut came_from: HashMap<Cell, Cell> = HashMap::new();
    let mut seq = 0u64;

    let h0 = heuristic_millis(start, goal, connectivity);
    g_score.insert(start, 0);
    open.push(OpenNode {
        f: h0,
        h: h0,
        seq,
        cell: start,
    });

    while let Some(node) = open.pop() {
        if closed.contains(&node.cell) {
            // A cheaper entry for this cell was expanded earlier.
            stats.duplicates_skipped += 1;
            continue;
        }
        if node.cell == goal {
            let cost = g_score[&goal];
            return (Ok(reconstruct(&came_from, start, goal, cost)), stats);
        }
        closed.insert(node.cell);
        stats.expanded += 1;

        let g = g_score[&node.cell];
        for (neighbor, step) in grid.neighbors(node.cell) {
            if closed.contains(&neighbor) {
                continue;
            }
            let tentative = g + u64::from(step);
            if g_score
                .get(&neighbor)
                .map_or(true, |&best| tentative < best)
            {
                g_score.insert(neighbor, tentative);
                came_from.insert(neighbor, node.cell);
                seq += 1;
                let h = heuristic_millis(neighbor, goal, connectivity);
                open.push(OpenNode {
                    f: tentative + h,
                    h,
                    seq,
                    cell: neighbor,
                });
            }
        }
    }

    (Err(PlanError::UnreachableGoal { start, goal }), stats)
}

fn reconstruct(came_from: &HashMap<Cell, Cell>, start: Cell, goal: Cell, cost: u64) -> Route {
    let mut cells = vec![goal];
    let mut current = goal;
    while current != start {
        current = came_from[&current];
        cells.push(current);
    }
    cells.reverse();
    Route {
        cells,
        cost_millis: cost,
    }
}
