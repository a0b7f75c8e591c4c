use std::collections::{BTreeMap, HashSet};

use crate::error::StationError;
use crate::grid::{Cell, Point};
use crate::robot::RobotId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StationId(pub u32);

impl std::fmt::Display for StationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "CS-{}", self.0)
    }
}

/// A charging point with a fixed position and a bounded occupant set.
///
/// Invariant: `occupants.len() <= capacity`, enforced at the single
/// mutation site ([`StationSet::occupy`]). A slot is taken when a robot is
/// dispatched toward the station, not on arrival, so two robots can never
/// race for the last slot.
#[derive(Debug, Clone)]
pub struct ChargingStation {
    id: StationId,
    cell: Cell,
    capacity: usize,
    occupants: HashSet<RobotId>,
}

impl ChargingStation {
    pub fn id(&self) -> StationId {
        self.id
    }

    pub fn cell(&self) -> Cell {
        self.cell
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn occupants(&self) -> &HashSet<RobotId> {
        &self.occupants
    }

    pub fn has_free_slot(&self) -> bool {
        self.occupants.len() < self.capacity
    }
}

/// All charging stations, keyed by id for deterministic iteration.
#[derive(Debug, Clone, Default)]
pub struct StationSet {
    stations: BTreeMap<StationId, ChargingStation>,
}

impl StationSet {
    pub fn new(cells: &[Cell], capacity: usize) -> Self {
        let stations = cells
            .iter()
            .enumerate()
            .map(|(i, &cell)| {
                let id = StationId(i as u32);
                (
                    id,
                    ChargingStation {
                        id,
                        cell,
                        capacity,
                        occupants: HashSet::new(),
                    },
                )
            })
            .collect();
        Self { stations }
    }

    pub fn len(&self) -> usize {
        self.stations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stations.is_empty()
    }

    pub fn get(&self, id: StationId) -> Option<&ChargingStation> {
        self.stations.get(&id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ChargingStation> {
        self.stations.values()
    }

    /// The nearest station that still has a free slot. Distance ties break
    /// toward the lower id.
    pub fn nearest_with_slot(&self, from: Point) -> Option<StationId> {
        let mut best: Option<(f64, StationId)> = None;
        for station in self.stations.values() {
            if !station.has_free_slot() {
                continue;
            }
            let dist = from.distance_to(station.cell.center());
            if best.map_or(true, |(d, _)| dist < d) {
                best = Some((dist, station.id));
            }
        }
        best.map(|(_, id)| id)
    }

    /// Reserves a slot for `robot`. Idempotent for a robot already holding
    /// one.
    pub fn occupy(&mut self, id: StationId, robot: RobotId) -> Result<(), StationError> {
        let station = self
            .stations
            .get_mut(&id)
            .ok_or(StationError::UnknownStation(id))?;
        if station.occupants.contains(&robot) {
            return Ok(());
        }
        if !station.has_free_slot() {
            return Err(StationError::StationFull(id));
        }
        station.occupants.insert(robot);
        Ok(())
    }

    /// Frees the slot held by `robot`, if any.
    pub fn release(&mut self, id: StationId, robot: RobotId) {
        if let Some(station) = self.stations.get_mut(&id) {
            station.occupants.remove(&robot);
        }
    }

    /// Drops `robot` from every station. Used by emergency stop.
    pub fn release_everywhere(&mut self, robot: RobotId) {
        for station in self.stations.values_mut() {
            station.occupants.remove(&robot);
        }
    }

    #[cfg(debug_assertions)]
    pub(crate) fn assert_capacity_invariant(&self) {
        for station in self.stations.values() {
            debug_assert!(
                station.occupants.len() <= station.capacity,
                "station {} over capacity",
                station.id
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set() -> StationSet {
        StationSet::new(&[Cell::new(5, 5), Cell::new(45, 5), Cell::new(25, 25)], 2)
    }

    #[test]
    fn occupancy_never_exceeds_capacity() {
        let mut s = set();
        let id = StationId(0);
        s.occupy(id, RobotId(1)).unwrap();
        s.occupy(id, RobotId(2)).unwrap();
        assert_eq!(
            s.occupy(id, RobotId(3)),
            Err(StationError::StationFull(id))
        );
        assert_eq!(s.get(id).unwrap().occupants().len(), 2);
    }

    #[test]
    fn occupy_is_idempotent_per_robot() {
        let mut s = set();
        s.occupy(StationId(0), RobotId(1)).unwrap();
        s.occupy(StationId(0), RobotId(1)).unwrap();
        assert_eq!(s.get(StationId(0)).unwrap().occupants().len(), 1);
    }

    #[test]
    fn nearest_with_slot_skips_full_stations() {
        let mut s = set();
        let near = Point::new(6.0, 6.0);
        assert_eq!(s.nearest_with_slot(near), Some(StationId(0)));

        s.occupy(StationId(0), RobotId(1)).unwrap();
        s.occupy(StationId(0), RobotId(2)).unwrap();
        assert_eq!(s.nearest_with_slot(near), Some(StationId(2)));
    }

    #[test]
    fn release_frees_the_slot() {
        let mut s = set();
        s.occupy(StationId(1), RobotId(7)).unwrap();
        s.release(StationId(1), RobotId(7));
        assert!(s.get(StationId(1)).unwrap().occupants().is_empty());
    }

    #[test]
    fn no_station_with_slot_returns_none() {
        let mut s = StationSet::new(&[Cell::new(1, 1)], 1);
        s.occupy(StationId(0), RobotId(1)).unwrap();
        assert_eq!(s.nearest_with_slot(Point::new(0.0, 0.0)), None);
    }
}
