use crate::world::position::Position;
use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq)]
pub struct Waypoint {
    pub position: Position,
    pub pause: Duration,
}

/// A cyclic patrol route. Loaded once per zone and shared read-only through
/// `Arc<GridPath>` by every NPC walking it.
#[derive(Debug, Clone, PartialEq)]
pub struct GridPath {
    pub id: u32,
    waypoints: Vec<Waypoint>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WaypointRow {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    #[serde(default)]
    pub heading: f64,
    /// Seconds to wait after arriving.
    #[serde(default)]
    pub pause: u32,
}

impl GridPath {
    pub fn new(id: u32, waypoints: Vec<Waypoint>) -> Self {
        Self { id, waypoints }
    }

    pub fn from_rows(id: u32, rows: &[WaypointRow]) -> Self {
        let waypoints = rows
            .iter()
            .map(|row| Waypoint {
                position: Position::new(row.x, row.y, row.z).with_heading(row.heading),
                pause: Duration::from_secs(u64::from(row.pause)),
            })
            .collect();
        Self { id, waypoints }
    }

    pub fn len(&self) -> usize {
        self.waypoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.waypoints.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Waypoint> {
        self.waypoints.get(index)
    }

    pub fn next_index(&self, index: usize) -> usize {
        if self.waypoints.is_empty() {
            0
        } else {
            (index + 1) % self.waypoints.len()
        }
    }

    pub fn waypoints(&self) -> &[Waypoint] {
        &self.waypoints
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn next_index_wraps_around() {
        let rows = vec![
            WaypointRow { x: 0.0, y: 0.0, z: 0.0, heading: 0.0, pause: 1 },
            WaypointRow { x: 5.0, y: 0.0, z: 0.0, heading: 0.0, pause: 0 },
            WaypointRow { x: 5.0, y: 5.0, z: 0.0, heading: 90.0, pause: 3 },
        ];
        let path = GridPath::from_rows(4, &rows);
        assert_eq!(path.len(), 3);
        assert_eq!(path.next_index(0), 1);
        assert_eq!(path.next_index(2), 0);
        assert_eq!(path.get(2).map(|waypoint| waypoint.pause), Some(Duration::from_secs(3)));
        assert_eq!(path.get(2).map(|waypoint| waypoint.position.heading), Some(90.0));
    }

    #[test]
    fn empty_path_never_advances() {
        let path = GridPath::new(1, Vec::new());
        assert!(path.is_empty());
        assert_eq!(path.next_index(0), 0);
        assert!(path.get(0).is_none());
    }
}
