use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    #[serde(default)]
    pub heading: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Velocity {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PositionDelta {
    pub dx: f64,
    pub dy: f64,
    pub dz: f64,
}

impl Position {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self {
            x,
            y,
            z,
            heading: 0.0,
        }
    }

    pub fn with_heading(self, heading: f64) -> Self {
        Self { heading, ..self }
    }

    pub fn delta_to(self, target: Position) -> PositionDelta {
        PositionDelta {
            dx: target.x - self.x,
            dy: target.y - self.y,
            dz: target.z - self.z,
        }
    }

    pub fn offset(self, delta: PositionDelta, fraction: f64) -> Self {
        Self {
            x: self.x + delta.dx * fraction,
            y: self.y + delta.dy * fraction,
            z: self.z + delta.dz * fraction,
            heading: self.heading,
        }
    }

    /// Compares coordinates only; heading is ignored.
    pub fn same_place(self, other: Position) -> bool {
        self.x == other.x && self.y == other.y && self.z == other.z
    }
}

impl PositionDelta {
    pub fn length_squared(self) -> f64 {
        self.dx * self.dx + self.dy * self.dy + self.dz * self.dz
    }

    pub fn length(self) -> f64 {
        self.length_squared().sqrt()
    }

    /// Heading in degrees of the horizontal component, `atan2(dy, dx)`.
    pub fn heading_degrees(self) -> f64 {
        self.dy.atan2(self.dx).to_degrees()
    }

    pub fn per_second(self, elapsed_secs: f64) -> Velocity {
        Velocity {
            x: self.dx / elapsed_secs,
            y: self.dy / elapsed_secs,
            z: self.dz / elapsed_secs,
        }
    }
}

impl Velocity {
    pub const ZERO: Velocity = Velocity {
        x: 0.0,
        y: 0.0,
        z: 0.0,
    };

    pub fn is_zero(self) -> bool {
        self.x == 0.0 && self.y == 0.0 && self.z == 0.0
    }

    pub fn between(from: Position, to: Position) -> Self {
        Self {
            x: to.x - from.x,
            y: to.y - from.y,
            z: to.z - from.z,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn heading_follows_horizontal_displacement() {
        let origin = Position::new(0.0, 0.0, 0.0);
        let east = origin.delta_to(Position::new(10.0, 0.0, 5.0));
        let north = origin.delta_to(Position::new(0.0, 10.0, 0.0));
        let west = origin.delta_to(Position::new(-3.0, 0.0, 0.0));
        assert_eq!(east.heading_degrees(), 0.0);
        assert!((north.heading_degrees() - 90.0).abs() < 1e-9);
        assert!((west.heading_degrees() - 180.0).abs() < 1e-9);
    }

    #[test]
    fn offset_moves_by_fraction_and_keeps_heading() {
        let start = Position::new(0.0, 0.0, 0.0).with_heading(45.0);
        let delta = start.delta_to(Position::new(10.0, -20.0, 4.0));
        let halfway = start.offset(delta, 0.5);
        assert_eq!(halfway, Position::new(5.0, -10.0, 2.0).with_heading(45.0));
    }

    #[test]
    fn same_place_ignores_heading() {
        let a = Position::new(1.0, 2.0, 3.0).with_heading(10.0);
        let b = Position::new(1.0, 2.0, 3.0).with_heading(270.0);
        assert!(a.same_place(b));
        assert!(!a.same_place(Position::new(1.0, 2.0, 3.5)));
    }

    #[test]
    fn velocity_between_positions() {
        let from = Position::new(1.0, 1.0, 1.0);
        let to = Position::new(4.0, -1.0, 1.0);
        let velocity = Velocity::between(from, to);
        assert_eq!(velocity, Velocity { x: 3.0, y: -2.0, z: 0.0 });
        assert!(!velocity.is_zero());
        assert!(Velocity::ZERO.is_zero());
    }
}
