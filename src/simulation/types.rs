//! Core types for the navigation simulation
//!
//! Plain geometry and id types shared by every other module.

use std::ops::{Add, Mul, Neg, Sub};

/// A unique identifier for simulation entities
/// This is a simple wrapper around a usize for type safety
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SimId(pub usize);

/// A wrapper type for road segment IDs
///
/// Segment ids are dense: the n-th declared segment has id `n`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SegmentId(pub usize);

/// A wrapper type for autonomous agent IDs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AgentId(pub SimId);

/// A wrapper type for physical body IDs in the scene
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BodyId(pub SimId);

/// A 3D position in the simulation
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Position {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Position {
    pub const ZERO: Position = Position {
        x: 0.0,
        y: 0.0,
        z: 0.0,
    };

    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    /// Shorthand for a point on the ground plane
    pub fn ground(x: f32, z: f32) -> Self {
        Self { x, y: 0.0, z }
    }

    pub fn distance(&self, other: &Position) -> f32 {
        (*other - *self).length()
    }

    pub fn lerp(&self, other: &Position, t: f32) -> Position {
        Position {
            x: self.x + (other.x - self.x) * t,
            y: self.y + (other.y - self.y) * t,
            z: self.z + (other.z - self.z) * t,
        }
    }

    pub fn dot(&self, other: &Position) -> f32 {
        self.x * other.x + self.y * other.y + self.z * other.z
    }

    pub fn length(&self) -> f32 {
        self.dot(self).sqrt()
    }

    /// Unit vector in the same direction, or zero for a zero vector
    pub fn normalized(&self) -> Position {
        let len = self.length();
        if len > f32::EPSILON {
            *self * (1.0 / len)
        } else {
            Position::ZERO
        }
    }

    /// Same point with the height removed
    pub fn flatten(&self) -> Position {
        Position::new(self.x, 0.0, self.z)
    }

    /// Rotate around the vertical axis; positive degrees turn right
    pub fn rotated_y(&self, degrees: f32) -> Position {
        let (sin, cos) = degrees.to_radians().sin_cos();
        Position {
            x: self.x * cos + self.z * sin,
            y: self.y,
            z: -self.x * sin + self.z * cos,
        }
    }
}

impl Add for Position {
    type Output = Position;

    fn add(self, rhs: Position) -> Position {
        Position::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl Sub for Position {
    type Output = Position;

    fn sub(self, rhs: Position) -> Position {
        Position::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

impl Mul<f32> for Position {
    type Output = Position;

    fn mul(self, rhs: f32) -> Position {
        Position::new(self.x * rhs, self.y * rhs, self.z * rhs)
    }
}

impl Neg for Position {
    type Output = Position;

    fn neg(self) -> Position {
        Position::new(-self.x, -self.y, -self.z)
    }
}

/// Where a body is and which way it faces on the ground plane
///
/// Yaw is in radians. Yaw 0 faces +z and positive yaw turns right
/// (clockwise seen from above), so local +x is the body's right side.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Pose {
    pub position: Position,
    pub yaw: f32,
}

impl Pose {
    pub fn new(position: Position, yaw: f32) -> Self {
        Self { position, yaw }
    }

    /// Pose at `position` facing towards `target`
    pub fn looking_at(position: Position, target: Position) -> Self {
        let dx = target.x - position.x;
        let dz = target.z - position.z;
        Self {
            position,
            yaw: dx.atan2(dz),
        }
    }

    pub fn forward(&self) -> Position {
        Position::new(self.yaw.sin(), 0.0, self.yaw.cos())
    }

    pub fn right(&self) -> Position {
        Position::new(self.yaw.cos(), 0.0, -self.yaw.sin())
    }

    /// World point expressed in this pose's local frame
    ///
    /// The point is flattened to the pose's height first, so the result
    /// only carries lateral (x) and longitudinal (z) offsets.
    pub fn inverse_transform_point(&self, point: Position) -> Position {
        let offset = Position::new(
            point.x - self.position.x,
            0.0,
            point.z - self.position.z,
        );
        self.inverse_transform_direction(offset)
    }

    /// World direction expressed in this pose's local frame
    pub fn inverse_transform_direction(&self, direction: Position) -> Position {
        Position::new(
            direction.dot(&self.right()),
            direction.y,
            direction.dot(&self.forward()),
        )
    }
}

/// A path point an agent steers toward
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Waypoint {
    pub position: Position,
}

impl Waypoint {
    pub fn new(position: Position) -> Self {
        Self { position }
    }
}

/// Radius of the collision circle used for vehicles in the scene
pub const VEHICLE_RADIUS: f32 = 0.5;

/// Steering magnitude above which a turn is considered planned
pub const TURN_INTENT_THRESHOLD: f32 = 0.3;

/// Steering magnitude above which a blinker comes on
pub const BLINKER_THRESHOLD: f32 = 0.6;
