//! Simulated range sensing
//!
//! An agent casts a fan of probes ahead of itself and reports the first
//! body it sees. The probes themselves are answered by a [`RangeSensor`]
//! supplied by whatever owns the physical scene.

use std::ops::BitOr;

use log::trace;

use super::types::{AgentId, Position};

/// Allow-list of classification layers a probe may hit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct LayerMask(pub u32);

impl LayerMask {
    pub const NONE: LayerMask = LayerMask(0);
    pub const AUTONOMOUS_VEHICLE: LayerMask = LayerMask(1 << 0);
    pub const PLAYER: LayerMask = LayerMask(1 << 1);
    pub const STATIC_OBSTACLE: LayerMask = LayerMask(1 << 2);

    /// A user-defined layer; `index` 0..=28 maps past the built-in layers
    pub fn custom(index: u32) -> LayerMask {
        LayerMask(1 << (index.min(28) + 3))
    }

    pub fn contains(&self, other: LayerMask) -> bool {
        other.0 != 0 && self.0 & other.0 == other.0
    }

    pub fn intersects(&self, other: LayerMask) -> bool {
        self.0 & other.0 != 0
    }
}

impl BitOr for LayerMask {
    type Output = LayerMask;

    fn bitor(self, rhs: LayerMask) -> LayerMask {
        LayerMask(self.0 | rhs.0)
    }
}

/// What a probe hit, as classified by the scene owner
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObstacleKind {
    /// Another navigating agent
    Agent(AgentId),
    /// The externally driven player vehicle
    Player,
    /// Anything else on an allowed layer
    Generic,
}

/// A single probe result from the range sensor
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProbeHit {
    pub kind: ObstacleKind,
    /// Reference point (origin) of the body that was hit
    pub body_position: Position,
    /// Forward heading of the body that was hit
    pub body_forward: Position,
    /// Distance from the probe origin to the hit point
    pub distance: f32,
}

/// Ray casting against the physical scene
pub trait RangeSensor {
    /// Nearest body on an allowed layer along the ray, if any
    ///
    /// `caster` is the body doing the sensing; it is never reported. A body
    /// that already contains `origin` is hit at distance zero.
    fn cast(
        &self,
        origin: Position,
        direction: Position,
        length: f32,
        mask: LayerMask,
        caster: Option<ObstacleKind>,
    ) -> Option<ProbeHit>;
}

/// Which distance a [`Detection`] reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DistanceMode {
    /// Euclidean distance from the agent to the obstacle's reference point
    #[default]
    ObstacleOrigin,
    /// Distance along the probe to the hit point
    RayHit,
}

/// Sensing parameters of one agent
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProbeConfig {
    pub probe_count: u32,
    pub length: f32,
    /// Probe spacing in degrees at full speed
    pub spacing_at_speed_deg: f32,
    /// Probe spacing in degrees when stopped
    pub spacing_at_rest_deg: f32,
    pub distance_mode: DistanceMode,
    pub mask: LayerMask,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            probe_count: 6,
            length: 5.0,
            spacing_at_speed_deg: 2.0,
            spacing_at_rest_deg: 8.0,
            distance_mode: DistanceMode::ObstacleOrigin,
            mask: LayerMask::AUTONOMOUS_VEHICLE | LayerMask::PLAYER,
        }
    }
}

impl ProbeConfig {
    /// Angular spacing between probes for a speed ratio in [0, 1]
    pub fn spacing_deg(&self, speed_ratio: f32) -> f32 {
        let ratio = speed_ratio.clamp(0.0, 1.0);
        let spacing = self.spacing_at_speed_deg
            + (self.spacing_at_rest_deg - self.spacing_at_speed_deg) * (1.0 - ratio);
        spacing.round().max(1.0)
    }

    /// Probe angles from leftmost to rightmost, in degrees
    pub fn probe_angles(&self, speed_ratio: f32) -> Vec<f32> {
        let spacing = self.spacing_deg(speed_ratio);
        let half_arc = self.probe_count as f32 / 2.0 * spacing;
        let steps = (2.0 * half_arc / spacing).round() as u32;
        (0..=steps)
            .map(|step| -half_arc + step as f32 * spacing)
            .collect()
    }

    /// Total angle covered by the fan, in degrees
    pub fn arc_deg(&self, speed_ratio: f32) -> f32 {
        self.probe_count as f32 * self.spacing_deg(speed_ratio)
    }
}

/// Nearest perceived obstacle for one tick
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Detection {
    pub obstacle: ObstacleKind,
    pub body_position: Position,
    pub body_forward: Position,
    pub distance: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PerceptionModule {
    config: ProbeConfig,
}

impl PerceptionModule {
    pub fn new(config: ProbeConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ProbeConfig {
        &self.config
    }

    /// Casts the probe fan and returns what was seen, if anything
    ///
    /// `origin` is where the probes start (the sensor anchor) and
    /// `agent_position` is the agent's reference point used for
    /// origin-to-origin distances. Probes are cast left to right and the
    /// scan stops at the first one that hits, so ties between probes go to
    /// the leftmost. Hits on `caster` are skipped and the scan moves on.
    pub fn scan<S: RangeSensor + ?Sized>(
        &self,
        sensor: &S,
        origin: Position,
        agent_position: Position,
        forward: Position,
        speed_ratio: f32,
        caster: Option<ObstacleKind>,
    ) -> Option<Detection> {
        let forward = forward.flatten().normalized();

        self.config
            .probe_angles(speed_ratio)
            .into_iter()
            .find_map(|angle| {
                let direction = forward.rotated_y(angle);
                let hit = sensor.cast(
                    origin,
                    direction,
                    self.config.length,
                    self.config.mask,
                    caster,
                )?;
                if Some(hit.kind) == caster {
                    return None;
                }
                let distance = match self.config.distance_mode {
                    DistanceMode::ObstacleOrigin => agent_position.distance(&hit.body_position),
                    DistanceMode::RayHit => hit.distance,
                };
                trace!("Probe at {:.0} deg hit {:?} at {:.2}", angle, hit.kind, distance);
                Some(Detection {
                    obstacle: hit.kind,
                    body_position: hit.body_position,
                    body_forward: hit.body_forward,
                    distance,
                })
            })
    }
}
