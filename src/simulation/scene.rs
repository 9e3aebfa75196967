//! Headless physical scene answering range probes
//!
//! Bodies are circles on the ground plane. This is the stand-in for the
//! engine's colliders when the simulation runs without one. The body of
//! the caster is skipped by identity, never by geometry.

use super::perception::{LayerMask, ObstacleKind, ProbeHit, RangeSensor};
use super::types::{BodyId, Position, SimId};

/// A collider in the scene
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SceneBody {
    pub id: BodyId,
    pub kind: ObstacleKind,
    pub layer: LayerMask,
    pub position: Position,
    pub forward: Position,
    pub radius: f32,
}

#[derive(Debug, Clone, Default)]
pub struct SimScene {
    bodies: Vec<SceneBody>,
}

impl SimScene {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_body(
        &mut self,
        kind: ObstacleKind,
        layer: LayerMask,
        position: Position,
        forward: Position,
        radius: f32,
    ) -> BodyId {
        let id = BodyId(SimId(self.bodies.len()));
        self.bodies.push(SceneBody {
            id,
            kind,
            layer,
            position,
            forward,
            radius,
        });
        id
    }

    pub fn bodies(&self) -> &[SceneBody] {
        &self.bodies
    }

    pub fn clear(&mut self) {
        self.bodies.clear();
    }

    pub fn len(&self) -> usize {
        self.bodies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bodies.is_empty()
    }
}

/// Entry distance of a ray into a circle on the XZ plane
///
/// A ray starting inside the circle hits it at distance zero.
fn ray_circle(origin: Position, direction: Position, center: Position, radius: f32) -> Option<f32> {
    let to_origin = origin.flatten() - center.flatten();
    let c = to_origin.dot(&to_origin) - radius * radius;
    if c <= 0.0 {
        return Some(0.0);
    }
    let b = to_origin.dot(&direction);
    let discriminant = b * b - c;
    if discriminant < 0.0 {
        return None;
    }
    let t = -b - discriminant.sqrt();
    (t >= 0.0).then_some(t)
}

impl RangeSensor for SimScene {
    fn cast(
        &self,
        origin: Position,
        direction: Position,
        length: f32,
        mask: LayerMask,
        caster: Option<ObstacleKind>,
    ) -> Option<ProbeHit> {
        let direction = direction.flatten().normalized();
        self.bodies
            .iter()
            .filter(|body| mask.intersects(body.layer) && Some(body.kind) != caster)
            .filter_map(|body| {
                let distance = ray_circle(origin, direction, body.position, body.radius)?;
                (distance <= length).then_some((body, distance))
            })
            .min_by_key(|(_, distance)| ordered_float::OrderedFloat(*distance))
            .map(|(body, distance)| ProbeHit {
                kind: body.kind,
                body_position: body.position,
                body_forward: body.forward,
                distance,
            })
    }
}
