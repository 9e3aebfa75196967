//! Per-agent position in the road graph
//!
//! Tracks the waypoint an agent is driving to (`current`) and the one
//! after it (`future`), advancing both as waypoints are reached.

use anyhow::{Context, Result};
use log::{debug, trace, warn};
use ordered_float::OrderedFloat;
use rand::seq::IndexedRandom;
use rand::Rng;

use super::road_graph::RoadGraph;
use super::types::{Pose, Position, SegmentId};

/// A pointer to a waypoint inside the road graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Target {
    pub segment: SegmentId,
    pub waypoint: usize,
}

impl Target {
    pub fn new(segment: SegmentId, waypoint: usize) -> Self {
        Self { segment, waypoint }
    }
}

/// Navigation state machine of a single agent
#[derive(Debug, Clone, PartialEq)]
pub struct NavigationState {
    current: Target,
    future: Target,
    past_segment: Option<SegmentId>,
}

impl NavigationState {
    /// Builds the state from explicit targets, e.g. when restoring an agent
    pub fn from_targets(current: Target, future: Target) -> Self {
        Self {
            current,
            future,
            past_segment: None,
        }
    }

    /// Places an agent on the graph from its spawn pose
    ///
    /// Takes the first segment (in declaration order) that contains the
    /// agent and targets its nearest waypoint lying ahead of the agent.
    /// Agents spawned off-road fall back to the segment with the nearest
    /// waypoint.
    pub fn initialize<R: Rng + ?Sized>(
        graph: &RoadGraph,
        pose: &Pose,
        rng: &mut R,
    ) -> Result<Self> {
        if graph.segment_count() == 0 {
            anyhow::bail!("Road graph has no segments");
        }

        let segment_id = match graph.segment_containing(&pose.position) {
            Some(id) => id,
            None => {
                let id = graph
                    .nearest_segment(&pose.position)
                    .context("No segment to place agent on")?;
                warn!(
                    "Agent at ({:.1}, {:.1}) is not on any segment, using nearest {:?}",
                    pose.position.x, pose.position.z, id
                );
                id
            }
        };

        let segment = graph
            .segment(segment_id)
            .context("Spawn segment not found")?;

        let waypoint = segment
            .waypoints
            .iter()
            .enumerate()
            .filter(|(_, waypoint)| pose.inverse_transform_point(waypoint.position).z > 0.0)
            .min_by_key(|(_, waypoint)| OrderedFloat(pose.position.distance(&waypoint.position)))
            .map(|(index, _)| index)
            .unwrap_or(0);

        let current = Target::new(segment_id, waypoint);
        let future = next_target(graph, current, rng)?;
        debug!(
            "Navigation initialised on {:?} targeting waypoint {}, future {:?}",
            segment_id, waypoint, future
        );

        Ok(Self {
            current,
            future,
            past_segment: None,
        })
    }

    pub fn current(&self) -> Target {
        self.current
    }

    pub fn future(&self) -> Target {
        self.future
    }

    pub fn past_segment(&self) -> Option<SegmentId> {
        self.past_segment
    }

    /// Advances the targets if the agent reached its current waypoint
    ///
    /// Returns `true` when the current target moved on. At most one
    /// waypoint is consumed per call.
    pub fn tick<R: Rng + ?Sized>(
        &mut self,
        graph: &RoadGraph,
        pose: &Pose,
        threshold: f32,
        rng: &mut R,
    ) -> Result<bool> {
        let target_position = self.current_position(graph)?;
        let local = pose.inverse_transform_point(target_position);
        if local.length() >= threshold {
            return Ok(false);
        }

        let waypoint_count = graph
            .segment(self.current.segment)
            .context("Current segment not found")?
            .waypoint_count();

        self.current.waypoint += 1;
        if self.current.waypoint >= waypoint_count {
            self.past_segment = Some(self.current.segment);
            self.current = Target::new(self.future.segment, 0);
            trace!(
                "Left {:?}, now on {:?}",
                self.past_segment,
                self.current.segment
            );
        }

        self.future = next_target(graph, self.current, rng)?;
        Ok(true)
    }

    /// Segment the agent is physically on
    ///
    /// Falls back to the segment just left while the agent is still inside
    /// it, then to the current segment.
    pub fn current_segment_of(&self, graph: &RoadGraph, position: &Position) -> SegmentId {
        if graph.is_on_segment(self.current.segment, position) {
            return self.current.segment;
        }
        match self.past_segment {
            Some(past) if graph.is_on_segment(past, position) => past,
            _ => self.current.segment,
        }
    }

    pub fn current_position(&self, graph: &RoadGraph) -> Result<Position> {
        target_position(graph, self.current)
    }

    pub fn future_position(&self, graph: &RoadGraph) -> Result<Position> {
        target_position(graph, self.future)
    }

    pub fn distance_to_current(&self, graph: &RoadGraph, position: &Position) -> Result<f32> {
        Ok(position.distance(&self.current_position(graph)?))
    }

    /// Lateral component, in the agent's frame, of the current-to-future leg
    pub fn future_steering(&self, graph: &RoadGraph, pose: &Pose) -> Result<f32> {
        let leg = self.future_position(graph)? - self.current_position(graph)?;
        Ok(pose
            .inverse_transform_direction(leg.normalized())
            .x
            .clamp(-1.0, 1.0))
    }

    /// Lateral component, in the agent's frame, of the direction to the current target
    pub fn path_steering(&self, graph: &RoadGraph, pose: &Pose) -> Result<f32> {
        let desired = self.current_position(graph)? - pose.position;
        Ok(pose
            .inverse_transform_direction(desired.normalized())
            .x
            .clamp(-1.0, 1.0))
    }
}

fn target_position(graph: &RoadGraph, target: Target) -> Result<Position> {
    graph
        .waypoint(target.segment, target.waypoint)
        .map(|waypoint| waypoint.position)
        .with_context(|| format!("Waypoint {:?} not found", target))
}

/// The waypoint after `current`, rolling into a random successor segment
fn next_target<R: Rng + ?Sized>(graph: &RoadGraph, current: Target, rng: &mut R) -> Result<Target> {
    let segment = graph
        .segment(current.segment)
        .with_context(|| format!("Segment {:?} not found", current.segment))?;

    if current.waypoint + 1 < segment.waypoint_count() {
        return Ok(Target::new(current.segment, current.waypoint + 1));
    }

    Ok(Target::new(next_segment(graph, current.segment, rng), 0))
}

/// Uniformly random successor, or the graph's fallback for terminal segments
pub fn next_segment<R: Rng + ?Sized>(
    graph: &RoadGraph,
    segment: SegmentId,
    rng: &mut R,
) -> SegmentId {
    match graph.successors(segment).choose(rng) {
        Some(next) => *next,
        None => {
            debug!(
                "Segment {:?} is terminal, continuing on {:?}",
                segment,
                graph.terminal_fallback()
            );
            graph.terminal_fallback()
        }
    }
}
