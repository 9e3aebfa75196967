//! Static road graph of segments and waypoints
//!
//! Built once at load through [`RoadGraphBuilder`] and never mutated during
//! the simulation, so it can be shared read-only between agents.

use anyhow::{Context, Result};
use log::{debug, warn};
use petgraph::algo::astar;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::Bfs;

use super::types::{Position, SegmentId, Waypoint};

/// Default half width of the band around a segment's centerline
pub const DEFAULT_LANE_HALF_WIDTH: f32 = 3.0;

/// Geometric test deciding whether a world position lies on a segment
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ContainmentPolicy {
    /// Within `half_width` of the polyline through the segment's waypoints
    CenterlineBand { half_width: f32 },
    /// Inside the waypoints' XZ bounding box grown by `margin`
    BoundingBox { margin: f32 },
}

impl Default for ContainmentPolicy {
    fn default() -> Self {
        ContainmentPolicy::CenterlineBand {
            half_width: DEFAULT_LANE_HALF_WIDTH,
        }
    }
}

/// A directed stretch of road
#[derive(Debug, Clone)]
pub struct Segment {
    pub id: SegmentId,
    /// Ordered in driving direction, never empty
    pub waypoints: Vec<Waypoint>,
    /// Successor segments in the order they were connected
    pub next_segments: Vec<SegmentId>,
}

impl Segment {
    pub fn waypoint_count(&self) -> usize {
        self.waypoints.len()
    }

    pub fn is_terminal(&self) -> bool {
        self.next_segments.is_empty()
    }

    pub fn contains(&self, position: &Position, policy: ContainmentPolicy) -> bool {
        let point = position.flatten();
        match policy {
            ContainmentPolicy::CenterlineBand { half_width } => {
                if let [only] = self.waypoints.as_slice() {
                    return point.distance(&only.position.flatten()) <= half_width;
                }
                self.waypoints.windows(2).any(|pair| {
                    distance_to_edge(
                        &point,
                        &pair[0].position.flatten(),
                        &pair[1].position.flatten(),
                    ) <= half_width
                })
            }
            ContainmentPolicy::BoundingBox { margin } => {
                let (mut min_x, mut max_x) = (f32::INFINITY, f32::NEG_INFINITY);
                let (mut min_z, mut max_z) = (f32::INFINITY, f32::NEG_INFINITY);
                for waypoint in &self.waypoints {
                    min_x = min_x.min(waypoint.position.x);
                    max_x = max_x.max(waypoint.position.x);
                    min_z = min_z.min(waypoint.position.z);
                    max_z = max_z.max(waypoint.position.z);
                }
                point.x >= min_x - margin
                    && point.x <= max_x + margin
                    && point.z >= min_z - margin
                    && point.z <= max_z + margin
            }
        }
    }
}

/// Distance from `point` to the line segment `start`..`end` on the XZ plane
fn distance_to_edge(point: &Position, start: &Position, end: &Position) -> f32 {
    let edge = *end - *start;
    let length_sq = edge.dot(&edge);
    if length_sq < 1e-6 {
        return point.distance(start);
    }
    let t = ((*point - *start).dot(&edge) / length_sq).clamp(0.0, 1.0);
    point.distance(&start.lerp(end, t))
}

/// Collects segments and connections before freezing them into a [`RoadGraph`]
#[derive(Debug, Default)]
pub struct RoadGraphBuilder {
    segments: Vec<Segment>,
    containment: ContainmentPolicy,
}

impl RoadGraphBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_containment(mut self, policy: ContainmentPolicy) -> Self {
        self.containment = policy;
        self
    }

    /// Adds a segment; ids are handed out in declaration order
    pub fn add_segment(&mut self, waypoints: Vec<Position>) -> Result<SegmentId> {
        if waypoints.is_empty() {
            anyhow::bail!("A segment needs at least one waypoint");
        }
        let id = SegmentId(self.segments.len());
        self.segments.push(Segment {
            id,
            waypoints: waypoints.into_iter().map(Waypoint::new).collect(),
            next_segments: Vec::new(),
        });
        Ok(id)
    }

    /// Declares `to` as a successor of `from`
    pub fn connect(&mut self, from: SegmentId, to: SegmentId) -> Result<()> {
        if to.0 >= self.segments.len() {
            anyhow::bail!("Successor segment {:?} not found", to);
        }
        let segment = self
            .segments
            .get_mut(from.0)
            .with_context(|| format!("Segment {:?} not found", from))?;
        if !segment.next_segments.contains(&to) {
            segment.next_segments.push(to);
        }
        Ok(())
    }

    pub fn build(self) -> RoadGraph {
        let mut graph = DiGraph::with_capacity(self.segments.len(), self.segments.len());
        for segment in &self.segments {
            graph.add_node(segment.id);
        }
        for segment in &self.segments {
            for next in &segment.next_segments {
                graph.add_edge(NodeIndex::new(segment.id.0), NodeIndex::new(next.0), ());
            }
        }

        let road_graph = RoadGraph {
            segments: self.segments,
            graph,
            containment: self.containment,
        };

        let terminals = road_graph.terminal_segments();
        if !terminals.is_empty() {
            warn!(
                "Road graph has terminal segments {:?}; agents reaching them continue on {:?}",
                terminals,
                road_graph.terminal_fallback()
            );
        }
        debug!(
            "Road graph built with {} segments and {} connections",
            road_graph.segment_count(),
            road_graph.graph.edge_count()
        );

        road_graph
    }
}

/// Immutable directed graph of road segments
#[derive(Debug, Clone)]
pub struct RoadGraph {
    /// Indexed by `SegmentId.0`
    segments: Vec<Segment>,
    /// Node `n` is segment `n`; used for reachability and routing
    graph: DiGraph<SegmentId, ()>,
    containment: ContainmentPolicy,
}

impl RoadGraph {
    pub fn segment(&self, id: SegmentId) -> Option<&Segment> {
        self.segments.get(id.0)
    }

    pub fn waypoint(&self, id: SegmentId, index: usize) -> Option<&Waypoint> {
        self.segment(id)?.waypoints.get(index)
    }

    /// Successors of a segment; empty for terminal or unknown segments
    pub fn successors(&self, id: SegmentId) -> &[SegmentId] {
        self.segment(id)
            .map(|segment| segment.next_segments.as_slice())
            .unwrap_or(&[])
    }

    pub fn containment(&self) -> ContainmentPolicy {
        self.containment
    }

    pub fn is_on_segment(&self, id: SegmentId, position: &Position) -> bool {
        self.segment(id)
            .is_some_and(|segment| segment.contains(position, self.containment))
    }

    /// First segment in declaration order that contains `position`
    pub fn segment_containing(&self, position: &Position) -> Option<SegmentId> {
        self.segments
            .iter()
            .find(|segment| segment.contains(position, self.containment))
            .map(|segment| segment.id)
    }

    /// Segment owning the waypoint nearest to `position`
    pub fn nearest_segment(&self, position: &Position) -> Option<SegmentId> {
        self.segments
            .iter()
            .flat_map(|segment| {
                segment
                    .waypoints
                    .iter()
                    .map(move |waypoint| (segment.id, waypoint.position.distance(position)))
            })
            .min_by_key(|(_, distance)| ordered_float::OrderedFloat(*distance))
            .map(|(id, _)| id)
    }

    /// Where agents continue after a segment with no successors
    pub fn terminal_fallback(&self) -> SegmentId {
        SegmentId(0)
    }

    pub fn terminal_segments(&self) -> Vec<SegmentId> {
        self.segments
            .iter()
            .filter(|segment| segment.is_terminal())
            .map(|segment| segment.id)
            .collect()
    }

    /// All segments reachable from `start` by following successors
    pub fn reachable_from(&self, start: SegmentId) -> Vec<SegmentId> {
        if start.0 >= self.segments.len() {
            return Vec::new();
        }
        let mut reachable = Vec::new();
        let mut bfs = Bfs::new(&self.graph, NodeIndex::new(start.0));
        while let Some(node) = bfs.next(&self.graph) {
            reachable.push(self.graph[node]);
        }
        reachable
    }

    /// Fewest-hop route from one segment to another, both ends included
    pub fn route(&self, from: SegmentId, to: SegmentId) -> Option<Vec<SegmentId>> {
        if from.0 >= self.segments.len() || to.0 >= self.segments.len() {
            return None;
        }
        let goal = NodeIndex::new(to.0);
        let (_, nodes) = astar(
            &self.graph,
            NodeIndex::new(from.0),
            |node| node == goal,
            |_| 1u32,
            |_| 0,
        )?;
        Some(nodes.into_iter().map(|node| self.graph[node]).collect())
    }

    pub fn segment_count(&self) -> usize {
        self.segments.len()
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }
}
