//! Main simulation world that ties everything together
//!
//! This is the entry point for running the navigation simulation
//! without any game engine attached.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use anyhow::{Context, Result};
use log::{debug, info, warn};
use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};

use super::agent::{AgentConfig, AgentUpdateResult, SimAgent, TickContext};
use super::arbitration::{AgentSnapshot, Status};
use super::perception::{LayerMask, ObstacleKind};
use super::road_graph::{RoadGraph, RoadGraphBuilder};
use super::rules::{IncidentLog, PlayerVehicle, StatusZone, ZoneId};
use super::scene::SimScene;
use super::types::{AgentId, Pose, Position, SimId, VEHICLE_RADIUS};

/// A static obstacle placed in the world
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StaticObstacle {
    pub position: Position,
    pub radius: f32,
    pub layer: LayerMask,
}

/// Counters reported at the end of a run
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WorldStats {
    pub ticks: u64,
    pub agents_spawned: usize,
    pub agents_despawned: usize,
    pub waypoints_reached: u64,
    pub skipped_updates: u64,
}

/// The main simulation world
pub struct SimWorld {
    /// Shared, read-only road graph
    road_graph: Option<Arc<RoadGraph>>,

    /// All agents, in id order so ticks are deterministic
    pub agents: BTreeMap<AgentId, SimAgent>,

    /// The externally driven vehicle, if any
    pub player: Option<PlayerVehicle>,

    pub obstacles: Vec<StaticObstacle>,

    pub zones: Vec<StatusZone>,

    /// Agents whose status is currently imposed by a zone
    zoned_agents: BTreeSet<AgentId>,

    pub incidents: IncidentLog,

    pub stats: WorldStats,

    /// Configuration given to agents spawned without one
    pub default_agent_config: AgentConfig,

    /// Extra layers every spawned agent perceives on top of its own mask
    pub collision_layers: LayerMask,

    /// Next ID to assign
    next_id: usize,

    /// Simulation time
    pub time: f32,

    /// Optional seeded RNG for reproducible simulations
    rng: Option<StdRng>,
}

impl Default for SimWorld {
    fn default() -> Self {
        Self::new()
    }
}

impl SimWorld {
    fn new_internal(rng: Option<StdRng>) -> Self {
        Self {
            road_graph: None,
            agents: BTreeMap::new(),
            player: None,
            obstacles: Vec::new(),
            zones: Vec::new(),
            zoned_agents: BTreeSet::new(),
            incidents: IncidentLog::new(),
            stats: WorldStats::default(),
            default_agent_config: AgentConfig::default(),
            collision_layers: LayerMask::STATIC_OBSTACLE,
            next_id: 0,
            time: 0.0,
            rng,
        }
    }

    pub fn new() -> Self {
        Self::new_internal(None)
    }

    /// Create a new SimWorld with a seeded RNG for reproducible simulations
    pub fn new_with_seed(seed: u64) -> Self {
        Self::new_internal(Some(StdRng::seed_from_u64(seed)))
    }

    fn next_sim_id(&mut self) -> SimId {
        let id = SimId(self.next_id);
        self.next_id += 1;
        id
    }

    /// Installs the road graph and hands it to every existing agent
    pub fn set_road_graph(&mut self, graph: RoadGraph) {
        let graph = Arc::new(graph);
        for agent in self.agents.values_mut() {
            agent.set_road_graph(Arc::clone(&graph));
        }
        self.road_graph = Some(graph);
    }

    pub fn road_graph(&self) -> Option<&RoadGraph> {
        self.road_graph.as_deref()
    }

    /// Spawn an agent with the world's default configuration
    pub fn spawn_agent(&mut self, pose: Pose) -> Result<AgentId> {
        let config = self.default_agent_config;
        self.spawn_agent_with_config(pose, config)
    }

    /// Spawn an agent and place it on the road graph (if one is installed)
    pub fn spawn_agent_with_config(
        &mut self,
        pose: Pose,
        mut config: AgentConfig,
    ) -> Result<AgentId> {
        config.probe.mask = config.probe.mask | self.collision_layers;
        let id = AgentId(self.next_sim_id());
        let mut agent = SimAgent::new(id, config, self.road_graph.clone(), pose);

        let mut thread_rng = rand::rng();
        let rng: &mut dyn RngCore = match &mut self.rng {
            Some(rng) => rng,
            None => &mut thread_rng,
        };
        agent
            .initialize_navigation(rng)
            .context("Failed to place agent on the road graph")?;

        debug!(
            "Spawned {:?} at ({:.1}, {:.1}) targeting {:?}",
            id,
            pose.position.x,
            pose.position.z,
            agent.navigation().map(|navigation| navigation.current())
        );
        self.agents.insert(id, agent);
        self.stats.agents_spawned += 1;
        Ok(id)
    }

    /// Remove an agent and everything the world tracks about it
    pub fn despawn_agent(&mut self, agent_id: AgentId) -> Option<SimAgent> {
        self.zoned_agents.remove(&agent_id);
        let agent = self.agents.remove(&agent_id)?;
        self.stats.agents_despawned += 1;
        Some(agent)
    }

    pub fn agent(&self, agent_id: AgentId) -> Option<&SimAgent> {
        self.agents.get(&agent_id)
    }

    /// Set an agent's status directly, as a rule collaborator would
    pub fn set_status(&mut self, agent_id: AgentId, status: Status) -> Result<()> {
        self.agents
            .get_mut(&agent_id)
            .with_context(|| format!("Agent {:?} not found", agent_id))?
            .set_status(status);
        Ok(())
    }

    pub fn set_player(&mut self, player: PlayerVehicle) {
        self.player = Some(player);
    }

    pub fn add_obstacle(&mut self, position: Position, radius: f32) {
        self.obstacles.push(StaticObstacle {
            position,
            radius,
            layer: LayerMask::STATIC_OBSTACLE,
        });
    }

    pub fn add_zone(&mut self, center: Position, radius: f32, status: Status) -> ZoneId {
        let id = ZoneId(self.next_sim_id());
        self.zones.push(StatusZone::fixed(id, center, radius, status));
        id
    }

    pub fn add_signal(
        &mut self,
        center: Position,
        radius: f32,
        go_secs: f32,
        stop_secs: f32,
    ) -> ZoneId {
        let id = ZoneId(self.next_sim_id());
        self.zones
            .push(StatusZone::signal(id, center, radius, go_secs, stop_secs));
        id
    }

    /// Start-of-tick view of every agent
    pub fn snapshots(&self) -> BTreeMap<AgentId, AgentSnapshot> {
        self.agents
            .iter()
            .map(|(id, agent)| (*id, agent.snapshot()))
            .collect()
    }

    /// Scene built from the given snapshots, the player and static obstacles
    fn build_scene(&self, snapshots: &BTreeMap<AgentId, AgentSnapshot>) -> SimScene {
        let mut scene = SimScene::new();
        for snapshot in snapshots.values() {
            scene.add_body(
                ObstacleKind::Agent(snapshot.id),
                LayerMask::AUTONOMOUS_VEHICLE,
                snapshot.pose.position,
                snapshot.pose.forward(),
                VEHICLE_RADIUS,
            );
        }
        if let Some(player) = &self.player {
            scene.add_body(
                ObstacleKind::Player,
                LayerMask::PLAYER,
                player.pose.position,
                player.pose.forward(),
                VEHICLE_RADIUS,
            );
        }
        for obstacle in &self.obstacles {
            scene.add_body(
                ObstacleKind::Generic,
                obstacle.layer,
                obstacle.position,
                Position::new(0.0, 0.0, 1.0),
                obstacle.radius,
            );
        }
        scene
    }

    /// Apply zone statuses; agents leaving every zone go back to GO
    fn update_zones(&mut self, delta_secs: f32) {
        for zone in &mut self.zones {
            zone.update(delta_secs);
        }

        for (id, agent) in self.agents.iter_mut() {
            let position = agent.pose().position;
            match self.zones.iter().find(|zone| zone.contains(&position)) {
                Some(zone) => {
                    agent.set_status(zone.status());
                    self.zoned_agents.insert(*id);
                }
                None => {
                    if self.zoned_agents.remove(id) {
                        agent.set_status(Status::Go);
                    }
                }
            }
        }
    }

    /// Update all agents against a common snapshot
    ///
    /// Returns the agents whose update failed.
    fn update_agents(&mut self, delta_secs: f32) -> Vec<AgentId> {
        let snapshots = self.snapshots();
        let scene = self.build_scene(&snapshots);
        let player = self.player.as_ref().map(PlayerVehicle::snapshot);

        let mut thread_rng = rand::rng();
        let rng: &mut dyn RngCore = match &mut self.rng {
            Some(rng) => rng,
            None => &mut thread_rng,
        };

        let mut ctx = TickContext {
            delta_secs,
            time: self.time,
            sensor: &scene,
            snapshots: &snapshots,
            player,
            incidents: &mut self.incidents,
            rng,
        };

        let mut failed = Vec::new();
        for (id, agent) in self.agents.iter_mut() {
            match agent.update(&mut ctx) {
                Ok(AgentUpdateResult::Moved { advanced, .. }) => {
                    if advanced {
                        self.stats.waypoints_reached += 1;
                    }
                }
                Ok(AgentUpdateResult::Skipped) => {
                    self.stats.skipped_updates += 1;
                }
                Err(error) => {
                    warn!("{:?} failed to update: {:#}", id, error);
                    failed.push(*id);
                }
            }
        }
        failed
    }

    /// Main simulation tick
    pub fn tick(&mut self, delta_secs: f32) {
        self.time += delta_secs;
        self.stats.ticks += 1;

        self.update_zones(delta_secs);

        if let Some(player) = &mut self.player {
            player.advance(delta_secs);
        }

        for agent_id in self.update_agents(delta_secs) {
            self.despawn_agent(agent_id);
        }
    }

    /// Create a test world for headless runs
    pub fn create_test_world() -> Self {
        Self::build_test_world(Self::new(), 4)
    }

    /// Create a reproducible test world
    pub fn create_test_world_with_seed(seed: u64, agent_count: usize) -> Self {
        Self::build_test_world(Self::new_with_seed(seed), agent_count)
    }

    /// Builds a rectangular loop with a cut-through street
    ///
    /// ```text
    ///  (0,40) S1a --> S1b (40,40)
    ///    ^        ^        |
    ///   S0       S4       S2
    ///    |        |        v
    ///  (0,0) <-- S3b <-- S3a (40,0)
    /// ```
    ///
    /// The cut-through joins the top edge at (20, 40), where an
    /// uncontrolled merge puts arriving agents in SLOW_DOWN. A signal sits
    /// on the right edge.
    pub fn build_test_world(mut world: SimWorld, agent_count: usize) -> Self {
        match Self::test_road_graph() {
            Ok(graph) => world.set_road_graph(graph),
            Err(error) => {
                warn!("Could not build test road graph: {:#}", error);
                return world;
            }
        }

        world.add_zone(Position::ground(20.0, 40.0), 6.0, Status::SlowDown);
        world.add_signal(Position::ground(40.0, 20.0), 4.0, 6.0, 3.0);

        let spawn_points: Vec<Pose> = match world.road_graph() {
            Some(graph) => graph
                .segments()
                .iter()
                .filter(|segment| segment.waypoint_count() >= 2)
                .map(|segment| {
                    let first = segment.waypoints[0].position;
                    let second = segment.waypoints[1].position;
                    Pose::looking_at(first.lerp(&second, 0.2), second)
                })
                .collect(),
            None => Vec::new(),
        };

        for index in 0..agent_count {
            let Some(base) = spawn_points.get(index % spawn_points.len().max(1)) else {
                break;
            };
            // Later laps start further back along the same segment.
            let lap = (index / spawn_points.len()) as f32;
            let pose = Pose::new(base.position - base.forward() * (lap * 3.0), base.yaw);
            if let Err(error) = world.spawn_agent(pose) {
                warn!("Could not spawn agent {}: {:#}", index, error);
            }
        }

        info!(
            "Test world ready: {} segments, {} agents, {} zones",
            world.road_graph().map_or(0, RoadGraph::segment_count),
            world.agents.len(),
            world.zones.len()
        );
        world
    }

    fn test_road_graph() -> Result<RoadGraph> {
        let mut builder = RoadGraphBuilder::new();
        let line = |x0: f32, z0: f32, x1: f32, z1: f32, count: usize| -> Vec<Position> {
            (0..count)
                .map(|i| {
                    let t = i as f32 / count as f32;
                    Position::ground(x0 + (x1 - x0) * t, z0 + (z1 - z0) * t)
                })
                .collect()
        };

        let s0 = builder.add_segment(line(0.0, 0.0, 0.0, 40.0, 4))?;
        let s1a = builder.add_segment(line(0.0, 40.0, 20.0, 40.0, 2))?;
        let s1b = builder.add_segment(line(20.0, 40.0, 40.0, 40.0, 2))?;
        let s2 = builder.add_segment(line(40.0, 40.0, 40.0, 0.0, 4))?;
        let s3a = builder.add_segment(line(40.0, 0.0, 20.0, 0.0, 2))?;
        let s3b = builder.add_segment(line(20.0, 0.0, 0.0, 0.0, 2))?;
        let s4 = builder.add_segment(line(20.0, 10.0, 20.0, 40.0, 3))?;

        builder.connect(s0, s1a)?;
        builder.connect(s1a, s1b)?;
        builder.connect(s1b, s2)?;
        builder.connect(s2, s3a)?;
        builder.connect(s3a, s3b)?;
        builder.connect(s3a, s4)?;
        builder.connect(s3b, s0)?;
        builder.connect(s4, s1b)?;

        Ok(builder.build())
    }

    /// Print a summary of the world state
    pub fn print_summary(&self) {
        println!("=== Navigation Simulation Summary ===");
        println!("Time: {:.2}s", self.time);
        match self.road_graph() {
            Some(graph) => println!(
                "Segments: {}, Terminal segments: {}",
                graph.segment_count(),
                graph.terminal_segments().len()
            ),
            None => println!("Segments: none (no road graph)"),
        }
        println!("Agents: {}", self.agents.len());
        println!("Incidents: {}", self.incidents.count());
        println!();

        if !self.agents.is_empty() {
            println!("--- Agents ---");
            for agent in self.agents.values() {
                let target = agent
                    .navigation()
                    .map(|navigation| {
                        let current = navigation.current();
                        format!("seg {} wp {}", current.segment.0, current.waypoint)
                    })
                    .unwrap_or_else(|| "unplaced".to_string());
                let blinker = if agent.blinkers().left_active() {
                    "<"
                } else if agent.blinkers().right_active() {
                    ">"
                } else {
                    "-"
                };
                println!(
                    "  Agent {:?}: {:?} speed={:.1}/{:.1} position=({:.1}, {:.1}) \
                     target={} intent={:?} blinker={}",
                    agent.id.0 .0,
                    agent.status(),
                    agent.state().speed,
                    agent.speed_cap(),
                    agent.pose().position.x,
                    agent.pose().position.z,
                    target,
                    agent.turn_intent(),
                    blinker
                );
            }
        }

        if !self.zones.is_empty() {
            println!("--- Zones ---");
            for zone in &self.zones {
                println!(
                    "  Zone {:?}: center=({:.1}, {:.1}) radius={:.1} status={:?}",
                    zone.id.0 .0,
                    zone.center.x,
                    zone.center.z,
                    zone.radius,
                    zone.status()
                );
            }
        }
    }

    /// Draw a visual map of the world in the terminal
    pub fn draw_map(&self) {
        let Some(graph) = self.road_graph() else {
            println!("(no road graph to draw)");
            return;
        };

        let mut min_x = f32::INFINITY;
        let mut max_x = f32::NEG_INFINITY;
        let mut min_z = f32::INFINITY;
        let mut max_z = f32::NEG_INFINITY;

        for segment in graph.segments() {
            for waypoint in &segment.waypoints {
                min_x = min_x.min(waypoint.position.x);
                max_x = max_x.max(waypoint.position.x);
                min_z = min_z.min(waypoint.position.z);
                max_z = max_z.max(waypoint.position.z);
            }
        }

        // Add padding
        min_x -= 4.0;
        max_x += 4.0;
        min_z -= 4.0;
        max_z += 4.0;

        // Characters per world unit
        let scale = 0.5;
        let width = (((max_x - min_x) * scale) as usize).max(1);
        let height = (((max_z - min_z) * scale) as usize).max(1);

        let mut grid = vec![vec![' '; width]; height];

        // Row 0 is the largest z so the map reads north-up.
        let to_grid = |x: f32, z: f32| -> Option<(usize, usize)> {
            if x < min_x || x > max_x || z < min_z || z > max_z {
                return None;
            }
            let col = ((x - min_x) * scale) as usize;
            let row = ((max_z - z) * scale) as usize;
            Some((row.min(height - 1), col.min(width - 1)))
        };

        for segment in graph.segments() {
            for waypoint in &segment.waypoints {
                if let Some((row, col)) = to_grid(waypoint.position.x, waypoint.position.z) {
                    grid[row][col] = '.';
                }
            }
        }

        for zone in &self.zones {
            if let Some((row, col)) = to_grid(zone.center.x, zone.center.z) {
                grid[row][col] = match zone.status() {
                    Status::Go => 'g',
                    Status::Stop => 's',
                    Status::SlowDown => 'y',
                };
            }
        }

        for obstacle in &self.obstacles {
            if let Some((row, col)) = to_grid(obstacle.position.x, obstacle.position.z) {
                grid[row][col] = '#';
            }
        }

        if let Some(player) = &self.player {
            if let Some((row, col)) = to_grid(player.pose.position.x, player.pose.position.z) {
                grid[row][col] = 'P';
            }
        }

        for agent in self.agents.values() {
            let position = agent.pose().position;
            if let Some((row, col)) = to_grid(position.x, position.z) {
                grid[row][col] = match agent.status() {
                    Status::Stop => 'S',
                    Status::SlowDown => 'W',
                    Status::Go => 'A',
                };
            }
        }

        println!("\n=== World Map ===");
        println!(
            "Legend: A=Agent, W=Agent slowing, S=Agent stopped, P=Player, \
             .=Waypoint, #=Obstacle, g/y/s=Zone"
        );
        println!();
        for row in &grid {
            let line: String = row.iter().collect();
            println!("{}", line);
        }
        println!();
    }
}
