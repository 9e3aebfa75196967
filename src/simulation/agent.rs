//! Autonomous vehicle agent
//!
//! One tick runs perceive, arbitrate, actuate and then advances the
//! navigation targets, all synchronously.

use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::{Context, Result};
use log::trace;
use rand::RngCore;

use super::arbitration::{
    AgentSnapshot, ArbitrationConfig, ArbitrationEngine, ArbitrationInput, DeclaredDirection,
    Directive, IncidentSink, Perceived, PerceivedObstacle, PlayerSnapshot, Status, TurnIntent,
};
use super::blinker::Blinkers;
use super::kinematics::{DriveConfig, KinematicState, MotionActuator, SimpleDrive};
use super::navigation::NavigationState;
use super::perception::{ObstacleKind, PerceptionModule, ProbeConfig, RangeSensor};
use super::road_graph::RoadGraph;
use super::types::{AgentId, Pose, SegmentId, VEHICLE_RADIUS};

/// Per-agent configuration, set once at spawn
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AgentConfig {
    pub probe: ProbeConfig,
    pub arbitration: ArbitrationConfig,
    pub drive: DriveConfig,
    /// Distance at which the current waypoint counts as reached
    pub waypoint_threshold: f32,
    /// How far ahead of the agent's origin the probes start
    pub sensor_offset: f32,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            probe: ProbeConfig::default(),
            arbitration: ArbitrationConfig::default(),
            drive: DriveConfig::default(),
            waypoint_threshold: 6.0,
            sensor_offset: VEHICLE_RADIUS + 0.1,
        }
    }
}

/// Result of an agent update
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AgentUpdateResult {
    /// A collaborator (the road graph) is missing, nothing happened
    Skipped,
    /// The agent drove with `directive`; `advanced` tells whether it reached its target
    Moved { directive: Directive, advanced: bool },
}

/// Everything an agent reads from outside itself during one tick
pub struct TickContext<'a> {
    pub delta_secs: f32,
    pub time: f32,
    pub sensor: &'a dyn RangeSensor,
    /// Start-of-tick state of every agent
    pub snapshots: &'a BTreeMap<AgentId, AgentSnapshot>,
    pub player: Option<PlayerSnapshot>,
    pub incidents: &'a mut dyn IncidentSink,
    pub rng: &'a mut dyn RngCore,
}

/// A navigating vehicle
#[derive(Debug)]
pub struct SimAgent<A: MotionActuator = SimpleDrive> {
    pub id: AgentId,
    config: AgentConfig,
    graph: Option<Arc<RoadGraph>>,
    navigation: Option<NavigationState>,
    perception: PerceptionModule,
    arbitration: ArbitrationEngine,
    actuator: A,
    state: KinematicState,
    status: Status,
    speed_cap: f32,
    future_steering: f32,
    blinkers: Blinkers,
}

impl SimAgent<SimpleDrive> {
    pub fn new(
        id: AgentId,
        config: AgentConfig,
        graph: Option<Arc<RoadGraph>>,
        pose: Pose,
    ) -> Self {
        let actuator = SimpleDrive::new(config.drive);
        Self::with_actuator(id, config, graph, pose, actuator)
    }
}

impl<A: MotionActuator> SimAgent<A> {
    pub fn with_actuator(
        id: AgentId,
        config: AgentConfig,
        graph: Option<Arc<RoadGraph>>,
        pose: Pose,
        actuator: A,
    ) -> Self {
        Self {
            id,
            config,
            graph,
            navigation: None,
            perception: PerceptionModule::new(config.probe),
            arbitration: ArbitrationEngine::new(config.arbitration),
            actuator,
            state: KinematicState::new(pose, 0.0),
            status: Status::Go,
            speed_cap: config.arbitration.nominal_speed,
            future_steering: 0.0,
            blinkers: Blinkers::new(),
        }
    }

    /// Assigns (or replaces) the road graph; navigation restarts from the current pose
    pub fn set_road_graph(&mut self, graph: Arc<RoadGraph>) {
        self.graph = Some(graph);
        self.navigation = None;
    }

    /// Places the agent on the road graph if it is not placed yet
    ///
    /// Returns `false` when there is no road graph to place it on.
    pub fn initialize_navigation(&mut self, rng: &mut dyn RngCore) -> Result<bool> {
        let Some(graph) = self.graph.as_deref() else {
            return Ok(false);
        };
        if self.navigation.is_none() {
            self.navigation = Some(NavigationState::initialize(graph, &self.state.pose, rng)?);
        }
        Ok(true)
    }

    /// Runs one full tick for this agent
    pub fn update(&mut self, ctx: &mut TickContext<'_>) -> Result<AgentUpdateResult> {
        let Some(graph) = self.graph.clone() else {
            trace!("{:?} has no road graph, skipping tick", self.id);
            return Ok(AgentUpdateResult::Skipped);
        };
        self.initialize_navigation(&mut *ctx.rng)?;
        let navigation = self
            .navigation
            .as_mut()
            .context("Navigation state missing after initialisation")?;

        let pose = self.state.pose;

        let distance_to_waypoint = navigation.distance_to_current(&graph, &pose.position)?;
        self.future_steering = if self
            .arbitration
            .should_look_ahead(distance_to_waypoint, self.status)
        {
            navigation.future_steering(&graph, &pose)?
        } else {
            0.0
        };
        self.blinkers.update(self.future_steering, ctx.delta_secs);

        let nominal = self.config.arbitration.nominal_speed;
        let speed_ratio = if nominal > 0.0 {
            (self.speed_cap / nominal).clamp(0.0, 1.0)
        } else {
            0.0
        };
        let origin = pose.position + pose.forward() * self.config.sensor_offset;
        let detection = self.perception.scan(
            ctx.sensor,
            origin,
            pose.position,
            pose.forward(),
            speed_ratio,
            Some(ObstacleKind::Agent(self.id)),
        );

        let obstacle = detection.map(|detection| {
            let perceived = match detection.obstacle {
                ObstacleKind::Agent(other) => match ctx.snapshots.get(&other) {
                    Some(snapshot) => Perceived::LeadingAgent(*snapshot),
                    None => Perceived::Generic,
                },
                ObstacleKind::Player => match ctx.player {
                    Some(player) => Perceived::PlayerAgent(player),
                    None => Perceived::Generic,
                },
                ObstacleKind::Generic => Perceived::Generic,
            };
            PerceivedObstacle {
                perceived,
                distance: detection.distance,
            }
        });

        let input = ArbitrationInput {
            agent: self.id,
            pose,
            status: self.status,
            future_steering: self.future_steering,
            path_steering: navigation.path_steering(&graph, &pose)?,
            obstacle,
            time: ctx.time,
            delta_secs: ctx.delta_secs,
        };
        let directive = self.arbitration.arbitrate(&input, &mut *ctx.incidents);
        self.speed_cap = directive.speed_cap;

        self.state = self
            .actuator
            .apply(&directive, &self.state, self.status, ctx.delta_secs);

        let advanced = navigation.tick(
            &graph,
            &self.state.pose,
            self.config.waypoint_threshold,
            &mut *ctx.rng,
        )?;
        if advanced {
            trace!("{:?} now targets {:?}", self.id, navigation.current());
        }

        Ok(AgentUpdateResult::Moved {
            directive,
            advanced,
        })
    }

    pub fn snapshot(&self) -> AgentSnapshot {
        AgentSnapshot {
            id: self.id,
            pose: self.state.pose,
            speed: self.state.speed,
            speed_cap: self.speed_cap,
            status: self.status,
            future_steering: self.future_steering,
        }
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    pub fn has_road_graph(&self) -> bool {
        self.graph.is_some()
    }

    pub fn navigation(&self) -> Option<&NavigationState> {
        self.navigation.as_ref()
    }

    pub fn state(&self) -> &KinematicState {
        &self.state
    }

    pub fn pose(&self) -> &Pose {
        &self.state.pose
    }

    /// Teleports the agent; navigation is re-initialised on the next tick
    pub fn set_state(&mut self, state: KinematicState) {
        self.state = state;
        self.navigation = None;
    }

    pub fn status(&self) -> Status {
        self.status
    }

    pub fn set_status(&mut self, status: Status) {
        self.status = status;
    }

    pub fn speed_cap(&self) -> f32 {
        self.speed_cap
    }

    pub fn future_steering(&self) -> f32 {
        self.future_steering
    }

    pub fn turn_intent(&self) -> TurnIntent {
        TurnIntent::from_steering(self.future_steering)
    }

    pub fn blinkers(&self) -> &Blinkers {
        &self.blinkers
    }

    /// Direction announced by this agent's blinkers
    pub fn declared_direction(&self) -> DeclaredDirection {
        DeclaredDirection::from_blinkers(
            self.blinkers.left_active(),
            self.blinkers.right_active(),
        )
    }

    /// Segment the agent is physically on, if it has been placed
    pub fn current_segment(&self) -> Option<SegmentId> {
        let graph = self.graph.as_deref()?;
        let navigation = self.navigation.as_ref()?;
        Some(navigation.current_segment_of(graph, &self.state.pose.position))
    }
}
