//! Standalone navigation simulation module
//!
//! This module contains the autonomous vehicle navigation core (road
//! graph, perception, arbitration) together with a headless world that
//! drives it, so it can be exercised from the console without an engine.

mod agent;
mod arbitration;
mod blinker;
mod kinematics;
mod navigation;
mod perception;
mod road_graph;
mod rules;
mod scene;
mod timer;
mod types;
mod world;

pub use agent::{AgentConfig, AgentUpdateResult, SimAgent, TickContext};
pub use arbitration::{
    AgentSnapshot, ArbitrationConfig, ArbitrationEngine, ArbitrationInput, DeclaredDirection,
    Directive, Incident, IncidentDebounce, IncidentKind, IncidentSink, Perceived,
    PerceivedObstacle, PlayerSnapshot, Status, TurnIntent, FOLLOWING_SPEED_FACTOR,
    INCIDENT_DEBOUNCE_SECS, PARALLEL_DOT,
};
pub use blinker::{BlinkerSide, Blinkers, BLINK_HALF_PERIOD};
pub use kinematics::{DriveConfig, KinematicState, MotionActuator, SimpleDrive};
pub use navigation::{next_segment, NavigationState, Target};
pub use perception::{
    Detection, DistanceMode, LayerMask, ObstacleKind, PerceptionModule, ProbeConfig, ProbeHit,
    RangeSensor,
};
pub use road_graph::{
    ContainmentPolicy, RoadGraph, RoadGraphBuilder, Segment, DEFAULT_LANE_HALF_WIDTH,
};
pub use rules::{IncidentLog, PlayerVehicle, StatusZone, ZoneId, ZoneMode};
pub use scene::{SceneBody, SimScene};
pub use timer::CycleTimer;
pub use types::{
    AgentId, BodyId, Pose, Position, SegmentId, SimId, Waypoint, BLINKER_THRESHOLD,
    TURN_INTENT_THRESHOLD, VEHICLE_RADIUS,
};
pub use world::{SimWorld, StaticObstacle, WorldStats};
