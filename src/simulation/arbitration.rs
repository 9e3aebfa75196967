//! Right-of-way and speed arbitration
//!
//! Turns an agent's status, its look-ahead turn intent and whatever the
//! perception step saw into a driving [`Directive`].

use std::fmt;
use std::str::FromStr;

use log::{debug, info};

use super::timer::CycleTimer;
use super::types::{AgentId, Pose, TURN_INTENT_THRESHOLD};

/// Interval within which repeated right-of-way incidents are suppressed
pub const INCIDENT_DEBOUNCE_SECS: f32 = 5.0;

/// Headings with a dot product above this are treated as parallel
pub const PARALLEL_DOT: f32 = 0.8;

/// Fraction of a slower leader's speed cap adopted when following it
pub const FOLLOWING_SPEED_FACTOR: f32 = 0.8;

const SLOW_DOWN_THROTTLE: f32 = 0.3;
const APPROACH_THROTTLE: f32 = 0.5;
const REVERSE_THROTTLE: f32 = -0.3;
const NUDGE_STEERING: f32 = 0.3;
const AMBIGUOUS_NUDGE_STEERING: f32 = -0.7;
const LATERAL_AMBIGUITY: f32 = 0.1;

/// Externally set driving mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Status {
    #[default]
    Go,
    Stop,
    SlowDown,
}

/// Geometric turn classification of a look-ahead steering value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnIntent {
    Left,
    Right,
    Straight,
}

impl TurnIntent {
    pub fn from_steering(future_steering: f32) -> Self {
        if future_steering > TURN_INTENT_THRESHOLD {
            TurnIntent::Right
        } else if future_steering < -TURN_INTENT_THRESHOLD {
            TurnIntent::Left
        } else {
            TurnIntent::Straight
        }
    }

    /// Right-turners go first, then straight traffic, then left-turners
    pub fn precedence(&self) -> u8 {
        match self {
            TurnIntent::Right => 2,
            TurnIntent::Straight => 1,
            TurnIntent::Left => 0,
        }
    }

    /// Whether an agent with this intent must give way to `other`
    pub fn yields_to(&self, other: TurnIntent) -> bool {
        other.precedence() > self.precedence()
    }
}

/// Turn intent announced by a driver through blinkers or a label
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeclaredDirection {
    Left,
    Right,
    Straight,
    #[default]
    Undeclared,
}

impl DeclaredDirection {
    /// Declared direction as implied by the blinker pair
    pub fn from_blinkers(left_on: bool, right_on: bool) -> Self {
        match (left_on, right_on) {
            (true, false) => DeclaredDirection::Left,
            (false, true) => DeclaredDirection::Right,
            _ => DeclaredDirection::Straight,
        }
    }

    pub fn intent(&self) -> Option<TurnIntent> {
        match self {
            DeclaredDirection::Left => Some(TurnIntent::Left),
            DeclaredDirection::Right => Some(TurnIntent::Right),
            DeclaredDirection::Straight => Some(TurnIntent::Straight),
            DeclaredDirection::Undeclared => None,
        }
    }
}

impl FromStr for DeclaredDirection {
    type Err = std::convert::Infallible;

    /// Unknown labels (including the collaborator's `"empty"`) are undeclared
    fn from_str(label: &str) -> Result<Self, Self::Err> {
        Ok(match label.trim().to_ascii_lowercase().as_str() {
            "left" => DeclaredDirection::Left,
            "right" => DeclaredDirection::Right,
            "straight" => DeclaredDirection::Straight,
            _ => DeclaredDirection::Undeclared,
        })
    }
}

impl fmt::Display for DeclaredDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            DeclaredDirection::Left => "left",
            DeclaredDirection::Right => "right",
            DeclaredDirection::Straight => "straight",
            DeclaredDirection::Undeclared => "empty",
        };
        f.write_str(label)
    }
}

/// Read-only view of another agent, taken once per tick
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AgentSnapshot {
    pub id: AgentId,
    pub pose: Pose,
    pub speed: f32,
    pub speed_cap: f32,
    pub status: Status,
    pub future_steering: f32,
}

impl AgentSnapshot {
    pub fn turn_intent(&self) -> TurnIntent {
        TurnIntent::from_steering(self.future_steering)
    }
}

/// Read-only view of the player vehicle, taken once per tick
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlayerSnapshot {
    pub pose: Pose,
    pub speed: f32,
    pub speed_cap: f32,
    pub declared_direction: DeclaredDirection,
}

/// Classified obstacle handed to the arbitration step
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Perceived {
    LeadingAgent(AgentSnapshot),
    PlayerAgent(PlayerSnapshot),
    Generic,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PerceivedObstacle {
    pub perceived: Perceived,
    pub distance: f32,
}

/// Output of arbitration and sole input of the motion actuator
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Directive {
    /// Forward (positive) or reverse (negative) drive, in [-1, 1]
    pub throttle: f32,
    /// Steering bias in [-1, 1], positive to the right
    pub steering: f32,
    /// Brake in [0, 1]
    pub brake: f32,
    pub speed_cap: f32,
}

impl Directive {
    fn clamped(self) -> Self {
        Self {
            throttle: self.throttle.clamp(-1.0, 1.0),
            steering: self.steering.clamp(-1.0, 1.0),
            brake: self.brake.clamp(0.0, 1.0),
            speed_cap: self.speed_cap.max(0.0),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IncidentKind {
    /// The player took right of way from an agent that had it
    RightOfWayViolation,
}

/// A traffic-rule violation handed to the rule collaborators
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Incident {
    pub reporter: AgentId,
    pub kind: IncidentKind,
    pub time: f32,
}

/// Receives incidents raised during arbitration
pub trait IncidentSink {
    fn report_incident(&mut self, incident: Incident);
}

impl IncidentSink for Vec<Incident> {
    fn report_incident(&mut self, incident: Incident) {
        self.push(incident);
    }
}

/// Rate limit for incident reports
///
/// Time accumulates every tick; a report is allowed once the interval has
/// passed since the agent started or since its last report.
#[derive(Debug, Clone, PartialEq)]
pub struct IncidentDebounce {
    timer: CycleTimer,
}

impl Default for IncidentDebounce {
    fn default() -> Self {
        Self::new(INCIDENT_DEBOUNCE_SECS)
    }
}

impl IncidentDebounce {
    pub fn new(interval: f32) -> Self {
        Self {
            timer: CycleTimer::new(interval),
        }
    }

    pub fn advance(&mut self, delta_secs: f32) {
        self.timer.accumulate(delta_secs);
    }

    /// Consumes the window if it is open
    pub fn try_fire(&mut self) -> bool {
        if self.timer.is_ready() {
            self.timer.reset();
            true
        } else {
            false
        }
    }

    pub fn elapsed_secs(&self) -> f32 {
        self.timer.elapsed_secs()
    }
}

/// Distances and speed caps used by arbitration
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ArbitrationConfig {
    /// Below this distance the agent brakes fully (or backs off)
    pub emergency_brake_distance: f32,
    /// Below this distance the agent eases off the throttle
    pub slow_down_distance: f32,
    /// Below this distance a yielding agent stops at a negotiation
    pub intersection_brake_distance: f32,
    /// Half the range within which the next turn is looked at
    pub turn_check_distance: f32,
    pub nominal_speed: f32,
    pub turning_speed: f32,
    pub min_speed: f32,
}

impl Default for ArbitrationConfig {
    fn default() -> Self {
        Self {
            emergency_brake_distance: 2.0,
            slow_down_distance: 4.0,
            intersection_brake_distance: 2.0,
            turn_check_distance: 6.0,
            nominal_speed: 10.0,
            turning_speed: 4.0,
            min_speed: 1.0,
        }
    }
}

/// Everything arbitration needs to know about the deciding agent for one tick
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ArbitrationInput {
    pub agent: AgentId,
    pub pose: Pose,
    pub status: Status,
    pub future_steering: f32,
    /// Lateral direction to the current target in the agent's frame
    pub path_steering: f32,
    pub obstacle: Option<PerceivedObstacle>,
    pub time: f32,
    pub delta_secs: f32,
}

/// Per-agent arbitration state and rules
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ArbitrationEngine {
    config: ArbitrationConfig,
    debounce: IncidentDebounce,
}

impl ArbitrationEngine {
    pub fn new(config: ArbitrationConfig) -> Self {
        Self {
            config,
            debounce: IncidentDebounce::default(),
        }
    }

    pub fn config(&self) -> &ArbitrationConfig {
        &self.config
    }

    pub fn debounce(&self) -> &IncidentDebounce {
        &self.debounce
    }

    /// Whether the next turn should be looked at this tick
    pub fn should_look_ahead(&self, distance_to_waypoint: f32, status: Status) -> bool {
        distance_to_waypoint < self.config.turn_check_distance * 2.0 || status == Status::SlowDown
    }

    /// Computes this tick's directive
    pub fn arbitrate(
        &mut self,
        input: &ArbitrationInput,
        incidents: &mut dyn IncidentSink,
    ) -> Directive {
        self.debounce.advance(input.delta_secs);

        if input.status == Status::Stop {
            return Directive {
                throttle: 0.0,
                steering: 0.0,
                brake: 1.0,
                speed_cap: 0.0,
            };
        }

        let mut directive = Directive {
            throttle: 1.0,
            steering: 0.0,
            brake: 0.0,
            speed_cap: self.config.nominal_speed,
        };

        if input.status == Status::SlowDown {
            directive.throttle = SLOW_DOWN_THROTTLE;
        }

        if input.future_steering.abs() > TURN_INTENT_THRESHOLD {
            directive.speed_cap = directive.speed_cap.min(self.config.turning_speed);
        }

        if let Some(obstacle) = input.obstacle {
            let own_intent = TurnIntent::from_steering(input.future_steering);
            match obstacle.perceived {
                Perceived::LeadingAgent(other) => {
                    self.avoid_vehicle(
                        &mut directive,
                        input,
                        obstacle.distance,
                        &other.pose,
                        other.speed_cap,
                        true,
                    );
                    let negotiating =
                        input.status == Status::SlowDown && other.status == Status::SlowDown;
                    if negotiating
                        && own_intent.yields_to(other.turn_intent())
                        && obstacle.distance < self.config.intersection_brake_distance
                    {
                        debug!(
                            "{:?} yields to {:?} ({:?} over {:?})",
                            input.agent,
                            other.id,
                            other.turn_intent(),
                            own_intent
                        );
                        full_brake(&mut directive);
                    }
                }
                Perceived::PlayerAgent(player) => {
                    self.avoid_vehicle(
                        &mut directive,
                        input,
                        obstacle.distance,
                        &player.pose,
                        player.speed_cap,
                        false,
                    );
                    if input.status == Status::SlowDown {
                        self.negotiate_with_player(
                            &mut directive,
                            input,
                            own_intent,
                            &player,
                            obstacle.distance,
                            incidents,
                        );
                    }
                }
                Perceived::Generic => {
                    if obstacle.distance < self.config.emergency_brake_distance {
                        full_brake(&mut directive);
                        self.halve_speed_cap(&mut directive);
                    } else if obstacle.distance < self.config.slow_down_distance {
                        directive.throttle = APPROACH_THROTTLE;
                        directive.brake = 0.0;
                    }
                }
            }
        }

        if directive.throttle > 0.0 {
            directive.steering = input.path_steering;
        }

        directive.clamped()
    }

    /// Following and collision avoidance against another vehicle
    fn avoid_vehicle(
        &self,
        directive: &mut Directive,
        input: &ArbitrationInput,
        distance: f32,
        other: &Pose,
        other_speed_cap: f32,
        nudge: bool,
    ) {
        let dot_front = input.pose.forward().dot(&other.forward());
        let parallel = dot_front > PARALLEL_DOT;

        if other_speed_cap < directive.speed_cap && parallel {
            directive.speed_cap = other_speed_cap * FOLLOWING_SPEED_FACTOR;
        }

        if distance < self.config.emergency_brake_distance {
            if parallel {
                full_brake(directive);
            } else {
                directive.throttle = REVERSE_THROTTLE;
                directive.brake = 0.0;
                if nudge {
                    let dot_right = input.pose.forward().dot(&other.right());
                    directive.steering = if dot_right > LATERAL_AMBIGUITY {
                        NUDGE_STEERING
                    } else if dot_right < -LATERAL_AMBIGUITY {
                        -NUDGE_STEERING
                    } else {
                        AMBIGUOUS_NUDGE_STEERING
                    };
                }
            }
            self.halve_speed_cap(directive);
        } else if distance < self.config.slow_down_distance {
            directive.throttle = APPROACH_THROTTLE;
            directive.brake = 0.0;
        }
    }

    /// Right of way against the player's declared direction
    fn negotiate_with_player(
        &mut self,
        directive: &mut Directive,
        input: &ArbitrationInput,
        own_intent: TurnIntent,
        player: &PlayerSnapshot,
        distance: f32,
        incidents: &mut dyn IncidentSink,
    ) {
        let Some(player_intent) = player.declared_direction.intent() else {
            return;
        };

        let must_yield = own_intent.yields_to(player_intent);
        let violated = player_intent.yields_to(own_intent);

        if violated && self.debounce.try_fire() {
            info!(
                "Right of way taken by player: {:?} had {:?}, player declared {}",
                input.agent, own_intent, player.declared_direction
            );
            incidents.report_incident(Incident {
                reporter: input.agent,
                kind: IncidentKind::RightOfWayViolation,
                time: input.time,
            });
        }

        if (must_yield || violated) && distance < self.config.intersection_brake_distance {
            full_brake(directive);
        }
    }

    fn halve_speed_cap(&self, directive: &mut Directive) {
        directive.speed_cap = (directive.speed_cap / 2.0).max(self.config.min_speed);
    }
}

fn full_brake(directive: &mut Directive) {
    directive.throttle = 0.0;
    directive.brake = 1.0;
}
