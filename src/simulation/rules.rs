//! Rule collaborators around the navigation core
//!
//! Trigger zones that set agent status, the externally driven player
//! vehicle, and the incident log the core reports violations to.

use log::{debug, warn};

use super::arbitration::{DeclaredDirection, Incident, IncidentSink, PlayerSnapshot, Status};
use super::timer::CycleTimer;
use super::types::{Pose, Position, SimId};

/// A wrapper type for status zone IDs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ZoneId(pub SimId);

/// How a zone decides the status it imposes
#[derive(Debug, Clone, PartialEq)]
pub enum ZoneMode {
    /// Always the same status (e.g. an uncontrolled intersection approach)
    Fixed(Status),
    /// Alternating GO / STOP phases (a signal)
    Signal {
        go_secs: f32,
        stop_secs: f32,
        phase: Status,
        timer: CycleTimer,
    },
}

/// Circular trigger volume imposing a status on agents inside it
#[derive(Debug, Clone, PartialEq)]
pub struct StatusZone {
    pub id: ZoneId,
    pub center: Position,
    pub radius: f32,
    pub mode: ZoneMode,
}

impl StatusZone {
    pub fn fixed(id: ZoneId, center: Position, radius: f32, status: Status) -> Self {
        Self {
            id,
            center,
            radius,
            mode: ZoneMode::Fixed(status),
        }
    }

    /// A signal starting in its GO phase
    pub fn signal(id: ZoneId, center: Position, radius: f32, go_secs: f32, stop_secs: f32) -> Self {
        Self {
            id,
            center,
            radius,
            mode: ZoneMode::Signal {
                go_secs,
                stop_secs,
                phase: Status::Go,
                timer: CycleTimer::new(go_secs),
            },
        }
    }

    pub fn contains(&self, position: &Position) -> bool {
        self.center.flatten().distance(&position.flatten()) <= self.radius
    }

    pub fn status(&self) -> Status {
        match &self.mode {
            ZoneMode::Fixed(status) => *status,
            ZoneMode::Signal { phase, .. } => *phase,
        }
    }

    /// Advances signal phases
    pub fn update(&mut self, delta_secs: f32) {
        if let ZoneMode::Signal {
            go_secs,
            stop_secs,
            phase,
            timer,
        } = &mut self.mode
        {
            timer.accumulate(delta_secs);
            // A full GO + STOP cycle leaves the phase unchanged.
            timer.discard_periods(go_secs.max(f32::EPSILON) + stop_secs.max(f32::EPSILON));
            while timer.try_consume() {
                *phase = if *phase == Status::Go {
                    Status::Stop
                } else {
                    Status::Go
                };
                timer.set_interval(if *phase == Status::Go {
                    *go_secs
                } else {
                    *stop_secs
                });
                debug!("Signal {:?} switched to {:?}", self.id, phase);
            }
        }
    }
}

/// The vehicle driven by a person (or a script), not by the core
#[derive(Debug, Clone, PartialEq)]
pub struct PlayerVehicle {
    pub pose: Pose,
    pub speed: f32,
    pub speed_cap: f32,
    declared_direction: DeclaredDirection,
}

impl PlayerVehicle {
    pub fn new(pose: Pose, speed: f32, speed_cap: f32) -> Self {
        Self {
            pose,
            speed,
            speed_cap,
            declared_direction: DeclaredDirection::Undeclared,
        }
    }

    /// Moves the player straight ahead at its current speed
    pub fn advance(&mut self, delta_secs: f32) {
        let speed = self.speed.min(self.speed_cap);
        self.pose.position = self.pose.position + self.pose.forward() * (speed * delta_secs);
    }

    pub fn declared_direction(&self) -> DeclaredDirection {
        self.declared_direction
    }

    pub fn set_declared_direction(&mut self, direction: DeclaredDirection) {
        self.declared_direction = direction;
    }

    /// Sets the direction from the rule collaborator's text label
    pub fn declare(&mut self, label: &str) {
        // Unknown labels parse as undeclared.
        self.declared_direction = label.parse().unwrap_or_default();
    }

    /// Declares the direction implied by the player's blinkers
    pub fn declare_from_blinkers(&mut self, left_on: bool, right_on: bool) {
        self.declared_direction = DeclaredDirection::from_blinkers(left_on, right_on);
    }

    pub fn snapshot(&self) -> PlayerSnapshot {
        PlayerSnapshot {
            pose: self.pose,
            speed: self.speed,
            speed_cap: self.speed_cap,
            declared_direction: self.declared_direction,
        }
    }
}

/// Record of every incident reported this run
#[derive(Debug, Clone, Default)]
pub struct IncidentLog {
    incidents: Vec<Incident>,
}

impl IncidentLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self) -> usize {
        self.incidents.len()
    }

    pub fn incidents(&self) -> &[Incident] {
        &self.incidents
    }
}

impl IncidentSink for IncidentLog {
    fn report_incident(&mut self, incident: Incident) {
        warn!(
            "Incident #{}: {:?} reported by {:?} at {:.1}s",
            self.incidents.len() + 1,
            incident.kind,
            incident.reporter,
            incident.time
        );
        self.incidents.push(incident);
    }
}
