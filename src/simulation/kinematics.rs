//! Boundary to the physical integrator
//!
//! The navigation core never moves a vehicle itself: it hands a
//! [`Directive`] to a [`MotionActuator`] and reads back the new state.

use super::arbitration::{Directive, Status};
use super::types::Pose;

/// Physical state of a vehicle as seen by the navigation core
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct KinematicState {
    pub pose: Pose,
    /// Signed forward speed in m/s
    pub speed: f32,
}

impl KinematicState {
    pub fn new(pose: Pose, speed: f32) -> Self {
        Self { pose, speed }
    }
}

/// Applies a directive to a vehicle
pub trait MotionActuator {
    fn apply(
        &mut self,
        directive: &Directive,
        state: &KinematicState,
        status: Status,
        delta_secs: f32,
    ) -> KinematicState;
}

/// Tuning of [`SimpleDrive`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DriveConfig {
    /// Acceleration at full throttle, m/s^2
    pub acceleration: f32,
    /// Deceleration at full brake, m/s^2
    pub braking: f32,
    /// Speed held while driving forward, unless stopped
    pub min_speed: f32,
    /// Maximum yaw rate at full steering, degrees per second
    pub max_steering_rate_deg: f32,
    /// Speed below which steering is fully effective
    pub full_steering_speed: f32,
    /// How fast the applied steering follows the requested one
    pub steering_lerp: f32,
}

impl Default for DriveConfig {
    fn default() -> Self {
        Self {
            acceleration: 4.0,
            braking: 8.0,
            min_speed: 1.0,
            max_steering_rate_deg: 120.0,
            full_steering_speed: 4.0,
            steering_lerp: 5.0,
        }
    }
}

/// Kinematic stand-in for a wheeled rigid body
///
/// Good enough to drive agents around a headless scene; it has no mass,
/// slip or suspension.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SimpleDrive {
    config: DriveConfig,
    current_steering: f32,
}

impl SimpleDrive {
    pub fn new(config: DriveConfig) -> Self {
        Self {
            config,
            current_steering: 0.0,
        }
    }

    pub fn current_steering(&self) -> f32 {
        self.current_steering
    }
}

impl MotionActuator for SimpleDrive {
    fn apply(
        &mut self,
        directive: &Directive,
        state: &KinematicState,
        status: Status,
        delta_secs: f32,
    ) -> KinematicState {
        let dt = delta_secs.max(0.0);
        let mut speed = state.speed;

        let effectiveness = if speed.abs() > self.config.full_steering_speed {
            (self.config.full_steering_speed / speed.abs()).clamp(0.0, 1.0)
        } else {
            1.0
        };
        let target_steering = directive.steering * effectiveness;
        let blend = (dt * self.config.steering_lerp).clamp(0.0, 1.0);
        self.current_steering += (target_steering - self.current_steering) * blend;

        // Stationary vehicles cannot turn; reversing turns the other way.
        let travel = if speed.abs() > 1e-3 { speed.signum() } else { 0.0 };
        let yaw_step_deg = self.current_steering * self.config.max_steering_rate_deg * dt;
        let yaw = state.pose.yaw + yaw_step_deg.to_radians() * travel;

        if directive.throttle != 0.0 {
            speed += directive.throttle * self.config.acceleration * dt;
        }

        if status != Status::Stop && directive.throttle > 0.0 && speed < self.config.min_speed {
            speed = self.config.min_speed;
        }

        if directive.brake > 0.0 {
            let decel = directive.brake * self.config.braking * dt;
            speed = if speed.abs() <= decel {
                0.0
            } else {
                speed - decel * speed.signum()
            };
        }

        speed = speed.clamp(-directive.speed_cap, directive.speed_cap);

        let mut pose = state.pose;
        pose.yaw = yaw;
        pose.position = pose.position + pose.forward() * (speed * dt);

        KinematicState { pose, speed }
    }
}
