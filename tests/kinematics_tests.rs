use waypoint_traffic::simulation::{
    Directive, DriveConfig, KinematicState, MotionActuator, Pose, Position, SimpleDrive, Status,
};

fn directive(throttle: f32, steering: f32, brake: f32, speed_cap: f32) -> Directive {
    Directive {
        throttle,
        steering,
        brake,
        speed_cap,
    }
}

fn at_rest() -> KinematicState {
    KinematicState::new(Pose::new(Position::ZERO, 0.0), 0.0)
}

#[test]
fn test_throttle_from_rest_holds_minimum_speed() {
    let mut drive = SimpleDrive::new(DriveConfig::default());

    let state = drive.apply(&directive(1.0, 0.0, 0.0, 10.0), &at_rest(), Status::Go, 0.1);

    assert!((state.speed - 1.0).abs() < 1e-5);
    assert!((state.pose.position.z - 0.1).abs() < 1e-5);
}

#[test]
fn test_stationary_vehicle_does_not_turn() {
    let mut drive = SimpleDrive::new(DriveConfig::default());

    let state = drive.apply(&directive(0.0, 1.0, 0.0, 10.0), &at_rest(), Status::Go, 0.1);

    assert_eq!(state.pose.yaw, 0.0);
    assert_eq!(state.speed, 0.0);
}

#[test]
fn test_positive_steering_turns_right_when_moving() {
    let mut drive = SimpleDrive::new(DriveConfig::default());
    let moving = KinematicState::new(Pose::new(Position::ZERO, 0.0), 4.0);

    let state = drive.apply(&directive(1.0, 1.0, 0.0, 10.0), &moving, Status::Go, 0.1);

    assert!(state.pose.yaw > 0.0);
    assert!(drive.current_steering() > 0.0);
}

#[test]
fn test_brake_stops_without_reversing() {
    let mut drive = SimpleDrive::new(DriveConfig::default());
    let slow = KinematicState::new(Pose::new(Position::ZERO, 0.0), 0.5);

    let state = drive.apply(&directive(0.0, 0.0, 1.0, 10.0), &slow, Status::Go, 0.1);

    assert_eq!(state.speed, 0.0);
}

#[test]
fn test_speed_is_clamped_to_cap() {
    let mut drive = SimpleDrive::new(DriveConfig::default());
    let fast = KinematicState::new(Pose::new(Position::ZERO, 0.0), 8.0);

    let state = drive.apply(&directive(1.0, 0.0, 0.0, 4.0), &fast, Status::Go, 0.1);

    assert_eq!(state.speed, 4.0);
}

#[test]
fn test_reverse_throttle_backs_off() {
    let mut drive = SimpleDrive::new(DriveConfig::default());

    let state = drive.apply(&directive(-0.3, 0.0, 0.0, 5.0), &at_rest(), Status::Go, 1.0);

    assert!((state.speed + 1.2).abs() < 1e-5);
    assert!(state.pose.position.z < 0.0);
}

#[test]
fn test_stop_status_skips_minimum_speed() {
    let mut drive = SimpleDrive::new(DriveConfig::default());

    let state = drive.apply(&directive(0.2, 0.0, 0.0, 10.0), &at_rest(), Status::Stop, 0.1);

    assert!(state.speed < 1.0);
}
