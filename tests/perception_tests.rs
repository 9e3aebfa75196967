use std::cell::RefCell;

use waypoint_traffic::simulation::{
    AgentId, DistanceMode, LayerMask, ObstacleKind, PerceptionModule, Position, ProbeConfig,
    ProbeHit, RangeSensor, SimId, SimScene,
};

const EPS: f32 = 1e-3;

/// Records every probe direction and never hits anything
#[derive(Default)]
struct RecordingSensor {
    directions: RefCell<Vec<Position>>,
}

impl RangeSensor for RecordingSensor {
    fn cast(
        &self,
        _origin: Position,
        direction: Position,
        _length: f32,
        _mask: LayerMask,
        _caster: Option<ObstacleKind>,
    ) -> Option<ProbeHit> {
        self.directions.borrow_mut().push(direction);
        None
    }
}

/// Reports the caster on its first cast and another agent afterwards
#[derive(Default)]
struct SelfFirstSensor {
    casts: RefCell<usize>,
}

impl RangeSensor for SelfFirstSensor {
    fn cast(
        &self,
        origin: Position,
        direction: Position,
        _length: f32,
        _mask: LayerMask,
        caster: Option<ObstacleKind>,
    ) -> Option<ProbeHit> {
        let mut casts = self.casts.borrow_mut();
        *casts += 1;
        let kind = match caster {
            Some(kind) if *casts == 1 => kind,
            _ => agent(2),
        };
        Some(ProbeHit {
            kind,
            body_position: origin + direction * 2.0,
            body_forward: Position::new(0.0, 0.0, 1.0),
            distance: 2.0,
        })
    }
}

fn forward() -> Position {
    Position::new(0.0, 0.0, 1.0)
}

fn sensor_origin() -> Position {
    Position::new(0.0, 0.0, 0.6)
}

fn agent(index: usize) -> ObstacleKind {
    ObstacleKind::Agent(AgentId(SimId(index)))
}

#[test]
fn test_probe_angles_at_full_speed() {
    let config = ProbeConfig::default();

    assert_eq!(
        config.probe_angles(1.0),
        vec![-6.0, -4.0, -2.0, 0.0, 2.0, 4.0, 6.0]
    );
    assert_eq!(config.arc_deg(1.0), 12.0);
}

#[test]
fn test_probe_angles_at_rest() {
    let config = ProbeConfig::default();

    assert_eq!(
        config.probe_angles(0.0),
        vec![-24.0, -16.0, -8.0, 0.0, 8.0, 16.0, 24.0]
    );
}

#[test]
fn test_spacing_narrows_with_speed() {
    let config = ProbeConfig::default();

    assert_eq!(config.spacing_deg(0.0), 8.0);
    assert_eq!(config.spacing_deg(0.5), 5.0);
    assert_eq!(config.spacing_deg(1.0), 2.0);
    assert_eq!(config.spacing_deg(3.0), 2.0);
    assert_eq!(config.spacing_deg(-1.0), 8.0);
}

#[test]
fn test_probes_are_cast_left_to_right() {
    let perception = PerceptionModule::default();
    let sensor = RecordingSensor::default();

    let detection = perception.scan(&sensor, sensor_origin(), Position::ZERO, forward(), 1.0, None);

    assert!(detection.is_none());
    let directions = sensor.directions.borrow();
    assert_eq!(directions.len(), 7);
    // Negative x is the agent's left when facing +z.
    assert!(directions[0].x < 0.0);
    assert!(directions[3].x.abs() < EPS);
    assert!(directions[6].x > 0.0);
    assert!(directions.windows(2).all(|pair| pair[0].x < pair[1].x));
}

#[test]
fn test_distance_modes() {
    let mut scene = SimScene::new();
    scene.add_body(
        agent(1),
        LayerMask::AUTONOMOUS_VEHICLE,
        Position::ground(0.0, 3.0),
        forward(),
        0.2,
    );

    let origin_mode = PerceptionModule::default();
    let ray_mode = PerceptionModule::new(ProbeConfig {
        distance_mode: DistanceMode::RayHit,
        ..ProbeConfig::default()
    });

    let by_origin = origin_mode
        .scan(&scene, sensor_origin(), Position::ZERO, forward(), 0.0, None)
        .unwrap();
    let by_ray = ray_mode
        .scan(&scene, sensor_origin(), Position::ZERO, forward(), 0.0, None)
        .unwrap();

    assert_eq!(by_origin.obstacle, agent(1));
    assert!((by_origin.distance - 3.0).abs() < EPS);
    assert!((by_ray.distance - 2.2).abs() < EPS);
    assert_eq!(by_ray.body_position, Position::ground(0.0, 3.0));
}

#[test]
fn test_mask_excludes_unlisted_layers() {
    let mut scene = SimScene::new();
    scene.add_body(
        ObstacleKind::Generic,
        LayerMask::STATIC_OBSTACLE,
        Position::ground(0.0, 3.0),
        forward(),
        0.5,
    );

    let default_mask = PerceptionModule::default();
    let with_static = PerceptionModule::new(ProbeConfig {
        mask: LayerMask::AUTONOMOUS_VEHICLE | LayerMask::STATIC_OBSTACLE,
        ..ProbeConfig::default()
    });

    assert!(default_mask
        .scan(&scene, sensor_origin(), Position::ZERO, forward(), 1.0, None)
        .is_none());
    let detection = with_static
        .scan(&scene, sensor_origin(), Position::ZERO, forward(), 1.0, None)
        .unwrap();
    assert_eq!(detection.obstacle, ObstacleKind::Generic);
}

#[test]
fn test_first_probe_to_hit_wins() {
    // The right body is closer, but the left probe is cast first.
    let mut scene = SimScene::new();
    let origin = sensor_origin();
    scene.add_body(
        agent(1),
        LayerMask::AUTONOMOUS_VEHICLE,
        origin + forward().rotated_y(-16.0) * 3.0,
        forward(),
        0.3,
    );
    scene.add_body(
        agent(2),
        LayerMask::AUTONOMOUS_VEHICLE,
        origin + forward().rotated_y(16.0) * 2.0,
        forward(),
        0.3,
    );

    let detection = PerceptionModule::default()
        .scan(&scene, origin, Position::ZERO, forward(), 0.0, None)
        .unwrap();

    assert_eq!(detection.obstacle, agent(1));
}

#[test]
fn test_own_body_is_skipped_but_bodies_behind_it_are_seen() {
    // The caster's body wraps the sensor origin.
    let mut scene = SimScene::new();
    scene.add_body(
        agent(0),
        LayerMask::AUTONOMOUS_VEHICLE,
        Position::ZERO,
        forward(),
        1.0,
    );

    let perception = PerceptionModule::default();
    let alone = perception.scan(
        &scene,
        sensor_origin(),
        Position::ZERO,
        forward(),
        0.0,
        Some(agent(0)),
    );
    assert!(alone.is_none());

    scene.add_body(
        agent(1),
        LayerMask::AUTONOMOUS_VEHICLE,
        Position::ground(0.0, 3.0),
        forward(),
        0.5,
    );
    let detection = perception
        .scan(
            &scene,
            sensor_origin(),
            Position::ZERO,
            forward(),
            0.0,
            Some(agent(0)),
        )
        .unwrap();
    assert_eq!(detection.obstacle, agent(1));
    assert!((detection.distance - 3.0).abs() < EPS);
}

#[test]
fn test_body_containing_sensor_origin_is_hit_at_zero() {
    let mut scene = SimScene::new();
    scene.add_body(
        agent(1),
        LayerMask::AUTONOMOUS_VEHICLE,
        Position::ground(0.0, 1.05),
        forward(),
        0.5,
    );

    let by_ray = PerceptionModule::new(ProbeConfig {
        distance_mode: DistanceMode::RayHit,
        ..ProbeConfig::default()
    })
    .scan(&scene, sensor_origin(), Position::ZERO, forward(), 0.0, Some(agent(0)))
    .unwrap();
    assert_eq!(by_ray.obstacle, agent(1));
    assert_eq!(by_ray.distance, 0.0);

    let by_origin = PerceptionModule::default()
        .scan(&scene, sensor_origin(), Position::ZERO, forward(), 0.0, Some(agent(0)))
        .unwrap();
    assert!((by_origin.distance - 1.05).abs() < EPS);
}

#[test]
fn test_caster_hit_moves_on_to_next_ray() {
    let sensor = SelfFirstSensor::default();

    let detection = PerceptionModule::default()
        .scan(&sensor, sensor_origin(), Position::ZERO, forward(), 0.0, Some(agent(0)))
        .unwrap();

    assert_eq!(detection.obstacle, agent(2));
    assert_eq!(*sensor.casts.borrow(), 2);
}

#[test]
fn test_bodies_beyond_probe_length_are_ignored() {
    let mut scene = SimScene::new();
    scene.add_body(
        ObstacleKind::Player,
        LayerMask::PLAYER,
        Position::ground(0.0, 9.0),
        forward(),
        0.5,
    );

    let detection = PerceptionModule::default().scan(
        &scene,
        sensor_origin(),
        Position::ZERO,
        forward(),
        1.0,
        None,
    );

    assert!(detection.is_none());
}

#[test]
fn test_layer_mask_operations() {
    let vehicles = LayerMask::AUTONOMOUS_VEHICLE | LayerMask::PLAYER;

    assert!(vehicles.contains(LayerMask::PLAYER));
    assert!(!vehicles.contains(LayerMask::STATIC_OBSTACLE));
    assert!(!vehicles.contains(LayerMask::NONE));
    assert!(vehicles.intersects(LayerMask::PLAYER | LayerMask::STATIC_OBSTACLE));
    assert!(!vehicles.intersects(LayerMask::custom(0)));
    assert_eq!(LayerMask::custom(0), LayerMask(1 << 3));
}
