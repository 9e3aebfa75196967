//! World level scenarios
//!
//! Agents, zones and the player interacting through full ticks.

use waypoint_traffic::simulation::{
    AgentConfig, ArbitrationConfig, IncidentKind, KinematicState, LayerMask, PlayerVehicle, Pose,
    Position, RoadGraph, RoadGraphBuilder, SimId, SimWorld, Status, StatusZone, ZoneId,
};

/// One long road along +z with a waypoint every 20 m
fn straight_road() -> RoadGraph {
    let mut builder = RoadGraphBuilder::new();
    builder
        .add_segment((0..6).map(|i| Position::ground(0.0, i as f32 * 20.0)).collect())
        .unwrap();
    builder.build()
}

fn heading_north(x: f32, z: f32) -> Pose {
    Pose::new(Position::ground(x, z), 0.0)
}

#[test]
fn test_agents_skip_ticks_until_road_graph_arrives() {
    let mut world = SimWorld::new_with_seed(1);
    let id = world.spawn_agent(heading_north(0.0, 2.0)).unwrap();

    for _ in 0..5 {
        world.tick(0.1);
    }
    assert_eq!(world.stats.skipped_updates, 5);
    assert_eq!(world.agent(id).unwrap().pose().position, Position::ground(0.0, 2.0));
    assert!(world.agent(id).unwrap().navigation().is_none());

    world.set_road_graph(straight_road());
    for _ in 0..10 {
        world.tick(0.1);
    }

    let agent = world.agent(id).unwrap();
    assert_eq!(world.stats.skipped_updates, 5);
    assert!(agent.pose().position.z > 2.5);
    assert!(agent.navigation().is_some());
}

#[test]
fn test_seeded_test_world_keeps_agents_on_valid_targets() {
    let mut world = SimWorld::create_test_world_with_seed(42, 4);
    assert_eq!(world.agents.len(), 4);

    for _ in 0..300 {
        world.tick(0.1);
    }

    assert_eq!(world.agents.len(), 4);
    assert_eq!(world.stats.agents_despawned, 0);
    assert!(world.stats.waypoints_reached > 0);
    assert_eq!(world.stats.ticks, 300);

    let graph = world.road_graph().unwrap();
    for agent in world.agents.values() {
        let navigation = agent.navigation().unwrap();
        for target in [navigation.current(), navigation.future()] {
            let segment = graph.segment(target.segment).unwrap();
            assert!(target.waypoint < segment.waypoint_count());
        }
    }
}

#[test]
fn test_same_seed_gives_same_run() {
    let mut first = SimWorld::create_test_world_with_seed(7, 4);
    let mut second = SimWorld::create_test_world_with_seed(7, 4);

    for _ in 0..200 {
        first.tick(0.1);
        second.tick(0.1);
    }

    let poses = |world: &SimWorld| -> Vec<Pose> {
        world.agents.values().map(|agent| *agent.pose()).collect()
    };
    assert_eq!(poses(&first), poses(&second));
    assert_eq!(first.stats, second.stats);
}

#[test]
fn test_stop_zone_holds_agent_until_it_leaves() {
    let mut world = SimWorld::new_with_seed(3);
    world.set_road_graph(straight_road());
    world.add_zone(Position::ground(0.0, 20.0), 6.0, Status::Stop);
    let id = world.spawn_agent(heading_north(0.0, 2.0)).unwrap();

    for _ in 0..100 {
        world.tick(0.1);
    }

    let agent = world.agent(id).unwrap();
    assert_eq!(agent.status(), Status::Stop);
    assert!(agent.state().speed.abs() < 1e-3);
    let z = agent.pose().position.z;
    assert!((14.0..=26.0).contains(&z), "stopped at z = {}", z);

    world
        .agents
        .get_mut(&id)
        .unwrap()
        .set_state(KinematicState::new(heading_north(0.0, 50.0), 0.0));
    world.tick(0.1);

    assert_eq!(world.agent(id).unwrap().status(), Status::Go);
}

#[test]
fn test_follower_stops_behind_stopped_leader() {
    let mut world = SimWorld::new_with_seed(5);
    world.set_road_graph(straight_road());
    let slow = AgentConfig {
        arbitration: ArbitrationConfig {
            nominal_speed: 3.0,
            ..ArbitrationConfig::default()
        },
        ..AgentConfig::default()
    };
    let leader = world.spawn_agent(heading_north(0.0, 20.0)).unwrap();
    world.set_status(leader, Status::Stop).unwrap();
    let follower = world
        .spawn_agent_with_config(heading_north(0.0, 2.0), slow)
        .unwrap();

    for _ in 0..200 {
        world.tick(0.1);
    }

    let leader = world.agent(leader).unwrap();
    let follower = world.agent(follower).unwrap();
    let gap = leader.pose().position.z - follower.pose().position.z;
    assert!(gap > 1.0, "gap closed to {}", gap);
    assert!(follower.state().speed.abs() < 1e-3);
    assert!(follower.pose().position.z > 2.0);
}

#[test]
fn test_follower_brakes_for_leader_just_ahead() {
    // The follower's sensor origin starts inside the leader's body.
    let mut world = SimWorld::new_with_seed(5);
    world.set_road_graph(straight_road());
    let leader = world.spawn_agent(heading_north(0.0, 3.05)).unwrap();
    world.set_status(leader, Status::Stop).unwrap();
    let follower = world.spawn_agent(heading_north(0.0, 2.0)).unwrap();

    for _ in 0..5 {
        world.tick(0.1);
    }

    let follower = world.agent(follower).unwrap();
    assert!(follower.state().speed.abs() < 1e-3);
    assert!(follower.pose().position.z < 2.05);
}

#[test]
fn test_agent_brakes_before_static_obstacle() {
    let mut world = SimWorld::new_with_seed(4);
    world.set_road_graph(straight_road());
    world.add_obstacle(Position::ground(0.0, 15.0), 0.5);
    let slow = AgentConfig {
        arbitration: ArbitrationConfig {
            nominal_speed: 3.0,
            ..ArbitrationConfig::default()
        },
        ..AgentConfig::default()
    };
    let id = world
        .spawn_agent_with_config(heading_north(0.0, 2.0), slow)
        .unwrap();

    for _ in 0..150 {
        world.tick(0.1);
    }

    let agent = world.agent(id).unwrap();
    assert!(agent.config().probe.mask.contains(LayerMask::STATIC_OBSTACLE));
    assert!(agent.state().speed.abs() < 1e-3);
    let z = agent.pose().position.z;
    assert!(z > 10.0 && z < 14.5, "stopped at z = {}", z);
}

#[test]
fn test_collision_layers_can_be_cleared() {
    let mut world = SimWorld::new_with_seed(4);
    world.set_road_graph(straight_road());
    world.collision_layers = LayerMask::NONE;
    world.add_obstacle(Position::ground(0.0, 15.0), 0.5);
    let id = world.spawn_agent(heading_north(0.0, 2.0)).unwrap();

    for _ in 0..60 {
        world.tick(0.1);
    }

    let agent = world.agent(id).unwrap();
    assert!(!agent.config().probe.mask.contains(LayerMask::STATIC_OBSTACLE));
    assert!(agent.pose().position.z > 16.0);
}

#[test]
fn test_player_violation_is_reported_once() {
    let mut world = SimWorld::new_with_seed(9);
    world.set_road_graph(straight_road());
    world.add_zone(Position::ground(0.0, 10.0), 50.0, Status::SlowDown);
    // Slow enough to come to rest before reaching the player.
    world.default_agent_config.arbitration.nominal_speed = 2.0;
    let id = world.spawn_agent(heading_north(0.0, 2.0)).unwrap();

    let mut player = PlayerVehicle::new(
        Pose::new(Position::ground(0.0, 8.0), std::f32::consts::FRAC_PI_2),
        0.0,
        10.0,
    );
    player.declare("left");
    world.set_player(player);

    for _ in 0..70 {
        world.tick(0.1);
    }

    assert_eq!(world.incidents.count(), 1);
    let incident = world.incidents.incidents()[0];
    assert_eq!(incident.kind, IncidentKind::RightOfWayViolation);
    assert_eq!(incident.reporter, id);
    assert!(incident.time >= 5.0);

    let agent = world.agent(id).unwrap();
    assert_eq!(agent.status(), Status::SlowDown);
    assert!(agent.pose().position.z < 8.0);
}

#[test]
fn test_despawn_and_unknown_agents() {
    let mut world = SimWorld::new_with_seed(2);
    world.set_road_graph(straight_road());
    let id = world.spawn_agent(heading_north(0.0, 2.0)).unwrap();

    assert!(world.despawn_agent(id).is_some());
    assert!(world.despawn_agent(id).is_none());
    assert!(world.set_status(id, Status::Stop).is_err());
    assert_eq!(world.stats.agents_spawned, 1);
    assert_eq!(world.stats.agents_despawned, 1);
}

#[test]
fn test_signal_zone_alternates_phases() {
    let mut signal = StatusZone::signal(ZoneId(SimId(0)), Position::ZERO, 4.0, 6.0, 3.0);
    assert_eq!(signal.status(), Status::Go);

    signal.update(5.0);
    assert_eq!(signal.status(), Status::Go);
    signal.update(1.0);
    assert_eq!(signal.status(), Status::Stop);
    signal.update(3.0);
    assert_eq!(signal.status(), Status::Go);
    assert!(signal.contains(&Position::ground(3.0, 0.0)));
    assert!(!signal.contains(&Position::ground(3.0, 3.0)));
}

#[test]
fn test_signal_steps_through_unequal_phases_in_one_update() {
    let mut signal = StatusZone::signal(ZoneId(SimId(0)), Position::ZERO, 4.0, 6.0, 3.0);

    // 6 s GO then 3 s STOP, so 10 s lands 1 s into the next GO.
    signal.update(10.0);
    assert_eq!(signal.status(), Status::Go);
    signal.update(5.0);
    assert_eq!(signal.status(), Status::Stop);
    signal.update(2.0);
    assert_eq!(signal.status(), Status::Stop);
    signal.update(1.0);
    assert_eq!(signal.status(), Status::Go);

    signal.update(1.0e9);
    let phase = signal.status();
    assert!(phase == Status::Go || phase == Status::Stop);
}

#[test]
fn test_player_advances_and_declares() {
    let mut player = PlayerVehicle::new(heading_north(0.0, 0.0), 4.0, 2.0);

    player.advance(1.0);
    assert!((player.pose.position.z - 2.0).abs() < 1e-5);

    player.declare("right");
    assert_eq!(player.snapshot().declared_direction.to_string(), "right");
    player.declare("anything else");
    assert_eq!(player.snapshot().declared_direction.to_string(), "empty");
    player.declare_from_blinkers(true, false);
    assert_eq!(player.declared_direction().to_string(), "left");
}
