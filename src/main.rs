use clap::Parser;
use log::info;

use waypoint_traffic::simulation::{
    DistanceMode, PlayerVehicle, Pose, Position, SimWorld, VEHICLE_RADIUS,
};

#[derive(Parser)]
#[command(name = "waypoint_traffic")]
#[command(about = "Headless autonomous traffic navigation simulation")]
struct Cli {
    /// Number of simulation ticks to run
    #[arg(long, default_value = "600")]
    ticks: u32,

    /// Time delta per tick in seconds
    #[arg(long, default_value = "0.1")]
    delta: f32,

    /// Seed for reproducible runs (random when omitted)
    #[arg(long)]
    seed: Option<u64>,

    /// Number of agents to spawn
    #[arg(long, default_value = "4")]
    agents: usize,

    /// Print a summary every N ticks (0 disables periodic summaries)
    #[arg(long, default_value = "100")]
    report_every: u32,

    /// Report obstacle distance along the probe instead of origin to origin
    #[arg(long)]
    ray_hit_distance: bool,

    /// Add a player vehicle crossing the map
    #[arg(long)]
    player: bool,

    /// Draw the terminal map with each summary
    #[arg(long)]
    map: bool,

    /// Place a static obstacle at `x,z` (repeatable)
    #[arg(long, value_parser = parse_ground_point)]
    obstacle: Vec<Position>,

    /// Radius of each static obstacle in metres
    #[arg(long, default_value = "0.5")]
    obstacle_radius: f32,
}

fn parse_ground_point(value: &str) -> Result<Position, String> {
    let (x, z) = value
        .split_once(',')
        .ok_or_else(|| format!("expected `x,z`, got `{}`", value))?;
    let x: f32 = x.trim().parse().map_err(|e| format!("bad x `{}`: {}", x, e))?;
    let z: f32 = z.trim().parse().map_err(|e| format!("bad z `{}`: {}", z, e))?;
    Ok(Position::ground(x, z))
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    run_headless(&cli);
}

/// Run the simulation in headless mode (no graphics)
fn run_headless(cli: &Cli) {
    info!(
        "Running navigation simulation: {} ticks of {}s, {} agents",
        cli.ticks, cli.delta, cli.agents
    );

    let mut world = match cli.seed {
        Some(seed) => SimWorld::new_with_seed(seed),
        None => SimWorld::new(),
    };
    if cli.ray_hit_distance {
        world.default_agent_config.probe.distance_mode = DistanceMode::RayHit;
    }
    let mut world = SimWorld::build_test_world(world, cli.agents);
    for position in &cli.obstacle {
        world.add_obstacle(*position, cli.obstacle_radius);
    }

    if cli.player {
        let start = Position::ground(-10.0, 20.0 + VEHICLE_RADIUS);
        let mut player = PlayerVehicle::new(
            Pose::looking_at(start, Position::ground(60.0, 20.0 + VEHICLE_RADIUS)),
            3.0,
            world.default_agent_config.arbitration.nominal_speed,
        );
        player.declare("straight");
        world.set_player(player);
    }

    println!("Initial state:");
    world.print_summary();
    if cli.map {
        world.draw_map();
    }
    println!();

    for tick in 1..=cli.ticks {
        world.tick(cli.delta);

        if cli.report_every > 0 && tick % cli.report_every == 0 && tick < cli.ticks {
            println!(
                "--- After tick {} ({:.1}s simulated time) ---",
                tick,
                tick as f32 * cli.delta
            );
            world.print_summary();
            if cli.map {
                world.draw_map();
            }
            println!();
        }
    }

    println!("=== Final State ===");
    world.print_summary();
    if cli.map {
        world.draw_map();
    }

    info!("=== SIMULATION COMPLETE ===");
    info!("Simulated time: {:.2}s", world.time);
    info!("Agents spawned: {}", world.stats.agents_spawned);
    info!("Active agents: {}", world.agents.len());
    info!("Waypoints reached: {}", world.stats.waypoints_reached);
    info!("Incidents: {}", world.incidents.count());
}
