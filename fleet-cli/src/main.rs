use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use colored::Colorize;
use fleet_core::channel::channel_pair;
use fleet_core::config::schedule;
use fleet_core::config::FleetConfig;
use fleet_core::errors::FleetResult;
use fleet_core::logger;
use fleet_core::manager::RobotManager;
use fleet_core::messages::{RobotId, SimulationResult, StateVector};
use fleet_core::mpc::UnicycleTrackingMpc;
use fleet_core::orchestrator::{Orchestrator, TickObserver};
use fleet_core::planner::{LinearPlanner, Planner};
use fleet_core::robot::{Robot, RobotHandle};

#[derive(Parser, Debug)]
#[command(version, about = "Runs a distributed multi-robot fleet coordination scenario")]
struct Cli {
    /// Path to the fleet's YAML configuration file.
    config_path: String,

    /// Override the configured tick budget.
    #[arg(long)]
    max_ticks: Option<u64>,
}

struct LoggingObserver {
    vehicle_width: f32,
}

impl TickObserver for LoggingObserver {
    fn on_tick(&mut self, kt: u64, results: &[SimulationResult]) {
        let min_distance = min_pairwise_distance(results);
        let idle_count = results.iter().filter(|r| r.traj_result.is_complete).count();
        log::info!(
            "tick {kt}: {} robots reported, {idle_count} complete, min pairwise distance {:.3} (margin {:.3})",
            results.len(),
            min_distance,
            min_distance - 2.0 * self.vehicle_width,
        );
    }
}

fn min_pairwise_distance(results: &[SimulationResult]) -> f32 {
    let mut min = f32::INFINITY;
    for i in 0..results.len() {
        for j in (i + 1)..results.len() {
            let a = results[i].state;
            let b = results[j].state;
            let d = ((a.x - b.x).powi(2) + (a.y - b.y).powi(2)).sqrt();
            min = min.min(d);
        }
    }
    if min.is_finite() {
        min
    } else {
        f32::NAN
    }
}

fn spawn_robot(
    id: RobotId,
    config: &fleet_core::config::RobotConfig,
    mpc_config: &fleet_core::config::MpcConfiguration,
    manager: &mut RobotManager,
    seed: u64,
    manager_to_robot_delay: fleet_core::channel::NetworkDelayConfig,
    robot_to_manager_delay: fleet_core::channel::NetworkDelayConfig,
) -> FleetResult<RobotHandle> {
    let (manager_side, robot_side) = channel_pair(manager_to_robot_delay, robot_to_manager_delay, seed)?;
    manager.register(id, manager_side)?;

    let mut planner = LinearPlanner::new();
    if let Some(path) = &config.schedule_path {
        let records = schedule::load_csv_for_robot(path, id)?;
        let coords: Vec<(f32, f32)> = records.iter().map(|r| (r.x, r.y)).collect();
        let times: Vec<f32> = records.iter().map(|r| r.t).collect();
        let nominal_speed = config.nominal_speed.unwrap_or(mpc_config.lin_vel_max / 2.0);
        planner.load_path(coords, times, nominal_speed)?;
    }

    let initial_state = StateVector::new(
        config.initial_state[0],
        config.initial_state[1],
        config.initial_state[2],
    );

    let mut robot = Robot::new(
        id,
        initial_state,
        Box::new(planner),
        Box::new(UnicycleTrackingMpc::new(mpc_config.lin_vel_max, mpc_config.ang_vel_max, mpc_config.n_hor)),
        robot_side,
        mpc_config.layout(),
        mpc_config.ts,
    );
    robot.subscribe()?;
    robot.start()
}

fn doit(args: Cli) -> FleetResult<()> {
    let config = FleetConfig::load_from_path(&PathBuf::from(&args.config_path))?;
    logger::init_log(&config.log);
    env_logger::Builder::new()
        .filter_level(log::LevelFilter::from(config.log.log_level.clone()))
        .init();

    log::info!("loaded fleet configuration from {}", args.config_path);

    let mut manager = RobotManager::new(Duration::from_secs_f32(config.tick_timeout));
    manager.start();

    let mut robot_handles = Vec::with_capacity(config.robots.len());
    for (i, robot_config) in config.robots.iter().enumerate() {
        let handle = spawn_robot(
            robot_config.id,
            robot_config,
            &config.mpc,
            &mut manager,
            config.random_seed.wrapping_add(i as u64),
            config.manager_to_robot_delay,
            config.robot_to_manager_delay,
        )?;
        robot_handles.push(handle);
    }

    let max_ticks = args.max_ticks.unwrap_or(config.max_ticks);
    let orchestrator = Orchestrator::new(config.mpc.ts, max_ticks);
    let mut observer = LoggingObserver { vehicle_width: config.robot_spec.vehicle_width };
    let (ticks_run, completed) = orchestrator.run(&mut manager, |_kt| Vec::new(), &mut observer)?;

    manager.stop()?;
    for handle in robot_handles {
        handle.stop();
    }

    if completed {
        println!("{}", format!("fleet completed after {ticks_run} ticks").green());
    } else {
        println!("{}", format!("fleet did not complete within {ticks_run} ticks").yellow());
    }
    Ok(())
}

fn main() {
    let args = Cli::parse();
    if let Err(e) = doit(args) {
        eprintln!("{}", e.detailed_error().red());
        std::process::exit(1);
    }
}
