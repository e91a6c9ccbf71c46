//! End-to-end tick-loop scenarios, exercised with the built-in
//! [`LinearPlanner`] and [`UnicycleTrackingMpc`] reference collaborators.

use std::time::Duration;

use fleet_core::channel::{channel_pair, NetworkDelayConfig};
use fleet_core::manager::RobotManager;
use fleet_core::messages::{RobotId, StateVector};
use fleet_core::mpc::{MpcInput, MpcOutput, MpcSolver, UnicycleTrackingMpc};
use fleet_core::peer_assembler::PeerLayout;
use fleet_core::planner::LinearPlanner;
use fleet_core::robot::Robot;

const LAYOUT: PeerLayout = PeerLayout { ns: 3, n_hor: 15, m_other: 4 };
const TS: f32 = 0.2;

fn spawn(
    id: RobotId,
    manager: &mut RobotManager,
    start: (f32, f32, f32),
    goal: (f32, f32),
) {
    let (manager_side, robot_side) =
        channel_pair(NetworkDelayConfig::default(), NetworkDelayConfig::default(), id as u64).unwrap();
    manager.register(id, manager_side).unwrap();

    let mut planner = LinearPlanner::new();
    planner.load_path(vec![(start.0, start.1), goal], Vec::new(), 1.0).unwrap();

    let mut robot = Robot::new(
        id,
        StateVector::new(start.0, start.1, start.2),
        Box::new(planner),
        Box::new(UnicycleTrackingMpc::new(1.0, 1.5, LAYOUT.n_hor)),
        robot_side,
        LAYOUT,
        TS,
    );
    std::thread::spawn(move || loop {
        match robot.run_one_message() {
            Ok(true) => continue,
            _ => break,
        }
    });
}

/// Two robots running parallel courses must both complete and never come
/// closer than twice the configured vehicle width. The reference solver has
/// no collision-avoidance term of its own, so the paths are kept laterally
/// separated rather than head-on.
#[test]
fn two_robot_rendezvous_completes_without_collision() {
    let vehicle_width = 0.3f32;
    let mut manager = RobotManager::new(Duration::from_secs(1));
    spawn(1, &mut manager, (0.0, 0.0, 0.0), (10.0, 0.0));
    spawn(2, &mut manager, (10.0, 2.0, std::f32::consts::PI), (0.0, 2.0));

    let mut min_distance = f32::INFINITY;
    let mut completed = false;
    for kt in 0..40u64 {
        let (results, all_complete) = manager.tick(kt, TS, Vec::new()).unwrap();
        if results.len() == 2 {
            let a = results[0].state;
            let b = results[1].state;
            let d = ((a.x - b.x).powi(2) + (a.y - b.y).powi(2)).sqrt();
            min_distance = min_distance.min(d);
        }
        if all_complete {
            completed = true;
            break;
        }
    }

    assert!(completed, "fleet did not complete within the tick budget");
    assert!(
        min_distance > 2.0 * vehicle_width,
        "robots came within {min_distance}, closer than the {} safety margin",
        2.0 * vehicle_width
    );
}

/// A lone robot with no peers should see an all-sentinel peer vector and
/// still reach its goal.
#[test]
fn single_robot_sees_sentinel_peers_and_completes() {
    let mut manager = RobotManager::new(Duration::from_secs(1));
    spawn(1, &mut manager, (0.0, 0.0, 0.0), (5.0, 0.0));

    let mut final_x = 0.0;
    let mut completed = false;
    for kt in 0..60u64 {
        let (results, all_complete) = manager.tick(kt, TS, Vec::new()).unwrap();
        if let Some(r) = results.first() {
            final_x = r.state.x;
        }
        if all_complete {
            completed = true;
            break;
        }
    }

    assert!(completed);
    assert!((4.9..=5.1).contains(&final_x), "final x {final_x} outside tolerance");
}

/// Registering a robot mid-run must not disturb the robots already ticking.
#[test]
fn late_registration_is_accepted_without_error() {
    let mut manager = RobotManager::new(Duration::from_secs(1));
    spawn(1, &mut manager, (0.0, 0.0, 0.0), (8.0, 0.0));
    spawn(2, &mut manager, (0.0, 2.0, 0.0), (8.0, 2.0));

    for kt in 0..5u64 {
        let (results, _) = manager.tick(kt, TS, Vec::new()).unwrap();
        assert_eq!(results.len(), 2, "expected 2 results before late registration at tick {kt}");
    }

    spawn(3, &mut manager, (0.0, 4.0, 0.0), (8.0, 4.0));

    for kt in 5..10u64 {
        let (results, _) = manager.tick(kt, TS, Vec::new()).unwrap();
        assert_eq!(results.len(), 3, "expected 3 results after late registration at tick {kt}");
    }
}

/// An MPC stub that sleeps well past `T_tick` on its very first invocation,
/// then answers at normal speed — the robot stays alive and keeps replying,
/// just late for one tick.
struct SlowFirstCallMpc {
    inner: UnicycleTrackingMpc,
    sleep: Duration,
    first_call: bool,
}

impl SlowFirstCallMpc {
    fn new(inner: UnicycleTrackingMpc, sleep: Duration) -> Self {
        Self { inner, sleep, first_call: true }
    }
}

impl MpcSolver for SlowFirstCallMpc {
    fn step(&mut self, input: MpcInput<'_>) -> MpcOutput {
        if self.first_call {
            self.first_call = false;
            std::thread::sleep(self.sleep);
        }
        self.inner.step(input)
    }
}

/// A barrier timeout must not wedge the fleet, and a late reply from the
/// robot that missed the deadline must not be folded into a later tick's
/// results: one robot's MPC is stubbed to sleep past `T_tick` (scenario from
/// the liveness section), while it stays alive and keeps replying.
#[test]
fn barrier_timeout_excludes_slow_robot_without_cross_tick_contamination() {
    let tick_timeout = Duration::from_millis(30);
    let mut manager = RobotManager::new(tick_timeout);
    spawn(1, &mut manager, (0.0, 0.0, 0.0), (5.0, 0.0));

    let (slow_manager_side, slow_robot_side) =
        channel_pair(NetworkDelayConfig::default(), NetworkDelayConfig::default(), 99).unwrap();
    manager.register(2, slow_manager_side).unwrap();

    let mut planner = LinearPlanner::new();
    planner.load_path(vec![(0.0, 4.0), (5.0, 4.0)], Vec::new(), 1.0).unwrap();
    let mut slow_robot = Robot::new(
        2,
        StateVector::new(0.0, 4.0, 0.0),
        Box::new(planner),
        Box::new(SlowFirstCallMpc::new(
            UnicycleTrackingMpc::new(1.0, 1.5, LAYOUT.n_hor),
            Duration::from_millis(120),
        )),
        slow_robot_side,
        LAYOUT,
        TS,
    );
    std::thread::spawn(move || loop {
        match slow_robot.run_one_message() {
            Ok(true) => continue,
            _ => break,
        }
    });

    let (results_0, _) = manager.tick(0, TS, Vec::new()).unwrap();
    assert!(results_0.iter().all(|r| r.robot_id != 2), "robot still computing tick 0 must be absent from it");
    assert!(results_0.iter().any(|r| r.robot_id == 1), "live robot must report on time");

    for kt in 1..30u64 {
        let (results, _) = manager.tick(kt, TS, Vec::new()).unwrap();
        let expected_time = kt as f32 * TS;
        for r in &results {
            assert!(
                (r.timestamp - expected_time).abs() < 1e-4,
                "tick {kt}: robot {} reported a result timestamped {} (expected {expected_time}), \
                 a late reply from an earlier tick must have been folded in instead of dropped",
                r.robot_id, r.timestamp
            );
        }
        assert!(results.iter().any(|r| r.robot_id == 1), "live robot must keep ticking at tick {kt}");
    }
}
