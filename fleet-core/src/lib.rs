/*!
Distributed multi-robot fleet coordination over a tick-synchronous
Manager/Robot protocol.

Each tick, the [`manager::RobotManager`] fans a `COMPUTE_REQUEST` out to every
registered [`robot::Robot`], which runs one receding-horizon tracking step
against a local reference trajectory (from a [`planner::Planner`]) and its
peers' cached states (packed by [`peer_assembler`]), then replies with its
control action through a simulated, delay-bearing [`channel`]. Once every
robot has reported `STEP_COMPLETE`, the manager releases the tick barrier and
the [`orchestrator::Orchestrator`] advances to the next tick.

```no_run
use std::time::Duration;
use fleet_core::channel::{channel_pair, NetworkDelayConfig};
use fleet_core::manager::RobotManager;
use fleet_core::messages::StateVector;
use fleet_core::mpc::UnicycleTrackingMpc;
use fleet_core::orchestrator::{NullObserver, Orchestrator};
use fleet_core::planner::{LinearPlanner, Planner};
use fleet_core::robot::Robot;
use fleet_core::peer_assembler::PeerLayout;

let mut manager = RobotManager::new(Duration::from_secs(1));
let layout = PeerLayout { ns: 3, n_hor: 20, m_other: 4 };

let (manager_side, robot_side) = channel_pair(
    NetworkDelayConfig::default(),
    NetworkDelayConfig::default(),
    0,
).unwrap();
manager.register(1, manager_side).unwrap();

let mut planner = LinearPlanner::new();
planner.load_path(vec![(0.0, 0.0), (10.0, 0.0)], Vec::new(), 1.0).unwrap();
let mut robot = Robot::new(
    1,
    StateVector::zeros(),
    Box::new(planner),
    Box::new(UnicycleTrackingMpc::new(1.0, 1.5, 20)),
    robot_side,
    layout,
    0.2,
);
std::thread::spawn(move || while robot.run_one_message().unwrap_or(false) {});

let orchestrator = Orchestrator::new(0.2, 200);
orchestrator.run(&mut manager, |_kt| Vec::new(), &mut NullObserver).unwrap();
```
*/

pub mod channel;
pub mod config;
pub mod errors;
pub mod logger;
pub mod manager;
pub mod messages;
pub mod motion;
pub mod mpc;
pub mod orchestrator;
pub mod peer_assembler;
pub mod planner;
pub mod robot;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
