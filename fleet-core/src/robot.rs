//! The per-robot node: runs the receding-horizon tracking loop and replies
//! to the manager's tick protocol.
//!
//! State and message dispatch are grounded on the simulator's `Node`, which
//! composes swappable collaborators (controller, navigator, physics) behind
//! `SharedRwLock`s and drives them from a message loop; the fleet version is
//! single-threaded per robot and owns its collaborators outright instead of
//! sharing them, since nothing else needs concurrent access to one robot's
//! planner or solver.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use log::{debug, warn};

use crate::channel::Endpoint;
use crate::errors::{FleetError, FleetErrorTypes, FleetResult};
use crate::logger::{is_enabled, InternalLog};
use crate::messages::{
    ActionVector, Message, MessageBody, RobotId, RobotState, SimulationParams, SimulationResult,
    StateVector,
};
use crate::mpc::{MpcInput, MpcSolver};
use crate::peer_assembler::{pack_peers, PeerLayout};
use crate::planner::Planner;

/// Tracks where a robot is within one tick's compute/apply handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RobotPhase {
    Ready,
    Computed,
    Applied,
}

pub struct Robot {
    id: RobotId,
    state: StateVector,
    phase: RobotPhase,
    next_action: Option<ActionVector>,
    is_idle: bool,
    planner: Box<dyn Planner>,
    mpc: Box<dyn MpcSolver>,
    endpoint: Endpoint<Message>,
    peer_layout: PeerLayout,
    ts: f32,
    subscribed: bool,
    /// Shared with any [`RobotHandle`] spawned by [`Robot::start`], so
    /// `stop()` can cancel the message loop from outside the thread that
    /// owns the `Robot` itself — plain `bool` wouldn't be visible there.
    running: Arc<AtomicBool>,
    current_time: f32,
    current_kt: u64,
}

impl Robot {
    pub fn new(
        id: RobotId,
        initial_state: StateVector,
        planner: Box<dyn Planner>,
        mpc: Box<dyn MpcSolver>,
        endpoint: Endpoint<Message>,
        peer_layout: PeerLayout,
        ts: f32,
    ) -> Self {
        Self {
            id,
            state: initial_state,
            phase: RobotPhase::Ready,
            next_action: None,
            is_idle: false,
            planner,
            mpc,
            endpoint,
            peer_layout,
            ts,
            subscribed: false,
            running: Arc::new(AtomicBool::new(false)),
            current_time: 0.0,
            current_kt: 0,
        }
    }

    pub fn id(&self) -> RobotId {
        self.id
    }

    /// Whether this robot's message loop is currently running (§4.3's
    /// `running` state variable).
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Spawns this robot's message-loop thread (§4.3's `start()`), repeatedly
    /// calling [`Robot::run_one_message`] until the returned [`RobotHandle`]
    /// is stopped or the manager's end of the channel closes. Consumes the
    /// robot, since from this point only the spawned thread touches it.
    pub fn start(mut self) -> FleetResult<RobotHandle> {
        let id = self.id;
        self.running.store(true, Ordering::SeqCst);
        let running = self.running.clone();
        let join = std::thread::Builder::new()
            .name(format!("robot-{id}"))
            .spawn(move || {
                while running.load(Ordering::SeqCst) {
                    match self.run_one_message() {
                        Ok(true) => continue,
                        Ok(false) => break,
                        Err(e) => {
                            warn!("robot {id} message loop aborted: {}", e.detailed_error());
                            break;
                        }
                    }
                }
            })
            .map_err(|e| {
                FleetError::new(
                    FleetErrorTypes::LifecycleError,
                    format!("could not spawn robot {id}'s message-loop thread: {e}"),
                )
            })?;
        Ok(RobotHandle {
            id,
            running,
            join: Some(join),
        })
    }

    pub fn set_state(&mut self, state: StateVector) {
        self.state = state;
    }

    pub fn load_schedule(
        &mut self,
        coords: Vec<(f32, f32)>,
        times: Vec<f32>,
        nominal_speed: f32,
    ) -> FleetResult<()> {
        self.planner.load_path(coords, times, nominal_speed)
    }

    /// Marks the robot subscribed. Fails if already subscribed. Registration
    /// itself happens synchronously through [`crate::manager::RobotManager::register`]
    /// before the channel endpoint this robot holds even exists, so there is
    /// no `REGISTRATION` to send here — this only tracks the robot's own
    /// lifecycle state.
    pub fn subscribe(&mut self) -> FleetResult<()> {
        if self.subscribed {
            return Err(FleetError::new(
                FleetErrorTypes::LifecycleError,
                format!("robot {} is already subscribed", self.id),
            ));
        }
        self.subscribed = true;
        Ok(())
    }

    /// Marks the robot unsubscribed. Fails if not subscribed. Mirrors
    /// [`Robot::subscribe`]: deregistration happens through
    /// [`crate::manager::RobotManager::unregister`], not over the channel.
    pub fn unsubscribe(&mut self) -> FleetResult<()> {
        if !self.subscribed {
            return Err(FleetError::new(
                FleetErrorTypes::LifecycleError,
                format!("robot {} was never subscribed", self.id),
            ));
        }
        self.subscribed = false;
        Ok(())
    }

    /// Blocks waiting for the next manager message (soft timeout, so the
    /// loop can notice a closed channel on shutdown) and dispatches it.
    /// Returns `Ok(false)` once the channel has closed.
    pub fn run_one_message(&mut self) -> FleetResult<bool> {
        let message = match self.endpoint.recv_timeout(Duration::from_millis(100)) {
            Ok(m) => m,
            Err(std::sync::mpsc::RecvTimeoutError::Timeout) => return Ok(true),
            Err(std::sync::mpsc::RecvTimeoutError::Disconnected) => return Ok(false),
        };

        let kt = message.kt;
        match message.body {
            MessageBody::ComputeRequest(params) => self.handle_compute_request(params)?,
            MessageBody::AllStatesUpdate(cache) => self.handle_all_states_update(kt, cache)?,
            other => {
                warn!(
                    "robot {} received unexpected message kind {:?} from manager",
                    self.id, other
                );
            }
        }
        Ok(true)
    }

    fn handle_compute_request(&mut self, params: SimulationParams) -> FleetResult<()> {
        self.current_time = params.current_time;
        self.current_kt = params.kt;
        let traj = match self
            .planner
            .get_local_ref(params.current_time, &self.state, self.peer_layout.n_hor)
        {
            Ok(t) => t,
            Err(e) => {
                warn!("robot {} planner failed: {}", self.id, e.detailed_error());
                self.next_action = None;
                self.is_idle = true;
                return self.reply_step_complete_on_failure(params.kt, params.current_time);
            }
        };

        let peers = pack_peers(self.id, &params.peer_states, self.peer_layout);
        if is_enabled(InternalLog::PeerPacking) {
            debug!(
                "robot {} packed {} peer(s) into a {}-entry vector",
                self.id,
                params.peer_states.len().min(self.peer_layout.m_other),
                peers.layout().len()
            );
        }
        let output = match std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            self.mpc.step(MpcInput {
                current_state: self.state,
                ref_states: &traj.ref_states,
                static_obstacles: &params.static_obstacles,
                other_robot_states: &peers,
                ts: self.ts,
            })
        })) {
            Ok(output) => output,
            Err(_) => {
                warn!("robot {} solver panicked", self.id);
                self.next_action = None;
                self.is_idle = true;
                return self.reply_step_complete_on_failure(params.kt, params.current_time);
            }
        };

        if output.actions.is_empty() || output.pred_states.len() != self.peer_layout.n_hor {
            warn!(
                "robot {} solver returned {} actions and {} predicted states (expected N={}), marking idle for this tick",
                self.id,
                output.actions.len(),
                output.pred_states.len(),
                self.peer_layout.n_hor
            );
            self.next_action = None;
            self.is_idle = true;
            return self.reply_state_update_on_failure(params.kt, params.current_time);
        }

        self.next_action = output.actions.last().copied();
        self.phase = RobotPhase::Computed;

        let result = SimulationResult {
            robot_id: self.id,
            state: self.state,
            pred_states: output.pred_states,
            debug_info: output.debug_info,
            current_refs: output.current_refs,
            actions: output.actions,
            traj_result: traj,
            timestamp: params.current_time,
        };
        self.endpoint.outbound.send(Message::new(
            self.id,
            params.kt,
            MessageBody::StateUpdate(result),
            params.current_time,
        ))
    }

    /// A failed tick (planner error, solver panic, or malformed solver
    /// output) skips `STATE_UPDATE` entirely and replies only with
    /// `STEP_COMPLETE { is_idle: true }`, matching spec §4.3's failure
    /// semantics.
    fn reply_step_complete_on_failure(&self, kt: u64, timestamp: f32) -> FleetResult<()> {
        self.endpoint.outbound.send(Message::new(
            self.id,
            kt,
            MessageBody::StepComplete { is_idle: true },
            timestamp,
        ))
    }

    fn handle_all_states_update(&mut self, kt: u64, cache: Vec<(RobotId, RobotState)>) -> FleetResult<()> {
        let _ = &cache; // the cache itself is only useful to the *next* compute request
        match self.next_action.take() {
            Some(action) => {
                self.state = crate::motion::step(&self.state, &action, self.ts);
                // Recomputed fresh each tick, not OR-ed with the previous
                // value: a transient solver failure earlier must not pin
                // this robot idle forever afterward.
                self.is_idle = self.planner.is_complete(self.current_time);
                self.phase = RobotPhase::Applied;
            }
            None => {
                // Out-of-order ALL_STATES_UPDATE: a protocol violation that must
                // not stall the tick barrier.
                if is_enabled(InternalLog::Protocol) {
                    debug!(
                        "robot {} received ALL_STATES_UPDATE with no pending action",
                        self.id
                    );
                }
                self.is_idle = true;
            }
        }

        let result = self.endpoint.outbound.send(Message::new(
            self.id,
            kt,
            MessageBody::StepComplete { is_idle: self.is_idle },
            0.0,
        ));
        self.phase = RobotPhase::Ready;
        result
    }
}

/// Owns a started [`Robot`]'s message-loop thread. `stop()` (§5: "cancels
/// its message loop; an in-flight MPC computation runs to completion
/// (non-preemptive) but its result is discarded") flips the shared running
/// flag and blocks until the thread notices and exits, rather than
/// interrupting a computation already underway inside `run_one_message`.
pub struct RobotHandle {
    id: RobotId,
    running: Arc<AtomicBool>,
    join: Option<JoinHandle<()>>,
}

impl RobotHandle {
    pub fn id(&self) -> RobotId {
        self.id
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Cancels the robot's message loop and joins its thread.
    pub fn stop(mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(join) = self.join.take() {
            let _ = join.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::{channel_pair, NetworkDelayConfig};
    use crate::mpc::UnicycleTrackingMpc;
    use crate::planner::LinearPlanner;

    fn layout() -> PeerLayout {
        PeerLayout { ns: 3, n_hor: 5, m_other: 2 }
    }

    #[test]
    fn compute_request_without_peers_sends_state_update() {
        let (manager_side, robot_side) = channel_pair(
            NetworkDelayConfig::default(),
            NetworkDelayConfig::default(),
            1,
        )
        .unwrap();

        let mut planner = LinearPlanner::new();
        planner.load_path(vec![(0.0, 0.0), (5.0, 0.0)], Vec::new(), 1.0).unwrap();

        let mut robot = Robot::new(
            1,
            StateVector::zeros(),
            Box::new(planner),
            Box::new(UnicycleTrackingMpc::new(1.0, 1.5, 5)),
            robot_side,
            layout(),
            0.2,
        );

        manager_side
            .outbound
            .send(Message::new(
                -1,
                0,
                MessageBody::ComputeRequest(SimulationParams {
                    kt: 0,
                    ts: 0.2,
                    current_time: 0.0,
                    static_obstacles: Vec::new(),
                    peer_states: Vec::new(),
                }),
                0.0,
            ))
            .unwrap();

        assert!(robot.run_one_message().unwrap());
        let reply = manager_side.inbound.recv_timeout(Duration::from_secs(1)).unwrap();
        assert!(matches!(reply.body, MessageBody::StateUpdate(_)));
        assert_eq!(reply.kt, 0);
        assert_eq!(robot.phase, RobotPhase::Computed);
    }

    #[test]
    fn all_states_update_without_pending_action_is_idle_noop() {
        let (manager_side, robot_side) = channel_pair(
            NetworkDelayConfig::default(),
            NetworkDelayConfig::default(),
            2,
        )
        .unwrap();
        let mut robot = Robot::new(
            1,
            StateVector::zeros(),
            Box::new(LinearPlanner::new()),
            Box::new(UnicycleTrackingMpc::new(1.0, 1.5, 5)),
            robot_side,
            layout(),
            0.2,
        );

        manager_side
            .outbound
            .send(Message::new(-1, 0, MessageBody::AllStatesUpdate(Vec::new()), 0.0))
            .unwrap();

        assert!(robot.run_one_message().unwrap());
        let reply = manager_side.inbound.recv_timeout(Duration::from_secs(1)).unwrap();
        match reply.body {
            MessageBody::StepComplete { is_idle } => assert!(is_idle),
            other => panic!("expected StepComplete, got {:?}", other),
        }
    }

    /// A solver that always hands back an empty action list, to exercise the
    /// malformed-output branch of solver-failure handling.
    struct BrokenMpc;

    impl crate::mpc::MpcSolver for BrokenMpc {
        fn step(&mut self, _input: MpcInput<'_>) -> crate::mpc::MpcOutput {
            crate::mpc::MpcOutput {
                actions: Vec::new(),
                pred_states: Vec::new(),
                current_refs: Vec::new(),
                debug_info: crate::messages::DebugInfo::default(),
            }
        }
    }

    #[test]
    fn malformed_solver_output_replies_step_complete_idle_instead_of_aborting() {
        let (manager_side, robot_side) = channel_pair(
            NetworkDelayConfig::default(),
            NetworkDelayConfig::default(),
            3,
        )
        .unwrap();

        let mut planner = LinearPlanner::new();
        planner.load_path(vec![(0.0, 0.0), (5.0, 0.0)], Vec::new(), 1.0).unwrap();

        let mut robot = Robot::new(
            1,
            StateVector::zeros(),
            Box::new(planner),
            Box::new(BrokenMpc),
            robot_side,
            layout(),
            0.2,
        );

        manager_side
            .outbound
            .send(Message::new(
                -1,
                0,
                MessageBody::ComputeRequest(SimulationParams {
                    kt: 0,
                    ts: 0.2,
                    current_time: 0.0,
                    static_obstacles: Vec::new(),
                    peer_states: Vec::new(),
                }),
                0.0,
            ))
            .unwrap();

        // The robot's message loop must survive a solver failure rather than
        // propagating an error that would kill its thread.
        assert!(robot.run_one_message().unwrap());
        let reply = manager_side.inbound.recv_timeout(Duration::from_secs(1)).unwrap();
        match reply.body {
            MessageBody::StepComplete { is_idle } => assert!(is_idle),
            other => panic!("expected StepComplete, got {:?}", other),
        }
        assert!(robot.next_action.is_none());
    }

    #[test]
    fn start_runs_messages_until_stop_joins_cleanly() {
        let (manager_side, robot_side) = channel_pair(
            NetworkDelayConfig::default(),
            NetworkDelayConfig::default(),
            4,
        )
        .unwrap();

        let mut planner = LinearPlanner::new();
        planner.load_path(vec![(0.0, 0.0), (5.0, 0.0)], Vec::new(), 1.0).unwrap();

        let robot = Robot::new(
            1,
            StateVector::zeros(),
            Box::new(planner),
            Box::new(UnicycleTrackingMpc::new(1.0, 1.5, 5)),
            robot_side,
            layout(),
            0.2,
        );

        let handle = robot.start().unwrap();
        assert!(handle.is_running());

        manager_side
            .outbound
            .send(Message::new(
                -1,
                0,
                MessageBody::ComputeRequest(SimulationParams {
                    kt: 0,
                    ts: 0.2,
                    current_time: 0.0,
                    static_obstacles: Vec::new(),
                    peer_states: Vec::new(),
                }),
                0.0,
            ))
            .unwrap();
        let reply = manager_side.inbound.recv_timeout(Duration::from_secs(1)).unwrap();
        assert!(matches!(reply.body, MessageBody::StateUpdate(_)));

        handle.stop();
    }
}
