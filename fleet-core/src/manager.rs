//! The fleet coordinator: registry, tick barrier, state cache, broadcaster
//! and completion detector.
//!
//! Grounded on the Python prototype's message-passing `RobotManager`
//! (`robot_manager.py`): reset a per-tick counter, fan out `COMPUTE_REQUEST`,
//! poll until every registered robot has reported `STEP_COMPLETE` or the
//! tick deadline passes. The prototype polls via `asyncio.sleep(0.01)`
//! inside a single event loop task; this rewrite polls each robot's `mpsc`
//! receiver in a plain loop with the same cooperative-sleep cadence, since
//! there is no async runtime here.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use log::{debug, warn};

use crate::channel::Endpoint;
use crate::errors::{FleetError, FleetErrorTypes, FleetResult};
use crate::logger::{is_enabled, InternalLog};
use crate::messages::{Message, MessageBody, RobotId, RobotState, SimulationParams, SimulationResult, MANAGER_ID};

const POLL_INTERVAL: Duration = Duration::from_millis(5);

pub struct RobotManager {
    channels: HashMap<RobotId, Endpoint<Message>>,
    registration_order: Vec<RobotId>,
    cache: HashMap<RobotId, RobotState>,
    tick_timeout: Duration,
    running: bool,
}

impl RobotManager {
    pub fn new(tick_timeout: Duration) -> Self {
        Self {
            channels: HashMap::new(),
            registration_order: Vec::new(),
            cache: HashMap::new(),
            tick_timeout,
            running: false,
        }
    }

    /// Marks the manager running (§4.4's `start()`). Ticking doesn't itself
    /// require this — callers that drive `tick()` directly (as most of this
    /// crate's own tests do) are unaffected — but `fleet-cli` calls it before
    /// entering the orchestrator loop, matching the spec's lifecycle pair.
    pub fn start(&mut self) {
        self.running = true;
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Graceful shutdown (§4.4's `stop()`, §5: "drains channels, cancels
    /// robot tasks via UNREGISTRATION or channel close, and returns once all
    /// cooperative tasks have yielded"). Drains any messages still sitting in
    /// each registered robot's inbound queue, then unregisters it — dropping
    /// its `Endpoint` closes the underlying channel, which is the signal a
    /// robot's blocking `recv_timeout` observes to exit its own message loop.
    pub fn stop(&mut self) -> FleetResult<()> {
        self.running = false;
        for id in self.registration_order.clone() {
            if let Some(endpoint) = self.channels.get(&id) {
                while endpoint.try_recv().is_some() {}
            }
            self.unregister(id)?;
        }
        Ok(())
    }

    /// Handles an incoming `REGISTRATION`. Fails on a duplicate id.
    pub fn register(&mut self, robot_id: RobotId, endpoint: Endpoint<Message>) -> FleetResult<()> {
        if self.channels.contains_key(&robot_id) {
            return Err(FleetError::new(
                FleetErrorTypes::ProtocolViolation,
                format!("robot {robot_id} is already registered"),
            ));
        }
        self.channels.insert(robot_id, endpoint);
        self.registration_order.push(robot_id);
        self.cache
            .insert(robot_id, RobotState::new(crate::messages::StateVector::zeros()));
        if is_enabled(InternalLog::Registration) {
            debug!("robot {robot_id} registered (fleet size now {})", self.registration_order.len());
        }
        Ok(())
    }

    /// Handles an incoming `UNREGISTRATION`.
    pub fn unregister(&mut self, robot_id: RobotId) -> FleetResult<()> {
        if self.channels.remove(&robot_id).is_none() {
            return Err(FleetError::new(
                FleetErrorTypes::ProtocolViolation,
                format!("robot {robot_id} is not registered"),
            ));
        }
        self.registration_order.retain(|id| *id != robot_id);
        self.cache.remove(&robot_id);
        Ok(())
    }

    pub fn get_robot_state(&self, robot_id: RobotId) -> FleetResult<&RobotState> {
        self.cache.get(&robot_id).ok_or_else(|| {
            FleetError::new(
                FleetErrorTypes::ProtocolViolation,
                format!("robot {robot_id} does not exist"),
            )
        })
    }

    pub fn registered_robots(&self) -> &[RobotId] {
        &self.registration_order
    }

    /// The cached short-horizon prediction last reported by `robot_id`, if any.
    pub fn get_pred_states(
        &self,
        robot_id: RobotId,
    ) -> FleetResult<Option<&[crate::messages::StateVector]>> {
        self.get_robot_state(robot_id)
            .map(|state| state.predicted_states.as_deref())
    }

    /// Packs `ego_id`'s peers from the current cache through
    /// [`crate::peer_assembler::pack_peers`], in registration order.
    pub fn get_peer_states_for(
        &self,
        ego_id: RobotId,
        layout: crate::peer_assembler::PeerLayout,
    ) -> crate::peer_assembler::PeerStateVector {
        let peers: Vec<(RobotId, RobotState)> = self
            .registration_order
            .iter()
            .map(|id| (*id, self.cache[id].clone()))
            .collect();
        crate::peer_assembler::pack_peers(ego_id, &peers, layout)
    }

    /// Runs one tick: issues `COMPUTE_REQUEST` to every registered robot,
    /// waits for the tick barrier (every robot's `STEP_COMPLETE`, bounded by
    /// `tick_timeout`), and returns the results received this tick in
    /// registration order. Returns whether every robot reported its
    /// trajectory complete.
    pub fn tick(
        &mut self,
        kt: u64,
        ts: f32,
        static_obstacles: Vec<crate::messages::Obstacle>,
    ) -> FleetResult<(Vec<SimulationResult>, bool)> {
        let current_time = kt as f32 * ts;
        let peer_states: Vec<(RobotId, RobotState)> = self
            .registration_order
            .iter()
            .map(|id| (*id, self.cache[id].clone()))
            .collect();

        let params = SimulationParams {
            kt,
            ts,
            current_time,
            static_obstacles,
            peer_states,
        };

        for id in &self.registration_order {
            if let Some(endpoint) = self.channels.get(id) {
                endpoint.outbound.send(Message::new(
                    MANAGER_ID,
                    kt,
                    MessageBody::ComputeRequest(params.clone()),
                    current_time,
                ))?;
            }
        }

        let mut results: HashMap<RobotId, SimulationResult> = HashMap::new();
        let mut idle_flags: HashMap<RobotId, bool> = HashMap::new();
        let mut step_complete: std::collections::HashSet<RobotId> = std::collections::HashSet::new();

        let deadline = Instant::now() + self.tick_timeout;
        while step_complete.len() < self.registration_order.len() && Instant::now() < deadline {
            let mut any_progress = false;
            for id in self.registration_order.clone() {
                let Some(endpoint) = self.channels.get(&id) else { continue };
                while let Some(message) = endpoint.try_recv() {
                    any_progress = true;
                    if message.kt != kt {
                        // A reply to a tick whose barrier already closed (the
                        // robot missed T_tick and is only now catching up).
                        // Drop it rather than fold it into the tick currently
                        // being awaited.
                        if is_enabled(InternalLog::TickBarrier) {
                            debug!(
                                "manager dropped stale tick {} message from robot {id} while awaiting tick {kt}",
                                message.kt
                            );
                        }
                        continue;
                    }
                    match message.body {
                        MessageBody::StateUpdate(result) => {
                            self.cache.insert(
                                id,
                                RobotState {
                                    position: result.state,
                                    predicted_states: Some(result.pred_states.clone()),
                                    ref_traj: result.current_refs.clone(),
                                    ref_speed: result.traj_result.ref_speed,
                                    timestamp: result.timestamp,
                                    is_idle: false,
                                },
                            );
                            results.insert(id, result);
                            self.broadcast_all_states_update(kt)?;
                        }
                        MessageBody::StepComplete { is_idle } => {
                            step_complete.insert(id);
                            idle_flags.insert(id, is_idle);
                        }
                        other => {
                            warn!("manager received unexpected message kind {:?} from robot {id}", other);
                        }
                    }
                }
            }
            if !any_progress {
                std::thread::sleep(POLL_INTERVAL);
            }
        }

        if step_complete.len() < self.registration_order.len() && is_enabled(InternalLog::TickBarrier) {
            debug!(
                "tick {kt} timed out waiting for {} robot(s)",
                self.registration_order.len() - step_complete.len()
            );
        }

        // Fold each robot's reported STEP_COMPLETE.is_idle into its cached
        // state; a robot missing from idle_flags (it never reported this
        // tick, live or timed out) is declared idle per §4.4's liveness
        // clause rather than left stale from a prior tick.
        for id in &self.registration_order {
            let idle = idle_flags.get(id).copied().unwrap_or(true);
            if let Some(state) = self.cache.get_mut(id) {
                state.is_idle = idle;
            }
        }

        let all_complete = !results.is_empty()
            && self
                .registration_order
                .iter()
                .all(|id| results.get(id).map(|r| r.traj_result.is_complete).unwrap_or(false));

        let ordered_results = self
            .registration_order
            .iter()
            .filter_map(|id| results.remove(id))
            .collect();

        Ok((ordered_results, all_complete))
    }

    fn broadcast_all_states_update(&self, kt: u64) -> FleetResult<()> {
        let snapshot: Vec<(RobotId, RobotState)> = self
            .registration_order
            .iter()
            .map(|id| (*id, self.cache[id].clone()))
            .collect();
        for id in &self.registration_order {
            if let Some(endpoint) = self.channels.get(id) {
                endpoint.outbound.send(Message::new(
                    MANAGER_ID,
                    kt,
                    MessageBody::AllStatesUpdate(snapshot.clone()),
                    0.0,
                ))?;
            }
        }
        Ok(())
    }
}
