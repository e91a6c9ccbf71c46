//! Wire types exchanged between a [`crate::manager::RobotManager`] and its
//! registered [`crate::robot::Robot`]s.
//!
//! Mirrors the simulator's own split between a `kind()` discriminant usable
//! for routing/logging and the full payload carried alongside it, except the
//! fleet has only one channel per robot instead of a keyed pub/sub broker, so
//! there is no separate `ConditionArgType`.

use fleet_macros::EnumToString;
use nalgebra::SVector;

/// Robot state dimension: (x, y, theta).
pub const NS: usize = 3;
/// Control action dimension: (linear velocity, angular velocity).
pub const NA: usize = 2;

pub type StateVector = SVector<f32, NS>;
pub type ActionVector = SVector<f32, NA>;

pub type RobotId = i64;
/// Sender id used by the manager itself; never a valid [`RobotId`].
pub const MANAGER_ID: RobotId = -1;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Obstacle {
    pub center: nalgebra::Vector2<f32>,
    pub radius: f32,
}

/// The state of one robot as last observed by the manager, plus its most
/// recent short-horizon prediction.
#[derive(Debug, Clone)]
pub struct RobotState {
    pub position: StateVector,
    pub predicted_states: Option<Vec<StateVector>>,
    pub ref_traj: Vec<StateVector>,
    pub ref_speed: f32,
    pub timestamp: f32,
    pub is_idle: bool,
}

impl RobotState {
    pub fn new(position: StateVector) -> Self {
        Self {
            position,
            predicted_states: None,
            ref_traj: Vec::new(),
            ref_speed: 0.0,
            timestamp: 0.0,
            is_idle: false,
        }
    }
}

/// Per-tick input handed to a robot's control step.
#[derive(Debug, Clone)]
pub struct SimulationParams {
    pub kt: u64,
    pub ts: f32,
    pub current_time: f32,
    pub static_obstacles: Vec<Obstacle>,
    pub peer_states: Vec<(RobotId, RobotState)>,
}

/// Output of the local reference-trajectory planner for one tick.
#[derive(Debug, Clone)]
pub struct TrajectoryResult {
    pub ref_states: Vec<StateVector>,
    pub ref_speed: f32,
    pub is_complete: bool,
}

/// Debug/introspection payload returned alongside an [`crate::mpc::MpcSolver`] step.
#[derive(Debug, Clone, Default)]
pub struct DebugInfo {
    pub cost: f32,
}

/// What a robot reports back in response to a `COMPUTE_REQUEST`.
#[derive(Debug, Clone)]
pub struct SimulationResult {
    pub robot_id: RobotId,
    pub state: StateVector,
    pub pred_states: Vec<StateVector>,
    pub debug_info: DebugInfo,
    pub current_refs: Vec<StateVector>,
    pub actions: Vec<ActionVector>,
    pub traj_result: TrajectoryResult,
    pub timestamp: f32,
}

/// Discriminant-only view of a [`Message`], used for logging without cloning
/// the full payload. `Registration`/`Unregistration` round out the protocol's
/// full kind vocabulary but are never actually sent: the channel a
/// `REGISTRATION` would travel over doesn't exist until
/// [`crate::manager::RobotManager::register`] creates it, so that event is
/// realized by the direct call instead of a wire message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumToString)]
pub enum MessageKind {
    ComputeRequest,
    StateUpdate,
    AllStatesUpdate,
    StepComplete,
    Registration,
    Unregistration,
}

#[derive(Debug, Clone)]
pub enum MessageBody {
    ComputeRequest(SimulationParams),
    StateUpdate(SimulationResult),
    AllStatesUpdate(Vec<(RobotId, RobotState)>),
    StepComplete { is_idle: bool },
    Registration,
    Unregistration,
}

/// One message on a Manager<->Robot channel. `kt` tags the tick a message
/// belongs to so a reply that arrives after its tick's barrier has already
/// closed — e.g. a `STATE_UPDATE` from a robot that missed `T_tick` — can be
/// told apart from a reply to the tick currently being awaited, instead of
/// being folded into it.
#[derive(Debug, Clone)]
pub struct Message {
    pub sender_id: RobotId,
    pub kt: u64,
    pub body: MessageBody,
    pub timestamp: f32,
}

impl Message {
    pub fn new(sender_id: RobotId, kt: u64, body: MessageBody, timestamp: f32) -> Self {
        Self {
            sender_id,
            kt,
            body,
            timestamp,
        }
    }

    pub fn kind(&self) -> MessageKind {
        match &self.body {
            MessageBody::ComputeRequest(_) => MessageKind::ComputeRequest,
            MessageBody::StateUpdate(_) => MessageKind::StateUpdate,
            MessageBody::AllStatesUpdate(_) => MessageKind::AllStatesUpdate,
            MessageBody::StepComplete { .. } => MessageKind::StepComplete,
            MessageBody::Registration => MessageKind::Registration,
            MessageBody::Unregistration => MessageKind::Unregistration,
        }
    }
}
