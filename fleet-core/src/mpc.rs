//! The MPC solver boundary: an external collaborator treated as a pure
//! function with a strict numeric contract.
//!
//! Grounded on the `controllers` module's strategy-trait shape: one trait,
//! one built-in implementation (`UnicycleTrackingMpc`) that satisfies the
//! contract without being a real constrained optimiser, exactly the role the
//! simulator's `pid` controller plays relative to `External`/`Python`
//! variants that hand off to a real process.

use crate::messages::{ActionVector, DebugInfo, Obstacle, StateVector};
use crate::peer_assembler::PeerStateVector;

pub struct MpcInput<'a> {
    pub current_state: StateVector,
    pub ref_states: &'a [StateVector],
    pub static_obstacles: &'a [Obstacle],
    pub other_robot_states: &'a PeerStateVector,
    pub ts: f32,
}

pub struct MpcOutput {
    pub actions: Vec<ActionVector>,
    pub pred_states: Vec<StateVector>,
    pub current_refs: Vec<StateVector>,
    pub debug_info: DebugInfo,
}

/// Exactly one call per tick per robot. Implementations must return
/// `pred_states` with `N` rows (the configured horizon) and a non-empty
/// `actions` sequence.
pub trait MpcSolver: Send + Sync {
    fn step(&mut self, input: MpcInput<'_>) -> MpcOutput;
}

/// A receding-horizon proportional pursuit controller: steers toward the
/// lookahead point on the reference trajectory rather than solving a
/// constrained optimisation problem. Satisfies [`MpcSolver`]'s typed
/// contract so the fleet can be exercised end-to-end without a real MPC
/// backend; explicitly not an optimiser.
pub struct UnicycleTrackingMpc {
    lin_vel_max: f32,
    ang_vel_max: f32,
    n_hor: usize,
}

impl UnicycleTrackingMpc {
    pub fn new(lin_vel_max: f32, ang_vel_max: f32, n_hor: usize) -> Self {
        Self {
            lin_vel_max,
            ang_vel_max,
            n_hor,
        }
    }

    fn pursue(&self, state: &StateVector, target: &StateVector) -> ActionVector {
        let dx = target.x - state.x;
        let dy = target.y - state.y;
        let distance = (dx * dx + dy * dy).sqrt();
        let heading_to_target = dy.atan2(dx);
        let heading_error = wrap_to_pi(heading_to_target - state.z);

        let v = (distance.min(self.lin_vel_max)) * heading_error.cos().max(0.0);
        let omega = (2.0 * heading_error).clamp(-self.ang_vel_max, self.ang_vel_max);
        ActionVector::new(v.clamp(-self.lin_vel_max, self.lin_vel_max), omega)
    }
}

fn wrap_to_pi(angle: f32) -> f32 {
    let two_pi = std::f32::consts::TAU;
    let mut a = angle % two_pi;
    if a > std::f32::consts::PI {
        a -= two_pi;
    } else if a < -std::f32::consts::PI {
        a += two_pi;
    }
    a
}

impl MpcSolver for UnicycleTrackingMpc {
    fn step(&mut self, input: MpcInput<'_>) -> MpcOutput {
        let n_hor = self.n_hor.min(input.ref_states.len()).max(1);
        let mut state = input.current_state;
        let mut actions = Vec::with_capacity(n_hor);
        let mut pred_states = Vec::with_capacity(n_hor);
        let mut cost = 0.0f32;

        for target in input.ref_states.iter().take(n_hor) {
            let action = self.pursue(&state, target);
            state = crate::motion::step(&state, &action, input.ts);
            cost += (state.x - target.x).powi(2) + (state.y - target.y).powi(2);
            actions.push(action);
            pred_states.push(state);
        }

        while pred_states.len() < n_hor {
            pred_states.push(state);
            actions.push(ActionVector::zeros());
        }

        MpcOutput {
            actions,
            pred_states,
            current_refs: input.ref_states.to_vec(),
            debug_info: DebugInfo { cost },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::peer_assembler::{pack_peers, PeerLayout};

    #[test]
    fn tracks_toward_goal_ahead() {
        let mut mpc = UnicycleTrackingMpc::new(1.0, 1.5, 5);
        let refs = vec![StateVector::new(1.0, 0.0, 0.0); 5];
        let peers = pack_peers(0, &[], PeerLayout { ns: 3, n_hor: 5, m_other: 2 });
        let input = MpcInput {
            current_state: StateVector::new(0.0, 0.0, 0.0),
            ref_states: &refs,
            static_obstacles: &[],
            other_robot_states: &peers,
            ts: 0.2,
        };
        let out = mpc.step(input);
        assert_eq!(out.actions.len(), 5);
        assert_eq!(out.pred_states.len(), 5);
        assert!(out.pred_states.last().unwrap().x > 0.0);
    }
}
