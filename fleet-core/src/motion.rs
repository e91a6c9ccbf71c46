//! Pure unicycle kinematics: `(state, action, ts) -> next_state`.
//!
//! Adapted from the simulator's differential-drive `Unicycle::update_state`,
//! which integrates wheel speeds over `dt` via an SE(2) Lie-group
//! exponential rather than a first-order Euler step, so heading stays exact
//! over a full sampling period instead of drifting at high angular rates.
//! The fleet's MPC emits a direct `(v, omega)` command rather than wheel
//! speeds, so `translation`/`rotation` are taken straight from the action
//! instead of being derived from `wheel_distance`.
//!
//! Reference: Sola, J., Deray, J., & Atchuthan, D. (2018). A micro Lie theory
//! for state estimation in robotics. arXiv:1812.01537.

use nalgebra::SMatrix;

use crate::messages::{ActionVector, StateVector};

/// Advances `state = (x, y, theta)` by `ts` seconds under a constant
/// `action = (v, omega)` command.
pub fn step(state: &StateVector, action: &ActionVector, ts: f32) -> StateVector {
    let theta = state.z;
    let v = action.x;
    let omega = action.y;

    let translation = v * ts;
    let rotation = omega * ts;

    let lie_action =
        SMatrix::<f32, 3, 3>::new(0., -rotation, translation, rotation, 0., 0., 0., 0., 0.);

    let rot_mat = *nalgebra::Rotation2::new(theta).matrix();

    let mut se2_mat = SMatrix::<f32, 3, 3>::new(
        rot_mat[(0, 0)],
        rot_mat[(0, 1)],
        state.x,
        rot_mat[(1, 0)],
        rot_mat[(1, 1)],
        state.y,
        0.,
        0.,
        1.,
    );

    se2_mat *= lie_action.exp();

    let next_theta = se2_mat[(1, 0)].atan2(se2_mat[(0, 0)]);
    StateVector::new(se2_mat[(0, 2)], se2_mat[(1, 2)], next_theta)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_action_is_identity() {
        let s = StateVector::new(1.0, 2.0, 0.3);
        let a = ActionVector::new(0.0, 0.0);
        let next = step(&s, &a, 0.5);
        assert!((next - s).norm() < 1e-6);
    }

    #[test]
    fn pure_translation_moves_along_heading() {
        let s = StateVector::new(0.0, 0.0, 0.0);
        let a = ActionVector::new(2.0, 0.0);
        let next = step(&s, &a, 1.0);
        assert!((next.x - 2.0).abs() < 1e-5);
        assert!(next.y.abs() < 1e-5);
        assert!(next.z.abs() < 1e-5);
    }

    #[test]
    fn pure_rotation_keeps_position() {
        let s = StateVector::new(3.0, -1.0, 0.0);
        let a = ActionVector::new(0.0, std::f32::consts::FRAC_PI_2);
        let next = step(&s, &a, 1.0);
        assert!((next.x - 3.0).abs() < 1e-5);
        assert!((next.y - (-1.0)).abs() < 1e-5);
        assert!((next.z - std::f32::consts::FRAC_PI_2).abs() < 1e-5);
    }
}
