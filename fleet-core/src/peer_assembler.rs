//! Packs the manager's cached peer states into the fixed-width vector an
//! [`crate::mpc::MpcSolver`] was compiled against.
//!
//! Grounded on the Python prototype's `get_other_robot_states`: two
//! independent write cursors, one walking the current-position block and one
//! walking the predicted-state block, both advanced once per registered peer
//! in registration order. Keeping two cursors (rather than a single offset
//! recomputed per peer) is what makes the padding/truncation rules fall out
//! of the loop body instead of needing a second pass.

use crate::messages::{RobotId, RobotState, NS};

/// Sentinel written into any slot not filled by an actual peer.
pub const SENTINEL: f32 = -10.0;

/// Shape of the flattened peer vector an [`crate::mpc::MpcSolver`] expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PeerLayout {
    pub ns: usize,
    pub n_hor: usize,
    pub m_other: usize,
}

impl PeerLayout {
    pub fn len(&self) -> usize {
        self.ns * (self.n_hor + 1) * self.m_other
    }
}

/// A flat peer-state buffer tagged with the layout it was packed for, so a
/// mis-shaped buffer is a type error at the call site rather than a silent
/// out-of-bounds read inside the solver.
#[derive(Debug, Clone)]
pub struct PeerStateVector {
    layout: PeerLayout,
    data: Vec<f32>,
}

impl PeerStateVector {
    pub fn layout(&self) -> PeerLayout {
        self.layout
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }
}

/// Packs up to `layout.m_other` peers (excluding `ego_id`) from `peers`, in
/// the order they appear in `peers` (the manager's registration order).
///
/// Layout of the returned vector:
/// - `[0, ns*M)`: current position of each included peer, `ns` floats each.
/// - `[ns*M, ns*(N+1)*M)`: row-major flattening of each included peer's
///   `predicted_states`, `ns*N` floats each, truncated or pad-by-repeat-last.
///
/// Slots with no corresponding peer data are filled with [`SENTINEL`].
pub fn pack_peers(
    ego_id: RobotId,
    peers: &[(RobotId, RobotState)],
    layout: PeerLayout,
) -> PeerStateVector {
    let mut data = vec![SENTINEL; layout.len()];

    let pred_block_start = layout.ns * layout.m_other;
    let pred_len_per_peer = layout.ns * layout.n_hor;

    let mut idx = 0usize; // cursor into the current-position block
    let mut idx_pred = pred_block_start; // cursor into the predicted-state block
    let mut included = 0usize;

    for (peer_id, state) in peers {
        if *peer_id == ego_id {
            continue;
        }
        if included >= layout.m_other {
            break;
        }

        write_state(&mut data, idx, &state.position);
        idx += layout.ns;

        write_predicted_block(&mut data, idx_pred, pred_len_per_peer, layout.ns, state);
        idx_pred += pred_len_per_peer;

        included += 1;
    }

    PeerStateVector { layout, data }
}

fn write_state(data: &mut [f32], offset: usize, state: &crate::messages::StateVector) {
    for i in 0..NS {
        data[offset + i] = state[i];
    }
}

fn write_predicted_block(
    data: &mut [f32],
    offset: usize,
    block_len: usize,
    ns: usize,
    state: &RobotState,
) {
    let Some(pred) = &state.predicted_states else {
        return; // left as sentinel
    };
    if pred.is_empty() {
        return;
    }

    let mut flat: Vec<f32> = Vec::with_capacity(pred.len() * ns);
    for row in pred {
        for i in 0..ns.min(NS) {
            flat.push(row[i]);
        }
    }

    if flat.len() >= block_len {
        data[offset..offset + block_len].copy_from_slice(&flat[..block_len]);
    } else {
        data[offset..offset + flat.len()].copy_from_slice(&flat);
        // pad by repeating the last ns-length state
        let last_state_start = flat.len() - ns;
        let mut cursor = offset + flat.len();
        while cursor + ns <= offset + block_len {
            data[cursor..cursor + ns].copy_from_slice(&flat[last_state_start..last_state_start + ns]);
            cursor += ns;
        }
    }
}
