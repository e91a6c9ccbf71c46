//! Local reference-trajectory planning: turns a scheduled path into a
//! time-parameterised sequence of states a controller can track.
//!
//! Grounded on the `navigators` module's strategy-trait shape (a pluggable
//! `NavigatorConfig` with one built-in implementation); the GUI-facing
//! enum/schema dispatch that module layers on top is dropped since there is
//! no GUI here, leaving a plain trait object plus one concrete planner.

use crate::errors::{FleetError, FleetErrorTypes, FleetResult};
use crate::messages::{StateVector, TrajectoryResult};

/// External collaborator: converts a scheduled path into a reference
/// trajectory for the current simulated time. Treated as a pure function of
/// `(time, current_position)`; not part of the fleet's correctness surface.
pub trait Planner: Send + Sync {
    /// Loads a path of waypoints to be tracked. If `times` is non-empty it
    /// gives the schedule's own per-waypoint timestamp for each entry in
    /// `coords` (one-to-one, non-decreasing) and is used as-is; if empty,
    /// waypoints are linearly time-parameterised by segment distance over
    /// `nominal_speed` instead.
    fn load_path(
        &mut self,
        coords: Vec<(f32, f32)>,
        times: Vec<f32>,
        nominal_speed: f32,
    ) -> FleetResult<()>;

    /// Returns up to `n_hor` future reference states starting at `time`,
    /// the instantaneous reference speed, and whether the path is complete.
    fn get_local_ref(
        &self,
        time: f32,
        current_position: &StateVector,
        n_hor: usize,
    ) -> FleetResult<TrajectoryResult>;

    /// Whether the tracked path has been fully traversed.
    fn is_complete(&self, time: f32) -> bool;
}

/// Interpolates a polyline of (x, y) waypoints at constant `nominal_speed`,
/// padding short tails by repeating the final reference state and heading
/// each reference state toward the next waypoint.
pub struct LinearPlanner {
    waypoints: Vec<(f32, f32)>,
    cumulative_times: Vec<f32>,
    nominal_speed: f32,
}

impl LinearPlanner {
    pub fn new() -> Self {
        Self {
            waypoints: Vec::new(),
            cumulative_times: Vec::new(),
            nominal_speed: 1.0,
        }
    }

    fn total_duration(&self) -> f32 {
        self.cumulative_times.last().copied().unwrap_or(0.0)
    }

    fn state_at(&self, t: f32) -> StateVector {
        if self.waypoints.is_empty() {
            return StateVector::zeros();
        }
        if self.waypoints.len() == 1 || t <= 0.0 {
            let (x, y) = self.waypoints[0];
            return StateVector::new(x, y, 0.0);
        }
        let t = t.min(self.total_duration());

        let mut seg = self.cumulative_times.len() - 2;
        for i in 0..self.cumulative_times.len() - 1 {
            if t <= self.cumulative_times[i + 1] {
                seg = i;
                break;
            }
        }

        let (x0, y0) = self.waypoints[seg];
        let (x1, y1) = self.waypoints[seg + 1];
        let t0 = self.cumulative_times[seg];
        let t1 = self.cumulative_times[seg + 1];
        let alpha = if t1 > t0 { (t - t0) / (t1 - t0) } else { 1.0 };

        let x = x0 + alpha * (x1 - x0);
        let y = y0 + alpha * (y1 - y0);
        let theta = (y1 - y0).atan2(x1 - x0);
        StateVector::new(x, y, theta)
    }
}

impl Default for LinearPlanner {
    fn default() -> Self {
        Self::new()
    }
}

impl Planner for LinearPlanner {
    fn load_path(
        &mut self,
        coords: Vec<(f32, f32)>,
        times: Vec<f32>,
        nominal_speed: f32,
    ) -> FleetResult<()> {
        if coords.is_empty() {
            return Err(FleetError::new(
                FleetErrorTypes::ConfigError,
                "planner received an empty path".to_string(),
            ));
        }
        if nominal_speed <= 0.0 {
            return Err(FleetError::new(
                FleetErrorTypes::ConfigError,
                format!("nominal_speed must be positive, got {nominal_speed}"),
            ));
        }

        let cumulative_times = if times.is_empty() {
            let mut cumulative_times = vec![0.0f32];
            for pair in coords.windows(2) {
                let (x0, y0) = pair[0];
                let (x1, y1) = pair[1];
                let dist = ((x1 - x0).powi(2) + (y1 - y0).powi(2)).sqrt();
                let last = *cumulative_times.last().unwrap();
                cumulative_times.push(last + dist / nominal_speed);
            }
            cumulative_times
        } else {
            if times.len() != coords.len() {
                return Err(FleetError::new(
                    FleetErrorTypes::ConfigError,
                    format!(
                        "schedule has {} waypoint(s) but {} time(s)",
                        coords.len(),
                        times.len()
                    ),
                ));
            }
            if times.windows(2).any(|w| w[1] < w[0]) {
                return Err(FleetError::new(
                    FleetErrorTypes::ConfigError,
                    "schedule times must be non-decreasing".to_string(),
                ));
            }
            times
        };

        self.waypoints = coords;
        self.cumulative_times = cumulative_times;
        self.nominal_speed = nominal_speed;
        Ok(())
    }

    fn get_local_ref(
        &self,
        time: f32,
        _current_position: &StateVector,
        n_hor: usize,
    ) -> FleetResult<TrajectoryResult> {
        if self.waypoints.is_empty() {
            return Err(FleetError::new(
                FleetErrorTypes::ConfigError,
                "get_local_ref called before load_path".to_string(),
            ));
        }

        let dt = self.sample_dt();
        let ref_states = (0..n_hor).map(|step| self.state_at(time + step as f32 * dt)).collect();
        Ok(TrajectoryResult {
            ref_states,
            ref_speed: self.nominal_speed,
            is_complete: self.is_complete(time),
        })
    }

    fn is_complete(&self, time: f32) -> bool {
        if self.waypoints.is_empty() {
            return true;
        }
        let (last_x, last_y) = *self.waypoints.last().unwrap();
        let pos = self.state_at(time);
        let dist = ((pos.x - last_x).powi(2) + (pos.y - last_y).powi(2)).sqrt();
        time >= self.total_duration() && dist < 0.1
    }
}

impl LinearPlanner {
    /// Sampling interval between successive reference rows, derived from the
    /// path's own first-segment timing.
    fn sample_dt(&self) -> f32 {
        self.cumulative_times.get(1).copied().unwrap_or(1.0).max(1e-3)
    }
}
