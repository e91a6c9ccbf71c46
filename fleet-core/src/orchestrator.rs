//! Drives [`crate::manager::RobotManager::tick`] in a bounded loop and stops
//! early once the fleet reports completion.
//!
//! Grounded on the simulator's own top-level run loop (`Simulator::run`),
//! trimmed to the one thing the fleet orchestrator needs: invoke a tick,
//! hand the result to an observer, stop on completion or timeout. No
//! retained state beyond the tick counter.

use std::time::Duration;

use log::info;

use crate::errors::FleetResult;
use crate::manager::RobotManager;
use crate::messages::{Obstacle, SimulationResult};

/// Observes one tick's outcome. Implemented by callers that want to record,
/// print, or visualise progress; the orchestrator itself has no side effects
/// beyond driving the loop.
pub trait TickObserver {
    fn on_tick(&mut self, kt: u64, results: &[SimulationResult]);
}

/// No-op observer for callers that only care about the final outcome.
pub struct NullObserver;

impl TickObserver for NullObserver {
    fn on_tick(&mut self, _kt: u64, _results: &[SimulationResult]) {}
}

pub struct Orchestrator {
    ts: f32,
    max_ticks: u64,
}

impl Orchestrator {
    pub fn new(ts: f32, max_ticks: u64) -> Self {
        Self { ts, max_ticks }
    }

    /// Runs ticks `0..max_ticks`, stopping early once the manager reports
    /// every robot's trajectory complete. Returns the tick count actually
    /// run and whether the fleet completed before the tick budget ran out.
    pub fn run(
        &self,
        manager: &mut RobotManager,
        static_obstacles: impl Fn(u64) -> Vec<Obstacle>,
        observer: &mut dyn TickObserver,
    ) -> FleetResult<(u64, bool)> {
        for kt in 0..self.max_ticks {
            let (results, all_complete) = manager.tick(kt, self.ts, static_obstacles(kt))?;
            observer.on_tick(kt, &results);
            if all_complete {
                info!("fleet reached completion at tick {kt}");
                return Ok((kt + 1, true));
            }
        }
        Ok((self.max_ticks, false))
    }

    pub fn tick_period(&self) -> Duration {
        Duration::from_secs_f32(self.ts)
    }
}
