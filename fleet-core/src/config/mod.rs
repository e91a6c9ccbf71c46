//! Typed configuration loaded from YAML, grounded on the simulator's own
//! `SimulatorConfig::load_from_path`: `confy::load_path` into a
//! `serde_yaml::Value`, apply YAML merge tags, then deserialize into the
//! concrete struct. Kept as ambient plumbing even though the global path
//! coordinator that would consume a loaded schedule is out of scope.

pub mod schedule;

use std::path::{Path, PathBuf};

use crate::channel::NetworkDelayConfig;
use crate::errors::{FleetError, FleetErrorTypes, FleetResult};
use crate::logger::LoggerConfig;
use crate::messages::RobotId;

/// Parameters the MPC problem was compiled against: horizon, dimensions, and
/// the maximum number of peers it was generated to handle.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct MpcConfiguration {
    pub ts: f32,
    pub n_hor: usize,
    pub ns: usize,
    pub na: usize,
    pub n_other: usize,
    pub lin_vel_max: f32,
    pub ang_vel_max: f32,
}

impl Default for MpcConfiguration {
    fn default() -> Self {
        Self {
            ts: 0.2,
            n_hor: 20,
            ns: 3,
            na: 2,
            n_other: 4,
            lin_vel_max: 1.0,
            ang_vel_max: 1.5,
        }
    }
}

impl MpcConfiguration {
    pub fn layout(&self) -> crate::peer_assembler::PeerLayout {
        crate::peer_assembler::PeerLayout {
            ns: self.ns,
            n_hor: self.n_hor,
            m_other: self.n_other,
        }
    }
}

/// Footprint used for collision-distance checks between robots.
#[derive(Debug, Clone, Copy, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct CircularRobotSpecification {
    pub vehicle_width: f32,
}

impl Default for CircularRobotSpecification {
    fn default() -> Self {
        Self { vehicle_width: 0.5 }
    }
}

/// One robot's static configuration: identity, initial pose, and the
/// schedule it should track (loaded separately via [`schedule::load_csv`]).
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct RobotConfig {
    pub id: RobotId,
    pub name: String,
    /// Nominal speed used to time-parameterise this robot's schedule.
    /// Defaults to half the configured `lin_vel_max` (see design notes on the
    /// source prototype's hardcoded `1.0`).
    pub nominal_speed: Option<f32>,
    pub initial_state: [f32; 3],
    pub schedule_path: Option<PathBuf>,
}

impl Default for RobotConfig {
    fn default() -> Self {
        Self {
            id: 0,
            name: String::new(),
            nominal_speed: None,
            initial_state: [0.0, 0.0, 0.0],
            schedule_path: None,
        }
    }
}

/// Root configuration for a fleet run.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct FleetConfig {
    pub version: String,
    pub log: LoggerConfig,
    pub random_seed: u64,
    pub max_ticks: u64,
    /// Per-tick liveness deadline in seconds (`T_tick`).
    pub tick_timeout: f32,
    pub mpc: MpcConfiguration,
    pub robot_spec: CircularRobotSpecification,
    pub manager_to_robot_delay: NetworkDelayConfig,
    pub robot_to_manager_delay: NetworkDelayConfig,
    pub robots: Vec<RobotConfig>,
}

impl Default for FleetConfig {
    fn default() -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            log: LoggerConfig::default(),
            random_seed: 0,
            max_ticks: 200,
            tick_timeout: 1.0,
            mpc: MpcConfiguration::default(),
            robot_spec: CircularRobotSpecification::default(),
            manager_to_robot_delay: NetworkDelayConfig::default(),
            robot_to_manager_delay: NetworkDelayConfig::default(),
            robots: Vec::new(),
        }
    }
}

impl FleetConfig {
    pub fn load_from_path(path: &Path) -> FleetResult<Self> {
        let mut config: serde_yaml::Value = match confy::load_path(path) {
            Ok(config) => config,
            Err(error) => {
                let what = format!("error from confy while loading the config file: {error}");
                return Err(FleetError::new(FleetErrorTypes::ConfigError, what));
            }
        };
        config.apply_merge().map_err(|e| {
            FleetError::new(
                FleetErrorTypes::ConfigError,
                format!("error from serde_yaml while merging YAML tags: {e}"),
            )
        })?;
        let config: FleetConfig = serde_path_to_error::deserialize(config).map_err(|e| {
            FleetError::new(
                FleetErrorTypes::ConfigError,
                format!("error from serde_yaml while loading FleetConfig at '{}': {e}", e.path()),
            )
        })?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mpc_configuration_layout_matches_its_own_dimensions() {
        let cfg = MpcConfiguration {
            ts: 0.2,
            n_hor: 20,
            ns: 3,
            na: 2,
            n_other: 4,
            lin_vel_max: 1.0,
            ang_vel_max: 1.5,
        };
        let layout = cfg.layout();
        assert_eq!(layout.ns, cfg.ns);
        assert_eq!(layout.n_hor, cfg.n_hor);
        assert_eq!(layout.m_other, cfg.n_other);
    }

    #[test]
    fn fleet_config_loads_partial_yaml_over_defaults() {
        let mut path = std::env::temp_dir();
        path.push(format!("fleet_core_config_test_{}.yaml", std::process::id()));
        std::fs::write(
            &path,
            "max_ticks: 80\nmpc:\n  n_hor: 15\n  n_other: 3\n",
        )
        .unwrap();

        let config = FleetConfig::load_from_path(&path);
        std::fs::remove_file(&path).ok();
        let config = config.unwrap();

        assert_eq!(config.max_ticks, 80);
        assert_eq!(config.mpc.n_hor, 15);
        assert_eq!(config.mpc.n_other, 3);
        // Fields absent from the YAML fall back to MpcConfiguration::default().
        assert_eq!(config.mpc.ts, MpcConfiguration::default().ts);
    }
}
