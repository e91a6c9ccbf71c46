//! CSV schedule loading: one row per scheduled waypoint, consumed by a
//! [`crate::planner::Planner`] to time-parameterise a robot's local
//! reference trajectory.

use std::path::Path;

use serde::Deserialize;

use crate::errors::{FleetError, FleetErrorTypes, FleetResult};
use crate::messages::RobotId;

/// One row of a schedule CSV: a waypoint, the sequence index it occupies
/// along its robot's path, and the schedule time it is due at. Mirrors the
/// row shape a `GlobalPathCoordinator` would hand back from
/// `get_robot_schedule(robot_id)`; that coordinator itself is out of scope
/// here, so `load_csv` is only a convenience reader over the row shape.
#[derive(Debug, Clone, Deserialize)]
pub struct RobotScheduleRecord {
    pub robot_id: RobotId,
    pub seq: usize,
    pub x: f32,
    pub y: f32,
    pub t: f32,
}

/// Parses and sorts every row in `path` by `seq`, independent of `robot_id`
/// (a schedule CSV may hold rows for several robots at once).
pub fn load_csv(path: &Path) -> FleetResult<Vec<RobotScheduleRecord>> {
    let mut reader = csv::Reader::from_path(path).map_err(|e| {
        FleetError::new(
            FleetErrorTypes::ConfigError,
            format!("could not open schedule csv '{}': {e}", path.display()),
        )
    })?;

    let mut records = Vec::new();
    for result in reader.deserialize() {
        let record: RobotScheduleRecord = result.map_err(|e| {
            FleetError::new(
                FleetErrorTypes::ConfigError,
                format!("malformed schedule row in '{}': {e}", path.display()),
            )
        })?;
        records.push(record);
    }
    records.sort_by_key(|r| r.seq);
    Ok(records)
}

/// Filters [`load_csv`]'s rows down to the ones scheduled for `robot_id`,
/// already sorted by `seq`, mirroring
/// `GlobalPathCoordinator.get_robot_schedule(robot_id)`.
pub fn load_csv_for_robot(path: &Path, robot_id: RobotId) -> FleetResult<Vec<RobotScheduleRecord>> {
    Ok(load_csv(path)?
        .into_iter()
        .filter(|r| r.robot_id == robot_id)
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_and_sorts_by_sequence() {
        let mut path = std::env::temp_dir();
        path.push(format!("fleet_core_schedule_test_{}.csv", std::process::id()));
        std::fs::write(
            &path,
            "robot_id,seq,x,y,t\n1,1,1.0,0.0,1.0\n1,0,0.0,0.0,0.0\n",
        )
        .unwrap();

        let records = load_csv(&path).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].seq, 0);
        assert_eq!(records[1].seq, 1);
        assert_eq!(records[0].t, 0.0);
        assert_eq!(records[1].t, 1.0);
    }

    #[test]
    fn load_csv_for_robot_filters_out_other_robots_rows() {
        let mut path = std::env::temp_dir();
        path.push(format!("fleet_core_schedule_test_filter_{}.csv", std::process::id()));
        std::fs::write(
            &path,
            "robot_id,seq,x,y,t\n1,0,0.0,0.0,0.0\n2,0,5.0,5.0,0.0\n1,1,1.0,0.0,1.0\n",
        )
        .unwrap();

        let records = load_csv_for_robot(&path, 1).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(records.len(), 2);
        assert!(records.iter().all(|r| r.robot_id == 1));
        assert_eq!(records[0].seq, 0);
        assert_eq!(records[1].seq, 1);
    }
}
