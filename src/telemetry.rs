//! Trajectory and statistics derived from a session's sensor stream.
//!
//! Both derivations sort records by timestamp first (stable, so records sharing
//! a timestamp keep the order the store returned them in).

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::{SensorData, TrajectoryPoint};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum StatsError {
    #[error("Session {0} not found")]
    NotFound(String),

    #[error("No {0} values recorded for this session")]
    NoData(&'static str),
}

/// Spatial extent of the UWB positions of a session.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub min_x: f64,
    pub max_x: f64,
    pub min_y: f64,
    pub max_y: f64,
}

/// Coverage and extent summary of one session.
///
/// # Formulas (N = number of records)
/// - `duration_ms`: 0 when N <= 1, otherwise last minus first timestamp
/// - `*_coverage`: 100 * (records carrying the channel) / N
///   - UWB is keyed on `uwb_x`, IMU on `imu_ax`
/// - `bounds`: min/max over the records where the coordinate is present
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SessionStats {
    pub session_id: String,
    pub total_points: usize,
    pub duration_ms: i64,
    pub uwb_coverage: f64,
    pub imu_coverage: f64,
    pub steering_coverage: f64,
    pub bounds: Bounds,
}

fn sorted_by_timestamp(records: &[SensorData]) -> Vec<&SensorData> {
    let mut sorted: Vec<&SensorData> = records.iter().collect();
    sorted.sort_by_key(|r| r.timestamp);
    sorted
}

/// Project raw records onto the path of valid 2D positions.
///
/// Records missing `uwb_x` or `uwb_y` produce nothing. No interpolation.
pub fn trajectory(records: &[SensorData]) -> Vec<TrajectoryPoint> {
    sorted_by_timestamp(records)
        .into_iter()
        .filter_map(|r| match (r.uwb_x, r.uwb_y) {
            (Some(x), Some(y)) => Some(TrajectoryPoint {
                x,
                y,
                timestamp: r.timestamp,
                steering_angle: r.steering_angle,
            }),
            _ => None,
        })
        .collect()
}

fn coverage(records: &[&SensorData], present: impl Fn(&SensorData) -> bool) -> f64 {
    let count = records.iter().filter(|r| present(r)).count();
    count as f64 / records.len() as f64 * 100.0
}

fn extent(
    values: impl Iterator<Item = f64>,
    field: &'static str,
) -> Result<(f64, f64), StatsError> {
    values
        .fold(None, |acc: Option<(f64, f64)>, v| match acc {
            Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
            None => Some((v, v)),
        })
        .ok_or(StatsError::NoData(field))
}

pub fn session_stats(session_id: &str, records: &[SensorData]) -> Result<SessionStats, StatsError> {
    if records.is_empty() {
        return Err(StatsError::NotFound(session_id.to_string()));
    }

    let sorted = sorted_by_timestamp(records);

    let duration_ms = match (sorted.first(), sorted.last()) {
        // Rows written outside this API carry unvalidated timestamps
        (Some(first), Some(last)) if sorted.len() > 1 => {
            last.timestamp.saturating_sub(first.timestamp)
        }
        _ => 0,
    };

    let (min_x, max_x) = extent(sorted.iter().filter_map(|r| r.uwb_x), "uwb_x")?;
    let (min_y, max_y) = extent(sorted.iter().filter_map(|r| r.uwb_y), "uwb_y")?;

    Ok(SessionStats {
        session_id: session_id.to_string(),
        total_points: sorted.len(),
        duration_ms,
        uwb_coverage: coverage(&sorted, |r| r.uwb_x.is_some()),
        imu_coverage: coverage(&sorted, |r| r.imu_ax.is_some()),
        steering_coverage: coverage(&sorted, |r| r.steering_angle.is_some()),
        bounds: Bounds {
            min_x,
            max_x,
            min_y,
            max_y,
        },
    })
}
