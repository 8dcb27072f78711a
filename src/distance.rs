use crate::error::{IriError, Result};
use crate::preprocess::SensorTable;

/// Speed assumed for every sample when the log carries no GPS.
pub const DEFAULT_SPEED: f64 = 15.0;

/// Speed per row: the GPS speed column when GPS is available, otherwise [`DEFAULT_SPEED`].
pub fn speed_series(table: &SensorTable) -> Vec<f64> {
    match (&table.speed, table.has_gps()) {
        (Some(speed), true) => speed.clone(),
        _ => vec![DEFAULT_SPEED; table.len()],
    }
}

/// Cumulative trapezoidal integral of speed over time, starting at 0.
pub fn cumulative_distance(time: &[f64], speed: &[f64]) -> Result<Vec<f64>> {
    if time.len() != speed.len() {
        return Err(IriError::Computation(format!(
            "time ({}) and speed ({}) lengths differ",
            time.len(),
            speed.len()
        )));
    }
    if time.is_empty() {
        return Ok(Vec::new());
    }

    let mut distance = Vec::with_capacity(time.len());
    let mut acc = 0.0;
    distance.push(acc);
    for i in 1..time.len() {
        acc += (time[i] - time[i - 1]) * (speed[i] + speed[i - 1]) / 2.0;
        distance.push(acc);
    }

    if !acc.is_finite() {
        return Err(IriError::Computation(
            "distance could not be integrated: speed has missing or non-finite values".to_string(),
        ));
    }
    Ok(distance)
}
