//! Turns a raw CSV table into a clean, time-sorted sensor table.

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Timelike};

use crate::error::{IriError, Result};
use crate::loader::RawTable;

pub const REQUIRED_COLUMNS: [&str; 4] = ["time", "ax", "ay", "az"];
pub const GPS_COLUMNS: [&str; 3] = ["latitude", "longitude", "speed"];

/// Row minimum of the full engine.
pub const FULL_MIN_ROWS: usize = 10;
/// Row minimum of the lite engine.
pub const LITE_MIN_ROWS: usize = 100;

/// Offset-carrying forms RFC 3339 rejects, e.g. `+0800` without a colon.
const OFFSET_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S%.f%z", "%Y-%m-%d %H:%M:%S%.f%z"];

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y/%m/%d %H:%M:%S%.f",
    "%m/%d/%Y %H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
    "%Y/%m/%d %H:%M",
    "%m/%d/%Y %H:%M",
];

const TIME_FORMATS: &[&str] = &["%H:%M:%S%.f", "%H:%M"];

/// Preprocessed readings, one entry per row in every column.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SensorTable {
    pub time: Vec<f64>,
    pub ax: Vec<f64>,
    pub ay: Vec<f64>,
    pub az: Vec<f64>,
    /// Optional columns, kept whenever present in the header. Missing cells are NaN.
    pub latitude: Option<Vec<f64>>,
    pub longitude: Option<Vec<f64>>,
    pub speed: Option<Vec<f64>>,
}

impl SensorTable {
    pub fn len(&self) -> usize {
        self.time.len()
    }

    pub fn is_empty(&self) -> bool {
        self.time.is_empty()
    }

    /// GPS counts as available only when latitude, longitude and speed are all present.
    pub fn has_gps(&self) -> bool {
        self.latitude.is_some() && self.longitude.is_some() && self.speed.is_some()
    }
}

pub fn missing_required(headers: &[String]) -> Vec<&'static str> {
    REQUIRED_COLUMNS
        .iter()
        .copied()
        .filter(|c| !headers.iter().any(|h| h == c))
        .collect()
}

pub fn check_required_columns(headers: &[String]) -> Result<()> {
    let missing = missing_required(headers);
    if missing.is_empty() {
        Ok(())
    } else {
        Err(IriError::missing_columns(&missing))
    }
}

pub fn has_gps_columns(headers: &[String]) -> bool {
    GPS_COLUMNS.iter().all(|c| headers.iter().any(|h| h == c))
}

/// Parses a timestamp cell into seconds.
///
/// Plain numbers are taken as seconds (elapsed or epoch). Date-times are
/// converted to seconds since the Unix epoch; bare clock times to seconds
/// since midnight.
pub fn parse_time(cell: &str) -> Option<f64> {
    let s = cell.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(v) = s.parse::<f64>() {
        return v.is_finite().then_some(v);
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(epoch_seconds(&dt.naive_utc()));
    }
    for fmt in OFFSET_FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(s, fmt) {
            return Some(epoch_seconds(&dt.naive_utc()));
        }
    }
    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(epoch_seconds(&dt));
        }
    }
    if let Ok(d) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return d.and_hms_opt(0, 0, 0).map(|dt| epoch_seconds(&dt));
    }
    for fmt in TIME_FORMATS {
        if let Ok(t) = NaiveTime::parse_from_str(s, fmt) {
            return Some(t.num_seconds_from_midnight() as f64 + t.nanosecond() as f64 / 1e9);
        }
    }
    None
}

fn epoch_seconds(dt: &NaiveDateTime) -> f64 {
    let utc = dt.and_utc();
    utc.timestamp() as f64 + utc.timestamp_subsec_nanos() as f64 / 1e9
}

/// Numeric coercion; anything unparsable (or NaN) becomes missing.
pub fn parse_number(cell: &str) -> Option<f64> {
    cell.trim().parse::<f64>().ok().filter(|v| !v.is_nan())
}

fn coerce(cells: &[String]) -> Vec<Option<f64>> {
    cells.iter().map(|c| parse_number(c)).collect()
}

fn required<'a>(table: &'a RawTable, name: &str) -> Result<&'a [String]> {
    table
        .column(name)
        .ok_or_else(|| IriError::missing_columns(&[name]))
}

/// Time normalization, numeric coercion, NaN drop and sort, in that order.
///
/// Fails with a validation error when a required column is absent and with
/// `InsufficientData` when fewer than `min_rows` rows survive.
pub fn preprocess(table: &RawTable, min_rows: usize) -> Result<SensorTable> {
    check_required_columns(&table.headers)?;

    // 1. elapsed seconds since the first sample
    let raw_time: Vec<Option<f64>> = required(table, "time")?.iter().map(|c| parse_time(c)).collect();
    let origin = raw_time.iter().flatten().next().copied().unwrap_or(0.0);
    let time: Vec<Option<f64>> = raw_time.iter().map(|t| t.map(|v| v - origin)).collect();

    // 2. numeric coercion
    let ax = coerce(required(table, "ax")?);
    let ay = coerce(required(table, "ay")?);
    let az = coerce(required(table, "az")?);
    let optional = |name: &str| table.column(name).map(coerce);
    let latitude = optional("latitude");
    let longitude = optional("longitude");
    let speed = optional("speed");

    // 3. drop incomplete rows
    let mut rows: Vec<usize> = (0..table.len())
        .filter(|&i| time[i].is_some() && ax[i].is_some() && ay[i].is_some() && az[i].is_some())
        .collect();

    if rows.len() < min_rows {
        return Err(IriError::InsufficientData { required: min_rows, found: rows.len() });
    }

    // 4. stable ascending sort by time
    rows.sort_by(|&a, &b| time[a].unwrap_or(0.0).total_cmp(&time[b].unwrap_or(0.0)));

    let pick = |col: &[Option<f64>]| -> Vec<f64> {
        rows.iter().map(|&i| col[i].unwrap_or(f64::NAN)).collect()
    };

    let mut out = SensorTable {
        time: pick(time.as_slice()),
        ax: pick(ax.as_slice()),
        ay: pick(ay.as_slice()),
        az: pick(az.as_slice()),
        latitude: latitude.as_deref().map(pick),
        longitude: longitude.as_deref().map(pick),
        speed: speed.as_deref().map(pick),
    };

    // out-of-order logs: re-anchor on the earliest sample
    let t0 = out.time[0];
    if t0 != 0.0 {
        out.time.iter_mut().for_each(|t| *t -= t0);
    }

    Ok(out)
}
