//! Fixed-distance windowing and the RMS-based IRI estimator.

use serde::{Deserialize, Serialize};

use crate::error::{IriError, Result};

/// Empirical calibration constant of the IRI estimate.
pub const IRI_K: f64 = 80.59;

// =====================
// Roughness classes
// =====================
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoughnessClass {
    Good,
    Fair,
    Poor,
    Bad,
}

impl RoughnessClass {
    pub fn from_iri(iri: f64) -> Self {
        if iri <= 3.0 {
            RoughnessClass::Good
        } else if iri <= 5.0 {
            RoughnessClass::Fair
        } else if iri <= 7.0 {
            RoughnessClass::Poor
        } else {
            RoughnessClass::Bad
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RoughnessClass::Good => "good",
            RoughnessClass::Fair => "fair",
            RoughnessClass::Poor => "poor",
            RoughnessClass::Bad => "bad",
        }
    }

    /// Map rendering color.
    pub fn color(&self) -> &'static str {
        match self {
            RoughnessClass::Good => "#16a34a",
            RoughnessClass::Fair => "#facc15",
            RoughnessClass::Poor => "#f97316",
            RoughnessClass::Bad => "#dc2626",
        }
    }

    pub fn all() -> &'static [RoughnessClass] {
        &[
            RoughnessClass::Good,
            RoughnessClass::Fair,
            RoughnessClass::Poor,
            RoughnessClass::Bad,
        ]
    }
}

impl std::fmt::Display for RoughnessClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(self.as_str())
    }
}

// =====================
// Segments
// =====================

/// One window of the road, with everything both result projections need.
#[derive(Clone, Debug, PartialEq)]
pub struct Segment {
    pub distance_start: f64,
    pub distance_end: f64,
    pub segment_length: f64,
    /// Row range `[start_idx, end_idx)` the window was aggregated over.
    pub start_idx: usize,
    pub end_idx: usize,
    pub iri_value: f64,
    pub mean_speed: f64,
    pub rms_accel: f64,
    pub start_lat: Option<f64>,
    pub start_lon: Option<f64>,
    pub end_lat: Option<f64>,
    pub end_lon: Option<f64>,
}

impl Segment {
    pub fn class(&self) -> RoughnessClass {
        RoughnessClass::from_iri(self.iri_value)
    }
}

/// Latitude/longitude columns aligned with the signal rows.
#[derive(Clone, Copy, Debug)]
pub struct Coordinates<'a> {
    pub latitude: &'a [f64],
    pub longitude: &'a [f64],
}

impl Coordinates<'_> {
    /// `None` for an out-of-range row or a non-finite cell.
    fn at(&self, idx: usize) -> (Option<f64>, Option<f64>) {
        let pick = |col: &[f64]| col.get(idx).copied().filter(|v| v.is_finite());
        (pick(self.latitude), pick(self.longitude))
    }
}

/// Index of the sample whose distance is closest to `target`; the first one on ties.
pub fn nearest_index(distance: &[f64], target: f64) -> usize {
    let mut best = 0;
    let mut best_gap = f64::INFINITY;
    for (i, d) in distance.iter().enumerate() {
        let gap = (d - target).abs();
        if gap < best_gap {
            best = i;
            best_gap = gap;
        }
    }
    best
}

pub fn rms(values: &[f64]) -> f64 {
    (values.iter().map(|v| v * v).sum::<f64>() / values.len() as f64).sqrt()
}

pub fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

/// `K * rms / speed`, or 0 when the vehicle was not moving.
pub fn iri_from_rms(rms_accel: f64, mean_speed: f64) -> f64 {
    if mean_speed > 0.0 {
        IRI_K * rms_accel / mean_speed
    } else {
        0.0
    }
}

/// Cuts the signal into windows of `segment_length` distance units and scores each.
///
/// Windows start at 0 and advance while `start < max_distance - segment_length`,
/// so a trailing partial window is never emitted. Window edges snap to the
/// nearest sample; windows that collapse to no rows are skipped.
pub fn segment_signal(
    vertical_accel: &[f64],
    speed: &[f64],
    distance: &[f64],
    segment_length: f64,
    coords: Option<Coordinates<'_>>,
) -> Result<Vec<Segment>> {
    let n = distance.len();
    if vertical_accel.len() != n || speed.len() != n {
        return Err(IriError::Computation(format!(
            "misaligned series: accel={}, speed={}, distance={}",
            vertical_accel.len(),
            speed.len(),
            n
        )));
    }
    if !(segment_length > 0.0) {
        return Err(IriError::Computation(format!("invalid segment length {segment_length}")));
    }
    let Some(&max_distance) = distance.last() else {
        return Ok(Vec::new());
    };

    log::info!(
        "Total distance: {:.2}, creating segments of {}",
        max_distance,
        segment_length
    );

    let mut segments = Vec::new();
    let stop = max_distance - segment_length;
    let mut k = 0u64;
    loop {
        let start = k as f64 * segment_length;
        if !(start < stop) {
            break;
        }
        k += 1;
        let end = start + segment_length;

        let start_idx = nearest_index(distance, start);
        let end_idx = nearest_index(distance, end);
        if end_idx <= start_idx {
            log::debug!("Skipping window [{start}, {end}): no samples");
            continue;
        }

        let rms_accel = rms(&vertical_accel[start_idx..end_idx]);
        let mean_speed = mean(&speed[start_idx..end_idx]);
        let iri_value = iri_from_rms(rms_accel, mean_speed);

        let ((start_lat, start_lon), (end_lat, end_lon)) = match coords {
            Some(c) => (c.at(start_idx), c.at(end_idx - 1)),
            None => ((None, None), (None, None)),
        };

        segments.push(Segment {
            distance_start: start,
            distance_end: end,
            segment_length,
            start_idx,
            end_idx,
            iri_value,
            mean_speed,
            rms_accel,
            start_lat,
            start_lon,
            end_lat,
            end_lon,
        });
    }

    log::info!("Created {} segments", segments.len());
    Ok(segments)
}
