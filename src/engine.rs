//! The IRI pipeline and its two result projections.
//!
//! Load -> Preprocess -> Filter -> Integrate -> Segment -> Assemble, in a single
//! pass. The full engine keeps decimated chart series; the lite engine keeps
//! only map-ready segments and frees its intermediates as soon as segments exist.
//! Errors never cross the `compute*` boundary: they become `success = false`.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;
use std::time::Instant;

use crate::config::{ComputeParams, LiteParams, DEFAULT_CUTOFF_FREQ};
use crate::distance::{cumulative_distance, speed_series};
use crate::error::{IriError, Result};
use crate::filter::extract_vertical;
use crate::loader::{load_columns, load_csv, peek_headers, RawTable};
use crate::preprocess::{
    check_required_columns, has_gps_columns, missing_required, preprocess, SensorTable,
    FULL_MIN_ROWS, GPS_COLUMNS, LITE_MIN_ROWS, REQUIRED_COLUMNS,
};
use crate::segment::{segment_signal, Coordinates, RoughnessClass, Segment};

/// Upper bound on chart samples per series.
pub const CHART_POINTS: usize = 2000;

// =====================
// Result shapes
// =====================
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RawSample {
    pub time: f64,
    pub ax: f64,
    pub ay: f64,
    pub az: f64,
    pub speed: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FilteredSample {
    pub time: f64,
    pub vertical_accel: f64,
}

/// Segment as returned by the full engine.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct IriSegment {
    pub segment_id: usize,
    pub distance_start: f64,
    pub distance_end: f64,
    pub segment_length: f64,
    pub iri_value: f64,
    pub mean_speed: f64,
    pub rms_accel: f64,
    pub start_lat: Option<f64>,
    pub start_lon: Option<f64>,
    pub end_lat: Option<f64>,
    pub end_lon: Option<f64>,
}

/// Segment as cached by the lite engine for map rendering.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MapSegment {
    pub start_lat: Option<f64>,
    pub start_lon: Option<f64>,
    pub end_lat: Option<f64>,
    pub end_lon: Option<f64>,
    pub iri_value: f64,
    /// `good`, `fair`, `poor` or `bad`.
    pub class: RoughnessClass,
    pub color: String,
    pub mean_speed: f64,
    pub distance_start: f64,
    pub distance_end: f64,
    pub segment_length: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ComputationResult {
    pub success: bool,
    pub message: String,
    pub total_segments: usize,
    pub segments: Vec<IriSegment>,
    /// Wall-clock seconds spent in `compute`.
    pub processing_time: f64,
    pub sampling_rate: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_data: Option<Vec<RawSample>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filtered_data: Option<Vec<FilteredSample>>,
}

impl ComputationResult {
    fn failure(err: &IriError, started: Instant) -> Self {
        ComputationResult {
            success: false,
            message: format!("Error processing file: {err}"),
            total_segments: 0,
            segments: Vec::new(),
            processing_time: started.elapsed().as_secs_f64(),
            sampling_rate: 0.0,
            raw_data: None,
            filtered_data: None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LiteResult {
    pub success: bool,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_segments: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sampling_rate: Option<f64>,
    pub segments: Vec<MapSegment>,
}

impl LiteResult {
    fn failure(err: &IriError) -> Self {
        LiteResult {
            success: false,
            message: err.to_string(),
            total_segments: None,
            sampling_rate: None,
            segments: Vec::new(),
        }
    }
}

// =====================
// Shared pipeline
// =====================

/// Decimated chart series of the full engine.
#[derive(Clone, Debug, Default)]
pub struct ChartSeries {
    pub raw_data: Vec<RawSample>,
    pub filtered_data: Vec<FilteredSample>,
}

#[derive(Clone, Debug)]
pub struct PipelineOutput {
    pub sampling_rate: f64,
    pub cutoff_freq: f64,
    pub total_distance: f64,
    pub segments: Vec<Segment>,
    /// Present only when the raw series were requested.
    pub series: Option<ChartSeries>,
}

/// Stride keeping at most about [`CHART_POINTS`] samples.
pub fn chart_stride(total_rows: usize) -> usize {
    (total_rows / CHART_POINTS).max(1)
}

fn decimate(table: &SensorTable, vertical_accel: &[f64]) -> ChartSeries {
    let stride = chart_stride(table.len());
    let mut series = ChartSeries::default();
    for i in (0..table.len()).step_by(stride) {
        series.raw_data.push(RawSample {
            time: table.time[i],
            ax: table.ax[i],
            ay: table.ay[i],
            az: table.az[i],
            speed: table.speed.as_ref().map_or(0.0, |s| s[i]),
        });
        series.filtered_data.push(FilteredSample {
            time: table.time[i],
            vertical_accel: vertical_accel[i],
        });
    }
    series
}

/// Filter, integrate and segment a preprocessed table.
///
/// Consumes the table so its columns are released before returning; with
/// `include_raw_series` the decimated chart series are kept.
pub fn run_pipeline(
    table: SensorTable,
    segment_length: f64,
    cutoff_freq: f64,
    include_raw_series: bool,
) -> Result<PipelineOutput> {
    let signal = extract_vertical(&table.time, &table.az, cutoff_freq)?;
    let speed = speed_series(&table);
    let distance = cumulative_distance(&table.time, &speed)?;
    let total_distance = distance.last().copied().unwrap_or(0.0);

    let coords = match (&table.latitude, &table.longitude, table.has_gps()) {
        (Some(latitude), Some(longitude), true) => Some(Coordinates { latitude, longitude }),
        _ => None,
    };
    let segments = segment_signal(&signal.vertical_accel, &speed, &distance, segment_length, coords)?;

    let series = include_raw_series.then(|| decimate(&table, &signal.vertical_accel));

    drop(distance);
    drop(speed);
    drop(table);

    Ok(PipelineOutput {
        sampling_rate: signal.sampling_rate,
        cutoff_freq: signal.cutoff_freq,
        total_distance,
        segments,
        series,
    })
}

// =====================
// Full engine
// =====================

fn full_segment(id: usize, s: &Segment) -> IriSegment {
    IriSegment {
        segment_id: id,
        distance_start: s.distance_start,
        distance_end: s.distance_end,
        segment_length: s.segment_length,
        iri_value: s.iri_value,
        mean_speed: s.mean_speed,
        rms_accel: s.rms_accel,
        start_lat: s.start_lat,
        start_lon: s.start_lon,
        end_lat: s.end_lat,
        end_lon: s.end_lon,
    }
}

fn try_compute<R: Read>(reader: R, params: &ComputeParams) -> Result<PipelineOutput> {
    params.validate()?;
    let raw = load_csv(reader)?;
    let table = preprocess(&raw, FULL_MIN_ROWS)?;
    drop(raw);
    run_pipeline(table, f64::from(params.segment_length), params.cutoff_freq, true)
}

/// Full computation: IRI segments plus decimated raw and filtered series.
pub fn compute<R: Read>(reader: R, params: &ComputeParams) -> ComputationResult {
    let started = Instant::now();
    match try_compute(reader, params) {
        Ok(out) => {
            let segments: Vec<IriSegment> = out
                .segments
                .iter()
                .enumerate()
                .map(|(i, s)| full_segment(i + 1, s))
                .collect();
            let series = out.series.unwrap_or_default();
            ComputationResult {
                success: true,
                message: format!("Successfully computed IRI for {} segments", segments.len()),
                total_segments: segments.len(),
                segments,
                processing_time: started.elapsed().as_secs_f64(),
                sampling_rate: out.sampling_rate,
                raw_data: Some(series.raw_data),
                filtered_data: Some(series.filtered_data),
            }
        }
        Err(e) => {
            log::warn!("IRI computation failed ({}): {e}", e.kind());
            ComputationResult::failure(&e, started)
        }
    }
}

pub fn compute_file<P: AsRef<Path>>(path: P, params: &ComputeParams) -> ComputationResult {
    match std::fs::File::open(&path) {
        Ok(f) => compute(f, params),
        Err(e) => {
            let err = IriError::Load(format!("{}: {e}", path.as_ref().display()));
            ComputationResult::failure(&err, Instant::now())
        }
    }
}

// =====================
// Lite engine
// =====================

fn round_to(v: f64, decimals: i32) -> f64 {
    let p = 10f64.powi(decimals);
    (v * p).round() / p
}

fn map_segment(s: &Segment) -> MapSegment {
    MapSegment {
        start_lat: s.start_lat,
        start_lon: s.start_lon,
        end_lat: s.end_lat,
        end_lon: s.end_lon,
        iri_value: s.iri_value,
        class: s.class(),
        color: s.class().color().to_string(),
        mean_speed: round_to(s.mean_speed, 2),
        distance_start: s.distance_start,
        distance_end: s.distance_end,
        segment_length: s.segment_length,
    }
}

fn try_compute_chunked<R: Read + Seek>(stream: &mut R, params: &LiteParams) -> Result<PipelineOutput> {
    params.validate()?;

    let origin = stream.stream_position()?;
    let headers = peek_headers(&mut *stream)?;
    stream.seek(SeekFrom::Start(origin))?;

    check_required_columns(&headers)?;
    let mut wanted: Vec<&str> = REQUIRED_COLUMNS.to_vec();
    if has_gps_columns(&headers) {
        wanted.extend(GPS_COLUMNS);
    }
    log::info!("Loading CSV with columns: {:?}", wanted);

    let raw = load_columns(&mut *stream, &wanted, params.chunk_hint)?;
    log::info!("Loaded {} rows", raw.len());
    let table = preprocess(&raw, LITE_MIN_ROWS)?;
    drop(raw);

    run_pipeline(table, f64::from(params.segment_length), DEFAULT_CUTOFF_FREQ, false)
}

/// Memory-bounded computation producing only map-ready segments.
///
/// Reads from the stream's current position; the header is peeked first and
/// the stream rewound before the projected load.
pub fn compute_chunked<R: Read + Seek>(mut stream: R, params: &LiteParams) -> LiteResult {
    log::info!("Starting chunked IRI processing");
    match try_compute_chunked(&mut stream, params) {
        Ok(out) => {
            let segments: Vec<MapSegment> = out.segments.iter().map(map_segment).collect();
            drop(out.segments);
            LiteResult {
                success: true,
                message: format!("Processed {} segments", segments.len()),
                total_segments: Some(segments.len()),
                sampling_rate: Some(round_to(out.sampling_rate, 2)),
                segments,
            }
        }
        Err(e) => {
            log::error!("IRI processing error ({}): {e}", e.kind());
            LiteResult::failure(&e)
        }
    }
}

// =====================
// Validation & preview
// =====================

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Validation {
    pub valid: bool,
    pub message: String,
    pub rows: usize,
}

/// Format check used at upload time: required columns and the full-engine row minimum.
pub fn validate<R: Read>(reader: R) -> Validation {
    let raw = match load_csv(reader) {
        Ok(t) => t,
        Err(e) => {
            return Validation { valid: false, message: format!("Error validating file: {e}"), rows: 0 }
        }
    };
    let rows = raw.len();
    let missing = missing_required(&raw.headers);
    if !missing.is_empty() {
        return Validation { valid: false, message: IriError::missing_columns(&missing).to_string(), rows };
    }
    if rows < FULL_MIN_ROWS {
        let err = IriError::InsufficientData { required: FULL_MIN_ROWS, found: rows };
        return Validation { valid: false, message: err.to_string(), rows };
    }
    Validation { valid: true, message: "File format is valid".to_string(), rows }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Preview {
    pub columns: Vec<String>,
    pub total_rows: usize,
    pub preview_data: Vec<BTreeMap<String, String>>,
    /// `"number"` when every non-empty cell parses as a float, else `"text"`.
    pub data_types: BTreeMap<String, String>,
}

fn column_type(cells: &[String]) -> &'static str {
    let numeric = cells
        .iter()
        .map(|c| c.trim())
        .filter(|c| !c.is_empty())
        .all(|c| c.parse::<f64>().is_ok());
    if numeric {
        "number"
    } else {
        "text"
    }
}

fn build_preview(raw: &RawTable, num_rows: usize) -> Preview {
    let preview_data = (0..raw.len().min(num_rows))
        .map(|i| {
            raw.headers
                .iter()
                .cloned()
                .zip(raw.row(i).into_iter().map(str::to_string))
                .collect()
        })
        .collect();
    let data_types = raw
        .headers
        .iter()
        .zip(&raw.columns)
        .map(|(h, c)| (h.clone(), column_type(c).to_string()))
        .collect();
    Preview {
        columns: raw.headers.clone(),
        total_rows: raw.len(),
        preview_data,
        data_types,
    }
}

/// Header, row count, and the first `num_rows` rows of a CSV.
pub fn preview<R: Read>(reader: R, num_rows: usize) -> Result<Preview> {
    let raw = load_csv(reader)?;
    Ok(build_preview(&raw, num_rows))
}
