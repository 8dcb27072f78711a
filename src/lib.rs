//! Road roughness (IRI) from vehicle accelerometer logs.
//!
//! A CSV log with `time, ax, ay, az` (and optionally `latitude, longitude, speed`)
//! is filtered, integrated to distance and cut into fixed-length segments, each
//! scored with an RMS-based International Roughness Index estimate.
//!
//! Two entry points share one pipeline:
//! - [`compute`]: segments plus decimated raw/filtered series for charting;
//! - [`compute_chunked`]: map-ready segments only, for precomputed caches.

pub mod chart;
pub mod config;
pub mod distance;
pub mod engine;
pub mod error;
pub mod filter;
pub mod loader;
pub mod preprocess;
pub mod segment;
pub mod server;

pub use config::{ComputeParams, LiteParams};
pub use engine::{
    compute, compute_chunked, compute_file, preview, run_pipeline, validate, ComputationResult,
    FilteredSample, IriSegment, LiteResult, MapSegment, PipelineOutput, Preview, RawSample,
    Validation,
};
pub use error::{IriError, Result};
pub use preprocess::SensorTable;
pub use segment::{RoughnessClass, Segment, IRI_K};
