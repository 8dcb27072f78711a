use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use roughness::chart::render_chart;
use roughness::config::{DEFAULT_CHUNK_HINT, DEFAULT_CUTOFF_FREQ, DEFAULT_SEGMENT_LENGTH};
use roughness::{
    compute, compute_chunked, preview, validate, ComputationResult, ComputeParams, LiteParams,
    LiteResult,
};

#[derive(Parser, Debug)]
#[command(version, about = "International Roughness Index from accelerometer CSV logs")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Full computation: segments plus chart series
    Compute {
        input: PathBuf,
        /// Segment length in distance units (25..=500)
        #[arg(long, default_value_t = DEFAULT_SEGMENT_LENGTH)]
        segment_length: u32,
        /// Low-pass cutoff in Hz
        #[arg(long, default_value_t = DEFAULT_CUTOFF_FREQ)]
        cutoff_freq: f64,
        /// JSON parameter file; overrides --segment-length and --cutoff-freq
        #[arg(long)]
        params: Option<PathBuf>,
        /// Write the full result as JSON
        #[arg(long)]
        json: Option<PathBuf>,
        /// Render filtered signal and IRI profile to a PNG
        #[arg(long)]
        plot: Option<PathBuf>,
    },
    /// Memory-bounded computation: map segments only
    Lite {
        input: PathBuf,
        #[arg(long, default_value_t = DEFAULT_SEGMENT_LENGTH)]
        segment_length: u32,
        /// Expected rows per read batch
        #[arg(long, default_value_t = DEFAULT_CHUNK_HINT)]
        chunk_hint: usize,
        #[arg(long)]
        json: Option<PathBuf>,
    },
    /// Check required columns and row count
    Validate { input: PathBuf },
    /// Show header, types and first rows
    Preview {
        input: PathBuf,
        #[arg(long, default_value_t = 5)]
        rows: usize,
    },
}

fn open(path: &Path) -> Result<File> {
    File::open(path).with_context(|| format!("Failed to open {}", path.display()))
}

fn write_json<T: Serialize>(value: &T, path: &Path) -> Result<()> {
    let f = File::create(path).with_context(|| format!("Failed to create {}", path.display()))?;
    serde_json::to_writer_pretty(BufWriter::new(f), value)?;
    println!("Saved: {}", path.display());
    Ok(())
}

fn fmt_coord(v: Option<f64>) -> String {
    v.map_or_else(|| "-".to_string(), |c| format!("{c:.6}"))
}

fn print_full_table(result: &ComputationResult) {
    println!(
        "\n--- {} segments @ {:.2} Hz ({:.3} s) ---",
        result.total_segments, result.sampling_rate, result.processing_time
    );
    println!(
        "{:>4} | {:>9} | {:>9} | {:>7} | {:>7} | {:>8} | {:>11} | {:>11}",
        "ID", "START", "END", "IRI", "SPEED", "RMS", "LAT", "LON"
    );
    println!("{}", "-".repeat(90));
    for s in &result.segments {
        println!(
            "{:>4} | {:>9.1} | {:>9.1} | {:>7.2} | {:>7.2} | {:>8.4} | {:>11} | {:>11}",
            s.segment_id,
            s.distance_start,
            s.distance_end,
            s.iri_value,
            s.mean_speed,
            s.rms_accel,
            fmt_coord(s.start_lat),
            fmt_coord(s.start_lon),
        );
    }
    println!();
}

fn print_lite_table(result: &LiteResult) {
    println!(
        "\n--- {} segments @ {:.2} Hz ---",
        result.total_segments.unwrap_or(0),
        result.sampling_rate.unwrap_or(0.0)
    );
    println!(
        "{:>9} | {:>9} | {:>7} | {:>7} | {:>5} | {:>8} | {:>11} | {:>11}",
        "START", "END", "IRI", "SPEED", "CLASS", "COLOR", "LAT", "LON"
    );
    println!("{}", "-".repeat(88));
    for s in &result.segments {
        println!(
            "{:>9.1} | {:>9.1} | {:>7.2} | {:>7.2} | {:>5} | {:>8} | {:>11} | {:>11}",
            s.distance_start,
            s.distance_end,
            s.iri_value,
            s.mean_speed,
            s.class,
            s.color,
            fmt_coord(s.start_lat),
            fmt_coord(s.start_lon),
        );
    }
    println!();
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    match cli.command {
        Command::Compute { input, segment_length, cutoff_freq, params, json, plot } => {
            let params = match params {
                Some(p) => ComputeParams::from_json_file(&p)
                    .with_context(|| format!("Failed to read parameters from {}", p.display()))?,
                None => ComputeParams::new(segment_length, cutoff_freq),
            };
            let result = compute(open(&input)?, &params);
            if !result.success {
                bail!("{}", result.message);
            }
            print_full_table(&result);
            if let Some(path) = json {
                write_json(&result, &path)?;
            }
            if let Some(path) = plot {
                render_chart(&result, &path)?;
                println!("Saved plot: {}", path.display());
            }
        }
        Command::Lite { input, segment_length, chunk_hint, json } => {
            let result = compute_chunked(open(&input)?, &LiteParams::new(segment_length, chunk_hint));
            if !result.success {
                bail!("{}", result.message);
            }
            print_lite_table(&result);
            if let Some(path) = json {
                write_json(&result, &path)?;
            }
        }
        Command::Validate { input } => {
            let v = validate(open(&input)?);
            println!("{} ({} rows)", v.message, v.rows);
            if !v.valid {
                std::process::exit(1);
            }
        }
        Command::Preview { input, rows } => {
            let p = preview(open(&input)?, rows)?;
            println!("Columns ({}), {} rows:", p.columns.len(), p.total_rows);
            for c in &p.columns {
                println!("  {:<12} {}", c, p.data_types.get(c).map(String::as_str).unwrap_or("?"));
            }
            println!();
            println!("{}", p.columns.join(","));
            for row in &p.preview_data {
                let cells: Vec<&str> = p.columns.iter().map(|c| row.get(c).map_or("", String::as_str)).collect();
                println!("{}", cells.join(","));
            }
        }
    }

    Ok(())
}
