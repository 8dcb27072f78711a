use anyhow::{Context, Result};
use clap::Parser;
use tokio::net::TcpListener;

use roughness::server::{build_app, ServerConfig};
use roughness::{ComputeParams, LiteParams};

#[derive(Parser, Debug)]
#[command(about = "HTTP interface to the IRI computation engines")]
struct Args {
    /// Listen address
    #[arg(long, env = "IRI_ADDR", default_value = "0.0.0.0:8000")]
    addr: String,

    /// Maximum accepted CSV upload size, in MiB
    #[arg(long, env = "IRI_MAX_BODY_MB", default_value_t = 50)]
    max_body_mb: usize,

    /// Default segment length when a request does not set one
    #[arg(long, env = "IRI_SEGMENT_LENGTH", default_value_t = 100)]
    segment_length: u32,

    /// Default low-pass cutoff (Hz) when a request does not set one
    #[arg(long, env = "IRI_CUTOFF_FREQ", default_value_t = 10.0)]
    cutoff_freq: f64,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let defaults = ComputeParams::new(args.segment_length, args.cutoff_freq);
    defaults.validate().context("invalid default parameters")?;

    let config = ServerConfig {
        defaults,
        lite_defaults: LiteParams { segment_length: args.segment_length, ..LiteParams::default() },
        max_body_bytes: args.max_body_mb * 1024 * 1024,
    };
    let app = build_app(config);

    let listener = TcpListener::bind(&args.addr)
        .await
        .with_context(|| format!("failed to bind {}", args.addr))?;
    log::info!("Server starting on http://{}", args.addr);

    axum::serve(listener, app).await?;
    Ok(())
}
