//! PNG rendering of a full computation: filtered vertical acceleration over
//! time, and the IRI profile along distance colored by roughness class.

use anyhow::{bail, Result};
use plotters::prelude::*;
use std::path::Path;

use crate::engine::ComputationResult;
use crate::segment::RoughnessClass;

/// Plot color of the class, parsed from its `#rrggbb` map color.
fn class_color(iri: f64) -> RGBColor {
    let hex = RoughnessClass::from_iri(iri).color().trim_start_matches('#');
    let channel = |i: usize| {
        hex.get(i..i + 2)
            .and_then(|c| u8::from_str_radix(c, 16).ok())
            .unwrap_or(0)
    };
    RGBColor(channel(0), channel(2), channel(4))
}

fn bounds<I: Iterator<Item = f64>>(values: I) -> (f64, f64) {
    let (lo, hi) = values.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| (lo.min(v), hi.max(v)));
    if lo.is_finite() && hi > lo {
        (lo, hi)
    } else if lo.is_finite() {
        (lo - 1.0, lo + 1.0)
    } else {
        (0.0, 1.0)
    }
}

pub fn render_chart<P: AsRef<Path>>(result: &ComputationResult, out: P) -> Result<()> {
    if !result.success {
        bail!("cannot chart a failed computation: {}", result.message);
    }
    let filtered = result.filtered_data.as_deref().unwrap_or(&[]);

    let root = BitMapBackend::new(out.as_ref(), (1200, 900)).into_drawing_area();
    root.fill(&WHITE)?;
    let (top, bottom) = root.split_vertically(450);

    // ---- filtered signal ----
    let (t0, t1) = bounds(filtered.iter().map(|s| s.time));
    let (a0, a1) = bounds(filtered.iter().map(|s| s.vertical_accel));

    let mut chart = ChartBuilder::on(&top)
        .caption(
            format!("Vertical acceleration ({:.1} Hz)", result.sampling_rate),
            ("sans-serif", 26),
        )
        .margin(15)
        .x_label_area_size(40)
        .y_label_area_size(70)
        .build_cartesian_2d(t0..t1, a0..a1)?;

    chart
        .configure_mesh()
        .x_desc("Time (s)")
        .y_desc("Acceleration")
        .draw()?;

    chart.draw_series(LineSeries::new(
        filtered.iter().map(|s| (s.time, s.vertical_accel)),
        &BLUE,
    ))?;

    // ---- IRI profile ----
    let (d0, d1) = bounds(
        result
            .segments
            .iter()
            .flat_map(|s| [s.distance_start, s.distance_end]),
    );
    let iri_max = result
        .segments
        .iter()
        .map(|s| s.iri_value)
        .fold(8.0, f64::max);

    let mut chart = ChartBuilder::on(&bottom)
        .caption(
            format!("IRI per segment ({} segments)", result.total_segments),
            ("sans-serif", 26),
        )
        .margin(15)
        .x_label_area_size(40)
        .y_label_area_size(70)
        .build_cartesian_2d(d0..d1, 0.0..iri_max * 1.1)?;

    chart
        .configure_mesh()
        .x_desc("Distance")
        .y_desc("IRI")
        .draw()?;

    chart.draw_series(result.segments.iter().map(|s| {
        Rectangle::new(
            [(s.distance_start, 0.0), (s.distance_end, s.iri_value)],
            class_color(s.iri_value).filled(),
        )
    }))?;

    root.present()?;
    Ok(())
}
