use roughness::loader::load_csv;
use roughness::preprocess::{preprocess, FULL_MIN_ROWS};
use roughness::{
    compute, compute_chunked, compute_file, run_pipeline, ComputeParams, LiteParams, IRI_K,
};
use std::f64::consts::PI;
use std::io::{Cursor, Write};

struct Log {
    rows: usize,
    dt: f64,
    gps: bool,
    speed: f64,
}

impl Log {
    fn new(rows: usize, dt: f64) -> Self {
        Log { rows, dt, gps: true, speed: 10.0 }
    }

    fn without_gps(mut self) -> Self {
        self.gps = false;
        self
    }

    fn speed(mut self, speed: f64) -> Self {
        self.speed = speed;
        self
    }

    /// `az` carries gravity plus a unit sine.
    fn csv(&self) -> String {
        let mut s = String::from("time,ax,ay,az");
        if self.gps {
            s.push_str(",latitude,longitude,speed");
        }
        s.push('\n');
        for i in 0..self.rows {
            let t = i as f64 * self.dt;
            let az = 9.81 + (2.0 * PI * 1.0 * t).sin();
            s.push_str(&format!("{:.3},0.01,-0.02,{}", t, az));
            if self.gps {
                s.push_str(&format!(
                    ",{},{},{}",
                    14.6 + i as f64 * 1e-5,
                    121.0 + i as f64 * 2e-5,
                    self.speed
                ));
            }
            s.push('\n');
        }
        s
    }
}

#[test]
fn constant_speed_segment_count_matches_total_distance() {
    let csv = Log::new(1000, 0.1).csv();
    let r = compute(csv.as_bytes(), &ComputeParams::default());
    assert!(r.success, "{}", r.message);

    let total_distance: f64 = 10.0 * 99.9;
    assert_eq!(r.total_segments, (total_distance / 100.0).floor() as usize);
    assert_eq!(r.segments.len(), r.total_segments);
    assert!((r.sampling_rate - 10.0).abs() < 1e-6);
}

#[test]
fn every_emitted_segment_has_nominal_width() {
    let csv = Log::new(1500, 0.05).csv();
    for length in [25, 60, 100, 333] {
        let r = compute(csv.as_bytes(), &ComputeParams::new(length, 10.0));
        assert!(r.success, "{}", r.message);
        for s in &r.segments {
            assert_eq!(s.distance_end - s.distance_start, length as f64);
            assert_eq!(s.segment_length, length as f64);
        }
    }
}

#[test]
fn iri_is_non_negative_and_zero_when_stopped() {
    let moving = compute(Log::new(1000, 0.1).csv().as_bytes(), &ComputeParams::default());
    assert!(moving.segments.iter().all(|s| s.iri_value >= 0.0));
    for s in &moving.segments {
        assert!((s.iri_value - IRI_K * s.rms_accel / s.mean_speed).abs() < 1e-9);
    }

    // zero speed: no distance, so no windows at all
    let stopped = compute(
        Log::new(1000, 0.1).speed(0.0).csv().as_bytes(),
        &ComputeParams::default(),
    );
    assert!(stopped.success, "{}", stopped.message);
    assert_eq!(stopped.total_segments, 0);
    assert!(stopped.segments.is_empty());
}

#[test]
fn identical_input_gives_identical_segments() {
    let csv = Log::new(1200, 0.02).csv();
    let a = compute(csv.as_bytes(), &ComputeParams::new(50, 8.0));
    let b = compute(csv.as_bytes(), &ComputeParams::new(50, 8.0));
    assert_eq!(
        serde_json::to_string(&a.segments).unwrap(),
        serde_json::to_string(&b.segments).unwrap()
    );
    assert_eq!(a.raw_data, b.raw_data);
    assert_eq!(a.filtered_data, b.filtered_data);
}

#[test]
fn no_gps_means_null_coordinates_and_default_speed() {
    let csv = Log::new(1000, 0.1).without_gps().csv();
    let r = compute(csv.as_bytes(), &ComputeParams::default());
    assert!(r.success, "{}", r.message);
    // 99.9 s at the default 15 units/s
    assert_eq!(r.total_segments, 14);
    for s in &r.segments {
        assert!(s.start_lat.is_none() && s.start_lon.is_none());
        assert!(s.end_lat.is_none() && s.end_lon.is_none());
        assert_eq!(s.mean_speed, 15.0);
    }

    let json = serde_json::to_value(&r).unwrap();
    assert!(json["segments"][0]["start_lat"].is_null());
    assert_eq!(json["raw_data"][0]["speed"], 0.0);
}

#[test]
fn five_rows_is_a_soft_failure() {
    let csv = Log::new(5, 0.1).csv();
    let r = compute(csv.as_bytes(), &ComputeParams::default());
    assert!(!r.success);
    assert!(r.message.contains("Insufficient data"), "{}", r.message);
    assert_eq!(r.total_segments, 0);
    assert!(r.raw_data.is_none());
}

#[test]
fn missing_column_is_named_in_the_message() {
    let csv = "time,ay,az\n0,0,9.8\n0.1,0,9.8\n";
    let r = compute(csv.as_bytes(), &ComputeParams::default());
    assert!(!r.success);
    assert!(r.message.contains("ax"), "{}", r.message);

    let lite = compute_chunked(Cursor::new(csv.as_bytes()), &LiteParams::default());
    assert!(!lite.success);
    assert!(lite.message.contains("ax"));
}

#[test]
fn low_sampling_rate_clamps_cutoff_but_reports_true_rate() {
    // 8 Hz: Nyquist 4 Hz, a 10 Hz cutoff runs at 3.6 Hz
    let csv = Log::new(400, 0.125).csv();
    let r = compute(csv.as_bytes(), &ComputeParams::new(100, 10.0));
    assert!(r.success, "{}", r.message);
    assert!((r.sampling_rate - 8.0).abs() < 1e-9);

    let table = preprocess(&load_csv(csv.as_bytes()).unwrap(), FULL_MIN_ROWS).unwrap();
    let out = run_pipeline(table, 100.0, 10.0, false).unwrap();
    assert!((out.sampling_rate - 8.0).abs() < 1e-9);
    assert!((out.cutoff_freq - 3.6).abs() < 1e-9);
    // 399 intervals of 0.125 s at 10 units/s
    assert!((out.total_distance - 498.75).abs() < 1e-9);
    assert!(out.series.is_none());
    assert_eq!(out.segments.len(), r.segments.len());
}

#[test]
fn chart_series_are_decimated() {
    let csv = Log::new(5000, 0.01).csv();
    let r = compute(csv.as_bytes(), &ComputeParams::default());
    assert!(r.success, "{}", r.message);
    let raw = r.raw_data.unwrap();
    let filtered = r.filtered_data.unwrap();
    // stride 5000 / 2000 = 2
    assert_eq!(raw.len(), 2500);
    assert_eq!(filtered.len(), 2500);
    assert_eq!(raw[1].time, filtered[1].time);
    assert!((raw[1].time - 0.02).abs() < 1e-9);
}

#[test]
fn lite_and_full_agree_bit_for_bit() {
    let csv = Log::new(3000, 0.05).csv();
    let full = compute(csv.as_bytes(), &ComputeParams::new(75, 10.0));
    let lite = compute_chunked(Cursor::new(csv.as_bytes()), &LiteParams::new(75, 500));
    assert!(full.success && lite.success);
    assert_eq!(full.segments.len(), lite.segments.len());
    for (f, l) in full.segments.iter().zip(&lite.segments) {
        assert_eq!(f.iri_value.to_bits(), l.iri_value.to_bits());
        assert_eq!(f.distance_start.to_bits(), l.distance_start.to_bits());
        assert_eq!(f.distance_end.to_bits(), l.distance_end.to_bits());
        assert_eq!(
            (f.start_lat, f.start_lon, f.end_lat, f.end_lon),
            (l.start_lat, l.start_lon, l.end_lat, l.end_lon)
        );
    }
}

#[test]
fn unsorted_rows_are_sorted_before_processing() {
    let csv = Log::new(600, 0.1).csv();
    let mut lines: Vec<&str> = csv.lines().collect();
    let header = lines.remove(0);
    lines.reverse();
    let shuffled = format!("{}\n{}\n", header, lines.join("\n"));

    let a = compute(csv.as_bytes(), &ComputeParams::default());
    let b = compute(shuffled.as_bytes(), &ComputeParams::default());
    assert!(b.success, "{}", b.message);
    assert_eq!(a.segments.len(), b.segments.len());
    for (x, y) in a.segments.iter().zip(&b.segments) {
        assert!((x.iri_value - y.iri_value).abs() < 1e-9);
    }
}

#[test]
fn datetime_timestamps_are_accepted() {
    let mut csv = String::from("time,ax,ay,az,latitude,longitude,speed\n");
    for i in 0..600 {
        let ms = i * 100;
        csv.push_str(&format!(
            "2024-05-01 08:{:02}:{:02}.{:03},0,0,{},14.6,121.0,12\n",
            ms / 60_000,
            (ms / 1000) % 60,
            ms % 1000,
            9.81 + (i as f64 * 0.3).sin()
        ));
    }
    let r = compute(csv.as_bytes(), &ComputeParams::default());
    assert!(r.success, "{}", r.message);
    assert!((r.sampling_rate - 10.0).abs() < 1e-3);
    assert_eq!(r.raw_data.unwrap()[0].time, 0.0);
}

#[test]
fn compute_file_reads_from_disk_and_reports_missing_files() {
    let dir = std::env::temp_dir().join(format!("roughness-test-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join("log.csv");
    let mut f = std::fs::File::create(&path).unwrap();
    f.write_all(Log::new(800, 0.1).csv().as_bytes()).unwrap();
    drop(f);

    let r = compute_file(&path, &ComputeParams::default());
    assert!(r.success, "{}", r.message);

    let missing = compute_file(dir.join("nope.csv"), &ComputeParams::default());
    assert!(!missing.success);
    assert!(missing.message.contains("Failed to load data"));

    std::fs::remove_dir_all(&dir).ok();
}
