//! Vertical signal extraction: sampling-rate inference, Butterworth low-pass
//! design and zero-phase (forward-backward) filtering.

use nalgebra::{DMatrix, DVector};
use std::f64::consts::PI;

use crate::error::{IriError, Result};

pub const FILTER_ORDER: usize = 4;

/// Fraction of Nyquist used when the requested cutoff is not below it.
pub const NYQUIST_CLAMP: f64 = 0.9;

/// Median; the mean of the two middle values for even lengths.
pub fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut v = values.to_vec();
    v.sort_by(f64::total_cmp);
    let mid = v.len() / 2;
    if v.len() % 2 == 0 {
        Some((v[mid - 1] + v[mid]) / 2.0)
    } else {
        Some(v[mid])
    }
}

/// Samples per second, from the median spacing of consecutive timestamps.
pub fn sampling_rate(time: &[f64]) -> Result<f64> {
    let deltas: Vec<f64> = time.windows(2).map(|w| w[1] - w[0]).collect();
    let dt = median(&deltas)
        .ok_or_else(|| IriError::Computation("need at least two samples to infer sampling rate".to_string()))?;
    if !(dt.is_finite() && dt > 0.0) {
        return Err(IriError::Computation(format!(
            "degenerate sampling interval (median time delta = {dt})"
        )));
    }
    Ok(1.0 / dt)
}

/// Cutoff actually used by the filter: clamped to 90% of Nyquist when needed.
pub fn effective_cutoff(cutoff_freq: f64, sampling_rate: f64) -> f64 {
    let nyquist = sampling_rate / 2.0;
    if cutoff_freq >= nyquist {
        nyquist * NYQUIST_CLAMP
    } else {
        cutoff_freq
    }
}

// =====================
// Filter design
// =====================

/// Transfer function coefficients, `a[0] == 1`.
#[derive(Clone, Debug, PartialEq)]
pub struct TransferFunction {
    pub b: Vec<f64>,
    pub a: Vec<f64>,
}

fn poly_mul(p: &[f64], q: &[f64]) -> Vec<f64> {
    let mut out = vec![0.0; p.len() + q.len() - 1];
    for (i, pi) in p.iter().enumerate() {
        for (j, qj) in q.iter().enumerate() {
            out[i + j] += pi * qj;
        }
    }
    out
}

/// Digital Butterworth low-pass of the given order.
///
/// `wn` is the cutoff normalized to Nyquist, in `(0, 1)`. The analog prototype
/// is pre-warped and mapped with the bilinear transform, one second-order
/// section per conjugate pole pair (plus a first-order section for odd orders).
pub fn butter_lowpass(order: usize, wn: f64) -> Result<TransferFunction> {
    if order == 0 {
        return Err(IriError::Computation("filter order must be >= 1".to_string()));
    }
    if !(wn > 0.0 && wn < 1.0) {
        return Err(IriError::Computation(format!(
            "normalized cutoff must be in (0, 1), got {wn}"
        )));
    }

    let wc = (PI * wn / 2.0).tan();
    let wc2 = wc * wc;
    let mut b = vec![1.0];
    let mut a = vec![1.0];

    for k in 0..order / 2 {
        let damping = (PI * (2 * k + 1) as f64 / (2 * order) as f64).sin();
        let a0 = 1.0 + 2.0 * damping * wc + wc2;
        let sb = [wc2 / a0, 2.0 * wc2 / a0, wc2 / a0];
        let sa = [1.0, (2.0 * wc2 - 2.0) / a0, (1.0 - 2.0 * damping * wc + wc2) / a0];
        b = poly_mul(&b, &sb);
        a = poly_mul(&a, &sa);
    }

    if order % 2 == 1 {
        let a0 = 1.0 + wc;
        b = poly_mul(&b, &[wc / a0, wc / a0]);
        a = poly_mul(&a, &[1.0, (wc - 1.0) / a0]);
    }

    Ok(TransferFunction { b, a })
}

// =====================
// Filtering
// =====================

/// Steady-state initial conditions of [`lfilter`] for a unit step input.
pub fn lfilter_zi(tf: &TransferFunction) -> Result<Vec<f64>> {
    let n = tf.a.len().max(tf.b.len());
    let mut a = tf.a.clone();
    let mut b = tf.b.clone();
    a.resize(n, 0.0);
    b.resize(n, 0.0);
    let m = n - 1;
    if m == 0 {
        return Ok(Vec::new());
    }

    // (I - companion(a)^T) zi = b[1:] - a[1:] * b[0]
    let lhs = DMatrix::from_fn(m, m, |i, j| {
        let ident = if i == j { 1.0 } else { 0.0 };
        if j == 0 {
            ident + a[i + 1]
        } else if j == i + 1 {
            -1.0
        } else {
            ident
        }
    });
    let rhs = DVector::from_iterator(m, (1..n).map(|i| b[i] - a[i] * b[0]));

    let zi = lhs
        .lu()
        .solve(&rhs)
        .ok_or_else(|| IriError::Computation("filter initial conditions are singular".to_string()))?;
    Ok(zi.iter().copied().collect())
}

/// Direct form II transposed IIR filter, starting from state `zi`.
pub fn lfilter(tf: &TransferFunction, x: &[f64], zi: &[f64]) -> Vec<f64> {
    let n = tf.a.len().max(tf.b.len());
    fn coef(v: &[f64], i: usize) -> f64 {
        v.get(i).copied().unwrap_or(0.0)
    }
    let mut z = zi.to_vec();
    z.resize(n - 1, 0.0);

    let mut out = Vec::with_capacity(x.len());
    for &xi in x {
        let yi = coef(&tf.b, 0) * xi + z.first().copied().unwrap_or(0.0);
        for i in 0..n.saturating_sub(2) {
            z[i] = coef(&tf.b, i + 1) * xi + z[i + 1] - coef(&tf.a, i + 1) * yi;
        }
        if n >= 2 {
            z[n - 2] = coef(&tf.b, n - 1) * xi - coef(&tf.a, n - 1) * yi;
        }
        out.push(yi);
    }
    out
}

/// Padding applied at each end by [`filtfilt`].
pub fn filtfilt_padlen(tf: &TransferFunction) -> usize {
    3 * tf.a.len().max(tf.b.len())
}

/// Zero-phase filtering: forward pass, then backward pass over the reversed output.
///
/// The signal is extended at both ends by odd reflection and each pass starts
/// from steady-state conditions scaled by its first sample.
pub fn filtfilt(tf: &TransferFunction, x: &[f64]) -> Result<Vec<f64>> {
    let pad = filtfilt_padlen(tf);
    let n = x.len();
    if n <= pad {
        return Err(IriError::Computation(format!(
            "signal length {n} must exceed filter padding length {pad}"
        )));
    }

    let (first, last) = (x[0], x[n - 1]);
    let mut ext = Vec::with_capacity(n + 2 * pad);
    ext.extend((1..=pad).rev().map(|i| 2.0 * first - x[i]));
    ext.extend_from_slice(x);
    ext.extend((n - 1 - pad..n - 1).rev().map(|i| 2.0 * last - x[i]));

    let zi = lfilter_zi(tf)?;
    let scaled = |s: f64| zi.iter().map(|z| z * s).collect::<Vec<_>>();

    let forward = lfilter(tf, &ext, &scaled(ext[0]));
    let mut reversed: Vec<f64> = forward.into_iter().rev().collect();
    let backward = lfilter(tf, &reversed, &scaled(reversed[0]));
    reversed.clear();

    let mut y: Vec<f64> = backward.into_iter().rev().collect();
    y.truncate(pad + n);
    y.drain(..pad);
    Ok(y)
}

// =====================
// Vertical acceleration
// =====================

#[derive(Clone, Debug)]
pub struct VerticalSignal {
    /// Filtered `az` minus its own mean, aligned with the input rows.
    pub vertical_accel: Vec<f64>,
    /// Inferred rate; never altered by cutoff clamping.
    pub sampling_rate: f64,
    /// Cutoff the filter actually ran with.
    pub cutoff_freq: f64,
}

pub fn extract_vertical(time: &[f64], az: &[f64], cutoff_freq: f64) -> Result<VerticalSignal> {
    let rate = sampling_rate(time)?;
    log::info!("Sampling rate: {:.2} Hz", rate);

    let cutoff = effective_cutoff(cutoff_freq, rate);
    if cutoff != cutoff_freq {
        log::warn!(
            "Cutoff {:.2} Hz is not below Nyquist ({:.2} Hz), clamped to {:.2} Hz",
            cutoff_freq,
            rate / 2.0,
            cutoff
        );
    }

    let tf = butter_lowpass(FILTER_ORDER, cutoff / (rate / 2.0))?;
    let filtered = filtfilt(&tf, az)?;

    let mean = filtered.iter().sum::<f64>() / filtered.len() as f64;
    let vertical_accel = filtered.into_iter().map(|v| v - mean).collect();

    Ok(VerticalSignal { vertical_accel, sampling_rate: rate, cutoff_freq: cutoff })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn ramp_time(n: usize, dt: f64) -> Vec<f64> {
        (0..n).map(|i| i as f64 * dt).collect()
    }

    #[test]
    fn median_even_and_odd() {
        assert_eq!(median(&[3.0, 1.0, 2.0]), Some(2.0));
        assert_eq!(median(&[4.0, 1.0, 2.0, 3.0]), Some(2.5));
        assert_eq!(median(&[]), None);
    }

    #[test]
    fn sampling_rate_from_median_delta() {
        let mut t = ramp_time(50, 0.1);
        // a single dropout does not move the median
        t[30] += 0.05;
        assert_relative_eq!(sampling_rate(&t).unwrap(), 10.0, epsilon = 1e-9);
    }

    #[test]
    fn duplicate_timestamps_are_degenerate() {
        let t = vec![0.0; 20];
        assert!(matches!(sampling_rate(&t), Err(IriError::Computation(_))));
    }

    #[test]
    fn cutoff_clamps_only_at_or_above_nyquist() {
        assert_eq!(effective_cutoff(10.0, 100.0), 10.0);
        assert_relative_eq!(effective_cutoff(10.0, 8.0), 3.6, epsilon = 1e-12);
        assert_relative_eq!(effective_cutoff(5.0, 10.0), 4.5, epsilon = 1e-12);
    }

    #[test]
    fn butterworth_has_unit_dc_gain_and_expected_shape() {
        let tf = butter_lowpass(4, 0.2).unwrap();
        assert_eq!(tf.b.len(), 5);
        assert_eq!(tf.a.len(), 5);
        assert_relative_eq!(tf.a[0], 1.0);
        let gain = tf.b.iter().sum::<f64>() / tf.a.iter().sum::<f64>();
        assert_relative_eq!(gain, 1.0, epsilon = 1e-12);
        // numerator is proportional to (1 + z^-1)^4
        let ratios = [1.0, 4.0, 6.0, 4.0, 1.0];
        for (bi, r) in tf.b.iter().zip(ratios) {
            assert_relative_eq!(bi / tf.b[0], r, epsilon = 1e-9);
        }
    }

    #[test]
    fn butterworth_rejects_invalid_cutoff() {
        assert!(butter_lowpass(4, 1.0).is_err());
        assert!(butter_lowpass(4, 0.0).is_err());
        assert!(butter_lowpass(3, 0.5).is_ok());
    }

    #[test]
    fn steady_state_holds_a_constant_input() {
        let tf = butter_lowpass(4, 0.3).unwrap();
        let zi = lfilter_zi(&tf).unwrap();
        let y = lfilter(&tf, &[2.0; 40], &zi.iter().map(|z| z * 2.0).collect::<Vec<_>>());
        for v in y {
            assert_relative_eq!(v, 2.0, epsilon = 1e-9);
        }
    }

    #[test]
    fn filtfilt_preserves_constant_and_length() {
        let tf = butter_lowpass(4, 0.2).unwrap();
        let x = vec![9.81; 64];
        let y = filtfilt(&tf, &x).unwrap();
        assert_eq!(y.len(), x.len());
        for v in y {
            assert_relative_eq!(v, 9.81, epsilon = 1e-9);
        }
    }

    #[test]
    fn filtfilt_rejects_short_signal() {
        let tf = butter_lowpass(4, 0.2).unwrap();
        assert_eq!(filtfilt_padlen(&tf), 15);
        assert!(filtfilt(&tf, &[0.0; 15]).is_err());
        assert!(filtfilt(&tf, &[0.0; 16]).is_ok());
    }

    #[test]
    fn filtfilt_attenuates_high_frequency_without_lag() {
        let fs = 100.0;
        let t = ramp_time(1000, 1.0 / fs);
        let slow: Vec<f64> = t.iter().map(|t| (2.0 * PI * 1.0 * t).sin()).collect();
        let x: Vec<f64> = t
            .iter()
            .zip(&slow)
            .map(|(t, s)| s + 0.5 * (2.0 * PI * 40.0 * t).sin())
            .collect();

        let tf = butter_lowpass(4, 10.0 / (fs / 2.0)).unwrap();
        let y = filtfilt(&tf, &x).unwrap();

        // away from the edges the 1 Hz component passes in phase
        let err = y[100..900]
            .iter()
            .zip(&slow[100..900])
            .map(|(a, b)| (a - b).abs())
            .fold(0.0, f64::max);
        assert!(err < 0.02, "max deviation {err}");
    }

    #[test]
    fn vertical_signal_has_zero_mean_and_reports_unclamped_rate() {
        let t = ramp_time(200, 0.125); // 8 Hz
        let az: Vec<f64> = t.iter().map(|t| 9.81 + (2.0 * PI * 0.5 * t).sin()).collect();
        let v = extract_vertical(&t, &az, 10.0).unwrap();
        assert_relative_eq!(v.sampling_rate, 8.0, epsilon = 1e-9);
        assert_relative_eq!(v.cutoff_freq, 3.6, epsilon = 1e-9);
        assert_eq!(v.vertical_accel.len(), 200);
        let mean = v.vertical_accel.iter().sum::<f64>() / 200.0;
        assert!(mean.abs() < 1e-9);
    }
}
