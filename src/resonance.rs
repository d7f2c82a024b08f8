/*
 * This file is part of Pinmap.
 *
 * Copyright (C) 2026 Pinmap contributors
 *
 * Pinmap is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * Pinmap is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with Pinmap. If not, see <https://www.gnu.org/licenses/>.
 */

use std::fs;
use std::io;
use std::path::Path;

use serde::Serialize;
use thiserror::Error;

/// Usable band of a resonance sweep; everything below is noise floor,
/// everything above is past the sample-rate window of the test.
pub const FREQ_MIN: f64 = 5.0;
pub const FREQ_MAX: f64 = 200.0;

/// Assumed damping ratio of the printer frame.
const DAMPING_RATIO: f64 = 0.1;
/// Residual vibration tolerance used by the EI shaper family (1/20).
const VIBRATION_REDUCTION: f64 = 20.0;
/// Acceleration used when reporting the smoothing score.
const REFERENCE_ACCEL: f64 = 5000.0;
/// Square-corner velocity used in the smoothing estimate.
const REFERENCE_SCV: f64 = 5.0;
/// Smoothing ceiling that bounds the recommended max_accel.
const TARGET_SMOOTHING: f64 = 0.12;
/// Shaper frequency sweep ceiling.
const MAX_SHAPER_FREQ: f64 = 150.0;

#[derive(Error, Debug)]
pub enum ResonanceError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("no frequency column in CSV header")]
    MissingFreqColumn,
    #[error("no usable samples in CSV")]
    Empty,
}

/// One (frequency, power) sample from a resonance test.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Sample {
    pub freq: f64,
    pub power: f64,
}

/// Parse a resonance-test CSV into (frequency, power) pairs.
///
/// The header row names a frequency column and one or more power-spectral-
/// density columns; PSD columns are summed per row. Malformed rows are
/// skipped, and rows outside the usable band are discarded.
pub fn parse_csv(text: &str) -> Result<Vec<Sample>, ResonanceError> {
    let mut lines = text.lines().filter(|l| !l.trim().is_empty());
    let header = lines.next().ok_or(ResonanceError::Empty)?;
    let columns: Vec<&str> = header.split(',').map(|c| c.trim()).collect();

    let freq_col = columns
        .iter()
        .position(|c| c.to_ascii_lowercase().starts_with("freq"))
        .ok_or(ResonanceError::MissingFreqColumn)?;
    // Prefer the combined-axes column when present; otherwise sum the
    // per-axis PSD columns, and as a last resort everything but frequency.
    let mut power_cols: Vec<usize> = columns
        .iter()
        .enumerate()
        .filter(|(_, c)| matches!(c.to_ascii_lowercase().as_str(), "psd" | "psd_xyz"))
        .map(|(i, _)| i)
        .collect();
    if power_cols.is_empty() {
        power_cols = columns
            .iter()
            .enumerate()
            .filter(|(_, c)| c.to_ascii_lowercase().starts_with("psd"))
            .map(|(i, _)| i)
            .collect();
    }
    if power_cols.is_empty() {
        power_cols = (0..columns.len()).filter(|&i| i != freq_col).collect();
    }

    let mut samples = Vec::new();
    for line in lines {
        let fields: Vec<&str> = line.split(',').map(|f| f.trim()).collect();
        let Some(freq) = fields.get(freq_col).and_then(|f| f.parse::<f64>().ok()) else {
            continue;
        };
        if !(FREQ_MIN..=FREQ_MAX).contains(&freq) {
            continue;
        }
        let mut power = 0.0;
        let mut valid = false;
        for &col in &power_cols {
            if let Some(value) = fields.get(col).and_then(|f| f.parse::<f64>().ok()) {
                power += value;
                valid = true;
            }
        }
        if valid && power.is_finite() && power >= 0.0 {
            samples.push(Sample { freq, power });
        }
    }

    if samples.is_empty() {
        return Err(ResonanceError::Empty);
    }
    Ok(samples)
}

pub fn load_csv_file(path: &Path) -> Result<Vec<Sample>, ResonanceError> {
    let text = fs::read_to_string(path)?;
    parse_csv(&text)
}

/// One shaper candidate evaluated against the measured spectrum.
#[derive(Debug, Clone, Serialize)]
pub struct ShaperResult {
    #[serde(rename = "type")]
    pub kind: String,
    pub freq: f64,
    pub vibration: f64,
    pub smoothing: f64,
    pub max_accel: f64,
}

/// Ranked shaper report for one resonance sweep.
#[derive(Debug, Serialize)]
pub struct ShaperReport {
    pub shapers: Vec<ShaperResult>,
    pub recommended: Option<String>,
}

/// Shaper impulse train: amplitudes and firing times for a filter tuned to
/// `freq`. These are the standard ZV / EI input-shaper definitions.
fn shaper_pulses(kind: &str, freq: f64) -> (Vec<f64>, Vec<f64>) {
    let zeta = DAMPING_RATIO;
    let df = (1.0 - zeta * zeta).sqrt();
    let k = (-zeta * std::f64::consts::PI / df).exp();
    let t_d = 1.0 / (freq * df);
    let v_tol = 1.0 / VIBRATION_REDUCTION;
    match kind {
        "zv" => (vec![1.0, k], vec![0.0, 0.5 * t_d]),
        "mzv" => {
            let k = (-0.75 * zeta * std::f64::consts::PI / df).exp();
            let a1 = 1.0 - 1.0 / 2f64.sqrt();
            let a2 = (2f64.sqrt() - 1.0) * k;
            let a3 = a1 * k * k;
            (vec![a1, a2, a3], vec![0.0, 0.375 * t_d, 0.75 * t_d])
        }
        "ei" => {
            let a1 = 0.25 * (1.0 + v_tol);
            let a2 = 0.5 * (1.0 - v_tol) * k;
            let a3 = a1 * k * k;
            (vec![a1, a2, a3], vec![0.0, 0.5 * t_d, t_d])
        }
        "2hump_ei" => {
            let v2 = v_tol * v_tol;
            let x = (v2 * ((1.0 - v2).sqrt() + 1.0)).powf(1.0 / 3.0);
            let a1 = (3.0 * x * x + 2.0 * x + 3.0 * v2) / (16.0 * x);
            let a2 = (0.5 - a1) * k;
            let a3 = a2 * k;
            let a4 = a1 * k * k * k;
            (vec![a1, a2, a3, a4], vec![0.0, 0.5 * t_d, t_d, 1.5 * t_d])
        }
        "3hump_ei" => {
            let k2 = k * k;
            let a1 = 0.0625 * (1.0 + 3.0 * v_tol + 2.0 * (2.0 * (v_tol + 1.0) * v_tol).sqrt());
            let a2 = 0.25 * (1.0 - v_tol) * k;
            let a3 = (0.5 * (1.0 + v_tol) - 2.0 * a1) * k2;
            let a4 = a2 * k2;
            let a5 = a1 * k2 * k2;
            (vec![a1, a2, a3, a4, a5], vec![0.0, 0.5 * t_d, t_d, 1.5 * t_d, 2.0 * t_d])
        }
        _ => (vec![1.0], vec![0.0]),
    }
}

/// Residual oscillation amplitude ratio of the shaped system at one test
/// frequency (0 = fully cancelled, 1 = unshaped).
fn shaper_response(amplitudes: &[f64], times: &[f64], test_freq: f64) -> f64 {
    let inv_d = 1.0 / amplitudes.iter().sum::<f64>();
    let omega = 2.0 * std::f64::consts::PI * test_freq;
    let omega_d = omega * (1.0 - DAMPING_RATIO * DAMPING_RATIO).sqrt();
    let t_last = times.last().copied().unwrap_or(0.0);
    let mut s = 0.0;
    let mut c = 0.0;
    for (a, t) in amplitudes.iter().zip(times) {
        let w = a * (-DAMPING_RATIO * omega * (t_last - t)).exp();
        s += w * (omega_d * t).sin();
        c += w * (omega_d * t).cos();
    }
    (s * s + c * c).sqrt() * inv_d
}

/// Fraction of above-threshold spectral power the shaper leaves behind.
fn remaining_vibration(amplitudes: &[f64], times: &[f64], samples: &[Sample]) -> f64 {
    let max_power = samples.iter().map(|s| s.power).fold(0.0, f64::max);
    if max_power <= 0.0 {
        return 0.0;
    }
    let threshold = max_power / VIBRATION_REDUCTION;
    let mut remaining = 0.0;
    let mut base = 0.0;
    for sample in samples {
        let response = shaper_response(amplitudes, times, sample.freq);
        remaining += (response * sample.power - threshold).max(0.0);
        base += (sample.power - threshold).max(0.0);
    }
    if base <= 0.0 {
        0.0
    } else {
        remaining / base
    }
}

/// Positional smoothing (mm) the shaper introduces at a given acceleration.
fn shaper_smoothing(amplitudes: &[f64], times: &[f64], accel: f64) -> f64 {
    let half_accel = accel * 0.5;
    let inv_d = 1.0 / amplitudes.iter().sum::<f64>();
    let ts: f64 =
        amplitudes.iter().zip(times).map(|(a, t)| a * t).sum::<f64>() * inv_d;
    let mut offset_90 = 0.0;
    let mut offset_180 = 0.0;
    for (a, t) in amplitudes.iter().zip(times) {
        let dt = t - ts;
        if dt >= 0.0 {
            offset_90 += a * (REFERENCE_SCV + half_accel * dt) * dt;
        }
        offset_180 += a * half_accel * dt * dt;
    }
    offset_90 *= inv_d * 2f64.sqrt();
    offset_180 *= inv_d;
    offset_90.max(offset_180)
}

/// Largest acceleration that keeps smoothing under the target, rounded down
/// to a 100 mm/s^2 step. Smoothing grows monotonically with acceleration.
fn shaper_max_accel(amplitudes: &[f64], times: &[f64]) -> f64 {
    let (mut lo, mut hi) = (0.0_f64, 100_000.0_f64);
    if shaper_smoothing(amplitudes, times, hi) <= TARGET_SMOOTHING {
        return hi;
    }
    for _ in 0..40 {
        let mid = 0.5 * (lo + hi);
        if shaper_smoothing(amplitudes, times, mid) <= TARGET_SMOOTHING {
            lo = mid;
        } else {
            hi = mid;
        }
    }
    (lo / 100.0).floor() * 100.0
}

/// (name, lowest useful shaper frequency)
const SHAPER_CONFIGS: &[(&str, f64)] = &[
    ("zv", 21.0),
    ("mzv", 23.0),
    ("ei", 29.0),
    ("2hump_ei", 39.0),
    ("3hump_ei", 48.0),
];

/// Evaluate the closed shaper set against a spectrum and rank the results.
///
/// For each shaper the candidate frequency minimizing remaining vibration
/// wins; across shapers the ranking applies a small smoothing penalty so a
/// heavy filter only wins when it buys real vibration reduction.
pub fn recommend_shapers(samples: &[Sample]) -> Vec<ShaperResult> {
    if samples.is_empty() {
        return Vec::new();
    }
    let mut results = Vec::new();
    for (kind, min_freq) in SHAPER_CONFIGS {
        let mut best: Option<(f64, f64)> = None; // (freq, vibration)
        let mut freq = *min_freq;
        while freq <= MAX_SHAPER_FREQ {
            let (amplitudes, times) = shaper_pulses(kind, freq);
            let vibration = remaining_vibration(&amplitudes, &times, samples);
            match best {
                Some((_, best_vibration)) if vibration >= best_vibration => {}
                _ => best = Some((freq, vibration)),
            }
            freq += 1.0;
        }
        if let Some((freq, vibration)) = best {
            let (amplitudes, times) = shaper_pulses(kind, freq);
            results.push(ShaperResult {
                kind: kind.to_string(),
                freq,
                vibration: round_to(vibration, 1e4),
                smoothing: round_to(shaper_smoothing(&amplitudes, &times, REFERENCE_ACCEL), 1e4),
                max_accel: shaper_max_accel(&amplitudes, &times),
            });
        }
    }
    results.sort_by(|a, b| {
        let score_a = a.vibration + 0.05 * a.smoothing;
        let score_b = b.vibration + 0.05 * b.smoothing;
        score_a.partial_cmp(&score_b).unwrap_or(std::cmp::Ordering::Equal)
    });
    results
}

pub fn build_report(samples: &[Sample]) -> ShaperReport {
    let shapers = recommend_shapers(samples);
    let recommended = shapers.first().map(|s| s.kind.clone());
    ShaperReport { shapers, recommended }
}

fn round_to(value: f64, scale: f64) -> f64 {
    (value * scale).round() / scale
}

#[cfg(test)]
mod tests {
    use super::*;

    fn synthetic_peak(center: f64) -> Vec<Sample> {
        // Gaussian power peak over the usable band, 1 Hz resolution.
        (5..=200)
            .map(|f| {
                let freq = f as f64;
                let d = (freq - center) / 6.0;
                Sample { freq, power: 1e6 * (-d * d).exp() }
            })
            .collect()
    }

    #[test]
    fn test_parse_csv_prefers_combined_axes_column() {
        let csv = "freq,psd_x,psd_y,psd_z,psd_xyz\n10.0,1.0,2.0,3.0,6.0\n50.0,4.0,4.0,4.0,12.0\n";
        let samples = parse_csv(csv).unwrap();
        assert_eq!(samples.len(), 2);
        assert_eq!(samples[0].freq, 10.0);
        assert_eq!(samples[0].power, 6.0);
        assert_eq!(samples[1].power, 12.0);
    }

    #[test]
    fn test_parse_csv_sums_per_axis_columns() {
        let csv = "freq,psd_x,psd_y,psd_z\n10.0,1.0,2.0,3.0\n";
        let samples = parse_csv(csv).unwrap();
        assert_eq!(samples[0].power, 6.0);
    }

    #[test]
    fn test_parse_csv_band_limits() {
        let csv = "freq,psd_xyz\n1.0,5.0\n50.0,5.0\n400.0,5.0\n";
        let samples = parse_csv(csv).unwrap();
        assert_eq!(samples.len(), 1);
        assert_eq!(samples[0].freq, 50.0);
    }

    #[test]
    fn test_parse_csv_skips_malformed_rows() {
        let csv = "freq,psd_xyz\nnot_a_number,1.0\n50.0,oops\n60.0,2.5\n";
        let samples = parse_csv(csv).unwrap();
        assert_eq!(samples.len(), 1);
        assert_eq!(samples[0].freq, 60.0);
    }

    #[test]
    fn test_parse_csv_missing_freq_column() {
        let err = parse_csv("a,b\n1,2\n").unwrap_err();
        assert!(matches!(err, ResonanceError::MissingFreqColumn));
    }

    #[test]
    fn test_parse_csv_no_samples() {
        let err = parse_csv("freq,psd_xyz\n").unwrap_err();
        assert!(matches!(err, ResonanceError::Empty));
    }

    #[test]
    fn test_shaper_response_notch_at_tuned_freq() {
        let (a, t) = shaper_pulses("zv", 50.0);
        let at_notch = shaper_response(&a, &t, 50.0);
        let off_notch = shaper_response(&a, &t, 100.0);
        assert!(at_notch < 0.1, "at_notch={}", at_notch);
        assert!(at_notch < off_notch);
    }

    #[test]
    fn test_recommendations_cover_all_shapers() {
        let results = recommend_shapers(&synthetic_peak(50.0));
        assert_eq!(results.len(), 5);
        let kinds: Vec<&str> = results.iter().map(|r| r.kind.as_str()).collect();
        for kind in ["zv", "mzv", "ei", "2hump_ei", "3hump_ei"] {
            assert!(kinds.contains(&kind), "missing {}", kind);
        }
    }

    #[test]
    fn test_recommended_freq_tracks_peak() {
        for center in [45.0, 60.0, 80.0] {
            let results = recommend_shapers(&synthetic_peak(center));
            let zv = results.iter().find(|r| r.kind == "zv").unwrap();
            assert!(
                (zv.freq - center).abs() < 15.0,
                "peak {} -> zv freq {}",
                center,
                zv.freq
            );
        }
    }

    #[test]
    fn test_results_are_ranked() {
        let results = recommend_shapers(&synthetic_peak(50.0));
        let scores: Vec<f64> =
            results.iter().map(|r| r.vibration + 0.05 * r.smoothing).collect();
        for pair in scores.windows(2) {
            assert!(pair[0] <= pair[1] + 1e-9);
        }
    }

    #[test]
    fn test_report_shape() {
        let report = build_report(&synthetic_peak(50.0));
        assert_eq!(report.recommended.as_deref(), Some(report.shapers[0].kind.as_str()));
        for shaper in &report.shapers {
            assert!(shaper.freq >= 21.0 && shaper.freq <= 150.0);
            assert!((0.0..=1.0).contains(&shaper.vibration));
            assert!(shaper.smoothing >= 0.0);
            assert!(shaper.max_accel >= 0.0);
            assert_eq!(shaper.max_accel % 100.0, 0.0);
        }
    }

    #[test]
    fn test_recommendation_deterministic() {
        let samples = synthetic_peak(55.0);
        let a = serde_json::to_string(&build_report(&samples)).unwrap();
        let b = serde_json::to_string(&build_report(&samples)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_empty_samples_yield_empty_report() {
        let report = build_report(&[]);
        assert!(report.shapers.is_empty());
        assert!(report.recommended.is_none());
    }

    #[test]
    fn test_serialized_field_name_is_type() {
        let results = recommend_shapers(&synthetic_peak(50.0));
        let json = serde_json::to_string(&results[0]).unwrap();
        assert!(json.contains("\"type\""));
        assert!(!json.contains("\"kind\""));
    }
}
