//! Small numeric helpers shared by the engines.

/// Round to two decimal places, the precision of every reported number.
pub fn round2(value: f64) -> f64 { (value * 100.0).round() / 100.0 }

/// Round to four decimal places; used for model scores and coefficients.
pub fn round4(value: f64) -> f64 { (value * 10_000.0).round() / 10_000.0 }

/// Arithmetic mean; 0 for an empty slice.
pub fn mean(values: &[f64]) -> f64 {
  if values.is_empty() {
    return 0.0;
  }
  values.iter().sum::<f64>() / values.len() as f64
}

/// Standard deviation with `n - 1` in the denominator; 0 when `n < 2`.
pub fn sample_std(values: &[f64]) -> f64 {
  if values.len() < 2 {
    return 0.0;
  }
  let m = mean(values);
  let ss: f64 = values.iter().map(|v| (v - m).powi(2)).sum();
  (ss / (values.len() - 1) as f64).sqrt()
}

/// Standard deviation with `n` in the denominator; 0 for an empty slice.
pub fn population_std(values: &[f64]) -> f64 {
  if values.is_empty() {
    return 0.0;
  }
  let m = mean(values);
  let ss: f64 = values.iter().map(|v| (v - m).powi(2)).sum();
  (ss / values.len() as f64).sqrt()
}

/// Quantile `q ∈ [0, 1]` with linear interpolation between closest ranks.
/// `sorted` must be ascending. Returns 0 for an empty slice.
pub fn quantile(sorted: &[f64], q: f64) -> f64 {
  match sorted.len() {
    0 => 0.0,
    1 => sorted[0],
    n => {
      let pos = q.clamp(0.0, 1.0) * (n - 1) as f64;
      let lo = pos.floor() as usize;
      let hi = pos.ceil() as usize;
      let frac = pos - lo as f64;
      sorted[lo] + (sorted[hi] - sorted[lo]) * frac
    }
  }
}

/// Ascending copy of `values` with NaNs ordered last.
pub fn sorted(values: &[f64]) -> Vec<f64> {
  let mut out = values.to_vec();
  out.sort_by(|a, b| a.total_cmp(b));
  out
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn rounding_is_half_away_from_zero() {
    assert_eq!(round2(1.005_1), 1.01);
    assert_eq!(round2(-2.345_6), -2.35);
    assert_eq!(round4(0.123_456), 0.1235);
  }

  #[test]
  fn std_variants_differ_by_denominator() {
    let v = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
    assert!((population_std(&v) - 2.0).abs() < 1e-12);
    assert!((sample_std(&v) - (32.0f64 / 7.0).sqrt()).abs() < 1e-12);
    assert_eq!(sample_std(&[3.0]), 0.0);
  }

  #[test]
  fn quantile_interpolates() {
    let v = sorted(&[4.0, 1.0, 3.0, 2.0]);
    assert_eq!(quantile(&v, 0.0), 1.0);
    assert_eq!(quantile(&v, 1.0), 4.0);
    assert!((quantile(&v, 0.25) - 1.75).abs() < 1e-12);
    assert!((quantile(&v, 0.5) - 2.5).abs() < 1e-12);
  }
}
