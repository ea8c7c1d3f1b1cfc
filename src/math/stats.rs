//! NaN-ignoring summary statistics.

/// Mean over the non-NaN entries; NaN when there are none.
pub fn nan_mean(values: &[f64]) -> f64 {
    let (sum, n) = values
        .iter()
        .filter(|v| !v.is_nan())
        .fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    if n == 0 { f64::NAN } else { sum / n as f64 }
}

/// Population standard deviation over the non-NaN entries; NaN when there are none.
pub fn nan_std(values: &[f64]) -> f64 {
    let mean = nan_mean(values);
    if mean.is_nan() {
        return f64::NAN;
    }
    let (sq, n) = values
        .iter()
        .filter(|v| !v.is_nan())
        .fold((0.0, 0usize), |(s, n), v| (s + (v - mean) * (v - mean), n + 1));
    (sq / n as f64).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ignores_nan_entries() {
        let v = [1.0, f64::NAN, 3.0];
        assert_eq!(nan_mean(&v), 2.0);
        assert_eq!(nan_std(&v), 1.0);
    }

    #[test]
    fn all_nan_is_nan() {
        assert!(nan_mean(&[f64::NAN]).is_nan());
        assert!(nan_std(&[]).is_nan());
    }
}
