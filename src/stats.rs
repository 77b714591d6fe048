//! Robust statistics over slices of samples.

use std::cmp::Ordering;

/// The median of `values`. For an even number of values this is the mean of the
/// two middle values. Returns `None` if `values` is empty.
///
/// # Examples
///
/// ```rust
/// use artip::stats::median;
///
/// assert_eq!(median(&[10., 50., 10.]), Some(10.));
/// assert_eq!(median(&[1., 2., 3., 4.]), Some(2.5));
/// assert_eq!(median(&[]), None);
/// ```
pub fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        Some((sorted[mid - 1] + sorted[mid]) / 2.0)
    } else {
        Some(sorted[mid])
    }
}

/// The median absolute deviation of `values`, `median(|x - median(x)|)`. This is the
/// raw MAD, no normalisation constant is applied.
pub fn median_absolute_deviation(values: &[f64]) -> Option<f64> {
    let centre = median(values)?;
    let deviations: Vec<f64> = values.iter().map(|v| (v - centre).abs()).collect();
    median(&deviations)
}
