/// Arithmetic mean, `None` for an empty slice
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Median, `None` for an empty slice
pub fn median(values: &[f64]) -> Option<f64> {
    percentile(values, 50.0)
}

/// Percentile `q` (0..=100) with linear interpolation between order statistics
pub fn percentile(values: &[f64], q: f64) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    Some(percentile_sorted(&sorted, q))
}

fn percentile_sorted(sorted: &[f64], q: f64) -> f64 {
    let position = (q / 100.0).clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lower = position.floor() as usize;
    let upper = position.ceil() as usize;
    let fraction = position - lower as f64;
    sorted[lower] + (sorted[upper] - sorted[lower]) * fraction
}

/// Keep the values inside the inclusive `[lower_q, upper_q]` percentile range
pub fn trim_percentiles(values: &[f64], lower_q: f64, upper_q: f64) -> Vec<f64> {
    let (Some(low), Some(high)) = (percentile(values, lower_q), percentile(values, upper_q)) else {
        return Vec::new();
    };
    values
        .iter()
        .copied()
        .filter(|&v| v >= low && v <= high)
        .collect()
}

/// Tukey fence `[Q1 - 1.5 IQR, Q3 + 1.5 IQR]`
pub fn tukey_fence(values: &[f64]) -> Option<(f64, f64)> {
    let q1 = percentile(values, 25.0)?;
    let q3 = percentile(values, 75.0)?;
    let iqr = q3 - q1;
    Some((q1 - 1.5 * iqr, q3 + 1.5 * iqr))
}
