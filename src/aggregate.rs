// src/aggregate.rs - Per-image fiber tables, outlier fences and summary rows

use crate::statistics::{mean, median, tukey_fence};

/// One row of the per-image fiber table
#[derive(Debug, Clone, PartialEq)]
pub struct FiberSummary {
    /// Mean of the trimmed window curvatures, `None` if no window fit
    pub curv_mean: Option<f64>,
    pub curv_median: Option<f64>,
    /// Element length in physical units
    pub length: f64,
}

impl FiberSummary {
    /// Columns in table order: `curv_mean`, `curv_median`, `length`
    pub fn columns(&self) -> [Option<f64>; 3] {
        [self.curv_mean, self.curv_median, Some(self.length)]
    }

    /// Every column is defined and finite
    pub fn is_complete(&self) -> bool {
        self.columns().iter().all(|c| c.map_or(false, f64::is_finite))
    }
}

/// One row of the batch summary table
#[derive(Debug, Clone, PartialEq)]
pub struct ImageSummary {
    pub id: String,
    pub curv_mean_mean: Option<f64>,
    pub curv_mean_median: Option<f64>,
    pub curv_median_mean: Option<f64>,
    pub curv_median_median: Option<f64>,
    pub length_mean: Option<f64>,
    pub length_median: Option<f64>,
    /// Fibers left after outlier removal
    pub hair_count: usize,
}

/// Drop fibers outside the Tukey fence of any column, then fibers with an
/// undefined column.
///
/// Fences are computed per column over the values defined in that column.
pub fn trim_fiber_outliers(fibers: &[FiberSummary]) -> Vec<FiberSummary> {
    let fences: Vec<Option<(f64, f64)>> = (0..3)
        .map(|column| {
            let values: Vec<f64> = fibers
                .iter()
                .filter_map(|f| f.columns()[column])
                .filter(|v| v.is_finite())
                .collect();
            tukey_fence(&values)
        })
        .collect();

    let kept: Vec<FiberSummary> = fibers
        .iter()
        .filter(|fiber| {
            fiber.columns().iter().zip(&fences).all(|(value, fence)| match (value, fence) {
                (Some(v), Some((low, high))) => *v >= *low && *v <= *high,
                _ => true,
            })
        })
        .filter(|fiber| fiber.is_complete())
        .cloned()
        .collect();

    log::debug!("Kept {} of {} fibers after outlier removal", kept.len(), fibers.len());
    kept
}

/// Mean and median of each column of an already trimmed fiber table
pub fn summarize_image(id: &str, trimmed: &[FiberSummary]) -> ImageSummary {
    let column = |i: usize| -> Vec<f64> { trimmed.iter().filter_map(|f| f.columns()[i]).collect() };
    let (curv_mean, curv_median, length) = (column(0), column(1), column(2));

    ImageSummary {
        id: id.to_string(),
        curv_mean_mean: mean(&curv_mean),
        curv_mean_median: median(&curv_mean),
        curv_median_mean: mean(&curv_median),
        curv_median_median: median(&curv_median),
        length_mean: mean(&length),
        length_median: median(&length),
        hair_count: trimmed.len(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    fn fiber(curv: f64, length: f64) -> FiberSummary {
        FiberSummary {
            curv_mean: Some(curv),
            curv_median: Some(curv),
            length,
        }
    }

    #[test]
    fn extreme_fiber_is_fenced_out() {
        let mut fibers: Vec<FiberSummary> = (0..10).map(|i| fiber(0.02 + i as f64 * 0.001, 1.0)).collect();
        fibers.push(fiber(5.0, 1.0));

        let trimmed = trim_fiber_outliers(&fibers);
        assert_eq!(trimmed.len(), 10);
        assert!(trimmed.iter().all(|f| f.curv_mean.unwrap() < 1.0));
    }

    #[test]
    fn undefined_rows_are_dropped_after_fencing() {
        let fibers = vec![
            fiber(0.1, 2.0),
            fiber(0.1, 2.0),
            FiberSummary { curv_mean: None, curv_median: None, length: 2.0 },
        ];
        let trimmed = trim_fiber_outliers(&fibers);
        assert_eq!(trimmed.len(), 2);
        assert!(trimmed.iter().all(FiberSummary::is_complete));
    }

    #[test]
    fn trimming_never_adds_rows() {
        let mut fibers: Vec<FiberSummary> = (0..40)
            .map(|i| fiber(((i * 37) % 23) as f64 * 0.01, ((i * 11) % 7) as f64 + 0.5))
            .collect();
        fibers.push(fiber(3.0, 2.5));
        fibers.push(fiber(0.1, 250.0));
        fibers.push(FiberSummary { curv_mean: Some(0.05), curv_median: Some(-4.0), length: 1.5 });

        let trimmed = trim_fiber_outliers(&fibers);
        assert!(trimmed.len() < fibers.len());
        // Trimming a trimmed table can only shrink it further
        assert!(trim_fiber_outliers(&trimmed).len() <= trimmed.len());
        for f in &trimmed {
            assert!(fibers.contains(f));
        }

        // Every kept value lies inside its column's fence over the input
        for column in 0..3 {
            let values: Vec<f64> = fibers.iter().filter_map(|f| f.columns()[column]).collect();
            let (low, high) = tukey_fence(&values).unwrap();
            for f in &trimmed {
                let v = f.columns()[column].unwrap();
                assert!(v >= low && v <= high, "column {} value {} outside [{}, {}]", column, v, low, high);
            }
        }
    }

    #[test]
    fn summary_statistics() {
        let trimmed = vec![fiber(0.1, 1.0), fiber(0.2, 2.0), fiber(0.6, 6.0)];
        let summary = summarize_image("img", &trimmed);

        assert_eq!(summary.id, "img");
        assert_eq!(summary.hair_count, 3);
        assert_approx_eq!(summary.curv_mean_mean.unwrap(), 0.3);
        assert_approx_eq!(summary.curv_median_median.unwrap(), 0.2);
        assert_approx_eq!(summary.length_mean.unwrap(), 3.0);
        assert_approx_eq!(summary.length_median.unwrap(), 2.0);
    }

    #[test]
    fn empty_image_has_undefined_statistics() {
        let summary = summarize_image("blank", &[]);
        assert_eq!(summary.hair_count, 0);
        assert!(summary.curv_mean_mean.is_none());
        assert!(summary.length_median.is_none());
    }
}
