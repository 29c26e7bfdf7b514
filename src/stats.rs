//! Population statistics helpers
//!
//! Durations are milliseconds and can span days, so everything here works in
//! `f64`. Variance takes an explicit centre because the classifier measures
//! spread around a baseline-adjusted mean rather than the raw mean.

/// Arithmetic mean, `None` for an empty slice
pub fn mean(samples: &[f64]) -> Option<f64> {
    if samples.is_empty() {
        return None;
    }
    Some(samples.iter().sum::<f64>() / samples.len() as f64)
}

/// Population variance (divide by n) around `centre`
pub fn variance_about(samples: &[f64], centre: f64) -> Option<f64> {
    if samples.is_empty() {
        return None;
    }
    let sum_sq: f64 = samples.iter().map(|&x| (x - centre).powi(2)).sum();
    Some(sum_sq / samples.len() as f64)
}

/// Population standard deviation around `centre`
pub fn stddev_about(samples: &[f64], centre: f64) -> Option<f64> {
    variance_about(samples, centre).map(f64::sqrt)
}

/// Linear-interpolated percentile (`p` in [0, 100]) of `samples`
///
/// Matches the default "linear" method used by numpy.
pub fn percentile(samples: &[f64], p: f64) -> Option<f64> {
    if samples.is_empty() || !(0.0..=100.0).contains(&p) {
        return None;
    }

    let mut sorted = samples.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

    let rank = p / 100.0 * (sorted.len() - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    let weight = rank - lower as f64;

    Some(sorted[lower] + (sorted[upper] - sorted[lower]) * weight)
}

/// Summary of a transition population, for reporting
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct PopulationSummary {
    pub count: usize,
    pub mean: f64,
    pub stddev: f64,
    pub min: f64,
    pub median: f64,
    pub p90: f64,
    pub max: f64,
}

impl PopulationSummary {
    pub fn from_samples(samples: &[f64]) -> Option<Self> {
        let mean = mean(samples)?;
        Some(Self {
            count: samples.len(),
            mean,
            stddev: stddev_about(samples, mean)?,
            min: percentile(samples, 0.0)?,
            median: percentile(samples, 50.0)?,
            p90: percentile(samples, 90.0)?,
            max: percentile(samples, 100.0)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mean_basic() {
        assert_eq!(mean(&[1.0, 2.0, 3.0, 4.0]), Some(2.5));
        assert_eq!(mean(&[]), None);
    }

    #[test]
    fn test_variance_about_own_mean() {
        // mean=5, variance = (9 + 1 + 1 + 9) / 4 = 5
        let v = variance_about(&[2.0, 4.0, 6.0, 8.0], 5.0).unwrap();
        assert!((v - 5.0).abs() < 1e-12);
    }

    #[test]
    fn test_variance_about_shifted_centre_is_larger() {
        let data = [2.0, 4.0, 6.0, 8.0];
        let own = variance_about(&data, 5.0).unwrap();
        let shifted = variance_about(&data, 10.0).unwrap();
        // Shift adds (10 - 5)^2
        assert!((shifted - (own + 25.0)).abs() < 1e-12);
    }

    #[test]
    fn test_stddev_constant() {
        assert_eq!(stddev_about(&[7.0, 7.0, 7.0], 7.0), Some(0.0));
    }

    #[test]
    fn test_percentile_linear() {
        let data = [1.0, 2.0, 3.0, 4.0, 5.0];
        assert_eq!(percentile(&data, 0.0), Some(1.0));
        assert_eq!(percentile(&data, 50.0), Some(3.0));
        assert_eq!(percentile(&data, 100.0), Some(5.0));
        // rank = 0.2 * 4 = 0.8
        assert!((percentile(&data, 20.0).unwrap() - 1.8).abs() < 1e-12);
        assert_eq!(percentile(&data, 101.0), None);
    }

    #[test]
    fn test_percentile_unsorted_input() {
        assert_eq!(percentile(&[9.0, 1.0, 5.0], 50.0), Some(5.0));
    }

    #[test]
    fn test_population_summary() {
        let summary = PopulationSummary::from_samples(&[10.0, 20.0, 30.0]).unwrap();
        assert_eq!(summary.count, 3);
        assert_eq!(summary.mean, 20.0);
        assert_eq!(summary.min, 10.0);
        assert_eq!(summary.median, 20.0);
        assert_eq!(summary.max, 30.0);
        assert!(PopulationSummary::from_samples(&[]).is_none());
    }
}
