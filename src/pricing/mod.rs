//! Price analysis: sample classification and expensive-block detection.

pub mod blocks;
pub mod classifier;

pub use blocks::*;
pub use classifier::PriceClassifier;

/// Percentile with linear interpolation between closest ranks.
///
/// `pct` is in 0..=100; out of range values pin to the minimum or maximum.
/// Returns 0.0 for an empty slice.
pub fn percentile(values: &[f64], pct: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    if pct <= 0.0 {
        return sorted[0];
    }
    if pct >= 100.0 {
        return sorted[sorted.len() - 1];
    }

    let rank = pct / 100.0 * (sorted.len() - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    if lower == upper {
        return sorted[lower];
    }
    let weight = rank - lower as f64;
    sorted[lower] * (1.0 - weight) + sorted[upper] * weight
}

/// Median, independent of sample order. Returns 0.0 for an empty slice.
pub fn median(values: &[f64]) -> f64 {
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    crate::domain::price::median_of_sorted(&sorted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_percentile_interpolates() {
        let values = [4.0, 1.0, 3.0, 2.0];
        assert_eq!(percentile(&values, 0.0), 1.0);
        assert_eq!(percentile(&values, 100.0), 4.0);
        assert!((percentile(&values, 50.0) - 2.5).abs() < 1e-12);
        assert!((percentile(&values, 10.0) - 1.3).abs() < 1e-12);
        assert_eq!(percentile(&[], 50.0), 0.0);
    }

    #[test]
    fn test_median_even_and_odd() {
        assert_eq!(median(&[3.0, 1.0, 2.0]), 2.0);
        assert_eq!(median(&[4.0, 1.0, 3.0, 2.0]), 2.5);
        assert_eq!(median(&[]), 0.0);
    }

    proptest! {
        #[test]
        fn median_ignores_order(mut values in prop::collection::vec(-2.0f64..15.0, 1..48)) {
            let before = median(&values);
            values.reverse();
            prop_assert_eq!(before, median(&values));
            values.sort_by(f64::total_cmp);
            prop_assert_eq!(before, median(&values));
        }

        #[test]
        fn percentile_stays_within_range(
            values in prop::collection::vec(-2.0f64..15.0, 1..48),
            pct in 0.0f64..100.0,
        ) {
            let min = values.iter().copied().fold(f64::INFINITY, f64::min);
            let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
            let p = percentile(&values, pct);
            prop_assert!(p >= min - 1e-9 && p <= max + 1e-9);
        }
    }
}
