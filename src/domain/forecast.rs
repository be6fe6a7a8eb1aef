use serde::{Deserialize, Serialize};
use tracing::warn;

/// Parse a comma separated list of floats, skipping entries that are not numbers.
///
/// Non-finite values (`nan`, `inf`) are dropped as well. An empty result means the
/// caller should treat the forecast as absent.
pub fn parse_forecast_csv(raw: &str) -> Vec<f64> {
    let mut values = Vec::new();
    for (index, entry) in raw.split(',').enumerate() {
        let entry = entry.trim();
        if entry.is_empty() {
            continue;
        }
        match entry.parse::<f64>() {
            Ok(value) if value.is_finite() => values.push(value),
            _ => warn!(index, entry, "skipping unparseable forecast entry"),
        }
    }
    values
}

/// A forecast hour that is both cold and expensive
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PreboostPeak {
    /// Hours from now until the peak starts
    pub hour_offset: usize,
    /// 0.5 (mild) to 3.0 (severe)
    pub severity: f64,
    pub combined_score: f64,
    pub duration_hours: usize,
    pub temperature_c: f64,
    pub price: f64,
}

/// Lead time window, in hours before a peak, in which pre-heating should start
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AdvanceWindow {
    pub min_hours: f64,
    pub max_hours: f64,
}

impl AdvanceWindow {
    pub fn contains(&self, hours: f64) -> bool {
        hours >= self.min_hours && hours <= self.max_hours
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_skips_garbage() {
        assert_eq!(
            parse_forecast_csv("1.5, -2,abc,, 3e0 ,nan"),
            vec![1.5, -2.0, 3.0]
        );
    }

    #[test]
    fn test_parse_empty() {
        assert!(parse_forecast_csv("").is_empty());
        assert!(parse_forecast_csv(" , ,x").is_empty());
    }

    #[test]
    fn test_window_bounds_inclusive() {
        let window = AdvanceWindow {
            min_hours: 1.0,
            max_hours: 3.0,
        };
        assert!(window.contains(1.0));
        assert!(window.contains(3.0));
        assert!(!window.contains(0.5));
        assert!(!window.contains(3.5));
    }
}
