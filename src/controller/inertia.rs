use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tracing::debug;

use crate::config::InertiaConfig;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
struct Sample {
    at: DateTime<Utc>,
    indoor: f64,
    outdoor: f64,
}

/// Rough thermal inertia estimate learned from how indoor temperature
/// follows outdoor temperature.
///
/// Every `update_interval_minutes` the ratio of indoor to outdoor change is
/// blended into a moving average. Callers pause learning while the heat pump
/// is actively steered (pre-boost, braking), because the indoor response then
/// reflects the steering rather than the building.
#[derive(Debug, Clone, Serialize)]
pub struct InertiaEstimator {
    #[serde(skip)]
    cfg: InertiaConfig,
    value: f64,
    last: Option<Sample>,
}

impl InertiaEstimator {
    pub fn new(cfg: InertiaConfig) -> Self {
        Self {
            value: cfg.default_value,
            cfg,
            last: None,
        }
    }

    pub fn value(&self) -> f64 {
        self.value
    }

    /// Feed one reading; returns the (possibly unchanged) estimate
    pub fn observe(&mut self, at: DateTime<Utc>, indoor: f64, outdoor: f64, paused: bool) -> f64 {
        if !indoor.is_finite() || !outdoor.is_finite() {
            return self.value;
        }

        let Some(last) = self.last else {
            self.last = Some(Sample { at, indoor, outdoor });
            return self.value;
        };

        if at - last.at < Duration::minutes(self.cfg.update_interval_minutes) {
            return self.value;
        }
        self.last = Some(Sample { at, indoor, outdoor });

        if paused {
            debug!("inertia learning paused");
            return self.value;
        }

        let d_outdoor = outdoor - last.outdoor;
        if d_outdoor.abs() < self.cfg.min_outdoor_delta {
            return self.value;
        }

        let limit = self.cfg.contribution_limit;
        let contribution = ((indoor - last.indoor) / d_outdoor).clamp(-limit, limit);
        let weight = self.cfg.history_weight;
        self.value = ((weight * self.value + contribution) / (weight + 1.0)).clamp(0.0, self.cfg.max_value);

        debug!(inertia = self.value, contribution, "inertia estimate updated");
        self.value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(minutes: i64) -> DateTime<Utc> {
        "2025-01-10T00:00:00Z".parse::<DateTime<Utc>>().unwrap() + Duration::minutes(minutes)
    }

    #[test]
    fn test_starts_at_default() {
        let mut est = InertiaEstimator::new(InertiaConfig::default());
        assert_eq!(est.value(), 1.0);
        assert_eq!(est.observe(t(0), 21.0, 0.0, false), 1.0);
    }

    #[test]
    fn test_updates_after_interval() {
        let mut est = InertiaEstimator::new(InertiaConfig::default());
        est.observe(t(0), 21.0, 0.0, false);
        // too soon
        assert_eq!(est.observe(t(5), 22.0, 1.0, false), 1.0);
        // contribution (22 - 21) / (2 - 0) = 0.5, (4 * 1 + 0.5) / 5 = 0.9
        let value = est.observe(t(10), 22.0, 2.0, false);
        assert!((value - 0.9).abs() < 1e-12);
    }

    #[test]
    fn test_small_outdoor_change_is_ignored() {
        let mut est = InertiaEstimator::new(InertiaConfig::default());
        est.observe(t(0), 21.0, 0.0, false);
        assert_eq!(est.observe(t(15), 25.0, 0.05, false), 1.0);
    }

    #[test]
    fn test_paused_learning_keeps_value() {
        let mut est = InertiaEstimator::new(InertiaConfig::default());
        est.observe(t(0), 21.0, 0.0, false);
        assert_eq!(est.observe(t(15), 25.0, 1.0, true), 1.0);
    }

    #[test]
    fn test_value_stays_in_range() {
        let mut est = InertiaEstimator::new(InertiaConfig::default());
        est.observe(t(0), 21.0, 0.0, false);
        let mut indoor = 21.0;
        let mut outdoor = 0.0;
        for step in 1..50 {
            indoor -= 3.0;
            outdoor += 0.2;
            let value = est.observe(t(step * 10), indoor, outdoor, false);
            assert!((0.0..=5.0).contains(&value));
        }
        assert_eq!(est.value(), 0.0);
    }
}
