use tracing::{debug, warn};

use super::percentile;
use crate::config::ClassifierConfig;
use crate::domain::{ClassificationMode, PriceCategory, PriceSeries};

/// Labels forecast prices as cheap, normal, expensive and so on.
///
/// Two strategies are available: percentile breakpoints computed over the
/// series itself, and a hybrid rule comparing each sample to a trailing
/// average while letting genuinely low absolute prices count as cheap.
#[derive(Debug, Clone)]
pub struct PriceClassifier {
    cfg: ClassifierConfig,
}

impl PriceClassifier {
    pub fn new(cfg: ClassifierConfig) -> Self {
        Self { cfg }
    }

    /// Category per sample of `series`.
    ///
    /// Too few samples, or too many implausible ones, yield `unknown` throughout.
    pub fn classify(
        &self,
        series: &PriceSeries,
        history: &[f64],
        mode: ClassificationMode,
    ) -> Vec<PriceCategory> {
        let prices = series.samples();
        if !self.is_usable(prices) {
            return vec![PriceCategory::Unknown; prices.len()];
        }

        match mode {
            ClassificationMode::Percentiles => self.classify_percentiles(prices),
            ClassificationMode::Hybrid => self.classify_hybrid(prices, history),
        }
    }

    /// Category of the current interval
    pub fn classify_current(
        &self,
        series: &PriceSeries,
        history: &[f64],
        mode: ClassificationMode,
    ) -> PriceCategory {
        self.classify(series, history, mode)
            .first()
            .copied()
            .unwrap_or(PriceCategory::Unknown)
    }

    fn is_usable(&self, prices: &[f64]) -> bool {
        if prices.len() < self.cfg.min_samples {
            debug!(samples = prices.len(), "too few prices to classify");
            return false;
        }

        let implausible = self.count_implausible(prices);
        if implausible > self.cfg.max_implausible_prices {
            warn!(
                implausible,
                allowed = self.cfg.max_implausible_prices,
                "too many implausible prices, classification disabled"
            );
            return false;
        }

        let negative = prices.iter().filter(|p| **p < 0.0).count();
        if negative > 0 {
            warn!(negative, "negative prices in forecast");
        }
        let high = prices
            .iter()
            .filter(|p| **p > self.cfg.high_price_warning)
            .count();
        if high > 0 {
            warn!(high, limit = self.cfg.high_price_warning, "very high prices in forecast");
        }
        true
    }

    /// Samples outside the sane price bounds
    pub fn count_implausible(&self, prices: &[f64]) -> usize {
        prices
            .iter()
            .filter(|p| **p < self.cfg.min_sane_price || **p > self.cfg.max_sane_price)
            .count()
    }

    /// Breakpoints come from the non-negative samples only; negative prices
    /// are always very cheap.
    pub fn classify_percentiles(&self, prices: &[f64]) -> Vec<PriceCategory> {
        let positive: Vec<f64> = prices.iter().copied().filter(|p| *p >= 0.0).collect();
        if positive.is_empty() {
            return vec![PriceCategory::VeryCheap; prices.len()];
        }

        let breakpoints = [
            percentile(&positive, self.cfg.very_cheap_percentile),
            percentile(&positive, self.cfg.cheap_percentile),
            percentile(&positive, self.cfg.expensive_percentile),
            percentile(&positive, self.cfg.very_expensive_percentile),
        ];
        debug!(?breakpoints, "percentile breakpoints");

        prices
            .iter()
            .map(|&price| {
                if price < 0.0 || price < breakpoints[0] {
                    PriceCategory::VeryCheap
                } else if price < breakpoints[1] {
                    PriceCategory::Cheap
                } else if price < breakpoints[2] {
                    PriceCategory::Normal
                } else if price < breakpoints[3] {
                    PriceCategory::Expensive
                } else {
                    PriceCategory::VeryExpensive
                }
            })
            .collect()
    }

    pub fn classify_hybrid(&self, prices: &[f64], history: &[f64]) -> Vec<PriceCategory> {
        let history: Vec<f64> = history.iter().copied().filter(|p| p.is_finite()).collect();
        let average = if history.is_empty() {
            warn!("no trailing price history, using the forecast average");
            mean(prices)
        } else {
            mean(&history)
        };

        if average <= 0.0 {
            warn!(average, "trailing average not positive, falling back to percentiles");
            return self.classify_percentiles(prices);
        }

        prices
            .iter()
            .map(|&price| self.classify_against_average(price, average))
            .collect()
    }

    /// Ratio rule for a single price against a positive reference average
    pub fn classify_against_average(&self, price: f64, average: f64) -> PriceCategory {
        if price < 0.0 {
            return PriceCategory::VeryCheap;
        }
        let ratio = price / average;
        if ratio <= self.cfg.very_cheap_ratio {
            PriceCategory::VeryCheap
        } else if ratio <= self.cfg.cheap_ratio {
            PriceCategory::Cheap
        } else if ratio < self.cfg.normal_ratio {
            if price < self.cfg.absolute_cheap_limit {
                PriceCategory::Cheap
            } else {
                PriceCategory::Normal
            }
        } else if ratio < self.cfg.expensive_ratio {
            PriceCategory::Expensive
        } else if self.cfg.extreme_ratio.is_some_and(|limit| ratio >= limit) {
            PriceCategory::Extreme
        } else {
            PriceCategory::VeryExpensive
        }
    }
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}
