use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use super::forecast::parse_forecast_csv;
use super::price::PriceCategory;

/// How forecast prices are bucketed into categories
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ClassificationMode {
    Percentiles,
    #[default]
    Hybrid,
}

/// Everything the engine reads in one cycle.
///
/// Readings are optional because the upstream sensors may be unavailable;
/// the engine reports which ones were missing instead of guessing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorSnapshot {
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
    pub indoor_temp: Option<f64>,
    pub outdoor_temp: Option<f64>,
    pub target_temp: Option<f64>,
    pub summer_threshold: Option<f64>,
    #[serde(default)]
    pub aggressiveness: f64,
    /// Thermal inertia estimate; the controller's own estimator fills in when absent
    #[serde(default)]
    pub inertia: Option<f64>,
    /// Forward prices, index 0 is the current interval
    #[serde(default)]
    pub prices: Vec<f64>,
    /// Same as `prices` but as a CSV string; used when `prices` is empty
    #[serde(default)]
    pub price_forecast: Option<String>,
    #[serde(default)]
    pub price_interval_minutes: Option<u32>,
    /// Trailing prices for the hybrid classifier
    #[serde(default)]
    pub price_history: Vec<f64>,
    /// Hourly outdoor forecast as CSV, hour 0 is now
    #[serde(default)]
    pub temperature_forecast: Option<String>,
    #[serde(default)]
    pub classification_mode: ClassificationMode,
    /// Category of the current interval decided upstream; replaces local classification
    #[serde(default)]
    pub price_category: Option<PriceCategory>,
    #[serde(default)]
    pub preboost_enabled: Option<bool>,
    #[serde(default)]
    pub holiday_mode: bool,
}

impl SensorSnapshot {
    /// Snapshot with the four required readings and nothing else
    pub fn new(indoor: f64, outdoor: f64, target: f64, summer_threshold: f64) -> Self {
        Self {
            timestamp: Utc::now(),
            indoor_temp: Some(indoor),
            outdoor_temp: Some(outdoor),
            target_temp: Some(target),
            summer_threshold: Some(summer_threshold),
            aggressiveness: 0.0,
            inertia: None,
            prices: Vec::new(),
            price_forecast: None,
            price_interval_minutes: None,
            price_history: Vec::new(),
            temperature_forecast: None,
            classification_mode: ClassificationMode::default(),
            price_category: None,
            preboost_enabled: None,
            holiday_mode: false,
        }
    }

    pub fn with_prices(mut self, prices: Vec<f64>) -> Self {
        self.prices = prices;
        self
    }

    pub fn with_aggressiveness(mut self, aggressiveness: f64) -> Self {
        self.aggressiveness = aggressiveness;
        self
    }

    pub fn with_temperature_forecast(mut self, csv: impl Into<String>) -> Self {
        self.temperature_forecast = Some(csv.into());
        self
    }

    pub fn with_price_category(mut self, category: PriceCategory) -> Self {
        self.price_category = Some(category);
        self
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Price samples, falling back to the CSV form
    pub fn price_samples(&self) -> Vec<f64> {
        if !self.prices.is_empty() {
            return self.prices.iter().copied().filter(|p| p.is_finite()).collect();
        }
        self.price_forecast
            .as_deref()
            .map(parse_forecast_csv)
            .unwrap_or_default()
    }

    /// Parsed temperature forecast; empty when absent or unparseable
    pub fn temperature_samples(&self) -> Vec<f64> {
        self.temperature_forecast
            .as_deref()
            .map(parse_forecast_csv)
            .unwrap_or_default()
    }
}
