//! # Pre-boost Scheduling
//!
//! Looks ahead in the hourly outdoor temperature and price forecasts for
//! periods that are both cold and expensive, and decides whether now is the
//! right moment to start heating in advance.
//!
//! Each candidate peak gets a severity between 0.5 and 3.0. Severity and the
//! building's thermal inertia together size the lead-time window: a sluggish
//! house facing a severe peak starts earlier than a responsive one facing a
//! mild peak. Pre-boost only fires when the time to the peak falls inside
//! that window, so the check is simply repeated every cycle as the peak
//! approaches.

use itertools::Itertools;
use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};
use std::cmp::Reverse;
use strum::{Display, EnumString};
use thiserror::Error;
use tracing::{debug, info};

use crate::config::PreboostConfig;
use crate::domain::{AdvanceWindow, PreboostPeak};

const DEFAULT_INERTIA: f64 = 1.0;
const MIN_INERTIA: f64 = 0.5;
const MAX_INERTIA: f64 = 5.0;
const MIN_SEVERITY: f64 = 0.5;
const MAX_SEVERITY: f64 = 3.0;

/// Forecast data failed sanity checks, so no decision could be made
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PreboostError {
    #[error("{count} forecast temperatures outside plausible bounds (allowed {allowed})")]
    ImplausibleTemperatures { count: usize, allowed: usize },

    #[error("{count} forecast prices outside plausible bounds (allowed {allowed})")]
    ImplausiblePrices { count: usize, allowed: usize },
}

/// Why pre-boost stayed off this cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum PreboostIdle {
    Disabled,
    OutdoorTooWarm,
    NoForecast,
    WarmingTrend,
    NoPeaks,
    TooShort,
    NotCheapNow,
    TimingOutsideWindow,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PreboostOutcome {
    Activate {
        peak: PreboostPeak,
        window: AdvanceWindow,
    },
    Idle {
        reason: PreboostIdle,
        /// Best ranked peak that was considered, if any
        peak: Option<PreboostPeak>,
        window: Option<AdvanceWindow>,
    },
}

impl PreboostOutcome {
    fn idle(reason: PreboostIdle) -> Self {
        Self::Idle {
            reason,
            peak: None,
            window: None,
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self, Self::Activate { .. })
    }

    pub fn status(&self) -> String {
        match self {
            Self::Activate { .. } => "active".to_string(),
            Self::Idle { reason, .. } => reason.to_string(),
        }
    }

    pub fn peak(&self) -> Option<PreboostPeak> {
        match self {
            Self::Activate { peak, .. } => Some(*peak),
            Self::Idle { peak, .. } => *peak,
        }
    }

    pub fn window(&self) -> Option<AdvanceWindow> {
        match self {
            Self::Activate { window, .. } => Some(*window),
            Self::Idle { window, .. } => *window,
        }
    }
}

/// Per-cycle inputs for the scheduler
#[derive(Debug, Clone, Copy)]
pub struct PreboostInput<'a> {
    /// Hourly outdoor forecast, index 0 is now
    pub temperatures: &'a [f64],
    /// Hourly prices, index 0 is now
    pub prices: &'a [f64],
    pub outdoor_temp: f64,
    pub target_temp: f64,
    pub aggressiveness: f64,
    pub inertia: f64,
    pub enabled: bool,
}

#[derive(Debug, Clone)]
pub struct PreboostScheduler {
    cfg: PreboostConfig,
}

impl PreboostScheduler {
    pub fn new(cfg: PreboostConfig) -> Self {
        Self { cfg }
    }

    /// Decide whether to pre-heat now
    pub fn evaluate(&self, input: &PreboostInput<'_>) -> Result<PreboostOutcome, PreboostError> {
        if !input.enabled {
            return Ok(PreboostOutcome::idle(PreboostIdle::Disabled));
        }
        if input.outdoor_temp >= self.cfg.max_outdoor_temp {
            return Ok(PreboostOutcome::idle(PreboostIdle::OutdoorTooWarm));
        }
        if input.temperatures.is_empty() || input.prices.is_empty() {
            debug!("no temperature or price forecast, skipping pre-boost");
            return Ok(PreboostOutcome::idle(PreboostIdle::NoForecast));
        }

        let horizon = (self.cfg.lookahead_hours + 1)
            .min(input.temperatures.len())
            .min(input.prices.len());
        let temps = &input.temperatures[..horizon];
        let prices = &input.prices[..horizon];

        self.validate(temps, prices)?;

        if horizon < 2 {
            return Ok(PreboostOutcome::idle(PreboostIdle::NoPeaks));
        }
        if self.is_warming_trend(temps) {
            debug!(now = temps[0], "forecast is warming, skipping pre-boost");
            return Ok(PreboostOutcome::idle(PreboostIdle::WarmingTrend));
        }

        let aggressiveness = sanitize(input.aggressiveness, 0.0).clamp(0.0, 5.0);
        let inertia = sanitize(input.inertia, DEFAULT_INERTIA).clamp(MIN_INERTIA, MAX_INERTIA);

        let max_price = prices.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        if max_price <= 0.0 {
            return Ok(PreboostOutcome::idle(PreboostIdle::NoPeaks));
        }
        let ratio = self.price_threshold_ratio(aggressiveness);
        let price_threshold = max_price * ratio;
        let cold_threshold = input.target_temp - self.cfg.cold_margin;

        debug!(
            aggressiveness,
            ratio,
            price_threshold,
            cold_threshold,
            inertia,
            "pre-boost parameters"
        );

        let peaks = self.find_peaks(temps, prices, cold_threshold, price_threshold, max_price);
        let Some(best) = peaks.first().copied() else {
            return Ok(PreboostOutcome::idle(PreboostIdle::NoPeaks));
        };

        let mut reason = PreboostIdle::NoPeaks;
        let mut considered: Option<(PreboostPeak, Option<AdvanceWindow>)> = None;

        for peak in peaks {
            if peak.duration_hours < self.cfg.min_peak_duration_hours {
                reason = PreboostIdle::TooShort;
                considered.get_or_insert((peak, None));
                continue;
            }
            if self.cfg.require_cheap_now && prices[0] > max_price * self.cfg.cheap_now_multiplier {
                reason = PreboostIdle::NotCheapNow;
                considered.get_or_insert((peak, None));
                continue;
            }

            let window = self.advance_window(inertia, peak.severity);
            let hours_to_peak = peak.hour_offset as f64;
            if window.contains(hours_to_peak) {
                info!(
                    hours_to_peak,
                    severity = peak.severity,
                    temperature_c = peak.temperature_c,
                    price = peak.price,
                    min_advance_h = window.min_hours,
                    max_advance_h = window.max_hours,
                    "pre-boost activated"
                );
                return Ok(PreboostOutcome::Activate { peak, window });
            }

            debug!(
                hours_to_peak,
                min_advance_h = window.min_hours,
                max_advance_h = window.max_hours,
                "peak outside advance window"
            );
            reason = PreboostIdle::TimingOutsideWindow;
            considered.get_or_insert((peak, Some(window)));
        }

        let (peak, window) = considered.unwrap_or((best, None));
        Ok(PreboostOutcome::Idle {
            reason,
            peak: Some(peak),
            window,
        })
    }

    /// Price ratio above which an hour counts as expensive.
    ///
    /// Higher aggressiveness lowers it, so more hours qualify.
    pub fn price_threshold_ratio(&self, aggressiveness: f64) -> f64 {
        (self.cfg.base_ratio - aggressiveness * self.cfg.aggressiveness_scaling)
            .clamp(self.cfg.min_ratio, self.cfg.max_ratio)
    }

    /// True when enough of the upcoming hours are at least as warm as now
    pub fn is_warming_trend(&self, temps: &[f64]) -> bool {
        let Some((&now, ahead)) = temps.split_first() else {
            return false;
        };
        if ahead.is_empty() {
            return false;
        }
        let warmer = ahead.iter().filter(|t| **t >= now).count();
        warmer as f64 / ahead.len() as f64 >= self.cfg.warming_fraction
    }

    /// Count samples outside the configured bounds and fail when too many are
    pub fn validate(&self, temps: &[f64], prices: &[f64]) -> Result<(), PreboostError> {
        let allowed = self.cfg.max_implausible_samples;

        let count = temps
            .iter()
            .filter(|t| **t < self.cfg.min_valid_temp || **t > self.cfg.max_valid_temp)
            .count();
        if count > allowed {
            return Err(PreboostError::ImplausibleTemperatures { count, allowed });
        }

        let count = prices
            .iter()
            .filter(|p| **p < self.cfg.min_valid_price || **p > self.cfg.max_valid_price)
            .count();
        if count > allowed {
            return Err(PreboostError::ImplausiblePrices { count, allowed });
        }
        Ok(())
    }

    /// Cold and expensive hours after hour 0, best ranked first.
    ///
    /// Every qualifying hour is its own peak. Its duration counts it plus the
    /// qualifying hours straight after it, up to `duration_lookahead_hours`.
    pub fn find_peaks(
        &self,
        temps: &[f64],
        prices: &[f64],
        cold_threshold: f64,
        price_threshold: f64,
        max_price: f64,
    ) -> Vec<PreboostPeak> {
        let n = temps.len().min(prices.len());
        let hit = |i: usize| temps[i] < cold_threshold && prices[i] >= price_threshold;

        (1..n)
            .filter(|&i| hit(i))
            .map(|i| {
                let last = (i + self.cfg.duration_lookahead_hours).min(n - 1);
                let duration = 1 + (i + 1..=last).take_while(|&j| hit(j)).count();

                let temp_drop = cold_threshold - temps[i];
                let price_ratio = prices[i] / max_price;
                let price_excess = if price_threshold > 0.0 {
                    (prices[i] / price_threshold - 1.0).max(0.0)
                } else {
                    0.0
                };

                PreboostPeak {
                    hour_offset: i,
                    severity: self.severity(temp_drop, price_excess, duration),
                    combined_score: temp_drop * price_ratio * duration as f64,
                    duration_hours: duration,
                    temperature_c: temps[i],
                    price: prices[i],
                }
            })
            .sorted_by_key(|p| Reverse(OrderedFloat(p.combined_score)))
            .collect()
    }

    /// `1 + mean of the capped temperature, price and duration terms`, in [0.5, 3]
    pub fn severity(&self, temp_drop: f64, price_excess: f64, duration_hours: usize) -> f64 {
        let cap = self.cfg.severity_cap;
        let temp = (temp_drop.abs() / self.cfg.temp_severity_divisor).min(cap);
        let price = (price_excess.abs() / self.cfg.price_severity_divisor).min(cap);
        let duration = (duration_hours as f64 / self.cfg.duration_severity_divisor).min(cap);
        (1.0 + (temp + price + duration) / 3.0).clamp(MIN_SEVERITY, MAX_SEVERITY)
    }

    /// Lead-time window for a peak of the given severity
    pub fn advance_window(&self, inertia: f64, severity: f64) -> AdvanceWindow {
        let floor = self.cfg.advance_floor_hours;
        let ceiling = self.cfg.advance_ceiling_hours;
        let offset = self.cfg.advance_severity_factor * (severity - 1.0);

        let max_hours = (self.cfg.advance_max_inertia_factor * inertia
            + self.cfg.advance_max_base_hours
            + offset)
            .clamp(floor, ceiling);
        let min_hours = (self.cfg.advance_min_inertia_factor * inertia + offset)
            .clamp(floor, ceiling)
            .min(max_hours);

        AdvanceWindow {
            min_hours,
            max_hours,
        }
    }
}

fn sanitize(value: f64, fallback: f64) -> f64 {
    if value.is_finite() {
        value
    } else {
        fallback
    }
}
