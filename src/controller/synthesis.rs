//! # Synthetic Temperature Synthesis
//!
//! One evaluation per cycle turns a [`SensorSnapshot`] into a bounded synthetic
//! outdoor temperature and a mode label.
//!
//! Rules are applied in a fixed priority order:
//! 1. pre-boost (heat ahead of a cold and expensive peak)
//! 2. precool (hot forecast)
//! 3. summer pass-through
//! 4. neutral band, then the base heating/braking law, with very cheap prices
//!    allowing a small target overshoot
//! 5. expensive-now override to the winter brake temperature
//!
//! The comfort PI push and the price brake are then blended in as a bias and
//! the result is clamped to the safety limits.

use chrono::{DateTime, Timelike, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::base_law::{base_temperature, BaseLawLimits};
use super::brake::{BrakeShape, BrakeShaper};
use super::holiday::{effective_target, is_holiday_active};
use super::pid::{PiController, PiOutput};
use super::preboost::{PreboostInput, PreboostOutcome, PreboostScheduler};
use super::rate_limit::RateLimiter;
use crate::config::Config;
use crate::domain::{
    BlockWindow, BlockedReason, BrakeDiagnostics, ComfortDiagnostics, ControlDiagnostics,
    ControlOutput, CycleOutcome, MissingInput, Mode, PreboostDiagnostics, PriceCategory,
    PriceDiagnostics, PriceSeries, PriceStatistics, SensorSnapshot,
};
use crate::pricing::{
    build_forward_price_series, compute_price_baseline, compute_price_pressure,
    select_price_horizon, PriceClassifier,
};

const MIN_INERTIA: f64 = 0.5;
const MAX_INERTIA: f64 = 5.0;
/// Longest gap credited to the PI integral in one cycle
const MAX_PI_STEP_HOURS: f64 = 1.0;
const PRESSURE_STEPS_15M: usize = 8;
const PRESSURE_STEPS_HOURLY: usize = 6;

/// State carried from one cycle to the next. Lost on restart.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ControllerState {
    pub pi_integral: f64,
    pub last_brake_level: Option<f64>,
    pub last_cycle_at: Option<DateTime<Utc>>,
}

/// Validated readings for one cycle
#[derive(Debug, Clone, Copy)]
struct Readings {
    indoor: f64,
    outdoor: f64,
    target: f64,
    summer_threshold: f64,
}

fn required_readings(snapshot: &SensorSnapshot, prices: &[f64]) -> Result<Readings, Vec<MissingInput>> {
    let finite = |v: Option<f64>| v.filter(|v| v.is_finite());
    let indoor = finite(snapshot.indoor_temp);
    let outdoor = finite(snapshot.outdoor_temp);
    let target = finite(snapshot.target_temp);
    let summer = finite(snapshot.summer_threshold);

    let mut missing = Vec::new();
    if indoor.is_none() {
        missing.push(MissingInput::IndoorTemp);
    }
    if outdoor.is_none() {
        missing.push(MissingInput::OutdoorTemp);
    }
    if target.is_none() {
        missing.push(MissingInput::TargetTemp);
    }
    if summer.is_none() {
        missing.push(MissingInput::SummerThreshold);
    }
    if prices.is_empty() {
        missing.push(MissingInput::PriceSeries);
    }

    match (indoor, outdoor, target, summer) {
        (Some(indoor), Some(outdoor), Some(target), Some(summer_threshold)) if missing.is_empty() => {
            Ok(Readings {
                indoor,
                outdoor,
                target,
                summer_threshold,
            })
        }
        _ => Err(missing),
    }
}

/// Minutes `now` already is into its interval of the price grid
pub fn now_offset_minutes(now: DateTime<Utc>, interval_minutes: u32) -> f64 {
    let minute_of_day = now.hour() * 60 + now.minute();
    f64::from(minute_of_day % interval_minutes.max(1)) + f64::from(now.second()) / 60.0
}

/// Short label of what caused a mode, used in the decision reason
pub fn decision_trigger(mode: Mode) -> &'static str {
    match mode {
        Mode::BrakingByPrice => "price",
        Mode::BrakingByTemp | Mode::Heating => "temperature",
        Mode::SummerMode => "summer",
        Mode::Neutral => "neutral",
        Mode::Precool => "precool (hot forecast)",
        Mode::Preboost => "pre-boost (cold & expensive forecast)",
        Mode::Passthrough => "passthrough",
        Mode::Error => "error in calculation",
    }
}

/// Raw value before blending, plus how it was reached
#[derive(Debug, Clone, Copy)]
struct RawDecision {
    value: f64,
    mode: Mode,
    /// Set when the expensive-now override produced the value
    price_override: bool,
}

/// Brake level after the comfort and expensive-now rules and rate limiting
#[derive(Debug, Clone, Copy)]
struct BrakeDecision {
    desired: f64,
    level: f64,
    rate_limited: bool,
    reason: BlockedReason,
}

/// The synthesis engine. Holds configuration only; all mutable state is in
/// the [`ControllerState`] passed to [`Engine::evaluate`].
#[derive(Debug, Clone)]
pub struct Engine {
    cfg: Config,
    classifier: PriceClassifier,
    shaper: BrakeShaper,
    limiter: RateLimiter,
    pi: PiController,
    scheduler: PreboostScheduler,
}

impl Engine {
    pub fn new(cfg: Config) -> Self {
        Self {
            classifier: PriceClassifier::new(cfg.classifier.clone()),
            shaper: BrakeShaper::new(cfg.brake.clone()),
            limiter: RateLimiter::new(cfg.brake.max_delta_per_step),
            pi: PiController::from_config(&cfg.comfort),
            scheduler: PreboostScheduler::new(cfg.preboost.clone()),
            cfg,
        }
    }

    /// Run one cycle.
    ///
    /// `fallback_inertia` is used when the snapshot carries no inertia of its own.
    pub fn evaluate(
        &self,
        snapshot: &SensorSnapshot,
        fallback_inertia: f64,
        state: &mut ControllerState,
    ) -> CycleOutcome {
        let now = snapshot.timestamp;
        let samples = snapshot.price_samples();

        let readings = match required_readings(snapshot, &samples) {
            Ok(readings) => readings,
            Err(missing) => {
                warn!(?missing, "required inputs missing, cycle unavailable");
                return CycleOutcome::Unavailable {
                    timestamp: now,
                    missing,
                };
            }
        };

        let series = match PriceSeries::new(samples.clone(), snapshot.price_interval_minutes) {
            Ok(series) => series,
            Err(e) => {
                warn!(error = %e, "price interval rejected, inferring from length");
                // non-empty samples, so inference cannot fail
                match PriceSeries::new(samples, None) {
                    Ok(series) => series,
                    Err(_) => {
                        return CycleOutcome::Unavailable {
                            timestamp: now,
                            missing: vec![MissingInput::PriceSeries],
                        }
                    }
                }
            }
        };
        let interval = series.interval_minutes();
        let now_offset = now_offset_minutes(now, interval);

        let holiday_active = is_holiday_active(&self.cfg.holiday, snapshot.holiday_mode, now);
        let target = effective_target(&self.cfg.holiday, readings.target, holiday_active);

        let aggressiveness_raw = snapshot.aggressiveness;
        let aggressiveness = if aggressiveness_raw.is_finite() {
            aggressiveness_raw.clamp(0.0, 5.0)
        } else {
            0.0
        };
        let inertia = snapshot
            .inertia
            .filter(|v| v.is_finite())
            .unwrap_or(fallback_inertia)
            .clamp(MIN_INERTIA, MAX_INERTIA);
        let inertia = if inertia.is_finite() { inertia } else { self.cfg.inertia.default_value };

        // Classification and price diagnostics
        let category = snapshot.price_category.unwrap_or_else(|| {
            self.classifier
                .classify_current(&series, &snapshot.price_history, snapshot.classification_mode)
        });
        let price_diag = self.price_diagnostics(snapshot, &series, category);

        // Brake shaping
        let forward = build_forward_price_series(series.samples(), 0, interval, self.cfg.brake.window_hours);
        let shape = self.shaper.shape(forward, interval, now_offset);

        // Comfort PI
        let dt_hours = self.pi_step_hours(state.last_cycle_at, now);
        let pi = self.pi.update(target - readings.indoor, state.pi_integral, dt_hours);
        state.pi_integral = pi.integral;

        let brake = self.decide_brake(&shape, category, target - readings.indoor, state.last_brake_level);
        state.last_brake_level = Some(brake.level);
        state.last_cycle_at = Some(now);

        // Pre-boost on hourly data
        let temps = snapshot.temperature_samples();
        let hourly_prices = series.hourly_means();
        let preboost = self.scheduler.evaluate(&PreboostInput {
            temperatures: &temps,
            prices: &hourly_prices,
            outdoor_temp: readings.outdoor,
            target_temp: target,
            aggressiveness,
            inertia,
            enabled: snapshot.preboost_enabled.unwrap_or(self.cfg.preboost.enabled),
        });
        let (preboost_active, preboost_diag) = match &preboost {
            Ok(outcome) => (outcome.is_active(), preboost_diagnostics(outcome)),
            Err(e) => {
                warn!(error = %e, "pre-boost forecast failed validation");
                (
                    false,
                    PreboostDiagnostics {
                        status: "validation_failed".into(),
                        peak: None,
                        window: None,
                        error: Some(e.to_string()),
                    },
                )
            }
        };

        let precool_active = self.should_precool(&temps, readings.summer_threshold);

        let raw = self.raw_decision(
            &readings,
            target,
            aggressiveness_raw,
            category,
            preboost_active,
            precool_active,
        );

        let (synthetic, final_bias) = self.blend(raw, &pi, brake.level, aggressiveness);

        let mode = if raw.mode == Mode::Neutral
            && brake.level > 0.0
            && brake.reason != BlockedReason::TooCold
        {
            Mode::BrakingByPrice
        } else {
            raw.mode
        };

        debug!(
            raw_temp_c = raw.value,
            final_bias,
            brake_level = brake.level,
            comfort_push = pi.output,
            %category,
            "synthesis"
        );

        let block = shape.block().copied();
        let window = block.map(|b| BlockWindow::from_block(&b, now, now_offset.floor() as u32));

        CycleOutcome::Ready(ControlOutput {
            synthetic_temperature: synthetic,
            mode,
            brake_level: brake.level,
            comfort_push: pi.output,
            decision_reason: format!("{} - Triggered by {}", mode, decision_trigger(mode)),
            blocked_reason: brake.reason,
            rate_limited: brake.rate_limited,
            diagnostics: ControlDiagnostics {
                timestamp: now,
                effective_target: target,
                aggressiveness,
                inertia,
                raw_temperature: raw.value,
                final_bias,
                precool_active,
                holiday_active,
                price: Some(price_diag),
                brake: BrakeDiagnostics {
                    baseline: shape.analysis.baseline,
                    threshold: shape.analysis.threshold,
                    area: shape.area,
                    amplitude: shape.amplitude,
                    raw_level: shape.level,
                    desired_level: brake.desired,
                    level: brake.level,
                    rate_limited: brake.rate_limited,
                    block,
                    window,
                },
                comfort: ComfortDiagnostics {
                    comfort_push: pi.output,
                    pi_integral: pi.integral,
                    saturated_high: pi.saturated_high,
                    saturated_low: pi.saturated_low,
                },
                preboost: preboost_diag,
            },
        })
    }

    fn pi_step_hours(&self, last: Option<DateTime<Utc>>, now: DateTime<Utc>) -> f64 {
        let tick_hours = self.cfg.controller.tick_seconds as f64 / 3600.0;
        match last {
            Some(last) if now > last => {
                ((now - last).num_milliseconds() as f64 / 3_600_000.0).min(MAX_PI_STEP_HOURS)
            }
            Some(_) => 0.0,
            None => tick_hours.min(MAX_PI_STEP_HOURS),
        }
    }

    /// Apply the comfort floor, the expensive-now floor and the rate limit.
    ///
    /// `deficit` is target minus indoor temperature.
    fn decide_brake(
        &self,
        shape: &BrakeShape,
        category: PriceCategory,
        deficit: f64,
        last: Option<f64>,
    ) -> BrakeDecision {
        if deficit > self.cfg.synthesis.too_cold_deficit {
            return BrakeDecision {
                desired: 0.0,
                level: 0.0,
                rate_limited: false,
                reason: BlockedReason::TooCold,
            };
        }

        let floor = self.cfg.synthesis.expensive_now_floor;
        let (desired, mut reason) = if category.is_expensive() && shape.level < floor {
            (floor, BlockedReason::ExpensiveNow)
        } else if shape.level <= 0.0 {
            (0.0, BlockedReason::NoPriceBlock)
        } else {
            (shape.level, BlockedReason::Allowed)
        };

        let limited = self.limiter.apply(desired, last);
        let level = limited.value.clamp(0.0, 1.0);
        if limited.limited && level < desired {
            reason = BlockedReason::RateLimited;
        }

        BrakeDecision {
            desired,
            level,
            rate_limited: limited.limited,
            reason,
        }
    }

    /// Any hour in the look-ahead reaching the summer threshold plus margin
    pub fn should_precool(&self, temps: &[f64], summer_threshold: f64) -> bool {
        let limit = summer_threshold + self.cfg.synthesis.precool_margin;
        temps
            .iter()
            .take(self.cfg.synthesis.precool_lookahead_hours)
            .any(|t| *t >= limit)
    }

    /// Dynamic brake temperature: warmer than outdoor in winter, fixed otherwise
    pub fn brake_temperature(&self, outdoor: f64) -> f64 {
        let s = &self.cfg.synthesis;
        if outdoor < s.winter_brake_threshold {
            outdoor + s.winter_brake_offset
        } else {
            s.fixed_brake_temp
        }
    }

    fn raw_decision(
        &self,
        readings: &Readings,
        target: f64,
        aggressiveness: f64,
        category: PriceCategory,
        preboost_active: bool,
        precool_active: bool,
    ) -> RawDecision {
        let plain = |value, mode| RawDecision {
            value,
            mode,
            price_override: false,
        };

        if preboost_active {
            return plain(self.cfg.preboost.output_temp, Mode::Preboost);
        }
        if precool_active {
            return plain(self.cfg.limits.brake_temp_ceiling, Mode::Precool);
        }
        if readings.outdoor >= readings.summer_threshold {
            return plain(readings.outdoor, Mode::SummerMode);
        }

        let target = if category.is_very_cheap() {
            target + self.cfg.synthesis.cheap_overshoot
        } else {
            target
        };
        let brake_temp = self.brake_temperature(readings.outdoor);
        let diff = readings.indoor - target;

        let (value, mode) = if diff.abs() <= self.cfg.synthesis.neutral_deadband {
            (readings.outdoor, Mode::Neutral)
        } else {
            let limits = BaseLawLimits {
                min_fake_temp: self.cfg.limits.min_fake_temp,
                max_fake_temp: self.cfg.limits.max_fake_temp,
                brake_temp,
                neutral_deadband: self.cfg.synthesis.neutral_deadband,
            };
            base_temperature(readings.indoor, target, readings.outdoor, aggressiveness, &limits)
        };

        let overridable = matches!(mode, Mode::Neutral);
        if overridable && category.is_expensive() {
            debug!(%category, brake_temp, "expensive now, braking by price");
            return RawDecision {
                value: brake_temp,
                mode: Mode::BrakingByPrice,
                price_override: true,
            };
        }
        plain(value, mode)
    }

    /// Blend comfort push and brake into a bias and clamp the result
    fn blend(&self, raw: RawDecision, pi: &PiOutput, brake_level: f64, aggressiveness: f64) -> (f64, f64) {
        let limits = &self.cfg.limits;
        let bias = match raw.mode {
            Mode::Passthrough | Mode::SummerMode | Mode::Precool | Mode::Error => 0.0,
            _ => {
                let b = &self.cfg.blend;
                let brake = if raw.price_override || raw.mode == Mode::Preboost {
                    0.0
                } else {
                    brake_level
                };
                let gas = pi.output.max(0.0);
                let backoff = (-pi.output).max(0.0);
                let adjust = (b.gas_weight * gas - b.brake_weight * brake - b.backoff_weight * backoff)
                    .clamp(-1.0, 1.0);
                -adjust * b.bias_scale * (aggressiveness / 5.0).clamp(0.0, 1.0)
            }
        };

        let value = (raw.value + bias)
            .clamp(limits.min_fake_temp, limits.max_fake_temp)
            .min(limits.brake_temp_ceiling);
        (value, bias)
    }

    fn price_diagnostics(
        &self,
        snapshot: &SensorSnapshot,
        series: &PriceSeries,
        category: PriceCategory,
    ) -> PriceDiagnostics {
        let samples = series.samples();
        let current = series.current();
        let statistics = PriceStatistics::from_samples(samples).unwrap_or(PriceStatistics {
            average: current,
            median: current,
            min: current,
            max: current,
            std: 0.0,
        });
        let horizon = select_price_horizon(
            series.interval_minutes(),
            PRESSURE_STEPS_15M,
            PRESSURE_STEPS_HOURLY,
        );
        let baseline = compute_price_baseline(samples, 0, horizon);

        PriceDiagnostics {
            current,
            category,
            classification_mode: snapshot.classification_mode,
            statistics,
            price_factor_percent: statistics.price_factor(current) * 100.0,
            saving_potential: statistics.saving_potential(current),
            next_prices: samples.iter().skip(1).take(3).copied().collect(),
            interval_minutes: series.interval_minutes(),
            pressure: compute_price_pressure(samples, 0, horizon, baseline),
        }
    }
}

fn preboost_diagnostics(outcome: &PreboostOutcome) -> PreboostDiagnostics {
    PreboostDiagnostics {
        status: outcome.status(),
        peak: outcome.peak(),
        window: outcome.window(),
        error: None,
    }
}
