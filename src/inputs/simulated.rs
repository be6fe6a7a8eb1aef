//! # Simulated House
//!
//! A heat-pump house for running the controller without hardware. The house
//! is a two-node hydronic model (concrete slab and room air); the heat pump
//! reads the published synthetic temperature through an ordinary heating
//! curve, so a lower synthetic temperature means more heat into the slab.
//!
//! Physics:
//! - C_slab · dT_slab/dt = Q_hp − (T_slab − T_air)/R_slab_air − (T_slab − T_ground)/R_slab_ground
//! - C_air · dT_air/dt = (T_slab − T_air)/R_slab_air − (T_air − T_out)/R_air_out + Q_internal
//!
//! Every published outcome advances the simulated clock by one step.

use std::f64::consts::PI;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Timelike, Utc};
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::debug;

use super::SnapshotSource;
use crate::config::SimulatedHouseConfig;
use crate::domain::{CycleOutcome, SensorSnapshot};

/// Sub-step for the explicit integration
const MAX_SUBSTEP_SECONDS: f64 = 60.0;

/// Observable state of the simulated house
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HouseState {
    pub clock: DateTime<Utc>,
    pub slab_temp_c: f64,
    pub air_temp_c: f64,
    pub heat_output_kw: f64,
    pub last_synthetic_c: Option<f64>,
}

#[derive(Debug)]
pub struct SimulatedHouse {
    cfg: SimulatedHouseConfig,
    start: DateTime<Utc>,
    state: Mutex<HouseState>,
}

impl SimulatedHouse {
    pub fn new(cfg: SimulatedHouseConfig, start: DateTime<Utc>) -> Self {
        let state = HouseState {
            clock: start,
            slab_temp_c: cfg.initial_slab_temp_c,
            air_temp_c: cfg.initial_air_temp_c,
            heat_output_kw: 0.0,
            last_synthetic_c: None,
        };
        Self {
            cfg,
            start,
            state: Mutex::new(state),
        }
    }

    pub async fn state(&self) -> HouseState {
        *self.state.lock().await
    }

    /// Outdoor temperature at `at`
    pub fn outdoor_at(&self, at: DateTime<Utc>) -> f64 {
        let hour = f64::from(at.hour()) + f64::from(at.minute()) / 60.0;
        let days = (at - self.start).num_minutes() as f64 / 1440.0;
        self.cfg.outdoor_mean_c
            + self.cfg.outdoor_swing_c * (2.0 * PI * (hour - 15.0) / 24.0).cos()
            + self.cfg.outdoor_trend_c_per_day * days
    }

    /// Spot price for the hour containing `at`
    pub fn price_at(&self, at: DateTime<Utc>) -> f64 {
        match at.hour() {
            7..=9 => self.cfg.morning_peak_price,
            17..=20 => self.cfg.evening_peak_price,
            0..=5 => self.cfg.base_price * 0.6,
            _ => self.cfg.base_price,
        }
    }

    /// Heat-pump output for a given synthetic temperature (kW)
    pub fn heat_output_kw(&self, synthetic_c: f64) -> f64 {
        (self.cfg.curve_kw_per_k * (self.cfg.curve_balance_temp_c - synthetic_c))
            .clamp(0.0, self.cfg.max_heat_kw)
    }

    fn step_zone(&self, state: &mut HouseState, outdoor_c: f64, heat_kw: f64, seconds: f64) {
        let c = &self.cfg;
        let mut remaining = seconds;
        while remaining > 0.0 {
            let dt_hours = remaining.min(MAX_SUBSTEP_SECONDS) / 3600.0;
            remaining -= MAX_SUBSTEP_SECONDS;

            let slab_to_air = (state.slab_temp_c - state.air_temp_c) / c.r_slab_to_air_k_per_kw;
            let slab_to_ground = (state.slab_temp_c - c.ground_temp_c) / c.r_slab_to_ground_k_per_kw;
            let air_to_out = (state.air_temp_c - outdoor_c) / c.r_air_to_out_k_per_kw;

            let slab_net = heat_kw - slab_to_air - slab_to_ground;
            let air_net = slab_to_air + c.internal_gains_kw - air_to_out;

            state.slab_temp_c = (state.slab_temp_c + slab_net * dt_hours / c.slab_thermal_mass_kwh_k)
                .clamp(-20.0, 50.0);
            state.air_temp_c = (state.air_temp_c + air_net * dt_hours / c.air_thermal_mass_kwh_k)
                .clamp(-30.0, 40.0);
        }
    }

    fn snapshot_at(&self, state: &HouseState) -> SensorSnapshot {
        let now = state.clock;
        let hour_start = now
            .with_minute(0)
            .and_then(|t| t.with_second(0))
            .and_then(|t| t.with_nanosecond(0))
            .unwrap_or(now);
        let hours = (0..self.cfg.forecast_hours as i64).map(|h| hour_start + Duration::hours(h));

        let prices = hours.clone().map(|t| self.price_at(t)).collect();
        let forecast = hours.map(|t| format!("{:.1}", self.outdoor_at(t))).join(",");

        SensorSnapshot::new(
            state.air_temp_c,
            self.outdoor_at(now),
            self.cfg.target_temp_c,
            self.cfg.summer_threshold_c,
        )
        .with_timestamp(now)
        .with_prices(prices)
        .with_aggressiveness(self.cfg.aggressiveness)
        .with_temperature_forecast(forecast)
    }
}

#[async_trait]
impl SnapshotSource for SimulatedHouse {
    async fn read_snapshot(&self) -> Result<SensorSnapshot> {
        let state = self.state.lock().await;
        Ok(self.snapshot_at(&state))
    }

    async fn publish(&self, outcome: &CycleOutcome) -> Result<()> {
        let mut state = self.state.lock().await;
        let outdoor = self.outdoor_at(state.clock);
        // an unavailable cycle leaves the heat pump on its own outdoor sensor
        let synthetic = outcome.synthetic_temperature().unwrap_or(outdoor);
        let heat_kw = self.heat_output_kw(synthetic);

        let seconds = (self.cfg.step_minutes.max(1) * 60) as f64;
        self.step_zone(&mut state, outdoor, heat_kw, seconds);
        state.clock += Duration::minutes(self.cfg.step_minutes.max(1));
        state.heat_output_kw = heat_kw;
        state.last_synthetic_c = Some(synthetic);

        debug!(
            air_temp_c = state.air_temp_c,
            slab_temp_c = state.slab_temp_c,
            heat_kw,
            synthetic_c = synthetic,
            "simulated house stepped"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn start() -> DateTime<Utc> {
        "2025-01-10T00:00:00Z".parse().unwrap()
    }

    fn outcome_at(house: &SimulatedHouse, synthetic: Option<f64>) -> CycleOutcome {
        match synthetic {
            None => CycleOutcome::Unavailable {
                timestamp: start(),
                missing: vec![],
            },
            Some(temp) => {
                // reuse a real output and overwrite the temperature
                let engine = crate::controller::Engine::new(crate::config::Config::default());
                let snapshot = house.snapshot_at(&HouseState {
                    clock: start(),
                    slab_temp_c: 24.0,
                    air_temp_c: 21.0,
                    heat_output_kw: 0.0,
                    last_synthetic_c: None,
                });
                let mut outcome = engine.evaluate(&snapshot, 1.0, &mut Default::default());
                if let CycleOutcome::Ready(output) = &mut outcome {
                    output.synthetic_temperature = temp;
                }
                outcome
            }
        }
    }

    #[test]
    fn test_heating_curve() {
        let house = SimulatedHouse::new(SimulatedHouseConfig::default(), start());
        assert_eq!(house.heat_output_kw(20.0), 0.0);
        assert!((house.heat_output_kw(0.0) - 2.0).abs() < 1e-12);
        assert_eq!(house.heat_output_kw(-100.0), 6.0);
        assert_eq!(house.heat_output_kw(30.0), 0.0);
    }

    #[test]
    fn test_outdoor_profile_peaks_in_afternoon() {
        let house = SimulatedHouse::new(SimulatedHouseConfig::default(), start());
        let afternoon = house.outdoor_at("2025-01-10T15:00:00Z".parse().unwrap());
        let night = house.outdoor_at("2025-01-10T03:00:00Z".parse().unwrap());
        assert!((afternoon - 3.0).abs() < 1e-9);
        assert!((night + 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_prices_have_evening_peak() {
        let house = SimulatedHouse::new(SimulatedHouseConfig::default(), start());
        let evening = house.price_at("2025-01-10T18:00:00Z".parse().unwrap());
        let midday = house.price_at("2025-01-10T12:00:00Z".parse().unwrap());
        assert!(evening > midday);
    }

    #[tokio::test]
    async fn test_snapshot_carries_forecasts() {
        let house = SimulatedHouse::new(SimulatedHouseConfig::default(), start());
        let snapshot = house.read_snapshot().await.unwrap();
        assert_eq!(snapshot.prices.len(), 24);
        assert_eq!(snapshot.temperature_samples().len(), 24);
        assert_eq!(snapshot.indoor_temp, Some(21.0));
        assert_eq!(snapshot.timestamp, start());
    }

    #[tokio::test]
    async fn test_publish_advances_clock() {
        let house = SimulatedHouse::new(SimulatedHouseConfig::default(), start());
        house.publish(&outcome_at(&house, None)).await.unwrap();
        let state = house.state().await;
        assert_eq!(state.clock, start() + Duration::minutes(15));
        assert!(state.last_synthetic_c.is_some());
    }

    #[tokio::test]
    async fn test_low_synthetic_heats_more_than_high() {
        let cold = SimulatedHouse::new(SimulatedHouseConfig::default(), start());
        let warm = SimulatedHouse::new(SimulatedHouseConfig::default(), start());
        for _ in 0..8 {
            cold.publish(&outcome_at(&cold, Some(-15.0))).await.unwrap();
            warm.publish(&outcome_at(&warm, Some(20.0))).await.unwrap();
        }
        let cold = cold.state().await;
        let warm = warm.state().await;
        assert!(cold.slab_temp_c > warm.slab_temp_c);
        assert!(cold.air_temp_c > warm.air_temp_c);
    }

    #[test]
    fn test_slab_lags_air() {
        let house = SimulatedHouse::new(SimulatedHouseConfig::default(), start());
        let mut state = HouseState {
            clock: start(),
            slab_temp_c: 18.0,
            air_temp_c: 18.0,
            heat_output_kw: 0.0,
            last_synthetic_c: None,
        };
        house.step_zone(&mut state, -10.0, 3.0, 3600.0);
        // heat goes into the slab first; the air still loses to outdoors
        assert!(state.slab_temp_c > 18.0);
        assert!(state.slab_temp_c > state.air_temp_c);
        assert!(state.air_temp_c < 18.0);
    }
}
