use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use figment::{providers::{Env, Format, Toml}, Figment};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use validator::{Validate, ValidationError};

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct Config {
    #[validate(nested)]
    pub server: ServerConfig,
    #[validate(nested)]
    pub controller: ControllerConfig,
    #[validate(nested)]
    pub limits: LimitsConfig,
    #[validate(nested)]
    pub classifier: ClassifierConfig,
    #[validate(nested)]
    pub brake: BrakeConfig,
    #[validate(nested)]
    pub comfort: ComfortConfig,
    #[validate(nested)]
    pub blend: BlendConfig,
    #[validate(nested)]
    pub preboost: PreboostConfig,
    #[validate(nested)]
    pub synthesis: SynthesisConfig,
    pub holiday: HolidayConfig,
    #[validate(nested)]
    pub inertia: InertiaConfig,
    #[validate(nested)]
    pub simulation: SimulatedHouseConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    #[validate(range(min = 1, max = 300))]
    pub request_timeout_secs: u64,
}
impl Default for ServerConfig {
    fn default() -> Self {
        Self { host: "127.0.0.1".into(), port: 8087, request_timeout_secs: 10 }
    }
}
impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr> {
        Ok(format!("{}:{}", self.host, self.port).parse()?)
    }
}

/// Where snapshots come from
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputSourceKind {
    File,
    #[default]
    Simulated,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct ControllerConfig {
    #[validate(range(min = 1, max = 3600))]
    pub tick_seconds: u64,
    pub source: InputSourceKind,
    pub snapshot_path: Option<PathBuf>,
    pub output_path: Option<PathBuf>,
}
impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            tick_seconds: 60,
            source: InputSourceKind::default(),
            snapshot_path: None,
            output_path: None,
        }
    }
}

/// Hard bounds on the synthetic temperature
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
#[validate(schema(function = "validate_limits"))]
pub struct LimitsConfig {
    pub min_fake_temp: f64,
    pub max_fake_temp: f64,
    /// The output never exceeds this, whatever the rules above it decide
    pub brake_temp_ceiling: f64,
}
impl Default for LimitsConfig {
    fn default() -> Self {
        Self { min_fake_temp: -25.0, max_fake_temp: 25.0, brake_temp_ceiling: 25.0 }
    }
}

fn validate_limits(limits: &LimitsConfig) -> Result<(), ValidationError> {
    if limits.min_fake_temp >= limits.max_fake_temp {
        return Err(ValidationError::new("min_fake_temp_not_below_max"));
    }
    Ok(())
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct ClassifierConfig {
    #[validate(range(min = 0.0, max = 100.0))]
    pub very_cheap_percentile: f64,
    #[validate(range(min = 0.0, max = 100.0))]
    pub cheap_percentile: f64,
    #[validate(range(min = 0.0, max = 100.0))]
    pub expensive_percentile: f64,
    #[validate(range(min = 0.0, max = 100.0))]
    pub very_expensive_percentile: f64,
    #[validate(range(min = 1))]
    pub min_samples: usize,
    pub very_cheap_ratio: f64,
    pub cheap_ratio: f64,
    pub normal_ratio: f64,
    pub expensive_ratio: f64,
    /// Ratio at or above which a sample is `extreme`; unset disables the tier
    pub extreme_ratio: Option<f64>,
    /// Prices strictly below this are cheap in hybrid mode even when the average is low
    pub absolute_cheap_limit: f64,
    pub min_sane_price: f64,
    pub max_sane_price: f64,
    pub max_implausible_prices: usize,
    pub high_price_warning: f64,
}
impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            very_cheap_percentile: 10.0,
            cheap_percentile: 30.0,
            expensive_percentile: 85.0,
            very_expensive_percentile: 95.0,
            min_samples: 5,
            very_cheap_ratio: 0.60,
            cheap_ratio: 0.90,
            normal_ratio: 1.15,
            expensive_ratio: 1.40,
            extreme_ratio: None,
            absolute_cheap_limit: 0.60,
            min_sane_price: -2.0,
            max_sane_price: 15.0,
            max_implausible_prices: 3,
            high_price_warning: 3.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct BrakeConfig {
    #[validate(range(min = 0.0))]
    pub delta: f64,
    /// When set, the threshold is this percentile of the window instead of median + delta
    #[validate(range(min = 0.0, max = 100.0))]
    pub percentile: Option<f64>,
    pub min_block_minutes: u32,
    pub pre_brake_minutes: u32,
    pub post_release_minutes: u32,
    pub area_scale: f64,
    #[validate(range(min = 0.0, max = 1.0))]
    pub max_delta_per_step: f64,
    #[validate(range(min = 1, max = 48))]
    pub window_hours: u32,
}
impl Default for BrakeConfig {
    fn default() -> Self {
        Self {
            delta: 0.3,
            percentile: None,
            min_block_minutes: 60,
            pre_brake_minutes: 60,
            post_release_minutes: 60,
            area_scale: 4.0,
            max_delta_per_step: 0.08,
            window_hours: 24,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct ComfortConfig {
    #[validate(range(min = 0.0))]
    pub kp: f64,
    #[validate(range(min = 0.0))]
    pub ki: f64,
    #[validate(range(min = 0.0))]
    pub deadband: f64,
}
impl Default for ComfortConfig {
    fn default() -> Self {
        Self { kp: 0.6, ki: 0.1, deadband: 0.1 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct BlendConfig {
    #[validate(range(min = 0.0))]
    pub gas_weight: f64,
    #[validate(range(min = 0.0))]
    pub brake_weight: f64,
    #[validate(range(min = 0.0))]
    pub backoff_weight: f64,
    #[validate(range(min = 0.0, max = 10.0))]
    pub bias_scale: f64,
}
impl Default for BlendConfig {
    fn default() -> Self {
        Self { gas_weight: 0.8, brake_weight: 1.0, backoff_weight: 0.5, bias_scale: 1.5 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
#[validate(schema(function = "validate_preboost"))]
pub struct PreboostConfig {
    pub enabled: bool,
    /// Pre-boost is only considered while it is colder than this outside
    pub max_outdoor_temp: f64,
    pub output_temp: f64,
    pub base_ratio: f64,
    pub aggressiveness_scaling: f64,
    pub min_ratio: f64,
    pub max_ratio: f64,
    pub cold_margin: f64,
    #[validate(range(min = 1, max = 48))]
    pub lookahead_hours: usize,
    #[validate(range(min = 1, max = 24))]
    pub duration_lookahead_hours: usize,
    #[validate(range(min = 0.0, max = 1.0))]
    pub warming_fraction: f64,
    pub min_peak_duration_hours: usize,
    pub require_cheap_now: bool,
    pub cheap_now_multiplier: f64,
    pub min_valid_temp: f64,
    pub max_valid_temp: f64,
    pub min_valid_price: f64,
    pub max_valid_price: f64,
    pub max_implausible_samples: usize,
    pub severity_cap: f64,
    #[validate(range(exclusive_min = 0.0))]
    pub temp_severity_divisor: f64,
    #[validate(range(exclusive_min = 0.0))]
    pub price_severity_divisor: f64,
    #[validate(range(exclusive_min = 0.0))]
    pub duration_severity_divisor: f64,
    pub advance_min_inertia_factor: f64,
    pub advance_max_inertia_factor: f64,
    pub advance_max_base_hours: f64,
    pub advance_severity_factor: f64,
    pub advance_floor_hours: f64,
    pub advance_ceiling_hours: f64,
}
impl Default for PreboostConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_outdoor_temp: 10.0,
            output_temp: -15.0,
            base_ratio: 0.9,
            aggressiveness_scaling: 0.04,
            min_ratio: 0.5,
            max_ratio: 0.9,
            cold_margin: 2.0,
            lookahead_hours: 12,
            duration_lookahead_hours: 6,
            warming_fraction: 0.8,
            min_peak_duration_hours: 1,
            require_cheap_now: false,
            cheap_now_multiplier: 0.6,
            min_valid_temp: -50.0,
            max_valid_temp: 50.0,
            min_valid_price: -2.0,
            max_valid_price: 15.0,
            max_implausible_samples: 2,
            severity_cap: 2.0,
            temp_severity_divisor: 5.0,
            price_severity_divisor: 0.25,
            duration_severity_divisor: 4.0,
            advance_min_inertia_factor: 0.5,
            advance_max_inertia_factor: 1.5,
            advance_max_base_hours: 1.0,
            advance_severity_factor: 0.5,
            advance_floor_hours: 0.5,
            advance_ceiling_hours: 6.0,
        }
    }
}

fn validate_preboost(cfg: &PreboostConfig) -> Result<(), ValidationError> {
    if cfg.min_ratio > cfg.max_ratio {
        return Err(ValidationError::new("min_ratio_above_max_ratio"));
    }
    if cfg.advance_floor_hours > cfg.advance_ceiling_hours {
        return Err(ValidationError::new("advance_floor_above_ceiling"));
    }
    Ok(())
}

/// Rule constants for the synthetic temperature itself
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct SynthesisConfig {
    pub fixed_brake_temp: f64,
    pub winter_brake_offset: f64,
    pub winter_brake_threshold: f64,
    #[validate(range(min = 0.0, max = 5.0))]
    pub cheap_overshoot: f64,
    #[validate(range(min = 0.0))]
    pub neutral_deadband: f64,
    #[validate(range(min = 0.0))]
    pub too_cold_deficit: f64,
    #[validate(range(min = 0.0, max = 1.0))]
    pub expensive_now_floor: f64,
    pub precool_lookahead_hours: usize,
    pub precool_margin: f64,
}
impl Default for SynthesisConfig {
    fn default() -> Self {
        Self {
            fixed_brake_temp: 19.0,
            winter_brake_offset: 10.0,
            winter_brake_threshold: 7.0,
            cheap_overshoot: 1.5,
            neutral_deadband: 0.5,
            too_cold_deficit: 1.5,
            expensive_now_floor: 0.5,
            precool_lookahead_hours: 24,
            precool_margin: 3.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HolidayConfig {
    pub target_temp: f64,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}
impl Default for HolidayConfig {
    fn default() -> Self {
        Self { target_temp: 16.0, start: None, end: None }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct InertiaConfig {
    #[validate(range(min = 0.0, max = 5.0))]
    pub default_value: f64,
    #[validate(range(min = 1))]
    pub update_interval_minutes: i64,
    pub min_outdoor_delta: f64,
    pub contribution_limit: f64,
    pub max_value: f64,
    /// Weight of the previous estimate in the moving average
    pub history_weight: f64,
}
impl Default for InertiaConfig {
    fn default() -> Self {
        Self {
            default_value: 1.0,
            update_interval_minutes: 10,
            min_outdoor_delta: 0.1,
            contribution_limit: 5.0,
            max_value: 5.0,
            history_weight: 4.0,
        }
    }
}

/// House model used by the `simulated` source
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct SimulatedHouseConfig {
    /// Thermal mass of the concrete slab (kWh/K)
    #[validate(range(exclusive_min = 0.0))]
    pub slab_thermal_mass_kwh_k: f64,
    /// Thermal mass of the room air (kWh/K)
    #[validate(range(exclusive_min = 0.0))]
    pub air_thermal_mass_kwh_k: f64,
    #[validate(range(exclusive_min = 0.0))]
    pub r_slab_to_air_k_per_kw: f64,
    #[validate(range(exclusive_min = 0.0))]
    pub r_air_to_out_k_per_kw: f64,
    pub ground_temp_c: f64,
    #[validate(range(exclusive_min = 0.0))]
    pub r_slab_to_ground_k_per_kw: f64,
    /// Occupants and appliances (kW)
    pub internal_gains_kw: f64,

    /// Heating curve: output is `curve_kw_per_k · (curve_balance_temp_c − T_synthetic)`
    pub curve_balance_temp_c: f64,
    pub curve_kw_per_k: f64,
    #[validate(range(min = 0.0))]
    pub max_heat_kw: f64,

    /// Daily mean outdoor temperature (°C)
    pub outdoor_mean_c: f64,
    /// Half the day/night swing (°C); warmest at 15:00
    pub outdoor_swing_c: f64,
    /// Outdoor drift per day (°C)
    pub outdoor_trend_c_per_day: f64,

    /// Off-peak price
    pub base_price: f64,
    pub morning_peak_price: f64,
    pub evening_peak_price: f64,

    pub target_temp_c: f64,
    pub summer_threshold_c: f64,
    pub aggressiveness: f64,
    pub initial_air_temp_c: f64,
    pub initial_slab_temp_c: f64,
    /// Simulated time per cycle (minutes)
    #[validate(range(min = 1, max = 240))]
    pub step_minutes: i64,
    #[validate(range(min = 1, max = 48))]
    pub forecast_hours: usize,
}

impl Default for SimulatedHouseConfig {
    fn default() -> Self {
        Self {
            slab_thermal_mass_kwh_k: 6.0,
            air_thermal_mass_kwh_k: 0.3,
            r_slab_to_air_k_per_kw: 2.0,
            r_air_to_out_k_per_kw: 15.0,
            ground_temp_c: 5.0,
            r_slab_to_ground_k_per_kw: 40.0,
            internal_gains_kw: 0.3,
            curve_balance_temp_c: 20.0,
            curve_kw_per_k: 0.1,
            max_heat_kw: 6.0,
            outdoor_mean_c: 0.0,
            outdoor_swing_c: 3.0,
            outdoor_trend_c_per_day: 0.0,
            base_price: 0.8,
            morning_peak_price: 1.6,
            evening_peak_price: 2.4,
            target_temp_c: 21.0,
            summer_threshold_c: 18.0,
            aggressiveness: 3.0,
            initial_air_temp_c: 21.0,
            initial_slab_temp_c: 24.0,
            step_minutes: 15,
            forecast_hours: 24,
        }
    }
}

impl SimulatedHouseConfig {
    /// Cold snap: falling temperatures through the day
    pub fn cold_snap() -> Self {
        Self {
            outdoor_mean_c: -2.0,
            outdoor_trend_c_per_day: -8.0,
            ..Default::default()
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::load_from("config/default.toml")
    }

    /// Merge the TOML file at `path` with `HEAT_STEER__` environment overrides
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let figment = Figment::new()
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed("HEAT_STEER__").split("__"));
        let cfg: Self = figment.extract().context("failed to read configuration")?;
        cfg.validate().context("invalid configuration")?;
        Ok(cfg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_are_valid() {
        let cfg = Config::default();
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.limits.min_fake_temp, -25.0);
        assert_eq!(cfg.preboost.output_temp, -15.0);
        assert_eq!(cfg.brake.max_delta_per_step, 0.08);
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[server]\nport = 9000\n\n[comfort]\nkp = 1.2\n\n[preboost]\nenabled = false"
        )
        .unwrap();

        let cfg = Config::load_from(file.path()).unwrap();
        assert_eq!(cfg.server.port, 9000);
        assert_eq!(cfg.server.host, "127.0.0.1");
        assert_eq!(cfg.comfort.kp, 1.2);
        assert_eq!(cfg.comfort.ki, 0.1);
        assert!(!cfg.preboost.enabled);
        assert_eq!(cfg.synthesis.winter_brake_offset, 10.0);
    }

    #[test]
    fn test_shipped_default_file_loads() {
        let path = concat!(env!("CARGO_MANIFEST_DIR"), "/config/default.toml");
        let cfg = Config::load_from(path).unwrap();
        assert_eq!(cfg.controller.source, InputSourceKind::Simulated);
        assert_eq!(cfg.classifier.expensive_ratio, 1.40);
        assert_eq!(cfg.preboost.lookahead_hours, 12);
        assert!(cfg.holiday.start.is_none());
        assert_eq!(cfg.simulation.evening_peak_price, 2.4);
    }

    #[test]
    fn test_simulation_section_overrides() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[simulation]\noutdoor_mean_c = -6.0\ntarget_temp_c = 20.0").unwrap();

        let cfg = Config::load_from(file.path()).unwrap();
        assert_eq!(cfg.simulation.outdoor_mean_c, -6.0);
        assert_eq!(cfg.simulation.target_temp_c, 20.0);
        assert_eq!(cfg.simulation.step_minutes, 15);

        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[simulation]\nstep_minutes = 0").unwrap();
        assert!(Config::load_from(file.path()).is_err());
    }

    #[test]
    fn test_out_of_range_is_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[brake]\nmax_delta_per_step = 2.5").unwrap();
        assert!(Config::load_from(file.path()).is_err());
    }

    #[test]
    fn test_inverted_limits_are_rejected() {
        let mut cfg = Config::default();
        cfg.limits.min_fake_temp = 30.0;
        assert!(cfg.validate().is_err());

        let mut cfg = Config::default();
        cfg.preboost.min_ratio = 0.95;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_socket_addr() {
        let addr = ServerConfig::default().socket_addr().unwrap();
        assert_eq!(addr.port(), 8087);
    }
}
