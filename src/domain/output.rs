use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use super::forecast::{AdvanceWindow, PreboostPeak};
use super::price::{BlockWindow, PriceBlock, PriceCategory, PriceStatistics};
use super::snapshot::ClassificationMode;

/// Operating mode reported with every synthetic temperature
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Mode {
    Passthrough,
    Heating,
    BrakingByTemp,
    BrakingByPrice,
    Neutral,
    SummerMode,
    Precool,
    Preboost,
    Error,
}

impl Mode {
    /// Modes during which the inertia estimator must not learn
    pub fn pauses_learning(&self) -> bool {
        matches!(
            self,
            Self::Preboost | Self::BrakingByPrice | Self::BrakingByTemp
        )
    }
}

/// Why the price brake is or is not applied this cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum BlockedReason {
    Allowed,
    ExpensiveNow,
    NoPriceBlock,
    TooCold,
    RateLimited,
}

/// Required reading that was absent from a snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum MissingInput {
    IndoorTemp,
    OutdoorTemp,
    TargetTemp,
    SummerThreshold,
    PriceSeries,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceDiagnostics {
    pub current: f64,
    pub category: PriceCategory,
    pub classification_mode: ClassificationMode,
    pub statistics: PriceStatistics,
    pub price_factor_percent: f64,
    pub saving_potential: f64,
    pub next_prices: Vec<f64>,
    pub interval_minutes: u32,
    pub pressure: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BrakeDiagnostics {
    pub baseline: f64,
    pub threshold: f64,
    pub area: f64,
    pub amplitude: f64,
    /// Shaped level before the comfort and expensive-now rules
    pub raw_level: f64,
    /// Level after those rules, before rate limiting
    pub desired_level: f64,
    pub level: f64,
    pub rate_limited: bool,
    pub block: Option<PriceBlock>,
    pub window: Option<BlockWindow>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ComfortDiagnostics {
    pub comfort_push: f64,
    pub pi_integral: f64,
    pub saturated_high: bool,
    pub saturated_low: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PreboostDiagnostics {
    /// `active`, or the reason pre-boost stayed idle
    pub status: String,
    pub peak: Option<PreboostPeak>,
    pub window: Option<AdvanceWindow>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControlDiagnostics {
    pub timestamp: DateTime<Utc>,
    pub effective_target: f64,
    pub aggressiveness: f64,
    pub inertia: f64,
    /// Value before the bias was blended in
    pub raw_temperature: f64,
    pub final_bias: f64,
    pub precool_active: bool,
    pub holiday_active: bool,
    pub price: Option<PriceDiagnostics>,
    pub brake: BrakeDiagnostics,
    pub comfort: ComfortDiagnostics,
    pub preboost: PreboostDiagnostics,
}

/// Result of one successful cycle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControlOutput {
    pub synthetic_temperature: f64,
    pub mode: Mode,
    pub brake_level: f64,
    pub comfort_push: f64,
    pub decision_reason: String,
    pub blocked_reason: BlockedReason,
    pub rate_limited: bool,
    pub diagnostics: ControlDiagnostics,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CycleOutcome {
    Ready(ControlOutput),
    Unavailable {
        timestamp: DateTime<Utc>,
        missing: Vec<MissingInput>,
    },
}

impl CycleOutcome {
    pub fn output(&self) -> Option<&ControlOutput> {
        match self {
            Self::Ready(output) => Some(output),
            Self::Unavailable { .. } => None,
        }
    }

    pub fn synthetic_temperature(&self) -> Option<f64> {
        self.output().map(|o| o.synthetic_temperature)
    }

    pub fn mode(&self) -> Option<Mode> {
        self.output().map(|o| o.mode)
    }
}
