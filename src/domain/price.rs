use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use thiserror::Error;

const MINUTES_PER_DAY: u32 = 1440;

/// Discrete price label attached to each forecast sample
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum PriceCategory {
    VeryCheap,
    Cheap,
    Normal,
    Expensive,
    VeryExpensive,
    Extreme,
    Unknown,
}

impl PriceCategory {
    /// Expensive, very expensive or extreme
    pub fn is_expensive(&self) -> bool {
        matches!(
            self,
            Self::Expensive | Self::VeryExpensive | Self::Extreme
        )
    }

    pub fn is_very_cheap(&self) -> bool {
        matches!(self, Self::VeryCheap)
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum PriceSeriesError {
    #[error("price series is empty")]
    Empty,

    #[error("interval of {0} minutes does not evenly divide a day")]
    InvalidInterval(u32),
}

/// Ordered price samples on a fixed grid, index 0 being the current interval.
///
/// The interval width is fixed at construction and always divides 1440 minutes.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PriceSeries {
    samples: Vec<f64>,
    interval_minutes: u32,
}

impl PriceSeries {
    /// Build a series, validating an explicit interval or inferring one from the length
    pub fn new(samples: Vec<f64>, interval_minutes: Option<u32>) -> Result<Self, PriceSeriesError> {
        if samples.is_empty() {
            return Err(PriceSeriesError::Empty);
        }

        let interval_minutes = match interval_minutes {
            Some(0) => return Err(PriceSeriesError::InvalidInterval(0)),
            Some(minutes) if MINUTES_PER_DAY % minutes != 0 => {
                return Err(PriceSeriesError::InvalidInterval(minutes))
            }
            Some(minutes) => minutes,
            None => infer_interval_minutes(samples.len()),
        };

        Ok(Self {
            samples,
            interval_minutes,
        })
    }

    pub fn samples(&self) -> &[f64] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn interval_minutes(&self) -> u32 {
        self.interval_minutes
    }

    /// Number of samples that make up one hour (at least one)
    pub fn steps_per_hour(&self) -> usize {
        ((60 / self.interval_minutes.min(60)) as usize).max(1)
    }

    /// Price of the current interval
    pub fn current(&self) -> f64 {
        self.samples[0]
    }

    /// Collapse the series to hourly means; hourly or coarser series are returned as-is
    pub fn hourly_means(&self) -> Vec<f64> {
        let steps = self.steps_per_hour();
        if steps <= 1 {
            return self.samples.clone();
        }
        self.samples
            .chunks(steps)
            .map(|chunk| chunk.iter().sum::<f64>() / chunk.len() as f64)
            .collect()
    }
}

/// Guess the grid width from the sample count: whole days of quarter-hours are
/// 15 minute data, everything else is treated as hourly.
pub fn infer_interval_minutes(len: usize) -> u32 {
    if len > 0 && len % 96 == 0 {
        15
    } else {
        60
    }
}

/// Contiguous run of forecast samples priced above the expensive threshold
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceBlock {
    pub start_index: usize,
    pub end_index: usize,
    pub interval_minutes: u32,
    /// Price above threshold integrated over time (price units x hours)
    pub area: f64,
    pub peak: f64,
}

impl PriceBlock {
    pub fn duration_minutes(&self) -> u32 {
        (self.end_index - self.start_index + 1) as u32 * self.interval_minutes
    }

    pub fn start_offset_minutes(&self) -> u32 {
        self.start_index as u32 * self.interval_minutes
    }

    pub fn end_offset_minutes(&self) -> u32 {
        (self.end_index + 1) as u32 * self.interval_minutes
    }
}

/// Summary figures over a forward price series
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceStatistics {
    pub average: f64,
    pub median: f64,
    pub min: f64,
    pub max: f64,
    pub std: f64,
}

impl PriceStatistics {
    /// Average, median and spread only look at non-negative prices; min and max
    /// cover everything. Returns `None` for an empty slice.
    pub fn from_samples(samples: &[f64]) -> Option<Self> {
        if samples.is_empty() {
            return None;
        }
        let min = samples.iter().copied().fold(f64::INFINITY, f64::min);
        let max = samples.iter().copied().fold(f64::NEG_INFINITY, f64::max);

        let mut positive: Vec<f64> = samples.iter().copied().filter(|p| *p >= 0.0).collect();
        if positive.is_empty() {
            return Some(Self {
                average: 0.0,
                median: 0.0,
                min,
                max,
                std: 0.0,
            });
        }
        positive.sort_by(f64::total_cmp);
        let n = positive.len() as f64;
        let average = positive.iter().sum::<f64>() / n;
        let variance = positive.iter().map(|p| (p - average).powi(2)).sum::<f64>() / n;

        Some(Self {
            average,
            median: median_of_sorted(&positive),
            min,
            max,
            std: variance.sqrt(),
        })
    }

    /// Where `current` sits between the cheapest and the most expensive sample, 0..=1
    pub fn price_factor(&self, current: f64) -> f64 {
        let span = self.max - self.min;
        if span <= f64::EPSILON {
            return 0.0;
        }
        ((current - self.min) / span).clamp(0.0, 1.0)
    }

    pub fn saving_potential(&self, current: f64) -> f64 {
        (self.max - current).max(0.0)
    }
}

pub(crate) fn median_of_sorted(sorted: &[f64]) -> f64 {
    let n = sorted.len();
    if n == 0 {
        return 0.0;
    }
    if n % 2 == 1 {
        sorted[n / 2]
    } else {
        (sorted[n / 2 - 1] + sorted[n / 2]) / 2.0
    }
}

/// Whether the selected block is already running or still ahead of us
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum BlockWindowState {
    Active,
    Upcoming,
}

/// Wall-clock placement of a [`PriceBlock`]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BlockWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub state: BlockWindowState,
}

impl BlockWindow {
    /// Anchor the block on the grid interval that contains `now`.
    ///
    /// `now_offset_minutes` is how far `now` already is into the current interval.
    pub fn from_block(block: &PriceBlock, now: DateTime<Utc>, now_offset_minutes: u32) -> Self {
        let interval_start = now - Duration::minutes(i64::from(now_offset_minutes));
        let start = interval_start + Duration::minutes(i64::from(block.start_offset_minutes()));
        let end = interval_start + Duration::minutes(i64::from(block.end_offset_minutes()));
        let state = if start <= now {
            BlockWindowState::Active
        } else {
            BlockWindowState::Upcoming
        };
        Self { start, end, state }
    }
}
