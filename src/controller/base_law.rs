use tracing::{debug, warn};

use crate::domain::Mode;

/// Bounds the base law works within
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BaseLawLimits {
    pub min_fake_temp: f64,
    pub max_fake_temp: f64,
    /// Floor for `braking_by_temp`
    pub brake_temp: f64,
    /// Half-width of the comfort band around the target
    pub neutral_deadband: f64,
}

/// Synthetic temperature from the indoor/target difference alone.
///
/// Too cold indoors lowers the value (more heat), too warm raises it (less
/// heat), and within the band it follows the real outdoor temperature.
/// Non-finite inputs give `error` with the outdoor temperature passed through.
pub fn base_temperature(
    indoor: f64,
    target: f64,
    outdoor: f64,
    aggressiveness: f64,
    limits: &BaseLawLimits,
) -> (f64, Mode) {
    if ![indoor, target, outdoor, aggressiveness].iter().all(|v| v.is_finite()) {
        warn!(indoor, target, outdoor, aggressiveness, "invalid input to base temperature law");
        return (outdoor, Mode::Error);
    }

    let aggressiveness = aggressiveness.clamp(0.0, 5.0);
    if aggressiveness == 0.0 {
        return (outdoor, Mode::Passthrough);
    }

    let scaling = aggressiveness * 0.1;
    let diff = indoor - target;

    let (value, mode) = if diff < -limits.neutral_deadband {
        let value = (outdoor + diff * scaling * 2.0).clamp(limits.min_fake_temp, limits.max_fake_temp);
        (value, Mode::Heating)
    } else if diff > limits.neutral_deadband {
        let floor = limits.brake_temp.min(limits.max_fake_temp);
        let value = (outdoor + diff * scaling * 4.0).clamp(floor, limits.max_fake_temp);
        (value, Mode::BrakingByTemp)
    } else {
        (outdoor, Mode::Neutral)
    };

    if value <= limits.min_fake_temp || value >= limits.max_fake_temp {
        warn!(value, %mode, "synthetic temperature at safety limit");
    }
    debug!(value, %mode, diff, aggressiveness, "base law");
    (value, mode)
}
