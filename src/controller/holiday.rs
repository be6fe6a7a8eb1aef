use chrono::{DateTime, Utc};
use tracing::debug;

use crate::config::HolidayConfig;

/// Holiday mode needs the switch on and `now` inside the configured window.
///
/// An unconfigured or inverted window keeps holiday mode off.
pub fn is_holiday_active(cfg: &HolidayConfig, switch_on: bool, now: DateTime<Utc>) -> bool {
    if !switch_on {
        return false;
    }
    match (cfg.start, cfg.end) {
        (Some(start), Some(end)) if start <= end => start <= now && now <= end,
        (Some(_), Some(_)) => {
            debug!("holiday window ends before it starts");
            false
        }
        _ => {
            debug!("holiday window not configured");
            false
        }
    }
}

/// Target to steer towards this cycle
pub fn effective_target(cfg: &HolidayConfig, target: f64, holiday_active: bool) -> f64 {
    if holiday_active {
        cfg.target_temp
    } else {
        target
    }
}
