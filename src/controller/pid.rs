//! Comfort PI (Proportional-Integral) Controller
//!
//! Turns the indoor temperature error into a bounded "comfort push" in
//! `[-1, 1]`. Positive values ask for more heat, negative values for less.
//!
//! # Theory
//! - **P (Proportional)**: Responds to the current error
//! - **I (Integral)**: Responds to accumulated past errors
//!
//! Output = Kp * error + Ki * ∫error*dt
//!
//! The integral accumulator is not stored here. It lives in the caller's
//! controller state and is passed in and handed back on every update, so a
//! single controller value can be shared freely.

use crate::config::ComfortConfig;

/// Result of one PI update
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PiOutput {
    /// Clamped controller output
    pub output: f64,
    /// Integral to carry into the next cycle
    pub integral: f64,
    /// Unclamped output was above the upper bound
    pub saturated_high: bool,
    /// Unclamped output was below the lower bound
    pub saturated_low: bool,
}

#[derive(Debug, Clone)]
pub struct PiController {
    /// Proportional gain
    kp: f64,
    /// Integral gain (per hour)
    ki: f64,

    /// Errors smaller than this are treated as zero
    deadband: f64,

    /// Output limits
    output_min: f64,
    output_max: f64,
}

impl PiController {
    /// Create a PI controller with the default `[-1, 1]` output range
    pub fn new(kp: f64, ki: f64, deadband: f64) -> Self {
        Self::with_limits(kp, ki, deadband, -1.0, 1.0)
    }

    /// Create a PI controller with custom output limits
    pub fn with_limits(kp: f64, ki: f64, deadband: f64, output_min: f64, output_max: f64) -> Self {
        Self {
            kp,
            ki,
            deadband: deadband.max(0.0),
            output_min,
            output_max,
        }
    }

    pub fn from_config(cfg: &ComfortConfig) -> Self {
        Self::new(cfg.kp, cfg.ki, cfg.deadband)
    }

    /// Error with the deadband applied
    pub fn effective_error(&self, error: f64) -> f64 {
        if !error.is_finite() || error.abs() <= self.deadband {
            0.0
        } else {
            error
        }
    }

    /// Calculate control output from the comfort error
    ///
    /// # Arguments
    /// * `error` - Target minus indoor temperature (°C)
    /// * `integral` - Accumulator carried over from the previous cycle
    /// * `dt_hours` - Time since the previous cycle, in hours
    ///
    /// # Anti-windup
    /// When the unclamped output leaves the output range and the error pushes
    /// further in that direction, the integral step is discarded for this cycle.
    pub fn update(&self, error: f64, integral: f64, dt_hours: f64) -> PiOutput {
        let error = self.effective_error(error);
        let dt_hours = if dt_hours.is_finite() { dt_hours.max(0.0) } else { 0.0 };
        let integral = if integral.is_finite() { integral } else { 0.0 };

        let p_term = self.kp * error;
        let mut candidate = integral + self.ki * error * dt_hours;
        let mut raw = p_term + candidate;

        let saturated_high = raw > self.output_max;
        let saturated_low = raw < self.output_min;

        if (saturated_high && error > 0.0) || (saturated_low && error < 0.0) {
            candidate = integral;
            raw = p_term + candidate;
        }

        PiOutput {
            output: raw.clamp(self.output_min, self.output_max),
            integral: candidate,
            saturated_high,
            saturated_low,
        }
    }
}

impl Default for PiController {
    fn default() -> Self {
        Self::from_config(&ComfortConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_pi_proportional_only() {
        let pi = PiController::new(1.0, 0.0, 0.0);
        let out = pi.update(0.5, 0.0, 1.0);
        assert!((out.output - 0.5).abs() < 1e-12);
        assert_eq!(out.integral, 0.0);
    }

    #[test]
    fn test_pi_deadband_zeroes_small_error() {
        let pi = PiController::new(0.6, 0.1, 0.1);
        let out = pi.update(0.05, 0.2, 1.0);
        assert_eq!(out.output, 0.2);
        assert_eq!(out.integral, 0.2);
    }

    #[test]
    fn test_pi_integral_accumulation() {
        let pi = PiController::new(0.6, 0.1, 0.1);
        let mut integral = 0.0;
        let mut last = 0.0;
        for _ in 0..3 {
            let out = pi.update(1.0, integral, 1.0);
            integral = out.integral;
            last = out.output;
        }
        // sustained error: output above the proportional-only 0.6
        assert!(last > 0.6);
        assert!((integral - 0.3).abs() < 1e-12);
    }

    #[test]
    fn test_pi_anti_windup_freezes_integral() {
        let pi = PiController::new(0.6, 0.1, 0.1);
        let out = pi.update(3.0, 0.0, 1.0);
        assert!(out.saturated_high);
        assert_eq!(out.output, 1.0);
        assert_eq!(out.integral, 0.0);

        let out = pi.update(-3.0, 0.0, 1.0);
        assert!(out.saturated_low);
        assert_eq!(out.output, -1.0);
        assert_eq!(out.integral, 0.0);
    }

    #[test]
    fn test_pi_unwinds_when_error_reverses() {
        let pi = PiController::new(0.6, 0.1, 0.0);
        // large stored integral, error now negative: integral must move down
        let out = pi.update(-0.5, 2.0, 1.0);
        assert!(out.saturated_high);
        assert!((out.integral - 1.95).abs() < 1e-12);
        assert_eq!(out.output, 1.0);
    }

    #[test]
    fn test_pi_ignores_non_finite_inputs() {
        let pi = PiController::default();
        let out = pi.update(f64::NAN, f64::INFINITY, f64::NAN);
        assert_eq!(out.output, 0.0);
        assert_eq!(out.integral, 0.0);
    }

    proptest! {
        #[test]
        fn output_stays_bounded(
            error in -20.0f64..20.0,
            integral in -5.0f64..5.0,
            dt in 0.0f64..4.0,
        ) {
            let out = PiController::default().update(error, integral, dt);
            prop_assert!(out.output >= -1.0 && out.output <= 1.0);
        }

        #[test]
        fn saturated_integral_never_grows(error in 2.0f64..20.0, steps in 1usize..50) {
            let pi = PiController::default();
            let mut integral = 0.0;
            for _ in 0..steps {
                integral = pi.update(error, integral, 1.0).integral;
            }
            prop_assert_eq!(integral, 0.0);
        }
    }
}
