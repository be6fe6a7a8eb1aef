use crate::config::BrakeConfig;
use crate::domain::PriceBlock;
use crate::pricing::{analyze_blocks, BlockAnalysis};

/// Cubic ease `t²(3 − 2t)` with `t` clamped to `[0, 1]`
pub fn smoothstep(t: f64) -> f64 {
    let t = t.clamp(0.0, 1.0);
    t * t * (3.0 - 2.0 * t)
}

/// `area / area_scale` clamped to `[0, 1]`; a non-positive scale counts as 1
pub fn brake_amplitude(area: f64, area_scale: f64) -> f64 {
    let scale = if area_scale > 0.0 { area_scale } else { 1.0 };
    (area / scale).clamp(0.0, 1.0)
}

/// Brake level at `now_offset_minutes` past the start of the current interval.
///
/// Zero until `pre_minutes` before the block, eased up to `amplitude`, held
/// through the block, then eased back to zero over `post_minutes`.
pub fn brake_level_at(
    block: Option<&PriceBlock>,
    amplitude: f64,
    pre_minutes: u32,
    post_minutes: u32,
    now_offset_minutes: f64,
) -> f64 {
    let Some(block) = block else {
        return 0.0;
    };
    if amplitude <= 0.0 {
        return 0.0;
    }

    let start = f64::from(block.start_offset_minutes());
    let end = f64::from(block.end_offset_minutes());
    let pre = f64::from(pre_minutes);
    let post = f64::from(post_minutes);
    let now = now_offset_minutes;

    if now < start - pre {
        0.0
    } else if now < start {
        // only reachable with a non-zero pre window
        amplitude * smoothstep((now - (start - pre)) / pre)
    } else if now < end {
        amplitude
    } else if post > 0.0 && now < end + post {
        amplitude * (1.0 - smoothstep((now - end) / post))
    } else {
        0.0
    }
}

/// Everything the brake computation produced in one cycle
#[derive(Debug, Clone, PartialEq)]
pub struct BrakeShape {
    pub analysis: BlockAnalysis,
    pub area: f64,
    pub amplitude: f64,
    pub level: f64,
}

impl BrakeShape {
    pub fn block(&self) -> Option<&PriceBlock> {
        self.analysis.selected.as_ref()
    }
}

/// Turns a forward price window into a 0..=1 brake level
#[derive(Debug, Clone)]
pub struct BrakeShaper {
    cfg: BrakeConfig,
}

impl BrakeShaper {
    pub fn new(cfg: BrakeConfig) -> Self {
        Self { cfg }
    }

    pub fn shape(&self, forward: &[f64], interval_minutes: u32, now_offset_minutes: f64) -> BrakeShape {
        let analysis = analyze_blocks(
            forward,
            interval_minutes,
            self.cfg.delta,
            self.cfg.percentile,
            self.cfg.min_block_minutes,
        );
        let area = analysis.selected.map(|b| b.area).unwrap_or(0.0);
        let amplitude = match analysis.selected {
            Some(_) => brake_amplitude(area, self.cfg.area_scale),
            None => 0.0,
        };
        let level = brake_level_at(
            analysis.selected.as_ref(),
            amplitude,
            self.cfg.pre_brake_minutes,
            self.cfg.post_release_minutes,
            now_offset_minutes,
        );
        BrakeShape {
            analysis,
            area,
            amplitude,
            level,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn block(start: usize, end: usize) -> PriceBlock {
        PriceBlock {
            start_index: start,
            end_index: end,
            interval_minutes: 60,
            area: 2.0,
            peak: 3.0,
        }
    }

    #[test]
    fn test_smoothstep_endpoints() {
        assert_eq!(smoothstep(-1.0), 0.0);
        assert_eq!(smoothstep(0.0), 0.0);
        assert_eq!(smoothstep(0.5), 0.5);
        assert_eq!(smoothstep(1.0), 1.0);
        assert_eq!(smoothstep(2.0), 1.0);
    }

    #[test]
    fn test_amplitude_scale() {
        assert_eq!(brake_amplitude(2.0, 4.0), 0.5);
        assert_eq!(brake_amplitude(10.0, 4.0), 1.0);
        assert_eq!(brake_amplitude(0.5, 0.0), 0.5);
        assert_eq!(brake_amplitude(-1.0, 4.0), 0.0);
    }

    #[test]
    fn test_level_profile_around_block() {
        // block spans offsets 180..300 minutes, ramps of 60 minutes each side
        let b = block(3, 4);
        let level = |now: f64| brake_level_at(Some(&b), 0.8, 60, 60, now);

        assert_eq!(level(60.0), 0.0);
        assert_eq!(level(120.0), 0.0);
        let pre = level(150.0);
        assert!(pre > 0.0 && pre < 0.8);
        assert!((pre - 0.4).abs() < 1e-12);
        assert_eq!(level(240.0), 0.8);
        let post = level(330.0);
        assert!(post > 0.0 && post < 0.8);
        assert_eq!(level(360.0), 0.0);
        assert_eq!(level(500.0), 0.0);
    }

    #[test]
    fn test_level_without_ramps() {
        let b = block(1, 1);
        assert_eq!(brake_level_at(Some(&b), 1.0, 0, 0, 30.0), 0.0);
        assert_eq!(brake_level_at(Some(&b), 1.0, 0, 0, 60.0), 1.0);
        assert_eq!(brake_level_at(Some(&b), 1.0, 0, 0, 120.0), 0.0);
        assert_eq!(brake_level_at(None, 1.0, 60, 60, 60.0), 0.0);
    }

    #[test]
    fn test_shaper_on_evening_peak() {
        let mut prices = vec![1.0; 24];
        prices[2] = 2.0;
        prices[3] = 2.5;
        let shaper = BrakeShaper::new(BrakeConfig::default());

        // now is 30 minutes into interval 0; block starts at 120 minutes
        let shape = shaper.shape(&prices, 60, 30.0);
        let selected = shape.block().copied().unwrap();
        assert_eq!((selected.start_index, selected.end_index), (2, 3));
        assert!((shape.area - 1.9).abs() < 1e-9);
        assert!((shape.amplitude - 0.475).abs() < 1e-9);
        assert_eq!(shape.level, 0.0);

        let shape = shaper.shape(&prices[2..], 60, 10.0);
        assert!((shape.level - shape.amplitude).abs() < 1e-12);
    }

    #[test]
    fn test_shaper_empty_window() {
        let shape = BrakeShaper::new(BrakeConfig::default()).shape(&[], 60, 0.0);
        assert_eq!(shape.level, 0.0);
        assert!(shape.block().is_none());
    }

    proptest! {
        #[test]
        fn amplitude_is_monotonic_in_area(a in 0.0f64..20.0, b in 0.0f64..20.0, scale in 0.1f64..10.0) {
            let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
            prop_assert!(brake_amplitude(lo, scale) <= brake_amplitude(hi, scale));
        }

        #[test]
        fn level_never_exceeds_amplitude(
            amplitude in 0.0f64..1.0,
            start in 0usize..12,
            len in 0usize..6,
            now in -120.0f64..1200.0,
        ) {
            let b = block(start, start + len);
            let level = brake_level_at(Some(&b), amplitude, 60, 60, now);
            prop_assert!(level >= 0.0 && level <= amplitude + 1e-12);
        }
    }
}
