use super::{median, percentile};
use crate::domain::PriceBlock;

/// Steps of look-ahead used for price pressure, by grid width
pub fn select_price_horizon(interval_minutes: u32, steps_15m: usize, steps_hourly: usize) -> usize {
    if interval_minutes <= 30 {
        steps_15m
    } else {
        steps_hourly
    }
}

/// Prices from `start` covering at most `max_hours`; `start` is clamped into the series
pub fn build_forward_price_series(
    prices: &[f64],
    start: usize,
    interval_minutes: u32,
    max_hours: u32,
) -> &[f64] {
    if prices.is_empty() {
        return prices;
    }
    let start = start.min(prices.len() - 1);
    let steps = ((f64::from(max_hours) * 60.0 / f64::from(interval_minutes.max(1))).round()
        as usize)
        .max(1);
    let end = (start + steps).min(prices.len());
    &prices[start..end]
}

/// Median of `window` samples starting at `start`
pub fn compute_price_baseline(prices: &[f64], start: usize, window: usize) -> f64 {
    if start >= prices.len() {
        return 0.0;
    }
    let end = (start + window).min(prices.len());
    if end <= start {
        return prices[start];
    }
    median(&prices[start..end])
}

/// Excess over `baseline` in the next `horizon` steps, nearer steps weighted more
pub fn compute_price_pressure(prices: &[f64], start: usize, horizon: usize, baseline: f64) -> f64 {
    if horizon == 0 || start >= prices.len() {
        return 0.0;
    }
    let steps = horizon.min(prices.len() - start);
    prices[start..start + steps]
        .iter()
        .enumerate()
        .map(|(offset, price)| {
            let weight = (horizon - offset) as f64 / horizon as f64;
            weight * (price - baseline).max(0.0)
        })
        .sum()
}

/// Expensive threshold: a percentile of the window when one is configured,
/// otherwise `baseline + delta`.
pub fn compute_threshold(prices: &[f64], baseline: f64, delta: f64, pct: Option<f64>) -> f64 {
    match pct {
        Some(pct) => percentile(prices, pct),
        None => baseline + delta,
    }
}

/// Summarise samples `start..=end` against `threshold`
pub fn compute_block_area(
    prices: &[f64],
    start: usize,
    end: usize,
    threshold: f64,
    interval_minutes: u32,
) -> PriceBlock {
    let hours = f64::from(interval_minutes) / 60.0;
    let (area, peak) = prices[start..=end]
        .iter()
        .fold((0.0, threshold), |(area, peak), &price| {
            (area + (price - threshold).max(0.0) * hours, peak.max(price))
        });
    PriceBlock {
        start_index: start,
        end_index: end,
        interval_minutes,
        area,
        peak,
    }
}

/// Maximal runs strictly above `threshold` lasting at least `min_block_minutes`
pub fn detect_expensive_blocks(
    prices: &[f64],
    threshold: f64,
    interval_minutes: u32,
    min_block_minutes: u32,
) -> Vec<PriceBlock> {
    let mut blocks = Vec::new();
    let mut run_start: Option<usize> = None;

    let close = |start: usize, end: usize, blocks: &mut Vec<PriceBlock>| {
        let block = compute_block_area(prices, start, end, threshold, interval_minutes);
        if block.duration_minutes() >= min_block_minutes {
            blocks.push(block);
        }
    };

    for (index, &price) in prices.iter().enumerate() {
        match (price > threshold, run_start) {
            (true, None) => run_start = Some(index),
            (false, Some(start)) => {
                close(start, index - 1, &mut blocks);
                run_start = None;
            }
            _ => {}
        }
    }
    if let Some(start) = run_start {
        close(start, prices.len() - 1, &mut blocks);
    }
    blocks
}

/// Largest area wins; equal areas go to the earliest start
pub fn select_price_block(blocks: &[PriceBlock]) -> Option<PriceBlock> {
    blocks.iter().copied().reduce(|best, candidate| {
        if candidate.area > best.area {
            candidate
        } else {
            best
        }
    })
}

/// Baseline, threshold and the block that drives the brake this cycle
#[derive(Debug, Clone, PartialEq)]
pub struct BlockAnalysis {
    pub baseline: f64,
    pub threshold: f64,
    pub blocks: Vec<PriceBlock>,
    pub selected: Option<PriceBlock>,
}

pub fn analyze_blocks(
    forward: &[f64],
    interval_minutes: u32,
    delta: f64,
    threshold_percentile: Option<f64>,
    min_block_minutes: u32,
) -> BlockAnalysis {
    if forward.is_empty() {
        return BlockAnalysis {
            baseline: 0.0,
            threshold: 0.0,
            blocks: Vec::new(),
            selected: None,
        };
    }
    let baseline = median(forward);
    let threshold = compute_threshold(forward, baseline, delta, threshold_percentile);
    let blocks = detect_expensive_blocks(forward, threshold, interval_minutes, min_block_minutes);
    let selected = select_price_block(&blocks);
    BlockAnalysis {
        baseline,
        threshold,
        blocks,
        selected,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_horizon_by_interval() {
        assert_eq!(select_price_horizon(15, 8, 6), 8);
        assert_eq!(select_price_horizon(60, 8, 6), 6);
    }

    #[test]
    fn test_forward_series_is_bounded() {
        let prices: Vec<f64> = (0..48).map(f64::from).collect();
        assert_eq!(build_forward_price_series(&prices, 10, 60, 24).len(), 24);
        assert_eq!(build_forward_price_series(&prices, 40, 60, 24).len(), 8);
        assert_eq!(build_forward_price_series(&prices, 100, 60, 24), &[47.0]);
        assert_eq!(build_forward_price_series(&prices, 0, 15, 2).len(), 8);
        assert!(build_forward_price_series(&[], 0, 60, 24).is_empty());
    }

    #[test]
    fn test_baseline_window() {
        let prices = [5.0, 1.0, 3.0, 2.0, 100.0];
        assert_eq!(compute_price_baseline(&prices, 0, 3), 3.0);
        assert_eq!(compute_price_baseline(&prices, 1, 3), 2.0);
        assert_eq!(compute_price_baseline(&prices, 9, 3), 0.0);
        assert_eq!(compute_price_baseline(&prices, 2, 0), 3.0);
    }

    #[test]
    fn test_pressure_weights_decay() {
        let prices = [2.0, 2.0, 1.0];
        // weights 3/3, 2/3, 1/3 against baseline 1.0
        let pressure = compute_price_pressure(&prices, 0, 3, 1.0);
        assert!((pressure - (1.0 + 2.0 / 3.0)).abs() < 1e-12);
        assert_eq!(compute_price_pressure(&prices, 0, 0, 1.0), 0.0);
    }

    #[test]
    fn test_threshold_percentile_wins() {
        let prices = [1.0, 2.0, 3.0, 4.0, 5.0];
        assert!((compute_threshold(&prices, 3.0, 0.3, None) - 3.3).abs() < 1e-12);
        assert_eq!(compute_threshold(&prices, 3.0, 0.3, Some(100.0)), 5.0);
    }

    #[test]
    fn test_detects_runs_and_drops_short_ones() {
        let prices = [1.0, 3.0, 1.0, 3.0, 4.0, 1.0, 5.0];
        let blocks = detect_expensive_blocks(&prices, 2.0, 60, 60);
        assert_eq!(blocks.len(), 3);
        assert_eq!((blocks[1].start_index, blocks[1].end_index), (3, 4));
        assert!((blocks[1].area - 3.0).abs() < 1e-12);
        assert_eq!(blocks[1].peak, 4.0);
        // trailing run is closed at the end of the window
        assert_eq!((blocks[2].start_index, blocks[2].end_index), (6, 6));

        let long_only = detect_expensive_blocks(&prices, 2.0, 60, 120);
        assert_eq!(long_only.len(), 1);
        assert_eq!(long_only[0].start_index, 3);
    }

    #[test]
    fn test_area_uses_interval_hours() {
        let block = compute_block_area(&[3.0, 3.0, 3.0, 3.0], 0, 3, 2.0, 15);
        assert!((block.area - 1.0).abs() < 1e-12);
        assert_eq!(block.duration_minutes(), 60);
    }

    #[test]
    fn test_selection_prefers_area_then_earliest() {
        let block = |start, area| PriceBlock {
            start_index: start,
            end_index: start,
            interval_minutes: 60,
            area,
            peak: 1.0,
        };
        let selected = select_price_block(&[block(0, 1.0), block(4, 2.0), block(8, 2.0)]).unwrap();
        assert_eq!(selected.start_index, 4);
        assert!(select_price_block(&[]).is_none());
    }

    #[test]
    fn test_analyze_flat_prices_has_no_block() {
        let analysis = analyze_blocks(&[1.0; 24], 60, 0.3, None, 60);
        assert_eq!(analysis.baseline, 1.0);
        assert!((analysis.threshold - 1.3).abs() < 1e-12);
        assert!(analysis.selected.is_none());
    }

    proptest! {
        #[test]
        fn longer_run_never_has_less_area(
            height in 0.01f64..10.0,
            len in 1usize..12,
            extra in 1usize..12,
        ) {
            let short = vec![height + 1.0; len];
            let long = vec![height + 1.0; len + extra];
            let a = compute_block_area(&short, 0, len - 1, 1.0, 60).area;
            let b = compute_block_area(&long, 0, len + extra - 1, 1.0, 60).area;
            prop_assert!(b >= a);
        }

        #[test]
        fn larger_area_is_always_selected(a in 0.0f64..50.0, b in 0.0f64..50.0) {
            prop_assume!(a != b);
            let blocks = [
                PriceBlock { start_index: 0, end_index: 0, interval_minutes: 60, area: a, peak: 1.0 },
                PriceBlock { start_index: 5, end_index: 5, interval_minutes: 60, area: b, peak: 1.0 },
            ];
            let selected = select_price_block(&blocks).unwrap();
            prop_assert_eq!(selected.area, a.max(b));
        }
    }
}
