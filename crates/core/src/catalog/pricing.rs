//! Typical offer price out of a noisy list of shop offers.

use std::collections::BTreeMap;

/// Reduces offer prices to one representative value, rounded to cents.
///
/// Up to three prices are averaged. Larger samples are binned with the
/// Freedman–Diaconis width and the mean of the densest bin is returned, which
/// keeps a few outlying offers from dragging the price. Non-finite prices are
/// ignored; an empty sample yields `None`.
pub fn trend_price(prices: &[f64]) -> Option<f64> {
    let mut values: Vec<f64> = prices.iter().copied().filter(|value| value.is_finite()).collect();
    if values.is_empty() {
        return None;
    }
    values.sort_by(f64::total_cmp);

    Some(round_cents(densest_mean(&values)))
}

fn densest_mean(sorted: &[f64]) -> f64 {
    let overall = mean(sorted);
    if sorted.len() <= 3 {
        return overall;
    }

    let iqr = percentile(sorted, 0.75) - percentile(sorted, 0.25);
    let width = 2.0 * iqr * (sorted.len() as f64).powf(-1.0 / 3.0);
    if width <= 0.0 || !width.is_finite() {
        return overall;
    }

    // Bins are keyed sparsely by index, so a far outlier costs one map entry.
    let min = sorted[0];
    let max = sorted[sorted.len() - 1];
    let edge_count = ((max + width - min) / width).ceil();
    if edge_count < 2.0 {
        return overall;
    }
    let last_bin = edge_count - 2.0;
    let last_edge = min + (edge_count - 1.0) * width;

    let mut counts: BTreeMap<u64, usize> = BTreeMap::new();
    for value in sorted {
        if *value > last_edge {
            continue;
        }
        let index = ((value - min) / width).floor().min(last_bin) as u64;
        *counts.entry(index).or_default() += 1;
    }

    let mut densest: Option<(u64, usize)> = None;
    for (index, count) in counts {
        if densest.map_or(true, |(_, best)| count > best) {
            densest = Some((index, count));
        }
    }
    let Some((densest, _)) = densest else {
        return overall;
    };

    let low = min + densest as f64 * width;
    let high = min + (densest + 1) as f64 * width;
    let clustered: Vec<f64> =
        sorted.iter().copied().filter(|value| *value >= low && *value < high).collect();
    if clustered.is_empty() {
        overall
    } else {
        mean(&clustered)
    }
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

/// Linear interpolation between closest ranks on sorted input.
fn percentile(sorted: &[f64], quantile: f64) -> f64 {
    let position = (sorted.len() - 1) as f64 * quantile;
    let lower = position.floor() as usize;
    let upper = position.ceil() as usize;
    let fraction = position - lower as f64;
    sorted[lower] + (sorted[upper] - sorted[lower]) * fraction
}

fn round_cents(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::{percentile, trend_price};

    #[test]
    fn empty_or_non_finite_sample_has_no_price() {
        assert_eq!(trend_price(&[]), None);
        assert_eq!(trend_price(&[f64::NAN]), None);
    }

    #[test]
    fn small_samples_are_averaged() {
        assert_eq!(trend_price(&[100.0, 200.0, 301.0]), Some(200.33));
    }

    #[test]
    fn identical_prices_fall_back_to_the_mean() {
        assert_eq!(trend_price(&[250.0; 6]), Some(250.0));
    }

    #[test]
    fn outlying_offer_does_not_move_the_trend() {
        let prices = [104.0, 100.0, 400.0, 101.0, 102.0, 105.0, 103.0];

        assert_eq!(trend_price(&prices), Some(101.5));
    }

    #[test]
    fn extreme_outlier_keeps_the_trend_of_the_cluster() {
        let prices = [1000.0, 1010.0, 1020.0, 1030.0, 1.0e13];

        assert_eq!(trend_price(&prices), Some(1010.0));
    }

    #[test]
    fn percentile_interpolates_between_ranks() {
        let sorted = [100.0, 101.0, 102.0, 103.0, 104.0, 105.0, 400.0];

        assert_eq!(percentile(&sorted, 0.25), 101.5);
        assert_eq!(percentile(&sorted, 0.75), 104.5);
    }
}
