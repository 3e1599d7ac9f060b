//! CRITIC criterion weighting (CRiteria Importance Through Intercriteria
//! Correlation).
//!
//! A criterion earns weight when its normalized values are spread out
//! (contrast) and when they disagree with the other criteria (conflict).

use tracing::debug;

use super::matrix::{benefit_columns, CriterionMatrix, Mode};
use crate::errors::RankingError;

/// Returns one nonnegative weight per column, summing to 1.0.
///
/// Fails with [`RankingError::DegenerateInput`] when no column carries any
/// information (every column constant, or a single alternative).
pub fn critic_weights(matrix: &CriterionMatrix, modes: &[Mode]) -> Result<Vec<f64>, RankingError> {
    matrix.check_modes(modes)?;
    let columns = benefit_columns(matrix, modes);

    let contrast: Vec<f64> = columns.iter().map(|column| population_std(column)).collect();

    let conflict: Vec<f64> = (0..columns.len())
        .map(|j| {
            let disagreement: f64 = (0..columns.len())
                .filter(|&k| k != j)
                .map(|k| 1.0 - pearson(&columns[j], &columns[k]))
                .sum();
            contrast[j] * disagreement
        })
        .collect();

    let total: f64 = conflict.iter().sum();
    if total <= 0.0 || !total.is_finite() {
        return Err(RankingError::DegenerateInput);
    }

    let weights: Vec<f64> = conflict.iter().map(|c| c / total).collect();
    debug!(
        event_name = "ranking.critic.weights",
        rows = matrix.rows(),
        columns = matrix.columns(),
        weights = ?weights,
        "computed CRITIC weights"
    );
    Ok(weights)
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

/// Standard deviation dividing by the population size.
fn population_std(values: &[f64]) -> f64 {
    let mean = mean(values);
    let variance =
        values.iter().map(|value| (value - mean).powi(2)).sum::<f64>() / values.len() as f64;
    variance.sqrt()
}

/// Pearson correlation; undefined (a constant series) is reported as 0.
fn pearson(a: &[f64], b: &[f64]) -> f64 {
    let mean_a = mean(a);
    let mean_b = mean(b);

    let mut covariance = 0.0;
    let mut spread_a = 0.0;
    let mut spread_b = 0.0;
    for (x, y) in a.iter().zip(b) {
        let dx = x - mean_a;
        let dy = y - mean_b;
        covariance += dx * dy;
        spread_a += dx * dx;
        spread_b += dy * dy;
    }

    let denominator = (spread_a * spread_b).sqrt();
    if denominator == 0.0 || !denominator.is_finite() {
        return 0.0;
    }
    (covariance / denominator).clamp(-1.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::{critic_weights, pearson, population_std};
    use crate::errors::RankingError;
    use crate::ranking::matrix::{CriterionMatrix, Mode};

    fn matrix_from_columns(columns: &[&[f64]]) -> CriterionMatrix {
        let rows = columns[0].len();
        CriterionMatrix::from_rows(
            (0..rows).map(|row| columns.iter().map(|column| column[row]).collect()).collect(),
        )
        .expect("valid matrix")
    }

    fn assert_normalized(weights: &[f64]) {
        assert!(weights.iter().all(|weight| *weight >= 0.0), "weights {weights:?}");
        let sum: f64 = weights.iter().sum();
        assert!((sum - 1.0).abs() < 1e-9, "weights sum to {sum}");
    }

    #[test]
    fn weights_are_nonnegative_and_sum_to_one() {
        let matrix = matrix_from_columns(&[&[1.0, 2.0, 3.0], &[10.0, 50.0, 100.0]]);
        let weights = critic_weights(&matrix, &[Mode::Max, Mode::Max]).expect("weights");

        assert_eq!(weights.len(), 2);
        assert_normalized(&weights);
    }

    #[test]
    fn wider_spread_column_receives_at_least_as_much_weight() {
        let matrix = matrix_from_columns(&[&[1.0, 2.0, 3.0], &[10.0, 50.0, 100.0]]);
        let weights = critic_weights(&matrix, &[Mode::Max, Mode::Max]).expect("weights");

        assert!(weights[1] > weights[0], "weights {weights:?}");
    }

    #[test]
    fn conflicting_criteria_share_weight_by_contrast() {
        let matrix = matrix_from_columns(&[
            &[500.0, 600.0, 700.0, 550.0, 650.0, 620.0, 580.0, 560.0, 590.0, 400.0],
            &[10000.0, 9500.0, 9700.0, 9600.0, 9800.0, 9300.0, 9200.0, 9100.0, 9400.0, 15000.0],
            &[15.0, 13.0, 14.0, 12.0, 13.0, 11.0, 10.0, 13.0, 12.0, 25.0],
        ]);
        let weights =
            critic_weights(&matrix, &[Mode::Min, Mode::Max, Mode::Max]).expect("weights");

        assert_normalized(&weights);
        assert!(weights.iter().all(|weight| *weight > 0.0));
    }

    #[test]
    fn constant_column_gets_zero_weight_without_poisoning_others() {
        let matrix = matrix_from_columns(&[
            &[7.0, 7.0, 7.0, 7.0],
            &[1.0, 4.0, 2.0, 8.0],
            &[3.0, 1.0, 9.0, 2.0],
        ]);
        let weights =
            critic_weights(&matrix, &[Mode::Max, Mode::Max, Mode::Min]).expect("weights");

        assert_eq!(weights[0], 0.0);
        assert!(weights.iter().all(|weight| weight.is_finite()));
        assert_normalized(&weights);
    }

    #[test]
    fn all_constant_columns_are_degenerate() {
        let matrix = matrix_from_columns(&[&[3.0, 3.0], &[8.0, 8.0]]);
        let error = critic_weights(&matrix, &[Mode::Max, Mode::Min]).expect_err("degenerate");

        assert_eq!(error, RankingError::DegenerateInput);
    }

    #[test]
    fn single_alternative_is_degenerate() {
        let matrix = matrix_from_columns(&[&[3.0], &[8.0]]);

        assert_eq!(
            critic_weights(&matrix, &[Mode::Max, Mode::Min]),
            Err(RankingError::DegenerateInput)
        );
    }

    #[test]
    fn mode_length_mismatch_is_reported_before_computation() {
        let matrix = matrix_from_columns(&[&[1.0, 2.0], &[3.0, 4.0]]);

        assert!(matches!(
            critic_weights(&matrix, &[Mode::Max]),
            Err(RankingError::ShapeMismatch { expected: 2, actual: 1, .. })
        ));
    }

    #[test]
    fn statistics_helpers_follow_population_conventions() {
        assert!((population_std(&[0.0, 0.5, 1.0]) - (1.0f64 / 6.0).sqrt()).abs() < 1e-12);
        assert_eq!(pearson(&[1.0, 1.0, 1.0], &[1.0, 2.0, 3.0]), 0.0);
        assert!((pearson(&[1.0, 2.0, 3.0], &[2.0, 4.0, 6.0]) - 1.0).abs() < 1e-12);
        assert!((pearson(&[1.0, 2.0, 3.0], &[3.0, 2.0, 1.0]) + 1.0).abs() < 1e-12);
    }
}
