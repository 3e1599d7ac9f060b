//! Voronin compromise scoring.
//!
//! Each alternative is scored by its weighted distance from the ideal point:
//! `score_i = Σ_j w_j / (1 - dev_ij + ε)`. An alternative sitting on the ideal
//! point of every criterion scores `Σ w_j = 1`, the minimum; approaching the
//! anti-ideal on a weighted criterion inflates the score without bound.
//!
//! **Lower scores are better.** Sort ascending to obtain the recommendation.

use tracing::debug;

use super::matrix::{deviation_matrix, CriterionMatrix, Mode};
use crate::errors::RankingError;

pub const WEIGHT_SUM_TOLERANCE: f64 = 1e-9;
/// Keeps the anti-ideal term finite.
pub const ANTI_IDEAL_EPSILON: f64 = 1e-12;

/// Scores every row of `matrix`, preserving row order. Lower is better.
///
/// All inputs are validated before any computation: the weight sum first,
/// then the mode vector length, then the weight vector shape and signs.
pub fn voronin_scores(
    matrix: &CriterionMatrix,
    weights: &[f64],
    modes: &[Mode],
) -> Result<Vec<f64>, RankingError> {
    let sum: f64 = weights.iter().sum();
    if (sum - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
        return Err(RankingError::WeightSum { sum });
    }
    matrix.check_modes(modes)?;
    if weights.len() != matrix.columns() {
        return Err(RankingError::ShapeMismatch {
            what: "weight vector",
            expected: matrix.columns(),
            actual: weights.len(),
        });
    }
    if let Some((column, weight)) =
        weights.iter().copied().enumerate().find(|(_, weight)| *weight < 0.0)
    {
        return Err(RankingError::NegativeWeight { column, weight });
    }

    let deviation = deviation_matrix(matrix, modes)?;
    let scores: Vec<f64> = (0..deviation.rows())
        .map(|row| {
            deviation
                .row(row)
                .iter()
                .zip(weights)
                .map(|(dev, weight)| weight / (1.0 - dev + ANTI_IDEAL_EPSILON))
                .sum()
        })
        .collect();

    debug!(
        event_name = "ranking.voronin.scores",
        rows = matrix.rows(),
        columns = matrix.columns(),
        "computed Voronin scores"
    );
    Ok(scores)
}
