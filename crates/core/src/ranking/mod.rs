//! Multi-criteria ranking: CRITIC weights combined with Voronin scoring.
//!
//! `rank_items` is the request-level entry point. Its output is sorted by
//! ascending score because **lower scores are better**.

pub mod critic;
pub mod matrix;
pub mod voronin;

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;

use crate::errors::ApplicationError;

pub use critic::critic_weights;
pub use matrix::{deviation_matrix, parse_modes, CriterionMatrix, DeviationMatrix, Mode};
pub use voronin::voronin_scores;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SelectedCharacteristic {
    pub parameter: String,
    pub value: f64,
    pub mode: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RankingItem {
    pub id: String,
    pub title: String,
    pub selected_characteristics: Vec<SelectedCharacteristic>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RankedItem {
    pub id: String,
    pub title: String,
    pub score: f64,
}

/// Decodes a JSON request body into ranking items. Anything but a JSON list
/// of well-formed items is a validation error.
pub fn decode_ranking_items(body: &[u8]) -> Result<Vec<RankingItem>, ApplicationError> {
    let value: Value = serde_json::from_slice(body)
        .map_err(|error| ApplicationError::Validation(format!("invalid JSON body: {error}")))?;
    if !value.is_array() {
        return Err(ApplicationError::Validation("ranking input must be a list of items".into()));
    }
    serde_json::from_value(value)
        .map_err(|error| ApplicationError::Validation(format!("invalid ranking item: {error}")))
}

/// Ranks `items` by ascending score, best first; lower scores are better.
///
/// Criterion columns and their modes are taken from the first item, in its
/// order; every other item must report a value for each of those parameters
/// (extra parameters are ignored). Ties keep their input order.
pub fn rank_items(items: &[RankingItem]) -> Result<Vec<RankedItem>, ApplicationError> {
    let first = items
        .first()
        .ok_or_else(|| ApplicationError::Validation("ranking input must not be empty".into()))?;
    if first.selected_characteristics.is_empty() {
        return Err(ApplicationError::Validation(
            "first ranking item must select at least one characteristic".into(),
        ));
    }

    let mut seen = HashSet::new();
    for characteristic in &first.selected_characteristics {
        if !seen.insert(characteristic.parameter.as_str()) {
            return Err(ApplicationError::Validation(format!(
                "parameter `{}` is selected more than once",
                characteristic.parameter
            )));
        }
    }

    let parameters: Vec<&str> =
        first.selected_characteristics.iter().map(|ch| ch.parameter.as_str()).collect();
    let modes = parse_modes(
        &first.selected_characteristics.iter().map(|ch| ch.mode.as_str()).collect::<Vec<_>>(),
    )?;

    let rows = items
        .iter()
        .map(|item| {
            parameters
                .iter()
                .map(|parameter| {
                    item.selected_characteristics
                        .iter()
                        .find(|ch| ch.parameter == *parameter)
                        .map(|ch| ch.value)
                        .ok_or_else(|| {
                            ApplicationError::Validation(format!(
                                "item `{}` has no value for parameter `{parameter}`",
                                item.id
                            ))
                        })
                })
                .collect::<Result<Vec<f64>, _>>()
        })
        .collect::<Result<Vec<_>, _>>()?;

    let matrix = CriterionMatrix::from_rows(rows)?;
    let weights = critic_weights(&matrix, &modes)?;
    let scores = voronin_scores(&matrix, &weights, &modes)?;

    let mut ranked: Vec<RankedItem> = items
        .iter()
        .zip(scores)
        .map(|(item, score)| RankedItem { id: item.id.clone(), title: item.title.clone(), score })
        .collect();
    ranked.sort_by(|a, b| a.score.total_cmp(&b.score));

    info!(
        event_name = "ranking.completed",
        alternatives = ranked.len(),
        criteria = parameters.len(),
        "ranking completed"
    );
    Ok(ranked)
}
