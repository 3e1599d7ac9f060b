use std::fs;
use std::path::Path;

use crate::commands::CommandResult;
use offerank_core::{decode_ranking_items, rank_items, ApplicationError};

/// Ranks the items stored as a JSON array at `input`.
pub fn run(input: &Path) -> CommandResult {
    let body = match fs::read(input) {
        Ok(body) => body,
        Err(error) => {
            return CommandResult::failure(
                "rank",
                "input_read",
                format!("could not read `{}`: {error}", input.display()),
                2,
            );
        }
    };

    let ranked = match decode_ranking_items(&body).and_then(|items| rank_items(&items)) {
        Ok(ranked) => ranked,
        Err(error) => {
            let error_class = match error {
                ApplicationError::Validation(_) => "validation",
                _ => "ranking",
            };
            return CommandResult::failure("rank", error_class, error.to_string(), 6);
        }
    };

    match serde_json::to_value(&ranked) {
        Ok(data) => CommandResult::success_with_data(
            "rank",
            format!("ranked {} items, lowest score first", ranked.len()),
            Some(data),
        ),
        Err(error) => CommandResult::failure("rank", "serialization", error.to_string(), 1),
    }
}
