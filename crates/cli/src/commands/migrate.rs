use offerank_core::config::{AppConfig, LoadOptions};
use offerank_db::{connect_from_config, migrations, MigrationReport, SqlCandidateRepository};
use serde_json::json;

use crate::commands::{runtime, CommandResult};

struct Failure {
    error_class: &'static str,
    message: String,
    exit_code: u8,
}

impl Failure {
    fn new(error_class: &'static str, message: impl ToString, exit_code: u8) -> Self {
        Self { error_class, message: message.to_string(), exit_code }
    }
}

/// Brings the candidate cache schema up to date and reports what changed.
pub fn run() -> CommandResult {
    let outcome = AppConfig::load(LoadOptions::default())
        .map_err(|error| {
            Failure::new("config_validation", format!("configuration issue: {error}"), 2)
        })
        .and_then(|config| {
            let runtime = runtime().map_err(|error| {
                let message = format!("failed to initialize async runtime: {error}");
                Failure::new("runtime_init", message, 3)
            })?;
            runtime.block_on(migrate(&config))
        });

    match outcome {
        Ok((report, candidates)) => {
            let message = if report.is_noop() {
                "candidate cache schema already up to date".to_string()
            } else {
                format!("applied {} pending migration(s)", report.applied.len())
            };
            CommandResult::success_with_data(
                "migrate",
                message,
                Some(json!({
                    "applied": report.applied,
                    "schema_version": report.schema_version,
                    "cached_candidates": candidates,
                })),
            )
        }
        Err(Failure { error_class, message, exit_code }) => {
            CommandResult::failure("migrate", error_class, message, exit_code)
        }
    }
}

async fn migrate(config: &AppConfig) -> Result<(MigrationReport, i64), Failure> {
    let pool = connect_from_config(&config.database)
        .await
        .map_err(|error| Failure::new("db_connectivity", error, 4))?;

    let result = async {
        let report = migrations::run_pending(&pool)
            .await
            .map_err(|error| Failure::new("migration", error, 5))?;
        let stats = SqlCandidateRepository::new(pool.clone())
            .stats()
            .await
            .map_err(|error| Failure::new("migration", error, 5))?;
        Ok((report, stats.candidates))
    }
    .await;

    pool.close().await;
    result
}
