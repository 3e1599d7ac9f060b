pub mod connection;
pub mod migrations;
pub mod repositories;

pub use connection::{connect, connect_from_config, connect_with_settings, ping, DbPool};
pub use migrations::MigrationReport;
pub use repositories::{CacheStats, RepositoryError, SqlCandidateRepository};
