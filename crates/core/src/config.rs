use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const CONFIG_FILE_CANDIDATES: [&str; 2] = ["offerank.toml", "config/offerank.toml"];

#[derive(Clone, Debug, PartialEq)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub server: ServerConfig,
    pub upstream: UpstreamConfig,
    pub acquisition: AcquisitionConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
}

/// Endpoints of the public catalog and the price aggregator.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UpstreamConfig {
    pub catalog_search_url: String,
    pub catalog_product_url: String,
    pub price_search_url: String,
    pub price_graphql_url: String,
    pub price_referer_base: String,
    pub price_city_id: u32,
    pub request_timeout_secs: u64,
    pub user_agent: String,
    pub catalog_max_pages: u32,
}

#[derive(Clone, Debug, PartialEq)]
pub struct AcquisitionConfig {
    pub max_attempts: u32,
    pub pacing_min_ms: u64,
    pub pacing_max_ms: u64,
    pub required_share: f64,
    pub default_listing_limit: u32,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub database_url: Option<String>,
    pub log_level: Option<String>,
    pub server_port: Option<u16>,
    pub catalog_search_url: Option<String>,
    pub catalog_product_url: Option<String>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

/// One effective setting: dotted key, environment variable, rendered value.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConfigEntry {
    pub key: &'static str,
    pub env_key: &'static str,
    pub value: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                url: "sqlite://offerank.db".to_string(),
                max_connections: 5,
                timeout_secs: 30,
            },
            server: ServerConfig { bind_address: "127.0.0.1".to_string(), port: 8080 },
            upstream: UpstreamConfig {
                catalog_search_url: "https://prozorro.gov.ua/api/search/products".to_string(),
                catalog_product_url: "https://market-api.prozorro.gov.ua/api/products"
                    .to_string(),
                price_search_url: "https://hotline.ua/svc/search/api/json-rpc".to_string(),
                price_graphql_url: "https://hotline.ua/svc/frontend-api/graphql".to_string(),
                price_referer_base: "https://hotline.ua".to_string(),
                price_city_id: 187,
                request_timeout_secs: 30,
                user_agent: "Mozilla/5.0".to_string(),
                catalog_max_pages: 20,
            },
            acquisition: AcquisitionConfig {
                max_attempts: 5,
                pacing_min_ms: 400,
                pacing_max_ms: 800,
                required_share: 0.8,
                default_listing_limit: 10,
            },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

impl LogFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Compact => "compact",
            Self::Pretty => "pretty",
            Self::Json => "json",
        }
    }
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected =
                options.config_path.unwrap_or_else(|| PathBuf::from(CONFIG_FILE_CANDIDATES[0]));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(database) = patch.database {
            if let Some(url) = database.url {
                self.database.url = url;
            }
            if let Some(max_connections) = database.max_connections {
                self.database.max_connections = max_connections;
            }
            if let Some(timeout_secs) = database.timeout_secs {
                self.database.timeout_secs = timeout_secs;
            }
        }

        if let Some(server) = patch.server {
            if let Some(bind_address) = server.bind_address {
                self.server.bind_address = bind_address;
            }
            if let Some(port) = server.port {
                self.server.port = port;
            }
        }

        if let Some(upstream) = patch.upstream {
            let target = &mut self.upstream;
            set_if_some(&mut target.catalog_search_url, upstream.catalog_search_url);
            set_if_some(&mut target.catalog_product_url, upstream.catalog_product_url);
            set_if_some(&mut target.price_search_url, upstream.price_search_url);
            set_if_some(&mut target.price_graphql_url, upstream.price_graphql_url);
            set_if_some(&mut target.price_referer_base, upstream.price_referer_base);
            set_if_some(&mut target.price_city_id, upstream.price_city_id);
            set_if_some(&mut target.request_timeout_secs, upstream.request_timeout_secs);
            set_if_some(&mut target.user_agent, upstream.user_agent);
            set_if_some(&mut target.catalog_max_pages, upstream.catalog_max_pages);
        }

        if let Some(acquisition) = patch.acquisition {
            let target = &mut self.acquisition;
            set_if_some(&mut target.max_attempts, acquisition.max_attempts);
            set_if_some(&mut target.pacing_min_ms, acquisition.pacing_min_ms);
            set_if_some(&mut target.pacing_max_ms, acquisition.pacing_max_ms);
            set_if_some(&mut target.required_share, acquisition.required_share);
            set_if_some(&mut target.default_listing_limit, acquisition.default_listing_limit);
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("OFFERANK_DATABASE_URL") {
            self.database.url = value;
        }
        if let Some(value) = read_env("OFFERANK_DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections =
                parse_env("OFFERANK_DATABASE_MAX_CONNECTIONS", &value)?;
        }
        if let Some(value) = read_env("OFFERANK_DATABASE_TIMEOUT_SECS") {
            self.database.timeout_secs = parse_env("OFFERANK_DATABASE_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("OFFERANK_SERVER_BIND_ADDRESS") {
            self.server.bind_address = value;
        }
        if let Some(value) = read_env("OFFERANK_SERVER_PORT") {
            self.server.port = parse_env("OFFERANK_SERVER_PORT", &value)?;
        }

        if let Some(value) = read_env("OFFERANK_UPSTREAM_CATALOG_SEARCH_URL") {
            self.upstream.catalog_search_url = value;
        }
        if let Some(value) = read_env("OFFERANK_UPSTREAM_CATALOG_PRODUCT_URL") {
            self.upstream.catalog_product_url = value;
        }
        if let Some(value) = read_env("OFFERANK_UPSTREAM_PRICE_SEARCH_URL") {
            self.upstream.price_search_url = value;
        }
        if let Some(value) = read_env("OFFERANK_UPSTREAM_PRICE_GRAPHQL_URL") {
            self.upstream.price_graphql_url = value;
        }
        if let Some(value) = read_env("OFFERANK_UPSTREAM_PRICE_REFERER_BASE") {
            self.upstream.price_referer_base = value;
        }
        if let Some(value) = read_env("OFFERANK_UPSTREAM_PRICE_CITY_ID") {
            self.upstream.price_city_id = parse_env("OFFERANK_UPSTREAM_PRICE_CITY_ID", &value)?;
        }
        if let Some(value) = read_env("OFFERANK_UPSTREAM_REQUEST_TIMEOUT_SECS") {
            self.upstream.request_timeout_secs =
                parse_env("OFFERANK_UPSTREAM_REQUEST_TIMEOUT_SECS", &value)?;
        }
        if let Some(value) = read_env("OFFERANK_UPSTREAM_USER_AGENT") {
            self.upstream.user_agent = value;
        }
        if let Some(value) = read_env("OFFERANK_UPSTREAM_CATALOG_MAX_PAGES") {
            self.upstream.catalog_max_pages =
                parse_env("OFFERANK_UPSTREAM_CATALOG_MAX_PAGES", &value)?;
        }

        if let Some(value) = read_env("OFFERANK_ACQUISITION_MAX_ATTEMPTS") {
            self.acquisition.max_attempts =
                parse_env("OFFERANK_ACQUISITION_MAX_ATTEMPTS", &value)?;
        }
        if let Some(value) = read_env("OFFERANK_ACQUISITION_PACING_MIN_MS") {
            self.acquisition.pacing_min_ms =
                parse_env("OFFERANK_ACQUISITION_PACING_MIN_MS", &value)?;
        }
        if let Some(value) = read_env("OFFERANK_ACQUISITION_PACING_MAX_MS") {
            self.acquisition.pacing_max_ms =
                parse_env("OFFERANK_ACQUISITION_PACING_MAX_MS", &value)?;
        }
        if let Some(value) = read_env("OFFERANK_ACQUISITION_REQUIRED_SHARE") {
            self.acquisition.required_share =
                parse_env("OFFERANK_ACQUISITION_REQUIRED_SHARE", &value)?;
        }
        if let Some(value) = read_env("OFFERANK_ACQUISITION_DEFAULT_LISTING_LIMIT") {
            self.acquisition.default_listing_limit =
                parse_env("OFFERANK_ACQUISITION_DEFAULT_LISTING_LIMIT", &value)?;
        }

        let log_level =
            read_env("OFFERANK_LOGGING_LEVEL").or_else(|| read_env("OFFERANK_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("OFFERANK_LOGGING_FORMAT").or_else(|| read_env("OFFERANK_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        set_if_some(&mut self.database.url, overrides.database_url);
        set_if_some(&mut self.logging.level, overrides.log_level);
        set_if_some(&mut self.server.port, overrides.server_port);
        set_if_some(&mut self.upstream.catalog_search_url, overrides.catalog_search_url);
        set_if_some(&mut self.upstream.catalog_product_url, overrides.catalog_product_url);
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_database(&self.database)?;
        validate_server(&self.server)?;
        validate_upstream(&self.upstream)?;
        validate_acquisition(&self.acquisition)?;
        validate_logging(&self.logging)?;
        Ok(())
    }

    /// Every effective setting in display order.
    pub fn entries(&self) -> Vec<ConfigEntry> {
        let entry = |key: &'static str, env_key: &'static str, value: String| ConfigEntry {
            key,
            env_key,
            value,
        };
        vec![
            entry("database.url", "OFFERANK_DATABASE_URL", self.database.url.clone()),
            entry(
                "database.max_connections",
                "OFFERANK_DATABASE_MAX_CONNECTIONS",
                self.database.max_connections.to_string(),
            ),
            entry(
                "database.timeout_secs",
                "OFFERANK_DATABASE_TIMEOUT_SECS",
                self.database.timeout_secs.to_string(),
            ),
            entry(
                "server.bind_address",
                "OFFERANK_SERVER_BIND_ADDRESS",
                self.server.bind_address.clone(),
            ),
            entry("server.port", "OFFERANK_SERVER_PORT", self.server.port.to_string()),
            entry(
                "upstream.catalog_search_url",
                "OFFERANK_UPSTREAM_CATALOG_SEARCH_URL",
                self.upstream.catalog_search_url.clone(),
            ),
            entry(
                "upstream.catalog_product_url",
                "OFFERANK_UPSTREAM_CATALOG_PRODUCT_URL",
                self.upstream.catalog_product_url.clone(),
            ),
            entry(
                "upstream.price_search_url",
                "OFFERANK_UPSTREAM_PRICE_SEARCH_URL",
                self.upstream.price_search_url.clone(),
            ),
            entry(
                "upstream.price_graphql_url",
                "OFFERANK_UPSTREAM_PRICE_GRAPHQL_URL",
                self.upstream.price_graphql_url.clone(),
            ),
            entry(
                "upstream.price_referer_base",
                "OFFERANK_UPSTREAM_PRICE_REFERER_BASE",
                self.upstream.price_referer_base.clone(),
            ),
            entry(
                "upstream.price_city_id",
                "OFFERANK_UPSTREAM_PRICE_CITY_ID",
                self.upstream.price_city_id.to_string(),
            ),
            entry(
                "upstream.request_timeout_secs",
                "OFFERANK_UPSTREAM_REQUEST_TIMEOUT_SECS",
                self.upstream.request_timeout_secs.to_string(),
            ),
            entry(
                "upstream.user_agent",
                "OFFERANK_UPSTREAM_USER_AGENT",
                self.upstream.user_agent.clone(),
            ),
            entry(
                "upstream.catalog_max_pages",
                "OFFERANK_UPSTREAM_CATALOG_MAX_PAGES",
                self.upstream.catalog_max_pages.to_string(),
            ),
            entry(
                "acquisition.max_attempts",
                "OFFERANK_ACQUISITION_MAX_ATTEMPTS",
                self.acquisition.max_attempts.to_string(),
            ),
            entry(
                "acquisition.pacing_min_ms",
                "OFFERANK_ACQUISITION_PACING_MIN_MS",
                self.acquisition.pacing_min_ms.to_string(),
            ),
            entry(
                "acquisition.pacing_max_ms",
                "OFFERANK_ACQUISITION_PACING_MAX_MS",
                self.acquisition.pacing_max_ms.to_string(),
            ),
            entry(
                "acquisition.required_share",
                "OFFERANK_ACQUISITION_REQUIRED_SHARE",
                self.acquisition.required_share.to_string(),
            ),
            entry(
                "acquisition.default_listing_limit",
                "OFFERANK_ACQUISITION_DEFAULT_LISTING_LIMIT",
                self.acquisition.default_listing_limit.to_string(),
            ),
            entry("logging.level", "OFFERANK_LOGGING_LEVEL", self.logging.level.clone()),
            entry(
                "logging.format",
                "OFFERANK_LOGGING_FORMAT",
                self.logging.format.as_str().to_string(),
            ),
        ]
    }
}

pub fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    CONFIG_FILE_CANDIDATES.into_iter().map(PathBuf::from).find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn validate_database(database: &DatabaseConfig) -> Result<(), ConfigError> {
    let url = database.url.trim();
    let sqlite_url =
        url.starts_with("sqlite://") || url.starts_with("sqlite::") || url == ":memory:";
    if !sqlite_url {
        return Err(ConfigError::Validation(
            "database.url must be a sqlite URL (`sqlite://...`, `sqlite::...`, or `:memory:`)"
                .to_string(),
        ));
    }

    if database.max_connections == 0 {
        return Err(ConfigError::Validation(
            "database.max_connections must be greater than zero".to_string(),
        ));
    }

    if database.timeout_secs == 0 || database.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "database.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    Ok(())
}

fn validate_server(server: &ServerConfig) -> Result<(), ConfigError> {
    if server.bind_address.trim().is_empty() {
        return Err(ConfigError::Validation("server.bind_address must not be empty".to_string()));
    }

    if server.port == 0 {
        return Err(ConfigError::Validation("server.port must be greater than zero".to_string()));
    }

    Ok(())
}

fn validate_upstream(upstream: &UpstreamConfig) -> Result<(), ConfigError> {
    let urls = [
        ("upstream.catalog_search_url", &upstream.catalog_search_url),
        ("upstream.catalog_product_url", &upstream.catalog_product_url),
        ("upstream.price_search_url", &upstream.price_search_url),
        ("upstream.price_graphql_url", &upstream.price_graphql_url),
        ("upstream.price_referer_base", &upstream.price_referer_base),
    ];
    for (key, url) in urls {
        if !url.starts_with("http://") && !url.starts_with("https://") {
            return Err(ConfigError::Validation(format!(
                "{key} must start with http:// or https://"
            )));
        }
    }

    if upstream.request_timeout_secs == 0 || upstream.request_timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "upstream.request_timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    if upstream.catalog_max_pages == 0 {
        return Err(ConfigError::Validation(
            "upstream.catalog_max_pages must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

fn validate_acquisition(acquisition: &AcquisitionConfig) -> Result<(), ConfigError> {
    if acquisition.max_attempts == 0 {
        return Err(ConfigError::Validation(
            "acquisition.max_attempts must be greater than zero".to_string(),
        ));
    }

    if acquisition.pacing_max_ms < acquisition.pacing_min_ms {
        return Err(ConfigError::Validation(
            "acquisition.pacing_max_ms must not be below acquisition.pacing_min_ms".to_string(),
        ));
    }

    let share = acquisition.required_share;
    if !(share > 0.0 && share <= 1.0) {
        return Err(ConfigError::Validation(
            "acquisition.required_share must be in range (0, 1]".to_string(),
        ));
    }

    if acquisition.default_listing_limit == 0 {
        return Err(ConfigError::Validation(
            "acquisition.default_listing_limit must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn set_if_some<T>(target: &mut T, value: Option<T>) {
    if let Some(value) = value {
        *target = value;
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_env<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse::<T>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    database: Option<DatabasePatch>,
    server: Option<ServerPatch>,
    upstream: Option<UpstreamPatch>,
    acquisition: Option<AcquisitionPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct DatabasePatch {
    url: Option<String>,
    max_connections: Option<u32>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerPatch {
    bind_address: Option<String>,
    port: Option<u16>,
}

#[derive(Debug, Default, Deserialize)]
struct UpstreamPatch {
    catalog_search_url: Option<String>,
    catalog_product_url: Option<String>,
    price_search_url: Option<String>,
    price_graphql_url: Option<String>,
    price_referer_base: Option<String>,
    price_city_id: Option<u32>,
    request_timeout_secs: Option<u64>,
    user_agent: Option<String>,
    catalog_max_pages: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
struct AcquisitionPatch {
    max_attempts: Option<u32>,
    pacing_min_ms: Option<u64>,
    pacing_max_ms: Option<u64>,
    required_share: Option<f64>,
    default_listing_limit: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}
