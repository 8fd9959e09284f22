use chrono::NaiveDate;
use serde::Deserialize;
use std::env;
use std::error::Error;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;
use tracing_appender::non_blocking::WorkerGuard;

const DEFAULT_TMDB_BASE_URL: &str = "https://api.themoviedb.org/3";
const DEFAULT_EXPORT_BASE_URL: &str = "http://files.tmdb.org/p/exports";
const DEFAULT_CONCURRENCY: u32 = 20;
const DEFAULT_RATE_LIMIT_PER_SECOND: u32 = 40;
const DEFAULT_DB_MAX_CONNECTIONS: u32 = 20;
const DEFAULT_LANGUAGE: &str = "en-US";

#[derive(Debug)]
pub enum ConfigError {
    Io(io::Error),
    Toml(toml::de::Error),
    InvalidValue(String),
    MissingValue(&'static str),
    MissingConfigFile(PathBuf),
    Logger(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io(err) => write!(f, "config io error: {}", err),
            ConfigError::Toml(err) => write!(f, "config parse error: {}", err),
            ConfigError::InvalidValue(message) => write!(f, "config invalid value: {}", message),
            ConfigError::MissingValue(field) => write!(f, "config missing value: {}", field),
            ConfigError::MissingConfigFile(path) => {
                write!(f, "config file not found: {}", path.display())
            }
            ConfigError::Logger(message) => write!(f, "logging init error: {}", message),
        }
    }
}

impl Error for ConfigError {}

impl From<io::Error> for ConfigError {
    fn from(err: io::Error) -> Self {
        ConfigError::Io(err)
    }
}

impl From<toml::de::Error> for ConfigError {
    fn from(err: toml::de::Error) -> Self {
        ConfigError::Toml(err)
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub tmdb: TmdbConfig,
    pub search: SearchConfig,
    pub run: RunConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: Option<String>,
    pub max_connections: u32,
}

#[derive(Debug, Clone)]
pub struct TmdbConfig {
    pub api_keys: Vec<String>,
    pub base_url: String,
    pub export_base_url: String,
    pub concurrency: u32,
    pub rate_limit_per_second: u32,
    pub default_language: String,
}

#[derive(Debug, Clone)]
pub struct SearchConfig {
    pub base_url: Option<String>,
    pub api_key: Option<String>,
}

#[derive(Debug, Clone)]
pub struct RunConfig {
    pub current_date: Option<NaiveDate>,
    pub update_popularity: bool,
    pub extra_languages: Vec<String>,
    pub enable_language: bool,
    pub enable_country: bool,
    pub enable_genre: bool,
    pub enable_keyword: bool,
    pub enable_collection: bool,
    pub enable_company: bool,
    pub enable_network: bool,
    pub enable_person: bool,
    pub enable_movie: bool,
    pub enable_serie: bool,
    pub enable_search: bool,
    pub isolate_kinds: bool,
    pub staging_dir: PathBuf,
}

#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub enabled: bool,
    pub path: PathBuf,
    pub level: String,
    pub max_total_mb: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                url: None,
                max_connections: DEFAULT_DB_MAX_CONNECTIONS,
            },
            tmdb: TmdbConfig {
                api_keys: Vec::new(),
                base_url: DEFAULT_TMDB_BASE_URL.to_string(),
                export_base_url: DEFAULT_EXPORT_BASE_URL.to_string(),
                concurrency: DEFAULT_CONCURRENCY,
                rate_limit_per_second: DEFAULT_RATE_LIMIT_PER_SECOND,
                default_language: DEFAULT_LANGUAGE.to_string(),
            },
            search: SearchConfig {
                base_url: None,
                api_key: None,
            },
            run: RunConfig {
                current_date: None,
                update_popularity: false,
                extra_languages: Vec::new(),
                enable_language: true,
                enable_country: true,
                enable_genre: true,
                enable_keyword: true,
                enable_collection: true,
                enable_company: true,
                enable_network: true,
                enable_person: true,
                enable_movie: true,
                enable_serie: true,
                enable_search: true,
                isolate_kinds: false,
                staging_dir: default_staging_dir(),
            },
            logging: LoggingConfig {
                enabled: false,
                path: default_log_path(),
                level: "info".to_string(),
                max_total_mb: 200,
            },
        }
    }
}

impl DatabaseConfig {
    pub fn require_url(&self) -> Result<String, ConfigError> {
        self.url
            .clone()
            .ok_or(ConfigError::MissingValue("database.url"))
    }
}

impl TmdbConfig {
    pub fn require_api_keys(&self) -> Result<&[String], ConfigError> {
        if self.api_keys.is_empty() {
            return Err(ConfigError::MissingValue("tmdb.api_keys"));
        }
        Ok(&self.api_keys)
    }
}

impl AppConfig {
    pub fn load(config_override: Option<PathBuf>) -> Result<Self, ConfigError> {
        let config_from_env = env::var("TMDB_SYNC_CONFIG").ok().map(PathBuf::from);
        let explicit_config = config_override.or(config_from_env);
        if let Some(path) = &explicit_config {
            if path.to_string_lossy().trim().is_empty() {
                return Err(ConfigError::InvalidValue("empty config path".to_string()));
            }
        }
        let explicit_requested = explicit_config.is_some();

        let config_path = if let Some(path) = explicit_config {
            Some(expand_tilde(&path))
        } else {
            let local = PathBuf::from("config.toml");
            if local.exists() {
                Some(local)
            } else if let Some(home) = home_dir() {
                let fallback = home.join(".config").join("tmdb-sync").join("config.toml");
                if fallback.exists() {
                    Some(fallback)
                } else {
                    None
                }
            } else {
                None
            }
        };

        if explicit_requested {
            let path = config_path
                .as_ref()
                .ok_or(ConfigError::MissingValue("TMDB_SYNC_CONFIG or --config"))?;
            if !path.exists() {
                return Err(ConfigError::MissingConfigFile(path.clone()));
            }
        }

        let mut config = AppConfig::default();
        if let Some(path) = &config_path {
            let raw = fs::read_to_string(path)?;
            let file_config: FileConfig = toml::from_str(&raw)?;
            config.apply_file(file_config);
        }

        config.apply_env()?;
        config.validate()?;

        Ok(config)
    }

    fn apply_file(&mut self, file: FileConfig) {
        if let Some(database) = file.database {
            if let Some(url) = database.url {
                self.database.url = Some(url);
            }
            if let Some(max_connections) = database.max_connections {
                self.database.max_connections = max_connections;
            }
        }

        if let Some(tmdb) = file.tmdb {
            if let Some(api_keys) = tmdb.api_keys {
                self.tmdb.api_keys = api_keys;
            }
            if let Some(base_url) = tmdb.base_url {
                self.tmdb.base_url = base_url;
            }
            if let Some(export_base_url) = tmdb.export_base_url {
                self.tmdb.export_base_url = export_base_url;
            }
            if let Some(concurrency) = tmdb.concurrency {
                self.tmdb.concurrency = concurrency;
            }
            if let Some(rate_limit_per_second) = tmdb.rate_limit_per_second {
                self.tmdb.rate_limit_per_second = rate_limit_per_second;
            }
            if let Some(default_language) = tmdb.default_language {
                self.tmdb.default_language = default_language;
            }
        }

        if let Some(search) = file.search {
            if let Some(base_url) = search.base_url {
                self.search.base_url = Some(base_url);
            }
            if let Some(api_key) = search.api_key {
                self.search.api_key = Some(api_key);
            }
        }

        if let Some(run) = file.run {
            if let Some(current_date) = run.current_date {
                self.run.current_date = NaiveDate::parse_from_str(&current_date, "%Y-%m-%d").ok();
            }
            if let Some(update_popularity) = run.update_popularity {
                self.run.update_popularity = update_popularity;
            }
            if let Some(extra_languages) = run.extra_languages {
                self.run.extra_languages = extra_languages;
            }
            macro_rules! apply_enable {
                ($field:ident) => {
                    if let Some(value) = run.$field {
                        self.run.$field = value;
                    }
                };
            }
            apply_enable!(enable_language);
            apply_enable!(enable_country);
            apply_enable!(enable_genre);
            apply_enable!(enable_keyword);
            apply_enable!(enable_collection);
            apply_enable!(enable_company);
            apply_enable!(enable_network);
            apply_enable!(enable_person);
            apply_enable!(enable_movie);
            apply_enable!(enable_serie);
            apply_enable!(enable_search);
            apply_enable!(isolate_kinds);
            if let Some(staging_dir) = run.staging_dir {
                self.run.staging_dir = staging_dir;
            }
        }

        if let Some(logging) = file.logging {
            if let Some(enabled) = logging.enabled {
                self.logging.enabled = enabled;
            }
            if let Some(path) = logging.path {
                self.logging.path = path;
            }
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(max_total_mb) = logging.max_total_mb {
                self.logging.max_total_mb = max_total_mb;
            }
        }
    }

    fn apply_env(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = env_first(&["TMDB_SYNC_DATABASE_URL", "DATABASE_URL"]) {
            self.database.url = Some(value);
        }
        if let Some(value) = env_first(&["TMDB_SYNC_DB_MAX_CONNECTIONS"]) {
            self.database.max_connections = parse_u32("TMDB_SYNC_DB_MAX_CONNECTIONS", &value)?;
        }
        if let Some(value) = env_first(&["TMDB_SYNC_API_KEYS", "TMDB_API_KEYS"]) {
            self.tmdb.api_keys = split_csv(&value);
        }
        if let Some(value) = env_first(&["TMDB_SYNC_BASE_URL"]) {
            self.tmdb.base_url = value;
        }
        if let Some(value) = env_first(&["TMDB_SYNC_EXPORT_BASE_URL"]) {
            self.tmdb.export_base_url = value;
        }
        if let Some(value) = env_first(&["TMDB_SYNC_CONCURRENCY"]) {
            self.tmdb.concurrency = parse_u32("TMDB_SYNC_CONCURRENCY", &value)?;
        }
        if let Some(value) = env_first(&["TMDB_SYNC_RATE_LIMIT_PER_SECOND"]) {
            self.tmdb.rate_limit_per_second =
                parse_u32("TMDB_SYNC_RATE_LIMIT_PER_SECOND", &value)?;
        }
        if let Some(value) = env_first(&["TMDB_SYNC_DEFAULT_LANGUAGE"]) {
            self.tmdb.default_language = value;
        }
        if let Some(value) = env_first(&["TMDB_SYNC_SEARCH_BASE_URL"]) {
            self.search.base_url = Some(value);
        }
        if let Some(value) = env_first(&["TMDB_SYNC_SEARCH_API_KEY"]) {
            self.search.api_key = Some(value);
        }
        if let Some(value) = env_first(&["TMDB_SYNC_CURRENT_DATE"]) {
            self.run.current_date = Some(
                NaiveDate::parse_from_str(&value, "%Y-%m-%d").map_err(|_| {
                    ConfigError::InvalidValue(format!("invalid TMDB_SYNC_CURRENT_DATE: {}", value))
                })?,
            );
        }
        if let Some(value) = env_first(&["TMDB_SYNC_UPDATE_POPULARITY"]) {
            self.run.update_popularity = parse_bool("TMDB_SYNC_UPDATE_POPULARITY", &value)?;
        }
        if let Some(value) = env_first(&["TMDB_SYNC_EXTRA_LANGUAGES"]) {
            self.run.extra_languages = split_csv(&value);
        }
        if let Some(value) = env_first(&["TMDB_SYNC_ENABLE_SEARCH"]) {
            self.run.enable_search = parse_bool("TMDB_SYNC_ENABLE_SEARCH", &value)?;
        }
        if let Some(value) = env_first(&["TMDB_SYNC_ISOLATE_KINDS"]) {
            self.run.isolate_kinds = parse_bool("TMDB_SYNC_ISOLATE_KINDS", &value)?;
        }
        if let Some(value) = env_first(&["TMDB_SYNC_STAGING_DIR"]) {
            self.run.staging_dir = PathBuf::from(value);
        }
        if let Some(value) = env_first(&["TMDB_SYNC_LOG_ENABLED"]) {
            self.logging.enabled = parse_bool("TMDB_SYNC_LOG_ENABLED", &value)?;
        }
        if let Some(value) = env_first(&["TMDB_SYNC_LOG_PATH"]) {
            self.logging.path = PathBuf::from(value);
        }
        if let Some(value) = env_first(&["TMDB_SYNC_LOG_LEVEL"]) {
            self.logging.level = value;
        }
        if let Some(value) = env_first(&["TMDB_SYNC_LOG_MAX_MB"]) {
            self.logging.max_total_mb = parse_u64("TMDB_SYNC_LOG_MAX_MB", &value)?;
        }
        Ok(())
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.database.max_connections == 0 {
            return Err(ConfigError::InvalidValue(
                "database.max_connections must be > 0".to_string(),
            ));
        }
        if self.tmdb.concurrency == 0 {
            return Err(ConfigError::InvalidValue(
                "tmdb.concurrency must be > 0".to_string(),
            ));
        }
        if self.tmdb.rate_limit_per_second == 0 {
            return Err(ConfigError::InvalidValue(
                "tmdb.rate_limit_per_second must be > 0".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize, Default)]
struct FileConfig {
    database: Option<DatabaseConfigFile>,
    tmdb: Option<TmdbConfigFile>,
    search: Option<SearchConfigFile>,
    run: Option<RunConfigFile>,
    logging: Option<LoggingConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
struct DatabaseConfigFile {
    url: Option<String>,
    max_connections: Option<u32>,
}

#[derive(Debug, Deserialize, Default)]
struct TmdbConfigFile {
    api_keys: Option<Vec<String>>,
    base_url: Option<String>,
    export_base_url: Option<String>,
    concurrency: Option<u32>,
    rate_limit_per_second: Option<u32>,
    default_language: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct SearchConfigFile {
    base_url: Option<String>,
    api_key: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct RunConfigFile {
    current_date: Option<String>,
    update_popularity: Option<bool>,
    extra_languages: Option<Vec<String>>,
    enable_language: Option<bool>,
    enable_country: Option<bool>,
    enable_genre: Option<bool>,
    enable_keyword: Option<bool>,
    enable_collection: Option<bool>,
    enable_company: Option<bool>,
    enable_network: Option<bool>,
    enable_person: Option<bool>,
    enable_movie: Option<bool>,
    enable_serie: Option<bool>,
    enable_search: Option<bool>,
    isolate_kinds: Option<bool>,
    staging_dir: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Default)]
struct LoggingConfigFile {
    enabled: Option<bool>,
    path: Option<PathBuf>,
    level: Option<String>,
    max_total_mb: Option<u64>,
}

pub fn split_config_args<I>(args: I) -> Result<(Option<PathBuf>, Vec<String>), ConfigError>
where
    I: IntoIterator<Item = String>,
{
    let mut config_path = None;
    let mut rest = Vec::new();
    let mut iter = args.into_iter();

    while let Some(arg) = iter.next() {
        if arg == "--config" {
            let value = iter
                .next()
                .ok_or_else(|| ConfigError::InvalidValue("missing value for --config".to_string()))?;
            if value.is_empty() {
                return Err(ConfigError::InvalidValue(
                    "missing value for --config".to_string(),
                ));
            }
            config_path = Some(PathBuf::from(value));
        } else if let Some(value) = arg.strip_prefix("--config=") {
            if value.is_empty() {
                return Err(ConfigError::InvalidValue(
                    "missing value for --config".to_string(),
                ));
            }
            config_path = Some(PathBuf::from(value));
        } else {
            rest.push(arg);
        }
    }

    Ok((config_path, rest))
}

pub fn init_logging(config: &LoggingConfig) -> Result<Option<WorkerGuard>, ConfigError> {
    if !config.enabled {
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(parse_level(&config.level)?)
            .finish();
        let _ = tracing::subscriber::set_global_default(subscriber);
        return Ok(None);
    }

    fs::create_dir_all(&config.path)?;

    let level = parse_level(&config.level)?;
    let file_appender = tracing_appender::rolling::daily(&config.path, "tmdb-sync.log");
    let (writer, guard) = tracing_appender::non_blocking(file_appender);

    let subscriber = tracing_subscriber::fmt()
        .with_writer(writer)
        .with_ansi(false)
        .with_max_level(level)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|err| ConfigError::Logger(err.to_string()))?;

    let max_bytes = config.max_total_mb.saturating_mul(1024 * 1024);
    cleanup_log_dir(&config.path, max_bytes)?;

    Ok(Some(guard))
}

fn cleanup_log_dir(dir: &Path, max_total_bytes: u64) -> Result<(), ConfigError> {
    if max_total_bytes == 0 {
        return Ok(());
    }

    let mut entries = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let metadata = entry.metadata()?;
        if !metadata.is_file() {
            continue;
        }
        let modified = metadata.modified().unwrap_or(UNIX_EPOCH);
        entries.push((entry.path(), modified, metadata.len()));
    }

    if entries.len() <= 1 {
        return Ok(());
    }

    entries.sort_by_key(|entry| entry.1);
    let mut total: u64 = entries.iter().map(|entry| entry.2).sum();

    let mut index = 0;
    while total > max_total_bytes && entries.len().saturating_sub(index) > 1 {
        let (path, _modified, size) = &entries[index];
        let _ = fs::remove_file(path);
        total = total.saturating_sub(*size);
        index += 1;
    }

    Ok(())
}

fn parse_level(value: &str) -> Result<tracing::Level, ConfigError> {
    match value.to_lowercase().as_str() {
        "trace" => Ok(tracing::Level::TRACE),
        "debug" => Ok(tracing::Level::DEBUG),
        "info" => Ok(tracing::Level::INFO),
        "warn" | "warning" => Ok(tracing::Level::WARN),
        "error" => Ok(tracing::Level::ERROR),
        _ => Err(ConfigError::InvalidValue(format!(
            "invalid log level: {}",
            value
        ))),
    }
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    let normalized = value.trim().to_lowercase();
    match normalized.as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue(format!("invalid {}: {}", key, value))),
    }
}

fn parse_u32(key: &str, value: &str) -> Result<u32, ConfigError> {
    value
        .trim()
        .parse::<u32>()
        .map_err(|_| ConfigError::InvalidValue(format!("invalid {}: {}", key, value)))
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value
        .trim()
        .parse::<u64>()
        .map_err(|_| ConfigError::InvalidValue(format!("invalid {}: {}", key, value)))
}

fn env_first(keys: &[&str]) -> Option<String> {
    for key in keys {
        if let Ok(value) = env::var(key) {
            return Some(value);
        }
    }
    None
}

fn expand_tilde(path: &Path) -> PathBuf {
    let raw = path.to_string_lossy();
    if raw == "~" {
        return home_dir().unwrap_or_else(|| path.to_path_buf());
    }
    if let Some(rest) = raw.strip_prefix("~/") {
        if let Some(home) = home_dir() {
            return home.join(rest);
        }
    }
    path.to_path_buf()
}

fn home_dir() -> Option<PathBuf> {
    env::var_os("HOME").map(PathBuf::from)
}

fn default_log_path() -> PathBuf {
    if let Some(home) = home_dir() {
        home.join(".cache").join("tmdb-sync").join("logs")
    } else {
        PathBuf::from(".cache/tmdb-sync/logs")
    }
}

fn default_staging_dir() -> PathBuf {
    if let Some(home) = home_dir() {
        home.join(".cache").join("tmdb-sync").join("staging")
    } else {
        PathBuf::from(".cache/tmdb-sync/staging")
    }
}

fn split_csv(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|item| item.trim())
        .filter(|item| !item.is_empty())
        .map(|item| item.to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_bool_accepts_common_values() {
        assert!(parse_bool("key", "true").unwrap());
        assert!(parse_bool("key", "YES").unwrap());
        assert!(!parse_bool("key", "off").unwrap());
    }

    #[test]
    fn parse_bool_rejects_invalid_values() {
        assert!(parse_bool("key", "maybe").is_err());
    }

    #[test]
    fn split_config_args_extracts_path() {
        let args = vec![
            "tmdb-sync".to_string(),
            "--config".to_string(),
            "cfg.toml".to_string(),
            "run".to_string(),
        ];
        let (config, rest) = split_config_args(args.into_iter().skip(1)).unwrap();
        assert_eq!(config, Some(PathBuf::from("cfg.toml")));
        assert_eq!(rest, vec!["run".to_string()]);
    }

    #[test]
    fn split_csv_trims_and_filters_empty() {
        assert_eq!(split_csv("fr, de,, en "), vec!["fr", "de", "en"]);
    }
}
