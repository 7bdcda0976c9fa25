// Configuration loading and parsing (league.toml, mock_draft.toml, credentials.toml).

use std::path::{Path, PathBuf};
use std::time::Duration;

use rookie_core::db::MIN_LEASE;
use rookie_core::draft::order::{MAX_ROUNDS, MAX_TOTAL_PICKS, MIN_TOTAL_PICKS};
use rookie_core::mock::generator::MIN_PER_PICK_TIMEOUT;
use rookie_llm::client::LlmSettings;
use serde::Deserialize;
use thiserror::Error;

/// Environment variable consulted when credentials.toml has no key.
pub const API_KEY_ENV: &str = "OPENAI_API_KEY";

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("failed to parse config file {path}: {source}")]
    ParseError {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("validation error for field `{field}`: {message}")]
    ValidationError { field: String, message: String },

    #[error("failed to initialize config from defaults: {message}")]
    DefaultsCopyError { message: String },

    #[error("OpenAI API key not configured: set openai_api_key in config/credentials.toml or {API_KEY_ENV}")]
    MissingApiKey,
}

// ---------------------------------------------------------------------------
// Top-level assembled Config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct Config {
    pub league: LeagueConfig,
    pub generator: GeneratorConfig,
    pub llm: LlmSettings,
    pub article: ArticleConfig,
    pub credentials: CredentialsConfig,
    pub db_path: String,
    pub data_paths: DataPaths,
    pub jobs: JobsConfig,
    pub output: OutputConfig,
}

impl Config {
    /// The OpenAI key from credentials.toml, else from the environment.
    pub fn api_key(&self) -> Option<String> {
        self.credentials
            .openai_api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .or_else(|| {
                std::env::var(API_KEY_ENV)
                    .ok()
                    .filter(|k| !k.trim().is_empty())
            })
    }

    /// Like [`Config::api_key`], but a missing key is an error.
    pub fn require_api_key(&self) -> Result<String, ConfigError> {
        self.api_key().ok_or(ConfigError::MissingApiKey)
    }
}

// ---------------------------------------------------------------------------
// league.toml structs
// ---------------------------------------------------------------------------

/// Wrapper for the top-level `[league]` table in league.toml.
#[derive(Debug, Clone, Deserialize)]
struct LeagueFile {
    league: LeagueConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LeagueConfig {
    pub name: String,
    /// Fixed Sleeper league id. When omitted the league is found by name
    /// among the commissioner's leagues.
    #[serde(default)]
    pub league_id: Option<String>,
    #[serde(default)]
    pub commissioner_user_id: Option<String>,
    /// Lowercase name fragments; `a+b` requires both terms.
    #[serde(default)]
    pub name_patterns: Vec<String>,
    /// Replaces the default league-format hints in every pick prompt.
    #[serde(default)]
    pub hints: Option<String>,
}

// ---------------------------------------------------------------------------
// mock_draft.toml structs
// ---------------------------------------------------------------------------

/// Raw deserialization target for the entire mock_draft.toml file.
#[derive(Debug, Clone, Deserialize)]
struct MockDraftFile {
    generator: GeneratorConfig,
    #[serde(default)]
    llm: LlmSettings,
    article: ArticleConfig,
    database: DatabaseSection,
    #[serde(default)]
    data_paths: DataPaths,
    #[serde(default)]
    jobs: JobsConfig,
    #[serde(default)]
    output: OutputConfig,
}

#[derive(Debug, Clone, Deserialize)]
struct DatabaseSection {
    path: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GeneratorConfig {
    pub rounds: u32,
    pub max_picks: usize,
    /// Wall-clock budget for each batch.
    pub max_seconds: u64,
    pub per_pick_timeout_secs: u64,
    pub per_pick_max_retries: u32,
    pub retry_backoff_ms: u64,
    pub batch_picks: usize,
    #[serde(default = "default_true")]
    pub trace: bool,
    #[serde(default)]
    pub seed: Option<u64>,
}

fn default_true() -> bool {
    true
}

impl GeneratorConfig {
    pub fn batch_time_budget(&self) -> Duration {
        Duration::from_secs(self.max_seconds)
    }

    pub fn per_pick_timeout(&self) -> Duration {
        Duration::from_secs(self.per_pick_timeout_secs)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ArticleConfig {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub author: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DataPaths {
    /// JSON file of ranked prospects. When unset, the pool is read from the
    /// database document store.
    #[serde(default)]
    pub player_pool: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct JobsConfig {
    #[serde(default = "default_lease_secs")]
    pub lease_secs: u64,
    #[serde(default = "default_log_ttl_secs")]
    pub log_ttl_secs: u64,
    #[serde(default = "default_max_log_entries")]
    pub max_log_entries: usize,
}

fn default_lease_secs() -> u64 {
    rookie_core::jobs::DEFAULT_LEASE.as_secs()
}

fn default_log_ttl_secs() -> u64 {
    rookie_core::jobs::DEFAULT_LOG_TTL.as_secs()
}

fn default_max_log_entries() -> usize {
    rookie_core::jobs::DEFAULT_MAX_LOG_ENTRIES
}

impl Default for JobsConfig {
    fn default() -> Self {
        Self {
            lease_secs: default_lease_secs(),
            log_ttl_secs: default_log_ttl_secs(),
            max_log_entries: default_max_log_entries(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct OutputConfig {
    /// Where the binary writes the finished article, if anywhere.
    #[serde(default)]
    pub article_path: Option<String>,
}

// ---------------------------------------------------------------------------
// credentials.toml structs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize, Default)]
pub struct CredentialsConfig {
    pub openai_api_key: Option<String>,
}

// ---------------------------------------------------------------------------
// Loading logic
// ---------------------------------------------------------------------------

/// Load and validate configuration from `config/league.toml`,
/// `config/mock_draft.toml`, and (optionally) `config/credentials.toml`,
/// all relative to the given `base_dir`.
///
/// Does not copy defaults; `load_config()` does.
pub(crate) fn load_config_from(base_dir: &Path) -> Result<Config, ConfigError> {
    let config_dir = base_dir.join("config");

    // --- league.toml (required) ---
    let league_path = config_dir.join("league.toml");
    let league_file: LeagueFile = parse_file(&league_path)?;

    // --- mock_draft.toml (required) ---
    let mock_path = config_dir.join("mock_draft.toml");
    let mock_file: MockDraftFile = parse_file(&mock_path)?;

    // --- credentials.toml (optional) ---
    let credentials_path = config_dir.join("credentials.toml");
    let credentials = if credentials_path.exists() {
        parse_file(&credentials_path)?
    } else {
        CredentialsConfig::default()
    };

    let config = Config {
        league: league_file.league,
        generator: mock_file.generator,
        llm: mock_file.llm,
        article: mock_file.article,
        credentials,
        db_path: mock_file.database.path,
        data_paths: mock_file.data_paths,
        jobs: mock_file.jobs,
        output: mock_file.output,
    };

    validate(&config)?;

    Ok(config)
}

/// Ensure all config files exist by copying missing ones from `defaults/`.
/// Returns the list of files that were copied. Skips `.example` files.
pub fn ensure_config_files(base_dir: &Path) -> Result<Vec<PathBuf>, ConfigError> {
    let defaults_dir = base_dir.join("defaults");
    let config_dir = base_dir.join("config");

    if !defaults_dir.exists() {
        if !config_dir.exists() {
            return Err(ConfigError::DefaultsCopyError {
                message: format!(
                    "neither defaults/ nor config/ directory found in {}; \
                     run from the project root or ensure defaults/ is present",
                    base_dir.display()
                ),
            });
        }
        return Ok(vec![]);
    }

    std::fs::create_dir_all(&config_dir).map_err(|e| ConfigError::DefaultsCopyError {
        message: format!("failed to create config directory: {e}"),
    })?;

    let entries = std::fs::read_dir(&defaults_dir).map_err(|e| ConfigError::DefaultsCopyError {
        message: format!("failed to read defaults directory: {e}"),
    })?;

    let mut copied = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| ConfigError::DefaultsCopyError {
            message: format!("failed to read defaults entry: {e}"),
        })?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let Some(file_name) = path.file_name() else {
            continue;
        };
        if file_name.to_str().is_some_and(|n| n.ends_with(".example")) {
            continue;
        }

        let target = config_dir.join(file_name);
        match std::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&target)
        {
            Ok(mut dest) => {
                let content = std::fs::read(&path).map_err(|e| ConfigError::DefaultsCopyError {
                    message: format!("failed to read {}: {e}", path.display()),
                })?;
                std::io::Write::write_all(&mut dest, &content).map_err(|e| {
                    ConfigError::DefaultsCopyError {
                        message: format!("failed to write {}: {e}", target.display()),
                    }
                })?;
                copied.push(target);
            }
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {}
            Err(e) => {
                return Err(ConfigError::DefaultsCopyError {
                    message: format!("failed to create {}: {e}", target.display()),
                });
            }
        }
    }

    Ok(copied)
}

/// Loads config relative to the current working directory, copying
/// defaults first.
pub fn load_config() -> Result<Config, ConfigError> {
    let cwd = std::env::current_dir().map_err(|_| ConfigError::FileNotFound {
        path: PathBuf::from("."),
    })?;
    ensure_config_files(&cwd)?;
    load_config_from(&cwd)
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn parse_file<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, ConfigError> {
    let text = std::fs::read_to_string(path).map_err(|_| ConfigError::FileNotFound {
        path: path.to_path_buf(),
    })?;
    toml::from_str(&text).map_err(|source| ConfigError::ParseError {
        path: path.to_path_buf(),
        source,
    })
}

fn invalid(field: &str, message: impl Into<String>) -> ConfigError {
    ConfigError::ValidationError {
        field: field.into(),
        message: message.into(),
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

fn validate(config: &Config) -> Result<(), ConfigError> {
    // League: either a fixed id or enough to search for one.
    let league = &config.league;
    let has_id = league.league_id.as_deref().is_some_and(|id| !id.trim().is_empty());
    if !has_id {
        if league
            .commissioner_user_id
            .as_deref()
            .map_or(true, |u| u.trim().is_empty())
        {
            return Err(invalid(
                "league.commissioner_user_id",
                "required when league.league_id is not set",
            ));
        }
        if league.name_patterns.iter().all(|p| p.trim().is_empty()) {
            return Err(invalid(
                "league.name_patterns",
                "at least one pattern is required when league.league_id is not set",
            ));
        }
    }

    let generator = &config.generator;
    if !(1..=MAX_ROUNDS).contains(&generator.rounds) {
        return Err(invalid(
            "generator.rounds",
            format!("must be between 1 and {MAX_ROUNDS}, got {}", generator.rounds),
        ));
    }
    if !(MIN_TOTAL_PICKS..=MAX_TOTAL_PICKS).contains(&generator.max_picks) {
        return Err(invalid(
            "generator.max_picks",
            format!(
                "must be between {MIN_TOTAL_PICKS} and {MAX_TOTAL_PICKS}, got {}",
                generator.max_picks
            ),
        ));
    }
    if generator.per_pick_timeout() < MIN_PER_PICK_TIMEOUT {
        return Err(invalid(
            "generator.per_pick_timeout_secs",
            format!(
                "must be at least {}, got {}",
                MIN_PER_PICK_TIMEOUT.as_secs(),
                generator.per_pick_timeout_secs
            ),
        ));
    }
    let positive: &[(&str, u64)] = &[
        ("generator.max_seconds", generator.max_seconds),
        ("generator.batch_picks", generator.batch_picks as u64),
        ("llm.max_tokens", u64::from(config.llm.max_tokens)),
        ("jobs.log_ttl_secs", config.jobs.log_ttl_secs),
        ("jobs.max_log_entries", config.jobs.max_log_entries as u64),
    ];
    for (name, val) in positive {
        if *val == 0 {
            return Err(invalid(name, "must be > 0"));
        }
    }

    let temperature = config.llm.temperature;
    if !(0.0..=2.0).contains(&temperature) {
        return Err(invalid(
            "llm.temperature",
            format!("must be between 0.0 and 2.0 inclusive, got {temperature}"),
        ));
    }

    if Duration::from_secs(config.jobs.lease_secs) < MIN_LEASE {
        return Err(invalid(
            "jobs.lease_secs",
            format!(
                "must be at least {}, got {}",
                MIN_LEASE.as_secs(),
                config.jobs.lease_secs
            ),
        ));
    }

    if config.article.title.trim().is_empty() {
        return Err(invalid("article.title", "must not be empty"));
    }
    if config.db_path.trim().is_empty() {
        return Err(invalid("database.path", "must not be empty"));
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    /// The rookie-app crate root, whether tests run from the crate or the
    /// workspace root.
    fn project_root() -> PathBuf {
        let cwd = std::env::current_dir().unwrap();
        if cwd.join("defaults").exists() {
            cwd
        } else if cwd.join("crates/rookie-app/defaults").exists() {
            cwd.join("crates/rookie-app")
        } else {
            panic!("Cannot locate defaults/ directory from CWD {:?}", cwd);
        }
    }

    /// Fresh temp dir with both default files copied into `config/`.
    fn scratch(name: &str) -> PathBuf {
        let tmp = std::env::temp_dir().join(name);
        let config_dir = tmp.join("config");
        let _ = fs::remove_dir_all(&tmp);
        fs::create_dir_all(&config_dir).unwrap();
        let root = project_root();
        fs::copy(root.join("defaults/league.toml"), config_dir.join("league.toml")).unwrap();
        fs::copy(
            root.join("defaults/mock_draft.toml"),
            config_dir.join("mock_draft.toml"),
        )
        .unwrap();
        tmp
    }

    fn rewrite(tmp: &Path, file: &str, from: &str, to: &str) {
        let path = tmp.join("config").join(file);
        let text = fs::read_to_string(&path).unwrap();
        assert!(text.contains(from), "{file} should contain `{from}`");
        fs::write(&path, text.replace(from, to)).unwrap();
    }

    fn expect_field(tmp: &Path, field: &str) {
        match load_config_from(tmp).unwrap_err() {
            ConfigError::ValidationError { field: got, .. } => assert_eq!(got, field),
            other => panic!("expected ValidationError, got: {other}"),
        }
    }

    #[test]
    fn load_default_config() {
        let tmp = scratch("rookie_config_defaults");
        let config = load_config_from(&tmp).expect("defaults should load");

        assert_eq!(config.league.name, "Budget Blitz Bowl");
        assert!(config.league.league_id.is_none());
        assert!(!config.league.name_patterns.is_empty());
        assert!(config.league.hints.is_none());

        assert_eq!(config.generator.rounds, 2);
        assert_eq!(config.generator.max_picks, 24);
        assert_eq!(config.generator.batch_picks, 4);
        assert_eq!(config.generator.per_pick_timeout(), Duration::from_secs(25));
        assert_eq!(config.generator.retry_backoff(), Duration::from_millis(750));
        assert!(config.generator.trace);
        assert!(config.generator.seed.is_none());

        assert_eq!(config.llm.model, "gpt-4o-mini");
        assert_eq!(config.llm.max_tokens, 400);
        assert_eq!(config.db_path, "rookie-mock.db");
        assert_eq!(config.data_paths.player_pool.as_deref(), Some("data/player_pool.json"));
        assert_eq!(config.jobs.lease_secs, 45);
        assert_eq!(config.jobs.max_log_entries, 300);
        assert!(config.credentials.openai_api_key.is_none());

        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn credentials_key_wins_over_environment() {
        let tmp = scratch("rookie_config_credentials");
        fs::write(
            tmp.join("config/credentials.toml"),
            "openai_api_key = \"sk-from-file\"\n",
        )
        .unwrap();
        let config = load_config_from(&tmp).unwrap();
        assert_eq!(config.require_api_key().unwrap(), "sk-from-file");
        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn blank_credentials_key_is_not_a_key() {
        let tmp = scratch("rookie_config_blank_key");
        fs::write(tmp.join("config/credentials.toml"), "openai_api_key = \"  \"\n").unwrap();
        let config = load_config_from(&tmp).unwrap();
        // Only the environment can supply a key now.
        assert_eq!(config.api_key(), std::env::var(API_KEY_ENV).ok().filter(|k| !k.trim().is_empty()));
        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn fixed_league_id_needs_no_search_terms() {
        let tmp = scratch("rookie_config_fixed_id");
        rewrite(
            &tmp,
            "league.toml",
            "commissioner_user_id = \"731228412345678912\"",
            "league_id = \"1180000000000000000\"",
        );
        rewrite(&tmp, "league.toml", "name_patterns = [", "ignored = [");
        let config = load_config_from(&tmp).unwrap();
        assert_eq!(config.league.league_id.as_deref(), Some("1180000000000000000"));
        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn rejects_missing_commissioner_without_league_id() {
        let tmp = scratch("rookie_config_no_commissioner");
        rewrite(
            &tmp,
            "league.toml",
            "commissioner_user_id = \"731228412345678912\"",
            "",
        );
        expect_field(&tmp, "league.commissioner_user_id");
        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn rejects_rounds_out_of_range() {
        let tmp = scratch("rookie_config_rounds");
        rewrite(&tmp, "mock_draft.toml", "rounds = 2", "rounds = 8");
        expect_field(&tmp, "generator.rounds");
        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn rejects_max_picks_below_one_round() {
        let tmp = scratch("rookie_config_max_picks");
        rewrite(&tmp, "mock_draft.toml", "max_picks = 24", "max_picks = 6");
        expect_field(&tmp, "generator.max_picks");
        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn rejects_short_per_pick_timeout() {
        let tmp = scratch("rookie_config_timeout");
        rewrite(
            &tmp,
            "mock_draft.toml",
            "per_pick_timeout_secs = 25",
            "per_pick_timeout_secs = 2",
        );
        expect_field(&tmp, "generator.per_pick_timeout_secs");
        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn rejects_zero_batch_picks() {
        let tmp = scratch("rookie_config_batch");
        rewrite(&tmp, "mock_draft.toml", "batch_picks = 4", "batch_picks = 0");
        expect_field(&tmp, "generator.batch_picks");
        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn rejects_short_lease() {
        let tmp = scratch("rookie_config_lease");
        rewrite(&tmp, "mock_draft.toml", "lease_secs = 45", "lease_secs = 1");
        expect_field(&tmp, "jobs.lease_secs");
        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn rejects_hot_temperature() {
        let tmp = scratch("rookie_config_temperature");
        rewrite(&tmp, "mock_draft.toml", "temperature = 0.7", "temperature = 2.5");
        expect_field(&tmp, "llm.temperature");
        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn file_not_found_for_missing_mock_draft_toml() {
        let tmp = scratch("rookie_config_missing_mock");
        fs::remove_file(tmp.join("config/mock_draft.toml")).unwrap();
        match load_config_from(&tmp).unwrap_err() {
            ConfigError::FileNotFound { path } => assert!(path.ends_with("mock_draft.toml")),
            other => panic!("expected FileNotFound, got: {other}"),
        }
        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn parse_error_for_invalid_toml() {
        let tmp = scratch("rookie_config_invalid_toml");
        fs::write(tmp.join("config/league.toml"), "this is not valid [[[ toml").unwrap();
        match load_config_from(&tmp).unwrap_err() {
            ConfigError::ParseError { path, .. } => assert!(path.ends_with("league.toml")),
            other => panic!("expected ParseError, got: {other}"),
        }
        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn ensure_config_files_copies_missing_files_only() {
        let tmp = std::env::temp_dir().join("rookie_config_ensure");
        let _ = fs::remove_dir_all(&tmp);
        let defaults = tmp.join("defaults");
        fs::create_dir_all(&defaults).unwrap();
        fs::write(defaults.join("league.toml"), "[league]\nname = \"x\"\n").unwrap();
        fs::write(defaults.join("mock_draft.toml"), "# defaults\n").unwrap();
        fs::write(defaults.join("credentials.toml.example"), "openai_api_key = \"\"\n").unwrap();
        fs::create_dir_all(tmp.join("config")).unwrap();
        fs::write(tmp.join("config/league.toml"), "# customized\n").unwrap();

        let copied = ensure_config_files(&tmp).unwrap();
        assert_eq!(copied, vec![tmp.join("config/mock_draft.toml")]);
        assert_eq!(
            fs::read_to_string(tmp.join("config/league.toml")).unwrap(),
            "# customized\n"
        );
        assert!(!tmp.join("config/credentials.toml.example").exists());

        // Second run copies nothing.
        assert!(ensure_config_files(&tmp).unwrap().is_empty());
        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn ensure_config_files_errors_without_any_directory() {
        let tmp = std::env::temp_dir().join("rookie_config_ensure_empty");
        let _ = fs::remove_dir_all(&tmp);
        fs::create_dir_all(&tmp).unwrap();
        assert!(matches!(
            ensure_config_files(&tmp),
            Err(ConfigError::DefaultsCopyError { .. })
        ));
        let _ = fs::remove_dir_all(&tmp);
    }
}
