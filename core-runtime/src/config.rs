//! # Configuration
//!
//! Application configuration for the person → album sync.
//!
//! ## Overview
//!
//! Configuration is a single JSON document loaded once per run and passed by
//! reference to the service. It names the Immich server, one entry per user
//! (API key plus person links), and runtime options for sync, HTTP and storage.
//!
//! ## Sources
//!
//! Resolved by [`ConfigSource::select`], first match wins:
//!
//! 1. the `CONFIG` environment variable holding inline JSON
//! 2. an explicit file path (the CLI's `--config`)
//! 3. `data/config.json`
//!
//! ## Example
//!
//! ```json
//! {
//!   "immichServer": "http://immich:2283",
//!   "users": [{
//!     "apiKey": "abcd1234...",
//!     "personLinks": [
//!       { "description": "Kids together", "personIds": ["p1", "p2"],
//!         "operation": "AND", "albumId": "album-1" }
//!     ]
//!   }],
//!   "sync": { "maxConcurrentRules": 2 }
//! }
//! ```
//!
//! Unknown keys are ignored, so older files carrying e.g. a `schedule` entry
//! still load.
//!
//! ## Error Handling
//!
//! Every failure is an [`Error::Config`]: unreadable file, malformed JSON or a
//! validation failure. Such errors abort the run before any rule executes.

use crate::error::{Error, Result};
use crate::logging::{redact_if_sensitive, strip_path};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable holding inline JSON configuration.
pub const CONFIG_ENV_VAR: &str = "CONFIG";

/// Configuration file used when neither `CONFIG` nor an explicit path is given.
pub const DEFAULT_CONFIG_PATH: &str = "data/config.json";

/// Default location of the checkpoint database.
pub const DEFAULT_DATABASE_PATH: &str = "data/checkpoints.db";

/// Number of leading API key characters used as the checkpoint scope prefix.
pub const CREDENTIAL_PREFIX_LEN: usize = 8;

const MAX_RETRY_ATTEMPTS: u32 = 10;

/// Where the configuration document comes from.
#[derive(Clone, PartialEq, Eq)]
pub enum ConfigSource {
    /// Inline JSON from the `CONFIG` environment variable
    Inline(String),
    /// JSON file on disk
    File(PathBuf),
}

impl ConfigSource {
    /// Resolve the source from the process environment.
    pub fn from_env(path: Option<&Path>) -> Self {
        Self::select(std::env::var(CONFIG_ENV_VAR).ok(), path)
    }

    /// Resolve the source from an explicit `CONFIG` value.
    ///
    /// A blank environment value counts as unset.
    pub fn select(env_value: Option<String>, path: Option<&Path>) -> Self {
        match env_value {
            Some(json) if !json.trim().is_empty() => ConfigSource::Inline(json),
            _ => ConfigSource::File(
                path.map(Path::to_path_buf)
                    .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH)),
            ),
        }
    }
}

impl fmt::Debug for ConfigSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigSource::Inline(json) => f
                .debug_tuple("Inline")
                .field(&format_args!("{} bytes", json.len()))
                .finish(),
            ConfigSource::File(path) => f.debug_tuple("File").field(path).finish(),
        }
    }
}

impl fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigSource::Inline(_) => write!(f, "{} environment variable", CONFIG_ENV_VAR),
            ConfigSource::File(path) => write!(f, "file {}", path.display()),
        }
    }
}

/// Parsed application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppConfig {
    /// Base URL of the Immich server, without the `/api` suffix
    pub immich_server: String,

    #[serde(default)]
    pub users: Vec<UserConfig>,

    #[serde(default)]
    pub sync: SyncOptions,

    #[serde(default)]
    pub http: HttpOptions,

    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,
}

fn default_database_path() -> PathBuf {
    PathBuf::from(DEFAULT_DATABASE_PATH)
}

/// One Immich account and the person links synced with its key.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserConfig {
    pub api_key: String,

    #[serde(default)]
    pub person_links: Vec<LinkConfig>,
}

impl UserConfig {
    /// Leading characters of the API key, used to namespace checkpoints per account.
    pub fn credential_prefix(&self) -> String {
        self.api_key.chars().take(CREDENTIAL_PREFIX_LEN).collect()
    }
}

impl fmt::Debug for UserConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UserConfig")
            .field("api_key", &redact_if_sensitive("api_key", &self.api_key))
            .field("person_links", &self.person_links)
            .finish()
    }
}

/// How the required persons of a link combine.
///
/// Read straight from a link's `operation` field and carried unchanged into the
/// sync rule, its scope key and the matcher.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RequiredOperation {
    /// At least one required person (the search prefilter)
    #[default]
    #[serde(rename = "OR", alias = "or")]
    Any,
    /// Every required person
    #[serde(rename = "AND", alias = "and")]
    All,
}

impl RequiredOperation {
    /// Label used in the configuration file, scope keys and logs.
    pub fn label(&self) -> &'static str {
        match self {
            RequiredOperation::Any => "OR",
            RequiredOperation::All => "AND",
        }
    }
}

impl fmt::Display for RequiredOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One person → album link as written in the configuration file.
///
/// This is the raw shape; `core_sync::Rule::from_link` normalises it (legacy
/// `personId` fallback, set semantics) and rejects incomplete links.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Legacy single-person field, used only when `personIds` is absent or empty
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub person_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub person_ids: Option<Vec<String>>,

    #[serde(default)]
    pub operation: RequiredOperation,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub exclude_person_ids: Vec<String>,

    /// Only media whose people are all drawn from the required set
    #[serde(default)]
    pub exclude_others: bool,

    #[serde(default)]
    pub album_id: String,
}

/// Runtime options for the sync pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SyncOptions {
    /// Rules processed at the same time (1 = sequential)
    pub max_concurrent_rules: usize,
    /// Fail a rule instead of following more than this many pages
    pub max_pages: Option<u32>,
    /// Log what would be added without mutating albums or checkpoints
    pub dry_run: bool,
    /// Re-check that ANY-of matches contain a required person
    pub verify_any_of: bool,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            max_concurrent_rules: 1,
            max_pages: None,
            dry_run: false,
            verify_any_of: false,
        }
    }
}

/// HTTP transport options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HttpOptions {
    pub request_timeout_secs: u64,
    /// Total attempts per request, 1 disables retries
    pub retry_attempts: u32,
}

impl Default for HttpOptions {
    fn default() -> Self {
        Self {
            request_timeout_secs: 30,
            retry_attempts: 1,
        }
    }
}

impl HttpOptions {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl AppConfig {
    /// Load and validate configuration from `source`.
    pub fn load(source: &ConfigSource) -> Result<Self> {
        match source {
            ConfigSource::Inline(json) => Self::from_json_str(json).map_err(|e| {
                Error::Config(format!("{} ({} environment variable)", e, CONFIG_ENV_VAR))
            }),
            ConfigSource::File(path) => {
                let contents = std::fs::read_to_string(path).map_err(|e| {
                    Error::Config(format!(
                        "Failed to read configuration file {}: {}",
                        path.display(),
                        e
                    ))
                })?;
                Self::from_json_str(&contents).map_err(|e| {
                    Error::Config(format!(
                        "{} ({})",
                        e,
                        strip_path(&path.to_string_lossy())
                    ))
                })
            }
        }
    }

    /// Parse and validate a JSON document.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: AppConfig = serde_json::from_str(json)
            .map_err(|e| Error::Config(format!("Invalid configuration JSON: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Server URL with any trailing slash removed.
    pub fn server_url(&self) -> &str {
        self.immich_server.trim_end_matches('/')
    }

    /// Total number of person links across all users.
    pub fn link_count(&self) -> usize {
        self.users.iter().map(|user| user.person_links.len()).sum()
    }

    /// Check structural constraints.
    ///
    /// Per-link person sets are validated when links become rules.
    pub fn validate(&self) -> Result<()> {
        let server = self.immich_server.trim();
        if server.is_empty() {
            return Err(Error::Config("immichServer cannot be empty".to_string()));
        }
        if !(server.starts_with("http://") || server.starts_with("https://")) {
            return Err(Error::Config(format!(
                "immichServer must be an http(s) URL, got '{}'",
                server
            )));
        }

        if self.users.is_empty() {
            return Err(Error::Config(
                "No users configured. Add at least one entry to 'users'.".to_string(),
            ));
        }

        for (index, user) in self.users.iter().enumerate() {
            if user.api_key.trim().is_empty() {
                return Err(Error::Config(format!("users[{}].apiKey cannot be empty", index)));
            }
        }

        if self.link_count() == 0 {
            return Err(Error::Config(
                "No person links configured. Add 'personLinks' to at least one user.".to_string(),
            ));
        }

        if self.sync.max_concurrent_rules == 0 {
            return Err(Error::Config(
                "sync.maxConcurrentRules must be at least 1".to_string(),
            ));
        }

        if self.sync.max_pages == Some(0) {
            return Err(Error::Config("sync.maxPages must be at least 1".to_string()));
        }

        if self.http.request_timeout_secs == 0 {
            return Err(Error::Config(
                "http.requestTimeoutSecs must be greater than 0".to_string(),
            ));
        }

        if self.http.retry_attempts == 0 || self.http.retry_attempts > MAX_RETRY_ATTEMPTS {
            return Err(Error::Config(format!(
                "http.retryAttempts must be between 1 and {}",
                MAX_RETRY_ATTEMPTS
            )));
        }

        if self.database_path.as_os_str().is_empty() {
            return Err(Error::Config("databasePath cannot be empty".to_string()));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FULL_CONFIG: &str = r#"{
        "immichServer": "http://immich:2283/",
        "schedule": "0 * * * *",
        "users": [
            {
                "apiKey": "abcd1234efgh5678",
                "personLinks": [
                    {
                        "description": "Both kids",
                        "personIds": ["p2", "p1"],
                        "operation": "AND",
                        "excludePersonIds": ["p9"],
                        "excludeOthers": true,
                        "albumId": "album-1"
                    },
                    { "personId": "p3", "albumId": "album-2" }
                ]
            }
        ],
        "sync": { "maxConcurrentRules": 4, "maxPages": 50, "dryRun": true },
        "http": { "requestTimeoutSecs": 10, "retryAttempts": 3 },
        "databasePath": "/var/lib/sync/checkpoints.db"
    }"#;

    fn minimal(extra: &str) -> String {
        format!(
            r#"{{
                "immichServer": "https://photos.example.org",
                "users": [{{ "apiKey": "key", "personLinks": [{{ "personId": "p1", "albumId": "a1" }}] }}]
                {}
            }}"#,
            extra
        )
    }

    #[test]
    fn test_parse_full_config() {
        let config = AppConfig::from_json_str(FULL_CONFIG).unwrap();

        assert_eq!(config.server_url(), "http://immich:2283");
        assert_eq!(config.users.len(), 1);
        assert_eq!(config.link_count(), 2);

        let link = &config.users[0].person_links[0];
        assert_eq!(link.description.as_deref(), Some("Both kids"));
        assert_eq!(
            link.person_ids,
            Some(vec!["p2".to_string(), "p1".to_string()])
        );
        assert_eq!(link.operation, RequiredOperation::All);
        assert_eq!(link.exclude_person_ids, vec!["p9".to_string()]);
        assert!(link.exclude_others);

        let legacy = &config.users[0].person_links[1];
        assert_eq!(legacy.person_id.as_deref(), Some("p3"));
        assert_eq!(legacy.operation, RequiredOperation::Any);
        assert!(!legacy.exclude_others);

        assert_eq!(config.sync.max_concurrent_rules, 4);
        assert_eq!(config.sync.max_pages, Some(50));
        assert!(config.sync.dry_run);
        assert!(!config.sync.verify_any_of);
        assert_eq!(config.http.request_timeout(), Duration::from_secs(10));
        assert_eq!(config.http.retry_attempts, 3);
        assert_eq!(
            config.database_path,
            PathBuf::from("/var/lib/sync/checkpoints.db")
        );
    }

    #[test]
    fn test_defaults_applied() {
        let config = AppConfig::from_json_str(&minimal("")).unwrap();

        assert_eq!(config.sync, SyncOptions::default());
        assert_eq!(config.http, HttpOptions::default());
        assert_eq!(config.database_path, PathBuf::from(DEFAULT_DATABASE_PATH));
    }

    #[test]
    fn test_lowercase_operation_accepted() {
        let json = r#"{
            "immichServer": "http://immich",
            "users": [{ "apiKey": "k", "personLinks": [{ "personIds": ["a", "b"], "operation": "and", "albumId": "x" }] }]
        }"#;
        let config = AppConfig::from_json_str(json).unwrap();
        assert_eq!(config.users[0].person_links[0].operation, RequiredOperation::All);
    }

    #[test]
    fn test_missing_server_is_config_error() {
        let result = AppConfig::from_json_str(r#"{ "users": [] }"#);
        assert!(matches!(result, Err(Error::Config(msg)) if msg.contains("immichServer")));
    }

    #[test]
    fn test_malformed_json_is_config_error() {
        let result = AppConfig::from_json_str("{ not json");
        assert!(matches!(result, Err(Error::Config(msg)) if msg.contains("Invalid configuration JSON")));
    }

    #[test]
    fn test_validate_rejects_non_http_server() {
        let json = minimal("").replace("https://photos.example.org", "photos.example.org");
        let err = AppConfig::from_json_str(&json).unwrap_err();
        assert!(err.to_string().contains("http(s) URL"));
    }

    #[test]
    fn test_validate_rejects_empty_links() {
        let json = r#"{ "immichServer": "http://immich", "users": [{ "apiKey": "k" }] }"#;
        let err = AppConfig::from_json_str(json).unwrap_err();
        assert!(err.to_string().contains("No person links"));
    }

    #[test]
    fn test_validate_rejects_blank_api_key() {
        let json = minimal("").replace("\"key\"", "\"  \"");
        let err = AppConfig::from_json_str(&json).unwrap_err();
        assert!(err.to_string().contains("users[0].apiKey"));
    }

    #[test]
    fn test_validate_rejects_bad_runtime_options() {
        let zero_concurrency = minimal(r#", "sync": { "maxConcurrentRules": 0 }"#);
        assert!(AppConfig::from_json_str(&zero_concurrency).is_err());

        let zero_pages = minimal(r#", "sync": { "maxPages": 0 }"#);
        assert!(AppConfig::from_json_str(&zero_pages).is_err());

        let zero_timeout = minimal(r#", "http": { "requestTimeoutSecs": 0 }"#);
        assert!(AppConfig::from_json_str(&zero_timeout).is_err());

        let many_retries = minimal(r#", "http": { "retryAttempts": 50 }"#);
        assert!(AppConfig::from_json_str(&many_retries).is_err());
    }

    #[test]
    fn test_credential_prefix() {
        let user = UserConfig {
            api_key: "abcd1234efgh5678".to_string(),
            person_links: Vec::new(),
        };
        assert_eq!(user.credential_prefix(), "abcd1234");

        let short = UserConfig {
            api_key: "abc".to_string(),
            person_links: Vec::new(),
        };
        assert_eq!(short.credential_prefix(), "abc");
    }

    #[test]
    fn test_user_debug_redacts_api_key() {
        let config = AppConfig::from_json_str(FULL_CONFIG).unwrap();
        let debug = format!("{:?}", config);
        assert!(!debug.contains("abcd1234efgh5678"));
        assert!(debug.contains("[REDACTED]"));
    }

    #[test]
    fn test_source_selection_precedence() {
        let explicit = Path::new("/etc/sync.json");

        assert_eq!(
            ConfigSource::select(Some("{}".to_string()), Some(explicit)),
            ConfigSource::Inline("{}".to_string())
        );
        assert_eq!(
            ConfigSource::select(Some("   ".to_string()), Some(explicit)),
            ConfigSource::File(explicit.to_path_buf())
        );
        assert_eq!(
            ConfigSource::select(None, None),
            ConfigSource::File(PathBuf::from(DEFAULT_CONFIG_PATH))
        );
    }

    #[test]
    fn test_inline_source_debug_hides_contents() {
        let source = ConfigSource::Inline(r#"{"apiKey":"secret"}"#.to_string());
        assert!(!format!("{:?}", source).contains("secret"));
        assert_eq!(source.to_string(), "CONFIG environment variable");
    }

    #[test]
    fn test_load_from_file() {
        let path = std::env::temp_dir().join(format!("sync-config-{}.json", std::process::id()));
        std::fs::write(&path, FULL_CONFIG).unwrap();

        let config = AppConfig::load(&ConfigSource::File(path.clone())).unwrap();
        assert_eq!(config.link_count(), 2);

        let _ = std::fs::remove_file(path);
    }

    #[test]
    fn test_load_missing_file() {
        let source = ConfigSource::File(PathBuf::from("/nonexistent/config.json"));
        let err = AppConfig::load(&source).unwrap_err();
        assert!(err.to_string().contains("Failed to read configuration file"));
    }

    #[test]
    fn test_load_inline() {
        let config = AppConfig::load(&ConfigSource::Inline(minimal(""))).unwrap();
        assert_eq!(config.server_url(), "https://photos.example.org");
    }
}
