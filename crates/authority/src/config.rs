use serde::Deserialize;
use std::collections::HashSet;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration build error: {0}")]
    Build(#[from] config::ConfigError),
    #[error("Invalid configuration: {0}")]
    Validation(String),
}

#[derive(Clone, Debug, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    #[serde(default)]
    pub oauth2: OAuth2Config,
    #[serde(default)]
    pub password_hashing: PasswordHashConfig,
    /// Scope catalogue seeded at bootstrap.
    #[serde(default = "default_scopes")]
    pub scopes: Vec<ScopeSeed>,
    #[serde(default)]
    pub reaper: ReaperConfig,
}

/// Lifetimes, in seconds, of the artifacts the token authority issues.
#[derive(Clone, Debug, Deserialize)]
pub struct OAuth2Config {
    #[serde(default = "default_authorization_code_lifetime")]
    pub authorization_code_lifetime: i64,
    #[serde(default = "default_access_token_lifetime")]
    pub access_token_lifetime: i64,
    #[serde(default = "default_refresh_token_lifetime")]
    pub refresh_token_lifetime: i64,
}

impl Default for OAuth2Config {
    fn default() -> Self {
        Self {
            authorization_code_lifetime: default_authorization_code_lifetime(),
            access_token_lifetime: default_access_token_lifetime(),
            refresh_token_lifetime: default_refresh_token_lifetime(),
        }
    }
}

fn default_authorization_code_lifetime() -> i64 {
    600 // 10 minutes
}

fn default_access_token_lifetime() -> i64 {
    3600 // 1 hour
}

fn default_refresh_token_lifetime() -> i64 {
    86400 * 14 // 14 days
}

/// Argon2id cost factor. Fixed for the process; callers cannot override it.
#[derive(Clone, Debug, Deserialize)]
pub struct PasswordHashConfig {
    #[serde(default = "default_memory_kib")]
    pub memory_kib: u32,
    #[serde(default = "default_iterations")]
    pub iterations: u32,
    #[serde(default = "default_parallelism")]
    pub parallelism: u32,
}

impl Default for PasswordHashConfig {
    fn default() -> Self {
        Self {
            memory_kib: default_memory_kib(),
            iterations: default_iterations(),
            parallelism: default_parallelism(),
        }
    }
}

fn default_memory_kib() -> u32 {
    argon2::Params::DEFAULT_M_COST
}

fn default_iterations() -> u32 {
    argon2::Params::DEFAULT_T_COST
}

fn default_parallelism() -> u32 {
    argon2::Params::DEFAULT_P_COST
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct ScopeSeed {
    pub name: String,
    #[serde(default)]
    pub is_default: bool,
}

fn default_scopes() -> Vec<ScopeSeed> {
    vec![
        ScopeSeed {
            name: "read".into(),
            is_default: true,
        },
        ScopeSeed {
            name: "read_write".into(),
            is_default: false,
        },
    ]
}

/// Periodic deletion of expired codes and tokens. Storage hygiene only.
#[derive(Clone, Debug, Deserialize)]
pub struct ReaperConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_reaper_interval")]
    pub interval_secs: u64,
}

impl Default for ReaperConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            interval_secs: default_reaper_interval(),
        }
    }
}

fn default_reaper_interval() -> u64 {
    3600
}

impl AppConfig {
    /// Check cross-field invariants the type system cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.database_url.trim().is_empty() {
            return Err(ConfigError::Validation("database_url must be set".into()));
        }

        let lifetimes = &self.oauth2;
        if lifetimes.authorization_code_lifetime <= 0
            || lifetimes.access_token_lifetime <= 0
            || lifetimes.refresh_token_lifetime <= 0
        {
            return Err(ConfigError::Validation(
                "oauth2 lifetimes must be positive".into(),
            ));
        }
        if lifetimes.access_token_lifetime <= lifetimes.authorization_code_lifetime {
            return Err(ConfigError::Validation(
                "oauth2.access_token_lifetime must exceed authorization_code_lifetime".into(),
            ));
        }
        if lifetimes.refresh_token_lifetime < lifetimes.access_token_lifetime {
            return Err(ConfigError::Validation(
                "oauth2.refresh_token_lifetime must be >= access_token_lifetime".into(),
            ));
        }

        if self.scopes.is_empty() {
            return Err(ConfigError::Validation("scopes must not be empty".into()));
        }
        if !self.scopes.iter().any(|s| s.is_default) {
            return Err(ConfigError::Validation(
                "scopes must include at least one default scope".into(),
            ));
        }
        let mut seen = HashSet::new();
        for scope in &self.scopes {
            if scope.name.is_empty() || scope.name.contains(char::is_whitespace) {
                return Err(ConfigError::Validation(format!(
                    "invalid scope name {:?}",
                    scope.name
                )));
            }
            if !seen.insert(scope.name.as_str()) {
                return Err(ConfigError::Validation(format!(
                    "duplicate scope {}",
                    scope.name
                )));
            }
        }

        let hashing = &self.password_hashing;
        argon2::Params::new(
            hashing.memory_kib,
            hashing.iterations,
            hashing.parallelism,
            None,
        )
        .map_err(|e| ConfigError::Validation(format!("password_hashing: {e}")))?;

        if self.reaper.enabled && self.reaper.interval_secs == 0 {
            return Err(ConfigError::Validation(
                "reaper.interval_secs must be > 0".into(),
            ));
        }

        Ok(())
    }
}

/// Load application configuration from `config.yaml` + environment overrides.
///
/// Any environment variable matching the key path separated by double
/// underscores (e.g. `OAUTH2__ACCESS_TOKEN_LIFETIME`) overrides the file value.
pub fn load_config() -> Result<AppConfig, ConfigError> {
    load_config_from("config.yaml")
}

/// Same as [`load_config`] with an explicit file name (extension optional).
pub fn load_config_from(path: &str) -> Result<AppConfig, ConfigError> {
    use config::{Config, Environment, File};
    let cfg = Config::builder()
        .add_source(File::with_name(path).required(false))
        .add_source(Environment::default().separator("__"))
        .build()?;

    let app: AppConfig = cfg.try_deserialize()?;
    app.validate()?;
    Ok(app)
}

/// Convenience helper for binaries wanting panic-on-error behaviour.
pub fn load_config_or_panic() -> AppConfig {
    match load_config() {
        Ok(c) => c,
        Err(e) => panic!("Failed to load configuration: {e}"),
    }
}
