use anyhow::{Context, Result};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_DATABASE_URL: &str = "sqlite://sleep_history_database.db";
pub const DEFAULT_MAX_CONNECTIONS: u32 = 4;
pub const DEFAULT_LOG_FILE: &str = "app.log";

#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub database_url: String,
    pub max_connections: u32,
    pub debug_logs_enabled: bool,
    pub log_file: PathBuf,
}

impl Settings {
    fn get_env_path() -> Result<PathBuf> {
        Ok(env::current_dir()?.join(".env"))
    }

    /// Loads `.env` from the working directory, writing a default one first
    /// if there is none, then reads settings from the process environment.
    pub fn new() -> Result<Self> {
        let env_path = Self::get_env_path()?;
        if !env_path.exists() {
            log::info!("No .env found, writing defaults to {}", env_path.display());
            Self::write_default_env(&env_path)?;
        }
        dotenvy::from_path(&env_path).ok();

        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds settings from any key lookup. Unset keys fall back to defaults;
    /// set but malformed values are errors.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_url = lookup("DATABASE_URL")
            .filter(|url| !url.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string());

        let max_connections = match lookup("DATABASE_MAX_CONNECTIONS") {
            Some(raw) => raw
                .trim()
                .parse::<u32>()
                .with_context(|| format!("DATABASE_MAX_CONNECTIONS is not a number: {}", raw))?,
            None => DEFAULT_MAX_CONNECTIONS,
        };
        if max_connections == 0 {
            return Err(anyhow::anyhow!("DATABASE_MAX_CONNECTIONS must be at least 1"));
        }

        let debug_logs_enabled = lookup("DEBUG_LOGS_ENABLED")
            .and_then(|v| v.trim().parse::<bool>().ok())
            .unwrap_or(false);

        let log_file = lookup("LOG_FILE")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_LOG_FILE));

        Ok(Self {
            database_url,
            max_connections,
            debug_logs_enabled,
            log_file,
        })
    }

    pub fn write_default_env(path: &Path) -> Result<()> {
        let env_content = format!(
            "# Auto-generated settings for the sleep tracker.\n\
             # If you delete this file, it will be recreated with defaults on next run.\n\
             \n\
             DATABASE_URL={}\n\
             DATABASE_MAX_CONNECTIONS={}\n\
             \n\
             # Set to true to write debug logs to LOG_FILE\n\
             DEBUG_LOGS_ENABLED=false\n\
             LOG_FILE={}\n",
            DEFAULT_DATABASE_URL, DEFAULT_MAX_CONNECTIONS, DEFAULT_LOG_FILE
        );
        fs::write(path, env_content)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        Ok(())
    }
}
