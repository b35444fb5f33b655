use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Main configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub watcher: WatcherConfig,
    pub loader: LoaderConfig,
    /// Optional file-stem → table-name overrides
    #[serde(default)]
    pub tables: HashMap<String, String>,
}

/// Directory layout and poll cadence for the ingest watcher
#[derive(Debug, Clone, Deserialize)]
pub struct WatcherConfig {
    /// Directory scanned for incoming archives.
    pub input_dir: PathBuf,
    /// Private directory for claimed archives and scratch extraction.
    pub work_dir: PathBuf,
    /// Completed archives are moved here (timestamped).
    pub processed_dir: PathBuf,
    /// Failed archives are moved here for manual inspection, never deleted.
    pub quarantine_dir: PathBuf,
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
}

/// Batch sizing and remote retry policy
#[derive(Debug, Clone, Deserialize)]
pub struct LoaderConfig {
    #[serde(default = "default_max_batch_size")]
    pub max_batch_size: usize,
    /// Retries after the first failed attempt for a batch.
    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: usize,
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
    #[serde(default = "default_api_url_env")]
    pub api_url_env: String,
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    /// Skip inserting into tables that already hold rows remotely.
    #[serde(default = "default_skip_populated")]
    pub skip_populated: bool,
}

fn default_poll_interval_secs() -> u64 {
    30
}

fn default_max_batch_size() -> usize {
    1000
}

fn default_retry_attempts() -> usize {
    3
}

fn default_retry_delay_ms() -> u64 {
    500
}

fn default_api_url_env() -> String {
    "SUPABASE_URL".to_string()
}

fn default_api_key_env() -> String {
    "SUPABASE_SERVICE_ROLE_KEY".to_string()
}

fn default_skip_populated() -> bool {
    true
}

impl Config {
    /// Load configuration from file
    ///
    /// Loads environment variables from .env file (if present) before loading config.
    /// Looks for config file in this order:
    /// 1. Path specified in TABLOAD_CONFIG environment variable
    /// 2. ./config.toml in current directory
    pub fn load() -> Result<Self> {
        // Load .env file if it exists (ignore errors - file is optional)
        let _ = dotenv::dotenv();

        let config_path = std::env::var("TABLOAD_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("config.toml"));

        let config_str = std::fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;

        let config: Config = toml::from_str(&config_str)
            .context("Failed to parse config.toml")?;

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration values
    fn validate(&self) -> Result<()> {
        if !self.watcher.input_dir.exists() {
            anyhow::bail!(
                "input_dir path does not exist: {}. Set input_dir in config.toml to the directory receiving archives.",
                self.watcher.input_dir.display()
            );
        }

        if !self.watcher.input_dir.is_dir() {
            anyhow::bail!(
                "input_dir must be a directory, not a file: {}",
                self.watcher.input_dir.display()
            );
        }

        // Credentials are resolved from the environment (or .env, already loaded above)
        std::env::var(&self.loader.api_url_env).with_context(|| {
            format!(
                "Environment variable {} not set. Set it in your .env file or as an environment variable with the database project URL.",
                self.loader.api_url_env
            )
        })?;

        std::env::var(&self.loader.api_key_env).with_context(|| {
            format!(
                "Environment variable {} not set. Set it in your .env file or as an environment variable with the service key.",
                self.loader.api_key_env
            )
        })?;

        if self.loader.max_batch_size == 0 {
            anyhow::bail!("loader.max_batch_size must be greater than 0");
        }

        if self.watcher.poll_interval_secs == 0 {
            anyhow::bail!("watcher.poll_interval_secs must be greater than 0");
        }

        Ok(())
    }

    /// Get the watched input directory
    pub fn input_dir(&self) -> &Path {
        &self.watcher.input_dir
    }

    /// Get the poll interval
    pub fn poll_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.watcher.poll_interval_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// Serialize config tests that mutate process-wide cwd and env so they don't race.
    static CONFIG_TEST_LOCK: Mutex<()> = Mutex::new(());

    fn create_test_config(temp_dir: &TempDir) -> String {
        let input_dir = temp_dir.path().join("input");
        fs::create_dir_all(&input_dir).unwrap();
        let root = temp_dir.path().canonicalize().unwrap();
        let root_str = root.to_str().unwrap().replace('\\', "\\\\");
        format!(
            r#"
[watcher]
input_dir = "{root}/input"
work_dir = "{root}/work"
processed_dir = "{root}/processed"
quarantine_dir = "{root}/quarantine"
poll_interval_secs = 5

[loader]
max_batch_size = 500
retry_attempts = 2
retry_delay_ms = 10

[tables]
"fs220" = "call_report_fs220"
"#,
            root = root_str
        )
    }

    /// Restores cwd when dropped (e.g. on panic).
    struct CwdGuard(std::path::PathBuf);
    impl Drop for CwdGuard {
        fn drop(&mut self) {
            let _ = std::env::set_current_dir(&self.0);
        }
    }

    fn with_config_env(config_path: &Path, creds: Option<(&str, &str)>, f: impl FnOnce()) {
        let original_config = std::env::var("TABLOAD_CONFIG").ok();
        let original_url = std::env::var("SUPABASE_URL").ok();
        let original_key = std::env::var("SUPABASE_SERVICE_ROLE_KEY").ok();
        std::env::set_var("TABLOAD_CONFIG", config_path.to_str().unwrap());
        match creds {
            Some((url, key)) => {
                std::env::set_var("SUPABASE_URL", url);
                std::env::set_var("SUPABASE_SERVICE_ROLE_KEY", key);
            }
            None => {
                std::env::remove_var("SUPABASE_URL");
                std::env::remove_var("SUPABASE_SERVICE_ROLE_KEY");
            }
        }
        f();
        std::env::remove_var("TABLOAD_CONFIG");
        std::env::remove_var("SUPABASE_URL");
        std::env::remove_var("SUPABASE_SERVICE_ROLE_KEY");
        if let Some(val) = original_config {
            std::env::set_var("TABLOAD_CONFIG", val);
        }
        if let Some(val) = original_url {
            std::env::set_var("SUPABASE_URL", val);
        }
        if let Some(val) = original_key {
            std::env::set_var("SUPABASE_SERVICE_ROLE_KEY", val);
        }
    }

    #[test]
    fn test_config_load_success() {
        let _lock = CONFIG_TEST_LOCK.lock().unwrap();
        let temp_dir = TempDir::new().unwrap();
        let config_content = create_test_config(&temp_dir);
        let config_path = temp_dir.path().join("config.toml");
        fs::write(&config_path, config_content).unwrap();
        let config_path = config_path.canonicalize().unwrap();
        let original_dir = std::env::current_dir().unwrap();
        let _cwd = CwdGuard(original_dir.clone());
        std::env::set_current_dir(temp_dir.path()).unwrap();
        with_config_env(&config_path, Some(("https://example.test", "service-key")), || {
            let config = Config::load();
            assert!(config.is_ok(), "Config::load() failed: {:?}", config.err());
            let config = config.unwrap();
            assert_eq!(config.watcher.poll_interval_secs, 5);
            assert_eq!(config.loader.max_batch_size, 500);
            assert_eq!(config.loader.retry_attempts, 2);
            // Unset options fall back to defaults
            assert!(config.loader.skip_populated);
            assert_eq!(config.loader.api_url_env, "SUPABASE_URL");
            assert_eq!(config.tables.get("fs220").unwrap(), "call_report_fs220");
        });
    }

    #[test]
    fn test_config_missing_credentials() {
        let _lock = CONFIG_TEST_LOCK.lock().unwrap();
        let temp_dir = TempDir::new().unwrap();
        let config_content = create_test_config(&temp_dir);
        let config_path = temp_dir.path().join("config.toml");
        fs::write(&config_path, config_content).unwrap();
        let config_path = config_path.canonicalize().unwrap();
        let original_dir = std::env::current_dir().unwrap();
        let _cwd = CwdGuard(original_dir.clone());
        std::env::set_current_dir(temp_dir.path()).unwrap();
        with_config_env(&config_path, None, || {
            let config = Config::load();
            assert!(config.is_err(), "Expected missing credentials error");
            assert!(config.unwrap_err().to_string().contains("SUPABASE_URL"));
        });
    }

    #[test]
    fn test_config_missing_input_dir() {
        let _lock = CONFIG_TEST_LOCK.lock().unwrap();
        let temp_dir = TempDir::new().unwrap();
        let mut config_content = create_test_config(&temp_dir);
        config_content = config_content.replace("/input\"", "/no-such-dir\"");
        let config_path = temp_dir.path().join("config.toml");
        fs::write(&config_path, config_content).unwrap();
        let config_path = config_path.canonicalize().unwrap();
        let original_dir = std::env::current_dir().unwrap();
        let _cwd = CwdGuard(original_dir.clone());
        std::env::set_current_dir(temp_dir.path()).unwrap();
        with_config_env(&config_path, Some(("https://example.test", "service-key")), || {
            let config = Config::load();
            assert!(config.is_err());
            assert!(config.unwrap_err().to_string().contains("input_dir"));
        });
    }

    #[test]
    fn test_config_invalid_path() {
        let _lock = CONFIG_TEST_LOCK.lock().unwrap();
        let original = std::env::var("TABLOAD_CONFIG").ok();
        std::env::set_var("TABLOAD_CONFIG", "nonexistent.toml");
        let config = Config::load();
        assert!(config.is_err());
        std::env::remove_var("TABLOAD_CONFIG");
        if let Some(v) = original {
            std::env::set_var("TABLOAD_CONFIG", v);
        }
    }
}
