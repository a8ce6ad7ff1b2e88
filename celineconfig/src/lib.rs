//! # CelineAir configuration
//!
//! One YAML tree per process, built from the embedded `celine.yaml`
//! defaults, the user's `config.yaml` and `CELINE_CONFIG__*` variables.
//! Typed accessors cover the logger, the API client and the polling cadence;
//! other crates read and write their own subtrees through `get_value` /
//! `set_value`.
//!
//! ## Usage
//!
//! ```no_run
//! use celineconfig::get_config;
//!
//! let config = get_config();
//! let interval = config.get_update_interval_secs()?;
//!
//! // persisted to config.yaml immediately
//! config.set_update_interval_secs(600)?;
//! # Ok::<(), anyhow::Error>(())
//! ```

use anyhow::{anyhow, Context, Result};
use dirs::home_dir;
use lazy_static::lazy_static;
use parking_lot::Mutex;
use serde_yaml::{Mapping, Number, Value};
use std::{
    env, fs,
    path::{Path, PathBuf},
    sync::Arc,
};
use tracing::info;

const DEFAULT_CONFIG: &str = include_str!("celine.yaml");

lazy_static! {
    static ref CONFIG: Arc<Config> =
        Arc::new(Config::load_config("").expect("Failed to load CelineAir configuration"));
}

const ENV_CONFIG_DIR: &str = "CELINE_CONFIG";
const ENV_PREFIX: &str = "CELINE_CONFIG__";
const CONFIG_DIR_NAME: &str = ".celine";

// Default values for configuration
const DEFAULT_LOG_MIN_LEVEL: &str = "INFO";
const DEFAULT_LOG_ENABLE_CONSOLE: bool = true;
const DEFAULT_API_BASE_URL: &str = "https://geo.irceline.be";
const DEFAULT_API_TIMEOUT_SECS: u64 = 30;
const DEFAULT_UPDATE_INTERVAL_SECS: u64 = 1800;

/// Macro to generate getter/setter for u64 values with default
macro_rules! impl_u64_config {
    ($getter:ident, $setter:ident, $path:expr, $default:expr) => {
        pub fn $getter(&self) -> Result<u64> {
            match self.get_value($path) {
                Ok(Value::Number(n)) => Ok(n.as_u64().unwrap_or($default)),
                Ok(Value::String(s)) => Ok(s.trim().parse().unwrap_or($default)),
                _ => Ok($default),
            }
        }

        pub fn $setter(&self, value: u64) -> Result<()> {
            self.set_value($path, Value::Number(Number::from(value)))
        }
    };
}

/// Macro to generate getter/setter for bool values with default
macro_rules! impl_bool_config {
    ($getter:ident, $setter:ident, $path:expr, $default:expr) => {
        pub fn $getter(&self) -> Result<bool> {
            match self.get_value($path) {
                Ok(Value::Bool(b)) => Ok(b),
                _ => Ok($default),
            }
        }

        pub fn $setter(&self, value: bool) -> Result<()> {
            self.set_value($path, Value::Bool(value))
        }
    };
}

/// Macro to generate getter/setter for string values with default
macro_rules! impl_string_config {
    ($getter:ident, $setter:ident, $path:expr, $default:expr) => {
        pub fn $getter(&self) -> Result<String> {
            match self.get_value($path) {
                Ok(Value::String(s)) if !s.trim().is_empty() => Ok(s),
                _ => Ok($default.to_string()),
            }
        }

        pub fn $setter(&self, value: String) -> Result<()> {
            self.set_value($path, Value::String(value))
        }
    };
}

/// Configuration manager for CelineAir
///
/// The whole configuration is kept as a YAML tree. Every setter persists the
/// tree back to `<config_dir>/config.yaml`.
///
/// # Examples
///
/// ```no_run
/// use celineconfig::Config;
///
/// let config = Config::load_config("/tmp/celine")?;
/// println!("API: {}", config.get_api_base_url()?);
/// # Ok::<(), anyhow::Error>(())
/// ```
#[derive(Debug)]
pub struct Config {
    config_dir: String,
    path: String,
    data: Mutex<Value>,
}

impl Clone for Config {
    fn clone(&self) -> Self {
        Self {
            config_dir: self.config_dir.clone(),
            path: self.path.clone(),
            data: Mutex::new(self.data.lock().clone()),
        }
    }
}

impl Config {
    /// Finds a config directory by trying different locations in order
    fn find_config_dir(directory: &str) -> String {
        // 1. Try provided directory
        if !directory.is_empty() {
            return directory.to_string();
        }

        // 2. Try environment variable
        if let Ok(env_path) = env::var(ENV_CONFIG_DIR) {
            info!(env_var = ENV_CONFIG_DIR, path = %env_path, "Trying to load config from env");
            return env_path;
        }

        // 3. Try current directory
        if Path::new(CONFIG_DIR_NAME).exists() {
            return CONFIG_DIR_NAME.to_string();
        }

        // 4. Try home directory
        if let Some(home) = home_dir() {
            let home_config = home.join(CONFIG_DIR_NAME);
            if home_config.exists() {
                return home_config.to_string_lossy().to_string();
            }
        }

        CONFIG_DIR_NAME.to_string()
    }

    /// Validates and prepares a config directory
    fn validate_config_dir(path: &Path) -> Result<()> {
        if !path.exists() {
            fs::create_dir_all(path)
                .with_context(|| format!("Cannot create config directory {}", path.display()))?;
        }

        if !path.is_dir() {
            return Err(anyhow!("{} is not a directory", path.display()));
        }

        // Test write permission
        let test_file = path.join(".write_test");
        fs::write(&test_file, b"test")?;
        fs::remove_file(&test_file)?;

        fs::read_dir(path)?;

        Ok(())
    }

    /// Configuration directory, created and checked for write access
    ///
    /// First match wins:
    /// 1. `directory`, when not empty
    /// 2. The `CELINE_CONFIG` environment variable
    /// 3. `.celine` in the current directory
    /// 4. `.celine` in the user's home directory
    pub fn config_dir(directory: &str) -> Result<String> {
        let dir_path = Self::find_config_dir(directory);
        Self::validate_config_dir(Path::new(&dir_path))?;
        Ok(dir_path)
    }

    /// Load `config.yaml` from [`Config::config_dir`] over the embedded
    /// defaults, apply `CELINE_CONFIG__*` variables, then write the merged
    /// tree back.
    pub fn load_config(directory: &str) -> Result<Self> {
        Self::load_with_overrides(directory, env::vars())
    }

    fn load_with_overrides(
        directory: &str,
        vars: impl IntoIterator<Item = (String, String)>,
    ) -> Result<Self> {
        let config_dir = Self::config_dir(directory)?;
        info!(config_dir = %config_dir, "Using config directory");

        let path = Path::new(&config_dir)
            .join("config.yaml")
            .to_string_lossy()
            .to_string();

        // Keys are lower-cased on both sides before merging
        let mut config_value = lower_keys_value(serde_yaml::from_str(DEFAULT_CONFIG)?);

        match fs::read(&path) {
            Ok(data) => {
                info!(config_file = %path, "Loaded config file");
                let external_value: Value = serde_yaml::from_slice(&data)
                    .with_context(|| format!("Invalid YAML in {}", path))?;
                merge_yaml(&mut config_value, &lower_keys_value(external_value));
            }
            Err(_) => {
                info!(config_file = %path, "Config file not found, using default embedded config");
            }
        }

        apply_env_overrides(&mut config_value, vars);

        let config = Config {
            config_dir,
            path,
            data: Mutex::new(config_value),
        };

        config.save()?;
        Ok(config)
    }

    /// Directory holding `config.yaml`
    pub fn dir(&self) -> &str {
        &self.config_dir
    }

    /// Path of the persisted `config.yaml`
    pub fn file_path(&self) -> PathBuf {
        PathBuf::from(&self.path)
    }

    /// Write the whole tree to `config.yaml`
    pub fn save(&self) -> Result<()> {
        let yaml = serde_yaml::to_string(&*self.data.lock())?;
        fs::write(&self.path, yaml).with_context(|| format!("Cannot write {}", self.path))?;
        Ok(())
    }

    /// Set the value under `path` (e.g. `&["api", "base_url"]`), creating
    /// intermediate maps, and save
    pub fn set_value(&self, path: &[&str], value: Value) -> Result<()> {
        set_value_internal(&mut self.data.lock(), path, value)?;
        self.save()
    }

    /// Value under `path`; missing keys are an error
    pub fn get_value(&self, path: &[&str]) -> Result<Value> {
        get_value_internal(&self.data.lock(), path)
    }

    /// Removes the value at the specified path and saves
    ///
    /// Returns `true` when a value was removed.
    pub fn remove_value(&self, path: &[&str]) -> Result<bool> {
        let Some((last, parent)) = path.split_last() else {
            return Err(anyhow!("Cannot remove the configuration root"));
        };

        let removed = {
            let mut data = self.data.lock();
            let mut current = &mut *data;
            for key in parent {
                match current {
                    Value::Mapping(map) => match map.get_mut(Value::String(key.to_lowercase())) {
                        Some(next) => current = next,
                        None => return Ok(false),
                    },
                    _ => return Ok(false),
                }
            }
            match current {
                Value::Mapping(map) => map.remove(Value::String(last.to_lowercase())).is_some(),
                _ => false,
            }
        };

        if removed {
            self.save()?;
        }
        Ok(removed)
    }

    impl_string_config!(
        get_log_min_level,
        set_log_min_level,
        &["host", "logger", "min_level"],
        DEFAULT_LOG_MIN_LEVEL
    );

    impl_bool_config!(
        get_log_enable_console,
        set_log_enable_console,
        &["host", "logger", "enable_console"],
        DEFAULT_LOG_ENABLE_CONSOLE
    );

    impl_string_config!(
        get_api_base_url,
        set_api_base_url,
        &["api", "base_url"],
        DEFAULT_API_BASE_URL
    );

    impl_u64_config!(
        get_api_timeout_secs,
        set_api_timeout_secs,
        &["api", "timeout_secs"],
        DEFAULT_API_TIMEOUT_SECS
    );

    impl_u64_config!(
        get_update_interval_secs,
        set_update_interval_secs,
        &["coordinator", "update_interval_secs"],
        DEFAULT_UPDATE_INTERVAL_SECS
    );

    /// Custom User-Agent for the API client, `None` to keep the client default
    pub fn get_api_user_agent(&self) -> Result<Option<String>> {
        match self.get_value(&["api", "user_agent"]) {
            Ok(Value::String(s)) if !s.trim().is_empty() => Ok(Some(s)),
            _ => Ok(None),
        }
    }

    pub fn set_api_user_agent(&self, user_agent: String) -> Result<()> {
        self.set_value(&["api", "user_agent"], Value::String(user_agent))
    }
}

/// Returns the global configuration instance
///
/// The instance is lazily loaded on first access from the default directory.
pub fn get_config() -> Arc<Config> {
    CONFIG.clone()
}

fn set_value_internal(data: &mut Value, path: &[&str], value: Value) -> Result<()> {
    if path.is_empty() {
        *data = value;
        return Ok(());
    }
    if let Value::Mapping(map) = data {
        let key_value = Value::String(path[0].to_lowercase());
        if path.len() == 1 {
            map.insert(key_value, value);
        } else {
            let entry = map
                .entry(key_value)
                .or_insert(Value::Mapping(Mapping::new()));
            set_value_internal(entry, &path[1..], value)?;
        }
        Ok(())
    } else {
        Err(anyhow!("Current node is not a map"))
    }
}

fn get_value_internal(data: &Value, path: &[&str]) -> Result<Value> {
    let mut current = data;
    for (i, key) in path.iter().enumerate() {
        if let Value::Mapping(map) = current {
            match map.get(Value::String(key.to_lowercase())) {
                Some(next) => current = next,
                None => return Err(anyhow!("Path {} does not exist", path[..=i].join("."))),
            }
        } else {
            return Err(anyhow!("Path {} is not a mapping", path[..i].join(".")));
        }
    }
    Ok(current.clone())
}

fn apply_env_overrides(config: &mut Value, vars: impl IntoIterator<Item = (String, String)>) {
    for (key, value) in vars {
        if let Some(stripped) = key.strip_prefix(ENV_PREFIX) {
            let key_path = stripped.split("__").collect::<Vec<_>>();
            let yaml_value = convert_env_value(&value);
            if let Err(err) = set_value_internal(config, &key_path, yaml_value) {
                tracing::warn!(variable = %key, "Ignoring environment override: {}", err);
            }
        }
    }
}

fn convert_env_value(value: &str) -> Value {
    serde_yaml::from_str::<Value>(value).unwrap_or_else(|_| Value::String(value.to_string()))
}

fn lower_keys_value(value: Value) -> Value {
    match value {
        Value::Mapping(map) => {
            let mut new_map = Mapping::new();
            for (k, v) in map {
                let key = match k {
                    Value::String(s) => Value::String(s.to_lowercase()),
                    other => other,
                };
                new_map.insert(key, lower_keys_value(v));
            }
            Value::Mapping(new_map)
        }
        Value::Sequence(seq) => Value::Sequence(seq.into_iter().map(lower_keys_value).collect()),
        _ => value,
    }
}

/// Overlay `external` onto `default`, recursing into maps
///
/// Mappings are merged key by key; scalars and sequences from `external`
/// replace the default ones.
fn merge_yaml(default: &mut Value, external: &Value) {
    match (default, external) {
        (Value::Mapping(dmap), Value::Mapping(emap)) => {
            for (k, v) in emap {
                match dmap.get_mut(k) {
                    Some(dv) => merge_yaml(dv, v),
                    None => {
                        dmap.insert(k.clone(), v.clone());
                    }
                }
            }
        }
        (d, e) => *d = e.clone(),
    }
}
