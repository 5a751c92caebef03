use crate::core::MiningMode;
use crate::error::{BlockchainError, Result};
use log::warn;
use once_cell::sync::Lazy;
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

pub static GLOBAL_CONFIG: Lazy<Config> = Lazy::new(Config::new);

static DEFAULT_DB_PATH: &str = "data/blocks";
static DEFAULT_CONFIG_FILE: &str = "ledger.toml";

const CONFIG_FILE_KEY: &str = "LEDGER_CONFIG";
const DB_PATH_KEY: &str = "LEDGER_DB_PATH";
const MINING_MODE_KEY: &str = "LEDGER_MINING_MODE";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    pub db_path: PathBuf,
    pub mining_mode: MiningMode,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            db_path: PathBuf::from(DEFAULT_DB_PATH),
            mining_mode: MiningMode::default(),
        }
    }
}

impl Settings {
    /// Apply overrides on top of the current values; `None` leaves a value alone.
    pub fn apply_overrides(
        &mut self,
        db_path: Option<String>,
        mining_mode: Option<String>,
    ) -> Result<()> {
        if let Some(path) = db_path.filter(|path| !path.is_empty()) {
            self.db_path = PathBuf::from(path);
        }
        if let Some(mode) = mining_mode {
            self.mining_mode = mode.parse()?;
        }
        Ok(())
    }
}

pub struct Config {
    inner: RwLock<Settings>,
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

impl Config {
    pub fn new() -> Config {
        let mut settings = Settings::default();

        if let Some(path) = Self::config_file() {
            match Self::load_file(&path) {
                Ok(loaded) => settings = loaded,
                Err(e) => warn!("Ignoring config file {}: {e}", path.display()),
            }
        }

        if let Err(e) =
            settings.apply_overrides(env::var(DB_PATH_KEY).ok(), env::var(MINING_MODE_KEY).ok())
        {
            warn!("Ignoring environment override: {e}");
        }

        Config::with_settings(settings)
    }

    pub fn with_settings(settings: Settings) -> Config {
        Config {
            inner: RwLock::new(settings),
        }
    }

    // LEDGER_CONFIG wins; otherwise ./ledger.toml is used when present.
    fn config_file() -> Option<PathBuf> {
        if let Ok(path) = env::var(CONFIG_FILE_KEY) {
            return Some(PathBuf::from(path));
        }
        let default = PathBuf::from(DEFAULT_CONFIG_FILE);
        default.exists().then_some(default)
    }

    pub fn load_file(path: &Path) -> Result<Settings> {
        let contents = fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    pub fn from_toml_str(contents: &str) -> Result<Settings> {
        toml::from_str(contents)
            .map_err(|e| BlockchainError::Config(format!("Invalid config file: {e}")))
    }

    pub fn get_db_path(&self) -> PathBuf {
        let inner = self
            .inner
            .read()
            .expect("Failed to acquire read lock on config - this should never happen");
        inner.db_path.clone()
    }

    pub fn set_db_path(&self, path: PathBuf) {
        let mut inner = self
            .inner
            .write()
            .expect("Failed to acquire write lock on config - this should never happen");
        inner.db_path = path;
    }

    pub fn get_mining_mode(&self) -> MiningMode {
        let inner = self
            .inner
            .read()
            .expect("Failed to acquire read lock on config - this should never happen");
        inner.mining_mode
    }

    pub fn set_mining_mode(&self, mode: MiningMode) {
        let mut inner = self
            .inner
            .write()
            .expect("Failed to acquire write lock on config - this should never happen");
        inner.mining_mode = mode;
    }
}
