//! Process-wide application configuration (spec §6.4 knobs).
//!
//! Named `AppConfig` to avoid clashing with the per-race `CrosswordRaceConfig`/
//! `WordleRaceConfig` data (spec §4.4/§4.5). Grounded on the teacher's
//! `config::Config::load`/`load_or_default`/`default_path` (TOML + `dirs`),
//! with an env-override layer added the way `ai::llm::get_api_key` reads
//! provider credentials straight from the process environment via `dotenvy`.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

const ENV_PREFIX: &str = "RACEWORD_";

/// §6.4 knobs plus process-level server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Cap on how many models a caller may race at once when unrestricted
    /// mode is off.
    #[serde(default = "default_public_max_models")]
    pub public_max_models: usize,

    #[serde(default)]
    pub unrestricted_mode: bool,

    #[serde(default = "default_max_tokens_crossword")]
    pub default_max_tokens_crossword: u32,

    #[serde(default = "default_max_tokens_wordle")]
    pub default_max_tokens_wordle: u32,

    #[serde(default = "default_timeout_ms_crossword")]
    pub default_timeout_ms_crossword: u64,

    #[serde(default = "default_timeout_ms_wordle")]
    pub default_timeout_ms_wordle: u64,

    #[serde(default = "default_speed_bonus_threshold_ms")]
    pub speed_bonus_threshold_ms: u64,

    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
}

fn default_public_max_models() -> usize {
    8
}
fn default_max_tokens_crossword() -> u32 {
    16
}
fn default_max_tokens_wordle() -> u32 {
    10
}
fn default_timeout_ms_crossword() -> u64 {
    4000
}
fn default_timeout_ms_wordle() -> u64 {
    10_000
}
fn default_speed_bonus_threshold_ms() -> u64 {
    250
}
fn default_bind_addr() -> String {
    "127.0.0.1:8787".to_string()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            public_max_models: default_public_max_models(),
            unrestricted_mode: false,
            default_max_tokens_crossword: default_max_tokens_crossword(),
            default_max_tokens_wordle: default_max_tokens_wordle(),
            default_timeout_ms_crossword: default_timeout_ms_crossword(),
            default_timeout_ms_wordle: default_timeout_ms_wordle(),
            speed_bonus_threshold_ms: default_speed_bonus_threshold_ms(),
            bind_addr: default_bind_addr(),
        }
    }
}

impl AppConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;
        let config: AppConfig =
            toml::from_str(&contents).with_context(|| format!("failed to parse config file: {}", path.display()))?;
        Ok(config)
    }

    /// `$XDG_CONFIG_HOME/raceword/config.toml` (or the platform equivalent
    /// via `dirs::config_dir`).
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("raceword").join("config.toml"))
    }

    /// Loads `.env` (if present), then the TOML config at `default_path` (if
    /// present), then applies `RACEWORD_*` env overrides on top. Never fails
    /// on a missing config file — falls back to defaults.
    pub fn load_or_default() -> Self {
        let _ = dotenvy::dotenv();

        let mut config = match Self::default_path() {
            Some(path) if path.exists() => Self::load(&path).unwrap_or_default(),
            _ => Self::default(),
        };
        config.apply_env_overrides();
        config
    }

    fn apply_env_overrides(&mut self) {
        if let Some(v) = env_usize("PUBLIC_MAX_MODELS") {
            self.public_max_models = v;
        }
        if let Some(v) = env_bool("UNRESTRICTED_MODE") {
            self.unrestricted_mode = v;
        }
        if let Some(v) = env_u32("DEFAULT_MAX_TOKENS_CROSSWORD") {
            self.default_max_tokens_crossword = v;
        }
        if let Some(v) = env_u32("DEFAULT_MAX_TOKENS_WORDLE") {
            self.default_max_tokens_wordle = v;
        }
        if let Some(v) = env_u64("DEFAULT_TIMEOUT_MS_CROSSWORD") {
            self.default_timeout_ms_crossword = v;
        }
        if let Some(v) = env_u64("DEFAULT_TIMEOUT_MS_WORDLE") {
            self.default_timeout_ms_wordle = v;
        }
        if let Some(v) = env_u64("SPEED_BONUS_THRESHOLD_MS") {
            self.speed_bonus_threshold_ms = v;
        }
        if let Ok(v) = std::env::var(format!("{ENV_PREFIX}BIND_ADDR")) {
            self.bind_addr = v;
        }
    }
}

fn env_var(suffix: &str) -> Option<String> {
    std::env::var(format!("{ENV_PREFIX}{suffix}")).ok()
}

fn env_usize(suffix: &str) -> Option<usize> {
    env_var(suffix).and_then(|v| v.parse().ok())
}
fn env_u32(suffix: &str) -> Option<u32> {
    env_var(suffix).and_then(|v| v.parse().ok())
}
fn env_u64(suffix: &str) -> Option<u64> {
    env_var(suffix).and_then(|v| v.parse().ok())
}
fn env_bool(suffix: &str) -> Option<bool> {
    env_var(suffix).and_then(|v| v.parse().ok())
}
