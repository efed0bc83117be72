//! Front end configuration: `formedit.yaml` plus environment overrides.

use crate::theme::ThemeMode;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

pub const CONFIG_FILE: &str = "formedit.yaml";

/// Log file used when the config names none, placed in the settings directory.
pub const DEFAULT_LOG_FILE: &str = "formedit.log";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("reading {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("parsing {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("invalid config value for {key}: {message}")]
    Invalid { key: &'static str, message: String },
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    /// Log file path; relative paths resolve against the settings directory,
    /// which also holds [`DEFAULT_LOG_FILE`] when this is unset.
    pub log_file: Option<PathBuf>,
    pub log_filter: String,
    pub tick_ms: u64,
    /// Relative widths of the defaults and user panes.
    pub sizes: [f64; 2],
    pub theme: ThemeMode,
    /// Draw to an off-screen buffer and print a summary instead of running
    /// interactively. Only set from the environment.
    #[serde(skip)]
    pub headless: bool,
    #[serde(skip)]
    pub headless_ticks: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            log_file: None,
            log_filter: "info".into(),
            tick_ms: 200,
            sizes: [1.0, 1.0],
            theme: ThemeMode::default(),
            headless: false,
            headless_ticks: 3,
        }
    }
}

fn truthy(v: &str) -> bool {
    matches!(v.trim(), "1" | "true" | "yes" | "on")
}

impl AppConfig {
    /// Load from `FORMEDIT_CONFIG` if set, else `formedit.yaml` in
    /// `settings_dir`. A missing file gives defaults.
    pub fn load(settings_dir: Option<&Path>) -> Result<Self, ConfigError> {
        Self::load_with(settings_dir, |k| std::env::var(k).ok())
    }

    pub fn load_with(
        settings_dir: Option<&Path>,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let explicit = env("FORMEDIT_CONFIG").map(PathBuf::from);
        let path = explicit
            .clone()
            .or_else(|| settings_dir.map(|d| d.join(CONFIG_FILE)));
        let mut cfg = match &path {
            Some(p) if explicit.is_some() || p.exists() => Self::from_file(p)?,
            _ => Self::default(),
        };
        if let Some(dir) = settings_dir {
            let log = cfg.log_file.take().unwrap_or_else(|| PathBuf::from(DEFAULT_LOG_FILE));
            cfg.log_file = Some(if log.is_relative() { dir.join(log) } else { log });
        }
        if let Some(filter) = env("FORMEDIT_LOG") {
            cfg.log_filter = filter;
        }
        if let Some(h) = env("FORMEDIT_HEADLESS") {
            cfg.headless = truthy(&h);
        }
        if let Some(t) = env("FORMEDIT_TICKS") {
            cfg.headless_ticks = t.trim().parse().map_err(|_| ConfigError::Invalid {
                key: "FORMEDIT_TICKS",
                message: format!("expected a tick count, got {t:?}"),
            })?;
        }
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let s = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        if s.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(&s).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.tick_ms == 0 {
            return Err(ConfigError::Invalid {
                key: "tick_ms",
                message: "must be positive".into(),
            });
        }
        let [a, b] = self.sizes;
        if !(a.is_finite() && b.is_finite() && a >= 0.0 && b >= 0.0 && a + b > 0.0) {
            return Err(ConfigError::Invalid {
                key: "sizes",
                message: format!("expected two non-negative widths, got [{a}, {b}]"),
            });
        }
        Ok(())
    }
}
