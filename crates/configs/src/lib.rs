use anyhow::Result;
use serde::Deserialize;
use anyhow::anyhow;
use std::time::Duration;

/// Environment variable that overrides `signal.store_path`.
pub const STORE_PATH_ENV: &str = "DOTENV_SYNC_STORE";

#[derive(Debug, Clone, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub signal: SignalConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Settings shared by the master and minion processes.
#[derive(Debug, Clone, Deserialize)]
pub struct SignalConfig {
    #[serde(default = "default_store_path")]
    pub store_path: String,
    #[serde(default = "default_threshold")]
    pub threshold: u64,
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,
    #[serde(default = "default_tick_interval")]
    pub tick_interval_ms: u64,
}

impl Default for SignalConfig {
    fn default() -> Self {
        Self {
            store_path: default_store_path(),
            threshold: default_threshold(),
            poll_interval_ms: default_poll_interval(),
            tick_interval_ms: default_tick_interval(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct LoggingConfig {
    #[serde(default)]
    pub json: bool,
}

fn default_store_path() -> String { ".my_variables".into() }
fn default_threshold() -> u64 { 100 }
fn default_poll_interval() -> u64 { 10 }
fn default_tick_interval() -> u64 { 100 }

pub fn config_path() -> String {
    std::env::var("CONFIG_PATH").unwrap_or_else(|_| "config.toml".to_string())
}

pub fn load_default() -> Result<AppConfig> {
    load_from_file(&config_path())
}

pub fn load_from_file(path: &str) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path)?;
    parse(&content)
}

pub fn parse(content: &str) -> Result<AppConfig> {
    let cfg: AppConfig = toml::from_str(content)?;
    Ok(cfg)
}

impl AppConfig {
    /// Load `CONFIG_PATH` (or `config.toml`), falling back to defaults when the
    /// file does not exist, then normalize and validate.
    pub fn load_or_default() -> Result<Self> {
        let path = config_path();
        let mut cfg = if std::path::Path::new(&path).exists() {
            load_from_file(&path)?
        } else {
            AppConfig::default()
        };
        cfg.normalize_and_validate()?;
        Ok(cfg)
    }

    pub fn normalize_and_validate(&mut self) -> Result<()> {
        self.signal.normalize_from_env();
        self.signal.validate()
    }
}

impl SignalConfig {
    pub fn normalize_from_env(&mut self) {
        if let Ok(path) = std::env::var(STORE_PATH_ENV) {
            if !path.trim().is_empty() {
                self.store_path = path;
            }
        }
        self.store_path = self.store_path.trim().to_string();
    }

    pub fn validate(&self) -> Result<()> {
        if self.store_path.is_empty() {
            return Err(anyhow!("signal.store_path is empty; set it in config.toml or {STORE_PATH_ENV}"));
        }
        if self.poll_interval_ms == 0 || self.tick_interval_ms == 0 {
            return Err(anyhow!("signal intervals must be positive milliseconds"));
        }
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_config_uses_defaults() {
        let cfg = parse("").expect("parse");
        assert_eq!(cfg.signal.store_path, ".my_variables");
        assert_eq!(cfg.signal.threshold, 100);
        assert_eq!(cfg.signal.poll_interval(), Duration::from_millis(10));
        assert_eq!(cfg.signal.tick_interval(), Duration::from_millis(100));
        assert!(!cfg.logging.json);
    }

    #[test]
    fn partial_signal_section() {
        let cfg = parse("[signal]\nthreshold = 5\n\n[logging]\njson = true\n").expect("parse");
        assert_eq!(cfg.signal.threshold, 5);
        assert_eq!(cfg.signal.store_path, ".my_variables");
        assert!(cfg.logging.json);
    }

    #[test]
    fn validation_rejects_zero_interval_and_blank_path() {
        let mut cfg = parse("[signal]\npoll_interval_ms = 0\n").expect("parse");
        assert!(cfg.signal.validate().is_err());

        cfg.signal.poll_interval_ms = 10;
        cfg.signal.store_path = "   ".into();
        cfg.signal.store_path = cfg.signal.store_path.trim().to_string();
        assert!(cfg.signal.validate().is_err());
    }
}
