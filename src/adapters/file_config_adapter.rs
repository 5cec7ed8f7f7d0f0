//! INI file configuration adapter.

use std::path::Path;

use configparser::ini::Ini;

use crate::domain::bar::Adjust;
use crate::domain::error::ScreenerError;
use crate::ports::config_port::ConfigPort;

#[derive(Debug)]
pub struct FileConfigAdapter {
    config: Ini,
}

impl FileConfigAdapter {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ScreenerError> {
        let mut config = Ini::new();
        config
            .load(&path)
            .map_err(|e| ScreenerError::ConfigParse {
                file: path.as_ref().display().to_string(),
                reason: e,
            })?;
        Ok(Self { config })
    }

    pub fn from_string(content: &str) -> Result<Self, ScreenerError> {
        let mut config = Ini::new();
        config
            .read(content.to_string())
            .map_err(|reason| ScreenerError::ConfigParse {
                file: "<inline>".to_string(),
                reason,
            })?;
        Ok(Self { config })
    }

    fn parse_bool(value: &str) -> Option<bool> {
        match value.to_lowercase().as_str() {
            "true" | "yes" | "1" => Some(true),
            "false" | "no" | "0" => Some(false),
            _ => None,
        }
    }
}

impl ConfigPort for FileConfigAdapter {
    fn get_string(&self, section: &str, key: &str) -> Option<String> {
        self.config.get(section, key)
    }

    fn get_int(&self, section: &str, key: &str, default: i64) -> i64 {
        self.config
            .getint(section, key)
            .ok()
            .flatten()
            .unwrap_or(default)
    }

    fn get_double(&self, section: &str, key: &str, default: f64) -> f64 {
        self.config
            .getfloat(section, key)
            .ok()
            .flatten()
            .unwrap_or(default)
    }

    fn get_bool(&self, section: &str, key: &str, default: bool) -> bool {
        self.config
            .get(section, key)
            .as_ref()
            .and_then(|v| Self::parse_bool(v))
            .unwrap_or(default)
    }
}

/// Typed view of the `[screen]` section.
#[derive(Debug, Clone)]
pub struct ScreenConfig {
    pub adjust: Adjust,
    pub lookback_days: u64,
    pub rules_dir: String,
    pub retention_days: i64,
}

impl ScreenConfig {
    pub fn from_config(config: &dyn ConfigPort) -> Result<Self, ScreenerError> {
        let adjust_raw = config
            .get_string("screen", "adjust")
            .unwrap_or_else(|| "qfq".to_string());
        let adjust = Adjust::parse(&adjust_raw).ok_or_else(|| ScreenerError::ConfigInvalid {
            section: "screen".to_string(),
            key: "adjust".to_string(),
            reason: format!("expected qfq, hfq or raw, got {adjust_raw}"),
        })?;
        let lookback_days = config.get_int("screen", "lookback_days", 450);
        if lookback_days <= 0 {
            return Err(ScreenerError::ConfigInvalid {
                section: "screen".to_string(),
                key: "lookback_days".to_string(),
                reason: format!("must be positive, got {lookback_days}"),
            });
        }
        let rules_dir = config
            .get_string("screen", "rules_dir")
            .ok_or_else(|| ScreenerError::ConfigMissing {
                section: "screen".to_string(),
                key: "rules_dir".to_string(),
            })?;
        Ok(Self {
            adjust,
            lookback_days: lookback_days as u64,
            rules_dir,
            retention_days: config.get_int("screen", "retention_days", 30),
        })
    }
}
