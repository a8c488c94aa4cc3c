//! Application configuration
//!
//! Loaded from a TOML file (`~/.config/ev-booking/config.toml` by default,
//! overridable with `EVBOOK_CONFIG`). A missing file yields defaults.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::slot::SlotGridSettings;
use crate::domain::station::{ChargerSpec, Station};
use crate::shared::errors::InfraError;

pub const CONFIG_ENV_VAR: &str = "EVBOOK_CONFIG";

/// Default config file location
pub fn default_config_path() -> PathBuf {
    dirs_next::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("ev-booking")
        .join("config.toml")
}

/// Config path from `EVBOOK_CONFIG`, falling back to the default location
pub fn config_path_from_env() -> PathBuf {
    std::env::var(CONFIG_ENV_VAR)
        .map(PathBuf::from)
        .unwrap_or_else(|_| default_config_path())
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseSection,
    pub logging: LoggingConfig,
    pub booking: BookingConfig,
    pub payment: PaymentConfig,
    pub stations: Vec<StationConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub api_host: String,
    pub api_port: u16,
    /// Seconds to wait for in-flight work on shutdown
    pub shutdown_timeout: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            api_host: "0.0.0.0".to_string(),
            api_port: 8080,
            shutdown_timeout: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseSection {
    /// SeaORM connection URL, or `memory` for the in-process store
    pub url: String,
}

impl Default for DatabaseSection {
    fn default() -> Self {
        Self {
            url: "sqlite://./evbook.db?mode=rwc".to_string(),
        }
    }
}

impl DatabaseSection {
    pub fn is_memory(&self) -> bool {
        self.url.eq_ignore_ascii_case("memory")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BookingConfig {
    pub open_hour: u32,
    /// Start hour of the last bucket of the day
    pub close_hour: u32,
    pub slot_minutes: u32,
    pub advance_days: i64,
    pub pending_payment_ttl_minutes: i64,
    pub expiry_check_interval_secs: u64,
    pub utc_offset_minutes: i32,
}

impl Default for BookingConfig {
    fn default() -> Self {
        Self {
            open_hour: 6,
            close_hour: 22,
            slot_minutes: 60,
            advance_days: 7,
            pending_payment_ttl_minutes: 15,
            expiry_check_interval_secs: 60,
            utc_offset_minutes: 0,
        }
    }
}

impl BookingConfig {
    pub fn grid_settings(&self) -> SlotGridSettings {
        SlotGridSettings {
            open_hour: self.open_hour,
            close_hour: self.close_hour,
            slot_minutes: self.slot_minutes,
            advance_days: self.advance_days,
            utc_offset_minutes: self.utc_offset_minutes,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentMode {
    #[default]
    Sandbox,
    Khalti,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PaymentConfig {
    pub mode: PaymentMode,
    pub base_url: String,
    pub secret_key: Option<String>,
    pub return_url: String,
    pub website_url: String,
    pub timeout_secs: u64,
    /// Default window of the "just paid" feed
    pub recent_window_minutes: i64,
}

impl Default for PaymentConfig {
    fn default() -> Self {
        Self {
            mode: PaymentMode::Sandbox,
            base_url: "https://dev.khalti.com/api/v2".to_string(),
            secret_key: None,
            return_url: "http://localhost:8080/payment/callback".to_string(),
            website_url: "http://localhost:8080".to_string(),
            timeout_secs: 30,
            recent_window_minutes: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StationConfig {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub price_per_slot_npr: Option<Decimal>,
    #[serde(default)]
    pub chargers: Vec<ChargerConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChargerConfig {
    pub charger_type: String,
    pub slots: u32,
}

impl From<&StationConfig> for Station {
    fn from(cfg: &StationConfig) -> Self {
        Station {
            id: cfg.id.clone(),
            name: cfg.name.clone(),
            price_per_slot_npr: cfg.price_per_slot_npr,
            chargers: cfg
                .chargers
                .iter()
                .map(|c| ChargerSpec {
                    charger_type: c.charger_type.clone(),
                    slots: c.slots,
                })
                .collect(),
        }
    }
}

impl AppConfig {
    /// Load config from `path`; a missing file yields defaults.
    pub fn load(path: &Path) -> Result<Self, InfraError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path)
            .map_err(|e| InfraError::Config(format!("cannot read {}: {}", path.display(), e)))?;
        Self::from_toml(&raw)
    }

    pub fn from_toml(raw: &str) -> Result<Self, InfraError> {
        let cfg: AppConfig = toml::from_str(raw)
            .map_err(|e| InfraError::Config(format!("invalid config: {}", e)))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Write config to `path`, creating parent directories.
    pub fn save(&self, path: &Path) -> Result<(), InfraError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| InfraError::Config(format!("cannot create {}: {}", parent.display(), e)))?;
        }
        let raw = toml::to_string_pretty(self)
            .map_err(|e| InfraError::Config(format!("cannot serialize config: {}", e)))?;
        std::fs::write(path, raw)
            .map_err(|e| InfraError::Config(format!("cannot write {}: {}", path.display(), e)))
    }

    pub fn validate(&self) -> Result<(), InfraError> {
        let b = &self.booking;
        if b.open_hour >= b.close_hour || b.close_hour > 23 {
            return Err(InfraError::Config(format!(
                "booking hours must satisfy open_hour < close_hour <= 23 (got {}..{})",
                b.open_hour, b.close_hour
            )));
        }
        if b.slot_minutes == 0 || (24 * 60) % b.slot_minutes != 0 {
            return Err(InfraError::Config(format!(
                "slot_minutes must divide a day evenly (got {})",
                b.slot_minutes
            )));
        }
        if b.advance_days <= 0 {
            return Err(InfraError::Config("advance_days must be positive".into()));
        }
        if b.pending_payment_ttl_minutes <= 0 || b.expiry_check_interval_secs == 0 {
            return Err(InfraError::Config(
                "pending payment ttl and expiry interval must be positive".into(),
            ));
        }

        let p = &self.payment;
        if p.mode == PaymentMode::Khalti
            && p.secret_key.as_deref().map_or(true, |k| k.trim().is_empty())
        {
            return Err(InfraError::Config("payment.secret_key is required in khalti mode".into()));
        }
        if p.timeout_secs == 0 {
            return Err(InfraError::Config("payment.timeout_secs must be positive".into()));
        }

        let mut seen = HashSet::new();
        for station in &self.stations {
            if !seen.insert(station.id.as_str()) {
                return Err(InfraError::Config(format!("duplicate station id '{}'", station.id)));
            }
            if let Some(price) = station.price_per_slot_npr {
                if price <= Decimal::ZERO {
                    return Err(InfraError::Config(format!(
                        "station '{}' has a non-positive price",
                        station.id
                    )));
                }
            }
            for charger in &station.chargers {
                if charger.slots == 0 {
                    return Err(InfraError::Config(format!(
                        "charger '{}' of station '{}' has zero slots",
                        charger.charger_type, station.id
                    )));
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_gives_defaults() {
        let cfg = AppConfig::from_toml("").unwrap();
        assert_eq!(cfg.server.api_port, 8080);
        assert_eq!(cfg.booking.open_hour, 6);
        assert_eq!(cfg.booking.close_hour, 22);
        assert_eq!(cfg.payment.mode, PaymentMode::Sandbox);
        assert!(cfg.stations.is_empty());
    }

    #[test]
    fn parses_stations() {
        let cfg = AppConfig::from_toml(
            r#"
            [booking]
            slot_minutes = 30

            [[stations]]
            id = "S1"
            name = "Thamel"
            price_per_slot_npr = "5.00"

            [[stations.chargers]]
            charger_type = "Type2"
            slots = 2
            "#,
        )
        .unwrap();
        assert_eq!(cfg.booking.slot_minutes, 30);
        let station = Station::from(&cfg.stations[0]);
        assert_eq!(station.price_per_slot_npr, Some(Decimal::new(500, 2)));
        assert_eq!(station.charger("type2").map(|c| c.slots), Some(2));
    }

    #[test]
    fn rejects_bad_grid_and_missing_secret() {
        assert!(AppConfig::from_toml("[booking]\nslot_minutes = 7").is_err());
        assert!(AppConfig::from_toml("[booking]\nopen_hour = 22\nclose_hour = 6").is_err());
        assert!(AppConfig::from_toml("[payment]\nmode = \"khalti\"").is_err());
    }

    #[test]
    fn rejects_duplicate_stations() {
        let raw = r#"
            [[stations]]
            id = "S1"
            name = "A"
            [[stations]]
            id = "S1"
            name = "B"
        "#;
        assert!(AppConfig::from_toml(raw).is_err());
    }
}
