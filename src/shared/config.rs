use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub storage: StorageConfig,
    pub network: NetworkConfig,
    pub sync: SyncConfig,
    pub cache: CacheConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub database_url: String,
    pub max_connections: u32,
    pub queue_key: String,
    pub cache_key: String,
    pub dead_letter_key: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// 定期的な接続確認の間隔 (秒)
    pub probe_interval_secs: u64,
    pub event_buffer: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    pub auto_sync: bool,
    pub max_attempts: u32,
    pub event_buffer: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    pub max_age_minutes: i64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            storage: StorageConfig {
                database_url: default_database_url(),
                max_connections: 1,
                queue_key: "offline.action_queue".to_string(),
                cache_key: "offline.result_cache".to_string(),
                dead_letter_key: "offline.dead_letters".to_string(),
            },
            network: NetworkConfig {
                probe_interval_secs: 30,
                event_buffer: 32,
            },
            sync: SyncConfig {
                auto_sync: true,
                max_attempts: 3,
                event_buffer: 64,
            },
            cache: CacheConfig {
                max_age_minutes: 30,
            },
        }
    }
}

fn default_database_url() -> String {
    let dir = dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("pickup-sync");
    format!("sqlite:{}?mode=rwc", dir.join("offline.db").display())
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// 数値として解釈できない値や範囲外の値は無視して既定値を残す
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut cfg = Self::default();
        let number = |name: &str| lookup(name).and_then(|v| parse_u64(&v));

        if let Some(v) = lookup("PICKUP_SYNC_DATABASE_URL") {
            let trimmed = v.trim();
            if !trimmed.is_empty() {
                cfg.storage.database_url = trimmed.to_string();
            }
        }
        if let Some(v) = lookup("PICKUP_SYNC_AUTO_SYNC") {
            cfg.sync.auto_sync = parse_bool(&v, cfg.sync.auto_sync);
        }
        if let Some(value) = number("PICKUP_SYNC_MAX_ATTEMPTS").and_then(|v| u32::try_from(v).ok()) {
            cfg.sync.max_attempts = value.max(1);
        }
        if let Some(value) = number("PICKUP_SYNC_PROBE_INTERVAL_SECS") {
            cfg.network.probe_interval_secs = value;
        }
        if let Some(value) =
            number("PICKUP_SYNC_CACHE_MAX_AGE_MINUTES").and_then(|v| i64::try_from(v).ok())
        {
            cfg.cache.max_age_minutes = value;
        }

        cfg
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.storage.max_connections == 0 {
            return Err("Storage max_connections must be greater than 0".to_string());
        }
        if self.sync.max_attempts == 0 {
            return Err("Sync max_attempts must be greater than 0".to_string());
        }
        if self.network.probe_interval_secs == 0 {
            return Err("Network probe_interval_secs must be greater than 0".to_string());
        }
        if self.sync.event_buffer == 0 || self.network.event_buffer == 0 {
            return Err("Event buffers must be greater than 0".to_string());
        }
        let keys = [
            &self.storage.queue_key,
            &self.storage.cache_key,
            &self.storage.dead_letter_key,
        ];
        if keys.iter().any(|key| key.trim().is_empty()) {
            return Err("Storage keys cannot be empty".to_string());
        }
        if keys[0] == keys[1] || keys[0] == keys[2] || keys[1] == keys[2] {
            return Err("Storage keys must be distinct".to_string());
        }
        if self.cache.max_age_minutes < 0 {
            return Err("Cache max_age_minutes cannot be negative".to_string());
        }
        Ok(())
    }
}

fn parse_bool(s: &str, default: bool) -> bool {
    match s.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => true,
        "0" | "false" | "no" | "off" => false,
        _ => default,
    }
}

fn parse_u64(value: &str) -> Option<u64> {
    value.trim().parse::<u64>().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn default_config_is_valid() {
        let cfg = AppConfig::default();
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.sync.max_attempts, 3);
        assert!(cfg.storage.database_url.starts_with("sqlite:"));
    }

    #[test]
    fn validate_rejects_shared_store_keys() {
        let mut cfg = AppConfig::default();
        cfg.storage.cache_key = cfg.storage.queue_key.clone();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn validate_rejects_zero_attempts() {
        let mut cfg = AppConfig::default();
        cfg.sync.max_attempts = 0;
        assert_eq!(
            cfg.validate().unwrap_err(),
            "Sync max_attempts must be greater than 0"
        );
    }

    #[test]
    fn parse_bool_falls_back_to_default() {
        assert!(parse_bool("YES", false));
        assert!(!parse_bool("off", true));
        assert!(parse_bool("maybe", true));
    }

    fn lookup_from(pairs: &[(&str, &str)]) -> AppConfig {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn from_lookup_reads_overrides() {
        let cfg = lookup_from(&[
            ("PICKUP_SYNC_DATABASE_URL", " sqlite::memory: "),
            ("PICKUP_SYNC_AUTO_SYNC", "off"),
            ("PICKUP_SYNC_MAX_ATTEMPTS", "5"),
            ("PICKUP_SYNC_CACHE_MAX_AGE_MINUTES", "90"),
        ]);
        assert_eq!(cfg.storage.database_url, "sqlite::memory:");
        assert!(!cfg.sync.auto_sync);
        assert_eq!(cfg.sync.max_attempts, 5);
        assert_eq!(cfg.cache.max_age_minutes, 90);
    }

    #[test]
    fn from_lookup_ignores_out_of_range_numbers() {
        let cfg = lookup_from(&[
            ("PICKUP_SYNC_MAX_ATTEMPTS", "4294967296"),
            ("PICKUP_SYNC_CACHE_MAX_AGE_MINUTES", "9223372036854775808"),
            ("PICKUP_SYNC_PROBE_INTERVAL_SECS", "soon"),
        ]);
        assert_eq!(cfg.sync.max_attempts, 3);
        assert_eq!(cfg.cache.max_age_minutes, 30);
        assert_eq!(cfg.network.probe_interval_secs, 30);
        assert!(cfg.validate().is_ok());
    }
}
