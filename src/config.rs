//! Configuration management for druid-exporter.
//!
//! This module handles loading, merging, and validating configuration from files
//! and CLI arguments. It supports YAML, JSON, and TOML formats.

use crate::cli::{Args, ConfigFormat, LogLevel};
use clap::ValueEnum;
use druid_exporter::client::normalize_base_url;
use druid_exporter::Credentials;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

// Default configuration constants
pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_DRUID_URI: &str = "http://localhost:8888";
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_DNS_CACHE_TTL_SECS: u64 = 300;
pub const DEFAULT_DNS_CACHE_CLEANUP_SECS: u64 = 600;
pub const DEFAULT_DNS_TIMEOUT_SECS: u64 = 2;

// Upper bounds accepted by validation
pub const MAX_REQUEST_TIMEOUT_SECS: u64 = 3600;
pub const MAX_DNS_CACHE_TTL_SECS: u64 = 7 * 24 * 3600;
pub const MAX_DNS_CACHE_CLEANUP_SECS: u64 = 7 * 24 * 3600;
pub const MAX_DNS_TIMEOUT_SECS: u64 = 300;

/// Exporter configuration. Every field is optional; unset fields use the defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    // Server configuration
    pub port: Option<u16>,
    pub bind: Option<String>,

    // Druid connection
    #[serde(alias = "druid-uri")]
    pub druid_uri: Option<String>,
    #[serde(alias = "druid-username")]
    pub druid_username: Option<String>,
    #[serde(alias = "druid-password")]
    pub druid_password: Option<String>,
    #[serde(alias = "request-timeout-secs")]
    pub request_timeout_secs: Option<u64>,

    // Reverse DNS cache
    #[serde(alias = "dns-cache-ttl-secs")]
    pub dns_cache_ttl_secs: Option<u64>,
    /// Interval of the expired-entry sweep; 0 disables it.
    #[serde(alias = "dns-cache-cleanup-secs")]
    pub dns_cache_cleanup_secs: Option<u64>,
    #[serde(alias = "dns-timeout-secs")]
    pub dns_timeout_secs: Option<u64>,

    // Feature flags
    pub enable_health: Option<bool>,
    pub enable_telemetry: Option<bool>,

    // Logging
    pub log_level: Option<String>,

    // TLS/SSL Configuration
    #[serde(alias = "enable-tls")]
    pub enable_tls: Option<bool>,
    #[serde(alias = "tls-cert-path")]
    pub tls_cert_path: Option<String>,
    #[serde(alias = "tls-key-path")]
    pub tls_key_path: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind: Some(DEFAULT_BIND_ADDR.to_string()),
            port: Some(DEFAULT_PORT),
            druid_uri: Some(DEFAULT_DRUID_URI.to_string()),
            druid_username: None,
            druid_password: None,
            request_timeout_secs: Some(DEFAULT_REQUEST_TIMEOUT_SECS),
            dns_cache_ttl_secs: Some(DEFAULT_DNS_CACHE_TTL_SECS),
            dns_cache_cleanup_secs: Some(DEFAULT_DNS_CACHE_CLEANUP_SECS),
            dns_timeout_secs: Some(DEFAULT_DNS_TIMEOUT_SECS),
            enable_health: Some(true),
            enable_telemetry: Some(true),
            log_level: Some("info".into()),
            enable_tls: Some(false),
            tls_cert_path: None,
            tls_key_path: None,
        }
    }
}

impl Config {
    pub fn druid_uri(&self) -> &str {
        self.druid_uri.as_deref().unwrap_or(DEFAULT_DRUID_URI)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(
            self.request_timeout_secs
                .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS),
        )
    }

    pub fn dns_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.dns_cache_ttl_secs.unwrap_or(DEFAULT_DNS_CACHE_TTL_SECS))
    }

    /// `None` when the periodic sweep is disabled.
    pub fn dns_cache_cleanup_interval(&self) -> Option<Duration> {
        match self
            .dns_cache_cleanup_secs
            .unwrap_or(DEFAULT_DNS_CACHE_CLEANUP_SECS)
        {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }

    pub fn dns_timeout(&self) -> Duration {
        Duration::from_secs(self.dns_timeout_secs.unwrap_or(DEFAULT_DNS_TIMEOUT_SECS))
    }

    /// Effective log level; unknown values fall back to info.
    pub fn log_level(&self) -> LogLevel {
        self.log_level
            .as_deref()
            .and_then(parse_log_level)
            .unwrap_or(LogLevel::Info)
    }

    pub fn credentials(&self) -> Option<Credentials> {
        self.druid_username.as_ref().map(|username| Credentials {
            username: username.clone(),
            password: self.druid_password.clone(),
        })
    }
}

/// Parses a log level name, ignoring case.
pub fn parse_log_level(level: &str) -> Option<LogLevel> {
    <LogLevel as ValueEnum>::from_str(level, true).ok()
}

/// Validate effective config (used by --check-config and at startup)
pub fn validate_effective_config(cfg: &Config) -> Result<(), Box<dyn std::error::Error>> {
    normalize_base_url(cfg.druid_uri())?;

    if cfg.druid_password.is_some() && cfg.druid_username.is_none() {
        return Err("druid_password is set but druid_username is not".into());
    }

    for (name, value) in [
        ("request_timeout_secs", cfg.request_timeout_secs),
        ("dns_cache_ttl_secs", cfg.dns_cache_ttl_secs),
        ("dns_timeout_secs", cfg.dns_timeout_secs),
    ] {
        if value == Some(0) {
            return Err(format!("{} must be greater than 0", name).into());
        }
    }

    for (name, value, max) in [
        ("request_timeout_secs", cfg.request_timeout_secs, MAX_REQUEST_TIMEOUT_SECS),
        ("dns_cache_ttl_secs", cfg.dns_cache_ttl_secs, MAX_DNS_CACHE_TTL_SECS),
        ("dns_cache_cleanup_secs", cfg.dns_cache_cleanup_secs, MAX_DNS_CACHE_CLEANUP_SECS),
        ("dns_timeout_secs", cfg.dns_timeout_secs, MAX_DNS_TIMEOUT_SECS),
    ] {
        if let Some(value) = value.filter(|v| *v > max) {
            return Err(format!("{} must be at most {} (got {})", name, max, value).into());
        }
    }

    if let Some(level) = cfg.log_level.as_deref() {
        if parse_log_level(level).is_none() {
            return Err(format!(
                "Invalid log_level '{}' (expected off, error, warn, info, debug or trace)",
                level
            )
            .into());
        }
    }

    if let Some(bind) = cfg.bind.as_deref() {
        if bind.parse::<std::net::IpAddr>().is_err() {
            return Err(format!("Invalid bind address '{}'", bind).into());
        }
    }

    // TLS validation
    if cfg.enable_tls.unwrap_or(false) {
        let cert_path = cfg.tls_cert_path.as_deref();
        let key_path = cfg.tls_key_path.as_deref();

        match (cert_path, key_path) {
            (None, None) => {
                return Err(
                    "TLS is enabled but neither tls_cert_path nor tls_key_path are set".into(),
                );
            }
            (Some(_), None) => {
                return Err("TLS is enabled but tls_key_path is not set".into());
            }
            (None, Some(_)) => {
                return Err("TLS is enabled but tls_cert_path is not set".into());
            }
            (Some(cert), Some(key)) => {
                check_pem_file(cert, "certificate")?;
                check_pem_file(key, "private key")?;
            }
        }
    }

    Ok(())
}

fn check_pem_file(path: &str, what: &str) -> Result<(), Box<dyn std::error::Error>> {
    if !Path::new(path).exists() {
        return Err(format!("TLS {} file not found: {}", what, path).into());
    }
    match fs::metadata(path) {
        Ok(meta) if meta.len() == 0 => Err(format!("TLS {} file is empty: {}", what, path).into()),
        Err(e) => {
            Err(format!("TLS {} file is not readable: {} ({})", what, path, e).into())
        }
        Ok(_) => Ok(()),
    }
}

/// Resolves configuration from CLI args, config file, and defaults.
/// This enforces precedence: CLI (if provided) > config file > default.
pub fn resolve_config(args: &Args) -> Result<Config, Box<dyn std::error::Error>> {
    let mut config = if args.no_config {
        Config::default()
    } else {
        load_config(args.config.as_deref())?
    };

    if let Some(bind_ip) = args.bind {
        config.bind = Some(bind_ip.to_string());
    }
    if let Some(cli_port) = args.port {
        config.port = Some(cli_port);
    }

    // Druid connection: CLI wins if provided
    if let Some(uri) = &args.druid_uri {
        config.druid_uri = Some(uri.clone());
    }
    if let Some(username) = &args.druid_username {
        config.druid_username = Some(username.clone());
    }
    if let Some(password) = &args.druid_password {
        config.druid_password = Some(password.clone());
    }
    if let Some(secs) = args.request_timeout {
        config.request_timeout_secs = Some(secs);
    }
    if let Some(secs) = args.dns_cache_ttl {
        config.dns_cache_ttl_secs = Some(secs);
    }

    // Feature flags
    if let Some(level) = args.log_level {
        config.log_level = Some(level.as_str().to_string());
    }

    if args.disable_health {
        config.enable_health = Some(false);
    }
    if args.disable_telemetry {
        config.enable_telemetry = Some(false);
    }

    // TLS configuration: CLI wins if provided
    if args.enable_tls {
        config.enable_tls = Some(true);
    }
    if let Some(cert_path) = &args.tls_cert {
        config.tls_cert_path = Some(cert_path.to_string_lossy().to_string());
    }
    if let Some(key_path) = &args.tls_key {
        config.tls_key_path = Some(key_path.to_string_lossy().to_string());
    }

    Ok(config)
}

/// Configuration loading with multiple format support.
///
/// Without an explicit path the default locations are tried in order; if none
/// exists the built-in defaults are used.
pub fn load_config(path: Option<&Path>) -> Result<Config, Box<dyn std::error::Error>> {
    let path = match path {
        Some(p) => p.to_path_buf(),
        None => {
            let defaults = [
                "/etc/druid-exporter/config.yaml",
                "/etc/druid-exporter/config.yml",
                "/etc/druid-exporter/config.json",
                "./druid-exporter.yaml",
                "./druid-exporter.yml",
                "./druid-exporter.json",
            ];

            match defaults.iter().find(|p| Path::new(p).exists()) {
                Some(p) => PathBuf::from(p),
                None => return Ok(Config::default()),
            }
        }
    };

    if !path.exists() {
        return Err(format!("Config file not found: {}", path.display()).into());
    }

    let content = fs::read_to_string(&path)?;

    match path.extension().and_then(|s| s.to_str()) {
        Some("json") => {
            let config: Config = serde_json::from_str(&content)?;
            info!("Loaded JSON configuration from: {}", path.display());
            Ok(config)
        }
        Some("toml") => {
            let config: Config = toml::from_str(&content)?;
            info!("Loaded TOML configuration from: {}", path.display());
            Ok(config)
        }
        _ => {
            // Default to YAML
            let config: Config = serde_yaml::from_str(&content)?;
            info!("Loaded YAML configuration from: {}", path.display());
            Ok(config)
        }
    }
}

/// Serializes a configuration in the requested format.
pub fn render_config(config: &Config, format: ConfigFormat) -> Result<String, Box<dyn std::error::Error>> {
    Ok(match format {
        ConfigFormat::Json => serde_json::to_string_pretty(config)?,
        ConfigFormat::Toml => toml::to_string_pretty(config)?,
        ConfigFormat::Yaml => serde_yaml::to_string(config)?,
    })
}

/// Shows configuration in requested format
pub fn show_config(config: &Config, format: ConfigFormat) -> Result<(), Box<dyn std::error::Error>> {
    let mut shown = config.clone();
    if shown.druid_password.is_some() {
        shown.druid_password = Some("********".to_string());
    }
    println!("{}", render_config(&shown, format)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use std::io::Write;
    use tempfile::Builder;

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate_effective_config(&Config::default()).is_ok());
    }

    #[test]
    fn test_password_without_username_rejected() {
        let cfg = Config {
            druid_password: Some("secret".into()),
            ..Config::default()
        };
        let err = validate_effective_config(&cfg).unwrap_err();
        assert!(err.to_string().contains("druid_username"));
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let cfg = Config {
            request_timeout_secs: Some(0),
            ..Config::default()
        };
        assert!(validate_effective_config(&cfg).is_err());
    }

    #[test]
    fn test_bad_druid_uri_rejected() {
        let cfg = Config {
            druid_uri: Some("localhost:8888".into()),
            ..Config::default()
        };
        assert!(validate_effective_config(&cfg).is_err());
    }

    #[test]
    fn test_cleanup_zero_disables_sweep() {
        let cfg = Config {
            dns_cache_cleanup_secs: Some(0),
            ..Config::default()
        };
        assert_eq!(cfg.dns_cache_cleanup_interval(), None);
        assert_eq!(
            Config::default().dns_cache_cleanup_interval(),
            Some(Duration::from_secs(DEFAULT_DNS_CACHE_CLEANUP_SECS))
        );
    }

    #[test]
    fn test_load_yaml_with_dashed_aliases() {
        let mut file = Builder::new().suffix(".yaml").tempfile().unwrap();
        writeln!(file, "druid-uri: http://router:8888").unwrap();
        writeln!(file, "dns-cache-ttl-secs: 60").unwrap();
        writeln!(file, "port: 9000").unwrap();

        let cfg = load_config(Some(file.path())).unwrap();
        assert_eq!(cfg.druid_uri(), "http://router:8888");
        assert_eq!(cfg.dns_cache_ttl(), Duration::from_secs(60));
        assert_eq!(cfg.port, Some(9000));
        // Fields absent from the file stay unset and fall back at use sites.
        assert_eq!(cfg.request_timeout(), Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS));
    }

    #[test]
    fn test_load_toml() {
        let mut file = Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "druid_uri = \"https://druid.example.com\"").unwrap();
        writeln!(file, "druid_username = \"admin\"").unwrap();

        let cfg = load_config(Some(file.path())).unwrap();
        assert_eq!(cfg.druid_uri(), "https://druid.example.com");
        let creds = cfg.credentials().unwrap();
        assert_eq!(creds.username, "admin");
        assert!(creds.password.is_none());
    }

    #[test]
    fn test_oversized_durations_rejected() {
        for cfg in [
            Config {
                dns_cache_ttl_secs: Some(u64::MAX),
                ..Config::default()
            },
            Config {
                dns_timeout_secs: Some(MAX_DNS_TIMEOUT_SECS + 1),
                ..Config::default()
            },
            Config {
                request_timeout_secs: Some(u64::MAX),
                ..Config::default()
            },
            Config {
                dns_cache_cleanup_secs: Some(u64::MAX),
                ..Config::default()
            },
        ] {
            let err = validate_effective_config(&cfg).unwrap_err();
            assert!(err.to_string().contains("must be at most"), "{}", err);
        }

        let at_limit = Config {
            dns_cache_ttl_secs: Some(MAX_DNS_CACHE_TTL_SECS),
            dns_timeout_secs: Some(MAX_DNS_TIMEOUT_SECS),
            ..Config::default()
        };
        assert!(validate_effective_config(&at_limit).is_ok());
    }

    #[test]
    fn test_log_level_from_config() {
        let cfg = Config {
            log_level: Some("DEBUG".into()),
            ..Config::default()
        };
        assert!(validate_effective_config(&cfg).is_ok());
        assert_eq!(cfg.log_level(), LogLevel::Debug);

        let cfg = Config {
            log_level: Some("loud".into()),
            ..Config::default()
        };
        assert!(validate_effective_config(&cfg).is_err());
        assert_eq!(cfg.log_level(), LogLevel::Info);
    }

    #[test]
    fn test_cli_log_level_overrides_config_file() {
        let mut file = Builder::new().suffix(".yaml").tempfile().unwrap();
        writeln!(file, "log_level: trace").unwrap();
        let path = file.path().to_str().unwrap();

        let args = Args::parse_from(["druid-exporter", "-c", path]);
        assert_eq!(resolve_config(&args).unwrap().log_level(), LogLevel::Trace);

        let args = Args::parse_from(["druid-exporter", "-c", path, "--log-level", "warn"]);
        assert_eq!(resolve_config(&args).unwrap().log_level(), LogLevel::Warn);
    }

    #[test]
    fn test_missing_explicit_file_is_an_error() {
        assert!(load_config(Some(Path::new("/nonexistent/druid-exporter.yaml"))).is_err());
    }
}
