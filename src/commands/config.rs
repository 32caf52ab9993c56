//! Config command implementation.
//!
//! Generates configuration files in various formats.

use std::fs;
use std::path::PathBuf;

use crate::cli::ConfigFormat;
use crate::config::{render_config, Config};

/// Generates configuration files.
pub fn command_config(
    output: Option<PathBuf>,
    format: ConfigFormat,
    commented: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::default();
    let output = output.unwrap_or_else(|| PathBuf::from("druid-exporter.yaml"));

    let mut content = render_config(&config, format)?;
    if commented && matches!(format, ConfigFormat::Yaml) {
        content = add_config_comments(content);
    }

    if output.to_string_lossy() == "-" {
        print!("{}", content);
    } else {
        fs::write(&output, content)?;
        println!("✅ Configuration written to: {}", output.display());
    }

    Ok(())
}

/// Adds comments to YAML configuration.
fn add_config_comments(yaml: String) -> String {
    let comments = r#"# Druid Exporter Configuration
# ============================
#
# Server Configuration
# --------------------
# bind: "0.0.0.0"               # Bind IP (0.0.0.0 = all interfaces)
# port: 8080                    # HTTP port
#
# Druid Connection
# ----------------
# druid_uri: "http://localhost:8888"  # Router or coordinator base URL
# druid_username: null          # Basic auth user
# druid_password: null          # Basic auth password
# request_timeout_secs: 10      # Timeout for each Druid API request
#
# Reverse DNS Cache
# -----------------
# dns_cache_ttl_secs: 300       # Lifetime of a resolved worker name
# dns_cache_cleanup_secs: 600   # Expired-entry sweep interval (0 = off)
# dns_timeout_secs: 2           # Budget for all lookups of one scrape
#
# Feature Flags
# -------------
# enable_health: true           # Enable /health endpoint
# enable_telemetry: true        # Enable druid_exporter_* metrics
#
# Logging
# -------
# log_level: "info"             # off, error, warn, info, debug, trace
#
# TLS
# ---
# enable_tls: false
# tls_cert_path: null
# tls_key_path: null

"#;

    format!("{}{}", comments, yaml)
}
