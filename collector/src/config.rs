use serde::Deserialize;
use std::fs;
use std::path::PathBuf;

const DEFAULT_CONFIG_PATH: &str = "/etc/trace2pass/collector.toml";
const ENV_CONFIG_PATH: &str = "TRACE2PASS_COLLECTOR_CONFIG";

/// Collector startup configuration: TOML on disk, overridable by
/// environment, falling back to built-in defaults on a missing or
/// malformed file.
#[derive(Debug, Deserialize, Clone)]
pub struct CollectorConfig {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
    #[serde(default = "default_db_path")]
    pub db_path: String,
    #[serde(default = "default_queue_limit")]
    pub default_queue_limit: i64,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            db_path: default_db_path(),
            default_queue_limit: default_queue_limit(),
        }
    }
}

impl CollectorConfig {
    /// Loads from the file named by `TRACE2PASS_COLLECTOR_CONFIG`, or
    /// `/etc/trace2pass/collector.toml` if unset. Missing or malformed
    /// files fall back to defaults rather than failing startup.
    pub fn load() -> Self {
        let path = std::env::var(ENV_CONFIG_PATH).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        let path = PathBuf::from(path);
        match fs::read_to_string(&path) {
            Ok(contents) => toml::from_str(&contents).unwrap_or_default(),
            Err(_) => CollectorConfig::default(),
        }
    }
}

fn default_bind_addr() -> String {
    "0.0.0.0:7878".to_string()
}

fn default_db_path() -> String {
    "/var/lib/trace2pass/collector.sqlite".to_string()
}

fn default_queue_limit() -> i64 {
    50
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn parse_partial_config_falls_back_for_missing_fields() {
        let toml = r#"bind_addr = "127.0.0.1:9000""#;
        let cfg: CollectorConfig = toml::from_str(toml).unwrap();
        assert_eq!(cfg.bind_addr, "127.0.0.1:9000");
        assert_eq!(cfg.default_queue_limit, 50);
    }

    #[test]
    fn env_override_points_at_alternate_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "bind_addr = \"127.0.0.1:1234\"").unwrap();
        unsafe {
            std::env::set_var(ENV_CONFIG_PATH, file.path());
        }
        let cfg = CollectorConfig::load();
        assert_eq!(cfg.bind_addr, "127.0.0.1:1234");
        unsafe {
            std::env::remove_var(ENV_CONFIG_PATH);
        }
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        unsafe {
            std::env::set_var(ENV_CONFIG_PATH, "/nonexistent/path.toml");
        }
        let cfg = CollectorConfig::load();
        assert_eq!(cfg.bind_addr, default_bind_addr());
        unsafe {
            std::env::remove_var(ENV_CONFIG_PATH);
        }
    }
}
