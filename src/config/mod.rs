//! Application configuration.
//!
//! Aggregates exporter and probes file settings into a single
//! Config struct that can be loaded from YAML files or environment variables.

mod exporter;

pub use exporter::{
    ExporterConfig, DEFAULT_EXPORTER_HOST, DEFAULT_EXPORTER_PORT, HOSTNAME_ENV_VAR,
};

use std::path::PathBuf;

use serde::Deserialize;
use tracing::warn;

/// Default configuration file name.
pub const DEFAULT_CONFIG_FILE: &str = "config.yaml";
/// Environment variable for configuration file path.
pub const CONFIG_ENV_VAR: &str = "BLACKBOX_PROBES_CONFIG";
/// Prefix for configuration environment variables.
pub const CONFIG_ENV_PREFIX: &str = "BLACKBOX_PROBES";
/// Environment variable for logging configuration.
pub const LOG_ENV_VAR: &str = "BLACKBOX_PROBES_LOG";

/// Main application configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Probing exporter endpoint.
    pub exporter: ExporterConfig,
    /// Local probes file, merged with relation probes.
    pub probes_file: Option<PathBuf>,
}

impl Config {
    /// Load configuration from file and environment.
    ///
    /// Configuration sources (in order of priority, later overrides earlier):
    /// 1. `config.yaml` in current directory (if exists)
    /// 2. File specified by `path` argument (if provided)
    /// 3. File specified by `CONFIG_ENV_VAR` environment variable (if set)
    /// 4. Environment variables with `CONFIG_ENV_PREFIX` prefix
    pub fn load(path: Option<&str>) -> Result<Self, ::config::ConfigError> {
        use ::config::{Config as ConfigLib, Environment, File, FileFormat};

        let mut builder = ConfigLib::builder()
            .add_source(File::new(DEFAULT_CONFIG_FILE, FileFormat::Yaml).required(false));

        if let Some(config_path) = path {
            builder = builder.add_source(File::new(config_path, FileFormat::Yaml).required(true));
        }

        if let Ok(config_path) = std::env::var(CONFIG_ENV_VAR) {
            builder = builder.add_source(File::new(&config_path, FileFormat::Yaml).required(true));
        }

        builder
            .add_source(
                Environment::with_prefix(CONFIG_ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }

    /// Contents of the local probes file.
    ///
    /// Empty when no file is configured or it cannot be read.
    pub fn probes_text(&self) -> String {
        let Some(path) = &self.probes_file else {
            return String::new();
        };
        match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Cannot read probes file, using no local probes");
                String::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn yaml_file(content: &str) -> NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.exporter.port, 9115);
        assert!(config.exporter.external_url.is_none());
        assert!(config.probes_file.is_none());
    }

    #[test]
    #[serial]
    fn test_host_defaults_from_hostname() {
        std::env::set_var(HOSTNAME_ENV_VAR, "blackbox-0");
        assert_eq!(ExporterConfig::default().host, "blackbox-0");

        std::env::remove_var(HOSTNAME_ENV_VAR);
        assert_eq!(ExporterConfig::default().host, "localhost");
    }

    #[test]
    fn test_external_url_falls_back_to_internal() {
        let exporter = ExporterConfig {
            port: 9115,
            host: "blackbox-0.svc".to_string(),
            external_url: None,
        };
        assert_eq!(exporter.internal_url(), "http://blackbox-0.svc:9115");
        assert_eq!(exporter.external_url(), "http://blackbox-0.svc:9115");

        let endpoint = exporter.endpoint().unwrap();
        assert_eq!(endpoint.probe_path(), "/probe");
        assert_eq!(endpoint.internal_address(), "blackbox-0.svc:9115");
    }

    #[test]
    fn test_external_url_behind_ingress() {
        let exporter = ExporterConfig {
            port: 9115,
            host: "blackbox-0.svc".to_string(),
            external_url: Some("http://ingress.local/model-blackbox".to_string()),
        };
        let endpoint = exporter.endpoint().unwrap();
        assert_eq!(endpoint.probe_path(), "/model-blackbox/probe");
        assert_eq!(endpoint.internal_address(), "blackbox-0.svc:9115");
    }

    #[test]
    fn test_invalid_external_url_rejected() {
        let exporter = ExporterConfig {
            external_url: Some("https://ingress.local".to_string()),
            ..ExporterConfig::default()
        };
        assert!(exporter.endpoint().is_err());
    }

    #[test]
    #[serial]
    fn test_load_from_file() {
        let file = yaml_file(
            r#"
exporter:
  port: 9200
  host: exporter.internal
probes_file: /etc/blackbox/probes.yaml
"#,
        );

        let config = Config::load(file.path().to_str()).unwrap();

        assert_eq!(config.exporter.port, 9200);
        assert_eq!(config.exporter.host, "exporter.internal");
        assert_eq!(
            config.probes_file,
            Some(PathBuf::from("/etc/blackbox/probes.yaml"))
        );
    }

    #[test]
    #[serial]
    fn test_missing_sections_use_defaults() {
        let file = yaml_file("exporter:\n  port: 9300\n");

        let config = Config::load(file.path().to_str()).unwrap();

        assert_eq!(config.exporter.port, 9300);
        assert!(config.probes_file.is_none());
    }

    #[test]
    #[serial]
    fn test_unknown_sections_ignored() {
        let file = yaml_file("relation:\n  name: probes\nexporter:\n  port: 9300\n");

        let config = Config::load(file.path().to_str()).unwrap();

        assert_eq!(config.exporter.port, 9300);
    }

    #[test]
    #[serial]
    fn test_env_overrides_file() {
        let file = yaml_file("exporter:\n  port: 9200\n");
        std::env::set_var("BLACKBOX_PROBES__EXPORTER__PORT", "9400");

        let config = Config::load(file.path().to_str());
        std::env::remove_var("BLACKBOX_PROBES__EXPORTER__PORT");

        assert_eq!(config.unwrap().exporter.port, 9400);
    }

    #[test]
    #[serial]
    fn test_missing_explicit_file_fails() {
        assert!(Config::load(Some("/nonexistent/blackbox-probes.yaml")).is_err());
    }

    #[test]
    fn test_probes_text_reads_file() {
        let file = yaml_file("scrape_configs: []\n");
        let config = Config {
            probes_file: Some(file.path().to_path_buf()),
            ..Config::default()
        };
        assert_eq!(config.probes_text(), "scrape_configs: []\n");
    }

    #[test]
    fn test_probes_text_degrades_to_empty() {
        let config = Config {
            probes_file: Some(PathBuf::from("/nonexistent/probes.yaml")),
            ..Config::default()
        };
        assert_eq!(config.probes_text(), "");
        assert_eq!(Config::default().probes_text(), "");
    }
}
