//! Exporter endpoint configuration.

use serde::Deserialize;

use crate::scrape::{ExporterEndpoint, ScrapeError};

/// Default port of the probing exporter.
pub const DEFAULT_EXPORTER_PORT: u16 = 9115;
/// Environment variable naming the exporter's host.
pub const HOSTNAME_ENV_VAR: &str = "HOSTNAME";
/// Host used when `HOSTNAME` is not set.
pub const DEFAULT_EXPORTER_HOST: &str = "localhost";

/// Where the probing exporter listens and how it is reached from outside.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ExporterConfig {
    /// Listen port.
    pub port: u16,
    /// In-cluster host name.
    pub host: String,
    /// Externally reachable URL, if the exporter sits behind an ingress.
    pub external_url: Option<String>,
}

impl Default for ExporterConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_EXPORTER_PORT,
            host: std::env::var(HOSTNAME_ENV_VAR)
                .ok()
                .filter(|host| !host.is_empty())
                .unwrap_or_else(|| DEFAULT_EXPORTER_HOST.to_string()),
            external_url: None,
        }
    }
}

impl ExporterConfig {
    /// `http://<host>:<port>`.
    pub fn internal_url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }

    /// The configured external URL, or the internal URL.
    pub fn external_url(&self) -> String {
        self.external_url
            .clone()
            .unwrap_or_else(|| self.internal_url())
    }

    /// Validated endpoint for scrape job synthesis.
    pub fn endpoint(&self) -> Result<ExporterEndpoint, ScrapeError> {
        ExporterEndpoint::new(&self.external_url(), &self.internal_url())
    }
}
