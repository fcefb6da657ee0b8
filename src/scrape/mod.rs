//! Scrape job synthesis for the probing exporter.
//!
//! Merges the locally configured probes file with the probes collected
//! from providers, keyed by job name, and turns every resulting probe into
//! an exporter-ready scrape job: `metrics_path` points at the exporter's
//! probe endpoint and a fixed relabeling pipeline rewrites the target into
//! the exporter's request shape.
//!
//! ```text
//! local probes file ─┐
//!                    ├─ merge by job_name ─ + metrics_path ─ + relabel_configs ─▶ scrape_configs
//! relation probes ───┘   (relation wins)
//! ```

use std::collections::HashMap;

use http::Uri;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::probe::{ProbeSpec, StaticConfig};

/// Path of the exporter's probe endpoint, relative to its external path.
pub const PROBE_PATH: &str = "/probe";
/// Path of the exporter's own metrics, relative to its external path.
pub const METRICS_PATH: &str = "/metrics";

/// Keys owned by the synthesizer; input values are replaced.
const METRICS_PATH_KEY: &str = "metrics_path";
const RELABEL_CONFIGS_KEY: &str = "relabel_configs";

/// Errors raised when describing the exporter's endpoints.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ScrapeError {
    #[error("Invalid exporter URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },
}

// ============================================================================
// Exporter endpoint
// ============================================================================

/// The exporter's externally reachable URL and in-cluster URL.
#[derive(Debug, Clone)]
pub struct ExporterEndpoint {
    external: Uri,
    internal_address: String,
}

impl ExporterEndpoint {
    /// Both URLs must use the `http` scheme and name a host.
    pub fn new(external_url: &str, internal_url: &str) -> Result<Self, ScrapeError> {
        let external = parse_http_url(external_url)?;
        let internal = parse_http_url(internal_url)?;
        let internal_address = internal
            .authority()
            .map(|authority| authority.as_str().to_string())
            .ok_or_else(|| ScrapeError::InvalidUrl {
                url: internal_url.to_string(),
                reason: "missing host".to_string(),
            })?;

        Ok(Self {
            external,
            internal_address,
        })
    }

    /// Probe endpoint path: the external path without trailing slash, plus `/probe`.
    pub fn probe_path(&self) -> String {
        self.external_path(PROBE_PATH)
    }

    pub fn metrics_path(&self) -> String {
        self.external_path(METRICS_PATH)
    }

    /// In-cluster `host:port`, without scheme.
    pub fn internal_address(&self) -> &str {
        &self.internal_address
    }

    fn external_path(&self, suffix: &str) -> String {
        format!("{}{}", self.external.path().trim_end_matches('/'), suffix)
    }
}

fn parse_http_url(url: &str) -> Result<Uri, ScrapeError> {
    let invalid = |reason: &str| ScrapeError::InvalidUrl {
        url: url.to_string(),
        reason: reason.to_string(),
    };

    let uri: Uri = url.parse().map_err(|_| invalid("not a URL"))?;
    if uri.scheme_str() != Some("http") {
        return Err(invalid("scheme must be http"));
    }
    match uri.host() {
        Some(host) if !host.is_empty() => Ok(uri),
        _ => Err(invalid("missing host")),
    }
}

// ============================================================================
// Scrape job types
// ============================================================================

/// One label rewrite rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelabelConfig {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub source_labels: Vec<String>,
    pub target_label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replacement: Option<String>,
}

impl RelabelConfig {
    fn copy(source_label: &str, target_label: &str) -> Self {
        Self {
            source_labels: vec![source_label.to_string()],
            target_label: target_label.to_string(),
            replacement: None,
        }
    }

    fn replace(target_label: &str, replacement: &str) -> Self {
        Self {
            source_labels: Vec::new(),
            target_label: target_label.to_string(),
            replacement: Some(replacement.to_string()),
        }
    }
}

/// A probe with the exporter-specific fields attached.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScrapeJob {
    #[serde(flatten)]
    pub probe: ProbeSpec,
    pub metrics_path: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub relabel_configs: Vec<RelabelConfig>,
}

/// Final output handed to the monitoring-system integration.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MergedScrapeConfig {
    pub scrape_configs: Vec<ScrapeJob>,
}

/// The locally configured probes file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LocalFileConfig {
    #[serde(default)]
    pub scrape_configs: Vec<ProbeSpec>,
}

impl LocalFileConfig {
    /// Parse the probes file; empty or malformed text yields no probes.
    pub fn parse(text: &str) -> Self {
        if text.trim().is_empty() {
            return Self::default();
        }
        match serde_yaml::from_str::<Option<Self>>(text) {
            Ok(config) => config.unwrap_or_default(),
            Err(e) => {
                warn!(error = %e, "Malformed probes file, ignoring it");
                Self::default()
            }
        }
    }
}

// ============================================================================
// Synthesis
// ============================================================================

/// Merge local and relation probes by job name.
///
/// Order is first-seen order; a later entry with the same job name replaces
/// the earlier one in place. Relation probes come last, so they win over
/// the file.
pub fn merge_scrape_configs(local: LocalFileConfig, relation_probes: &[ProbeSpec]) -> Vec<ProbeSpec> {
    let mut merged: Vec<ProbeSpec> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    let incoming = local
        .scrape_configs
        .into_iter()
        .chain(relation_probes.iter().cloned());
    for probe in incoming {
        match index.get(&probe.job_name) {
            Some(&position) => merged[position] = probe,
            None => {
                index.insert(probe.job_name.clone(), merged.len());
                merged.push(probe);
            }
        }
    }
    merged
}

/// Builds exporter scrape jobs for one exporter endpoint.
#[derive(Debug, Clone)]
pub struct ScrapeConfigBuilder {
    endpoint: ExporterEndpoint,
}

impl ScrapeConfigBuilder {
    pub fn new(endpoint: ExporterEndpoint) -> Self {
        Self { endpoint }
    }

    pub fn endpoint(&self) -> &ExporterEndpoint {
        &self.endpoint
    }

    /// The fixed relabeling pipeline:
    /// 1. `__address__` → `__param_target`
    /// 2. `__param_target` → `instance`
    /// 3. `__param_target` → `probe_target`, kept for dashboards
    /// 4. `__address__` := the exporter's internal address
    pub fn relabel_configs(&self) -> Vec<RelabelConfig> {
        vec![
            RelabelConfig::copy("__address__", "__param_target"),
            RelabelConfig::copy("__param_target", "instance"),
            RelabelConfig::copy("__param_target", "probe_target"),
            RelabelConfig::replace("__address__", self.endpoint.internal_address()),
        ]
    }

    /// Attach `metrics_path` and the relabeling pipeline to a probe.
    ///
    /// Any `metrics_path` or `relabel_configs` the probe already carries is
    /// replaced.
    pub fn scrape_job(&self, mut probe: ProbeSpec) -> ScrapeJob {
        if probe.extra.remove(RELABEL_CONFIGS_KEY).is_some() {
            debug!(job_name = %probe.job_name, "Replacing input relabel_configs");
        }
        probe.extra.remove(METRICS_PATH_KEY);

        ScrapeJob {
            probe,
            metrics_path: self.endpoint.probe_path(),
            relabel_configs: self.relabel_configs(),
        }
    }

    /// Merge the probes file text with relation probes into scrape jobs.
    ///
    /// Never fails: a malformed probes file contributes no jobs.
    pub fn build_scrape_config(
        &self,
        local_file: &str,
        relation_probes: &[ProbeSpec],
    ) -> MergedScrapeConfig {
        let local = LocalFileConfig::parse(local_file);
        let scrape_configs = merge_scrape_configs(local, relation_probes)
            .into_iter()
            .map(|probe| self.scrape_job(probe))
            .collect();
        MergedScrapeConfig { scrape_configs }
    }

    /// The exporter's self-monitoring job.
    pub fn self_scraping_job(&self) -> ScrapeJob {
        ScrapeJob {
            probe: ProbeSpec {
                static_configs: vec![StaticConfig::new([self.endpoint.internal_address()])],
                ..Default::default()
            },
            metrics_path: self.endpoint.metrics_path(),
            relabel_configs: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests;
