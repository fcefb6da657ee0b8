//! Structural validation of provider-supplied probes.
//!
//! A probe must name at least one probing module and at least one static
//! config. Validation is advisory: providers surface failures as signals
//! but still publish the probe, and the exporter side decides what to do
//! with it.

use crate::probe::ProbeSpec;

/// Error constants for validation failures.
pub mod errmsg {
    pub const MISSING_MODULE: &str = "probe has no params.module";
    pub const MISSING_STATIC_CONFIG: &str = "probe has no static_configs";
}

/// A probe that does not satisfy the minimal shape contract.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InvalidProbeError {
    #[error("{}: '{job_name}'", errmsg::MISSING_MODULE)]
    MissingModule { job_name: String },

    #[error("{}: '{job_name}'", errmsg::MISSING_STATIC_CONFIG)]
    MissingStaticConfig { job_name: String },
}

impl InvalidProbeError {
    /// Name of the job that failed validation.
    pub fn job_name(&self) -> &str {
        match self {
            Self::MissingModule { job_name } | Self::MissingStaticConfig { job_name } => job_name,
        }
    }
}

/// Validate a single probe.
///
/// Rules:
/// - `params.module` must be present and non-empty
/// - `static_configs` must be present and non-empty
pub fn validate_probe(probe: &ProbeSpec) -> Result<(), InvalidProbeError> {
    if probe.modules().is_empty() {
        return Err(InvalidProbeError::MissingModule {
            job_name: probe.job_name.clone(),
        });
    }
    if probe.static_configs.is_empty() {
        return Err(InvalidProbeError::MissingStaticConfig {
            job_name: probe.job_name.clone(),
        });
    }
    Ok(())
}
