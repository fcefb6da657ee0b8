//! Topology identity of a probe provider.
//!
//! The identity is published as `scrape_metadata` and is the source of the
//! namespace prefix applied to a provider's jobs and modules. The platform
//! guarantees the model UUID / application pair is unique, so the derived
//! identifier is unique across providers.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Errors raised when building a topology identity.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TopologyError {
    #[error("Topology field '{0}' cannot be empty")]
    EmptyField(&'static str),

    #[error("Invalid model UUID: {0}")]
    InvalidModelUuid(String),
}

/// Where a provider runs: model, application and (optionally) unit.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TopologyIdentity {
    pub model: String,
    pub model_uuid: String,
    pub application: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub charm_name: Option<String>,
}

impl TopologyIdentity {
    /// Create a validated identity.
    pub fn new(
        model: impl Into<String>,
        model_uuid: impl Into<String>,
        application: impl Into<String>,
    ) -> Result<Self, TopologyError> {
        let identity = Self {
            model: model.into(),
            model_uuid: model_uuid.into(),
            application: application.into(),
            unit: None,
            charm_name: None,
        };
        identity.validate()?;
        Ok(identity)
    }

    pub fn with_unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = Some(unit.into());
        self
    }

    pub fn with_charm_name(mut self, charm_name: impl Into<String>) -> Self {
        self.charm_name = Some(charm_name.into());
        self
    }

    /// Check the fields the identifier is built from.
    pub fn validate(&self) -> Result<(), TopologyError> {
        if self.model.is_empty() {
            return Err(TopologyError::EmptyField("model"));
        }
        if self.application.is_empty() {
            return Err(TopologyError::EmptyField("application"));
        }
        Uuid::parse_str(&self.model_uuid)
            .map_err(|_| TopologyError::InvalidModelUuid(self.model_uuid.clone()))?;
        Ok(())
    }

    /// Stable identifier: `<model>_<model_uuid>_<application>`.
    ///
    /// The unit is left out so every unit of an application shares one
    /// namespace.
    pub fn identifier(&self) -> String {
        format!("{}_{}_{}", self.model, self.model_uuid, self.application)
    }
}
