//! Shared data channel between probe providers and the exporter.
//!
//! This module contains:
//! - `RelationPublisher` trait: the provider-side capability to write a full
//!   databag snapshot to each relation it participates in
//! - `RelationSubscriber` trait: the exporter-side capability to be notified
//!   of relation changes and pull every provider's databag
//! - Databag field names and relation lifecycle events
//! - Implementations: in-process channel, mock

use std::collections::BTreeMap;
use std::fmt;

use async_trait::async_trait;
use tokio::sync::broadcast;

pub mod channel;
pub mod mock;

pub use channel::{ChannelProvider, ChannelRelationBus};
pub use mock::MockRelationPublisher;

/// Databag field holding the provider's serialized topology identity.
pub const SCRAPE_METADATA: &str = "scrape_metadata";
/// Databag field holding the provider's serialized (namespaced) probes.
pub const SCRAPE_PROBES: &str = "scrape_probes";
/// Databag field holding the provider's serialized (namespaced) modules.
pub const SCRAPE_MODULES: &str = "scrape_modules";

/// Key/value data one side of a relation exposes to the other.
pub type Databag = BTreeMap<String, String>;

// ============================================================================
// Traits
// ============================================================================

/// Result type for bus operations.
pub type Result<T> = std::result::Result<T, BusError>;

/// Errors that can occur during bus operations.
#[derive(Debug, thiserror::Error)]
pub enum BusError {
    #[error("Relation {0} not found")]
    RelationNotFound(RelationId),

    #[error("Serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Write failed: {0}")]
    Write(String),
}

/// Identifier of one provider-exporter connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RelationId(pub u64);

impl fmt::Display for RelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Relation lifecycle event as seen by one side of the relation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelationEvent {
    /// A relation was established.
    Joined(RelationId),
    /// The remote side changed its databag.
    Changed(RelationId),
    /// The remote side left the relation.
    Departed(RelationId),
}

impl RelationEvent {
    pub fn relation_id(&self) -> RelationId {
        match self {
            Self::Joined(id) | Self::Changed(id) | Self::Departed(id) => *id,
        }
    }
}

/// A provider's databag as read by the exporter side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationSnapshot {
    pub relation_id: RelationId,
    /// Remote application name.
    pub app: String,
    pub data: Databag,
}

/// Provider-side write capability.
///
/// Only the elected writer among a provider's replicas may write; how the
/// writer is elected is the platform's business.
#[async_trait]
pub trait RelationPublisher: Send + Sync {
    /// Whether this replica may write now.
    fn is_writer(&self) -> bool;

    /// Relations this provider currently participates in.
    async fn relation_ids(&self) -> Vec<RelationId>;

    /// Replace this provider's databag on one relation.
    async fn write(&self, relation_id: RelationId, data: Databag) -> Result<()>;

    /// Lifecycle events of this provider's relations.
    fn events(&self) -> broadcast::Receiver<RelationEvent>;
}

/// Exporter-side read capability.
#[async_trait]
pub trait RelationSubscriber: Send + Sync {
    /// Every connected provider's databag, in connection order.
    async fn snapshots(&self) -> Vec<RelationSnapshot>;

    /// Lifecycle events of relations to all providers.
    fn events(&self) -> broadcast::Receiver<RelationEvent>;
}
