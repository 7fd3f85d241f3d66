//! Process-wide state handed to every request handler

use crate::cluster::Cluster;
use crate::game::{SessionRegistry, StatsStore};
use std::sync::Arc;

#[derive(Clone)]
pub struct NodeContext {
    pub cluster: Arc<Cluster>,
    pub registry: Arc<SessionRegistry>,
    pub stats: Arc<dyn StatsStore>,
}

impl NodeContext {
    pub fn new(cluster: Arc<Cluster>, stats: Arc<dyn StatsStore>) -> Self {
        Self {
            cluster,
            registry: Arc::new(SessionRegistry::new(stats.clone())),
            stats,
        }
    }

    /// Share an existing registry, e.g. one with a deterministic engine.
    pub fn with_registry(mut self, registry: Arc<SessionRegistry>) -> Self {
        self.registry = registry;
        self
    }
}
