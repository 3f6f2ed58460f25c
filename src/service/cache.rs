//! Per-agent adapter cache

use std::collections::HashMap;
use tokio::sync::RwLock;

use crate::agents::llm::{ProviderClient, StreamPacing};
use crate::agents::{AgentAdapter, AgentConfig};

/// Adapters keyed by agent id.
///
/// Entries are replaced whenever the stored agent's configuration changes, so a
/// cached adapter never serves stale settings.
pub struct AdapterCache {
    client: ProviderClient,
    pacing: StreamPacing,
    adapters: RwLock<HashMap<i64, AgentAdapter>>,
}

impl AdapterCache {
    pub fn new(client: ProviderClient, pacing: StreamPacing) -> Self {
        Self {
            client,
            pacing,
            adapters: RwLock::new(HashMap::new()),
        }
    }

    /// Return the cached adapter if it was built from `config`, otherwise build
    /// and cache a fresh one
    pub async fn adapter_for(&self, agent_id: i64, config: AgentConfig) -> AgentAdapter {
        if let Some(adapter) = self.adapters.read().await.get(&agent_id) {
            if adapter.config() == &config {
                return adapter.clone();
            }
        }

        let adapter = AgentAdapter::new(config, self.client.clone()).with_pacing(self.pacing);
        self.adapters.write().await.insert(agent_id, adapter.clone());
        tracing::debug!(agent_id, "Adapter (re)built");
        adapter
    }

    pub async fn evict(&self, agent_id: i64) {
        self.adapters.write().await.remove(&agent_id);
    }

    pub async fn len(&self) -> usize {
        self.adapters.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}
