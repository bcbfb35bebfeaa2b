//! Wires configuration into a ready-to-use search service.

use crate::cache::{CachePolicy, FileStore, ResultCache};
use crate::codes::LocalTable;
use crate::config::AppConfig;
use crate::engine::{Delivery, SearchCoordinator, SearchSettings};
use crate::remote::{proxy_search, CodeLookup, ProxyReply, ProxyStatus, RemoteLookupClient};
use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{info, warn};

pub struct SearchService {
    coordinator: SearchCoordinator,
    lookup: Option<Arc<dyn CodeLookup>>,
    config: AppConfig,
}

impl SearchService {
    pub async fn build(config: AppConfig) -> Result<(Self, mpsc::UnboundedReceiver<Delivery>)> {
        let table = match &config.local.table_path {
            Some(path) => LocalTable::load(path)
                .with_context(|| format!("loading local code table {}", path.display()))?,
            None => {
                warn!("No local code table configured; results come from the remote service only");
                LocalTable::default()
            }
        };

        let lookup: Option<Arc<dyn CodeLookup>> = if config.remote.enabled {
            let client = RemoteLookupClient::new(&config.remote)
                .context("building remote lookup client")?;
            Some(Arc::new(client))
        } else {
            None
        };

        let policy = CachePolicy::from(&config.cache);
        let cache = if config.cache.durable {
            let dir = match &config.cache.dir {
                Some(dir) => dir.clone(),
                None => FileStore::default_dir().context("resolving cache directory")?,
            };
            let store = FileStore::open(&dir)
                .await
                .with_context(|| format!("opening durable cache at {}", dir.display()))?;
            ResultCache::with_durable(policy, Arc::new(store))
        } else {
            ResultCache::new(policy)
        };

        info!(
            codes = table.len(),
            remote = lookup.is_some(),
            durable = cache.has_durable(),
            "Search service ready"
        );

        let (coordinator, deliveries) = SearchCoordinator::new(
            Arc::new(table),
            lookup.clone(),
            Arc::new(cache),
            SearchSettings::from_config(&config),
        );

        Ok((
            Self {
                coordinator,
                lookup,
                config,
            },
            deliveries,
        ))
    }

    pub fn coordinator(&self) -> &SearchCoordinator {
        &self.coordinator
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Proxy-style lookup straight against the remote service, bypassing the local table.
    pub async fn proxy(&self, search: &str) -> ProxyReply {
        match &self.lookup {
            Some(lookup) => proxy_search(lookup.as_ref(), search, self.config.remote.max_results).await,
            None => ProxyReply {
                status: ProxyStatus::Ok,
                entries: Vec::new(),
            },
        }
    }
}
