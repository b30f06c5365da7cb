use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;

use crate::acl::services::AclEvaluator;
use crate::config::AppConfig;
use crate::identity::claims::IdentityKeys;
use crate::identity::{IdentityAssertion, StaticProfile};
use crate::rowstore::{HttpRowStore, MemoryRowStore, RowStore};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub store: Arc<dyn RowStore>,
    pub identity_keys: Option<Arc<IdentityKeys>>,
    /// Set when rows are hosted in process; the row store routes are mounted.
    pub memory: Option<Arc<MemoryRowStore>>,
}

impl AppState {
    pub async fn init() -> anyhow::Result<Self> {
        let config = AppConfig::from_env()?;
        Self::from_config(config)
    }

    pub fn from_config(config: AppConfig) -> anyhow::Result<Self> {
        let (store, memory) = match &config.rowstore.url {
            Some(url) => {
                let http = HttpRowStore::new(url, Duration::from_secs(config.rowstore.timeout_secs))
                    .with_context(|| format!("row store client for {url}"))?;
                tracing::info!(%url, "using remote row store");
                (Arc::new(http) as Arc<dyn RowStore>, None)
            }
            None => {
                tracing::warn!("ROWSTORE_URL not set; hosting user rows in memory");
                let mem = Arc::new(MemoryRowStore::new());
                (mem.clone() as Arc<dyn RowStore>, Some(mem))
            }
        };

        let identity_keys = match &config.identity_jwt {
            Some(cfg) => Some(Arc::new(IdentityKeys::new(cfg))),
            None => {
                tracing::warn!(
                    "IDENTITY_JWT_SECRET not set; trusting identity headers as asserted"
                );
                None
            }
        };

        Ok(Self {
            config: Arc::new(config),
            store,
            identity_keys,
            memory,
        })
    }

    /// Evaluator acting with the caller's own identity assertion.
    pub fn evaluator_for(&self, identity: &IdentityAssertion) -> AclEvaluator {
        AclEvaluator::new(
            self.store.clone(),
            Arc::new(StaticProfile(Some(identity.to_profile()))),
        )
    }

    #[cfg(test)]
    pub(crate) fn fake(store: Arc<MemoryRowStore>) -> Self {
        use crate::config::{GuardConfig, RowStoreConfig};

        let config = AppConfig {
            rowstore: RowStoreConfig {
                url: None,
                timeout_secs: 5,
            },
            guard: GuardConfig {
                max_attempts: 20,
                poll_interval_ms: 25,
                emergency_emails: vec!["root@acme.com".into()],
            },
            owner: None,
            identity_jwt: None,
            pages_dir: std::env::temp_dir().join("acc-acl-test-pages"),
        };
        Self {
            config: Arc::new(config),
            store: store.clone(),
            identity_keys: None,
            memory: Some(store),
        }
    }
}
