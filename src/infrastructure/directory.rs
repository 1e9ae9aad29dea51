use crate::domain::ports::{AuthDirectory, MerchantDirectory, SettlementAccount};
use crate::error::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Default)]
struct Directory {
    actors: HashMap<String, String>,
    settlements: HashMap<String, SettlementAccount>,
}

/// Actor-to-merchant ownership and merchant settlement accounts, held in memory.
#[derive(Default, Clone)]
pub struct InMemoryDirectory {
    inner: Arc<RwLock<Directory>>,
}

impl InMemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn grant(&self, actor_id: impl Into<String>, merchant_id: impl Into<String>) {
        let mut inner = self.inner.write().await;
        inner.actors.insert(actor_id.into(), merchant_id.into());
    }

    pub async fn link_settlement(&self, merchant_id: impl Into<String>, account: SettlementAccount) {
        let mut inner = self.inner.write().await;
        inner.settlements.insert(merchant_id.into(), account);
    }
}

#[async_trait]
impl AuthDirectory for InMemoryDirectory {
    async fn resolve_actor_merchant(&self, actor_id: &str) -> Result<Option<String>> {
        let inner = self.inner.read().await;
        Ok(inner.actors.get(actor_id).cloned())
    }
}

#[async_trait]
impl MerchantDirectory for InMemoryDirectory {
    async fn settlement_account(&self, merchant_id: &str) -> Result<Option<SettlementAccount>> {
        let inner = self.inner.read().await;
        Ok(inner.settlements.get(merchant_id).cloned())
    }
}
