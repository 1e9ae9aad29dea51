use crate::domain::catalog::{Product, Storefront};
use crate::domain::ports::{CatalogAccessor, SettlementAccount};
use crate::error::Result;
use crate::infrastructure::directory::InMemoryDirectory;
use serde::Deserialize;
use std::io::Read;
use tracing::info;

#[derive(Debug, Deserialize, PartialEq, Clone)]
pub struct MerchantSeed {
    pub merchant_id: String,
    /// Actor ids allowed to act on this merchant's orders.
    #[serde(default)]
    pub actors: Vec<String>,
    #[serde(default)]
    pub settlement: Option<SettlementAccount>,
}

/// Bootstrap data for a fresh deployment: storefronts, products and the
/// merchant directory.
#[derive(Debug, Default, Deserialize, PartialEq, Clone)]
pub struct Seed {
    #[serde(default)]
    pub storefronts: Vec<Storefront>,
    #[serde(default)]
    pub products: Vec<Product>,
    #[serde(default)]
    pub merchants: Vec<MerchantSeed>,
}

impl Seed {
    pub fn from_reader<R: Read>(source: R) -> Result<Self> {
        Ok(serde_json::from_reader(source)?)
    }

    pub async fn apply(self, catalog: &dyn CatalogAccessor, directory: &InMemoryDirectory) -> Result<()> {
        let (storefronts, products, merchants) =
            (self.storefronts.len(), self.products.len(), self.merchants.len());
        for storefront in self.storefronts {
            catalog.upsert_storefront(storefront).await?;
        }
        for product in self.products {
            catalog.upsert_product(product).await?;
        }
        for merchant in self.merchants {
            for actor in merchant.actors {
                directory.grant(actor, merchant.merchant_id.clone()).await;
            }
            if let Some(account) = merchant.settlement {
                directory.link_settlement(merchant.merchant_id, account).await;
            }
        }
        info!(storefronts, products, merchants, "Seed data loaded");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ports::{AuthDirectory, MerchantDirectory};
    use crate::infrastructure::in_memory::InMemoryStore;

    const SEED: &str = r#"{
        "storefronts": [
            {"id": "s1", "merchant_id": "m1", "name": "Mama Put", "category": "food",
             "is_active": true, "is_published": true}
        ],
        "products": [
            {"id": "p1", "store_id": "s1", "name": "Jollof", "price": "10.00",
             "tracks_inventory": true, "stock": 5, "is_available": true,
             "specs": {"category": "food", "ingredients": ["rice"]}}
        ],
        "merchants": [
            {"merchant_id": "m1", "actors": ["u1"],
             "settlement": {"subaccount_code": "ACCT_1", "is_active": true}}
        ]
    }"#;

    #[tokio::test]
    async fn test_seed_populates_catalog_and_directory() {
        let store = InMemoryStore::new();
        let directory = InMemoryDirectory::new();
        Seed::from_reader(SEED.as_bytes())
            .unwrap()
            .apply(&store, &directory)
            .await
            .unwrap();

        assert!(store.get_storefront("s1").await.unwrap().unwrap().is_orderable());
        assert_eq!(store.get_product("p1").await.unwrap().unwrap().stock, 5);
        assert_eq!(
            directory.resolve_actor_merchant("u1").await.unwrap().as_deref(),
            Some("m1")
        );
        assert!(directory.settlement_account("m1").await.unwrap().is_some());
    }
}
