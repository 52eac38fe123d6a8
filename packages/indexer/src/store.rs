//! Collection Store
//!
//! The persistence seam used by the router and the handlers. The indexer only
//! needs address lookup and upsert; any backend providing those can sit
//! behind [`CollectionStore`].

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::RwLock;

#[cfg(test)]
use mockall::automock;

/// Errors reported by a store backend
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("Store backend error: {0}")]
    Backend(String),

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

/// Denormalized metadata every tracked collection must carry
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionMetadata {
    /// Contract that mints into this collection
    pub mint_contract_address: String,
    /// cw721 contract holding the tokens
    pub nft_contract_address: String,
    pub creator_address: String,
}

/// An NFT collection as stored in the catalog
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Collection {
    /// Address the collection is looked up by (its minter contract)
    pub address: String,
    pub name: String,
    pub image_uri: String,
    pub metadata: Option<CollectionMetadata>,
}

/// Lookup and upsert of collections
#[cfg_attr(test, automock)]
#[async_trait]
pub trait CollectionStore: Send + Sync {
    /// Find the collection registered under `address`, if any
    async fn find_by_address(&self, address: &str) -> Result<Option<Collection>, StoreError>;

    /// Insert or replace a collection, keyed by its address
    async fn upsert(&self, collection: Collection) -> Result<(), StoreError>;
}

/// Shared in-memory [`CollectionStore`]
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    collections: Arc<RwLock<HashMap<String, Collection>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a collection directly
    pub async fn insert(&self, collection: Collection) {
        self.collections
            .write()
            .await
            .insert(collection.address.clone(), collection);
    }

    pub async fn get(&self, address: &str) -> Option<Collection> {
        self.collections.read().await.get(address).cloned()
    }

    pub async fn len(&self) -> usize {
        self.collections.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.collections.read().await.is_empty()
    }
}

#[async_trait]
impl CollectionStore for InMemoryStore {
    async fn find_by_address(&self, address: &str) -> Result<Option<Collection>, StoreError> {
        Ok(self.get(address).await)
    }

    async fn upsert(&self, collection: Collection) -> Result<(), StoreError> {
        self.insert(collection).await;
        Ok(())
    }
}
