use std::collections::BTreeMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::store::{validate_generation, CacheStore};
use crate::error::StoreError;
use crate::models::{RequestKey, Response};

type Generation = BTreeMap<RequestKey, Response>;

/// In-memory cache store. Nothing survives the process.
#[derive(Debug, Default)]
pub struct MemoryStore {
    generations: RwLock<BTreeMap<String, Generation>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CacheStore for MemoryStore {
    async fn open(&self, generation: &str) -> Result<(), StoreError> {
        validate_generation(generation)?;
        self.generations
            .write()
            .await
            .entry(generation.to_string())
            .or_default();
        Ok(())
    }

    async fn get(
        &self,
        generation: &str,
        key: &RequestKey,
    ) -> Result<Option<Response>, StoreError> {
        validate_generation(generation)?;
        let generations = self.generations.read().await;
        Ok(generations
            .get(generation)
            .and_then(|entries| entries.get(key))
            .cloned())
    }

    async fn put(
        &self,
        generation: &str,
        key: RequestKey,
        response: Response,
    ) -> Result<(), StoreError> {
        validate_generation(generation)?;
        self.generations
            .write()
            .await
            .entry(generation.to_string())
            .or_default()
            .insert(key, response);
        Ok(())
    }

    async fn delete(&self, generation: &str) -> Result<bool, StoreError> {
        validate_generation(generation)?;
        Ok(self.generations.write().await.remove(generation).is_some())
    }

    async fn list_generations(&self) -> Result<Vec<String>, StoreError> {
        Ok(self.generations.read().await.keys().cloned().collect())
    }

    async fn keys(&self, generation: &str) -> Result<Vec<RequestKey>, StoreError> {
        validate_generation(generation)?;
        let generations = self.generations.read().await;
        Ok(generations
            .get(generation)
            .map(|entries| entries.keys().cloned().collect())
            .unwrap_or_default())
    }
}
