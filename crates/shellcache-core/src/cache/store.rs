use async_trait::async_trait;

use crate::error::StoreError;
use crate::models::{RequestKey, Response};

/// Storage for named cache generations.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Open a generation, creating it empty if absent
    async fn open(&self, generation: &str) -> Result<(), StoreError>;

    /// Look up a stored response. A missing generation is a miss.
    async fn get(
        &self,
        generation: &str,
        key: &RequestKey,
    ) -> Result<Option<Response>, StoreError>;

    /// Store a response, replacing any previous entry for the same key
    async fn put(
        &self,
        generation: &str,
        key: RequestKey,
        response: Response,
    ) -> Result<(), StoreError>;

    /// Delete a whole generation. Returns false if it did not exist.
    async fn delete(&self, generation: &str) -> Result<bool, StoreError>;

    async fn list_generations(&self) -> Result<Vec<String>, StoreError>;

    async fn keys(&self, generation: &str) -> Result<Vec<RequestKey>, StoreError>;
}

/// Generation names double as file names, so keep them to a safe alphabet.
pub fn validate_generation(generation: &str) -> Result<(), StoreError> {
    let valid = !generation.is_empty()
        && !generation.starts_with('.')
        && generation
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
    if valid {
        Ok(())
    } else {
        Err(StoreError::InvalidGeneration(generation.to_string()))
    }
}
