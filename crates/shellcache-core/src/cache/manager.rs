use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::debug;

use super::store::{validate_generation, CacheStore};
use crate::error::StoreError;
use crate::models::{RequestKey, Response};

/// Subdirectory of the cache directory holding one file per generation
const GENERATIONS_DIR: &str = "generations";

const GENERATION_EXT: &str = "json";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedData<T> {
    pub data: T,
    pub cached_at: DateTime<Utc>,
}

impl<T> CachedData<T> {
    pub fn new(data: T) -> Self {
        Self {
            data,
            cached_at: Utc::now(),
        }
    }

    pub fn age_minutes(&self) -> i64 {
        let now = Utc::now();
        (now - self.cached_at).num_minutes()
    }

    pub fn age_display(&self) -> String {
        let minutes = self.age_minutes();
        if minutes < 1 {
            // Also covers clock skew
            "just now".to_string()
        } else if minutes < 60 {
            format!("{}m ago", minutes)
        } else if minutes < 1440 {
            let hours = minutes / 60;
            if minutes % 60 >= 30 {
                format!("{}h ago", hours + 1)
            } else {
                format!("{}h ago", hours)
            }
        } else {
            let days = minutes / 1440;
            if (minutes % 1440) / 60 >= 12 {
                format!("{}d ago", days + 1)
            } else {
                format!("{}d ago", days)
            }
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct GenerationFile {
    #[serde(default)]
    entries: BTreeMap<RequestKey, Response>,
}

/// Cache store persisted as JSON, one file per generation.
///
/// File I/O runs on tokio's blocking pool; writes are serialized through
/// `write_lock` so concurrent `put`s never lose entries.
pub struct DiskStore {
    dir: Arc<GenerationDir>,
    write_lock: Mutex<()>,
}

struct GenerationDir {
    path: PathBuf,
}

impl GenerationDir {
    fn generation_path(&self, generation: &str) -> PathBuf {
        self.path.join(format!("{}.{}", generation, GENERATION_EXT))
    }

    fn load(&self, generation: &str) -> Result<Option<CachedData<GenerationFile>>, StoreError> {
        let path = self.generation_path(generation);
        if !path.exists() {
            return Ok(None);
        }

        let contents = std::fs::read_to_string(&path).map_err(|e| io_error(&path, e))?;
        let cached = serde_json::from_str(&contents).map_err(|source| StoreError::Corrupt {
            generation: generation.to_string(),
            source,
        })?;

        Ok(Some(cached))
    }

    fn save(&self, generation: &str, file: GenerationFile) -> Result<(), StoreError> {
        let path = self.generation_path(generation);
        let tmp = path.with_extension(format!("{}.tmp", GENERATION_EXT));
        let contents = serde_json::to_string(&CachedData::new(file))
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        std::fs::write(&tmp, contents).map_err(|e| io_error(&tmp, e))?;
        std::fs::rename(&tmp, &path).map_err(|e| io_error(&path, e))?;
        Ok(())
    }

    fn remove(&self, generation: &str) -> Result<bool, StoreError> {
        let path = self.generation_path(generation);
        if !path.exists() {
            return Ok(false);
        }
        std::fs::remove_file(&path).map_err(|e| io_error(&path, e))?;
        Ok(true)
    }

    fn list(&self) -> Result<Vec<String>, StoreError> {
        let dir = &self.path;
        let mut names = Vec::new();
        for entry in std::fs::read_dir(dir).map_err(|e| io_error(dir, e))? {
            let path = entry.map_err(|e| io_error(dir, e))?.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some(GENERATION_EXT) {
                continue;
            }
            if let Some(name) = path.file_stem().and_then(|stem| stem.to_str()) {
                names.push(name.to_string());
            }
        }
        names.sort();
        Ok(names)
    }
}

impl DiskStore {
    pub fn new(cache_dir: &Path) -> Result<Self, StoreError> {
        let path = cache_dir.join(GENERATIONS_DIR);
        std::fs::create_dir_all(&path).map_err(|e| io_error(&path, e))?;
        Ok(Self {
            dir: Arc::new(GenerationDir { path }),
            write_lock: Mutex::new(()),
        })
    }

    async fn blocking<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        F: FnOnce(&GenerationDir) -> Result<T, StoreError> + Send + 'static,
        T: Send + 'static,
    {
        let dir = Arc::clone(&self.dir);
        tokio::task::spawn_blocking(move || f(&*dir))
            .await
            .map_err(|e| StoreError::Backend(format!("Cache I/O task failed: {}", e)))?
    }

    /// Age of a generation's last write, for display
    pub async fn generation_age(&self, generation: &str) -> Result<Option<String>, StoreError> {
        validate_generation(generation)?;
        let generation = generation.to_string();
        self.blocking(move |dir| Ok(dir.load(&generation)?.map(|cached| cached.age_display())))
            .await
    }
}

fn io_error(path: &Path, source: std::io::Error) -> StoreError {
    StoreError::Io {
        path: path.display().to_string(),
        source,
    }
}

#[async_trait]
impl CacheStore for DiskStore {
    async fn open(&self, generation: &str) -> Result<(), StoreError> {
        validate_generation(generation)?;
        let generation = generation.to_string();
        let _guard = self.write_lock.lock().await;
        self.blocking(move |dir| {
            if dir.load(&generation)?.is_none() {
                debug!(generation = %generation, "Creating cache generation");
                dir.save(&generation, GenerationFile::default())?;
            }
            Ok(())
        })
        .await
    }

    async fn get(
        &self,
        generation: &str,
        key: &RequestKey,
    ) -> Result<Option<Response>, StoreError> {
        validate_generation(generation)?;
        let generation = generation.to_string();
        let key = key.clone();
        self.blocking(move |dir| {
            Ok(dir
                .load(&generation)?
                .and_then(|mut cached| cached.data.entries.remove(&key)))
        })
        .await
    }

    async fn put(
        &self,
        generation: &str,
        key: RequestKey,
        response: Response,
    ) -> Result<(), StoreError> {
        validate_generation(generation)?;
        let generation = generation.to_string();
        let _guard = self.write_lock.lock().await;
        self.blocking(move |dir| {
            let mut file = dir
                .load(&generation)?
                .map(|cached| cached.data)
                .unwrap_or_default();
            file.entries.insert(key, response);
            dir.save(&generation, file)
        })
        .await
    }

    async fn delete(&self, generation: &str) -> Result<bool, StoreError> {
        validate_generation(generation)?;
        let generation = generation.to_string();
        let _guard = self.write_lock.lock().await;
        self.blocking(move |dir| dir.remove(&generation)).await
    }

    async fn list_generations(&self) -> Result<Vec<String>, StoreError> {
        self.blocking(|dir| dir.list()).await
    }

    async fn keys(&self, generation: &str) -> Result<Vec<RequestKey>, StoreError> {
        validate_generation(generation)?;
        let generation = generation.to_string();
        self.blocking(move |dir| {
            Ok(dir
                .load(&generation)?
                .map(|cached| cached.data.entries.into_keys().collect())
                .unwrap_or_default())
        })
        .await
    }
}

// ============================================================================
// Tests
// ============================================================================
