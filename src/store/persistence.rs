//! Storage seam for serialized state.

use async_trait::async_trait;
use parking_lot::Mutex;

/// Where the serialized store blob lives.
///
/// The store only exchanges an opaque blob with the strategy; the encoding
/// is owned by the store's `SerializationContext`.
#[async_trait]
pub trait PersistenceStrategy: Send + Sync {
    async fn save(&self, blob: Vec<u8>) -> anyhow::Result<()>;

    async fn load(&self) -> anyhow::Result<Option<Vec<u8>>>;

    async fn has_persisted(&self) -> anyhow::Result<bool>;
}

/// Keeps the blob in memory.
#[derive(Debug, Default)]
pub struct InMemoryPersistence {
    blob: Mutex<Option<Vec<u8>>>,
}

impl InMemoryPersistence {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start with a previously saved blob.
    pub fn with_blob(blob: Vec<u8>) -> Self {
        Self {
            blob: Mutex::new(Some(blob)),
        }
    }

    pub fn blob(&self) -> Option<Vec<u8>> {
        self.blob.lock().clone()
    }
}

#[async_trait]
impl PersistenceStrategy for InMemoryPersistence {
    async fn save(&self, blob: Vec<u8>) -> anyhow::Result<()> {
        *self.blob.lock() = Some(blob);
        Ok(())
    }

    async fn load(&self) -> anyhow::Result<Option<Vec<u8>>> {
        Ok(self.blob.lock().clone())
    }

    async fn has_persisted(&self) -> anyhow::Result<bool> {
        Ok(self.blob.lock().is_some())
    }
}
