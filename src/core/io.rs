use anyhow::Result;
use async_trait::async_trait;

#[cfg(target_arch = "wasm32")]
pub trait StorageBounds {}
#[cfg(target_arch = "wasm32")]
impl<T> StorageBounds for T {}

#[cfg(not(target_arch = "wasm32"))]
pub trait StorageBounds: Send + Sync {}
#[cfg(not(target_arch = "wasm32"))]
impl<T: Send + Sync> StorageBounds for T {}

/// Client-side byte storage. Natively keys are file paths, in the browser they
/// are IndexedDB keys.
#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
pub trait Storage: StorageBounds {
    async fn read(&self, path: &str) -> Result<Vec<u8>>;
    async fn write(&self, path: &str, content: &[u8]) -> Result<()>;
    async fn delete(&self, path: &str) -> Result<()>;
    async fn exists(&self, path: &str) -> Result<bool>;
}

// --- Native Implementation ---

#[cfg(not(target_arch = "wasm32"))]
#[derive(Debug, Default)]
pub struct NativeStorage;

#[cfg(not(target_arch = "wasm32"))]
impl NativeStorage {
    pub fn new() -> Self {
        Self
    }
}

#[cfg(not(target_arch = "wasm32"))]
#[async_trait]
impl Storage for NativeStorage {
    async fn read(&self, path: &str) -> Result<Vec<u8>> {
        Ok(tokio::fs::read(path).await?)
    }

    async fn write(&self, path: &str, content: &[u8]) -> Result<()> {
        if let Some(parent) = std::path::Path::new(path).parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        tokio::fs::write(path, content).await?;
        Ok(())
    }

    async fn delete(&self, path: &str) -> Result<()> {
        if tokio::fs::try_exists(path).await? {
            tokio::fs::remove_file(path).await?;
        }
        Ok(())
    }

    async fn exists(&self, path: &str) -> Result<bool> {
        Ok(tokio::fs::try_exists(path).await?)
    }
}

// --- Web Implementation ---

#[cfg(target_arch = "wasm32")]
use anyhow::anyhow;
#[cfg(target_arch = "wasm32")]
use idb::{Factory, ObjectStoreParams, TransactionMode};
#[cfg(target_arch = "wasm32")]
use wasm_bindgen::JsValue;

#[cfg(target_arch = "wasm32")]
const DB_NAME: &str = "blogsmith_db";
#[cfg(target_arch = "wasm32")]
const STORE_NAME: &str = "client_state";

#[cfg(target_arch = "wasm32")]
pub struct WebStorage {
    db: idb::Database,
}

#[cfg(target_arch = "wasm32")]
impl WebStorage {
    pub async fn new() -> Result<Self> {
        let factory = Factory::new().map_err(|e| anyhow!("Failed to create factory: {:?}", e))?;
        let mut open_request = factory
            .open(DB_NAME, Some(1))
            .map_err(|e| anyhow!("Failed to open DB: {:?}", e))?;

        open_request.on_upgrade_needed(|event| {
            if let Ok(db) = event.database() {
                if !db.store_names().iter().any(|n| n.as_str() == STORE_NAME) {
                    let _ = db.create_object_store(STORE_NAME, ObjectStoreParams::new());
                }
            }
        });

        let db = open_request
            .await
            .map_err(|e| anyhow!("Failed to await DB open: {:?}", e))?;
        Ok(Self { db })
    }

    fn store(&self, mode: TransactionMode) -> Result<(idb::Transaction, idb::ObjectStore)> {
        let transaction = self
            .db
            .transaction(&[STORE_NAME], mode)
            .map_err(|e| anyhow!("Tx error: {:?}", e))?;
        let store = transaction
            .object_store(STORE_NAME)
            .map_err(|e| anyhow!("Store error: {:?}", e))?;
        Ok((transaction, store))
    }
}

#[cfg(target_arch = "wasm32")]
#[async_trait(?Send)]
impl Storage for WebStorage {
    async fn read(&self, path: &str) -> Result<Vec<u8>> {
        let (_tx, store) = self.store(TransactionMode::ReadOnly)?;
        let value = store
            .get(JsValue::from_str(path))
            .map_err(|e| anyhow!("Get error: {:?}", e))?
            .await
            .map_err(|e| anyhow!("Get await error: {:?}", e))?;

        match value {
            Some(v) => Ok(js_sys::Uint8Array::new(&v).to_vec()),
            None => Err(anyhow!("Key not found: {}", path)),
        }
    }

    async fn write(&self, path: &str, content: &[u8]) -> Result<()> {
        let (transaction, store) = self.store(TransactionMode::ReadWrite)?;
        let array = js_sys::Uint8Array::from(content);

        store
            .put(&array, Some(&JsValue::from_str(path)))
            .map_err(|e| anyhow!("Put error: {:?}", e))?
            .await
            .map_err(|e| anyhow!("Put await error: {:?}", e))?;

        transaction
            .commit()
            .map_err(|e| anyhow!("Commit error: {:?}", e))?
            .await
            .map_err(|e| anyhow!("Commit await error: {:?}", e))?;
        Ok(())
    }

    async fn delete(&self, path: &str) -> Result<()> {
        let (transaction, store) = self.store(TransactionMode::ReadWrite)?;
        store
            .delete(JsValue::from_str(path))
            .map_err(|e| anyhow!("Delete error: {:?}", e))?
            .await
            .map_err(|e| anyhow!("Delete await error: {:?}", e))?;

        transaction
            .commit()
            .map_err(|e| anyhow!("Commit error: {:?}", e))?
            .await
            .map_err(|e| anyhow!("Commit await error: {:?}", e))?;
        Ok(())
    }

    async fn exists(&self, path: &str) -> Result<bool> {
        let (_tx, store) = self.store(TransactionMode::ReadOnly)?;
        let key = store
            .get_key(JsValue::from_str(path))
            .map_err(|e| anyhow!("GetKey error: {:?}", e))?
            .await
            .map_err(|e| anyhow!("GetKey await error: {:?}", e))?;
        Ok(key.is_some())
    }
}

#[cfg(all(test, not(target_arch = "wasm32")))]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_native_storage_roundtrip_and_delete() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/key.json");
        let path = path.to_str().unwrap();
        let storage = NativeStorage::new();

        assert!(!storage.exists(path).await.unwrap());
        storage.write(path, b"{\"a\":1}").await.unwrap();
        assert!(storage.exists(path).await.unwrap());
        assert_eq!(storage.read(path).await.unwrap(), b"{\"a\":1}");

        storage.delete(path).await.unwrap();
        assert!(!storage.exists(path).await.unwrap());
        // deleting a missing key is a no-op
        storage.delete(path).await.unwrap();
    }
}
