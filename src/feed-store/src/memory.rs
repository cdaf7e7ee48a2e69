use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::{ChunkAddress, ChunkStore, StoreError, StoreResult};

/// In-process chunk store keyed by content address.
#[derive(Default)]
pub struct MemChunkStore {
    chunks: Mutex<HashMap<ChunkAddress, Vec<u8>>>,
}

impl MemChunkStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn chunk_count(&self) -> usize {
        self.chunks.lock().map(|chunks| chunks.len()).unwrap_or(0)
    }
}

#[async_trait]
impl ChunkStore for MemChunkStore {
    async fn put_chunk(&self, address: &ChunkAddress, data: &[u8]) -> StoreResult<()> {
        let mut chunks = self
            .chunks
            .lock()
            .map_err(|_| StoreError::Internal("chunk map lock poisoned".to_string()))?;
        chunks.entry(*address).or_insert_with(|| data.to_vec());
        Ok(())
    }

    async fn get_chunk(&self, address: &ChunkAddress) -> StoreResult<Vec<u8>> {
        let chunks = self
            .chunks
            .lock()
            .map_err(|_| StoreError::Internal("chunk map lock poisoned".to_string()))?;
        chunks
            .get(address)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("chunk not found: {}", address)))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[tokio::test]
    async fn test_put_get_chunk() {
        let store = MemChunkStore::new();
        let address = ChunkAddress::from_bytes([3; 32]);
        store.put_chunk(&address, b"chunk body").await.unwrap();
        assert_eq!(store.get_chunk(&address).await.unwrap(), b"chunk body");
        assert_eq!(store.chunk_count(), 1);
    }

    #[tokio::test]
    async fn test_get_missing_chunk() {
        let store = MemChunkStore::new();
        let err = store
            .get_chunk(&ChunkAddress::from_bytes([4; 32]))
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_put_chunk_idempotent() {
        let store = MemChunkStore::new();
        let address = ChunkAddress::from_bytes([5; 32]);
        store.put_chunk(&address, b"first").await.unwrap();
        store.put_chunk(&address, b"first").await.unwrap();
        assert_eq!(store.chunk_count(), 1);
    }
}
