use std::io::Cursor;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::{
    ChunkAddress, ChunkHasher, ChunkReader, ChunkStore, StoreError, StoreResult,
    CHUNK_NORMAL_SIZE,
};

// Root chunk framing: one tag byte, then either the payload itself or the
// JSON chunk list for payloads larger than CHUNK_NORMAL_SIZE.
const ROOT_TAG_RAW: u8 = 0x00;
const ROOT_TAG_LIST: u8 = 0x01;

/// One flat list of data chunks; every chunk address is recoverable from a
/// single root read.
#[derive(Debug, Serialize, Deserialize)]
struct ChunkList {
    total_size: u64,
    chunks: Vec<ChunkAddress>,
}

/// Write side of the chunk store: cuts a payload into chunks and returns the
/// root address the payload can later be joined back from.
pub struct Splitter {
    store: Arc<dyn ChunkStore>,
}

impl Splitter {
    pub fn new(store: Arc<dyn ChunkStore>) -> Self {
        Self { store }
    }

    pub async fn split(&self, data: &[u8], encrypt: bool) -> StoreResult<ChunkAddress> {
        let hasher = ChunkHasher::new(encrypt);
        if data.len() <= CHUNK_NORMAL_SIZE {
            let mut root = Vec::with_capacity(data.len() + 1);
            root.push(ROOT_TAG_RAW);
            root.extend_from_slice(data);
            return self.put_root(&hasher, &root).await;
        }

        let mut list = ChunkList {
            total_size: data.len() as u64,
            chunks: Vec::with_capacity(data.len().div_ceil(CHUNK_NORMAL_SIZE)),
        };
        for piece in data.chunks(CHUNK_NORMAL_SIZE) {
            let address = hasher.calc_address(piece);
            self.store.put_chunk(&address, piece).await?;
            list.chunks.push(address);
        }
        let body = serde_json::to_vec(&list)
            .map_err(|e| StoreError::Internal(format!("encode chunk list failed: {}", e)))?;
        let mut root = Vec::with_capacity(body.len() + 1);
        root.push(ROOT_TAG_LIST);
        root.extend_from_slice(&body);
        self.put_root(&hasher, &root).await
    }

    async fn put_root(&self, hasher: &ChunkHasher, root: &[u8]) -> StoreResult<ChunkAddress> {
        let address = hasher.calc_address(root);
        if address.is_zero() {
            // The zero address is the "no reference" sentinel.
            return Err(StoreError::Internal(
                "hasher produced the reserved zero address".to_string(),
            ));
        }
        self.store.put_chunk(&address, root).await?;
        Ok(address)
    }
}

/// Read side: resolves a root address back into the payload bytes or a
/// seekable stream over them.
pub struct Joiner {
    store: Arc<dyn ChunkStore>,
}

impl Joiner {
    pub fn new(store: Arc<dyn ChunkStore>) -> Self {
        Self { store }
    }

    pub async fn open(&self, address: &ChunkAddress) -> StoreResult<ChunkReader> {
        let data = self.read_all(address).await?;
        Ok(Box::pin(Cursor::new(data)))
    }

    pub async fn read_all(&self, address: &ChunkAddress) -> StoreResult<Vec<u8>> {
        let root = self.store.get_chunk(address).await?;
        let (tag, body) = root
            .split_first()
            .ok_or_else(|| StoreError::InvalidData(format!("empty root chunk: {}", address)))?;
        match *tag {
            ROOT_TAG_RAW => Ok(body.to_vec()),
            ROOT_TAG_LIST => {
                let list: ChunkList = serde_json::from_slice(body).map_err(|e| {
                    warn!("joiner: root {} carries a bad chunk list: {}", address, e);
                    StoreError::InvalidData(format!("decode chunk list failed: {}", e))
                })?;
                let mut data = Vec::with_capacity(list.total_size as usize);
                for chunk in &list.chunks {
                    data.extend_from_slice(&self.store.get_chunk(chunk).await?);
                }
                if data.len() as u64 != list.total_size {
                    return Err(StoreError::InvalidData(format!(
                        "chunk list size mismatch: expected {}, joined {}",
                        list.total_size,
                        data.len()
                    )));
                }
                Ok(data)
            }
            other => Err(StoreError::InvalidData(format!(
                "unknown root chunk tag {:#04x}: {}",
                other, address
            ))),
        }
    }
}
