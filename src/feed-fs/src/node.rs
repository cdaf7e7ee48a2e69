use std::sync::Arc;

use feed_store::{
    unix_timestamp, ChunkAddress, ChunkReader, ChunkStore, FeedLookuper, FeedPublisher, Joiner,
    Splitter, StoreError,
};

use crate::path::topic;
use crate::{DriverError, DriverResult, Metadata, DATA_SUFFIX, METADATA_SUFFIX};

/// Reads and writes one node's `data` and `mtdt` pointers on top of the
/// chunk store and the feed service. Deletion publishes the zero address;
/// the pointer log itself is append-only.
pub struct NodeStore {
    splitter: Splitter,
    joiner: Joiner,
    publisher: Arc<dyn FeedPublisher>,
    lookuper: Arc<dyn FeedLookuper>,
    encrypt: bool,
}

impl NodeStore {
    pub fn new(
        store: Arc<dyn ChunkStore>,
        publisher: Arc<dyn FeedPublisher>,
        lookuper: Arc<dyn FeedLookuper>,
        encrypt: bool,
    ) -> Self {
        Self {
            splitter: Splitter::new(store.clone()),
            joiner: Joiner::new(store),
            publisher,
            lookuper,
            encrypt,
        }
    }

    /// Latest metadata record for `path`. A missing topic and a nullified
    /// pointer both read as "no such node".
    pub async fn get_metadata(&self, path: &str) -> DriverResult<Metadata> {
        let topic = topic(path, METADATA_SUFFIX);
        let address = self
            .lookuper
            .lookup(&topic, unix_timestamp())
            .await
            .map_err(|e| match e {
                StoreError::NotFound(_) => DriverError::not_found(path),
                other => DriverError::Feed(format!("lookup {} failed: {}", topic, other)),
            })?;
        if address.is_zero() {
            return Err(DriverError::not_found(path));
        }
        let raw = self.joiner.read_all(&address).await.map_err(|e| {
            warn!("join metadata for {} failed: {}", path, e);
            DriverError::ChunkIo(format!("join metadata for {} failed: {}", path, e))
        })?;
        Metadata::decode(&raw)
    }

    /// Publish a node's metadata record. Tree upkeep is the caller's job.
    pub async fn put_metadata(&self, path: &str, meta: &Metadata) -> DriverResult<()> {
        let raw = meta.encode()?;
        let address = self.splitter.split(&raw, self.encrypt).await.map_err(|e| {
            DriverError::ChunkIo(format!("split metadata for {} failed: {}", path, e))
        })?;
        self.publish(path, METADATA_SUFFIX, &address).await
    }

    /// Latest data pointer, or None when the topic has no entry yet. A zero
    /// address (empty or deleted payload) is passed through.
    pub async fn lookup_data(&self, path: &str) -> DriverResult<Option<ChunkAddress>> {
        let topic = topic(path, DATA_SUFFIX);
        match self.lookuper.lookup(&topic, unix_timestamp()).await {
            Ok(address) => Ok(Some(address)),
            Err(StoreError::NotFound(_)) => Ok(None),
            Err(e) => Err(DriverError::Feed(format!("lookup {} failed: {}", topic, e))),
        }
    }

    pub async fn get_data(&self, path: &str) -> DriverResult<Vec<u8>> {
        let address = self
            .lookup_data(path)
            .await?
            .ok_or_else(|| DriverError::not_found(path))?;
        if address.is_zero() {
            // Empty-file sentinel.
            return Ok(Vec::new());
        }
        self.joiner
            .read_all(&address)
            .await
            .map_err(|e| DriverError::ChunkIo(format!("join data for {} failed: {}", path, e)))
    }

    /// Store a payload and point `path/data` at it. Empty payloads publish
    /// the zero address instead of storing a chunk.
    pub async fn put_data(&self, path: &str, data: &[u8]) -> DriverResult<()> {
        if data.is_empty() {
            return self.publish(path, DATA_SUFFIX, &ChunkAddress::ZERO).await;
        }
        let address = self
            .splitter
            .split(data, self.encrypt)
            .await
            .map_err(|e| DriverError::ChunkIo(format!("split data for {} failed: {}", path, e)))?;
        self.publish(path, DATA_SUFFIX, &address).await
    }

    pub async fn delete_data(&self, path: &str) -> DriverResult<()> {
        self.publish(path, DATA_SUFFIX, &ChunkAddress::ZERO).await
    }

    pub async fn delete_metadata(&self, path: &str) -> DriverResult<()> {
        self.publish(path, METADATA_SUFFIX, &ChunkAddress::ZERO).await
    }

    /// Open a seekable reader over a data pointer.
    pub async fn open_data(&self, address: &ChunkAddress) -> DriverResult<ChunkReader> {
        self.joiner
            .open(address)
            .await
            .map_err(|e| DriverError::ChunkIo(format!("open joiner for {} failed: {}", address, e)))
    }

    /// Publish an existing chunk address under one of `path`'s topics.
    pub async fn publish(
        &self,
        path: &str,
        suffix: &str,
        address: &ChunkAddress,
    ) -> DriverResult<()> {
        let topic = topic(path, suffix);
        self.publisher
            .publish(&topic, unix_timestamp(), address)
            .await
            .map_err(|e| {
                warn!("publish {} failed: {}", topic, e);
                DriverError::Feed(format!("publish {} failed: {}", topic, e))
            })
    }
}
