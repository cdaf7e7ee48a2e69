use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::{ChunkAddress, StoreError, StoreResult};

pub const OWNER_ID_LEN: usize = 20;

/// Account identity owning a feed namespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OwnerId([u8; OWNER_ID_LEN]);

impl OwnerId {
    pub fn from_bytes(bytes: [u8; OWNER_ID_LEN]) -> Self {
        Self(bytes)
    }

    pub fn from_hex(s: &str) -> StoreResult<Self> {
        let s = s.strip_prefix("0x").unwrap_or(s);
        let raw = hex::decode(s)
            .map_err(|e| StoreError::InvalidParam(format!("bad owner id hex: {}", e)))?;
        let bytes: [u8; OWNER_ID_LEN] = raw.try_into().map_err(|_| {
            StoreError::InvalidParam(format!("owner id must be {} bytes", OWNER_ID_LEN))
        })?;
        Ok(Self(bytes))
    }

    pub fn as_bytes(&self) -> &[u8; OWNER_ID_LEN] {
        &self.0
    }
}

impl std::fmt::Display for OwnerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

/// Append-only publish side of a pointer feed. An entry binds a chunk
/// address to `(topic, time)`; publishing the zero address marks the topic
/// as holding no reference.
#[async_trait]
pub trait FeedPublisher: Send + Sync {
    async fn publish(&self, topic: &str, time: u64, address: &ChunkAddress) -> StoreResult<()>;
}

/// Lookup side of a pointer feed: the most recent entry at or before the
/// query time. A zero address is a valid answer and is returned as-is.
#[async_trait]
pub trait FeedLookuper: Send + Sync {
    async fn lookup(&self, topic: &str, time: u64) -> StoreResult<ChunkAddress>;
}

/// In-process feed service: one `(time, address)` log per topic, scoped to a
/// single owner account.
pub struct MemFeedService {
    owner: OwnerId,
    feeds: Mutex<HashMap<String, Vec<(u64, ChunkAddress)>>>,
}

impl MemFeedService {
    pub fn new(owner: OwnerId) -> Self {
        Self {
            owner,
            feeds: Mutex::new(HashMap::new()),
        }
    }

    pub fn owner(&self) -> OwnerId {
        self.owner
    }

    fn feed_key(&self, topic: &str) -> String {
        format!("{}:{}", self.owner, topic)
    }
}

#[async_trait]
impl FeedPublisher for MemFeedService {
    async fn publish(&self, topic: &str, time: u64, address: &ChunkAddress) -> StoreResult<()> {
        let mut feeds = self
            .feeds
            .lock()
            .map_err(|_| StoreError::Internal("feed log lock poisoned".to_string()))?;
        feeds.entry(self.feed_key(topic)).or_default().push((time, *address));
        debug!("feed publish: {} @ {} -> {}", topic, time, address);
        Ok(())
    }
}

#[async_trait]
impl FeedLookuper for MemFeedService {
    async fn lookup(&self, topic: &str, time: u64) -> StoreResult<ChunkAddress> {
        let feeds = self
            .feeds
            .lock()
            .map_err(|_| StoreError::Internal("feed log lock poisoned".to_string()))?;
        let log = feeds
            .get(&self.feed_key(topic))
            .ok_or_else(|| StoreError::NotFound(format!("no feed for topic: {}", topic)))?;
        // max_by_key keeps the last of equally-timed entries, so the most
        // recent publish within one second wins.
        log.iter()
            .filter(|entry| entry.0 <= time)
            .max_by_key(|entry| entry.0)
            .map(|entry| entry.1)
            .ok_or_else(|| {
                StoreError::NotFound(format!("no feed entry at or before {}: {}", time, topic))
            })
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn create_feed() -> MemFeedService {
        MemFeedService::new(OwnerId::from_bytes([0x11; OWNER_ID_LEN]))
    }

    fn address(seed: u8) -> ChunkAddress {
        ChunkAddress::from_bytes([seed; 32])
    }

    #[test]
    fn test_owner_id_hex_round_trip() {
        let owner = OwnerId::from_bytes([0xcd; OWNER_ID_LEN]);
        let parsed = OwnerId::from_hex(&owner.to_string()).unwrap();
        assert_eq!(owner, parsed);
        assert!(OwnerId::from_hex("abcd").is_err());
    }

    #[tokio::test]
    async fn test_publish_lookup_latest() {
        let feed = create_feed();
        feed.publish("/x/data", 10, &address(1)).await.unwrap();
        feed.publish("/x/data", 20, &address(2)).await.unwrap();
        assert_eq!(feed.lookup("/x/data", 25).await.unwrap(), address(2));
    }

    #[tokio::test]
    async fn test_lookup_at_or_before() {
        let feed = create_feed();
        feed.publish("/x/data", 10, &address(1)).await.unwrap();
        feed.publish("/x/data", 20, &address(2)).await.unwrap();
        assert_eq!(feed.lookup("/x/data", 15).await.unwrap(), address(1));
        assert_eq!(feed.lookup("/x/data", 20).await.unwrap(), address(2));
    }

    #[tokio::test]
    async fn test_lookup_before_first_entry() {
        let feed = create_feed();
        feed.publish("/x/data", 10, &address(1)).await.unwrap();
        let err = feed.lookup("/x/data", 5).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_lookup_missing_topic() {
        let feed = create_feed();
        let err = feed.lookup("/missing/data", 100).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_same_time_later_publish_wins() {
        let feed = create_feed();
        feed.publish("/x/mtdt", 10, &address(1)).await.unwrap();
        feed.publish("/x/mtdt", 10, &address(2)).await.unwrap();
        assert_eq!(feed.lookup("/x/mtdt", 10).await.unwrap(), address(2));
    }

    #[tokio::test]
    async fn test_zero_address_passes_through() {
        let feed = create_feed();
        feed.publish("/x/data", 10, &ChunkAddress::ZERO).await.unwrap();
        assert!(feed.lookup("/x/data", 10).await.unwrap().is_zero());
    }
}
