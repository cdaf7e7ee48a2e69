use std::pin::Pin;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncRead, AsyncSeek};

use crate::{StoreError, StoreResult};

pub const CHUNK_ADDRESS_LEN: usize = 32;

/// Content address of a stored chunk. The all-zero value is reserved and
/// never names live content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChunkAddress([u8; CHUNK_ADDRESS_LEN]);

impl ChunkAddress {
    pub const ZERO: ChunkAddress = ChunkAddress([0u8; CHUNK_ADDRESS_LEN]);

    pub fn from_bytes(bytes: [u8; CHUNK_ADDRESS_LEN]) -> Self {
        Self(bytes)
    }

    pub fn from_hex(s: &str) -> StoreResult<Self> {
        let raw = hex::decode(s)
            .map_err(|e| StoreError::InvalidParam(format!("bad chunk address hex: {}", e)))?;
        let bytes: [u8; CHUNK_ADDRESS_LEN] = raw.try_into().map_err(|_| {
            StoreError::InvalidParam(format!(
                "chunk address must be {} bytes",
                CHUNK_ADDRESS_LEN
            ))
        })?;
        Ok(Self(bytes))
    }

    pub fn as_bytes(&self) -> &[u8; CHUNK_ADDRESS_LEN] {
        &self.0
    }

    pub fn is_zero(&self) -> bool {
        *self == Self::ZERO
    }
}

impl std::fmt::Display for ChunkAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl Serialize for ChunkAddress {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(self.0))
    }
}

impl<'de> Deserialize<'de> for ChunkAddress {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        ChunkAddress::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

/// Byte source that can both read and seek.
pub trait ChunkReadSeek: AsyncRead + AsyncSeek {}

impl<T: AsyncRead + AsyncSeek> ChunkReadSeek for T {}

impl std::fmt::Debug for dyn ChunkReadSeek + Send {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("dyn ChunkReadSeek").finish()
    }
}

pub type ChunkReader = Pin<Box<dyn ChunkReadSeek + Send>>;

/// The immutable blob store both the splitter and the feed payloads persist
/// into. Writes are idempotent: the address is derived from the content.
#[async_trait]
pub trait ChunkStore: Send + Sync {
    async fn put_chunk(&self, address: &ChunkAddress, data: &[u8]) -> StoreResult<()>;

    async fn get_chunk(&self, address: &ChunkAddress) -> StoreResult<Vec<u8>>;
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_chunk_address_hex_round_trip() {
        let address = ChunkAddress::from_bytes([0xab; CHUNK_ADDRESS_LEN]);
        let parsed = ChunkAddress::from_hex(&address.to_string()).unwrap();
        assert_eq!(address, parsed);
    }

    #[test]
    fn test_chunk_address_bad_hex() {
        assert!(ChunkAddress::from_hex("zz").is_err());
        assert!(ChunkAddress::from_hex("abcd").is_err());
    }

    #[test]
    fn test_zero_address() {
        assert!(ChunkAddress::ZERO.is_zero());
        assert!(!ChunkAddress::from_bytes([1; CHUNK_ADDRESS_LEN]).is_zero());
    }

    #[test]
    fn test_chunk_address_serde() {
        let address = ChunkAddress::from_bytes([7; CHUNK_ADDRESS_LEN]);
        let json = serde_json::to_string(&address).unwrap();
        let back: ChunkAddress = serde_json::from_str(&json).unwrap();
        assert_eq!(address, back);
    }
}
