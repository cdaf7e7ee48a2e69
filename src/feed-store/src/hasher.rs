use sha2::{Digest, Sha256};

use crate::ChunkAddress;

const DOMAIN_PLAIN: u8 = 0x00;
const DOMAIN_ENCRYPTED: u8 = 0x01;

/// Derives chunk addresses from content. Plain and encrypted uploads hash
/// under distinct domain tags, so the same payload never lands on the same
/// address across the two schemes.
pub struct ChunkHasher {
    domain: u8,
}

impl ChunkHasher {
    pub fn new(encrypted: bool) -> Self {
        Self {
            domain: if encrypted {
                DOMAIN_ENCRYPTED
            } else {
                DOMAIN_PLAIN
            },
        }
    }

    pub fn calc_address(&self, data: &[u8]) -> ChunkAddress {
        let mut hasher = Sha256::new();
        hasher.update([self.domain]);
        hasher.update(data);
        ChunkAddress::from_bytes(hasher.finalize().into())
    }
}
