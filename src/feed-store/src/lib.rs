mod chunk;
mod feed;
mod hasher;
mod memory;
mod splitter;

pub use chunk::*;
pub use feed::*;
pub use hasher::*;
pub use memory::*;
pub use splitter::*;

#[macro_use]
extern crate log;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("I/O error: {0}")]
    IoError(String),
    #[error("invalid data: {0}")]
    InvalidData(String),
    #[error("invalid param: {0}")]
    InvalidParam(String),
    #[error("internal error: {0}")]
    Internal(String),
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound(_))
    }
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Largest payload the splitter stores as a single chunk; anything bigger is
/// cut into pieces of this size.
pub const CHUNK_NORMAL_SIZE: usize = 64 * 1024;

pub fn unix_timestamp() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
