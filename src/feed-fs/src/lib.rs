mod driver;
mod metadata;
mod node;
mod path;
mod tree;
mod writer;


pub use driver::*;
pub use metadata::*;
pub use node::*;
pub use path::{basename, is_valid_path, join_path, parent, ROOT_PATH};
pub use writer::*;

#[macro_use]
extern crate log;

use thiserror::Error;

/// Name the driver registers under.
pub const DRIVER_NAME: &str = "feedfs";

/// Feed suffix carrying a node's payload pointer.
pub const DATA_SUFFIX: &str = "data";
/// Feed suffix carrying a node's metadata pointer.
pub const METADATA_SUFFIX: &str = "mtdt";

#[derive(Error, Debug)]
pub enum DriverError {
    #[error("invalid path: {path}")]
    InvalidPath { path: String },
    #[error("path not found: {path}")]
    PathNotFound { path: String },
    #[error("invalid offset {offset}: {path}")]
    InvalidOffset { path: String, offset: i64 },
    #[error("chunk I/O error: {0}")]
    ChunkIo(String),
    #[error("feed error: {0}")]
    Feed(String),
    #[error("invalid config: {0}")]
    Config(String),
    #[error("writer state error: {0}")]
    WriterState(&'static str),
}

impl DriverError {
    pub(crate) fn invalid_path(path: &str) -> Self {
        DriverError::InvalidPath {
            path: path.to_string(),
        }
    }

    pub(crate) fn not_found(path: &str) -> Self {
        DriverError::PathNotFound {
            path: path.to_string(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, DriverError::PathNotFound { .. })
    }
}

pub type DriverResult<T> = std::result::Result<T, DriverError>;
