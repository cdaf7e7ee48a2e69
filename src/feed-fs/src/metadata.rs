use serde::{Deserialize, Serialize};

use crate::{DriverError, DriverResult};

/// Per-node metadata record, published under the node's `mtdt` topic.
/// Directories carry their children as basenames in insertion order; files
/// carry their payload size.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
    pub is_dir: bool,
    pub path: String,
    pub mod_time: u64,
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub children: Vec<String>,
}

impl Metadata {
    pub fn new_dir(path: &str, mod_time: u64) -> Self {
        Self {
            is_dir: true,
            path: path.to_string(),
            mod_time,
            size: 0,
            children: Vec::new(),
        }
    }

    pub fn new_file(path: &str, size: u64, mod_time: u64) -> Self {
        Self {
            is_dir: false,
            path: path.to_string(),
            mod_time,
            size,
            children: Vec::new(),
        }
    }

    pub fn has_child(&self, name: &str) -> bool {
        self.children.iter().any(|child| child == name)
    }

    /// Append a child basename, preserving insertion order. Returns false
    /// when the name is already listed.
    pub fn add_child(&mut self, name: &str) -> bool {
        if self.has_child(name) {
            return false;
        }
        self.children.push(name.to_string());
        true
    }

    pub fn remove_child(&mut self, name: &str) -> bool {
        let before = self.children.len();
        self.children.retain(|child| child != name);
        self.children.len() != before
    }

    pub fn encode(&self) -> DriverResult<Vec<u8>> {
        serde_json::to_vec(self)
            .map_err(|e| DriverError::ChunkIo(format!("encode metadata failed: {}", e)))
    }

    pub fn decode(raw: &[u8]) -> DriverResult<Self> {
        serde_json::from_slice(raw)
            .map_err(|e| DriverError::ChunkIo(format!("decode metadata failed: {}", e)))
    }
}
