use std::future::Future;
use std::io::Cursor;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use feed_store::{
    unix_timestamp, ChunkReader, ChunkStore, FeedLookuper, FeedPublisher, MemFeedService, OwnerId,
};
use tokio::io::{AsyncSeekExt, SeekFrom};

use crate::path::{self, ROOT_PATH};
use crate::writer::{FeedFileWriter, FileWriter};
use crate::{tree, DriverError, DriverResult, Metadata, NodeStore, DATA_SUFFIX, DRIVER_NAME};

/// Stat result for one node.
#[derive(Debug, Clone, PartialEq)]
pub struct FileInfo {
    pub path: String,
    pub is_dir: bool,
    pub size: u64,
    pub mod_time: u64,
}

impl FileInfo {
    fn from_metadata(path: &str, meta: &Metadata) -> Self {
        Self {
            path: path.to_string(),
            is_dir: meta.is_dir,
            size: if meta.is_dir { 0 } else { meta.size },
            mod_time: meta.mod_time,
        }
    }
}

/// The registry-facing storage surface. Reads take the driver lock shared,
/// every mutation takes it exclusive for the whole call, pointer publishes
/// included.
#[async_trait]
pub trait StorageDriver: Send + Sync {
    fn name(&self) -> &'static str;

    async fn get_content(&self, path: &str) -> DriverResult<Vec<u8>>;

    async fn put_content(&self, path: &str, content: &[u8]) -> DriverResult<()>;

    /// Seekable stream over a file's payload, positioned at `offset`.
    async fn reader(&self, path: &str, offset: i64) -> DriverResult<ChunkReader>;

    /// Buffered writer for `path`; `append` seeds the buffer from the
    /// current payload. Nothing is visible until the writer commits.
    async fn writer(&self, path: &str, append: bool) -> DriverResult<Box<dyn FileWriter>>;

    async fn stat(&self, path: &str) -> DriverResult<FileInfo>;

    /// Direct children of a directory, as full paths in insertion order.
    async fn list(&self, path: &str) -> DriverResult<Vec<String>>;

    /// Nullify the pointers of `path` and everything beneath it, then unlink
    /// it from its parent.
    async fn delete(&self, path: &str) -> DriverResult<()>;

    /// Re-home the subtree rooted at `source` under `dest`. Data pointers
    /// are copied, chunks are shared; the source pointers are nullified.
    async fn move_to(&self, source: &str, dest: &str) -> DriverResult<()>;

    /// Feed-addressed content has no URL scheme to hand out.
    async fn redirect_url(&self, path: &str) -> DriverResult<Option<String>>;

    /// Depth-first traversal from `path`, children in list order. The
    /// visitor returns false to stop early.
    async fn walk(
        &self,
        path: &str,
        visit: &mut (dyn for<'a> FnMut(&'a FileInfo) -> bool + Send),
    ) -> DriverResult<()>;
}

/// Construction parameters, mirroring the host registry's parameter map.
/// Every field is required; `from_params` rejects a missing one.
#[derive(Default)]
pub struct DriverParams {
    /// Hex-encoded 20-byte account identity owning the feed namespace.
    pub addr: Option<String>,
    pub store: Option<Arc<dyn ChunkStore>>,
    pub encrypt: Option<bool>,
}

pub(crate) struct DriverInner {
    pub(crate) lock: tokio::sync::RwLock<()>,
    pub(crate) nodes: NodeStore,
}

/// Storage driver synthesising a mutable, hierarchical filesystem from the
/// immutable chunk store and the pointer-feed service.
#[derive(Clone)]
pub struct FeedDriver {
    inner: Arc<DriverInner>,
}

impl std::fmt::Debug for FeedDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FeedDriver").finish()
    }
}

impl FeedDriver {
    /// Build a driver on explicit service handles and bootstrap the root
    /// directory metadata.
    pub async fn new(
        store: Arc<dyn ChunkStore>,
        publisher: Arc<dyn FeedPublisher>,
        lookuper: Arc<dyn FeedLookuper>,
        encrypt: bool,
    ) -> DriverResult<Self> {
        let inner = Arc::new(DriverInner {
            lock: tokio::sync::RwLock::new(()),
            nodes: NodeStore::new(store, publisher, lookuper, encrypt),
        });
        {
            let _guard = inner.lock.write().await;
            tree::ensure_root(&inner.nodes).await?;
        }
        debug!("feed driver created");
        Ok(Self { inner })
    }

    /// Factory entry point: validate the parameter map and wire an
    /// in-process feed service owned by `addr`.
    pub async fn from_params(params: DriverParams) -> DriverResult<Self> {
        let addr = params
            .addr
            .ok_or_else(|| DriverError::Config("missing 'addr' parameter".to_string()))?;
        let owner = OwnerId::from_hex(&addr)
            .map_err(|e| DriverError::Config(format!("invalid 'addr' parameter: {}", e)))?;
        let store = params
            .store
            .ok_or_else(|| DriverError::Config("missing 'store' parameter".to_string()))?;
        let encrypt = params
            .encrypt
            .ok_or_else(|| DriverError::Config("missing 'encrypt' parameter".to_string()))?;
        let feeds = Arc::new(MemFeedService::new(owner));
        Self::new(store, feeds.clone(), feeds, encrypt).await
    }
}

#[async_trait]
impl StorageDriver for FeedDriver {
    fn name(&self) -> &'static str {
        DRIVER_NAME
    }

    async fn get_content(&self, path: &str) -> DriverResult<Vec<u8>> {
        let _guard = self.inner.lock.read().await;
        path::ensure_valid(path)?;
        let nodes = &self.inner.nodes;
        if !tree::child_exists(nodes, path).await {
            return Err(DriverError::not_found(path));
        }
        let meta = nodes.get_metadata(path).await?;
        if meta.is_dir {
            return Err(DriverError::invalid_path(path));
        }
        nodes.get_data(path).await
    }

    async fn put_content(&self, path: &str, content: &[u8]) -> DriverResult<()> {
        let _guard = self.inner.lock.write().await;
        path::ensure_valid(path)?;
        let nodes = &self.inner.nodes;
        nodes.put_data(path, content).await?;
        let meta = Metadata::new_file(path, content.len() as u64, unix_timestamp());
        nodes.put_metadata(path, &meta).await?;
        tree::link_to_ancestors(nodes, path).await?;
        info!("put content: {} ({} bytes)", path, content.len());
        Ok(())
    }

    async fn reader(&self, path: &str, offset: i64) -> DriverResult<ChunkReader> {
        let _guard = self.inner.lock.read().await;
        if offset < 0 {
            return Err(DriverError::InvalidOffset {
                path: path.to_string(),
                offset,
            });
        }
        path::ensure_valid(path)?;
        let nodes = &self.inner.nodes;
        if !tree::child_exists(nodes, path).await {
            return Err(DriverError::not_found(path));
        }
        let address = nodes
            .lookup_data(path)
            .await?
            .ok_or_else(|| DriverError::not_found(path))?;
        let mut reader: ChunkReader = if address.is_zero() {
            Box::pin(Cursor::new(Vec::new()))
        } else {
            nodes.open_data(&address).await?
        };
        reader.seek(SeekFrom::Start(offset as u64)).await.map_err(|e| {
            DriverError::ChunkIo(format!("seek to {} in {} failed: {}", offset, path, e))
        })?;
        Ok(reader)
    }

    async fn writer(&self, path: &str, append: bool) -> DriverResult<Box<dyn FileWriter>> {
        let _guard = self.inner.lock.write().await;
        path::ensure_valid(path)?;
        let nodes = &self.inner.nodes;
        let buffer = if append {
            nodes.get_data(path).await?
        } else {
            Vec::new()
        };
        Ok(Box::new(FeedFileWriter::new(
            self.inner.clone(),
            path,
            buffer,
        )))
    }

    async fn stat(&self, path: &str) -> DriverResult<FileInfo> {
        let _guard = self.inner.lock.read().await;
        path::ensure_valid_or_root(path)?;
        let meta = self.inner.nodes.get_metadata(path).await?;
        Ok(FileInfo::from_metadata(path, &meta))
    }

    async fn list(&self, path: &str) -> DriverResult<Vec<String>> {
        let _guard = self.inner.lock.read().await;
        path::ensure_valid_or_root(path)?;
        let nodes = &self.inner.nodes;
        if !tree::child_exists(nodes, path).await {
            return Err(DriverError::not_found(path));
        }
        let meta = nodes.get_metadata(path).await?;
        if !meta.is_dir {
            return Err(DriverError::invalid_path(path));
        }
        Ok(meta
            .children
            .iter()
            .map(|child| path::join_path(path, child))
            .collect())
    }

    async fn delete(&self, path: &str) -> DriverResult<()> {
        let _guard = self.inner.lock.write().await;
        path::ensure_valid_or_root(path)?;
        let nodes = &self.inner.nodes;
        let meta = nodes.get_metadata(path).await?;
        if path != ROOT_PATH {
            tree::detach_child(nodes, path).await?;
        }
        delete_subtree(nodes, path.to_string(), meta).await?;
        info!("deleted: {}", path);
        Ok(())
    }

    async fn move_to(&self, source: &str, dest: &str) -> DriverResult<()> {
        let _guard = self.inner.lock.write().await;
        path::ensure_valid(source)?;
        path::ensure_valid(dest)?;
        let nodes = &self.inner.nodes;
        // Fail before touching anything if the source is gone.
        nodes.get_metadata(source).await?;

        // Unlink from the source parent first; the source subtree stays
        // readable until its pointers are nullified at the end.
        tree::detach_child(nodes, source).await?;

        let dest_parent = path::parent(dest);
        let mut parent_meta = match nodes.get_metadata(dest_parent).await {
            Ok(meta) => meta,
            Err(DriverError::PathNotFound { .. }) => {
                Metadata::new_dir(dest_parent, unix_timestamp())
            }
            Err(e) => return Err(e),
        };
        if parent_meta.add_child(path::basename(dest)) {
            parent_meta.mod_time = unix_timestamp();
        }
        nodes.put_metadata(dest_parent, &parent_meta).await?;
        tree::link_to_ancestors(nodes, dest_parent).await?;

        move_subtree(nodes, source.to_string(), dest.to_string()).await?;
        info!("moved: {} -> {}", source, dest);
        Ok(())
    }

    async fn redirect_url(&self, _path: &str) -> DriverResult<Option<String>> {
        Ok(None)
    }

    async fn walk(
        &self,
        path: &str,
        visit: &mut (dyn for<'a> FnMut(&'a FileInfo) -> bool + Send),
    ) -> DriverResult<()> {
        let _guard = self.inner.lock.read().await;
        path::ensure_valid_or_root(path)?;
        let nodes = &self.inner.nodes;
        if !tree::child_exists(nodes, path).await {
            return Err(DriverError::not_found(path));
        }
        walk_subtree(nodes, path.to_string(), visit).await?;
        Ok(())
    }
}

type BoxedTreeOp<'a, T> = Pin<Box<dyn Future<Output = DriverResult<T>> + Send + 'a>>;

/// Nullify the pointers of every node under `path`, leaves included. A child
/// listed by its parent but never published still gets its topics nullified.
fn delete_subtree(nodes: &NodeStore, path: String, meta: Metadata) -> BoxedTreeOp<'_, ()> {
    Box::pin(async move {
        for child in &meta.children {
            let child_path = path::join_path(&path, child);
            match nodes.get_metadata(&child_path).await {
                Ok(child_meta) => delete_subtree(nodes, child_path, child_meta).await?,
                Err(DriverError::PathNotFound { .. }) => {
                    nodes.delete_data(&child_path).await?;
                    nodes.delete_metadata(&child_path).await?;
                }
                Err(e) => return Err(e),
            }
        }
        nodes.delete_data(&path).await?;
        nodes.delete_metadata(&path).await
    })
}

/// Re-publish the subtree rooted at `source` under `dest`: metadata records
/// get their path rewritten, data pointers are copied as-is (the chunks are
/// content-addressed, so the payload is shared), and the source node's
/// pointers are nullified once its subtree has landed.
fn move_subtree(nodes: &NodeStore, source: String, dest: String) -> BoxedTreeOp<'_, ()> {
    Box::pin(async move {
        let mut meta = nodes.get_metadata(&source).await?;
        meta.path = dest.clone();

        if let Some(address) = nodes.lookup_data(&source).await? {
            nodes.publish(&dest, DATA_SUFFIX, &address).await?;
        }
        nodes.put_metadata(&dest, &meta).await?;

        for child in &meta.children {
            let source_child = path::join_path(&source, child);
            let dest_child = path::join_path(&dest, child);
            move_subtree(nodes, source_child, dest_child).await?;
        }

        nodes.delete_data(&source).await?;
        nodes.delete_metadata(&source).await
    })
}

fn walk_subtree<'a>(
    nodes: &'a NodeStore,
    path: String,
    visit: &'a mut (dyn FnMut(&FileInfo) -> bool + Send),
) -> BoxedTreeOp<'a, bool> {
    Box::pin(async move {
        let meta = nodes.get_metadata(&path).await?;
        let info = FileInfo::from_metadata(&path, &meta);
        if !visit(&info) {
            return Ok(false);
        }
        for child in &meta.children {
            let child_path = path::join_path(&path, child);
            if !walk_subtree(nodes, child_path, &mut *visit).await? {
                return Ok(false);
            }
        }
        Ok(true)
    })
}
