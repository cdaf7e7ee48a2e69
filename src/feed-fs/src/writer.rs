use std::sync::Arc;

use async_trait::async_trait;
use feed_store::unix_timestamp;

use crate::driver::DriverInner;
use crate::{tree, DriverError, DriverResult, Metadata};

/// Staged write handle: buffers in memory, publishes atomically under the
/// driver lock on commit. Single-consumer; every state change re-acquires
/// the driver's exclusive lock.
#[async_trait]
pub trait FileWriter: Send {
    async fn write(&mut self, data: &[u8]) -> DriverResult<usize>;

    /// Bytes staged so far. No state change.
    fn size(&self) -> u64;

    /// Stop accepting writes. Close does not flush; commit is explicit.
    async fn close(&mut self) -> DriverResult<()>;

    /// Discard the staged buffer.
    async fn cancel(&mut self) -> DriverResult<()>;

    /// Publish the staged payload and its file metadata.
    async fn commit(&mut self) -> DriverResult<()>;
}

impl std::fmt::Debug for dyn FileWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("dyn FileWriter").finish()
    }
}

pub struct FeedFileWriter {
    inner: Arc<DriverInner>,
    path: String,
    buffer: Vec<u8>,
    closed: bool,
    committed: bool,
    cancelled: bool,
}

impl FeedFileWriter {
    pub(crate) fn new(inner: Arc<DriverInner>, path: &str, buffer: Vec<u8>) -> Self {
        Self {
            inner,
            path: path.to_string(),
            buffer,
            closed: false,
            committed: false,
            cancelled: false,
        }
    }

    fn check_open(&self) -> DriverResult<()> {
        if self.closed {
            Err(DriverError::WriterState("already closed"))
        } else if self.committed {
            Err(DriverError::WriterState("already committed"))
        } else if self.cancelled {
            Err(DriverError::WriterState("already cancelled"))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl FileWriter for FeedFileWriter {
    async fn write(&mut self, data: &[u8]) -> DriverResult<usize> {
        let _guard = self.inner.lock.write().await;
        self.check_open()?;
        self.buffer.extend_from_slice(data);
        Ok(data.len())
    }

    fn size(&self) -> u64 {
        self.buffer.len() as u64
    }

    async fn close(&mut self) -> DriverResult<()> {
        let _guard = self.inner.lock.write().await;
        if self.closed {
            return Err(DriverError::WriterState("already closed"));
        }
        self.closed = true;
        Ok(())
    }

    async fn cancel(&mut self) -> DriverResult<()> {
        let _guard = self.inner.lock.write().await;
        if self.closed {
            return Err(DriverError::WriterState("already closed"));
        }
        if self.committed {
            return Err(DriverError::WriterState("already committed"));
        }
        self.cancelled = true;
        self.buffer = Vec::new();
        Ok(())
    }

    async fn commit(&mut self) -> DriverResult<()> {
        let _guard = self.inner.lock.write().await;
        self.check_open()?;
        let nodes = &self.inner.nodes;
        nodes.put_data(&self.path, &self.buffer).await?;
        let meta = Metadata::new_file(&self.path, self.buffer.len() as u64, unix_timestamp());
        nodes.put_metadata(&self.path, &meta).await?;
        tree::link_to_ancestors(nodes, &self.path).await?;
        self.committed = true;
        self.buffer = Vec::new();
        info!("writer committed: {}", self.path);
        Ok(())
    }
}
