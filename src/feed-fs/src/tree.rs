//! Directory upkeep: the upward walk that keeps every ancestor's child list
//! in sync with the nodes published beneath it.

use feed_store::unix_timestamp;

use crate::path::{basename, parent, ROOT_PATH};
use crate::{DriverError, DriverResult, Metadata, NodeStore};

/// Publish root directory metadata if the root topic has never been written.
pub(crate) async fn ensure_root(nodes: &NodeStore) -> DriverResult<()> {
    match nodes.get_metadata(ROOT_PATH).await {
        Ok(_) => Ok(()),
        Err(DriverError::PathNotFound { .. }) => {
            debug!("bootstrapping root directory metadata");
            let root = Metadata::new_dir(ROOT_PATH, unix_timestamp());
            nodes.put_metadata(ROOT_PATH, &root).await
        }
        Err(e) => Err(e),
    }
}

/// Walk from `path`'s parent toward the root, inserting the child basename
/// into each ancestor that does not list it yet and synthesising missing
/// ancestor directories on the way. An ancestor that already lists the child
/// is trusted to be linked all the way up, so the walk stops there; the root
/// is processed inclusively otherwise.
pub(crate) async fn link_to_ancestors(nodes: &NodeStore, path: &str) -> DriverResult<()> {
    if path == ROOT_PATH {
        return Ok(());
    }
    let mut child = path.to_string();
    loop {
        let dir = parent(&child).to_string();
        let mut meta = match nodes.get_metadata(&dir).await {
            Ok(meta) => meta,
            Err(DriverError::PathNotFound { .. }) => {
                info!("synthesising directory metadata: {}", dir);
                Metadata::new_dir(&dir, unix_timestamp())
            }
            Err(e) => return Err(e),
        };
        // A file node cannot adopt children.
        if !meta.is_dir {
            return Err(DriverError::invalid_path(&dir));
        }
        if !meta.add_child(basename(&child)) {
            break;
        }
        meta.mod_time = unix_timestamp();
        nodes.put_metadata(&dir, &meta).await?;
        if dir == ROOT_PATH {
            break;
        }
        child = dir;
    }
    Ok(())
}

/// The root always exists; anything else exists when its parent lists it.
pub(crate) async fn child_exists(nodes: &NodeStore, path: &str) -> bool {
    if path == ROOT_PATH {
        return true;
    }
    match nodes.get_metadata(parent(path)).await {
        Ok(meta) => meta.has_child(basename(path)),
        Err(_) => false,
    }
}

/// Drop `path` from its parent's child list and re-publish the parent.
pub(crate) async fn detach_child(nodes: &NodeStore, path: &str) -> DriverResult<()> {
    let dir = parent(path);
    let mut meta = nodes.get_metadata(dir).await?;
    if meta.remove_child(basename(path)) {
        meta.mod_time = unix_timestamp();
        nodes.put_metadata(dir, &meta).await?;
    }
    Ok(())
}
