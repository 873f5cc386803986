//! In-memory pipeline configs per node with file persistence.

use crate::observability::events;
use crate::proto::p4runtime::ForwardingPipelineConfig;
use crate::proto::pipeline::ForwardingPipelineConfigs;
use crate::status::{ErrorCode, Status};
use parking_lot::{RwLock, RwLockWriteGuard};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

const CONFIG_STORE_TAG: &str = "ForwardingPipelineConfigStore:";
const CONFIG_STORE_FN_LOAD_TAG: &str = "load():";
const COMPONENT: &str = "config_store";

/// Pipeline configs of every node. `None` until the first config is pushed
/// or loaded.
pub(crate) struct ForwardingPipelineConfigStore {
    path: PathBuf,
    configs: RwLock<Option<ForwardingPipelineConfigs>>,
}

impl ForwardingPipelineConfigStore {
    pub(crate) fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            configs: RwLock::new(None),
        }
    }

    pub(crate) fn path(&self) -> &Path {
        &self.path
    }

    /// Loads the persisted configs. A missing file is not an error.
    pub(crate) fn load(&self) -> Result<(), Status> {
        if !self.path.exists() {
            debug!(
                "{CONFIG_STORE_TAG}{CONFIG_STORE_FN_LOAD_TAG} {} not found, starting empty",
                self.path.display()
            );
            return Ok(());
        }
        let text = fs::read_to_string(&self.path).map_err(|e| {
            Status::fail_with_code(
                ErrorCode::Internal,
                format!("Unable to read {}: {e}", self.path.display()),
            )
        })?;
        let configs: ForwardingPipelineConfigs = serde_json::from_str(&text).map_err(|e| {
            Status::fail_with_code(
                ErrorCode::Internal,
                format!("Unable to parse {}: {e}", self.path.display()),
            )
        })?;
        info!(
            event = events::PIPELINE_CONFIG_LOADED,
            component = COMPONENT,
            nodes = configs.node_id_to_config.len(),
            path = %self.path.display(),
            "loaded forwarding pipeline configs"
        );
        *self.configs.write() = Some(configs);
        Ok(())
    }

    /// Config pushed for `node_id`.
    ///
    /// Fails with failed-precondition if nothing was pushed for any node yet,
    /// or nothing for this one.
    pub(crate) fn get(&self, node_id: u64) -> Result<ForwardingPipelineConfig, Status> {
        let configs = self.configs.read();
        let Some(configs) = configs
            .as_ref()
            .filter(|configs| !configs.node_id_to_config.is_empty())
        else {
            return Err(Status::fail_with_code(
                ErrorCode::FailedPrecondition,
                "No valid forwarding pipeline config has been pushed for any node so far.",
            ));
        };
        configs
            .node_id_to_config
            .get(&node_id)
            .cloned()
            .ok_or_else(|| {
                Status::fail_with_code(
                    ErrorCode::FailedPrecondition,
                    format!(
                        "Invalid node id or no valid forwarding pipeline config has been pushed for node {node_id} yet."
                    ),
                )
            })
    }

    /// Holds the store exclusively for a verify-and-apply sequence.
    pub(crate) fn lock(&self) -> ConfigStoreTransaction<'_> {
        ConfigStoreTransaction {
            path: &self.path,
            configs: self.configs.write(),
        }
    }

    pub(crate) fn clear(&self) {
        *self.configs.write() = None;
    }
}

/// Exclusive access to the store. Updates are persisted before they become
/// visible in memory.
pub(crate) struct ConfigStoreTransaction<'a> {
    path: &'a Path,
    configs: RwLockWriteGuard<'a, Option<ForwardingPipelineConfigs>>,
}

impl ConfigStoreTransaction<'_> {
    /// Writes the configs with `node_id` replaced to disk, then adopts them.
    pub(crate) fn replace(
        &mut self,
        node_id: u64,
        config: ForwardingPipelineConfig,
    ) -> Result<(), Status> {
        let mut updated = (*self.configs).clone().unwrap_or_default();
        updated.node_id_to_config.insert(node_id, config);
        persist(self.path, &updated)?;
        info!(
            event = events::PIPELINE_CONFIG_SAVED,
            component = COMPONENT,
            node_id,
            path = %self.path.display(),
            "saved forwarding pipeline config"
        );
        *self.configs = Some(updated);
        Ok(())
    }
}

fn persist(path: &Path, configs: &ForwardingPipelineConfigs) -> Result<(), Status> {
    let text = serde_json::to_string_pretty(configs).map_err(|e| {
        Status::fail_with_code(
            ErrorCode::Internal,
            format!("Unable to serialize pipeline configs: {e}"),
        )
    })?;
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| {
            Status::fail_with_code(
                ErrorCode::Internal,
                format!("Unable to create {}: {e}", parent.display()),
            )
        })?;
    }
    fs::write(path, text).map_err(|e| {
        Status::fail_with_code(
            ErrorCode::Internal,
            format!("Unable to write {}: {e}", path.display()),
        )
    })
}

#[cfg(test)]
mod tests {
    use super::ForwardingPipelineConfigStore;
    use crate::proto::p4runtime::{Cookie, ForwardingPipelineConfig};
    use crate::status::ErrorCode;

    fn config(cookie: u64) -> ForwardingPipelineConfig {
        ForwardingPipelineConfig {
            p4info: vec![1, 2, 3],
            p4_device_config: vec![4, 5],
            cookie: Some(Cookie { cookie }),
        }
    }

    #[test]
    fn get_distinguishes_empty_store_from_missing_node() {
        let dir = tempfile::tempdir().expect("temp dir");
        let store = ForwardingPipelineConfigStore::new(dir.path().join("cfg.json"));

        let err = store.get(1).unwrap_err();
        assert_eq!(err.error_code(), ErrorCode::FailedPrecondition);
        assert!(err.message().contains("any node"));

        store.lock().replace(2, config(7)).expect("persist");
        let err = store.get(1).unwrap_err();
        assert_eq!(err.error_code(), ErrorCode::FailedPrecondition);
        assert!(err.message().contains("node 1"));
        assert_eq!(store.get(2).expect("stored"), config(7));
    }

    #[test]
    fn loaded_file_without_nodes_counts_as_nothing_pushed() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("cfg.json");
        std::fs::write(&path, r#"{"node_id_to_config": {}}"#).expect("write");
        let store = ForwardingPipelineConfigStore::new(&path);
        store.load().expect("load");

        let err = store.get(1).unwrap_err();
        assert_eq!(err.error_code(), ErrorCode::FailedPrecondition);
        assert_eq!(
            err.message(),
            "No valid forwarding pipeline config has been pushed for any node so far."
        );
    }

    #[test]
    fn replace_survives_reload() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("nested").join("cfg.json");
        let store = ForwardingPipelineConfigStore::new(&path);
        store.lock().replace(1, config(11)).expect("persist");
        store.lock().replace(3, config(33)).expect("persist");

        let reloaded = ForwardingPipelineConfigStore::new(&path);
        reloaded.load().expect("load");
        assert_eq!(reloaded.get(1).expect("node 1"), config(11));
        assert_eq!(reloaded.get(3).expect("node 3"), config(33));
    }

    #[test]
    fn failed_persist_leaves_memory_untouched() {
        let dir = tempfile::tempdir().expect("temp dir");
        // A directory where the file should be makes the write fail.
        let path = dir.path().join("cfg.json");
        std::fs::create_dir(&path).expect("blocker dir");
        let store = ForwardingPipelineConfigStore::new(&path);

        let err = store.lock().replace(1, config(1)).unwrap_err();
        assert_eq!(err.error_code(), ErrorCode::Internal);
        assert_eq!(store.get(1).unwrap_err().error_code(), ErrorCode::FailedPrecondition);
    }

    #[test]
    fn missing_file_loads_empty_and_garbage_fails() {
        let dir = tempfile::tempdir().expect("temp dir");
        let store = ForwardingPipelineConfigStore::new(dir.path().join("absent.json"));
        store.load().expect("missing file is fine");
        assert!(store.get(1).is_err());

        let garbage = dir.path().join("garbage.json");
        std::fs::write(&garbage, "not json").expect("write");
        let err = ForwardingPipelineConfigStore::new(&garbage).load().unwrap_err();
        assert_eq!(err.error_code(), ErrorCode::Internal);

        store.lock().replace(1, config(1)).expect("persist");
        store.clear();
        assert!(store.get(1).is_err());
    }
}
