//! Read-mostly plugin registry
//!
//! Thin layer over the plugins table. Lookups are memoised per process
//! lifetime: plugin specs change rarely and cache coherence across
//! processes is not a concern here.

use std::collections::HashMap;
use std::sync::RwLock;

use conductor_contracts::{PluginManifest, PluginSpec};
use conductor_storage::{Database, PluginRow, StoreError};
use tracing::debug;

pub struct PluginRegistry {
    db: Database,
    cache: RwLock<HashMap<String, PluginManifest>>,
}

impl PluginRegistry {
    pub fn new(db: Database) -> Self {
        Self {
            db,
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// Look up a plugin by id, hitting the store on a cache miss
    pub async fn get(&self, plugin_id: &str) -> Result<Option<PluginManifest>, StoreError> {
        if let Some(hit) = self
            .cache
            .read()
            .ok()
            .and_then(|cache| cache.get(plugin_id).cloned())
        {
            return Ok(Some(hit));
        }

        let Some(row) = self.db.get_plugin(plugin_id).await? else {
            return Ok(None);
        };
        let manifest = manifest_from_row(row)?;

        if let Ok(mut cache) = self.cache.write() {
            cache.insert(plugin_id.to_string(), manifest.clone());
        }
        debug!(%plugin_id, "plugin cached");
        Ok(Some(manifest))
    }

    /// Drop one memoised entry, e.g. after an update through the API
    pub fn invalidate(&self, plugin_id: &str) {
        if let Ok(mut cache) = self.cache.write() {
            cache.remove(plugin_id);
        }
    }
}

fn manifest_from_row(row: PluginRow) -> Result<PluginManifest, StoreError> {
    let spec: PluginSpec = serde_json::from_value(row.spec)?;
    Ok(PluginManifest {
        id: row.id,
        name: row.name,
        image: row.image,
        digest: row.digest,
        version: row.version,
        spec,
    })
}
