use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};

use tracing::info;

use crate::config::LoaderConfig;
use crate::database::DeviceDatabase;
use crate::device::{DeviceConfig, DeviceKey};
use crate::error::Result;

/// Shared, read-mostly access to a [`DeviceDatabase`].
///
/// Readers take a cheap [`snapshot`](Self::snapshot). A reload builds a
/// complete new database first and swaps it in only on success, so a
/// broken file never leaves readers with a half-loaded view.
#[derive(Debug, Clone)]
pub struct ConfigHandle {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    current: RwLock<Arc<DeviceDatabase>>,
    source: Option<(PathBuf, LoaderConfig)>,
}

impl ConfigHandle {
    /// Wrap a database that cannot be reloaded.
    pub fn fixed(db: DeviceDatabase) -> Self {
        Self {
            inner: Arc::new(Inner {
                current: RwLock::new(Arc::new(db)),
                source: None,
            }),
        }
    }

    /// Load a directory and remember it for [`reload`](Self::reload).
    pub fn load(path: &Path, config: LoaderConfig) -> Result<Self> {
        let db = DeviceDatabase::from_directory_with_config(path, config)?;
        Ok(Self {
            inner: Arc::new(Inner {
                current: RwLock::new(Arc::new(db)),
                source: Some((path.to_path_buf(), config)),
            }),
        })
    }

    /// An empty database. Lookups always miss.
    pub fn empty() -> Result<Self> {
        Ok(Self::fixed(DeviceDatabase::new()?))
    }

    pub fn snapshot(&self) -> Arc<DeviceDatabase> {
        self.inner
            .current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn lookup(&self, key: &DeviceKey) -> Option<DeviceConfig> {
        self.snapshot().lookup(key).cloned()
    }

    /// Re-read the source directory. Returns false for fixed handles.
    pub fn reload(&self) -> Result<bool> {
        let Some((path, config)) = &self.inner.source else {
            return Ok(false);
        };
        let db = DeviceDatabase::from_directory_with_config(path, *config)?;
        info!(path = %path.display(), devices = db.len(), "device database reloaded");
        *self
            .inner
            .current
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Arc::new(db);
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DEVICE: &str = r#"{
        "manufacturerId": "0x0086",
        "label": "ZW100",
        "devices": [{ "productType": "0x0002", "productId": "0x0064" }]
    }"#;

    #[test]
    fn fixed_handle_does_not_reload() {
        let handle = ConfigHandle::empty().unwrap();
        assert!(!handle.reload().unwrap());
        assert!(handle.snapshot().is_empty());
    }

    #[test]
    fn reload_swaps_only_on_success() {
        let dir = std::env::temp_dir().join(format!(
            "zwave-config-reload-{}-{}",
            std::process::id(),
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap()
                .as_nanos()
        ));
        std::fs::create_dir_all(&dir).unwrap();

        let handle = ConfigHandle::load(&dir, LoaderConfig::default()).unwrap();
        let before = handle.snapshot();
        assert!(before.is_empty());

        std::fs::write(dir.join("zw100.json"), DEVICE).unwrap();
        assert!(handle.reload().unwrap());
        let key = DeviceKey::new(0x0086, 0x0002, 0x0064);
        assert_eq!(handle.lookup(&key).unwrap().label, "ZW100");
        assert!(before.is_empty());

        std::fs::write(dir.join("broken.json"), "{").unwrap();
        assert!(handle.reload().is_err());
        assert!(handle.lookup(&key).is_some());

        let _ = std::fs::remove_dir_all(&dir);
    }
}
