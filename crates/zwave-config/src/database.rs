use std::collections::{BTreeMap, HashMap};
use std::io::Read;
use std::path::Path;

use serde_json::Value;
use tracing::{debug, warn};

use crate::config::LoaderConfig;
use crate::device::{parse_hex_u16, DeviceConfig, DeviceKey};
use crate::error::{ConfigError, Result};
use crate::validator::{validate_document, Schemas};

/// File holding the manufacturer id to name table.
pub const MANUFACTURERS_FILE: &str = "manufacturers.json";

/// Device definitions keyed by manufacturer/product triple.
///
/// Built once at startup and read-only afterwards. Share it through an
/// `Arc` or a [`ConfigHandle`](crate::ConfigHandle).
pub struct DeviceDatabase {
    devices: HashMap<DeviceKey, DeviceConfig>,
    manufacturers: BTreeMap<u16, String>,
    schemas: Schemas,
    config: LoaderConfig,
}

impl DeviceDatabase {
    /// Create an empty database with default limits.
    pub fn new() -> Result<Self> {
        Self::with_config(LoaderConfig::default())
    }

    pub fn with_config(config: LoaderConfig) -> Result<Self> {
        Ok(Self {
            devices: HashMap::new(),
            manufacturers: BTreeMap::new(),
            schemas: Schemas::compile()?,
            config,
        })
    }

    /// Validate and add one device file. `file` names it in errors.
    pub fn register_device(&mut self, file: &str, json: &str) -> Result<()> {
        let value: Value = serde_json::from_str(json)?;
        validate_document(file, &value, &self.schemas.device)?;
        let device: DeviceConfig = serde_json::from_value(value)?;

        for key in device.keys() {
            if self.devices.contains_key(&key) {
                if self.config.fail_on_duplicate {
                    return Err(ConfigError::Duplicate {
                        file: file.to_string(),
                        key: key.to_string(),
                    });
                }
                warn!(file, %key, "device redefined, later file wins");
            }
            self.devices.insert(key, device.clone());
        }
        debug!(file, label = %device.label, "device registered");
        Ok(())
    }

    /// Validate and merge a manufacturer table.
    pub fn register_manufacturers(&mut self, file: &str, json: &str) -> Result<()> {
        let value: Value = serde_json::from_str(json)?;
        validate_document(file, &value, &self.schemas.manufacturers)?;
        let table: BTreeMap<String, String> = serde_json::from_value(value)?;
        for (id, name) in table {
            let id = parse_hex_u16(&id).ok_or_else(|| ConfigError::ValidationFailed {
                file: file.to_string(),
                message: format!("bad manufacturer id {id:?}"),
            })?;
            self.manufacturers.insert(id, name);
        }
        Ok(())
    }

    /// Load every `*.json` file in a directory.
    pub fn from_directory(path: &Path) -> Result<Self> {
        Self::from_directory_with_config(path, LoaderConfig::default())
    }

    /// Load a directory with explicit limits.
    ///
    /// `manufacturers.json` is the manufacturer table; every other
    /// `.json` file is a device definition. Symlinked JSON files, files
    /// over the size limit and directories over the file count limit are
    /// rejected. Other entries are skipped.
    pub fn from_directory_with_config(path: &Path, config: LoaderConfig) -> Result<Self> {
        let mut db = Self::with_config(config)?;
        let mut loaded_file_count = 0usize;

        let entries = std::fs::read_dir(path)
            .map_err(|err| ConfigError::LoadFailed(format!("{}: {err}", path.display())))?;

        // Load order decides which duplicate wins, so make it stable.
        let mut entries = entries
            .collect::<std::io::Result<Vec<_>>>()
            .map_err(|err| ConfigError::LoadFailed(err.to_string()))?;
        entries.sort_by_key(|entry| entry.file_name());

        for entry in entries {
            let file_name = entry.file_name();
            let file_name = file_name.to_string_lossy();
            let is_json = file_name.to_ascii_lowercase().ends_with(".json");
            let entry_path = entry.path();
            let path_metadata = std::fs::symlink_metadata(&entry_path)
                .map_err(|err| ConfigError::LoadFailed(err.to_string()))?;
            let file_type = path_metadata.file_type();

            if file_type.is_symlink() {
                if is_json {
                    return Err(ConfigError::LoadFailed(format!(
                        "refusing to load config symlink: {file_name}"
                    )));
                }
                continue;
            }
            if !file_type.is_file() || !is_json {
                continue;
            }

            loaded_file_count = loaded_file_count.saturating_add(1);
            if loaded_file_count > db.config.max_files_from_directory {
                return Err(ConfigError::LoadFailed(format!(
                    "config file count exceeds configured max ({}): {}",
                    db.config.max_files_from_directory, loaded_file_count
                )));
            }

            let file = std::fs::File::open(&entry_path).map_err(|err| {
                ConfigError::LoadFailed(format!(
                    "failed opening config {}: {err}",
                    entry_path.display()
                ))
            })?;
            let opened_metadata = file
                .metadata()
                .map_err(|err| ConfigError::LoadFailed(err.to_string()))?;

            #[cfg(unix)]
            {
                if !same_file_identity(&path_metadata, &opened_metadata) {
                    return Err(ConfigError::LoadFailed(format!(
                        "config file changed during load: {file_name}"
                    )));
                }
            }

            if opened_metadata.len() > db.config.max_file_size as u64 {
                return Err(ConfigError::LoadFailed(format!(
                    "config file too large ({} bytes): {file_name}",
                    opened_metadata.len()
                )));
            }

            let max_bytes = db.config.max_file_size;
            let read_limit = u64::try_from(max_bytes.saturating_add(1)).unwrap_or(u64::MAX);
            let mut content = String::new();
            file.take(read_limit)
                .read_to_string(&mut content)
                .map_err(|err| {
                    ConfigError::LoadFailed(format!(
                        "failed reading config {}: {err}",
                        entry_path.display()
                    ))
                })?;
            if content.len() > max_bytes {
                return Err(ConfigError::LoadFailed(format!(
                    "config file too large while reading: {file_name}"
                )));
            }

            if file_name.eq_ignore_ascii_case(MANUFACTURERS_FILE) {
                db.register_manufacturers(&file_name, &content)?;
            } else {
                db.register_device(&file_name, &content)?;
            }
        }

        debug!(
            path = %path.display(),
            devices = db.devices.len(),
            manufacturers = db.manufacturers.len(),
            "device database loaded"
        );
        Ok(db)
    }

    /// Load from embedded `(file name, json)` pairs, using the same file
    /// naming rule as [`from_directory`](Self::from_directory).
    pub fn from_embedded(files: &[(&str, &str)]) -> Result<Self> {
        let mut db = Self::new()?;
        for (file, json) in files {
            if file.eq_ignore_ascii_case(MANUFACTURERS_FILE) {
                db.register_manufacturers(file, json)?;
            } else {
                db.register_device(file, json)?;
            }
        }
        Ok(db)
    }

    pub fn lookup(&self, key: &DeviceKey) -> Option<&DeviceConfig> {
        self.devices.get(key)
    }

    pub fn manufacturer_name(&self, manufacturer_id: u16) -> Option<&str> {
        self.manufacturers.get(&manufacturer_id).map(String::as_str)
    }

    /// Every registered triple, sorted.
    pub fn keys(&self) -> Vec<DeviceKey> {
        let mut keys: Vec<DeviceKey> = self.devices.keys().copied().collect();
        keys.sort_unstable();
        keys
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    pub fn config(&self) -> &LoaderConfig {
        &self.config
    }
}

impl std::fmt::Debug for DeviceDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceDatabase")
            .field("devices", &self.devices.len())
            .field("manufacturers", &self.manufacturers.len())
            .field("config", &self.config)
            .finish()
    }
}

#[cfg(unix)]
fn same_file_identity(
    path_metadata: &std::fs::Metadata,
    opened_metadata: &std::fs::Metadata,
) -> bool {
    use std::os::unix::fs::MetadataExt;
    path_metadata.dev() == opened_metadata.dev() && path_metadata.ino() == opened_metadata.ino()
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;

    const MULTISENSOR: &str = r##"{
        "manufacturer": "AEON Labs",
        "manufacturerId": "0x0086",
        "label": "ZW100",
        "description": "MultiSensor 6",
        "devices": [{ "productType": "0x0002", "productId": "0x0064" }],
        "paramInformation": [
            { "#": 3, "label": "PIR timeout", "valueSize": 2,
              "minValue": 10, "maxValue": 3600, "defaultValue": 240 }
        ]
    }"##;

    const THERMOSTAT: &str = r#"{
        "manufacturerId": "0x0002",
        "label": "LC-13",
        "devices": [{ "productType": "0x0005", "productId": "0x0004" }],
        "compat": { "setpointInterpretation": "B" }
    }"#;

    const MANUFACTURERS: &str = r#"{ "0x0086": "AEON Labs", "0x0002": "Danfoss" }"#;

    #[test]
    fn register_and_lookup() {
        let mut db = DeviceDatabase::new().unwrap();
        db.register_device("zw100.json", MULTISENSOR).unwrap();

        let device = db.lookup(&DeviceKey::new(0x0086, 0x0002, 0x0064)).unwrap();
        assert_eq!(device.label, "ZW100");
        assert_eq!(device.param(3).unwrap().default_value, 240);
        assert!(db.lookup(&DeviceKey::new(0x0086, 0x0002, 0x0065)).is_none());
    }

    #[test]
    fn schema_violation_names_the_file() {
        let mut db = DeviceDatabase::new().unwrap();
        let result = db.register_device(
            "bad.json",
            r#"{ "manufacturerId": "86", "label": "x", "devices": [] }"#,
        );
        assert!(matches!(
            result,
            Err(ConfigError::ValidationFailed { ref file, .. }) if file == "bad.json"
        ));
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let mut db = DeviceDatabase::new().unwrap();
        let result = db.register_device(
            "extra.json",
            r#"{ "manufacturerId": "0x0001", "label": "x",
                 "devices": [{ "productType": "0x0001", "productId": "0x0001" }],
                 "firmware": "1.0" }"#,
        );
        assert!(matches!(result, Err(ConfigError::ValidationFailed { .. })));
    }

    #[test]
    fn invalid_json_fails() {
        let mut db = DeviceDatabase::new().unwrap();
        assert!(matches!(
            db.register_device("x.json", "not-json"),
            Err(ConfigError::InvalidJson(_))
        ));
    }

    #[test]
    fn duplicates_follow_config() {
        let mut strict = DeviceDatabase::new().unwrap();
        strict.register_device("a.json", MULTISENSOR).unwrap();
        assert!(matches!(
            strict.register_device("b.json", MULTISENSOR),
            Err(ConfigError::Duplicate { .. })
        ));

        let mut lenient = DeviceDatabase::with_config(LoaderConfig {
            fail_on_duplicate: false,
            ..LoaderConfig::default()
        })
        .unwrap();
        lenient.register_device("a.json", MULTISENSOR).unwrap();
        lenient.register_device("b.json", MULTISENSOR).unwrap();
        assert_eq!(lenient.len(), 1);
    }

    #[test]
    fn from_embedded_routes_manufacturer_table() {
        let db = DeviceDatabase::from_embedded(&[
            ("manufacturers.json", MANUFACTURERS),
            ("zw100.json", MULTISENSOR),
            ("lc13.json", THERMOSTAT),
        ])
        .unwrap();

        assert_eq!(db.manufacturer_name(0x0002), Some("Danfoss"));
        assert_eq!(db.manufacturer_name(0x9999), None);
        assert_eq!(
            db.keys(),
            vec![
                DeviceKey::new(0x0002, 0x0005, 0x0004),
                DeviceKey::new(0x0086, 0x0002, 0x0064)
            ]
        );
    }

    #[test]
    fn from_directory_loads_json_files() {
        let dir = make_temp_config_dir("from-directory");
        write_file(&dir, "manufacturers.json", MANUFACTURERS);
        write_file(&dir, "zw100.json", MULTISENSOR);
        write_file(&dir, "lc13.json", THERMOSTAT);
        write_file(&dir, "README.md", "not loaded");

        let db = DeviceDatabase::from_directory(&dir).unwrap();
        assert_eq!(db.len(), 2);
        assert_eq!(db.manufacturer_name(0x0086), Some("AEON Labs"));

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[cfg(unix)]
    #[test]
    fn symlinked_config_is_rejected() {
        let dir = make_temp_config_dir("symlink");
        let target = dir.join("target.txt");
        std::fs::write(&target, MULTISENSOR.as_bytes()).unwrap();
        std::os::unix::fs::symlink(&target, dir.join("zw100.json")).unwrap();

        let result = DeviceDatabase::from_directory(&dir);
        assert!(matches!(result, Err(ConfigError::LoadFailed(_))));

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn file_count_limit_is_enforced() {
        let dir = make_temp_config_dir("count-limit");
        write_file(&dir, "zw100.json", MULTISENSOR);
        write_file(&dir, "lc13.json", THERMOSTAT);

        let config = LoaderConfig {
            max_files_from_directory: 1,
            ..LoaderConfig::default()
        };
        let result = DeviceDatabase::from_directory_with_config(&dir, config);
        assert!(matches!(result, Err(ConfigError::LoadFailed(_))));

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn file_size_limit_is_enforced() {
        let dir = make_temp_config_dir("size-limit");
        write_file(&dir, "zw100.json", MULTISENSOR);

        let config = LoaderConfig {
            max_file_size: 16,
            ..LoaderConfig::default()
        };
        let result = DeviceDatabase::from_directory_with_config(&dir, config);
        assert!(matches!(result, Err(ConfigError::LoadFailed(_))));

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn missing_directory_fails() {
        let result = DeviceDatabase::from_directory(Path::new("/nonexistent/zwave-config"));
        assert!(matches!(result, Err(ConfigError::LoadFailed(_))));
    }

    fn make_temp_config_dir(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "zwave-config-{tag}-{}-{}",
            std::process::id(),
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap()
                .as_nanos()
        ));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn write_file(dir: &Path, file_name: &str, contents: &str) {
        std::fs::write(dir.join(file_name), contents.as_bytes()).unwrap();
    }
}
