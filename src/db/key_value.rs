use super::backend::StorageBackend;
use crate::errors::{AppError, AppResult};
use crate::models::Resource;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// One JSON document per resource key in a directory.
#[derive(Debug)]
pub struct KeyValueBackend {
    dir: PathBuf,
}

impl KeyValueBackend {
    pub fn open(dir: &Path) -> AppResult<Self> {
        fs::create_dir_all(dir).map_err(|err| AppError::Io(err.to_string()))?;
        Ok(Self { dir: dir.to_path_buf() })
    }

    pub fn path_for(&self, resource: Resource) -> PathBuf {
        self.dir.join(format!("{}.json", resource.storage_key()))
    }
}

impl StorageBackend for KeyValueBackend {
    fn name(&self) -> &'static str {
        "key-value"
    }

    fn supports(&self, _resource: Resource) -> bool {
        true
    }

    fn load(&self, resource: Resource) -> AppResult<Option<serde_json::Value>> {
        let raw = match fs::read_to_string(self.path_for(resource)) {
            Ok(raw) => raw,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(AppError::from(err)),
        };
        let value = serde_json::from_str(&raw)
            .map_err(|err| AppError::Internal(format!("malformed value for {}: {err}", resource.storage_key())))?;
        Ok(Some(value))
    }

    fn save_all(&self, resource: Resource, value: &serde_json::Value) -> AppResult<()> {
        let path = self.path_for(resource);
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_vec(value)?)?;
        fs::rename(&tmp, &path)?;
        Ok(())
    }

    fn clear(&self) -> AppResult<()> {
        for resource in Resource::ALL {
            match fs::remove_file(self.path_for(resource)) {
                Ok(()) => {}
                Err(err) if err.kind() == ErrorKind::NotFound => {}
                Err(err) => return Err(AppError::from(err)),
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::KeyValueBackend;
    use crate::db::backend::StorageBackend;
    use crate::models::Resource;

    #[test]
    fn missing_key_loads_as_none() {
        let dir = tempfile::tempdir().expect("tempdir");
        let backend = KeyValueBackend::open(dir.path()).expect("backend");
        assert!(backend.load(Resource::Tasks).expect("load").is_none());
    }

    #[test]
    fn save_then_load_returns_same_value() {
        let dir = tempfile::tempdir().expect("tempdir");
        let backend = KeyValueBackend::open(dir.path()).expect("backend");
        let value = serde_json::json!({ "theme": "dark", "language": "en" });

        backend.save_all(Resource::Settings, &value).expect("save");
        assert_eq!(backend.load(Resource::Settings).expect("load"), Some(value));
        assert!(!dir.path().join("sap_migration_settings.json.tmp").exists());
    }

    #[test]
    fn malformed_document_is_an_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let backend = KeyValueBackend::open(dir.path()).expect("backend");
        std::fs::write(backend.path_for(Resource::Objects), "{not json").expect("write");
        assert!(backend.load(Resource::Objects).is_err());
    }

    #[test]
    fn clear_removes_every_key() {
        let dir = tempfile::tempdir().expect("tempdir");
        let backend = KeyValueBackend::open(dir.path()).expect("backend");
        for resource in Resource::ALL {
            backend.save_all(resource, &serde_json::json!([])).expect("save");
        }

        backend.clear().expect("clear");
        backend.clear().expect("clear twice");
        for resource in Resource::ALL {
            assert!(backend.load(resource).expect("load").is_none());
        }
    }
}
