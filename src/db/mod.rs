mod backend;
mod indexed;
mod key_value;

pub use backend::StorageBackend;
pub use indexed::IndexedBackend;
pub use key_value::KeyValueBackend;

use crate::config::StorageConfig;
use crate::errors::{AppError, AppResult};
use crate::events::{ChangeEvent, EventBus};
use crate::ids::{REQUEST_IDS, TASK_IDS};
use crate::models::{
    ChangeRequest, ExportDocument, ImportResult, ObjectFilter, Profile, RequestFilter, Resource, SapObject,
    Settings, Task, TaskFilter, EXPORT_FORMAT_VERSION,
};
use crate::records::{filter_records, Record};
use chrono::{NaiveDate, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

pub fn backup_file_name(date: NaiveDate) -> String {
    format!("sap-migration-backup-{}.json", date.format("%Y-%m-%d"))
}

/// Persistence façade over a key-value backend and an optional indexed backend.
///
/// Reads prefer the indexed backend for collections and fall back to the key-value copy.
/// Writes go to the key-value backend first, then to the indexed backend. Backend failures
/// are logged and absorbed; callers always get a value (possibly a default).
pub struct Storage {
    key_value: Box<dyn StorageBackend>,
    indexed: Option<Box<dyn StorageBackend>>,
    events: EventBus,
    write_lock: Mutex<()>,
}

impl Storage {
    pub fn open(config: &StorageConfig) -> AppResult<Self> {
        let key_value = KeyValueBackend::open(&config.key_value_dir())?;

        let indexed: Option<Box<dyn StorageBackend>> = if config.indexed_enabled {
            match IndexedBackend::open(&config.database_path()) {
                Ok(backend) => Some(Box::new(backend)),
                Err(error) => {
                    tracing::warn!(error = %error, "indexed backend unavailable, using key-value storage only");
                    None
                }
            }
        } else {
            tracing::info!("indexed backend disabled by configuration");
            None
        };

        Ok(Self::with_backends(Box::new(key_value), indexed))
    }

    pub fn with_backends(key_value: Box<dyn StorageBackend>, indexed: Option<Box<dyn StorageBackend>>) -> Self {
        Self {
            key_value,
            indexed,
            events: EventBus::new(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn backend_names(&self) -> Vec<&'static str> {
        let mut names = Vec::with_capacity(2);
        if let Some(indexed) = &self.indexed {
            names.push(indexed.name());
        }
        names.push(self.key_value.name());
        names
    }

    pub fn has_indexed_backend(&self) -> bool {
        self.indexed.is_some()
    }

    pub fn load_value(&self, resource: Resource) -> Option<serde_json::Value> {
        for backend in self.read_order(resource) {
            match backend.load(resource) {
                Ok(Some(value)) => {
                    if resource.is_collection() && value.as_array().is_some_and(|records| records.is_empty()) {
                        continue;
                    }
                    tracing::debug!(resource = resource.as_str(), backend = backend.name(), "loaded resource");
                    return Some(value);
                }
                Ok(None) => {}
                Err(error) => {
                    tracing::warn!(
                        resource = resource.as_str(),
                        backend = backend.name(),
                        error = %error,
                        "failed to load resource"
                    );
                }
            }
        }
        None
    }

    pub fn save_value(&self, resource: Resource, value: &serde_json::Value) {
        if let Err(error) = self.key_value.save_all(resource, value) {
            tracing::error!(
                resource = resource.as_str(),
                backend = self.key_value.name(),
                error = %error,
                "failed to save resource"
            );
        }

        if let Some(indexed) = self.indexed.as_ref().filter(|backend| backend.supports(resource)) {
            if let Err(error) = indexed.save_all(resource, value) {
                tracing::error!(
                    resource = resource.as_str(),
                    backend = indexed.name(),
                    error = %error,
                    "failed to save resource, key-value copy remains"
                );
                // An empty indexed store defers reads to the key-value copy.
                if let Err(error) = indexed.save_all(resource, &serde_json::Value::Array(Vec::new())) {
                    tracing::error!(
                        resource = resource.as_str(),
                        backend = indexed.name(),
                        error = %error,
                        "failed to reset indexed store, it may serve stale data"
                    );
                }
            }
        }
    }

    pub fn load<T: Record>(&self) -> Vec<T> {
        decode_records(&self.load_entries(T::RESOURCE))
    }

    pub fn save_all<T: Record>(&self, records: &[T]) {
        self.save_resource(T::RESOURCE, &records);
    }

    pub fn get<T: Record>(&self, id: &str) -> Option<T> {
        self.load::<T>().into_iter().find(|record| record.id() == id)
    }

    pub fn search<T: Record>(&self, filter: &T::Filter) -> Vec<T> {
        filter_records(&self.load::<T>(), filter)
    }

    /// Replaces the record with the same id, or appends it.
    ///
    /// The cycle works on the stored JSON entries, so entries that do not decode as `T` are
    /// written back unchanged.
    pub fn upsert<T: Record>(&self, record: T) -> AppResult<Vec<T>> {
        let encoded = serde_json::to_value(&record)?;
        let guard = self.lock_writes()?;
        let mut entries = self.load_entries(T::RESOURCE);
        match entries
            .iter_mut()
            .find(|entry| entry_id(entry).as_deref() == Some(record.id()))
        {
            Some(existing) => *existing = encoded,
            None => entries.push(encoded),
        }
        let records = self.write_entries::<T>(entries);
        drop(guard);

        self.events.publish(T::updated_event(records.clone()));
        Ok(records)
    }

    /// Appends a new record, rejecting ids that already exist in the stored collection.
    pub fn insert<T: Record>(&self, record: T) -> AppResult<Vec<T>> {
        let encoded = serde_json::to_value(&record)?;
        let guard = self.lock_writes()?;
        let mut entries = self.load_entries(T::RESOURCE);
        if entries.iter().any(|entry| entry_id(entry).as_deref() == Some(record.id())) {
            return Err(AppError::Duplicate(format!(
                "{} already contains id {}",
                T::RESOURCE.as_str(),
                record.id()
            )));
        }
        entries.push(encoded);
        let records = self.write_entries::<T>(entries);
        drop(guard);

        self.events.publish(T::updated_event(records.clone()));
        Ok(records)
    }

    pub fn delete<T: Record>(&self, id: &str) -> AppResult<Vec<T>> {
        let guard = self.lock_writes()?;
        let mut entries = self.load_entries(T::RESOURCE);
        let before = entries.len();
        entries.retain(|entry| entry_id(entry).as_deref() != Some(id));
        if entries.len() == before {
            tracing::debug!(resource = T::RESOURCE.as_str(), id, "delete of unknown id ignored");
            return Ok(decode_records(&entries));
        }
        let records = self.write_entries::<T>(entries);
        drop(guard);

        self.events.publish(T::updated_event(records.clone()));
        Ok(records)
    }

    pub fn load_tasks(&self) -> Vec<Task> {
        self.load()
    }

    pub fn get_task(&self, id: &str) -> Option<Task> {
        self.get(id)
    }

    pub fn save_task(&self, task: Task) -> AppResult<Vec<Task>> {
        self.upsert(task)
    }

    pub fn delete_task(&self, id: &str) -> AppResult<Vec<Task>> {
        self.delete::<Task>(id)
    }

    pub fn search_tasks(&self, filter: &TaskFilter) -> Vec<Task> {
        self.search::<Task>(filter)
    }

    pub fn next_task_id(&self) -> String {
        let ids = self.stored_ids(Resource::Tasks);
        TASK_IDS.next(ids.iter().map(String::as_str))
    }

    pub fn load_objects(&self) -> Vec<SapObject> {
        self.load()
    }

    pub fn get_object(&self, id: &str) -> Option<SapObject> {
        self.get(id)
    }

    pub fn save_object(&self, object: SapObject) -> AppResult<Vec<SapObject>> {
        self.upsert(object)
    }

    pub fn delete_object(&self, id: &str) -> AppResult<Vec<SapObject>> {
        self.delete::<SapObject>(id)
    }

    pub fn search_objects(&self, filter: &ObjectFilter) -> Vec<SapObject> {
        self.search::<SapObject>(filter)
    }

    pub fn load_requests(&self) -> Vec<ChangeRequest> {
        self.load()
    }

    pub fn get_request(&self, id: &str) -> Option<ChangeRequest> {
        self.get(id)
    }

    pub fn save_request(&self, request: ChangeRequest) -> AppResult<Vec<ChangeRequest>> {
        self.upsert(request)
    }

    pub fn delete_request(&self, id: &str) -> AppResult<Vec<ChangeRequest>> {
        self.delete::<ChangeRequest>(id)
    }

    pub fn search_requests(&self, filter: &RequestFilter) -> Vec<ChangeRequest> {
        self.search::<ChangeRequest>(filter)
    }

    pub fn next_request_id(&self) -> String {
        let ids = self.stored_ids(Resource::Requests);
        REQUEST_IDS.next(ids.iter().map(String::as_str))
    }

    pub fn load_profile(&self) -> Profile {
        self.load_resource(Resource::Profile)
    }

    pub fn save_profile(&self, mut profile: Profile) -> Profile {
        profile.updated_at = Some(Utc::now());
        self.save_resource(Resource::Profile, &profile);
        self.events.publish(ChangeEvent::ProfileUpdated(profile.clone()));
        profile
    }

    pub fn load_settings(&self) -> Settings {
        self.load_resource(Resource::Settings)
    }

    pub fn save_settings(&self, settings: Settings) -> Settings {
        self.save_resource(Resource::Settings, &settings);
        self.events.publish(ChangeEvent::SettingsUpdated(settings.clone()));
        settings
    }

    /// Deep-merges `update` over the stored settings.
    pub fn update_settings(&self, update: serde_json::Value) -> AppResult<Settings> {
        let guard = self.lock_writes()?;
        let mut merged = serde_json::to_value(self.load_settings())?;
        merge_json(&mut merged, update);
        let settings: Settings = serde_json::from_value(merged)?;
        self.save_resource(Resource::Settings, &settings);
        drop(guard);

        self.events.publish(ChangeEvent::SettingsUpdated(settings.clone()));
        Ok(settings)
    }

    pub fn export(&self) -> ExportDocument {
        ExportDocument {
            profile: self.load_profile(),
            settings: self.load_settings(),
            tasks: self.load_tasks(),
            objects: self.load_objects(),
            requests: self.load_requests(),
            export_date: Utc::now(),
            version: EXPORT_FORMAT_VERSION.to_string(),
        }
    }

    pub fn export_json(&self) -> AppResult<String> {
        Ok(serde_json::to_string_pretty(&self.export())?)
    }

    /// Writes the backup file into `dir` and returns its path.
    pub fn export_to_dir(&self, dir: &Path) -> AppResult<PathBuf> {
        let document = self.export();
        fs::create_dir_all(dir)?;
        let path = dir.join(backup_file_name(document.export_date.date_naive()));
        fs::write(&path, serde_json::to_string_pretty(&document)?)?;
        tracing::info!(path = %path.display(), "exported backup");
        Ok(path)
    }

    pub fn import_json(&self, raw: &str) -> ImportResult {
        match serde_json::from_str::<serde_json::Value>(raw) {
            Ok(document) => self.import_value(document),
            Err(error) => {
                tracing::warn!(error = %error, "import document is not valid JSON");
                ImportResult::failed(format!("Invalid backup file: {error}"))
            }
        }
    }

    /// Replaces each resource present in `document`. Resources whose key is missing or null
    /// are left untouched. Nothing is written unless every present key decodes.
    pub fn import_value(&self, document: serde_json::Value) -> ImportResult {
        let plan = match ImportPlan::decode(&document) {
            Ok(plan) => plan,
            Err(error) => {
                tracing::warn!(error = %error, "import document rejected");
                return ImportResult::failed(error.to_string());
            }
        };

        let guard = match self.lock_writes() {
            Ok(guard) => guard,
            Err(error) => return ImportResult::failed(error.to_string()),
        };
        let imported = plan.apply(self);
        drop(guard);

        tracing::info!(resources = imported.len(), "imported backup");
        self.events.publish(ChangeEvent::DataImported);
        ImportResult {
            success: true,
            message: format!("Imported {} resource(s)", imported.len()),
            imported,
        }
    }

    pub fn clear_all(&self) -> AppResult<()> {
        let guard = self.lock_writes()?;
        if let Err(error) = self.key_value.clear() {
            tracing::error!(backend = self.key_value.name(), error = %error, "failed to clear storage");
        }
        if let Some(indexed) = &self.indexed {
            if let Err(error) = indexed.clear() {
                tracing::error!(backend = indexed.name(), error = %error, "failed to clear storage");
            }
        }
        drop(guard);

        tracing::info!("cleared all stored data");
        self.events.publish(ChangeEvent::DataCleared);
        Ok(())
    }

    fn read_order(&self, resource: Resource) -> impl Iterator<Item = &dyn StorageBackend> + '_ {
        self.indexed
            .as_deref()
            .into_iter()
            .chain(std::iter::once(self.key_value.as_ref()))
            .filter(move |backend| backend.supports(resource))
    }

    fn load_entries(&self, resource: Resource) -> Vec<serde_json::Value> {
        match self.load_value(resource) {
            Some(serde_json::Value::Array(entries)) => entries,
            Some(_) => {
                tracing::warn!(resource = resource.as_str(), "stored collection is not a list, using default");
                Vec::new()
            }
            None => Vec::new(),
        }
    }

    fn write_entries<T: Record>(&self, entries: Vec<serde_json::Value>) -> Vec<T> {
        let records = decode_records(&entries);
        self.save_value(T::RESOURCE, &serde_json::Value::Array(entries));
        records
    }

    fn stored_ids(&self, resource: Resource) -> Vec<String> {
        self.load_entries(resource).iter().filter_map(entry_id).collect()
    }

    fn load_resource<T: DeserializeOwned + Default>(&self, resource: Resource) -> T {
        let Some(value) = self.load_value(resource) else {
            return T::default();
        };
        serde_json::from_value(value).unwrap_or_else(|error| {
            tracing::warn!(resource = resource.as_str(), error = %error, "stored value has unexpected shape, using default");
            T::default()
        })
    }

    fn save_resource<T: Serialize + ?Sized>(&self, resource: Resource, value: &T) {
        match serde_json::to_value(value) {
            Ok(value) => self.save_value(resource, &value),
            Err(error) => {
                tracing::error!(resource = resource.as_str(), error = %error, "failed to serialize resource");
            }
        }
    }

    fn lock_writes(&self) -> AppResult<MutexGuard<'_, ()>> {
        self.write_lock
            .lock()
            .map_err(|_| AppError::Internal("storage write lock poisoned".to_string()))
    }
}

fn entry_id(entry: &serde_json::Value) -> Option<String> {
    match entry.get("id")? {
        serde_json::Value::String(id) => Some(id.clone()),
        serde_json::Value::Number(id) => Some(id.to_string()),
        _ => None,
    }
}

/// Decodes each entry on its own. Entries that fail are skipped with a warning; they stay in
/// storage because writes go through the raw entries.
fn decode_records<T: Record>(entries: &[serde_json::Value]) -> Vec<T> {
    entries
        .iter()
        .filter_map(|entry| match serde_json::from_value::<T>(entry.clone()) {
            Ok(record) => Some(record),
            Err(error) => {
                tracing::warn!(
                    resource = T::RESOURCE.as_str(),
                    id = entry_id(entry).as_deref().unwrap_or("-"),
                    error = %error,
                    "skipping record that does not decode"
                );
                None
            }
        })
        .collect()
}

/// Rewrites entries that decode as `T` in canonical form and keeps the rest as given.
fn normalize_entries<T: Record>(entries: Vec<serde_json::Value>) -> Vec<serde_json::Value> {
    entries
        .into_iter()
        .map(|entry| {
            serde_json::from_value::<T>(entry.clone())
                .and_then(serde_json::to_value)
                .unwrap_or(entry)
        })
        .collect()
}

struct ImportPlan {
    profile: Option<Profile>,
    settings: Option<Settings>,
    tasks: Option<Vec<serde_json::Value>>,
    objects: Option<Vec<serde_json::Value>>,
    requests: Option<Vec<serde_json::Value>>,
}

impl ImportPlan {
    fn decode(document: &serde_json::Value) -> AppResult<Self> {
        let entries = document
            .as_object()
            .ok_or_else(|| AppError::Import("backup must be a JSON object".to_string()))?;

        fn entry<T: DeserializeOwned>(
            entries: &serde_json::Map<String, serde_json::Value>,
            resource: Resource,
        ) -> AppResult<Option<T>> {
            match entries.get(resource.as_str()) {
                None | Some(serde_json::Value::Null) => Ok(None),
                Some(value) => serde_json::from_value(value.clone())
                    .map(Some)
                    .map_err(|error| AppError::Import(format!("invalid {}: {error}", resource.as_str()))),
            }
        }

        Ok(Self {
            profile: entry(entries, Resource::Profile)?,
            settings: entry(entries, Resource::Settings)?,
            tasks: entry::<Vec<serde_json::Value>>(entries, Resource::Tasks)?.map(normalize_entries::<Task>),
            objects: entry::<Vec<serde_json::Value>>(entries, Resource::Objects)?
                .map(normalize_entries::<SapObject>),
            requests: entry::<Vec<serde_json::Value>>(entries, Resource::Requests)?
                .map(normalize_entries::<ChangeRequest>),
        })
    }

    fn apply(self, storage: &Storage) -> Vec<Resource> {
        let mut imported = Vec::new();
        if let Some(profile) = self.profile {
            storage.save_resource(Resource::Profile, &profile);
            imported.push(Resource::Profile);
        }
        if let Some(settings) = self.settings {
            storage.save_resource(Resource::Settings, &settings);
            imported.push(Resource::Settings);
        }
        for (resource, entries) in [
            (Resource::Tasks, self.tasks),
            (Resource::Objects, self.objects),
            (Resource::Requests, self.requests),
        ] {
            if let Some(entries) = entries {
                storage.save_value(resource, &serde_json::Value::Array(entries));
                imported.push(resource);
            }
        }
        imported
    }
}

fn merge_json(target: &mut serde_json::Value, update: serde_json::Value) {
    match (target, update) {
        (serde_json::Value::Object(target_map), serde_json::Value::Object(update_map)) => {
            for (key, value) in update_map {
                merge_json(target_map.entry(key).or_insert(serde_json::Value::Null), value);
            }
        }
        (target, update) => {
            *target = update;
        }
    }
}
