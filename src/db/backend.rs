use crate::errors::AppResult;
use crate::models::Resource;

/// One physical store behind the `Storage` façade.
///
/// Values are whole resources as JSON: an array of records for collection resources, an
/// object for the profile and settings singletons.
pub trait StorageBackend: Send + Sync {
    fn name(&self) -> &'static str;

    fn supports(&self, resource: Resource) -> bool;

    /// `Ok(None)` when nothing has been stored for the resource yet.
    fn load(&self, resource: Resource) -> AppResult<Option<serde_json::Value>>;

    /// Replaces the stored resource with `value`.
    fn save_all(&self, resource: Resource, value: &serde_json::Value) -> AppResult<()>;

    /// Removes every resource this backend holds.
    fn clear(&self) -> AppResult<()>;
}
