use super::backend::StorageBackend;
use crate::errors::{AppError, AppResult};
use crate::models::Resource;
use rusqlite::{params, Connection};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

const SCHEMA_SQL: &str = include_str!("schema.sql");
pub const SCHEMA_VERSION: i64 = 1;

/// SQLite database with one table ("store") per collection resource. Rows keep the
/// position they were written at so loads return records in saved order.
#[derive(Debug)]
pub struct IndexedBackend {
    conn: Mutex<Connection>,
    db_path: PathBuf,
}

impl IndexedBackend {
    pub fn open(path: &Path) -> AppResult<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|err| AppError::Io(err.to_string()))?;
        }
        let conn = Connection::open(path).map_err(AppError::from)?;
        conn.execute_batch(SCHEMA_SQL).map_err(AppError::from)?;

        let version: i64 = conn.query_row("PRAGMA user_version", [], |row| row.get(0))?;
        if version == 0 {
            conn.pragma_update(None, "user_version", SCHEMA_VERSION)?;
        }

        Ok(Self {
            conn: Mutex::new(conn),
            db_path: path.to_path_buf(),
        })
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    pub fn schema_version(&self) -> AppResult<i64> {
        let conn = self.lock()?;
        Ok(conn.query_row("PRAGMA user_version", [], |row| row.get(0))?)
    }

    fn lock(&self) -> AppResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| AppError::Internal("database mutex poisoned".to_string()))
    }
}

fn store_name(resource: Resource) -> AppResult<&'static str> {
    match resource {
        Resource::Tasks => Ok("tasks"),
        Resource::Objects => Ok("objects"),
        Resource::Requests => Ok("requests"),
        other => Err(AppError::Internal(format!(
            "{} has no indexed store",
            other.as_str()
        ))),
    }
}

impl StorageBackend for IndexedBackend {
    fn name(&self) -> &'static str {
        "indexed"
    }

    fn supports(&self, resource: Resource) -> bool {
        resource.is_collection()
    }

    fn load(&self, resource: Resource) -> AppResult<Option<serde_json::Value>> {
        let store = store_name(resource)?;
        let conn = self.lock()?;
        let mut statement = conn.prepare(&format!("SELECT record_json FROM {store} ORDER BY position ASC"))?;
        let rows = statement
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;

        let mut records = Vec::with_capacity(rows.len());
        for raw in rows {
            records.push(serde_json::from_str::<serde_json::Value>(&raw)?);
        }
        Ok(Some(serde_json::Value::Array(records)))
    }

    fn save_all(&self, resource: Resource, value: &serde_json::Value) -> AppResult<()> {
        let store = store_name(resource)?;
        let records = value
            .as_array()
            .ok_or_else(|| AppError::Internal(format!("{store} must be saved as a list")))?;

        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        tx.execute(&format!("DELETE FROM {store}"), [])?;
        {
            let mut insert = tx.prepare(&format!(
                "INSERT OR REPLACE INTO {store} (id, position, record_json) VALUES (?1, ?2, ?3)"
            ))?;
            for (position, record) in records.iter().enumerate() {
                let id = record
                    .get("id")
                    .and_then(serde_json::Value::as_str)
                    .ok_or_else(|| AppError::Internal(format!("{store} record without an id")))?;
                insert.execute(params![id, position as i64, serde_json::to_string(record)?])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    fn clear(&self) -> AppResult<()> {
        let conn = self.lock()?;
        conn.execute_batch("DELETE FROM tasks; DELETE FROM objects; DELETE FROM requests;")?;
        Ok(())
    }
}
