mod objects;
mod requests;
mod tasks;

pub use objects::{ObjectForm, ObjectsController};
pub use requests::{RequestForm, RequestsController};
pub use tasks::{TaskForm, TasksController};

use crate::db::Storage;
use crate::errors::{AppError, AppResult};
use crate::records::{filter_records, Record};
use chrono::NaiveDate;
use std::sync::Arc;

/// In-memory copy of one collection plus the currently filtered view of it.
pub struct CollectionView<T: Record> {
    storage: Arc<Storage>,
    all: Vec<T>,
    visible: Vec<T>,
    filter: T::Filter,
}

impl<T: Record> CollectionView<T> {
    pub fn new(storage: Arc<Storage>) -> Self {
        Self {
            storage,
            all: Vec::new(),
            visible: Vec::new(),
            filter: T::Filter::default(),
        }
    }

    pub fn storage(&self) -> &Arc<Storage> {
        &self.storage
    }

    pub fn load(&mut self) {
        self.all = self.storage.load::<T>();
        self.refresh();
    }

    pub fn all(&self) -> &[T] {
        &self.all
    }

    pub fn visible(&self) -> &[T] {
        &self.visible
    }

    pub fn filter(&self) -> &T::Filter {
        &self.filter
    }

    pub fn set_filter(&mut self, filter: T::Filter) {
        self.filter = filter;
        self.refresh();
    }

    pub fn find(&self, id: &str) -> Option<&T> {
        self.all.iter().find(|record| record.id() == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.find(id).is_some()
    }

    /// Replaces the in-memory collection, e.g. with the payload of a change event.
    pub fn adopt(&mut self, records: Vec<T>) {
        self.all = records;
        self.refresh();
    }

    pub fn reset(&mut self) {
        self.all.clear();
        self.visible.clear();
    }

    pub fn delete(&mut self, id: &str) -> AppResult<()> {
        let result = self.storage.delete::<T>(id);
        self.commit(result)
    }

    fn commit(&mut self, result: AppResult<Vec<T>>) -> AppResult<()> {
        match result {
            Ok(records) => {
                self.adopt(records);
                Ok(())
            }
            Err(error) => {
                tracing::warn!(resource = T::RESOURCE.as_str(), error = %error, "storage write failed, view reset");
                self.reset();
                Err(error)
            }
        }
    }

    fn refresh(&mut self) {
        self.visible = filter_records(&self.all, &self.filter);
    }
}

fn required(raw: &str, field: &str) -> AppResult<String> {
    let value = raw.trim();
    if value.is_empty() {
        return Err(AppError::Validation(format!("{field} is required")));
    }
    Ok(value.to_string())
}

fn parse_date(raw: &str, field: &str) -> AppResult<Option<NaiveDate>> {
    let value = raw.trim();
    if value.is_empty() {
        return Ok(None);
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map(Some)
        .map_err(|_| AppError::Validation(format!("{field} must be a date (YYYY-MM-DD)")))
}

fn parse_hours(raw: &str, field: &str) -> AppResult<f64> {
    let value = raw.trim();
    if value.is_empty() {
        return Ok(0.0);
    }
    match value.replace(',', ".").parse::<f64>() {
        Ok(hours) if hours.is_finite() && hours >= 0.0 => Ok(hours),
        _ => Err(AppError::Validation(format!("{field} must be a non-negative number"))),
    }
}

fn parse_choice<E: Default>(raw: &str, field: &str, parse: impl Fn(&str) -> Option<E>) -> AppResult<E> {
    if raw.trim().is_empty() {
        return Ok(E::default());
    }
    parse(raw).ok_or_else(|| AppError::Validation(format!("{field} has an unknown value: {}", raw.trim())))
}

fn split_ids(raw: &str) -> Vec<String> {
    let mut ids: Vec<String> = Vec::new();
    for id in raw
        .split(|c: char| c == ',' || c == ';' || c.is_whitespace())
        .map(|id| id.trim().to_uppercase())
        .filter(|id| !id.is_empty())
    {
        if !ids.contains(&id) {
            ids.push(id);
        }
    }
    ids
}

fn join_ids(ids: &[String]) -> String {
    ids.join(", ")
}

fn format_hours(hours: f64) -> String {
    if hours == 0.0 {
        String::new()
    } else {
        hours.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::{parse_choice, parse_date, parse_hours, required, split_ids, CollectionView};
    use crate::config::StorageConfig;
    use crate::db::Storage;
    use crate::models::{Task, TaskFilter, TaskStatus};
    use std::sync::Arc;

    #[test]
    fn field_parsers_validate_input() {
        assert!(required("  ", "title").is_err());
        assert_eq!(required(" Plan ", "title").expect("value"), "Plan");
        assert_eq!(parse_date("", "deadline").expect("empty"), None);
        assert!(parse_date("15/04/2025", "deadline").is_err());
        assert_eq!(parse_hours("2,5", "hours").expect("hours"), 2.5);
        assert!(parse_hours("-1", "hours").is_err());
        assert_eq!(parse_choice("", "status", TaskStatus::parse).expect("default"), TaskStatus::Planned);
        assert!(parse_choice("finished", "status", TaskStatus::parse).is_err());
    }

    #[test]
    fn id_lists_are_normalized() {
        assert_eq!(split_ids("zexit01, ZREPORT02;zexit01  zform"), vec!["ZEXIT01", "ZREPORT02", "ZFORM"]);
        assert!(split_ids(" , ").is_empty());
    }

    #[test]
    fn view_filters_in_memory() {
        let dir = tempfile::tempdir().expect("tempdir");
        let storage = Arc::new(Storage::open(&StorageConfig::new(dir.path())).expect("storage"));
        let mut view = CollectionView::<Task>::new(storage);
        view.adopt(vec![
            Task {
                id: "TSK001".to_string(),
                status: TaskStatus::Done,
                ..Task::default()
            },
            Task {
                id: "TSK002".to_string(),
                ..Task::default()
            },
        ]);

        view.set_filter(TaskFilter {
            status: Some(TaskStatus::Done),
            ..TaskFilter::default()
        });
        assert_eq!(view.visible().len(), 1);
        assert_eq!(view.all().len(), 2);

        view.reset();
        assert!(view.visible().is_empty());
        assert!(!view.contains("TSK001"));
    }
}
