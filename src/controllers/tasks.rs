use super::{format_hours, join_ids, parse_choice, parse_date, parse_hours, required, split_ids, CollectionView};
use crate::db::Storage;
use crate::errors::{AppError, AppResult};
use crate::models::{Priority, Task, TaskFilter, TaskStatus};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Task editor fields as entered by the user.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TaskForm {
    pub title: String,
    pub description: String,
    pub deadline: String,
    pub status: String,
    pub priority: String,
    pub category: String,
    pub progress: String,
    pub estimated_hours: String,
    pub spent_hours: String,
    pub related_objects: String,
    pub notes: String,
}

impl TaskForm {
    pub fn from_task(task: &Task) -> Self {
        Self {
            title: task.title.clone(),
            description: task.description.clone(),
            deadline: task
                .deadline
                .map(|date| date.format("%Y-%m-%d").to_string())
                .unwrap_or_default(),
            status: task.status.as_str().to_string(),
            priority: task.priority.as_str().to_string(),
            category: task.category.clone(),
            progress: task.progress.to_string(),
            estimated_hours: format_hours(task.estimated_hours),
            spent_hours: format_hours(task.spent_hours),
            related_objects: join_ids(&task.related_objects),
            notes: task.notes.clone(),
        }
    }
}

fn parse_progress(raw: &str) -> AppResult<u8> {
    let value = raw.trim();
    if value.is_empty() {
        return Ok(0);
    }
    value
        .parse::<u32>()
        .map(|progress| progress.min(100) as u8)
        .map_err(|_| AppError::Validation("progress must be a whole number between 0 and 100".to_string()))
}

pub struct TasksController {
    view: CollectionView<Task>,
}

impl TasksController {
    pub fn new(storage: Arc<Storage>) -> Self {
        Self {
            view: CollectionView::new(storage),
        }
    }

    pub fn load(&mut self) {
        self.view.load();
    }

    pub fn tasks(&self) -> &[Task] {
        self.view.all()
    }

    pub fn visible(&self) -> &[Task] {
        self.view.visible()
    }

    pub fn set_filter(&mut self, filter: TaskFilter) {
        self.view.set_filter(filter);
    }

    pub fn filter(&self) -> &TaskFilter {
        self.view.filter()
    }

    pub fn adopt(&mut self, tasks: Vec<Task>) {
        self.view.adopt(tasks);
    }

    pub fn reset(&mut self) {
        self.view.reset();
    }

    pub fn form_for(&self, id: &str) -> Option<TaskForm> {
        self.view.find(id).map(TaskForm::from_task)
    }

    /// Validates `form` and stores it as a new task, or as an edit of `editing_id`.
    pub fn save(&mut self, form: &TaskForm, editing_id: Option<&str>) -> AppResult<Task> {
        let title = required(&form.title, "title")?;
        let deadline = parse_date(&required(&form.deadline, "deadline")?, "deadline")?;
        let status = parse_choice(&form.status, "status", TaskStatus::parse)?;
        let priority = parse_choice(&form.priority, "priority", Priority::parse)?;
        let now = Utc::now();

        let mut task = Task {
            id: String::new(),
            title,
            description: form.description.trim().to_string(),
            deadline,
            status,
            priority,
            category: form.category.trim().to_string(),
            progress: parse_progress(&form.progress)?,
            estimated_hours: parse_hours(&form.estimated_hours, "estimated hours")?,
            spent_hours: parse_hours(&form.spent_hours, "spent hours")?,
            related_objects: split_ids(&form.related_objects),
            notes: form.notes.trim().to_string(),
            created_at: now,
            updated_at: now,
            extra: Default::default(),
        };

        let result = match editing_id {
            Some(id) => {
                task.id = id.to_string();
                if let Some(existing) = self.view.find(id) {
                    task.created_at = existing.created_at;
                    task.extra = existing.extra.clone();
                }
                self.view.storage().upsert(task.clone())
            }
            None => {
                task.id = self.view.storage().next_task_id();
                if self.view.contains(&task.id) {
                    return Err(AppError::Duplicate(format!("task {} already exists", task.id)));
                }
                self.view.storage().insert(task.clone())
            }
        };

        self.view.commit(result)?;
        tracing::info!(id = %task.id, edit = editing_id.is_some(), "task saved");
        Ok(task)
    }

    pub fn delete(&mut self, id: &str) -> AppResult<()> {
        self.view.delete(id)
    }
}

#[cfg(test)]
mod tests {
    use super::{TaskForm, TasksController};
    use crate::config::StorageConfig;
    use crate::db::Storage;
    use crate::errors::AppError;
    use crate::models::{Priority, TaskFilter, TaskStatus};
    use std::sync::Arc;

    fn controller(dir: &tempfile::TempDir) -> TasksController {
        let storage = Arc::new(Storage::open(&StorageConfig::new(dir.path())).expect("storage"));
        let mut controller = TasksController::new(storage);
        controller.load();
        controller
    }

    fn form(title: &str) -> TaskForm {
        TaskForm {
            title: title.to_string(),
            deadline: "2025-05-30".to_string(),
            priority: "high".to_string(),
            progress: "130".to_string(),
            estimated_hours: "12".to_string(),
            related_objects: "zexit01, zreport02".to_string(),
            ..TaskForm::default()
        }
    }

    #[test]
    fn new_tasks_get_sequential_ids() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut controller = controller(&dir);

        let first = controller.save(&form("Inventory custom code"), None).expect("save");
        let second = controller.save(&form("Simplification checks"), None).expect("save");

        assert_eq!(first.id, "TSK001");
        assert_eq!(second.id, "TSK002");
        assert_eq!(first.priority, Priority::High);
        assert_eq!(first.progress, 100);
        assert_eq!(first.related_objects, vec!["ZEXIT01", "ZREPORT02"]);
        assert_eq!(controller.tasks().len(), 2);
    }

    #[test]
    fn missing_required_fields_abort_before_write() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut controller = controller(&dir);

        let no_title = controller.save(&form("  "), None).expect_err("title");
        assert!(matches!(no_title, AppError::Validation(_)));

        let mut no_deadline = form("Plan cutover");
        no_deadline.deadline.clear();
        assert!(controller.save(&no_deadline, None).is_err());

        let mut bad_status = form("Plan cutover");
        bad_status.status = "finished".to_string();
        assert!(controller.save(&bad_status, None).is_err());

        assert!(controller.tasks().is_empty());
        assert!(controller.view.storage().load_tasks().is_empty());
    }

    #[test]
    fn editing_keeps_id_and_creation_time() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut controller = controller(&dir);
        let created = controller.save(&form("Draft"), None).expect("save");

        let mut edit = controller.form_for(&created.id).expect("form");
        assert_eq!(edit.title, "Draft");
        edit.title = "Final".to_string();
        edit.status = "done".to_string();
        let updated = controller.save(&edit, Some(&created.id)).expect("edit");

        assert_eq!(updated.id, created.id);
        assert_eq!(updated.created_at, created.created_at);
        assert_eq!(updated.status, TaskStatus::Done);
        assert_eq!(controller.tasks().len(), 1);
        assert_eq!(controller.tasks()[0].title, "Final");
    }

    #[test]
    fn editing_keeps_fields_the_form_does_not_show() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut controller = controller(&dir);
        let imported = controller.view.storage().import_value(serde_json::json!({
            "tasks": [{ "id": "TSK001", "title": "Imported", "deadline": "2025-05-30", "wave": 3 }]
        }));
        assert!(imported.success, "{}", imported.message);
        controller.load();

        let mut edit = controller.form_for("TSK001").expect("form");
        edit.title = "Edited".to_string();
        controller.save(&edit, Some("TSK001")).expect("edit");

        let stored = controller.view.storage().get_task("TSK001").expect("stored");
        assert_eq!(stored.title, "Edited");
        assert_eq!(stored.extra.get("wave"), Some(&serde_json::json!(3)));
    }

    #[test]
    fn filter_survives_mutations() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut controller = controller(&dir);
        controller.set_filter(TaskFilter {
            query: "cutover".to_string(),
            ..TaskFilter::default()
        });

        controller.save(&form("Cutover rehearsal"), None).expect("save");
        controller.save(&form("Fiori launchpad"), None).expect("save");

        assert_eq!(controller.visible().len(), 1);
        controller.delete("TSK001").expect("delete");
        assert!(controller.visible().is_empty());
        assert_eq!(controller.tasks().len(), 1);
    }
}
