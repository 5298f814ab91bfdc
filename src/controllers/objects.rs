use super::{format_hours, join_ids, parse_choice, parse_hours, required, split_ids, CollectionView};
use crate::db::Storage;
use crate::errors::{AppError, AppResult};
use crate::models::{Complexity, Impact, ObjectFilter, ObjectStatus, SapObject};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ObjectForm {
    pub id: String,
    pub name: String,
    pub r#type: String,
    pub status: String,
    pub complexity: String,
    pub impact: String,
    pub estimated_effort: String,
    pub s4_equivalent: String,
    pub related_tasks: String,
    pub notes: String,
}

impl ObjectForm {
    pub fn from_object(object: &SapObject) -> Self {
        Self {
            id: object.id.clone(),
            name: object.name.clone(),
            r#type: object.r#type.clone(),
            status: object.status.as_str().to_string(),
            complexity: object.complexity.as_str().to_string(),
            impact: object.impact.as_str().to_string(),
            estimated_effort: format_hours(object.estimated_effort),
            s4_equivalent: object.s4_equivalent.clone(),
            related_tasks: join_ids(&object.related_tasks),
            notes: object.notes.clone(),
        }
    }
}

pub struct ObjectsController {
    view: CollectionView<SapObject>,
}

impl ObjectsController {
    pub fn new(storage: Arc<Storage>) -> Self {
        Self {
            view: CollectionView::new(storage),
        }
    }

    pub fn load(&mut self) {
        self.view.load();
    }

    pub fn objects(&self) -> &[SapObject] {
        self.view.all()
    }

    pub fn visible(&self) -> &[SapObject] {
        self.view.visible()
    }

    pub fn set_filter(&mut self, filter: ObjectFilter) {
        self.view.set_filter(filter);
    }

    pub fn filter(&self) -> &ObjectFilter {
        self.view.filter()
    }

    pub fn adopt(&mut self, objects: Vec<SapObject>) {
        self.view.adopt(objects);
    }

    pub fn reset(&mut self) {
        self.view.reset();
    }

    pub fn form_for(&self, id: &str) -> Option<ObjectForm> {
        self.view.find(id).map(ObjectForm::from_object)
    }

    /// Object ids are chosen by the user; new ids must not collide with existing objects.
    /// An edit keeps `editing_id` whatever the form's id field says.
    pub fn save(&mut self, form: &ObjectForm, editing_id: Option<&str>) -> AppResult<SapObject> {
        let id = match editing_id {
            Some(id) => id.to_string(),
            None => required(&form.id, "object id")?.to_uppercase(),
        };
        let kind = required(&form.r#type, "object type")?;
        let now = Utc::now();

        let mut object = SapObject {
            id,
            name: form.name.trim().to_string(),
            r#type: kind,
            status: parse_choice(&form.status, "status", ObjectStatus::parse)?,
            complexity: parse_choice(&form.complexity, "complexity", Complexity::parse)?,
            impact: parse_choice(&form.impact, "impact", Impact::parse)?,
            estimated_effort: parse_hours(&form.estimated_effort, "estimated effort")?,
            s4_equivalent: form.s4_equivalent.trim().to_string(),
            related_tasks: split_ids(&form.related_tasks),
            notes: form.notes.trim().to_string(),
            created_at: now,
            updated_at: now,
            extra: Default::default(),
        };

        let result = if editing_id.is_some() {
            if let Some(existing) = self.view.find(&object.id) {
                object.created_at = existing.created_at;
                object.extra = existing.extra.clone();
            }
            self.view.storage().upsert(object.clone())
        } else {
            if self.view.contains(&object.id) {
                return Err(AppError::Duplicate(format!("object {} already exists", object.id)));
            }
            self.view.storage().insert(object.clone())
        };

        self.view.commit(result)?;
        tracing::info!(id = %object.id, edit = editing_id.is_some(), "object saved");
        Ok(object)
    }

    pub fn delete(&mut self, id: &str) -> AppResult<()> {
        self.view.delete(id)
    }
}

#[cfg(test)]
mod tests {
    use super::{ObjectForm, ObjectsController};
    use crate::config::StorageConfig;
    use crate::db::Storage;
    use crate::errors::AppError;
    use crate::models::{Impact, ObjectStatus, SapObject};
    use std::sync::Arc;

    fn setup(dir: &tempfile::TempDir) -> (Arc<Storage>, ObjectsController) {
        let storage = Arc::new(Storage::open(&StorageConfig::new(dir.path())).expect("storage"));
        let mut controller = ObjectsController::new(storage.clone());
        controller.load();
        (storage, controller)
    }

    fn form(id: &str) -> ObjectForm {
        ObjectForm {
            id: id.to_string(),
            name: "Sales order exit".to_string(),
            r#type: "exit".to_string(),
            impact: "critical".to_string(),
            ..ObjectForm::default()
        }
    }

    #[test]
    fn ids_are_uppercased_and_unique() {
        let dir = tempfile::tempdir().expect("tempdir");
        let (_storage, mut controller) = setup(&dir);

        let saved = controller.save(&form("zexit01"), None).expect("save");
        assert_eq!(saved.id, "ZEXIT01");
        assert_eq!(saved.impact, Impact::Critical);

        let duplicate = controller.save(&form("ZEXIT01"), None).expect_err("duplicate");
        assert!(matches!(duplicate, AppError::Duplicate(_)));
        assert_eq!(controller.objects().len(), 1);
    }

    #[test]
    fn stale_snapshot_still_rejects_stored_duplicate() {
        let dir = tempfile::tempdir().expect("tempdir");
        let (storage, mut controller) = setup(&dir);
        storage
            .save_object(SapObject {
                id: "ZREPORT01".to_string(),
                ..SapObject::default()
            })
            .expect("save behind controller's back");

        let error = controller.save(&form("ZREPORT01"), None).expect_err("duplicate");
        assert!(matches!(error, AppError::Duplicate(_)));
        assert!(controller.objects().is_empty());
        assert_eq!(storage.load_objects().len(), 1);
    }

    #[test]
    fn edits_bypass_uniqueness_and_replace_record() {
        let dir = tempfile::tempdir().expect("tempdir");
        let (_storage, mut controller) = setup(&dir);
        controller.save(&form("ZEXIT01"), None).expect("save");

        let mut edit = controller.form_for("ZEXIT01").expect("form");
        edit.status = "converted".to_string();
        let updated = controller.save(&edit, Some("ZEXIT01")).expect("edit");

        assert_eq!(updated.status, ObjectStatus::Converted);
        assert_eq!(controller.objects().len(), 1);
    }

    #[test]
    fn id_and_type_are_required() {
        let dir = tempfile::tempdir().expect("tempdir");
        let (_storage, mut controller) = setup(&dir);

        assert!(controller.save(&form(""), None).is_err());
        let mut untyped = form("ZFORM01");
        untyped.r#type = " ".to_string();
        assert!(controller.save(&untyped, None).is_err());
        assert!(controller.objects().is_empty());
    }
}
