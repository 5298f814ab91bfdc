use super::{join_ids, parse_choice, required, split_ids, CollectionView};
use crate::db::Storage;
use crate::errors::{AppError, AppResult};
use crate::models::{ChangeRequest, Priority, RequestFilter, RequestStatus};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RequestForm {
    pub title: String,
    pub description: String,
    pub r#type: String,
    pub status: String,
    pub priority: String,
    pub requester: String,
    pub related_objects: String,
    pub notes: String,
}

impl RequestForm {
    pub fn from_request(request: &ChangeRequest) -> Self {
        Self {
            title: request.title.clone(),
            description: request.description.clone(),
            r#type: request.r#type.clone(),
            status: request.status.as_str().to_string(),
            priority: request.priority.as_str().to_string(),
            requester: request.requester.clone(),
            related_objects: join_ids(&request.related_objects),
            notes: request.notes.clone(),
        }
    }
}

pub struct RequestsController {
    view: CollectionView<ChangeRequest>,
}

impl RequestsController {
    pub fn new(storage: Arc<Storage>) -> Self {
        Self {
            view: CollectionView::new(storage),
        }
    }

    pub fn load(&mut self) {
        self.view.load();
    }

    pub fn requests(&self) -> &[ChangeRequest] {
        self.view.all()
    }

    pub fn visible(&self) -> &[ChangeRequest] {
        self.view.visible()
    }

    pub fn set_filter(&mut self, filter: RequestFilter) {
        self.view.set_filter(filter);
    }

    pub fn filter(&self) -> &RequestFilter {
        self.view.filter()
    }

    pub fn adopt(&mut self, requests: Vec<ChangeRequest>) {
        self.view.adopt(requests);
    }

    pub fn reset(&mut self) {
        self.view.reset();
    }

    pub fn form_for(&self, id: &str) -> Option<RequestForm> {
        self.view.find(id).map(RequestForm::from_request)
    }

    pub fn save(&mut self, form: &RequestForm, editing_id: Option<&str>) -> AppResult<ChangeRequest> {
        let title = required(&form.title, "title")?;
        let kind = required(&form.r#type, "request type")?;
        let now = Utc::now();

        let mut request = ChangeRequest {
            id: String::new(),
            title,
            description: form.description.trim().to_string(),
            r#type: kind,
            status: parse_choice(&form.status, "status", RequestStatus::parse)?,
            priority: parse_choice(&form.priority, "priority", Priority::parse)?,
            requester: form.requester.trim().to_string(),
            related_objects: split_ids(&form.related_objects),
            notes: form.notes.trim().to_string(),
            created_at: now,
            updated_at: now,
            extra: Default::default(),
        };

        let result = match editing_id {
            Some(id) => {
                request.id = id.to_string();
                if let Some(existing) = self.view.find(id) {
                    request.created_at = existing.created_at;
                    request.extra = existing.extra.clone();
                }
                self.view.storage().upsert(request.clone())
            }
            None => {
                request.id = self.view.storage().next_request_id();
                if self.view.contains(&request.id) {
                    return Err(AppError::Duplicate(format!("request {} already exists", request.id)));
                }
                self.view.storage().insert(request.clone())
            }
        };

        self.view.commit(result)?;
        tracing::info!(id = %request.id, edit = editing_id.is_some(), "change request saved");
        Ok(request)
    }

    pub fn delete(&mut self, id: &str) -> AppResult<()> {
        self.view.delete(id)
    }
}
