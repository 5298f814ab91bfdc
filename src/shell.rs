use crate::controllers::{
    ObjectForm, ObjectsController, RequestForm, RequestsController, TaskForm, TasksController,
};
use crate::dashboard::{self, DashboardSummary, Insights};
use crate::db::Storage;
use crate::debounce::Debouncer;
use crate::errors::{AppError, AppResult};
use crate::events::{ChangeEvent, SubscriptionId};
use crate::models::{
    ChangeRequest, ImportResult, ObjectFilter, Profile, RequestFilter, Resource, SapObject, Settings, Task,
    TaskFilter, Theme,
};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::mpsc;

const MAX_TOASTS: usize = 5;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum View {
    #[default]
    Dashboard,
    Tasks,
    Objects,
    Requests,
    Profile,
    Settings,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Modal {
    TaskEditor { editing: Option<String> },
    ObjectEditor { editing: Option<String> },
    RequestEditor { editing: Option<String> },
    ConfirmDelete { resource: Resource, id: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ToastLevel {
    Success,
    Info,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Toast {
    pub level: ToastLevel,
    pub message: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardView {
    pub summary: DashboardSummary,
    pub insights: Insights,
}

/// Application state behind the UI: controllers, navigation, modal and notifications.
///
/// Every storage write queues a change event for the shell. User operations drain the queue
/// before reporting; writes made through [`AppShell::storage`] by other code are applied on
/// the next [`AppShell::process_events`] call.
pub struct AppShell {
    storage: Arc<Storage>,
    tasks: TasksController,
    objects: ObjectsController,
    requests: RequestsController,
    events: mpsc::UnboundedReceiver<ChangeEvent>,
    subscription: SubscriptionId,
    view: View,
    modal: Option<Modal>,
    toasts: VecDeque<Toast>,
    profile: Profile,
    settings: Settings,
    search: Debouncer,
}

impl AppShell {
    pub fn new(storage: Arc<Storage>) -> Self {
        let (subscription, events) = storage.events().channel();
        let mut shell = Self {
            tasks: TasksController::new(storage.clone()),
            objects: ObjectsController::new(storage.clone()),
            requests: RequestsController::new(storage.clone()),
            profile: storage.load_profile(),
            settings: storage.load_settings(),
            storage,
            events,
            subscription,
            view: View::default(),
            modal: None,
            toasts: VecDeque::new(),
            search: Debouncer::default(),
        };
        shell.reload_all();
        shell
    }

    pub fn storage(&self) -> &Arc<Storage> {
        &self.storage
    }

    pub fn tasks(&self) -> &TasksController {
        &self.tasks
    }

    pub fn objects(&self) -> &ObjectsController {
        &self.objects
    }

    pub fn requests(&self) -> &RequestsController {
        &self.requests
    }

    pub fn profile(&self) -> &Profile {
        &self.profile
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn view(&self) -> View {
        self.view
    }

    pub fn navigate(&mut self, view: View) {
        self.modal = None;
        self.view = view;
    }

    pub fn modal(&self) -> Option<&Modal> {
        self.modal.as_ref()
    }

    pub fn open_modal(&mut self, modal: Modal) {
        self.modal = Some(modal);
    }

    pub fn close_modal(&mut self) -> Option<Modal> {
        self.modal.take()
    }

    pub fn toasts(&self) -> impl Iterator<Item = &Toast> {
        self.toasts.iter()
    }

    pub fn take_toasts(&mut self) -> Vec<Toast> {
        self.toasts.drain(..).collect()
    }

    /// Success and info toasts respect the notification setting; errors always show.
    pub fn notify(&mut self, level: ToastLevel, message: impl Into<String>) {
        if level != ToastLevel::Error && !self.settings.notifications {
            return;
        }
        self.toasts.push_back(Toast {
            level,
            message: message.into(),
            created_at: Utc::now(),
        });
        while self.toasts.len() > MAX_TOASTS {
            self.toasts.pop_front();
        }
    }

    /// Applies change events published since the last call. Returns how many were handled.
    pub fn process_events(&mut self) -> usize {
        let mut handled = 0;
        while let Ok(event) = self.events.try_recv() {
            handled += 1;
            match event {
                ChangeEvent::TasksUpdated(tasks) => self.tasks.adopt(tasks),
                ChangeEvent::ObjectsUpdated(objects) => self.objects.adopt(objects),
                ChangeEvent::RequestsUpdated(requests) => self.requests.adopt(requests),
                ChangeEvent::ProfileUpdated(profile) => self.profile = profile,
                ChangeEvent::SettingsUpdated(settings) => self.settings = settings,
                ChangeEvent::ThemeChanged(theme) => self.settings.theme = theme,
                ChangeEvent::DataImported | ChangeEvent::DataCleared => self.reload_all(),
            }
        }
        handled
    }

    pub fn reload_all(&mut self) {
        self.tasks.load();
        self.objects.load();
        self.requests.load();
        self.profile = self.storage.load_profile();
        self.settings = self.storage.load_settings();
    }

    /// Resolves to `Some(query)` once search input has been quiet for the debounce period,
    /// or `None` if newer input arrived meanwhile. The future does not borrow the shell, so
    /// one can be spawned per keystroke and the surviving query passed to `apply_search`.
    pub fn settle_search(&self, query: &str) -> impl Future<Output = Option<String>> + Send + 'static {
        let debouncer = self.search.clone();
        let query = query.to_string();
        async move { debouncer.settle(query).await }
    }

    /// Sets the free-text query of a collection's filter, keeping its other criteria.
    pub fn apply_search(&mut self, resource: Resource, query: &str) {
        let query = query.to_string();
        match resource {
            Resource::Tasks => self.tasks.set_filter(TaskFilter {
                query,
                ..self.tasks.filter().clone()
            }),
            Resource::Objects => self.objects.set_filter(ObjectFilter {
                query,
                ..self.objects.filter().clone()
            }),
            Resource::Requests => self.requests.set_filter(RequestFilter {
                query,
                ..self.requests.filter().clone()
            }),
            Resource::Profile | Resource::Settings => {}
        }
    }

    pub fn set_task_filter(&mut self, filter: TaskFilter) {
        self.tasks.set_filter(filter);
    }

    pub fn set_object_filter(&mut self, filter: ObjectFilter) {
        self.objects.set_filter(filter);
    }

    pub fn set_request_filter(&mut self, filter: RequestFilter) {
        self.requests.set_filter(filter);
    }

    pub fn save_task(&mut self, form: &TaskForm, editing: Option<&str>) -> AppResult<Task> {
        let result = self.tasks.save(form, editing);
        self.finish_edit(result, "Task saved")
    }

    pub fn save_object(&mut self, form: &ObjectForm, editing: Option<&str>) -> AppResult<SapObject> {
        let result = self.objects.save(form, editing);
        self.finish_edit(result, "Object saved")
    }

    pub fn save_request(&mut self, form: &RequestForm, editing: Option<&str>) -> AppResult<ChangeRequest> {
        let result = self.requests.save(form, editing);
        self.finish_edit(result, "Change request saved")
    }

    pub fn request_delete(&mut self, resource: Resource, id: &str) {
        self.open_modal(Modal::ConfirmDelete {
            resource,
            id: id.to_string(),
        });
    }

    /// Executes the pending delete confirmation, if any.
    pub fn confirm_delete(&mut self) -> AppResult<()> {
        let Some(Modal::ConfirmDelete { resource, id }) = self.modal.clone() else {
            return Err(AppError::NotFound("no delete awaiting confirmation".to_string()));
        };
        self.modal = None;

        let result = match resource {
            Resource::Tasks => self.tasks.delete(&id),
            Resource::Objects => self.objects.delete(&id),
            Resource::Requests => self.requests.delete(&id),
            Resource::Profile | Resource::Settings => Err(AppError::Validation(format!(
                "{} cannot be deleted",
                resource.as_str()
            ))),
        };
        self.report(result, &format!("Deleted {id}"))
    }

    pub fn save_profile(&mut self, profile: Profile) -> Profile {
        self.profile = self.storage.save_profile(profile);
        self.process_events();
        self.notify(ToastLevel::Success, "Profile saved");
        self.profile.clone()
    }

    pub fn update_settings(&mut self, update: serde_json::Value) -> AppResult<Settings> {
        let result = self.storage.update_settings(update);
        let settings = self.report(result, "Settings saved")?;
        self.settings = settings.clone();
        Ok(settings)
    }

    pub fn toggle_theme(&mut self) -> AppResult<Theme> {
        let theme = self.settings.theme.toggled();
        let result = self.storage.update_settings(serde_json::json!({ "theme": theme }));
        if let Ok(settings) = &result {
            self.storage.events().publish(ChangeEvent::ThemeChanged(settings.theme));
        }
        let message = match theme {
            Theme::Light => "Light theme enabled",
            Theme::Dark => "Dark theme enabled",
        };
        let settings = self.report(result, message)?;
        self.settings = settings;
        Ok(self.settings.theme)
    }

    pub fn import_backup(&mut self, raw: &str) -> ImportResult {
        let result = self.storage.import_json(raw);
        self.process_events();
        if result.success {
            self.notify(ToastLevel::Success, result.message.clone());
        } else {
            self.notify(ToastLevel::Error, format!("Import failed: {}", result.message));
        }
        result
    }

    pub fn export_backup(&mut self, dir: &Path) -> AppResult<PathBuf> {
        let result = self.storage.export_to_dir(dir);
        self.report(result, "Backup exported")
    }

    pub fn clear_all_data(&mut self) -> AppResult<()> {
        let result = self.storage.clear_all();
        self.report(result, "All data cleared")
    }

    pub fn dashboard(&self, today: NaiveDate) -> DashboardView {
        DashboardView {
            summary: dashboard::summarize(self.tasks.tasks(), self.objects.objects(), self.requests.requests()),
            insights: dashboard::insights(self.tasks.tasks(), self.objects.objects(), today),
        }
    }

    fn finish_edit<T>(&mut self, result: AppResult<T>, success: &str) -> AppResult<T> {
        if result.is_ok() {
            self.modal = None;
        }
        self.report(result, success)
    }

    fn report<T>(&mut self, result: AppResult<T>, success: &str) -> AppResult<T> {
        self.process_events();
        match &result {
            Ok(_) => self.notify(ToastLevel::Success, success),
            Err(error) => self.notify(ToastLevel::Error, error.to_string()),
        }
        result
    }
}

impl Drop for AppShell {
    fn drop(&mut self) {
        self.storage.events().unsubscribe(&self.subscription);
    }
}
