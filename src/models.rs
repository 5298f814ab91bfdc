use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

pub const EXPORT_FORMAT_VERSION: &str = "1.0";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Resource {
    Profile,
    Settings,
    Tasks,
    Objects,
    Requests,
}

impl Resource {
    pub const ALL: [Resource; 5] = [
        Resource::Profile,
        Resource::Settings,
        Resource::Tasks,
        Resource::Objects,
        Resource::Requests,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Profile => "profile",
            Self::Settings => "settings",
            Self::Tasks => "tasks",
            Self::Objects => "objects",
            Self::Requests => "requests",
        }
    }

    /// Key under which the key-value backend persists this resource.
    pub fn storage_key(self) -> &'static str {
        match self {
            Self::Profile => "sap_migration_profile",
            Self::Settings => "sap_migration_settings",
            Self::Tasks => "sap_migration_tasks",
            Self::Objects => "sap_migration_objects",
            Self::Requests => "sap_migration_requests",
        }
    }

    pub fn is_collection(self) -> bool {
        matches!(self, Self::Tasks | Self::Objects | Self::Requests)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TaskStatus {
    #[default]
    #[serde(alias = "planejado")]
    Planned,
    #[serde(alias = "em-andamento")]
    InProgress,
    #[serde(alias = "aguardando")]
    Waiting,
    #[serde(alias = "concluido")]
    Done,
}

impl TaskStatus {
    pub const ALL: [TaskStatus; 4] = [Self::Planned, Self::InProgress, Self::Waiting, Self::Done];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Planned => "planned",
            Self::InProgress => "in-progress",
            Self::Waiting => "waiting",
            Self::Done => "done",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|status| status.as_str() == raw.trim())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Priority {
    #[serde(alias = "baixa")]
    Low,
    #[default]
    #[serde(alias = "media")]
    Medium,
    #[serde(alias = "alta")]
    High,
    #[serde(alias = "critica")]
    Critical,
}

impl Priority {
    pub const ALL: [Priority; 4] = [Self::Low, Self::Medium, Self::High, Self::Critical];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|priority| priority.as_str() == raw.trim())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ObjectStatus {
    #[default]
    #[serde(alias = "nao-analisado")]
    NotAnalyzed,
    #[serde(alias = "analisando")]
    Analyzing,
    #[serde(alias = "precisa-conversao")]
    NeedsConversion,
    #[serde(alias = "convertendo")]
    Converting,
    #[serde(alias = "convertido")]
    Converted,
}

impl ObjectStatus {
    pub const ALL: [ObjectStatus; 5] = [
        Self::NotAnalyzed,
        Self::Analyzing,
        Self::NeedsConversion,
        Self::Converting,
        Self::Converted,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::NotAnalyzed => "not-analyzed",
            Self::Analyzing => "analyzing",
            Self::NeedsConversion => "needs-conversion",
            Self::Converting => "converting",
            Self::Converted => "converted",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|status| status.as_str() == raw.trim())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Complexity {
    #[serde(alias = "baixa")]
    Low,
    #[default]
    #[serde(alias = "media")]
    Medium,
    #[serde(alias = "alta")]
    High,
    #[serde(alias = "muito-alta")]
    VeryHigh,
}

impl Complexity {
    pub const ALL: [Complexity; 4] = [Self::Low, Self::Medium, Self::High, Self::VeryHigh];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::VeryHigh => "very-high",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|complexity| complexity.as_str() == raw.trim())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Impact {
    #[serde(alias = "baixo")]
    Low,
    #[default]
    #[serde(alias = "medio")]
    Medium,
    #[serde(alias = "alto")]
    High,
    #[serde(alias = "critico")]
    Critical,
}

impl Impact {
    pub const ALL: [Impact; 4] = [Self::Low, Self::Medium, Self::High, Self::Critical];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|impact| impact.as_str() == raw.trim())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RequestStatus {
    #[default]
    #[serde(alias = "aberta")]
    Open,
    #[serde(alias = "em-analise")]
    InReview,
    #[serde(alias = "aprovada")]
    Approved,
    #[serde(alias = "rejeitada")]
    Rejected,
    #[serde(alias = "implementada")]
    Implemented,
}

impl RequestStatus {
    pub const ALL: [RequestStatus; 5] = [
        Self::Open,
        Self::InReview,
        Self::Approved,
        Self::Rejected,
        Self::Implemented,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::InReview => "in-review",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
            Self::Implemented => "implemented",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|status| status.as_str() == raw.trim())
    }

    pub fn is_closed(self) -> bool {
        matches!(self, Self::Rejected | Self::Implemented)
    }
}

/// Fields left over after decoding a record. Kept so records written by other versions
/// survive a load/save cycle.
pub type ExtraFields = serde_json::Map<String, serde_json::Value>;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Task {
    #[serde(deserialize_with = "lenient::text")]
    pub id: String,
    #[serde(deserialize_with = "lenient::text")]
    pub title: String,
    #[serde(deserialize_with = "lenient::text")]
    pub description: String,
    #[serde(deserialize_with = "lenient::or_default")]
    pub deadline: Option<NaiveDate>,
    #[serde(deserialize_with = "lenient::or_default")]
    pub status: TaskStatus,
    #[serde(deserialize_with = "lenient::or_default")]
    pub priority: Priority,
    #[serde(deserialize_with = "lenient::text")]
    pub category: String,
    #[serde(deserialize_with = "lenient::progress")]
    pub progress: u8,
    #[serde(deserialize_with = "lenient::number")]
    pub estimated_hours: f64,
    #[serde(deserialize_with = "lenient::number")]
    pub spent_hours: f64,
    #[serde(deserialize_with = "lenient::ids")]
    pub related_objects: Vec<String>,
    #[serde(deserialize_with = "lenient::text")]
    pub notes: String,
    #[serde(deserialize_with = "lenient::or_default")]
    pub created_at: DateTime<Utc>,
    #[serde(deserialize_with = "lenient::or_default")]
    pub updated_at: DateTime<Utc>,
    #[serde(flatten)]
    pub extra: ExtraFields,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SapObject {
    #[serde(deserialize_with = "lenient::text")]
    pub id: String,
    #[serde(alias = "nome", deserialize_with = "lenient::text")]
    pub name: String,
    #[serde(alias = "tipo", deserialize_with = "lenient::text")]
    pub r#type: String,
    #[serde(deserialize_with = "lenient::or_default")]
    pub status: ObjectStatus,
    #[serde(alias = "complexidade", deserialize_with = "lenient::or_default")]
    pub complexity: Complexity,
    #[serde(alias = "impacto", deserialize_with = "lenient::or_default")]
    pub impact: Impact,
    #[serde(deserialize_with = "lenient::number")]
    pub estimated_effort: f64,
    #[serde(deserialize_with = "lenient::text")]
    pub s4_equivalent: String,
    #[serde(deserialize_with = "lenient::ids")]
    pub related_tasks: Vec<String>,
    #[serde(deserialize_with = "lenient::text")]
    pub notes: String,
    #[serde(deserialize_with = "lenient::or_default")]
    pub created_at: DateTime<Utc>,
    #[serde(deserialize_with = "lenient::or_default")]
    pub updated_at: DateTime<Utc>,
    #[serde(flatten)]
    pub extra: ExtraFields,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ChangeRequest {
    #[serde(deserialize_with = "lenient::text")]
    pub id: String,
    #[serde(deserialize_with = "lenient::text")]
    pub title: String,
    #[serde(deserialize_with = "lenient::text")]
    pub description: String,
    #[serde(alias = "tipo", deserialize_with = "lenient::text")]
    pub r#type: String,
    #[serde(deserialize_with = "lenient::or_default")]
    pub status: RequestStatus,
    #[serde(deserialize_with = "lenient::or_default")]
    pub priority: Priority,
    #[serde(deserialize_with = "lenient::text")]
    pub requester: String,
    #[serde(deserialize_with = "lenient::ids")]
    pub related_objects: Vec<String>,
    #[serde(deserialize_with = "lenient::text")]
    pub notes: String,
    #[serde(deserialize_with = "lenient::or_default")]
    pub created_at: DateTime<Utc>,
    #[serde(deserialize_with = "lenient::or_default")]
    pub updated_at: DateTime<Utc>,
    #[serde(flatten)]
    pub extra: ExtraFields,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Profile {
    pub consultant_name: String,
    pub company: String,
    pub project_start_date: Option<NaiveDate>,
    pub avatar: String,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Default for Profile {
    fn default() -> Self {
        Self {
            consultant_name: String::new(),
            company: String::new(),
            project_start_date: None,
            avatar: "👤".to_string(),
            updated_at: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Theme {
    #[default]
    Light,
    Dark,
}

impl Theme {
    pub fn toggled(self) -> Self {
        match self {
            Self::Light => Self::Dark,
            Self::Dark => Self::Light,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    pub theme: Theme,
    pub notifications: bool,
    pub autosave: bool,
    pub language: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            theme: Theme::Light,
            notifications: true,
            autosave: true,
            language: "pt-BR".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskFilter {
    pub query: String,
    pub status: Option<TaskStatus>,
    pub priority: Option<Priority>,
    pub category: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ObjectFilter {
    pub query: String,
    pub status: Option<ObjectStatus>,
    pub impact: Option<Impact>,
    pub r#type: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestFilter {
    pub query: String,
    pub status: Option<RequestStatus>,
    pub priority: Option<Priority>,
    pub r#type: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportDocument {
    pub profile: Profile,
    pub settings: Settings,
    pub tasks: Vec<Task>,
    pub objects: Vec<SapObject>,
    pub requests: Vec<ChangeRequest>,
    pub export_date: DateTime<Utc>,
    pub version: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportResult {
    pub success: bool,
    pub message: String,
    pub imported: Vec<Resource>,
}

impl ImportResult {
    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            imported: Vec::new(),
        }
    }
}

/// Field decoders for collection records. Stored data may come from older exports, so
/// null, mistyped or unknown values decode to the field's default instead of failing the
/// whole record.
mod lenient {
    use serde::de::DeserializeOwned;
    use serde::{Deserialize, Deserializer};
    use serde_json::Value;

    pub fn or_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
    where
        D: Deserializer<'de>,
        T: DeserializeOwned + Default,
    {
        let value = Value::deserialize(deserializer)?;
        Ok(serde_json::from_value(value).unwrap_or_default())
    }

    pub fn text<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
        Ok(match Value::deserialize(deserializer)? {
            Value::String(text) => text,
            Value::Number(number) => number.to_string(),
            Value::Bool(flag) => flag.to_string(),
            _ => String::new(),
        })
    }

    /// Numbers or numeric strings (decimal comma accepted); anything else is zero.
    pub fn number<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
        Ok(as_number(&Value::deserialize(deserializer)?).unwrap_or(0.0))
    }

    pub fn progress<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u8, D::Error> {
        Ok(as_number(&Value::deserialize(deserializer)?)
            .map(|progress| progress.clamp(0.0, 100.0).round() as u8)
            .unwrap_or(0))
    }

    /// A list of ids, or a single comma-separated string of them.
    pub fn ids<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<String>, D::Error> {
        Ok(match Value::deserialize(deserializer)? {
            Value::Array(items) => items
                .into_iter()
                .filter_map(|item| match item {
                    Value::String(id) => Some(id),
                    Value::Number(id) => Some(id.to_string()),
                    _ => None,
                })
                .collect(),
            Value::String(joined) => joined
                .split(',')
                .map(str::trim)
                .filter(|id| !id.is_empty())
                .map(str::to_string)
                .collect(),
            _ => Vec::new(),
        })
    }

    fn as_number(value: &Value) -> Option<f64> {
        let number = match value {
            Value::Number(number) => number.as_f64(),
            Value::String(raw) => raw.trim().replace(',', ".").parse::<f64>().ok(),
            _ => None,
        }?;
        number.is_finite().then_some(number)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn legacy_object_vocabulary_is_accepted() {
        let object: SapObject = serde_json::from_value(serde_json::json!({
            "id": "ZEXIT01",
            "tipo": "exit",
            "status": "nao-analisado",
            "impacto": "critico"
        }))
        .expect("decode legacy object");

        assert_eq!(object.r#type, "exit");
        assert_eq!(object.status, ObjectStatus::NotAnalyzed);
        assert_eq!(object.impact, Impact::Critical);

        let encoded = serde_json::to_value(&object).expect("encode");
        assert_eq!(encoded["type"], "exit");
        assert_eq!(encoded["status"], "not-analyzed");
        assert_eq!(encoded["impact"], "critical");
    }

    #[test]
    fn partial_records_fill_defaults() {
        let task: Task = serde_json::from_value(serde_json::json!({ "id": "TSK004" })).expect("decode task");
        assert_eq!(task.id, "TSK004");
        assert_eq!(task.status, TaskStatus::Planned);
        assert_eq!(task.priority, Priority::Medium);
        assert!(task.deadline.is_none());
        assert!(task.related_objects.is_empty());
    }

    #[test]
    fn legacy_values_decode_to_defaults() {
        let task: Task = serde_json::from_value(serde_json::json!({
            "id": "TSK010",
            "title": null,
            "status": "blocked",
            "priority": 3,
            "progress": "50",
            "estimatedHours": null,
            "spentHours": "2,5",
            "deadline": "",
            "relatedObjects": "ZEXIT01, ZREPORT02",
            "createdAt": "yesterday"
        }))
        .expect("decode legacy task");

        assert_eq!(task.title, "");
        assert_eq!(task.status, TaskStatus::Planned);
        assert_eq!(task.priority, Priority::Medium);
        assert_eq!(task.progress, 50);
        assert_eq!(task.estimated_hours, 0.0);
        assert_eq!(task.spent_hours, 2.5);
        assert!(task.deadline.is_none());
        assert_eq!(task.related_objects, vec!["ZEXIT01", "ZREPORT02"]);

        let request: ChangeRequest =
            serde_json::from_value(serde_json::json!({ "id": 7, "status": "escalated", "priority": "alta" }))
                .expect("decode legacy request");
        assert_eq!(request.id, "7");
        assert_eq!(request.status, RequestStatus::Open);
        assert_eq!(request.priority, Priority::High);
    }

    #[test]
    fn unknown_fields_round_trip() {
        let raw = serde_json::json!({
            "id": "ZEXIT01",
            "tipo": "exit",
            "customField": { "owner": "basis" },
            "wave": 2
        });
        let object: SapObject = serde_json::from_value(raw).expect("decode");
        assert_eq!(object.r#type, "exit");
        assert_eq!(object.extra.len(), 2);
        assert!(!object.extra.contains_key("tipo"));

        let encoded = serde_json::to_value(&object).expect("encode");
        assert_eq!(encoded["customField"]["owner"], "basis");
        assert_eq!(encoded["wave"], 2);
        assert_eq!(encoded["type"], "exit");
    }

    #[test]
    fn enum_parse_matches_wire_names() {
        for status in TaskStatus::ALL {
            assert_eq!(TaskStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(ObjectStatus::parse("needs-conversion"), Some(ObjectStatus::NeedsConversion));
        assert_eq!(Complexity::parse("very-high"), Some(Complexity::VeryHigh));
        assert_eq!(Priority::parse("urgent"), None);
    }

    #[test]
    fn zero_value_singletons_have_fixed_shape() {
        let profile = serde_json::to_value(Profile::default()).expect("profile");
        assert_eq!(profile["consultantName"], "");
        assert!(profile["updatedAt"].is_null());

        let settings = Settings::default();
        assert_eq!(settings.theme, Theme::Light);
        assert!(settings.notifications);
        assert_eq!(settings.theme.toggled(), Theme::Dark);
    }
}
