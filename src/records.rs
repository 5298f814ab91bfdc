use crate::events::ChangeEvent;
use crate::models::{ChangeRequest, ObjectFilter, RequestFilter, Resource, SapObject, Task, TaskFilter};
use serde::de::DeserializeOwned;
use serde::Serialize;

/// A record stored in one of the collection resources.
pub trait Record: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    type Filter: Default + Clone + Send + Sync;

    const RESOURCE: Resource;

    fn id(&self) -> &str;

    fn matches(&self, filter: &Self::Filter) -> bool;

    fn updated_event(records: Vec<Self>) -> ChangeEvent;
}

impl Record for Task {
    type Filter = TaskFilter;

    const RESOURCE: Resource = Resource::Tasks;

    fn id(&self) -> &str {
        &self.id
    }

    fn matches(&self, filter: &TaskFilter) -> bool {
        text_matches(&filter.query, [&self.title, &self.description, &self.notes])
            && filter.status.map_or(true, |status| self.status == status)
            && filter.priority.map_or(true, |priority| self.priority == priority)
            && filter.category.as_deref().map_or(true, |category| self.category == category)
    }

    fn updated_event(records: Vec<Self>) -> ChangeEvent {
        ChangeEvent::TasksUpdated(records)
    }
}

impl Record for SapObject {
    type Filter = ObjectFilter;

    const RESOURCE: Resource = Resource::Objects;

    fn id(&self) -> &str {
        &self.id
    }

    fn matches(&self, filter: &ObjectFilter) -> bool {
        text_matches(&filter.query, [&self.id, &self.name, &self.s4_equivalent])
            && filter.status.map_or(true, |status| self.status == status)
            && filter.impact.map_or(true, |impact| self.impact == impact)
            && filter.r#type.as_deref().map_or(true, |kind| self.r#type == kind)
    }

    fn updated_event(records: Vec<Self>) -> ChangeEvent {
        ChangeEvent::ObjectsUpdated(records)
    }
}

impl Record for ChangeRequest {
    type Filter = RequestFilter;

    const RESOURCE: Resource = Resource::Requests;

    fn id(&self) -> &str {
        &self.id
    }

    fn matches(&self, filter: &RequestFilter) -> bool {
        text_matches(&filter.query, [&self.title, &self.description, &self.requester])
            && filter.status.map_or(true, |status| self.status == status)
            && filter.priority.map_or(true, |priority| self.priority == priority)
            && filter.r#type.as_deref().map_or(true, |kind| self.r#type == kind)
    }

    fn updated_event(records: Vec<Self>) -> ChangeEvent {
        ChangeEvent::RequestsUpdated(records)
    }
}

/// Case-insensitive substring match over any of the given fields. A blank query matches.
fn text_matches<const N: usize>(query: &str, fields: [&String; N]) -> bool {
    let needle = query.trim().to_lowercase();
    if needle.is_empty() {
        return true;
    }
    fields.iter().any(|field| field.to_lowercase().contains(&needle))
}

pub fn filter_records<T: Record>(records: &[T], filter: &T::Filter) -> Vec<T> {
    records.iter().filter(|record| record.matches(filter)).cloned().collect()
}

#[cfg(test)]
mod tests {
    use super::{filter_records, Record};
    use crate::models::{Impact, ObjectFilter, Priority, SapObject, Task, TaskFilter, TaskStatus};

    fn task(id: &str, title: &str, status: TaskStatus, priority: Priority) -> Task {
        Task {
            id: id.to_string(),
            title: title.to_string(),
            status,
            priority,
            ..Task::default()
        }
    }

    #[test]
    fn blank_query_matches_everything_in_order() {
        let tasks = vec![
            task("TSK001", "Analyze custom code", TaskStatus::Planned, Priority::High),
            task("TSK002", "Convert BAdIs", TaskStatus::Done, Priority::Low),
        ];
        let filtered = filter_records(&tasks, &TaskFilter { query: "   ".to_string(), ..TaskFilter::default() });
        assert_eq!(filtered, tasks);
    }

    #[test]
    fn query_is_case_insensitive_and_intersects_filters() {
        let tasks = vec![
            task("TSK001", "Analyze custom code", TaskStatus::Planned, Priority::High),
            task("TSK002", "Analyze IDocs", TaskStatus::Done, Priority::High),
            task("TSK003", "Convert BAdIs", TaskStatus::Planned, Priority::High),
        ];
        let filter = TaskFilter {
            query: "ANALYZE".to_string(),
            status: Some(TaskStatus::Planned),
            ..TaskFilter::default()
        };
        let ids: Vec<_> = filter_records(&tasks, &filter).into_iter().map(|task| task.id).collect();
        assert_eq!(ids, vec!["TSK001"]);
    }

    #[test]
    fn object_query_covers_id_and_s4_equivalent() {
        let object = SapObject {
            id: "ZEXIT01".to_string(),
            name: "Sales exit".to_string(),
            s4_equivalent: "BAdI SD_SALES_DOCUMENT".to_string(),
            impact: Impact::Critical,
            ..SapObject::default()
        };
        assert!(object.matches(&ObjectFilter { query: "zexit".to_string(), ..ObjectFilter::default() }));
        assert!(object.matches(&ObjectFilter { query: "badi".to_string(), ..ObjectFilter::default() }));
        assert!(!object.matches(&ObjectFilter {
            impact: Some(Impact::Low),
            ..ObjectFilter::default()
        }));
    }
}
