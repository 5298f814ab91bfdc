use crate::models::{ChangeRequest, Impact, ObjectStatus, Priority, SapObject, Task, TaskStatus};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

pub const URGENT_WINDOW_DAYS: i64 = 3;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartData {
    pub labels: Vec<String>,
    pub values: Vec<usize>,
}

impl ChartData {
    fn count<T, K: Copy + PartialEq>(
        items: &[T],
        keys: &[K],
        label: impl Fn(K) -> &'static str,
        key_of: impl Fn(&T) -> K,
    ) -> Self {
        Self {
            labels: keys.iter().map(|key| label(*key).to_string()).collect(),
            values: keys
                .iter()
                .map(|key| items.iter().filter(|item| key_of(*item) == *key).count())
                .collect(),
        }
    }

    pub fn value_of(&self, label: &str) -> Option<usize> {
        self.labels
            .iter()
            .position(|candidate| candidate == label)
            .and_then(|index| self.values.get(index).copied())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardSummary {
    pub total_tasks: usize,
    pub active_tasks: usize,
    pub completed_tasks: usize,
    pub completion_percentage: u8,
    pub estimated_hours: f64,
    pub spent_hours: f64,
    pub total_objects: usize,
    pub converted_objects: usize,
    pub total_requests: usize,
    pub open_requests: usize,
    pub task_status: ChartData,
    pub task_priority: ChartData,
    pub object_status: ChartData,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DanglingReference {
    pub from: String,
    pub missing: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Insights {
    pub urgent_tasks: Vec<Task>,
    pub critical_objects: Vec<SapObject>,
    pub dangling_references: Vec<DanglingReference>,
}

pub fn summarize(tasks: &[Task], objects: &[SapObject], requests: &[ChangeRequest]) -> DashboardSummary {
    let completed_tasks = tasks.iter().filter(|task| task.status == TaskStatus::Done).count();
    let completion_percentage = if tasks.is_empty() {
        0
    } else {
        ((completed_tasks as f64 / tasks.len() as f64) * 100.0).round() as u8
    };

    DashboardSummary {
        total_tasks: tasks.len(),
        active_tasks: tasks.len() - completed_tasks,
        completed_tasks,
        completion_percentage,
        estimated_hours: tasks.iter().map(|task| task.estimated_hours).sum(),
        spent_hours: tasks.iter().map(|task| task.spent_hours).sum(),
        total_objects: objects.len(),
        converted_objects: objects
            .iter()
            .filter(|object| object.status == ObjectStatus::Converted)
            .count(),
        total_requests: requests.len(),
        open_requests: requests.iter().filter(|request| !request.status.is_closed()).count(),
        task_status: ChartData::count(tasks, &TaskStatus::ALL, TaskStatus::as_str, |task| task.status),
        task_priority: ChartData::count(tasks, &Priority::ALL, Priority::as_str, |task| task.priority),
        object_status: ChartData::count(objects, &ObjectStatus::ALL, ObjectStatus::as_str, |object| {
            object.status
        }),
    }
}

/// Urgent tasks are open tasks due within three days of `today`, overdue ones included,
/// soonest first.
pub fn insights(tasks: &[Task], objects: &[SapObject], today: NaiveDate) -> Insights {
    let mut urgent_tasks: Vec<Task> = tasks
        .iter()
        .filter(|task| task.status != TaskStatus::Done)
        .filter(|task| {
            task.deadline
                .is_some_and(|deadline| (deadline - today).num_days() <= URGENT_WINDOW_DAYS)
        })
        .cloned()
        .collect();
    urgent_tasks.sort_by_key(|task| task.deadline);

    let critical_objects = objects
        .iter()
        .filter(|object| object.impact == Impact::Critical && object.status != ObjectStatus::Converted)
        .cloned()
        .collect();

    Insights {
        urgent_tasks,
        critical_objects,
        dangling_references: dangling_references(tasks, objects),
    }
}

fn dangling_references(tasks: &[Task], objects: &[SapObject]) -> Vec<DanglingReference> {
    let task_ids: HashSet<&str> = tasks.iter().map(|task| task.id.as_str()).collect();
    let object_ids: HashSet<&str> = objects.iter().map(|object| object.id.as_str()).collect();

    let from_tasks = tasks.iter().flat_map(|task| {
        task.related_objects
            .iter()
            .filter(|id| !object_ids.contains(id.as_str()))
            .map(|id| DanglingReference {
                from: task.id.clone(),
                missing: id.clone(),
            })
    });
    let from_objects = objects.iter().flat_map(|object| {
        object
            .related_tasks
            .iter()
            .filter(|id| !task_ids.contains(id.as_str()))
            .map(|id| DanglingReference {
                from: object.id.clone(),
                missing: id.clone(),
            })
    });

    from_tasks.chain(from_objects).collect()
}
