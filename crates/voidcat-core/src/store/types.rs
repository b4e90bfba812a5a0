//! Task, project, and memory entity types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Task lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TaskStatus {
    #[default]
    Pending,
    InProgress,
    Completed,
    Blocked,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::InProgress => "in-progress",
            TaskStatus::Completed => "completed",
            TaskStatus::Blocked => "blocked",
        }
    }
}

/// Hierarchical work item. The parent graph is a forest; cycle checks run
/// on every mutation that touches `parent_id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub status: TaskStatus,
    /// 1 (lowest) to 10 (highest).
    pub priority: u8,
    /// 1 (trivial) to 10 (hardest).
    pub complexity: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_hours: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actual_hours: Option<f64>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Task {
    /// A fresh pending task with defaulted scores.
    pub fn new(name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
            description: String::new(),
            status: TaskStatus::Pending,
            priority: 5,
            complexity: 5,
            estimated_hours: None,
            actual_hours: None,
            tags: Vec::new(),
            parent_id: None,
            project_id: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Partial task update. Double-Option fields distinguish "leave alone"
/// (absent) from "clear" (explicit null).
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskDelta {
    pub name: Option<String>,
    pub description: Option<String>,
    pub status: Option<TaskStatus>,
    pub priority: Option<u8>,
    pub complexity: Option<u8>,
    #[serde(default, with = "double_option")]
    pub estimated_hours: Option<Option<f64>>,
    #[serde(default, with = "double_option")]
    pub actual_hours: Option<Option<f64>>,
    pub tags: Option<Vec<String>>,
    #[serde(default, with = "double_option")]
    pub project_id: Option<Option<String>>,
    /// `completed -> pending` requires this.
    #[serde(default)]
    pub force: bool,
}

mod double_option {
    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, T, D>(de: D) -> Result<Option<Option<T>>, D::Error>
    where
        T: Deserialize<'de>,
        D: Deserializer<'de>,
    {
        Option::<T>::deserialize(de).map(Some)
    }
}

/// Filters for `list`. All present filters must match.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskFilter {
    pub status: Option<TaskStatus>,
    pub min_priority: Option<u8>,
    pub max_priority: Option<u8>,
    pub project_id: Option<String>,
    /// Case-insensitive substring over name and description.
    pub text: Option<String>,
    /// Every listed tag must be present.
    pub tags: Option<Vec<String>>,
}

/// Aggregate task statistics.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskStats {
    pub total: usize,
    pub pending: usize,
    pub in_progress: usize,
    pub completed: usize,
    pub blocked: usize,
    /// completed / total, 0 when empty.
    pub completion_rate: f64,
    /// Mean actual hours over completed tasks that recorded them.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avg_completion_hours: Option<f64>,
}

/// Grouping of tasks.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Project {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
            description: description.into(),
            created_at: now,
            updated_at: now,
        }
    }
}

/// Categorized note.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Memory {
    pub id: String,
    pub category: String,
    pub title: String,
    pub content: String,
    /// 1 (trivia) to 10 (critical).
    pub importance: u8,
    #[serde(default)]
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub last_accessed: DateTime<Utc>,
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_status_wire_format_is_kebab_case() {
        let json = serde_json::to_string(&TaskStatus::InProgress).unwrap();
        assert_eq!(json, "\"in-progress\"");
        let parsed: TaskStatus = serde_json::from_str("\"blocked\"").unwrap();
        assert_eq!(parsed, TaskStatus::Blocked);
    }

    #[test]
    fn test_task_round_trips_through_json() {
        let mut task = Task::new("write tests");
        task.tags = vec!["testing".into()];
        task.parent_id = Some("p1".into());
        let json = serde_json::to_string(&task).unwrap();
        let parsed: Task = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.name, "write tests");
        assert_eq!(parsed.parent_id.as_deref(), Some("p1"));
    }

    #[test]
    fn test_delta_distinguishes_absent_from_null() {
        let delta: TaskDelta =
            serde_json::from_str(r#"{ "projectId": null, "priority": 9 }"#).unwrap();
        assert_eq!(delta.project_id, Some(None)); // explicit clear
        assert_eq!(delta.estimated_hours, None); // untouched
        assert_eq!(delta.priority, Some(9));
    }
}
