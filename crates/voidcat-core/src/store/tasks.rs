//! Persistent hierarchical task store.
//!
//! Write-through JSON document (`tasks.json`) with atomic rename and one
//! async mutex serializing writers. Projects live in the same document as
//! a sibling array. Operations are idempotent by id; every mutation that
//! touches `parent_id` re-verifies that the parent graph stays a forest.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::info;
use uuid::Uuid;

use crate::error::{ConflictKind, CoreError, Result};

use super::persist;
use super::types::{Project, Task, TaskDelta, TaskFilter, TaskStats, TaskStatus};

const FILE_NAME: &str = "tasks.json";
const FILE_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct TaskFile {
    version: u32,
    items: Vec<Task>,
    #[serde(default)]
    projects: Vec<Project>,
}

impl Default for TaskFile {
    fn default() -> Self {
        Self { version: FILE_VERSION, items: Vec::new(), projects: Vec::new() }
    }
}

/// Task and project store (C7, task half).
pub struct TaskStore {
    path: PathBuf,
    state: Mutex<TaskFile>,
}

impl TaskStore {
    /// Open (or initialize) the store under `data_dir`.
    pub async fn open(data_dir: &Path) -> Result<Self> {
        tokio::fs::create_dir_all(data_dir).await?;
        let path = data_dir.join(FILE_NAME);
        let state: TaskFile = persist::read_or_default(&path).await?;
        info!(tasks = state.items.len(), projects = state.projects.len(), "task store loaded");
        Ok(Self { path, state: Mutex::new(state) })
    }

    /// Create a task. Assigns a uuid when the id is empty; re-creating an
    /// existing id returns the stored task unchanged. Rejects unknown or
    /// cyclic parents.
    pub async fn create(&self, mut task: Task) -> Result<Task> {
        let mut state = self.state.lock().await;
        if task.id.is_empty() {
            task.id = Uuid::new_v4().to_string();
        }
        if let Some(existing) = state.items.iter().find(|t| t.id == task.id) {
            return Ok(existing.clone());
        }
        task.priority = task.priority.clamp(1, 10);
        task.complexity = task.complexity.clamp(1, 10);
        if let Some(parent) = &task.parent_id {
            ensure_parent_valid(&state.items, &task.id, parent)?;
        }

        state.items.push(task.clone());
        persist::write_atomic(&self.path, &*state).await?;
        Ok(task)
    }

    pub async fn get(&self, id: &str) -> Result<Task> {
        let state = self.state.lock().await;
        state
            .items
            .iter()
            .find(|t| t.id == id)
            .cloned()
            .ok_or_else(|| CoreError::NotFound(format!("task {id}")))
    }

    /// Partial update. Status transitions are unrestricted except
    /// `completed -> pending`, which requires `force`.
    pub async fn update(&self, id: &str, delta: TaskDelta) -> Result<Task> {
        let mut state = self.state.lock().await;
        let task = state
            .items
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or_else(|| CoreError::NotFound(format!("task {id}")))?;

        if let Some(status) = delta.status {
            if task.status == TaskStatus::Completed
                && status == TaskStatus::Pending
                && !delta.force
            {
                return Err(CoreError::Conflict {
                    kind: ConflictKind::StatusTransition,
                    message: "reopening a completed task requires force=true".to_string(),
                });
            }
            task.status = status;
        }
        if let Some(name) = delta.name {
            task.name = name;
        }
        if let Some(description) = delta.description {
            task.description = description;
        }
        if let Some(priority) = delta.priority {
            task.priority = priority.clamp(1, 10);
        }
        if let Some(complexity) = delta.complexity {
            task.complexity = complexity.clamp(1, 10);
        }
        if let Some(estimated) = delta.estimated_hours {
            task.estimated_hours = estimated;
        }
        if let Some(actual) = delta.actual_hours {
            task.actual_hours = actual;
        }
        if let Some(tags) = delta.tags {
            task.tags = tags;
        }
        if let Some(project) = delta.project_id {
            task.project_id = project;
        }
        task.updated_at = chrono::Utc::now();

        let updated = task.clone();
        persist::write_atomic(&self.path, &*state).await?;
        Ok(updated)
    }

    /// Re-parent a task. Rejects cycles; sibling order is `created_at`
    /// order, so moving never reshuffles siblings.
    pub async fn move_task(&self, id: &str, new_parent: Option<String>) -> Result<Task> {
        let mut state = self.state.lock().await;
        if !state.items.iter().any(|t| t.id == id) {
            return Err(CoreError::NotFound(format!("task {id}")));
        }
        if let Some(parent) = &new_parent {
            ensure_parent_valid(&state.items, id, parent)?;
        }
        let task = state
            .items
            .iter_mut()
            .find(|t| t.id == id)
            .expect("presence checked above");
        task.parent_id = new_parent;
        task.updated_at = chrono::Utc::now();

        let moved = task.clone();
        persist::write_atomic(&self.path, &*state).await?;
        Ok(moved)
    }

    /// Delete a task. Without `cascade`, a task with children is a
    /// conflict; with it, the whole subtree goes. Deleting a missing id is
    /// `NotFound` with no side effect. Returns the deleted ids.
    pub async fn delete(&self, id: &str, cascade: bool) -> Result<Vec<String>> {
        let mut state = self.state.lock().await;
        if !state.items.iter().any(|t| t.id == id) {
            return Err(CoreError::NotFound(format!("task {id}")));
        }

        let children: Vec<String> = state
            .items
            .iter()
            .filter(|t| t.parent_id.as_deref() == Some(id))
            .map(|t| t.id.clone())
            .collect();
        if !children.is_empty() && !cascade {
            return Err(CoreError::Conflict {
                kind: ConflictKind::HasChildren,
                message: format!("task {id} has {} children; pass cascade=true", children.len()),
            });
        }

        let mut doomed = vec![id.to_string()];
        let mut frontier = children;
        while let Some(next) = frontier.pop() {
            frontier.extend(
                state
                    .items
                    .iter()
                    .filter(|t| t.parent_id.as_deref() == Some(next.as_str()))
                    .map(|t| t.id.clone()),
            );
            doomed.push(next);
        }
        state.items.retain(|t| !doomed.contains(&t.id));

        persist::write_atomic(&self.path, &*state).await?;
        Ok(doomed)
    }

    /// Filtered listing in stable order: priority desc, then created_at
    /// asc.
    pub async fn list(&self, filter: &TaskFilter) -> Result<Vec<Task>> {
        let state = self.state.lock().await;
        let mut tasks: Vec<Task> = state
            .items
            .iter()
            .filter(|t| matches_filter(t, filter))
            .cloned()
            .collect();
        tasks.sort_by(|a, b| {
            b.priority
                .cmp(&a.priority)
                .then_with(|| a.created_at.cmp(&b.created_at))
                .then_with(|| a.id.cmp(&b.id))
        });
        Ok(tasks)
    }

    pub async fn stats(&self) -> Result<TaskStats> {
        let state = self.state.lock().await;
        let mut stats = TaskStats { total: state.items.len(), ..Default::default() };
        let mut hours = Vec::new();
        for task in &state.items {
            match task.status {
                TaskStatus::Pending => stats.pending += 1,
                TaskStatus::InProgress => stats.in_progress += 1,
                TaskStatus::Completed => {
                    stats.completed += 1;
                    if let Some(actual) = task.actual_hours {
                        hours.push(actual);
                    }
                }
                TaskStatus::Blocked => stats.blocked += 1,
            }
        }
        if stats.total > 0 {
            stats.completion_rate = stats.completed as f64 / stats.total as f64;
        }
        if !hours.is_empty() {
            stats.avg_completion_hours =
                Some(hours.iter().sum::<f64>() / hours.len() as f64);
        }
        Ok(stats)
    }

    // ------------------------------------------------------------------
    // Projects
    // ------------------------------------------------------------------

    pub async fn create_project(&self, name: &str, description: &str) -> Result<Project> {
        if name.trim().is_empty() {
            return Err(CoreError::InvalidArgument("project name must not be empty".into()));
        }
        let mut state = self.state.lock().await;
        let project = Project::new(name, description);
        state.projects.push(project.clone());
        persist::write_atomic(&self.path, &*state).await?;
        Ok(project)
    }

    pub async fn list_projects(&self) -> Result<Vec<Project>> {
        let state = self.state.lock().await;
        let mut projects = state.projects.clone();
        projects.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(projects)
    }

    pub async fn get_project(&self, id: &str) -> Result<Project> {
        let state = self.state.lock().await;
        state
            .projects
            .iter()
            .find(|p| p.id == id)
            .cloned()
            .ok_or_else(|| CoreError::NotFound(format!("project {id}")))
    }

    /// Delete a project, detaching its tasks.
    pub async fn delete_project(&self, id: &str) -> Result<()> {
        let mut state = self.state.lock().await;
        let before = state.projects.len();
        state.projects.retain(|p| p.id != id);
        if state.projects.len() == before {
            return Err(CoreError::NotFound(format!("project {id}")));
        }
        for task in state.items.iter_mut() {
            if task.project_id.as_deref() == Some(id) {
                task.project_id = None;
            }
        }
        persist::write_atomic(&self.path, &*state).await?;
        Ok(())
    }
}

/// Reject unknown parents and any assignment whose ancestor chain would
/// contain the task itself.
fn ensure_parent_valid(items: &[Task], id: &str, parent: &str) -> Result<()> {
    if parent == id {
        return Err(CoreError::cycle(id));
    }
    if !items.iter().any(|t| t.id == parent) {
        return Err(CoreError::NotFound(format!("parent task {parent}")));
    }
    let mut cursor = Some(parent.to_string());
    while let Some(current) = cursor {
        if current == id {
            return Err(CoreError::cycle(id));
        }
        cursor = items
            .iter()
            .find(|t| t.id == current)
            .and_then(|t| t.parent_id.clone());
    }
    Ok(())
}

fn matches_filter(task: &Task, filter: &TaskFilter) -> bool {
    if let Some(status) = filter.status {
        if task.status != status {
            return false;
        }
    }
    if let Some(min) = filter.min_priority {
        if task.priority < min {
            return false;
        }
    }
    if let Some(max) = filter.max_priority {
        if task.priority > max {
            return false;
        }
    }
    if let Some(project) = &filter.project_id {
        if task.project_id.as_deref() != Some(project.as_str()) {
            return false;
        }
    }
    if let Some(text) = &filter.text {
        let needle = text.to_lowercase();
        if !task.name.to_lowercase().contains(&needle)
            && !task.description.to_lowercase().contains(&needle)
        {
            return false;
        }
    }
    if let Some(tags) = &filter.tags {
        if !tags.iter().all(|tag| task.tags.contains(tag)) {
            return false;
        }
    }
    true
}

// ============================================================================
// TESTS
// ============================================================================
