//! Persistent categorized memory store.
//!
//! Same persistence discipline as the task store: one JSON document
//! (`memories.json`), atomic rename, async mutex. Registered category
//! markers live in the document next to the items.

use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::info;
use uuid::Uuid;

use crate::error::{CoreError, Result};

use super::persist;
use super::types::Memory;

const FILE_NAME: &str = "memories.json";
const FILE_VERSION: u32 = 1;

/// Categories every store knows without registration.
pub const DEFAULT_CATEGORIES: &[&str] = &[
    "general",
    "user_preferences",
    "project_knowledge",
    "conversation_context",
    "code_patterns",
    "decisions",
    "troubleshooting",
];

#[derive(Debug, Serialize, Deserialize)]
struct MemoryFile {
    version: u32,
    items: Vec<Memory>,
    /// Dynamically registered category markers.
    #[serde(default)]
    categories: Vec<String>,
}

impl Default for MemoryFile {
    fn default() -> Self {
        Self { version: FILE_VERSION, items: Vec::new(), categories: Vec::new() }
    }
}

/// Input for creating a memory.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoryInput {
    #[serde(default)]
    pub category: Option<String>,
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub importance: Option<u8>,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// Memory store (C7, memory half).
pub struct MemoryStore {
    path: PathBuf,
    state: Mutex<MemoryFile>,
}

impl MemoryStore {
    pub async fn open(data_dir: &Path) -> Result<Self> {
        tokio::fs::create_dir_all(data_dir).await?;
        let path = data_dir.join(FILE_NAME);
        let state: MemoryFile = persist::read_or_default(&path).await?;
        info!(memories = state.items.len(), "memory store loaded");
        Ok(Self { path, state: Mutex::new(state) })
    }

    /// Store a memory. The category defaults to `general` and must be a
    /// known (default or registered) category.
    pub async fn create(&self, input: MemoryInput) -> Result<Memory> {
        if input.title.trim().is_empty() && input.content.trim().is_empty() {
            return Err(CoreError::InvalidArgument(
                "memory needs a title or content".to_string(),
            ));
        }
        let mut state = self.state.lock().await;
        let category = input.category.unwrap_or_else(|| "general".to_string());
        if !known_category(&state.categories, &category) {
            return Err(CoreError::InvalidArgument(format!(
                "unknown category: {category} (register it first)"
            )));
        }

        let now = Utc::now();
        let memory = Memory {
            id: Uuid::new_v4().to_string(),
            category,
            title: input.title,
            content: input.content,
            importance: input.importance.unwrap_or(5).clamp(1, 10),
            tags: input.tags,
            created_at: now,
            last_accessed: now,
        };
        state.items.push(memory.clone());
        persist::write_atomic(&self.path, &*state).await?;
        Ok(memory)
    }

    pub async fn get(&self, id: &str) -> Result<Memory> {
        let mut state = self.state.lock().await;
        let memory = state
            .items
            .iter_mut()
            .find(|m| m.id == id)
            .ok_or_else(|| CoreError::NotFound(format!("memory {id}")))?;
        memory.last_accessed = Utc::now();
        let found = memory.clone();
        persist::write_atomic(&self.path, &*state).await?;
        Ok(found)
    }

    pub async fn delete(&self, id: &str) -> Result<()> {
        let mut state = self.state.lock().await;
        let before = state.items.len();
        state.items.retain(|m| m.id != id);
        if state.items.len() == before {
            return Err(CoreError::NotFound(format!("memory {id}")));
        }
        persist::write_atomic(&self.path, &*state).await?;
        Ok(())
    }

    /// Substring-plus-tag search, optionally restricted to a category.
    /// Hits update `last_accessed`. Ordering: importance desc, then
    /// created_at desc.
    pub async fn search(&self, query: &str, category: Option<&str>) -> Result<Vec<Memory>> {
        let needle = query.trim().to_lowercase();
        if needle.is_empty() {
            return Err(CoreError::InvalidArgument("query must not be empty".to_string()));
        }
        let mut state = self.state.lock().await;
        let now = Utc::now();
        let mut hits: Vec<Memory> = Vec::new();
        for memory in state.items.iter_mut() {
            if let Some(category) = category {
                if memory.category != category {
                    continue;
                }
            }
            let matched = memory.title.to_lowercase().contains(&needle)
                || memory.content.to_lowercase().contains(&needle)
                || memory.tags.iter().any(|t| t.to_lowercase() == needle);
            if matched {
                memory.last_accessed = now;
                hits.push(memory.clone());
            }
        }
        if !hits.is_empty() {
            persist::write_atomic(&self.path, &*state).await?;
        }
        hits.sort_by(|a, b| {
            b.importance
                .cmp(&a.importance)
                .then_with(|| b.created_at.cmp(&a.created_at))
                .then_with(|| a.id.cmp(&b.id))
        });
        Ok(hits)
    }

    /// Defaults unioned with dynamically registered markers, sorted.
    pub async fn list_categories(&self) -> Vec<String> {
        let state = self.state.lock().await;
        let mut categories: Vec<String> =
            DEFAULT_CATEGORIES.iter().map(|c| c.to_string()).collect();
        for registered in &state.categories {
            if !categories.contains(registered) {
                categories.push(registered.clone());
            }
        }
        categories.sort();
        categories
    }

    /// Register a category marker. Idempotent: re-registering leaves
    /// exactly one record.
    pub async fn register_category(&self, name: &str) -> Result<String> {
        let name = name.trim().to_lowercase().replace(' ', "_");
        if name.is_empty() {
            return Err(CoreError::InvalidArgument("category name must not be empty".into()));
        }
        let mut state = self.state.lock().await;
        if !known_category(&state.categories, &name) {
            state.categories.push(name.clone());
            persist::write_atomic(&self.path, &*state).await?;
        }
        Ok(name)
    }

    pub async fn count(&self) -> usize {
        self.state.lock().await.items.len()
    }

    /// Most recent memories, newest first.
    pub async fn recent(&self, limit: usize) -> Vec<Memory> {
        let state = self.state.lock().await;
        let mut items = state.items.clone();
        items.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.id.cmp(&b.id)));
        items.truncate(limit);
        items
    }
}

fn known_category(registered: &[String], name: &str) -> bool {
    DEFAULT_CATEGORIES.contains(&name) || registered.iter().any(|c| c == name)
}

// ============================================================================
// TESTS
// ============================================================================
