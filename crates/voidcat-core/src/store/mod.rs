//! Task/Memory substrate.
//!
//! Flat JSON persistence with atomic rename and per-entity-set write
//! locks. `tasks.json` holds tasks plus projects; `memories.json` holds
//! memories plus registered category markers.

mod memories;
mod persist;
mod tasks;
mod types;

pub use memories::{MemoryInput, MemoryStore, DEFAULT_CATEGORIES};
pub use tasks::TaskStore;
pub use types::{Memory, Project, Task, TaskDelta, TaskFilter, TaskStats, TaskStatus};
