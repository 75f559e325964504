use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::Format;

/// Per-item outcome within a pack assembly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemReport {
    pub memory_id: Uuid,
    pub included: bool,
}

/// Full report of a pack assembly, returned alongside the rendered text.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackReport {
    pub items: Vec<ItemReport>,
    pub total_bytes: usize,
    pub truncated: bool,
    pub format: Format,
}
