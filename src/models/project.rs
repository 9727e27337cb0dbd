//! Project model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A project owned by an organization. Files belong to exactly one project,
/// and the project's organization is what scopes every file lookup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    pub id: i32,
    pub org_id: i32,
    pub name: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}
