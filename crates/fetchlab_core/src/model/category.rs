//! Category snapshot.

use serde::{Deserialize, Serialize};

/// Primary key of a category row.
pub type CategoryId = i64;

/// Longest description the schema accepts, in characters.
pub const DESCRIPTION_MAX_CHARS: usize = 500;

/// Scalar snapshot of one category. Shared by many books, never cascaded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: CategoryId,
    /// Unique across the store.
    pub name: String,
    pub description: Option<String>,
}
