//! Author snapshot.

use serde::{Deserialize, Serialize};

/// Primary key of an author row.
pub type AuthorId = i64;

/// Scalar snapshot of one author. Owned books are resolved separately.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Author {
    pub id: AuthorId,
    pub first_name: String,
    pub last_name: String,
    /// Unique across the store.
    pub email: String,
}
