use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// One recorded observation of a book by a session/user. Rows are append-only:
/// created by the visit recorder, never updated, and removed only when their
/// book is deleted.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Visit {
    pub id: String,
    pub book_id: i64,
    pub session_id: String,
    pub user_id: Option<String>,
    pub timestamp: String,
}

impl Visit {
    pub fn new(book_id: i64, session_id: String, user_id: Option<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            book_id,
            session_id,
            user_id,
            timestamp: Utc::now().to_rfc3339(),
        }
    }
}
