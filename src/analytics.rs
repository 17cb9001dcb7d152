//! Visit tracking and aggregation.
//!
//! Each function here is a pure function of the current database state and its
//! inputs; nothing is cached between calls. The `visits` table is written only
//! by [`record_visit`] and read by the two aggregation queries.

use chrono::{Duration, Utc};
use serde::Serialize;
use sqlx::{FromRow, SqlitePool};

use crate::error::AppError;
use crate::models::{Book, Visit};

/// Cap on recorded visits per (book, session[, user]) per calendar day.
pub const MAX_VISITS_PER_DAY: i64 = 10;

/// Trailing window for the popular-books ranking.
pub const POPULAR_WINDOW_DAYS: i64 = 90;
pub const POPULAR_LIMIT: i64 = 5;

/// How many raw visit rows to scan when rebuilding recent history, and how
/// many distinct books to return from them.
pub const RECENT_SCAN_LIMIT: i64 = 20;
pub const RECENT_RESULT_LIMIT: usize = 5;

/// Book with its visit count, for ranked listings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromRow)]
pub struct BookViews {
    pub id: i64,
    pub title: String,
    pub year: i64,
    pub views: i64,
}

/// Record one visit for `book_id` by the given identity, unless the identity
/// has already hit `max_per_day` for that book today.
///
/// The cap is scoped to (book, session) for anonymous visitors and to
/// (book, session, user) when a user id is present. It is a soft cap: the
/// count and the insert are separate statements, so concurrent requests from
/// the same identity can exceed it. That is acceptable; the cap exists to keep
/// reload spam out of the popularity ranking, not for exact accounting.
pub async fn record_visit(
    db: &SqlitePool,
    book_id: i64,
    session_id: &str,
    user_id: Option<&str>,
    max_per_day: i64,
) -> Result<(), AppError> {
    let book: Option<(i64,)> = sqlx::query_as("SELECT id FROM books WHERE id = ?")
        .bind(book_id)
        .fetch_optional(db)
        .await?;
    if book.is_none() {
        return Err(AppError::NotFound);
    }

    let today = Utc::now().date_naive().to_string();

    let (count,): (i64,) = match user_id {
        Some(uid) => {
            sqlx::query_as(
                r#"
                SELECT COUNT(*) FROM visits
                WHERE book_id = ? AND session_id = ? AND user_id = ? AND date(timestamp) = ?
                "#,
            )
            .bind(book_id)
            .bind(session_id)
            .bind(uid)
            .bind(&today)
            .fetch_one(db)
            .await?
        }
        None => {
            sqlx::query_as(
                r#"
                SELECT COUNT(*) FROM visits
                WHERE book_id = ? AND session_id = ? AND date(timestamp) = ?
                "#,
            )
            .bind(book_id)
            .bind(session_id)
            .bind(&today)
            .fetch_one(db)
            .await?
        }
    };

    if count >= max_per_day {
        return Ok(());
    }

    let visit = Visit::new(book_id, session_id.to_string(), user_id.map(str::to_string));
    sqlx::query(
        "INSERT INTO visits (id, book_id, session_id, user_id, timestamp) VALUES (?, ?, ?, ?, ?)",
    )
    .bind(&visit.id)
    .bind(visit.book_id)
    .bind(&visit.session_id)
    .bind(&visit.user_id)
    .bind(&visit.timestamp)
    .execute(db)
    .await?;

    Ok(())
}

/// Most-viewed books over the trailing `window`, count descending, at most
/// `limit` entries. Books without a qualifying visit are absent. Ties break on
/// book id ascending so the ordering is stable.
pub async fn top_books(
    db: &SqlitePool,
    window: Duration,
    limit: i64,
) -> Result<Vec<BookViews>, AppError> {
    let cutoff = (Utc::now() - window).to_rfc3339();

    let books = sqlx::query_as::<_, BookViews>(
        r#"
        SELECT b.id, b.title, b.year, COUNT(v.id) AS views
        FROM books b
        JOIN visits v ON v.book_id = b.id
        WHERE v.timestamp >= ?
        GROUP BY b.id
        ORDER BY views DESC, b.id ASC
        LIMIT ?
        "#,
    )
    .bind(&cutoff)
    .bind(limit)
    .fetch_all(db)
    .await?;

    Ok(books)
}

/// The identity's recently viewed books, most recent first, deduplicated by
/// book id.
///
/// Only the `scan_limit` most recent raw visit rows are considered, which
/// keeps the query cheap at the cost of dropping books the visitor has since
/// buried under newer visits. Up to `result_limit` distinct books are
/// returned; a book whose row has been deleted since the visit is skipped.
pub async fn recent_books(
    db: &SqlitePool,
    session_id: &str,
    user_id: Option<&str>,
    scan_limit: i64,
    result_limit: usize,
) -> Result<Vec<Book>, AppError> {
    let rows: Vec<(i64,)> = match user_id {
        Some(uid) => {
            sqlx::query_as(
                r#"
                SELECT book_id FROM visits
                WHERE session_id = ? AND user_id = ?
                ORDER BY timestamp DESC, rowid DESC
                LIMIT ?
                "#,
            )
            .bind(session_id)
            .bind(uid)
            .bind(scan_limit)
            .fetch_all(db)
            .await?
        }
        None => {
            sqlx::query_as(
                r#"
                SELECT book_id FROM visits
                WHERE session_id = ?
                ORDER BY timestamp DESC, rowid DESC
                LIMIT ?
                "#,
            )
            .bind(session_id)
            .bind(scan_limit)
            .fetch_all(db)
            .await?
        }
    };

    let mut seen = std::collections::HashSet::new();
    let mut books = Vec::new();

    for (book_id,) in rows {
        if books.len() >= result_limit {
            break;
        }
        if !seen.insert(book_id) {
            continue;
        }
        let book: Option<Book> = sqlx::query_as("SELECT * FROM books WHERE id = ?")
            .bind(book_id)
            .fetch_optional(db)
            .await?;
        if let Some(book) = book {
            books.push(book);
        }
    }

    Ok(books)
}
