use axum::{
    extract::{Query, State},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::analytics::{
    self, BookViews, POPULAR_LIMIT, POPULAR_WINDOW_DAYS, RECENT_RESULT_LIMIT, RECENT_SCAN_LIMIT,
};
use crate::error::AppError;
use crate::identity::Visitor;
use crate::models::Book;
use crate::AppState;

const PER_PAGE: i64 = 10;

#[derive(Deserialize)]
pub struct CatalogQuery {
    q: Option<String>,
    page: Option<i64>,
}

#[derive(Serialize)]
struct CatalogPage {
    books: Vec<Book>,
    page: i64,
    per_page: i64,
    total: i64,
    q: String,
    popular: Vec<BookViews>,
    recent: Vec<Book>,
}

pub fn router() -> Router<AppState> {
    Router::new().route("/", get(index))
}

async fn index(
    State(state): State<AppState>,
    visitor: Visitor,
    Query(query): Query<CatalogQuery>,
) -> Result<impl IntoResponse, AppError> {
    let page = query.page.unwrap_or(1).max(1);
    let q = query.q.unwrap_or_default().trim().to_string();
    let pattern = format!("%{q}%");

    let (total,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM books WHERE title LIKE ?")
        .bind(&pattern)
        .fetch_one(&state.db)
        .await?;

    let books: Vec<Book> = sqlx::query_as(
        "SELECT * FROM books WHERE title LIKE ? ORDER BY year DESC, id ASC LIMIT ? OFFSET ?",
    )
    .bind(&pattern)
    .bind(PER_PAGE)
    .bind((page - 1) * PER_PAGE)
    .fetch_all(&state.db)
    .await?;

    // Both aggregations degrade to empty sections rather than failing the page.
    let popular = analytics::top_books(&state.db, Duration::days(POPULAR_WINDOW_DAYS), POPULAR_LIMIT)
        .await
        .unwrap_or_default();

    let recent = analytics::recent_books(
        &state.db,
        &visitor.session_id,
        visitor.user_id.as_deref(),
        RECENT_SCAN_LIMIT,
        RECENT_RESULT_LIMIT,
    )
    .await
    .unwrap_or_default();

    Ok(Json(CatalogPage {
        books,
        page,
        per_page: PER_PAGE,
        total,
        q,
        popular,
        recent,
    }))
}
