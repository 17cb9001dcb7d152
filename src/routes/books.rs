use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{delete, get, post},
    Json, Router,
};
use serde::Deserialize;

use crate::analytics::{self, MAX_VISITS_PER_DAY};
use crate::error::AppError;
use crate::identity::Visitor;
use crate::models::Book;
use crate::AppState;

#[derive(Deserialize)]
pub struct BookForm {
    title: String,
    year: i64,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/books", post(create_book))
        .route("/books/{id}", get(book_detail))
        .route("/books/{id}", delete(delete_book))
}

async fn book_detail(
    State(state): State<AppState>,
    visitor: Visitor,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let book: Option<Book> = sqlx::query_as("SELECT * FROM books WHERE id = ?")
        .bind(id)
        .fetch_optional(&state.db)
        .await?;

    let Some(book) = book else {
        return Err(AppError::NotFound);
    };

    // Tracking is best-effort and must never block the response.
    if let Err(e) = analytics::record_visit(
        &state.db,
        book.id,
        &visitor.session_id,
        visitor.user_id.as_deref(),
        MAX_VISITS_PER_DAY,
    )
    .await
    {
        tracing::warn!("Failed to record visit for book {id}: {e:?}");
    }

    Ok(Json(book))
}

async fn create_book(
    State(state): State<AppState>,
    Json(form): Json<BookForm>,
) -> Result<impl IntoResponse, AppError> {
    if form.title.trim().is_empty() {
        return Ok((StatusCode::UNPROCESSABLE_ENTITY, "Title is required").into_response());
    }

    let result = sqlx::query("INSERT INTO books (title, year) VALUES (?, ?)")
        .bind(&form.title)
        .bind(form.year)
        .execute(&state.db)
        .await?;

    let book: Book = sqlx::query_as("SELECT * FROM books WHERE id = ?")
        .bind(result.last_insert_rowid())
        .fetch_one(&state.db)
        .await?;

    Ok((StatusCode::CREATED, Json(book)).into_response())
}

async fn delete_book(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let result = sqlx::query("DELETE FROM books WHERE id = ?")
        .bind(id)
        .execute(&state.db)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound);
    }

    // Visit rows cascade with the book.
    Ok(StatusCode::NO_CONTENT)
}
