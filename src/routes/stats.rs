use axum::{
    extract::{Query, State},
    http::{header, HeaderMap, HeaderValue},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::analytics::BookViews;
use crate::error::AppError;
use crate::AppState;

const PER_PAGE: i64 = 10;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/stats/logs", get(visit_log))
        .route("/stats/logs/export", get(visit_log_export))
        .route("/stats/views", get(view_counts))
        .route("/stats/views/export", get(view_counts_export))
}

#[derive(Deserialize)]
pub struct PageQuery {
    page: Option<i64>,
}

#[derive(Serialize, FromRow)]
struct VisitLogRow {
    user_id: Option<String>,
    book_title: String,
    timestamp: String,
}

#[derive(Serialize)]
struct VisitLogPage {
    items: Vec<VisitLogRow>,
    page: i64,
    per_page: i64,
    total: i64,
}

async fn visit_log(
    State(state): State<AppState>,
    Query(query): Query<PageQuery>,
) -> Result<impl IntoResponse, AppError> {
    let page = query.page.unwrap_or(1).max(1);

    let (total,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM visits")
        .fetch_one(&state.db)
        .await?;

    let items: Vec<VisitLogRow> = sqlx::query_as(
        r#"
        SELECT v.user_id, b.title AS book_title, v.timestamp
        FROM visits v
        JOIN books b ON b.id = v.book_id
        ORDER BY v.timestamp DESC, v.rowid DESC
        LIMIT ? OFFSET ?
        "#,
    )
    .bind(PER_PAGE)
    .bind((page - 1) * PER_PAGE)
    .fetch_all(&state.db)
    .await?;

    Ok(Json(VisitLogPage {
        items,
        page,
        per_page: PER_PAGE,
        total,
    }))
}

async fn visit_log_export(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let rows: Vec<VisitLogRow> = sqlx::query_as(
        r#"
        SELECT v.user_id, b.title AS book_title, v.timestamp
        FROM visits v
        JOIN books b ON b.id = v.book_id
        ORDER BY v.timestamp DESC, v.rowid DESC
        "#,
    )
    .fetch_all(&state.db)
    .await?;

    let mut csv = String::from("#,User,Book,Date/Time\n");
    for (i, row) in rows.iter().enumerate() {
        let user = row.user_id.as_deref().unwrap_or("anonymous");
        csv.push_str(&format!(
            "{},{},{},{}\n",
            i + 1,
            csv_field(user),
            csv_field(&row.book_title),
            csv_field(&row.timestamp),
        ));
    }

    let filename = format!("visit_log_{}.csv", chrono::Utc::now().date_naive());
    Ok(csv_attachment(&filename, csv))
}

#[derive(Deserialize)]
pub struct ViewsQuery {
    date_from: Option<String>,
    date_to: Option<String>,
    page: Option<i64>,
}

#[derive(Serialize)]
struct ViewCountsPage {
    items: Vec<BookViews>,
    page: i64,
    per_page: i64,
    total: i64,
    date_from: Option<String>,
    date_to: Option<String>,
}

/// Per-book view counts restricted to authenticated visits, with optional
/// inclusive calendar-day bounds. Pass `page` for a paginated slice, `None`
/// for the full report.
async fn fetch_view_counts(
    db: &sqlx::SqlitePool,
    date_from: &Option<String>,
    date_to: &Option<String>,
    page: Option<i64>,
) -> Result<Vec<BookViews>, AppError> {
    let mut sql = String::from(
        r#"
        SELECT b.id, b.title, b.year, COUNT(v.id) AS views
        FROM books b
        JOIN visits v ON v.book_id = b.id
        WHERE v.user_id IS NOT NULL
        "#,
    );
    if date_from.is_some() {
        sql.push_str(" AND date(v.timestamp) >= ?");
    }
    if date_to.is_some() {
        sql.push_str(" AND date(v.timestamp) <= ?");
    }
    sql.push_str(" GROUP BY b.id ORDER BY views DESC, b.id ASC");
    if page.is_some() {
        sql.push_str(" LIMIT ? OFFSET ?");
    }

    let mut query = sqlx::query_as::<_, BookViews>(&sql);
    if let Some(from) = date_from {
        query = query.bind(from);
    }
    if let Some(to) = date_to {
        query = query.bind(to);
    }
    if let Some(page) = page {
        query = query.bind(PER_PAGE).bind((page - 1) * PER_PAGE);
    }

    Ok(query.fetch_all(db).await?)
}

async fn count_viewed_books(
    db: &sqlx::SqlitePool,
    date_from: &Option<String>,
    date_to: &Option<String>,
) -> Result<i64, AppError> {
    let mut sql =
        String::from("SELECT COUNT(DISTINCT book_id) FROM visits WHERE user_id IS NOT NULL");
    if date_from.is_some() {
        sql.push_str(" AND date(timestamp) >= ?");
    }
    if date_to.is_some() {
        sql.push_str(" AND date(timestamp) <= ?");
    }

    let mut query = sqlx::query_as::<_, (i64,)>(&sql);
    if let Some(from) = date_from {
        query = query.bind(from);
    }
    if let Some(to) = date_to {
        query = query.bind(to);
    }

    let (total,) = query.fetch_one(db).await?;
    Ok(total)
}

async fn view_counts(
    State(state): State<AppState>,
    Query(query): Query<ViewsQuery>,
) -> Result<impl IntoResponse, AppError> {
    let page = query.page.unwrap_or(1).max(1);

    let items =
        fetch_view_counts(&state.db, &query.date_from, &query.date_to, Some(page)).await?;
    let total = count_viewed_books(&state.db, &query.date_from, &query.date_to).await?;

    Ok(Json(ViewCountsPage {
        items,
        page,
        per_page: PER_PAGE,
        total,
        date_from: query.date_from,
        date_to: query.date_to,
    }))
}

async fn view_counts_export(
    State(state): State<AppState>,
    Query(query): Query<ViewsQuery>,
) -> Result<impl IntoResponse, AppError> {
    let rows = fetch_view_counts(&state.db, &query.date_from, &query.date_to, None).await?;

    let mut csv = String::from("#,Book,Views\n");
    for (i, row) in rows.iter().enumerate() {
        csv.push_str(&format!("{},{},{}\n", i + 1, csv_field(&row.title), row.views));
    }

    let filename = format!("view_counts_{}.csv", chrono::Utc::now().date_naive());
    Ok(csv_attachment(&filename, csv))
}

fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

fn csv_attachment(filename: &str, body: String) -> (HeaderMap, String) {
    let mut headers = HeaderMap::new();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("text/csv; charset=utf-8"),
    );
    headers.insert(
        header::CONTENT_DISPOSITION,
        HeaderValue::from_str(&format!("attachment; filename=\"{filename}\"")).unwrap(),
    );
    (headers, body)
}
