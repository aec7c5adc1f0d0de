// src/handlers/quiz.rs

use axum::{
    Json,
    extract::{Extension, Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;
use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;
use validator::Validate;

use crate::{
    error::AppError,
    models::{
        attempt::Attempt,
        question::{PublicQuestion, Question},
        quiz::{CreateQuizRequest, Quiz, UpdateQuizRequest},
    },
    scoring,
    utils::jwt::Claims,
};

const QUIZ_COLUMNS: &str =
    "id, title, description, subject, difficulty, is_published, created_by, created_at, updated_at";

/// Loads a quiz or reports 404.
async fn fetch_quiz(pool: &PgPool, id: Uuid) -> Result<Quiz, AppError> {
    sqlx::query_as::<_, Quiz>(&format!(
        "SELECT {QUIZ_COLUMNS} FROM quizzes WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or(AppError::NotFound("Quiz not found".to_string()))
}

async fn fetch_quiz_questions(pool: &PgPool, quiz_id: Uuid) -> Result<Vec<Question>, AppError> {
    let questions = sqlx::query_as::<_, Question>(
        r#"
        SELECT id, quiz_id, type AS question_type, prompt, options, answer, order_index,
               created_at, updated_at
        FROM questions
        WHERE quiz_id = $1
        ORDER BY order_index ASC, created_at ASC
        "#,
    )
    .bind(quiz_id)
    .fetch_all(pool)
    .await?;

    Ok(questions)
}

/// Serializes questions for the caller: owners see answer keys, everyone
/// else gets the public shape.
fn questions_for(
    questions: Vec<Question>,
    is_owner: bool,
) -> Result<serde_json::Value, AppError> {
    if is_owner {
        Ok(serde_json::to_value(questions)?)
    } else {
        let public: Vec<PublicQuestion> = questions.into_iter().map(Into::into).collect();
        Ok(serde_json::to_value(public)?)
    }
}

/// Query parameters for listing quizzes.
#[derive(Debug, Deserialize)]
pub struct ListParams {
    pub subject: Option<String>,
    pub difficulty: Option<String>,
    pub published: Option<bool>,
}

/// Lists quizzes, optionally filtered by subject, difficulty and publish flag.
pub async fn list_quizzes(
    State(pool): State<PgPool>,
    Query(params): Query<ListParams>,
) -> Result<impl IntoResponse, AppError> {
    // Unified query handling optional filters
    let quizzes = sqlx::query_as::<_, Quiz>(&format!(
        r#"
        SELECT {QUIZ_COLUMNS}
        FROM quizzes
        WHERE ($1::TEXT IS NULL OR subject = $1)
          AND ($2::TEXT IS NULL OR difficulty = $2)
          AND ($3::BOOLEAN IS NULL OR is_published = $3)
        ORDER BY created_at DESC
        "#
    ))
    .bind(params.subject)
    .bind(params.difficulty)
    .bind(params.published)
    .fetch_all(&pool)
    .await?;

    Ok(Json(serde_json::json!({ "quizzes": quizzes })))
}

/// Creates a new quiz owned by the caller. New quizzes start as drafts.
pub async fn create_quiz(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<CreateQuizRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::Validation(validation_errors.to_string()));
    }

    let user_id = claims.user_id()?;

    let quiz = sqlx::query_as::<_, Quiz>(&format!(
        r#"
        INSERT INTO quizzes (title, description, subject, difficulty, created_by)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING {QUIZ_COLUMNS}
        "#
    ))
    .bind(payload.title)
    .bind(payload.description)
    .bind(payload.subject)
    .bind(payload.difficulty)
    .bind(user_id)
    .fetch_one(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to create quiz: {:?}", e);
        AppError::from(e)
    })?;

    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({ "quiz": quiz })),
    ))
}

/// Retrieves a quiz with its questions. Answer keys are only included for
/// the quiz's owner.
pub async fn get_quiz(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id()?;
    let quiz = fetch_quiz(&pool, id).await?;
    let questions = fetch_quiz_questions(&pool, id).await?;
    let is_owner = quiz.created_by == user_id;

    Ok(Json(serde_json::json!({
        "quiz": quiz,
        "questions": questions_for(questions, is_owner)?,
    })))
}

/// Updates a quiz's metadata or publish flag. Owner only.
pub async fn update_quiz(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateQuizRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::Validation(validation_errors.to_string()));
    }

    let user_id = claims.user_id()?;
    let quiz = fetch_quiz(&pool, id).await?;
    if quiz.created_by != user_id {
        return Err(AppError::Forbidden("Access denied".to_string()));
    }

    if payload.title.is_none()
        && payload.description.is_none()
        && payload.subject.is_none()
        && payload.difficulty.is_none()
        && payload.is_published.is_none()
    {
        return Ok(Json(serde_json::json!({ "quiz": quiz })));
    }

    let mut builder: QueryBuilder<Postgres> = QueryBuilder::new("UPDATE quizzes SET ");
    let mut separated = builder.separated(", ");

    if let Some(title) = payload.title {
        separated.push("title = ");
        separated.push_bind_unseparated(title);
    }

    if let Some(description) = payload.description {
        separated.push("description = ");
        separated.push_bind_unseparated(description);
    }

    if let Some(subject) = payload.subject {
        separated.push("subject = ");
        separated.push_bind_unseparated(subject);
    }

    if let Some(difficulty) = payload.difficulty {
        separated.push("difficulty = ");
        separated.push_bind_unseparated(difficulty);
    }

    if let Some(is_published) = payload.is_published {
        separated.push("is_published = ");
        separated.push_bind_unseparated(is_published);
    }

    separated.push("updated_at = NOW()");

    builder.push(" WHERE id = ");
    builder.push_bind(id);
    builder.push(format!(" RETURNING {QUIZ_COLUMNS}"));

    let quiz: Quiz = builder
        .build_query_as()
        .fetch_one(&pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to update quiz: {:?}", e);
            AppError::from(e)
        })?;

    Ok(Json(serde_json::json!({ "quiz": quiz })))
}

/// Deletes a quiz. Owner only. The store cascades the delete to the quiz's
/// questions and attempts (and through attempts to their items).
pub async fn delete_quiz(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id()?;
    let quiz = fetch_quiz(&pool, id).await?;
    if quiz.created_by != user_id {
        return Err(AppError::Forbidden("Access denied".to_string()));
    }

    sqlx::query("DELETE FROM quizzes WHERE id = $1")
        .bind(id)
        .execute(&pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to delete quiz: {:?}", e);
            AppError::from(e)
        })?;

    Ok(StatusCode::NO_CONTENT)
}

/// Lists a quiz's questions in order. Unpublished quizzes are visible to
/// their owner only; answer keys are stripped for everyone else.
pub async fn list_quiz_questions(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id()?;
    let quiz = fetch_quiz(&pool, id).await?;
    let is_owner = quiz.created_by == user_id;

    if !quiz.is_published && !is_owner {
        return Err(AppError::Forbidden("Access denied".to_string()));
    }

    let questions = fetch_quiz_questions(&pool, id).await?;

    Ok(Json(serde_json::json!({
        "questions": questions_for(questions, is_owner)?,
    })))
}

/// Lists a quiz's attempts. The owner sees every attempt plus an aggregate
/// stats block; other callers see only their own attempts on a published
/// quiz, with no stats.
pub async fn list_quiz_attempts(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id()?;
    let quiz = fetch_quiz(&pool, id).await?;
    let is_owner = quiz.created_by == user_id;

    if !is_owner && !quiz.is_published {
        return Err(AppError::Forbidden("Access denied".to_string()));
    }

    let attempts = if is_owner {
        sqlx::query_as::<_, Attempt>(
            r#"
            SELECT id, user_id, quiz_id, status, score, started_at, completed_at,
                   created_at, updated_at
            FROM attempts
            WHERE quiz_id = $1
            ORDER BY started_at DESC
            "#,
        )
        .bind(id)
        .fetch_all(&pool)
        .await?
    } else {
        sqlx::query_as::<_, Attempt>(
            r#"
            SELECT id, user_id, quiz_id, status, score, started_at, completed_at,
                   created_at, updated_at
            FROM attempts
            WHERE quiz_id = $1 AND user_id = $2
            ORDER BY started_at DESC
            "#,
        )
        .bind(id)
        .bind(user_id)
        .fetch_all(&pool)
        .await?
    };

    let stats = is_owner.then(|| scoring::quiz_attempt_stats(&attempts));

    Ok(Json(serde_json::json!({
        "attempts": attempts,
        "stats": stats,
    })))
}
