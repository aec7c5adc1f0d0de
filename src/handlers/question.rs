// src/handlers/question.rs

use axum::{
    Json,
    extract::{Extension, Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;
use validator::Validate;

use crate::{
    error::AppError,
    models::question::{CreateQuestionRequest, Question, UpdateQuestionRequest},
    scoring::{AnswerKey, QuestionType},
    utils::jwt::Claims,
};

const QUESTION_COLUMNS: &str = "id, quiz_id, type AS question_type, prompt, options, answer, \
                                order_index, created_at, updated_at";

/// Checks that an answer-key payload has the shape its type tag requires.
/// An absent or null key is legal: the question is open-ended and never
/// auto-scored.
fn validate_answer_shape(
    type_tag: &str,
    answer: Option<&serde_json::Value>,
) -> Result<(), AppError> {
    let Some(raw) = answer.filter(|v| !v.is_null()) else {
        return Ok(());
    };

    let question_type = QuestionType::from_tag(type_tag).ok_or_else(|| {
        AppError::Validation(format!("Unknown question type '{}'", type_tag))
    })?;

    if AnswerKey::decode(question_type, raw).is_none() {
        return Err(AppError::Validation(format!(
            "Answer key shape does not match question type '{}'",
            type_tag
        )));
    }

    Ok(())
}

/// Creates a question inside a quiz the caller owns.
///
/// `order_index` defaults to the end of the quiz when omitted.
pub async fn create_question(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<CreateQuestionRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::Validation(validation_errors.to_string()));
    }
    validate_answer_shape(&payload.question_type, payload.answer.as_ref())?;

    let user_id = claims.user_id()?;

    let created_by = sqlx::query_scalar::<_, Uuid>(
        "SELECT created_by FROM quizzes WHERE id = $1",
    )
    .bind(payload.quiz_id)
    .fetch_optional(&pool)
    .await?
    .ok_or(AppError::NotFound("Quiz not found".to_string()))?;

    if created_by != user_id {
        return Err(AppError::Forbidden("Access denied".to_string()));
    }

    let question = sqlx::query_as::<_, Question>(&format!(
        r#"
        INSERT INTO questions (quiz_id, type, prompt, options, answer, order_index)
        VALUES ($1, $2, $3, $4, $5,
                COALESCE($6, (SELECT COALESCE(MAX(order_index) + 1, 0)
                              FROM questions WHERE quiz_id = $1)))
        RETURNING {QUESTION_COLUMNS}
        "#
    ))
    .bind(payload.quiz_id)
    .bind(payload.question_type)
    .bind(payload.prompt)
    .bind(payload.options)
    .bind(payload.answer)
    .bind(payload.order_index)
    .fetch_one(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to create question: {:?}", e);
        AppError::from(e)
    })?;

    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({ "question": question })),
    ))
}

/// Question row joined with its quiz's owner, for ownership checks.
#[derive(sqlx::FromRow)]
struct OwnedQuestion {
    question_type: String,
    answer: Option<serde_json::Value>,
    created_by: Uuid,
}

async fn fetch_owned_question(pool: &PgPool, id: Uuid) -> Result<OwnedQuestion, AppError> {
    sqlx::query_as::<_, OwnedQuestion>(
        r#"
        SELECT q.type AS question_type, q.answer, z.created_by
        FROM questions q
        JOIN quizzes z ON z.id = q.quiz_id
        WHERE q.id = $1
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or(AppError::NotFound("Question not found".to_string()))
}

/// Updates a question. Owner of the owning quiz only. The answer key is
/// re-validated against whichever type tag the question ends up with.
pub async fn update_question(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateQuestionRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::Validation(validation_errors.to_string()));
    }

    let user_id = claims.user_id()?;
    let existing = fetch_owned_question(&pool, id).await?;
    if existing.created_by != user_id {
        return Err(AppError::Forbidden("Access denied".to_string()));
    }

    let final_type = payload
        .question_type
        .as_deref()
        .unwrap_or(&existing.question_type);
    let final_answer = payload.answer.as_ref().or(existing.answer.as_ref());
    validate_answer_shape(final_type, final_answer)?;

    if payload.question_type.is_none()
        && payload.prompt.is_none()
        && payload.options.is_none()
        && payload.answer.is_none()
        && payload.order_index.is_none()
    {
        let question = sqlx::query_as::<_, Question>(&format!(
            "SELECT {QUESTION_COLUMNS} FROM questions WHERE id = $1"
        ))
        .bind(id)
        .fetch_one(&pool)
        .await?;
        return Ok(Json(serde_json::json!({ "question": question })).into_response());
    }

    let mut builder: QueryBuilder<Postgres> = QueryBuilder::new("UPDATE questions SET ");
    let mut separated = builder.separated(", ");

    if let Some(question_type) = payload.question_type {
        separated.push("type = ");
        separated.push_bind_unseparated(question_type);
    }

    if let Some(prompt) = payload.prompt {
        separated.push("prompt = ");
        separated.push_bind_unseparated(prompt);
    }

    if let Some(options) = payload.options {
        separated.push("options = ");
        separated.push_bind_unseparated(options);
    }

    if let Some(answer) = payload.answer {
        separated.push("answer = ");
        separated.push_bind_unseparated(answer);
    }

    if let Some(order_index) = payload.order_index {
        separated.push("order_index = ");
        separated.push_bind_unseparated(order_index);
    }

    separated.push("updated_at = NOW()");

    builder.push(" WHERE id = ");
    builder.push_bind(id);
    builder.push(format!(" RETURNING {QUESTION_COLUMNS}"));

    let question: Question = builder
        .build_query_as()
        .fetch_one(&pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to update question: {:?}", e);
            AppError::from(e)
        })?;

    Ok(Json(serde_json::json!({ "question": question })).into_response())
}

/// Deletes a question. Owner of the owning quiz only.
pub async fn delete_question(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id()?;
    let existing = fetch_owned_question(&pool, id).await?;
    if existing.created_by != user_id {
        return Err(AppError::Forbidden("Access denied".to_string()));
    }

    sqlx::query("DELETE FROM questions WHERE id = $1")
        .bind(id)
        .execute(&pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to delete question: {:?}", e);
            AppError::from(e)
        })?;

    Ok(StatusCode::NO_CONTENT)
}
