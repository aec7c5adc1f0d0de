// src/handlers/attempt.rs

use axum::{
    Json,
    extract::{Extension, Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    error::{AppError, is_unique_violation},
    models::attempt::{
        Attempt, AttemptItem, AttemptSummary, CreateAttemptRequest, FinishAttemptRequest,
        STATUS_IN_PROGRESS, SubmitAnswerRequest,
    },
    scoring,
    utils::jwt::Claims,
};

/// Loads an attempt or reports 404.
async fn fetch_attempt(pool: &PgPool, id: Uuid) -> Result<Attempt, AppError> {
    sqlx::query_as::<_, Attempt>(
        r#"
        SELECT id, user_id, quiz_id, status, score, started_at, completed_at, created_at, updated_at
        FROM attempts
        WHERE id = $1
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or(AppError::NotFound("Attempt not found".to_string()))
}

/// Starts a new attempt on a published quiz.
///
/// Rejected when the quiz is unpublished or the caller already has an
/// in-progress attempt for it. The duplicate check is backed by a partial
/// unique index, so two racing creates cannot both succeed; the loser's
/// unique violation maps to the same invalid-state error.
pub async fn create_attempt(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<CreateAttemptRequest>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id()?;

    let quiz = sqlx::query_as::<_, (Uuid, bool)>(
        "SELECT id, is_published FROM quizzes WHERE id = $1",
    )
    .bind(req.quiz_id)
    .fetch_optional(&pool)
    .await?
    .ok_or(AppError::NotFound("Quiz not found".to_string()))?;

    if !quiz.1 {
        return Err(AppError::InvalidState("Quiz is not published".to_string()));
    }

    let existing = sqlx::query_scalar::<_, Uuid>(
        "SELECT id FROM attempts WHERE user_id = $1 AND quiz_id = $2 AND status = 'in_progress'",
    )
    .bind(user_id)
    .bind(req.quiz_id)
    .fetch_optional(&pool)
    .await?;

    if existing.is_some() {
        return Err(AppError::InvalidState(
            "An attempt for this quiz is already in progress".to_string(),
        ));
    }

    let attempt = sqlx::query_as::<_, Attempt>(
        r#"
        INSERT INTO attempts (user_id, quiz_id)
        VALUES ($1, $2)
        RETURNING id, user_id, quiz_id, status, score, started_at, completed_at, created_at, updated_at
        "#,
    )
    .bind(user_id)
    .bind(req.quiz_id)
    .fetch_one(&pool)
    .await
    .map_err(|e| {
        if is_unique_violation(&e) {
            AppError::InvalidState(
                "An attempt for this quiz is already in progress".to_string(),
            )
        } else {
            tracing::error!("Failed to create attempt: {:?}", e);
            AppError::from(e)
        }
    })?;

    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({ "attempt": attempt })),
    ))
}

/// Lists the caller's own attempts, newest first, with quiz display fields.
pub async fn list_attempts(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id()?;

    let attempts = sqlx::query_as::<_, AttemptSummary>(
        r#"
        SELECT
            a.id, a.user_id, a.quiz_id, a.status, a.score, a.started_at, a.completed_at,
            q.title AS quiz_title,
            q.subject AS quiz_subject,
            q.difficulty AS quiz_difficulty
        FROM attempts a
        JOIN quizzes q ON q.id = a.quiz_id
        WHERE a.user_id = $1
        ORDER BY a.started_at DESC
        "#,
    )
    .bind(user_id)
    .fetch_all(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to list attempts: {:?}", e);
        AppError::from(e)
    })?;

    Ok(Json(serde_json::json!({ "attempts": attempts })))
}

/// Full attempt detail, including every recorded item. Owner only.
pub async fn get_attempt(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id()?;
    let attempt = fetch_attempt(&pool, id).await?;

    if attempt.user_id != user_id {
        return Err(AppError::Forbidden("Access denied".to_string()));
    }

    let quiz = sqlx::query_as::<_, (Uuid, String, String, String)>(
        "SELECT id, title, subject, difficulty FROM quizzes WHERE id = $1",
    )
    .bind(attempt.quiz_id)
    .fetch_one(&pool)
    .await?;

    let items = sqlx::query_as::<_, AttemptItem>(
        r#"
        SELECT id, attempt_id, question_id, response, is_correct, awarded_score,
               answered_at, created_at, updated_at
        FROM attempt_items
        WHERE attempt_id = $1
        ORDER BY answered_at ASC
        "#,
    )
    .bind(id)
    .fetch_all(&pool)
    .await?;

    let mut detail = serde_json::to_value(&attempt)?;
    detail["quiz"] = serde_json::json!({
        "id": quiz.0,
        "title": quiz.1,
        "subject": quiz.2,
        "difficulty": quiz.3,
    });
    detail["items"] = serde_json::to_value(items)?;

    Ok(Json(serde_json::json!({ "attempt": detail })))
}

/// Row carried back from the questions table when grading a submission.
#[derive(sqlx::FromRow)]
struct GradingQuestion {
    quiz_id: Uuid,
    question_type: String,
    answer: Option<serde_json::Value>,
}

/// Records one evaluated response within an in-progress attempt.
///
/// Upserts by (attempt, question): resubmitting replaces the prior response
/// and its judgement, and refreshes the answered timestamp. Last write wins;
/// no history of prior responses is kept.
pub async fn submit_answer(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
    Json(req): Json<SubmitAnswerRequest>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id()?;
    let attempt = fetch_attempt(&pool, id).await?;

    if attempt.user_id != user_id || attempt.status != STATUS_IN_PROGRESS {
        return Err(AppError::Forbidden("Access denied".to_string()));
    }

    let question = sqlx::query_as::<_, GradingQuestion>(
        "SELECT quiz_id, type AS question_type, answer FROM questions WHERE id = $1",
    )
    .bind(req.question_id)
    .fetch_optional(&pool)
    .await?
    .filter(|q| q.quiz_id == attempt.quiz_id)
    .ok_or(AppError::Validation(
        "Invalid question for this attempt".to_string(),
    ))?;

    let is_correct = scoring::evaluate(
        &question.question_type,
        question.answer.as_ref(),
        &req.response,
    );
    let awarded_score: i32 = matches!(is_correct, Some(true)).into();

    let item = sqlx::query_as::<_, AttemptItem>(
        r#"
        INSERT INTO attempt_items (attempt_id, question_id, response, is_correct, awarded_score)
        VALUES ($1, $2, $3, $4, $5)
        ON CONFLICT (attempt_id, question_id) DO UPDATE SET
            response = EXCLUDED.response,
            is_correct = EXCLUDED.is_correct,
            awarded_score = EXCLUDED.awarded_score,
            answered_at = NOW(),
            updated_at = NOW()
        RETURNING id, attempt_id, question_id, response, is_correct, awarded_score,
                  answered_at, created_at, updated_at
        "#,
    )
    .bind(id)
    .bind(req.question_id)
    .bind(&req.response)
    .bind(is_correct)
    .bind(awarded_score)
    .fetch_one(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to record attempt item: {:?}", e);
        AppError::from(e)
    })?;

    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({ "item": item })),
    ))
}

#[derive(sqlx::FromRow)]
struct ScoreCounts {
    graded: i64,
    correct: i64,
}

/// Reduces an attempt's recorded items to a percentage score. Ungradable
/// items (no answer key) count toward neither side; an attempt with no
/// graded items scores 0.
async fn compute_score(pool: &PgPool, attempt_id: Uuid) -> Result<i32, AppError> {
    let counts = sqlx::query_as::<_, ScoreCounts>(
        r#"
        SELECT
            COUNT(*) FILTER (WHERE is_correct IS NOT NULL) AS graded,
            COUNT(*) FILTER (WHERE is_correct) AS correct
        FROM attempt_items
        WHERE attempt_id = $1
        "#,
    )
    .bind(attempt_id)
    .fetch_one(pool)
    .await?;

    Ok(scoring::percentage(counts.correct, counts.graded))
}

/// Completes an in-progress attempt, stamping the completion time and score
/// in one atomic update. The score comes from the request when supplied,
/// otherwise from the recorded items. Re-finishing is rejected and never
/// recomputes or overwrites the stored score.
pub async fn finish_attempt(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
    Json(req): Json<FinishAttemptRequest>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id()?;

    if let Some(score) = req.score {
        if !(0..=100).contains(&score) {
            return Err(AppError::Validation(
                "Score must be between 0 and 100".to_string(),
            ));
        }
    }

    let attempt = fetch_attempt(&pool, id).await?;
    if attempt.user_id != user_id {
        return Err(AppError::Forbidden("Access denied".to_string()));
    }

    let score = match req.score {
        Some(score) => score,
        None => compute_score(&pool, id).await?,
    };

    // The state guard lives in the WHERE clause: a completed or abandoned
    // attempt matches no row, and concurrent finishes cannot both win.
    let attempt = sqlx::query_as::<_, Attempt>(
        r#"
        UPDATE attempts
        SET status = 'completed', score = $2, completed_at = NOW(), updated_at = NOW()
        WHERE id = $1 AND status = 'in_progress'
        RETURNING id, user_id, quiz_id, status, score, started_at, completed_at, created_at, updated_at
        "#,
    )
    .bind(id)
    .bind(score)
    .fetch_optional(&pool)
    .await?
    .ok_or(AppError::InvalidState(
        "Attempt is not in progress".to_string(),
    ))?;

    Ok(Json(serde_json::json!({ "attempt": attempt })))
}

/// Abandons an in-progress attempt. No score is computed or stored, and the
/// attempt remains readable in its terminal state.
pub async fn abandon_attempt(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id()?;

    let attempt = fetch_attempt(&pool, id).await?;
    if attempt.user_id != user_id {
        return Err(AppError::Forbidden("Access denied".to_string()));
    }

    let result = sqlx::query(
        r#"
        UPDATE attempts
        SET status = 'abandoned', updated_at = NOW()
        WHERE id = $1 AND status = 'in_progress'
        "#,
    )
    .bind(id)
    .execute(&pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::InvalidState(
            "Attempt is not in progress".to_string(),
        ));
    }

    Ok(Json(serde_json::json!({ "ok": true })))
}
