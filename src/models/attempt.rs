// src/models/attempt.rs

use serde::{Deserialize, Serialize};
use sqlx::prelude::FromRow;
use uuid::Uuid;

/// Attempt status values. Stored as TEXT; 'completed' and 'abandoned' are
/// terminal - no transition leaves them.
pub const STATUS_IN_PROGRESS: &str = "in_progress";
pub const STATUS_COMPLETED: &str = "completed";
pub const STATUS_ABANDONED: &str = "abandoned";

/// Represents the 'attempts' table: one user's pass through one quiz.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Attempt {
    pub id: Uuid,

    /// Taker's user id, as issued by the identity provider.
    pub user_id: Uuid,

    pub quiz_id: Uuid,

    /// 'in_progress', 'completed' or 'abandoned'.
    pub status: String,

    /// Final percentage score (0-100). Only set on completed attempts.
    pub score: Option<i32>,

    pub started_at: chrono::DateTime<chrono::Utc>,
    pub completed_at: Option<chrono::DateTime<chrono::Utc>>,

    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

/// Represents the 'attempt_items' table: one recorded, evaluated response to
/// one question within an attempt. At most one row per (attempt, question);
/// resubmission overwrites.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct AttemptItem {
    pub id: Uuid,
    pub attempt_id: Uuid,
    pub question_id: Uuid,

    /// The raw submitted response; shape depends on the question's type tag.
    pub response: serde_json::Value,

    /// None when the question has no answer key and cannot be judged.
    pub is_correct: Option<bool>,

    pub awarded_score: i32,

    pub answered_at: chrono::DateTime<chrono::Utc>,

    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

/// Attempt row joined with its quiz's display fields, for listings.
#[derive(Debug, Serialize, FromRow)]
pub struct AttemptSummary {
    pub id: Uuid,
    pub user_id: Uuid,
    pub quiz_id: Uuid,
    pub status: String,
    pub score: Option<i32>,
    pub started_at: chrono::DateTime<chrono::Utc>,
    pub completed_at: Option<chrono::DateTime<chrono::Utc>>,
    pub quiz_title: String,
    pub quiz_subject: String,
    pub quiz_difficulty: String,
}

/// Owner-facing statistics over a quiz's attempts.
#[derive(Debug, PartialEq, Serialize)]
pub struct AttemptStats {
    pub total_attempts: i64,
    pub completed_attempts: i64,
    pub in_progress_attempts: i64,
    pub abandoned_attempts: i64,
    /// Rounded average score over completed attempts.
    pub average_score: i64,
    /// Completed attempts as a rounded percentage of all attempts.
    pub completion_rate: i64,
}

/// DTO for starting an attempt.
#[derive(Debug, Deserialize)]
pub struct CreateAttemptRequest {
    pub quiz_id: Uuid,
}

/// DTO for submitting one answer within an attempt.
#[derive(Debug, Deserialize)]
pub struct SubmitAnswerRequest {
    pub question_id: Uuid,
    pub response: serde_json::Value,
}

/// DTO for finishing an attempt. When `score` is absent the server computes
/// it from the recorded items.
#[derive(Debug, Deserialize)]
pub struct FinishAttemptRequest {
    pub score: Option<i32>,
}
