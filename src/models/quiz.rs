// src/models/quiz.rs

use serde::{Deserialize, Serialize};
use sqlx::prelude::FromRow;
use uuid::Uuid;
use validator::Validate;

pub const SUBJECTS: [&str; 3] = ["math", "physics", "general"];
pub const DIFFICULTIES: [&str; 3] = ["easy", "medium", "hard"];

/// Represents the 'quizzes' table in the database.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Quiz {
    pub id: Uuid,

    pub title: String,

    pub description: Option<String>,

    /// Subject classification: 'math', 'physics' or 'general'.
    pub subject: String,

    /// Difficulty classification: 'easy', 'medium' or 'hard'.
    pub difficulty: String,

    /// Draft quizzes are only visible to their owner and cannot be attempted.
    pub is_published: bool,

    /// Owner's user id, as issued by the identity provider.
    pub created_by: Uuid,

    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

/// DTO for creating a new quiz. New quizzes always start as drafts.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateQuizRequest {
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    #[validate(length(max = 2000))]
    pub description: Option<String>,
    #[validate(custom(function = validate_subject))]
    pub subject: String,
    #[validate(custom(function = validate_difficulty))]
    pub difficulty: String,
}

/// DTO for updating a quiz. Fields are optional.
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateQuizRequest {
    #[validate(length(min = 1, max = 200))]
    pub title: Option<String>,
    #[validate(length(max = 2000))]
    pub description: Option<String>,
    #[validate(custom(function = validate_subject))]
    pub subject: Option<String>,
    #[validate(custom(function = validate_difficulty))]
    pub difficulty: Option<String>,
    pub is_published: Option<bool>,
}

fn validate_subject(subject: &str) -> Result<(), validator::ValidationError> {
    if SUBJECTS.contains(&subject) {
        Ok(())
    } else {
        Err(validator::ValidationError::new("unknown_subject"))
    }
}

fn validate_difficulty(difficulty: &str) -> Result<(), validator::ValidationError> {
    if DIFFICULTIES.contains(&difficulty) {
        Ok(())
    } else {
        Err(validator::ValidationError::new("unknown_difficulty"))
    }
}
