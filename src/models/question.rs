// src/models/question.rs

use serde::{Deserialize, Serialize};
use sqlx::prelude::FromRow;
use uuid::Uuid;
use validator::Validate;

use crate::scoring::QuestionType;

/// Represents the 'questions' table in the database.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Question {
    pub id: Uuid,

    pub quiz_id: Uuid,

    /// Question type tag, one of `QuestionType`.
    /// Mapped from the database column 'type' since `type` is a reserved
    /// keyword in Rust; queries alias it to `question_type`.
    #[serde(rename = "type")]
    pub question_type: String,

    /// The text of the question shown to the taker.
    pub prompt: String,

    /// Optional structured options payload (e.g. the list of choices).
    pub options: Option<serde_json::Value>,

    /// Answer key payload; shape depends on the type tag. A question with no
    /// answer key is open-ended and never auto-scored.
    pub answer: Option<serde_json::Value>,

    pub order_index: i32,

    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

/// DTO for sending a question to a taker (excludes the answer key).
#[derive(Debug, Serialize)]
pub struct PublicQuestion {
    pub id: Uuid,
    pub quiz_id: Uuid,
    #[serde(rename = "type")]
    pub question_type: String,
    pub prompt: String,
    pub options: Option<serde_json::Value>,
    pub order_index: i32,
}

impl From<Question> for PublicQuestion {
    fn from(q: Question) -> Self {
        Self {
            id: q.id,
            quiz_id: q.quiz_id,
            question_type: q.question_type,
            prompt: q.prompt,
            options: q.options,
            order_index: q.order_index,
        }
    }
}

/// DTO for creating a new question.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateQuestionRequest {
    pub quiz_id: Uuid,
    #[serde(rename = "type")]
    #[validate(custom(function = validate_question_type))]
    pub question_type: String,
    #[validate(length(min = 1, max = 2000))]
    pub prompt: String,
    pub options: Option<serde_json::Value>,
    pub answer: Option<serde_json::Value>,
    pub order_index: Option<i32>,
}

/// DTO for updating a question. Fields are optional.
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateQuestionRequest {
    #[serde(rename = "type")]
    #[validate(custom(function = validate_question_type))]
    pub question_type: Option<String>,
    #[validate(length(min = 1, max = 2000))]
    pub prompt: Option<String>,
    pub options: Option<serde_json::Value>,
    pub answer: Option<serde_json::Value>,
    pub order_index: Option<i32>,
}

fn validate_question_type(tag: &str) -> Result<(), validator::ValidationError> {
    if QuestionType::from_tag(tag).is_some() {
        Ok(())
    } else {
        Err(validator::ValidationError::new("unknown_question_type"))
    }
}
