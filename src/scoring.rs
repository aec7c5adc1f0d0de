// src/scoring.rs
//
// Pure answer-evaluation and score-aggregation logic. No I/O: handlers load
// rows, call into here, and persist the result.

use std::collections::HashSet;

use serde::Deserialize;
use serde_json::Value;

use crate::models::attempt::{
    Attempt, AttemptStats, STATUS_ABANDONED, STATUS_COMPLETED, STATUS_IN_PROGRESS,
};

/// Default tolerance for numeric questions when the key does not specify one.
const DEFAULT_NUMERIC_TOLERANCE: f64 = 0.01;

/// Closed set of question types. The database stores the snake_case tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuestionType {
    SingleChoice,
    MultipleChoice,
    TrueFalse,
    Numeric,
    ShortAnswer,
}

impl QuestionType {
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "single_choice" => Some(Self::SingleChoice),
            "multiple_choice" => Some(Self::MultipleChoice),
            "true_false" => Some(Self::TrueFalse),
            "numeric" => Some(Self::Numeric),
            "short_answer" => Some(Self::ShortAnswer),
            _ => None,
        }
    }
}

/// Stored answer key, decoded per question type. One variant per type keeps
/// illegal key/type combinations unrepresentable past the decode step.
#[derive(Debug, Clone, PartialEq)]
pub enum AnswerKey {
    SingleChoice {
        correct: String,
    },
    MultipleChoice {
        correct: Vec<String>,
    },
    TrueFalse {
        correct: bool,
    },
    Numeric {
        value: f64,
        tolerance: f64,
    },
    ShortAnswer {
        correct: Vec<String>,
        case_sensitive: bool,
    },
}

#[derive(Deserialize)]
struct RawChoiceKey {
    correct: String,
}

#[derive(Deserialize)]
struct RawChoicesKey {
    correct: Vec<String>,
}

#[derive(Deserialize)]
struct RawBoolKey {
    correct: bool,
}

#[derive(Deserialize)]
struct RawNumericKey {
    value: f64,
    tolerance: Option<f64>,
}

#[derive(Deserialize)]
struct RawShortAnswerKey {
    correct: Vec<String>,
    #[serde(default)]
    case_sensitive: bool,
}

impl AnswerKey {
    /// Decodes a stored key payload against the question's type tag.
    /// Returns None when the payload does not have the shape the tag requires.
    pub fn decode(question_type: QuestionType, raw: &Value) -> Option<Self> {
        match question_type {
            QuestionType::SingleChoice => {
                let key: RawChoiceKey = serde_json::from_value(raw.clone()).ok()?;
                Some(Self::SingleChoice { correct: key.correct })
            }
            QuestionType::MultipleChoice => {
                let key: RawChoicesKey = serde_json::from_value(raw.clone()).ok()?;
                Some(Self::MultipleChoice { correct: key.correct })
            }
            QuestionType::TrueFalse => {
                let key: RawBoolKey = serde_json::from_value(raw.clone()).ok()?;
                Some(Self::TrueFalse { correct: key.correct })
            }
            QuestionType::Numeric => {
                let key: RawNumericKey = serde_json::from_value(raw.clone()).ok()?;
                Some(Self::Numeric {
                    value: key.value,
                    tolerance: key.tolerance.unwrap_or(DEFAULT_NUMERIC_TOLERANCE),
                })
            }
            QuestionType::ShortAnswer => {
                let key: RawShortAnswerKey = serde_json::from_value(raw.clone()).ok()?;
                Some(Self::ShortAnswer {
                    correct: key.correct,
                    case_sensitive: key.case_sensitive,
                })
            }
        }
    }
}

/// A submitted response, decoded per question type.
#[derive(Debug, Clone, PartialEq)]
enum SubmittedAnswer {
    Selection(String),
    Selections(Vec<String>),
    Flag(bool),
    Number(f64),
    Text(String),
}

#[derive(Deserialize)]
struct RawSelection {
    selected: String,
}

#[derive(Deserialize)]
struct RawSelections {
    selected: Vec<String>,
}

#[derive(Deserialize)]
struct RawValueField {
    value: Value,
}

impl SubmittedAnswer {
    fn decode(question_type: QuestionType, raw: &Value) -> Option<Self> {
        match question_type {
            QuestionType::SingleChoice => {
                let r: RawSelection = serde_json::from_value(raw.clone()).ok()?;
                Some(Self::Selection(r.selected))
            }
            QuestionType::MultipleChoice => {
                let r: RawSelections = serde_json::from_value(raw.clone()).ok()?;
                Some(Self::Selections(r.selected))
            }
            QuestionType::TrueFalse => {
                let r: RawValueField = serde_json::from_value(raw.clone()).ok()?;
                r.value.as_bool().map(Self::Flag)
            }
            QuestionType::Numeric => {
                // Numeric input arrives either as a JSON number or as the raw
                // text the taker typed; both are accepted, anything else is
                // an incorrect answer rather than an error.
                let r: RawValueField = serde_json::from_value(raw.clone()).ok()?;
                match r.value {
                    Value::Number(n) => n.as_f64().map(Self::Number),
                    Value::String(s) => s.trim().parse().ok().map(Self::Number),
                    _ => None,
                }
            }
            QuestionType::ShortAnswer => {
                let r: RawValueField = serde_json::from_value(raw.clone()).ok()?;
                match r.value {
                    Value::String(s) => Some(Self::Text(s)),
                    _ => None,
                }
            }
        }
    }
}

/// Judges a submitted response against a question's answer key.
///
/// Returns None when the question carries no answer key (ungradable: the
/// response is still recorded, but neither helps nor hurts the score).
/// Malformed input never aborts recording: an unknown type tag, a key whose
/// shape does not match the tag, or an undecodable response all evaluate to
/// Some(false).
pub fn evaluate(type_tag: &str, answer_key: Option<&Value>, response: &Value) -> Option<bool> {
    let raw_key = match answer_key {
        Some(key) if !key.is_null() => key,
        _ => return None,
    };

    let Some(question_type) = QuestionType::from_tag(type_tag) else {
        return Some(false);
    };
    let Some(key) = AnswerKey::decode(question_type, raw_key) else {
        return Some(false);
    };
    let Some(submitted) = SubmittedAnswer::decode(question_type, response) else {
        return Some(false);
    };

    let correct = match (key, submitted) {
        (AnswerKey::SingleChoice { correct }, SubmittedAnswer::Selection(selected)) => {
            correct == selected
        }
        (AnswerKey::MultipleChoice { correct }, SubmittedAnswer::Selections(selected)) => {
            // Set equality: order and duplicates are irrelevant.
            let correct: HashSet<&str> = correct.iter().map(String::as_str).collect();
            let selected: HashSet<&str> = selected.iter().map(String::as_str).collect();
            correct == selected
        }
        (AnswerKey::TrueFalse { correct }, SubmittedAnswer::Flag(value)) => correct == value,
        (AnswerKey::Numeric { value, tolerance }, SubmittedAnswer::Number(submitted)) => {
            (value - submitted).abs() <= tolerance
        }
        (
            AnswerKey::ShortAnswer {
                correct,
                case_sensitive,
            },
            SubmittedAnswer::Text(text),
        ) => {
            let text = text.trim();
            if case_sensitive {
                correct.iter().any(|accepted| accepted == text)
            } else {
                let text = text.to_lowercase();
                correct
                    .iter()
                    .any(|accepted| accepted.to_lowercase() == text)
            }
        }
        _ => false,
    };

    Some(correct)
}

/// Reduces graded/correct item counts to a rounded percentage score.
/// Zero graded items yields 0, not an error.
pub fn percentage(correct: i64, graded: i64) -> i32 {
    if graded <= 0 {
        return 0;
    }
    (100.0 * correct as f64 / graded as f64).round() as i32
}

/// Computes the owner-facing statistics block over a quiz's attempts.
pub fn quiz_attempt_stats(attempts: &[Attempt]) -> AttemptStats {
    let total = attempts.len() as i64;
    let completed: Vec<&Attempt> = attempts
        .iter()
        .filter(|a| a.status == STATUS_COMPLETED)
        .collect();
    let in_progress = attempts
        .iter()
        .filter(|a| a.status == STATUS_IN_PROGRESS)
        .count() as i64;
    let abandoned = attempts
        .iter()
        .filter(|a| a.status == STATUS_ABANDONED)
        .count() as i64;

    let average_score = if completed.is_empty() {
        0
    } else {
        let sum: i64 = completed.iter().map(|a| a.score.unwrap_or(0) as i64).sum();
        (sum as f64 / completed.len() as f64).round() as i64
    };

    let completion_rate = if total == 0 {
        0
    } else {
        (100.0 * completed.len() as f64 / total as f64).round() as i64
    };

    AttemptStats {
        total_attempts: total,
        completed_attempts: completed.len() as i64,
        in_progress_attempts: in_progress,
        abandoned_attempts: abandoned,
        average_score,
        completion_rate,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use uuid::Uuid;

    fn attempt(status: &str, score: Option<i32>) -> Attempt {
        let now = chrono::Utc::now();
        Attempt {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            quiz_id: Uuid::new_v4(),
            status: status.to_string(),
            score,
            started_at: now,
            completed_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn single_choice_matches_on_identifier_equality() {
        let key = json!({"correct": "b"});
        assert_eq!(
            evaluate("single_choice", Some(&key), &json!({"selected": "b"})),
            Some(true)
        );
        assert_eq!(
            evaluate("single_choice", Some(&key), &json!({"selected": "a"})),
            Some(false)
        );
    }

    #[test]
    fn multiple_choice_compares_as_sets() {
        let key = json!({"correct": ["a", "b"]});
        // Order irrelevant
        assert_eq!(
            evaluate("multiple_choice", Some(&key), &json!({"selected": ["b", "a"]})),
            Some(true)
        );
        // Duplicates irrelevant
        assert_eq!(
            evaluate("multiple_choice", Some(&key), &json!({"selected": ["a", "b", "a"]})),
            Some(true)
        );
        // Missing one
        assert_eq!(
            evaluate("multiple_choice", Some(&key), &json!({"selected": ["a"]})),
            Some(false)
        );
        // Extra one
        assert_eq!(
            evaluate("multiple_choice", Some(&key), &json!({"selected": ["a", "b", "c"]})),
            Some(false)
        );
    }

    #[test]
    fn true_false_compares_booleans() {
        let key = json!({"correct": true});
        assert_eq!(
            evaluate("true_false", Some(&key), &json!({"value": true})),
            Some(true)
        );
        assert_eq!(
            evaluate("true_false", Some(&key), &json!({"value": false})),
            Some(false)
        );
    }

    #[test]
    fn numeric_respects_tolerance_boundary() {
        let key = json!({"value": 10.0, "tolerance": 0.5});
        assert_eq!(
            evaluate("numeric", Some(&key), &json!({"value": 10.0})),
            Some(true)
        );
        assert_eq!(
            evaluate("numeric", Some(&key), &json!({"value": 10.5})),
            Some(true)
        );
        assert_eq!(
            evaluate("numeric", Some(&key), &json!({"value": 10.51})),
            Some(false)
        );
    }

    #[test]
    fn numeric_defaults_tolerance_to_a_hundredth() {
        let key = json!({"value": 3.14});
        assert_eq!(
            evaluate("numeric", Some(&key), &json!({"value": 3.15})),
            Some(true)
        );
        assert_eq!(
            evaluate("numeric", Some(&key), &json!({"value": 3.16})),
            Some(false)
        );
    }

    #[test]
    fn numeric_accepts_string_input_and_fails_closed_on_garbage() {
        let key = json!({"value": 10.0, "tolerance": 0.5});
        assert_eq!(
            evaluate("numeric", Some(&key), &json!({"value": " 10.3 "})),
            Some(true)
        );
        // Unparseable input is incorrect, not an error.
        assert_eq!(
            evaluate("numeric", Some(&key), &json!({"value": "ten"})),
            Some(false)
        );
        assert_eq!(
            evaluate("numeric", Some(&key), &json!({"value": null})),
            Some(false)
        );
    }

    #[test]
    fn short_answer_is_case_insensitive_by_default_and_trims() {
        let key = json!({"correct": ["blue", "azul"]});
        assert_eq!(
            evaluate("short_answer", Some(&key), &json!({"value": "BLUE"})),
            Some(true)
        );
        assert_eq!(
            evaluate("short_answer", Some(&key), &json!({"value": "  azul  "})),
            Some(true)
        );
        assert_eq!(
            evaluate("short_answer", Some(&key), &json!({"value": "green"})),
            Some(false)
        );
    }

    #[test]
    fn short_answer_honours_case_sensitivity_flag() {
        let key = json!({"correct": ["Paris"], "case_sensitive": true});
        assert_eq!(
            evaluate("short_answer", Some(&key), &json!({"value": "Paris"})),
            Some(true)
        );
        assert_eq!(
            evaluate("short_answer", Some(&key), &json!({"value": "paris"})),
            Some(false)
        );
    }

    #[test]
    fn missing_answer_key_is_ungradable_not_incorrect() {
        assert_eq!(evaluate("short_answer", None, &json!({"value": "x"})), None);
        assert_eq!(
            evaluate("short_answer", Some(&Value::Null), &json!({"value": "x"})),
            None
        );
    }

    #[test]
    fn unknown_type_tag_is_incorrect_not_an_error() {
        let key = json!({"correct": "a"});
        assert_eq!(
            evaluate("essay", Some(&key), &json!({"selected": "a"})),
            Some(false)
        );
    }

    #[test]
    fn malformed_key_or_response_is_incorrect() {
        // Key shape does not match the type tag
        assert_eq!(
            evaluate("single_choice", Some(&json!({"value": 3})), &json!({"selected": "a"})),
            Some(false)
        );
        // Response shape does not match the type tag
        assert_eq!(
            evaluate(
                "single_choice",
                Some(&json!({"correct": "a"})),
                &json!({"value": 3})
            ),
            Some(false)
        );
    }

    #[test]
    fn evaluation_is_deterministic() {
        let key = json!({"correct": ["a", "b"]});
        let response = json!({"selected": ["b", "a"]});
        let first = evaluate("multiple_choice", Some(&key), &response);
        let second = evaluate("multiple_choice", Some(&key), &response);
        assert_eq!(first, second);
    }

    #[test]
    fn repeated_aggregation_yields_identical_scores() {
        // Reducing the same recorded judgements twice, with no writes in
        // between, must produce the same score both times. Ungradable items
        // (None) stay out of both sides of the division.
        let judgements: Vec<Option<bool>> =
            vec![Some(true), Some(false), Some(true), None, Some(true)];

        let reduce = |items: &[Option<bool>]| {
            let graded = items.iter().filter(|j| j.is_some()).count() as i64;
            let correct = items.iter().filter(|j| **j == Some(true)).count() as i64;
            percentage(correct, graded)
        };

        let first = reduce(&judgements);
        let second = reduce(&judgements);
        assert_eq!(first, second);
        assert_eq!(first, 75); // 3 of 4 graded; the keyless item is excluded
    }

    #[test]
    fn percentage_rounds_and_defines_empty_as_zero() {
        assert_eq!(percentage(3, 4), 75);
        assert_eq!(percentage(1, 3), 33);
        assert_eq!(percentage(2, 3), 67);
        assert_eq!(percentage(0, 0), 0);
        assert_eq!(percentage(0, 5), 0);
        assert_eq!(percentage(5, 5), 100);
    }

    #[test]
    fn stats_count_statuses_and_average_completed_scores() {
        let attempts = vec![
            attempt(STATUS_COMPLETED, Some(80)),
            attempt(STATUS_COMPLETED, Some(61)),
            attempt(STATUS_IN_PROGRESS, None),
            attempt(STATUS_ABANDONED, None),
        ];
        let stats = quiz_attempt_stats(&attempts);
        assert_eq!(stats.total_attempts, 4);
        assert_eq!(stats.completed_attempts, 2);
        assert_eq!(stats.in_progress_attempts, 1);
        assert_eq!(stats.abandoned_attempts, 1);
        assert_eq!(stats.average_score, 71); // round((80 + 61) / 2)
        assert_eq!(stats.completion_rate, 50);
    }

    #[test]
    fn stats_over_no_attempts_are_all_zero() {
        let stats = quiz_attempt_stats(&[]);
        assert_eq!(stats.total_attempts, 0);
        assert_eq!(stats.average_score, 0);
        assert_eq!(stats.completion_rate, 0);
    }
}
