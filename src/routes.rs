// src/routes.rs

use axum::{
    Router,
    http::Method,
    middleware,
    routing::{get, post, put},
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{
    handlers::{attempt, question, quiz},
    state::AppState,
    utils::jwt::auth_middleware,
};

/// Assembles the main application router.
///
/// * Merges all sub-routers (quizzes, questions, attempts).
/// * Every route requires a bearer identity; the auth middleware rejects
///   unauthenticated callers with 401 before any handler runs.
/// * Applies global middleware (Trace, CORS).
/// * Injects global state (Database Pool + Config).
pub fn create_router(state: AppState) -> Router {
    let origins = [
        "http://localhost:3000".parse().unwrap(),
        "http://127.0.0.1:3000".parse().unwrap(),
    ];

    let cors = CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([
            axum::http::header::AUTHORIZATION,
            axum::http::header::CONTENT_TYPE,
        ]);

    let quiz_routes = Router::new()
        .route("/", get(quiz::list_quizzes).post(quiz::create_quiz))
        .route(
            "/{id}",
            get(quiz::get_quiz)
                .put(quiz::update_quiz)
                .delete(quiz::delete_quiz),
        )
        .route("/{id}/questions", get(quiz::list_quiz_questions))
        .route("/{id}/attempts", get(quiz::list_quiz_attempts));

    let question_routes = Router::new()
        .route("/", post(question::create_question))
        .route(
            "/{id}",
            put(question::update_question).delete(question::delete_question),
        );

    let attempt_routes = Router::new()
        .route("/", post(attempt::create_attempt).get(attempt::list_attempts))
        .route(
            "/{id}",
            get(attempt::get_attempt).delete(attempt::abandon_attempt),
        )
        .route("/{id}/answer", post(attempt::submit_answer))
        .route("/{id}/finish", post(attempt::finish_attempt));

    Router::new()
        .nest("/quizzes", quiz_routes)
        .nest("/questions", question_routes)
        .nest("/attempts", attempt_routes)
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
        // Global Middleware (applied from outside in)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
