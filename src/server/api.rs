use crate::agent::TutorAgent;
use crate::models::chat::{ ChatResponse, HistoryResponse, QuestionRequest, Subject };
use std::error::Error;
use std::net::SocketAddr;
use std::sync::Arc;
use axum::{
    routing::{ get, post },
    Router,
    Json,
    extract::{ Multipart, Path, Query, State },
    response::{ IntoResponse, Response },
    http::StatusCode,
};
use serde::Deserialize;
use serde_json::{ json, Value };
use thiserror::Error as ThisError;
use tower_http::cors::{ Any, CorsLayer };
use log::{ info, error };

#[derive(Debug, ThisError)]
pub enum ApiError {
    #[error("Error processing question: {0}")]
    Question(String),
    #[error("Error analyzing image: {0}")]
    Image(String),
    #[error("Please upload a valid image file")]
    InvalidUpload,
    #[error("Subject not found")]
    SubjectNotFound,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::InvalidUpload => StatusCode::BAD_REQUEST,
            ApiError::SubjectNotFound => StatusCode::NOT_FOUND,
            ApiError::Question(_) | ApiError::Image(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            error!("Request failed: {}", self);
        }
        (status, Json(json!({ "detail": self.to_string() }))).into_response()
    }
}

#[derive(Clone)]
struct AppState {
    agent: Arc<TutorAgent>,
}

#[derive(Deserialize)]
struct HistoryQuery {
    #[serde(default = "default_history_limit")]
    limit: usize,
}

fn default_history_limit() -> usize {
    10
}

pub fn router(agent: Arc<TutorAgent>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(root_handler))
        .route("/math-physics", post(math_physics_handler))
        .route("/chemistry", post(chemistry_handler))
        .route("/arabic", post(arabic_handler))
        .route("/image-analysis", post(image_analysis_handler))
        .route("/history/{subject}", get(history_handler))
        .layer(cors)
        .with_state(AppState { agent })
}

pub async fn start_http_server(
    addr: &str,
    agent: Arc<TutorAgent>
) -> Result<(), Box<dyn Error + Send + Sync>> {
    let addr = addr.parse::<SocketAddr>()?;
    info!("Starting HTTP API server on: http://{}", addr);

    let app = router(agent);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app.into_make_service()).await?;

    Ok(())
}

async fn root_handler() -> Json<Value> {
    let subjects: Vec<&str> = Subject::ALL.iter()
        .map(|s| s.as_str())
        .collect();
    Json(
        json!({
        "message": "Student Homework Helper API is running!",
        "subjects": subjects,
    })
    )
}

async fn ask(
    state: &AppState,
    subject: Subject,
    request: QuestionRequest
) -> Result<Json<ChatResponse>, ApiError> {
    state.agent
        .answer(subject, &request.question).await
        .map(Json)
        .map_err(|e| ApiError::Question(e.to_string()))
}

async fn math_physics_handler(
    State(state): State<AppState>,
    Json(request): Json<QuestionRequest>
) -> Result<Json<ChatResponse>, ApiError> {
    ask(&state, Subject::MathPhysics, request).await
}

async fn chemistry_handler(
    State(state): State<AppState>,
    Json(request): Json<QuestionRequest>
) -> Result<Json<ChatResponse>, ApiError> {
    ask(&state, Subject::Chemistry, request).await
}

async fn arabic_handler(
    State(state): State<AppState>,
    Json(request): Json<QuestionRequest>
) -> Result<Json<ChatResponse>, ApiError> {
    ask(&state, Subject::Arabic, request).await
}

async fn image_analysis_handler(
    State(state): State<AppState>,
    mut multipart: Multipart
) -> Result<Json<ChatResponse>, ApiError> {
    let mut file: Option<(String, Vec<u8>)> = None;
    let mut question: Option<String> = None;

    while
        let Some(field) = multipart
            .next_field().await
            .map_err(|e| ApiError::Image(e.to_string()))?
    {
        let name = field.name().map(|s| s.to_string());
        match name.as_deref() {
            Some("file") => {
                let content_type = field
                    .content_type()
                    .map(|s| s.to_string())
                    .unwrap_or_default();
                if !content_type.starts_with("image/") {
                    return Err(ApiError::InvalidUpload);
                }
                let data = field.bytes().await.map_err(|e| ApiError::Image(e.to_string()))?;
                file = Some((content_type, data.to_vec()));
            }
            Some("question") => {
                let text = field.text().await.map_err(|e| ApiError::Image(e.to_string()))?;
                if !text.trim().is_empty() {
                    question = Some(text);
                }
            }
            _ => {}
        }
    }

    let (mime_type, data) = file.ok_or(ApiError::InvalidUpload)?;

    state.agent
        .analyze_image(&mime_type, data, question).await
        .map(Json)
        .map_err(|e| ApiError::Image(e.to_string()))
}

async fn history_handler(
    State(state): State<AppState>,
    Path(subject): Path<String>,
    Query(query): Query<HistoryQuery>
) -> Result<Json<HistoryResponse>, ApiError> {
    let subject: Subject = subject.parse().map_err(|_| ApiError::SubjectNotFound)?;

    let history = state.agent
        .recent_history(subject, query.limit).await
        .map_err(|e| ApiError::Question(e.to_string()))?;

    Ok(
        Json(HistoryResponse {
            subject: subject.to_string(),
            history,
        })
    )
}
