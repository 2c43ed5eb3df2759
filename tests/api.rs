use async_trait::async_trait;
use axum::body::Body;
use axum::http::{ header, Request, StatusCode };
use axum::Router;
use serde_json::Value;
use std::error::Error as StdError;
use std::sync::Arc;
use tower::util::ServiceExt;

use tutor_agent::agent::TutorAgent;
use tutor_agent::config::prompt;
use tutor_agent::history::MemoryHistoryStore;
use tutor_agent::llm::chat::{ ChatClient, CompletionResponse };
use tutor_agent::server::api::router;

/// Stands in for Gemini: one canned reply for relevance-validator prompts,
/// one for everything else.
struct ScriptedChatClient {
    validation_reply: String,
    answer_reply: String,
}

impl ScriptedChatClient {
    fn new(validation_reply: &str, answer_reply: &str) -> Self {
        Self {
            validation_reply: validation_reply.to_string(),
            answer_reply: answer_reply.to_string(),
        }
    }
}

#[async_trait]
impl ChatClient for ScriptedChatClient {
    async fn complete(
        &self,
        prompt: &str
    ) -> Result<CompletionResponse, Box<dyn StdError + Send + Sync>> {
        let response = if
            prompt.contains("Answer ONLY with") ||
            prompt.contains("ONLY ONE WORD")
        {
            self.validation_reply.clone()
        } else {
            self.answer_reply.clone()
        };
        Ok(CompletionResponse { response })
    }

    async fn complete_with_image(
        &self,
        _prompt: &str,
        _mime_type: &str,
        _data: &[u8]
    ) -> Result<CompletionResponse, Box<dyn StdError + Send + Sync>> {
        Ok(CompletionResponse { response: self.answer_reply.clone() })
    }

    fn get_model(&self) -> String {
        "scripted".to_string()
    }
}

fn test_app(validation_reply: &str, answer_reply: &str) -> Router {
    test_app_with_validation(validation_reply, answer_reply, true)
}

fn test_app_with_validation(
    validation_reply: &str,
    answer_reply: &str,
    llm_validation: bool
) -> Router {
    let agent = TutorAgent::with_components(
        Arc::new(ScriptedChatClient::new(validation_reply, answer_reply)),
        prompt::default_prompts(),
        Arc::new(MemoryHistoryStore::new(50)),
        3,
        llm_validation
    );
    router(Arc::new(agent))
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn post_question(uri: &str, question: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(serde_json::json!({ "question": question }).to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

#[tokio::test]
async fn root_reports_service_and_subjects() {
    let app = test_app("RELEVANT", "answer");

    let response = app.oneshot(get("/")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["message"], "Student Homework Helper API is running!");
    let subjects: Vec<&str> = json["subjects"]
        .as_array()
        .unwrap()
        .iter()
        .map(|v| v.as_str().unwrap())
        .collect();
    assert_eq!(subjects, vec!["math_physics", "chemistry", "image_analysis", "arabic"]);
}

#[tokio::test]
async fn math_question_is_answered_and_stored() {
    let app = test_app("RELEVANT", "x equals 3");

    let response = app
        .clone()
        .oneshot(post_question("/math-physics", "solve for x: 3x = 9")).await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["answer"], "x equals 3");
    assert_eq!(json["subject"], "math_physics");
    assert!(json["session_id"].as_str().unwrap().len() >= 32);
    assert!(json["timestamp"].as_str().is_some());

    let history = app.oneshot(get("/history/math_physics")).await.unwrap();
    let json = body_json(history).await;
    let entries = json["history"].as_array().unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0]["question"], "solve for x: 3x = 9");
    assert_eq!(entries[0]["answer"], "x equals 3");
}

#[tokio::test]
async fn chemistry_keywords_are_rejected_on_math_endpoint() {
    let app = test_app("RELEVANT", "should never be asked");

    let response = app
        .clone()
        .oneshot(post_question("/math-physics", "What is the pH of HCl?")).await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(
        json["answer"],
        "I'm sorry, but I specialize in Mathematics and Physics only. Please ask me questions about Math or Physics."
    );
    assert_eq!(json["subject"], "math_physics");

    // Rejected exchanges never enter history.
    let history = app.oneshot(get("/history/math_physics")).await.unwrap();
    let json = body_json(history).await;
    assert!(json["history"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn model_verdict_rejects_undecided_chemistry_question() {
    let app = test_app("NOT_RELEVANT", "should never be asked");

    let response = app
        .oneshot(post_question("/chemistry", "who won the world cup in 2010?")).await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(
        json["answer"],
        "I'm sorry, but I specialize in Chemistry only. Please ask me questions about Chemistry."
    );
    assert_eq!(json["subject"], "chemistry");
}

#[tokio::test]
async fn arabic_rejection_carries_rejected_label() {
    let app = test_app("NOT_ARABIC", "should never be asked");

    let response = app
        .clone()
        .oneshot(post_question("/arabic", "طريقة عمل الكشري المصري")).await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["subject"], "rejected");
    assert_eq!(json["answer"], "آسف، لكنني متخصص في اللغة العربية فقط. يرجى سؤالي عن اللغة العربية.");

    let history = app.oneshot(get("/history/arabic")).await.unwrap();
    let json = body_json(history).await;
    assert!(json["history"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn arabic_grammar_question_is_accepted() {
    let app = test_app("ARABIC", "الفاعل مرفوع بالضمة");

    let response = app
        .oneshot(post_question("/arabic", "أعرب الجملة التالية")).await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["subject"], "arabic");
    assert_eq!(json["answer"], "الفاعل مرفوع بالضمة");
}

#[tokio::test]
async fn disabled_model_validation_lets_undecided_questions_through() {
    let app = test_app_with_validation("NOT_RELEVANT", "42", false);

    let response = app
        .oneshot(post_question("/math-physics", "solve for x: 3x = 9")).await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["answer"], "42");
}

#[tokio::test]
async fn history_respects_limit_query() {
    let app = test_app("RELEVANT", "done");

    for question in [
        "balance the chemical reaction of iron",
        "explain the acid in vinegar",
        "what compound is table salt?",
    ] {
        let response = app
            .clone()
            .oneshot(post_question("/chemistry", question)).await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    let history = app.oneshot(get("/history/chemistry?limit=2")).await.unwrap();
    let json = body_json(history).await;
    let entries = json["history"].as_array().unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0]["question"], "explain the acid in vinegar");
    assert_eq!(entries[1]["question"], "what compound is table salt?");
}

#[tokio::test]
async fn unknown_history_subject_is_404() {
    let app = test_app("RELEVANT", "answer");

    let response = app.oneshot(get("/history/biology")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let json = body_json(response).await;
    assert_eq!(json["detail"], "Subject not found");
}

fn multipart_request(content_type: &str, with_question: bool) -> Request<Body> {
    let boundary = "tutor-agent-test-boundary";
    let mut body = format!(
        "--{boundary}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"upload.png\"\r\nContent-Type: {content_type}\r\n\r\nnot-really-pixels\r\n"
    );
    if with_question {
        body.push_str(
            &format!(
                "--{boundary}\r\nContent-Disposition: form-data; name=\"question\"\r\n\r\nما هذا الشكل؟\r\n"
            )
        );
    }
    body.push_str(&format!("--{boundary}--\r\n"));

    Request::builder()
        .method("POST")
        .uri("/image-analysis")
        .header(header::CONTENT_TYPE, format!("multipart/form-data; boundary={boundary}"))
        .body(Body::from(body))
        .unwrap()
}

#[tokio::test]
async fn image_upload_is_analyzed_and_stored() {
    let app = test_app("RELEVANT", "هذه دائرة كهربائية");

    let response = app.clone().oneshot(multipart_request("image/png", true)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["subject"], "image_analysis");
    assert_eq!(json["answer"], "هذه دائرة كهربائية");

    let history = app.oneshot(get("/history/image_analysis")).await.unwrap();
    let json = body_json(history).await;
    let entries = json["history"].as_array().unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0]["question"], "ما هذا الشكل؟");
}

#[tokio::test]
async fn image_upload_without_question_uses_placeholder() {
    let app = test_app("RELEVANT", "وصف الصورة");

    let response = app.clone().oneshot(multipart_request("image/jpeg", false)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let history = app.oneshot(get("/history/image_analysis")).await.unwrap();
    let json = body_json(history).await;
    let entries = json["history"].as_array().unwrap();
    assert_eq!(entries[0]["question"], "Image analysis (no specific question)");
}

#[tokio::test]
async fn non_image_upload_is_a_bad_request() {
    let app = test_app("RELEVANT", "answer");

    let response = app.oneshot(multipart_request("text/plain", false)).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let json = body_json(response).await;
    assert_eq!(json["detail"], "Please upload a valid image file");
}
