use chrono::Utc;
use log::info;
use std::error::Error;
use std::sync::Arc;
use uuid::Uuid;

use crate::cli::Args;
use crate::config::prompt::{
    self,
    get_image_prompt,
    get_subject_prompt,
    PromptConfig,
};
use crate::history::{ format_recent_context, initialize_history_store, HistoryStore };
use crate::llm::chat::{ new_client as new_chat_client, ChatClient };
use crate::llm::LlmConfig;
use crate::models::chat::{ ChatResponse, HistoryEntry, Subject };
use crate::validation;

pub const NO_QUESTION_PLACEHOLDER: &str = "Image analysis (no specific question)";

/// Ties the chat client, prompt templates, relevance gate and history
/// together. One instance is shared by every request handler.
pub struct TutorAgent {
    chat_client: Arc<dyn ChatClient>,
    prompt_config: Arc<PromptConfig>,
    history_store: Arc<dyn HistoryStore>,
    context_limit: usize,
    llm_validation: bool,
}

impl TutorAgent {
    pub fn new(args: &Args) -> Result<Self, Box<dyn Error + Send + Sync>> {
        if args.gemini_api_key.is_empty() {
            return Err("GEMINI_API_KEY is not set. Check your .env file!".into());
        }

        let llm_config = LlmConfig {
            api_key: args.gemini_api_key.clone(),
            completion_model: args.chat_model.clone(),
            base_url: args.chat_base_url.clone(),
        };
        let chat_client = new_chat_client(&llm_config)?;
        info!("Chat client configured: Model={}", chat_client.get_model());

        let prompt_config = match &args.prompts_path {
            Some(path) => prompt::load_prompts(path)?,
            None => prompt::default_prompts(),
        };

        let history_store = initialize_history_store(args.history_limit);

        Ok(
            Self::with_components(
                chat_client,
                prompt_config,
                history_store,
                args.context_limit,
                args.llm_validation
            )
        )
    }

    pub fn with_components(
        chat_client: Arc<dyn ChatClient>,
        prompt_config: Arc<PromptConfig>,
        history_store: Arc<dyn HistoryStore>,
        context_limit: usize,
        llm_validation: bool
    ) -> Self {
        Self {
            chat_client,
            prompt_config,
            history_store,
            context_limit,
            llm_validation,
        }
    }

    /// Answer a text question on one of the three tutoring endpoints.
    /// Off-topic questions get the fixed rejection text and are never
    /// stored; Arabic rejections additionally carry the `rejected` label.
    pub async fn answer(
        &self,
        subject: Subject,
        question: &str
    ) -> Result<ChatResponse, Box<dyn Error + Send + Sync>> {
        let accepted = validation::validate(
            subject,
            question,
            self.chat_client.as_ref(),
            &self.prompt_config,
            self.llm_validation
        ).await;

        if !accepted {
            info!("Rejected off-topic question on '{}' endpoint", subject);
            let label = match subject {
                Subject::Arabic => "rejected".to_string(),
                _ => subject.to_string(),
            };
            return Ok(chat_response(validation::rejection_message(subject, question), label));
        }

        let is_social = validation::is_social_interaction(question);
        let context = self.recent_context(subject).await?;
        let prompt = get_subject_prompt(
            &self.prompt_config,
            subject,
            question,
            &context,
            is_social
        )?;

        let completion = self.chat_client.complete(&prompt).await?;
        let answer = completion.response;

        self.remember(subject, question.to_string(), answer.clone()).await?;

        Ok(chat_response(answer, subject.to_string()))
    }

    /// Describe or solve whatever the uploaded image contains. The image
    /// bucket has no relevance gate.
    pub async fn analyze_image(
        &self,
        mime_type: &str,
        data: Vec<u8>,
        question: Option<String>
    ) -> Result<ChatResponse, Box<dyn Error + Send + Sync>> {
        let is_social = question
            .as_deref()
            .map(validation::is_social_interaction)
            .unwrap_or(false);
        let context = self.recent_context(Subject::ImageAnalysis).await?;
        let prompt = get_image_prompt(
            &self.prompt_config,
            question.as_deref(),
            &context,
            is_social
        )?;

        let completion = self.chat_client.complete_with_image(&prompt, mime_type, &data).await?;
        let answer = completion.response;

        let question_text = question.unwrap_or_else(|| NO_QUESTION_PLACEHOLDER.to_string());
        self.remember(Subject::ImageAnalysis, question_text, answer.clone()).await?;

        Ok(chat_response(answer, Subject::ImageAnalysis.to_string()))
    }

    pub async fn recent_history(
        &self,
        subject: Subject,
        limit: usize
    ) -> Result<Vec<HistoryEntry>, Box<dyn Error + Send + Sync>> {
        self.history_store.recent(subject, limit).await
    }

    async fn recent_context(
        &self,
        subject: Subject
    ) -> Result<String, Box<dyn Error + Send + Sync>> {
        let entries = self.history_store.recent(subject, self.context_limit).await?;
        Ok(format_recent_context(&entries))
    }

    async fn remember(
        &self,
        subject: Subject,
        question: String,
        answer: String
    ) -> Result<(), Box<dyn Error + Send + Sync>> {
        let entry = HistoryEntry {
            id: Uuid::new_v4().to_string(),
            question,
            answer,
            timestamp: Utc::now().to_rfc3339(),
            subject: subject.to_string(),
        };
        self.history_store.append(entry).await
    }
}

fn chat_response(answer: String, subject: String) -> ChatResponse {
    ChatResponse {
        answer,
        subject,
        timestamp: Utc::now().to_rfc3339(),
        session_id: Uuid::new_v4().to_string(),
    }
}
