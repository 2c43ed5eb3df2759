pub mod chat;

pub const DEFAULT_COMPLETION_MODEL: &str = "gemini-2.0-flash";
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";

#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub api_key: String,
    pub completion_model: Option<String>,
    pub base_url: Option<String>,
}
