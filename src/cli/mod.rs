use clap::Parser;

#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Host address and port for the server to listen on.
    #[arg(long, env = "SERVER_ADDR", default_value = "127.0.0.1:8000")]
    pub server_addr: String,

    /// API key for the Google Generative Language API.
    #[arg(long, env = "GEMINI_API_KEY", default_value = "")]
    pub gemini_api_key: String,

    /// Model name for chat completion (e.g., gemini-2.0-flash)
    #[arg(long, env = "CHAT_MODEL")] // No default, rely on adapter default if None
    pub chat_model: Option<String>,

    /// Base URL for the Generative Language API.
    #[arg(long, env = "CHAT_BASE_URL")]
    pub chat_base_url: Option<String>,

    /// Optional path to a JSON file overriding individual prompt templates.
    #[arg(long, env = "PROMPTS_PATH")]
    pub prompts_path: Option<String>,

    /// Maximum number of stored conversations per subject.
    #[arg(long, env = "HISTORY_LIMIT", default_value = "50")]
    pub history_limit: usize,

    /// Number of recent exchanges woven into each prompt for continuity.
    #[arg(long, env = "CONTEXT_LIMIT", default_value = "3")]
    pub context_limit: usize,

    /// Ask the model to double-check topic relevance when the keyword
    /// screen is undecided. Disabled, undecided questions pass through.
    #[arg(
        long,
        env = "LLM_VALIDATION",
        default_value_t = true,
        action = clap::ArgAction::Set
    )]
    pub llm_validation: bool,
}
