use serde::Deserialize;
use std::collections::HashMap;
use std::error::Error;
use std::fmt;
use std::fs;
use std::sync::Arc;
use std::time::SystemTime;
use log::info;

use crate::models::chat::Subject;
use super::templates;

#[derive(Debug)]
pub enum PromptError {
    TemplateNotFound(String),
    UnsupportedSubject(String),
    IoError(std::io::Error),
    JsonError(serde_json::Error),
}

impl fmt::Display for PromptError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PromptError::TemplateNotFound(key) => write!(f, "Prompt template '{}' not found", key),
            PromptError::UnsupportedSubject(subject) => {
                write!(f, "No prompt defined for subject '{}'", subject)
            }
            PromptError::IoError(e) => write!(f, "Prompt file IO error: {}", e),
            PromptError::JsonError(e) => write!(f, "Prompt JSON parsing error: {}", e),
        }
    }
}

impl Error for PromptError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            PromptError::IoError(e) => Some(e),
            PromptError::JsonError(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for PromptError {
    fn from(err: std::io::Error) -> Self {
        PromptError::IoError(err)
    }
}

impl From<serde_json::Error> for PromptError {
    fn from(err: serde_json::Error) -> Self {
        PromptError::JsonError(err)
    }
}

const IMAGE_WITH_QUESTION_KEY: &str = "with_question";
const IMAGE_NO_QUESTION_KEY: &str = "no_question";

/// Templates for the tutoring personas, the relevance validators, and the
/// two image-analysis variants. Built from the baked-in defaults, with
/// individual entries optionally overridden from a JSON file.
#[derive(Debug, Clone)]
pub struct PromptConfig {
    pub subject_templates: HashMap<String, String>,
    pub validation_templates: HashMap<String, String>,
    pub image_templates: HashMap<String, String>,
    pub last_loaded: Option<SystemTime>,
}

#[derive(Deserialize, Debug, Default)]
struct PromptOverrides {
    #[serde(default)]
    subject_templates: HashMap<String, String>,
    #[serde(default)]
    validation_templates: HashMap<String, String>,
    #[serde(default)]
    image_templates: HashMap<String, String>,
}

impl PromptConfig {
    pub fn defaults() -> Self {
        let mut subject_templates = HashMap::new();
        subject_templates.insert(
            Subject::MathPhysics.as_str().to_string(),
            templates::MATH_PHYSICS_TEMPLATE.to_string()
        );
        subject_templates.insert(
            Subject::Chemistry.as_str().to_string(),
            templates::CHEMISTRY_TEMPLATE.to_string()
        );
        subject_templates.insert(
            Subject::Arabic.as_str().to_string(),
            templates::ARABIC_TEMPLATE.to_string()
        );

        let mut validation_templates = HashMap::new();
        validation_templates.insert(
            Subject::MathPhysics.as_str().to_string(),
            templates::MATH_PHYSICS_VALIDATION_TEMPLATE.to_string()
        );
        validation_templates.insert(
            Subject::Chemistry.as_str().to_string(),
            templates::CHEMISTRY_VALIDATION_TEMPLATE.to_string()
        );
        validation_templates.insert(
            Subject::Arabic.as_str().to_string(),
            templates::ARABIC_DETECTION_TEMPLATE.to_string()
        );

        let mut image_templates = HashMap::new();
        image_templates.insert(
            IMAGE_WITH_QUESTION_KEY.to_string(),
            templates::IMAGE_WITH_QUESTION_TEMPLATE.to_string()
        );
        image_templates.insert(
            IMAGE_NO_QUESTION_KEY.to_string(),
            templates::IMAGE_NO_QUESTION_TEMPLATE.to_string()
        );

        Self {
            subject_templates,
            validation_templates,
            image_templates,
            last_loaded: None,
        }
    }

    fn validate(&self) -> Result<(), PromptError> {
        for subject in [Subject::MathPhysics, Subject::Chemistry, Subject::Arabic] {
            if !self.subject_templates.contains_key(subject.as_str()) {
                return Err(
                    PromptError::TemplateNotFound(format!("subject_templates:{}", subject))
                );
            }
            if !self.validation_templates.contains_key(subject.as_str()) {
                return Err(
                    PromptError::TemplateNotFound(format!("validation_templates:{}", subject))
                );
            }
        }
        for key in [IMAGE_WITH_QUESTION_KEY, IMAGE_NO_QUESTION_KEY] {
            if !self.image_templates.contains_key(key) {
                return Err(PromptError::TemplateNotFound(format!("image_templates:{}", key)));
            }
        }
        Ok(())
    }
}

/// Baked-in templates, no file involved.
pub fn default_prompts() -> Arc<PromptConfig> {
    Arc::new(PromptConfig::defaults())
}

/// Defaults with per-key overrides merged in from a JSON file.
pub fn load_prompts(path: &str) -> Result<Arc<PromptConfig>, Box<dyn Error + Send + Sync>> {
    let file_content = fs
        ::read_to_string(path)
        .map_err(|e| format!("Failed to read prompts file '{}': {}", path, e))?;
    let overrides: PromptOverrides = serde_json
        ::from_str(&file_content)
        .map_err(|e| format!("Failed to parse prompts file '{}': {}", path, e))?;

    let mut config = PromptConfig::defaults();
    config.subject_templates.extend(overrides.subject_templates);
    config.validation_templates.extend(overrides.validation_templates);
    config.image_templates.extend(overrides.image_templates);
    config.validate()?;
    config.last_loaded = Some(SystemTime::now());

    info!("Prompt overrides loaded from '{}'", path);
    Ok(Arc::new(config))
}

fn get_subject_template<'a>(
    config: &'a PromptConfig,
    subject: Subject
) -> Result<&'a str, PromptError> {
    config.subject_templates
        .get(subject.as_str())
        .map(|s| s.as_str())
        .ok_or_else(|| PromptError::TemplateNotFound(format!("subject_templates:{}", subject)))
}

fn get_validation_template<'a>(
    config: &'a PromptConfig,
    subject: Subject
) -> Result<&'a str, PromptError> {
    config.validation_templates
        .get(subject.as_str())
        .map(|s| s.as_str())
        .ok_or_else(|| PromptError::TemplateNotFound(format!("validation_templates:{}", subject)))
}

fn get_image_template<'a>(config: &'a PromptConfig, key: &str) -> Result<&'a str, PromptError> {
    config.image_templates
        .get(key)
        .map(|s| s.as_str())
        .ok_or_else(|| PromptError::TemplateNotFound(format!("image_templates:{}", key)))
}

fn context_block(subject: Subject, context: &str) -> String {
    if context.is_empty() {
        return String::new();
    }
    match subject {
        Subject::Arabic => format!("السياق من المحادثات السابقة: {}", context),
        _ => format!("Recent conversation context: {}", context),
    }
}

fn interaction_note(subject: Subject, is_social: bool) -> &'static str {
    match (subject, is_social) {
        (Subject::MathPhysics, true) =>
            "This is a social interaction (greeting/thanks/encouragement) - respond warmly and friendly!",
        (Subject::MathPhysics, false) =>
            "This is an academic question - provide detailed educational response!",
        (Subject::Chemistry, true) =>
            "This is a social interaction - respond warmly and encourage them!",
        (Subject::Chemistry, false) =>
            "This is a chemistry question - provide detailed, enthusiastic response!",
        (Subject::Arabic, true) => "هذا تفاعل اجتماعي (تحية/شكر/تشجيع) - رد بحرارة وود!",
        (Subject::Arabic, false) =>
            "هذا سؤال أكاديمي - قدم إجابة تعليمية مفصلة مع تحليل بلاغي إن وجد!",
        (Subject::ImageAnalysis, true) => "هذا تفاعل اجتماعي - رد بحرارة!",
        (Subject::ImageAnalysis, false) => "هذا سؤال أكاديمي - حلل الصورة وأجب بالتفصيل!",
    }
}

/// Fill one of the three tutoring persona templates.
pub fn get_subject_prompt(
    config: &PromptConfig,
    subject: Subject,
    question: &str,
    context: &str,
    is_social: bool
) -> Result<String, PromptError> {
    if subject == Subject::ImageAnalysis {
        return Err(PromptError::UnsupportedSubject(subject.to_string()));
    }
    let template = get_subject_template(config, subject)?;

    Ok(
        template
            .replace("{context_block}", &context_block(subject, context))
            .replace("{question}", question)
            .replace("{interaction_note}", interaction_note(subject, is_social))
    )
}

/// Fill the RELEVANT/NOT_RELEVANT (or ARABIC/NOT_ARABIC) validator prompt.
pub fn get_validation_prompt(
    config: &PromptConfig,
    subject: Subject,
    question: &str
) -> Result<String, PromptError> {
    if subject == Subject::ImageAnalysis {
        return Err(PromptError::UnsupportedSubject(subject.to_string()));
    }
    let template = get_validation_template(config, subject)?;
    Ok(template.replace("{question}", question))
}

/// Fill the image-analysis prompt, choosing the variant by whether the
/// student attached a question to the upload.
pub fn get_image_prompt(
    config: &PromptConfig,
    question: Option<&str>,
    context: &str,
    is_social: bool
) -> Result<String, PromptError> {
    match question {
        Some(question) => {
            let template = get_image_template(config, IMAGE_WITH_QUESTION_KEY)?;
            let block = if context.is_empty() {
                String::new()
            } else {
                format!("السياق من المحادثات السابقة: {}", context)
            };
            Ok(
                template
                    .replace("{context_block}", &block)
                    .replace("{question}", question)
                    .replace(
                        "{interaction_note}",
                        interaction_note(Subject::ImageAnalysis, is_social)
                    )
            )
        }
        None => {
            let template = get_image_template(config, IMAGE_NO_QUESTION_KEY)?;
            let block = if context.is_empty() {
                String::new()
            } else {
                format!("السياق: {}", context)
            };
            Ok(template.replace("{context_block}", &block))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_pass_validation() {
        assert!(PromptConfig::defaults().validate().is_ok());
    }

    #[test]
    fn subject_prompt_substitutes_question_and_context() {
        let config = PromptConfig::defaults();
        let prompt = get_subject_prompt(
            &config,
            Subject::MathPhysics,
            "What is 2+2?",
            "Previous Q: 1+1?\nPrevious A: 2...\n\n",
            false
        ).unwrap();

        assert!(prompt.contains("Student's message: What is 2+2?"));
        assert!(prompt.contains("Recent conversation context: Previous Q: 1+1?"));
        assert!(prompt.contains("This is an academic question"));
        assert!(!prompt.contains("{question}"));
        assert!(!prompt.contains("{context_block}"));
    }

    #[test]
    fn empty_context_leaves_no_context_line() {
        let config = PromptConfig::defaults();
        let prompt = get_subject_prompt(
            &config,
            Subject::Chemistry,
            "What is H2O?",
            "",
            false
        ).unwrap();
        assert!(!prompt.contains("Recent conversation context"));
    }

    #[test]
    fn social_questions_switch_the_interaction_note() {
        let config = PromptConfig::defaults();
        let prompt = get_subject_prompt(&config, Subject::Chemistry, "thanks!", "", true).unwrap();
        assert!(prompt.contains("This is a social interaction"));
    }

    #[test]
    fn arabic_prompt_uses_arabic_scaffolding() {
        let config = PromptConfig::defaults();
        let prompt = get_subject_prompt(
            &config,
            Subject::Arabic,
            "أعرب الجملة",
            "some context",
            false
        ).unwrap();
        assert!(prompt.contains("رسالة الطالب: أعرب الجملة"));
        assert!(prompt.contains("السياق من المحادثات السابقة: some context"));
    }

    #[test]
    fn validation_prompt_names_the_question() {
        let config = PromptConfig::defaults();
        let prompt = get_validation_prompt(
            &config,
            Subject::MathPhysics,
            "What is the pH of HCl?"
        ).unwrap();
        assert!(prompt.contains("Question: What is the pH of HCl?"));
        assert!(prompt.contains("RELEVANT or NOT_RELEVANT"));
    }

    #[test]
    fn image_prompt_picks_variant_by_question() {
        let config = PromptConfig::defaults();
        let with = get_image_prompt(&config, Some("حل المسألة"), "", false).unwrap();
        assert!(with.contains("سؤال الطالب: حل المسألة"));

        let without = get_image_prompt(&config, None, "", false).unwrap();
        assert!(without.contains("الرجاء تحليل هذه الصورة:"));
        assert!(!without.contains("{context_block}"));
    }

    #[test]
    fn no_subject_prompt_for_image_bucket() {
        let config = PromptConfig::defaults();
        assert!(get_subject_prompt(&config, Subject::ImageAnalysis, "q", "", false).is_err());
    }

    #[test]
    fn overrides_merge_over_defaults() {
        let config = {
            let overrides: PromptOverrides = serde_json
                ::from_str(r#"{"subject_templates": {"chemistry": "custom {question}"}}"#)
                .unwrap();
            let mut config = PromptConfig::defaults();
            config.subject_templates.extend(overrides.subject_templates);
            config.validate().unwrap();
            config
        };

        let prompt = get_subject_prompt(&config, Subject::Chemistry, "hi", "", false).unwrap();
        assert_eq!(prompt, "custom hi");
        // Untouched subjects keep their defaults.
        let math = get_subject_prompt(&config, Subject::MathPhysics, "hi", "", false).unwrap();
        assert!(math.contains("Mathematics and Physics"));
    }
}
