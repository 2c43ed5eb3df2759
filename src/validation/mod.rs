//! Topic-relevance gating for the tutoring endpoints.
//!
//! Three layers, cheapest first: social-interaction patterns always pass,
//! fixed keyword lists accept or reject outright, and anything still
//! undecided is put to the model as a one-word RELEVANT/NOT_RELEVANT
//! question.

use log::{ info, warn };
use once_cell::sync::Lazy;
use regex::Regex;

use crate::config::prompt::{ get_validation_prompt, PromptConfig };
use crate::llm::chat::ChatClient;
use crate::models::chat::Subject;

fn compile_all(patterns: &[&str]) -> Vec<Regex> {
    patterns
        .iter()
        .map(|p| Regex::new(p).expect("keyword pattern is valid"))
        .collect()
}

/// Greetings, thanks, praise and farewells, Arabic and English.
static SOCIAL_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    compile_all(
        &[
            r"مرحب|هلا|السلام|أهلا|هاي|hello|hi|hey|greetings",
            r"شكر|thanks|thank you|thx|متشكر",
            r"رائع|جميل|ممتاز|عظيم|حلو|كويس|great|awesome|amazing|excellent|good|nice|perfect",
            r"كيف حالك|how are you|ازيك|عامل ايه",
            r"صباح|مساء|good morning|good evening",
            r"وداع|باي|bye|see you|مع السلامة",
            r"انت شاطر|you are smart|you are good",
            r"بحبك|احبك|i love you",
            r"انا سعيد|i am happy|مبسوط",
            r"^(ok|okay|تمام|حاضر|ماشي)$",
        ]
    )
});

/// Strong chemistry signal: accepts on the chemistry endpoint, rejects on
/// the math/physics endpoint.
static CHEMISTRY_MARKERS: Lazy<Vec<Regex>> = Lazy::new(|| {
    compile_all(
        &[
            r"\bph\b",
            r"acid",
            r"base",
            r"chemical",
            r"reaction",
            r"element",
            r"compound",
            r"molecule",
            r"atom",
            r"h2o",
            r"co2",
            r"nacl",
            r"ionic",
            r"covalent",
            r"oxidation",
            r"reduction",
            r"catalyst",
            r"equilibrium",
            r"molarity",
            r"stoichiometry",
            r"periodic\s+table",
            r"organic",
            r"inorganic",
            r"كيمياء",
            r"تفاعل",
            r"حمض",
            r"قاعدة",
            r"عنصر",
            r"مركب",
            r"جزيء",
            r"ذرة",
            r"أكسدة",
            r"اختزال",
            r"محفز",
            r"محلول",
            r"تركيز",
            r"معادلة كيميائية",
        ]
    )
});

/// Math, physics and electrical-circuit signal: rejects on the chemistry
/// endpoint.
static MATH_PHYSICS_MARKERS: Lazy<Vec<Regex>> = Lazy::new(|| {
    compile_all(
        &[
            r"derivative",
            r"integral",
            r"calculus",
            r"algebra",
            r"geometry",
            r"equation\s+of\s+motion",
            r"velocity",
            r"acceleration",
            r"force",
            r"newton",
            r"energy",
            r"momentum",
            r"friction",
            r"gravity",
            r"electric\s+field",
            r"magnetic",
            r"wave",
            r"frequency",
            r"circuit",
            r"current",
            r"voltage",
            r"resistance",
            r"kirchhoff",
            r"ohm",
            r"ampere",
            r"watt",
            r"capacitor",
            r"inductor",
            r"تفاضل",
            r"تكامل",
            r"هندسة",
            r"جبر",
            r"سرعة",
            r"تسارع",
            r"قوة",
            r"نيوتن",
            r"طاقة",
            r"زخم",
            r"احتكاك",
            r"جاذبية",
            r"دائرة",
            r"تيار",
            r"جهد",
            r"مقاومة",
            r"كيرشوف",
            r"أوم",
        ]
    )
});

/// Arabic-language-study signal: rejects on both science endpoints.
static ARABIC_STUDY_MARKERS: Lazy<Vec<Regex>> = Lazy::new(|| {
    compile_all(
        &[
            r"أعرب",
            r"إعراب",
            r"نحو",
            r"بلاغة",
            r"استعارة",
            r"تشبيه",
            r"كناية",
            r"طباق",
            r"جناس",
            r"سجع",
            r"قصيدة",
            r"شعر",
            r"أدب",
            r"grammar",
            r"rhetoric",
            r"metaphor",
            r"poetry",
            r"literature",
        ]
    )
});

fn any_match(patterns: &[Regex], text: &str) -> bool {
    patterns.iter().any(|p| p.is_match(text))
}

/// Greeting/thanks/praise detection. Social questions bypass the relevance
/// gate on every endpoint.
pub fn is_social_interaction(question: &str) -> bool {
    let lowered = question.to_lowercase();
    any_match(&SOCIAL_PATTERNS, &lowered)
}

/// Keyword-only decision: `Some(true)` accept, `Some(false)` reject,
/// `None` undecided (left to the model). Arabic has no keyword layer.
pub fn keyword_screen(subject: Subject, question: &str) -> Option<bool> {
    let lowered = question.to_lowercase();
    match subject {
        Subject::MathPhysics => {
            if any_match(&CHEMISTRY_MARKERS, &lowered) || any_match(&ARABIC_STUDY_MARKERS, &lowered) {
                Some(false)
            } else {
                None
            }
        }
        Subject::Chemistry => {
            if any_match(&CHEMISTRY_MARKERS, &lowered) {
                Some(true)
            } else if
                any_match(&MATH_PHYSICS_MARKERS, &lowered) ||
                any_match(&ARABIC_STUDY_MARKERS, &lowered)
            {
                Some(false)
            } else {
                None
            }
        }
        Subject::Arabic | Subject::ImageAnalysis => None,
    }
}

/// Full relevance gate for one subject endpoint. `use_model` governs the
/// fallback round-trip to the model for questions the keyword layer leaves
/// undecided; with the model disabled such questions pass.
pub async fn validate(
    subject: Subject,
    question: &str,
    client: &dyn ChatClient,
    prompts: &PromptConfig,
    use_model: bool
) -> bool {
    if is_social_interaction(question) {
        return true;
    }

    if let Some(decision) = keyword_screen(subject, question) {
        info!("Keyword screen decided '{}' question: accepted={}", subject, decision);
        return decision;
    }

    if !use_model {
        return true;
    }

    let prompt = match get_validation_prompt(prompts, subject, question) {
        Ok(prompt) => prompt,
        Err(e) => {
            warn!("Could not build validation prompt for '{}': {}", subject, e);
            return false;
        }
    };

    match client.complete(&prompt).await {
        Ok(resp) => {
            let result = resp.response.trim().to_uppercase();
            let accepted = match subject {
                Subject::Arabic => result == "ARABIC",
                _ => result.contains("RELEVANT") && !result.contains("NOT_RELEVANT"),
            };
            info!("Model relevance check for '{}': {} -> accepted={}", subject, result, accepted);
            accepted
        }
        Err(e) => {
            // Reject on failure rather than answering off-topic questions.
            warn!("Model relevance check failed for '{}': {}", subject, e);
            false
        }
    }
}

/// The fixed refusal text, Arabic when the question itself is written in
/// Arabic script, English otherwise.
pub fn rejection_message(subject: Subject, question: &str) -> String {
    let arabic = question.chars().any(|c| ('\u{0600}'..='\u{06FF}').contains(&c));
    let message = match (subject, arabic) {
        (Subject::MathPhysics, false) =>
            "I'm sorry, but I specialize in Mathematics and Physics only. Please ask me questions about Math or Physics.",
        (Subject::MathPhysics, true) =>
            "آسف، لكنني متخصص في الرياضيات والفيزياء فقط. يرجى سؤالي عن الرياضيات أو الفيزياء.",
        (Subject::Chemistry, false) =>
            "I'm sorry, but I specialize in Chemistry only. Please ask me questions about Chemistry.",
        (Subject::Chemistry, true) =>
            "آسف، لكنني متخصص في الكيمياء فقط. يرجى سؤالي عن الكيمياء.",
        (Subject::Arabic | Subject::ImageAnalysis, false) =>
            "I'm sorry, but I specialize in Arabic language only. Please ask me questions about Arabic.",
        (Subject::Arabic | Subject::ImageAnalysis, true) =>
            "آسف، لكنني متخصص في اللغة العربية فقط. يرجى سؤالي عن اللغة العربية.",
    };
    message.to_string()
}
