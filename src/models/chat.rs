use serde::{ Serialize, Deserialize };
use std::fmt;
use std::str::FromStr;

/// The fixed set of tutoring buckets. Three academic subjects plus the
/// auxiliary bucket used by the image-analysis endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Subject {
    MathPhysics,
    Chemistry,
    Arabic,
    ImageAnalysis,
}

impl Subject {
    pub const ALL: [Subject; 4] = [
        Subject::MathPhysics,
        Subject::Chemistry,
        Subject::ImageAnalysis,
        Subject::Arabic,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Subject::MathPhysics => "math_physics",
            Subject::Chemistry => "chemistry",
            Subject::Arabic => "arabic",
            Subject::ImageAnalysis => "image_analysis",
        }
    }
}

impl fmt::Display for Subject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, PartialEq, Eq)]
pub struct ParseSubjectError {
    message: String,
}

impl fmt::Display for ParseSubjectError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for ParseSubjectError {}

impl FromStr for Subject {
    type Err = ParseSubjectError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "math_physics" => Ok(Subject::MathPhysics),
            "chemistry" => Ok(Subject::Chemistry),
            "arabic" => Ok(Subject::Arabic),
            "image_analysis" => Ok(Subject::ImageAnalysis),
            _ =>
                Err(ParseSubjectError {
                    message: format!("Unknown subject: '{}'", s),
                }),
        }
    }
}

/// One stored question/answer exchange.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub id: String,
    pub question: String,
    pub answer: String,
    pub timestamp: String,
    pub subject: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct QuestionRequest {
    pub question: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChatResponse {
    pub answer: String,
    pub subject: String,
    pub timestamp: String,
    pub session_id: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct HistoryResponse {
    pub subject: String,
    pub history: Vec<HistoryEntry>,
}
