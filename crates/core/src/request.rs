//! Job submission request model.
//!
//! Mirrors the generation service's submission schema. The request is
//! validated client-side before it is sent so obviously broken
//! submissions never leave the process.

use serde::{Deserialize, Serialize};
use validator::Validate;

/// Output format the service should render the result into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputFormat {
    BlogPost,
    BookChapter,
    ResearchReport,
    InteractiveSession,
}

/// Audience the generated content is written for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetAudience {
    GeneralPublic,
    CybersecurityProfessionals,
    Students,
    Executives,
    TechnicalTeams,
}

/// Technical depth of the generated content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TechnicalDepth {
    Beginner,
    Intermediate,
    Advanced,
    Expert,
}

/// Request payload for starting a generation job.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct GenerationRequest {
    /// Main research topic / title.
    #[validate(length(min = 1, max = 500))]
    pub topic: String,
    /// Specific content directions and insights to explore.
    #[validate(length(min = 1))]
    pub content_directions: String,
    #[serde(default = "GenerationRequest::default_output_format")]
    pub output_format: OutputFormat,
    #[serde(default = "GenerationRequest::default_target_audience")]
    pub target_audience: TargetAudience,
    #[serde(default = "GenerationRequest::default_technical_depth")]
    pub technical_depth: TechnicalDepth,
    /// Whether the historical-context agent should contribute.
    #[serde(default = "GenerationRequest::default_historical_context")]
    pub include_historical_context: bool,
    /// Writing style (educational, technical, narrative).
    #[serde(default = "GenerationRequest::default_style")]
    pub style: String,
}

impl GenerationRequest {
    /// Minimal request with service defaults for everything but the
    /// topic and directions.
    pub fn new(topic: impl Into<String>, content_directions: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            content_directions: content_directions.into(),
            output_format: Self::default_output_format(),
            target_audience: Self::default_target_audience(),
            technical_depth: Self::default_technical_depth(),
            include_historical_context: Self::default_historical_context(),
            style: Self::default_style(),
        }
    }

    fn default_output_format() -> OutputFormat {
        OutputFormat::BlogPost
    }

    fn default_target_audience() -> TargetAudience {
        TargetAudience::CybersecurityProfessionals
    }

    fn default_technical_depth() -> TechnicalDepth {
        TechnicalDepth::Intermediate
    }

    fn default_historical_context() -> bool {
        true
    }

    fn default_style() -> String {
        "educational".to_string()
    }
}
