//! Turns free text and screenshots into issue drafts through an external AI
//! completion service.
//!
//! Content is the model's business; this module only guarantees the shape of
//! what comes back. Every failure ends in an empty draft list plus a warning.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{info, warn};

use crate::drafts::IssueDraft;
use crate::error::CoreError;
use crate::images::{normalize_image, ImagePayload, NormalizedImage, DEFAULT_JPEG_QUALITY};

pub const EXTRACTION_INSTRUCTION: &str = "You extract actionable issues from user input (text + screenshots). Return STRICT JSON only with this schema:\n{\"issues\":[{\"title\":\"<short issue title>\",\"description\":\"<1-3 bullet point summary>\"}]}";
pub const EMPTY_TEXT_PLACEHOLDER: &str = "No text provided.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionRequest {
    pub instruction: String,
    pub user_text: String,
    pub images: Vec<NormalizedImage>,
}

/// The AI completion contract: one request in, one JSON document out.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    async fn complete_json(&self, request: CompletionRequest) -> Result<String, CoreError>;
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractionRequest {
    pub text: String,
    pub images: Vec<ImagePayload>,
}

impl ExtractionRequest {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            images: Vec::new(),
        }
    }

    pub fn with_image(mut self, image: ImagePayload) -> Self {
        self.images.push(image);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.text.trim().is_empty() && self.images.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtractionWarning {
    EmptyInput,
    ImageSkipped { label: String, reason: String },
    CompletionFailed(String),
    UnparseableResponse(String),
    NoIssuesFound,
}

impl fmt::Display for ExtractionWarning {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyInput => {
                write!(formatter, "Please enter a description or attach an image.")
            }
            Self::ImageSkipped { label, reason } => {
                write!(formatter, "Skipped image `{label}`: {reason}")
            }
            Self::CompletionFailed(reason) => {
                write!(formatter, "The AI service could not be reached: {reason}")
            }
            Self::UnparseableResponse(reason) => {
                write!(formatter, "Could not parse AI response as JSON. Error: {reason}")
            }
            Self::NoIssuesFound => write!(
                formatter,
                "No actionable issues could be extracted from the input."
            ),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractionReport {
    pub drafts: Vec<IssueDraft>,
    pub warnings: Vec<ExtractionWarning>,
}

#[derive(Debug, Deserialize)]
struct ExtractionEnvelope {
    issues: Vec<ExtractedIssue>,
}

#[derive(Debug, Deserialize)]
struct ExtractedIssue {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    description: Option<String>,
}

/// Validates the `{"issues":[{"title","description"}]}` shape, trims both
/// fields and drops entries whose title is blank.
pub fn parse_extraction_response(raw: &str) -> Result<Vec<IssueDraft>, CoreError> {
    let envelope: ExtractionEnvelope = serde_json::from_str(raw.trim())
        .map_err(|error| CoreError::ExtractionContract(error.to_string()))?;

    Ok(envelope
        .issues
        .into_iter()
        .filter_map(|issue| {
            let title = issue.title.as_deref().unwrap_or_default().trim();
            if title.is_empty() {
                return None;
            }
            let description = issue.description.as_deref().unwrap_or_default().trim();
            Some(IssueDraft::new(title, description))
        })
        .collect())
}

#[derive(Clone)]
pub struct IssueExtractor {
    provider: Arc<dyn CompletionProvider>,
    jpeg_quality: u8,
}

impl fmt::Debug for IssueExtractor {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("IssueExtractor")
            .field("jpeg_quality", &self.jpeg_quality)
            .finish_non_exhaustive()
    }
}

impl IssueExtractor {
    pub fn new(provider: Arc<dyn CompletionProvider>) -> Self {
        Self {
            provider,
            jpeg_quality: DEFAULT_JPEG_QUALITY,
        }
    }

    pub fn with_jpeg_quality(mut self, quality: u8) -> Self {
        self.jpeg_quality = quality;
        self
    }

    pub async fn extract(&self, request: ExtractionRequest) -> ExtractionReport {
        let mut report = ExtractionReport::default();
        if request.is_empty() {
            report.warnings.push(ExtractionWarning::EmptyInput);
            return report;
        }

        let mut images = Vec::with_capacity(request.images.len());
        for payload in &request.images {
            match normalize_image(payload, self.jpeg_quality) {
                Ok(image) => images.push(image),
                Err(error) => {
                    warn!(
                        image = %payload.label,
                        error = %error,
                        "skipping image that could not be normalized"
                    );
                    report.warnings.push(ExtractionWarning::ImageSkipped {
                        label: payload.label.clone(),
                        reason: error.to_string(),
                    });
                }
            }
        }

        let text = request.text.trim();
        if text.is_empty() && images.is_empty() {
            report.warnings.push(ExtractionWarning::EmptyInput);
            return report;
        }

        let completion = CompletionRequest {
            instruction: EXTRACTION_INSTRUCTION.to_owned(),
            user_text: if text.is_empty() {
                EMPTY_TEXT_PLACEHOLDER.to_owned()
            } else {
                text.to_owned()
            },
            images,
        };
        let image_count = completion.images.len();

        let raw = match self.provider.complete_json(completion).await {
            Ok(raw) => raw,
            Err(error) => {
                warn!(error = %error, "issue extraction completion failed");
                report
                    .warnings
                    .push(ExtractionWarning::CompletionFailed(error.to_string()));
                return report;
            }
        };

        match parse_extraction_response(&raw) {
            Ok(drafts) => report.drafts = drafts,
            Err(error) => {
                warn!(error = %error, "AI response did not match the issues schema");
                report
                    .warnings
                    .push(ExtractionWarning::UnparseableResponse(error.to_string()));
                return report;
            }
        }

        if report.drafts.is_empty() {
            report.warnings.push(ExtractionWarning::NoIssuesFound);
        }
        info!(
            drafts = report.drafts.len(),
            images = image_count,
            "extracted issue drafts"
        );
        report
    }
}
