//! Intent classification of support inquiries.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::error::PipelineError;
use crate::providers::Provider;
use crate::resources::{ResourceName, ResourceSet};

/// What kind of support request an inquiry is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Intent {
    #[serde(rename = "Technical Issue")]
    TechnicalIssue,
    #[serde(rename = "Feature Explanation")]
    FeatureExplanation,
    #[serde(rename = "System Architecture Explanation")]
    SystemArchitectureExplanation,
    #[serde(rename = "General Inquiry")]
    GeneralInquiry,
}

impl Intent {
    pub fn label(self) -> &'static str {
        match self {
            Self::TechnicalIssue => "Technical Issue",
            Self::FeatureExplanation => "Feature Explanation",
            Self::SystemArchitectureExplanation => "System Architecture Explanation",
            Self::GeneralInquiry => "General Inquiry",
        }
    }

    /// Map raw classifier output to an intent.
    ///
    /// Surrounding whitespace is ignored; everything else must match a label
    /// exactly, case included. Anything unrecognised is a general inquiry.
    pub fn from_classifier_output(raw: &str) -> Self {
        match raw.trim() {
            "Technical Issue" => Self::TechnicalIssue,
            "Feature Explanation" => Self::FeatureExplanation,
            "System Architecture Explanation" => Self::SystemArchitectureExplanation,
            "General Inquiry" => Self::GeneralInquiry,
            other => {
                tracing::debug!(
                    output = %other.chars().take(80).collect::<String>(),
                    "Unrecognised intent label, defaulting to General Inquiry"
                );
                Self::GeneralInquiry
            }
        }
    }
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Ask the model which intent `inquiry` expresses.
pub async fn classify(
    provider: &dyn Provider,
    resources: &ResourceSet,
    inquiry: &str,
) -> Result<Intent, PipelineError> {
    let prompt = resources.render(ResourceName::ClassificationPrompt, &[("inquiry", inquiry)])?;
    let raw = provider
        .complete(&prompt)
        .await
        .map_err(|e| PipelineError::gateway("classification", e))?;
    Ok(Intent::from_classifier_output(&raw))
}
