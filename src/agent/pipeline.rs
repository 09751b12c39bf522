//! Intent-routed response pipeline.
//!
//! One call to [`ResponsePipeline::generate_response`] handles one user turn:
//!
//! 1. fold recent history into an inquiry,
//! 2. classify the inquiry,
//! 3. run exactly one branch (technical issue, feature, architecture, general),
//! 4. strip `div` markup from the reply.
//!
//! Provider calls within a turn are awaited one after another; nothing runs
//! concurrently and nothing is retried.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::classifier::{classify, Intent};
use super::error::PipelineError;
use super::inquiry::build_inquiry;
use super::issue::IssueRecord;
use super::sanitize::{strip_html_divs, strip_markdown};
use crate::providers::Provider;
use crate::resources::{ResourceName, ResourceSet};
use crate::sessions::Message;

/// Outcome of one user turn.
///
/// `summary`, `explanation` and `issue_json` are only set for technical issues.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseResult {
    pub intent: Intent,
    pub summary: Option<String>,
    pub explanation: Option<String>,
    pub issue_json: Option<IssueRecord>,
    pub response: String,
}

fn summary_prompt(inquiry: &str) -> String {
    format!(
        "Summarize the technical issue below in 2-3 concise sentences. \
         Focus on symptoms, context, and any mentioned errors. \
         Do not add new information.\n\n\
         Issue:\n{inquiry}\n\nSummary:"
    )
}

fn compose_issue_reply(summary: &str, explanation: &str, issue: &IssueRecord) -> String {
    format!(
        "Summary: {summary}\n\n{explanation}\n\nI've logged the issue. Details:\n\n```json\n{}\n```",
        issue.to_pretty_json()
    )
}

/// Routes each inquiry to the matching prompt and reference document.
pub struct ResponsePipeline {
    provider: Arc<dyn Provider>,
    resources: Arc<ResourceSet>,
}

impl ResponsePipeline {
    pub fn new(provider: Arc<dyn Provider>, resources: Arc<ResourceSet>) -> Self {
        Self {
            provider,
            resources,
        }
    }

    pub fn provider(&self) -> &dyn Provider {
        self.provider.as_ref()
    }

    /// Produce the assistant reply for `message` given the prior `history`.
    ///
    /// `history` must not include `message` itself.
    pub async fn generate_response(
        &self,
        message: &str,
        history: &[Message],
    ) -> Result<ResponseResult, PipelineError> {
        if let Some(var) = self.provider.missing_credential() {
            tracing::warn!(credential = var, "LLM credential not configured");
            return Err(PipelineError::missing_credential(var));
        }

        let inquiry = build_inquiry(message, history);
        let intent = classify(self.provider.as_ref(), &self.resources, &inquiry).await?;
        tracing::info!(
            intent = intent.label(),
            history = history.len(),
            inquiry_chars = inquiry.len(),
            "Classified inquiry"
        );

        let mut result = match intent {
            Intent::TechnicalIssue => self.technical_issue(&inquiry).await?,
            Intent::FeatureExplanation => ResponseResult {
                intent,
                summary: None,
                explanation: None,
                issue_json: None,
                response: self
                    .answer(
                        "feature",
                        ResourceName::FeatureQuestionPrompt,
                        &[
                            ("inquiry", inquiry.as_str()),
                            (
                                "feature_breakdown",
                                self.resources.text(ResourceName::FeatureBreakdown),
                            ),
                        ],
                    )
                    .await?,
            },
            Intent::SystemArchitectureExplanation => ResponseResult {
                intent,
                summary: None,
                explanation: None,
                issue_json: None,
                response: self
                    .answer(
                        "architecture",
                        ResourceName::SystemQuestionPrompt,
                        &[
                            ("inquiry", inquiry.as_str()),
                            (
                                "system_archi",
                                self.resources.text(ResourceName::SystemArchitecture),
                            ),
                        ],
                    )
                    .await?,
            },
            Intent::GeneralInquiry => ResponseResult {
                intent,
                summary: None,
                explanation: None,
                issue_json: None,
                response: self
                    .answer(
                        "general",
                        ResourceName::GeneralQuestionPrompt,
                        &[
                            ("inquiry", inquiry.as_str()),
                            ("kairos_info", self.resources.text(ResourceName::KairosInfo)),
                        ],
                    )
                    .await?,
            },
        };

        result.response = strip_html_divs(&result.response);
        Ok(result)
    }

    /// Extract the issue record, explain it against the architecture
    /// document, summarize it, and compose the three into one reply.
    async fn technical_issue(&self, inquiry: &str) -> Result<ResponseResult, PipelineError> {
        let extraction_prompt = self
            .resources
            .render(ResourceName::IssueExtractionPrompt, &[("inquiry", inquiry)])?;
        let raw_issue = self.call("extraction", &extraction_prompt).await?;
        let issue = IssueRecord::from_model_output(&raw_issue);

        let system_context = format!(
            "{}\n\nObserved issue details:\n{}",
            self.resources.text(ResourceName::SystemArchitecture),
            issue.to_pretty_json()
        );
        let explanation_prompt = self.resources.render(
            ResourceName::SystemQuestionPrompt,
            &[("inquiry", inquiry), ("system_archi", &system_context)],
        )?;
        let explanation = strip_markdown(&self.call("explanation", &explanation_prompt).await?);

        let summary = strip_markdown(&self.call("summary", &summary_prompt(inquiry)).await?);

        Ok(ResponseResult {
            intent: Intent::TechnicalIssue,
            response: compose_issue_reply(&summary, &explanation, &issue),
            summary: Some(summary),
            explanation: Some(explanation),
            issue_json: Some(issue),
        })
    }

    /// Render a question template and return the model's answer verbatim.
    async fn answer(
        &self,
        stage: &'static str,
        template: ResourceName,
        values: &[(&str, &str)],
    ) -> Result<String, PipelineError> {
        let prompt = self.resources.render(template, values)?;
        self.call(stage, &prompt).await
    }

    async fn call(&self, stage: &'static str, prompt: &str) -> Result<String, PipelineError> {
        tracing::debug!(
            stage,
            provider = self.provider.name(),
            prompt_chars = prompt.len(),
            "Calling provider"
        );
        self.provider
            .complete(prompt)
            .await
            .map_err(|e| PipelineError::gateway(stage, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::issue::{ISSUE_FIELDS, NOT_SPECIFIED};
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::collections::VecDeque;

    /// Replays canned completions in order and records every prompt.
    struct ScriptedProvider {
        replies: Mutex<VecDeque<anyhow::Result<String>>>,
        prompts: Mutex<Vec<String>>,
        credential: Option<&'static str>,
    }

    impl ScriptedProvider {
        fn new(replies: &[&str]) -> Arc<Self> {
            Arc::new(Self {
                replies: Mutex::new(replies.iter().map(|r| Ok((*r).to_string())).collect()),
                prompts: Mutex::new(Vec::new()),
                credential: None,
            })
        }

        fn failing_at(replies: &[&str], error: &str) -> Arc<Self> {
            let mut queue: VecDeque<_> = replies.iter().map(|r| Ok((*r).to_string())).collect();
            queue.push_back(Err(anyhow::anyhow!(error.to_string())));
            Arc::new(Self {
                replies: Mutex::new(queue),
                prompts: Mutex::new(Vec::new()),
                credential: None,
            })
        }

        fn unconfigured() -> Arc<Self> {
            Arc::new(Self {
                replies: Mutex::new(VecDeque::new()),
                prompts: Mutex::new(Vec::new()),
                credential: Some("MISTRAL_API_KEY"),
            })
        }

        fn prompts(&self) -> Vec<String> {
            self.prompts.lock().clone()
        }
    }

    #[async_trait]
    impl Provider for ScriptedProvider {
        async fn complete(&self, prompt: &str) -> anyhow::Result<String> {
            self.prompts.lock().push(prompt.to_string());
            self.replies
                .lock()
                .pop_front()
                .unwrap_or_else(|| Err(anyhow::anyhow!("no scripted reply left")))
        }

        fn missing_credential(&self) -> Option<&str> {
            self.credential
        }

        fn model(&self) -> &str {
            "scripted"
        }

        fn name(&self) -> &str {
            "scripted"
        }
    }

    fn resources() -> Arc<ResourceSet> {
        Arc::new(
            ResourceSet::from_entries([
                (ResourceName::ClassificationPrompt, "CLASSIFY: {inquiry}"),
                (ResourceName::IssueExtractionPrompt, "EXTRACT {{json}}: {inquiry}"),
                (
                    ResourceName::FeatureQuestionPrompt,
                    "FEATURE [{feature_breakdown}] {inquiry}",
                ),
                (ResourceName::SystemQuestionPrompt, "SYSTEM [{system_archi}] {inquiry}"),
                (ResourceName::GeneralQuestionPrompt, "GENERAL [{kairos_info}] {inquiry}"),
                (ResourceName::KairosInfo, "kairos-info-doc"),
                (ResourceName::FeatureBreakdown, "feature-doc"),
                (ResourceName::SystemArchitecture, "<div class=\"arch\">arch-doc</div>"),
            ])
            .unwrap(),
        )
    }

    fn pipeline(provider: Arc<ScriptedProvider>) -> ResponsePipeline {
        ResponsePipeline::new(provider, resources())
    }

    #[tokio::test]
    async fn technical_issue_runs_extraction_explanation_and_summary() {
        let provider = ScriptedProvider::new(&[
            "Technical Issue",
            "Here is the data:\n```json\n{\"issue_type\": \"export failure\", \"stage_of_failure\": \"90%\", \"mood\": \"sad\"}\n```",
            "## Likely cause\nThe **render queue** stalls in `encoder`.",
            "**The export** stops at 90%.",
        ]);
        let result = pipeline(provider.clone())
            .generate_response("My export keeps failing at 90%", &[])
            .await
            .unwrap();

        assert_eq!(result.intent, Intent::TechnicalIssue);
        assert_eq!(result.summary.as_deref(), Some("The export stops at 90%."));
        assert_eq!(
            result.explanation.as_deref(),
            Some("Likely cause\nThe render queue stalls in encoder.")
        );

        let issue = result.issue_json.clone().unwrap();
        assert_eq!(issue.issue_type, "export failure");
        assert_eq!(issue.stage_of_failure, "90%");
        assert_eq!(issue.video_format, NOT_SPECIFIED);

        assert!(result.response.starts_with("Summary: The export stops at 90%.\n\n"));
        assert!(result.response.contains("Likely cause\nThe render queue stalls in encoder."));
        assert!(result.response.contains("```json\n{\n  \"issue_type\""));
        assert!(result.response.ends_with("}\n```"));
        for field in ISSUE_FIELDS {
            assert!(result.response.contains(&format!("\"{field}\"")), "missing {field}");
        }
        assert!(!result.response.contains("mood"));

        let prompts = provider.prompts();
        assert_eq!(prompts.len(), 4);
        assert_eq!(prompts[0], "CLASSIFY: My export keeps failing at 90%");
        assert_eq!(prompts[1], "EXTRACT {json}: My export keeps failing at 90%");
        assert!(prompts[2].starts_with("SYSTEM [<div class=\"arch\">arch-doc</div>\n\nObserved issue details:\n{\n  \"issue_type\": \"export failure\""));
        assert!(prompts[2].ends_with("] My export keeps failing at 90%"));
        assert!(prompts[3].starts_with("Summarize the technical issue below in 2-3 concise sentences."));
        assert!(prompts[3].ends_with("Issue:\nMy export keeps failing at 90%\n\nSummary:"));
    }

    #[tokio::test]
    async fn malformed_extraction_yields_all_not_specified() {
        let provider = ScriptedProvider::new(&[
            "Technical Issue",
            "I could not extract anything useful.",
            "explanation",
            "summary",
        ]);
        let result = pipeline(provider)
            .generate_response("It broke", &[])
            .await
            .unwrap();

        assert_eq!(result.issue_json, Some(IssueRecord::default()));
    }

    #[tokio::test]
    async fn feature_branch_returns_answer_verbatim() {
        let provider = ScriptedProvider::new(&[
            "Feature Explanation",
            "## Auto-captions\n**Captions** are generated <div>inline</div>.",
        ]);
        let result = pipeline(provider.clone())
            .generate_response("How do captions work?", &[])
            .await
            .unwrap();

        assert_eq!(result.intent, Intent::FeatureExplanation);
        assert_eq!(
            result.response,
            "## Auto-captions\n**Captions** are generated inline."
        );
        assert!(result.summary.is_none());
        assert!(result.explanation.is_none());
        assert!(result.issue_json.is_none());
        assert_eq!(
            provider.prompts()[1],
            "FEATURE [feature-doc] How do captions work?"
        );
    }

    #[tokio::test]
    async fn architecture_branch_uses_plain_document() {
        let provider = ScriptedProvider::new(&[
            "System Architecture Explanation",
            "<div class=\"note\">Uploads go to object storage.</div>",
        ]);
        let result = pipeline(provider.clone())
            .generate_response("Where are uploads stored?", &[])
            .await
            .unwrap();

        assert_eq!(result.intent, Intent::SystemArchitectureExplanation);
        assert_eq!(result.response, "Uploads go to object storage.");
        assert_eq!(
            provider.prompts()[1],
            "SYSTEM [<div class=\"arch\">arch-doc</div>] Where are uploads stored?"
        );
    }

    #[tokio::test]
    async fn lowercase_label_falls_back_to_general_branch() {
        let provider = ScriptedProvider::new(&["technical issue", "Kairos edits videos."]);
        let result = pipeline(provider.clone())
            .generate_response("My export keeps failing", &[])
            .await
            .unwrap();

        assert_eq!(result.intent, Intent::GeneralInquiry);
        assert_eq!(result.response, "Kairos edits videos.");
        assert!(result.issue_json.is_none());

        let prompts = provider.prompts();
        assert_eq!(prompts.len(), 2);
        assert_eq!(prompts[1], "GENERAL [kairos-info-doc] My export keeps failing");
    }

    #[tokio::test]
    async fn history_is_folded_into_every_prompt() {
        let provider = ScriptedProvider::new(&["General Inquiry", "Sure."]);
        let history = vec![
            Message::assistant("Hi there!"),
            Message::user("What is Kairos?"),
            Message::assistant("A video tool."),
        ];
        pipeline(provider.clone())
            .generate_response("Is it free?", &history)
            .await
            .unwrap();

        let expected_inquiry = build_inquiry("Is it free?", &history);
        let prompts = provider.prompts();
        assert_eq!(prompts[0], format!("CLASSIFY: {expected_inquiry}"));
        assert!(prompts[1].ends_with(&expected_inquiry));
    }

    #[tokio::test]
    async fn missing_credential_fails_before_any_call() {
        let provider = ScriptedProvider::unconfigured();
        let err = pipeline(provider.clone())
            .generate_response("hello", &[])
            .await
            .unwrap_err();

        assert!(matches!(err, PipelineError::Configuration(_)));
        assert!(err.to_string().contains("MISTRAL_API_KEY"));
        assert!(provider.prompts().is_empty());
    }

    #[tokio::test]
    async fn classification_failure_propagates() {
        let provider = ScriptedProvider::failing_at(&[], "connection refused");
        let err = pipeline(provider.clone())
            .generate_response("hello", &[])
            .await
            .unwrap_err();

        match err {
            PipelineError::Gateway { stage, source } => {
                assert_eq!(stage, "classification");
                assert!(source.to_string().contains("connection refused"));
            }
            other => panic!("expected gateway error, got {other:?}"),
        }
        assert_eq!(provider.prompts().len(), 1);
    }

    #[tokio::test]
    async fn branch_failure_is_not_retried() {
        let provider = ScriptedProvider::failing_at(&["Technical Issue", "{}"], "503 upstream");
        let err = pipeline(provider.clone())
            .generate_response("crash", &[])
            .await
            .unwrap_err();

        assert!(matches!(err, PipelineError::Gateway { stage: "explanation", .. }));
        assert_eq!(provider.prompts().len(), 3);
    }

    #[tokio::test]
    async fn broken_template_is_reported() {
        let resources = Arc::new(
            ResourceSet::from_entries(ResourceName::ALL.map(|name| {
                let text = if name == ResourceName::GeneralQuestionPrompt {
                    "{unknown} {inquiry}"
                } else {
                    "{inquiry}"
                };
                (name, text)
            }))
            .unwrap(),
        );
        let provider = ScriptedProvider::new(&["General Inquiry"]);
        let err = ResponsePipeline::new(provider, resources)
            .generate_response("hi", &[])
            .await
            .unwrap_err();

        assert!(matches!(err, PipelineError::Template(_)));
        assert!(err.to_string().contains("{unknown}"));
    }

    #[test]
    fn result_serializes_with_null_optionals() {
        let result = ResponseResult {
            intent: Intent::GeneralInquiry,
            summary: None,
            explanation: None,
            issue_json: None,
            response: "hello".into(),
        };
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "intent": "General Inquiry",
                "summary": null,
                "explanation": null,
                "issue_json": null,
                "response": "hello"
            })
        );
    }
}
