//! Prompt templates and reference documents.
//!
//! The resource set is read from disk once at startup and never mutated
//! afterwards. The pipeline receives it behind an `Arc` and only borrows text
//! out of it, so no locking is involved.
//!
//! Layout under the resources directory:
//!
//! ```text
//! prompts/classification.txt
//! prompts/issue_extraction.txt
//! prompts/feature_question.txt
//! prompts/system_question.txt
//! prompts/general_question.txt
//! documents/kairos_info.txt
//! documents/feature_breakdown.txt
//! documents/system_architecture.txt
//! ```

pub mod template;

pub use template::{render, TemplateError};

use anyhow::{Context, Result};
use std::collections::HashMap;
use std::fmt;
use std::path::Path;

/// Every named resource the support pipeline depends on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceName {
    ClassificationPrompt,
    IssueExtractionPrompt,
    FeatureQuestionPrompt,
    SystemQuestionPrompt,
    GeneralQuestionPrompt,
    KairosInfo,
    FeatureBreakdown,
    SystemArchitecture,
}

impl ResourceName {
    pub const ALL: [ResourceName; 8] = [
        ResourceName::ClassificationPrompt,
        ResourceName::IssueExtractionPrompt,
        ResourceName::FeatureQuestionPrompt,
        ResourceName::SystemQuestionPrompt,
        ResourceName::GeneralQuestionPrompt,
        ResourceName::KairosInfo,
        ResourceName::FeatureBreakdown,
        ResourceName::SystemArchitecture,
    ];

    /// Path of the resource relative to the resources directory.
    pub fn relative_path(self) -> &'static str {
        match self {
            Self::ClassificationPrompt => "prompts/classification.txt",
            Self::IssueExtractionPrompt => "prompts/issue_extraction.txt",
            Self::FeatureQuestionPrompt => "prompts/feature_question.txt",
            Self::SystemQuestionPrompt => "prompts/system_question.txt",
            Self::GeneralQuestionPrompt => "prompts/general_question.txt",
            Self::KairosInfo => "documents/kairos_info.txt",
            Self::FeatureBreakdown => "documents/feature_breakdown.txt",
            Self::SystemArchitecture => "documents/system_architecture.txt",
        }
    }
}

impl fmt::Display for ResourceName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.relative_path())
    }
}

/// Immutable map of resource name to file contents.
#[derive(Debug, Clone)]
pub struct ResourceSet {
    entries: HashMap<ResourceName, String>,
}

impl ResourceSet {
    /// Read all resources from `dir`. Fails on the first missing or unreadable file.
    pub fn load(dir: &Path) -> Result<Self> {
        let mut entries = HashMap::with_capacity(ResourceName::ALL.len());
        for name in ResourceName::ALL {
            let path = dir.join(name.relative_path());
            let text = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read resource {}", path.display()))?;
            entries.insert(name, text);
        }

        tracing::info!(
            dir = %dir.display(),
            count = entries.len(),
            "Loaded prompt templates and reference documents"
        );
        Ok(Self { entries })
    }

    /// Build a set from in-memory text. Every name in [`ResourceName::ALL`] must be present.
    pub fn from_entries<I, S>(entries: I) -> Result<Self>
    where
        I: IntoIterator<Item = (ResourceName, S)>,
        S: Into<String>,
    {
        let entries: HashMap<ResourceName, String> = entries
            .into_iter()
            .map(|(name, text)| (name, text.into()))
            .collect();

        if let Some(missing) = ResourceName::ALL
            .iter()
            .find(|name| !entries.contains_key(name))
        {
            anyhow::bail!("Missing resource: {missing}");
        }

        Ok(Self { entries })
    }

    pub fn text(&self, name: ResourceName) -> &str {
        // Construction guarantees every name is present.
        self.entries.get(&name).map_or("", String::as_str)
    }

    /// Render the template `name` with the given placeholder values.
    pub fn render(
        &self,
        name: ResourceName,
        values: &[(&str, &str)],
    ) -> Result<String, TemplateError> {
        render(name.relative_path(), self.text(name), values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write_all(dir: &Path) {
        for name in ResourceName::ALL {
            let path = dir.join(name.relative_path());
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(&path, format!("contents of {name}")).unwrap();
        }
    }

    #[test]
    fn load_reads_every_resource() {
        let tmp = tempfile::tempdir().unwrap();
        write_all(tmp.path());

        let set = ResourceSet::load(tmp.path()).unwrap();
        assert_eq!(
            set.text(ResourceName::SystemArchitecture),
            "contents of documents/system_architecture.txt"
        );
        assert_eq!(
            set.text(ResourceName::ClassificationPrompt),
            "contents of prompts/classification.txt"
        );
    }

    #[test]
    fn load_fails_naming_missing_file() {
        let tmp = tempfile::tempdir().unwrap();
        write_all(tmp.path());
        fs::remove_file(tmp.path().join("documents/kairos_info.txt")).unwrap();

        let err = ResourceSet::load(tmp.path()).unwrap_err();
        assert!(format!("{err:#}").contains("kairos_info.txt"));
    }

    #[test]
    fn from_entries_requires_every_name() {
        let partial = [(ResourceName::KairosInfo, "info")];
        let err = ResourceSet::from_entries(partial).unwrap_err();
        assert!(err.to_string().contains("Missing resource"));
    }

    #[test]
    fn render_substitutes_named_values() {
        let set = ResourceSet::from_entries(
            ResourceName::ALL.map(|n| (n, "Q: {inquiry}".to_string())),
        )
        .unwrap();
        let out = set
            .render(ResourceName::GeneralQuestionPrompt, &[("inquiry", "hi")])
            .unwrap();
        assert_eq!(out, "Q: hi");
    }

    #[test]
    fn bundled_resources_load_and_render() {
        let dir = Path::new(env!("CARGO_MANIFEST_DIR")).join("resources");
        let set = ResourceSet::load(&dir).unwrap();

        let inquiry = [("inquiry", "How do I export?")];
        set.render(ResourceName::ClassificationPrompt, &inquiry)
            .unwrap();
        set.render(ResourceName::IssueExtractionPrompt, &inquiry)
            .unwrap();
        set.render(
            ResourceName::FeatureQuestionPrompt,
            &[("inquiry", "q"), ("feature_breakdown", "f")],
        )
        .unwrap();
        set.render(
            ResourceName::SystemQuestionPrompt,
            &[("inquiry", "q"), ("system_archi", "s")],
        )
        .unwrap();
        set.render(
            ResourceName::GeneralQuestionPrompt,
            &[("inquiry", "q"), ("kairos_info", "k")],
        )
        .unwrap();
    }
}
