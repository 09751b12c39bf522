//! Provider subsystem for model inference backends.
//!
//! Every supported backend speaks the OpenAI-compatible chat completions API,
//! so the factory only decides base URL, credential and display name. See
//! [`create_provider`] for the accepted provider ids.

pub mod compatible;
pub mod traits;

pub use compatible::OpenAiCompatibleProvider;
pub use traits::Provider;

use crate::config::Config;
use std::time::Duration;

const MAX_API_ERROR_CHARS: usize = 200;

const MISTRAL_BASE_URL: &str = "https://api.mistral.ai/v1";
const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

/// Per-request settings shared by every provider.
#[derive(Debug, Clone)]
pub struct ProviderRuntimeOptions {
    pub model: String,
    pub temperature: Option<f64>,
    pub timeout_secs: u64,
}

impl Default for ProviderRuntimeOptions {
    fn default() -> Self {
        Self {
            model: crate::config::DEFAULT_MODEL.to_string(),
            temperature: None,
            timeout_secs: 120,
        }
    }
}

fn is_secret_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | ':')
}

fn token_end(input: &str, from: usize) -> usize {
    let mut end = from;
    for (i, c) in input[from..].char_indices() {
        if is_secret_char(c) {
            end = from + i + c.len_utf8();
        } else {
            break;
        }
    }
    end
}

/// Scrub known secret-like token prefixes from provider error strings.
///
/// Redacts tokens with prefixes like `sk-`, `xoxb-`, `ghp_` and `github_pat_`.
pub fn scrub_secret_patterns(input: &str) -> String {
    const PREFIXES: [&str; 7] = [
        "sk-",
        "xoxb-",
        "xoxp-",
        "ghp_",
        "gho_",
        "ghu_",
        "github_pat_",
    ];

    let mut scrubbed = input.to_string();

    for prefix in PREFIXES {
        let mut search_from = 0;
        loop {
            let Some(rel) = scrubbed[search_from..].find(prefix) else {
                break;
            };

            let start = search_from + rel;
            let content_start = start + prefix.len();
            let end = token_end(&scrubbed, content_start);

            if end == content_start {
                search_from = content_start;
                continue;
            }

            scrubbed.replace_range(start..end, "[REDACTED]");
            search_from = start + "[REDACTED]".len();
        }
    }

    scrubbed
}

/// Sanitize API error text by scrubbing secrets and truncating length.
pub fn sanitize_api_error(input: &str) -> String {
    let scrubbed = scrub_secret_patterns(input);

    if scrubbed.chars().count() <= MAX_API_ERROR_CHARS {
        return scrubbed;
    }

    let mut end = MAX_API_ERROR_CHARS;
    while end > 0 && !scrubbed.is_char_boundary(end) {
        end -= 1;
    }

    format!("{}...", &scrubbed[..end])
}

/// Build a sanitized provider error from a failed HTTP response.
pub async fn api_error(provider: &str, response: reqwest::Response) -> anyhow::Error {
    let status = response.status();
    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "<failed to read provider error body>".to_string());
    let sanitized = sanitize_api_error(&body);
    anyhow::anyhow!("{provider} API error ({status}): {sanitized}")
}

/// Env var that holds the credential for a provider id.
pub fn credential_env_var(name: &str) -> &'static str {
    match name {
        "mistral" => "MISTRAL_API_KEY",
        "openai" => "OPENAI_API_KEY",
        _ => "KAIROS_API_KEY",
    }
}

/// Resolve API key for a provider from config and environment variables.
fn resolve_provider_credential(name: &str, credential_override: Option<&str>) -> Option<String> {
    if let Some(raw_override) = credential_override {
        let trimmed_override = raw_override.trim();
        if !trimmed_override.is_empty() {
            return Some(trimmed_override.to_owned());
        }
    }

    let provider_env = credential_env_var(name);
    for env_var in [provider_env, "KAIROS_API_KEY", "API_KEY"] {
        if let Ok(value) = std::env::var(env_var) {
            let value = value.trim();
            if !value.is_empty() {
                return Some(value.to_string());
            }
        }
    }

    None
}

/// Factory: create the provider `name` with optional key and base URL override.
///
/// Accepted ids: `mistral`, `openai`, and `custom:<url>` for any other
/// OpenAI-compatible endpoint.
pub fn create_provider(
    name: &str,
    api_key: Option<&str>,
    api_url: Option<&str>,
    options: &ProviderRuntimeOptions,
) -> anyhow::Result<Box<dyn Provider>> {
    let name = name.trim();
    let (display_name, default_url) = if let Some(url) = name.strip_prefix("custom:") {
        if url.trim().is_empty() {
            anyhow::bail!("Custom provider requires a URL, e.g. custom:https://llm.example.com/v1");
        }
        ("custom", url.trim())
    } else {
        match name {
            "mistral" => ("Mistral", MISTRAL_BASE_URL),
            "openai" => ("OpenAI", OPENAI_BASE_URL),
            _ => anyhow::bail!(
                "Unknown provider: {name}. Supported: mistral, openai, custom:<URL>."
            ),
        }
    };

    let credential_key = if display_name == "custom" { "custom" } else { name };
    let key = resolve_provider_credential(credential_key, api_key);
    let base_url = api_url
        .map(str::trim)
        .filter(|url| !url.is_empty())
        .unwrap_or(default_url);

    let provider = OpenAiCompatibleProvider::new(
        display_name,
        base_url,
        key.as_deref(),
        credential_env_var(credential_key),
        &options.model,
    )
    .with_temperature(options.temperature)
    .with_timeout(Duration::from_secs(options.timeout_secs));

    Ok(Box::new(provider))
}

/// Create the provider selected by `config`.
pub fn create_provider_from_config(config: &Config) -> anyhow::Result<Box<dyn Provider>> {
    let options = ProviderRuntimeOptions {
        model: config.default_model.clone(),
        temperature: config.temperature,
        timeout_secs: config.provider_timeout_secs,
    };
    create_provider(
        &config.default_provider,
        config.api_key.as_deref(),
        config.api_url.as_deref(),
        &options,
    )
}

/// Information about a supported provider for display purposes.
pub struct ProviderInfo {
    /// Canonical name used in config (e.g. `"mistral"`)
    pub name: &'static str,
    /// Human-readable display name
    pub display_name: &'static str,
    pub default_url: &'static str,
    pub credential_env: &'static str,
}

/// Return the list of all known providers for display in `kairos providers`.
pub fn list_providers() -> Vec<ProviderInfo> {
    vec![
        ProviderInfo {
            name: "mistral",
            display_name: "Mistral",
            default_url: MISTRAL_BASE_URL,
            credential_env: credential_env_var("mistral"),
        },
        ProviderInfo {
            name: "openai",
            display_name: "OpenAI",
            default_url: OPENAI_BASE_URL,
            credential_env: credential_env_var("openai"),
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options() -> ProviderRuntimeOptions {
        ProviderRuntimeOptions::default()
    }

    #[test]
    fn factory_mistral() {
        let p = create_provider("mistral", Some("provider-test-credential"), None, &options())
            .unwrap();
        assert_eq!(p.name(), "Mistral");
        assert_eq!(p.model(), crate::config::DEFAULT_MODEL);
        assert!(p.missing_credential().is_none());
    }

    #[test]
    fn factory_openai() {
        assert!(create_provider("openai", Some("provider-test-credential"), None, &options()).is_ok());
    }

    #[test]
    fn factory_custom_url() {
        let p = create_provider(
            "custom:https://llm.internal.example/v1",
            Some("k"),
            None,
            &options(),
        )
        .unwrap();
        assert_eq!(p.name(), "custom");
    }

    #[test]
    fn factory_custom_without_url_errors() {
        let err = create_provider("custom:", Some("k"), None, &options())
            .err()
            .unwrap();
        assert!(err.to_string().contains("requires a URL"));
    }

    #[test]
    fn factory_unknown_provider_errors() {
        let p = create_provider("nonexistent", None, None, &options());
        assert!(p.is_err());
        let msg = p.err().unwrap().to_string();
        assert!(msg.contains("Unknown provider"));
    }

    #[test]
    fn factory_empty_name_errors() {
        assert!(create_provider("", None, None, &options()).is_err());
    }

    #[test]
    fn factory_uses_model_from_options() {
        let opts = ProviderRuntimeOptions {
            model: "open-mistral-nemo".into(),
            ..options()
        };
        let p = create_provider("mistral", Some("k"), None, &opts).unwrap();
        assert_eq!(p.model(), "open-mistral-nemo");
    }

    #[test]
    fn listed_providers_are_constructible() {
        for provider in list_providers() {
            assert!(
                create_provider(provider.name, Some("provider-test-credential"), None, &options())
                    .is_ok(),
                "Canonical provider id should be constructible: {}",
                provider.name
            );
        }
    }

    #[test]
    fn credential_env_vars_per_provider() {
        assert_eq!(credential_env_var("mistral"), "MISTRAL_API_KEY");
        assert_eq!(credential_env_var("openai"), "OPENAI_API_KEY");
        assert_eq!(credential_env_var("custom"), "KAIROS_API_KEY");
    }

    // ── API error sanitization ───────────────────────────────

    #[test]
    fn sanitize_scrubs_sk_prefix() {
        let input = "request failed: sk-1234567890abcdef";
        let out = sanitize_api_error(input);
        assert!(!out.contains("sk-1234567890abcdef"));
        assert!(out.contains("[REDACTED]"));
    }

    #[test]
    fn sanitize_scrubs_multiple_prefixes() {
        let input = "keys sk-abcdef xoxb-12345 xoxp-67890";
        let out = sanitize_api_error(input);
        assert!(!out.contains("sk-abcdef"));
        assert!(!out.contains("xoxb-12345"));
        assert!(!out.contains("xoxp-67890"));
    }

    #[test]
    fn sanitize_truncates_long_error() {
        let long = "a".repeat(400);
        let result = sanitize_api_error(&long);
        assert!(result.len() <= 203);
        assert!(result.ends_with("..."));
    }

    #[test]
    fn sanitize_no_secret_no_change() {
        let input = "simple upstream timeout";
        let result = sanitize_api_error(input);
        assert_eq!(result, input);
    }

    #[test]
    fn resolve_provider_credential_prefers_explicit_argument() {
        let resolved = resolve_provider_credential("mistral", Some("  explicit-key  "));
        assert_eq!(resolved, Some("explicit-key".to_string()));
    }
}
