//! `{placeholder}` substitution for prompt templates.
//!
//! Prompt files follow the `str.format` convention: `{name}` is replaced,
//! `{{` and `}}` are literal braces. Substituted values are inserted as-is and
//! never scanned for placeholders themselves.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TemplateError {
    #[error("template {template}: unknown placeholder {{{placeholder}}}")]
    UnknownPlaceholder {
        template: String,
        placeholder: String,
    },
    #[error("template {template}: unbalanced '{brace}' at byte {offset}")]
    UnbalancedBrace {
        template: String,
        brace: char,
        offset: usize,
    },
}

/// Render `source` by substituting each `{name}` with its value from `values`.
///
/// `template` is only used to label errors.
pub fn render(
    template: &str,
    source: &str,
    values: &[(&str, &str)],
) -> Result<String, TemplateError> {
    let mut out = String::with_capacity(source.len());
    let mut rest = source;
    let mut offset = 0;

    while let Some(pos) = rest.find(['{', '}']) {
        out.push_str(&rest[..pos]);
        let brace = rest[pos..].chars().next().unwrap_or('{');
        let after = &rest[pos + 1..];

        if after.starts_with(brace) {
            out.push(brace);
            rest = &after[1..];
            offset += pos + 2;
            continue;
        }

        if brace == '}' {
            return Err(TemplateError::UnbalancedBrace {
                template: template.to_string(),
                brace,
                offset: offset + pos,
            });
        }

        let Some(close) = after.find('}') else {
            return Err(TemplateError::UnbalancedBrace {
                template: template.to_string(),
                brace,
                offset: offset + pos,
            });
        };

        let key = &after[..close];
        let value = values
            .iter()
            .find(|(name, _)| *name == key)
            .map(|(_, value)| *value)
            .ok_or_else(|| TemplateError::UnknownPlaceholder {
                template: template.to_string(),
                placeholder: key.to_string(),
            })?;
        out.push_str(value);

        rest = &after[close + 1..];
        offset += pos + close + 2;
    }

    out.push_str(rest);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn substitutes_every_occurrence() {
        let out = render("t", "{a} and {a} then {b}", &[("a", "x"), ("b", "y")]).unwrap();
        assert_eq!(out, "x and x then y");
    }

    #[test]
    fn doubled_braces_are_literal() {
        let out = render("t", r#"{{"issue_type": "..."}} for {inquiry}"#, &[("inquiry", "q")])
            .unwrap();
        assert_eq!(out, r#"{"issue_type": "..."} for q"#);
    }

    #[test]
    fn values_are_not_rescanned() {
        let out = render("t", "{inquiry}", &[("inquiry", "{kairos_info} }{")]).unwrap();
        assert_eq!(out, "{kairos_info} }{");
    }

    #[test]
    fn unused_values_are_ignored() {
        let out = render("t", "plain text", &[("inquiry", "q")]).unwrap();
        assert_eq!(out, "plain text");
    }

    #[test]
    fn unknown_placeholder_is_an_error() {
        let err = render("prompts/x.txt", "{missing}", &[("inquiry", "q")]).unwrap_err();
        assert_eq!(
            err,
            TemplateError::UnknownPlaceholder {
                template: "prompts/x.txt".into(),
                placeholder: "missing".into(),
            }
        );
        assert!(err.to_string().contains("{missing}"));
    }

    #[test]
    fn lone_closing_brace_is_an_error() {
        let err = render("t", "ab}c", &[]).unwrap_err();
        assert!(matches!(
            err,
            TemplateError::UnbalancedBrace { brace: '}', offset: 2, .. }
        ));
    }

    #[test]
    fn unclosed_opening_brace_is_an_error() {
        let err = render("t", "{{ok}} {never", &[]).unwrap_err();
        assert!(matches!(
            err,
            TemplateError::UnbalancedBrace { brace: '{', offset: 7, .. }
        ));
    }

    #[test]
    fn handles_multibyte_text_around_placeholders() {
        let out = render("t", "é {inquiry} ü", &[("inquiry", "ß")]).unwrap();
        assert_eq!(out, "é ß ü");
    }
}
