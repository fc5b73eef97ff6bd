//! Response parsing.
//!
//! Models wrap JSON in prose or Markdown fences more often than not. The
//! helpers here pull the payload out and apply the configured
//! [`ParsePolicy`] when nothing usable is found.

use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use regex::Regex;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{AgentError, AgentResult};
use crate::roles::AgentRole;

/// How to treat a structured response that does not match its schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParsePolicy {
    /// Raise [`AgentError::MalformedResponse`]
    Strict,
    /// Substitute the call-site fallback and log a warning
    #[default]
    Lenient,
}

impl FromStr for ParsePolicy {
    type Err = AgentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "strict" => Ok(Self::Strict),
            "lenient" => Ok(Self::Lenient),
            other => Err(AgentError::malformed(
                "config",
                format!("unknown parse policy '{}'", other),
            )),
        }
    }
}

impl fmt::Display for ParsePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Strict => write!(f, "strict"),
            Self::Lenient => write!(f, "lenient"),
        }
    }
}

/// A parsed value and whether it came from the fallback.
#[derive(Debug, Clone, PartialEq)]
pub struct Parsed<T> {
    pub value: T,
    pub degraded: bool,
}

fn fence_regex() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)```[A-Za-z0-9_+-]*[ \t]*\r?\n(.*?)\r?\n?```").ok())
        .as_ref()
}

/// Locate the JSON object in a model response.
///
/// Prefers the first fenced block whose body starts with `{`, then falls
/// back to the span between the first `{` and the last `}`.
pub fn extract_json(raw: &str) -> Option<&str> {
    if let Some(re) = fence_regex() {
        for caps in re.captures_iter(raw) {
            if let Some(body) = caps.get(1) {
                let body = body.as_str().trim();
                if body.starts_with('{') {
                    return Some(body);
                }
            }
        }
    }

    let start = raw.find('{')?;
    let end = raw.rfind('}')?;
    (end > start).then(|| &raw[start..=end])
}

/// Unwrap a Markdown-fenced code response; unfenced text is only trimmed.
pub fn strip_code_fences(raw: &str) -> String {
    let trimmed = raw.trim();
    if !trimmed.starts_with("```") {
        return trimmed.to_string();
    }
    match fence_regex()
        .and_then(|re| re.captures(trimmed))
        .and_then(|c| c.get(1))
    {
        Some(body) => body.as_str().to_string(),
        None => trimmed
            .trim_start_matches("```")
            .trim_end_matches("```")
            .trim()
            .to_string(),
    }
}

/// Parse a structured response under `policy`.
pub fn parse_structured<T, F>(
    role: AgentRole,
    raw: &str,
    policy: ParsePolicy,
    fallback: F,
) -> AgentResult<Parsed<T>>
where
    T: DeserializeOwned,
    F: FnOnce() -> T,
{
    let attempt = match extract_json(raw) {
        Some(json) => serde_json::from_str::<T>(json).map_err(|e| e.to_string()),
        None if raw.trim().is_empty() => Err("empty response".to_string()),
        None => Err("no JSON object found".to_string()),
    };

    match (attempt, policy) {
        (Ok(value), _) => Ok(Parsed {
            value,
            degraded: false,
        }),
        (Err(message), ParsePolicy::Strict) => Err(AgentError::malformed(role.as_str(), message)),
        (Err(message), ParsePolicy::Lenient) => {
            warn!(%role, "Malformed response, using fallback: {}", message);
            Ok(Parsed {
                value: fallback(),
                degraded: true,
            })
        }
    }
}

/// Free-text responses. Empty text is never malformed: it marks the value
/// as degraded and the caller decides what an empty answer means.
pub fn parse_text(raw: &str) -> Parsed<String> {
    let text = strip_code_fences(raw);
    let degraded = text.is_empty();
    Parsed {
        value: text,
        degraded,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use neural_core::Plan;

    #[test]
    fn test_extract_fenced_json() {
        let raw = "Here you go:\n```json\n{\"files\": [\"a.ts\"]}\n```\nEnjoy!";
        assert_eq!(extract_json(raw), Some("{\"files\": [\"a.ts\"]}"));
    }

    #[test]
    fn test_extract_bare_json() {
        let raw = "Sure. {\"a\": {\"b\": 1}} done";
        assert_eq!(extract_json(raw), Some("{\"a\": {\"b\": 1}}"));
        assert_eq!(extract_json("no json here"), None);
    }

    #[test]
    fn test_strip_code_fences() {
        assert_eq!(
            strip_code_fences("```tsx\nexport default App;\n```"),
            "export default App;"
        );
        assert_eq!(strip_code_fences("  plain  "), "plain");
    }

    #[test]
    fn test_lenient_uses_fallback() {
        let parsed: Parsed<Plan> =
            parse_structured(AgentRole::Planner, "garbage", ParsePolicy::Lenient, Plan::fallback)
                .unwrap();
        assert!(parsed.degraded);
        assert_eq!(parsed.value, Plan::fallback());
    }

    #[test]
    fn test_strict_raises() {
        let result: AgentResult<Parsed<Plan>> =
            parse_structured(AgentRole::Planner, "", ParsePolicy::Strict, Plan::fallback);
        assert!(matches!(
            result,
            Err(AgentError::MalformedResponse { ref stage, .. }) if stage == "planner"
        ));
    }

    #[test]
    fn test_wrong_shape_is_malformed() {
        let result: AgentResult<Parsed<Plan>> = parse_structured(
            AgentRole::Planner,
            "{\"files\": 3}",
            ParsePolicy::Strict,
            Plan::fallback,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_policy_from_str() {
        assert_eq!("STRICT".parse::<ParsePolicy>().unwrap(), ParsePolicy::Strict);
        assert_eq!("lenient".parse::<ParsePolicy>().unwrap(), ParsePolicy::Lenient);
        assert!("loose".parse::<ParsePolicy>().is_err());
    }

    #[test]
    fn test_parse_text_marks_empty_as_degraded() {
        let parsed = parse_text("  ");
        assert!(parsed.degraded);
        assert_eq!(parsed.value, "");

        let parsed = parse_text("```ts\nexport {};\n```");
        assert!(!parsed.degraded);
        assert_eq!(parsed.value, "export {};");
    }
}
