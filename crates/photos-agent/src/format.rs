//! Parsing the model's final answer.
//!
//! The answer must be a JSON array of storage reference strings. Models
//! sometimes wrap it in a markdown code fence, which is stripped first.

use crate::error::{AgentError, Result};
use crate::pipeline::dedup_ordered;

/// Longest answer excerpt carried in an error.
const EXCERPT_LEN: usize = 120;

/// Parse the final answer into an ordered, de-duplicated list.
pub fn parse_final_answer(text: &str) -> Result<Vec<String>> {
    let body = strip_fence(text.trim());
    let items: Vec<String> = serde_json::from_str(body).map_err(|e| {
        let excerpt: String = body.chars().take(EXCERPT_LEN).collect();
        AgentError::MalformedAnswer(format!("{e}: {excerpt}"))
    })?;
    Ok(dedup_ordered(items))
}

fn strip_fence(text: &str) -> &str {
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    // Drop the info string (`json`) on the opening line.
    let rest = match rest.find('\n') {
        Some(newline) => &rest[newline + 1..],
        None => rest,
    };
    rest.trim_end().strip_suffix("```").unwrap_or(rest).trim()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_array() {
        let parsed = parse_final_answer(r#"["gs://b/1.jpg", "gs://b/2.jpg"]"#).unwrap();
        assert_eq!(parsed, ["gs://b/1.jpg", "gs://b/2.jpg"]);
    }

    #[test]
    fn test_empty_array() {
        assert!(parse_final_answer("[]").unwrap().is_empty());
        assert!(parse_final_answer("  []\n").unwrap().is_empty());
    }

    #[test]
    fn test_fenced_array() {
        let text = "```json\n[\"gs://b/1.jpg\", \"gs://b/1.jpg\"]\n```";
        assert_eq!(parse_final_answer(text).unwrap(), ["gs://b/1.jpg"]);
        assert_eq!(parse_final_answer("```\n[]\n```").unwrap(), Vec::<String>::new());
    }

    #[test]
    fn test_prose_is_rejected() {
        for text in [
            "Here are your photos: [\"gs://b/1.jpg\"]",
            "{\"photos\": []}",
            "[1, 2]",
            "",
        ] {
            let err = parse_final_answer(text).unwrap_err();
            assert!(matches!(err, AgentError::MalformedAnswer(_)), "{text}");
        }
    }
}
