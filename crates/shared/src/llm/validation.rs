use jsonschema::JSONSchema;
use serde_json::Value;
use std::sync::LazyLock;
use thiserror::Error;

use super::contracts::{Feedback, FeedbackContract, feedback_schema};

#[derive(Debug, Error)]
pub enum FeedbackParseError {
    #[error("evaluator output was empty")]
    Empty,
    #[error("evaluator output is not valid json: {0}")]
    InvalidJson(#[from] serde_json::Error),
    #[error("feedback schema failed to compile: {0}")]
    SchemaCompile(String),
    #[error("evaluator output failed schema validation: {errors:?}")]
    SchemaViolation { errors: Vec<String> },
}

static FEEDBACK_VALIDATOR: LazyLock<Result<JSONSchema, String>> = LazyLock::new(|| {
    JSONSchema::compile(&feedback_schema()).map_err(|err| err.to_string())
});

/// Pulls the JSON payload out of model text.
///
/// Candidates in order: fenced blocks tagged `json` (any case), other fenced
/// blocks, the whole text, the outermost `{...}` span. The first candidate
/// that parses wins; otherwise the first fenced or brace candidate is
/// returned so the caller sees the parse error.
pub fn extract_json_block(raw: &str) -> Option<&str> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }

    let fences = fenced_blocks(trimmed);
    let (json_fences, other_fences): (Vec<_>, Vec<_>) = fences
        .iter()
        .partition(|fence| fence.info.eq_ignore_ascii_case("json"));
    let brace = brace_span(trimmed);

    let candidates = json_fences
        .iter()
        .chain(other_fences.iter())
        .map(|fence| fence.body)
        .chain([trimmed])
        .chain(brace);
    for candidate in candidates {
        if serde_json::from_str::<Value>(candidate).is_ok() {
            return Some(candidate);
        }
    }

    fences.first().map(|fence| fence.body).or(brace)
}

pub fn parse_feedback(raw: &str) -> Result<Feedback, FeedbackParseError> {
    let json = extract_json_block(raw).ok_or(FeedbackParseError::Empty)?;
    let payload: Value = serde_json::from_str(json)?;

    let validator = FEEDBACK_VALIDATOR
        .as_ref()
        .map_err(|message| FeedbackParseError::SchemaCompile(message.clone()))?;
    if let Err(validation_errors) = validator.validate(&payload) {
        let errors = validation_errors
            .map(|err| err.to_string())
            .collect::<Vec<_>>();
        return Err(FeedbackParseError::SchemaViolation { errors });
    }

    let contract: FeedbackContract = serde_json::from_value(payload)?;
    Ok(contract.into())
}

struct Fence<'a> {
    info: &'a str,
    body: &'a str,
}

/// Every closed ```` ``` ```` block; the info string runs to the end of the
/// opening line.
fn fenced_blocks(text: &str) -> Vec<Fence<'_>> {
    let mut fences = Vec::new();
    let mut rest = text;

    while let Some(open) = rest.find("```") {
        let after_open = &rest[open + 3..];
        let line_end = after_open.find('\n').unwrap_or(after_open.len());
        let (info, content) = match after_open[..line_end].find("```") {
            // Single-line fence: no info string.
            Some(_) => ("", after_open),
            None => (
                after_open[..line_end].trim(),
                after_open.get(line_end + 1..).unwrap_or_default(),
            ),
        };
        let Some(close) = content.find("```") else {
            break;
        };

        let body = content[..close].trim();
        if !body.is_empty() {
            fences.push(Fence { info, body });
        }
        rest = &content[close + 3..];
    }

    fences
}

fn brace_span(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}
