//! Pulling a JSON object out of a chat-style response.

use serde_json::Value;

use super::ExtractionError;
use crate::sanitize::excerpt;

/// Parses the JSON payload of a service response.
///
/// Models often wrap the answer in a markdown fence or surround it with
/// prose. The body of the first fence wins, whatever its language tag;
/// otherwise the span from the first `{` to the last `}` is used.
pub fn extract_json_payload(response: &str) -> Result<Value, ExtractionError> {
    let trimmed = response.trim();
    if trimmed.is_empty() {
        return Err(ExtractionError::EmptyResponse);
    }

    let candidate = fenced_block(trimmed)
        .or_else(|| braced_span(trimmed))
        .unwrap_or(trimmed);

    match serde_json::from_str(candidate) {
        Ok(value) => Ok(value),
        Err(e) => braced_span(candidate)
            .or_else(|| braced_span(trimmed))
            .filter(|span| *span != candidate)
            .and_then(|span| serde_json::from_str::<Value>(span).ok())
            .ok_or_else(|| {
                ExtractionError::Unparsable(format!("{} in {}", e, excerpt(candidate, 120)))
            }),
    }
}

fn fenced_block(text: &str) -> Option<&str> {
    let body_start = text.find("```")? + "```".len();
    let body_len = text[body_start..].find("```")?;
    let body = strip_language_tag(&text[body_start..body_start + body_len]).trim();
    (!body.is_empty()).then_some(body)
}

/// Drops an info string such as `json`, `JSON` or `javascript` that directly
/// follows the opening fence.
fn strip_language_tag(body: &str) -> &str {
    let tag_len = body
        .find(|c: char| !(c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '+'))
        .unwrap_or(body.len());
    if tag_len == 0 {
        return body;
    }
    let rest = &body[tag_len..];
    match rest.trim_start().chars().next() {
        Some('{') | Some('[') => rest,
        _ => body,
    }
}

fn braced_span(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_plain_json() {
        let value = extract_json_payload(r#"{"skills": []}"#).unwrap();
        assert_eq!(value, json!({"skills": []}));
    }

    #[test]
    fn test_markdown_fence() {
        let response = "Here you go:\n```json\n{\"skills\": [{\"name\": \"SQL\"}]}\n```\nAnything else?";
        let value = extract_json_payload(response).unwrap();
        assert_eq!(value["skills"][0]["name"], "SQL");
    }

    #[test]
    fn test_bare_fence() {
        let response = "```\n{\"skills\": []}\n```";
        assert_eq!(extract_json_payload(response).unwrap(), json!({"skills": []}));
    }

    #[test]
    fn test_uppercase_fence_tag() {
        let response = "```JSON\n{\"skills\": [{\"name\": \"SQL\"}]}\n```";
        let value = extract_json_payload(response).unwrap();
        assert_eq!(value["skills"][0]["name"], "SQL");

        let mixed = "Result:\n```Json\n{\"skills\": []}\n```";
        assert_eq!(extract_json_payload(mixed).unwrap(), json!({"skills": []}));
    }

    #[test]
    fn test_other_language_fence_tag() {
        let response = "Parsed:\n```javascript\n{\"skills\": [\"Excel\"]}\n```\nDone.";
        assert_eq!(
            extract_json_payload(response).unwrap(),
            json!({"skills": ["Excel"]})
        );
    }

    #[test]
    fn test_fence_with_comment_falls_back_to_braces() {
        let response = "```js\n// extracted\n{\"skills\": []}\n```";
        assert_eq!(extract_json_payload(response).unwrap(), json!({"skills": []}));
    }

    #[test]
    fn test_bare_fence_keeps_scalar_body() {
        assert_eq!(extract_json_payload("```\ntrue\n```").unwrap(), json!(true));
    }

    #[test]
    fn test_prose_around_object() {
        let response = "Sure! The result is {\"skills\": [\"Excel\"]} hope this helps.";
        assert_eq!(
            extract_json_payload(response).unwrap(),
            json!({"skills": ["Excel"]})
        );
    }

    #[test]
    fn test_non_object_values_still_parse() {
        assert_eq!(extract_json_payload("[1, 2]").unwrap(), json!([1, 2]));
    }

    #[test]
    fn test_garbage_is_unparsable() {
        assert!(matches!(
            extract_json_payload("I could not find any skills."),
            Err(ExtractionError::Unparsable(_))
        ));
    }

    #[test]
    fn test_blank_is_empty() {
        assert!(matches!(
            extract_json_payload("   \n"),
            Err(ExtractionError::EmptyResponse)
        ));
    }
}
