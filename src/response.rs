use serde_json::Value;

const FENCE: &str = "```";

/// Pulls the JSON payload out of a model reply.
///
/// Handles replies wrapped in a markdown fence (with or without a language
/// tag, with or without the closing fence) and replies with prose around a
/// bare object. Falls back to the trimmed text.
pub fn extract_json_block(text: &str) -> &str {
    let trimmed = text.trim();
    let body = match fenced_body(trimmed) {
        Some(body) if !body.is_empty() => body,
        _ => trimmed,
    };
    if body.starts_with('{') || body.starts_with('[') {
        return body;
    }
    outer_object(body).unwrap_or(body)
}

fn fenced_body(text: &str) -> Option<&str> {
    let open = text.find(FENCE)?;
    let after_ticks = &text[open + FENCE.len()..];
    // Skip the info string ("json", "JSON ", ...) up to the end of its line.
    let content_start = match after_ticks.find('\n') {
        Some(nl) if !after_ticks[..nl].contains('{') => nl + 1,
        _ => after_ticks
            .find(|c: char| !c.is_ascii_alphanumeric())
            .unwrap_or(after_ticks.len()),
    };
    let content = &after_ticks[content_start..];
    let end = content.find(FENCE).unwrap_or(content.len());
    Some(content[..end].trim())
}

fn outer_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}

/// A model reply that parsed as JSON.
#[derive(Debug, Clone)]
pub struct Reply<'a> {
    /// The JSON text with any fence removed.
    pub json: &'a str,
    pub value: Value,
}

/// Parses a model reply into JSON after removing any fence around it.
pub fn parse_reply(text: &str) -> Result<Reply<'_>, serde_json::Error> {
    let json = extract_json_block(text);
    let value = serde_json::from_str(json)?;
    Ok(Reply { json, value })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_json_passes_through() {
        assert_eq!(extract_json_block("  {\"a\": 1}\n"), "{\"a\": 1}");
    }

    #[test]
    fn fenced_with_language_tag() {
        let text = "```json\n{\"a\": 1}\n```";
        assert_eq!(extract_json_block(text), "{\"a\": 1}");
    }

    #[test]
    fn fenced_without_tag_and_with_prose() {
        let text = "Here you go:\n```\n{\"a\": 1}\n```\nLet me know.";
        assert_eq!(extract_json_block(text), "{\"a\": 1}");
    }

    #[test]
    fn missing_closing_fence() {
        let text = "```JSON\n{\"a\": 1}\n";
        assert_eq!(extract_json_block(text), "{\"a\": 1}");
    }

    #[test]
    fn fence_on_same_line_as_object() {
        let text = "```json{\"a\": 1}```";
        assert_eq!(extract_json_block(text), "{\"a\": 1}");
    }

    #[test]
    fn prose_around_bare_object() {
        let text = "Sure! {\"a\": {\"b\": 2}} hope that helps";
        assert_eq!(extract_json_block(text), "{\"a\": {\"b\": 2}}");
    }

    #[test]
    fn keys_ending_in_json_survive() {
        let text = "{\"format\": \"json\"}";
        let reply = parse_reply(text).expect("valid json");
        assert_eq!(reply.value["format"], "json");
    }

    #[test]
    fn reply_keeps_unfenced_text() {
        let reply = parse_reply("```json\n{\"a\": 1, \"a\": 2}\n```").expect("valid json");
        assert_eq!(reply.json, "{\"a\": 1, \"a\": 2}");
    }

    #[test]
    fn garbage_fails_to_parse() {
        assert!(parse_reply("I could not read the image.").is_err());
        assert!(parse_reply("```json\n{\"a\": \n```").is_err());
    }
}
