use serde_json::Value;

/// Ordered JSON-pointer rules used to pull the text out of the response
/// bodies of the generic LLM endpoint. Earlier rules win.
pub const GENERIC_LLM_TEXT_RULES: &[&str] = &["/tailoredText", "/text", "/response", "/content"];

/// Same idea for the Exa `/contents` endpoint and its known variants.
pub const EXA_TEXT_RULES: &[&str] = &[
    "/results/0/text",
    "/results/0/content",
    "/data/results/0/text",
    "/text",
    "/content",
];

/// Returns the first non-blank string found by walking `rules` in order.
/// A body that is itself a JSON string is returned as-is.
pub fn first_text(body: &Value, rules: &[&str]) -> Option<String> {
    if let Value::String(text) = body {
        return non_blank(text);
    }

    rules
        .iter()
        .filter_map(|rule| body.pointer(rule))
        .filter_map(Value::as_str)
        .find_map(non_blank)
}

fn non_blank(text: &str) -> Option<String> {
    match text.trim().is_empty() {
        true => None,
        false => Some(text.to_string()),
    }
}
