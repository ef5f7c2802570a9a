//! Recovering structured payloads from free-form model output.

use serde_json::{Map, Value};

/// The first well-formed JSON object embedded anywhere in `raw`.
///
/// Tolerates code fences, leading commentary and trailing text. Arrays and
/// scalars are skipped; only an object is returned.
pub fn extract_json_object(raw: &str) -> Option<Map<String, Value>> {
    for (start, _) in raw.match_indices('{') {
        let mut stream = serde_json::Deserializer::from_str(&raw[start..]).into_iter::<Value>();
        if let Some(Ok(Value::Object(map))) = stream.next() {
            return Some(map);
        }
    }
    None
}

/// Isolate the payload of a fenced code block (```` ```lang ... ``` ````).
///
/// Returns the contents of the first fenced block when there is one, otherwise
/// the trimmed input. An unterminated fence yields everything after its opening
/// line. A fence opened and closed on one line yields the text between the marks.
pub fn strip_code_fence(raw: &str) -> &str {
    let Some(open) = raw.find("```") else {
        return raw.trim();
    };
    let after_open = &raw[open + 3..];
    let first_line = after_open.split('\n').next().unwrap_or_default();
    if let Some(close) = first_line.find("```") {
        return first_line[..close].trim();
    }
    // Skip the info string (e.g. `turtle`) up to the end of the line.
    let body = match after_open.find('\n') {
        Some(nl) => &after_open[nl + 1..],
        None => return after_open.trim(),
    };
    match body.find("```") {
        Some(close) => body[..close].trim(),
        None => body.trim(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_json_object() {
        let map = extract_json_object(r#"{"sparql_query": "SELECT * WHERE { ?s ?p ?o }"}"#).unwrap();
        assert_eq!(map["sparql_query"], "SELECT * WHERE { ?s ?p ?o }");
    }

    #[test]
    fn object_inside_fence_and_commentary() {
        let raw = "Sure! Here is the query:\n```json\n{\"sparql_query\": \"ASK { ?s ?p ?o }\"}\n```\nHope that helps.";
        let map = extract_json_object(raw).unwrap();
        assert_eq!(map["sparql_query"], "ASK { ?s ?p ?o }");
    }

    #[test]
    fn skips_malformed_leading_braces() {
        let raw = "template {name} then {\"sparql_query\": \"\"}";
        let map = extract_json_object(raw).unwrap();
        assert_eq!(map["sparql_query"], "");
    }

    #[test]
    fn garbage_has_no_object() {
        assert!(extract_json_object("I cannot help with that.").is_none());
        assert!(extract_json_object("[1, 2, 3]").is_none());
        assert!(extract_json_object("{\"unterminated\": ").is_none());
    }

    #[test]
    fn fenced_turtle_is_isolated() {
        let raw = "Here are the facts:\n```turtle\n:B1 :title \"Dune\" .\n```\nLet me know!";
        assert_eq!(strip_code_fence(raw), ":B1 :title \"Dune\" .");
    }

    #[test]
    fn unfenced_text_is_trimmed() {
        assert_eq!(strip_code_fence("  :B1 :title \"Dune\" .\n"), ":B1 :title \"Dune\" .");
    }

    #[test]
    fn inline_fence_is_isolated() {
        assert_eq!(
            strip_code_fence("```:B1 :title \"Dune\" .```"),
            ":B1 :title \"Dune\" ."
        );
        assert_eq!(strip_code_fence("Facts: ```:B1 :title \"Dune\" .```"), ":B1 :title \"Dune\" .");
        assert_eq!(strip_code_fence("```:B1 :title \"Dune\" ."), ":B1 :title \"Dune\" .");
    }

    #[test]
    fn unterminated_fence_keeps_body() {
        assert_eq!(strip_code_fence("```ttl\n:B1 :title \"Dune\" ."), ":B1 :title \"Dune\" .");
    }
}
