//! Extraction of JSON payloads from free-text model responses.
//!
//! Model responses are expected to contain one JSON object, possibly
//! surrounded by prose or markdown fences. We take the first balanced
//! `{...}` block; callers degrade to documented defaults when none exists.

/// First balanced `{...}` block in `text`, or None.
///
/// Brace counting is string-aware: braces inside JSON string literals
/// (and escaped quotes inside those) do not affect nesting depth.
pub fn extract_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, ch) in text[start..].char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == '"' {
                in_string = false;
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..start + offset + ch.len_utf8()]);
                }
            }
            _ => {}
        }
    }
    None
}

/// Extract and deserialize the first JSON object in `text`.
pub fn parse_json_object<T: serde::de::DeserializeOwned>(text: &str) -> Option<T> {
    extract_json_object(text).and_then(|block| serde_json::from_str(block).ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extracts_bare_object() {
        assert_eq!(extract_json_object(r#"{"a":1}"#), Some(r#"{"a":1}"#));
    }

    #[test]
    fn test_extracts_from_surrounding_prose() {
        let text = "Sure! Here is the plan:\n```json\n{\"can_plan\": true}\n```\nDone.";
        assert_eq!(extract_json_object(text), Some(r#"{"can_plan": true}"#));
    }

    #[test]
    fn test_nested_objects_stay_balanced() {
        let text = r#"prefix {"outer": {"inner": 1}, "b": 2} suffix {"second": 3}"#;
        assert_eq!(
            extract_json_object(text),
            Some(r#"{"outer": {"inner": 1}, "b": 2}"#)
        );
    }

    #[test]
    fn test_braces_inside_strings_ignored() {
        let text = r#"{"note": "set {width} to \"10}\"", "n": 1}"#;
        assert_eq!(extract_json_object(text), Some(text));
    }

    #[test]
    fn test_unbalanced_yields_none() {
        assert!(extract_json_object("no json here").is_none());
        assert!(extract_json_object(r#"{"open": true"#).is_none());
    }

    #[test]
    fn test_parse_json_object_typed() {
        #[derive(serde::Deserialize)]
        struct Probe {
            n: u32,
        }
        let probe: Probe = parse_json_object("noise {\"n\": 7} noise").unwrap();
        assert_eq!(probe.n, 7);
    }
}
