//! Response extractor — finds the one JSON object inside free-form model output.
//!
//! Order of attempts:
//! 1. a fenced code block (```` ``` ```` or ```` ```json ````) whose body is an object;
//! 2. the first `{` in the text, up to its matching `}`.
//!
//! Only brace balance is checked, not JSON validity; the decoder does that.
//! Braces inside quoted strings (either quote style, escapes honoured) are not counted.

const FENCE: &str = "```";

/// Returns the candidate object as a slice of `text`, or `None` when no
/// balanced object exists.
pub fn extract_json(text: &str) -> Option<&str> {
    fenced_object(text).or_else(|| balanced_object(text))
}

/// Body of the first fenced block that starts with `{` and ends with `}`.
fn fenced_object(text: &str) -> Option<&str> {
    let mut search_from = 0;
    while let Some(rel) = text[search_from..].find(FENCE) {
        let after_fence = search_from + rel + FENCE.len();
        search_from = after_fence;

        let rest = &text[after_fence..];
        let tag_len = rest
            .find(|c: char| !(c.is_ascii_alphanumeric() || c == '-' || c == '_'))
            .unwrap_or(rest.len());
        let body = rest[tag_len..].trim_start();
        if !body.starts_with('{') {
            continue;
        }
        let body_start = text.len() - body.len();

        // Shortest body that ends in `}` right before a closing fence.
        let mut close_from = body_start;
        while let Some(close_rel) = text[close_from..].find(FENCE) {
            let close = close_from + close_rel;
            let candidate = text[body_start..close].trim_end();
            if candidate.ends_with('}') {
                return Some(candidate);
            }
            close_from = close + FENCE.len();
        }
    }
    None
}

/// From the first `{` through the `}` that brings nesting depth back to zero.
fn balanced_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth: usize = 0;
    let mut quote: Option<char> = None;
    let mut escaped = false;

    for (offset, ch) in text[start..].char_indices() {
        if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == q {
                quote = None;
            }
            continue;
        }

        match ch {
            '"' | '\'' => quote = Some(ch),
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_brace_means_no_candidate() {
        assert_eq!(extract_json("no json here"), None);
        assert_eq!(extract_json(""), None);
        assert_eq!(extract_json("[ERROR] ollama run timed out."), None);
    }

    #[test]
    fn test_unbalanced_means_no_candidate() {
        assert_eq!(extract_json("resultado: {\"a\": {\"b\": 1}"), None);
    }

    #[test]
    fn test_object_in_prose_is_returned_byte_identical() {
        let object = "{\"nota\": 87, \"ok\": true}";
        let text = format!("Segue a análise:\n{object}\nQualquer dúvida, avise.");
        assert_eq!(extract_json(&text), Some(object));
    }

    #[test]
    fn test_nested_object_returns_outer() {
        let text = r#"prefix {"a": {"b": 1}} suffix {"c": 2}"#;
        assert_eq!(extract_json(text), Some(r#"{"a": {"b": 1}}"#));
    }

    #[test]
    fn test_fenced_block_with_tag() {
        let text = "```json\n{\"a\":1}\n```";
        assert_eq!(extract_json(text), Some("{\"a\":1}"));
    }

    #[test]
    fn test_fenced_block_without_tag_preferred_over_earlier_brace() {
        let text = "Use {chaves} assim:\n```\n{\"validacao\": []}\n```\n";
        assert_eq!(extract_json(text), Some("{\"validacao\": []}"));
    }

    #[test]
    fn test_fenced_nested_object() {
        let text = "```json\n{\"a\": {\"b\": [1, 2]}}\n```";
        assert_eq!(extract_json(text), Some("{\"a\": {\"b\": [1, 2]}}"));
    }

    #[test]
    fn test_fence_without_object_falls_back_to_scan() {
        let text = "```text\nnada aqui\n```\nresposta: {\"x\": null}";
        assert_eq!(extract_json(text), Some("{\"x\": null}"));
    }

    #[test]
    fn test_braces_inside_strings_are_ignored() {
        let object = r#"{"detalhes": "use } e { com cuidado", "n": {"m": "\"}\""}}"#;
        let text = format!("ok {object} fim");
        assert_eq!(extract_json(&text), Some(object));
    }

    #[test]
    fn test_braces_inside_single_quoted_strings_are_ignored() {
        let object = "{'detalhes': 'falta }', 'nota': 5}";
        assert_eq!(extract_json(object), Some(object));
    }

    #[test]
    fn test_multibyte_text_around_object() {
        let text = "Análise — currículo: {\"formação\": \"ótima\"} ✓";
        assert_eq!(extract_json(text), Some("{\"formação\": \"ótima\"}"));
    }
}
