//! Lenient decoder — strict JSON first, then a relaxed literal grammar.
//!
//! The relaxed grammar is a superset of JSON covering what local models tend
//! to emit instead of RFC 8259:
//! - strings in single or double quotes, with `\xHH` on top of the JSON escapes
//!   (unknown escapes keep their backslash) and raw control characters allowed;
//! - `True` / `False` / `None` next to `true` / `false` / `null`;
//! - one trailing comma before a closing `}` / `]` / `)`;
//! - `( … )` read as an array; `+` signs, `1.` and `.5` as numbers.
//!
//! Still rejected: comments, unquoted keys, bare identifiers, missing values,
//! anything after the top-level value.

use std::fmt;

use serde_json::{Map, Number, Value};
use thiserror::Error;
use tracing::debug;

const MAX_DEPTH: usize = 128;

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("JSON inválido: {0}")]
    Invalid(String),
}

pub fn decode_lenient(candidate: &str) -> Result<Value, DecodeError> {
    match serde_json::from_str::<Value>(candidate) {
        Ok(value) => Ok(value),
        Err(strict) => {
            debug!("Strict JSON parse failed ({strict}); trying relaxed grammar");
            parse_relaxed(candidate).map_err(|e| DecodeError::Invalid(e.to_string()))
        }
    }
}

#[derive(Debug)]
struct SyntaxError {
    message: String,
    offset: usize,
}

impl fmt::Display for SyntaxError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} at offset {}", self.message, self.offset)
    }
}

fn parse_relaxed(src: &str) -> Result<Value, SyntaxError> {
    let mut parser = Parser { src, pos: 0 };
    parser.skip_ws();
    let value = parser.value(0)?;
    parser.skip_ws();
    if parser.pos < src.len() {
        return Err(parser.error("unexpected trailing characters"));
    }
    Ok(value)
}

struct Parser<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn peek(&self) -> Option<char> {
        self.src[self.pos..].chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let ch = self.peek()?;
        self.pos += ch.len_utf8();
        Some(ch)
    }

    fn skip_ws(&mut self) {
        while let Some(c) = self.peek().filter(|c| c.is_whitespace()) {
            self.pos += c.len_utf8();
        }
    }

    fn error(&self, message: impl Into<String>) -> SyntaxError {
        SyntaxError {
            message: message.into(),
            offset: self.pos,
        }
    }

    fn expect(&mut self, wanted: char) -> Result<(), SyntaxError> {
        match self.peek() {
            Some(c) if c == wanted => {
                self.pos += c.len_utf8();
                Ok(())
            }
            Some(c) => Err(self.error(format!("expected '{wanted}', found '{c}'"))),
            None => Err(self.error(format!("expected '{wanted}', found end of input"))),
        }
    }

    fn value(&mut self, depth: usize) -> Result<Value, SyntaxError> {
        if depth > MAX_DEPTH {
            return Err(self.error("nesting too deep"));
        }
        match self.peek() {
            Some('{') => self.object(depth),
            Some('[') => self.sequence(depth, ']'),
            Some('(') => self.sequence(depth, ')'),
            Some(q @ ('"' | '\'')) => self.string(q).map(Value::String),
            Some(c) if c.is_ascii_digit() || matches!(c, '-' | '+' | '.') => self.number(),
            Some(c) if c.is_alphabetic() || c == '_' => self.keyword(),
            Some(c) => Err(self.error(format!("unexpected character '{c}'"))),
            None => Err(self.error("unexpected end of input")),
        }
    }

    fn object(&mut self, depth: usize) -> Result<Value, SyntaxError> {
        self.expect('{')?;
        let mut map = Map::new();
        self.skip_ws();
        if self.peek() == Some('}') {
            self.pos += 1;
            return Ok(Value::Object(map));
        }
        loop {
            let key = match self.peek() {
                Some(q @ ('"' | '\'')) => self.string(q)?,
                _ => return Err(self.error("expected a quoted key")),
            };
            self.skip_ws();
            self.expect(':')?;
            self.skip_ws();
            let value = self.value(depth + 1)?;
            map.insert(key, value);
            self.skip_ws();
            match self.bump() {
                Some(',') => {
                    self.skip_ws();
                    if self.peek() == Some('}') {
                        self.pos += 1;
                        return Ok(Value::Object(map));
                    }
                }
                Some('}') => return Ok(Value::Object(map)),
                _ => return Err(self.error("expected ',' or '}' in object")),
            }
        }
    }

    fn sequence(&mut self, depth: usize, close: char) -> Result<Value, SyntaxError> {
        self.bump();
        let mut items = Vec::new();
        self.skip_ws();
        if self.peek() == Some(close) {
            self.pos += 1;
            return Ok(Value::Array(items));
        }
        loop {
            items.push(self.value(depth + 1)?);
            self.skip_ws();
            match self.bump() {
                Some(',') => {
                    self.skip_ws();
                    if self.peek() == Some(close) {
                        self.pos += 1;
                        return Ok(Value::Array(items));
                    }
                }
                Some(c) if c == close => return Ok(Value::Array(items)),
                _ => return Err(self.error(format!("expected ',' or '{close}' in sequence"))),
            }
        }
    }

    fn string(&mut self, quote: char) -> Result<String, SyntaxError> {
        let start = self.pos;
        self.bump();
        let mut out = String::new();
        loop {
            let ch = match self.bump() {
                Some(ch) => ch,
                None => {
                    return Err(SyntaxError {
                        message: "unterminated string".to_string(),
                        offset: start,
                    })
                }
            };
            if ch == quote {
                return Ok(out);
            }
            if ch != '\\' {
                out.push(ch);
                continue;
            }
            match self.bump() {
                Some('n') => out.push('\n'),
                Some('t') => out.push('\t'),
                Some('r') => out.push('\r'),
                Some('b') => out.push('\u{8}'),
                Some('f') => out.push('\u{c}'),
                Some('0') => out.push('\0'),
                Some(c @ ('\\' | '\'' | '"' | '/')) => out.push(c),
                Some('\n') => {} // line continuation
                Some('x') => {
                    let code = self.hex_digits(2)?;
                    out.push(char::from_u32(code).ok_or_else(|| self.error("invalid \\x escape"))?);
                }
                Some('u') => out.push(self.unicode_escape()?),
                Some(other) => {
                    out.push('\\');
                    out.push(other);
                }
                None => return Err(self.error("unterminated escape")),
            }
        }
    }

    fn hex_digits(&mut self, count: usize) -> Result<u32, SyntaxError> {
        let end = self.pos + count;
        let digits = self
            .src
            .get(self.pos..end)
            .filter(|d| d.chars().all(|c| c.is_ascii_hexdigit()))
            .ok_or_else(|| self.error("invalid hex escape"))?;
        let code = u32::from_str_radix(digits, 16).map_err(|_| self.error("invalid hex escape"))?;
        self.pos = end;
        Ok(code)
    }

    /// `\uXXXX`, combining a surrogate pair when one follows.
    fn unicode_escape(&mut self) -> Result<char, SyntaxError> {
        let high = self.hex_digits(4)?;
        if (0xD800..0xDC00).contains(&high) {
            if self.src[self.pos..].starts_with("\\u") {
                self.pos += 2;
                let low = self.hex_digits(4)?;
                if (0xDC00..0xE000).contains(&low) {
                    let code = 0x10000 + ((high - 0xD800) << 10) + (low - 0xDC00);
                    return char::from_u32(code).ok_or_else(|| self.error("invalid surrogate pair"));
                }
            }
            return Err(self.error("unpaired surrogate in \\u escape"));
        }
        char::from_u32(high).ok_or_else(|| self.error("invalid \\u escape"))
    }

    fn number(&mut self) -> Result<Value, SyntaxError> {
        let start = self.pos;
        while matches!(
            self.peek(),
            Some(c) if c.is_ascii_digit() || matches!(c, '+' | '-' | '.' | 'e' | 'E')
        ) {
            self.pos += 1;
        }
        let token = &self.src[start..self.pos];
        let invalid = || SyntaxError {
            message: format!("invalid number '{token}'"),
            offset: start,
        };

        if !token.chars().any(|c| c.is_ascii_digit()) {
            return Err(invalid());
        }
        if token.contains(['.', 'e', 'E']) {
            let float: f64 = token.parse().map_err(|_| invalid())?;
            return Number::from_f64(float).map(Value::Number).ok_or_else(invalid);
        }
        if let Ok(int) = token.parse::<i64>() {
            return Ok(Value::Number(int.into()));
        }
        if let Ok(uint) = token.trim_start_matches('+').parse::<u64>() {
            return Ok(Value::Number(uint.into()));
        }
        let float: f64 = token.parse().map_err(|_| invalid())?;
        Number::from_f64(float).map(Value::Number).ok_or_else(invalid)
    }

    fn keyword(&mut self) -> Result<Value, SyntaxError> {
        let start = self.pos;
        while matches!(self.peek(), Some(c) if c.is_alphanumeric() || c == '_') {
            self.bump();
        }
        match &self.src[start..self.pos] {
            "true" | "True" => Ok(Value::Bool(true)),
            "false" | "False" => Ok(Value::Bool(false)),
            "null" | "None" => Ok(Value::Null),
            other => Err(SyntaxError {
                message: format!("unexpected identifier '{other}'"),
                offset: start,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::extractor::extract_json;
    use serde_json::json;

    #[test]
    fn test_strict_json_is_accepted_as_is() {
        let value = decode_lenient(r#"{"a": [1, 2.5, "três"], "b": null}"#).unwrap();
        assert_eq!(value, json!({"a": [1, 2.5, "três"], "b": null}));
    }

    #[test]
    fn test_single_quotes_decode_like_double_quotes() {
        let strict = r#"{"item": "Formação Acadêmica", "ok": true, "n": -3, "x": [1.5, null, {"y": "it's"}]}"#;
        let relaxed = r#"{'item': 'Formação Acadêmica', 'ok': true, 'n': -3, 'x': [1.5, null, {'y': "it's"}]}"#;
        assert_eq!(decode_lenient(relaxed).unwrap(), decode_lenient(strict).unwrap());
    }

    #[test]
    fn test_capitalised_keywords_and_trailing_commas() {
        let value = decode_lenient("{'a': True, 'b': False, 'c': None, 'd': [1, 2,],}").unwrap();
        assert_eq!(value, json!({"a": true, "b": false, "c": null, "d": [1, 2]}));
    }

    #[test]
    fn test_tuple_reads_as_array() {
        assert_eq!(decode_lenient("{'t': (1, 'a')}").unwrap(), json!({"t": [1, "a"]}));
    }

    #[test]
    fn test_escapes() {
        let value = decode_lenient(r"{'s': 'l\'água\n\x41é😀\d'}").unwrap();
        assert_eq!(value, json!({"s": "l'água\nAé😀\\d"}));
    }

    #[test]
    fn test_raw_newline_inside_single_quoted_string() {
        let value = decode_lenient("{'detalhes': 'linha 1\nlinha 2'}").unwrap();
        assert_eq!(value["detalhes"], "linha 1\nlinha 2");
    }

    #[test]
    fn test_invalid_text_is_rejected() {
        let err = decode_lenient("{invalid: , }").unwrap_err();
        assert!(err.to_string().starts_with("JSON inválido: "), "{err}");
    }

    #[test]
    fn test_malformed_inputs_are_rejected() {
        for bad in [
            "{'a': }",
            "{'a' 1}",
            "{'a': 1 // nota\n}",
            "{'a': 'sem fim}",
            "{'a': 1} extra",
            "{'a': 1,,}",
            "{'a': nan}",
            "{'a': 1-2}",
            "{'a': '\\ud83d'}",
            "",
        ] {
            assert!(decode_lenient(bad).is_err(), "accepted {bad:?}");
        }
    }

    #[test]
    fn test_excessive_nesting_is_rejected_without_overflow() {
        let deep = format!("{}{}", "(".repeat(MAX_DEPTH + 10), ")".repeat(MAX_DEPTH + 10));
        assert!(decode_lenient(&deep).is_err());
    }

    #[test]
    fn test_extract_then_decode_recovers_serialized_values() {
        let samples = [
            json!({"validacao": [{"item": "Coerência geral", "status": "OK", "detalhes": "ação {sic}"}],
                   "pontuacao_final": "78", "melhorias_recomendadas": ""}),
            json!({"n": 0, "neg": -12, "f": 0.25, "big": 12345678901u64, "b": false, "z": null}),
            json!({"nested": {"list": [[], {}, [1, [2, [3]]]], "emoji": "✓ 😀"}}),
        ];
        for value in samples {
            let text = format!("Resposta:\n{}\nFim.", serde_json::to_string(&value).unwrap());
            let candidate = extract_json(&text).unwrap();
            assert_eq!(decode_lenient(candidate).unwrap(), value);
        }
    }
}
