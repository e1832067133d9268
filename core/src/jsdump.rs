//! Reader and writer for the JavaScript object-literal dialect used by
//! `searchindex.js`.
//!
//! The dialect is JSON plus bare identifier keys. Output is canonical:
//! no whitespace, non-ASCII escaped as `\uXXXX`, object members sorted by
//! their encoded `key:value` text. A file produced by the documentation
//! generator therefore survives `loads` followed by `dumps` byte for byte.

use crate::error::{IndexError, Result};
use lazy_static::lazy_static;
use regex::Regex;
use serde_json::{Map, Number, Value};
use std::collections::HashSet;
use std::fmt::Write;

pub const PREFIX: &str = "Search.setIndex(";
pub const SUFFIX: &str = ")";

/// Deepest array/object nesting `loads` accepts.
const MAX_DEPTH: usize = 128;

lazy_static! {
    static ref BARE_KEY: Regex = Regex::new(r"^[a-zA-Z_][a-zA-Z0-9_]*$").expect("valid regex");
    static ref RESERVED: HashSet<&'static str> = {
        let words: &[&str] = &[
            "abstract", "boolean", "break", "byte", "case", "catch", "char", "class", "const",
            "continue", "debugger", "default", "delete", "do", "double", "else", "enum", "export",
            "extends", "false", "final", "finally", "float", "for", "function", "goto", "if",
            "implements", "import", "in", "instanceof", "int", "interface", "long", "native",
            "new", "null", "package", "private", "protected", "public", "return", "short",
            "static", "super", "switch", "synchronized", "this", "throw", "throws", "transient",
            "true", "try", "typeof", "var", "void", "volatile", "while", "with",
        ];
        words.iter().copied().collect()
    };
}

/// Strip the `Search.setIndex(` ... `)` call around the index object.
pub fn strip_wrapper(text: &str) -> Result<&str> {
    let text = text.trim();
    let inner = text
        .strip_prefix(PREFIX)
        .and_then(|rest| rest.strip_suffix(SUFFIX))
        .ok_or(IndexError::MissingWrapper)?;
    if inner.is_empty() {
        return Err(IndexError::MissingWrapper);
    }
    Ok(inner)
}

pub fn wrap(body: &str) -> String {
    let mut out = String::with_capacity(PREFIX.len() + body.len() + SUFFIX.len());
    out.push_str(PREFIX);
    out.push_str(body);
    out.push_str(SUFFIX);
    out
}

/// Parse one value. Insignificant whitespace is accepted so plain JSON loads too.
pub fn loads(text: &str) -> Result<Value> {
    let mut parser = Parser { text, src: text.as_bytes(), pos: 0, depth: 0 };
    parser.skip_ws();
    let value = parser.value()?;
    parser.skip_ws();
    if parser.pos != parser.src.len() {
        return Err(parser.error("trailing characters after value"));
    }
    Ok(value)
}

pub fn dumps(value: &Value) -> String {
    let mut out = String::new();
    write_value(&mut out, value);
    out
}

fn write_value(out: &mut String, value: &Value) {
    match value {
        Value::Null => out.push_str("null"),
        Value::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
        Value::Number(n) => out.push_str(&n.to_string()),
        Value::String(s) => encode_string(out, s),
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_value(out, item);
            }
            out.push(']');
        }
        Value::Object(map) => {
            let mut members: Vec<String> = map
                .iter()
                .map(|(key, value)| {
                    let mut member = String::new();
                    encode_key(&mut member, key);
                    member.push(':');
                    write_value(&mut member, value);
                    member
                })
                .collect();
            members.sort_unstable();
            out.push('{');
            out.push_str(&members.join(","));
            out.push('}');
        }
    }
}

fn encode_key(out: &mut String, key: &str) {
    if BARE_KEY.is_match(key) && !RESERVED.contains(key) {
        out.push_str(key);
    } else {
        encode_string(out, key);
    }
}

fn encode_string(out: &mut String, s: &str) {
    out.push('"');
    for ch in s.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\u{8}' => out.push_str("\\b"),
            '\u{c}' => out.push_str("\\f"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            ' '..='~' => out.push(ch),
            _ => {
                let mut units = [0u16; 2];
                for unit in ch.encode_utf16(&mut units) {
                    let _ = write!(out, "\\u{unit:04x}");
                }
            }
        }
    }
    out.push('"');
}

fn is_ident_start(c: u8) -> bool {
    c.is_ascii_alphabetic() || c == b'_'
}

fn is_ident_char(c: u8) -> bool {
    c.is_ascii_alphanumeric() || c == b'_'
}

struct Parser<'a> {
    text: &'a str,
    src: &'a [u8],
    pos: usize,
    depth: usize,
}

impl<'a> Parser<'a> {
    fn error(&self, msg: impl Into<String>) -> IndexError {
        IndexError::Parse { pos: self.pos, msg: msg.into() }
    }

    fn descend(&mut self) -> Result<()> {
        if self.depth >= MAX_DEPTH {
            return Err(self.error("nesting too deep"));
        }
        self.depth += 1;
        Ok(())
    }

    fn peek(&self) -> Option<u8> {
        self.src.get(self.pos).copied()
    }

    fn skip_ws(&mut self) {
        while matches!(self.peek(), Some(b' ' | b'\t' | b'\n' | b'\r')) {
            self.pos += 1;
        }
    }

    fn value(&mut self) -> Result<Value> {
        match self.peek() {
            Some(b'{') => {
                self.descend()?;
                let value = self.object();
                self.depth -= 1;
                value
            }
            Some(b'[') => {
                self.descend()?;
                let value = self.array();
                self.depth -= 1;
                value
            }
            Some(b'"') => Ok(Value::String(self.string()?)),
            Some(b'-' | b'0'..=b'9') => self.number(),
            Some(c) if is_ident_start(c) => {
                let start = self.pos;
                match self.bareword() {
                    "true" => Ok(Value::Bool(true)),
                    "false" => Ok(Value::Bool(false)),
                    "null" => Ok(Value::Null),
                    _ => {
                        self.pos = start;
                        Err(self.error("bareword used as a value"))
                    }
                }
            }
            Some(_) => Err(self.error("unexpected character")),
            None => Err(self.error("unexpected end of input")),
        }
    }

    fn object(&mut self) -> Result<Value> {
        self.pos += 1;
        let mut map = Map::new();
        self.skip_ws();
        if self.peek() == Some(b'}') {
            self.pos += 1;
            return Ok(Value::Object(map));
        }
        loop {
            self.skip_ws();
            let key = self.key()?;
            self.skip_ws();
            if self.peek() != Some(b':') {
                return Err(self.error("expected `:` after object key"));
            }
            self.pos += 1;
            self.skip_ws();
            let value = self.value()?;
            map.insert(key, value);
            self.skip_ws();
            match self.peek() {
                Some(b',') => self.pos += 1,
                Some(b'}') => {
                    self.pos += 1;
                    return Ok(Value::Object(map));
                }
                _ => return Err(self.error("expected `,` or `}` in object")),
            }
        }
    }

    fn key(&mut self) -> Result<String> {
        match self.peek() {
            Some(b'"') => self.string(),
            Some(c) if c.is_ascii_digit() => {
                let start = self.pos;
                while matches!(self.peek(), Some(b'0'..=b'9')) {
                    self.pos += 1;
                }
                Ok(self.text[start..self.pos].to_string())
            }
            Some(c) if is_ident_start(c) => Ok(self.bareword().to_string()),
            _ => Err(self.error("expected object key")),
        }
    }

    fn array(&mut self) -> Result<Value> {
        self.pos += 1;
        let mut items = Vec::new();
        self.skip_ws();
        if self.peek() == Some(b']') {
            self.pos += 1;
            return Ok(Value::Array(items));
        }
        loop {
            self.skip_ws();
            items.push(self.value()?);
            self.skip_ws();
            match self.peek() {
                Some(b',') => self.pos += 1,
                Some(b']') => {
                    self.pos += 1;
                    return Ok(Value::Array(items));
                }
                _ => return Err(self.error("expected `,` or `]` in array")),
            }
        }
    }

    fn number(&mut self) -> Result<Value> {
        let start = self.pos;
        if self.peek() == Some(b'-') {
            self.pos += 1;
        }
        let digits_start = self.pos;
        while matches!(self.peek(), Some(b'0'..=b'9')) {
            self.pos += 1;
        }
        if self.pos == digits_start {
            return Err(self.error("expected digits"));
        }
        let literal = &self.text[start..self.pos];
        let number = match literal.parse::<u64>() {
            Ok(n) => Number::from(n),
            Err(_) => literal
                .parse::<i64>()
                .map(Number::from)
                .map_err(|_| IndexError::Parse { pos: start, msg: "integer out of range".into() })?,
        };
        Ok(Value::Number(number))
    }

    fn bareword(&mut self) -> &'a str {
        let start = self.pos;
        while self.peek().is_some_and(is_ident_char) {
            self.pos += 1;
        }
        &self.text[start..self.pos]
    }

    fn string(&mut self) -> Result<String> {
        self.pos += 1;
        let mut out = String::new();
        loop {
            let start = self.pos;
            while let Some(c) = self.peek() {
                if c == b'"' || c == b'\\' {
                    break;
                }
                self.pos += 1;
            }
            out.push_str(&self.text[start..self.pos]);
            match self.peek() {
                Some(b'"') => {
                    self.pos += 1;
                    return Ok(out);
                }
                Some(b'\\') => {
                    self.pos += 1;
                    self.escape(&mut out)?;
                }
                _ => return Err(self.error("unterminated string")),
            }
        }
    }

    fn escape(&mut self, out: &mut String) -> Result<()> {
        let c = self.peek().ok_or_else(|| self.error("unterminated escape"))?;
        self.pos += 1;
        match c {
            b'"' => out.push('"'),
            b'\\' => out.push('\\'),
            b'/' => out.push('/'),
            b'b' => out.push('\u{8}'),
            b'f' => out.push('\u{c}'),
            b'n' => out.push('\n'),
            b'r' => out.push('\r'),
            b't' => out.push('\t'),
            b'u' => {
                let hi = self.hex4()?;
                let ch = if (0xD800..0xDC00).contains(&hi) {
                    if self.src.get(self.pos..self.pos + 2) == Some(b"\\u".as_slice()) {
                        self.pos += 2;
                        let lo = self.hex4()?;
                        if (0xDC00..0xE000).contains(&lo) {
                            char::from_u32(0x10000 + ((hi - 0xD800) << 10) + (lo - 0xDC00))
                        } else {
                            None
                        }
                    } else {
                        None
                    }
                } else {
                    char::from_u32(hi)
                };
                out.push(ch.ok_or_else(|| self.error("invalid unicode escape"))?);
            }
            _ => return Err(self.error("unknown escape sequence")),
        }
        Ok(())
    }

    fn hex4(&mut self) -> Result<u32> {
        let digits = self
            .text
            .get(self.pos..self.pos + 4)
            .filter(|d| d.bytes().all(|b| b.is_ascii_hexdigit()))
            .ok_or_else(|| self.error("invalid unicode escape"))?;
        let value = u32::from_str_radix(digits, 16).map_err(|_| self.error("invalid unicode escape"))?;
        self.pos += 4;
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn reads_bare_and_quoted_keys() {
        let v = loads(r#"{terms:{"default":3,AWS:0,For:[]},sphinx:55}"#).unwrap();
        assert_eq!(v, json!({"terms": {"default": 3, "AWS": 0, "For": []}, "sphinx": 55}));
    }

    #[test]
    fn reads_integer_keys_and_literals() {
        let v = loads("{0:[true,false,null],12:-5}").unwrap();
        assert_eq!(v, json!({"0": [true, false, null], "12": -5}));
    }

    #[test]
    fn decodes_escapes_including_surrogate_pairs() {
        let v = loads(r#"["Megatron\u2019s","tab\there","\ud83d\ude80","q\"uote"]"#).unwrap();
        assert_eq!(v, json!(["Megatron\u{2019}s", "tab\there", "\u{1F680}", "q\"uote"]));
    }

    #[test]
    fn accepts_plain_json_with_whitespace() {
        let v = loads("{ \"docnames\" : [ \"a\" , \"b\" ] }\n").unwrap();
        assert_eq!(v, json!({"docnames": ["a", "b"]}));
    }

    #[test]
    fn bareword_value_is_rejected_with_position() {
        match loads("{a:b}") {
            Err(IndexError::Parse { pos, .. }) => assert_eq!(pos, 3),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn unterminated_input_is_an_error() {
        assert!(loads("{a:[1,2").is_err());
        assert!(loads(r#"{"a"#).is_err());
        assert!(loads("[1] x").is_err());
    }

    #[test]
    fn dumps_quotes_reserved_words_and_sorts_members() {
        let v = json!({"switch": 4, "app": [0, 1], "AWS": 0, "new": 4, "sphinx.domains.c": 1});
        assert_eq!(dumps(&v), r#"{"new":4,"sphinx.domains.c":1,"switch":4,AWS:0,app:[0,1]}"#);
    }

    #[test]
    fn dumps_escapes_non_ascii() {
        let v = json!(["Welcome to Megatron\u{2019}s documentation!", "\u{1F680}\n"]);
        assert_eq!(dumps(&v), r#"["Welcome to Megatron\u2019s documentation!","\ud83d\ude80\n"]"#);
    }

    #[test]
    fn wrapper_is_required() {
        assert_eq!(strip_wrapper("Search.setIndex({a:1})").unwrap(), "{a:1}");
        assert_eq!(strip_wrapper("Search.setIndex({a:1})\n").unwrap(), "{a:1}");
        assert!(matches!(strip_wrapper("{a:1}"), Err(IndexError::MissingWrapper)));
        assert!(matches!(strip_wrapper("Search.setIndex()"), Err(IndexError::MissingWrapper)));
        assert_eq!(wrap("{}"), "Search.setIndex({})");
    }

    #[test]
    fn deep_nesting_is_an_error() {
        let deep = format!("{}{}", "[".repeat(200_000), "]".repeat(200_000));
        match loads(&deep) {
            Err(IndexError::Parse { pos, msg }) => {
                assert_eq!(pos, MAX_DEPTH);
                assert_eq!(msg, "nesting too deep");
            }
            other => panic!("unexpected: {other:?}"),
        }

        let ok = format!("{}{}", "[".repeat(MAX_DEPTH), "]".repeat(MAX_DEPTH));
        assert!(loads(&ok).is_ok());
    }
}
