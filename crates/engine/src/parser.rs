//! Action parser — the text-mode line grammar.
//!
//! Decodes a single line of model output into a typed step. The grammar is
//! deliberately narrow: a line either matches one of the three keywords or
//! it is classified `Unparseable` — the parser never raises, so the
//! degrade/abort policy stays uniform with the other recoverable errors.
//!
//! Tool identifiers may be namespace-qualified (`functions.math`); the
//! grammar captures the qualified name whole. Stripping recognized
//! prefixes happens later, in the executor, never here.

use regex::Regex;
use std::sync::OnceLock;

/// Line keyword for intermediate reasoning.
pub const THOUGHT_KEYWORD: &str = "THOUGHT:";
/// Line keyword for tool invocation.
pub const ACTION_KEYWORD: &str = "ACTION:";
/// Line keyword for the final answer.
pub const FINAL_KEYWORD: &str = "FINAL:";

/// The typed result of decoding one line.
#[derive(Debug, Clone, PartialEq)]
pub enum ParsedLine {
    /// `THOUGHT: <text>`
    Thought(String),
    /// `ACTION: <name>(<args>)` — name may be dot-qualified.
    Action {
        name: String,
        arguments: serde_json::Value,
    },
    /// `FINAL: <answer>`
    Final(String),
    /// Anything that does not match the grammar. Carries a description of
    /// what went wrong, for the error observation.
    Unparseable(String),
}

fn action_pattern() -> &'static Regex {
    static ACTION_RE: OnceLock<Regex> = OnceLock::new();
    ACTION_RE.get_or_init(|| {
        // Identifier grammar is widened to capture qualified names whole,
        // so `functions.math` is one capture, not a truncated `functions`.
        Regex::new(r"^([A-Za-z_][A-Za-z0-9_]*(?:\.[A-Za-z_][A-Za-z0-9_]*)*)\s*(?:\((.*)\))?$")
            .expect("action pattern is valid")
    })
}

/// Decode one line of model output.
pub fn parse_line(line: &str) -> ParsedLine {
    let line = line.trim();

    if let Some(rest) = line.strip_prefix(THOUGHT_KEYWORD) {
        return ParsedLine::Thought(rest.trim().to_string());
    }
    if let Some(rest) = line.strip_prefix(FINAL_KEYWORD) {
        return ParsedLine::Final(rest.trim().to_string());
    }
    if let Some(rest) = line.strip_prefix(ACTION_KEYWORD) {
        let rest = rest.trim();
        let Some(caps) = action_pattern().captures(rest) else {
            return ParsedLine::Unparseable(format!(
                "action line does not match `ACTION: name(args)`: {line}"
            ));
        };
        let name = caps[1].to_string();
        let raw_args = caps.get(2).map(|m| m.as_str()).unwrap_or("");
        return match parse_arguments(raw_args) {
            Ok(arguments) => ParsedLine::Action { name, arguments },
            Err(reason) => ParsedLine::Unparseable(format!(
                "bad arguments in action line for '{name}': {reason}"
            )),
        };
    }

    ParsedLine::Unparseable(format!("line has no recognized keyword: {line}"))
}

/// Decode an argument payload into a JSON object.
///
/// Accepts an empty string, a JSON object literal, or a comma-separated
/// list of `key="value"` pairs (values may be quoted strings, numbers,
/// booleans, or null; bare words are taken as strings).
pub fn parse_arguments(raw: &str) -> Result<serde_json::Value, String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(serde_json::json!({}));
    }
    if raw.starts_with('{') {
        return serde_json::from_str(raw).map_err(|e| format!("invalid JSON object: {e}"));
    }

    let mut scanner = ArgScanner::new(raw);
    let mut object = serde_json::Map::new();
    loop {
        scanner.skip_whitespace();
        let key = scanner.ident()?;
        scanner.skip_whitespace();
        scanner.expect('=')?;
        scanner.skip_whitespace();
        let value = scanner.value()?;
        object.insert(key, value);
        scanner.skip_whitespace();
        if scanner.done() {
            break;
        }
        scanner.expect(',')?;
    }
    Ok(serde_json::Value::Object(object))
}

/// Character-level scanner for `key=value` argument lists.
struct ArgScanner {
    chars: Vec<char>,
    pos: usize,
}

impl ArgScanner {
    fn new(input: &str) -> Self {
        Self {
            chars: input.chars().collect(),
            pos: 0,
        }
    }

    fn done(&self) -> bool {
        self.pos >= self.chars.len()
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn skip_whitespace(&mut self) {
        while matches!(self.peek(), Some(c) if c.is_whitespace()) {
            self.pos += 1;
        }
    }

    fn expect(&mut self, c: char) -> Result<(), String> {
        match self.peek() {
            Some(found) if found == c => {
                self.pos += 1;
                Ok(())
            }
            Some(found) => Err(format!("expected '{c}', found '{found}'")),
            None => Err(format!("expected '{c}', found end of input")),
        }
    }

    fn ident(&mut self) -> Result<String, String> {
        let start = self.pos;
        while matches!(self.peek(), Some(c) if c.is_ascii_alphanumeric() || c == '_') {
            self.pos += 1;
        }
        if self.pos == start {
            return Err(match self.peek() {
                Some(c) => format!("expected parameter name, found '{c}'"),
                None => "expected parameter name, found end of input".into(),
            });
        }
        Ok(self.chars[start..self.pos].iter().collect())
    }

    fn value(&mut self) -> Result<serde_json::Value, String> {
        match self.peek() {
            Some('"') => self.quoted_string().map(serde_json::Value::String),
            Some(_) => {
                let raw = self.bare_token();
                if raw.is_empty() {
                    return Err("expected a value".into());
                }
                Ok(classify_bare(&raw))
            }
            None => Err("expected a value, found end of input".into()),
        }
    }

    fn quoted_string(&mut self) -> Result<String, String> {
        self.expect('"')?;
        let mut out = String::new();
        loop {
            match self.peek() {
                Some('"') => {
                    self.pos += 1;
                    return Ok(out);
                }
                Some('\\') => {
                    self.pos += 1;
                    match self.peek() {
                        Some('n') => out.push('\n'),
                        Some('t') => out.push('\t'),
                        Some(c) => out.push(c),
                        None => return Err("dangling escape in string".into()),
                    }
                    self.pos += 1;
                }
                Some(c) => {
                    out.push(c);
                    self.pos += 1;
                }
                None => return Err("unterminated string".into()),
            }
        }
    }

    fn bare_token(&mut self) -> String {
        let start = self.pos;
        while matches!(self.peek(), Some(c) if c != ',') {
            self.pos += 1;
        }
        self.chars[start..self.pos]
            .iter()
            .collect::<String>()
            .trim()
            .to_string()
    }
}

/// Interpret an unquoted value: number, boolean, null, else string.
fn classify_bare(raw: &str) -> serde_json::Value {
    match raw {
        "true" => return serde_json::Value::Bool(true),
        "false" => return serde_json::Value::Bool(false),
        "null" => return serde_json::Value::Null,
        _ => {}
    }
    if let Ok(i) = raw.parse::<i64>() {
        return serde_json::json!(i);
    }
    if let Ok(f) = raw.parse::<f64>() {
        return serde_json::json!(f);
    }
    serde_json::Value::String(raw.to_string())
}
