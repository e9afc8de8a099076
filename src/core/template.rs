//! Message templates with `{Name}` holes
//!
//! A template is parsed once per event. Positional arguments bind to holes in
//! order of appearance; named holes capture their argument as an event property.
//! `{{` and `}}` produce literal braces.

use super::property::{Properties, PropertyValue};
use serde::{Serialize, Serializer};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Text(String),
    Hole(String),
}

/// Parsed message template
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageTemplate {
    text: String,
    tokens: Vec<Token>,
}

impl MessageTemplate {
    pub fn parse(text: impl Into<String>) -> Self {
        let text = text.into();
        let tokens = Self::tokenize(&text);
        Self { text, tokens }
    }

    fn tokenize(text: &str) -> Vec<Token> {
        let mut tokens = Vec::new();
        let mut literal = String::new();
        let mut chars = text.char_indices().peekable();

        while let Some((start, c)) = chars.next() {
            match c {
                '{' if matches!(chars.peek(), Some((_, '{'))) => {
                    chars.next();
                    literal.push('{');
                }
                '}' if matches!(chars.peek(), Some((_, '}'))) => {
                    chars.next();
                    literal.push('}');
                }
                '{' => {
                    let rest = &text[start + 1..];
                    match rest.find('}') {
                        Some(end) if Self::is_valid_hole(&rest[..end]) => {
                            if !literal.is_empty() {
                                tokens.push(Token::Text(std::mem::take(&mut literal)));
                            }
                            tokens.push(Token::Hole(rest[..end].to_string()));
                            // skip the hole body and closing brace
                            for _ in 0..=rest[..end].chars().count() {
                                chars.next();
                            }
                        }
                        _ => literal.push('{'),
                    }
                }
                other => literal.push(other),
            }
        }

        if !literal.is_empty() {
            tokens.push(Token::Text(literal));
        }
        tokens
    }

    fn is_valid_hole(name: &str) -> bool {
        !name.is_empty() && name.chars().all(|c| c.is_alphanumeric() || c == '_')
    }

    /// Original template text
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Hole names in order of appearance
    pub fn holes(&self) -> impl Iterator<Item = &str> {
        self.tokens.iter().filter_map(|t| match t {
            Token::Hole(name) => Some(name.as_str()),
            Token::Text(_) => None,
        })
    }

    /// Capture positional arguments into named properties
    ///
    /// Existing properties win over captured arguments. Numeric holes are not
    /// captured; they render straight from `args`.
    pub fn capture(&self, args: &[PropertyValue], properties: &mut Properties) {
        for (name, value) in self.holes().zip(args.iter()) {
            if name.parse::<usize>().is_ok() {
                continue;
            }
            properties
                .entry(name.to_string())
                .or_insert_with(|| value.clone());
        }
    }

    /// Render the template against event properties and positional args
    pub fn render(&self, args: &[PropertyValue], properties: &Properties) -> String {
        let mut out = String::with_capacity(self.text.len());
        for token in &self.tokens {
            match token {
                Token::Text(s) => out.push_str(s),
                Token::Hole(name) => {
                    let value = properties.get(name).or_else(|| {
                        name.parse::<usize>().ok().and_then(|idx| args.get(idx))
                    });
                    match value {
                        Some(v) => out.push_str(&v.to_string()),
                        None => {
                            out.push('{');
                            out.push_str(name);
                            out.push('}');
                        }
                    }
                }
            }
        }
        out
    }
}

impl fmt::Display for MessageTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

impl From<&str> for MessageTemplate {
    fn from(s: &str) -> Self {
        Self::parse(s)
    }
}

impl From<String> for MessageTemplate {
    fn from(s: String) -> Self {
        Self::parse(s)
    }
}

impl Serialize for MessageTemplate {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.text)
    }
}
