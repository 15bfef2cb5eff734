//! Field values as typed into the shell.
//!
//! | Syntax              | Value           |
//! |---------------------|-----------------|
//! | `true`, `false`     | `Bool`          |
//! | `-12`               | `Int`           |
//! | `0.5`, `1e3`        | `Float`         |
//! | `"text\n"`          | `Text`          |
//! | `0xdeadbeef`        | `Bytes`         |
//! | `@some/path`        | `Path`          |
//! | `[1, "two", [3]]`   | `List`          |

use cairn_core::util::FiniteF64;
use cairn_core::{AssetPath, PathError, Value};

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum LiteralError {
    #[error("expected a value")]
    Empty,
    #[error("unexpected {found:?} at offset {at}")]
    Unexpected { found: char, at: usize },
    #[error("text is missing its closing quote")]
    UnterminatedText,
    #[error("list is missing its closing bracket")]
    UnterminatedList,
    #[error("unknown escape \\{0}")]
    BadEscape(char),
    #[error("{0:?} is not a number")]
    Number(String),
    #[error("{0:?} is not an even number of hex digits")]
    Bytes(String),
    #[error(transparent)]
    Path(#[from] PathError),
}

/// Parse exactly one value, surrounded by optional whitespace.
pub fn parse(text: &str) -> Result<Value, LiteralError> {
    let mut parser = Parser { text, at: 0 };
    parser.skip_whitespace();
    let value = parser.value()?;
    parser.skip_whitespace();
    match parser.peek() {
        None => Ok(value),
        Some(found) => Err(LiteralError::Unexpected {
            found,
            at: parser.at,
        }),
    }
}

struct Parser<'t> {
    text: &'t str,
    /// Byte offset into `text`.
    at: usize,
}
impl<'t> Parser<'t> {
    fn rest(&self) -> &str {
        &self.text[self.at..]
    }
    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }
    fn bump(&mut self) -> Option<char> {
        let next = self.peek()?;
        self.at += next.len_utf8();
        Some(next)
    }
    fn skip_whitespace(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.bump();
        }
    }
    /// Everything up to the next delimiter.
    fn word(&mut self) -> &'t str {
        let start = self.at;
        while self
            .peek()
            .is_some_and(|c| !c.is_whitespace() && c != ',' && c != ']')
        {
            self.bump();
        }
        &self.text[start..self.at]
    }
    fn value(&mut self) -> Result<Value, LiteralError> {
        match self.peek() {
            None => Err(LiteralError::Empty),
            Some('"') => self.text_value(),
            Some('[') => self.list(),
            Some('@') => {
                self.bump();
                Ok(Value::Path(AssetPath::parse(self.word())?))
            }
            Some(',' | ']') => Err(LiteralError::Empty),
            Some(_) => scalar(self.word()),
        }
    }
    fn text_value(&mut self) -> Result<Value, LiteralError> {
        // Opening quote
        self.bump();
        let mut text = String::new();
        loop {
            match self.bump() {
                None => return Err(LiteralError::UnterminatedText),
                Some('"') => return Ok(Value::from(text)),
                Some('\\') => text.push(match self.bump() {
                    Some('n') => '\n',
                    Some('t') => '\t',
                    Some('0') => '\0',
                    Some(c @ ('"' | '\\')) => c,
                    Some(other) => return Err(LiteralError::BadEscape(other)),
                    None => return Err(LiteralError::UnterminatedText),
                }),
                Some(c) => text.push(c),
            }
        }
    }
    fn list(&mut self) -> Result<Value, LiteralError> {
        // Opening bracket
        self.bump();
        let mut items = Vec::new();
        loop {
            self.skip_whitespace();
            match self.peek() {
                None => return Err(LiteralError::UnterminatedList),
                Some(']') => {
                    self.bump();
                    return Ok(Value::from(items));
                }
                Some(_) => (),
            }
            items.push(self.value()?);
            self.skip_whitespace();
            match self.bump() {
                Some(',') => (),
                Some(']') => return Ok(Value::from(items)),
                Some(found) => {
                    return Err(LiteralError::Unexpected {
                        found,
                        at: self.at - found.len_utf8(),
                    })
                }
                None => return Err(LiteralError::UnterminatedList),
            }
        }
    }
}

fn scalar(word: &str) -> Result<Value, LiteralError> {
    match word {
        "true" => return Ok(Value::Bool(true)),
        "false" => return Ok(Value::Bool(false)),
        _ => (),
    }
    if let Some(hex) = word.strip_prefix("0x") {
        return bytes(hex)
            .map(Value::from)
            .ok_or_else(|| LiteralError::Bytes(word.to_owned()));
    }
    if let Ok(int) = word.parse::<i64>() {
        return Ok(Value::Int(int));
    }
    word.parse::<f64>()
        .ok()
        .and_then(|float| FiniteF64::new(float).ok())
        .map(Value::Float)
        .ok_or_else(|| LiteralError::Number(word.to_owned()))
}

fn bytes(hex: &str) -> Option<Vec<u8>> {
    if hex.len() % 2 != 0 || !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }
    (0..hex.len())
        .step_by(2)
        .map(|idx| u8::from_str_radix(&hex[idx..idx + 2], 16).ok())
        .collect()
}
