// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Result, anyhow, bail};
use serde_json::Value;

use roster_app::Fields;

/// Parsed form of the filter grammar the browsers emit:
/// `substringof('x', Field)`, `Field eq 'x'`, `and`, `or`, parentheses.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    Always,
    Substring { needle: String, field: String },
    Equals { field: String, value: Value },
    And(Box<Predicate>, Box<Predicate>),
    Or(Box<Predicate>, Box<Predicate>),
}

impl Predicate {
    pub fn parse(input: &str) -> Result<Self> {
        let tokens = tokenize(input)?;
        if tokens.is_empty() {
            return Ok(Self::Always);
        }
        let mut parser = Parser { tokens, index: 0 };
        let predicate = parser.parse_or()?;
        if let Some(token) = parser.peek() {
            bail!("unexpected {token:?} after end of filter");
        }
        Ok(predicate)
    }

    /// Matching is case-sensitive; a missing or null column never matches.
    pub fn matches(&self, record: &Fields) -> bool {
        match self {
            Self::Always => true,
            Self::Substring { needle, field } => record
                .get(field)
                .and_then(Value::as_str)
                .is_some_and(|text| text.contains(needle.as_str())),
            Self::Equals { field, value } => match (record.get(field), value) {
                (Some(Value::String(text)), Value::String(expected)) => text == expected,
                (Some(Value::Number(number)), Value::Number(expected)) => {
                    number.as_f64() == expected.as_f64()
                }
                (Some(actual), expected) => actual == expected,
                (None, _) => false,
            },
            Self::And(left, right) => left.matches(record) && right.matches(record),
            Self::Or(left, right) => left.matches(record) || right.matches(record),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Word(String),
    Text(String),
    Number(String),
    Open,
    Close,
    Comma,
}

fn tokenize(input: &str) -> Result<Vec<Token>> {
    let chars: Vec<char> = input.chars().collect();
    let mut tokens = Vec::new();
    let mut index = 0;

    while index < chars.len() {
        let ch = chars[index];

        if ch.is_whitespace() {
            index += 1;
            continue;
        }

        match ch {
            '(' => tokens.push(Token::Open),
            ')' => tokens.push(Token::Close),
            ',' => tokens.push(Token::Comma),
            '\'' => {
                let mut text = String::new();
                let mut next = index + 1;
                loop {
                    let Some(&current) = chars.get(next) else {
                        bail!("unterminated string literal in filter");
                    };
                    if current == '\'' {
                        if chars.get(next + 1) == Some(&'\'') {
                            text.push('\'');
                            next += 2;
                            continue;
                        }
                        break;
                    }
                    text.push(current);
                    next += 1;
                }
                tokens.push(Token::Text(text));
                index = next + 1;
                continue;
            }
            _ if ch.is_ascii_digit() || ch == '-' => {
                let start = index;
                index += 1;
                while index < chars.len() && (chars[index].is_ascii_digit() || chars[index] == '.')
                {
                    index += 1;
                }
                tokens.push(Token::Number(chars[start..index].iter().collect()));
                continue;
            }
            _ if ch.is_alphanumeric() || ch == '_' => {
                let start = index;
                while index < chars.len() && (chars[index].is_alphanumeric() || chars[index] == '_')
                {
                    index += 1;
                }
                tokens.push(Token::Word(chars[start..index].iter().collect()));
                continue;
            }
            other => bail!("unexpected character {other:?} in filter"),
        }
        index += 1;
    }

    Ok(tokens)
}

struct Parser {
    tokens: Vec<Token>,
    index: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.index)
    }

    fn advance(&mut self) -> Result<Token> {
        let token = self
            .tokens
            .get(self.index)
            .cloned()
            .ok_or_else(|| anyhow!("filter ended unexpectedly"))?;
        self.index += 1;
        Ok(token)
    }

    fn expect(&mut self, expected: &Token) -> Result<()> {
        let token = self.advance()?;
        if &token != expected {
            bail!("expected {expected:?} in filter, found {token:?}");
        }
        Ok(())
    }

    fn keyword(&self, word: &str) -> bool {
        matches!(self.peek(), Some(Token::Word(current)) if current == word)
    }

    fn parse_or(&mut self) -> Result<Predicate> {
        let mut left = self.parse_and()?;
        while self.keyword("or") {
            self.index += 1;
            let right = self.parse_and()?;
            left = Predicate::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Predicate> {
        let mut left = self.parse_atom()?;
        while self.keyword("and") {
            self.index += 1;
            let right = self.parse_atom()?;
            left = Predicate::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_atom(&mut self) -> Result<Predicate> {
        match self.advance()? {
            Token::Open => {
                let inner = self.parse_or()?;
                self.expect(&Token::Close)?;
                Ok(inner)
            }
            Token::Word(word) if word == "substringof" => {
                self.expect(&Token::Open)?;
                let Token::Text(needle) = self.advance()? else {
                    bail!("substringof expects a string literal first");
                };
                self.expect(&Token::Comma)?;
                let Token::Word(field) = self.advance()? else {
                    bail!("substringof expects a field name second");
                };
                self.expect(&Token::Close)?;
                Ok(Predicate::Substring { needle, field })
            }
            Token::Word(field) => {
                self.expect(&Token::Word("eq".to_owned()))?;
                let value = match self.advance()? {
                    Token::Text(text) => Value::String(text),
                    Token::Number(raw) => serde_json::from_str(&raw)
                        .map_err(|_| anyhow!("invalid number {raw:?} in filter"))?,
                    other => bail!("expected a literal after eq, found {other:?}"),
                };
                Ok(Predicate::Equals { field, value })
            }
            other => bail!("unexpected {other:?} in filter"),
        }
    }
}
