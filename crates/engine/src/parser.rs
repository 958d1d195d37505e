//! Alert condition parser.
//!
//! Grammar (keywords case-insensitive, `and` binds tighter than `or`):
//!
//! ```text
//! expr     := and_expr ( "or" and_expr )*
//! and_expr := primary ( "and" primary )*
//! primary  := "(" expr ")" | SYMBOL [ ">" | "<" | "=" ] VALUE
//! VALUE    := [ "$" ] decimal
//! ```
//!
//! An omitted operator means `=` ("reaches").

use alertbot_core::{is_symbol_char, Expr, Operator, Symbol};
use rust_decimal::Decimal;
use std::str::FromStr;
use thiserror::Error;

/// User-readable parse failure. Positions are 1-based character columns.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("Alert condition is empty")]
    Empty,

    #[error("Unexpected '{token}' at position {position}, expected {expected}")]
    UnexpectedToken {
        token: String,
        position: usize,
        expected: &'static str,
    },

    #[error("Unexpected end of input, expected {expected}")]
    UnexpectedEnd { expected: &'static str },

    #[error("Invalid number '{token}' at position {position}")]
    InvalidNumber { token: String, position: usize },

    #[error("Threshold must be greater than zero, got '{token}' at position {position}")]
    NonPositiveThreshold { token: String, position: usize },

    #[error("Unbalanced parenthesis '{token}' at position {position}")]
    UnbalancedParenthesis { token: char, position: usize },

    #[error("Invalid character '{character}' at position {position}")]
    InvalidCharacter { character: char, position: usize },
}

impl ParseError {
    /// The offending token, when there is one.
    pub fn token(&self) -> Option<String> {
        match self {
            ParseError::Empty | ParseError::UnexpectedEnd { .. } => None,
            ParseError::UnexpectedToken { token, .. }
            | ParseError::InvalidNumber { token, .. }
            | ParseError::NonPositiveThreshold { token, .. } => Some(token.clone()),
            ParseError::UnbalancedParenthesis { token, .. } => Some(token.to_string()),
            ParseError::InvalidCharacter { character, .. } => Some(character.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum TokenKind {
    Symbol(Symbol),
    Number(Decimal),
    Op(Operator),
    And,
    Or,
    LParen,
    RParen,
}

#[derive(Debug, Clone)]
struct Token {
    kind: TokenKind,
    text: String,
    position: usize,
}

/// Parse an alert condition such as `BTC > 70000 and ETH < 3000`.
pub fn parse_condition(input: &str) -> Result<Expr, ParseError> {
    let tokens = tokenize(input)?;
    if tokens.is_empty() {
        return Err(ParseError::Empty);
    }

    let mut parser = Parser { tokens, pos: 0 };
    let expr = parser.expr()?;

    match parser.peek() {
        None => Ok(expr),
        Some(tok) if tok.kind == TokenKind::RParen => Err(ParseError::UnbalancedParenthesis {
            token: ')',
            position: tok.position,
        }),
        Some(tok) => Err(ParseError::UnexpectedToken {
            token: tok.text.clone(),
            position: tok.position,
            expected: "'and' or 'or'",
        }),
    }
}

fn tokenize(input: &str) -> Result<Vec<Token>, ParseError> {
    let chars: Vec<char> = input.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        let position = i + 1;

        if c.is_whitespace() {
            i += 1;
            continue;
        }

        let single = match c {
            '(' => Some(TokenKind::LParen),
            ')' => Some(TokenKind::RParen),
            _ => Operator::from_char(c).map(TokenKind::Op),
        };
        if let Some(kind) = single {
            tokens.push(Token {
                kind,
                text: c.to_string(),
                position,
            });
            i += 1;
            continue;
        }

        // `$70000`, `-5`: a value with a prefix.
        let prefixed_number = matches!(c, '$' | '-')
            && chars
                .get(i + 1)
                .is_some_and(|n| n.is_ascii_digit() || *n == '.');
        if !(c.is_ascii_alphanumeric() || c == '.' || prefixed_number) {
            return Err(ParseError::InvalidCharacter {
                character: c,
                position,
            });
        }

        let start = i;
        i += 1;
        while i < chars.len() && is_symbol_char(chars[i]) {
            i += 1;
        }
        let text: String = chars[start..i].iter().collect();
        tokens.push(word_token(text, position)?);
    }

    Ok(tokens)
}

fn word_token(text: String, position: usize) -> Result<Token, ParseError> {
    let lower = text.to_ascii_lowercase();
    let kind = if lower == "and" {
        TokenKind::And
    } else if lower == "or" {
        TokenKind::Or
    } else if let Some(symbol) = Symbol::parse(&text) {
        TokenKind::Symbol(symbol)
    } else {
        let digits = text.strip_prefix('$').unwrap_or(&text);
        let value = Decimal::from_str(digits).map_err(|_| ParseError::InvalidNumber {
            token: text.clone(),
            position,
        })?;
        TokenKind::Number(value)
    };
    Ok(Token {
        kind,
        text,
        position,
    })
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let tok = self.tokens.get(self.pos).cloned();
        if tok.is_some() {
            self.pos += 1;
        }
        tok
    }

    fn eat(&mut self, kind: &TokenKind) -> bool {
        if self.peek().is_some_and(|t| &t.kind == kind) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expr(&mut self) -> Result<Expr, ParseError> {
        let mut operands = vec![self.and_expr()?];
        while self.eat(&TokenKind::Or) {
            operands.push(self.and_expr()?);
        }
        Ok(Expr::or(operands))
    }

    fn and_expr(&mut self) -> Result<Expr, ParseError> {
        let mut operands = vec![self.primary()?];
        while self.eat(&TokenKind::And) {
            operands.push(self.primary()?);
        }
        Ok(Expr::and(operands))
    }

    fn primary(&mut self) -> Result<Expr, ParseError> {
        const EXPECTED: &str = "a symbol or '('";

        let tok = self.next().ok_or(ParseError::UnexpectedEnd { expected: EXPECTED })?;
        match tok.kind {
            TokenKind::LParen => {
                let inner = self.expr()?;
                match self.next() {
                    Some(t) if t.kind == TokenKind::RParen => Ok(inner),
                    Some(t) => Err(ParseError::UnexpectedToken {
                        token: t.text,
                        position: t.position,
                        expected: "')'",
                    }),
                    None => Err(ParseError::UnbalancedParenthesis {
                        token: '(',
                        position: tok.position,
                    }),
                }
            }
            TokenKind::RParen => Err(ParseError::UnbalancedParenthesis {
                token: ')',
                position: tok.position,
            }),
            TokenKind::Symbol(symbol) => self.comparison(symbol),
            _ => Err(ParseError::UnexpectedToken {
                token: tok.text,
                position: tok.position,
                expected: EXPECTED,
            }),
        }
    }

    fn comparison(&mut self, symbol: Symbol) -> Result<Expr, ParseError> {
        const EXPECTED: &str = "a price value";

        let operator = match self.peek().map(|t| t.kind.clone()) {
            Some(TokenKind::Op(op)) => {
                self.pos += 1;
                op
            }
            _ => Operator::Equal,
        };

        let tok = self.next().ok_or(ParseError::UnexpectedEnd { expected: EXPECTED })?;
        let TokenKind::Number(threshold) = tok.kind else {
            return Err(ParseError::UnexpectedToken {
                token: tok.text,
                position: tok.position,
                expected: EXPECTED,
            });
        };
        if threshold <= Decimal::ZERO {
            return Err(ParseError::NonPositiveThreshold {
                token: tok.text,
                position: tok.position,
            });
        }

        Ok(Expr::condition(symbol, operator, threshold))
    }
}
