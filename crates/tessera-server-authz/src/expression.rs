// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Subject predicates used in ACL entries and `authorize_expression`.
//!
//! ```text
//! or      := and ( "||" and )*
//! and     := unary ( "&&" unary )*
//! unary   := "!" unary | primary
//! primary := "(" or ")" | ident ( "=" | "!=" ) value
//! value   := "quoted \"string\"" | bareword
//! ```
//!
//! Recognised attributes: `user` (case-insensitive, `anybody` matches every
//! subject), `group` and `role` (membership, case-insensitive). Any other
//! identifier is looked up as a token attribute and compared exactly.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

use crate::token::AuthToken;

/// `user="anybody"` matches every authenticated subject.
pub const ANYBODY: &str = "anybody";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExpressionError {
	#[error("empty expression")]
	Empty,

	#[error("unexpected character '{ch}' at position {position}")]
	UnexpectedChar { ch: char, position: usize },

	#[error("unterminated string starting at position {0}")]
	UnterminatedString(usize),

	#[error("expected {expected}, found {found}")]
	UnexpectedToken { expected: &'static str, found: String },

	#[error("unexpected end of expression, expected {0}")]
	UnexpectedEnd(&'static str),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
	Eq,
	Ne,
}

impl fmt::Display for CompareOp {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			CompareOp::Eq => f.write_str("="),
			CompareOp::Ne => f.write_str("!="),
		}
	}
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expression {
	Compare {
		attribute: String,
		op: CompareOp,
		value: String,
	},
	And(Box<Expression>, Box<Expression>),
	Or(Box<Expression>, Box<Expression>),
	Not(Box<Expression>),
}

impl Expression {
	pub fn parse(input: &str) -> Result<Self, ExpressionError> {
		let tokens = tokenize(input)?;
		if tokens.is_empty() {
			return Err(ExpressionError::Empty);
		}
		let mut parser = Parser { tokens, pos: 0 };
		let expr = parser.parse_or()?;
		match parser.peek() {
			None => Ok(expr),
			Some(tok) => Err(ExpressionError::UnexpectedToken {
				expected: "end of expression",
				found: tok.to_string(),
			}),
		}
	}

	pub fn compare(attribute: &str, op: CompareOp, value: &str) -> Self {
		Expression::Compare {
			attribute: attribute.to_string(),
			op,
			value: value.to_string(),
		}
	}

	pub fn evaluate(&self, token: &AuthToken) -> bool {
		match self {
			Expression::Compare {
				attribute,
				op,
				value,
			} => {
				let matched = match_attribute(token, attribute, value);
				match op {
					CompareOp::Eq => matched,
					CompareOp::Ne => !matched,
				}
			}
			Expression::And(lhs, rhs) => lhs.evaluate(token) && rhs.evaluate(token),
			Expression::Or(lhs, rhs) => lhs.evaluate(token) || rhs.evaluate(token),
			Expression::Not(inner) => !inner.evaluate(token),
		}
	}

	fn is_binary(&self) -> bool {
		matches!(self, Expression::And(..) | Expression::Or(..))
	}
}

fn match_attribute(token: &AuthToken, attribute: &str, value: &str) -> bool {
	match attribute.to_ascii_lowercase().as_str() {
		"user" => value.eq_ignore_ascii_case(ANYBODY) || token.user_id().eq_ignore_ascii_case(value),
		"group" => token.is_member_of(value),
		"role" => token.has_role(value),
		_ => token
			.attribute(attribute)
			.map(|values| values.iter().any(|v| v == value))
			.unwrap_or(false),
	}
}

impl FromStr for Expression {
	type Err = ExpressionError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		Expression::parse(s)
	}
}

impl fmt::Display for Expression {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Expression::Compare {
				attribute,
				op,
				value,
			} => {
				write!(f, "{attribute}{op}\"")?;
				for ch in value.chars() {
					if ch == '"' || ch == '\\' {
						f.write_str("\\")?;
					}
					write!(f, "{ch}")?;
				}
				f.write_str("\"")
			}
			Expression::And(lhs, rhs) => {
				write_operand(f, lhs)?;
				f.write_str(" && ")?;
				write_operand(f, rhs)
			}
			Expression::Or(lhs, rhs) => {
				write_operand(f, lhs)?;
				f.write_str(" || ")?;
				write_operand(f, rhs)
			}
			Expression::Not(inner) => {
				f.write_str("!")?;
				write_operand(f, inner)
			}
		}
	}
}

fn write_operand(f: &mut fmt::Formatter<'_>, expr: &Expression) -> fmt::Result {
	if expr.is_binary() {
		write!(f, "({expr})")
	} else {
		write!(f, "{expr}")
	}
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
	LParen,
	RParen,
	And,
	Or,
	Not,
	Eq,
	Ne,
	Ident(String),
	Str(String),
}

impl fmt::Display for Token {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Token::LParen => f.write_str("'('"),
			Token::RParen => f.write_str("')'"),
			Token::And => f.write_str("'&&'"),
			Token::Or => f.write_str("'||'"),
			Token::Not => f.write_str("'!'"),
			Token::Eq => f.write_str("'='"),
			Token::Ne => f.write_str("'!='"),
			Token::Ident(s) => write!(f, "'{s}'"),
			Token::Str(s) => write!(f, "\"{s}\""),
		}
	}
}

fn is_word_char(ch: char) -> bool {
	ch.is_ascii_alphanumeric() || matches!(ch, '_' | '-' | '.' | '@' | '*')
}

fn tokenize(input: &str) -> Result<Vec<Token>, ExpressionError> {
	let chars: Vec<char> = input.chars().collect();
	let mut tokens = Vec::new();
	let mut i = 0;

	while i < chars.len() {
		let ch = chars[i];
		match ch {
			c if c.is_whitespace() => i += 1,
			'(' => {
				tokens.push(Token::LParen);
				i += 1;
			}
			')' => {
				tokens.push(Token::RParen);
				i += 1;
			}
			'&' if chars.get(i + 1) == Some(&'&') => {
				tokens.push(Token::And);
				i += 2;
			}
			'|' if chars.get(i + 1) == Some(&'|') => {
				tokens.push(Token::Or);
				i += 2;
			}
			'!' if chars.get(i + 1) == Some(&'=') => {
				tokens.push(Token::Ne);
				i += 2;
			}
			'!' => {
				tokens.push(Token::Not);
				i += 1;
			}
			'=' => {
				tokens.push(Token::Eq);
				i += 1;
			}
			'"' => {
				let start = i;
				i += 1;
				let mut value = String::new();
				loop {
					match chars.get(i) {
						None => return Err(ExpressionError::UnterminatedString(start)),
						Some('"') => {
							i += 1;
							break;
						}
						Some('\\') => {
							let escaped = chars
								.get(i + 1)
								.ok_or(ExpressionError::UnterminatedString(start))?;
							value.push(*escaped);
							i += 2;
						}
						Some(c) => {
							value.push(*c);
							i += 1;
						}
					}
				}
				tokens.push(Token::Str(value));
			}
			c if is_word_char(c) => {
				let start = i;
				while i < chars.len() && is_word_char(chars[i]) {
					i += 1;
				}
				tokens.push(Token::Ident(chars[start..i].iter().collect()));
			}
			other => {
				return Err(ExpressionError::UnexpectedChar {
					ch: other,
					position: i,
				})
			}
		}
	}

	Ok(tokens)
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
		self.pos += 1;
		tok
	}

	fn parse_or(&mut self) -> Result<Expression, ExpressionError> {
		let mut lhs = self.parse_and()?;
		while self.peek() == Some(&Token::Or) {
			self.pos += 1;
			let rhs = self.parse_and()?;
			lhs = Expression::Or(Box::new(lhs), Box::new(rhs));
		}
		Ok(lhs)
	}

	fn parse_and(&mut self) -> Result<Expression, ExpressionError> {
		let mut lhs = self.parse_unary()?;
		while self.peek() == Some(&Token::And) {
			self.pos += 1;
			let rhs = self.parse_unary()?;
			lhs = Expression::And(Box::new(lhs), Box::new(rhs));
		}
		Ok(lhs)
	}

	fn parse_unary(&mut self) -> Result<Expression, ExpressionError> {
		if self.peek() == Some(&Token::Not) {
			self.pos += 1;
			let inner = self.parse_unary()?;
			return Ok(Expression::Not(Box::new(inner)));
		}
		self.parse_primary()
	}

	fn parse_primary(&mut self) -> Result<Expression, ExpressionError> {
		match self.next() {
			Some(Token::LParen) => {
				let inner = self.parse_or()?;
				match self.next() {
					Some(Token::RParen) => Ok(inner),
					Some(tok) => Err(ExpressionError::UnexpectedToken {
						expected: "')'",
						found: tok.to_string(),
					}),
					None => Err(ExpressionError::UnexpectedEnd("')'")),
				}
			}
			Some(Token::Ident(attribute)) => {
				let op = match self.next() {
					Some(Token::Eq) => CompareOp::Eq,
					Some(Token::Ne) => CompareOp::Ne,
					Some(tok) => {
						return Err(ExpressionError::UnexpectedToken {
							expected: "'=' or '!='",
							found: tok.to_string(),
						})
					}
					None => return Err(ExpressionError::UnexpectedEnd("'=' or '!='")),
				};
				let value = match self.next() {
					Some(Token::Str(v)) | Some(Token::Ident(v)) => v,
					Some(tok) => {
						return Err(ExpressionError::UnexpectedToken {
							expected: "a value",
							found: tok.to_string(),
						})
					}
					None => return Err(ExpressionError::UnexpectedEnd("a value")),
				};
				Ok(Expression::Compare {
					attribute,
					op,
					value,
				})
			}
			Some(tok) => Err(ExpressionError::UnexpectedToken {
				expected: "an attribute or '('",
				found: tok.to_string(),
			}),
			None => Err(ExpressionError::UnexpectedEnd("an attribute or '('")),
		}
	}
}
