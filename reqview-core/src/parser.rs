//! Parser: converts a token stream into an expression AST.
//!
//! Precedence, lowest first: `?:`, `??`, `||`, `&&`, equality, relational,
//! additive, multiplicative, unary, postfix (`.`, `?.`, `[]`, calls).
use serde_json::Value;
use thiserror::Error;

use crate::ast::{Arg, BinaryOp, Expr, Lambda, LogicalOp, UnaryOp};
use crate::interpreter::number_value;
use crate::lexer::{tokenize, LexError, LocatedToken, Token};

/// Nesting limit for the expression tree. Every sub-expression counts as
/// one level, as does every operator, accessor and call in a chain.
pub const MAX_DEPTH: usize = 128;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ParseError {
    #[error(transparent)]
    Lex(#[from] LexError),

    #[error("Syntax error at {offset}: expected {expected}, found {found}")]
    UnexpectedToken {
        expected: String,
        found: String,
        offset: usize,
    },

    #[error("Unexpected end of expression: expected {expected}")]
    UnexpectedEnd { expected: String },

    #[error("Syntax error at {offset}: only methods and builtin functions can be called")]
    NotCallable { offset: usize },

    #[error("Syntax error at {offset}: expression nested too deeply")]
    TooDeep { offset: usize },
}

/// Tokenize and parse a complete expression.
pub fn parse_expression(source: &str) -> Result<Expr, ParseError> {
    let tokens = tokenize(source)?;
    parse(tokens)
}

/// Parse a token stream (ending in `Token::Eof`) into an expression.
pub fn parse(tokens: Vec<LocatedToken>) -> Result<Expr, ParseError> {
    let mut parser = Parser {
        tokens,
        pos: 0,
        depth: 0,
    };
    let expr = parser.expression()?;
    parser.expect(Token::Eof, "end of expression")?;
    Ok(expr)
}

struct Parser {
    tokens: Vec<LocatedToken>,
    pos: usize,
    depth: usize,
}

impl Parser {
    fn peek(&self) -> &Token {
        self.peek_at(0)
    }

    fn peek_at(&self, ahead: usize) -> &Token {
        self.tokens
            .get(self.pos + ahead)
            .map(|t| &t.token)
            .unwrap_or(&Token::Eof)
    }

    fn offset(&self) -> usize {
        self.tokens
            .get(self.pos)
            .or_else(|| self.tokens.last())
            .map(|t| t.offset)
            .unwrap_or(0)
    }

    fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if self.pos < self.tokens.len() {
            self.pos += 1;
        }
        token
    }

    fn eat(&mut self, token: &Token) -> bool {
        if self.peek() == token {
            self.advance();
            return true;
        }
        false
    }

    fn unexpected(&self, expected: &str) -> ParseError {
        match self.peek() {
            Token::Eof => ParseError::UnexpectedEnd {
                expected: expected.to_string(),
            },
            found => ParseError::UnexpectedToken {
                expected: expected.to_string(),
                found: found.to_string(),
                offset: self.offset(),
            },
        }
    }

    fn expect(&mut self, token: Token, expected: &str) -> Result<(), ParseError> {
        if self.eat(&token) {
            Ok(())
        } else {
            Err(self.unexpected(expected))
        }
    }

    fn enter(&mut self) -> Result<(), ParseError> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return Err(ParseError::TooDeep {
                offset: self.offset(),
            });
        }
        Ok(())
    }

    fn leave(&mut self) {
        self.depth -= 1;
    }

    // ── Grammar ──────────────────────────────────────────────────────

    /// Operator and accessor links taken inside a sub-expression count
    /// toward the depth until the sub-expression is complete.
    fn expression(&mut self) -> Result<Expr, ParseError> {
        let base = self.depth;
        self.enter()?;
        let expr = self.conditional();
        self.depth = base;
        expr
    }

    fn conditional(&mut self) -> Result<Expr, ParseError> {
        let test = self.nullish()?;
        if !self.eat(&Token::Question) {
            return Ok(test);
        }
        let consequent = self.expression()?;
        self.expect(Token::Colon, "':' in conditional expression")?;
        let alternate = self.expression()?;
        Ok(Expr::Conditional {
            test: Box::new(test),
            consequent: Box::new(consequent),
            alternate: Box::new(alternate),
        })
    }

    fn nullish(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.or()?;
        while self.eat(&Token::QuestionQuestion) {
            self.enter()?;
            let right = self.or()?;
            left = logical(LogicalOp::Nullish, left, right);
        }
        Ok(left)
    }

    fn or(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.and()?;
        while self.eat(&Token::OrOr) {
            self.enter()?;
            let right = self.and()?;
            left = logical(LogicalOp::Or, left, right);
        }
        Ok(left)
    }

    fn and(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.equality()?;
        while self.eat(&Token::AndAnd) {
            self.enter()?;
            let right = self.equality()?;
            left = logical(LogicalOp::And, left, right);
        }
        Ok(left)
    }

    fn equality(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.relational()?;
        loop {
            let op = match self.peek() {
                Token::EqEq => BinaryOp::Eq,
                Token::NotEq => BinaryOp::NotEq,
                _ => return Ok(left),
            };
            self.advance();
            self.enter()?;
            let right = self.relational()?;
            left = binary(op, left, right);
        }
    }

    fn relational(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.additive()?;
        loop {
            let op = match self.peek() {
                Token::Lt => BinaryOp::Lt,
                Token::Le => BinaryOp::Le,
                Token::Gt => BinaryOp::Gt,
                Token::Ge => BinaryOp::Ge,
                _ => return Ok(left),
            };
            self.advance();
            self.enter()?;
            let right = self.additive()?;
            left = binary(op, left, right);
        }
    }

    fn additive(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.multiplicative()?;
        loop {
            let op = match self.peek() {
                Token::Plus => BinaryOp::Add,
                Token::Minus => BinaryOp::Sub,
                _ => return Ok(left),
            };
            self.advance();
            self.enter()?;
            let right = self.multiplicative()?;
            left = binary(op, left, right);
        }
    }

    fn multiplicative(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.unary()?;
        loop {
            let op = match self.peek() {
                Token::Star => BinaryOp::Mul,
                Token::Slash => BinaryOp::Div,
                Token::Percent => BinaryOp::Rem,
                _ => return Ok(left),
            };
            self.advance();
            self.enter()?;
            let right = self.unary()?;
            left = binary(op, left, right);
        }
    }

    fn unary(&mut self) -> Result<Expr, ParseError> {
        let op = match self.peek() {
            Token::Bang => UnaryOp::Not,
            Token::Minus => UnaryOp::Neg,
            _ => return self.postfix(),
        };
        self.advance();
        self.enter()?;
        let operand = self.unary();
        self.leave();
        Ok(Expr::Unary {
            op,
            operand: Box::new(operand?),
        })
    }

    fn postfix(&mut self) -> Result<Expr, ParseError> {
        let mut expr = self.primary()?;
        loop {
            if matches!(self.peek(), Token::Dot | Token::QuestionDot | Token::LBracket | Token::LParen) {
                self.enter()?;
            }
            match self.peek() {
                Token::Dot | Token::QuestionDot => {
                    let optional = self.advance() == Token::QuestionDot;
                    let property = self.property_name()?;
                    if self.eat(&Token::LParen) {
                        let args = self.arguments()?;
                        expr = Expr::MethodCall {
                            receiver: Box::new(expr),
                            method: property,
                            args,
                            optional,
                        };
                    } else {
                        expr = Expr::Member {
                            object: Box::new(expr),
                            property,
                            optional,
                        };
                    }
                }
                Token::LBracket => {
                    self.advance();
                    let index = self.expression()?;
                    self.expect(Token::RBracket, "']'")?;
                    expr = Expr::Index {
                        object: Box::new(expr),
                        index: Box::new(index),
                    };
                }
                Token::LParen => {
                    let offset = self.offset();
                    let Expr::Ident(function) = expr else {
                        return Err(ParseError::NotCallable { offset });
                    };
                    self.advance();
                    let args = self.arguments()?;
                    expr = Expr::Call { function, args };
                }
                _ => return Ok(expr),
            }
        }
    }

    /// Name after `.` or `?.`; keywords are valid property names.
    fn property_name(&mut self) -> Result<String, ParseError> {
        let name = match self.peek() {
            Token::Ident(name) => name.clone(),
            Token::True => "true".to_string(),
            Token::False => "false".to_string(),
            Token::Null => "null".to_string(),
            _ => return Err(self.unexpected("property name after '.'")),
        };
        self.advance();
        Ok(name)
    }

    /// Comma-separated call arguments; the opening `(` is already consumed.
    fn arguments(&mut self) -> Result<Vec<Arg>, ParseError> {
        let mut args = Vec::new();
        if self.eat(&Token::RParen) {
            return Ok(args);
        }
        loop {
            args.push(self.argument()?);
            if self.eat(&Token::Comma) {
                continue;
            }
            self.expect(Token::RParen, "',' or ')' in argument list")?;
            return Ok(args);
        }
    }

    fn argument(&mut self) -> Result<Arg, ParseError> {
        if let Some(params) = self.lambda_params() {
            self.enter()?;
            let body = self.expression();
            self.leave();
            return Ok(Arg::Lambda(Lambda {
                params,
                body: Box::new(body?),
            }));
        }
        Ok(Arg::Expr(self.expression()?))
    }

    /// Recognize `x =>` or `(a, b) =>` and consume it, otherwise leave the
    /// position untouched.
    fn lambda_params(&mut self) -> Option<Vec<String>> {
        if let (Token::Ident(name), Token::Arrow) = (self.peek(), self.peek_at(1)) {
            let params = vec![name.clone()];
            self.pos += 2;
            return Some(params);
        }
        if self.peek() != &Token::LParen {
            return None;
        }
        let mut params = Vec::new();
        let mut ahead = 1;
        if self.peek_at(ahead) != &Token::RParen {
            loop {
                let Token::Ident(name) = self.peek_at(ahead) else {
                    return None;
                };
                params.push(name.clone());
                ahead += 1;
                match self.peek_at(ahead) {
                    Token::Comma => ahead += 1,
                    Token::RParen => break,
                    _ => return None,
                }
            }
        }
        if self.peek_at(ahead + 1) != &Token::Arrow {
            return None;
        }
        self.pos += ahead + 2;
        Some(params)
    }

    fn primary(&mut self) -> Result<Expr, ParseError> {
        let expr = match self.peek().clone() {
            Token::Number(n) => Expr::Literal(number_value(n)),
            Token::Str(s) => Expr::Literal(Value::String(s)),
            Token::True => Expr::Literal(Value::Bool(true)),
            Token::False => Expr::Literal(Value::Bool(false)),
            Token::Null => Expr::Literal(Value::Null),
            Token::Ident(name) => Expr::Ident(name),
            Token::LParen => {
                self.advance();
                let inner = self.expression()?;
                self.expect(Token::RParen, "')'")?;
                return Ok(inner);
            }
            Token::LBracket => {
                self.advance();
                return self.array_literal();
            }
            Token::LBrace => {
                self.advance();
                return self.object_literal();
            }
            _ => return Err(self.unexpected("an expression")),
        };
        self.advance();
        Ok(expr)
    }

    fn array_literal(&mut self) -> Result<Expr, ParseError> {
        let mut items = Vec::new();
        loop {
            if self.eat(&Token::RBracket) {
                return Ok(Expr::Array(items));
            }
            items.push(self.expression()?);
            if !self.eat(&Token::Comma) {
                self.expect(Token::RBracket, "',' or ']' in array literal")?;
                return Ok(Expr::Array(items));
            }
        }
    }

    fn object_literal(&mut self) -> Result<Expr, ParseError> {
        let mut fields = Vec::new();
        loop {
            if self.eat(&Token::RBrace) {
                return Ok(Expr::Object(fields));
            }
            let (key, shorthand) = match self.peek().clone() {
                Token::Ident(name) => (name, true),
                Token::Str(s) => (s, false),
                Token::True => ("true".to_string(), false),
                Token::False => ("false".to_string(), false),
                Token::Null => ("null".to_string(), false),
                _ => return Err(self.unexpected("property name in object literal")),
            };
            self.advance();
            let value = if self.eat(&Token::Colon) {
                self.expression()?
            } else if shorthand {
                Expr::Ident(key.clone())
            } else {
                return Err(self.unexpected("':' after property name"));
            };
            fields.push((key, value));
            if !self.eat(&Token::Comma) {
                self.expect(Token::RBrace, "',' or '}' in object literal")?;
                return Ok(Expr::Object(fields));
            }
        }
    }
}

fn binary(op: BinaryOp, left: Expr, right: Expr) -> Expr {
    Expr::Binary {
        op,
        left: Box::new(left),
        right: Box::new(right),
    }
}

fn logical(op: LogicalOp, left: Expr, right: Expr) -> Expr {
    Expr::Logical {
        op,
        left: Box::new(left),
        right: Box::new(right),
    }
}
