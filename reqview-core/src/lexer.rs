//! Lexer (tokenizer) for transform expressions.

use thiserror::Error;

/// Token types produced by the lexer.
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Number(f64),
    Str(String),
    Ident(String),
    True,
    False,
    Null,
    LParen,
    RParen,
    LBracket,
    RBracket,
    LBrace,
    RBrace,
    Comma,
    Colon,
    Dot,
    /// `?.`
    QuestionDot,
    Question,
    /// `??`
    QuestionQuestion,
    /// `=>`
    Arrow,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Bang,
    /// `==` and `===`
    EqEq,
    /// `!=` and `!==`
    NotEq,
    Lt,
    Le,
    Gt,
    Ge,
    AndAnd,
    OrOr,
    Eof,
}

impl std::fmt::Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Token::Number(n) => write!(f, "number {}", n),
            Token::Str(s) => write!(f, "string {:?}", s),
            Token::Ident(name) => write!(f, "identifier '{}'", name),
            Token::True => write!(f, "'true'"),
            Token::False => write!(f, "'false'"),
            Token::Null => write!(f, "'null'"),
            Token::Eof => write!(f, "end of expression"),
            other => write!(f, "'{}'", punct_text(other)),
        }
    }
}

fn punct_text(token: &Token) -> &'static str {
    match token {
        Token::LParen => "(",
        Token::RParen => ")",
        Token::LBracket => "[",
        Token::RBracket => "]",
        Token::LBrace => "{",
        Token::RBrace => "}",
        Token::Comma => ",",
        Token::Colon => ":",
        Token::Dot => ".",
        Token::QuestionDot => "?.",
        Token::Question => "?",
        Token::QuestionQuestion => "??",
        Token::Arrow => "=>",
        Token::Plus => "+",
        Token::Minus => "-",
        Token::Star => "*",
        Token::Slash => "/",
        Token::Percent => "%",
        Token::Bang => "!",
        Token::EqEq => "==",
        Token::NotEq => "!=",
        Token::Lt => "<",
        Token::Le => "<=",
        Token::Gt => ">",
        Token::Ge => ">=",
        Token::AndAnd => "&&",
        Token::OrOr => "||",
        _ => "?",
    }
}

/// A token with its byte offset in the source.
#[derive(Debug, Clone)]
pub struct LocatedToken {
    pub token: Token,
    pub offset: usize,
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum LexError {
    #[error("Syntax error at {offset}: unexpected character '{ch}'")]
    UnexpectedChar { ch: char, offset: usize },
    #[error("Syntax error at {offset}: unterminated string")]
    UnterminatedString { offset: usize },
    #[error("Syntax error at {offset}: invalid escape sequence")]
    InvalidEscape { offset: usize },
    #[error("Syntax error at {offset}: invalid number '{text}'")]
    InvalidNumber { text: String, offset: usize },
}

/// Internal lexer state.
struct Lexer<'a> {
    src: &'a str,
    chars: std::iter::Peekable<std::str::CharIndices<'a>>,
    tokens: Vec<LocatedToken>,
}

impl<'a> Lexer<'a> {
    fn new(src: &'a str) -> Self {
        Self {
            src,
            chars: src.char_indices().peekable(),
            tokens: Vec::new(),
        }
    }

    fn push(&mut self, token: Token, offset: usize) {
        self.tokens.push(LocatedToken { token, offset });
    }

    fn peek_char(&mut self) -> Option<char> {
        self.chars.peek().map(|&(_, c)| c)
    }

    /// Consume the next char if it equals `expected`.
    fn eat(&mut self, expected: char) -> bool {
        if self.peek_char() == Some(expected) {
            self.chars.next();
            return true;
        }
        false
    }

    /// The char after the next one, without consuming anything.
    fn peek_second(&self) -> Option<char> {
        let mut ahead = self.chars.clone();
        ahead.next();
        ahead.next().map(|(_, c)| c)
    }

    // ── Individual classifiers ───────────────────────────────────────

    fn lex_number(&mut self, start: usize) -> Result<(), LexError> {
        let mut end = start;
        let mut seen_dot = false;
        let mut seen_exp = false;
        let mut prev = None;
        while let Some(&(idx, c)) = self.chars.peek() {
            let accept = match c {
                '0'..='9' => true,
                '.' if !seen_dot && !seen_exp => {
                    // `1.foo` is not a number continuation
                    matches!(self.peek_second(), Some('0'..='9'))
                }
                'e' | 'E' if !seen_exp && prev.is_some() => {
                    seen_exp = true;
                    true
                }
                '+' | '-' => matches!(prev, Some('e' | 'E')),
                _ => false,
            };
            if !accept {
                break;
            }
            if c == '.' {
                seen_dot = true;
            }
            self.chars.next();
            prev = Some(c);
            end = idx + c.len_utf8();
        }
        let text = &self.src[start..end];
        let value = text.parse::<f64>().map_err(|_| LexError::InvalidNumber {
            text: text.to_string(),
            offset: start,
        })?;
        self.push(Token::Number(value), start);
        Ok(())
    }

    fn lex_string(&mut self, quote: char, start: usize) -> Result<(), LexError> {
        let mut out = String::new();
        loop {
            let Some((idx, c)) = self.chars.next() else {
                return Err(LexError::UnterminatedString { offset: start });
            };
            match c {
                c if c == quote => break,
                '\\' => {
                    let Some((_, esc)) = self.chars.next() else {
                        return Err(LexError::UnterminatedString { offset: start });
                    };
                    match esc {
                        'n' => out.push('\n'),
                        't' => out.push('\t'),
                        'r' => out.push('\r'),
                        '0' => out.push('\0'),
                        '\\' | '\'' | '"' => out.push(esc),
                        'u' => out.push(self.lex_unicode_escape(idx)?),
                        _ => return Err(LexError::InvalidEscape { offset: idx }),
                    }
                }
                '\n' => return Err(LexError::UnterminatedString { offset: start }),
                c => out.push(c),
            }
        }
        self.push(Token::Str(out), start);
        Ok(())
    }

    /// `\uXXXX`
    fn lex_unicode_escape(&mut self, offset: usize) -> Result<char, LexError> {
        let mut code = 0u32;
        for _ in 0..4 {
            let digit = self
                .chars
                .next()
                .and_then(|(_, c)| c.to_digit(16))
                .ok_or(LexError::InvalidEscape { offset })?;
            code = code * 16 + digit;
        }
        char::from_u32(code).ok_or(LexError::InvalidEscape { offset })
    }

    fn lex_word(&mut self, start: usize) {
        let mut end = start;
        while let Some(&(idx, c)) = self.chars.peek() {
            if !(c.is_alphanumeric() || c == '_' || c == '$') {
                break;
            }
            self.chars.next();
            end = idx + c.len_utf8();
        }
        let token = match &self.src[start..end] {
            "true" => Token::True,
            "false" => Token::False,
            "null" | "undefined" => Token::Null,
            word => Token::Ident(word.to_string()),
        };
        self.push(token, start);
    }

    fn lex_punct(&mut self, c: char, offset: usize) -> Result<(), LexError> {
        let token = match c {
            '(' => Token::LParen,
            ')' => Token::RParen,
            '[' => Token::LBracket,
            ']' => Token::RBracket,
            '{' => Token::LBrace,
            '}' => Token::RBrace,
            ',' => Token::Comma,
            ':' => Token::Colon,
            '.' => Token::Dot,
            '+' => Token::Plus,
            '-' => Token::Minus,
            '*' => Token::Star,
            '/' => Token::Slash,
            '%' => Token::Percent,
            '?' => {
                if self.eat('?') {
                    Token::QuestionQuestion
                } else if self.peek_char() == Some('.')
                    && !matches!(self.peek_second(), Some('0'..='9'))
                {
                    self.chars.next();
                    Token::QuestionDot
                } else {
                    Token::Question
                }
            }
            '=' => {
                if self.eat('>') {
                    Token::Arrow
                } else if self.eat('=') {
                    self.eat('=');
                    Token::EqEq
                } else {
                    return Err(LexError::UnexpectedChar { ch: '=', offset });
                }
            }
            '!' => {
                if self.eat('=') {
                    self.eat('=');
                    Token::NotEq
                } else {
                    Token::Bang
                }
            }
            '<' => {
                if self.eat('=') {
                    Token::Le
                } else {
                    Token::Lt
                }
            }
            '>' => {
                if self.eat('=') {
                    Token::Ge
                } else {
                    Token::Gt
                }
            }
            '&' if self.eat('&') => Token::AndAnd,
            '|' if self.eat('|') => Token::OrOr,
            other => return Err(LexError::UnexpectedChar { ch: other, offset }),
        };
        self.push(token, offset);
        Ok(())
    }

    // ── Main entry point ─────────────────────────────────────────────

    fn run(mut self) -> Result<Vec<LocatedToken>, LexError> {
        while let Some(&(offset, c)) = self.chars.peek() {
            if c.is_whitespace() {
                self.chars.next();
                continue;
            }
            if c.is_ascii_digit() {
                self.lex_number(offset)?;
                continue;
            }
            // `.5` is a number, `.name` is member access
            if c == '.' && matches!(self.peek_second(), Some('0'..='9')) {
                self.lex_number(offset)?;
                continue;
            }
            self.chars.next();
            if c == '"' || c == '\'' {
                self.lex_string(c, offset)?;
            } else if c.is_alphabetic() || c == '_' || c == '$' {
                self.lex_word(offset);
            } else {
                self.lex_punct(c, offset)?;
            }
        }
        let end = self.src.len();
        self.push(Token::Eof, end);
        Ok(self.tokens)
    }
}

/// Tokenize a transform expression. The result always ends with `Token::Eof`.
pub fn tokenize(input: &str) -> Result<Vec<LocatedToken>, LexError> {
    Lexer::new(input).run()
}
