use std::fmt;

use crate::value::CompileError;

/// Source position of a token, 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Pos {
    pub line: usize,
    pub column: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    Int(i64),
    Float(f64),
    Str(String),
    Ident(String),

    // Keywords
    Fn,
    Var,
    True,
    False,
    Null,
    If,
    Else,
    For,
    Loop,
    Return,
    Break,
    Continue,

    // Operators
    Assign,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Lt,
    Gt,
    Le,
    Ge,
    EqEq,
    NotEq,
    Bang,
    AndAnd,
    OrOr,
    PlusAssign,
    MinusAssign,
    StarAssign,
    SlashAssign,
    Inc,
    Dec,

    // Delimiters
    Comma,
    Semicolon,
    Colon,
    LParen,
    RParen,
    LBrace,
    RBrace,
    LBracket,
    RBracket,

    Eof,
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            TokenKind::Int(i) => return write!(f, "{}", i),
            TokenKind::Float(x) => return write!(f, "{:?}", x),
            TokenKind::Str(s) => return write!(f, "\"{}\"", s),
            TokenKind::Ident(name) => return f.write_str(name),
            TokenKind::Fn => "fn",
            TokenKind::Var => "var",
            TokenKind::True => "true",
            TokenKind::False => "false",
            TokenKind::Null => "null",
            TokenKind::If => "if",
            TokenKind::Else => "else",
            TokenKind::For => "for",
            TokenKind::Loop => "loop",
            TokenKind::Return => "return",
            TokenKind::Break => "break",
            TokenKind::Continue => "continue",
            TokenKind::Assign => "=",
            TokenKind::Plus => "+",
            TokenKind::Minus => "-",
            TokenKind::Star => "*",
            TokenKind::Slash => "/",
            TokenKind::Percent => "%",
            TokenKind::Lt => "<",
            TokenKind::Gt => ">",
            TokenKind::Le => "<=",
            TokenKind::Ge => ">=",
            TokenKind::EqEq => "==",
            TokenKind::NotEq => "!=",
            TokenKind::Bang => "!",
            TokenKind::AndAnd => "&&",
            TokenKind::OrOr => "||",
            TokenKind::PlusAssign => "+=",
            TokenKind::MinusAssign => "-=",
            TokenKind::StarAssign => "*=",
            TokenKind::SlashAssign => "/=",
            TokenKind::Inc => "++",
            TokenKind::Dec => "--",
            TokenKind::Comma => ",",
            TokenKind::Semicolon => ";",
            TokenKind::Colon => ":",
            TokenKind::LParen => "(",
            TokenKind::RParen => ")",
            TokenKind::LBrace => "{",
            TokenKind::RBrace => "}",
            TokenKind::LBracket => "[",
            TokenKind::RBracket => "]",
            TokenKind::Eof => "<eof>",
        };
        f.write_str(text)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub pos: Pos,
}

fn keyword(ident: &str) -> Option<TokenKind> {
    let kind = match ident {
        "fn" => TokenKind::Fn,
        "var" => TokenKind::Var,
        "true" => TokenKind::True,
        "false" => TokenKind::False,
        "null" => TokenKind::Null,
        "if" => TokenKind::If,
        "else" => TokenKind::Else,
        "for" => TokenKind::For,
        "loop" => TokenKind::Loop,
        "return" => TokenKind::Return,
        "break" => TokenKind::Break,
        "continue" => TokenKind::Continue,
        _ => return None,
    };
    Some(kind)
}

pub struct Lexer<'a> {
    chars: Vec<char>,
    pos: usize,
    line: usize,
    column: usize,
    file: &'a str,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &str, file: &'a str) -> Self {
        Self {
            chars: input.chars().collect(),
            pos: 0,
            line: 1,
            column: 1,
            file,
        }
    }

    /// Lex the whole input into a token vector ending with `Eof`.
    pub fn tokenize(mut self) -> Result<Vec<Token>, CompileError> {
        let mut tokens = Vec::new();
        loop {
            let token = self.next_token()?;
            let done = token.kind == TokenKind::Eof;
            tokens.push(token);
            if done {
                return Ok(tokens);
            }
        }
    }

    fn error(&self, message: impl Into<String>) -> CompileError {
        CompileError::new(message, self.file, self.line, self.column)
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_next(&self) -> Option<char> {
        self.chars.get(self.pos + 1).copied()
    }

    fn advance(&mut self) -> Option<char> {
        let ch = self.peek()?;
        self.pos += 1;
        if ch == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(ch)
    }

    fn skip_whitespace_and_comments(&mut self) -> Result<(), CompileError> {
        loop {
            match self.peek() {
                Some(ch) if ch.is_whitespace() => {
                    self.advance();
                }
                Some('/') if self.peek_next() == Some('/') => {
                    while let Some(ch) = self.peek() {
                        if ch == '\n' {
                            break;
                        }
                        self.advance();
                    }
                }
                Some('/') if self.peek_next() == Some('*') => {
                    let start = Pos {
                        line: self.line,
                        column: self.column,
                    };
                    self.advance();
                    self.advance();
                    loop {
                        match self.peek() {
                            Some('*') if self.peek_next() == Some('/') => {
                                self.advance();
                                self.advance();
                                break;
                            }
                            Some(_) => {
                                self.advance();
                            }
                            None => {
                                return Err(CompileError::new(
                                    "unterminated block comment",
                                    self.file,
                                    start.line,
                                    start.column,
                                ))
                            }
                        }
                    }
                }
                _ => return Ok(()),
            }
        }
    }

    fn next_token(&mut self) -> Result<Token, CompileError> {
        self.skip_whitespace_and_comments()?;

        let pos = Pos {
            line: self.line,
            column: self.column,
        };

        let ch = match self.advance() {
            Some(ch) => ch,
            None => {
                return Ok(Token {
                    kind: TokenKind::Eof,
                    pos,
                })
            }
        };

        let kind = match ch {
            '=' => self.pick('=', TokenKind::EqEq, TokenKind::Assign),
            '!' => self.pick('=', TokenKind::NotEq, TokenKind::Bang),
            '<' => self.pick('=', TokenKind::Le, TokenKind::Lt),
            '>' => self.pick('=', TokenKind::Ge, TokenKind::Gt),
            '+' => {
                if self.consume('+') {
                    TokenKind::Inc
                } else {
                    self.pick('=', TokenKind::PlusAssign, TokenKind::Plus)
                }
            }
            '-' => {
                if self.consume('-') {
                    TokenKind::Dec
                } else {
                    self.pick('=', TokenKind::MinusAssign, TokenKind::Minus)
                }
            }
            '*' => self.pick('=', TokenKind::StarAssign, TokenKind::Star),
            '/' => self.pick('=', TokenKind::SlashAssign, TokenKind::Slash),
            '%' => TokenKind::Percent,
            '&' => {
                if self.consume('&') {
                    TokenKind::AndAnd
                } else {
                    return Err(self.error("unexpected character '&' (did you mean '&&'?)"));
                }
            }
            '|' => {
                if self.consume('|') {
                    TokenKind::OrOr
                } else {
                    return Err(self.error("unexpected character '|' (did you mean '||'?)"));
                }
            }
            ',' => TokenKind::Comma,
            ';' => TokenKind::Semicolon,
            ':' => TokenKind::Colon,
            '(' => TokenKind::LParen,
            ')' => TokenKind::RParen,
            '{' => TokenKind::LBrace,
            '}' => TokenKind::RBrace,
            '[' => TokenKind::LBracket,
            ']' => TokenKind::RBracket,
            '"' => self.read_string(pos)?,
            _ if ch.is_ascii_digit() => self.read_number(ch, pos)?,
            _ if ch.is_alphabetic() || ch == '_' => {
                let ident = self.read_identifier(ch);
                keyword(&ident).unwrap_or(TokenKind::Ident(ident))
            }
            _ => {
                return Err(CompileError::new(
                    format!("unexpected character {:?}", ch),
                    self.file,
                    pos.line,
                    pos.column,
                ))
            }
        };

        Ok(Token { kind, pos })
    }

    /// Consume `expected` and return `double` if it follows, else `single`.
    fn pick(&mut self, expected: char, double: TokenKind, single: TokenKind) -> TokenKind {
        if self.consume(expected) {
            double
        } else {
            single
        }
    }

    fn consume(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.advance();
            return true;
        }
        false
    }

    fn read_identifier(&mut self, first: char) -> String {
        let mut ident = String::new();
        ident.push(first);
        while let Some(ch) = self.peek() {
            if ch.is_alphanumeric() || ch == '_' {
                ident.push(ch);
                self.advance();
            } else {
                break;
            }
        }
        ident
    }

    fn read_number(&mut self, first: char, pos: Pos) -> Result<TokenKind, CompileError> {
        let mut literal = String::new();
        literal.push(first);
        while let Some(ch) = self.peek() {
            if ch.is_ascii_digit() {
                literal.push(ch);
                self.advance();
            } else {
                break;
            }
        }

        // A '.' followed by a digit makes this a float literal.
        if self.peek() == Some('.') && self.peek_next().map_or(false, |c| c.is_ascii_digit()) {
            literal.push('.');
            self.advance();
            while let Some(ch) = self.peek() {
                if ch.is_ascii_digit() {
                    literal.push(ch);
                    self.advance();
                } else {
                    break;
                }
            }
            let value: f64 = literal.parse().map_err(|_| {
                CompileError::new(
                    format!("could not parse {:?} as float", literal),
                    self.file,
                    pos.line,
                    pos.column,
                )
            })?;
            return Ok(TokenKind::Float(value));
        }

        let value: i64 = literal.parse().map_err(|_| {
            CompileError::new(
                format!("could not parse {:?} as integer", literal),
                self.file,
                pos.line,
                pos.column,
            )
        })?;
        Ok(TokenKind::Int(value))
    }

    fn read_string(&mut self, pos: Pos) -> Result<TokenKind, CompileError> {
        let mut value = String::new();
        loop {
            match self.advance() {
                Some('"') => return Ok(TokenKind::Str(value)),
                Some('\\') => match self.advance() {
                    Some('n') => value.push('\n'),
                    Some('t') => value.push('\t'),
                    Some('r') => value.push('\r'),
                    Some('\\') => value.push('\\'),
                    Some('"') => value.push('"'),
                    Some(other) => value.push(other),
                    None => {
                        return Err(CompileError::new(
                            "unterminated string literal",
                            self.file,
                            pos.line,
                            pos.column,
                        ))
                    }
                },
                Some(ch) => value.push(ch),
                None => {
                    return Err(CompileError::new(
                        "unterminated string literal",
                        self.file,
                        pos.line,
                        pos.column,
                    ))
                }
            }
        }
    }
}
