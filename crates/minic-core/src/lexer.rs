//! Hand-written lexer.
//!
//! Produces a flat, positioned token stream for the parser. Line and block
//! comments are skipped; `//` runs to end of line, `/* .. */` may span lines.

use crate::diagnostics::{err, CompileError, ErrorKind};
use crate::span::Span;

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    // Literals and names.
    Int(i32),
    Float(f32),
    Char(char),
    Str(String),
    True,
    False,
    Ident(String),

    // Keywords.
    KwVoid,
    KwInt,
    KwChar,
    KwFloat,
    KwBool,
    KwStruct,
    KwIf,
    KwElse,
    KwFor,
    KwWhile,
    KwDo,
    KwReturn,
    KwBreak,
    KwContinue,

    // Operators.
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Assign,
    PlusAssign,
    MinusAssign,
    StarAssign,
    SlashAssign,
    PercentAssign,
    AmpAssign,
    PipeAssign,
    CaretAssign,
    ShlAssign,
    ShrAssign,
    Eq,
    Ne,
    Lt,
    Gt,
    Le,
    Ge,
    AndAnd,
    OrOr,
    Amp,
    Pipe,
    Caret,
    Shl,
    Shr,
    Inc,
    Dec,
    Not,

    // Punctuation.
    Comma,
    Semicolon,
    Colon,
    Dot,
    LParen,
    RParen,
    LBrace,
    RBrace,
    LBracket,
    RBracket,
}

impl std::fmt::Display for TokenKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        use TokenKind::*;
        match self {
            Int(v) => return write!(f, "{v}"),
            Float(v) => return write!(f, "{v}"),
            Char(c) => return write!(f, "'{c}'"),
            Str(s) => return write!(f, "\"{s}\""),
            Ident(s) => return write!(f, "{s}"),
            _ => {}
        }
        let s = match self {
            True => "true",
            False => "false",
            KwVoid => "void",
            KwInt => "int",
            KwChar => "char",
            KwFloat => "float",
            KwBool => "bool",
            KwStruct => "struct",
            KwIf => "if",
            KwElse => "else",
            KwFor => "for",
            KwWhile => "while",
            KwDo => "do",
            KwReturn => "return",
            KwBreak => "break",
            KwContinue => "continue",
            Plus => "+",
            Minus => "-",
            Star => "*",
            Slash => "/",
            Percent => "%",
            Assign => "=",
            PlusAssign => "+=",
            MinusAssign => "-=",
            StarAssign => "*=",
            SlashAssign => "/=",
            PercentAssign => "%=",
            AmpAssign => "&=",
            PipeAssign => "|=",
            CaretAssign => "^=",
            ShlAssign => "<<=",
            ShrAssign => ">>=",
            Eq => "==",
            Ne => "!=",
            Lt => "<",
            Gt => ">",
            Le => "<=",
            Ge => ">=",
            AndAnd => "&&",
            OrOr => "||",
            Amp => "&",
            Pipe => "|",
            Caret => "^",
            Shl => "<<",
            Shr => ">>",
            Inc => "++",
            Dec => "--",
            Not => "!",
            Comma => ",",
            Semicolon => ";",
            Colon => ":",
            Dot => ".",
            LParen => "(",
            RParen => ")",
            LBrace => "{",
            RBrace => "}",
            LBracket => "[",
            RBracket => "]",
            _ => unreachable!(),
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
}

/// Scanner state: a byte cursor plus line/column bookkeeping.
struct Lexer<'a> {
    src: &'a [u8],
    pos: usize,
    line: u32,
    col: u32,
}

/// Tokenize a whole source text.
pub fn tokenize(source: &str) -> Result<Vec<Token>, CompileError> {
    let mut lx = Lexer {
        src: source.as_bytes(),
        pos: 0,
        line: 1,
        col: 1,
    };
    let mut out = Vec::new();
    while let Some(tok) = lx.next_token()? {
        out.push(tok);
    }
    Ok(out)
}

impl<'a> Lexer<'a> {
    fn peek(&self) -> Option<u8> {
        self.src.get(self.pos).copied()
    }

    fn peek2(&self) -> Option<u8> {
        self.src.get(self.pos + 1).copied()
    }

    fn bump(&mut self) -> Option<u8> {
        let b = self.peek()?;
        self.pos += 1;
        if b == b'\n' {
            self.line += 1;
            self.col = 1;
        } else {
            self.col += 1;
        }
        Some(b)
    }

    fn span(&self) -> Span {
        Span::new(self.line, self.col)
    }

    fn skip_trivia(&mut self) -> Result<(), CompileError> {
        loop {
            match self.peek() {
                Some(b) if b.is_ascii_whitespace() => {
                    self.bump();
                }
                Some(b'/') if self.peek2() == Some(b'/') => {
                    while let Some(b) = self.peek() {
                        if b == b'\n' {
                            break;
                        }
                        self.bump();
                    }
                }
                Some(b'/') if self.peek2() == Some(b'*') => {
                    let start = self.span();
                    self.bump();
                    self.bump();
                    loop {
                        match self.peek() {
                            Some(b'*') if self.peek2() == Some(b'/') => {
                                self.bump();
                                self.bump();
                                break;
                            }
                            Some(_) => {
                                self.bump();
                            }
                            None => {
                                return err(
                                    ErrorKind::MalformedLiteral { what: "comment" },
                                    start,
                                )
                            }
                        }
                    }
                }
                _ => return Ok(()),
            }
        }
    }

    fn next_token(&mut self) -> Result<Option<Token>, CompileError> {
        self.skip_trivia()?;
        let span = self.span();
        let b = match self.peek() {
            Some(b) => b,
            None => return Ok(None),
        };

        let kind = if b.is_ascii_digit() {
            self.lex_number(span)?
        } else if b == b'_' || b.is_ascii_alphabetic() {
            self.lex_word()
        } else if b == b'\'' {
            self.lex_char(span)?
        } else if b == b'"' {
            self.lex_string(span)?
        } else {
            self.lex_operator(span)?
        };

        Ok(Some(Token { kind, span }))
    }

    fn lex_number(&mut self, span: Span) -> Result<TokenKind, CompileError> {
        let start = self.pos;
        while matches!(self.peek(), Some(b) if b.is_ascii_digit()) {
            self.bump();
        }
        let is_float = self.peek() == Some(b'.') && matches!(self.peek2(), Some(b) if b.is_ascii_digit());
        if is_float {
            self.bump();
            while matches!(self.peek(), Some(b) if b.is_ascii_digit()) {
                self.bump();
            }
            let text = std::str::from_utf8(&self.src[start..self.pos]).unwrap();
            match text.parse::<f32>() {
                Ok(v) => Ok(TokenKind::Float(v)),
                Err(_) => err(ErrorKind::MalformedLiteral { what: "float" }, span),
            }
        } else {
            let text = std::str::from_utf8(&self.src[start..self.pos]).unwrap();
            match text.parse::<i32>() {
                Ok(v) => Ok(TokenKind::Int(v)),
                Err(_) => err(ErrorKind::MalformedLiteral { what: "integer" }, span),
            }
        }
    }

    fn lex_word(&mut self) -> TokenKind {
        let start = self.pos;
        while matches!(self.peek(), Some(b) if b == b'_' || b.is_ascii_alphanumeric()) {
            self.bump();
        }
        let text = std::str::from_utf8(&self.src[start..self.pos]).unwrap();
        match text {
            "void" => TokenKind::KwVoid,
            "int" => TokenKind::KwInt,
            "char" => TokenKind::KwChar,
            "float" => TokenKind::KwFloat,
            "bool" => TokenKind::KwBool,
            "struct" => TokenKind::KwStruct,
            "if" => TokenKind::KwIf,
            "else" => TokenKind::KwElse,
            "for" => TokenKind::KwFor,
            "while" => TokenKind::KwWhile,
            "do" => TokenKind::KwDo,
            "return" => TokenKind::KwReturn,
            "break" => TokenKind::KwBreak,
            "continue" => TokenKind::KwContinue,
            "true" => TokenKind::True,
            "false" => TokenKind::False,
            _ => TokenKind::Ident(text.to_string()),
        }
    }

    fn lex_escape(&mut self, span: Span) -> Result<char, CompileError> {
        match self.bump() {
            Some(b'n') => Ok('\n'),
            Some(b't') => Ok('\t'),
            Some(b'r') => Ok('\r'),
            Some(b'0') => Ok('\0'),
            Some(b'\\') => Ok('\\'),
            Some(b'\'') => Ok('\''),
            Some(b'"') => Ok('"'),
            _ => err(ErrorKind::MalformedLiteral { what: "escape" }, span),
        }
    }

    fn lex_char(&mut self, span: Span) -> Result<TokenKind, CompileError> {
        self.bump(); // opening quote
        let c = match self.bump() {
            Some(b'\\') => self.lex_escape(span)?,
            Some(b'\'') | None => {
                return err(ErrorKind::MalformedLiteral { what: "character" }, span)
            }
            Some(b) => b as char,
        };
        if self.bump() != Some(b'\'') {
            return err(ErrorKind::MalformedLiteral { what: "character" }, span);
        }
        Ok(TokenKind::Char(c))
    }

    fn lex_string(&mut self, span: Span) -> Result<TokenKind, CompileError> {
        self.bump(); // opening quote
        let mut s = String::new();
        loop {
            match self.bump() {
                Some(b'"') => break,
                Some(b'\\') => s.push(self.lex_escape(span)?),
                Some(b'\n') | None => {
                    return err(ErrorKind::MalformedLiteral { what: "string" }, span)
                }
                Some(b) => s.push(b as char),
            }
        }
        Ok(TokenKind::Str(s))
    }

    fn lex_operator(&mut self, span: Span) -> Result<TokenKind, CompileError> {
        use TokenKind::*;
        let b = self.bump().unwrap();
        let two = |lx: &mut Self, next: u8, yes: TokenKind, no: TokenKind| {
            if lx.peek() == Some(next) {
                lx.bump();
                yes
            } else {
                no
            }
        };
        let kind = match b {
            b'+' => match self.peek() {
                Some(b'+') => {
                    self.bump();
                    Inc
                }
                Some(b'=') => {
                    self.bump();
                    PlusAssign
                }
                _ => Plus,
            },
            b'-' => match self.peek() {
                Some(b'-') => {
                    self.bump();
                    Dec
                }
                Some(b'=') => {
                    self.bump();
                    MinusAssign
                }
                _ => Minus,
            },
            b'*' => two(self, b'=', StarAssign, Star),
            b'/' => two(self, b'=', SlashAssign, Slash),
            b'%' => two(self, b'=', PercentAssign, Percent),
            b'=' => two(self, b'=', Eq, Assign),
            b'!' => two(self, b'=', Ne, Not),
            b'<' => match self.peek() {
                Some(b'=') => {
                    self.bump();
                    Le
                }
                Some(b'<') => {
                    self.bump();
                    two(self, b'=', ShlAssign, Shl)
                }
                _ => Lt,
            },
            b'>' => match self.peek() {
                Some(b'=') => {
                    self.bump();
                    Ge
                }
                Some(b'>') => {
                    self.bump();
                    two(self, b'=', ShrAssign, Shr)
                }
                _ => Gt,
            },
            b'&' => match self.peek() {
                Some(b'&') => {
                    self.bump();
                    AndAnd
                }
                Some(b'=') => {
                    self.bump();
                    AmpAssign
                }
                _ => Amp,
            },
            b'|' => match self.peek() {
                Some(b'|') => {
                    self.bump();
                    OrOr
                }
                Some(b'=') => {
                    self.bump();
                    PipeAssign
                }
                _ => Pipe,
            },
            b'^' => two(self, b'=', CaretAssign, Caret),
            b',' => Comma,
            b';' => Semicolon,
            b':' => Colon,
            b'.' => Dot,
            b'(' => LParen,
            b')' => RParen,
            b'{' => LBrace,
            b'}' => RBrace,
            b'[' => LBracket,
            b']' => RBracket,
            other => return err(ErrorKind::UnknownChar(other as char), span),
        };
        Ok(kind)
    }
}
