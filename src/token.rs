use std::fmt::Display;

/// 1-based line and column of a character in the source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Pos {
    pub line: usize,
    pub column: usize,
}

impl From<(usize, usize)> for Pos {
    fn from(value: (usize, usize)) -> Self {
        Self {
            line: value.0,
            column: value.1,
        }
    }
}

impl Display for Pos {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "line {}, column {}", self.line, self.column)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct WithPos<T> {
    pub pos: Pos,
    pub inner: T,
}

/// Token kinds. The discriminants are the codes printed by the token trace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    Eof = 0,
    Println = 1,
    Unsigned = 2,
    Id = 3,
    Assign = 4,
    Semicolon = 5,
    LeftParen = 6,
    RightParen = 7,
    Plus = 8,
    Minus = 9,
    Times = 10,
    Div = 11,
    Open = 12,
    Close = 13,
    Error = 14,
    Print = 15,
    String = 16,
    Readint = 17,
    Do = 18,
    While = 19,
    If = 20,
    Else = 21,
}

impl TokenKind {
    pub fn code(self) -> u8 {
        self as u8
    }

    /// Single-character punctuation, or `None` for anything the grammar lacks.
    pub fn punctuation(c: char) -> Option<Self> {
        Some(match c {
            '=' => Self::Assign,
            ';' => Self::Semicolon,
            '(' => Self::LeftParen,
            ')' => Self::RightParen,
            '+' => Self::Plus,
            '-' => Self::Minus,
            '*' => Self::Times,
            '/' => Self::Div,
            '{' => Self::Open,
            '}' => Self::Close,
            _ => return None,
        })
    }
}

impl Display for TokenKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Eof => "<EOF>",
            Self::Println => "\"println\"",
            Self::Unsigned => "<UNSIGNED>",
            Self::Id => "<ID>",
            Self::Assign => "\"=\"",
            Self::Semicolon => "\";\"",
            Self::LeftParen => "\"(\"",
            Self::RightParen => "\")\"",
            Self::Plus => "\"+\"",
            Self::Minus => "\"-\"",
            Self::Times => "\"*\"",
            Self::Div => "\"/\"",
            Self::Open => "\"{\"",
            Self::Close => "\"}\"",
            Self::Error => "<ERROR>",
            Self::Print => "\"print\"",
            Self::String => "<String>",
            Self::Readint => "\"readint\"",
            Self::Do => "\"do\"",
            Self::While => "\"while\"",
            Self::If => "\"if\"",
            Self::Else => "\"else\"",
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub image: String,
    pub begin: Pos,
    pub end: Pos,
}

impl Token {
    /// The image paired with where the token starts, for diagnostics.
    pub fn located(&self) -> WithPos<String> {
        WithPos {
            pos: self.begin,
            inner: self.image.clone(),
        }
    }
}
