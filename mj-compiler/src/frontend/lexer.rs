use logos::Logos;
use std::fmt;

#[derive(Logos, Debug, PartialEq, Eq, Hash, Clone)]
#[logos(skip r"[ \t\r\n\f]+")] // Whitespace
#[logos(skip r"//[^\n]*")] // Line comments
pub enum Token {
    /// Never produced; the callback skips the comment body.
    #[token("/*", block_comment)]
    BlockComment,

    // --- Keywords ---
    #[token("class")]
    Class,
    #[token("public")]
    Public,
    #[token("static")]
    Static,
    #[token("void")]
    Void,
    #[token("extends")]
    Extends,
    #[token("return")]
    Return,
    #[token("int")]
    Int,
    #[token("boolean")]
    Boolean,
    #[token("if")]
    If,
    #[token("else")]
    Else,
    #[token("while")]
    While,
    #[token("System.out.println")]
    Println,
    #[token("true")]
    True,
    #[token("false")]
    False,
    #[token("this")]
    This,
    #[token("new")]
    New,

    // --- Identifiers and Numbers ---
    #[regex(r"[A-Za-z_][A-Za-z0-9_]*", |lex| lex.slice().to_string())]
    Ident(String),

    #[regex(r"[0-9]+", |lex| lex.slice().parse().ok())]
    Number(i32),

    // --- Operators ---
    #[token("&&")]
    AndAnd,
    #[token("||")]
    OrOr,
    #[token("==")]
    Eq,
    #[token("!=")]
    Neq,
    #[token("!")]
    Bang,
    #[token("=")]
    Assign,
    #[token("+")]
    Plus,
    #[token("-")]
    Minus,
    #[token("*")]
    Mul,
    #[token("/")]
    Div,
    #[token("%")]
    Mod,
    #[token(">")]
    Gt,
    #[token("<")]
    Lt,
    #[token(">=")]
    Ge,
    #[token("<=")]
    Le,

    // --- Punctuation
    #[token("{")]
    LBrace,
    #[token("}")]
    RBrace,
    #[token("[")]
    LBracket,
    #[token("]")]
    RBracket,
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token(",")]
    Comma,
    #[token(".")]
    Dot,
    #[token(";")]
    Semicolon,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::BlockComment => write!(f, "'/*'"),
            Token::Class => write!(f, "'class'"),
            Token::Public => write!(f, "'public'"),
            Token::Static => write!(f, "'static'"),
            Token::Void => write!(f, "'void'"),
            Token::Extends => write!(f, "'extends'"),
            Token::Return => write!(f, "'return'"),
            Token::Int => write!(f, "'int'"),
            Token::Boolean => write!(f, "'boolean'"),
            Token::If => write!(f, "'if'"),
            Token::Else => write!(f, "'else'"),
            Token::While => write!(f, "'while'"),
            Token::Println => write!(f, "'System.out.println'"),
            Token::True => write!(f, "'true'"),
            Token::False => write!(f, "'false'"),
            Token::This => write!(f, "'this'"),
            Token::New => write!(f, "'new'"),
            Token::Ident(s) => write!(f, "identifier '{}'", s),
            Token::Number(n) => write!(f, "number {}", n),
            Token::AndAnd => write!(f, "'&&'"),
            Token::OrOr => write!(f, "'||'"),
            Token::Eq => write!(f, "'=='"),
            Token::Neq => write!(f, "'!='"),
            Token::Bang => write!(f, "'!'"),
            Token::Assign => write!(f, "'='"),
            Token::Plus => write!(f, "'+'"),
            Token::Minus => write!(f, "'-'"),
            Token::Mul => write!(f, "'*'"),
            Token::Div => write!(f, "'/'"),
            Token::Mod => write!(f, "'%'"),
            Token::Gt => write!(f, "'>'"),
            Token::Lt => write!(f, "'<'"),
            Token::Ge => write!(f, "'>='"),
            Token::Le => write!(f, "'<='"),
            Token::LBrace => write!(f, "'{{'"),
            Token::RBrace => write!(f, "'}}'"),
            Token::LBracket => write!(f, "'['"),
            Token::RBracket => write!(f, "']'"),
            Token::LParen => write!(f, "'('"),
            Token::RParen => write!(f, "')'"),
            Token::Comma => write!(f, "','"),
            Token::Dot => write!(f, "'.'"),
            Token::Semicolon => write!(f, "';'"),
        }
    }
}

/// Skip past the closing `*/`. An unterminated comment is an error at its `/*`.
fn block_comment(lex: &mut logos::Lexer<Token>) -> logos::FilterResult<(), ()> {
    let remainder = lex.remainder();
    match remainder.find("*/") {
        Some(end) => {
            lex.bump(end + 2);
            logos::FilterResult::Skip
        }
        None => logos::FilterResult::Error(()),
    }
}

/// Custom error type for lexical errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LexicalError {
    pub location: usize,
    pub line: usize,
    pub column: usize,
    pub unexpected_char: char,
    pub context: String,
}

impl fmt::Display for LexicalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Unexpected character '{}' at line {}, column {}\n  Context: {}",
            self.unexpected_char, self.line, self.column, self.context
        )
    }
}

impl std::error::Error for LexicalError {}

/// Convert a byte position to line and column numbers (1-based)
pub fn position_to_line_col(source: &str, position: usize) -> (usize, usize) {
    let mut line = 1;
    let mut col = 1;

    for (i, ch) in source.char_indices() {
        if i >= position {
            break;
        }
        if ch == '\n' {
            line += 1;
            col = 1;
        } else {
            col += 1;
        }
    }

    (line, col)
}

/// The trimmed source line containing `position`.
pub fn line_context(source: &str, position: usize) -> String {
    let position = position.min(source.len());
    let line_start = source[..position].rfind('\n').map(|pos| pos + 1).unwrap_or(0);
    let line_end = source[position..]
        .find('\n')
        .map(|pos| position + pos)
        .unwrap_or(source.len());

    source[line_start..line_end].trim().to_string()
}

fn lexical_error(source: &str, position: usize) -> LexicalError {
    let (line, column) = position_to_line_col(source, position);
    let unexpected_char = source[position..].chars().next().unwrap_or('\0');

    LexicalError {
        location: position,
        line,
        column,
        unexpected_char,
        context: line_context(source, position),
    }
}

/// A token together with its byte span.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Spanned {
    pub token: Token,
    pub start: usize,
    pub end: usize,
}

/// Tokenize the whole input, stopping at the first character no rule accepts.
pub fn tokenize(source: &str) -> Result<Vec<Spanned>, LexicalError> {
    let mut lexer = Token::lexer(source);
    let mut tokens = Vec::new();

    while let Some(result) = lexer.next() {
        let span = lexer.span();
        match result {
            Ok(token) => tokens.push(Spanned {
                token,
                start: span.start,
                end: span.end,
            }),
            Err(_) => return Err(lexical_error(source, span.start)),
        }
    }

    Ok(tokens)
}
