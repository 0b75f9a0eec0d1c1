use log::trace;
use logos::Logos;

#[derive(Logos, Debug, PartialEq, Eq, Copy, Clone)]
pub enum TokenType {
    // Keywords
    #[token("out")]
    Out,
    #[token("in")]
    In,
    #[token("expect")]
    Expect,
    #[token("attention")]
    Attention,
    #[token("x")]
    Times,

    // Literals
    #[regex(r"[0-9]+")]
    DecLiteral,
    #[regex(r"0x[A-Fa-f0-9]+")]
    HexLiteral,

    // Register names
    #[regex(r"[A-Za-z_][A-Za-z0-9_]*")]
    Identifier,

    // Comments
    #[regex(r"#[^\r\n]*")]
    Comment,

    // Whitespace
    #[regex(r"\r|\n|\r\n")]
    Newline,
    #[regex(r"[^\S\n\r]+")]
    Whitespace,

    // Unrecognised tokens.
    #[error]
    Unknown,
}

#[derive(Debug)]
pub struct Token<'a> {
    pub tt: TokenType,
    pub slice: &'a str,
}

/// Wrap the Logos implementation with some logging.
pub struct Lexer<'a> {
    inner: logos::Lexer<'a, TokenType>,
}

impl<'a> Lexer<'a> {
    /// Create a new token stream from the given source.
    pub fn new(source: &'a str) -> Self {
        Self {
            inner: TokenType::lexer(source),
        }
    }

    /// Consume the next token from the stream.
    pub fn next(&mut self) -> Option<Token<'a>> {
        let tt = self.inner.next()?;
        let slice = self.inner.slice();
        let token = Token { tt, slice };
        trace!("Lexer produced {:?}", token);
        Some(token)
    }
}
