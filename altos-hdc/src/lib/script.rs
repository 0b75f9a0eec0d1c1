//! Bus scripts: a line-oriented way of poking the controller from the I/O
//! processor's side without emulating the I/O processor itself.
//!
//! ```text
//! # comment
//! out <target> <value> [x <count>]
//! in <target> [<count>]
//! expect <target> <value>
//! attention
//! ```
//!
//! A target is a register name or an I/O address.

mod lexer;

use altos_utils::hexdump::hex_dump;
use log::{debug, info};
use std::borrow::Cow;
use std::error::Error;
use std::fmt::{self, Display, Formatter};
use std::sync::mpsc::Receiver;

use crate::board::Board;
use crate::controller::ATTENTION_PORT;
use crate::host::HostMemory;
use crate::iop::{IoProcessor, IopSignal};
use crate::iospace::{DATA_PORT, HEAD_SELECT_PORT, SEEK_CYLINDER_PORT, STATUS_COMMAND_PORT};
use crate::storage::Storage;
use lexer::{Lexer, Token, TokenType};

/// A script failure, pinned to the line it happened on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptError {
    pub line: usize,
    pub message: Cow<'static, str>,
}

impl Display for ScriptError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "line {}: {}", self.line, self.message)
    }
}

impl Error for ScriptError {}

pub type ScriptResult<T> = Result<T, ScriptError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Statement {
    Out { address: u32, value: u16, count: u32 },
    In { address: u32, count: u32 },
    Expect { address: u32, value: u16 },
    Attention,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Line {
    pub number: usize,
    pub statement: Statement,
}

/// Resolve a register name to its I/O port.
fn register_port(name: &str) -> Option<u32> {
    match name {
        "data" => Some(DATA_PORT),
        "head" => Some(HEAD_SELECT_PORT),
        "seek" | "cylinder" => Some(SEEK_CYLINDER_PORT),
        "status" | "command" => Some(STATUS_COMMAND_PORT),
        _ => None,
    }
}

/// A single-pass parser over a script's token stream. Whitespace and
/// comments are dropped as they come.
struct Parser<'a> {
    tokens: Lexer<'a>,
    peeked: Option<Token<'a>>,
    line: usize,
}

impl<'a> Parser<'a> {
    fn new(source: &'a str) -> Self {
        Parser {
            tokens: Lexer::new(source),
            peeked: None,
            line: 1,
        }
    }

    fn error<T>(&self, message: impl Into<Cow<'static, str>>) -> ScriptResult<T> {
        Err(ScriptError { line: self.line, message: message.into() })
    }

    /// Peek at the type of the next significant token.
    fn peek(&mut self) -> Option<TokenType> {
        while self.peeked.is_none() {
            let token = self.tokens.next()?;
            if !matches!(token.tt, TokenType::Whitespace | TokenType::Comment) {
                self.peeked = Some(token);
            }
        }
        self.peeked.as_ref().map(|token| token.tt)
    }

    fn consume(&mut self) -> Option<Token<'a>> {
        self.peek()?;
        let token = self.peeked.take()?;
        if token.tt == TokenType::Newline {
            self.line += 1;
        }
        Some(token)
    }

    fn run(mut self) -> ScriptResult<Vec<Line>> {
        let mut lines = Vec::new();
        while let Some(tt) = self.peek() {
            if tt == TokenType::Newline {
                self.consume();
                continue;
            }
            let number = self.line;
            let statement = self.parse_statement()?;
            debug!("Line {}: {:?}", number, statement);
            lines.push(Line { number, statement });

            match self.consume() {
                None => break,
                Some(Token { tt: TokenType::Newline, .. }) => {}
                Some(token) => return self.error(format!("unexpected '{}'", token.slice)),
            }
        }
        Ok(lines)
    }

    fn parse_statement(&mut self) -> ScriptResult<Statement> {
        let token = match self.consume() {
            Some(token) => token,
            None => return self.error("unexpected end of script"),
        };
        match token.tt {
            TokenType::Out => {
                let address = self.parse_target()?;
                let value = self.parse_value()?;
                let count = if self.peek() == Some(TokenType::Times) {
                    self.consume();
                    self.parse_count()?
                } else {
                    1
                };
                Ok(Statement::Out { address, value, count })
            }
            TokenType::In => {
                let address = self.parse_target()?;
                let count = match self.peek() {
                    Some(TokenType::DecLiteral | TokenType::HexLiteral) => self.parse_count()?,
                    _ => 1,
                };
                Ok(Statement::In { address, count })
            }
            TokenType::Expect => {
                let address = self.parse_target()?;
                let value = self.parse_value()?;
                Ok(Statement::Expect { address, value })
            }
            TokenType::Attention => Ok(Statement::Attention),
            TokenType::Unknown => self.error(format!("unrecognised input '{}'", token.slice)),
            _ => self.error(format!(
                "expected 'out', 'in', 'expect' or 'attention', found '{}'", token.slice)),
        }
    }

    /// Describe the peeked token for an error message.
    fn found(&self) -> Cow<'static, str> {
        match &self.peeked {
            None => "end of script".into(),
            Some(Token { tt: TokenType::Newline, .. }) => "end of line".into(),
            Some(token) => format!("'{}'", token.slice).into(),
        }
    }

    /// Consume the next token if it is one of the wanted kinds.
    fn consume_one_of(&mut self, wanted: &[TokenType], what: &str) -> ScriptResult<Token<'a>> {
        match self.peek() {
            Some(tt) if wanted.contains(&tt) => {}
            _ => return self.error(format!("expected {}, found {}", what, self.found())),
        }
        self.consume().ok_or_else(|| ScriptError {
            line: self.line,
            message: "unexpected end of script".into(),
        })
    }

    fn parse_number(&mut self) -> ScriptResult<u32> {
        let token = self.consume_one_of(
            &[TokenType::DecLiteral, TokenType::HexLiteral], "a number")?;
        let parsed = match token.tt {
            TokenType::HexLiteral => u32::from_str_radix(&token.slice[2..], 16),
            _ => token.slice.parse::<u32>(),
        };
        match parsed {
            Ok(n) => Ok(n),
            Err(_) => self.error(format!("number '{}' is too large", token.slice)),
        }
    }

    fn parse_value(&mut self) -> ScriptResult<u16> {
        let value = self.parse_number()?;
        match u16::try_from(value) {
            Ok(value) => Ok(value),
            Err(_) => self.error(format!("value {:#X} doesn't fit in a word", value)),
        }
    }

    fn parse_count(&mut self) -> ScriptResult<u32> {
        match self.parse_number()? {
            0 => self.error("count must be at least 1"),
            n => Ok(n),
        }
    }

    fn parse_target(&mut self) -> ScriptResult<u32> {
        if self.peek() == Some(TokenType::Identifier) {
            let name = self.consume_one_of(&[TokenType::Identifier], "a register")?.slice;
            return match register_port(name) {
                Some(port) => Ok(port),
                None => self.error(format!("unknown register '{}'", name)),
            };
        }
        match self.peek() {
            Some(TokenType::DecLiteral | TokenType::HexLiteral) => {}
            _ => return self.error(format!(
                "expected a register or address, found {}", self.found())),
        }
        let address = self.parse_number()?;
        if address > 0xFFFF {
            return self.error(format!("address {:#X} is outside I/O space", address));
        }
        Ok(address)
    }
}

/// Parse a whole script up front.
pub fn parse_script(source: &str) -> ScriptResult<Vec<Line>> {
    Parser::new(source).run()
}

fn describe_signal(signal: IopSignal) -> &'static str {
    match signal {
        IopSignal::DataRequest(true) => "DRQ asserted",
        IopSignal::DataRequest(false) => "DRQ cleared",
        IopSignal::ChannelAttention => "channel attention",
    }
}

/// Parse and run a script against a board, returning a transcript of what
/// was read and which signals the I/O processor saw. A failed `expect` stops
/// the run.
pub fn run_script<S, P, M>(source: &str,
                           board: &mut Board<S, P, M>,
                           signal_rx: &Receiver<IopSignal>) -> ScriptResult<Vec<String>>
where
    S: Storage,
    P: IoProcessor,
    M: HostMemory,
{
    let lines = parse_script(source)?;
    info!("Running script of {} statement(s).", lines.len());

    let mut transcript = Vec::new();
    for Line { number, statement } in lines {
        match statement {
            Statement::Out { address, value, count } => {
                for _ in 0..count {
                    board.iop_store_io(address, value);
                }
            }
            Statement::In { address, count: 1 } => {
                let value = board.iop_load_io(address);
                transcript.push(format!("{:>4}: in {:#06X} = {:#06X}", number, address, value));
            }
            Statement::In { address, count } => {
                // Registers are byte-wide, so the low bytes tell the story.
                let bytes: Vec<u8> = (0..count)
                    .map(|_| board.iop_load_io(address) as u8)
                    .collect();
                transcript.push(format!("{:>4}: in {:#06X} x {}", number, address, count));
                transcript.extend(hex_dump(&bytes, 0).lines().map(String::from));
            }
            Statement::Expect { address, value } => {
                let actual = board.iop_load_io(address);
                if actual != value {
                    return Err(ScriptError {
                        line: number,
                        message: format!("expected {:#06X} from {:#06X}, read {:#06X}",
                                         value, address, actual).into(),
                    });
                }
                transcript.push(format!("{:>4}: {:#06X} = {:#06X} as expected",
                                        number, address, value));
            }
            Statement::Attention => {
                board.host_write(*ATTENTION_PORT.start(), 0);
            }
        }
        for signal in signal_rx.try_iter() {
            transcript.push(format!("{:>4}: {}", number, describe_signal(signal)));
        }
    }
    Ok(transcript)
}
