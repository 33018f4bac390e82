use crate::{
    ast::{Position, SourceLocation},
    errors::{CompilerError, ErrorCodes},
};

#[derive(Debug, PartialEq, Clone, Copy)]
#[repr(u32)]
pub enum CharCodes {
    /// "\t"
    Tab = 0x9,
    /// "\n"
    NewLine = 0xa,
    /// "\f"
    FormFeed = 0xc,
    /// "\r"
    CarriageReturn = 0xd,
    // " "
    Space = 0x20,
    /// "!"
    ExclamationMark = 0x21,
    /// '"'
    DoubleQuote = 0x22,
    /// "#"
    Number = 0x23,
    /// "&"
    Amp = 0x26,
    /// "'"
    SingleQuote = 0x27,
    /// "("
    LeftParen = 0x28,
    /// ")"
    RightParen = 0x29,
    /// "-"
    Dash = 0x2d,
    /// "."
    Dot = 0x2e,
    /// "/"
    Slash = 0x2f,
    /// "0"
    Zero = 0x30,
    /// "9"
    Nine = 0x39,
    /// "="
    Eq = 0x3d,
    /// "@"
    At = 0x40,
    /// "["
    LeftSquare = 0x5b,
    /// "\"
    Backslash = 0x5c,
    /// "]"
    RightSquare = 0x5d,
    /// "^"
    Caret = 0x5e,
    /// "{"
    LeftBrace = 0x7b,
    /// "|"
    Pipe = 0x7c,
    /// "}"
    RightBrace = 0x7d,
    /// "~"
    Tilde = 0x7e,
}

impl PartialEq<CharCodes> for char {
    fn eq(&self, other: &CharCodes) -> bool {
        *self as u32 == *other as u32
    }
}

pub fn is_whitespace(c: char) -> bool {
    c == CharCodes::Space
        || c == CharCodes::NewLine
        || c == CharCodes::Tab
        || c == CharCodes::FormFeed
        || c == CharCodes::CarriageReturn
}

/// Characters that may not appear in an unbracketed identifier.
fn is_id_terminator(c: char) -> bool {
    is_whitespace(c)
        || matches!(
            c,
            '!' | '"'
                | '#'
                | '%'..=','
                | '.'
                | '/'
                | ';'..='>'
                | '@'
                | '['..='^'
                | '`'
                | '{'..='~'
        )
}

/// Characters that may follow a keyword or number literal.
fn is_literal_boundary(c: Option<char>) -> bool {
    match c {
        None => true,
        Some(c) => is_whitespace(c) || matches!(c, '~' | '}' | ')' | '|'),
    }
}

/// How a mustache was opened.
#[derive(Debug, PartialEq, Clone, Copy)]
pub enum OpenKind {
    /// `{{`
    Escaped,
    /// `{{{`
    Unescaped,
    /// `{{&`
    Ampersand,
    /// `{{#`
    Block,
    /// `{{^`
    Inverse,
    /// `{{/`
    EndBlock,
}

#[derive(Debug, PartialEq, Clone)]
pub enum TokenKind {
    Content { value: String, original: String },
    Comment { value: String, strip_open: bool, strip_close: bool },
    Open { kind: OpenKind, strip: bool },
    Close { unescaped: bool, strip: bool },
    /// `literal` is set for `[bracketed]` segments, which never act as
    /// keywords such as `this` or `..`.
    Id { name: String, literal: bool },
    Sep(char),
    Data,
    String(String),
    Number(String),
    Boolean(bool),
    Undefined,
    Null,
    Equals,
    OpenSexpr,
    CloseSexpr,
    OpenBlockParams,
    CloseBlockParams,
}

#[derive(Debug, PartialEq, Clone)]
pub struct Token {
    pub kind: TokenKind,
    pub start: usize,
    pub end: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub enum State {
    Content,
    Mustache,
}

/// Splits template source into content runs and mustache tokens. Offsets are
/// char indices into the source.
pub struct Tokenizer {
    /// The current state the tokenizer is in.
    pub state: State,
    /// The read buffer.
    pub buffer: Vec<char>,
    /// The index within the buffer that we are currently looking at.
    index: usize,
    /// Record newline positions for fast line / column calculation
    newlines: Vec<usize>,
    /// Whether the open mustache was `{{{`, which must close with `}}}`.
    in_unescaped: bool,
    tokens: Vec<Token>,
}

impl Tokenizer {
    pub fn new(source: &str) -> Self {
        let buffer: Vec<char> = source.chars().collect();
        let newlines = buffer
            .iter()
            .enumerate()
            .filter(|(_, c)| **c == CharCodes::NewLine)
            .map(|(i, _)| i)
            .collect();
        Self {
            state: State::Content,
            buffer,
            index: 0,
            newlines,
            in_unescaped: false,
            tokens: Vec::new(),
        }
    }

    /// Generate Position object with line / column information using recorded
    /// newline positions.
    pub fn get_pos(&self, index: usize) -> Position {
        let preceding = self.newlines.partition_point(|newline| *newline < index);
        let column = match preceding {
            0 => index + 1,
            n => index - self.newlines[n - 1],
        };
        Position {
            offset: index,
            line: preceding + 1,
            column,
        }
    }

    pub fn get_slice(&self, start: usize, end: usize) -> String {
        self.buffer[start.min(self.buffer.len())..end.min(self.buffer.len())]
            .iter()
            .collect()
    }

    pub fn get_loc(&self, start: usize, end: usize) -> SourceLocation {
        SourceLocation {
            start: self.get_pos(start),
            end: self.get_pos(end),
            source: self.get_slice(start, end),
        }
    }

    pub fn tokenize(mut self) -> Result<(Vec<Token>, Tokenizer), CompilerError> {
        while self.index < self.buffer.len() {
            match self.state {
                State::Content => self.state_content()?,
                State::Mustache => self.state_mustache()?,
            }
        }
        if self.state == State::Mustache {
            let start = self
                .tokens
                .iter()
                .rev()
                .find(|t| matches!(t.kind, TokenKind::Open { .. }))
                .map_or(0, |t| t.start);
            return Err(CompilerError::new(
                ErrorCodes::UnterminatedMustache,
                Some(self.get_loc(start, self.buffer.len())),
            ));
        }
        let tokens = std::mem::take(&mut self.tokens);
        Ok((tokens, self))
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.buffer.get(self.index + offset).copied()
    }

    fn starts_with(&self, pattern: &str) -> bool {
        pattern
            .chars()
            .enumerate()
            .all(|(i, c)| self.peek_at(i) == Some(c))
    }

    fn push(&mut self, kind: TokenKind, start: usize) {
        self.tokens.push(Token {
            kind,
            start,
            end: self.index,
        });
    }

    fn state_content(&mut self) -> Result<(), CompilerError> {
        let start = self.index;
        let mut value = String::new();
        loop {
            if self.index >= self.buffer.len() {
                break;
            }
            if self.starts_with("\\\\{{") {
                // an escaped backslash in front of a live mustache
                value.push('\\');
                self.index += 2;
                break;
            }
            if self.starts_with("\\{{") {
                // `\{{` renders the mustache literally, up to the next `{{`
                self.index += 1;
                value.push_str("{{");
                self.index += 2;
                while self.index < self.buffer.len() && !self.starts_with("{{") {
                    value.push(self.buffer[self.index]);
                    self.index += 1;
                }
                continue;
            }
            if self.starts_with("{{") {
                break;
            }
            value.push(self.buffer[self.index]);
            self.index += 1;
        }

        if self.index > start {
            let original = value.clone();
            self.push(TokenKind::Content { value, original }, start);
        }
        if self.starts_with("{{") {
            self.state = State::Mustache;
            self.open_mustache()?;
        }
        Ok(())
    }

    fn open_mustache(&mut self) -> Result<(), CompilerError> {
        let start = self.index;
        self.index += 2;
        let strip = self.peek_at(0) == Some('~');
        if strip {
            self.index += 1;
        }

        if self.peek_at(0) == Some('!') {
            return self.comment(start, strip);
        }

        let kind = match self.peek_at(0) {
            Some('{') => OpenKind::Unescaped,
            Some('&') => OpenKind::Ampersand,
            Some('#') => OpenKind::Block,
            Some('^') => OpenKind::Inverse,
            Some('/') => OpenKind::EndBlock,
            _ => OpenKind::Escaped,
        };
        if kind != OpenKind::Escaped {
            self.index += 1;
        }
        self.in_unescaped = kind == OpenKind::Unescaped;
        self.push(TokenKind::Open { kind, strip }, start);
        Ok(())
    }

    fn comment(&mut self, start: usize, strip_open: bool) -> Result<(), CompilerError> {
        // skip "!"
        self.index += 1;
        let long = self.starts_with("--");
        if long {
            self.index += 2;
        }
        let body_start = self.index;
        let (close, close_len) = if long { ("--", 4) } else { ("", 2) };
        loop {
            if self.index >= self.buffer.len() {
                return Err(CompilerError::new(
                    ErrorCodes::UnterminatedComment,
                    Some(self.get_loc(start, self.index)),
                ));
            }
            let strip_close = self.starts_with(&format!("{close}~}}}}"));
            if strip_close || self.starts_with(&format!("{close}}}}}")) {
                let value = self.get_slice(body_start, self.index);
                self.index += close_len + usize::from(strip_close);
                self.push(
                    TokenKind::Comment {
                        value,
                        strip_open,
                        strip_close,
                    },
                    start,
                );
                self.state = State::Content;
                return Ok(());
            }
            self.index += 1;
        }
    }

    fn state_mustache(&mut self) -> Result<(), CompilerError> {
        let Some(c) = self.peek_at(0) else {
            return Ok(());
        };
        let start = self.index;

        if is_whitespace(c) {
            self.index += 1;
            return Ok(());
        }

        let strip = c == CharCodes::Tilde;
        let close_at = usize::from(strip);
        if self.in_unescaped && self.starts_with(if strip { "~}}}" } else { "}}}" }) {
            self.index += close_at + 3;
            self.in_unescaped = false;
            self.push(
                TokenKind::Close {
                    unescaped: true,
                    strip,
                },
                start,
            );
            self.state = State::Content;
            return Ok(());
        }
        if self.starts_with(if strip { "~}}" } else { "}}" }) {
            self.index += close_at + 2;
            self.push(
                TokenKind::Close {
                    unescaped: false,
                    strip,
                },
                start,
            );
            self.state = State::Content;
            return Ok(());
        }

        match c {
            '(' => {
                self.index += 1;
                self.push(TokenKind::OpenSexpr, start);
            }
            ')' => {
                self.index += 1;
                self.push(TokenKind::CloseSexpr, start);
            }
            '=' => {
                self.index += 1;
                self.push(TokenKind::Equals, start);
            }
            '@' => {
                self.index += 1;
                self.push(TokenKind::Data, start);
            }
            '|' => {
                self.index += 1;
                self.push(TokenKind::CloseBlockParams, start);
            }
            '/' => {
                self.index += 1;
                self.push(TokenKind::Sep('/'), start);
            }
            '"' | '\'' => self.string(c)?,
            '[' => self.bracket_id()?,
            '.' => {
                if self.starts_with("..") {
                    self.index += 2;
                    self.push(
                        TokenKind::Id {
                            name: "..".to_string(),
                            literal: false,
                        },
                        start,
                    );
                } else if matches!(self.peek_at(1), None | Some('=' | '~' | '}' | '/' | '.' | ')' | '|'))
                    || self.peek_at(1).is_some_and(is_whitespace)
                {
                    self.index += 1;
                    self.push(
                        TokenKind::Id {
                            name: ".".to_string(),
                            literal: false,
                        },
                        start,
                    );
                } else {
                    self.index += 1;
                    self.push(TokenKind::Sep('.'), start);
                }
            }
            c if c == '-' || c.is_ascii_digit() => {
                if !self.number(start) {
                    self.id(start)?;
                }
            }
            _ => self.id(start)?,
        }
        Ok(())
    }

    fn string(&mut self, quote: char) -> Result<(), CompilerError> {
        let start = self.index;
        self.index += 1;
        let mut value = String::new();
        loop {
            match self.peek_at(0) {
                None => {
                    return Err(CompilerError::new(
                        ErrorCodes::UnterminatedString,
                        Some(self.get_loc(start, self.index)),
                    ));
                }
                Some('\\') if self.peek_at(1) == Some(quote) => {
                    value.push(quote);
                    self.index += 2;
                }
                Some(c) if c == quote => {
                    self.index += 1;
                    break;
                }
                Some(c) => {
                    value.push(c);
                    self.index += 1;
                }
            }
        }
        self.push(TokenKind::String(value), start);
        Ok(())
    }

    fn bracket_id(&mut self) -> Result<(), CompilerError> {
        let start = self.index;
        self.index += 1;
        let body_start = self.index;
        while let Some(c) = self.peek_at(0) {
            if c == CharCodes::RightSquare {
                let name = self.get_slice(body_start, self.index);
                self.index += 1;
                self.push(
                    TokenKind::Id {
                        name,
                        literal: true,
                    },
                    start,
                );
                return Ok(());
            }
            self.index += 1;
        }
        Err(CompilerError::new(
            ErrorCodes::UnexpectedCharacter,
            Some(self.get_loc(start, self.index)),
        ))
    }

    /// Lexes `-?[0-9]+(\.[0-9]+)?` when it is followed by a literal boundary.
    fn number(&mut self, start: usize) -> bool {
        let mut end = self.index;
        if self.buffer.get(end) == Some(&'-') {
            end += 1;
        }
        let digits_start = end;
        while self.buffer.get(end).is_some_and(|c| c.is_ascii_digit()) {
            end += 1;
        }
        if end == digits_start {
            return false;
        }
        if self.buffer.get(end) == Some(&'.')
            && self.buffer.get(end + 1).is_some_and(|c| c.is_ascii_digit())
        {
            end += 1;
            while self.buffer.get(end).is_some_and(|c| c.is_ascii_digit()) {
                end += 1;
            }
        }
        if !is_literal_boundary(self.buffer.get(end).copied()) {
            return false;
        }
        let literal = self.get_slice(self.index, end);
        self.index = end;
        self.push(TokenKind::Number(literal), start);
        true
    }

    fn id(&mut self, start: usize) -> Result<(), CompilerError> {
        let mut end = self.index;
        while self.buffer.get(end).is_some_and(|c| !is_id_terminator(*c)) {
            end += 1;
        }
        if end == self.index {
            return Err(CompilerError::new(
                ErrorCodes::UnexpectedCharacter,
                Some(self.get_loc(start, start + 1)),
            ));
        }
        let name = self.get_slice(self.index, end);
        let boundary = is_literal_boundary(self.buffer.get(end).copied());
        self.index = end;

        if name == "as" && self.block_params_follow() {
            self.push(TokenKind::OpenBlockParams, start);
            return Ok(());
        }

        let kind = match name.as_str() {
            "true" if boundary => TokenKind::Boolean(true),
            "false" if boundary => TokenKind::Boolean(false),
            "undefined" if boundary => TokenKind::Undefined,
            "null" if boundary => TokenKind::Null,
            _ => TokenKind::Id {
                name,
                literal: false,
            },
        };
        self.push(kind, start);
        Ok(())
    }

    /// `as |` opens a block param list; consumes the whitespace and pipe.
    fn block_params_follow(&mut self) -> bool {
        let mut probe = self.index;
        while self.buffer.get(probe).is_some_and(|c| is_whitespace(*c)) {
            probe += 1;
        }
        if probe > self.index && self.buffer.get(probe) == Some(&'|') {
            self.index = probe + 1;
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{OpenKind, TokenKind, Tokenizer};

    fn kinds(source: &str) -> Vec<TokenKind> {
        let (tokens, _) = Tokenizer::new(source).tokenize().unwrap();
        tokens.into_iter().map(|t| t.kind).collect()
    }

    fn id(name: &str) -> TokenKind {
        TokenKind::Id {
            name: name.to_string(),
            literal: false,
        }
    }

    #[test]
    fn content_and_mustache() {
        assert_eq!(
            kinds("a {{foo}} b"),
            vec![
                TokenKind::Content {
                    value: "a ".to_string(),
                    original: "a ".to_string()
                },
                TokenKind::Open {
                    kind: OpenKind::Escaped,
                    strip: false
                },
                id("foo"),
                TokenKind::Close {
                    unescaped: false,
                    strip: false
                },
                TokenKind::Content {
                    value: " b".to_string(),
                    original: " b".to_string()
                },
            ]
        );
    }

    #[test]
    fn paths_literals_and_hash() {
        assert_eq!(
            kinds("{{#each ../a.b as |x|}}"),
            vec![
                TokenKind::Open {
                    kind: OpenKind::Block,
                    strip: false
                },
                id("each"),
                id(".."),
                TokenKind::Sep('/'),
                id("a"),
                TokenKind::Sep('.'),
                id("b"),
                TokenKind::OpenBlockParams,
                id("x"),
                TokenKind::CloseBlockParams,
                TokenKind::Close {
                    unescaped: false,
                    strip: false
                },
            ]
        );
        assert_eq!(
            kinds("{{~h 'x' -1.5 true null k=v~}}"),
            vec![
                TokenKind::Open {
                    kind: OpenKind::Escaped,
                    strip: true
                },
                id("h"),
                TokenKind::String("x".to_string()),
                TokenKind::Number("-1.5".to_string()),
                TokenKind::Boolean(true),
                TokenKind::Null,
                id("k"),
                TokenKind::Equals,
                id("v"),
                TokenKind::Close {
                    unescaped: false,
                    strip: true
                },
            ]
        );
    }

    #[test]
    fn escaped_mustache_is_content() {
        assert_eq!(
            kinds("\\{{foo}}"),
            vec![TokenKind::Content {
                value: "{{foo}}".to_string(),
                original: "{{foo}}".to_string()
            }]
        );
    }

    #[test]
    fn comments() {
        assert_eq!(
            kinds("{{!-- a }} b --}}"),
            vec![TokenKind::Comment {
                value: " a }} b ".to_string(),
                strip_open: false,
                strip_close: false
            }]
        );
    }

    #[test]
    fn positions_track_lines() {
        let tokenizer = Tokenizer::new("ab\ncd");
        let pos = tokenizer.get_pos(4);
        assert_eq!((pos.line, pos.column), (2, 2));
        let pos = tokenizer.get_pos(1);
        assert_eq!((pos.line, pos.column), (1, 2));
    }
}
