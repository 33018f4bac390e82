use crate::{
    ast::{
        BlockStatement, CommentStatement, ContentStatement, Expression, Hash, HashNode, HashPair, LiteralNode,
        LiteralValue, MustacheStatementNode, Node, NodeTypes, PathExpressionNode, ProgramNode, SourceLocation, Statement,
        StripFlags, SubExpression,
    },
    errors::{CompilerError, ErrorCodes},
    options::ParserOptions,
    tokenizer::{OpenKind, Token, TokenKind, Tokenizer},
};
use stache_compiler_shared::PathFlags;
use tracing::trace;

/// The opening half of a block: `{{#path params hash as |x|}}`.
#[derive(Debug)]
struct BlockOpen {
    path: Expression,
    params: Vec<Expression>,
    hash: Option<HashNode>,
    block_params: Vec<String>,
    strip: StripFlags,
    start: usize,
}

#[derive(Debug)]
struct BlockClose {
    name: String,
    strip: StripFlags,
    start: usize,
    end: usize,
}

/// Why a program body stopped.
#[derive(Debug)]
enum ProgramEnd {
    Eof,
    /// `{{else}}`, `{{^}}` or a chained `{{else if x}}`.
    Inverse {
        strip: StripFlags,
        chain: Option<BlockOpen>,
        start: usize,
    },
    /// `{{/` was seen; the close token itself is left unread.
    Close { start: usize },
}

struct BlockParts {
    program: ProgramNode,
    inverse: Option<ProgramNode>,
    inverse_strip: StripFlags,
    close: BlockClose,
}

pub struct ParserContext {
    current_options: ParserOptions,
    tokenizer: Tokenizer,
    tokens: Vec<Token>,
    index: usize,
}

pub fn base_parse(input: &str, options: Option<ParserOptions>) -> Result<ProgramNode, CompilerError> {
    let (tokens, tokenizer) = Tokenizer::new(input).tokenize()?;
    trace!(tokens = tokens.len(), "tokenized template");
    let mut context = ParserContext {
        current_options: options.unwrap_or_default(),
        tokenizer,
        tokens,
        index: 0,
    };

    let (mut body, end) = context.parse_program()?;
    match end {
        ProgramEnd::Eof => {}
        ProgramEnd::Inverse { start, .. } => {
            return Err(CompilerError::new(
                ErrorCodes::UnexpectedElse,
                Some(context.get_loc(start, context.end_of(start))),
            ));
        }
        ProgramEnd::Close { start } => {
            return Err(CompilerError::new(
                ErrorCodes::UnexpectedCloseBlock,
                Some(context.get_loc(start, context.end_of(start))),
            ));
        }
    }

    strip_whitespace(&mut body);
    let len = context.tokenizer.buffer.len();
    Ok(ProgramNode::new(body, Vec::new(), context.get_loc(0, len)))
}

impl ParserContext {
    fn get_loc(&self, start: usize, end: usize) -> SourceLocation {
        self.tokenizer.get_loc(start, end)
    }

    /// End offset of the mustache starting at `start`.
    fn end_of(&self, start: usize) -> usize {
        self.tokens
            .iter()
            .skip_while(|t| t.start < start)
            .find(|t| matches!(t.kind, TokenKind::Close { .. }))
            .map_or(self.tokenizer.buffer.len(), |t| t.end)
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.index)
    }

    fn peek_kind(&self, offset: usize) -> Option<&TokenKind> {
        self.tokens.get(self.index + offset).map(|t| &t.kind)
    }

    fn next(&mut self) -> Result<Token, CompilerError> {
        let Some(token) = self.tokens.get(self.index).cloned() else {
            let len = self.tokenizer.buffer.len();
            return Err(CompilerError::new(
                ErrorCodes::UnexpectedEof,
                Some(self.get_loc(len, len)),
            ));
        };
        self.index += 1;
        Ok(token)
    }

    fn unexpected(&self, token: &Token) -> CompilerError {
        let loc = self.get_loc(token.start, token.end);
        let message = format!("Unexpected token '{}'", loc.source);
        CompilerError::with_message(ErrorCodes::UnexpectedToken, Some(loc), message)
    }

    fn parse_program(&mut self) -> Result<(Vec<Statement>, ProgramEnd), CompilerError> {
        let mut body = Vec::new();
        loop {
            let Some(token) = self.peek().cloned() else {
                return Ok((body, ProgramEnd::Eof));
            };
            match token.kind {
                TokenKind::Content { value, original } => {
                    self.index += 1;
                    body.push(Statement::Content(Node {
                        type_: NodeTypes::ContentStatement,
                        loc: self.get_loc(token.start, token.end),
                        inner: ContentStatement { value, original },
                    }));
                }
                TokenKind::Comment {
                    value,
                    strip_open,
                    strip_close,
                } => {
                    self.index += 1;
                    if self.current_options.comments.unwrap_or(true) {
                        body.push(Statement::Comment(Node {
                            type_: NodeTypes::CommentStatement,
                            loc: self.get_loc(token.start, token.end),
                            inner: CommentStatement {
                                value,
                                strip: StripFlags {
                                    open: strip_open,
                                    close: strip_close,
                                },
                            },
                        }));
                    }
                }
                TokenKind::Open { kind, strip } => {
                    if let Some(end) = self.program_end(kind, strip, token.start)? {
                        return Ok((body, end));
                    }
                    self.index += 1;
                    let statement = match kind {
                        OpenKind::Block | OpenKind::Inverse => {
                            self.parse_block(kind, strip, token.start)?
                        }
                        _ => self.parse_mustache(kind, strip, token.start)?,
                    };
                    body.push(statement);
                }
                _ => return Err(self.unexpected(&token)),
            }
        }
    }

    /// Detects `{{else}}`, `{{^}}`, `{{else if …}}` and `{{/…}}`, consuming
    /// the inverse markers.
    fn program_end(
        &mut self,
        kind: OpenKind,
        strip: bool,
        start: usize,
    ) -> Result<Option<ProgramEnd>, CompilerError> {
        match kind {
            OpenKind::EndBlock => Ok(Some(ProgramEnd::Close { start })),
            OpenKind::Inverse
                if matches!(self.peek_kind(1), Some(TokenKind::Close { .. })) =>
            {
                self.index += 1;
                let close = self.expect_close(false)?;
                Ok(Some(ProgramEnd::Inverse {
                    strip: StripFlags {
                        open: strip,
                        close,
                    },
                    chain: None,
                    start,
                }))
            }
            OpenKind::Escaped
                if matches!(
                    self.peek_kind(1),
                    Some(TokenKind::Id { name, literal: false }) if name == "else"
                ) =>
            {
                self.index += 2;
                if matches!(self.peek_kind(0), Some(TokenKind::Close { .. })) {
                    let close = self.expect_close(false)?;
                    return Ok(Some(ProgramEnd::Inverse {
                        strip: StripFlags {
                            open: strip,
                            close,
                        },
                        chain: None,
                        start,
                    }));
                }
                let chain = self.parse_block_open(strip, start)?;
                if chain.params.is_empty() && chain.hash.is_none() {
                    return Err(CompilerError::new(
                        ErrorCodes::EmptyElseChain,
                        Some(self.get_loc(start, self.tokens[self.index - 1].end)),
                    ));
                }
                Ok(Some(ProgramEnd::Inverse {
                    strip: chain.strip,
                    chain: Some(chain),
                    start,
                }))
            }
            _ => Ok(None),
        }
    }

    /// Consumes a close token, returning its strip flag.
    fn expect_close(&mut self, unescaped: bool) -> Result<bool, CompilerError> {
        let token = self.next()?;
        match token.kind {
            TokenKind::Close {
                unescaped: found,
                strip,
            } if found == unescaped => Ok(strip),
            _ => Err(self.unexpected(&token)),
        }
    }

    fn parse_mustache(
        &mut self,
        kind: OpenKind,
        strip_open: bool,
        start: usize,
    ) -> Result<Statement, CompilerError> {
        let (path, params, hash) = self.parse_call()?;
        let strip_close = self.expect_close(kind == OpenKind::Unescaped)?;
        let end = self.tokens[self.index - 1].end;

        Ok(Statement::Mustache(MustacheStatementNode::new(
            path,
            params,
            hash,
            kind == OpenKind::Escaped,
            StripFlags {
                open: strip_open,
                close: strip_close,
            },
            self.get_loc(start, end),
        )))
    }

    fn parse_block_open(&mut self, strip_open: bool, start: usize) -> Result<BlockOpen, CompilerError> {
        let (path, params, hash) = self.parse_call()?;
        let mut block_params = Vec::new();
        if matches!(self.peek_kind(0), Some(TokenKind::OpenBlockParams)) {
            let open = self.next()?;
            loop {
                let token = self.next()?;
                match token.kind {
                    TokenKind::Id { name, .. } => block_params.push(name),
                    TokenKind::CloseBlockParams if !block_params.is_empty() => break,
                    _ => {
                        return Err(CompilerError::new(
                            ErrorCodes::InvalidBlockParams,
                            Some(self.get_loc(open.start, token.end)),
                        ));
                    }
                }
            }
        }
        let strip_close = self.expect_close(false)?;
        Ok(BlockOpen {
            path,
            params,
            hash,
            block_params,
            strip: StripFlags {
                open: strip_open,
                close: strip_close,
            },
            start,
        })
    }

    fn parse_block(
        &mut self,
        kind: OpenKind,
        strip_open: bool,
        start: usize,
    ) -> Result<Statement, CompilerError> {
        let open = self.parse_block_open(strip_open, start)?;
        let name = open.path.original();
        let parts = self.parse_block_tail(&open)?;
        if parts.close.name != name {
            let loc = self.get_loc(parts.close.start, parts.close.end);
            let message = format!("{} doesn't match {}", name, parts.close.name);
            return Err(CompilerError::with_message(
                ErrorCodes::MismatchedCloseBlock,
                Some(loc),
                message,
            ));
        }

        let inverted = kind == OpenKind::Inverse;
        Ok(self.finish_block(open, parts, inverted))
    }

    fn finish_block(&self, open: BlockOpen, parts: BlockParts, inverted: bool) -> Statement {
        let BlockParts {
            program,
            inverse,
            inverse_strip,
            close,
        } = parts;
        let (program, inverse) = if inverted {
            (inverse, Some(program))
        } else {
            (Some(program), inverse)
        };

        Statement::Block(Node {
            type_: NodeTypes::BlockStatement,
            loc: self.get_loc(open.start, close.end),
            inner: BlockStatement {
                path: open.path,
                params: open.params,
                hash: open.hash,
                program,
                inverse,
                open_strip: open.strip,
                inverse_strip,
                close_strip: close.strip,
            },
        })
    }

    fn parse_block_tail(&mut self, open: &BlockOpen) -> Result<BlockParts, CompilerError> {
        let body_start = self.tokens[self.index - 1].end;
        let (body, end) = self.parse_program()?;
        let body_end = body.last().map_or(body_start, |s| s.loc().end.offset);
        let program = ProgramNode::new(
            body,
            open.block_params.clone(),
            self.get_loc(body_start, body_end),
        );

        match end {
            ProgramEnd::Eof => Err(CompilerError::new(
                ErrorCodes::MissingCloseBlock,
                Some(self.get_loc(open.start, self.end_of(open.start))),
            )),
            ProgramEnd::Close { .. } => {
                let close = self.parse_close()?;
                Ok(BlockParts {
                    program,
                    inverse: None,
                    inverse_strip: StripFlags::default(),
                    close,
                })
            }
            ProgramEnd::Inverse {
                strip,
                chain: None,
                ..
            } => {
                let inverse_start = self.tokens[self.index - 1].end;
                let (inverse_body, inverse_end) = self.parse_program()?;
                let close = match inverse_end {
                    ProgramEnd::Close { .. } => self.parse_close()?,
                    ProgramEnd::Inverse { start, .. } => {
                        return Err(CompilerError::new(
                            ErrorCodes::UnexpectedElse,
                            Some(self.get_loc(start, self.end_of(start))),
                        ));
                    }
                    ProgramEnd::Eof => {
                        return Err(CompilerError::new(
                            ErrorCodes::MissingCloseBlock,
                            Some(self.get_loc(open.start, self.end_of(open.start))),
                        ));
                    }
                };
                let inverse = ProgramNode::new(
                    inverse_body,
                    Vec::new(),
                    self.get_loc(inverse_start, close.start.max(inverse_start)),
                );
                Ok(BlockParts {
                    program,
                    inverse: Some(inverse),
                    inverse_strip: strip,
                    close,
                })
            }
            ProgramEnd::Inverse {
                strip,
                chain: Some(chain),
                start,
            } => {
                let mut parts = self.parse_block_tail(&chain)?;
                let close = BlockClose {
                    name: parts.close.name.clone(),
                    strip: parts.close.strip,
                    start: parts.close.start,
                    end: parts.close.end,
                };
                // the chained block shares the outer close and has none of its own
                parts.close = BlockClose {
                    name: String::new(),
                    strip: close.strip,
                    start: close.start,
                    end: close.start,
                };
                let chained = self.finish_block(chain, parts, false);
                let inverse = ProgramNode::new(
                    vec![chained],
                    Vec::new(),
                    self.get_loc(start, close.start),
                );
                Ok(BlockParts {
                    program,
                    inverse: Some(inverse),
                    inverse_strip: strip,
                    close,
                })
            }
        }
    }

    fn parse_close(&mut self) -> Result<BlockClose, CompilerError> {
        let open = self.next()?;
        let TokenKind::Open {
            kind: OpenKind::EndBlock,
            strip: strip_open,
        } = open.kind
        else {
            return Err(self.unexpected(&open));
        };
        let path = self.parse_expression()?;
        let strip_close = self.expect_close(false)?;
        Ok(BlockClose {
            name: path.original(),
            strip: StripFlags {
                open: strip_open,
                close: strip_close,
            },
            start: open.start,
            end: self.tokens[self.index - 1].end,
        })
    }

    /// `path param* hash?`, shared by mustaches, blocks and subexpressions.
    fn parse_call(
        &mut self,
    ) -> Result<(Expression, Vec<Expression>, Option<HashNode>), CompilerError> {
        let path = self.parse_expression()?;
        let mut params = Vec::new();
        while self.at_param() {
            params.push(self.parse_expression()?);
        }
        let hash = self.parse_hash()?;
        Ok((path, params, hash))
    }

    fn at_hash_pair(&self) -> bool {
        matches!(
            (self.peek_kind(0), self.peek_kind(1)),
            (Some(TokenKind::Id { .. }), Some(TokenKind::Equals))
        )
    }

    fn at_param(&self) -> bool {
        !self.at_hash_pair()
            && matches!(
                self.peek_kind(0),
                Some(
                    TokenKind::Id { .. }
                        | TokenKind::Data
                        | TokenKind::OpenSexpr
                        | TokenKind::String(_)
                        | TokenKind::Number(_)
                        | TokenKind::Boolean(_)
                        | TokenKind::Undefined
                        | TokenKind::Null
                )
            )
    }

    fn parse_hash(&mut self) -> Result<Option<HashNode>, CompilerError> {
        let mut pairs = Vec::new();
        let start = self.peek().map_or(0, |t| t.start);
        while self.at_hash_pair() {
            let key_token = self.next()?;
            let TokenKind::Id { name, .. } = key_token.kind.clone() else {
                return Err(self.unexpected(&key_token));
            };
            // skip "="
            self.index += 1;
            let value = self.parse_expression()?;
            let end = self.tokens[self.index - 1].end;
            pairs.push(Node {
                type_: NodeTypes::HashPair,
                loc: self.get_loc(key_token.start, end),
                inner: HashPair { key: name, value },
            });
        }
        if pairs.is_empty() {
            return Ok(None);
        }
        let end = self.tokens[self.index - 1].end;
        Ok(Some(Node {
            type_: NodeTypes::Hash,
            loc: self.get_loc(start, end),
            inner: Hash { pairs },
        }))
    }

    fn parse_expression(&mut self) -> Result<Expression, CompilerError> {
        let token = self.next()?;
        let loc = self.get_loc(token.start, token.end);
        let original = loc.source.clone();
        let literal = |value| Ok(Expression::Literal(LiteralNode::new(value, original, loc)));
        match token.kind.clone() {
            TokenKind::String(value) => literal(LiteralValue::String(value)),
            TokenKind::Number(value) => match value.parse::<f64>() {
                Ok(number) => literal(LiteralValue::Number(number)),
                Err(_) => Err(self.unexpected(&token)),
            },
            TokenKind::Boolean(value) => literal(LiteralValue::Boolean(value)),
            TokenKind::Undefined => literal(LiteralValue::Undefined),
            TokenKind::Null => literal(LiteralValue::Null),
            TokenKind::OpenSexpr => {
                let (path, params, hash) = self.parse_call()?;
                let close = self.next()?;
                if close.kind != TokenKind::CloseSexpr {
                    return Err(self.unexpected(&close));
                }
                Ok(Expression::SubExpression(Box::new(Node {
                    type_: NodeTypes::SubExpression,
                    loc: self.get_loc(token.start, close.end),
                    inner: SubExpression { path, params, hash },
                })))
            }
            TokenKind::Data => {
                let first = self.next()?;
                self.parse_path(true, first, token.start)
            }
            TokenKind::Id { .. } => self.parse_path(false, token.clone(), token.start),
            _ => Err(self.unexpected(&token)),
        }
    }

    fn parse_path(&mut self, data: bool, first: Token, start: usize) -> Result<Expression, CompilerError> {
        let mut segments = Vec::new();
        let TokenKind::Id { name, literal } = first.kind.clone() else {
            return Err(self.unexpected(&first));
        };
        segments.push((None, name, literal));
        let mut end = first.end;
        loop {
            let sep = match (self.peek_kind(0), self.peek_kind(1)) {
                (Some(TokenKind::Sep(sep)), Some(TokenKind::Id { .. })) => *sep,
                _ => break,
            };
            self.index += 1;
            let token = self.next()?;
            let TokenKind::Id { name, literal } = token.kind.clone() else {
                return Err(self.unexpected(&token));
            };
            segments.push((Some(sep), name, literal));
            end = token.end;
        }

        let mut original = if data { "@".to_string() } else { String::new() };
        let mut parts: Vec<String> = Vec::new();
        let mut depth = 0;
        let mut after_self = false;
        for (sep, part, literal) in segments {
            if let Some(sep) = sep {
                original.push(sep);
            }
            original.push_str(&part);
            if !literal && (part == ".." || part == "." || part == "this") {
                // `..` may only lead a path, never follow `this` or `.`
                if !parts.is_empty() || (part == ".." && after_self) {
                    let message = format!("Invalid path: {original}");
                    return Err(CompilerError::with_message(
                        ErrorCodes::InvalidPath,
                        Some(self.get_loc(start, end)),
                        message,
                    ));
                } else if part == ".." {
                    depth += 1;
                } else {
                    after_self = true;
                }
            } else {
                parts.push(part);
            }
        }

        let mut flags = PathFlags::empty();
        if is_scoped(&original) {
            flags |= PathFlags::SCOPED;
        }
        Ok(Expression::Path(PathExpressionNode::new(
            data,
            depth,
            parts,
            original,
            flags,
            self.get_loc(start, end),
        )))
    }
}

fn is_scoped(original: &str) -> bool {
    original.starts_with('.')
        || original
            .strip_prefix("this")
            .is_some_and(|rest| !rest.starts_with(|c: char| c.is_alphanumeric() || c == '_'))
}

fn trim_end_at(body: &mut [Statement], index: Option<usize>) {
    if let Some(Statement::Content(content)) = index.and_then(|i| body.get_mut(i)) {
        content.value = content.value.trim_end().to_string();
    }
}

fn trim_start_at(body: &mut [Statement], index: usize) {
    if let Some(Statement::Content(content)) = body.get_mut(index) {
        content.value = content.value.trim_start().to_string();
    }
}

fn trim_program_start(program: Option<&mut ProgramNode>) {
    if let Some(program) = program {
        trim_start_at(&mut program.body, 0);
    }
}

fn trim_program_end(program: Option<&mut ProgramNode>) {
    if let Some(program) = program {
        let last = program.body.len().checked_sub(1);
        trim_end_at(&mut program.body, last);
    }
}

/// Applies `~` whitespace control to content adjacent to each statement.
fn strip_whitespace(body: &mut Vec<Statement>) {
    for i in 0..body.len() {
        let (before, after) = match &mut body[i] {
            Statement::Mustache(node) => (node.strip.open, node.strip.close),
            Statement::Comment(node) => (node.strip.open, node.strip.close),
            Statement::Block(node) => {
                let BlockStatement {
                    program,
                    inverse,
                    open_strip,
                    inverse_strip,
                    close_strip,
                    ..
                } = &mut node.inner;
                if let Some(program) = program.as_mut() {
                    strip_whitespace(&mut program.body);
                }
                if let Some(inverse) = inverse.as_mut() {
                    strip_whitespace(&mut inverse.body);
                }

                if open_strip.close {
                    trim_program_start(program.as_mut().or(inverse.as_mut()));
                }
                if program.is_some() && inverse.is_some() {
                    if inverse_strip.open {
                        trim_program_end(program.as_mut());
                    }
                    if inverse_strip.close {
                        trim_program_start(inverse.as_mut());
                    }
                }
                if close_strip.open {
                    trim_program_end(inverse.as_mut().or(program.as_mut()));
                }
                (open_strip.open, close_strip.close)
            }
            Statement::Content(_) => continue,
        };
        if before {
            trim_end_at(body, i.checked_sub(1));
        }
        if after {
            trim_start_at(body, i + 1);
        }
    }
}
