use serde::{Deserialize, Serialize};
use stache_compiler_shared::PathFlags;
use std::ops::{Deref, DerefMut};

#[derive(Debug, PartialEq, Clone, Copy)]
pub enum NodeTypes {
    Program,
    MustacheStatement,
    BlockStatement,
    ContentStatement,
    CommentStatement,
    SubExpression,
    PathExpression,
    StringLiteral,
    NumberLiteral,
    BooleanLiteral,
    UndefinedLiteral,
    NullLiteral,
    Hash,
    HashPair,
}

#[derive(Debug)]
pub struct Node<I> {
    pub type_: NodeTypes,
    pub loc: SourceLocation,

    pub inner: I,
}

impl<I> Deref for Node<I> {
    type Target = I;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

impl<I> DerefMut for Node<I> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.inner
    }
}

impl<I> PartialEq for Node<I>
where
    I: PartialEq,
{
    fn eq(&self, other: &Self) -> bool {
        self.type_ == other.type_ && self.loc == other.loc && self.inner == other.inner
    }
}

impl<I> Clone for Node<I>
where
    I: Clone,
{
    fn clone(&self) -> Self {
        Self {
            type_: self.type_,
            loc: self.loc.clone(),
            inner: self.inner.clone(),
        }
    }
}

/// The node's range. The `start` is inclusive and `end` is exclusive.
/// [start, end)
#[derive(Debug, Clone, PartialEq)]
pub struct SourceLocation {
    pub start: Position,
    pub end: Position,
    pub source: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Position {
    /// from start of file
    pub offset: usize,
    pub line: usize,
    pub column: usize,
}

/// Whitespace control markers (`~`) on either side of a mustache.
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct StripFlags {
    pub open: bool,
    pub close: bool,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Program {
    pub body: Vec<Statement>,
    pub block_params: Vec<String>,
}

pub type ProgramNode = Node<Program>;

impl ProgramNode {
    pub fn new(body: Vec<Statement>, block_params: Vec<String>, loc: SourceLocation) -> Self {
        Node {
            type_: NodeTypes::Program,
            loc,
            inner: Program { body, block_params },
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    Mustache(MustacheStatementNode),
    Block(BlockStatementNode),
    Content(ContentStatementNode),
    Comment(CommentStatementNode),
}

impl Statement {
    pub fn loc(&self) -> &SourceLocation {
        match self {
            Self::Mustache(node) => &node.loc,
            Self::Block(node) => &node.loc,
            Self::Content(node) => &node.loc,
            Self::Comment(node) => &node.loc,
        }
    }

    pub fn new_content(value: impl Into<String>, loc: SourceLocation) -> Self {
        let value = value.into();
        Self::Content(Node {
            type_: NodeTypes::ContentStatement,
            loc,
            inner: ContentStatement {
                original: value.clone(),
                value,
            },
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MustacheStatement {
    pub path: Expression,
    pub params: Vec<Expression>,
    pub hash: Option<HashNode>,
    /// `false` for `{{{ }}}` and `{{& }}`.
    pub escaped: bool,
    pub strip: StripFlags,
}

pub type MustacheStatementNode = Node<MustacheStatement>;

impl MustacheStatementNode {
    pub fn new(
        path: Expression,
        params: Vec<Expression>,
        hash: Option<HashNode>,
        escaped: bool,
        strip: StripFlags,
        loc: SourceLocation,
    ) -> Self {
        Node {
            type_: NodeTypes::MustacheStatement,
            loc,
            inner: MustacheStatement {
                path,
                params,
                hash,
                escaped,
                strip,
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BlockStatement {
    pub path: Expression,
    pub params: Vec<Expression>,
    pub hash: Option<HashNode>,
    pub program: Option<ProgramNode>,
    pub inverse: Option<ProgramNode>,
    pub open_strip: StripFlags,
    pub inverse_strip: StripFlags,
    pub close_strip: StripFlags,
}

pub type BlockStatementNode = Node<BlockStatement>;

#[derive(Debug, Clone, PartialEq)]
pub struct ContentStatement {
    pub value: String,
    /// The text as written, before whitespace control trimmed it.
    pub original: String,
}

pub type ContentStatementNode = Node<ContentStatement>;

#[derive(Debug, Clone, PartialEq)]
pub struct CommentStatement {
    pub value: String,
    pub strip: StripFlags,
}

pub type CommentStatementNode = Node<CommentStatement>;

#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    Path(PathExpressionNode),
    SubExpression(Box<SubExpressionNode>),
    Literal(LiteralNode),
}

impl Expression {
    pub fn loc(&self) -> &SourceLocation {
        match self {
            Self::Path(node) => &node.loc,
            Self::SubExpression(node) => &node.loc,
            Self::Literal(node) => &node.loc,
        }
    }

    pub fn as_path(&self) -> Option<&PathExpressionNode> {
        match self {
            Self::Path(path) => Some(path),
            _ => None,
        }
    }

    /// Scope hops the expression was written with; literals have none.
    pub fn depth(&self) -> usize {
        match self {
            Self::Path(path) => path.depth,
            _ => 0,
        }
    }

    pub fn original(&self) -> String {
        match self {
            Self::Path(path) => path.original.clone(),
            Self::SubExpression(sexpr) => sexpr.path.original(),
            Self::Literal(literal) => literal.original.clone(),
        }
    }

    pub fn param_type(&self) -> ParamType {
        match self {
            Self::Path(_) => ParamType::Id,
            Self::SubExpression(_) => ParamType::SubExpression,
            Self::Literal(literal) => match literal.value {
                LiteralValue::String(_) => ParamType::String,
                LiteralValue::Number(_) => ParamType::Number,
                LiteralValue::Boolean(_) => ParamType::Boolean,
                LiteralValue::Undefined => ParamType::Undefined,
                LiteralValue::Null => ParamType::Null,
            },
        }
    }
}

/// The kind of token a helper parameter was written as. Recorded alongside
/// raw tokens when compiling with string params.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ParamType {
    Id,
    SubExpression,
    String,
    Number,
    Boolean,
    Undefined,
    Null,
}

impl ParamType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Id => "ID",
            Self::SubExpression => "SubExpression",
            Self::String => "StringLiteral",
            Self::Number => "NumberLiteral",
            Self::Boolean => "BooleanLiteral",
            Self::Undefined => "UndefinedLiteral",
            Self::Null => "NullLiteral",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PathExpression {
    /// `@`-prefixed reference into the render data frame.
    pub data: bool,
    /// Number of `../` hops.
    pub depth: usize,
    pub parts: Vec<String>,
    pub original: String,
    pub flags: PathFlags,
}

pub type PathExpressionNode = Node<PathExpression>;

impl PathExpressionNode {
    pub fn new(
        data: bool,
        depth: usize,
        parts: Vec<String>,
        original: impl Into<String>,
        flags: PathFlags,
        loc: SourceLocation,
    ) -> Self {
        Node {
            type_: NodeTypes::PathExpression,
            loc,
            inner: PathExpression {
                data,
                depth,
                parts,
                original: original.into(),
                flags,
            },
        }
    }
}

impl PathExpression {
    pub fn is_scoped(&self) -> bool {
        self.flags.contains(PathFlags::SCOPED)
    }

    /// A single-segment, unscoped, depth-0 path: the only kind of path that
    /// may name a helper.
    pub fn is_simple(&self) -> bool {
        !self.data && self.depth == 0 && !self.is_scoped() && self.parts.len() == 1
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SubExpression {
    pub path: Expression,
    pub params: Vec<Expression>,
    pub hash: Option<HashNode>,
}

pub type SubExpressionNode = Node<SubExpression>;

#[derive(Debug, Clone, PartialEq)]
pub enum LiteralValue {
    String(String),
    Number(f64),
    Boolean(bool),
    Undefined,
    Null,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Literal {
    pub value: LiteralValue,
    pub original: String,
}

pub type LiteralNode = Node<Literal>;

impl LiteralNode {
    pub fn new(value: LiteralValue, original: impl Into<String>, loc: SourceLocation) -> Self {
        let type_ = match value {
            LiteralValue::String(_) => NodeTypes::StringLiteral,
            LiteralValue::Number(_) => NodeTypes::NumberLiteral,
            LiteralValue::Boolean(_) => NodeTypes::BooleanLiteral,
            LiteralValue::Undefined => NodeTypes::UndefinedLiteral,
            LiteralValue::Null => NodeTypes::NullLiteral,
        };
        Node {
            type_,
            loc,
            inner: Literal {
                value,
                original: original.into(),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Hash {
    pub pairs: Vec<HashPairNode>,
}

pub type HashNode = Node<Hash>;

#[derive(Debug, Clone, PartialEq)]
pub struct HashPair {
    pub key: String,
    pub value: Expression,
}

pub type HashPairNode = Node<HashPair>;
