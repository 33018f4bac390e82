use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};
use stache_compiler_shared::PathFlags;
use tracing::trace;

use crate::{
    ast::{
        Expression, HashNode, LiteralValue, ParamType, PathExpression, PathExpressionNode,
        ProgramNode, SourceLocation, Statement,
    },
    errors::{CompilerError, ErrorCodes},
    options::CompileOptions,
};

/// One instruction of a compiled program.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "camelCase")]
pub enum Opcode {
    /// Emit literal template text.
    AppendContent { content: String },
    /// Evaluate `value` and emit its display string.
    Append { value: Operand, escaped: bool },
}

/// A value-producing expression inside an opcode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Operand {
    /// Field lookup on the context `depth` scopes up.
    Context {
        depth: usize,
        parts: Vec<String>,
        #[serde(default)]
        strict: bool,
        #[serde(default)]
        falsy: bool,
    },
    /// `@`-prefixed lookup into the render data frame.
    Data { depth: usize, parts: Vec<String> },
    /// A name bound with `as |...|`; `frame` counts enclosing declarations.
    BlockParam {
        frame: usize,
        index: usize,
        parts: Vec<String>,
    },
    Literal { value: Value },
    /// A call to a named helper.
    Helper(HelperCall),
    /// A bare name that may be a helper or a field; decided at render time.
    Ambiguous(AmbiguousCall),
    /// A block over a plain value, rendered by `blockHelperMissing`.
    BlockValue(BlockValueCall),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Dispatch {
    /// The helper is guaranteed to exist; call it directly.
    Known,
    /// Look the helper up and fall back to `helperMissing`.
    Lookup,
    /// Look the helper up; a missing helper is an error.
    Required,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HelperCall {
    pub name: String,
    pub dispatch: Dispatch,
    pub params: Vec<Param>,
    pub hash: IndexMap<String, Param>,
    pub program: Option<usize>,
    pub inverse: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AmbiguousCall {
    pub name: String,
    pub lookup: Box<Operand>,
    pub program: Option<usize>,
    pub inverse: Option<usize>,
    pub block: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockValueCall {
    pub name: String,
    pub value: Box<Operand>,
    pub program: Option<usize>,
    pub inverse: Option<usize>,
}

/// A helper argument.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "camelCase")]
pub enum Param {
    /// The argument's evaluated value.
    Value { value: Operand },
    /// String-params mode: the token as written, with the scope it was
    /// written against and its kind. Subexpressions carry their call in
    /// `value` and pass its result. References to block params carry their
    /// lookup in `value` too, since no context can resolve them by name.
    #[serde(rename_all = "camelCase")]
    Raw {
        token: Value,
        param_type: ParamType,
        depth: usize,
        value: Option<Operand>,
    },
}

/// A compiled program together with the nested programs its blocks refer to.
/// Program references inside `opcodes` index into `children`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Environment {
    pub opcodes: Vec<Opcode>,
    pub children: Vec<Environment>,
    /// Number of block params this program declares.
    pub block_params: usize,
    pub use_depths: bool,
    pub use_data: bool,
    pub string_params: bool,
}

/// Where a call was written.
#[derive(Debug, Clone, Copy, PartialEq)]
enum Site {
    Mustache,
    Block {
        program: Option<usize>,
        inverse: Option<usize>,
    },
    SubExpression,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum CallKind {
    Helper,
    Ambiguous,
    Simple,
}

pub struct Compiler<'o> {
    options: &'o CompileOptions,
    /// Innermost declaration first.
    block_params: Vec<Vec<String>>,
    opcodes: Vec<Opcode>,
    children: Vec<Environment>,
    use_depths: bool,
}

impl<'o> Compiler<'o> {
    pub fn compile(
        program: &ProgramNode,
        options: &'o CompileOptions,
    ) -> Result<Environment, CompilerError> {
        Compiler::new(options, vec![]).compile_program(program)
    }

    fn new(options: &'o CompileOptions, block_params: Vec<Vec<String>>) -> Self {
        Self {
            options,
            block_params,
            opcodes: vec![],
            children: vec![],
            use_depths: false,
        }
    }

    fn compile_program(mut self, program: &ProgramNode) -> Result<Environment, CompilerError> {
        for statement in program.body.iter() {
            self.compile_statement(statement)?;
        }
        Ok(Environment {
            opcodes: self.opcodes,
            children: self.children,
            block_params: program.block_params.len(),
            use_depths: self.use_depths,
            use_data: self.options.data.unwrap_or(true),
            string_params: self.options.string_params.unwrap_or(false),
        })
    }

    fn compile_child(&mut self, program: &ProgramNode) -> Result<usize, CompilerError> {
        let mut block_params = self.block_params.clone();
        if !program.block_params.is_empty() {
            block_params.insert(0, program.block_params.clone());
        }
        let env = Compiler::new(self.options, block_params).compile_program(program)?;
        self.use_depths |= env.use_depths;
        self.children.push(env);
        Ok(self.children.len() - 1)
    }

    fn compile_statement(&mut self, statement: &Statement) -> Result<(), CompilerError> {
        match statement {
            Statement::Content(node) => {
                if !node.value.is_empty() {
                    self.opcodes.push(Opcode::AppendContent {
                        content: node.value.clone(),
                    });
                }
            }
            Statement::Comment(_) => {}
            Statement::Mustache(node) => {
                let value = self.compile_call(
                    &node.path,
                    &node.params,
                    node.hash.as_ref(),
                    Site::Mustache,
                )?;
                let escaped = node.escaped && !self.options.no_escape.unwrap_or(false);
                self.opcodes.push(Opcode::Append { value, escaped });
            }
            Statement::Block(node) => {
                let program = match &node.program {
                    Some(program) => Some(self.compile_child(program)?),
                    None => None,
                };
                let inverse = match &node.inverse {
                    Some(inverse) => Some(self.compile_child(inverse)?),
                    None => None,
                };
                let value = self.compile_call(
                    &node.path,
                    &node.params,
                    node.hash.as_ref(),
                    Site::Block { program, inverse },
                )?;
                self.opcodes.push(Opcode::Append {
                    value,
                    escaped: false,
                });
            }
        }
        Ok(())
    }

    fn classify(&self, path: &PathExpression, has_args: bool, site: Site) -> CallKind {
        let is_simple = path.is_simple();
        let is_block_param = is_simple && self.block_param_index(&path.parts[0]).is_some();

        // block params shadow helpers of the same name
        let mut is_helper =
            !is_block_param && (matches!(site, Site::SubExpression) || has_args);
        let mut is_eligible = !is_block_param && (is_helper || is_simple);

        if is_eligible && !is_helper {
            if self.options.is_known_helper(&path.parts[0]) {
                is_helper = true;
            } else if self.options.known_helpers_only.unwrap_or(false) {
                is_eligible = false;
            }
        }

        if is_helper {
            CallKind::Helper
        } else if is_eligible {
            CallKind::Ambiguous
        } else {
            CallKind::Simple
        }
    }

    fn compile_call(
        &mut self,
        callee: &Expression,
        params: &[Expression],
        hash: Option<&HashNode>,
        site: Site,
    ) -> Result<Operand, CompilerError> {
        let path = match callee {
            Expression::Path(path) => path.clone(),
            Expression::Literal(literal) => literal_to_path(&literal.value, &literal.loc),
            Expression::SubExpression(_) => {
                return Err(CompilerError::with_message(
                    ErrorCodes::UnexpectedToken,
                    Some(callee.loc().clone()),
                    "A subexpression cannot be called",
                ));
            }
        };
        let has_args = !params.is_empty() || hash.is_some();
        let kind = self.classify(&path, has_args, site);
        trace!(path = %path.original, ?kind, ?site, "classified call");

        let (program, inverse) = match site {
            Site::Block { program, inverse } => (program, inverse),
            Site::Mustache | Site::SubExpression => (None, None),
        };
        match kind {
            CallKind::Helper => self.compile_helper(&path, params, hash, program, inverse),
            CallKind::Ambiguous => Ok(Operand::Ambiguous(AmbiguousCall {
                name: path.parts[0].clone(),
                lookup: Box::new(self.compile_lookup(&path)),
                program,
                inverse,
                block: matches!(site, Site::Block { .. }),
            })),
            CallKind::Simple => match site {
                Site::Block { .. } => Ok(Operand::BlockValue(BlockValueCall {
                    name: path.original.clone(),
                    value: Box::new(self.compile_lookup(&path)),
                    program,
                    inverse,
                })),
                Site::Mustache | Site::SubExpression => Ok(self.compile_lookup(&path)),
            },
        }
    }

    fn compile_helper(
        &mut self,
        path: &PathExpressionNode,
        params: &[Expression],
        hash: Option<&HashNode>,
        program: Option<usize>,
        inverse: Option<usize>,
    ) -> Result<Operand, CompilerError> {
        let name = if path.is_simple() {
            path.parts[0].clone()
        } else {
            path.original.clone()
        };
        let dispatch = if path.is_simple() && self.options.is_known_helper(&name) {
            Dispatch::Known
        } else if path.flags.contains(PathFlags::STRICT) {
            Dispatch::Required
        } else if self.options.known_helpers_only.unwrap_or(false) {
            return Err(CompilerError::with_message(
                ErrorCodes::UnknownHelper,
                Some(path.loc.clone()),
                format!("You specified knownHelpersOnly, but used the unknown helper {name}"),
            ));
        } else {
            Dispatch::Lookup
        };

        let params = params
            .iter()
            .map(|param| self.compile_param(param))
            .collect::<Result<Vec<_>, _>>()?;
        let mut compiled_hash = IndexMap::new();
        if let Some(hash) = hash {
            for pair in hash.pairs.iter() {
                let value = self.compile_param(&pair.value)?;
                compiled_hash.insert(pair.key.clone(), value);
            }
        }

        Ok(Operand::Helper(HelperCall {
            name,
            dispatch,
            params,
            hash: compiled_hash,
            program,
            inverse,
        }))
    }

    fn compile_param(&mut self, param: &Expression) -> Result<Param, CompilerError> {
        if !self.options.string_params.unwrap_or(false) {
            return Ok(Param::Value {
                value: self.compile_expression(param)?,
            });
        }

        let depth = param.depth();
        if depth > 0 {
            self.use_depths = true;
        }
        let (token, value) = match param {
            Expression::Literal(literal) => (literal_value(&literal.value), None),
            Expression::Path(path) => {
                let lookup = self.compile_lookup(path);
                let value = matches!(lookup, Operand::BlockParam { .. }).then_some(lookup);
                (Value::String(normalize_token(&path.original)), value)
            }
            Expression::SubExpression(_) => (
                Value::String(normalize_token(&param.original())),
                Some(self.compile_expression(param)?),
            ),
        };
        Ok(Param::Raw {
            token,
            param_type: param.param_type(),
            depth,
            value,
        })
    }

    fn compile_expression(&mut self, expression: &Expression) -> Result<Operand, CompilerError> {
        match expression {
            Expression::Literal(literal) => Ok(Operand::Literal {
                value: literal_value(&literal.value),
            }),
            Expression::Path(path) => Ok(self.compile_lookup(path)),
            Expression::SubExpression(sexpr) => self.compile_call(
                &sexpr.path,
                &sexpr.params,
                sexpr.hash.as_ref(),
                Site::SubExpression,
            ),
        }
    }

    fn compile_lookup(&mut self, path: &PathExpression) -> Operand {
        if path.data {
            return Operand::Data {
                depth: path.depth,
                parts: path.parts.clone(),
            };
        }
        if path.depth == 0 && !path.is_scoped() {
            if let Some((frame, index)) = path
                .parts
                .first()
                .and_then(|name| self.block_param_index(name))
            {
                return Operand::BlockParam {
                    frame,
                    index,
                    parts: path.parts[1..].to_vec(),
                };
            }
        }
        if path.depth > 0 {
            self.use_depths = true;
        }
        Operand::Context {
            depth: path.depth,
            parts: path.parts.clone(),
            strict: self.options.strict.unwrap_or(false),
            falsy: path.flags.contains(PathFlags::FALSY),
        }
    }

    fn block_param_index(&self, name: &str) -> Option<(usize, usize)> {
        self.block_params
            .iter()
            .enumerate()
            .find_map(|(frame, names)| names.iter().position(|n| n == name).map(|i| (frame, i)))
    }
}

/// `{{"foo"}}` and `{{1}}` call or look up the literal's text.
fn literal_to_path(value: &LiteralValue, loc: &SourceLocation) -> PathExpressionNode {
    let original = match value {
        LiteralValue::String(s) => s.clone(),
        LiteralValue::Number(n) => format_number(*n),
        LiteralValue::Boolean(b) => b.to_string(),
        LiteralValue::Undefined => "undefined".to_string(),
        LiteralValue::Null => "null".to_string(),
    };
    PathExpressionNode::new(
        false,
        0,
        vec![original.clone()],
        original,
        PathFlags::empty(),
        loc.clone(),
    )
}

pub(crate) fn literal_value(value: &LiteralValue) -> Value {
    match value {
        LiteralValue::String(s) => Value::String(s.clone()),
        LiteralValue::Number(n) => number_value(*n),
        LiteralValue::Boolean(b) => Value::Bool(*b),
        LiteralValue::Undefined | LiteralValue::Null => Value::Null,
    }
}

fn number_value(n: f64) -> Value {
    if n.fract() == 0.0 && n.abs() < 9_007_199_254_740_992.0 {
        Value::Number(Number::from(n as i64))
    } else {
        Number::from_f64(n).map_or(Value::Null, Value::Number)
    }
}

fn format_number(n: f64) -> String {
    match number_value(n) {
        Value::Number(n) => n.to_string(),
        _ => String::new(),
    }
}

/// Strips leading `./` and `../` segments and turns `/` separators into `.`.
pub(crate) fn normalize_token(original: &str) -> String {
    let mut rest = original;
    loop {
        if let Some(stripped) = rest.strip_prefix("../") {
            rest = stripped;
        } else if let Some(stripped) = rest.strip_prefix("./") {
            rest = stripped;
        } else {
            break;
        }
    }
    rest.replace('/', ".")
}
