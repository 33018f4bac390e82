mod ast;
mod codegen;
mod compile;
mod compiler;
mod errors;
mod options;
mod parser;
mod runtime;
mod tokenizer;
mod visitor;

pub use ast::*;
pub use compile::{BaseCompileSource, base_compile, base_precompile, compile_template};
pub use runtime::*;

// Also expose lower level APIs & types
pub use crate::codegen::{COMPILER_VERSION, CodegenResult, ProgramSpec, TemplateSpec, generate};
pub use crate::compiler::{
    AmbiguousCall, BlockValueCall, Compiler, Dispatch, Environment, HelperCall, Opcode, Operand,
    Param,
};
pub use crate::errors::{CompilerError, ErrorCodes, RenderError, SetupError, TemplateError};
pub use crate::options::{
    BUILTIN_HELPERS, CodegenOptions, CompileOptions, DEFAULT_NAMESPACE, ParserOptions,
};
pub use crate::parser::base_parse;
pub use crate::tokenizer::{OpenKind, Token, TokenKind, Tokenizer};
pub use crate::visitor::{NodeVisitor, traverse};
