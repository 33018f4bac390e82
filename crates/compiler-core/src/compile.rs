use std::rc::Rc;
use tracing::debug;

use crate::{
    ast::ProgramNode,
    codegen::{CodegenResult, generate},
    compiler::Compiler,
    errors::{CompilerError, TemplateError},
    options::{CodegenOptions, CompileOptions},
    parser::base_parse,
    runtime::{Runtime, Template},
};

pub enum BaseCompileSource {
    String(String),
    Program(ProgramNode),
}

impl From<&str> for BaseCompileSource {
    fn from(source: &str) -> Self {
        Self::String(source.to_string())
    }
}

impl From<ProgramNode> for BaseCompileSource {
    fn from(program: ProgramNode) -> Self {
        Self::Program(program)
    }
}

// we name it `base_compile` so that higher order compilers can export their
// own `compile` while re-exporting everything else.
pub fn base_compile(
    source: BaseCompileSource,
    options: &CompileOptions,
    codegen_options: &CodegenOptions,
) -> Result<CodegenResult, CompilerError> {
    let ast = match source {
        BaseCompileSource::String(source) => base_parse(&source, None)?,
        BaseCompileSource::Program(program) => program,
    };
    let env = Compiler::compile(&ast, options)?;
    debug!(children = env.children.len(), "compiled environment");
    Ok(generate(env, codegen_options))
}

/// Compiles `source` into the serialized form of its template spec.
pub fn base_precompile(
    source: BaseCompileSource,
    options: &CompileOptions,
    codegen_options: &CodegenOptions,
) -> Result<String, CompilerError> {
    Ok(base_compile(source, options, codegen_options)?.source())
}

/// Compiles `source` and instantiates it on `runtime`.
pub fn compile_template(
    runtime: &Rc<Runtime>,
    source: BaseCompileSource,
    options: &CompileOptions,
) -> Result<Template, TemplateError> {
    let codegen_options = CodegenOptions {
        namespace: Some(runtime.namespace().to_string()),
    };
    let result = base_compile(source, options, &codegen_options)?;
    Ok(runtime.template(result.spec)?)
}
