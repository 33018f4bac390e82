//! Templates that render against binding-aware contexts without spelling out
//! lookups.
//!
//! Compared to the default pipeline, templates compiled here:
//! - resolve bare `{{x}}` through the `get` helper,
//! - pass helpers raw tokens (string params) plus render data,
//! - iterate with `{{#each item in items}}`,
//! - run on a runtime with its own namespace.

mod each_in;
mod resolve;
mod rewrite;
mod wrap;

use serde_json::Value;
use stache_compiler_core::{
    BaseCompileSource, CodegenOptions, CompileOptions, CompilerError, HelperOptions,
    ParserOptions, ProgramNode, PropertyReader, Runtime, SetupError, Template, TemplateError,
    TemplateSpec, base_compile, base_parse,
};
use std::rc::Rc;
use tracing::debug;

pub use crate::each_in::each_in;
pub use crate::resolve::{GET_HELPER, get, resolve, resolve_params, resolve_token};
pub use crate::rewrite::{ResolveBareMustache, resolve_bare_mustaches};
pub use crate::wrap::{
    RESOLVED_PARAM_HELPERS, WRAPPED_HELPERS, wrap_helper, wrap_helper_params,
};

/// Namespace compat templates are generated for. Templates from the default
/// pipeline are rejected by the compat runtime, and the other way round.
pub const COMPAT_NAMESPACE: &str = "Stache.Compat";

/// Output of [`CompatCompiler::precompile`].
#[derive(Debug, Clone, PartialEq)]
pub enum Precompiled {
    Object(TemplateSpec),
    Source(String),
}

impl Precompiled {
    pub fn into_spec(self) -> Result<TemplateSpec, SetupError> {
        match self {
            Self::Object(spec) => Ok(spec),
            Self::Source(source) => TemplateSpec::from_source(&source),
        }
    }
}

pub fn parse(template: &str, options: Option<ParserOptions>) -> Result<ProgramNode, CompilerError> {
    base_parse(template, options)
}

/// A compat runtime plus the compile pipeline targeting it.
#[derive(Debug, Clone)]
pub struct CompatCompiler {
    runtime: Rc<Runtime>,
}

impl CompatCompiler {
    pub fn new() -> Result<Self, SetupError> {
        Self::with_runtime(Runtime::new(COMPAT_NAMESPACE))
    }

    /// Builds the compat runtime with `reader` as its property observation
    /// service.
    pub fn with_property_reader(reader: impl PropertyReader + 'static) -> Result<Self, SetupError> {
        let mut runtime = Runtime::new(COMPAT_NAMESPACE);
        runtime.set_property_reader(reader);
        Self::with_runtime(runtime)
    }

    /// Installs the compat helpers on `runtime`. Helpers registered on it
    /// beforehand stay available to templates.
    pub fn with_runtime(mut runtime: Runtime) -> Result<Self, SetupError> {
        install_helpers(&mut runtime)?;
        Ok(Self {
            runtime: Rc::new(runtime),
        })
    }

    pub fn runtime(&self) -> &Rc<Runtime> {
        &self.runtime
    }

    /// Compiles `source` into a template bound to the compat runtime.
    pub fn compile(&self, source: &str) -> Result<Template, TemplateError> {
        let options = CompileOptions {
            data: Some(true),
            string_params: Some(true),
            ..Default::default()
        };
        let spec = self.generate(source, &options)?;
        let mut template = self.runtime.template(spec)?;
        template.is_method = false;
        Ok(template)
    }

    /// Compiles `source` for instantiation later with
    /// [`CompatCompiler::template`]. `as_object` defaults to `true`.
    pub fn precompile(
        &self,
        source: &str,
        as_object: Option<bool>,
    ) -> Result<Precompiled, CompilerError> {
        let mut options = CompileOptions {
            data: Some(true),
            string_params: Some(true),
            ..Default::default()
        };
        options.known_helpers.insert(GET_HELPER.to_string(), true);
        let spec = self.generate(source, &options)?;
        Ok(if as_object.unwrap_or(true) {
            Precompiled::Object(spec)
        } else {
            Precompiled::Source(spec.to_source())
        })
    }

    /// Instantiates precompiled output on the compat runtime.
    pub fn template(&self, precompiled: Precompiled) -> Result<Template, SetupError> {
        let mut template = self.runtime.template(precompiled.into_spec()?)?;
        template.is_method = false;
        Ok(template)
    }

    fn generate(&self, source: &str, options: &CompileOptions) -> Result<TemplateSpec, CompilerError> {
        let mut ast = parse(source, None)?;
        resolve_bare_mustaches(&mut ast);
        let codegen_options = CodegenOptions {
            namespace: Some(COMPAT_NAMESPACE.to_string()),
        };
        let result = base_compile(BaseCompileSource::Program(ast), options, &codegen_options)?;
        debug!(
            programs = result.spec.programs.len(),
            "compiled compat template"
        );
        Ok(result.spec)
    }
}

fn install_helpers(runtime: &mut Runtime) -> Result<(), SetupError> {
    runtime.register_helper(GET_HELPER, get);

    let base_each = runtime
        .helper("each")
        .ok_or_else(|| SetupError::UnknownHelper("each".to_string()))?;
    runtime.register_helper("each", move |params: &[Value], options: &HelperOptions<'_>| {
        each_in(params, options, &base_each)
    });

    for name in WRAPPED_HELPERS {
        wrap_helper(runtime, name)?;
    }
    for name in RESOLVED_PARAM_HELPERS {
        wrap_helper_params(runtime, name)?;
    }
    Ok(())
}
