use serde_json::Value;
use stache_compiler_shared::escape_expression;
use std::rc::Rc;
use tracing::trace;

use super::{
    Runtime,
    context::Context,
    data::RenderData,
    helpers::HelperOptions,
    value::{property_path, to_display_string},
};
use crate::{
    ast::ParamType,
    codegen::{ProgramSpec, TemplateSpec},
    compiler::{AmbiguousCall, BlockValueCall, Dispatch, HelperCall, Opcode, Operand, Param},
    errors::RenderError,
};

#[derive(Debug, Default)]
pub struct RenderOptions {
    /// Initial render data. `root` defaults to the render context.
    pub data: Option<RenderData>,
}

/// A renderable template bound to the runtime it was instantiated on.
#[derive(Debug, Clone)]
pub struct Template {
    runtime: Rc<Runtime>,
    spec: Rc<TemplateSpec>,
    /// Whether the template expects to be called with a bound receiver.
    pub is_method: bool,
}

impl Template {
    pub(crate) fn new(runtime: Rc<Runtime>, spec: TemplateSpec) -> Self {
        Self {
            runtime,
            spec: Rc::new(spec),
            is_method: true,
        }
    }

    pub fn spec(&self) -> &TemplateSpec {
        &self.spec
    }

    pub fn runtime(&self) -> &Rc<Runtime> {
        &self.runtime
    }

    pub fn render(&self, context: impl Into<Context>) -> Result<String, RenderError> {
        self.render_with(context, RenderOptions::default())
    }

    pub fn render_with(
        &self,
        context: impl Into<Context>,
        options: RenderOptions,
    ) -> Result<String, RenderError> {
        let context = context.into();
        let data = if self.spec.use_data {
            let mut data = options.data.unwrap_or_default();
            if data.root.is_null() {
                data.root = context.value();
            }
            Some(Rc::new(data))
        } else {
            None
        };
        let executor = Executor {
            runtime: &self.runtime,
            spec: &self.spec,
        };
        executor.invoke(self.spec.main, context, data, vec![], &Scope::default())
    }
}

/// Everything a program needs from the blocks enclosing it.
#[derive(Debug, Clone, Default)]
pub(crate) struct Scope {
    /// `depths[0]` is `this`, `depths[n]` is `n` levels of `../` up.
    pub(crate) depths: Vec<Context>,
    pub(crate) data: Option<Rc<RenderData>>,
    /// Innermost declaration first.
    pub(crate) block_params: Vec<Vec<Value>>,
}

impl Scope {
    pub(crate) fn this(&self) -> Context {
        self.depths.first().cloned().unwrap_or_default()
    }
}

/// What a raw token param tells the helper besides the token itself.
struct RawParam {
    param_type: ParamType,
    context: Context,
    resolved: Option<Value>,
}

pub(crate) struct Executor<'a> {
    pub(crate) runtime: &'a Runtime,
    pub(crate) spec: &'a TemplateSpec,
}

impl<'a> Executor<'a> {
    /// Runs program `index` against `context`, nested inside `outer`.
    pub(crate) fn invoke(
        &self,
        index: usize,
        context: Context,
        data: Option<Rc<RenderData>>,
        block_params: Vec<Value>,
        outer: &Scope,
    ) -> Result<String, RenderError> {
        let program = self
            .spec
            .programs
            .get(index)
            .ok_or(RenderError::UnknownProgram(index))?;

        let mut depths = outer.depths.clone();
        if depths.first().is_none_or(|this| !this.ptr_eq(&context)) {
            depths.insert(0, context);
        }
        let mut frames = outer.block_params.clone();
        if program.block_params > 0 {
            frames.insert(0, block_params);
        }
        let scope = Scope {
            depths,
            data: data.or_else(|| outer.data.clone()),
            block_params: frames,
        };
        self.run(program, &scope)
    }

    fn run(&self, program: &ProgramSpec, scope: &Scope) -> Result<String, RenderError> {
        let mut out = String::new();
        for opcode in program.opcodes.iter() {
            match opcode {
                Opcode::AppendContent { content } => out.push_str(content),
                Opcode::Append { value, escaped } => {
                    let value = self.eval(value, scope)?;
                    let text = to_display_string(&value);
                    if *escaped {
                        out.push_str(&escape_expression(&text));
                    } else {
                        out.push_str(&text);
                    }
                }
            }
        }
        Ok(out)
    }

    fn eval(&self, operand: &Operand, scope: &Scope) -> Result<Value, RenderError> {
        match operand {
            Operand::Literal { value } => Ok(value.clone()),
            Operand::Context {
                depth,
                parts,
                strict,
                falsy,
            } => {
                let Some(context) = scope.depths.get(*depth) else {
                    return Ok(Value::Null);
                };
                let value = match parts.split_first() {
                    None => Some(context.value()),
                    Some((head, rest)) => context
                        .lookup(head)
                        .and_then(|value| property_path(value, rest)),
                };
                match value {
                    Some(value) => Ok(value),
                    None if *strict && !*falsy => Err(RenderError::MissingField {
                        path: parts.join("."),
                        context: to_display_string(&context.value()),
                    }),
                    None => Ok(Value::Null),
                }
            }
            Operand::Data { depth, parts } => Ok(scope
                .data
                .as_ref()
                .and_then(|data| data.ancestor(*depth))
                .and_then(|frame| frame.lookup_path(parts))
                .unwrap_or(Value::Null)),
            Operand::BlockParam {
                frame,
                index,
                parts,
            } => Ok(scope
                .block_params
                .get(*frame)
                .and_then(|values| values.get(*index))
                .cloned()
                .and_then(|value| property_path(value, parts))
                .unwrap_or(Value::Null)),
            Operand::Helper(call) => self.call_helper(call, scope),
            Operand::Ambiguous(call) => self.call_ambiguous(call, scope),
            Operand::BlockValue(call) => self.call_block_value(call, scope),
        }
    }

    fn eval_param(&self, param: &Param, scope: &Scope) -> Result<(Value, Option<RawParam>), RenderError> {
        match param {
            Param::Value { value } => Ok((self.eval(value, scope)?, None)),
            Param::Raw {
                token,
                param_type,
                depth,
                value,
            } => {
                let context = scope.depths.get(*depth).cloned().unwrap_or_default();
                let evaluated = match value {
                    Some(operand) => Some(self.eval(operand, scope)?),
                    None => None,
                };
                let (param, resolved) = match param_type {
                    ParamType::SubExpression => (evaluated.unwrap_or(Value::Null), None),
                    _ => (token.clone(), evaluated),
                };
                let raw = RawParam {
                    param_type: *param_type,
                    context,
                    resolved,
                };
                Ok((param, Some(raw)))
            }
        }
    }

    fn call_helper(&self, call: &HelperCall, scope: &Scope) -> Result<Value, RenderError> {
        let mut options = HelperOptions::new(&call.name, self, scope, call.program, call.inverse);
        let mut params = Vec::with_capacity(call.params.len());
        for param in call.params.iter() {
            let (value, raw) = self.eval_param(param, scope)?;
            if let Some(raw) = raw {
                options.types.push(raw.param_type);
                options.contexts.push(raw.context);
                options.values.push(raw.resolved);
            }
            params.push(value);
        }
        for (key, param) in call.hash.iter() {
            let (value, raw) = self.eval_param(param, scope)?;
            if let Some(raw) = raw {
                options.hash_types.insert(key.clone(), raw.param_type);
                options.hash_contexts.insert(key.clone(), raw.context);
            }
            options.hash.insert(key.clone(), value);
        }

        let helper = match call.dispatch {
            Dispatch::Known | Dispatch::Required => self.runtime.helper(&call.name),
            Dispatch::Lookup => self
                .runtime
                .helper(&call.name)
                .or_else(|| self.runtime.helper("helperMissing")),
        }
        .ok_or_else(|| RenderError::MissingHelper(call.name.clone()))?;
        trace!(helper = %call.name, params = params.len(), "invoking helper");
        helper(&params, &options)
    }

    fn call_ambiguous(&self, call: &AmbiguousCall, scope: &Scope) -> Result<Value, RenderError> {
        let options = HelperOptions::new(&call.name, self, scope, call.program, call.inverse);
        if let Some(helper) = self.runtime.helper(&call.name) {
            return helper(&[], &options);
        }
        let value = self.eval(&call.lookup, scope)?;
        if !call.block {
            return Ok(value);
        }
        let helper = self
            .runtime
            .helper("blockHelperMissing")
            .ok_or_else(|| RenderError::MissingHelper("blockHelperMissing".to_string()))?;
        helper(&[value], &options)
    }

    fn call_block_value(&self, call: &BlockValueCall, scope: &Scope) -> Result<Value, RenderError> {
        let value = self.eval(&call.value, scope)?;
        let options = HelperOptions::new(&call.name, self, scope, call.program, call.inverse);
        let helper = self
            .runtime
            .helper("blockHelperMissing")
            .ok_or_else(|| RenderError::MissingHelper("blockHelperMissing".to_string()))?;
        helper(&[value], &options)
    }
}
