use indexmap::IndexMap;
use serde_json::{Value, json};
use std::rc::Rc;
use tracing::{debug, error, info, warn};

use super::{
    Runtime,
    context::Context,
    data::RenderData,
    template::{Executor, Scope},
    value::{is_empty, is_truthy, property, to_display_string},
};
use crate::{ast::ParamType, errors::RenderError};

/// Everything a helper learns about the call site besides its params.
pub struct HelperOptions<'a> {
    /// Name the helper was called as.
    pub name: String,
    /// `this` at the call site.
    pub context: Context,
    /// String-params mode: the context each param was written against.
    pub contexts: Vec<Context>,
    /// String-params mode: the kind of token each param was written as.
    pub types: Vec<ParamType>,
    /// String-params mode: the looked-up value of each param that names a
    /// block param.
    pub values: Vec<Option<Value>>,
    pub hash: IndexMap<String, Value>,
    pub hash_types: IndexMap<String, ParamType>,
    pub hash_contexts: IndexMap<String, Context>,
    pub data: Option<Rc<RenderData>>,
    program: Option<usize>,
    inverse: Option<usize>,
    executor: &'a Executor<'a>,
    scope: &'a Scope,
}

impl<'a> HelperOptions<'a> {
    pub(crate) fn new(
        name: &str,
        executor: &'a Executor<'a>,
        scope: &'a Scope,
        program: Option<usize>,
        inverse: Option<usize>,
    ) -> Self {
        Self {
            name: name.to_string(),
            context: scope.this(),
            contexts: vec![],
            types: vec![],
            values: vec![],
            hash: IndexMap::new(),
            hash_types: IndexMap::new(),
            hash_contexts: IndexMap::new(),
            data: scope.data.clone(),
            program,
            inverse,
            executor,
            scope,
        }
    }

    pub fn runtime(&self) -> &Runtime {
        self.executor.runtime
    }

    /// The context the template was rendered against.
    pub fn root(&self) -> Context {
        self.scope.depths.last().cloned().unwrap_or_default()
    }

    /// Whether the helper was called as a block (`{{#name}}`).
    pub fn is_block(&self) -> bool {
        self.program.is_some()
    }

    /// Whether params were passed as raw tokens.
    pub fn is_string_params(&self) -> bool {
        !self.types.is_empty()
    }

    /// A new data frame on top of the call site's, if data is threaded.
    pub fn create_frame(&self) -> Option<RenderData> {
        self.data.as_ref().map(RenderData::frame)
    }

    /// Renders the block body against `context`.
    pub fn render(&self, context: &Context) -> Result<String, RenderError> {
        self.render_with(context, None, vec![])
    }

    pub fn render_with(
        &self,
        context: &Context,
        data: Option<RenderData>,
        block_params: Vec<Value>,
    ) -> Result<String, RenderError> {
        self.invoke(self.program, context, data, block_params)
    }

    /// Renders the `{{else}}` body against `context`.
    pub fn render_inverse(&self, context: &Context) -> Result<String, RenderError> {
        self.render_inverse_with(context, None, vec![])
    }

    pub fn render_inverse_with(
        &self,
        context: &Context,
        data: Option<RenderData>,
        block_params: Vec<Value>,
    ) -> Result<String, RenderError> {
        self.invoke(self.inverse, context, data, block_params)
    }

    fn invoke(
        &self,
        program: Option<usize>,
        context: &Context,
        data: Option<RenderData>,
        block_params: Vec<Value>,
    ) -> Result<String, RenderError> {
        match program {
            Some(index) => self.executor.invoke(
                index,
                context.clone(),
                data.map(Rc::new),
                block_params,
                self.scope,
            ),
            None => Ok(String::new()),
        }
    }
}

pub(crate) fn register_base_helpers(runtime: &mut Runtime) {
    runtime.register_helper("helperMissing", helper_missing);
    runtime.register_helper("blockHelperMissing", block_helper_missing);
    runtime.register_helper("each", each);
    runtime.register_helper("if", if_helper);
    runtime.register_helper("unless", unless);
    runtime.register_helper("with", with);
    runtime.register_helper("log", log);
    runtime.register_helper("lookup", lookup);
}

fn helper_missing(params: &[Value], options: &HelperOptions<'_>) -> Result<Value, RenderError> {
    if params.is_empty() {
        Ok(Value::Null)
    } else {
        Err(RenderError::MissingHelper(options.name.clone()))
    }
}

fn block_helper_missing(
    params: &[Value],
    options: &HelperOptions<'_>,
) -> Result<Value, RenderError> {
    let value = params.first().cloned().unwrap_or(Value::Null);
    if matches!(&value, Value::Array(items) if !items.is_empty()) {
        return each(&[value], options);
    }
    let out = match value {
        Value::Bool(true) => options.render(&options.context)?,
        Value::Bool(false) | Value::Null | Value::Array(_) => {
            options.render_inverse(&options.context)?
        }
        other => options.render(&Context::new(other))?,
    };
    Ok(Value::String(out))
}

fn each(params: &[Value], options: &HelperOptions<'_>) -> Result<Value, RenderError> {
    if !options.is_block() {
        return Err(RenderError::helper("each", "Must pass iterator to #each"));
    }
    let collection = params.first().cloned().unwrap_or(Value::Null);
    let entries: Vec<(Value, Value)> = match collection {
        Value::Array(items) => items
            .into_iter()
            .enumerate()
            .map(|(i, item)| (json!(i), item))
            .collect(),
        Value::Object(map) => map
            .into_iter()
            .map(|(key, item)| (Value::String(key), item))
            .collect(),
        _ => vec![],
    };

    if entries.is_empty() {
        return Ok(Value::String(options.render_inverse(&options.context)?));
    }

    let len = entries.len();
    let mut out = String::new();
    for (i, (key, item)) in entries.into_iter().enumerate() {
        let frame = options.create_frame().map(|mut frame| {
            frame.index = Some(i);
            frame.key = Some(key.clone());
            frame.first = Some(i == 0);
            frame.last = Some(i + 1 == len);
            frame
        });
        let context = Context::new(item.clone());
        out.push_str(&options.render_with(&context, frame, vec![item, key])?);
    }
    Ok(Value::String(out))
}

fn single_param<'p>(params: &'p [Value], name: &str) -> Result<&'p Value, RenderError> {
    match params {
        [value] => Ok(value),
        _ => Err(RenderError::helper(
            name,
            format!("#{name} requires exactly one argument"),
        )),
    }
}

fn if_helper(params: &[Value], options: &HelperOptions<'_>) -> Result<Value, RenderError> {
    let conditional = single_param(params, "if")?;
    let include_zero = options.hash.get("includeZero").is_some_and(is_truthy);
    let out = if (!include_zero && !is_truthy(conditional)) || is_empty(conditional) {
        options.render_inverse(&options.context)?
    } else {
        options.render(&options.context)?
    };
    Ok(Value::String(out))
}

fn unless(params: &[Value], options: &HelperOptions<'_>) -> Result<Value, RenderError> {
    let conditional = single_param(params, "unless")?;
    let include_zero = options.hash.get("includeZero").is_some_and(is_truthy);
    let out = if (!include_zero && !is_truthy(conditional)) || is_empty(conditional) {
        options.render(&options.context)?
    } else {
        options.render_inverse(&options.context)?
    };
    Ok(Value::String(out))
}

fn with(params: &[Value], options: &HelperOptions<'_>) -> Result<Value, RenderError> {
    let value = single_param(params, "with")?;
    let out = if is_empty(value) {
        options.render_inverse(&options.context)?
    } else {
        let context = Context::new(value.clone());
        options.render_with(&context, None, vec![value.clone()])?
    };
    Ok(Value::String(out))
}

fn lookup(params: &[Value], _options: &HelperOptions<'_>) -> Result<Value, RenderError> {
    let (Some(target), Some(field)) = (params.first(), params.get(1)) else {
        return Ok(Value::Null);
    };
    if !is_truthy(target) {
        return Ok(target.clone());
    }
    Ok(property(target, &to_display_string(field)).unwrap_or(Value::Null))
}

fn log(params: &[Value], options: &HelperOptions<'_>) -> Result<Value, RenderError> {
    let level = options
        .hash
        .get("level")
        .cloned()
        .or_else(|| options.data.as_ref().and_then(|data| data.lookup("level")))
        .map(|level| to_display_string(&level))
        .unwrap_or_default();
    let message = params
        .iter()
        .map(to_display_string)
        .collect::<Vec<_>>()
        .join(" ");
    match level.as_str() {
        "debug" => debug!(target: "stache::log", "{message}"),
        "warn" => warn!(target: "stache::log", "{message}"),
        "error" => error!(target: "stache::log", "{message}"),
        _ => info!(target: "stache::log", "{message}"),
    }
    Ok(Value::Null)
}
