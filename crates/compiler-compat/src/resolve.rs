use serde_json::Value;
use stache_compiler_core::{
    BindingView, Context, HelperOptions, ParamType, RenderError, to_display_string,
};
use std::rc::Rc;
use tracing::trace;

/// Name of the helper bare mustaches are rewritten to call.
pub const GET_HELPER: &str = "get";

/// Reads `path` off `context`.
///
/// Binding-aware renders (string params with a view in the render data)
/// read fields of the render root through the view's stream for `path`.
/// Names bound by an enclosing scope, and fields of any other context, go
/// through the runtime's property reader. Misses come back as `Value::Null`.
pub fn resolve(context: &Context, path: &str, options: &HelperOptions<'_>) -> Value {
    if let Some(view) = binding_view(context, path, options) {
        trace!(path, "resolving through binding stream");
        return view.get_stream(path).value();
    }
    options.runtime().property_reader().get(context, path)
}

/// The view to read `path` through, if the render has one and `path` names
/// a field of the render root rather than a local.
fn binding_view(
    context: &Context,
    path: &str,
    options: &HelperOptions<'_>,
) -> Option<Rc<dyn BindingView>> {
    if !options.is_string_params() || is_self_reference(path) {
        return None;
    }
    let view = options.data.as_ref().and_then(|data| data.view.clone())?;
    let head = path.split('.').next().unwrap_or(path);
    if context.binds(head) || !context.base().ptr_eq(&options.root()) {
        return None;
    }
    Some(view)
}

fn is_self_reference(path: &str) -> bool {
    matches!(path, "" | "." | "this")
}

/// Resolves the raw token a helper received as its first param.
///
/// Literal tokens are already values. References to block params were
/// looked up at the call site. `@` tokens read the render data. Any other
/// token is read off the context it was written against: binding stream
/// for fields of the render root, then the context's own field, then the
/// property reader when that field is missing or is a descriptor only the
/// reader can evaluate.
pub fn resolve_token(token: &Value, options: &HelperOptions<'_>) -> Value {
    resolve_param(token, 0, options)
}

/// [`resolve_token`] applied to every param.
pub fn resolve_params(params: &[Value], options: &HelperOptions<'_>) -> Vec<Value> {
    params
        .iter()
        .enumerate()
        .map(|(index, token)| resolve_param(token, index, options))
        .collect()
}

fn resolve_param(token: &Value, index: usize, options: &HelperOptions<'_>) -> Value {
    // literals, subexpression results and already looked-up values
    if options.types.get(index) != Some(&ParamType::Id) {
        return token.clone();
    }
    if let Some(Some(value)) = options.values.get(index) {
        return value.clone();
    }
    let path = to_display_string(token);

    if let Some(name) = path.strip_prefix('@') {
        let parts: Vec<&str> = name.split('.').collect();
        return options
            .data
            .as_ref()
            .and_then(|data| data.lookup_path(&parts))
            .unwrap_or(Value::Null);
    }

    let context = options.contexts.get(index).unwrap_or(&options.context);
    if let Some(view) = binding_view(context, &path, options) {
        return view.get_stream(&path).value();
    }
    let reader = options.runtime().property_reader();
    match context.lookup(&path) {
        Some(value) if !value.is_null() && !reader.is_descriptor(&value) => value,
        _ => reader.get(context, &path),
    }
}

/// The `get` helper: `{{get foo.bar}}` renders the resolved value of
/// `foo.bar`.
pub fn get(params: &[Value], options: &HelperOptions<'_>) -> Result<Value, RenderError> {
    Ok(params
        .first()
        .map(|token| resolve_token(token, options))
        .unwrap_or(Value::Null))
}
