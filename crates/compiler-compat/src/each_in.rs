use serde_json::Value;
use stache_compiler_core::{Helper, HelperOptions, RenderError, to_display_string};

use crate::resolve::{resolve, resolve_token};

/// `{{#each item in items}}`: renders the block once per element of
/// `items`, with `item` bound in a scope over the current context.
///
/// A missing or non-array collection renders nothing. Any other call shape
/// (`{{#each items}}`) resolves its collection and is handed to `fallback`.
pub fn each_in(
    params: &[Value],
    options: &HelperOptions<'_>,
    fallback: &Helper,
) -> Result<Value, RenderError> {
    let [local, _keyword, collection] = params else {
        let mut params = params.to_vec();
        if let Some(first) = params.first_mut() {
            *first = resolve_token(first, options);
        }
        return fallback(&params, options);
    };

    let local = to_display_string(local);
    let path = to_display_string(collection);
    let context = options.contexts.get(2).unwrap_or(&options.context);
    let collection = match options.values.get(2) {
        Some(Some(value)) => value.clone(),
        _ => resolve(context, &path, options),
    };
    let items = match collection {
        Value::Array(items) => items,
        _ => return Ok(Value::String(String::new())),
    };

    let mut out = String::new();
    for item in items {
        let scope = options.context.child().bind(local.as_str(), item).build();
        out.push_str(&options.render(&scope)?);
    }
    Ok(Value::String(out))
}
