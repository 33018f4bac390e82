use serde_json::Value;
use stache_compiler_core::{HelperOptions, Runtime, SetupError};
use std::rc::Rc;
use tracing::debug;

use crate::resolve::{resolve_params, resolve_token};

/// Helpers that expect a looked-up value as their first param and so get
/// wrapped for string-params templates.
pub const WRAPPED_HELPERS: [&str; 3] = ["if", "unless", "with"];

/// Helpers that read every param as a value.
pub const RESOLVED_PARAM_HELPERS: [&str; 2] = ["lookup", "log"];

/// Replaces helper `name` with a wrapper that resolves the raw token in its
/// first param before delegating to the original.
///
/// Wrapping the same name twice resolves twice; call this once per helper
/// while setting the runtime up.
pub fn wrap_helper(runtime: &mut Runtime, name: &str) -> Result<(), SetupError> {
    let original = runtime
        .helper(name)
        .ok_or_else(|| SetupError::UnknownHelper(name.to_string()))?;
    debug!(helper = name, "wrapping helper with token resolution");
    runtime.insert_helper(
        name,
        Rc::new(move |params: &[Value], options: &HelperOptions<'_>| {
            let mut params = params.to_vec();
            if let Some(first) = params.first_mut() {
                *first = resolve_token(first, options);
            }
            original(&params, options)
        }),
    );
    Ok(())
}

/// Like [`wrap_helper`], but resolves every param before delegating.
pub fn wrap_helper_params(runtime: &mut Runtime, name: &str) -> Result<(), SetupError> {
    let original = runtime
        .helper(name)
        .ok_or_else(|| SetupError::UnknownHelper(name.to_string()))?;
    debug!(helper = name, "wrapping helper with param resolution");
    runtime.insert_helper(
        name,
        Rc::new(move |params: &[Value], options: &HelperOptions<'_>| {
            original(&resolve_params(params, options), options)
        }),
    );
    Ok(())
}
