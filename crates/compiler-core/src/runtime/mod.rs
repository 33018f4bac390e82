mod context;
mod data;
mod helpers;
mod template;
mod value;

use indexmap::IndexMap;
use serde_json::Value;
use stache_compiler_shared::COMPILER_REVISION;
use std::{fmt, rc::Rc};
use tracing::{debug, warn};

pub use context::{Context, ScopeBuilder};
pub use data::{BindingView, PathReader, PropertyReader, RenderData, Stream};
pub use helpers::HelperOptions;
pub use template::{RenderOptions, Template};
pub use value::{is_empty, is_truthy, property, property_path, to_display_string};

use crate::{codegen::TemplateSpec, errors::RenderError, errors::SetupError};

/// A registered helper: receives its params (looked-up values, or raw
/// tokens in string-params mode) and the call-site options.
pub type Helper = Rc<dyn Fn(&[Value], &HelperOptions<'_>) -> Result<Value, RenderError>>;

/// Helper registry and template instantiation.
///
/// The registry is filled during setup through `&mut Runtime`. Templates
/// share the runtime read-only through an `Rc`.
pub struct Runtime {
    namespace: String,
    helpers: IndexMap<String, Helper>,
    reader: Rc<dyn PropertyReader>,
}

impl Runtime {
    /// A runtime with the base helpers registered and plain path reads.
    pub fn new(namespace: impl Into<String>) -> Self {
        let mut runtime = Self {
            namespace: namespace.into(),
            helpers: IndexMap::new(),
            reader: Rc::new(PathReader),
        };
        helpers::register_base_helpers(&mut runtime);
        runtime
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn register_helper<F>(&mut self, name: impl Into<String>, helper: F)
    where
        F: Fn(&[Value], &HelperOptions<'_>) -> Result<Value, RenderError> + 'static,
    {
        self.insert_helper(name, Rc::new(helper));
    }

    /// Registers `helper` under `name`, returning whatever it replaced.
    pub fn insert_helper(&mut self, name: impl Into<String>, helper: Helper) -> Option<Helper> {
        let name = name.into();
        debug!(namespace = %self.namespace, helper = %name, "registering helper");
        self.helpers.insert(name, helper)
    }

    pub fn helper(&self, name: &str) -> Option<Helper> {
        self.helpers.get(name).cloned()
    }

    pub fn has_helper(&self, name: &str) -> bool {
        self.helpers.contains_key(name)
    }

    pub fn helper_names(&self) -> impl Iterator<Item = &str> {
        self.helpers.keys().map(String::as_str)
    }

    pub fn set_property_reader(&mut self, reader: impl PropertyReader + 'static) {
        self.reader = Rc::new(reader);
    }

    pub fn property_reader(&self) -> &dyn PropertyReader {
        self.reader.as_ref()
    }

    /// Turns a compiled spec into a renderable template. The spec must have
    /// been generated for this runtime's namespace and compiler revision.
    pub fn template(self: &Rc<Self>, spec: TemplateSpec) -> Result<Template, SetupError> {
        if spec.namespace != self.namespace {
            warn!(
                expected = %self.namespace,
                found = %spec.namespace,
                "rejecting template from another namespace"
            );
            return Err(SetupError::NamespaceMismatch {
                expected: self.namespace.clone(),
                found: spec.namespace,
            });
        }
        if spec.compiler.0 != COMPILER_REVISION {
            return Err(SetupError::RevisionMismatch {
                expected: COMPILER_REVISION,
                found: spec.compiler.0,
            });
        }
        Ok(Template::new(self.clone(), spec))
    }
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new(crate::options::DEFAULT_NAMESPACE)
    }
}

impl fmt::Debug for Runtime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("namespace", &self.namespace)
            .field("helpers", &self.helpers.keys().collect::<Vec<_>>())
            .field("reader", &self.reader)
            .finish()
    }
}
