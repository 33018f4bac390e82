use indexmap::IndexMap;
use serde_json::Value;
use std::{fmt::Debug, rc::Rc};

use super::{
    context::Context,
    value::{property, property_path},
};

/// A readable binding source.
pub trait Stream: Debug {
    fn value(&self) -> Value;
}

/// The binding store of the view a template renders for. Present in the
/// render data only for binding-aware renders.
pub trait BindingView: Debug {
    fn get_stream(&self, path: &str) -> Rc<dyn Stream>;
}

/// The property observation service: reads `path` off a context.
pub trait PropertyReader: Debug {
    /// Reads a dotted `path`. Misses yield `Value::Null`.
    fn get(&self, context: &Context, path: &str) -> Value;

    /// Whether a value read directly off a context is a computed property
    /// descriptor that only [`PropertyReader::get`] can evaluate.
    fn is_descriptor(&self, value: &Value) -> bool {
        let _ = value;
        false
    }
}

/// Plain dotted-path reads over JSON. `this`, `.` and the empty path name
/// the context itself.
#[derive(Debug, Default, Clone, Copy)]
pub struct PathReader;

impl PropertyReader for PathReader {
    fn get(&self, context: &Context, path: &str) -> Value {
        let path = path
            .strip_prefix("this.")
            .or_else(|| matches!(path, "this" | ".").then_some(""))
            .unwrap_or(path);
        if path.is_empty() {
            return context.value();
        }
        let mut parts = path.split(['.', '/']);
        let first = parts.next().and_then(|head| context.lookup(head));
        let rest: Vec<&str> = parts.collect();
        first
            .and_then(|value| property_path(value, &rest))
            .unwrap_or(Value::Null)
    }
}

/// The `@`-addressable render data frame.
///
/// Block helpers push a new frame with [`RenderData::frame`]; the previous
/// frame stays reachable as the parent (`@../index`).
#[derive(Debug, Clone, Default)]
pub struct RenderData {
    pub root: Value,
    pub index: Option<usize>,
    pub key: Option<Value>,
    pub first: Option<bool>,
    pub last: Option<bool>,
    pub view: Option<Rc<dyn BindingView>>,
    /// Caller supplied `@` variables.
    pub vars: IndexMap<String, Value>,
    parent: Option<Rc<RenderData>>,
}

impl RenderData {
    pub fn new(root: Value) -> Self {
        Self {
            root,
            ..Default::default()
        }
    }

    pub fn with_view(mut self, view: Rc<dyn BindingView>) -> Self {
        self.view = Some(view);
        self
    }

    pub fn with_var(mut self, name: impl Into<String>, value: Value) -> Self {
        self.vars.insert(name.into(), value);
        self
    }

    /// A child frame inheriting every field of `parent`.
    pub fn frame(parent: &Rc<RenderData>) -> RenderData {
        RenderData {
            parent: Some(parent.clone()),
            ..parent.as_ref().clone()
        }
    }

    pub fn parent(&self) -> Option<&Rc<RenderData>> {
        self.parent.as_ref()
    }

    /// The frame `depth` parents up.
    pub fn ancestor(self: &Rc<Self>, depth: usize) -> Option<Rc<RenderData>> {
        let mut frame = self.clone();
        for _ in 0..depth {
            frame = frame.parent.clone()?;
        }
        Some(frame)
    }

    pub fn lookup(&self, name: &str) -> Option<Value> {
        match name {
            "root" => Some(self.root.clone()),
            "index" => self.index.map(Value::from),
            "key" => self.key.clone(),
            "first" => self.first.map(Value::Bool),
            "last" => self.last.map(Value::Bool),
            _ => self.vars.get(name).cloned(),
        }
    }

    pub fn lookup_path<S: AsRef<str>>(&self, parts: &[S]) -> Option<Value> {
        let (head, rest) = parts.split_first()?;
        let value = self.lookup(head.as_ref())?;
        rest.iter()
            .try_fold(value, |current, part| property(&current, part.as_ref()))
    }
}
