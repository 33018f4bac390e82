use indexmap::IndexMap;
use serde_json::{Map, Value};
use std::{fmt, rc::Rc};

use super::value::property;

/// The `this` a template or block renders against.
///
/// A context is either a plain JSON value or a scope holding its own local
/// bindings on top of a parent context. Lookups that miss the locals walk up
/// the chain, so an inner block still sees every outer field.
#[derive(Clone)]
pub struct Context(Rc<Scope>);

enum Scope {
    Value(Value),
    Child {
        locals: IndexMap<String, Value>,
        parent: Context,
    },
}

impl Context {
    pub fn new(value: Value) -> Self {
        Self(Rc::new(Scope::Value(value)))
    }

    /// A new scope on top of `self` with no bindings of its own yet.
    pub fn child(&self) -> ScopeBuilder {
        ScopeBuilder {
            locals: IndexMap::new(),
            parent: self.clone(),
        }
    }

    /// Looks `key` up in the scope chain.
    pub fn lookup(&self, key: &str) -> Option<Value> {
        match self.0.as_ref() {
            Scope::Value(value) => property(value, key),
            Scope::Child { locals, parent } => match locals.get(key) {
                Some(value) => Some(value.clone()),
                None => parent.lookup(key),
            },
        }
    }

    /// Materializes the context as a JSON value. Scope locals are laid over
    /// their parent's fields.
    pub fn value(&self) -> Value {
        match self.0.as_ref() {
            Scope::Value(value) => value.clone(),
            Scope::Child { locals, parent } => {
                let mut map = match parent.value() {
                    Value::Object(map) => map,
                    _ => Map::new(),
                };
                for (key, value) in locals {
                    map.insert(key.clone(), value.clone());
                }
                Value::Object(map)
            }
        }
    }

    /// Whether some scope in the chain binds `key` itself.
    pub fn binds(&self, key: &str) -> bool {
        match self.0.as_ref() {
            Scope::Value(_) => false,
            Scope::Child { locals, parent } => locals.contains_key(key) || parent.binds(key),
        }
    }

    /// The plain value context at the bottom of the scope chain.
    pub fn base(&self) -> Context {
        match self.0.as_ref() {
            Scope::Value(_) => self.clone(),
            Scope::Child { parent, .. } => parent.base(),
        }
    }

    pub fn is_scope(&self) -> bool {
        matches!(self.0.as_ref(), Scope::Child { .. })
    }

    /// Whether both handles point at the same context.
    pub fn ptr_eq(&self, other: &Context) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new(Value::Null)
    }
}

impl From<Value> for Context {
    fn from(value: Value) -> Self {
        Self::new(value)
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0.as_ref() {
            Scope::Value(value) => f.debug_tuple("Context").field(value).finish(),
            Scope::Child { locals, parent } => f
                .debug_struct("Scope")
                .field("locals", locals)
                .field("parent", parent)
                .finish(),
        }
    }
}

pub struct ScopeBuilder {
    locals: IndexMap<String, Value>,
    parent: Context,
}

impl ScopeBuilder {
    pub fn bind(mut self, name: impl Into<String>, value: Value) -> Self {
        self.locals.insert(name.into(), value);
        self
    }

    pub fn build(self) -> Context {
        Context(Rc::new(Scope::Child {
            locals: self.locals,
            parent: self.parent,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn scope_falls_back_to_parent() {
        let outer = Context::new(json!({"title": "t", "item": "outer"}));
        let inner = outer.child().bind("item", json!("inner")).build();
        assert_eq!(inner.lookup("item"), Some(json!("inner")));
        assert_eq!(inner.lookup("title"), Some(json!("t")));
        assert_eq!(inner.lookup("missing"), None);
        assert_eq!(outer.lookup("item"), Some(json!("outer")));
    }

    #[test]
    fn scope_value_overlays_parent() {
        let outer = Context::new(json!({"a": 1, "b": 2}));
        let inner = outer.child().bind("b", json!(3)).build();
        assert_eq!(inner.value(), json!({"a": 1, "b": 3}));
        assert!(inner.is_scope());
    }

    #[test]
    fn nested_scopes_share_their_base() {
        let outer = Context::new(json!({"a": 1}));
        let inner = outer.child().bind("x", json!(1)).build();
        let innermost = inner.child().bind("y", json!(2)).build();
        assert!(innermost.binds("x"));
        assert!(innermost.binds("y"));
        assert!(!innermost.binds("a"));
        assert!(innermost.base().ptr_eq(&outer));
        assert!(outer.base().ptr_eq(&outer));
    }

    #[test]
    fn clones_share_identity() {
        let context = Context::new(json!(1));
        assert!(context.ptr_eq(&context.clone()));
        assert!(!context.ptr_eq(&Context::new(json!(1))));
    }
}
