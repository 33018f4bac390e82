use indexmap::IndexMap;

/// Namespace stamped into templates produced by the default pipeline.
pub const DEFAULT_NAMESPACE: &str = "Stache";

/// Helpers every runtime registers, which the compiler may therefore invoke
/// without a runtime lookup.
pub const BUILTIN_HELPERS: [&str; 8] = [
    "helperMissing",
    "blockHelperMissing",
    "each",
    "if",
    "unless",
    "with",
    "log",
    "lookup",
];

#[derive(Debug, Default, Clone)]
pub struct ParserOptions {
    /// Whether to keep comments in the template AST.
    /// @default true
    pub comments: Option<bool>,
}

#[derive(Debug, Default, Clone)]
pub struct CompileOptions {
    /// Helpers that are guaranteed to be registered at render time. Calls to
    /// them skip the lookup and the `helperMissing` fallback. The builtin
    /// helpers are always merged in.
    pub known_helpers: IndexMap<String, bool>,
    /// Reject any helper call that is not in `known_helpers`.
    pub known_helpers_only: Option<bool>,
    /// Thread a render data frame (`@root`, `@index`, …, the binding view)
    /// through helpers.
    /// @default true
    pub data: Option<bool>,
    /// Pass helpers the raw tokens they were called with plus the context
    /// and type of each, instead of the looked-up values.
    pub string_params: Option<bool>,
    /// Raise on missing fields instead of rendering nothing.
    pub strict: Option<bool>,
    /// Never HTML-escape output.
    pub no_escape: Option<bool>,
}

impl CompileOptions {
    pub(crate) fn is_known_helper(&self, name: &str) -> bool {
        BUILTIN_HELPERS.contains(&name) || self.known_helpers.get(name).copied().unwrap_or(false)
    }
}

#[derive(Debug, Default, Clone)]
pub struct CodegenOptions {
    /// Namespace of the runtime the generated template will run against.
    /// Templates carrying a different namespace are rejected at
    /// instantiation.
    pub namespace: Option<String>,
}
