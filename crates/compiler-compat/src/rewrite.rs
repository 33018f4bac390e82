use stache_compiler_core::{
    Expression, MustacheStatementNode, NodeVisitor, PathExpressionNode, ProgramNode, Statement,
    traverse,
};
use stache_compiler_shared::PathFlags;
use tracing::trace;

use crate::resolve::GET_HELPER;

/// Turns every bare `{{x}}` into `{{get x}}`, so that plain references go
/// through property resolution like helper arguments do.
///
/// Mustaches that already have params or a hash are helper calls and are
/// left alone.
#[derive(Debug, Default)]
pub struct ResolveBareMustache;

impl NodeVisitor for ResolveBareMustache {
    fn mustache(&mut self, node: &mut MustacheStatementNode) -> Option<Statement> {
        if !node.params.is_empty() || node.hash.is_some() {
            return None;
        }

        let original = &node.path;
        let get = PathExpressionNode::new(
            false,
            original.depth(),
            vec![GET_HELPER.to_string()],
            GET_HELPER,
            PathFlags::STRICT | PathFlags::FALSY,
            original.loc().clone(),
        );
        trace!(path = %original.original(), "resolving bare mustache");
        let original = std::mem::replace(&mut node.path, Expression::Path(get));
        node.params.push(original);
        None
    }
}

/// Applies [`ResolveBareMustache`] to `ast` in place.
pub fn resolve_bare_mustaches(ast: &mut ProgramNode) {
    let mut visitors: Vec<Box<dyn NodeVisitor>> = vec![Box::new(ResolveBareMustache)];
    traverse(ast, &mut visitors);
}
