use crate::ast::{
    BlockStatement, BlockStatementNode, CommentStatementNode, ContentStatementNode, Expression,
    HashNode, MustacheStatement, MustacheStatementNode, PathExpressionNode, ProgramNode, Statement,
    SubExpression, SubExpressionNode,
};
use std::fmt::Debug;

/// A rewrite rule applied while walking a template tree.
///
/// Every callback receives the node mutably and may edit it in place, or
/// return a replacement. A replacement takes the node's slot and is handed to
/// the remaining visitors before its children are walked.
pub trait NodeVisitor: Debug {
    fn mustache(&mut self, node: &mut MustacheStatementNode) -> Option<Statement> {
        let _ = node;
        None
    }

    fn block(&mut self, node: &mut BlockStatementNode) -> Option<Statement> {
        let _ = node;
        None
    }

    fn content(&mut self, node: &mut ContentStatementNode) -> Option<Statement> {
        let _ = node;
        None
    }

    fn comment(&mut self, node: &mut CommentStatementNode) -> Option<Statement> {
        let _ = node;
        None
    }

    fn sub_expression(&mut self, node: &mut SubExpressionNode) -> Option<Expression> {
        let _ = node;
        None
    }

    fn path(&mut self, node: &mut PathExpressionNode) -> Option<Expression> {
        let _ = node;
        None
    }

    /// Called once a program's statements have all been visited.
    fn exit_program(&mut self, program: &mut ProgramNode) {
        let _ = program;
    }
}

/// Walks `program` depth-first, applying `visitors` in order to every node.
pub fn traverse(program: &mut ProgramNode, visitors: &mut [Box<dyn NodeVisitor>]) {
    for statement in program.body.iter_mut() {
        traverse_statement(statement, visitors);
    }
    for visitor in visitors.iter_mut() {
        visitor.exit_program(program);
    }
}

fn traverse_statement(statement: &mut Statement, visitors: &mut [Box<dyn NodeVisitor>]) {
    for visitor in visitors.iter_mut() {
        let replacement = match statement {
            Statement::Mustache(node) => visitor.mustache(node),
            Statement::Block(node) => visitor.block(node),
            Statement::Content(node) => visitor.content(node),
            Statement::Comment(node) => visitor.comment(node),
        };
        if let Some(replacement) = replacement {
            // node was replaced
            *statement = replacement;
        }
    }

    match statement {
        Statement::Mustache(node) => {
            let MustacheStatement {
                path, params, hash, ..
            } = &mut node.inner;
            traverse_expression(path, visitors);
            traverse_params(params, hash.as_mut(), visitors);
        }
        Statement::Block(node) => {
            let BlockStatement {
                path,
                params,
                hash,
                program,
                inverse,
                ..
            } = &mut node.inner;
            traverse_expression(path, visitors);
            traverse_params(params, hash.as_mut(), visitors);
            if let Some(program) = program.as_mut() {
                traverse(program, visitors);
            }
            if let Some(inverse) = inverse.as_mut() {
                traverse(inverse, visitors);
            }
        }
        Statement::Content(_) | Statement::Comment(_) => {}
    }
}

fn traverse_params(
    params: &mut [Expression],
    hash: Option<&mut HashNode>,
    visitors: &mut [Box<dyn NodeVisitor>],
) {
    for param in params.iter_mut() {
        traverse_expression(param, visitors);
    }
    if let Some(hash) = hash {
        for pair in hash.pairs.iter_mut() {
            traverse_expression(&mut pair.value, visitors);
        }
    }
}

fn traverse_expression(expression: &mut Expression, visitors: &mut [Box<dyn NodeVisitor>]) {
    for visitor in visitors.iter_mut() {
        let replacement = match expression {
            Expression::Path(node) => visitor.path(node),
            Expression::SubExpression(node) => visitor.sub_expression(node),
            Expression::Literal(_) => None,
        };
        if let Some(replacement) = replacement {
            *expression = replacement;
        }
    }

    if let Expression::SubExpression(node) = expression {
        let SubExpression { path, params, hash } = &mut node.inner;
        traverse_expression(path, visitors);
        traverse_params(params, hash.as_mut(), visitors);
    }
}
