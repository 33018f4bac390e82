#[cfg(test)]
mod compiler_visitor {
    use stache_compiler_core::{
        CommentStatementNode, Expression, LiteralNode, LiteralValue, NodeVisitor,
        PathExpressionNode, ProgramNode, Statement, base_parse, traverse,
    };

    /// Records every path it sees, in visiting order.
    #[derive(Debug, Default)]
    struct CollectPaths {
        seen: Vec<String>,
        programs: usize,
    }

    impl NodeVisitor for CollectPaths {
        fn path(&mut self, node: &mut PathExpressionNode) -> Option<Expression> {
            self.seen.push(node.original.clone());
            None
        }

        fn exit_program(&mut self, _: &mut ProgramNode) {
            self.programs += 1;
        }
    }

    /// Replaces every path named `secret` with a string literal.
    #[derive(Debug)]
    struct Redact;

    impl NodeVisitor for Redact {
        fn path(&mut self, node: &mut PathExpressionNode) -> Option<Expression> {
            (node.original == "secret").then(|| {
                Expression::Literal(LiteralNode::new(
                    LiteralValue::String("***".into()),
                    "\"***\"",
                    node.loc.clone(),
                ))
            })
        }
    }

    /// Drops comments by turning them into empty content.
    #[derive(Debug)]
    struct DropComments;

    impl NodeVisitor for DropComments {
        fn comment(&mut self, node: &mut CommentStatementNode) -> Option<Statement> {
            Some(Statement::new_content("", node.loc.clone()))
        }
    }

    fn run(source: &str, visitors: &mut [Box<dyn NodeVisitor>]) -> ProgramNode {
        let mut ast = base_parse(source, None).unwrap();
        traverse(&mut ast, visitors);
        ast
    }

    #[test]
    fn visits_nested_programs_and_arguments() {
        let mut ast = base_parse(
            "{{a}}{{#if b}}{{c (d e) k=f}}{{else}}{{g}}{{/if}}",
            None,
        )
        .unwrap();
        let mut visitors: Vec<Box<dyn NodeVisitor>> = vec![Box::new(CollectPaths::default())];
        traverse(&mut ast, &mut visitors);
        let collected = format!("{:?}", visitors[0]);
        for name in ["a", "if", "b", "c", "d", "e", "f", "g"] {
            assert!(collected.contains(&format!("\"{name}\"")), "{name} not visited");
        }
        // main program plus the block's program and inverse
        assert!(collected.contains("programs: 3"));
    }

    #[test]
    fn replacements_take_the_node_slot() {
        let ast = run("{{h secret other}}", &mut [Box::new(Redact)]);
        let Statement::Mustache(mustache) = &ast.body[0] else {
            panic!("expected mustache");
        };
        assert!(matches!(
            &mustache.params[0],
            Expression::Literal(l) if l.value == LiteralValue::String("***".into())
        ));
        assert!(matches!(&mustache.params[1], Expression::Path(p) if p.original == "other"));
    }

    #[test]
    fn statements_can_be_replaced() {
        let ast = run("a{{! note }}b", &mut [Box::new(DropComments)]);
        assert!(matches!(&ast.body[1], Statement::Content(c) if c.value.is_empty()));
    }

    #[test]
    fn visitors_run_in_order() {
        let mut visitors: Vec<Box<dyn NodeVisitor>> =
            vec![Box::new(Redact), Box::new(CollectPaths::default())];
        run("{{h secret}}", &mut visitors);
        let collected = format!("{:?}", visitors[1]);
        // the second visitor never sees the redacted path
        assert!(!collected.contains("secret"));
        assert!(collected.contains("\"h\""));
    }
}
