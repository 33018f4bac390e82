
#[cfg(test)]
mod compiler_parse {
    use crate::test_utils::{first_mustache, loc};
    use stache_compiler_core::{
        ErrorCodes, Expression, LiteralValue, ParserOptions, Statement, base_parse,
    };

    mod content {
        use super::*;

        #[test]
        fn simple_text() {
            let ast = base_parse("some text", None).unwrap();
            assert_eq!(
                ast.body.first(),
                Some(&Statement::new_content("some text", loc("some text", 0, 9)))
            );
        }

        #[test]
        fn text_around_mustache() {
            let ast = base_parse("some {{foo}} text", None).unwrap();
            assert_eq!(ast.body.len(), 3);
            assert_eq!(
                ast.body[0],
                Statement::new_content("some ", loc("some {{foo}} text", 0, 5))
            );
            assert_eq!(
                ast.body[2],
                Statement::new_content(" text", loc("some {{foo}} text", 12, 17))
            );
        }

        #[test]
        fn escaped_mustache_is_text() {
            let ast = base_parse("\\{{foo}} bar", None).unwrap();
            let Statement::Content(content) = &ast.body[0] else {
                panic!("expected content");
            };
            assert_eq!(content.value, "{{foo}} bar");
        }

        #[test]
        fn comments_can_be_dropped() {
            let ast = base_parse("a{{! hidden }}b", None).unwrap();
            assert!(matches!(&ast.body[1], Statement::Comment(c) if c.value == " hidden "));

            let ast = base_parse(
                "a{{!-- hidden --}}b",
                Some(ParserOptions {
                    comments: Some(false),
                }),
            )
            .unwrap();
            assert_eq!(ast.body.len(), 2);
        }

        #[test]
        fn whitespace_control() {
            let ast = base_parse("a  {{~foo~}}  b", None).unwrap();
            let Statement::Content(before) = &ast.body[0] else {
                panic!("expected content");
            };
            let Statement::Content(after) = &ast.body[2] else {
                panic!("expected content");
            };
            assert_eq!(before.value, "a");
            assert_eq!(before.original, "a  ");
            assert_eq!(after.value, "b");
        }
    }

    mod mustache {
        use super::*;

        #[test]
        fn simple_path() {
            let ast = base_parse("{{foo}}", None).unwrap();
            let mustache = first_mustache(&ast);
            assert!(mustache.escaped);
            assert!(mustache.params.is_empty());
            assert!(mustache.hash.is_none());
            assert_eq!(mustache.loc, loc("{{foo}}", 0, 7));
            let path = mustache.path.as_path().unwrap();
            assert_eq!(path.parts, vec!["foo"]);
            assert_eq!(path.loc, loc("{{foo}}", 2, 5));
            assert!(path.is_simple());
        }

        #[test]
        fn unescaped_forms() {
            let ast = base_parse("{{{foo}}}{{&bar}}", None).unwrap();
            assert!(matches!(&ast.body[0], Statement::Mustache(m) if !m.escaped));
            assert!(matches!(&ast.body[1], Statement::Mustache(m) if !m.escaped));
        }

        #[test]
        fn path_shapes() {
            let ast = base_parse("{{../foo.bar}}{{@index}}{{this}}{{[a b].c}}", None).unwrap();
            let paths: Vec<_> = ast
                .body
                .iter()
                .map(|s| match s {
                    Statement::Mustache(m) => m.path.as_path().unwrap().clone(),
                    _ => panic!("expected mustache"),
                })
                .collect();

            assert_eq!(paths[0].depth, 1);
            assert_eq!(paths[0].parts, vec!["foo", "bar"]);
            assert_eq!(paths[0].original, "../foo.bar");

            assert!(paths[1].data);
            assert_eq!(paths[1].parts, vec!["index"]);
            assert_eq!(paths[1].original, "@index");

            assert!(paths[2].parts.is_empty());
            assert!(paths[2].is_scoped());

            assert_eq!(paths[3].parts, vec!["a b", "c"]);
        }

        #[test]
        fn params_hash_and_subexpressions() {
            let ast = base_parse("{{h (g a) \"s\" 2 k=true}}", None).unwrap();
            let mustache = first_mustache(&ast);
            assert_eq!(mustache.params.len(), 3);

            let Expression::SubExpression(sexpr) = &mustache.params[0] else {
                panic!("expected subexpression");
            };
            assert_eq!(sexpr.path.original(), "g");
            assert_eq!(sexpr.params.len(), 1);

            assert!(matches!(
                &mustache.params[1],
                Expression::Literal(l) if l.value == LiteralValue::String("s".into())
            ));
            assert!(matches!(
                &mustache.params[2],
                Expression::Literal(l) if l.value == LiteralValue::Number(2.0)
            ));

            let hash = mustache.hash.as_ref().unwrap();
            assert_eq!(hash.pairs.len(), 1);
            assert_eq!(hash.pairs[0].key, "k");
            assert!(matches!(
                &hash.pairs[0].value,
                Expression::Literal(l) if l.value == LiteralValue::Boolean(true)
            ));
        }
    }

    mod block {
        use super::*;

        #[test]
        fn program_and_inverse() {
            let ast = base_parse("{{#if x}}b{{else}}c{{/if}}", None).unwrap();
            let Statement::Block(block) = &ast.body[0] else {
                panic!("expected block");
            };
            assert_eq!(block.path.original(), "if");
            assert_eq!(block.params.len(), 1);
            let program = block.program.as_ref().unwrap();
            let inverse = block.inverse.as_ref().unwrap();
            assert!(matches!(&program.body[0], Statement::Content(c) if c.value == "b"));
            assert!(matches!(&inverse.body[0], Statement::Content(c) if c.value == "c"));
        }

        #[test]
        fn inverted_section() {
            let ast = base_parse("{{^foo}}x{{/foo}}", None).unwrap();
            let Statement::Block(block) = &ast.body[0] else {
                panic!("expected block");
            };
            assert!(block.program.is_none());
            assert_eq!(block.inverse.as_ref().unwrap().body.len(), 1);
        }

        #[test]
        fn else_if_chain() {
            let ast = base_parse("{{#if a}}1{{else if b}}2{{else}}3{{/if}}", None).unwrap();
            let Statement::Block(block) = &ast.body[0] else {
                panic!("expected block");
            };
            let inverse = block.inverse.as_ref().unwrap();
            assert_eq!(inverse.body.len(), 1);
            let Statement::Block(chained) = &inverse.body[0] else {
                panic!("expected chained block");
            };
            assert_eq!(chained.path.original(), "if");
            assert_eq!(chained.params[0].original(), "b");
            let chained_inverse = chained.inverse.as_ref().unwrap();
            assert!(matches!(&chained_inverse.body[0], Statement::Content(c) if c.value == "3"));
        }

        #[test]
        fn block_params() {
            let ast = base_parse("{{#each xs as |x i|}}{{x}}{{/each}}", None).unwrap();
            let Statement::Block(block) = &ast.body[0] else {
                panic!("expected block");
            };
            assert_eq!(block.program.as_ref().unwrap().block_params, vec!["x", "i"]);
        }

        #[test]
        fn each_in_params() {
            let ast = base_parse("{{#each item in items}}{{/each}}", None).unwrap();
            let Statement::Block(block) = &ast.body[0] else {
                panic!("expected block");
            };
            let params: Vec<_> = block.params.iter().map(|p| p.original()).collect();
            assert_eq!(params, vec!["item", "in", "items"]);
        }
    }

    mod errors {
        use super::*;

        fn error_code(source: &str) -> ErrorCodes {
            base_parse(source, None).unwrap_err().code
        }

        #[test]
        fn unterminated_mustache() {
            let err = base_parse("a {{foo", None).unwrap_err();
            assert_eq!(err.code, ErrorCodes::UnterminatedMustache);
            assert_eq!(err.loc.unwrap().start.offset, 2);
        }

        #[test]
        fn mismatched_close() {
            let err = base_parse("{{#if a}}x{{/each}}", None).unwrap_err();
            assert_eq!(err.code, ErrorCodes::MismatchedCloseBlock);
            assert_eq!(err.message, "if doesn't match each");
        }

        #[test]
        fn structural_errors() {
            assert_eq!(error_code("{{#if a}}x"), ErrorCodes::MissingCloseBlock);
            assert_eq!(error_code("{{/if}}"), ErrorCodes::UnexpectedCloseBlock);
            assert_eq!(error_code("{{else}}"), ErrorCodes::UnexpectedElse);
            assert_eq!(error_code("{{foo/../bar}}"), ErrorCodes::InvalidPath);
            assert_eq!(error_code("{{this/../a}}"), ErrorCodes::InvalidPath);
            assert_eq!(error_code("{{./../a}}"), ErrorCodes::InvalidPath);
            assert_eq!(
                error_code("{{#a}}{{else if}}{{/a}}"),
                ErrorCodes::EmptyElseChain
            );
            assert_eq!(error_code("{{!-- open"), ErrorCodes::UnterminatedComment);
            assert_eq!(error_code("{{foo \"bar}}"), ErrorCodes::UnterminatedString);
        }

        #[test]
        fn display_has_position() {
            let err = base_parse("\n{{/if}}", None).unwrap_err();
            assert_eq!(
                err.to_string(),
                "Parse error on line 2, column 1: Close block without a matching open block"
            );
        }
    }
}
