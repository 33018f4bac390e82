
#[cfg(test)]
mod compiler_integration_tests {
    use crate::test_utils::{render, render_with_runtime};
    use insta::assert_snapshot;
    use serde_json::{Value, json};
    use stache_compiler_core::{
        BaseCompileSource, CodegenOptions, CompileOptions, Context, HelperOptions, PropertyReader,
        RenderData, RenderError, RenderOptions, Runtime, SetupError, TemplateError,
        TemplateSpec, base_compile, base_precompile, compile_template, to_display_string,
    };
    use stache_compiler_core::{Expression, Statement, base_parse};
    use stache_compiler_shared::PathFlags;
    use std::rc::Rc;

    const SOURCE: &str = r#"<ul class="{{kind}}">
{{#each people as |person i|}}  <li>{{i}}: {{person.name}}{{#if person.admin}} (admin){{/if}}</li>
{{else}}  <li>nobody</li>
{{/each}}</ul>"#;

    #[test]
    fn renders_a_list() {
        let out = render(
            SOURCE,
            json!({
                "kind": "people",
                "people": [
                    {"name": "Ann", "admin": true},
                    {"name": "Bob"}
                ]
            }),
        );
        assert_snapshot!(out, @r#"
        <ul class="people">
          <li>0: Ann (admin)</li>
          <li>1: Bob</li>
        </ul>
        "#);
    }

    #[test]
    fn renders_the_inverse_for_empty_lists() {
        let out = render(SOURCE, json!({"kind": "x", "people": []}));
        assert_snapshot!(out, @r#"
        <ul class="x">
          <li>nobody</li>
        </ul>
        "#);
    }

    #[test]
    fn escapes_unless_triple_stashed() {
        let context = json!({"html": "<b>&</b>"});
        assert_eq!(render("{{html}}", context.clone()), "&lt;b&gt;&amp;&lt;/b&gt;");
        assert_eq!(render("{{{html}}}", context.clone()), "<b>&</b>");
        assert_eq!(render("{{&html}}", context), "<b>&</b>");
    }

    #[test]
    fn no_escape_option() {
        let out = render_with_runtime(
            Runtime::default(),
            "{{html}}",
            CompileOptions {
                no_escape: Some(true),
                ..Default::default()
            },
            json!({"html": "<i>"}),
        );
        assert_eq!(out, "<i>");
    }

    #[test]
    fn missing_fields_render_nothing() {
        assert_eq!(render("[{{a.b.c}}]", json!({})), "[]");
        assert_eq!(render("[{{a.b}}]", json!({"a": null})), "[]");
    }

    #[test]
    fn display_conversion() {
        let out = render(
            "{{n}} {{f}} {{b}} {{list}} {{obj}}",
            json!({"n": 3, "f": 1.5, "b": false, "list": [1, 2], "obj": {}}),
        );
        assert_eq!(out, "3 1.5 false 1,2 [object Object]");
    }

    #[test]
    fn parent_scopes_and_this() {
        let out = render(
            "{{#with inner}}{{name}}/{{../name}}/{{this.name}}{{/with}}",
            json!({"name": "outer", "inner": {"name": "inner"}}),
        );
        assert_eq!(out, "inner/outer/inner");
    }

    #[test]
    fn if_else_chains() {
        let source = "{{#if a}}A{{else if b}}B{{else}}C{{/if}}";
        assert_eq!(render(source, json!({"a": 1})), "A");
        assert_eq!(render(source, json!({"b": true})), "B");
        assert_eq!(render(source, json!({})), "C");
    }

    #[test]
    fn if_treats_zero_and_empty_lists_as_false() {
        let source = "{{#if v}}y{{else}}n{{/if}}";
        assert_eq!(render(source, json!({"v": 0})), "n");
        assert_eq!(render(source, json!({"v": []})), "n");
        assert_eq!(render(source, json!({"v": ""})), "n");
        assert_eq!(render(source, json!({"v": {}})), "y");
        assert_eq!(
            render("{{#if v includeZero=true}}y{{else}}n{{/if}}", json!({"v": 0})),
            "y"
        );
    }

    #[test]
    fn unless_helper() {
        assert_eq!(render("{{#unless v}}none{{/unless}}", json!({"v": false})), "none");
        assert_eq!(render("{{#unless v}}none{{/unless}}", json!({"v": 1})), "");
    }

    #[test]
    fn each_exposes_data_variables() {
        let out = render(
            "{{#each xs}}{{@index}}{{#if @first}}F{{/if}}{{#if @last}}L{{/if}}={{this}};{{/each}}",
            json!({"xs": ["a", "b", "c"]}),
        );
        assert_eq!(out, "0F=a;1=b;2L=c;");
    }

    #[test]
    fn each_over_objects() {
        let out = render(
            "{{#each map}}{{@key}}:{{this}} {{/each}}",
            json!({"map": {"x": 1, "y": 2}}),
        );
        assert_eq!(out, "x:1 y:2 ");
    }

    #[test]
    fn nested_data_frames() {
        let out = render(
            "{{#each rows}}{{#each this}}{{@../index}}.{{@index}} {{/each}}{{/each}}",
            json!({"rows": [[1, 2], [3]]}),
        );
        assert_eq!(out, "0.0 0.1 1.0 ");
    }

    #[test]
    fn root_data() {
        let out = render("{{#each xs}}{{@root.title}}{{/each}}", json!({"title": "t", "xs": [1, 2]}));
        assert_eq!(out, "tt");
    }

    #[test]
    fn block_sections_over_plain_values() {
        assert_eq!(render("{{#person}}{{name}}{{/person}}", json!({"person": {"name": "Ann"}})), "Ann");
        assert_eq!(render("{{#flag}}on{{/flag}}", json!({"flag": true})), "on");
        assert_eq!(render("{{#flag}}on{{else}}off{{/flag}}", json!({"flag": false})), "off");
        assert_eq!(render("{{#xs}}{{this}}{{/xs}}", json!({"xs": [1, 2, 3]})), "123");
        assert_eq!(render("{{^xs}}empty{{/xs}}", json!({"xs": []})), "empty");
    }

    #[test]
    fn lookup_and_subexpressions() {
        let mut runtime = Runtime::default();
        runtime.register_helper("upper", |params: &[Value], _: &HelperOptions<'_>| {
            Ok(Value::String(
                params
                    .first()
                    .map(to_display_string)
                    .unwrap_or_default()
                    .to_uppercase(),
            ))
        });
        let out = render_with_runtime(
            runtime,
            "{{upper (lookup names key)}}",
            CompileOptions::default(),
            json!({"names": {"a": "ann"}, "key": "a"}),
        );
        assert_eq!(out, "ANN");
    }

    #[test]
    fn helpers_receive_hash_and_block() {
        let mut runtime = Runtime::default();
        runtime.register_helper("wrap", |_: &[Value], options: &HelperOptions<'_>| {
            let tag = options
                .hash
                .get("tag")
                .map(to_display_string)
                .unwrap_or_default();
            let body = options.render(&options.context)?;
            Ok(Value::String(format!("<{tag}>{body}</{tag}>")))
        });
        let out = render_with_runtime(
            runtime,
            "{{#wrap tag=\"p\"}}{{text}}{{/wrap}}",
            CompileOptions::default(),
            json!({"text": "hi"}),
        );
        assert_eq!(out, "<p>hi</p>");
    }

    #[test]
    fn missing_helper_with_params_fails() {
        let runtime = Rc::new(Runtime::default());
        let template = compile_template(
            &runtime,
            BaseCompileSource::from("{{nope a}}"),
            &CompileOptions::default(),
        )
        .unwrap();
        assert_eq!(
            template.render(json!({})),
            Err(RenderError::MissingHelper("nope".to_string()))
        );
    }

    #[test]
    fn strict_mode_reports_missing_fields() {
        let runtime = Rc::new(Runtime::default());
        let template = compile_template(
            &runtime,
            BaseCompileSource::from("{{a.b}}"),
            &CompileOptions {
                strict: Some(true),
                ..Default::default()
            },
        )
        .unwrap();
        assert!(matches!(
            template.render(json!({"a": {}})),
            Err(RenderError::MissingField { path, .. }) if path == "a.b"
        ));
    }

    #[test]
    fn string_params_pass_raw_tokens() {
        let mut runtime = Runtime::default();
        runtime.register_helper("echo", |params: &[Value], options: &HelperOptions<'_>| {
            let types: Vec<_> = options.types.iter().map(|t| t.as_str()).collect();
            let values: Vec<_> = params.iter().map(to_display_string).collect();
            Ok(Value::String(format!("{}|{}", values.join(","), types.join(","))))
        });
        let out = render_with_runtime(
            runtime,
            "{{echo ./foo.bar \"lit\" 3}}",
            CompileOptions {
                string_params: Some(true),
                ..Default::default()
            },
            json!({"foo": {"bar": "ignored"}}),
        );
        assert_eq!(out, "foo.bar,lit,3|ID,StringLiteral,NumberLiteral");
    }

    #[test]
    fn string_params_record_contexts() {
        let mut runtime = Runtime::default();
        runtime.register_helper("field", |params: &[Value], options: &HelperOptions<'_>| {
            let key = to_display_string(&params[0]);
            Ok(options.contexts[0].lookup(&key).unwrap_or(Value::Null))
        });
        let out = render_with_runtime(
            runtime,
            "{{#child}}{{field name}}/{{field ../name}}{{/child}}",
            CompileOptions {
                string_params: Some(true),
                ..Default::default()
            },
            json!({"name": "parent", "child": {"name": "child"}}),
        );
        assert_eq!(out, "child/parent");
    }

    #[test]
    fn string_params_expose_block_param_values() {
        let mut runtime = Runtime::default();
        runtime.register_helper("pair", |_: &[Value], options: &HelperOptions<'_>| {
            let out = options.render_with(&options.context, None, vec![json!("x"), json!("y")])?;
            Ok(Value::String(out))
        });
        runtime.register_helper("show", |params: &[Value], options: &HelperOptions<'_>| {
            let value = options.values[0].clone().unwrap_or(Value::Null);
            Ok(Value::String(format!(
                "{}:{} ",
                to_display_string(&params[0]),
                to_display_string(&value)
            )))
        });
        let out = render_with_runtime(
            runtime,
            "{{#pair as |a b|}}{{show a}}{{show b}}{{show c}}{{/pair}}",
            CompileOptions {
                string_params: Some(true),
                ..Default::default()
            },
            json!({"c": "field"}),
        );
        assert_eq!(out, "a:x b:y c: ");
    }

    #[test]
    fn strict_call_targets_skip_helper_missing() {
        let mut runtime = Runtime::default();
        runtime.register_helper("helperMissing", |_: &[Value], _: &HelperOptions<'_>| {
            Ok(Value::String("fallback".to_string()))
        });
        let runtime = Rc::new(runtime);

        let mut ast = base_parse("{{shout x}}", None).unwrap();
        let lenient = compile_template(
            &runtime,
            BaseCompileSource::Program(ast.clone()),
            &CompileOptions::default(),
        )
        .unwrap();
        assert_eq!(lenient.render(json!({})).unwrap(), "fallback");

        let Statement::Mustache(node) = &mut ast.body[0] else {
            panic!("expected a mustache");
        };
        let Expression::Path(path) = &mut node.path else {
            panic!("expected a path");
        };
        path.flags |= PathFlags::STRICT;
        let strict = compile_template(
            &runtime,
            BaseCompileSource::Program(ast),
            &CompileOptions::default(),
        )
        .unwrap();
        assert_eq!(
            strict.render(json!({})),
            Err(RenderError::MissingHelper("shout".to_string()))
        );
    }

    #[test]
    fn render_data_reaches_templates() {
        let runtime = Rc::new(Runtime::default());
        let template = compile_template(
            &runtime,
            BaseCompileSource::from("{{@user}} {{@root.a}}"),
            &CompileOptions::default(),
        )
        .unwrap();
        let out = template
            .render_with(
                json!({"a": 1}),
                RenderOptions {
                    data: Some(RenderData::default().with_var("user", json!("ann"))),
                },
            )
            .unwrap();
        assert_eq!(out, "ann 1");
    }

    #[test]
    fn disabled_data_drops_frames() {
        let out = render_with_runtime(
            Runtime::default(),
            "[{{@root}}]",
            CompileOptions {
                data: Some(false),
                ..Default::default()
            },
            json!({"a": 1}),
        );
        assert_eq!(out, "[]");
    }

    #[test]
    fn precompiled_source_instantiates() {
        let source = base_precompile(
            BaseCompileSource::from("Hello {{name}}!"),
            &CompileOptions::default(),
            &CodegenOptions::default(),
        )
        .unwrap();
        let spec = TemplateSpec::from_source(&source).unwrap();
        let template = Rc::new(Runtime::default()).template(spec).unwrap();
        assert_eq!(template.render(json!({"name": "you"})).unwrap(), "Hello you!");
        assert!(template.is_method);
    }

    #[test]
    fn foreign_namespaces_are_rejected() {
        let result = base_compile(
            BaseCompileSource::from("x"),
            &CompileOptions::default(),
            &CodegenOptions {
                namespace: Some("Other".to_string()),
            },
        )
        .unwrap();
        let err = Rc::new(Runtime::default()).template(result.spec).unwrap_err();
        assert!(matches!(
            err,
            SetupError::NamespaceMismatch { ref found, .. } if found == "Other"
        ));
    }

    #[test]
    fn revision_mismatch_is_rejected() {
        let mut spec = base_compile(
            BaseCompileSource::from("x"),
            &CompileOptions::default(),
            &CodegenOptions::default(),
        )
        .unwrap()
        .spec;
        spec.compiler.0 += 1;
        assert!(matches!(
            Rc::new(Runtime::default()).template(spec),
            Err(SetupError::RevisionMismatch { .. })
        ));
    }

    #[test]
    fn parse_errors_surface_from_compile_template() {
        let runtime = Rc::new(Runtime::default());
        let err = compile_template(
            &runtime,
            BaseCompileSource::from("{{#if}}"),
            &CompileOptions::default(),
        )
        .unwrap_err();
        assert!(matches!(err, TemplateError::Compile(_)));
    }

    #[derive(Debug)]
    struct Upper;

    impl PropertyReader for Upper {
        fn get(&self, context: &Context, path: &str) -> Value {
            match context.lookup(path) {
                Some(Value::String(s)) => Value::String(s.to_uppercase()),
                other => other.unwrap_or(Value::Null),
            }
        }
    }

    #[test]
    fn property_reader_is_swappable() {
        let mut runtime = Runtime::default();
        runtime.set_property_reader(Upper);
        runtime.register_helper("read", |params: &[Value], options: &HelperOptions<'_>| {
            let path = to_display_string(&params[0]);
            Ok(options
                .runtime()
                .property_reader()
                .get(&options.context, &path))
        });
        let out = render_with_runtime(
            runtime,
            "{{read \"name\"}}",
            CompileOptions::default(),
            json!({"name": "ann"}),
        );
        assert_eq!(out, "ANN");
    }
}
