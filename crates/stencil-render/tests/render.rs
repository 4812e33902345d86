//! End-to-end rendering through the public engine API.

use pretty_assertions::assert_eq;
use stencil_render::{Context, Engine, MapLoader, Value};

fn engine(entries: &[(&str, &str)]) -> Engine {
    Engine::new(entries.iter().copied().collect::<MapLoader>())
}

fn render(source: &str, ctx: &mut Context) -> String {
    engine(&[]).render_str(source, ctx).unwrap()
}

#[test]
fn test_mixed_template() {
    let source = "\
Hello {{ user.name }}!
{% if user.admin %}You are an admin.{% endif %}
{% for i, item in items %}{{ i + 1 }}. {{ item }}
{% endfor %}";
    let mut ctx = Context::from_json(serde_json::json!({
        "user": {"name": "Ada", "admin": true},
        "items": ["alpha", "beta"],
    }));
    assert_eq!(
        render(source, &mut ctx),
        "Hello Ada!\nYou are an admin.\n1. alpha\n2. beta\n"
    );
}

#[test]
fn test_escaped_tags_stay_literal() {
    assert_eq!(
        render("@{{ name }} and @{% if %}", &mut Context::new()),
        "{{ name }} and {% if %}"
    );
}

#[test]
fn test_comments_removed() {
    assert_eq!(render("a{# hidden #}b", &mut Context::new()), "ab");
}

#[test]
fn test_set_then_arithmetic() {
    assert_eq!(
        render("{% set price = 10 %}{{ price * 3 + 1 }}", &mut Context::new()),
        "31"
    );
}

#[test]
fn test_three_level_composition() {
    // A child overrides one of two parent blocks and an include pulls in
    // a shared partial with its own parameters.
    let engine = engine(&[
        ("partial", "({{ label }})"),
        (
            "layout",
            "<{% block title %}untitled{% endblock %}|{% block body %}empty{% endblock %}>",
        ),
        (
            "page",
            "{% extend \"layout\" %}\
             {% block body %}text {% include \"partial\" with param(\"label\", \"x\") %}{% endblock %}",
        ),
    ]);
    assert_eq!(
        engine.render_file("page", &mut Context::new()).unwrap(),
        "<untitled|text (x)>"
    );
}

#[test]
fn test_override_wraps_parent_content() {
    let engine = engine(&[
        ("base", "{% block menu %}home{% endblock %}"),
        (
            "page",
            "{% extend \"base\" %}{% block menu %}{{ remains }} | about{% endblock %}",
        ),
    ]);
    assert_eq!(
        engine.render_file("page", &mut Context::new()).unwrap(),
        "home | about"
    );
}

#[test]
fn test_loop_over_nested_data() {
    let mut ctx = Context::from_json(serde_json::json!({
        "rows": [{"id": 1, "tag": "a"}, {"id": 2, "tag": "b"}],
    }));
    assert_eq!(
        render(
            "{% for row in rows %}{{ row.id }}{{ row.tag }};{% endfor %}",
            &mut ctx
        ),
        "1a;2b;"
    );
}

#[test]
fn test_runtime_error_aborts_render() {
    let mut ctx = Context::new();
    ctx.set("n", Value::Int(0));
    assert!(engine(&[])
        .render_str("before {{ 1 / n }} after", &mut ctx)
        .is_err());
}

#[test]
fn test_compile_error_surfaces_line() {
    let err = engine(&[])
        .render_str("line one\n{% if x %}unclosed", &mut Context::new())
        .unwrap_err();
    assert!(err.to_string().contains("line 2"), "got: {err}");
}

#[test]
fn test_same_source_same_output() {
    let engine = engine(&[]);
    let source = "{% for c in word %}{{ c }}-{% endfor %}";
    let mut ctx = Context::new();
    ctx.set("word", "ab");
    let first = engine.render_str(source, &mut ctx.clone()).unwrap();
    let second = engine.render_str(source, &mut ctx).unwrap();
    assert_eq!(first, second);
    assert_eq!(first, "a-b-");
}
