mod util;

use tablescript::{Interrupt, Runtime, ScopeRef, Value};
use util::{scope, StubParser};

fn checks_args(
    _rt: &mut Runtime,
    _parser: &mut StubParser,
    scope: &ScopeRef,
) -> Result<String, Interrupt> {
    let scope = scope.borrow();
    assert_eq!(scope.get("macro.args"), Some(Value::text("[3,\"x\"]")));
    assert_eq!(scope.get("macro.args.num"), Some(Value::number(2)));
    assert_eq!(scope.get("macro.args.0"), Some(Value::number(3)));
    assert_eq!(scope.get("macro.args.1"), Some(Value::text("x")));
    // Lookup is case-insensitive for the reserved names too.
    assert_eq!(scope.get("MACRO.ARGS.NUM"), Some(Value::number(2)));
    Ok("ok".to_string())
}

#[test]
fn arguments_are_seeded_into_the_callee_scope() {
    let mut rt = Runtime::new();
    rt.define_function("inspect", "lib:inspect", false, true);
    let mut parser = StubParser::new().with_body("lib:inspect", checks_args);
    let caller = scope();

    rt.invoke(
        &mut parser,
        &caller,
        "inspect",
        vec![Value::number(3), Value::text("x")],
    )
    .unwrap();
}

fn checks_no_args(
    _rt: &mut Runtime,
    _parser: &mut StubParser,
    scope: &ScopeRef,
) -> Result<String, Interrupt> {
    let scope = scope.borrow();
    // No arguments leaves macro.args empty rather than "[]".
    assert_eq!(scope.get("macro.args"), Some(Value::text("")));
    assert_eq!(scope.get("macro.args.num"), Some(Value::number(0)));
    assert!(scope.get("macro.args.0").is_none());
    Ok("ok".to_string())
}

#[test]
fn zero_arguments_seed_an_empty_args_variable() {
    let mut rt = Runtime::new();
    rt.define_function("inspect", "lib:inspect", false, true);
    let mut parser = StubParser::new().with_body("lib:inspect", checks_no_args);
    let caller = scope();
    rt.invoke(&mut parser, &caller, "inspect", vec![]).unwrap();
}

#[test]
fn output_converts_to_number_json_or_literal_text() {
    let mut rt = Runtime::new();
    rt.define_function("num", "lib:num", false, true);
    rt.define_function("arr", "lib:arr", false, true);
    rt.define_function("words", "lib:words", false, true);
    let mut parser = StubParser::new()
        .with_output("lib:num", "  42  ")
        .with_output("lib:arr", r#"[1, 2]"#)
        .with_output("lib:words", "roll the dice");
    let caller = scope();

    assert_eq!(
        rt.invoke(&mut parser, &caller, "num", vec![]).unwrap(),
        Value::number(42)
    );
    assert_eq!(
        rt.invoke(&mut parser, &caller, "arr", vec![]).unwrap(),
        Value::Array(vec![serde_json::json!(1), serde_json::json!(2)])
    );
    assert_eq!(
        rt.invoke(&mut parser, &caller, "words", vec![]).unwrap(),
        Value::text("roll the dice")
    );
}

fn comments_only_output(
    _rt: &mut Runtime,
    _parser: &mut StubParser,
    scope: &ScopeRef,
) -> Result<String, Interrupt> {
    scope
        .borrow_mut()
        .set("macro.return", Value::number(7))
        .map_err(Interrupt::from)?;
    Ok("<!-- bookkeeping only -->".to_string())
}

#[test]
fn comment_only_output_falls_back_to_macro_return() {
    let mut rt = Runtime::new();
    rt.define_function("tally", "lib:tally", false, true);
    let mut parser = StubParser::new().with_body("lib:tally", comments_only_output);
    let caller = scope();

    let result = rt.invoke(&mut parser, &caller, "tally", vec![]).unwrap();
    assert_eq!(result, Value::number(7));
    assert_eq!(caller.borrow().get("macro.return"), Some(Value::number(7)));
}

#[test]
fn literal_text_keeps_its_comments() {
    let mut rt = Runtime::new();
    rt.define_function("narrate", "lib:narrate", false, true);
    let mut parser =
        StubParser::new().with_output("lib:narrate", "a hit! <!-- crit table --> a palpable hit!");
    let caller = scope();

    let result = rt.invoke(&mut parser, &caller, "narrate", vec![]).unwrap();
    assert_eq!(
        result,
        Value::text("a hit! <!-- crit table --> a palpable hit!")
    );
}

fn noisy_but_returns(
    _rt: &mut Runtime,
    _parser: &mut StubParser,
    scope: &ScopeRef,
) -> Result<String, Interrupt> {
    scope
        .borrow_mut()
        .set("macro.return", Value::number(5))
        .map_err(Interrupt::from)?;
    Ok("You rolled a natural 20! Critical hit!".to_string())
}

#[test]
fn ignore_output_returns_macro_return_instead_of_chat_text() {
    let mut rt = Runtime::new();
    rt.define_function("attack", "lib:attack", true, true);
    let mut parser = StubParser::new().with_body("lib:attack", noisy_but_returns);
    let caller = scope();

    let result = rt.invoke(&mut parser, &caller, "attack", vec![]).unwrap();
    assert_eq!(result, Value::number(5));
}

fn reads_and_writes_hp(
    _rt: &mut Runtime,
    _parser: &mut StubParser,
    scope: &ScopeRef,
) -> Result<String, Interrupt> {
    let hp = scope.borrow().get("hp");
    assert_eq!(hp, Some(Value::number(10)));
    scope
        .borrow_mut()
        .set("hp", Value::number(2))
        .map_err(Interrupt::from)?;
    Ok("ok".to_string())
}

fn expects_fresh_scope(
    _rt: &mut Runtime,
    _parser: &mut StubParser,
    scope: &ScopeRef,
) -> Result<String, Interrupt> {
    assert!(scope.borrow().get("hp").is_none());
    // Script constants are seeded even in a fresh scope.
    assert_eq!(scope.borrow().get("true"), Some(Value::truth(true)));
    assert_eq!(scope.borrow().get("false"), Some(Value::truth(false)));
    Ok("ok".to_string())
}

#[test]
fn fresh_and_shared_scopes_differ_in_visibility() {
    let mut rt = Runtime::new();
    rt.define_function("sneak", "lib:sneak", false, true);
    rt.define_function("bash", "lib:bash", false, false);
    let mut parser = StubParser::new()
        .with_body("lib:sneak", expects_fresh_scope)
        .with_body("lib:bash", reads_and_writes_hp);
    let caller = scope();
    caller.borrow_mut().set("hp", Value::number(10)).unwrap();

    rt.invoke(&mut parser, &caller, "sneak", vec![]).unwrap();

    rt.invoke(&mut parser, &caller, "bash", vec![]).unwrap();
    // A shared scope lets the callee's writes land in the caller.
    assert_eq!(caller.borrow().get("hp"), Some(Value::number(2)));
}
