mod util;

use tablescript::{DefinitionState, Interrupt, MacroContext, Runtime, ScopeRef, ScriptError, Value};
use util::{scope, StubParser};

fn doubles_first_arg(
    _rt: &mut Runtime,
    _parser: &mut StubParser,
    scope: &ScopeRef,
) -> Result<String, Interrupt> {
    let n = scope
        .borrow()
        .get("macro.args.0")
        .and_then(|v| v.as_number())
        .unwrap_or_default();
    Ok((n + n).to_string())
}

#[test]
fn user_functions_dispatch_like_natives() {
    let mut rt = Runtime::new();
    let mut parser = StubParser::new().with_body("lib:double", doubles_first_arg);
    let caller = scope();

    rt.enter_context(Some(MacroContext::new("setup", "Lib:core", true)));
    rt.invoke(
        &mut parser,
        &caller,
        "defineFunction",
        vec![Value::text("double"), Value::text("lib:double")],
    )
    .unwrap();
    rt.exit_context();

    let result = rt
        .invoke(&mut parser, &caller, "double", vec![Value::number(5)])
        .unwrap();
    assert_eq!(result, Value::number(10));
    assert_eq!(rt.is_function_defined("DOUBLE"), DefinitionState::UserDefined);
}

#[test]
fn redefining_with_the_same_body_is_a_no_op() {
    let mut rt = Runtime::new();
    rt.define_function("double", "lib:double", false, true);
    rt.define_function("double", "lib:double", false, true);
    assert_eq!(rt.registry().redefinition_depth("double"), 0);
}

#[test]
fn old_function_without_a_shadowed_definition_is_an_error() {
    let mut rt = Runtime::new();
    rt.define_function("roll", "lib:roll", false, true);
    let mut parser = StubParser::new().with_body("lib:roll", |rt, parser, scope| {
        rt.invoke(parser, scope, "oldFunction", vec![])
            .map(|v| v.to_string())
    });
    let caller = scope();

    let err = rt.invoke(&mut parser, &caller, "roll", vec![]).unwrap_err();
    assert_eq!(
        err,
        Interrupt::Error(ScriptError::NoShadowedDefinition("roll".to_string()))
    );
}

fn bumps_shadowed_result(
    rt: &mut Runtime,
    parser: &mut StubParser,
    scope: &ScopeRef,
) -> Result<String, Interrupt> {
    let shadowed = rt.invoke(parser, scope, "oldFunction", vec![])?;
    let n = shadowed.as_number().unwrap_or_default();
    Ok((n + rust_decimal::Decimal::ONE).to_string())
}

#[test]
fn old_function_walks_the_whole_chain() {
    let mut rt = Runtime::new();
    let mut parser = StubParser::new()
        .with_output("lib:one", "1")
        .with_body("lib:two", bumps_shadowed_result)
        .with_body("lib:three", bumps_shadowed_result);
    let caller = scope();

    rt.define_function("f", "lib:one", false, true);
    rt.define_function("f", "lib:two", false, true);
    rt.define_function("f", "lib:three", false, true);
    assert_eq!(rt.registry().redefinition_depth("f"), 2);

    // lib:three calls lib:two through the chain, lib:two calls lib:one.
    let result = rt.invoke(&mut parser, &caller, "f", vec![]).unwrap();
    assert_eq!(result, Value::number(3));
    assert_eq!(
        parser.calls,
        vec!["lib:three", "lib:two", "lib:one"]
    );
}

fn asserts_via_old_function(
    rt: &mut Runtime,
    parser: &mut StubParser,
    scope: &ScopeRef,
) -> Result<String, Interrupt> {
    let passed = rt.invoke(
        parser,
        scope,
        "oldFunction",
        vec![Value::number(1), Value::text("never shown")],
    )?;
    Ok(passed.to_string())
}

#[test]
fn shadowed_natives_stay_callable_under_their_own_name() {
    let mut rt = Runtime::new();
    rt.define_function("assert", "lib:assert", false, true);
    assert_eq!(
        rt.is_function_defined("assert"),
        DefinitionState::UserDefined
    );

    let mut parser = StubParser::new().with_body("lib:assert", asserts_via_old_function);
    let caller = scope();
    let result = rt
        .invoke(
            &mut parser,
            &caller,
            "assert",
            vec![Value::number(1), Value::text("never shown")],
        )
        .unwrap();
    assert_eq!(result, Value::number(1));
}

fn forwards_limit_change(
    rt: &mut Runtime,
    parser: &mut StubParser,
    scope: &ScopeRef,
) -> Result<String, Interrupt> {
    let set = rt.invoke(parser, scope, "oldFunction", vec![Value::number(3)])?;
    Ok(set.to_string())
}

#[test]
fn old_function_enforces_the_shadowed_trust_requirement() {
    let mut rt = Runtime::new();
    rt.define_function("setMaxRecursionDepth", "lib:limit", false, true);
    let mut parser = StubParser::new().with_body("lib:limit", forwards_limit_change);
    let caller = scope();

    // The wrapper itself is callable by anyone, but the shadowed
    // native's trust demand still applies through oldFunction.
    rt.enter_context(Some(MacroContext::new("sneaky", "token", false)));
    let err = rt
        .invoke(
            &mut parser,
            &caller,
            "setMaxRecursionDepth",
            vec![Value::number(3)],
        )
        .unwrap_err();
    assert_eq!(
        err,
        Interrupt::Error(ScriptError::PermissionDenied(
            "setMaxRecursionDepth".to_string()
        ))
    );
    assert_eq!(rt.max_recursion_depth(), 150);
    rt.exit_context();

    rt.enter_context(Some(MacroContext::new("setup", "Lib:core", true)));
    let ok = rt
        .invoke(
            &mut parser,
            &caller,
            "setMaxRecursionDepth",
            vec![Value::number(3)],
        )
        .unwrap();
    assert_eq!(ok, Value::number(3));
    assert_eq!(rt.max_recursion_depth(), 3);
}

#[test]
fn old_function_enforces_the_shadowed_arity() {
    let mut rt = Runtime::new();
    rt.define_function("assert", "lib:assert", false, true);
    let mut parser = StubParser::new().with_body("lib:assert", |rt, parser, scope| {
        // The native assert being shadowed requires two arguments.
        rt.invoke(parser, scope, "oldFunction", vec![])
            .map(|v| v.to_string())
    });
    let caller = scope();
    let err = rt
        .invoke(&mut parser, &caller, "assert", vec![Value::number(1)])
        .unwrap_err();
    assert!(matches!(
        err,
        Interrupt::Error(ScriptError::NotEnoughArguments { .. })
    ));
}
