//==================================================
// File: builtins.rs
//==================================================
// Author: ZobieLabs
// License: Duality Public License (DPL v1.0)
// Goal: Native macro functions owned by the runtime core
// Objective: Control-flow signals (abort/assert/return), function
//            definition and introspection, and the resource-limit
//            accessors
//==================================================

use rust_decimal::prelude::ToPrimitive;

use crate::dispatch::{LineParser, Runtime};
use crate::error::{ScriptError, ScriptResult, Signal};
use crate::i18n;
use crate::registry::{FunctionEntry, FunctionRegistry, FunctionSignature, TrustRequirement};
use crate::scope::ScopeRef;
use crate::value::Value;

//==================================================
// Section 1.0 - Registration
//==================================================

/// Installs the core native function set into `registry`.
pub fn install(registry: &mut FunctionRegistry) {
    // The control-flow functions are declared non-pure so the
    // expression parser never folds a comparison away before the
    // signal gets a chance to fire.
    registry.register(FunctionEntry::native(
        FunctionSignature::new(&["abort"], 1, Some(1)).volatile(),
        builtin_abort,
    ));
    registry.register(FunctionEntry::native(
        FunctionSignature::new(&["assert"], 2, Some(3)).volatile(),
        builtin_assert,
    ));
    registry.register(FunctionEntry::native(
        FunctionSignature::new(&["return"], 1, Some(2)).volatile(),
        builtin_return,
    ));

    registry.register(FunctionEntry::native(
        FunctionSignature::new(&["defineFunction"], 2, Some(4))
            .trusted(TrustRequirement::MacroTrusted),
        builtin_define_function,
    ));
    registry.register(FunctionEntry::native(
        FunctionSignature::new(&["isFunctionDefined"], 1, Some(1)),
        builtin_is_function_defined,
    ));
    registry.register(FunctionEntry::native(
        FunctionSignature::new(&["oldFunction"], 0, None),
        builtin_old_function,
    ));
    registry.register(FunctionEntry::native(
        FunctionSignature::new(&["getDefinedFunctions"], 0, Some(2)),
        builtin_get_defined_functions,
    ));

    registry.register(FunctionEntry::native(
        FunctionSignature::new(&["getRecursionDepth"], 0, Some(0)),
        builtin_get_recursion_depth,
    ));
    registry.register(FunctionEntry::native(
        FunctionSignature::new(&["getMaxRecursionDepth"], 0, Some(0)),
        builtin_get_max_recursion_depth,
    ));
    registry.register(FunctionEntry::native(
        FunctionSignature::new(&["setMaxRecursionDepth"], 1, Some(1))
            .trusted(TrustRequirement::MacroTrusted),
        builtin_set_max_recursion_depth,
    ));
    registry.register(FunctionEntry::native(
        FunctionSignature::new(&["getMaxLoopIterations"], 0, Some(0)),
        builtin_get_max_loop_iterations,
    ));
    registry.register(FunctionEntry::native(
        FunctionSignature::new(&["setMaxLoopIterations"], 1, Some(1))
            .trusted(TrustRequirement::MacroTrusted),
        builtin_set_max_loop_iterations,
    ));

    registry.register(FunctionEntry::native(
        FunctionSignature::new(&["getMacroName"], 0, Some(0)),
        builtin_get_macro_name,
    ));
    registry.register(FunctionEntry::native(
        FunctionSignature::new(&["getMacroLocation"], 0, Some(0)),
        builtin_get_macro_location,
    ));
    registry.register(FunctionEntry::native(
        FunctionSignature::new(&["isTrusted"], 0, Some(0)),
        builtin_is_trusted,
    ));
}

//==================================================
// Section 2.0 - Argument Helpers
//==================================================

fn arg_text<'a>(name: &str, args: &'a [Value], index: usize) -> Result<&'a str, ScriptError> {
    args[index]
        .as_text()
        .ok_or_else(|| ScriptError::TypeMismatch {
            name: name.to_string(),
            index,
            expected: "string",
            actual: args[index].type_name(),
        })
}

fn arg_number(name: &str, args: &[Value], index: usize) -> Result<rust_decimal::Decimal, ScriptError> {
    args[index]
        .as_number()
        .ok_or_else(|| ScriptError::TypeMismatch {
            name: name.to_string(),
            index,
            expected: "number",
            actual: args[index].type_name(),
        })
}

fn arg_bool_or(args: &[Value], index: usize, default: bool) -> bool {
    args.get(index).map_or(default, Value::as_bool)
}

//==================================================
// Section 3.0 - Control-Flow Signals
//==================================================

fn builtin_abort(
    _rt: &mut Runtime,
    _parser: &mut dyn LineParser,
    _scope: &ScopeRef,
    _name: &str,
    args: &[Value],
) -> ScriptResult<Value> {
    if !args[0].as_bool() {
        return Err(Signal::Abort(i18n::text("macro.function.abort.message")).into());
    }
    Ok(args[0].clone())
}

fn builtin_assert(
    _rt: &mut Runtime,
    _parser: &mut dyn LineParser,
    _scope: &ScopeRef,
    name: &str,
    args: &[Value],
) -> ScriptResult<Value> {
    // The message type is checked before the condition so a bad call
    // fails the same way whether or not the assertion holds.
    let message = arg_text(name, args, 1)?;
    if !args[0].as_bool() {
        let suppress_localization = arg_bool_or(args, 2, false);
        let message = if suppress_localization {
            message.to_string()
        } else {
            i18n::text(message)
        };
        return Err(Signal::Assert(message).into());
    }
    Ok(Value::truth(true))
}

fn builtin_return(
    _rt: &mut Runtime,
    _parser: &mut dyn LineParser,
    _scope: &ScopeRef,
    _name: &str,
    args: &[Value],
) -> ScriptResult<Value> {
    if !args[0].as_bool() {
        return Err(Signal::Return(args.get(1).cloned()).into());
    }
    Ok(args[0].clone())
}

//==================================================
// Section 4.0 - Definition & Introspection
//==================================================

fn builtin_define_function(
    rt: &mut Runtime,
    _parser: &mut dyn LineParser,
    _scope: &ScopeRef,
    name: &str,
    args: &[Value],
) -> ScriptResult<Value> {
    let function_name = arg_text(name, args, 0)?.to_string();
    let macro_name = arg_text(name, args, 1)?.to_string();
    let ignore_output = arg_bool_or(args, 2, false);
    let fresh_scope = arg_bool_or(args, 3, true);
    rt.define_function(&function_name, &macro_name, ignore_output, fresh_scope);
    Ok(Value::text(""))
}

fn builtin_is_function_defined(
    rt: &mut Runtime,
    _parser: &mut dyn LineParser,
    _scope: &ScopeRef,
    name: &str,
    args: &[Value],
) -> ScriptResult<Value> {
    use crate::registry::DefinitionState::*;
    let state = match rt.is_function_defined(arg_text(name, args, 0)?) {
        UserDefined => 1,
        NativeOnly => 2,
        NotDefined => 0,
    };
    Ok(Value::number(state))
}

fn builtin_old_function(
    rt: &mut Runtime,
    parser: &mut dyn LineParser,
    scope: &ScopeRef,
    _name: &str,
    args: &[Value],
) -> ScriptResult<Value> {
    rt.old_function(parser, scope, args.to_vec())
}

fn builtin_get_defined_functions(
    rt: &mut Runtime,
    _parser: &mut dyn LineParser,
    _scope: &ScopeRef,
    name: &str,
    args: &[Value],
) -> ScriptResult<Value> {
    let delim = if args.is_empty() {
        ""
    } else {
        arg_text(name, args, 0)?
    };
    let show_locations = arg_bool_or(args, 1, false);
    Ok(rt.registry().defined_functions(delim, show_locations))
}

//==================================================
// Section 5.0 - Limits & Context Queries
//==================================================

fn builtin_get_recursion_depth(
    rt: &mut Runtime,
    _parser: &mut dyn LineParser,
    _scope: &ScopeRef,
    _name: &str,
    _args: &[Value],
) -> ScriptResult<Value> {
    Ok(Value::number(rt.recursion_depth() as i64))
}

fn builtin_get_max_recursion_depth(
    rt: &mut Runtime,
    _parser: &mut dyn LineParser,
    _scope: &ScopeRef,
    _name: &str,
    _args: &[Value],
) -> ScriptResult<Value> {
    Ok(Value::number(rt.max_recursion_depth() as i64))
}

fn builtin_set_max_recursion_depth(
    rt: &mut Runtime,
    _parser: &mut dyn LineParser,
    _scope: &ScopeRef,
    name: &str,
    args: &[Value],
) -> ScriptResult<Value> {
    let depth = arg_number(name, args, 0)?;
    let depth = depth.to_usize().ok_or_else(|| ScriptError::TypeMismatch {
        name: name.to_string(),
        index: 0,
        expected: "positive number",
        actual: args[0].type_name(),
    })?;
    rt.set_max_recursion_depth(depth);
    Ok(Value::number(rt.max_recursion_depth() as i64))
}

fn builtin_get_max_loop_iterations(
    rt: &mut Runtime,
    _parser: &mut dyn LineParser,
    _scope: &ScopeRef,
    _name: &str,
    _args: &[Value],
) -> ScriptResult<Value> {
    Ok(Value::number(rt.max_loop_iterations() as i64))
}

fn builtin_set_max_loop_iterations(
    rt: &mut Runtime,
    _parser: &mut dyn LineParser,
    _scope: &ScopeRef,
    name: &str,
    args: &[Value],
) -> ScriptResult<Value> {
    let iterations = arg_number(name, args, 0)?;
    let iterations = iterations
        .to_u64()
        .ok_or_else(|| ScriptError::TypeMismatch {
            name: name.to_string(),
            index: 0,
            expected: "positive number",
            actual: args[0].type_name(),
        })?;
    rt.set_max_loop_iterations(iterations);
    Ok(Value::number(rt.max_loop_iterations() as i64))
}

fn current_context(rt: &Runtime) -> Result<crate::context::ContextDescription, ScriptError> {
    rt.describe_current_context()
        .ok_or_else(|| ScriptError::Internal(i18n::text("lineParser.noContext")))
}

fn builtin_get_macro_name(
    rt: &mut Runtime,
    _parser: &mut dyn LineParser,
    _scope: &ScopeRef,
    _name: &str,
    _args: &[Value],
) -> ScriptResult<Value> {
    Ok(Value::Text(current_context(rt)?.name))
}

fn builtin_get_macro_location(
    rt: &mut Runtime,
    _parser: &mut dyn LineParser,
    _scope: &ScopeRef,
    _name: &str,
    _args: &[Value],
) -> ScriptResult<Value> {
    Ok(Value::Text(current_context(rt)?.source))
}

fn builtin_is_trusted(
    rt: &mut Runtime,
    _parser: &mut dyn LineParser,
    _scope: &ScopeRef,
    _name: &str,
    _args: &[Value],
) -> ScriptResult<Value> {
    Ok(Value::truth(rt.is_macro_trusted()))
}
