//==================================================
// File: dispatch.rs
//==================================================
// Author: ZobieLabs
// License: Duality Public License (DPL v1.0)
// Goal: Macro function dispatcher
// Objective: Resolve calls against the registry, enforce arity and
//            trust, run native handlers, and drive the user-defined
//            function lifecycle through the external line parser
//==================================================

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use tracing::debug;

use crate::context::{
    ContextDescription, ContextStack, MacroContext, DEFAULT_MAX_LOOP_ITERATIONS,
    DEFAULT_MAX_RECURSION_DEPTH,
};
use crate::error::{Interrupt, ScriptError, ScriptResult, Signal};
use crate::i18n;
use crate::registry::{
    DefinitionState, FunctionDefinition, FunctionPackage, FunctionRegistry, FunctionSignature,
    TrustRequirement, UserFunction,
};
use crate::scope::{reserved, ScopeRef, VariableScope};
use crate::value::Value;

//==================================================
// Section 1.0 - External Parser Seam
//==================================================

/// The external line/expression parser.
///
/// It resolves a qualified macro name to source text, parses and
/// executes it against the given scope, re-enters [`Runtime::invoke`]
/// for every call node it encounters, and owns loop-iteration
/// enforcement. The runtime has already pushed the execution context
/// before `run_macro` is called; that context inherits the caller's
/// trust. Only the parser knows the trust of the library the macro
/// name resolves to, so a parser whose source grants different trust
/// must layer its own context via [`Runtime::enter_context`] /
/// [`Runtime::exit_context`] around execution of the body.
pub trait LineParser {
    fn run_macro(
        &mut self,
        runtime: &mut Runtime,
        macro_name: &str,
        scope: &ScopeRef,
    ) -> Result<String, Interrupt>;
}

//==================================================
// Section 2.0 - Runtime Configuration
//==================================================

/// Tunable ceilings for a runtime instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeConfig {
    pub max_recursion_depth: usize,
    pub max_loop_iterations: u64,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            max_recursion_depth: DEFAULT_MAX_RECURSION_DEPTH,
            max_loop_iterations: DEFAULT_MAX_LOOP_ITERATIONS,
        }
    }
}

//==================================================
// Section 3.0 - Runtime
//==================================================

static DELIMITED_COMMENTS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)<!--.*?-->").expect("comment pattern"));

/// The dispatch core. Owns the function registry, the execution context
/// stack, and the currently-executing-function stack that `oldFunction`
/// consults.
///
/// Single-threaded by design: a macro body may recursively re-enter the
/// dispatcher, but two call trees never run concurrently against the
/// same runtime. Hosts embedding this in a threaded client must
/// serialize access themselves.
pub struct Runtime {
    registry: FunctionRegistry,
    contexts: ContextStack,
    current_function: Vec<String>,
    gm: bool,
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new()
    }
}

impl Runtime {
    pub fn new() -> Self {
        Self::with_config(RuntimeConfig::default())
    }

    pub fn with_config(config: RuntimeConfig) -> Self {
        let mut registry = FunctionRegistry::new();
        crate::builtins::install(&mut registry);
        registry.seal_natives();
        Self {
            registry,
            contexts: ContextStack::with_limits(
                config.max_recursion_depth,
                config.max_loop_iterations,
            ),
            current_function: Vec::new(),
            gm: false,
        }
    }

    /// Marks the local player as a GM for trust decisions.
    pub fn set_gm(&mut self, gm: bool) {
        self.gm = gm;
    }

    pub fn registry(&self) -> &FunctionRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut FunctionRegistry {
        &mut self.registry
    }

    //==================================================
    // Section 3.1 - Dispatch
    //==================================================

    /// The single entry point the parser uses for every call node.
    ///
    /// Arguments arrive strictly evaluated, left to right; there are no
    /// lazy arguments. Whether the parser may constant-fold a call away
    /// is declared on the signature instead (`deterministic`).
    pub fn invoke(
        &mut self,
        parser: &mut dyn LineParser,
        scope: &ScopeRef,
        name: &str,
        args: Vec<Value>,
    ) -> ScriptResult<Value> {
        let entry = self
            .registry
            .lookup(name)
            .ok_or_else(|| ScriptError::UnknownFunction(name.to_string()))?;

        check_arity(&entry.signature, name, args.len())?;
        self.check_trust(&entry.signature, name)?;

        debug!(function = name, argc = args.len(), "dispatch");
        match &entry.definition {
            FunctionDefinition::Native(handler) => handler(self, parser, scope, name, &args),
            FunctionDefinition::UserDefined(user) => {
                self.invoke_user(parser, scope, name, user.clone(), args)
            }
        }
    }

    /// True when the parser must not treat calls to `name` as pure.
    pub fn is_deterministic(&self, name: &str) -> bool {
        self.registry
            .lookup(name)
            .map_or(true, |entry| entry.signature.deterministic)
    }

    fn check_trust(&self, signature: &FunctionSignature, name: &str) -> Result<(), ScriptError> {
        let allowed = match signature.trust {
            TrustRequirement::None => true,
            TrustRequirement::MacroTrusted => self.contexts.is_macro_trusted(),
            TrustRequirement::PathTrusted => self.contexts.is_macro_path_trusted(),
            TrustRequirement::GmOrTrusted => self.gm || self.contexts.is_macro_trusted(),
        };
        if allowed {
            Ok(())
        } else {
            Err(ScriptError::PermissionDenied(name.to_string()))
        }
    }

    //==================================================
    // Section 3.2 - User-Defined Function Lifecycle
    //==================================================

    fn invoke_user(
        &mut self,
        parser: &mut dyn LineParser,
        caller_scope: &ScopeRef,
        name: &str,
        function: UserFunction,
        args: Vec<Value>,
    ) -> ScriptResult<Value> {
        let json_args: Vec<JsonValue> = args.iter().map(Value::to_arg_json).collect();
        let args_text = if json_args.is_empty() {
            String::new()
        } else {
            JsonValue::Array(json_args.clone()).to_string()
        };

        let callee_scope = if function.fresh_scope {
            VariableScope::child_of(caller_scope)
        } else {
            caller_scope.clone()
        };
        {
            let mut scope = callee_scope.borrow_mut();
            scope.set_reserved(reserved::MACRO_ARGS, Value::Text(args_text));
            scope.set_reserved(
                reserved::MACRO_ARGS_NUM,
                Value::number(json_args.len() as i64),
            );
            for (index, element) in json_args.into_iter().enumerate() {
                scope.set_reserved(&reserved::macro_arg(index), Value::from_json(element));
            }
            scope.set_reserved(reserved::MACRO_RETURN, Value::text(""));
        }

        // This stack, not the context stack, is what oldFunction reads.
        self.current_function.push(name.to_string());
        let context = MacroContext::new(name, &function.macro_name, self.contexts.is_macro_trusted());
        let outcome = self.run_user_body(parser, &function, &callee_scope, context);
        self.current_function.pop();

        let output = match outcome {
            Ok(text) => {
                let returned = callee_scope
                    .borrow()
                    .get(reserved::MACRO_RETURN)
                    .unwrap_or_else(|| Value::text(""));
                caller_scope
                    .borrow_mut()
                    .set_reserved(reserved::MACRO_RETURN, returned);
                Some(text)
            }
            Err(Interrupt::Signal(Signal::Return(payload))) => match payload {
                Some(value) => {
                    caller_scope
                        .borrow_mut()
                        .set_reserved(reserved::MACRO_RETURN, value.clone());
                    Some(value.to_string())
                }
                None => None,
            },
            Err(Interrupt::Signal(Signal::Abort(message))) => {
                if caller_scope.borrow().catches(reserved::CATCH_ABORT) {
                    debug!(function = name, "abort intercepted");
                    return Ok(Value::text(""));
                }
                return Err(Signal::Abort(message).into());
            }
            Err(Interrupt::Signal(Signal::Assert(message))) => {
                if caller_scope.borrow().catches(reserved::CATCH_ASSERT) {
                    debug!(function = name, "assert intercepted");
                    return Ok(Value::text(""));
                }
                return Err(Signal::Assert(message).into());
            }
            Err(other) => return Err(other),
        };

        if function.ignore_output {
            return Ok(caller_scope
                .borrow()
                .get(reserved::MACRO_RETURN)
                .unwrap_or_else(|| Value::text("")));
        }

        let Some(output) = output else {
            return Ok(Value::text(""));
        };
        Ok(self.convert_output(caller_scope, output.trim()))
    }

    fn run_user_body(
        &mut self,
        parser: &mut dyn LineParser,
        function: &UserFunction,
        scope: &ScopeRef,
        context: MacroContext,
    ) -> Result<String, Interrupt> {
        self.contexts.begin_call(context)?;
        let result = parser.run_macro(self, &function.macro_name, scope);
        self.contexts.end_call();
        result
    }

    /// Applies the output conversion chain: strip delimited comments,
    /// fall back to `macro.return` when nothing is left, then JSON,
    /// then number, then literal text. Exactly one wins.
    fn convert_output(&self, caller_scope: &ScopeRef, output: &str) -> Value {
        let stripped = DELIMITED_COMMENTS.replace_all(output, "");
        let (raw, source);
        if stripped.trim().is_empty() {
            let fallback = caller_scope
                .borrow()
                .get(reserved::MACRO_RETURN)
                .unwrap_or_else(|| Value::text(""))
                .to_string();
            raw = fallback.clone();
            source = fallback;
        } else {
            raw = output.to_string();
            source = stripped.into_owned();
        }

        match Value::from_output(source.trim()) {
            Value::Text(_) => Value::Text(raw),
            converted => converted,
        }
    }

    //==================================================
    // Section 3.3 - Definition & Redefinition API
    //==================================================

    pub fn define_function(
        &mut self,
        name: &str,
        macro_name: &str,
        ignore_output: bool,
        fresh_scope: bool,
    ) {
        self.registry
            .define_function(name, macro_name, ignore_output, fresh_scope);
    }

    pub fn is_function_defined(&self, name: &str) -> DefinitionState {
        self.registry.is_defined(name)
    }

    /// Invokes the definition shadowed by the currently executing
    /// function. A hard error when nothing was shadowed, so authors
    /// find out immediately instead of silently calling nothing.
    pub fn old_function(
        &mut self,
        parser: &mut dyn LineParser,
        scope: &ScopeRef,
        args: Vec<Value>,
    ) -> ScriptResult<Value> {
        let current = self
            .current_function
            .last()
            .cloned()
            .ok_or_else(|| ScriptError::Internal(i18n::text("lineParser.noContext")))?;
        let record = self
            .registry
            .redefinition(&current)
            .ok_or_else(|| ScriptError::NoShadowedDefinition(current.clone()))?;
        let call_name = record.call_name.clone();
        let entry = record.entry.clone();

        check_arity(&entry.signature, &call_name, args.len())?;
        // The shadowed signature keeps its trust demand; a wrapper must
        // not become a forwarding path around it.
        self.check_trust(&entry.signature, &call_name)?;
        match &entry.definition {
            FunctionDefinition::Native(handler) => handler(self, parser, scope, &call_name, &args),
            FunctionDefinition::UserDefined(user) => {
                self.invoke_user(parser, scope, &call_name, user.clone(), args)
            }
        }
    }

    pub fn import_batch(&mut self, prefix: &str, package: &dyn FunctionPackage) -> Vec<String> {
        self.registry.import_batch(prefix, package)
    }

    /// Clears all dynamic registrations, keeping native functions.
    pub fn reset(&mut self) {
        self.registry.reset();
        self.current_function.clear();
    }

    //==================================================
    // Section 3.4 - Context & Limit Accessors
    //==================================================

    /// Enters a context for a line the parser is about to run. With
    /// `None` the current context is re-entered, or a chat context is
    /// synthesized at top level.
    pub fn enter_context(&mut self, context: Option<MacroContext>) -> MacroContext {
        let context = match context {
            Some(ctx) => ctx,
            None => match self.contexts.current() {
                Some(current) => current.clone(),
                None => MacroContext::chat(self.gm),
            },
        };
        self.contexts.enter(context.clone());
        context
    }

    pub fn exit_context(&mut self) -> Option<MacroContext> {
        self.contexts.exit()
    }

    pub fn describe_current_context(&self) -> Option<ContextDescription> {
        self.contexts.describe()
    }

    pub fn is_macro_trusted(&self) -> bool {
        self.contexts.is_macro_trusted()
    }

    pub fn is_macro_path_trusted(&self) -> bool {
        self.contexts.is_macro_path_trusted()
    }

    pub fn recursion_depth(&self) -> usize {
        self.contexts.recursion_depth()
    }

    pub fn context_stack_size(&self) -> usize {
        self.contexts.stack_size()
    }

    pub fn max_recursion_depth(&self) -> usize {
        self.contexts.max_recursion_depth()
    }

    pub fn set_max_recursion_depth(&mut self, depth: usize) {
        self.contexts.set_max_recursion_depth(depth);
    }

    pub fn max_loop_iterations(&self) -> u64 {
        self.contexts.max_loop_iterations()
    }

    pub fn set_max_loop_iterations(&mut self, iterations: u64) {
        self.contexts.set_max_loop_iterations(iterations);
    }

    pub fn loop_iterations(&self) -> u64 {
        self.contexts.loop_iterations()
    }

    /// Reported by the parser for each loop iteration it executes; the
    /// parser also enforces the ceiling.
    pub fn record_loop_iteration(&mut self) -> u64 {
        self.contexts.record_loop_iteration()
    }
}

//==================================================
// Section 4.0 - Arity
//==================================================

fn check_arity(signature: &FunctionSignature, name: &str, got: usize) -> Result<(), ScriptError> {
    if got < signature.min_args {
        return Err(ScriptError::NotEnoughArguments {
            name: name.to_string(),
            min: signature.min_args,
            got,
        });
    }
    if let Some(max) = signature.max_args {
        if got > max {
            return Err(ScriptError::TooManyArguments {
                name: name.to_string(),
                max,
                got,
            });
        }
    }
    Ok(())
}
