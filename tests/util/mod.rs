//! Shared test harness: a scripted stand-in for the external line
//! parser. Macro bodies are either fixed output strings or Rust
//! functions that may re-enter the runtime, which is how real macro
//! source behaves without needing a real parser.

#![allow(dead_code)]

use std::collections::HashMap;

use tablescript::{Interrupt, LineParser, Runtime, ScopeRef, ScriptError, VariableScope};

/// A scripted macro body. Takes the runtime and parser back so it can
/// issue nested `invoke` calls the way parsed macro source would.
pub type BodyFn = fn(&mut Runtime, &mut StubParser, &ScopeRef) -> Result<String, Interrupt>;

#[derive(Default)]
pub struct StubParser {
    bodies: HashMap<String, BodyFn>,
    outputs: HashMap<String, String>,
    /// Every macro name this parser was asked to run, in order.
    pub calls: Vec<String>,
}

impl StubParser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_output(mut self, macro_name: &str, output: &str) -> Self {
        self.outputs.insert(macro_name.to_string(), output.to_string());
        self
    }

    pub fn with_body(mut self, macro_name: &str, body: BodyFn) -> Self {
        self.bodies.insert(macro_name.to_string(), body);
        self
    }
}

impl LineParser for StubParser {
    fn run_macro(
        &mut self,
        runtime: &mut Runtime,
        macro_name: &str,
        scope: &ScopeRef,
    ) -> Result<String, Interrupt> {
        self.calls.push(macro_name.to_string());
        if let Some(body) = self.bodies.get(macro_name).copied() {
            return body(runtime, self, scope);
        }
        if let Some(output) = self.outputs.get(macro_name) {
            return Ok(output.clone());
        }
        Err(Interrupt::Error(ScriptError::Internal(format!(
            "no macro source for '{macro_name}'"
        ))))
    }
}

/// A caller scope with no token in context.
pub fn scope() -> ScopeRef {
    VariableScope::shared(None)
}
