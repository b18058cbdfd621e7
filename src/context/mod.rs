//! Execution context stack: macro call nesting, trust, and the
//! recursion / loop-iteration guards.

use serde::Serialize;

use crate::error::ScriptError;

/// Name and source of macros that come straight from chat input.
pub const CHAT_INPUT: &str = "chat";

/// Default ceiling for macro recursion.
pub const DEFAULT_MAX_RECURSION_DEPTH: usize = 150;

/// Default ceiling for loop iterations inside macro bodies.
pub const DEFAULT_MAX_LOOP_ITERATIONS: u64 = 10_000;

/// Identity of one macro invocation: what runs, where it came from, and
/// whether that source is trusted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MacroContext {
    name: String,
    source: String,
    trusted: bool,
}

impl MacroContext {
    pub fn new(name: impl Into<String>, source: impl Into<String>, trusted: bool) -> Self {
        Self {
            name: name.into(),
            source: source.into(),
            trusted,
        }
    }

    /// Context for macros typed into chat. Typing is only trusted when
    /// the player is a GM.
    pub fn chat(gm: bool) -> Self {
        Self::new(CHAT_INPUT, CHAT_INPUT, gm)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn is_trusted(&self) -> bool {
        self.trusted
    }
}

/// Snapshot of the executing context reported to collaborators.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContextDescription {
    pub name: String,
    pub source: String,
    pub trusted: bool,
    pub stack_size: usize,
}

/// LIFO record of nested macro invocations.
///
/// Owns the recursion counter checked on every macro entry and the
/// loop-iteration counter the external parser reports into. The path
/// trust latch starts with the first context pushed and drops as soon
/// as any untrusted context joins the chain.
#[derive(Debug)]
pub struct ContextStack {
    stack: Vec<MacroContext>,
    path_trusted: bool,
    recursion_depth: usize,
    loop_iterations: u64,
    max_recursion_depth: usize,
    max_loop_iterations: u64,
}

impl Default for ContextStack {
    fn default() -> Self {
        Self::with_limits(DEFAULT_MAX_RECURSION_DEPTH, DEFAULT_MAX_LOOP_ITERATIONS)
    }
}

impl ContextStack {
    pub fn with_limits(max_recursion_depth: usize, max_loop_iterations: u64) -> Self {
        Self {
            stack: Vec::new(),
            path_trusted: false,
            recursion_depth: 0,
            loop_iterations: 0,
            max_recursion_depth,
            max_loop_iterations,
        }
    }

    /// Pushes a context, updating the path trust latch.
    pub fn enter(&mut self, context: MacroContext) {
        if self.stack.is_empty() {
            self.path_trusted = context.is_trusted();
            self.loop_iterations = 0;
        } else if !context.is_trusted() {
            self.path_trusted = false;
        }
        self.stack.push(context);
    }

    /// Pops the current context, returning it.
    pub fn exit(&mut self) -> Option<MacroContext> {
        self.stack.pop()
    }

    /// Records one macro entry and pushes its context.
    ///
    /// Fails before the host stack is at risk; on failure both counters
    /// are cleared so the aborted run does not leak into the next one.
    pub fn begin_call(&mut self, context: MacroContext) -> Result<(), ScriptError> {
        self.recursion_depth += 1;
        if self.recursion_depth > self.max_recursion_depth {
            self.recursion_depth = 0;
            self.loop_iterations = 0;
            return Err(ScriptError::RecursionLimitExceeded(self.max_recursion_depth));
        }
        self.enter(context);
        Ok(())
    }

    /// Unwinds one macro entry. Paired with `begin_call` on every path,
    /// including signal unwinds.
    pub fn end_call(&mut self) {
        self.exit();
        self.recursion_depth = self.recursion_depth.saturating_sub(1);
    }

    pub fn current(&self) -> Option<&MacroContext> {
        self.stack.last()
    }

    pub fn describe(&self) -> Option<ContextDescription> {
        self.stack.last().map(|ctx| ContextDescription {
            name: ctx.name().to_string(),
            source: ctx.source().to_string(),
            trusted: ctx.is_trusted(),
            stack_size: self.stack.len(),
        })
    }

    /// Is the currently executing macro trusted?
    pub fn is_macro_trusted(&self) -> bool {
        self.stack.last().map_or(false, MacroContext::is_trusted)
    }

    /// Has every context since the top-level invocation been trusted?
    pub fn is_macro_path_trusted(&self) -> bool {
        self.path_trusted
    }

    pub fn is_empty(&self) -> bool {
        self.stack.is_empty()
    }

    pub fn stack_size(&self) -> usize {
        self.stack.len()
    }

    pub fn recursion_depth(&self) -> usize {
        self.recursion_depth
    }

    pub fn max_recursion_depth(&self) -> usize {
        self.max_recursion_depth
    }

    pub fn set_max_recursion_depth(&mut self, depth: usize) {
        self.max_recursion_depth = depth.max(1);
    }

    pub fn max_loop_iterations(&self) -> u64 {
        self.max_loop_iterations
    }

    pub fn set_max_loop_iterations(&mut self, iterations: u64) {
        self.max_loop_iterations = iterations.max(1);
    }

    /// Running loop-iteration count for the current top-level run. The
    /// external parser owns enforcement; this stack only keeps score.
    pub fn loop_iterations(&self) -> u64 {
        self.loop_iterations
    }

    pub fn record_loop_iteration(&mut self) -> u64 {
        self.loop_iterations += 1;
        self.loop_iterations
    }
}
