//==================================================
// File: scope.rs
//==================================================
// Author: ZobieLabs
// License: Duality Public License (DPL v1.0)
// Goal: Variable scopes for macro execution
// Objective: Case-insensitive name/value bindings, the reserved
//            signal-interception protocol variables, and the non-owning
//            token-in-context handle
//==================================================

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::error::ScriptError;
use crate::value::Value;

//==================================================
// Section 1.0 - Reserved Variable Protocol
//==================================================

/// Reserved variable names macro authors depend on. These are contract,
/// not implementation detail; the exact spellings are load-bearing.
pub mod reserved {
    /// Raw JSON text of the arguments the current macro was called with.
    pub const MACRO_ARGS: &str = "macro.args";
    /// Number of arguments the current macro was called with.
    pub const MACRO_ARGS_NUM: &str = "macro.args.num";
    /// Explicit return payload of the current macro.
    pub const MACRO_RETURN: &str = "macro.return";
    /// Set to 1 to intercept an Abort signal at this call boundary.
    pub const CATCH_ABORT: &str = "macro.catchAbort";
    /// Set to 1 to intercept an Assert signal at this call boundary.
    pub const CATCH_ASSERT: &str = "macro.catchAssert";

    /// Name of the per-argument variable `macro.args.N`.
    pub fn macro_arg(index: usize) -> String {
        format!("macro.args.{index}")
    }
}

const CONSTANTS: [(&str, bool); 2] = [("true", true), ("false", false)];

//==================================================
// Section 2.0 - Token Handle
//==================================================

/// Non-owning reference to the domain token a macro runs against.
///
/// The scope never holds the token itself; resolving the id back to an
/// object is the domain collaborator's job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenRef(pub String);

impl TokenRef {
    pub fn id(&self) -> &str {
        &self.0
    }
}

//==================================================
// Section 3.0 - Variable Scope
//==================================================

/// Shared handle to a scope. Scopes are single-threaded and never
/// outlive the call tree that created them.
pub type ScopeRef = Rc<RefCell<VariableScope>>;

/// Named value bindings for one macro call, matched case-insensitively.
#[derive(Debug)]
pub struct VariableScope {
    values: HashMap<String, Value>,
    token: Option<TokenRef>,
}

// Every scope carries the reserved variables and constants, seeded.
impl Default for VariableScope {
    fn default() -> Self {
        Self::new(None)
    }
}

impl VariableScope {
    /// A scope seeded with the reserved protocol variables and the
    /// script constants.
    pub fn new(token: Option<TokenRef>) -> Self {
        let mut scope = Self {
            values: HashMap::new(),
            token,
        };
        scope.seed(reserved::MACRO_ARGS, Value::text(""));
        scope.seed(reserved::MACRO_ARGS_NUM, Value::number(0));
        scope.seed(reserved::MACRO_RETURN, Value::text(""));
        scope.seed(reserved::CATCH_ABORT, Value::truth(false));
        scope.seed(reserved::CATCH_ASSERT, Value::truth(false));
        for (name, truth) in CONSTANTS {
            scope.seed(name, Value::truth(truth));
        }
        scope
    }

    pub fn shared(token: Option<TokenRef>) -> ScopeRef {
        Rc::new(RefCell::new(Self::new(token)))
    }

    /// A fresh scope for a callee, carrying over only the caller's
    /// token in context.
    pub fn child_of(caller: &ScopeRef) -> ScopeRef {
        let token = caller.borrow().token.clone();
        Self::shared(token)
    }

    fn seed(&mut self, name: &str, value: Value) {
        self.values.insert(name.to_lowercase(), value);
    }

    pub fn get(&self, name: &str) -> Option<Value> {
        self.values.get(&name.to_lowercase()).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(&name.to_lowercase())
    }

    pub fn set(&mut self, name: &str, value: Value) -> Result<(), ScriptError> {
        let key = name.to_lowercase();
        if CONSTANTS.iter().any(|(c, _)| *c == key) && self.values.contains_key(&key) {
            return Err(ScriptError::CannotAssignConstant(name.to_string()));
        }
        self.values.insert(key, value);
        Ok(())
    }

    /// Writes a reserved protocol variable, bypassing the constant
    /// guard. Only the runtime calls this.
    pub(crate) fn set_reserved(&mut self, name: &str, value: Value) {
        self.seed(name, value);
    }

    /// True when the named catch variable is set at this boundary.
    pub fn catches(&self, name: &str) -> bool {
        self.get(name).map_or(false, |v| v.as_bool())
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    pub fn token_in_context(&self) -> Option<&TokenRef> {
        self.token.as_ref()
    }

    pub fn set_token_in_context(&mut self, token: Option<TokenRef>) {
        self.token = token;
    }
}

//==================================================
// Section 4.0 - Tests
//==================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookups_ignore_case() {
        let mut scope = VariableScope::new(None);
        scope.set("HitPoints", Value::number(12)).unwrap();
        assert_eq!(scope.get("hitpoints"), Some(Value::number(12)));
        assert_eq!(scope.get("HITPOINTS"), Some(Value::number(12)));
    }

    #[test]
    fn constants_cannot_be_reassigned() {
        let mut scope = VariableScope::new(None);
        let err = scope.set("true", Value::number(0)).unwrap_err();
        assert_eq!(err, ScriptError::CannotAssignConstant("true".to_string()));
        assert_eq!(scope.get("true"), Some(Value::truth(true)));
    }

    #[test]
    fn default_scopes_are_seeded_like_new_ones() {
        let mut scope = VariableScope::default();
        assert_eq!(scope.get("macro.return"), Some(Value::text("")));
        assert!(scope.set("true", Value::number(0)).is_err());
    }

    #[test]
    fn fresh_child_keeps_only_the_token() {
        let caller = VariableScope::shared(Some(TokenRef("tok-1".into())));
        caller
            .borrow_mut()
            .set("secret", Value::number(7))
            .unwrap();
        let child = VariableScope::child_of(&caller);
        assert!(child.borrow().get("secret").is_none());
        assert_eq!(
            child.borrow().token_in_context(),
            Some(&TokenRef("tok-1".into()))
        );
    }
}
