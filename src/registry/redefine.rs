//! Redefinition chain: point redefinition of a function shadows the
//! existing definition while keeping it callable through an internal
//! alias, preserving an unbounded history.

use std::rc::Rc;

use tracing::info;

use super::{FunctionEntry, FunctionRegistry, UserFunction};

/// Link from a function name to the definition it shadowed.
///
/// `call_name` is the name the shadowed definition now answers to: the
/// original name when a native was shadowed, or an internal
/// `shadow_N_name` alias once a user-defined function shadowed another.
#[derive(Clone)]
pub struct RedefinitionRecord {
    pub call_name: String,
    pub entry: Rc<FunctionEntry>,
}

impl FunctionRegistry {
    /// Defines (or redefines) a user function.
    ///
    /// Redefining with the body already in place is a no-op. Otherwise
    /// any existing definition moves onto the redefinition chain; a
    /// shadowed user-defined function also gets an internal alias so
    /// the chain stays addressable after the public name is taken over.
    pub fn define_function(
        &mut self,
        name: &str,
        macro_name: &str,
        ignore_output: bool,
        fresh_scope: bool,
    ) {
        let key = name.to_lowercase();
        if let Some(existing) = self.lookup(name) {
            let mut record = RedefinitionRecord {
                call_name: name.to_string(),
                entry: existing.clone(),
            };

            if let super::FunctionDefinition::UserDefined(user) = &existing.definition {
                if user.macro_name == macro_name {
                    // Idempotent redefinition.
                    return;
                }
                let alias = format!("shadow_{}_{}", self.next_shadow_id(), name);
                // Any live record for this name is re-keyed under the
                // alias first, preserving the older history.
                if let Some(previous) = self.redefinitions.remove(&key) {
                    self.redefinitions.insert(alias.to_lowercase(), previous);
                }
                self.entries.insert(alias.to_lowercase(), existing.clone());
                record.call_name = alias;
            }

            self.redefinitions.insert(key.clone(), record);
        }

        self.entries.insert(
            key,
            Rc::new(FunctionEntry::user(
                name,
                UserFunction {
                    macro_name: macro_name.to_string(),
                    ignore_output,
                    fresh_scope,
                },
            )),
        );
        info!(name, macro_name, "user function defined");
        self.invalidate_syntax();
    }

    /// The live redefinition record for `name`, if any.
    pub fn redefinition(&self, name: &str) -> Option<&RedefinitionRecord> {
        self.redefinitions.get(&name.to_lowercase())
    }

    /// Length of the redefinition chain behind `name`.
    pub fn redefinition_depth(&self, name: &str) -> usize {
        let mut depth = 0;
        let mut current = name.to_lowercase();
        while let Some(record) = self.redefinitions.get(&current) {
            depth += 1;
            let next = record.call_name.to_lowercase();
            if next == current {
                break;
            }
            current = next;
        }
        depth
    }

    fn next_shadow_id(&mut self) -> usize {
        let id = self.shadow_counter;
        self.shadow_counter += 1;
        id
    }
}
