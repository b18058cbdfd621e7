//==================================================
// File: registry.rs
//==================================================
// Author: ZobieLabs
// License: Duality Public License (DPL v1.0)
// Goal: Function registry for the macro runtime
// Objective: Map callable names to native handlers or user-defined
//            definitions, with aliasing, bulk framework import, and
//            syntax-table invalidation signalling
//==================================================

use std::collections::HashMap;
use std::rc::Rc;

use tracing::info;

use crate::dispatch::{LineParser, Runtime};
use crate::error::ScriptResult;
use crate::scope::ScopeRef;
use crate::value::Value;

pub mod redefine;

pub use redefine::RedefinitionRecord;

//==================================================
// Section 1.0 - Signatures & Definitions
//==================================================

/// Trust level a signature demands from its caller.
///
/// Macro trust asks whether the currently executing macro comes from a
/// trusted source; path trust asks whether every context since the
/// top-level invocation did. The two are independent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrustRequirement {
    None,
    MacroTrusted,
    PathTrusted,
    /// Satisfied by a GM player or by macro trust.
    GmOrTrusted,
}

/// Callable names plus the arity and trust contract of one function.
#[derive(Debug, Clone)]
pub struct FunctionSignature {
    pub aliases: Vec<String>,
    pub min_args: usize,
    /// `None` means unlimited.
    pub max_args: Option<usize>,
    pub trust: TrustRequirement,
    /// When false, the surrounding expression parser must not
    /// constant-fold calls to this function away.
    pub deterministic: bool,
}

impl FunctionSignature {
    pub fn new(aliases: &[&str], min_args: usize, max_args: Option<usize>) -> Self {
        Self {
            aliases: aliases.iter().map(|s| s.to_string()).collect(),
            min_args,
            max_args,
            trust: TrustRequirement::None,
            deterministic: true,
        }
    }

    pub fn trusted(mut self, trust: TrustRequirement) -> Self {
        self.trust = trust;
        self
    }

    pub fn volatile(mut self) -> Self {
        self.deterministic = false;
        self
    }

    /// Signature shape shared by all user-defined functions: any name,
    /// any number of arguments.
    pub fn user(name: &str) -> Self {
        Self {
            aliases: vec![name.to_string()],
            min_args: 0,
            max_args: None,
            trust: TrustRequirement::None,
            deterministic: true,
        }
    }
}

/// Handler type for native functions.
pub type NativeFn = fn(
    &mut Runtime,
    &mut dyn LineParser,
    &ScopeRef,
    &str,
    &[Value],
) -> ScriptResult<Value>;

/// A dynamically defined function: macro source referenced by qualified
/// name and re-parsed on every call by the external line parser.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserFunction {
    pub macro_name: String,
    pub ignore_output: bool,
    pub fresh_scope: bool,
}

pub enum FunctionDefinition {
    Native(NativeFn),
    UserDefined(UserFunction),
}

/// One registered callable: its contract and how to run it.
pub struct FunctionEntry {
    pub signature: FunctionSignature,
    pub definition: FunctionDefinition,
}

impl FunctionEntry {
    pub fn native(signature: FunctionSignature, handler: NativeFn) -> Self {
        Self {
            signature,
            definition: FunctionDefinition::Native(handler),
        }
    }

    pub fn user(name: &str, function: UserFunction) -> Self {
        Self {
            signature: FunctionSignature::user(name),
            definition: FunctionDefinition::UserDefined(function),
        }
    }

    pub fn is_user_defined(&self) -> bool {
        matches!(self.definition, FunctionDefinition::UserDefined(_))
    }
}

/// Answer to "is this name callable, and as what?".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DefinitionState {
    NotDefined,
    UserDefined,
    NativeOnly,
}

//==================================================
// Section 2.0 - Framework Packages
//==================================================

/// A chat macro shipped by a framework, runnable from the chat line.
pub trait ChatMacro {
    fn name(&self) -> &str;

    fn description(&self) -> &str {
        ""
    }

    fn execute(
        &self,
        runtime: &mut Runtime,
        parser: &mut dyn LineParser,
        scope: &ScopeRef,
        args: &str,
    ) -> ScriptResult<String>;
}

/// A bundle of foreign functions and chat macros registered in one
/// import. Frameworks implement this and hand it to `import_batch`
/// directly; there is no instantiation-by-name indirection.
pub trait FunctionPackage {
    fn functions(&self) -> Vec<FunctionEntry>;

    fn chat_macros(&self) -> Vec<Rc<dyn ChatMacro>> {
        Vec::new()
    }
}

//==================================================
// Section 3.0 - Registry
//==================================================

/// Process-wide table of callable functions.
///
/// Aliases are matched case-insensitively but stored case-preserving in
/// each signature. Structural changes fire the syntax invalidation hook
/// so the highlighting table knows to rebuild; rebuilding it is the
/// highlighter's job, not ours.
#[derive(Default)]
pub struct FunctionRegistry {
    entries: HashMap<String, Rc<FunctionEntry>>,
    natives: Vec<(String, Rc<FunctionEntry>)>,
    chat_macros: HashMap<String, Rc<dyn ChatMacro>>,
    redefinitions: HashMap<String, RedefinitionRecord>,
    shadow_counter: usize,
    syntax_hook: Option<Box<dyn Fn()>>,
}

impl FunctionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, entry: FunctionEntry) {
        let entry = Rc::new(entry);
        for alias in &entry.signature.aliases {
            self.entries.insert(alias.to_lowercase(), entry.clone());
        }
        self.invalidate_syntax();
    }

    /// Case-insensitive lookup against all registered aliases.
    pub fn lookup(&self, name: &str) -> Option<Rc<FunctionEntry>> {
        self.entries.get(&name.to_lowercase()).cloned()
    }

    pub fn is_defined(&self, name: &str) -> DefinitionState {
        match self.lookup(name) {
            None => DefinitionState::NotDefined,
            Some(entry) if entry.is_user_defined() => DefinitionState::UserDefined,
            Some(_) => DefinitionState::NativeOnly,
        }
    }

    /// Marks everything registered so far as the permanent native set
    /// that survives `reset`.
    pub(crate) fn seal_natives(&mut self) {
        self.natives = self
            .entries
            .iter()
            .map(|(key, entry)| (key.clone(), entry.clone()))
            .collect();
    }

    /// Imports a framework batch under `prefix`.
    ///
    /// Aliases repeated within the batch replace each other in the
    /// batch's own working set; the splice into the registry overwrites
    /// whatever was there before. Neither step touches the redefinition
    /// chain: bulk import overwrites, point redefinition shadows.
    pub fn import_batch(&mut self, prefix: &str, package: &dyn FunctionPackage) -> Vec<String> {
        let prefix = if prefix.is_empty() {
            String::new()
        } else {
            format!("{prefix}_")
        };

        let mut working: HashMap<String, (String, Rc<FunctionEntry>)> = HashMap::new();
        for entry in package.functions() {
            let entry = Rc::new(entry);
            for alias in &entry.signature.aliases {
                let display = format!("{prefix}{alias}");
                working.insert(display.to_lowercase(), (display, entry.clone()));
            }
        }

        let mut registered: Vec<String> = Vec::with_capacity(working.len());
        for (key, (display, entry)) in working {
            self.entries.insert(key, entry);
            registered.push(display);
        }
        registered.sort();

        for chat_macro in package.chat_macros() {
            self.chat_macros
                .insert(chat_macro.name().to_lowercase(), chat_macro);
        }

        info!(count = registered.len(), "framework functions imported");
        self.invalidate_syntax();
        registered
    }

    pub fn chat_macro(&self, name: &str) -> Option<Rc<dyn ChatMacro>> {
        self.chat_macros.get(&name.to_lowercase()).cloned()
    }

    /// Drops every dynamic registration (user-defined functions,
    /// imports, chat macros, redefinition history), keeping natives.
    pub fn reset(&mut self) {
        self.entries = self.natives.iter().cloned().collect();
        self.chat_macros.clear();
        self.redefinitions.clear();
        self.shadow_counter = 0;
        info!("dynamic function registrations cleared");
        self.invalidate_syntax();
    }

    /// Lists defined functions the way `getDefinedFunctions` reports
    /// them: plain lines for an empty delimiter, a JSON array for
    /// "json", otherwise a delimited string list.
    pub fn defined_functions(&self, delim: &str, show_locations: bool) -> Value {
        // Keys are case-folded; the signature keeps the author's
        // spelling, which is what the listing reports.
        let mut names: Vec<(String, &FunctionEntry)> = self
            .entries
            .iter()
            .filter(|(_, entry)| entry.is_user_defined())
            .map(|(key, entry)| {
                let display = entry
                    .signature
                    .aliases
                    .iter()
                    .find(|alias| alias.to_lowercase() == *key)
                    .cloned()
                    .unwrap_or_else(|| key.clone());
                (display, entry.as_ref())
            })
            .collect();
        names.sort_by_key(|(name, _)| name.to_lowercase());
        info!(count = names.len(), "defined functions listed");

        let location = |entry: &FunctionEntry| -> String {
            match &entry.definition {
                FunctionDefinition::UserDefined(user) => user.macro_name.clone(),
                FunctionDefinition::Native(_) => String::new(),
            }
        };

        if delim == "json" {
            let items = names
                .iter()
                .map(|(name, entry)| {
                    let mut object = serde_json::Map::new();
                    object.insert("name".into(), serde_json::Value::String(name.to_string()));
                    if show_locations {
                        object.insert("source".into(), serde_json::Value::String(location(entry)));
                    }
                    serde_json::Value::Object(object)
                })
                .collect();
            Value::Array(items)
        } else if delim.is_empty() {
            let lines: Vec<String> = names
                .iter()
                .map(|(name, entry)| {
                    if show_locations {
                        format!("{name} - {}", location(entry))
                    } else {
                        name.to_string()
                    }
                })
                .collect();
            Value::Text(lines.join("<br />"))
        } else {
            let mut parts: Vec<String> = Vec::new();
            for (name, entry) in &names {
                parts.push(name.to_string());
                if show_locations {
                    parts.push(location(entry));
                }
            }
            Value::Text(parts.join(delim))
        }
    }

    /// Registers the hook fired whenever the set of callable names
    /// changes. The syntax highlighter owns recomputation.
    pub fn set_syntax_invalidation_hook(&mut self, hook: Box<dyn Fn()>) {
        self.syntax_hook = Some(hook);
    }

    fn invalidate_syntax(&self) {
        if let Some(hook) = &self.syntax_hook {
            hook();
        }
    }
}
