//! TableScript – the macro-function runtime of a virtual tabletop client.
//!
//! The crate exposes the dispatch core that sits between the macro line
//! parser and the rest of the client:
//!
//! * [`Value`] – the script language's runtime value representation.
//! * [`Runtime`] – the dispatcher: resolves calls against the function
//!   registry, checks arity and trust, runs native handlers or re-enters
//!   the external line parser for user-defined functions.
//! * [`FunctionRegistry`] – name/alias resolution for native handlers,
//!   user-defined functions, and bulk framework imports.
//! * [`Signal`] – non-local control flow (abort / assert / return)
//!   modelled as unwinding results rather than host exceptions.
//!
//! The expression parser itself, the tokens and zones that native
//! handlers manipulate, and network replication all live elsewhere; this
//! crate only talks to them through the [`LineParser`] trait and the
//! non-owning [`TokenRef`] handle.

pub mod builtins;
pub mod context;
pub mod dispatch;
pub mod error;
pub mod i18n;
pub mod registry;
pub mod scope;
pub mod value;

pub use context::{ContextDescription, MacroContext};
pub use dispatch::{LineParser, Runtime, RuntimeConfig};
pub use error::{Interrupt, ScriptError, ScriptResult, Signal};
pub use registry::{
    ChatMacro, DefinitionState, FunctionDefinition, FunctionEntry, FunctionPackage,
    FunctionRegistry, FunctionSignature, NativeFn, TrustRequirement, UserFunction,
};
pub use scope::{ScopeRef, TokenRef, VariableScope};
pub use value::Value;
