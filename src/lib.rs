//! # Binding Generator Core
//!
//! Turns a parsed native API (structs, enums, interfaces, functions) and an
//! ordered list of mapping rules into a managed binding model, with a
//! marshalling profile for every value and an interop signature for every
//! method.
//!
//! ## Pipeline
//!
//! `NativeModule` + `[MappingRule]` → [`resolve`] → `TaggedModule` →
//! [`build`] → `TargetAssembly` + diagnostics. [`generate`] runs both and
//! collects the signatures.
//!
//! ## Invariants
//!
//! 1. **Rule Order**: rules apply in declared order, last rule wins per tag
//!    field. Rule application is never parallel.
//! 2. **Scope Threading**: the outer scope of unqualified member rules lives
//!    in a `RuleContext` owned by a single `resolve` call. Independent runs
//!    never observe each other.
//! 3. **No Ambient Lookup**: the type registry, options and documentation
//!    provider are passed explicitly to every stage.
//! 4. **Classification Priority**: the marshalling ladder is checked in a
//!    fixed order and the first matching step wins. A profile that matches
//!    more than one outcome is a defect and panics.
//! 5. **Signature Identity**: signature equality and hashing cover the full
//!    ABI key (return, ordered params, instance flag, locality).
//! 6. **Failure Reporting**: problems accumulate as coded diagnostics. A run
//!    fails iff a type could not be resolved (any error in strict mode).

pub mod builder;
pub mod diagnostics;
pub mod docs;
pub mod error;
pub mod generate;
pub mod interop;
pub mod layout;
pub mod marshal;
pub mod native;
pub mod options;
pub mod overloads;
pub mod registry;
pub mod resolve;
pub mod rules;
pub mod tag;
pub mod target;

#[cfg(feature = "napi")]
mod bridge;

#[cfg(test)]
mod json_tests;

#[cfg(feature = "napi")]
pub use bridge::generate_bindings_native;

pub use builder::build;
pub use diagnostics::{Diagnostic, DiagnosticList, Severity};
pub use docs::{DocumentationMap, DocumentationProvider};
pub use error::{BindError, Result};
pub use generate::{generate, generate_from_json, GenerationOutput, MethodSignature};
pub use interop::{InteropSignature, PrimitiveKind};
pub use marshal::{classify, MarshalStrategy, MarshallingProfile};
pub use native::{DeclKind, NativeDeclaration, NativeModule, TypeRef};
pub use options::GeneratorOptions;
pub use resolve::{resolve, RuleContext, TaggedModule};
pub use rules::MappingRule;
pub use tag::{merge, ParamPassing, Tag, Visibility};
pub use target::{TargetAssembly, TargetDeclaration, TargetItem, TargetKind};
