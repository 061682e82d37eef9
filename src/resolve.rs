//! Tag resolution: applies mapping rules, in order, to a native module.
//!
//! ## Invariants
//!
//! 1. **Order**: rules apply strictly in declared order and never in parallel.
//!    A later rule overwrites the fields an earlier rule set on the same
//!    declaration.
//! 2. **Scope**: a struct or method rule becomes the outer scope. Field and
//!    parameter rules without `::` are prefixed with that scope. The scope
//!    lives in a [`RuleContext`] owned by one `resolve` call.
//! 3. **Isolation**: a rule that fails to compile is skipped and reported;
//!    it leaves no trace on the module.
//! 4. **Type shape**: pointer and array overrides are written through to the
//!    declaration's type reference as well as its tag.

use crate::diagnostics::{Diagnostic, DiagnosticList, Severity, WARN_SCOPE, WARN_UNUSED_RULE};
use crate::error::BindError;
use crate::native::{NativeDeclaration, NativeModule, PATH_SEPARATOR};
use crate::options::GeneratorOptions;
use crate::rules::{translate_pattern, CompiledPattern, MappingRule};
use crate::tag::{merge, Tag};

// ═══════════════════════════════════════════════════════════════════════════════
// RULE CONTEXT
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Eq)]
enum OuterScope {
    Unset,
    Scoped(String),
    /// The most recent scope-opening rule did not compile.
    Broken { rule_index: usize },
}

#[derive(Debug)]
enum RuleFailure {
    Pattern(BindError),
    Scope(Diagnostic),
}

/// Scratch state threaded through one resolution pass.
#[derive(Debug, Clone)]
pub struct RuleContext {
    outer_scope: OuterScope,
}

impl Default for RuleContext {
    fn default() -> Self {
        RuleContext {
            outer_scope: OuterScope::Unset,
        }
    }
}

impl RuleContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Regex source of the current outer scope.
    pub fn outer_scope(&self) -> Option<&str> {
        match &self.outer_scope {
            OuterScope::Scoped(scope) => Some(scope),
            OuterScope::Unset | OuterScope::Broken { .. } => None,
        }
    }

    fn enter(&mut self, scope: &str) {
        self.outer_scope = OuterScope::Scoped(scope.to_string());
    }

    fn break_scope(&mut self, rule_index: usize) {
        self.outer_scope = OuterScope::Broken { rule_index };
    }

    fn compile(
        &self,
        rule: &MappingRule,
        index: usize,
    ) -> std::result::Result<CompiledPattern, RuleFailure> {
        if !rule.is_unqualified_member() {
            return CompiledPattern::compile(&rule.pattern, index).map_err(RuleFailure::Pattern);
        }

        match &self.outer_scope {
            OuterScope::Scoped(scope) => {
                let source = format!(
                    "(?:{}){}{}",
                    scope,
                    PATH_SEPARATOR,
                    translate_pattern(&rule.pattern)
                );
                CompiledPattern::from_source(source, index, &rule.pattern)
                    .map_err(RuleFailure::Pattern)
            }
            OuterScope::Unset => Err(RuleFailure::Scope(
                Diagnostic::warning(
                    WARN_SCOPE,
                    &format!(
                        "member rule #{} '{}' has no preceding struct or method rule",
                        index, rule.pattern
                    ),
                )
                .at_rule(index)
                .hint("Qualify the pattern with '::' or move it after its struct/method rule."),
            )),
            OuterScope::Broken { rule_index } => Err(RuleFailure::Scope(
                Diagnostic::warning(
                    WARN_SCOPE,
                    &format!(
                        "member rule #{} '{}' is scoped by rule #{} which failed to compile",
                        index, rule.pattern, rule_index
                    ),
                )
                .at_rule(index),
            )),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// RESOLUTION
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleOutcome {
    pub index: usize,
    /// Fully-qualified pattern the rule was matched with.
    pub effective_pattern: Option<String>,
    pub matches: usize,
}

impl RuleOutcome {
    pub fn applied(&self) -> bool {
        self.effective_pattern.is_some()
    }
}

/// A native module whose tags are final.
#[derive(Debug, Clone)]
pub struct TaggedModule {
    module: NativeModule,
    pub diagnostics: DiagnosticList,
    pub outcomes: Vec<RuleOutcome>,
}

impl TaggedModule {
    pub fn module(&self) -> &NativeModule {
        &self.module
    }

    pub fn into_module(self) -> NativeModule {
        self.module
    }
}

pub fn resolve(
    rules: &[MappingRule],
    mut module: NativeModule,
    options: &GeneratorOptions,
) -> TaggedModule {
    let mut ctx = RuleContext::new();
    let mut diagnostics = DiagnosticList::new();
    let mut outcomes = Vec::with_capacity(rules.len());

    for (index, rule) in rules.iter().enumerate() {
        let compiled = match ctx.compile(rule, index) {
            Ok(compiled) => compiled,
            Err(failure) => {
                match failure {
                    RuleFailure::Pattern(err) => diagnostics.push(Diagnostic::from(&err)),
                    RuleFailure::Scope(diagnostic) => diagnostics.push(diagnostic),
                }
                if rule.opens_scope() {
                    ctx.break_scope(index);
                }
                outcomes.push(RuleOutcome {
                    index,
                    effective_pattern: None,
                    matches: 0,
                });
                continue;
            }
        };

        if rule.opens_scope() {
            ctx.enter(compiled.source());
        }

        let matches = apply_rule(rule, &compiled, &mut module);
        log::debug!(
            "[bindgen] rule #{} {:?} '{}' matched {} declaration(s)",
            index,
            rule.target,
            compiled.source(),
            matches
        );

        if matches == 0 && options.report_unused_rules {
            diagnostics.push(
                Diagnostic::with_details(
                    WARN_UNUSED_RULE,
                    Severity::Warning,
                    &format!("rule #{} '{}' did not match any declaration", index, rule.pattern),
                    None,
                    Some(index),
                    vec![],
                ),
            );
        }

        outcomes.push(RuleOutcome {
            index,
            effective_pattern: Some(compiled.source().to_string()),
            matches,
        });
    }

    log::info!(
        "[bindgen] resolved {} rule(s) against module '{}'",
        rules.len(),
        module.name
    );

    TaggedModule {
        module,
        diagnostics,
        outcomes,
    }
}

fn apply_rule(rule: &MappingRule, compiled: &CompiledPattern, module: &mut NativeModule) -> usize {
    let mut matches = 0;
    module.walk_mut(&mut |decl| {
        if decl.kind != rule.target || !compiled.is_match(&decl.path) {
            return;
        }
        let over = substitute_overrides(&rule.overrides, compiled, &decl.path);
        apply_tag(decl, &over);
        matches += 1;
    });
    matches
}

fn substitute_overrides(overrides: &Tag, compiled: &CompiledPattern, path: &str) -> Tag {
    let mut over = overrides.clone();
    if let Some(rename) = &overrides.rename {
        over.rename = Some(compiled.substitute(path, rename));
    }
    if let Some(type_name) = &overrides.type_name {
        over.type_name = Some(compiled.substitute(path, type_name));
    }
    over
}

fn apply_tag(decl: &mut NativeDeclaration, over: &Tag) {
    let merged = merge(&decl.tag(), over);
    decl.tag = Some(merged);

    if let Some(ty) = decl.declared_type.as_mut() {
        if let Some(depth) = over.pointer_depth {
            ty.pointer_depth = depth;
        }
        if let Some(dimension) = over.array_dimension {
            ty.array_dimension = if dimension == 0 { None } else { Some(dimension) };
        }
    }
}
