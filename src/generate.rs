//! One generation run: resolve rules, build the model, collect signatures.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::builder::build;
use crate::diagnostics::DiagnosticList;
use crate::docs::DocumentationProvider;
use crate::error::Result;
use crate::interop::InteropSignature;
use crate::native::NativeModule;
use crate::options::GeneratorOptions;
use crate::resolve::{resolve, RuleOutcome};
use crate::rules::MappingRule;
use crate::target::TargetAssembly;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MethodSignature {
    /// Qualified target name of the method.
    pub method: String,
    pub thunk: String,
    pub signature: InteropSignature,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationOutput {
    pub success: bool,
    pub assembly: TargetAssembly,
    pub signatures: Vec<MethodSignature>,
    pub diagnostics: DiagnosticList,
    #[serde(skip)]
    pub rule_outcomes: Vec<RuleOutcome>,
}

impl GenerationOutput {
    /// Number of distinct native-call thunks the signatures need.
    pub fn distinct_signatures(&self) -> usize {
        self.signatures
            .iter()
            .map(|s| &s.signature)
            .collect::<HashSet<_>>()
            .len()
    }

    pub fn signature_of(&self, method: &str) -> Option<&InteropSignature> {
        self.signatures
            .iter()
            .find(|s| s.method == method)
            .map(|s| &s.signature)
    }
}

/// Whether a run with these diagnostics produced a usable model.
pub fn is_success(diagnostics: &DiagnosticList, options: &GeneratorOptions) -> bool {
    if options.strict {
        !diagnostics.has_errors()
    } else {
        !diagnostics.has_unresolved_types()
    }
}

pub fn generate(
    module: NativeModule,
    rules: &[MappingRule],
    options: &GeneratorOptions,
    docs: Option<&dyn DocumentationProvider>,
) -> GenerationOutput {
    let tagged = resolve(rules, module, options);
    let (assembly, build_diagnostics) = build(&tagged, options, docs);

    let mut diagnostics = tagged.diagnostics.clone();
    diagnostics.extend(build_diagnostics);

    // Overloads forward to their original and need no thunk of their own.
    let mut signatures = Vec::new();
    assembly.walk(&mut |node| {
        if let Some(info) = node.method() {
            if info.overload_of.is_none() {
                signatures.push(MethodSignature {
                    method: node.qualified_name.clone(),
                    thunk: info.signature.thunk_name(),
                    signature: info.signature.clone(),
                });
            }
        }
    });

    let success = is_success(&diagnostics, options);
    let output = GenerationOutput {
        success,
        assembly,
        signatures,
        diagnostics,
        rule_outcomes: tagged.outcomes,
    };
    log::info!(
        "[bindgen] generation {}: {} method(s), {} distinct signature(s)",
        if success { "succeeded" } else { "failed" },
        output.signatures.len(),
        output.distinct_signatures()
    );
    output
}

/// Runs a generation from JSON input and returns the JSON report.
/// `options_json` may be empty for defaults.
pub fn generate_from_json(module_json: &str, rules_json: &str, options_json: &str) -> Result<String> {
    let module: NativeModule = serde_json::from_str(module_json)?;
    let rules: Vec<MappingRule> = serde_json::from_str(rules_json)?;
    let options: GeneratorOptions = if options_json.trim().is_empty() {
        GeneratorOptions::default()
    } else {
        serde_json::from_str(options_json)?
    };

    let output = generate(module, &rules, &options, None);
    Ok(serde_json::to_string(&output)?)
}
