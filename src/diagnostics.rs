use serde::{Deserialize, Serialize};

use crate::error::BindError;

// ═══════════════════════════════════════════════════════════════════════════════
// DIAGNOSTIC CODES
// ═══════════════════════════════════════════════════════════════════════════════

pub const ERR_RULE_PATTERN: &str = "BG-ERR-RULE-PATTERN";
pub const ERR_UNRESOLVED_TYPE: &str = "BG-ERR-UNRESOLVED-TYPE";
pub const ERR_LAYOUT_CYCLE: &str = "BG-ERR-LAYOUT-CYCLE";
pub const ERR_LAYOUT_OVERFLOW: &str = "BG-ERR-LAYOUT-OVERFLOW";
pub const ERR_INVALID_INPUT: &str = "BG-ERR-INVALID-INPUT";
pub const WARN_SCOPE: &str = "BG-WARN-SCOPE";
pub const WARN_UNUSED_RULE: &str = "BG-WARN-UNUSED-RULE";

// ═══════════════════════════════════════════════════════════════════════════════
// GUARANTEES
// ═══════════════════════════════════════════════════════════════════════════════

fn get_guarantee(code: &str) -> &'static str {
    match code {
        ERR_RULE_PATTERN => "A rule with an invalid pattern has no effect; every other rule still applies.",
        ERR_UNRESOLVED_TYPE => "Every emitted value has a sound target type.",
        ERR_LAYOUT_CYCLE => "Struct layouts are finite.",
        ERR_LAYOUT_OVERFLOW => "Struct sizes and field offsets fit in 32 bits.",
        ERR_INVALID_INPUT => "Generator input is well-formed.",
        WARN_SCOPE => "Unqualified member rules only match inside the most recently tagged struct or method.",
        WARN_UNUSED_RULE => "Every mapping rule matches at least one declaration.",
        _ => "Unknown diagnostic.",
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

// ═══════════════════════════════════════════════════════════════════════════════
// DIAGNOSTIC
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Diagnostic {
    pub code: String,
    pub severity: Severity,
    pub message: String,
    pub guarantee: String,
    /// Fully-qualified native path the diagnostic is about.
    pub path: Option<String>,
    /// Position of the offending rule in the rule list.
    pub rule_index: Option<usize>,
    pub hints: Vec<String>,
}

impl Diagnostic {
    pub fn error(code: &str, message: &str) -> Self {
        Self::with_details(code, Severity::Error, message, None, None, vec![])
    }

    pub fn warning(code: &str, message: &str) -> Self {
        Self::with_details(code, Severity::Warning, message, None, None, vec![])
    }

    pub fn with_details(
        code: &str,
        severity: Severity,
        message: &str,
        path: Option<String>,
        rule_index: Option<usize>,
        hints: Vec<String>,
    ) -> Self {
        Diagnostic {
            code: code.to_string(),
            severity,
            message: message.to_string(),
            guarantee: get_guarantee(code).to_string(),
            path,
            rule_index,
            hints,
        }
    }

    pub fn at_path(mut self, path: &str) -> Self {
        self.path = Some(path.to_string());
        self
    }

    pub fn at_rule(mut self, index: usize) -> Self {
        self.rule_index = Some(index);
        self
    }

    pub fn hint(mut self, hint: &str) -> Self {
        self.hints.push(hint.to_string());
        self
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl From<&BindError> for Diagnostic {
    fn from(err: &BindError) -> Self {
        match err {
            BindError::RulePattern { index, source, .. } => {
                Diagnostic::error(ERR_RULE_PATTERN, &err.to_string())
                    .at_rule(*index)
                    .hint(&source.to_string())
            }
            BindError::UnresolvedType { path, .. } => {
                Diagnostic::error(ERR_UNRESOLVED_TYPE, &err.to_string())
                    .at_path(path)
                    .hint("Add a rule with a type override or declare the type in the module.")
            }
            BindError::RecursiveLayout { path } => {
                Diagnostic::error(ERR_LAYOUT_CYCLE, &err.to_string()).at_path(path)
            }
            BindError::LayoutOverflow { path } => {
                Diagnostic::error(ERR_LAYOUT_OVERFLOW, &err.to_string())
                    .at_path(path)
                    .hint("Check the array dimensions of its fields.")
            }
            BindError::InvalidInput(source) => {
                Diagnostic::error(ERR_INVALID_INPUT, &err.to_string()).hint(&source.to_string())
            }
        }
    }
}

impl From<BindError> for Diagnostic {
    fn from(err: BindError) -> Self {
        Diagnostic::from(&err)
    }
}

/// Ordered collection of diagnostics for one generation run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DiagnosticList {
    pub items: Vec<Diagnostic>,
}

impl DiagnosticList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, diagnostic: Diagnostic) {
        match diagnostic.severity {
            Severity::Error => log::warn!(
                "[bindgen] {} {}: {}",
                diagnostic.code,
                diagnostic.path.as_deref().unwrap_or("-"),
                diagnostic.message
            ),
            Severity::Warning => log::debug!(
                "[bindgen] {} {}: {}",
                diagnostic.code,
                diagnostic.path.as_deref().unwrap_or("-"),
                diagnostic.message
            ),
        }
        self.items.push(diagnostic);
    }

    pub fn extend(&mut self, other: DiagnosticList) {
        for diagnostic in other.items {
            self.push(diagnostic);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.items.iter()
    }

    pub fn with_code<'a>(&'a self, code: &'a str) -> impl Iterator<Item = &'a Diagnostic> + 'a {
        self.items.iter().filter(move |d| d.code == code)
    }

    pub fn has_errors(&self) -> bool {
        self.items.iter().any(Diagnostic::is_error)
    }

    /// An unresolved type makes every later emission unsound.
    pub fn has_unresolved_types(&self) -> bool {
        self.with_code(ERR_UNRESOLVED_TYPE).next().is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unresolved_type_carries_path() {
        let err = BindError::UnresolvedType {
            path: "Lib::Point::X".to_string(),
            type_name: "FLOAT3".to_string(),
        };
        let diagnostic = Diagnostic::from(&err);
        assert_eq!(diagnostic.code, ERR_UNRESOLVED_TYPE);
        assert_eq!(diagnostic.path.as_deref(), Some("Lib::Point::X"));
        assert!(diagnostic.message.contains("FLOAT3"));
        assert!(diagnostic.is_error());
    }

    #[test]
    fn test_list_tracks_unresolved_types_only() {
        let mut list = DiagnosticList::new();
        list.push(Diagnostic::warning(WARN_UNUSED_RULE, "unused"));
        assert!(!list.has_errors());
        assert!(!list.has_unresolved_types());

        list.push(Diagnostic::error(ERR_RULE_PATTERN, "bad"));
        assert!(list.has_errors());
        assert!(!list.has_unresolved_types());

        list.push(Diagnostic::error(ERR_UNRESOLVED_TYPE, "missing"));
        assert!(list.has_unresolved_types());
        assert_eq!(list.len(), 3);
    }
}
