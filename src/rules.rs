//! Mapping rules and their path patterns.
//!
//! A pattern is split on `::`. A segment made only of identifier characters,
//! `*` and `?` is a wildcard segment: literals are escaped, `*` becomes `.*`
//! and `?` becomes `.`. Any other segment is taken as a regular expression,
//! which is how capture groups such as `Ns::(.*)` are written. The joined
//! expression is anchored at both ends.

use lazy_static::lazy_static;
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};

use crate::error::{BindError, Result};
use crate::native::{DeclKind, PATH_SEPARATOR};
use crate::tag::Tag;

lazy_static! {
    static ref WILDCARD_SEGMENT: Regex = Regex::new(r"^[A-Za-z0-9_~*?]*$").unwrap();
    static ref CAPTURE_MARKER: Regex = Regex::new(r"\$(\d+|\{\w+\})").unwrap();
    static ref BARE_GROUP: Regex = Regex::new(r"\$\$|\$(\d+)").unwrap();
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MappingRule {
    /// Kind of declaration the rule applies to.
    pub target: DeclKind,
    pub pattern: String,
    #[serde(flatten)]
    pub overrides: Tag,
}

impl MappingRule {
    pub fn new(target: DeclKind, pattern: &str, overrides: Tag) -> Self {
        MappingRule {
            target,
            pattern: pattern.to_string(),
            overrides,
        }
    }

    /// Member rules without a `::` are relative to the current outer scope.
    pub fn is_unqualified_member(&self) -> bool {
        matches!(self.target, DeclKind::Parameter | DeclKind::Field)
            && !self.pattern.contains(PATH_SEPARATOR)
    }

    /// Struct and method rules open a new outer scope.
    pub fn opens_scope(&self) -> bool {
        match self.target {
            DeclKind::Method | DeclKind::Struct => true,
            DeclKind::Parameter
            | DeclKind::Field
            | DeclKind::Enum
            | DeclKind::EnumItem
            | DeclKind::Interface
            | DeclKind::Define
            | DeclKind::Type => false,
        }
    }
}

/// Translates a rule pattern into unanchored regex source.
pub fn translate_pattern(pattern: &str) -> String {
    pattern
        .split(PATH_SEPARATOR)
        .map(translate_segment)
        .collect::<Vec<_>>()
        .join(PATH_SEPARATOR)
}

fn translate_segment(segment: &str) -> String {
    if !WILDCARD_SEGMENT.is_match(segment) {
        return segment.to_string();
    }
    let mut out = String::with_capacity(segment.len() + 4);
    for ch in segment.chars() {
        match ch {
            '*' => out.push_str(".*"),
            '?' => out.push('.'),
            other => out.push_str(&regex::escape(&other.to_string())),
        }
    }
    out
}

/// A rule pattern compiled to an anchored expression.
#[derive(Debug, Clone)]
pub struct CompiledPattern {
    source: String,
    regex: Regex,
}

impl CompiledPattern {
    /// Compiles already-translated regex source.
    pub fn from_source(source: String, rule_index: usize, pattern: &str) -> Result<Self> {
        let regex = Regex::new(&format!("^(?:{})$", source)).map_err(|e| {
            BindError::RulePattern {
                index: rule_index,
                pattern: pattern.to_string(),
                source: e,
            }
        })?;
        Ok(CompiledPattern { source, regex })
    }

    pub fn compile(pattern: &str, rule_index: usize) -> Result<Self> {
        Self::from_source(translate_pattern(pattern), rule_index, pattern)
    }

    /// Unanchored regex source, used to qualify member rules.
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn is_match(&self, path: &str) -> bool {
        self.regex.is_match(path)
    }

    /// Evaluates `replacement` against `path`. Strings without capture markers
    /// are literal.
    pub fn substitute(&self, path: &str, replacement: &str) -> String {
        if !has_capture_marker(replacement) {
            return replacement.to_string();
        }
        self.regex
            .replace(path, &*braced_groups(replacement))
            .into_owned()
    }
}

pub fn has_capture_marker(value: &str) -> bool {
    CAPTURE_MARKER.is_match(value)
}

/// Rewrites `$1` as `${1}` so a group number followed by identifier
/// characters (`$1Desc`) is not read as a named group.
fn braced_groups(replacement: &str) -> std::borrow::Cow<'_, str> {
    BARE_GROUP.replace_all(replacement, |caps: &Captures| match caps.get(1) {
        Some(group) => format!("${{{}}}", group.as_str()),
        None => "$$".to_string(),
    })
}
