//! Convenience overloads that drop trailing optional parameters.
//!
//! An overload is a fresh tree: every child is rebuilt from the original and
//! nothing is shared with it. It keeps the original's interop signature, since
//! it forwards to the same native call with defaults filled in.

use crate::target::{MethodInfo, TargetDeclaration, TargetItem};

/// Deep-copy builder for one method node.
pub struct MethodCopy<'m> {
    original: &'m TargetDeclaration,
    keep_params: Option<usize>,
    overload_of: Option<String>,
}

impl<'m> MethodCopy<'m> {
    pub fn of(original: &'m TargetDeclaration) -> Self {
        MethodCopy {
            original,
            keep_params: None,
            overload_of: None,
        }
    }

    /// Keeps only the first `count` parameters.
    pub fn keep_params(mut self, count: usize) -> Self {
        self.keep_params = Some(count);
        self
    }

    pub fn forwarding_to(mut self, qualified_name: &str) -> Self {
        self.overload_of = Some(qualified_name.to_string());
        self
    }

    pub fn build(self) -> TargetDeclaration {
        let mut params_seen = 0usize;
        let mut children = Vec::with_capacity(self.original.children.len());
        for child in &self.original.children {
            if let TargetItem::Parameter(_) = child.item {
                params_seen += 1;
                if self.keep_params.map_or(false, |keep| params_seen > keep) {
                    continue;
                }
            }
            children.push(rebuild(child));
        }

        let item = match &self.original.item {
            TargetItem::Method(info) => TargetItem::Method(MethodInfo {
                overload_of: self.overload_of.clone().or_else(|| info.overload_of.clone()),
                ..info.clone()
            }),
            other => other.clone(),
        };

        TargetDeclaration {
            name: self.original.name.clone(),
            qualified_name: self.original.qualified_name.clone(),
            visibility: self.original.visibility,
            source: self.original.source.clone(),
            doc: self.original.doc.clone(),
            item,
            children,
        }
    }
}

fn rebuild(node: &TargetDeclaration) -> TargetDeclaration {
    TargetDeclaration {
        name: node.name.clone(),
        qualified_name: node.qualified_name.clone(),
        visibility: node.visibility,
        source: node.source.clone(),
        doc: node.doc.clone(),
        item: node.item.clone(),
        children: node.children.iter().map(rebuild).collect(),
    }
}

/// Number of trailing optional parameters of `method`. A parameter promoted
/// to the return value ends the run.
pub fn trailing_optional_count(method: &TargetDeclaration) -> usize {
    method
        .children
        .iter()
        .filter_map(|c| c.value().filter(|_| matches!(c.item, TargetItem::Parameter(_))))
        .rev()
        .take_while(|value| value.is_optional && !value.is_return_value)
        .count()
}

/// Overload of `method` without its trailing optional parameters, if it has any.
pub fn optional_overload(method: &TargetDeclaration) -> Option<TargetDeclaration> {
    method.method()?;
    let optional = trailing_optional_count(method);
    if optional == 0 {
        return None;
    }
    let total = method
        .children
        .iter()
        .filter(|c| matches!(c.item, TargetItem::Parameter(_)))
        .count();
    Some(
        MethodCopy::of(method)
            .keep_params(total - optional)
            .forwarding_to(&method.qualified_name)
            .build(),
    )
}
