//! Native declaration tree, as produced by the header parser.

use serde::{Deserialize, Serialize};

use crate::tag::Tag;

pub const PATH_SEPARATOR: &str = "::";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DeclKind {
    Method,
    Struct,
    Parameter,
    Field,
    Enum,
    EnumItem,
    Interface,
    Define,
    Type,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypeRef {
    pub name: String,
    #[serde(default)]
    pub pointer_depth: u32,
    #[serde(default)]
    pub array_dimension: Option<u32>,
    #[serde(default)]
    pub is_const: bool,
}

impl TypeRef {
    pub fn named(name: &str) -> Self {
        TypeRef {
            name: name.to_string(),
            ..TypeRef::default()
        }
    }

    pub fn pointer(name: &str, depth: u32) -> Self {
        TypeRef {
            name: name.to_string(),
            pointer_depth: depth,
            ..TypeRef::default()
        }
    }

    pub fn is_array(&self) -> bool {
        self.array_dimension.map_or(false, |d| d > 0)
    }

    pub fn is_void(&self) -> bool {
        self.name == "void" && self.pointer_depth == 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ParamDirection {
    #[default]
    In,
    Out,
    InOut,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ParamAttributes {
    pub direction: ParamDirection,
    pub optional: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NativeDeclaration {
    /// Declared name. Methods may carry a C++ qualified name such as `IFoo::Bar`.
    pub name: String,
    /// Fully-qualified, `::`-separated path.
    pub path: String,
    pub kind: DeclKind,
    /// Field/parameter type, method return, enum underlying type or typedef target.
    #[serde(default)]
    pub declared_type: Option<TypeRef>,
    #[serde(default)]
    pub tag: Option<Tag>,
    #[serde(default)]
    pub attributes: ParamAttributes,
    /// Base interface name for interfaces.
    #[serde(default)]
    pub base: Option<String>,
    /// Enum item value or define body.
    #[serde(default)]
    pub value: Option<String>,
    #[serde(default)]
    pub children: Vec<NativeDeclaration>,
}

impl NativeDeclaration {
    pub fn new(kind: DeclKind, parent_path: Option<&str>, name: &str) -> Self {
        let path = match parent_path {
            Some(parent) if !parent.is_empty() => format!("{}{}{}", parent, PATH_SEPARATOR, name),
            _ => name.to_string(),
        };
        NativeDeclaration {
            name: name.to_string(),
            path,
            kind,
            declared_type: None,
            tag: None,
            attributes: ParamAttributes::default(),
            base: None,
            value: None,
            children: Vec::new(),
        }
    }

    pub fn with_type(mut self, ty: TypeRef) -> Self {
        self.declared_type = Some(ty);
        self
    }

    pub fn with_attributes(mut self, attributes: ParamAttributes) -> Self {
        self.attributes = attributes;
        self
    }

    pub fn with_base(mut self, base: &str) -> Self {
        self.base = Some(base.to_string());
        self
    }

    pub fn with_value(mut self, value: &str) -> Self {
        self.value = Some(value.to_string());
        self
    }

    /// Adds a child, re-rooting its path under this declaration.
    pub fn with_child(mut self, mut child: NativeDeclaration) -> Self {
        child.reparent(&self.path);
        self.children.push(child);
        self
    }

    fn reparent(&mut self, parent_path: &str) {
        let short = self
            .path
            .rsplit(PATH_SEPARATOR)
            .next()
            .unwrap_or(&self.path)
            .to_string();
        self.path = format!("{}{}{}", parent_path, PATH_SEPARATOR, short);
        let path = self.path.clone();
        for child in &mut self.children {
            child.reparent(&path);
        }
    }

    /// Last segment of the declared name.
    pub fn short_name(&self) -> &str {
        self.name.rsplit(PATH_SEPARATOR).next().unwrap_or(&self.name)
    }

    /// Path of the enclosing scope, empty at module level.
    pub fn scope_path(&self) -> &str {
        match self.path.rfind(PATH_SEPARATOR) {
            Some(idx) => &self.path[..idx],
            None => "",
        }
    }

    pub fn tag(&self) -> Tag {
        self.tag.clone().unwrap_or_default()
    }

    pub fn walk<'a>(&'a self, visit: &mut dyn FnMut(&'a NativeDeclaration)) {
        visit(self);
        for child in &self.children {
            child.walk(visit);
        }
    }

    pub fn walk_mut(&mut self, visit: &mut dyn FnMut(&mut NativeDeclaration)) {
        visit(self);
        for child in &mut self.children {
            child.walk_mut(visit);
        }
    }
}

/// Root of one native module's declarations.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NativeModule {
    pub name: String,
    pub declarations: Vec<NativeDeclaration>,
}

impl NativeModule {
    pub fn new(name: &str) -> Self {
        NativeModule {
            name: name.to_string(),
            declarations: Vec::new(),
        }
    }

    pub fn with(mut self, declaration: NativeDeclaration) -> Self {
        self.declarations.push(declaration);
        self
    }

    pub fn walk<'a>(&'a self, visit: &mut dyn FnMut(&'a NativeDeclaration)) {
        for declaration in &self.declarations {
            declaration.walk(visit);
        }
    }

    pub fn walk_mut(&mut self, visit: &mut dyn FnMut(&mut NativeDeclaration)) {
        for declaration in &mut self.declarations {
            declaration.walk_mut(visit);
        }
    }

    pub fn find(&self, path: &str) -> Option<&NativeDeclaration> {
        let mut found = None;
        self.walk(&mut |decl| {
            if found.is_none() && decl.path == path {
                found = Some(decl);
            }
        });
        found
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_child_paths_nest_under_owner() {
        let decl = NativeDeclaration::new(DeclKind::Struct, Some("Lib"), "Point").with_child(
            NativeDeclaration::new(DeclKind::Field, None, "X").with_type(TypeRef::named("float")),
        );
        assert_eq!(decl.path, "Lib::Point");
        assert_eq!(decl.children[0].path, "Lib::Point::X");
        assert_eq!(decl.children[0].scope_path(), "Lib::Point");
    }

    #[test]
    fn test_short_name_strips_cpp_qualification() {
        let method = NativeDeclaration::new(DeclKind::Method, Some("Lib::IDevice"), "IDevice::Draw");
        assert_eq!(method.short_name(), "Draw");
    }

    #[test]
    fn test_find_walks_nested_declarations() {
        let module = NativeModule::new("gfx").with(
            NativeDeclaration::new(DeclKind::Interface, Some("Lib"), "IDevice").with_child(
                NativeDeclaration::new(DeclKind::Method, None, "Draw").with_child(
                    NativeDeclaration::new(DeclKind::Parameter, None, "count")
                        .with_type(TypeRef::named("UINT")),
                ),
            ),
        );
        let param = module.find("Lib::IDevice::Draw::count").unwrap();
        assert_eq!(param.kind, DeclKind::Parameter);
        assert!(module.find("Lib::Other").is_none());
    }
}
