//! Managed binding model: assembly → namespaces → types → members.

use serde::{Deserialize, Serialize};

use crate::interop::InteropSignature;
use crate::layout::Alignment;
use crate::marshal::MarshallingProfile;
use crate::tag::{ParamPassing, Visibility};

// ═══════════════════════════════════════════════════════════════════════════════
// TYPES
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrimitiveType {
    Void,
    Bool,
    I8,
    U8,
    I16,
    U16,
    I32,
    U32,
    I64,
    U64,
    F32,
    F64,
    Char16,
    ISize,
    USize,
    Pointer,
    Guid,
}

impl PrimitiveType {
    pub fn size(self, pointer_size: u32) -> u32 {
        match self {
            PrimitiveType::Void => 0,
            PrimitiveType::Bool | PrimitiveType::I8 | PrimitiveType::U8 => 1,
            PrimitiveType::I16 | PrimitiveType::U16 | PrimitiveType::Char16 => 2,
            PrimitiveType::I32 | PrimitiveType::U32 | PrimitiveType::F32 => 4,
            PrimitiveType::I64 | PrimitiveType::U64 | PrimitiveType::F64 => 8,
            PrimitiveType::ISize | PrimitiveType::USize | PrimitiveType::Pointer => pointer_size,
            PrimitiveType::Guid => 16,
        }
    }

    pub fn alignment(self, pointer_size: u32) -> u32 {
        match self {
            PrimitiveType::Guid => 4,
            PrimitiveType::Void => 1,
            other => other.size(pointer_size),
        }
    }

    pub fn is_integer(self) -> bool {
        matches!(
            self,
            PrimitiveType::I8
                | PrimitiveType::U8
                | PrimitiveType::I16
                | PrimitiveType::U16
                | PrimitiveType::I32
                | PrimitiveType::U32
                | PrimitiveType::I64
                | PrimitiveType::U64
                | PrimitiveType::ISize
                | PrimitiveType::USize
        )
    }

    pub fn is_pointer_sized(self) -> bool {
        matches!(
            self,
            PrimitiveType::ISize | PrimitiveType::USize | PrimitiveType::Pointer
        )
    }

    /// Neutral spelling accepted in type-name overrides.
    pub fn target_name(self) -> &'static str {
        match self {
            PrimitiveType::Void => "void",
            PrimitiveType::Bool => "bool",
            PrimitiveType::I8 => "i8",
            PrimitiveType::U8 => "u8",
            PrimitiveType::I16 => "i16",
            PrimitiveType::U16 => "u16",
            PrimitiveType::I32 => "i32",
            PrimitiveType::U32 => "u32",
            PrimitiveType::I64 => "i64",
            PrimitiveType::U64 => "u64",
            PrimitiveType::F32 => "f32",
            PrimitiveType::F64 => "f64",
            PrimitiveType::Char16 => "char16",
            PrimitiveType::ISize => "isize",
            PrimitiveType::USize => "usize",
            PrimitiveType::Pointer => "pointer",
            PrimitiveType::Guid => "guid",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum TargetType {
    Void,
    Primitive {
        primitive: PrimitiveType,
    },
    String {
        wide: bool,
    },
    Struct {
        name: String,
        native: String,
    },
    Enum {
        name: String,
        native: String,
        underlying: PrimitiveType,
    },
    Interface {
        name: String,
        native: String,
    },
}

impl TargetType {
    pub fn primitive(primitive: PrimitiveType) -> Self {
        if primitive == PrimitiveType::Void {
            TargetType::Void
        } else {
            TargetType::Primitive { primitive }
        }
    }

    pub fn is_void(&self) -> bool {
        matches!(self, TargetType::Void)
    }

    pub fn is_interface(&self) -> bool {
        matches!(self, TargetType::Interface { .. })
    }

    /// Values copied across the boundary (as opposed to handles and strings).
    pub fn is_value_type(&self) -> bool {
        matches!(
            self,
            TargetType::Primitive { .. } | TargetType::Struct { .. } | TargetType::Enum { .. }
        )
    }

    pub fn display_name(&self) -> String {
        match self {
            TargetType::Void => "void".to_string(),
            TargetType::Primitive { primitive } => primitive.target_name().to_string(),
            TargetType::String { wide: true } => "wstring".to_string(),
            TargetType::String { wide: false } => "string".to_string(),
            TargetType::Struct { name, .. }
            | TargetType::Enum { name, .. }
            | TargetType::Interface { name, .. } => name.clone(),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// DECLARATIONS
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TargetKind {
    Namespace,
    Class,
    Interface,
    Struct,
    Enum,
    EnumItem,
    Method,
    Property,
    Parameter,
    Field,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StructInfo {
    pub has_native_shadow: bool,
    pub custom_marshal: bool,
    pub custom_new: bool,
    pub size: u32,
    pub alignment: Alignment,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassInfo {
    pub is_static: bool,
    /// Present when the class is a struct projected to a reference type.
    pub layout: Option<StructInfo>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnumInfo {
    pub underlying: PrimitiveType,
    pub is_flags: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnumItemInfo {
    pub value: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DispatchTables {
    pub managed_to_native: bool,
    pub native_to_managed: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InterfaceInfo {
    pub base: Option<String>,
    pub is_callback: bool,
    pub is_dual_callback: bool,
    pub dispatch: DispatchTables,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValueInfo {
    pub ty: TargetType,
    pub pointer_depth: u32,
    pub array_dimension: Option<u32>,
    pub passing: Option<ParamPassing>,
    pub is_optional: bool,
    pub is_return_value: bool,
    /// Byte offset inside the native struct, for fields.
    pub offset: Option<u32>,
    pub marshalling: MarshallingProfile,
    /// Literal value, for constants built from defines.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub constant_value: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MethodInfo {
    pub returns: ValueInfo,
    pub is_static: bool,
    pub vtable_slot: Option<u32>,
    pub dll_name: Option<String>,
    /// Parameter promoted to the managed return value.
    pub return_param: Option<String>,
    /// Method this overload forwards to.
    pub overload_of: Option<String>,
    pub signature: InteropSignature,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyInfo {
    pub ty: TargetType,
    pub getter: Option<String>,
    pub setter: Option<String>,
    pub persist: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum TargetItem {
    Namespace,
    Class(ClassInfo),
    Interface(InterfaceInfo),
    Struct(StructInfo),
    Enum(EnumInfo),
    EnumItem(EnumItemInfo),
    Method(MethodInfo),
    Property(PropertyInfo),
    Parameter(ValueInfo),
    Field(ValueInfo),
}

impl TargetItem {
    pub fn kind(&self) -> TargetKind {
        match self {
            TargetItem::Namespace => TargetKind::Namespace,
            TargetItem::Class(_) => TargetKind::Class,
            TargetItem::Interface(_) => TargetKind::Interface,
            TargetItem::Struct(_) => TargetKind::Struct,
            TargetItem::Enum(_) => TargetKind::Enum,
            TargetItem::EnumItem(_) => TargetKind::EnumItem,
            TargetItem::Method(_) => TargetKind::Method,
            TargetItem::Property(_) => TargetKind::Property,
            TargetItem::Parameter(_) => TargetKind::Parameter,
            TargetItem::Field(_) => TargetKind::Field,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetDeclaration {
    pub name: String,
    pub qualified_name: String,
    pub visibility: Visibility,
    /// Native path this node was built from.
    pub source: Option<String>,
    pub doc: Option<String>,
    #[serde(flatten)]
    pub item: TargetItem,
    pub children: Vec<TargetDeclaration>,
}

impl TargetDeclaration {
    pub fn new(name: &str, qualified_name: &str, item: TargetItem) -> Self {
        TargetDeclaration {
            name: name.to_string(),
            qualified_name: qualified_name.to_string(),
            visibility: Visibility::Public,
            source: None,
            doc: None,
            item,
            children: Vec::new(),
        }
    }

    pub fn kind(&self) -> TargetKind {
        self.item.kind()
    }

    pub fn child(&self, name: &str) -> Option<&TargetDeclaration> {
        self.children.iter().find(|c| c.name == name)
    }

    pub fn children_of(&self, kind: TargetKind) -> impl Iterator<Item = &TargetDeclaration> {
        self.children.iter().filter(move |c| c.kind() == kind)
    }

    pub fn value(&self) -> Option<&ValueInfo> {
        match &self.item {
            TargetItem::Parameter(info) | TargetItem::Field(info) => Some(info),
            _ => None,
        }
    }

    pub fn method(&self) -> Option<&MethodInfo> {
        match &self.item {
            TargetItem::Method(info) => Some(info),
            _ => None,
        }
    }

    pub fn walk<'a>(&'a self, visit: &mut dyn FnMut(&'a TargetDeclaration)) {
        visit(self);
        for child in &self.children {
            child.walk(visit);
        }
    }

    pub fn find(&self, qualified_name: &str) -> Option<&TargetDeclaration> {
        if self.qualified_name == qualified_name {
            return Some(self);
        }
        self.children.iter().find_map(|c| c.find(qualified_name))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetAssembly {
    pub name: String,
    pub namespaces: Vec<TargetDeclaration>,
}

impl TargetAssembly {
    pub fn namespace(&self, name: &str) -> Option<&TargetDeclaration> {
        self.namespaces.iter().find(|ns| ns.qualified_name == name)
    }

    pub fn find(&self, qualified_name: &str) -> Option<&TargetDeclaration> {
        self.namespaces.iter().find_map(|ns| ns.find(qualified_name))
    }

    pub fn walk<'a>(&'a self, visit: &mut dyn FnMut(&'a TargetDeclaration)) {
        for ns in &self.namespaces {
            ns.walk(visit);
        }
    }
}
