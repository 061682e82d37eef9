//! Type registry: resolves native type references to target types.
//!
//! The registry is built once from a tagged module and passed explicitly to
//! every stage that needs cross-references. It knows the native primitive
//! spellings, every struct, enum and interface in the module (by short name
//! and by path) and every typedef.

use lazy_static::lazy_static;
use std::collections::HashMap;

use crate::error::{BindError, Result};
use crate::layout::{Alignment, StructLayout};
use crate::native::{DeclKind, NativeDeclaration, NativeModule, TypeRef, PATH_SEPARATOR};
use crate::options::GeneratorOptions;
use crate::tag::Tag;
use crate::target::{PrimitiveType, TargetType};

lazy_static! {
    /// Native primitive spellings, C and Windows style.
    static ref NATIVE_PRIMITIVES: HashMap<&'static str, PrimitiveType> = {
        let mut m = HashMap::new();
        m.insert("void", PrimitiveType::Void);
        m.insert("VOID", PrimitiveType::Void);
        m.insert("bool", PrimitiveType::Bool);
        m.insert("char", PrimitiveType::I8);
        m.insert("signed char", PrimitiveType::I8);
        m.insert("int8_t", PrimitiveType::I8);
        m.insert("CHAR", PrimitiveType::I8);
        m.insert("unsigned char", PrimitiveType::U8);
        m.insert("uint8_t", PrimitiveType::U8);
        m.insert("BYTE", PrimitiveType::U8);
        m.insert("UINT8", PrimitiveType::U8);
        m.insert("short", PrimitiveType::I16);
        m.insert("int16_t", PrimitiveType::I16);
        m.insert("SHORT", PrimitiveType::I16);
        m.insert("unsigned short", PrimitiveType::U16);
        m.insert("uint16_t", PrimitiveType::U16);
        m.insert("WORD", PrimitiveType::U16);
        m.insert("USHORT", PrimitiveType::U16);
        m.insert("int", PrimitiveType::I32);
        m.insert("long", PrimitiveType::I32);
        m.insert("int32_t", PrimitiveType::I32);
        m.insert("INT", PrimitiveType::I32);
        m.insert("LONG", PrimitiveType::I32);
        m.insert("BOOL", PrimitiveType::I32);
        m.insert("HRESULT", PrimitiveType::I32);
        m.insert("unsigned int", PrimitiveType::U32);
        m.insert("unsigned long", PrimitiveType::U32);
        m.insert("uint32_t", PrimitiveType::U32);
        m.insert("UINT", PrimitiveType::U32);
        m.insert("DWORD", PrimitiveType::U32);
        m.insert("ULONG", PrimitiveType::U32);
        m.insert("UINT32", PrimitiveType::U32);
        m.insert("long long", PrimitiveType::I64);
        m.insert("int64_t", PrimitiveType::I64);
        m.insert("LONGLONG", PrimitiveType::I64);
        m.insert("INT64", PrimitiveType::I64);
        m.insert("unsigned long long", PrimitiveType::U64);
        m.insert("uint64_t", PrimitiveType::U64);
        m.insert("ULONGLONG", PrimitiveType::U64);
        m.insert("UINT64", PrimitiveType::U64);
        m.insert("float", PrimitiveType::F32);
        m.insert("FLOAT", PrimitiveType::F32);
        m.insert("double", PrimitiveType::F64);
        m.insert("DOUBLE", PrimitiveType::F64);
        m.insert("wchar_t", PrimitiveType::Char16);
        m.insert("WCHAR", PrimitiveType::Char16);
        m.insert("size_t", PrimitiveType::USize);
        m.insert("SIZE_T", PrimitiveType::USize);
        m.insert("UINT_PTR", PrimitiveType::USize);
        m.insert("ptrdiff_t", PrimitiveType::ISize);
        m.insert("intptr_t", PrimitiveType::ISize);
        m.insert("INT_PTR", PrimitiveType::ISize);
        m.insert("HANDLE", PrimitiveType::Pointer);
        m.insert("HWND", PrimitiveType::Pointer);
        m.insert("GUID", PrimitiveType::Guid);
        m.insert("IID", PrimitiveType::Guid);
        m
    };

    /// Neutral target spellings accepted by type-name overrides.
    static ref TARGET_PRIMITIVES: HashMap<&'static str, PrimitiveType> = {
        let all = [
            PrimitiveType::Void,
            PrimitiveType::Bool,
            PrimitiveType::I8,
            PrimitiveType::U8,
            PrimitiveType::I16,
            PrimitiveType::U16,
            PrimitiveType::I32,
            PrimitiveType::U32,
            PrimitiveType::I64,
            PrimitiveType::U64,
            PrimitiveType::F32,
            PrimitiveType::F64,
            PrimitiveType::Char16,
            PrimitiveType::ISize,
            PrimitiveType::USize,
            PrimitiveType::Pointer,
            PrimitiveType::Guid,
        ];
        all.iter().map(|p| (p.target_name(), *p)).collect()
    };
}

const MAX_ALIAS_DEPTH: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StringEncoding {
    Ansi,
    Wide,
}

/// Structural result of resolving one type reference.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedType {
    pub ty: TargetType,
    /// Indirection left after strings and interface handles absorb theirs.
    pub pointer_depth: u32,
    pub array_dimension: Option<u32>,
    /// Native integer carried under a `bool` projection.
    pub bool_as_int: Option<PrimitiveType>,
}

impl ResolvedType {
    fn plain(ty: TargetType, pointer_depth: u32, array_dimension: Option<u32>) -> Self {
        ResolvedType {
            ty,
            pointer_depth,
            array_dimension,
            bool_as_int: None,
        }
    }

    pub fn is_array(&self) -> bool {
        self.array_dimension.map_or(false, |d| d > 0)
    }

    pub fn string_encoding(&self) -> Option<StringEncoding> {
        match self.ty {
            TargetType::String { wide: true } => Some(StringEncoding::Wide),
            TargetType::String { wide: false } => Some(StringEncoding::Ansi),
            _ => None,
        }
    }
}

/// Size facts of one resolved value, as it sits in native memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValueFacts {
    pub size: u32,
    pub alignment: Alignment,
    pub needs_shadow: bool,
}

#[derive(Debug, Clone)]
struct NamedType<'a> {
    decl: &'a NativeDeclaration,
    qualified_name: String,
}

pub struct TypeRegistry<'a> {
    options: &'a GeneratorOptions,
    module_name: String,
    named: HashMap<String, NamedType<'a>>,
    /// Types tagged `hidden`: never emitted, so never a resolution target.
    hidden: HashMap<String, &'a NativeDeclaration>,
    by_target_name: HashMap<String, String>,
    aliases: HashMap<String, &'a TypeRef>,
    layouts: HashMap<String, StructLayout>,
}

impl<'a> TypeRegistry<'a> {
    pub fn index(module: &'a NativeModule, options: &'a GeneratorOptions) -> Self {
        let mut registry = TypeRegistry {
            options,
            module_name: module.name.clone(),
            named: HashMap::new(),
            hidden: HashMap::new(),
            by_target_name: HashMap::new(),
            aliases: HashMap::new(),
            layouts: HashMap::new(),
        };

        module.walk(&mut |decl| match decl.kind {
            DeclKind::Struct | DeclKind::Enum | DeclKind::Interface if decl.tag().is_hidden() => {
                registry
                    .hidden
                    .entry(decl.short_name().to_string())
                    .or_insert(decl);
                registry.hidden.insert(decl.path.clone(), decl);
            }
            DeclKind::Struct | DeclKind::Enum | DeclKind::Interface => {
                let qualified_name = registry.qualified_name(decl);
                registry
                    .by_target_name
                    .insert(qualified_name.clone(), decl.path.clone());
                let entry = NamedType {
                    decl,
                    qualified_name,
                };
                registry
                    .named
                    .entry(decl.short_name().to_string())
                    .or_insert_with(|| entry.clone());
                registry.named.insert(decl.path.clone(), entry);
            }
            DeclKind::Type => {
                if let Some(target) = &decl.declared_type {
                    registry.aliases.insert(decl.short_name().to_string(), target);
                    registry.aliases.insert(decl.path.clone(), target);
                }
            }
            DeclKind::Method
            | DeclKind::Parameter
            | DeclKind::Field
            | DeclKind::EnumItem
            | DeclKind::Define => {}
        });

        registry
    }

    pub fn options(&self) -> &GeneratorOptions {
        self.options
    }

    // ───────────────────────────────────────────────────────────────────────────
    // Naming
    // ───────────────────────────────────────────────────────────────────────────

    /// Final declared name: the rename override or the last name segment.
    pub fn target_name(decl: &NativeDeclaration) -> String {
        match &decl.tag {
            Some(Tag {
                rename: Some(rename),
                ..
            }) => rename.clone(),
            _ => decl.short_name().to_string(),
        }
    }

    /// Target namespace of a module-level declaration.
    pub fn namespace_of(&self, decl: &NativeDeclaration) -> String {
        if let Some(ns) = decl.tag.as_ref().and_then(|t| t.namespace.clone()) {
            return ns;
        }
        let scope = decl.scope_path();
        if scope.is_empty() {
            self.module_name.clone()
        } else {
            scope.replace(PATH_SEPARATOR, ".")
        }
    }

    pub fn qualified_name(&self, decl: &NativeDeclaration) -> String {
        format!("{}.{}", self.namespace_of(decl), Self::target_name(decl))
    }

    pub fn lookup(&self, name: &str) -> Option<&'a NativeDeclaration> {
        self.named.get(name).map(|n| n.decl).or_else(|| {
            self.by_target_name
                .get(name)
                .and_then(|path| self.named.get(path))
                .map(|n| n.decl)
        })
    }

    /// Like [`TypeRegistry::lookup`], but also finds hidden types. Only for
    /// facts that do not emit a reference, such as vtable slot counts.
    pub fn lookup_declared(&self, name: &str) -> Option<&'a NativeDeclaration> {
        self.lookup(name).or_else(|| self.hidden.get(name).copied())
    }

    /// Qualified target name of a registered native type.
    pub fn qualified_name_of(&self, name: &str) -> Option<&str> {
        if let Some(entry) = self.named.get(name) {
            return Some(&entry.qualified_name);
        }
        self.by_target_name
            .get(name)
            .and_then(|path| self.named.get(path))
            .map(|n| n.qualified_name.as_str())
    }

    // ───────────────────────────────────────────────────────────────────────────
    // Resolution
    // ───────────────────────────────────────────────────────────────────────────

    /// Resolves the type of `decl` (`declared_type`, refined by its tag).
    pub fn resolve_decl(&self, decl: &NativeDeclaration) -> Result<ResolvedType> {
        let ty = decl
            .declared_type
            .clone()
            .unwrap_or_else(|| TypeRef::named("void"));
        self.resolve(&decl.path, &ty, decl.tag.as_ref())
    }

    /// With a type-name override the native name only has to be known when
    /// it contributes something (a bool projection or typedef indirection);
    /// otherwise the declared pointer and array shape is kept as written.
    pub fn resolve(&self, path: &str, ty: &TypeRef, tag: Option<&Tag>) -> Result<ResolvedType> {
        let native = self.resolve_native(path, ty);
        match tag.and_then(|t| t.type_name.as_deref()) {
            Some(override_name) => {
                let shape = native.unwrap_or_else(|_| {
                    ResolvedType::plain(
                        TargetType::Void,
                        ty.pointer_depth,
                        ty.array_dimension.filter(|d| *d > 0),
                    )
                });
                self.apply_override(path, shape, override_name)
            }
            None => native,
        }
    }

    fn apply_override(
        &self,
        path: &str,
        native: ResolvedType,
        override_name: &str,
    ) -> Result<ResolvedType> {
        match override_name {
            "string" | "wstring" => {
                return Ok(ResolvedType::plain(
                    TargetType::String {
                        wide: override_name == "wstring",
                    },
                    native.pointer_depth.saturating_sub(1),
                    native.array_dimension,
                ));
            }
            _ => {}
        }

        if let Some(primitive) = TARGET_PRIMITIVES.get(override_name).copied() {
            let carried = match &native.ty {
                TargetType::Primitive { primitive } => Some(*primitive),
                TargetType::Enum { underlying, .. } => Some(*underlying),
                _ => None,
            };
            let bool_as_int = match carried {
                Some(int) if primitive == PrimitiveType::Bool && int.is_integer() => Some(int),
                _ => None,
            };
            return Ok(ResolvedType {
                ty: TargetType::primitive(primitive),
                pointer_depth: native.pointer_depth,
                array_dimension: native.array_dimension,
                bool_as_int,
            });
        }

        if self.lookup(override_name).is_some() {
            let retargeted = TypeRef {
                name: override_name.to_string(),
                pointer_depth: native.pointer_depth,
                array_dimension: native.array_dimension,
                is_const: false,
            };
            return self.resolve_native(path, &retargeted);
        }

        Err(BindError::UnresolvedType {
            path: path.to_string(),
            type_name: override_name.to_string(),
        })
    }

    fn resolve_native(&self, path: &str, ty: &TypeRef) -> Result<ResolvedType> {
        let mut name = ty.name.clone();
        let mut pointer_depth = ty.pointer_depth;
        let mut array_dimension = ty.array_dimension.filter(|d| *d > 0);
        let mut hops = 0;

        loop {
            if NATIVE_PRIMITIVES.contains_key(name.as_str()) || self.named.contains_key(&name) {
                break;
            }
            let alias = match self.aliases.get(&name) {
                Some(alias) if hops < MAX_ALIAS_DEPTH => *alias,
                _ => {
                    return Err(BindError::UnresolvedType {
                        path: path.to_string(),
                        type_name: ty.name.clone(),
                    })
                }
            };
            hops += 1;
            name = alias.name.clone();
            pointer_depth += alias.pointer_depth;
            if array_dimension.is_none() {
                array_dimension = alias.array_dimension.filter(|d| *d > 0);
            }
        }

        if let Some(primitive) = NATIVE_PRIMITIVES.get(name.as_str()).copied() {
            let resolved = match primitive {
                PrimitiveType::I8 | PrimitiveType::Char16
                    if pointer_depth >= 1 && name_is_character(&name) =>
                {
                    ResolvedType::plain(
                        TargetType::String {
                            wide: primitive == PrimitiveType::Char16,
                        },
                        pointer_depth - 1,
                        array_dimension,
                    )
                }
                PrimitiveType::Void if pointer_depth >= 1 => ResolvedType::plain(
                    TargetType::primitive(PrimitiveType::Pointer),
                    pointer_depth - 1,
                    array_dimension,
                ),
                other => ResolvedType::plain(
                    TargetType::primitive(other),
                    pointer_depth,
                    array_dimension,
                ),
            };
            return Ok(resolved);
        }

        let entry = &self.named[&name];
        let decl = entry.decl;
        let qualified = entry.qualified_name.clone();
        let resolved = match decl.kind {
            DeclKind::Struct => ResolvedType::plain(
                TargetType::Struct {
                    name: qualified,
                    native: decl.path.clone(),
                },
                pointer_depth,
                array_dimension,
            ),
            DeclKind::Enum => ResolvedType::plain(
                TargetType::Enum {
                    name: qualified,
                    native: decl.path.clone(),
                    underlying: self.enum_underlying(decl),
                },
                pointer_depth,
                array_dimension,
            ),
            _ => ResolvedType::plain(
                TargetType::Interface {
                    name: qualified,
                    native: decl.path.clone(),
                },
                pointer_depth.saturating_sub(1),
                array_dimension,
            ),
        };
        Ok(resolved)
    }

    pub fn enum_underlying(&self, decl: &NativeDeclaration) -> PrimitiveType {
        decl.declared_type
            .as_ref()
            .and_then(|t| NATIVE_PRIMITIVES.get(t.name.as_str()).copied())
            .filter(|p| p.is_integer())
            .unwrap_or(PrimitiveType::I32)
    }

    // ───────────────────────────────────────────────────────────────────────────
    // Size facts
    // ───────────────────────────────────────────────────────────────────────────

    pub fn set_layouts(&mut self, layouts: HashMap<String, StructLayout>) {
        self.layouts = layouts;
    }

    pub fn layout(&self, struct_path: &str) -> Option<&StructLayout> {
        self.layouts.get(struct_path)
    }

    /// Facts for one element of `resolved`, ignoring array dimension.
    /// Struct facts come from the computed layouts; `layout_of` lets the
    /// layout pass supply in-progress results.
    pub fn element_facts_with(
        &self,
        resolved: &ResolvedType,
        layout_of: &mut dyn FnMut(&str) -> Result<StructLayout>,
    ) -> Result<ValueFacts> {
        let pointer_size = self.options.pointer_size;
        if resolved.pointer_depth > 0 {
            return Ok(ValueFacts {
                size: pointer_size,
                alignment: Alignment::PointerSized,
                needs_shadow: false,
            });
        }
        let facts = match &resolved.ty {
            TargetType::Void => ValueFacts {
                size: 0,
                alignment: Alignment::Fixed(1),
                needs_shadow: false,
            },
            TargetType::Primitive { primitive } => {
                let carried = resolved.bool_as_int.unwrap_or(*primitive);
                ValueFacts {
                    size: carried.size(pointer_size),
                    alignment: if carried.is_pointer_sized() {
                        Alignment::PointerSized
                    } else {
                        Alignment::Fixed(carried.alignment(pointer_size))
                    },
                    needs_shadow: resolved.bool_as_int.is_some(),
                }
            }
            TargetType::Enum { underlying, .. } => ValueFacts {
                size: underlying.size(pointer_size),
                alignment: Alignment::Fixed(underlying.alignment(pointer_size)),
                needs_shadow: false,
            },
            TargetType::String { .. } | TargetType::Interface { .. } => ValueFacts {
                size: pointer_size,
                alignment: Alignment::PointerSized,
                needs_shadow: true,
            },
            TargetType::Struct { native, .. } => {
                let layout = layout_of(native)?;
                ValueFacts {
                    size: layout.size,
                    alignment: layout.alignment,
                    needs_shadow: layout.needs_shadow,
                }
            }
        };
        Ok(facts)
    }

    /// Facts for one element, using the finished layouts.
    pub fn element_facts(&self, resolved: &ResolvedType) -> ValueFacts {
        let layouts = &self.layouts;
        let mut lookup = |path: &str| -> Result<StructLayout> {
            layouts
                .get(path)
                .cloned()
                .ok_or_else(|| BindError::RecursiveLayout {
                    path: path.to_string(),
                })
        };
        self.element_facts_with(resolved, &mut lookup)
            .unwrap_or(ValueFacts {
                size: self.options.pointer_size,
                alignment: Alignment::PointerSized,
                needs_shadow: true,
            })
    }
}

fn name_is_character(name: &str) -> bool {
    matches!(name, "char" | "CHAR" | "wchar_t" | "WCHAR")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn module() -> NativeModule {
        NativeModule::new("gfx")
            .with(
                NativeDeclaration::new(DeclKind::Struct, Some("Lib"), "Point").with_child(
                    NativeDeclaration::new(DeclKind::Field, None, "X")
                        .with_type(TypeRef::named("float")),
                ),
            )
            .with(NativeDeclaration::new(DeclKind::Interface, Some("Lib"), "IDevice"))
            .with(
                NativeDeclaration::new(DeclKind::Enum, Some("Lib"), "Format")
                    .with_type(TypeRef::named("unsigned short")),
            )
            .with(
                NativeDeclaration::new(DeclKind::Type, Some("Lib"), "LPCWSTR")
                    .with_type(TypeRef::pointer("wchar_t", 1)),
            )
    }

    #[test]
    fn test_primitives_and_named_types() {
        let module = module();
        let options = GeneratorOptions::default();
        let registry = TypeRegistry::index(&module, &options);

        let float = registry.resolve("p", &TypeRef::named("FLOAT"), None).unwrap();
        assert_eq!(float.ty, TargetType::primitive(PrimitiveType::F32));

        let point = registry.resolve("p", &TypeRef::pointer("Point", 1), None).unwrap();
        assert_eq!(point.pointer_depth, 1);
        assert!(matches!(point.ty, TargetType::Struct { ref name, .. } if name == "Lib.Point"));

        let device = registry
            .resolve("p", &TypeRef::pointer("IDevice", 2), None)
            .unwrap();
        assert!(device.ty.is_interface());
        assert_eq!(device.pointer_depth, 1);

        let format = registry.resolve("p", &TypeRef::named("Lib::Format"), None).unwrap();
        assert!(matches!(
            format.ty,
            TargetType::Enum {
                underlying: PrimitiveType::U16,
                ..
            }
        ));
    }

    #[test]
    fn test_strings_and_typedefs() {
        let module = module();
        let options = GeneratorOptions::default();
        let registry = TypeRegistry::index(&module, &options);

        let ansi = registry.resolve("p", &TypeRef::pointer("char", 1), None).unwrap();
        assert_eq!(ansi.string_encoding(), Some(StringEncoding::Ansi));
        let wide = registry.resolve("p", &TypeRef::named("LPCWSTR"), None).unwrap();
        assert_eq!(wide.string_encoding(), Some(StringEncoding::Wide));
        assert_eq!(wide.pointer_depth, 0);
    }

    #[test]
    fn test_bool_override_on_integer_is_projection() {
        let module = module();
        let options = GeneratorOptions::default();
        let registry = TypeRegistry::index(&module, &options);
        let tag = Tag {
            type_name: Some("bool".to_string()),
            ..Tag::default()
        };

        let resolved = registry
            .resolve("p", &TypeRef::named("BOOL"), Some(&tag))
            .unwrap();
        assert_eq!(resolved.ty, TargetType::primitive(PrimitiveType::Bool));
        assert_eq!(resolved.bool_as_int, Some(PrimitiveType::I32));
        let facts = registry.element_facts(&resolved);
        assert_eq!(facts.size, 4);
        assert!(facts.needs_shadow);
    }

    #[test]
    fn test_unknown_type_names_the_path() {
        let module = module();
        let options = GeneratorOptions::default();
        let registry = TypeRegistry::index(&module, &options);

        let err = registry
            .resolve("Lib::Point::Z", &TypeRef::named("FLOAT3"), None)
            .unwrap_err();
        assert_eq!(err.path(), Some("Lib::Point::Z"));

        let tag = Tag {
            type_name: Some("Vector9".to_string()),
            ..Tag::default()
        };
        assert!(registry
            .resolve("Lib::Point::X", &TypeRef::named("float"), Some(&tag))
            .is_err());
    }

    #[test]
    fn test_override_does_not_need_a_known_native_name() {
        let module = module();
        let options = GeneratorOptions::default();
        let registry = TypeRegistry::index(&module, &options);
        let tag = Tag {
            type_name: Some("f32".to_string()),
            ..Tag::default()
        };
        let declared = TypeRef {
            array_dimension: Some(3),
            ..TypeRef::named("FLOAT3")
        };

        let resolved = registry.resolve("Lib::S::V", &declared, Some(&tag)).unwrap();
        assert_eq!(resolved.ty, TargetType::primitive(PrimitiveType::F32));
        assert_eq!(resolved.array_dimension, Some(3));
        assert_eq!(resolved.pointer_depth, 0);
        assert!(resolved.bool_as_int.is_none());

        let pointer = registry
            .resolve("Lib::S::P", &TypeRef::pointer("FLOAT3", 1), Some(&tag))
            .unwrap();
        assert_eq!(pointer.pointer_depth, 1);
    }

    #[test]
    fn test_hidden_types_are_not_resolvable() {
        let mut module = module();
        module.declarations[0].tag = Some(Tag {
            hidden: Some(true),
            ..Tag::default()
        });
        let options = GeneratorOptions::default();
        let registry = TypeRegistry::index(&module, &options);

        let err = registry
            .resolve("Lib::Holder::P", &TypeRef::named("Point"), None)
            .unwrap_err();
        assert_eq!(err.path(), Some("Lib::Holder::P"));
        assert!(registry.lookup("Lib::Point").is_none());
        assert!(registry.lookup_declared("Lib::Point").is_some());
        assert!(registry.qualified_name_of("Point").is_none());
    }

    #[test]
    fn test_names_follow_tags() {
        let module = module();
        let options = GeneratorOptions::default();
        let registry = TypeRegistry::index(&module, &options);

        let mut point = module.find("Lib::Point").unwrap().clone();
        assert_eq!(registry.qualified_name(&point), "Lib.Point");
        point.tag = Some(Tag {
            rename: Some("Vec2".to_string()),
            namespace: Some("Gfx.Math".to_string()),
            ..Tag::default()
        });
        assert_eq!(registry.qualified_name(&point), "Gfx.Math.Vec2");
    }
}
