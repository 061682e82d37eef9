//! Native struct layout: size, alignment and field offsets.
//!
//! Fields are laid out with natural alignment. Alignment stops being a fixed
//! number as soon as the first pointer-sized field is found; the struct (and
//! every struct embedding it by value) is then `PointerSized`, and later
//! fields no longer contribute to the alignment.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

use crate::diagnostics::{Diagnostic, DiagnosticList};
use crate::error::{BindError, Result};
use crate::native::{DeclKind, NativeDeclaration, NativeModule};
use crate::registry::{TypeRegistry, ValueFacts};
use crate::tag::Tag;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "bytes", rename_all = "kebab-case")]
pub enum Alignment {
    Fixed(u32),
    PointerSized,
}

impl Alignment {
    pub fn bytes(self, pointer_size: u32) -> u32 {
        match self {
            Alignment::Fixed(bytes) => bytes.max(1),
            Alignment::PointerSized => pointer_size.max(1),
        }
    }

    pub fn combine(self, other: Alignment) -> Alignment {
        match (self, other) {
            (Alignment::PointerSized, _) | (_, Alignment::PointerSized) => Alignment::PointerSized,
            (Alignment::Fixed(a), Alignment::Fixed(b)) => Alignment::Fixed(a.max(b)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StructLayout {
    pub size: u32,
    pub alignment: Alignment,
    /// Offset of every field, keyed by the field's native path.
    pub field_offsets: Vec<(String, u32)>,
    pub needs_shadow: bool,
}

impl StructLayout {
    pub fn offset_of(&self, field_path: &str) -> Option<u32> {
        self.field_offsets
            .iter()
            .find(|(path, _)| path == field_path)
            .map(|(_, offset)| *offset)
    }
}

fn align_up(value: u32, alignment: u32) -> Option<u32> {
    value
        .checked_add(alignment - 1)
        .map(|padded| padded / alignment * alignment)
}

fn overflow(path: &str) -> BindError {
    BindError::LayoutOverflow {
        path: path.to_string(),
    }
}

struct LayoutCalculator<'r, 'a> {
    registry: &'r TypeRegistry<'a>,
    structs: HashMap<String, &'a NativeDeclaration>,
    done: HashMap<String, StructLayout>,
    visiting: HashSet<String>,
}

impl<'r, 'a> LayoutCalculator<'r, 'a> {
    fn layout(&mut self, path: &str) -> Result<StructLayout> {
        if let Some(done) = self.done.get(path) {
            return Ok(done.clone());
        }
        if !self.visiting.insert(path.to_string()) {
            return Err(BindError::RecursiveLayout {
                path: path.to_string(),
            });
        }
        let result = self.compute(path);
        self.visiting.remove(path);

        let layout = result?;
        self.done.insert(path.to_string(), layout.clone());
        Ok(layout)
    }

    fn compute(&mut self, path: &str) -> Result<StructLayout> {
        let decl = match self.structs.get(path) {
            Some(decl) => *decl,
            None => {
                return Err(BindError::RecursiveLayout {
                    path: path.to_string(),
                })
            }
        };
        let registry = self.registry;
        let pointer_size = registry.options().pointer_size;
        let tag = decl.tag.clone().unwrap_or_default();

        let mut offset = 0u32;
        let mut alignment = Alignment::Fixed(1);
        let mut needs_shadow =
            Tag::flag(tag.struct_has_native_shadow) || Tag::flag(tag.struct_to_class);
        let mut field_offsets = Vec::new();

        for field in decl.children.iter().filter(|c| c.kind == DeclKind::Field) {
            let (facts, count) = match registry.resolve_decl(field) {
                Ok(resolved) => {
                    let facts = registry
                        .element_facts_with(&resolved, &mut |p: &str| self.layout(p))?;
                    (facts, resolved.array_dimension.unwrap_or(1))
                }
                // Reported by the builder against the field itself.
                Err(_) => (
                    ValueFacts {
                        size: pointer_size,
                        alignment: Alignment::PointerSized,
                        needs_shadow: false,
                    },
                    1,
                ),
            };

            offset = align_up(offset, facts.alignment.bytes(pointer_size))
                .ok_or_else(|| overflow(&decl.path))?;
            field_offsets.push((field.path.clone(), offset));
            offset = facts
                .size
                .checked_mul(count)
                .and_then(|bytes| offset.checked_add(bytes))
                .ok_or_else(|| overflow(&decl.path))?;

            if alignment != Alignment::PointerSized {
                alignment = alignment.combine(facts.alignment);
            }
            needs_shadow |= facts.needs_shadow;
        }

        Ok(StructLayout {
            size: align_up(offset, alignment.bytes(pointer_size))
                .ok_or_else(|| overflow(&decl.path))?,
            alignment,
            field_offsets,
            needs_shadow,
        })
    }
}

/// Computes the layout of every struct in `module`.
pub fn compute_layouts<'a>(
    registry: &TypeRegistry<'a>,
    module: &'a NativeModule,
) -> (HashMap<String, StructLayout>, DiagnosticList) {
    let mut structs = HashMap::new();
    module.walk(&mut |decl| {
        if decl.kind == DeclKind::Struct {
            structs.insert(decl.path.clone(), decl);
        }
    });
    let mut paths: Vec<String> = structs.keys().cloned().collect();
    paths.sort();

    let mut calculator = LayoutCalculator {
        registry,
        structs,
        done: HashMap::new(),
        visiting: HashSet::new(),
    };
    let mut diagnostics = DiagnosticList::new();
    let mut reported = HashSet::new();

    for path in paths {
        if let Err(err) = calculator.layout(&path) {
            let key = err.path().unwrap_or(&path).to_string();
            if reported.insert(key) {
                diagnostics.push(Diagnostic::from(&err));
            }
        }
    }

    (calculator.done, diagnostics)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::native::TypeRef;
    use crate::options::GeneratorOptions;

    fn field(name: &str, ty: TypeRef) -> NativeDeclaration {
        NativeDeclaration::new(DeclKind::Field, None, name).with_type(ty)
    }

    fn layouts_of(module: &NativeModule) -> (HashMap<String, StructLayout>, DiagnosticList) {
        let options = GeneratorOptions::default();
        let registry = TypeRegistry::index(module, &options);
        compute_layouts(&registry, module)
    }

    #[test]
    fn test_natural_alignment_and_padding() {
        let module = NativeModule::new("m").with(
            NativeDeclaration::new(DeclKind::Struct, Some("Lib"), "Mixed")
                .with_child(field("A", TypeRef::named("char")))
                .with_child(field("B", TypeRef::named("int")))
                .with_child(field("C", TypeRef::named("short"))),
        );
        let (layouts, diagnostics) = layouts_of(&module);
        let layout = &layouts["Lib::Mixed"];

        assert!(diagnostics.is_empty());
        assert_eq!(layout.offset_of("Lib::Mixed::B"), Some(4));
        assert_eq!(layout.offset_of("Lib::Mixed::C"), Some(8));
        assert_eq!(layout.size, 12);
        assert_eq!(layout.alignment, Alignment::Fixed(4));
        assert!(!layout.needs_shadow);
    }

    #[test]
    fn test_pointer_field_short_circuits_alignment() {
        let module = NativeModule::new("m")
            .with(
                NativeDeclaration::new(DeclKind::Struct, Some("Lib"), "Desc")
                    .with_child(field("Data", TypeRef::pointer("void", 1)))
                    .with_child(field("Size", TypeRef::named("uint32_t"))),
            )
            .with(
                NativeDeclaration::new(DeclKind::Struct, Some("Lib"), "Outer")
                    .with_child(field("Flags", TypeRef::named("short")))
                    .with_child(field("Inner", TypeRef::named("Desc"))),
            );
        let (layouts, _) = layouts_of(&module);

        assert_eq!(layouts["Lib::Desc"].alignment, Alignment::PointerSized);
        assert_eq!(layouts["Lib::Desc"].size, 16);
        assert_eq!(layouts["Lib::Outer"].alignment, Alignment::PointerSized);
        assert_eq!(layouts["Lib::Outer"].offset_of("Lib::Outer::Inner"), Some(8));
        assert_eq!(layouts["Lib::Outer"].size, 24);
    }

    #[test]
    fn test_arrays_multiply_element_size() {
        let module = NativeModule::new("m").with(
            NativeDeclaration::new(DeclKind::Struct, Some("Lib"), "Matrix").with_child(field(
                "M",
                TypeRef {
                    array_dimension: Some(16),
                    ..TypeRef::named("float")
                },
            )),
        );
        let (layouts, _) = layouts_of(&module);
        assert_eq!(layouts["Lib::Matrix"].size, 64);
    }

    #[test]
    fn test_oversized_array_is_reported_not_wrapped() {
        let module = NativeModule::new("m")
            .with(
                NativeDeclaration::new(DeclKind::Struct, Some("Lib"), "Huge").with_child(field(
                    "M",
                    TypeRef {
                        array_dimension: Some(0x4000_0001),
                        ..TypeRef::named("double")
                    },
                )),
            )
            .with(
                NativeDeclaration::new(DeclKind::Struct, Some("Lib"), "Outer")
                    .with_child(field("Inner", TypeRef::named("Huge"))),
            );
        let (layouts, diagnostics) = layouts_of(&module);

        assert!(layouts.get("Lib::Huge").is_none());
        assert!(layouts.get("Lib::Outer").is_none());
        let overflows: Vec<_> = diagnostics
            .with_code(crate::diagnostics::ERR_LAYOUT_OVERFLOW)
            .collect();
        assert_eq!(overflows.len(), 1);
        assert_eq!(overflows[0].path.as_deref(), Some("Lib::Huge"));
    }

    #[test]
    fn test_marshalled_field_forces_shadow() {
        let module = NativeModule::new("m")
            .with(
                NativeDeclaration::new(DeclKind::Struct, Some("Lib"), "Named")
                    .with_child(field("Name", TypeRef::pointer("char", 1))),
            )
            .with(
                NativeDeclaration::new(DeclKind::Struct, Some("Lib"), "Holder")
                    .with_child(field("Value", TypeRef::named("Named"))),
            );
        let (layouts, _) = layouts_of(&module);
        assert!(layouts["Lib::Named"].needs_shadow);
        assert!(layouts["Lib::Holder"].needs_shadow);
    }

    #[test]
    fn test_by_value_cycle_is_reported() {
        let module = NativeModule::new("m")
            .with(
                NativeDeclaration::new(DeclKind::Struct, Some("Lib"), "A")
                    .with_child(field("B", TypeRef::named("B"))),
            )
            .with(
                NativeDeclaration::new(DeclKind::Struct, Some("Lib"), "B")
                    .with_child(field("A", TypeRef::named("A")))
                    .with_child(field("Next", TypeRef::pointer("B", 1))),
            );
        let (layouts, diagnostics) = layouts_of(&module);
        assert!(layouts.get("Lib::A").is_none());
        assert!(diagnostics.has_errors());
        assert!(diagnostics
            .iter()
            .all(|d| d.code == crate::diagnostics::ERR_LAYOUT_CYCLE));
    }
}
