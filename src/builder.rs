//! Target binding model builder.
//!
//! ## Invariants
//!
//! 1. **One pass**: the tagged module is walked top-down once. Every native
//!    declaration yields at most one target node (plus generated overloads
//!    and promoted properties); a `hidden` tag yields none.
//! 2. **Names**: a rename override is the final name. Otherwise the last
//!    `::` segment of the native name is used. Members are qualified by
//!    their owner's qualified target name.
//! 3. **Visibility**: a member's own override wins, else it inherits the
//!    owner's resolved visibility, else `public`.
//! 4. **Shadow**: a struct needs a native shadow when tagged, when projected
//!    to a class, or when a field needs marshalling.
//! 5. **Soundness**: a declaration whose type cannot be resolved is reported
//!    with its native path and its owning type or method is not built.

use lazy_static::lazy_static;
use regex::Regex;
use std::collections::HashMap;

use crate::diagnostics::{Diagnostic, DiagnosticList};
use crate::docs::DocumentationProvider;
use crate::error::BindError;
use crate::interop::derive_parts;
use crate::layout::compute_layouts;
use crate::marshal::{classify, MarshalInput};
use crate::native::{DeclKind, NativeDeclaration, ParamDirection, TypeRef};
use crate::options::GeneratorOptions;
use crate::overloads::optional_overload;
use crate::registry::{ResolvedType, TypeRegistry};
use crate::resolve::TaggedModule;
use crate::tag::{ParamPassing, Tag, Visibility};
use crate::target::{
    ClassInfo, DispatchTables, EnumInfo, EnumItemInfo, InterfaceInfo, MethodInfo, PropertyInfo,
    StructInfo, TargetAssembly, TargetDeclaration, TargetItem, TargetKind, ValueInfo,
};

const MAX_BASE_DEPTH: usize = 32;

lazy_static! {
    /// Method counts of platform base interfaces that are rarely declared in
    /// the parsed module.
    static ref WELL_KNOWN_BASES: HashMap<&'static str, u32> = {
        let mut m = HashMap::new();
        m.insert("IUnknown", 3);
        m.insert("IInspectable", 6);
        m.insert("IDispatch", 7);
        m
    };
    static ref INTEGER_LITERAL: Regex = Regex::new(r"^-?(0[xX][0-9A-Fa-f]+|\d+)[uUlL]*$").unwrap();
    static ref FLOAT_LITERAL: Regex = Regex::new(r"^-?\d+\.\d*([eE][-+]?\d+)?([fF]?)$").unwrap();
}

// ═══════════════════════════════════════════════════════════════════════════════
// ENTRY POINT
// ═══════════════════════════════════════════════════════════════════════════════

/// Builds the target binding model from a tagged module.
pub fn build(
    tagged: &TaggedModule,
    options: &GeneratorOptions,
    docs: Option<&dyn DocumentationProvider>,
) -> (TargetAssembly, DiagnosticList) {
    let module = tagged.module();
    let mut registry = TypeRegistry::index(module, options);
    let (layouts, layout_diagnostics) = compute_layouts(&registry, module);
    registry.set_layouts(layouts);

    let mut builder = Builder {
        registry: &registry,
        options,
        docs,
        diagnostics: layout_diagnostics,
    };
    let mut namespaces: Vec<NamespaceBuilder> = Vec::new();
    for decl in &module.declarations {
        builder.build_top_level(decl, &mut namespaces);
    }

    let assembly = TargetAssembly {
        name: options.assembly_name.clone(),
        namespaces: namespaces
            .into_iter()
            .filter_map(NamespaceBuilder::finish)
            .collect(),
    };
    log::info!(
        "[bindgen] built assembly '{}' with {} namespace(s), {} diagnostic(s)",
        assembly.name,
        assembly.namespaces.len(),
        builder.diagnostics.len()
    );
    (assembly, builder.diagnostics)
}

struct NamespaceBuilder {
    node: TargetDeclaration,
    functions: Option<TargetDeclaration>,
    constants: Option<TargetDeclaration>,
}

impl NamespaceBuilder {
    fn new(name: &str) -> Self {
        NamespaceBuilder {
            node: TargetDeclaration::new(name, name, TargetItem::Namespace),
            functions: None,
            constants: None,
        }
    }

    fn finish(mut self) -> Option<TargetDeclaration> {
        self.node.children.extend(self.functions);
        self.node.children.extend(self.constants);
        if self.node.children.is_empty() {
            None
        } else {
            Some(self.node)
        }
    }
}

fn namespace_entry<'n>(namespaces: &'n mut Vec<NamespaceBuilder>, name: &str) -> &'n mut NamespaceBuilder {
    let index = match namespaces.iter().position(|ns| ns.node.qualified_name == name) {
        Some(index) => index,
        None => {
            namespaces.push(NamespaceBuilder::new(name));
            namespaces.len() - 1
        }
    };
    &mut namespaces[index]
}

fn static_class(namespace: &str, name: &str) -> TargetDeclaration {
    TargetDeclaration::new(
        name,
        &format!("{}.{}", namespace, name),
        TargetItem::Class(ClassInfo {
            is_static: true,
            layout: None,
        }),
    )
}

#[derive(Debug, Clone, Copy)]
enum MethodOwner {
    Free,
    Interface { slot: u32 },
}

fn default_passing(direction: ParamDirection, resolved: &ResolvedType) -> ParamPassing {
    match direction {
        ParamDirection::In
            if resolved.pointer_depth == 1
                && resolved.ty.is_value_type()
                && !resolved.is_array() =>
        {
            ParamPassing::RefIn
        }
        ParamDirection::In => ParamPassing::In,
        ParamDirection::Out => ParamPassing::Out,
        ParamDirection::InOut => ParamPassing::Ref,
    }
}

/// Native type implied by a define's literal body.
fn literal_type(value: &str) -> TypeRef {
    let value = value.trim();
    if value.starts_with("L\"") {
        TypeRef::pointer("wchar_t", 1)
    } else if value.starts_with('"') {
        TypeRef::pointer("char", 1)
    } else if INTEGER_LITERAL.is_match(value) {
        TypeRef::named("int")
    } else if let Some(caps) = FLOAT_LITERAL.captures(value) {
        if caps.get(2).map_or(false, |m| !m.as_str().is_empty()) {
            TypeRef::named("float")
        } else {
            TypeRef::named("double")
        }
    } else {
        TypeRef::named(value)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// BUILDER
// ═══════════════════════════════════════════════════════════════════════════════

struct Builder<'b, 'a> {
    registry: &'b TypeRegistry<'a>,
    options: &'b GeneratorOptions,
    docs: Option<&'b dyn DocumentationProvider>,
    diagnostics: DiagnosticList,
}

impl<'b, 'a> Builder<'b, 'a> {
    fn report(&mut self, err: BindError) {
        self.diagnostics.push(Diagnostic::from(&err));
    }

    fn node(
        &self,
        decl: &NativeDeclaration,
        name: &str,
        qualified_name: &str,
        visibility: Visibility,
        item: TargetItem,
    ) -> TargetDeclaration {
        let mut node = TargetDeclaration::new(name, qualified_name, item);
        node.visibility = visibility;
        node.source = Some(decl.path.clone());
        node.doc = self.docs.and_then(|docs| docs.documentation(&decl.path));
        node
    }

    fn member(
        &self,
        decl: &NativeDeclaration,
        owner_qualified: &str,
        owner_visibility: Visibility,
        item: TargetItem,
    ) -> TargetDeclaration {
        let name = TypeRegistry::target_name(decl);
        let visibility = decl
            .tag
            .as_ref()
            .and_then(|t| t.visibility)
            .unwrap_or(owner_visibility);
        self.node(
            decl,
            &name,
            &format!("{}.{}", owner_qualified, name),
            visibility,
            item,
        )
    }

    fn build_top_level(&mut self, decl: &NativeDeclaration, namespaces: &mut Vec<NamespaceBuilder>) {
        let tag = decl.tag();
        if tag.is_hidden() {
            log::debug!("[bindgen] skipping hidden '{}'", decl.path);
            return;
        }
        let namespace = self.registry.namespace_of(decl);

        match decl.kind {
            DeclKind::Struct => {
                if let Some(node) = self.build_struct(decl) {
                    namespace_entry(namespaces, &namespace).node.children.push(node);
                }
            }
            DeclKind::Enum => {
                let node = self.build_enum(decl);
                namespace_entry(namespaces, &namespace).node.children.push(node);
            }
            DeclKind::Interface => {
                let node = self.build_interface(decl);
                namespace_entry(namespaces, &namespace).node.children.push(node);
            }
            DeclKind::Method => {
                let class_name = self.options.functions_class_name.clone();
                let class_qualified = format!("{}.{}", namespace, class_name);
                let built = self.build_method(decl, &class_qualified, Visibility::Public, MethodOwner::Free);
                if let Some(method) = built {
                    let overload = optional_overload(&method);
                    let class = namespace_entry(namespaces, &namespace)
                        .functions
                        .get_or_insert_with(|| static_class(&namespace, &class_name));
                    class.children.push(method);
                    class.children.extend(overload);
                }
            }
            DeclKind::Define if decl.tag.is_some() => {
                let class_name = self.options.constants_class_name.clone();
                let class_qualified = format!("{}.{}", namespace, class_name);
                if let Some(constant) = self.build_constant(decl, &class_qualified) {
                    namespace_entry(namespaces, &namespace)
                        .constants
                        .get_or_insert_with(|| static_class(&namespace, &class_name))
                        .children
                        .push(constant);
                }
            }
            DeclKind::Define | DeclKind::Type => {}
            DeclKind::Parameter | DeclKind::Field | DeclKind::EnumItem => {
                log::debug!("[bindgen] ignoring stray {:?} '{}'", decl.kind, decl.path);
            }
        }
    }

    // ───────────────────────────────────────────────────────────────────────────
    // Values
    // ───────────────────────────────────────────────────────────────────────────

    fn value_from(
        &self,
        resolved: ResolvedType,
        tag: &Tag,
        passing: Option<ParamPassing>,
        is_optional: bool,
        is_return_value: bool,
    ) -> ValueInfo {
        let mut element = resolved;
        let by_ref = matches!(
            passing,
            Some(ParamPassing::Out) | Some(ParamPassing::Ref) | Some(ParamPassing::RefIn)
        );
        // A by-ref parameter is its pointee.
        if by_ref && element.pointer_depth > 0 {
            element.pointer_depth -= 1;
        }

        let facts = self.registry.element_facts(&element);
        let input = MarshalInput {
            ty: &element.ty,
            pointer_depth: element.pointer_depth,
            is_array: element.is_array(),
            passing,
            is_optional,
            pass_by_value: Tag::flag(tag.pass_by_value),
            bool_as_int: element.bool_as_int.is_some(),
            facts,
        };
        let marshalling = classify(&input, self.options);

        ValueInfo {
            ty: element.ty,
            pointer_depth: element.pointer_depth,
            array_dimension: element.array_dimension,
            passing,
            is_optional,
            is_return_value,
            offset: None,
            marshalling,
            constant_value: None,
        }
    }

    // ───────────────────────────────────────────────────────────────────────────
    // Types
    // ───────────────────────────────────────────────────────────────────────────

    fn build_struct(&mut self, decl: &NativeDeclaration) -> Option<TargetDeclaration> {
        let tag = decl.tag();
        let name = TypeRegistry::target_name(decl);
        let qualified = self.registry.qualified_name(decl);
        let visibility = tag.visibility.unwrap_or(Visibility::Public);
        // No layout means a cycle or an overflow, already reported.
        let layout = self.registry.layout(&decl.path)?.clone();

        let mut fields = Vec::new();
        let mut failed = false;
        for field in decl.children.iter().filter(|c| c.kind == DeclKind::Field) {
            let field_tag = field.tag();
            if field_tag.is_hidden() {
                continue;
            }
            match self.registry.resolve_decl(field) {
                Ok(resolved) => {
                    let mut value = self.value_from(resolved, &field_tag, None, false, false);
                    value.offset = layout.offset_of(&field.path);
                    fields.push(self.member(field, &qualified, visibility, TargetItem::Field(value)));
                }
                Err(err) => {
                    self.report(err);
                    failed = true;
                }
            }
        }
        if failed {
            return None;
        }

        let info = StructInfo {
            has_native_shadow: layout.needs_shadow,
            custom_marshal: Tag::flag(tag.struct_custom_marshal),
            custom_new: Tag::flag(tag.struct_custom_new),
            size: layout.size,
            alignment: layout.alignment,
        };
        let item = if Tag::flag(tag.struct_to_class) {
            TargetItem::Class(ClassInfo {
                is_static: false,
                layout: Some(info),
            })
        } else {
            TargetItem::Struct(info)
        };

        let mut node = self.node(decl, &name, &qualified, visibility, item);
        node.children = fields;
        Some(node)
    }

    fn build_enum(&mut self, decl: &NativeDeclaration) -> TargetDeclaration {
        let tag = decl.tag();
        let name = TypeRegistry::target_name(decl);
        let qualified = self.registry.qualified_name(decl);
        let visibility = tag.visibility.unwrap_or(Visibility::Public);

        let mut items: Vec<TargetDeclaration> = decl
            .children
            .iter()
            .filter(|c| c.kind == DeclKind::EnumItem && !c.tag().is_hidden())
            .map(|item| {
                self.member(
                    item,
                    &qualified,
                    visibility,
                    TargetItem::EnumItem(EnumItemInfo {
                        value: item.value.clone(),
                    }),
                )
            })
            .collect();

        if Tag::flag(tag.enum_has_none) && !items.iter().any(|i| i.name == "None") {
            let mut none = TargetDeclaration::new(
                "None",
                &format!("{}.None", qualified),
                TargetItem::EnumItem(EnumItemInfo {
                    value: Some("0".to_string()),
                }),
            );
            none.visibility = visibility;
            items.insert(0, none);
        }

        let mut node = self.node(
            decl,
            &name,
            &qualified,
            visibility,
            TargetItem::Enum(EnumInfo {
                underlying: self.registry.enum_underlying(decl),
                is_flags: Tag::flag(tag.enum_is_flags),
            }),
        );
        node.children = items;
        node
    }

    fn build_interface(&mut self, decl: &NativeDeclaration) -> TargetDeclaration {
        let tag = decl.tag();
        let name = TypeRegistry::target_name(decl);
        let qualified = self.registry.qualified_name(decl);
        let visibility = tag.visibility.unwrap_or(Visibility::Public);

        let is_dual_callback = Tag::flag(tag.dual_callback);
        let is_callback = Tag::flag(tag.callback) || is_dual_callback;
        let dispatch = DispatchTables {
            managed_to_native: !is_callback || is_dual_callback,
            native_to_managed: is_callback,
        };
        let base = decl.base.as_ref().map(|base| {
            self.registry
                .qualified_name_of(base)
                .map(str::to_string)
                .unwrap_or_else(|| base.clone())
        });

        let mut slot = self.base_slot_count(decl);
        let mut members = Vec::new();
        let mut accessors = Vec::new();
        for method in decl.children.iter().filter(|c| c.kind == DeclKind::Method) {
            // Hidden methods still occupy their vtable slot.
            let this_slot = slot;
            slot += 1;
            let method_tag = method.tag();
            if method_tag.is_hidden() {
                continue;
            }
            let owner = MethodOwner::Interface { slot: this_slot };
            if let Some(node) = self.build_method(method, &qualified, visibility, owner) {
                if Tag::flag(method_tag.property) {
                    accessors.push((node.clone(), Tag::flag(method_tag.persist)));
                }
                let overload = optional_overload(&node);
                members.push(node);
                members.extend(overload);
            }
        }
        members.extend(promote_properties(&qualified, &accessors));

        let mut node = self.node(
            decl,
            &name,
            &qualified,
            visibility,
            TargetItem::Interface(InterfaceInfo {
                base,
                is_callback,
                is_dual_callback,
                dispatch,
            }),
        );
        node.children = members;
        node
    }

    /// Number of vtable slots taken by the base chain of `decl`.
    fn base_slot_count(&self, decl: &NativeDeclaration) -> u32 {
        let mut count = 0;
        let mut current = decl.base.clone();
        let mut depth = 0;
        while let Some(base) = current {
            if depth >= MAX_BASE_DEPTH {
                break;
            }
            depth += 1;
            match self
                .registry
                .lookup_declared(&base)
                .filter(|b| b.kind == DeclKind::Interface)
            {
                Some(parent) => {
                    count += parent
                        .children
                        .iter()
                        .filter(|c| c.kind == DeclKind::Method)
                        .count() as u32;
                    current = parent.base.clone();
                }
                None => {
                    count += WELL_KNOWN_BASES.get(base.as_str()).copied().unwrap_or(0);
                    current = None;
                }
            }
        }
        count
    }

    // ───────────────────────────────────────────────────────────────────────────
    // Members
    // ───────────────────────────────────────────────────────────────────────────

    fn build_method(
        &mut self,
        decl: &NativeDeclaration,
        owner_qualified: &str,
        owner_visibility: Visibility,
        owner: MethodOwner,
    ) -> Option<TargetDeclaration> {
        let tag = decl.tag();
        let name = TypeRegistry::target_name(decl);
        let qualified = format!("{}.{}", owner_qualified, name);
        let visibility = tag.visibility.unwrap_or(owner_visibility);
        let mut failed = false;

        let returns = match self.registry.resolve_decl(decl) {
            Ok(resolved) => Some(self.value_from(resolved, &tag, None, false, false)),
            Err(err) => {
                self.report(err);
                failed = true;
                None
            }
        };

        let mut params = Vec::new();
        let mut return_param = None;
        for param in decl.children.iter().filter(|c| c.kind == DeclKind::Parameter) {
            let param_tag = param.tag();
            let resolved = match self.registry.resolve_decl(param) {
                Ok(resolved) => resolved,
                Err(err) => {
                    self.report(err);
                    failed = true;
                    continue;
                }
            };
            let passing = param_tag
                .parameter
                .unwrap_or_else(|| default_passing(param.attributes.direction, &resolved));
            let is_optional = param.attributes.optional || Tag::flag(param_tag.optional);
            let is_return_value = Tag::flag(param_tag.param_return)
                && passing == ParamPassing::Out
                && return_param.is_none();

            let value = self.value_from(resolved, &param_tag, Some(passing), is_optional, is_return_value);
            let node = self.member(param, &qualified, visibility, TargetItem::Parameter(value));
            if is_return_value {
                return_param = Some(node.name.clone());
            }
            params.push(node);
        }

        let returns = match returns {
            Some(returns) if !failed => returns,
            _ => {
                log::debug!("[bindgen] method '{}' not built", decl.path);
                return None;
            }
        };

        let is_static = matches!(owner, MethodOwner::Free);
        let values: Vec<&ValueInfo> = params.iter().filter_map(|p| p.value()).collect();
        let signature = derive_parts(&returns, &values, is_static, self.options, Some(qualified.as_str()));
        let (vtable_slot, dll_name) = match owner {
            MethodOwner::Free => (
                None,
                Some(tag.dll_name.clone().unwrap_or_else(|| decl.name.clone())),
            ),
            MethodOwner::Interface { slot } => (Some(slot), None),
        };

        let mut node = self.node(
            decl,
            &name,
            &qualified,
            visibility,
            TargetItem::Method(MethodInfo {
                returns,
                is_static,
                vtable_slot,
                dll_name,
                return_param,
                overload_of: None,
                signature,
            }),
        );
        node.children = params;
        Some(node)
    }

    fn build_constant(
        &mut self,
        decl: &NativeDeclaration,
        class_qualified: &str,
    ) -> Option<TargetDeclaration> {
        let tag = decl.tag();
        let ty = decl
            .declared_type
            .clone()
            .unwrap_or_else(|| literal_type(decl.value.as_deref().unwrap_or("")));
        match self.registry.resolve(&decl.path, &ty, Some(&tag)) {
            Ok(resolved) => {
                let mut value = self.value_from(resolved, &tag, None, false, false);
                value.constant_value = decl.value.clone();
                Some(self.member(decl, class_qualified, Visibility::Public, TargetItem::Field(value)))
            }
            Err(err) => {
                self.report(err);
                None
            }
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// PROPERTY PROMOTION
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Default)]
struct Accessors<'m> {
    display: String,
    getter: Option<&'m TargetDeclaration>,
    setter: Option<&'m TargetDeclaration>,
    persist: bool,
}

fn accessor_suffix<'n>(name: &'n str, prefix: &str) -> Option<&'n str> {
    name.strip_prefix(prefix)
        .filter(|rest| rest.starts_with(|c: char| c.is_ascii_uppercase() || c.is_ascii_digit()))
}

/// `GetX` → (`X`, `X`), `IsX` → (`X`, `IsX`).
fn getter_name(name: &str) -> Option<(String, String)> {
    if let Some(rest) = accessor_suffix(name, "Get") {
        return Some((rest.to_string(), rest.to_string()));
    }
    accessor_suffix(name, "Is").map(|rest| (rest.to_string(), name.to_string()))
}

fn params_of(method: &TargetDeclaration) -> Vec<&ValueInfo> {
    method
        .children_of(TargetKind::Parameter)
        .filter_map(|p| p.value())
        .collect()
}

fn promote_properties(
    owner_qualified: &str,
    candidates: &[(TargetDeclaration, bool)],
) -> Vec<TargetDeclaration> {
    let mut order: Vec<String> = Vec::new();
    let mut by_key: HashMap<String, Accessors> = HashMap::new();

    for (method, persist) in candidates {
        let info = match method.method() {
            Some(info) => info,
            None => continue,
        };
        let params = params_of(method);
        let returns_void = info.returns.ty.is_void();

        if let Some((key, display)) = getter_name(&method.name) {
            let plain = params.is_empty() && !returns_void;
            let via_out = returns_void && params.len() == 1 && params[0].is_return_value;
            if !(plain || via_out) {
                continue;
            }
            if !by_key.contains_key(&key) {
                order.push(key.clone());
            }
            let entry = by_key.entry(key).or_default();
            entry.display = display;
            entry.getter = Some(method);
            entry.persist |= *persist;
        } else if let Some(key) = accessor_suffix(&method.name, "Set") {
            let takes_one_input = params.len() == 1
                && matches!(params[0].passing, None | Some(ParamPassing::In) | Some(ParamPassing::RefIn));
            if !(returns_void && takes_one_input) {
                continue;
            }
            if !by_key.contains_key(key) {
                order.push(key.to_string());
            }
            let entry = by_key.entry(key.to_string()).or_default();
            if entry.display.is_empty() {
                entry.display = key.to_string();
            }
            entry.setter = Some(method);
            entry.persist |= *persist;
        }
    }

    let mut properties = Vec::new();
    for key in order {
        let accessors = match by_key.remove(&key) {
            Some(accessors) => accessors,
            None => continue,
        };
        let getter_ty = accessors.getter.and_then(|g| {
            let params = params_of(g);
            match params.first() {
                Some(param) => Some(param.ty.clone()),
                None => g.method().map(|info| info.returns.ty.clone()),
            }
        });
        let setter_ty = accessors
            .setter
            .and_then(|s| params_of(s).first().map(|p| p.ty.clone()));

        let (ty, setter) = match (getter_ty, setter_ty) {
            (Some(get), Some(set)) if get != set => (get, None),
            (Some(get), _) => (get, accessors.setter),
            (None, Some(set)) => (set, accessors.setter),
            (None, None) => continue,
        };
        let anchor = match accessors.getter.or(setter) {
            Some(anchor) => anchor,
            None => continue,
        };

        let mut node = TargetDeclaration::new(
            &accessors.display,
            &format!("{}.{}", owner_qualified, accessors.display),
            TargetItem::Property(PropertyInfo {
                ty,
                getter: accessors.getter.map(|g| g.qualified_name.clone()),
                setter: setter.map(|s| s.qualified_name.clone()),
                persist: accessors.persist,
            }),
        );
        node.visibility = anchor.visibility;
        node.source = anchor.source.clone();
        properties.push(node);
    }
    properties
}
