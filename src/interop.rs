//! Interop signatures: the ABI-level shape of a native call.
//!
//! Two methods with equal signatures can share one native-call thunk.
//! Identity covers the return kind, the ordered parameter kinds, the
//! function-pointer (instance) flag and the locality flag. `origin` is
//! bookkeeping only and never takes part in equality or hashing.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::hash::{Hash, Hasher};

use crate::options::GeneratorOptions;
use crate::target::{PrimitiveType, TargetDeclaration, TargetItem, TargetType, ValueInfo};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrimitiveKind {
    Void,
    Int8,
    Int16,
    Int32,
    Int64,
    Float32,
    Float64,
    NativeInt,
    Pointer,
}

impl PrimitiveKind {
    pub fn mnemonic(self) -> &'static str {
        match self {
            PrimitiveKind::Void => "v",
            PrimitiveKind::Int8 => "i8",
            PrimitiveKind::Int16 => "i16",
            PrimitiveKind::Int32 => "i32",
            PrimitiveKind::Int64 => "i64",
            PrimitiveKind::Float32 => "f32",
            PrimitiveKind::Float64 => "f64",
            PrimitiveKind::NativeInt => "n",
            PrimitiveKind::Pointer => "p",
        }
    }

    fn integer_of_size(size: u32) -> Option<PrimitiveKind> {
        match size {
            1 => Some(PrimitiveKind::Int8),
            2 => Some(PrimitiveKind::Int16),
            4 => Some(PrimitiveKind::Int32),
            8 => Some(PrimitiveKind::Int64),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InteropSignature {
    pub return_kind: PrimitiveKind,
    pub param_kinds: Vec<PrimitiveKind>,
    /// Called through a vtable slot rather than a module export.
    pub is_function_pointer: bool,
    /// Thunk lives in the generated module instead of the shared one.
    pub is_local: bool,
    /// First method that produced this shape.
    #[serde(default)]
    pub origin: Option<String>,
}

impl PartialEq for InteropSignature {
    fn eq(&self, other: &Self) -> bool {
        self.return_kind == other.return_kind
            && self.param_kinds == other.param_kinds
            && self.is_function_pointer == other.is_function_pointer
            && self.is_local == other.is_local
    }
}

impl Eq for InteropSignature {}

impl Hash for InteropSignature {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.return_kind.hash(state);
        self.param_kinds.hash(state);
        self.is_function_pointer.hash(state);
        self.is_local.hash(state);
    }
}

impl InteropSignature {
    /// Canonical text of the identity fields, e.g. `i32(p,i32)|fp|shared`.
    pub fn canonical_key(&self) -> String {
        let params = self
            .param_kinds
            .iter()
            .map(|k| k.mnemonic())
            .collect::<Vec<_>>()
            .join(",");
        format!(
            "{}({})|{}|{}",
            self.return_kind.mnemonic(),
            params,
            if self.is_function_pointer { "fp" } else { "export" },
            if self.is_local { "local" } else { "shared" }
        )
    }

    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.canonical_key().as_bytes());
        format!("{:x}", hasher.finalize())
    }

    /// Stable name for the thunk implementing this signature.
    pub fn thunk_name(&self) -> String {
        format!("CallI_{}", &self.fingerprint()[..16])
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// DERIVATION
// ═══════════════════════════════════════════════════════════════════════════════

fn primitive_kind(primitive: PrimitiveType, pointer_size: u32) -> PrimitiveKind {
    match primitive {
        PrimitiveType::Void => PrimitiveKind::Void,
        PrimitiveType::F32 => PrimitiveKind::Float32,
        PrimitiveType::F64 => PrimitiveKind::Float64,
        PrimitiveType::ISize | PrimitiveType::USize => PrimitiveKind::NativeInt,
        PrimitiveType::Pointer => PrimitiveKind::Pointer,
        other => PrimitiveKind::integer_of_size(other.size(pointer_size))
            .unwrap_or(PrimitiveKind::Pointer),
    }
}

/// Call kind of one value as it is passed natively.
pub fn value_kind(value: &ValueInfo, pointer_size: u32) -> PrimitiveKind {
    if value.marshalling.passes_address() || value.pointer_depth > 0 {
        return PrimitiveKind::Pointer;
    }
    if value.marshalling.is_bool_as_int {
        return PrimitiveKind::integer_of_size(value.marshalling.pass_by_value_size_bytes)
            .unwrap_or(PrimitiveKind::Int32);
    }
    match &value.ty {
        TargetType::Void => PrimitiveKind::Void,
        TargetType::Primitive { primitive } => primitive_kind(*primitive, pointer_size),
        TargetType::Enum { underlying, .. } => primitive_kind(*underlying, pointer_size),
        TargetType::String { .. } | TargetType::Interface { .. } => PrimitiveKind::Pointer,
        TargetType::Struct { .. } => {
            PrimitiveKind::integer_of_size(value.marshalling.pass_by_value_size_bytes)
                .unwrap_or(PrimitiveKind::Pointer)
        }
    }
}

/// Builds the signature of a method from its native return and parameters.
pub fn derive_parts(
    returns: &ValueInfo,
    params: &[&ValueInfo],
    is_static: bool,
    options: &GeneratorOptions,
    origin: Option<&str>,
) -> InteropSignature {
    let pointer_size = options.pointer_size;
    let mut param_kinds = Vec::with_capacity(params.len() + 1);

    let mut return_kind = value_kind(returns, pointer_size);
    let hidden_return_buffer = matches!(returns.ty, TargetType::Struct { .. })
        && returns.pointer_depth == 0
        && PrimitiveKind::integer_of_size(returns.marshalling.pass_by_value_size_bytes).is_none();
    if hidden_return_buffer {
        return_kind = PrimitiveKind::Pointer;
        param_kinds.push(PrimitiveKind::Pointer);
    }

    param_kinds.extend(params.iter().map(|p| value_kind(p, pointer_size)));

    InteropSignature {
        return_kind,
        param_kinds,
        is_function_pointer: !is_static,
        is_local: options.local_interop,
        origin: origin.map(str::to_string),
    }
}

/// Signature of a built method node; `None` for anything else.
pub fn derive(method: &TargetDeclaration, options: &GeneratorOptions) -> Option<InteropSignature> {
    let info = method.method()?;
    let params: Vec<&ValueInfo> = method
        .children
        .iter()
        .filter_map(|child| match &child.item {
            TargetItem::Parameter(value) => Some(value),
            _ => None,
        })
        .collect();
    Some(derive_parts(
        &info.returns,
        &params,
        info.is_static,
        options,
        Some(method.qualified_name.as_str()),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::hash_map::DefaultHasher;
    use std::collections::HashMap;

    fn signature(ret: PrimitiveKind, params: &[PrimitiveKind]) -> InteropSignature {
        InteropSignature {
            return_kind: ret,
            param_kinds: params.to_vec(),
            is_function_pointer: true,
            is_local: false,
            origin: None,
        }
    }

    fn hash_of(sig: &InteropSignature) -> u64 {
        let mut hasher = DefaultHasher::new();
        sig.hash(&mut hasher);
        hasher.finish()
    }

    #[test]
    fn test_origin_does_not_affect_identity() {
        let a = InteropSignature {
            origin: Some("Lib.Device.Draw".to_string()),
            ..signature(PrimitiveKind::Int32, &[PrimitiveKind::Pointer, PrimitiveKind::Int32])
        };
        let b = InteropSignature {
            origin: Some("Lib.Device.Clear".to_string()),
            ..signature(PrimitiveKind::Int32, &[PrimitiveKind::Pointer, PrimitiveKind::Int32])
        };
        assert_eq!(a, b);
        assert_eq!(hash_of(&a), hash_of(&b));
        assert_eq!(a.fingerprint(), b.fingerprint());
    }

    #[test]
    fn test_hash_covers_more_than_return_kind() {
        let base = signature(PrimitiveKind::Int32, &[PrimitiveKind::Pointer]);
        let other_return = signature(PrimitiveKind::Void, &[PrimitiveKind::Pointer]);
        let other_params = signature(PrimitiveKind::Int32, &[PrimitiveKind::Int64]);
        let static_call = InteropSignature {
            is_function_pointer: false,
            ..base.clone()
        };

        assert_ne!(base, other_return);
        assert_ne!(hash_of(&base), hash_of(&other_return));
        assert_ne!(base, other_params);
        assert_ne!(base.canonical_key(), other_params.canonical_key());
        assert_ne!(base, static_call);

        let mut thunks = HashMap::new();
        for sig in [&base, &other_return, &other_params, &static_call] {
            thunks.entry(sig.clone()).or_insert_with(|| sig.thunk_name());
        }
        assert_eq!(thunks.len(), 4);
    }

    #[test]
    fn test_canonical_key_format() {
        let sig = signature(PrimitiveKind::Int32, &[PrimitiveKind::Pointer, PrimitiveKind::Float32]);
        assert_eq!(sig.canonical_key(), "i32(p,f32)|fp|shared");
        assert!(sig.thunk_name().starts_with("CallI_"));
        assert_eq!(sig.thunk_name().len(), "CallI_".len() + 16);
    }
}
