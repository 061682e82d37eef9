//! Rule-driven annotations attached to native declarations.
//!
//! Every field is independently optional: `None` means "no opinion". Merging
//! only ever overwrites a field when the overriding tag sets it, so applying
//! rules in order gives last-rule-wins per field.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    Public,
    Internal,
    Protected,
    Private,
}

impl Default for Visibility {
    fn default() -> Self {
        Visibility::Public
    }
}

/// How a parameter crosses the boundary, from the managed side's view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ParamPassing {
    In,
    Out,
    Ref,
    RefIn,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Tag {
    /// Final name, or a replacement pattern using `$1`-style captures.
    pub rename: Option<String>,
    /// Target type override, same capture syntax as `rename`.
    pub type_name: Option<String>,
    pub pointer_depth: Option<u32>,
    /// `Some(0)` turns an array into a scalar.
    pub array_dimension: Option<u32>,
    pub visibility: Option<Visibility>,
    pub namespace: Option<String>,
    pub hidden: Option<bool>,
    pub property: Option<bool>,
    pub persist: Option<bool>,
    pub enum_is_flags: Option<bool>,
    pub enum_has_none: Option<bool>,
    pub callback: Option<bool>,
    pub dual_callback: Option<bool>,
    pub struct_has_native_shadow: Option<bool>,
    pub struct_to_class: Option<bool>,
    pub struct_custom_marshal: Option<bool>,
    pub struct_custom_new: Option<bool>,
    pub parameter: Option<ParamPassing>,
    pub param_return: Option<bool>,
    pub pass_by_value: Option<bool>,
    pub optional: Option<bool>,
    pub dll_name: Option<String>,
}

macro_rules! overlay {
    ($base:ident, $over:ident, $($field:ident),+ $(,)?) => {
        $(
            if $over.$field.is_some() {
                $base.$field = $over.$field.clone();
            }
        )+
    };
}

/// Overlays every field set on `over` onto `base`.
pub fn merge(base: &Tag, over: &Tag) -> Tag {
    let mut merged = base.clone();
    overlay!(
        merged,
        over,
        rename,
        type_name,
        pointer_depth,
        array_dimension,
        visibility,
        namespace,
        hidden,
        property,
        persist,
        enum_is_flags,
        enum_has_none,
        callback,
        dual_callback,
        struct_has_native_shadow,
        struct_to_class,
        struct_custom_marshal,
        struct_custom_new,
        parameter,
        param_return,
        pass_by_value,
        optional,
        dll_name,
    );
    merged
}

impl Tag {
    pub fn is_empty(&self) -> bool {
        *self == Tag::default()
    }

    pub fn flag(value: Option<bool>) -> bool {
        value.unwrap_or(false)
    }

    pub fn is_hidden(&self) -> bool {
        Tag::flag(self.hidden)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn renamed(name: &str) -> Tag {
        Tag {
            rename: Some(name.to_string()),
            ..Tag::default()
        }
    }

    #[test]
    fn test_merge_keeps_unset_fields() {
        let base = Tag {
            visibility: Some(Visibility::Internal),
            ..renamed("First")
        };
        let over = Tag {
            struct_has_native_shadow: Some(true),
            ..Tag::default()
        };

        let merged = merge(&base, &over);
        assert_eq!(merged.rename.as_deref(), Some("First"));
        assert_eq!(merged.visibility, Some(Visibility::Internal));
        assert_eq!(merged.struct_has_native_shadow, Some(true));
    }

    #[test]
    fn test_merge_last_wins_and_is_not_commutative() {
        let r1 = Tag {
            pointer_depth: Some(1),
            ..renamed("One")
        };
        let r2 = Tag {
            visibility: Some(Visibility::Private),
            ..renamed("Two")
        };

        let forward = merge(&merge(&Tag::default(), &r1), &r2);
        assert_eq!(forward.rename.as_deref(), Some("Two"));
        assert_eq!(forward.pointer_depth, Some(1));
        assert_eq!(forward.visibility, Some(Visibility::Private));

        let backward = merge(&merge(&Tag::default(), &r2), &r1);
        assert_eq!(backward.rename.as_deref(), Some("One"));
        assert_ne!(forward, backward);
    }

    #[test]
    fn test_merge_is_associative_per_field() {
        let a = renamed("A");
        let b = Tag {
            hidden: Some(true),
            ..Tag::default()
        };
        let c = renamed("C");

        let left = merge(&merge(&a, &b), &c);
        let right = merge(&a, &merge(&b, &c));
        assert_eq!(left, right);
    }

    #[test]
    fn test_tag_deserializes_sparse_json() {
        let tag: Tag =
            serde_json::from_str(r#"{ "rename": "My$1", "parameter": "ref-in" }"#).unwrap();
        assert_eq!(tag.rename.as_deref(), Some("My$1"));
        assert_eq!(tag.parameter, Some(ParamPassing::RefIn));
        assert!(tag.visibility.is_none());
    }
}
