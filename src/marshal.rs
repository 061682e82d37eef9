//! Marshalling classifier.
//!
//! Decides how one parameter, field or return value crosses the boundary.
//! The ladder is checked in this exact order and the first step that
//! matches wins:
//!
//! 1. Array of interface pointers with a native collection wrapper
//! 2. `out` interface → temporary handle slot
//! 3. `ref-in` small value without a native shadow → direct value pointer
//! 4. `ref-in` optional value → conditional pointer
//! 5. Bool projected to an integer → temporary integer
//! 6. String → pinned/temporary buffer
//! 7. Everything else (interface handle, pinned array, shadow temporary,
//!    by-reference, direct)

use serde::{Deserialize, Serialize};

use crate::options::GeneratorOptions;
use crate::registry::ValueFacts;
use crate::tag::ParamPassing;
use crate::target::TargetType;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MarshalStrategy {
    NativeCollection,
    OutHandleSlot,
    ValuePointer,
    ConditionalPointer,
    BoolTemporary,
    StringBuffer,
    InterfaceHandle,
    PinnedArray,
    ShadowTemporary,
    ByRef,
    Direct,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarshallingProfile {
    pub strategy: MarshalStrategy,
    pub is_array: bool,
    pub is_reference: bool,
    pub is_fixed_required: bool,
    pub is_optional_value: bool,
    pub is_bool_as_int: bool,
    pub is_string: bool,
    pub is_wide_string: bool,
    pub is_interface_pointer: bool,
    pub pass_by_value_size_bytes: u32,
    /// Temporary is written before the call.
    pub copies_in: bool,
    /// Temporary is read back after the call.
    pub copies_out: bool,
}

impl MarshallingProfile {
    fn new(strategy: MarshalStrategy, input: &MarshalInput<'_>) -> Self {
        MarshallingProfile {
            strategy,
            is_array: input.is_array,
            is_reference: false,
            is_fixed_required: false,
            is_optional_value: false,
            is_bool_as_int: false,
            is_string: false,
            is_wide_string: false,
            is_interface_pointer: input.ty.is_interface(),
            pass_by_value_size_bytes: input.facts.size,
            copies_in: false,
            copies_out: false,
        }
    }

    /// Whether the native side receives an address rather than the value.
    pub fn passes_address(&self) -> bool {
        self.is_reference || self.is_array || self.is_string
    }
}

/// Everything the classifier looks at for one value.
#[derive(Debug, Clone, Copy)]
pub struct MarshalInput<'t> {
    pub ty: &'t TargetType,
    pub pointer_depth: u32,
    pub is_array: bool,
    pub passing: Option<ParamPassing>,
    pub is_optional: bool,
    /// Explicit pass-by-value tag.
    pub pass_by_value: bool,
    pub bool_as_int: bool,
    pub facts: ValueFacts,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LadderStep {
    InterfaceArray = 1,
    OutInterface = 2,
    RefInSmallValue = 3,
    RefInOptional = 4,
    BoolAsInt = 5,
    String = 6,
    Default = 7,
}

impl LadderStep {
    /// Step whose outcome uses `strategy`.
    fn producing(strategy: MarshalStrategy) -> LadderStep {
        match strategy {
            MarshalStrategy::NativeCollection => LadderStep::InterfaceArray,
            MarshalStrategy::OutHandleSlot => LadderStep::OutInterface,
            MarshalStrategy::ValuePointer => LadderStep::RefInSmallValue,
            MarshalStrategy::ConditionalPointer => LadderStep::RefInOptional,
            MarshalStrategy::BoolTemporary => LadderStep::BoolAsInt,
            MarshalStrategy::StringBuffer => LadderStep::String,
            MarshalStrategy::InterfaceHandle
            | MarshalStrategy::PinnedArray
            | MarshalStrategy::ShadowTemporary
            | MarshalStrategy::ByRef
            | MarshalStrategy::Direct => LadderStep::Default,
        }
    }
}

/// Ladder steps whose outcome shows up in `profile`, through its strategy
/// or through a flag only that step sets.
pub fn outcome_steps(profile: &MarshallingProfile) -> Vec<LadderStep> {
    let mut steps = vec![LadderStep::producing(profile.strategy)];
    let flagged = [
        (profile.is_optional_value, LadderStep::RefInOptional),
        (profile.is_bool_as_int, LadderStep::BoolAsInt),
        (profile.is_string, LadderStep::String),
    ];
    for (set, step) in flagged {
        if set && !steps.contains(&step) {
            steps.push(step);
        }
    }
    steps
}

/// A profile is unambiguous when `chosen` is the only step it carries an
/// outcome of.
pub fn is_unambiguous(profile: &MarshallingProfile, chosen: LadderStep) -> bool {
    outcome_steps(profile) == [chosen]
}

fn is_by_ref(passing: Option<ParamPassing>) -> bool {
    matches!(
        passing,
        Some(ParamPassing::Out) | Some(ParamPassing::Ref) | Some(ParamPassing::RefIn)
    )
}

/// Every ladder step whose condition holds, in priority order. The last
/// entry is always [`LadderStep::Default`].
pub fn ladder_matches(input: &MarshalInput<'_>, options: &GeneratorOptions) -> Vec<LadderStep> {
    let ref_in = input.passing == Some(ParamPassing::RefIn);
    let mut steps = Vec::new();

    if input.is_array && input.ty.is_interface() && options.interface_array_wrapper {
        steps.push(LadderStep::InterfaceArray);
    }
    if input.passing == Some(ParamPassing::Out) && input.ty.is_interface() {
        steps.push(LadderStep::OutInterface);
    }
    if ref_in
        && !input.is_array
        && input.ty.is_value_type()
        && (input.facts.size <= options.pass_by_value_threshold || input.pass_by_value)
        && !input.facts.needs_shadow
    {
        steps.push(LadderStep::RefInSmallValue);
    }
    if ref_in && input.is_optional && !input.is_array {
        steps.push(LadderStep::RefInOptional);
    }
    if input.bool_as_int {
        steps.push(LadderStep::BoolAsInt);
    }
    if matches!(input.ty, TargetType::String { .. }) {
        steps.push(LadderStep::String);
    }
    steps.push(LadderStep::Default);
    steps
}

pub fn classify(input: &MarshalInput<'_>, options: &GeneratorOptions) -> MarshallingProfile {
    let steps = ladder_matches(input, options);
    let by_ref = is_by_ref(input.passing);

    let profile = match steps[0] {
        LadderStep::InterfaceArray => MarshallingProfile::new(MarshalStrategy::NativeCollection, input),
        LadderStep::OutInterface => MarshallingProfile {
            is_reference: true,
            copies_out: true,
            ..MarshallingProfile::new(MarshalStrategy::OutHandleSlot, input)
        },
        LadderStep::RefInSmallValue => MarshallingProfile {
            is_reference: true,
            is_fixed_required: true,
            ..MarshallingProfile::new(MarshalStrategy::ValuePointer, input)
        },
        LadderStep::RefInOptional => MarshallingProfile {
            is_reference: true,
            is_optional_value: true,
            copies_in: true,
            ..MarshallingProfile::new(MarshalStrategy::ConditionalPointer, input)
        },
        LadderStep::BoolAsInt => MarshallingProfile {
            is_reference: by_ref,
            is_bool_as_int: true,
            copies_in: input.passing != Some(ParamPassing::Out),
            copies_out: matches!(input.passing, Some(ParamPassing::Out) | Some(ParamPassing::Ref)),
            ..MarshallingProfile::new(MarshalStrategy::BoolTemporary, input)
        },
        LadderStep::String => {
            let wide = matches!(input.ty, TargetType::String { wide: true });
            MarshallingProfile {
                is_fixed_required: true,
                is_string: true,
                is_wide_string: wide,
                ..MarshallingProfile::new(MarshalStrategy::StringBuffer, input)
            }
        }
        LadderStep::Default => classify_default(input, by_ref),
    };

    assert!(
        is_unambiguous(&profile, steps[0]),
        "ambiguous marshalling classification: {:?} carries outcomes {:?}, ladder chose {:?}",
        profile,
        outcome_steps(&profile),
        steps[0]
    );
    profile
}

fn classify_default(input: &MarshalInput<'_>, by_ref: bool) -> MarshallingProfile {
    if input.ty.is_interface() {
        return MarshallingProfile {
            is_reference: input.passing == Some(ParamPassing::Ref),
            ..MarshallingProfile::new(MarshalStrategy::InterfaceHandle, input)
        };
    }
    if input.is_array {
        return MarshallingProfile {
            is_fixed_required: true,
            copies_out: matches!(input.passing, Some(ParamPassing::Out) | Some(ParamPassing::Ref)),
            ..MarshallingProfile::new(MarshalStrategy::PinnedArray, input)
        };
    }
    if input.facts.needs_shadow && input.pointer_depth <= 1 && input.ty.is_value_type() {
        return MarshallingProfile {
            is_reference: by_ref,
            copies_in: input.passing != Some(ParamPassing::Out),
            copies_out: matches!(input.passing, Some(ParamPassing::Out) | Some(ParamPassing::Ref)),
            ..MarshallingProfile::new(MarshalStrategy::ShadowTemporary, input)
        };
    }
    if by_ref {
        return MarshallingProfile {
            is_reference: true,
            is_fixed_required: true,
            ..MarshallingProfile::new(MarshalStrategy::ByRef, input)
        };
    }
    MarshallingProfile::new(MarshalStrategy::Direct, input)
}
