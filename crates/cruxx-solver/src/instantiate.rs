//! Type substitution: rewriting a type under a deduced template-parameter
//! binding.
//!
//! [`update_type`] replaces every template-parameter occurrence in a type
//! with its bound argument, rebuilding the surrounding structure through the
//! interner's normalizing constructors (so reference collapsing and cv
//! merging fall out of construction). The rewrite returns `None` when the
//! substituted type is not constructible: a negative array bound, a pointer
//! to member of a non-class, a reference to void, or a parameter the
//! binding does not cover. `None` is a normal outcome — partial ordering
//! treats it as "this candidate does not apply".

use indexmap::IndexMap;
use rustc_hash::FxBuildHasher;
use tracing::trace;

use cruxx_common::limits::{MAX_TYPE_UPDATE_DEPTH, STACK_PER_RECURSION, STACK_RED_ZONE};
use cruxx_common::Span;

use crate::context::DeclContext;
use crate::intern::TypeInterner;
use crate::types::{
    ArrayBound, SpecializationHead, TemplateArgument, TemplateParamList, TemplateParamRef,
    TypeData, TypeId,
};

/// Mapping from template parameters to their bound arguments.
#[derive(Clone, Debug, Default)]
pub struct TypeSubstitution {
    map: IndexMap<TemplateParamRef, TemplateArgument, FxBuildHasher>,
}

impl TypeSubstitution {
    pub fn new() -> Self {
        Self::default()
    }

    /// Substitution holding every bound argument of a template-parameter
    /// list. Unbound slots contribute nothing.
    pub fn from_template_arguments(binding: &TemplateParamList) -> Self {
        let mut substitution = Self::new();
        for (index, param) in binding.params.iter().enumerate() {
            if let Some(argument) = binding.argument(index) {
                substitution.insert(param.param, *argument);
            }
        }
        substitution
    }

    pub fn insert(&mut self, param: TemplateParamRef, argument: TemplateArgument) {
        self.map.insert(param, argument);
    }

    pub fn get(&self, param: TemplateParamRef) -> Option<&TemplateArgument> {
        self.map.get(&param)
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }
}

/// Rewrite `ty` under the template-parameter binding carried by `context`.
///
/// Returns the substituted type, or `None` when the result is not
/// constructible. Reapplying the result through a binding it no longer
/// mentions is the identity.
pub fn update_type(
    interner: &TypeInterner,
    ty: TypeId,
    context: &DeclContext,
    locus: Span,
) -> Option<TypeId> {
    let substitution = context
        .template_parameters()
        .map(TypeSubstitution::from_template_arguments)
        .unwrap_or_default();
    let updated = update_guarded(interner, ty, &substitution, 0);
    if updated.is_none() {
        trace!(
            ty = %interner.display(ty),
            ?locus,
            "substituted type is not constructible"
        );
    }
    updated
}

/// Rewrite `ty` under an explicit substitution.
pub fn update_type_with(
    interner: &TypeInterner,
    ty: TypeId,
    substitution: &TypeSubstitution,
) -> Option<TypeId> {
    update_guarded(interner, ty, substitution, 0)
}

fn update_guarded(
    interner: &TypeInterner,
    ty: TypeId,
    substitution: &TypeSubstitution,
    depth: u32,
) -> Option<TypeId> {
    if depth > MAX_TYPE_UPDATE_DEPTH {
        trace!(depth, "type update recursion limit exceeded");
        return None;
    }
    stacker::maybe_grow(STACK_RED_ZONE, STACK_PER_RECURSION, || {
        update_inner(interner, ty, substitution, depth)
    })
}

fn update_inner(
    interner: &TypeInterner,
    ty: TypeId,
    substitution: &TypeSubstitution,
    depth: u32,
) -> Option<TypeId> {
    match interner.lookup(ty)? {
        TypeData::Intrinsic(_) => Some(ty),
        TypeData::TypeParam(param) => match substitution.get(param) {
            Some(TemplateArgument::Type(bound)) => Some(*bound),
            // Value/template bindings cannot stand where a type is needed,
            // and an uncovered parameter has nothing to become.
            _ => None,
        },
        TypeData::Qualified(cv, inner) => {
            let inner = update_guarded(interner, inner, substitution, depth + 1)?;
            Some(interner.qualified(cv, inner))
        }
        TypeData::Pointer(pointee) => {
            let pointee = update_guarded(interner, pointee, substitution, depth + 1)?;
            Some(interner.pointer(pointee))
        }
        TypeData::LvalueRef(inner) => {
            let inner = update_guarded(interner, inner, substitution, depth + 1)?;
            if inner == TypeId::VOID {
                return None;
            }
            Some(interner.lvalue_ref(inner))
        }
        TypeData::RvalueRef(inner) => {
            let inner = update_guarded(interner, inner, substitution, depth + 1)?;
            if inner == TypeId::VOID {
                return None;
            }
            Some(interner.rvalue_ref(inner))
        }
        TypeData::MemberPointer { class_of, pointee } => {
            let class_of = update_guarded(interner, class_of, substitution, depth + 1)?;
            if !interner.is_class_type(class_of) {
                return None;
            }
            let pointee = update_guarded(interner, pointee, substitution, depth + 1)?;
            Some(interner.member_pointer(class_of, pointee))
        }
        TypeData::Array { element, bound } => {
            let element = update_guarded(interner, element, substitution, depth + 1)?;
            let bound = match bound {
                ArrayBound::Unbounded | ArrayBound::Constant(_) => bound,
                ArrayBound::Param(param) => match substitution.get(param) {
                    Some(TemplateArgument::Value(value)) => {
                        if *value < 0 {
                            // Substitution produced a negative array bound.
                            return None;
                        }
                        ArrayBound::Constant(*value as u64)
                    }
                    Some(TemplateArgument::ValueParam(other)) => ArrayBound::Param(*other),
                    _ => return None,
                },
            };
            Some(interner.array(element, bound))
        }
        TypeData::Function(shape) => {
            let shape = interner.function_shape(shape);
            let return_type =
                update_guarded(interner, shape.return_type, substitution, depth + 1)?;
            let mut params = Vec::with_capacity(shape.params.len());
            for &param in &shape.params {
                params.push(update_guarded(interner, param, substitution, depth + 1)?);
            }
            Some(interner.function(
                return_type,
                &params,
                shape.has_ellipsis,
                shape.ref_qualifier,
            ))
        }
        TypeData::Class(shape_id) => {
            let shape = interner.class_shape(shape_id);
            let Some(info_id) = shape.specialization else {
                return Some(ty);
            };
            let info = interner.specialization_info(info_id);
            // Primary specializations carry no bound arguments and mention
            // no substitutable parameters of their own.
            if !info.template_args.is_fully_bound() {
                return Some(ty);
            }
            let def = match info.head {
                SpecializationHead::Template(def) => def,
                SpecializationHead::Param(param) => match substitution.get(param) {
                    Some(TemplateArgument::Template(def)) => *def,
                    _ => return None,
                },
            };
            let mut updated_args = Vec::with_capacity(info.template_args.num_parameters());
            for index in 0..info.template_args.num_parameters() {
                let argument = info.template_args.argument(index)?;
                updated_args.push(update_template_argument(
                    interner,
                    argument,
                    substitution,
                    depth,
                )?);
            }
            Some(interner.class_template_specialization(def, &updated_args))
        }
        // The wrapper is template bookkeeping; substitution rewrites the
        // structural type underneath.
        TypeData::Specialized { underlying, .. } => {
            update_guarded(interner, underlying, substitution, depth + 1)
        }
    }
}

fn update_template_argument(
    interner: &TypeInterner,
    argument: &TemplateArgument,
    substitution: &TypeSubstitution,
    depth: u32,
) -> Option<TemplateArgument> {
    match argument {
        TemplateArgument::Type(ty) => Some(TemplateArgument::Type(update_guarded(
            interner,
            *ty,
            substitution,
            depth + 1,
        )?)),
        TemplateArgument::Value(value) => Some(TemplateArgument::Value(*value)),
        TemplateArgument::ValueParam(param) => match substitution.get(*param) {
            Some(TemplateArgument::Value(value)) => Some(TemplateArgument::Value(*value)),
            Some(TemplateArgument::ValueParam(other)) => {
                Some(TemplateArgument::ValueParam(*other))
            }
            _ => None,
        },
        TemplateArgument::Template(def) => Some(TemplateArgument::Template(*def)),
    }
}
