//! Template-argument deduction.
//!
//! Given a template's parameter-type patterns and a parallel list of
//! argument types, deduction computes a consistent binding of the template's
//! formal parameters, or fails. Failure is a normal outcome (the caller
//! treats it as "this candidate does not apply"); only structural misuse of
//! the engine — too many simultaneous arguments, mismatched array lengths —
//! panics.
//!
//! Two modes share one unifier:
//! - **Call deduction** (`is_function_call = true`): argument types go
//!   through the call-site adjustments first (reference binding,
//!   array/function-to-pointer decay, top-level cv stripping).
//! - **Ordering deduction** (`is_function_call = false`): exact structural
//!   matching, used by partial ordering where one template's parameters are
//!   deduced against the other's.

use fixedbitset::FixedBitSet;
use indexmap::IndexMap;
use rustc_hash::{FxBuildHasher, FxHashMap, FxHashSet};
use tracing::trace;

use cruxx_common::limits::{
    MAX_ARGUMENTS_FOR_DEDUCTION, STACK_PER_RECURSION, STACK_RED_ZONE,
};
use cruxx_common::Span;

use crate::context::DeclContext;
use crate::intern::TypeInterner;
use crate::types::{
    ArrayBound, CvQualifiers, SpecializationHead, SpecializationId, TemplateArgument,
    TemplateParamKind, TemplateParamList, TemplateParamRef, TypeData, TypeId,
};

/// Why a deduction attempt failed. All variants are ordinary negative
/// outcomes, not internal errors.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DeductionError {
    /// Two occurrences of the same template parameter deduced to
    /// incompatible arguments.
    Inconsistent { param: TemplateParamRef },
    /// A deduced argument does not fit the formal parameter's kind (e.g. a
    /// type argument for a non-type parameter).
    KindMismatch { param: TemplateParamRef },
    /// A parameter-type pattern does not structurally match the argument.
    Mismatch { parameter: TypeId, argument: TypeId },
    /// Non-type arguments disagree on a constant value.
    ValueMismatch { expected: i64, found: i64 },
    /// A template parameter was never bound: it appears only in non-deduced
    /// positions (or not at all).
    Undeduced { param: TemplateParamRef },
}

/// Deduce the template arguments of one template from a list of argument
/// types.
///
/// `template_params` is the formal parameter list (defines which
/// `TemplateParamRef`s are bindable); `template_args` is the specialization's
/// current argument list, whose shape the deduced result follows.
/// `parameters` and `arguments` are the parallel pattern/argument type
/// arrays; `original_parameters` are the pre-adjustment parameter types,
/// consulted by call-mode reference binding.
///
/// `explicit_template_args`, when present, pre-seeds bindings; deduction
/// that contradicts an explicit binding fails. On success the returned list
/// has every parameter's argument slot filled. On failure no partial state
/// escapes.
pub fn deduce_template_arguments(
    interner: &TypeInterner,
    template_params: &TemplateParamList,
    template_args: &TemplateParamList,
    arguments: &[TypeId],
    parameters: &[TypeId],
    original_parameters: &[TypeId],
    decl_context: &DeclContext,
    explicit_template_args: Option<&TemplateParamList>,
    locus: Span,
    is_function_call: bool,
) -> Result<TemplateParamList, DeductionError> {
    assert!(
        arguments.len() <= MAX_ARGUMENTS_FOR_DEDUCTION,
        "too many types for deduction ({} > {MAX_ARGUMENTS_FOR_DEDUCTION})",
        arguments.len()
    );
    assert_eq!(
        arguments.len(),
        parameters.len(),
        "deduction requires parallel parameter/argument arrays"
    );
    debug_assert_eq!(original_parameters.len(), parameters.len());

    trace!(
        num_arguments = arguments.len(),
        num_template_parameters = template_params.num_parameters(),
        is_function_call,
        ?locus,
        ?decl_context,
        "deducing template arguments"
    );

    let mut deducer = Deducer::new(interner, template_params);

    if let Some(explicit) = explicit_template_args {
        deducer.seed_explicit(explicit)?;
    }

    for (index, (&parameter, &argument)) in parameters.iter().zip(arguments).enumerate() {
        let (parameter, argument) = if is_function_call {
            deducer.adjust_call_pair(original_parameters[index], parameter, argument)
        } else {
            (parameter, argument)
        };
        deducer.unify(parameter, argument).inspect_err(|error| {
            trace!(
                index,
                parameter = %interner.display(parameter),
                argument = %interner.display(argument),
                ?error,
                "deduction failed"
            );
        })?;
    }

    deducer.into_deduced(template_args)
}

struct Deducer<'a> {
    interner: &'a TypeInterner,
    /// Formal parameters of the template being deduced; only these refs may
    /// receive bindings. Anything else is treated as a concrete type.
    bindable: FxHashSet<TemplateParamRef>,
    kinds: FxHashMap<TemplateParamRef, TemplateParamKind>,
    positions: FxHashMap<TemplateParamRef, usize>,
    bindings: IndexMap<TemplateParamRef, TemplateArgument, FxBuildHasher>,
    bound: FixedBitSet,
}

impl<'a> Deducer<'a> {
    fn new(interner: &'a TypeInterner, template_params: &TemplateParamList) -> Self {
        let mut bindable = FxHashSet::default();
        let mut kinds = FxHashMap::default();
        let mut positions = FxHashMap::default();
        for (index, param) in template_params.params.iter().enumerate() {
            bindable.insert(param.param);
            kinds.insert(param.param, param.kind.clone());
            positions.insert(param.param, index);
        }
        Self {
            interner,
            bindable,
            kinds,
            positions,
            bindings: IndexMap::default(),
            bound: FixedBitSet::with_capacity(template_params.num_parameters()),
        }
    }

    fn seed_explicit(&mut self, explicit: &TemplateParamList) -> Result<(), DeductionError> {
        for (index, param) in explicit.params.iter().enumerate() {
            if let Some(argument) = explicit.argument(index) {
                self.bind(param.param, *argument)?;
            }
        }
        Ok(())
    }

    fn is_bindable(&self, param: TemplateParamRef) -> bool {
        self.bindable.contains(&param)
    }

    fn bind(
        &mut self,
        param: TemplateParamRef,
        argument: TemplateArgument,
    ) -> Result<(), DeductionError> {
        if let Some(previous) = self.bindings.get(&param) {
            return if self.arguments_agree(previous, &argument) {
                Ok(())
            } else {
                Err(DeductionError::Inconsistent { param })
            };
        }
        let kind_ok = match (&argument, self.kinds.get(&param)) {
            (TemplateArgument::Type(_), Some(TemplateParamKind::Type)) => true,
            (
                TemplateArgument::Value(_) | TemplateArgument::ValueParam(_),
                Some(TemplateParamKind::NonType(_)),
            ) => true,
            (TemplateArgument::Template(_), Some(TemplateParamKind::Template)) => true,
            _ => false,
        };
        if !kind_ok {
            return Err(DeductionError::KindMismatch { param });
        }
        if let Some(&position) = self.positions.get(&param) {
            self.bound.insert(position);
        }
        self.bindings.insert(param, argument);
        Ok(())
    }

    fn arguments_agree(&self, previous: &TemplateArgument, candidate: &TemplateArgument) -> bool {
        match (previous, candidate) {
            (TemplateArgument::Type(a), TemplateArgument::Type(b)) => {
                self.interner.equivalent_types(*a, *b)
            }
            _ => previous == candidate,
        }
    }

    // =========================================================================
    // Structural unification
    // =========================================================================

    fn unify(&mut self, parameter: TypeId, argument: TypeId) -> Result<(), DeductionError> {
        stacker::maybe_grow(STACK_RED_ZONE, STACK_PER_RECURSION, || {
            self.unify_inner(parameter, argument)
        })
    }

    fn unify_inner(&mut self, parameter: TypeId, argument: TypeId) -> Result<(), DeductionError> {
        let parameter = self.interner.canonical(parameter);
        let argument = self.interner.canonical(argument);

        let parameter_data = self.interner.lookup(parameter);

        // A bindable template parameter absorbs the whole argument.
        if let Some(TypeData::TypeParam(param)) = &parameter_data {
            if self.is_bindable(*param) {
                return self.bind(*param, TemplateArgument::Type(argument));
            }
        }

        // `cv T` against `cv' X` with cv ⊆ cv': T absorbs the remainder
        // qualification (`const T` vs `const volatile int` binds
        // T = volatile int).
        if let Some(TypeData::Qualified(cv_param, inner)) = &parameter_data {
            let (cv_param, inner) = (*cv_param, *inner);
            if let Some(TypeData::TypeParam(param)) = self.interner.lookup(inner) {
                if self.is_bindable(param) {
                    let (cv_arg, core_arg) = self.split_cv(argument);
                    return if cv_arg.contains(cv_param) {
                        let remainder = self.interner.qualified(cv_arg - cv_param, core_arg);
                        self.bind(param, TemplateArgument::Type(remainder))
                    } else {
                        Err(DeductionError::Mismatch {
                            parameter,
                            argument,
                        })
                    };
                }
            }
        }

        if parameter == argument {
            return Ok(());
        }

        let mismatch = Err(DeductionError::Mismatch {
            parameter,
            argument,
        });

        match (parameter_data, self.interner.lookup(argument)) {
            (
                Some(TypeData::Qualified(cv_param, inner_param)),
                Some(TypeData::Qualified(cv_arg, inner_arg)),
            ) if cv_param == cv_arg => self.unify(inner_param, inner_arg),
            (Some(TypeData::Pointer(pointee_param)), Some(TypeData::Pointer(pointee_arg))) => {
                self.unify(pointee_param, pointee_arg)
            }
            (Some(TypeData::LvalueRef(inner_param)), Some(TypeData::LvalueRef(inner_arg)))
            | (Some(TypeData::RvalueRef(inner_param)), Some(TypeData::RvalueRef(inner_arg))) => {
                self.unify(inner_param, inner_arg)
            }
            (
                Some(TypeData::MemberPointer {
                    class_of: class_param,
                    pointee: pointee_param,
                }),
                Some(TypeData::MemberPointer {
                    class_of: class_arg,
                    pointee: pointee_arg,
                }),
            ) => {
                self.unify(class_param, class_arg)?;
                self.unify(pointee_param, pointee_arg)
            }
            (
                Some(TypeData::Array {
                    element: element_param,
                    bound: bound_param,
                }),
                Some(TypeData::Array {
                    element: element_arg,
                    bound: bound_arg,
                }),
            ) => {
                self.unify(element_param, element_arg)?;
                self.unify_bounds(bound_param, bound_arg, parameter, argument)
            }
            (Some(TypeData::Function(shape_param)), Some(TypeData::Function(shape_arg))) => {
                let shape_param = self.interner.function_shape(shape_param);
                let shape_arg = self.interner.function_shape(shape_arg);
                if shape_param.params.len() != shape_arg.params.len()
                    || shape_param.has_ellipsis != shape_arg.has_ellipsis
                    || shape_param.ref_qualifier != shape_arg.ref_qualifier
                {
                    return mismatch;
                }
                self.unify(shape_param.return_type, shape_arg.return_type)?;
                for (&p, &a) in shape_param.params.iter().zip(shape_arg.params.iter()) {
                    self.unify(p, a)?;
                }
                Ok(())
            }
            (Some(TypeData::Class(shape_param)), Some(TypeData::Class(shape_arg))) => {
                let shape_param = self.interner.class_shape(shape_param);
                let shape_arg = self.interner.class_shape(shape_arg);
                match (shape_param.specialization, shape_arg.specialization) {
                    (Some(info_param), Some(info_arg)) => {
                        self.unify_specializations(info_param, info_arg, parameter, argument)
                    }
                    // Distinct non-specialized classes (identical ones were
                    // caught by the id shortcut above).
                    _ => mismatch,
                }
            }
            _ => mismatch,
        }
    }

    fn unify_specializations(
        &mut self,
        info_param: SpecializationId,
        info_arg: SpecializationId,
        parameter: TypeId,
        argument: TypeId,
    ) -> Result<(), DeductionError> {
        let info_param = self.interner.specialization_info(info_param);
        let info_arg = self.interner.specialization_info(info_arg);

        // Heads: either the same template, or a bindable template template
        // parameter absorbing the argument's template.
        match (info_param.head, info_arg.head) {
            (SpecializationHead::Param(param), SpecializationHead::Template(def))
                if self.is_bindable(param) =>
            {
                self.bind(param, TemplateArgument::Template(def))?;
            }
            (SpecializationHead::Template(def_param), SpecializationHead::Template(def_arg))
                if def_param == def_arg => {}
            (SpecializationHead::Param(head_param), SpecializationHead::Param(head_arg))
                if head_param == head_arg => {}
            _ => {
                return Err(DeductionError::Mismatch {
                    parameter,
                    argument,
                });
            }
        }

        if info_param.template_args.num_parameters() != info_arg.template_args.num_parameters() {
            return Err(DeductionError::Mismatch {
                parameter,
                argument,
            });
        }

        for index in 0..info_param.template_args.num_parameters() {
            match (
                info_param.template_args.argument(index),
                info_arg.template_args.argument(index),
            ) {
                (Some(pattern), Some(bound)) => {
                    self.unify_template_argument(pattern, bound, parameter, argument)?;
                }
                (None, None) => {}
                _ => {
                    return Err(DeductionError::Mismatch {
                        parameter,
                        argument,
                    });
                }
            }
        }
        Ok(())
    }

    fn unify_template_argument(
        &mut self,
        pattern: &TemplateArgument,
        bound: &TemplateArgument,
        parameter: TypeId,
        argument: TypeId,
    ) -> Result<(), DeductionError> {
        match (pattern, bound) {
            (TemplateArgument::Type(p), TemplateArgument::Type(a)) => self.unify(*p, *a),
            (TemplateArgument::Value(expected), TemplateArgument::Value(found)) => {
                if expected == found {
                    Ok(())
                } else {
                    Err(DeductionError::ValueMismatch {
                        expected: *expected,
                        found: *found,
                    })
                }
            }
            (TemplateArgument::ValueParam(param), TemplateArgument::Value(value))
                if self.is_bindable(*param) =>
            {
                self.bind(*param, TemplateArgument::Value(*value))
            }
            (TemplateArgument::ValueParam(param), TemplateArgument::ValueParam(other))
                if self.is_bindable(*param) =>
            {
                self.bind(*param, TemplateArgument::ValueParam(*other))
            }
            (TemplateArgument::ValueParam(param), TemplateArgument::ValueParam(other))
                if param == other =>
            {
                Ok(())
            }
            (TemplateArgument::Template(p), TemplateArgument::Template(a)) if p == a => Ok(()),
            _ => Err(DeductionError::Mismatch {
                parameter,
                argument,
            }),
        }
    }

    fn unify_bounds(
        &mut self,
        bound_param: ArrayBound,
        bound_arg: ArrayBound,
        parameter: TypeId,
        argument: TypeId,
    ) -> Result<(), DeductionError> {
        match (bound_param, bound_arg) {
            (ArrayBound::Unbounded, ArrayBound::Unbounded) => Ok(()),
            (ArrayBound::Constant(expected), ArrayBound::Constant(found)) => {
                if expected == found {
                    Ok(())
                } else {
                    Err(DeductionError::ValueMismatch {
                        expected: expected as i64,
                        found: found as i64,
                    })
                }
            }
            (ArrayBound::Param(param), ArrayBound::Constant(value))
                if self.is_bindable(param) =>
            {
                self.bind(param, TemplateArgument::Value(value as i64))
            }
            (ArrayBound::Param(param), ArrayBound::Param(other)) if self.is_bindable(param) => {
                self.bind(param, TemplateArgument::ValueParam(other))
            }
            (ArrayBound::Param(param), ArrayBound::Param(other)) if param == other => Ok(()),
            _ => Err(DeductionError::Mismatch {
                parameter,
                argument,
            }),
        }
    }

    // =========================================================================
    // Call-site adjustments
    // =========================================================================

    /// Adjust a (parameter, argument) pair for call deduction.
    ///
    /// - Reference parameters bind against the argument with its reference
    ///   stripped (a forwarding `T&&` against an lvalue reference binds `T`
    ///   to the lvalue reference itself, so collapsing yields `T&`).
    /// - Non-reference parameters see the argument after decay: reference
    ///   stripped, arrays and functions to pointers, top-level cv dropped
    ///   from both sides.
    fn adjust_call_pair(
        &self,
        original_parameter: TypeId,
        parameter: TypeId,
        argument: TypeId,
    ) -> (TypeId, TypeId) {
        let interner = self.interner;
        match interner.lookup(interner.canonical(original_parameter)) {
            Some(TypeData::LvalueRef(referenced)) => (referenced, self.strip_reference(argument)),
            Some(TypeData::RvalueRef(referenced)) => {
                let is_forwarding = matches!(
                    interner.lookup(referenced),
                    Some(TypeData::TypeParam(param)) if self.is_bindable(param)
                );
                match interner.lookup(argument) {
                    // Forwarding reference vs lvalue: T deduces to X&.
                    Some(TypeData::LvalueRef(_)) if is_forwarding => (referenced, argument),
                    Some(TypeData::RvalueRef(inner)) => (referenced, inner),
                    _ => (referenced, argument),
                }
            }
            _ => {
                let argument = self.decay(self.strip_reference(argument));
                let (_, parameter) = self.split_cv(parameter);
                let (_, argument) = self.split_cv(argument);
                (parameter, argument)
            }
        }
    }

    fn strip_reference(&self, ty: TypeId) -> TypeId {
        match self.interner.lookup(ty) {
            Some(TypeData::LvalueRef(inner)) | Some(TypeData::RvalueRef(inner)) => inner,
            _ => ty,
        }
    }

    fn decay(&self, ty: TypeId) -> TypeId {
        let (_, core) = self.split_cv(ty);
        match self.interner.lookup(core) {
            Some(TypeData::Array { element, .. }) => self.interner.pointer(element),
            Some(TypeData::Function(_)) => self.interner.pointer(core),
            _ => ty,
        }
    }

    fn split_cv(&self, ty: TypeId) -> (CvQualifiers, TypeId) {
        match self.interner.lookup(ty) {
            Some(TypeData::Qualified(cv, inner)) => (cv, inner),
            _ => (CvQualifiers::empty(), ty),
        }
    }

    // =========================================================================
    // Result construction
    // =========================================================================

    /// Build the complete deduced argument list, failing if any formal
    /// parameter is still unbound.
    fn into_deduced(self, template_args: &TemplateParamList) -> Result<TemplateParamList, DeductionError> {
        let mut deduced = template_args.duplicate();
        deduced.clear_arguments();
        for (index, param) in deduced.params.clone().iter().enumerate() {
            match self.bindings.get(&param.param) {
                Some(argument) => deduced.set_argument(index, *argument),
                None => return Err(DeductionError::Undeduced { param: param.param }),
            }
        }
        debug_assert_eq!(
            self.bound.count_ones(..),
            deduced.num_parameters(),
            "binding bitset out of sync with deduced arguments"
        );
        Ok(deduced)
    }
}
