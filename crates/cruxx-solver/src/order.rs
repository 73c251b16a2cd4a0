//! Partial ordering of template specializations.
//!
//! Given two function-template signatures, decides whether the first is "at
//! most as specialized" as the second: the first's parameter-type patterns
//! are deduced against the second's parameter types, the deduced binding is
//! substituted back into the first's parameters, and the result must
//! reproduce the second's parameter types exactly. Callers run the
//! comparison once in each direction; exactly one success is a strict
//! ordering, two are a tie, zero an ambiguity.
//!
//! Class-template ordering reduces to the function case by wrapping each
//! class specialization in a synthesized single-parameter function type.
//!
//! Negative outcomes (arity mismatch, deduction failure, unconstructible
//! substitution, equivalence mismatch) are ordinary `None` results. Calling
//! these entry points on the wrong kind of type is a caller bug upstream
//! and panics.

use smallvec::SmallVec;
use tracing::debug;

use cruxx_common::limits::PARAM_LIST_INLINE;
use cruxx_common::Span;

use crate::context::DeclContext;
use crate::deduce::deduce_template_arguments;
use crate::instantiate::update_type;
use crate::intern::TypeInterner;
use crate::types::{RefQualifier, TemplateParamList, TypeId};

type TypeList = SmallVec<[TypeId; PARAM_LIST_INLINE]>;

/// Is `f1` less-or-equal specialized than `f2`?
///
/// `Some(deduced)` carries the deduced template arguments of `f1` for reuse
/// by the caller; `None` is the ordinary negative outcome. The
/// `is_conversion` flag selects the conversion-function variant, which
/// compares only the single transformed parameter and never forwards
/// `explicit_template_args` — picking the wrong variant silently produces
/// wrong orderings, so callers must dispatch on the language construct.
pub fn compare_function_template_specialization(
    interner: &TypeInterner,
    f1: TypeId,
    f2: TypeId,
    decl_context: &DeclContext,
    explicit_template_args: Option<&TemplateParamList>,
    locus: Span,
    is_conversion: bool,
) -> Option<TemplateParamList> {
    if is_conversion {
        return compare_conversion_function(interner, f1, f2, decl_context, locus);
    }

    assert!(
        interner.is_function_type(f1) && interner.is_function_type(f2),
        "partial ordering of function templates requires function types"
    );

    debug!(
        f1 = %interner.display(f1),
        f2 = %interner.display(f2),
        "computing whether one function type is less or equal specialized than the other"
    );

    let num_arguments = interner.function_num_parameters(f2);
    let num_parameters = interner.function_num_parameters(f1);

    if num_arguments != num_parameters {
        debug!("not less or equal specialized: parameter counts differ");
        return None;
    }

    let mut arguments = TypeList::new();
    let mut parameters = TypeList::new();
    let mut original_parameters = TypeList::new();
    for index in 0..num_arguments {
        arguments.push(interner.function_parameter_type(f2, index));
        let parameter = interner.function_parameter_type(f1, index);
        parameters.push(parameter);
        original_parameters.push(parameter);
    }

    // Deduce f1's template parameters using f2's parameter types.
    let info = interner
        .specialization_of(f1)
        .expect("partial ordering requires a template-specialized function type");
    let info = interner.specialization_info(info);

    let deduced = match deduce_template_arguments(
        interner,
        &info.template_params,
        &info.template_args,
        &arguments,
        &parameters,
        &original_parameters,
        decl_context,
        explicit_template_args,
        locus,
        /* is_function_call */ false,
    ) {
        Ok(deduced) => deduced,
        Err(error) => {
            debug!(?error, "not less or equal specialized: no deduction was possible");
            return None;
        }
    };

    let updated_context = decl_context.with_template_parameters(deduced.duplicate());

    // The deduced binding must rebuild f2's parameter types exactly.
    for index in 0..num_arguments {
        let original_type = interner.function_parameter_type(f1, index);
        let Some(updated_type) = update_type(interner, original_type, &updated_context, locus)
        else {
            debug!(
                index,
                "not less or equal specialized: the deduced type was not constructible"
            );
            return None;
        };

        let argument_type = interner.function_parameter_type(f2, index);
        if !interner.equivalent_types(updated_type, argument_type) {
            debug!(
                index,
                updated = %interner.display(updated_type),
                argument = %interner.display(argument_type),
                "not less or equal specialized: updated parameter does not match argument"
            );
            return None;
        }
    }

    debug!("it is less or equal specialized");
    Some(deduced)
}

/// Conversion-function variant: same verification on exactly one parameter
/// (the transformed implicit parameter), with no explicit template
/// arguments.
fn compare_conversion_function(
    interner: &TypeInterner,
    f1: TypeId,
    f2: TypeId,
    decl_context: &DeclContext,
    locus: Span,
) -> Option<TemplateParamList> {
    assert!(
        interner.is_function_type(f1) && interner.is_function_type(f2),
        "partial ordering of conversion functions requires function types"
    );

    debug!(
        f1 = %interner.display(f1),
        f2 = %interner.display(f2),
        "computing whether one conversion function is less or equal specialized than the other"
    );

    let num_arguments = interner.function_num_parameters(f2);
    let num_parameters = interner.function_num_parameters(f1);

    if num_arguments != num_parameters {
        debug!("not less or equal specialized: parameter counts differ");
        return None;
    }
    assert!(
        num_parameters >= 1,
        "conversion-function ordering requires the transformed parameter"
    );

    let arguments = [interner.function_parameter_type(f2, 0)];
    let parameters = [interner.function_parameter_type(f1, 0)];

    let info = interner
        .specialization_of(f1)
        .expect("partial ordering requires a template-specialized function type");
    let info = interner.specialization_info(info);

    let deduced = match deduce_template_arguments(
        interner,
        &info.template_params,
        &info.template_args,
        &arguments,
        &parameters,
        &parameters,
        decl_context,
        /* explicit_template_args */ None,
        locus,
        /* is_function_call */ false,
    ) {
        Ok(deduced) => deduced,
        Err(error) => {
            debug!(?error, "not less or equal specialized: no deduction was possible");
            return None;
        }
    };

    let updated_context = decl_context.with_template_parameters(deduced.duplicate());

    let updated_type = match update_type(interner, parameters[0], &updated_context, locus) {
        Some(updated_type) => updated_type,
        None => {
            debug!("not less or equal specialized: the deduced type was not constructible");
            return None;
        }
    };

    if !interner.equivalent_types(updated_type, arguments[0]) {
        debug!(
            updated = %interner.display(updated_type),
            argument = %interner.display(arguments[0]),
            "not less or equal specialized: updated parameter does not match argument"
        );
        return None;
    }

    debug!("it is less or equal specialized");
    Some(deduced)
}

/// Is class specialization `c1` less-or-equal specialized than `c2`?
///
/// Reduces to the function case: each class is wrapped as the single
/// parameter of a synthesized `void(...)` function type, and `c1`'s
/// template-parameter list is duplicated with every bound argument cleared
/// so deduction sees the generic shape rather than an already-bound copy.
/// The synthesized template definition is scratch state, released on every
/// exit path.
pub fn compare_class_template_specialization(
    interner: &TypeInterner,
    c1: TypeId,
    c2: TypeId,
    decl_context: &DeclContext,
    locus: Span,
) -> Option<TemplateParamList> {
    assert!(
        interner.is_named_class_type(c1)
            && interner.is_named_class_type(c2)
            && interner.is_template_specialized_type(c1)
            && interner.is_template_specialized_type(c2),
        "partial ordering of class templates requires template-specialized class types"
    );

    let faked_primary_type_1 =
        interner.function(TypeId::VOID, &[c1], false, RefQualifier::None);
    let faked_type_2 = interner.function(TypeId::VOID, &[c2], false, RefQualifier::None);

    let info_1 = interner.specialization_info(
        interner
            .specialization_of(c1)
            .expect("checked template-specialized above"),
    );
    let mut template_parameters = info_1.template_params.duplicate();
    // Deduction must discover bindings afresh; an argument left over from
    // c1's own specialization would make it succeed vacuously.
    template_parameters.clear_arguments();

    let scratch_name = interner.intern_string("__faked_template_name");
    let scratch =
        interner.scratch_function_template(scratch_name, template_parameters, faked_primary_type_1);
    let faked_type_1 = scratch.primary_type();

    compare_function_template_specialization(
        interner,
        faked_type_1,
        faked_type_2,
        decl_context,
        /* explicit_template_args */ None,
        locus,
        /* is_conversion */ false,
    )
    // `scratch` drops here, releasing the synthesized template on success
    // and failure alike.
}
