use super::*;
use cruxx_common::Span;
use cruxx_common::limits::MAX_ARGUMENTS_FOR_DEDUCTION;

fn type_params(interner: &TypeInterner, names: &[&str]) -> TemplateParamList {
    let params = names
        .iter()
        .enumerate()
        .map(|(position, name)| {
            TemplateParam::type_param(
                interner.intern_string(name),
                TemplateParamRef::new(0, position as u16),
            )
        })
        .collect();
    TemplateParamList::new(params)
}

fn type_param(interner: &TypeInterner, position: u16) -> TypeId {
    interner.intern(TypeData::TypeParam(TemplateParamRef::new(0, position)))
}

fn deduce(
    interner: &TypeInterner,
    template_params: &TemplateParamList,
    parameters: &[TypeId],
    arguments: &[TypeId],
    explicit: Option<&TemplateParamList>,
    is_function_call: bool,
) -> Result<TemplateParamList, DeductionError> {
    deduce_template_arguments(
        interner,
        template_params,
        template_params,
        arguments,
        parameters,
        parameters,
        &DeclContext::empty(),
        explicit,
        Span::DUMMY,
        is_function_call,
    )
}

#[test]
fn binds_single_type_parameter() {
    let interner = TypeInterner::new();
    let params = type_params(&interner, &["T"]);
    let t = type_param(&interner, 0);

    let deduced = deduce(&interner, &params, &[t], &[TypeId::INT], None, false).unwrap();
    assert_eq!(deduced.argument(0), Some(&TemplateArgument::Type(TypeId::INT)));
    assert!(deduced.is_fully_bound());
}

#[test]
fn inconsistent_bindings_fail() {
    let interner = TypeInterner::new();
    let params = type_params(&interner, &["T"]);
    let t = type_param(&interner, 0);

    let result = deduce(
        &interner,
        &params,
        &[t, t],
        &[TypeId::INT, TypeId::DOUBLE],
        None,
        false,
    );
    assert_eq!(
        result,
        Err(DeductionError::Inconsistent {
            param: TemplateParamRef::new(0, 0)
        })
    );
}

#[test]
fn explicit_argument_conflict_fails() {
    let interner = TypeInterner::new();
    let params = type_params(&interner, &["T"]);
    let t = type_param(&interner, 0);

    let mut explicit = params.duplicate();
    explicit.set_argument(0, TemplateArgument::Type(TypeId::INT));

    let result = deduce(&interner, &params, &[t], &[TypeId::DOUBLE], Some(&explicit), false);
    assert_eq!(
        result,
        Err(DeductionError::Inconsistent {
            param: TemplateParamRef::new(0, 0)
        })
    );
}

#[test]
fn explicit_argument_agreeing_with_deduction_succeeds() {
    let interner = TypeInterner::new();
    let params = type_params(&interner, &["T"]);
    let t = type_param(&interner, 0);

    let mut explicit = params.duplicate();
    explicit.set_argument(0, TemplateArgument::Type(TypeId::INT));

    let deduced = deduce(&interner, &params, &[t], &[TypeId::INT], Some(&explicit), false).unwrap();
    assert_eq!(deduced.argument(0), Some(&TemplateArgument::Type(TypeId::INT)));
}

#[test]
fn parameter_in_non_deduced_position_fails() {
    let interner = TypeInterner::new();
    // U never appears among the parameter types.
    let params = type_params(&interner, &["T", "U"]);
    let t = type_param(&interner, 0);

    let result = deduce(&interner, &params, &[t], &[TypeId::INT], None, false);
    assert_eq!(
        result,
        Err(DeductionError::Undeduced {
            param: TemplateParamRef::new(0, 1)
        })
    );
}

#[test]
fn nested_structural_deduction() {
    let interner = TypeInterner::new();
    let params = type_params(&interner, &["T"]);
    let t = type_param(&interner, 0);

    let pattern = interner.pointer(interner.pointer(t));
    let argument = interner.pointer(interner.pointer(TypeId::INT));

    let deduced = deduce(&interner, &params, &[pattern], &[argument], None, false).unwrap();
    assert_eq!(deduced.argument(0), Some(&TemplateArgument::Type(TypeId::INT)));
}

#[test]
fn structural_mismatch_fails() {
    let interner = TypeInterner::new();
    let params = type_params(&interner, &["T"]);
    let t = type_param(&interner, 0);

    let pattern = interner.pointer(t);
    let result = deduce(&interner, &params, &[pattern], &[TypeId::INT], None, false);
    assert!(matches!(result, Err(DeductionError::Mismatch { .. })));
}

#[test]
fn reference_pattern_deduces_through_referenced_type() {
    let interner = TypeInterner::new();
    let params = type_params(&interner, &["T"]);
    let t = type_param(&interner, 0);

    let pattern = interner.lvalue_ref(t);
    let const_int = interner.qualified(CvQualifiers::CONST, TypeId::INT);
    let argument = interner.lvalue_ref(const_int);

    let deduced = deduce(&interner, &params, &[pattern], &[argument], None, false).unwrap();
    assert_eq!(deduced.argument(0), Some(&TemplateArgument::Type(const_int)));
}

#[test]
fn qualified_pattern_binds_remainder_qualification() {
    let interner = TypeInterner::new();
    let params = type_params(&interner, &["T"]);
    let t = type_param(&interner, 0);

    // const T against const volatile int deduces T = volatile int.
    let pattern = interner.qualified(CvQualifiers::CONST, t);
    let argument = interner.qualified(
        CvQualifiers::CONST | CvQualifiers::VOLATILE,
        TypeId::INT,
    );

    let deduced = deduce(&interner, &params, &[pattern], &[argument], None, false).unwrap();
    let volatile_int = interner.qualified(CvQualifiers::VOLATILE, TypeId::INT);
    assert_eq!(deduced.argument(0), Some(&TemplateArgument::Type(volatile_int)));
}

#[test]
fn qualified_pattern_requires_argument_qualification() {
    let interner = TypeInterner::new();
    let params = type_params(&interner, &["T"]);
    let t = type_param(&interner, 0);

    let pattern = interner.qualified(CvQualifiers::CONST, t);
    let result = deduce(&interner, &params, &[pattern], &[TypeId::INT], None, false);
    assert!(matches!(result, Err(DeductionError::Mismatch { .. })));
}

#[test]
fn array_bound_binds_non_type_parameter() {
    let interner = TypeInterner::new();
    let t_name = interner.intern_string("T");
    let n_name = interner.intern_string("N");
    let params = TemplateParamList::new(vec![
        TemplateParam::type_param(t_name, TemplateParamRef::new(0, 0)),
        TemplateParam::non_type_param(n_name, TemplateParamRef::new(0, 1), TypeId::INT),
    ]);
    let t = type_param(&interner, 0);

    let pattern = interner.array(t, ArrayBound::Param(TemplateParamRef::new(0, 1)));
    let argument = interner.array(TypeId::INT, ArrayBound::Constant(4));

    let deduced = deduce(&interner, &params, &[pattern], &[argument], None, false).unwrap();
    assert_eq!(deduced.argument(0), Some(&TemplateArgument::Type(TypeId::INT)));
    assert_eq!(deduced.argument(1), Some(&TemplateArgument::Value(4)));
}

#[test]
fn type_argument_for_non_type_parameter_is_a_kind_mismatch() {
    let interner = TypeInterner::new();
    let n_name = interner.intern_string("N");
    let params = TemplateParamList::new(vec![TemplateParam::non_type_param(
        n_name,
        TemplateParamRef::new(0, 0),
        TypeId::INT,
    )]);
    // A TypeParam placeholder wired to a non-type parameter can only come
    // from a broken pattern; deduction rejects the binding.
    let n_as_type = type_param(&interner, 0);

    let result = deduce(&interner, &params, &[n_as_type], &[TypeId::INT], None, false);
    assert_eq!(
        result,
        Err(DeductionError::KindMismatch {
            param: TemplateParamRef::new(0, 0)
        })
    );
}

#[test]
fn class_specialization_arguments_deduce() {
    let interner = TypeInterner::new();
    let params = type_params(&interner, &["T"]);
    let t = type_param(&interner, 0);

    let c_def = interner.new_class_template(
        interner.intern_string("C"),
        type_params(&interner, &["X"]),
    );
    let pattern = interner.class_template_specialization(c_def, &[TemplateArgument::Type(t)]);
    let argument =
        interner.class_template_specialization(c_def, &[TemplateArgument::Type(TypeId::INT)]);

    let deduced = deduce(&interner, &params, &[pattern], &[argument], None, false).unwrap();
    assert_eq!(deduced.argument(0), Some(&TemplateArgument::Type(TypeId::INT)));
}

#[test]
fn different_templates_do_not_unify() {
    let interner = TypeInterner::new();
    let params = type_params(&interner, &["T"]);
    let t = type_param(&interner, 0);

    let c_def = interner.new_class_template(
        interner.intern_string("C"),
        type_params(&interner, &["X"]),
    );
    let d_def = interner.new_class_template(
        interner.intern_string("D"),
        type_params(&interner, &["X"]),
    );
    let pattern = interner.class_template_specialization(c_def, &[TemplateArgument::Type(t)]);
    let argument =
        interner.class_template_specialization(d_def, &[TemplateArgument::Type(TypeId::INT)]);

    let result = deduce(&interner, &params, &[pattern], &[argument], None, false);
    assert!(matches!(result, Err(DeductionError::Mismatch { .. })));
}

#[test]
fn call_mode_decays_array_arguments() {
    let interner = TypeInterner::new();
    let params = type_params(&interner, &["T"]);
    let t = type_param(&interner, 0);

    let argument = interner.array(TypeId::INT, ArrayBound::Constant(3));
    let deduced = deduce(&interner, &params, &[t], &[argument], None, true).unwrap();
    assert_eq!(
        deduced.argument(0),
        Some(&TemplateArgument::Type(interner.pointer(TypeId::INT)))
    );
}

#[test]
fn call_mode_strips_top_level_qualification() {
    let interner = TypeInterner::new();
    let params = type_params(&interner, &["T"]);
    let t = type_param(&interner, 0);

    let const_int = interner.qualified(CvQualifiers::CONST, TypeId::INT);
    let deduced = deduce(&interner, &params, &[t], &[const_int], None, true).unwrap();
    assert_eq!(deduced.argument(0), Some(&TemplateArgument::Type(TypeId::INT)));
}

#[test]
fn call_mode_reference_parameter_keeps_argument_qualification() {
    let interner = TypeInterner::new();
    let params = type_params(&interner, &["T"]);
    let t = type_param(&interner, 0);

    let pattern = interner.lvalue_ref(t);
    let const_int = interner.qualified(CvQualifiers::CONST, TypeId::INT);

    let deduced = deduce(&interner, &params, &[pattern], &[const_int], None, true).unwrap();
    assert_eq!(deduced.argument(0), Some(&TemplateArgument::Type(const_int)));
}

#[test]
fn call_mode_forwarding_reference_binds_lvalue_reference() {
    let interner = TypeInterner::new();
    let params = type_params(&interner, &["T"]);
    let t = type_param(&interner, 0);

    let pattern = interner.rvalue_ref(t);
    let int_ref = interner.lvalue_ref(TypeId::INT);

    let deduced = deduce(&interner, &params, &[pattern], &[int_ref], None, true).unwrap();
    // T = int&, so T&& collapses to int&.
    assert_eq!(deduced.argument(0), Some(&TemplateArgument::Type(int_ref)));
}

#[test]
#[should_panic(expected = "too many types for deduction")]
fn exceeding_the_argument_ceiling_panics() {
    let interner = TypeInterner::new();
    let params = type_params(&interner, &["T"]);
    let t = type_param(&interner, 0);

    let parameters = vec![t; MAX_ARGUMENTS_FOR_DEDUCTION + 1];
    let arguments = vec![TypeId::INT; MAX_ARGUMENTS_FOR_DEDUCTION + 1];
    let _ = deduce(&interner, &params, &parameters, &arguments, None, false);
}
