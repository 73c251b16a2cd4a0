use super::*;
use cruxx_common::Span;

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

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

/// Primary specialization type of `template <...> void f(params...)`.
fn function_template(
    interner: &TypeInterner,
    name: &str,
    template_params: TemplateParamList,
    params: &[TypeId],
) -> TypeId {
    let underlying = interner.function(TypeId::VOID, params, false, RefQualifier::None);
    let def = interner.new_function_template(interner.intern_string(name), template_params, underlying);
    interner.template_primary_type(def)
}

fn compare(interner: &TypeInterner, f1: TypeId, f2: TypeId) -> Option<TemplateParamList> {
    compare_function_template_specialization(
        interner,
        f1,
        f2,
        &DeclContext::empty(),
        None,
        Span::DUMMY,
        /* is_conversion */ false,
    )
}

// =============================================================================
// Ordinary function templates
// =============================================================================

#[test]
fn arity_mismatch_fails_both_directions() {
    let interner = TypeInterner::new();
    let t = type_param(&interner, 0);

    let one = function_template(&interner, "f", type_params(&interner, &["T"]), &[t]);
    let two = function_template(&interner, "g", type_params(&interner, &["T"]), &[t, t]);

    assert!(compare(&interner, one, two).is_none());
    assert!(compare(&interner, two, one).is_none());
}

#[test]
fn identical_templates_order_both_ways() {
    init_tracing();
    let interner = TypeInterner::new();
    let t = type_param(&interner, 0);

    let f1 = function_template(&interner, "f", type_params(&interner, &["T"]), &[t]);
    let f2 = function_template(&interner, "g", type_params(&interner, &["T"]), &[t]);

    // Neither is strictly more specialized: both directions succeed.
    assert!(compare(&interner, f1, f2).is_some());
    assert!(compare(&interner, f2, f1).is_some());
}

#[test]
fn pointer_parameter_is_strictly_more_specialized() {
    let interner = TypeInterner::new();
    let t = type_param(&interner, 0);

    let general = function_template(&interner, "f", type_params(&interner, &["T"]), &[t]);
    let pointer = function_template(
        &interner,
        "f",
        type_params(&interner, &["T"]),
        &[interner.pointer(t)],
    );

    // f(T) is less-or-equal specialized than f(T*): T deduces to T*.
    assert!(compare(&interner, general, pointer).is_some());
    // f(T*) cannot be deduced from f(T), so exactly one direction succeeds
    // and the pointer overload is strictly more specialized.
    assert!(compare(&interner, pointer, general).is_none());
}

#[test]
fn reference_parameter_is_strictly_more_specialized() {
    let interner = TypeInterner::new();
    let t = type_param(&interner, 0);

    // template <class T> void g(T) vs template <class T> void g(T&): for a
    // call with an lvalue both are viable, and partial ordering must prefer
    // the reference overload.
    let by_value = function_template(&interner, "g", type_params(&interner, &["T"]), &[t]);
    let by_reference = function_template(
        &interner,
        "g",
        type_params(&interner, &["T"]),
        &[interner.lvalue_ref(t)],
    );

    assert!(compare(&interner, by_value, by_reference).is_some());
    assert!(compare(&interner, by_reference, by_value).is_none());
}

#[test]
fn deduction_failure_on_any_index_fails_the_comparison() {
    let interner = TypeInterner::new();
    let t = type_param(&interner, 0);

    // f(T, T) requires both of g's parameters to deduce to the same type;
    // g(U, V) keeps them distinct, so deduction fails even though each
    // index matches in isolation.
    let same = function_template(&interner, "f", type_params(&interner, &["T"]), &[t, t]);
    let distinct = {
        let u = type_param(&interner, 0);
        let v = type_param(&interner, 1);
        function_template(&interner, "g", type_params(&interner, &["U", "V"]), &[u, v])
    };

    assert!(compare(&interner, same, distinct).is_none());
    // The other direction deduces U and V independently and succeeds.
    assert!(compare(&interner, distinct, same).is_some());
}

#[test]
fn deduced_arguments_are_returned_for_reuse() {
    let interner = TypeInterner::new();
    let t = type_param(&interner, 0);

    let general = function_template(&interner, "f", type_params(&interner, &["T"]), &[t]);
    let pointer = function_template(
        &interner,
        "f",
        type_params(&interner, &["T"]),
        &[interner.pointer(t)],
    );

    let deduced = compare(&interner, general, pointer).unwrap();
    assert_eq!(
        deduced.argument(0),
        Some(&TemplateArgument::Type(interner.pointer(t)))
    );
}

#[test]
#[should_panic(expected = "requires function types")]
fn non_function_inputs_panic() {
    let interner = TypeInterner::new();
    let _ = compare(&interner, TypeId::INT, TypeId::DOUBLE);
}

// =============================================================================
// Conversion-function variant
// =============================================================================

#[test]
fn conversion_variant_ignores_explicit_template_arguments() {
    let interner = TypeInterner::new();
    let t = type_param(&interner, 0);

    let general = function_template(&interner, "conv", type_params(&interner, &["T"]), &[t]);
    let pointer = function_template(
        &interner,
        "conv",
        type_params(&interner, &["T"]),
        &[interner.pointer(t)],
    );

    // An explicit binding that contradicts the deduction: the ordinary
    // variant must fail because of it...
    let mut explicit = type_params(&interner, &["T"]);
    explicit.set_argument(0, TemplateArgument::Type(TypeId::DOUBLE));

    let ordinary = compare_function_template_specialization(
        &interner,
        general,
        pointer,
        &DeclContext::empty(),
        Some(&explicit),
        Span::DUMMY,
        /* is_conversion */ false,
    );
    assert!(ordinary.is_none());

    // ...while the conversion variant never forwards it: same outcome with
    // and without the explicit list.
    let with_explicit = compare_function_template_specialization(
        &interner,
        general,
        pointer,
        &DeclContext::empty(),
        Some(&explicit),
        Span::DUMMY,
        /* is_conversion */ true,
    );
    let without_explicit = compare_function_template_specialization(
        &interner,
        general,
        pointer,
        &DeclContext::empty(),
        None,
        Span::DUMMY,
        /* is_conversion */ true,
    );
    assert_eq!(with_explicit.is_some(), without_explicit.is_some());
    assert!(with_explicit.is_some());
}

#[test]
fn conversion_variant_orders_single_parameter() {
    let interner = TypeInterner::new();
    let t = type_param(&interner, 0);

    let general = function_template(&interner, "conv", type_params(&interner, &["T"]), &[t]);
    let pointer = function_template(
        &interner,
        "conv",
        type_params(&interner, &["T"]),
        &[interner.pointer(t)],
    );

    let less_or_equal = |f1, f2| {
        compare_function_template_specialization(
            &interner,
            f1,
            f2,
            &DeclContext::empty(),
            None,
            Span::DUMMY,
            /* is_conversion */ true,
        )
    };
    assert!(less_or_equal(general, pointer).is_some());
    assert!(less_or_equal(pointer, general).is_none());
}

// =============================================================================
// Class-template adapter
// =============================================================================

#[test]
fn class_ordering_matches_hand_built_function_ordering() {
    let interner = TypeInterner::new();
    let t = type_param(&interner, 0);

    let c_def = interner.new_class_template(
        interner.intern_string("C"),
        type_params(&interner, &["T"]),
    );
    let c_general =
        interner.class_template_specialization(c_def, &[TemplateArgument::Type(t)]);
    let c_pointer = interner
        .class_template_specialization(c_def, &[TemplateArgument::Type(interner.pointer(t))]);

    let via_adapter = |c1, c2| {
        compare_class_template_specialization(
            &interner,
            c1,
            c2,
            &DeclContext::empty(),
            Span::DUMMY,
        )
        .is_some()
    };

    // The equivalent hand-constructed single-parameter function comparison.
    let by_hand = |c1: TypeId, c2: TypeId| {
        let f1 = function_template(
            &interner,
            "__wrap1",
            type_params(&interner, &["T"]),
            &[c1],
        );
        let f2 = interner.function(TypeId::VOID, &[c2], false, RefQualifier::None);
        compare(&interner, f1, f2).is_some()
    };

    assert_eq!(via_adapter(c_general, c_pointer), by_hand(c_general, c_pointer));
    assert_eq!(via_adapter(c_pointer, c_general), by_hand(c_pointer, c_general));
    // C<T*> is strictly more specialized than C<T>.
    assert!(via_adapter(c_general, c_pointer));
    assert!(!via_adapter(c_pointer, c_general));
}

#[test]
fn class_ordering_releases_scratch_template_on_every_path() {
    let interner = TypeInterner::new();
    let t = type_param(&interner, 0);

    let c_def = interner.new_class_template(
        interner.intern_string("C"),
        type_params(&interner, &["T"]),
    );
    let c_general =
        interner.class_template_specialization(c_def, &[TemplateArgument::Type(t)]);
    let c_pointer = interner
        .class_template_specialization(c_def, &[TemplateArgument::Type(interner.pointer(t))]);

    assert_eq!(interner.scratch_template_count(), 0);

    // Success path.
    let won = compare_class_template_specialization(
        &interner,
        c_general,
        c_pointer,
        &DeclContext::empty(),
        Span::DUMMY,
    );
    assert!(won.is_some());
    assert_eq!(interner.scratch_template_count(), 0);

    // Failure path.
    let lost = compare_class_template_specialization(
        &interner,
        c_pointer,
        c_general,
        &DeclContext::empty(),
        Span::DUMMY,
    );
    assert!(lost.is_none());
    assert_eq!(interner.scratch_template_count(), 0);
}

#[test]
fn class_ordering_returns_deduced_arguments() {
    let interner = TypeInterner::new();
    let t = type_param(&interner, 0);

    let c_def = interner.new_class_template(
        interner.intern_string("C"),
        type_params(&interner, &["T"]),
    );
    let c_general =
        interner.class_template_specialization(c_def, &[TemplateArgument::Type(t)]);
    let c_pointer = interner
        .class_template_specialization(c_def, &[TemplateArgument::Type(interner.pointer(t))]);

    let deduced = compare_class_template_specialization(
        &interner,
        c_general,
        c_pointer,
        &DeclContext::empty(),
        Span::DUMMY,
    )
    .unwrap();
    assert_eq!(
        deduced.argument(0),
        Some(&TemplateArgument::Type(interner.pointer(t)))
    );
}

#[test]
#[should_panic(expected = "requires template-specialized class types")]
fn non_specialized_class_inputs_panic() {
    let interner = TypeInterner::new();
    let plain = interner.class_named(interner.intern_string("S"));
    let _ = compare_class_template_specialization(
        &interner,
        plain,
        plain,
        &DeclContext::empty(),
        Span::DUMMY,
    );
}
