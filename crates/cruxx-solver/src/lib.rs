//! C++ type model, template-argument deduction, and partial ordering.
//!
//! This crate implements the template machinery of the cruxx front end:
//!
//! - **Interned structural types**: O(1) equivalence via `TypeId`
//!   comparison; construction canonicalizes (reference collapsing, cv
//!   merging, parameter adjustment)
//! - **Deduction**: structural unification of parameter-type patterns
//!   against argument types, in call and ordering modes
//! - **Substitution**: rewriting a type under a deduced binding, failing
//!   on unconstructible results
//! - **Partial ordering**: the "more specialized" tie-break for function
//!   templates, conversion-function templates, and (via a synthesized
//!   function wrapper) class templates

pub mod context;
pub mod deduce;
pub mod instantiate;
mod intern;
pub mod order;
pub mod types;

pub use context::DeclContext;
pub use deduce::{DeductionError, deduce_template_arguments};
pub use instantiate::{TypeSubstitution, update_type, update_type_with};
pub use intern::{ScratchTemplate, TypeInterner};
pub use order::{
    compare_class_template_specialization, compare_function_template_specialization,
};
pub use types::{
    ArrayBound, ClassShape, ClassShapeId, CvQualifiers, FunctionShape, FunctionShapeId,
    IntrinsicKind, RefQualifier, SpecializationHead, SpecializationId, SpecializationInfo,
    TemplateArgument, TemplateDef, TemplateDefId, TemplateParam, TemplateParamKind,
    TemplateParamList, TemplateParamRef, TypeData, TypeId,
};

// Test modules live under tests/ but compile as unit tests so they can use
// crate internals.
#[cfg(test)]
#[path = "../tests/deduce_tests.rs"]
mod deduce_tests;
#[cfg(test)]
#[path = "../tests/instantiate_tests.rs"]
mod instantiate_tests;
#[cfg(test)]
#[path = "../tests/order_tests.rs"]
mod order_tests;
