//! Structural representation of C++ types.
//!
//! Types are interned: every distinct type structure is stored once in the
//! [`TypeInterner`](crate::TypeInterner) and referred to by a copyable
//! [`TypeId`]. Interning canonicalizes construction (reference collapsing,
//! cv-qualifier merging, parameter adjustment), so two types are equivalent
//! under the language rules exactly when their ids are equal.

use cruxx_common::interner::Atom;
use smallvec::SmallVec;
use std::sync::Arc;

use cruxx_common::limits::PARAM_LIST_INLINE;

// =============================================================================
// TypeId - Interned Type Handle
// =============================================================================

/// Handle to an interned type.
///
/// Well-known intrinsic types have fixed ids so they can be named without an
/// interner in scope. All other ids are allocated by the interner.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeId(pub u32);

impl TypeId {
    pub const ERROR: Self = Self(0);
    pub const VOID: Self = Self(1);
    pub const BOOL: Self = Self(2);
    pub const CHAR: Self = Self(3);
    pub const SIGNED_CHAR: Self = Self(4);
    pub const UNSIGNED_CHAR: Self = Self(5);
    pub const SHORT: Self = Self(6);
    pub const UNSIGNED_SHORT: Self = Self(7);
    pub const INT: Self = Self(8);
    pub const UNSIGNED_INT: Self = Self(9);
    pub const LONG: Self = Self(10);
    pub const UNSIGNED_LONG: Self = Self(11);
    pub const LONG_LONG: Self = Self(12);
    pub const UNSIGNED_LONG_LONG: Self = Self(13);
    pub const FLOAT: Self = Self(14);
    pub const DOUBLE: Self = Self(15);
    pub const LONG_DOUBLE: Self = Self(16);
    pub const NULLPTR: Self = Self(17);

    /// First id handed out for non-intrinsic types.
    pub const FIRST_INTERNED: u32 = 18;
}

/// Built-in scalar types.
///
/// The order of this enum matches the fixed [`TypeId`] constants; the
/// interner seeds its table with one entry per kind at construction.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum IntrinsicKind {
    Error,
    Void,
    Bool,
    Char,
    SignedChar,
    UnsignedChar,
    Short,
    UnsignedShort,
    Int,
    UnsignedInt,
    Long,
    UnsignedLong,
    LongLong,
    UnsignedLongLong,
    Float,
    Double,
    LongDouble,
    NullptrT,
}

impl IntrinsicKind {
    /// All kinds, in [`TypeId`] order.
    pub const ALL: [Self; 18] = [
        Self::Error,
        Self::Void,
        Self::Bool,
        Self::Char,
        Self::SignedChar,
        Self::UnsignedChar,
        Self::Short,
        Self::UnsignedShort,
        Self::Int,
        Self::UnsignedInt,
        Self::Long,
        Self::UnsignedLong,
        Self::LongLong,
        Self::UnsignedLongLong,
        Self::Float,
        Self::Double,
        Self::LongDouble,
        Self::NullptrT,
    ];
}

// =============================================================================
// Qualifiers
// =============================================================================

bitflags::bitflags! {
    /// cv-qualifier set attached to a type.
    ///
    /// An empty set is never interned: `TypeData::Qualified` always carries
    /// at least one flag, and qualifying with the empty set returns the
    /// underlying type unchanged.
    #[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
    pub struct CvQualifiers: u8 {
        const CONST = 1 << 0;
        const VOLATILE = 1 << 1;
        const RESTRICT = 1 << 2;
    }
}

/// Ref-qualifier of a member function type (`&` / `&&` after the parameter
/// list). Ordinary function types carry `None`.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Default)]
pub enum RefQualifier {
    #[default]
    None,
    Lvalue,
    Rvalue,
}

// =============================================================================
// Template Parameters
// =============================================================================

/// Position of a formal template parameter: nesting depth of its template
/// parameter list and index within that list.
///
/// The display name of a parameter lives in its [`TemplateParam`]; identity
/// is positional only, so `template <typename A>` and `template <typename B>`
/// produce structurally identical types.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TemplateParamRef {
    pub nesting: u16,
    pub position: u16,
}

impl TemplateParamRef {
    pub const fn new(nesting: u16, position: u16) -> Self {
        Self { nesting, position }
    }
}

/// Kind of a formal template parameter.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum TemplateParamKind {
    /// `template <typename T>`
    Type,
    /// `template <int N>` — carries the declared type of the value.
    NonType(TypeId),
    /// `template <template <typename> class TT>`
    Template,
}

/// A formal template parameter.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct TemplateParam {
    pub kind: TemplateParamKind,
    pub name: Atom,
    pub param: TemplateParamRef,
}

impl TemplateParam {
    pub fn type_param(name: Atom, param: TemplateParamRef) -> Self {
        Self {
            kind: TemplateParamKind::Type,
            name,
            param,
        }
    }

    pub fn non_type_param(name: Atom, param: TemplateParamRef, value_type: TypeId) -> Self {
        Self {
            kind: TemplateParamKind::NonType(value_type),
            name,
            param,
        }
    }

    pub fn template_param(name: Atom, param: TemplateParamRef) -> Self {
        Self {
            kind: TemplateParamKind::Template,
            name,
            param,
        }
    }
}

/// A template argument: the binding of one formal parameter.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum TemplateArgument {
    /// Argument for a type parameter.
    Type(TypeId),
    /// Concrete argument for a non-type parameter.
    Value(i64),
    /// Dependent argument for a non-type parameter: the value of another
    /// template parameter, not yet known.
    ValueParam(TemplateParamRef),
    /// Argument for a template template parameter.
    Template(TemplateDefId),
}

/// Ordered template-parameter list with a parallel argument slot per
/// parameter.
///
/// The same shape serves both roles the front end needs: the *formal*
/// parameter list of a template (all slots `None`) and the *argument list*
/// of a specialization (slots bound). Duplicating and clearing a list is how
/// the class-template ordering adapter recovers the generic shape of an
/// already-bound specialization.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Default)]
pub struct TemplateParamList {
    pub params: Vec<TemplateParam>,
    pub arguments: Vec<Option<TemplateArgument>>,
}

impl TemplateParamList {
    /// New list with every argument slot empty.
    pub fn new(params: Vec<TemplateParam>) -> Self {
        let arguments = vec![None; params.len()];
        Self { params, arguments }
    }

    pub fn num_parameters(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    /// Deep copy, preserving bound arguments.
    pub fn duplicate(&self) -> Self {
        self.clone()
    }

    /// Remove every bound argument, leaving a purely formal list.
    pub fn clear_arguments(&mut self) {
        for slot in &mut self.arguments {
            *slot = None;
        }
    }

    pub fn argument(&self, index: usize) -> Option<&TemplateArgument> {
        self.arguments.get(index).and_then(|slot| slot.as_ref())
    }

    pub fn set_argument(&mut self, index: usize, argument: TemplateArgument) {
        self.arguments[index] = Some(argument);
    }

    /// True when every parameter has a bound argument.
    pub fn is_fully_bound(&self) -> bool {
        self.arguments.iter().all(|slot| slot.is_some())
    }

    /// Look up the bound argument of a parameter by its positional ref.
    pub fn argument_for(&self, param: TemplateParamRef) -> Option<&TemplateArgument> {
        self.params
            .iter()
            .position(|p| p.param == param)
            .and_then(|index| self.argument(index))
    }
}

// =============================================================================
// Shapes - Interned Aggregate Payloads
// =============================================================================

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct FunctionShapeId(pub u32);

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct ClassShapeId(pub u32);

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct SpecializationId(pub u32);

/// Identity of a template definition. Definitions are nominal: two templates
/// with identical parameter lists are still distinct.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct TemplateDefId(pub u32);

/// Structural payload of a function type.
///
/// Parameter types are stored after the language's adjustment rules have
/// been applied (top-level cv stripped, arrays and functions decayed to
/// pointers). The trailing ellipsis is a flag, not a parameter slot.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct FunctionShape {
    pub return_type: TypeId,
    pub params: SmallVec<[TypeId; PARAM_LIST_INLINE]>,
    pub has_ellipsis: bool,
    pub ref_qualifier: RefQualifier,
}

impl FunctionShape {
    /// Number of declared parameters, excluding the ellipsis.
    pub fn num_parameters(&self) -> usize {
        self.params.len()
    }
}

/// A named class type, optionally a template specialization.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ClassShape {
    pub name: Atom,
    pub specialization: Option<SpecializationId>,
}

/// The template a specialization belongs to.
///
/// In dependent code the head can itself be a template template parameter
/// (`TT<int>` inside `template <template <typename> class TT> ...`).
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum SpecializationHead {
    Template(TemplateDefId),
    Param(TemplateParamRef),
}

/// Template bookkeeping attached to a specialized type: which template it
/// specializes, the template's formal parameter list, and this
/// specialization's (possibly partially bound) argument list.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct SpecializationInfo {
    pub head: SpecializationHead,
    pub template_params: Arc<TemplateParamList>,
    pub template_args: Arc<TemplateParamList>,
}

/// A registered template definition.
#[derive(Clone, Debug)]
pub struct TemplateDef {
    pub name: Atom,
    pub params: Arc<TemplateParamList>,
    /// The primary specialization's type: a `Specialized` function type for
    /// function templates, a specialized class type for class templates.
    pub primary: TypeId,
}

// =============================================================================
// Array Bounds
// =============================================================================

/// Bound of an array type.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ArrayBound {
    /// `T[]`
    Unbounded,
    /// `T[n]`
    Constant(u64),
    /// `T[N]` where `N` is a non-type template parameter.
    Param(TemplateParamRef),
}

// =============================================================================
// TypeData - Structural Type Representation
// =============================================================================

/// One interned type structure.
///
/// Variants reference other types by id and aggregate payloads by shape id,
/// so `TypeData` itself stays cheap to clone and hash.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum TypeData {
    Intrinsic(IntrinsicKind),
    /// cv-qualified type. Never wraps another `Qualified`, never wraps a
    /// reference, and never carries an empty qualifier set.
    Qualified(CvQualifiers, TypeId),
    Pointer(TypeId),
    /// Lvalue reference. Never wraps another reference (collapsing happens
    /// at construction).
    LvalueRef(TypeId),
    /// Rvalue reference. Same collapsing invariant as `LvalueRef`.
    RvalueRef(TypeId),
    /// Pointer to member: `pointee Class::*`.
    MemberPointer { class_of: TypeId, pointee: TypeId },
    Array { element: TypeId, bound: ArrayBound },
    Function(FunctionShapeId),
    /// Template-parameter placeholder.
    TypeParam(TemplateParamRef),
    Class(ClassShapeId),
    /// A template-specialized function type: the underlying function type
    /// plus the template bookkeeping that partial ordering consumes.
    Specialized {
        underlying: TypeId,
        info: SpecializationId,
    },
}
