//! Centralized limits and thresholds for the cruxx front end.
//!
//! This module provides shared constants for recursion depths and capacity
//! limits used throughout the codebase. Centralizing these values:
//! - Prevents duplicate definitions with inconsistent values
//! - Documents the rationale for each limit

/// Maximum number of simultaneous argument types in one deduction call.
///
/// Template-argument deduction walks two parallel arrays of parameter and
/// argument types. Real function templates stay far below this bound; a
/// caller handing the deduction engine more than this many types is buggy
/// upstream (for example, a runaway parameter-pack expansion), so exceeding
/// the ceiling is a hard internal error rather than a recoverable deduction
/// failure.
pub const MAX_ARGUMENTS_FOR_DEDUCTION: usize = 256;

/// Maximum recursion depth when rewriting a type under a substitution.
///
/// Substitution recurses through pointers, references, arrays, function
/// parameter lists, and template-argument lists. Source-level types are
/// shallow; a depth past this bound means the input type was built by a
/// runaway recursive instantiation, and the rewrite gives up (the type is
/// reported as not constructible).
pub const MAX_TYPE_UPDATE_DEPTH: u32 = 256;

/// Inline capacity for parameter/argument type lists.
///
/// Function parameter lists and deduction scratch arrays are backed by
/// `SmallVec<[TypeId; PARAM_LIST_INLINE]>`. Most C++ functions have fewer
/// than 8 parameters, so the common case never touches the heap.
pub const PARAM_LIST_INLINE: usize = 8;

/// Stack red zone for guarded recursion, in bytes.
///
/// When fewer than this many bytes of stack remain, recursive type walks
/// grow onto a fresh segment instead of overflowing.
pub const STACK_RED_ZONE: usize = 100 * 1024;

/// Size of each freshly grown stack segment, in bytes.
pub const STACK_PER_RECURSION: usize = 1024 * 1024;
