//! Type interning and construction.
//!
//! The [`TypeInterner`] owns every type the front end ever builds. All
//! construction goes through normalizing factory methods (reference
//! collapsing, cv merging, parameter adjustment), so structural equivalence
//! of interned types reduces to id equality. Tables are sharded and
//! append-only; the interner is safe for concurrent reads.

use dashmap::DashMap;
use rustc_hash::FxBuildHasher;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};

use cruxx_common::interner::{Atom, Interner};

use crate::types::{
    ArrayBound, ClassShape, ClassShapeId, CvQualifiers, FunctionShape, FunctionShapeId,
    IntrinsicKind, RefQualifier, SpecializationHead, SpecializationId, SpecializationInfo,
    TemplateArgument, TemplateDef, TemplateDefId, TemplateParamList, TypeData, TypeId,
};

/// Interner and factory for the structural type model.
pub struct TypeInterner {
    strings: Interner,

    type_ids: DashMap<TypeData, TypeId, FxBuildHasher>,
    types: RwLock<Vec<TypeData>>,

    function_ids: DashMap<Arc<FunctionShape>, FunctionShapeId, FxBuildHasher>,
    function_shapes: RwLock<Vec<Arc<FunctionShape>>>,

    class_ids: DashMap<Arc<ClassShape>, ClassShapeId, FxBuildHasher>,
    class_shapes: RwLock<Vec<Arc<ClassShape>>>,

    specialization_ids: DashMap<Arc<SpecializationInfo>, SpecializationId, FxBuildHasher>,
    specializations: RwLock<Vec<Arc<SpecializationInfo>>>,

    templates: DashMap<u32, Arc<TemplateDef>, FxBuildHasher>,
    next_template: AtomicU32,
    scratch_live: AtomicUsize,
}

impl TypeInterner {
    pub fn new() -> Self {
        let interner = Self {
            strings: Interner::new(),
            type_ids: DashMap::with_hasher(FxBuildHasher),
            types: RwLock::new(Vec::new()),
            function_ids: DashMap::with_hasher(FxBuildHasher),
            function_shapes: RwLock::new(Vec::new()),
            class_ids: DashMap::with_hasher(FxBuildHasher),
            class_shapes: RwLock::new(Vec::new()),
            specialization_ids: DashMap::with_hasher(FxBuildHasher),
            specializations: RwLock::new(Vec::new()),
            templates: DashMap::with_hasher(FxBuildHasher),
            next_template: AtomicU32::new(0),
            scratch_live: AtomicUsize::new(0),
        };
        // Seed the fixed intrinsic ids, in TypeId order.
        for kind in IntrinsicKind::ALL {
            interner.intern(TypeData::Intrinsic(kind));
        }
        debug_assert_eq!(
            interner.types.read().expect("type table lock poisoned").len(),
            TypeId::FIRST_INTERNED as usize
        );
        interner
    }

    // =========================================================================
    // Raw interning
    // =========================================================================

    /// Intern a type structure, returning its id. Idempotent.
    pub fn intern(&self, data: TypeData) -> TypeId {
        if let Some(existing) = self.type_ids.get(&data) {
            return *existing;
        }
        let mut types = self.types.write().expect("type table lock poisoned");
        if let Some(existing) = self.type_ids.get(&data) {
            return *existing;
        }
        let id = TypeId(u32::try_from(types.len()).expect("type table overflow"));
        types.push(data.clone());
        self.type_ids.insert(data, id);
        id
    }

    /// Structure of an interned type.
    pub fn lookup(&self, id: TypeId) -> Option<TypeData> {
        self.types
            .read()
            .expect("type table lock poisoned")
            .get(id.0 as usize)
            .cloned()
    }

    pub fn intern_string(&self, text: &str) -> Atom {
        self.strings.intern(text)
    }

    pub fn resolve_atom(&self, atom: Atom) -> Arc<str> {
        self.strings.resolve(atom)
    }

    fn intern_function_shape(&self, shape: FunctionShape) -> FunctionShapeId {
        let shape = Arc::new(shape);
        if let Some(existing) = self.function_ids.get(&shape) {
            return *existing;
        }
        let mut shapes = self
            .function_shapes
            .write()
            .expect("function table lock poisoned");
        if let Some(existing) = self.function_ids.get(&shape) {
            return *existing;
        }
        let id = FunctionShapeId(u32::try_from(shapes.len()).expect("function table overflow"));
        shapes.push(Arc::clone(&shape));
        self.function_ids.insert(shape, id);
        id
    }

    pub fn function_shape(&self, id: FunctionShapeId) -> Arc<FunctionShape> {
        Arc::clone(
            &self
                .function_shapes
                .read()
                .expect("function table lock poisoned")[id.0 as usize],
        )
    }

    fn intern_class_shape(&self, shape: ClassShape) -> ClassShapeId {
        let shape = Arc::new(shape);
        if let Some(existing) = self.class_ids.get(&shape) {
            return *existing;
        }
        let mut shapes = self
            .class_shapes
            .write()
            .expect("class table lock poisoned");
        if let Some(existing) = self.class_ids.get(&shape) {
            return *existing;
        }
        let id = ClassShapeId(u32::try_from(shapes.len()).expect("class table overflow"));
        shapes.push(Arc::clone(&shape));
        self.class_ids.insert(shape, id);
        id
    }

    pub fn class_shape(&self, id: ClassShapeId) -> Arc<ClassShape> {
        Arc::clone(
            &self
                .class_shapes
                .read()
                .expect("class table lock poisoned")[id.0 as usize],
        )
    }

    fn intern_specialization(&self, info: SpecializationInfo) -> SpecializationId {
        let info = Arc::new(info);
        if let Some(existing) = self.specialization_ids.get(&info) {
            return *existing;
        }
        let mut infos = self
            .specializations
            .write()
            .expect("specialization table lock poisoned");
        if let Some(existing) = self.specialization_ids.get(&info) {
            return *existing;
        }
        let id = SpecializationId(u32::try_from(infos.len()).expect("specialization overflow"));
        infos.push(Arc::clone(&info));
        self.specialization_ids.insert(info, id);
        id
    }

    pub fn specialization_info(&self, id: SpecializationId) -> Arc<SpecializationInfo> {
        Arc::clone(
            &self
                .specializations
                .read()
                .expect("specialization table lock poisoned")[id.0 as usize],
        )
    }

    // =========================================================================
    // Type construction
    // =========================================================================

    pub fn pointer(&self, pointee: TypeId) -> TypeId {
        self.intern(TypeData::Pointer(pointee))
    }

    /// Lvalue reference with reference collapsing: `T& &` and `T&& &` are
    /// both `T&`.
    pub fn lvalue_ref(&self, referenced: TypeId) -> TypeId {
        match self.lookup(referenced) {
            Some(TypeData::LvalueRef(inner)) | Some(TypeData::RvalueRef(inner)) => {
                self.intern(TypeData::LvalueRef(inner))
            }
            _ => self.intern(TypeData::LvalueRef(referenced)),
        }
    }

    /// Rvalue reference with reference collapsing: `T& &&` is `T&`,
    /// `T&& &&` is `T&&`.
    pub fn rvalue_ref(&self, referenced: TypeId) -> TypeId {
        match self.lookup(referenced) {
            Some(TypeData::LvalueRef(inner)) => self.intern(TypeData::LvalueRef(inner)),
            Some(TypeData::RvalueRef(inner)) => self.intern(TypeData::RvalueRef(inner)),
            _ => self.intern(TypeData::RvalueRef(referenced)),
        }
    }

    /// cv-qualify a type. Merges with existing qualifiers, ignores
    /// qualification of references, and returns the type unchanged for the
    /// empty set.
    pub fn qualified(&self, cv: CvQualifiers, ty: TypeId) -> TypeId {
        if cv.is_empty() {
            return ty;
        }
        match self.lookup(ty) {
            Some(TypeData::Qualified(existing, inner)) => {
                self.intern(TypeData::Qualified(existing | cv, inner))
            }
            Some(TypeData::LvalueRef(_)) | Some(TypeData::RvalueRef(_)) => ty,
            _ => self.intern(TypeData::Qualified(cv, ty)),
        }
    }

    pub fn array(&self, element: TypeId, bound: ArrayBound) -> TypeId {
        self.intern(TypeData::Array { element, bound })
    }

    pub fn member_pointer(&self, class_of: TypeId, pointee: TypeId) -> TypeId {
        self.intern(TypeData::MemberPointer { class_of, pointee })
    }

    /// New function type. Parameter types go through the language's
    /// adjustment rules: top-level cv-qualifiers are stripped, arrays decay
    /// to pointers, and function types decay to function pointers.
    pub fn function(
        &self,
        return_type: TypeId,
        params: &[TypeId],
        has_ellipsis: bool,
        ref_qualifier: RefQualifier,
    ) -> TypeId {
        let params = params
            .iter()
            .map(|&p| self.adjust_parameter_type(p))
            .collect();
        let shape = self.intern_function_shape(FunctionShape {
            return_type,
            params,
            has_ellipsis,
            ref_qualifier,
        });
        self.intern(TypeData::Function(shape))
    }

    fn adjust_parameter_type(&self, ty: TypeId) -> TypeId {
        let unqualified = match self.lookup(ty) {
            Some(TypeData::Qualified(_, inner)) => inner,
            _ => ty,
        };
        match self.lookup(unqualified) {
            Some(TypeData::Array { element, .. }) => self.pointer(element),
            Some(TypeData::Function(_)) => self.pointer(unqualified),
            _ => unqualified,
        }
    }

    /// New non-template named class type.
    pub fn class_named(&self, name: Atom) -> TypeId {
        let shape = self.intern_class_shape(ClassShape {
            name,
            specialization: None,
        });
        self.intern(TypeData::Class(shape))
    }

    // =========================================================================
    // Templates and specializations
    // =========================================================================

    fn allocate_template_id(&self) -> TemplateDefId {
        TemplateDefId(self.next_template.fetch_add(1, Ordering::Relaxed))
    }

    fn primary_specialization_info(
        &self,
        def: TemplateDefId,
        params: &Arc<TemplateParamList>,
    ) -> SpecializationId {
        // The primary specialization carries the formal list in both roles:
        // its argument list is the unbound shape of the template itself.
        self.intern_specialization(SpecializationInfo {
            head: SpecializationHead::Template(def),
            template_params: Arc::clone(params),
            template_args: Arc::clone(params),
        })
    }

    /// Register a function template and build its primary specialization
    /// type (a `Specialized` wrapper around `underlying`).
    pub fn new_function_template(
        &self,
        name: Atom,
        params: TemplateParamList,
        underlying: TypeId,
    ) -> TemplateDefId {
        debug_assert!(
            matches!(self.lookup(underlying), Some(TypeData::Function(_))),
            "function template requires a function type"
        );
        let def = self.allocate_template_id();
        let params = Arc::new(params);
        let info = self.primary_specialization_info(def, &params);
        let primary = self.intern(TypeData::Specialized { underlying, info });
        self.templates.insert(
            def.0,
            Arc::new(TemplateDef {
                name,
                params,
                primary,
            }),
        );
        def
    }

    /// Register a class template and build its primary specialization type.
    pub fn new_class_template(&self, name: Atom, params: TemplateParamList) -> TemplateDefId {
        let def = self.allocate_template_id();
        let params = Arc::new(params);
        let info = self.primary_specialization_info(def, &params);
        let shape = self.intern_class_shape(ClassShape {
            name,
            specialization: Some(info),
        });
        let primary = self.intern(TypeData::Class(shape));
        self.templates.insert(
            def.0,
            Arc::new(TemplateDef {
                name,
                params,
                primary,
            }),
        );
        def
    }

    /// A (possibly partial) specialization of a registered class template,
    /// with the given argument binding. Arguments may be dependent (contain
    /// template parameters of an enclosing pattern).
    pub fn class_template_specialization(
        &self,
        def: TemplateDefId,
        args: &[TemplateArgument],
    ) -> TypeId {
        let template = self.template_def(def);
        assert_eq!(
            args.len(),
            template.params.num_parameters(),
            "template argument count does not match parameter count"
        );
        let mut bound = template.params.duplicate();
        bound.clear_arguments();
        for (index, argument) in args.iter().enumerate() {
            bound.set_argument(index, *argument);
        }
        let info = self.intern_specialization(SpecializationInfo {
            head: SpecializationHead::Template(def),
            template_params: Arc::clone(&template.params),
            template_args: Arc::new(bound),
        });
        let shape = self.intern_class_shape(ClassShape {
            name: template.name,
            specialization: Some(info),
        });
        self.intern(TypeData::Class(shape))
    }

    pub fn template_def(&self, def: TemplateDefId) -> Arc<TemplateDef> {
        Arc::clone(
            self.templates
                .get(&def.0)
                .expect("template definition was released or never registered")
                .value(),
        )
    }

    /// Primary specialization type of a template.
    pub fn template_primary_type(&self, def: TemplateDefId) -> TypeId {
        self.template_def(def).primary
    }

    /// Register a *scratch* function template: identical to
    /// [`new_function_template`](Self::new_function_template) but the
    /// definition is released again when the returned guard drops. Used by
    /// the class-template ordering adapter for its synthesized template; the
    /// definition must never outlive the comparison or leak into lookup.
    pub fn scratch_function_template(
        &self,
        name: Atom,
        params: TemplateParamList,
        underlying: TypeId,
    ) -> ScratchTemplate<'_> {
        let def = self.new_function_template(name, params, underlying);
        self.scratch_live.fetch_add(1, Ordering::Relaxed);
        ScratchTemplate {
            interner: self,
            def,
        }
    }

    /// Number of scratch template definitions currently alive. Zero except
    /// while a class-template comparison is in flight.
    pub fn scratch_template_count(&self) -> usize {
        self.scratch_live.load(Ordering::Relaxed)
    }

    fn release_scratch(&self, def: TemplateDefId) {
        let removed = self.templates.remove(&def.0);
        debug_assert!(removed.is_some(), "scratch template released twice");
        self.scratch_live.fetch_sub(1, Ordering::Relaxed);
    }

    // =========================================================================
    // Introspection
    // =========================================================================

    /// Strip `Specialized` wrappers: the underlying structural type.
    pub fn canonical(&self, ty: TypeId) -> TypeId {
        let mut current = ty;
        while let Some(TypeData::Specialized { underlying, .. }) = self.lookup(current) {
            current = underlying;
        }
        current
    }

    /// Structural equivalence. Construction canonicalizes, so two types are
    /// equivalent exactly when their canonical ids coincide.
    pub fn equivalent_types(&self, a: TypeId, b: TypeId) -> bool {
        self.canonical(a) == self.canonical(b)
    }

    pub fn is_function_type(&self, ty: TypeId) -> bool {
        matches!(
            self.lookup(self.canonical(ty)),
            Some(TypeData::Function(_))
        )
    }

    fn function_shape_of(&self, ty: TypeId) -> Option<Arc<FunctionShape>> {
        match self.lookup(self.canonical(ty)) {
            Some(TypeData::Function(shape)) => Some(self.function_shape(shape)),
            _ => None,
        }
    }

    /// Number of declared parameters of a function type, excluding the
    /// trailing ellipsis.
    pub fn function_num_parameters(&self, ty: TypeId) -> usize {
        self.function_shape_of(ty)
            .expect("not a function type")
            .num_parameters()
    }

    pub fn function_has_ellipsis(&self, ty: TypeId) -> bool {
        self.function_shape_of(ty)
            .expect("not a function type")
            .has_ellipsis
    }

    pub fn function_parameter_type(&self, ty: TypeId, index: usize) -> TypeId {
        self.function_shape_of(ty).expect("not a function type").params[index]
    }

    pub fn function_return_type(&self, ty: TypeId) -> TypeId {
        self.function_shape_of(ty)
            .expect("not a function type")
            .return_type
    }

    pub fn is_named_class_type(&self, ty: TypeId) -> bool {
        matches!(self.lookup(self.canonical(ty)), Some(TypeData::Class(_)))
    }

    /// True for class types, seen through cv-qualification. Used to validate
    /// the class side of a pointer to member.
    pub fn is_class_type(&self, ty: TypeId) -> bool {
        let ty = self.canonical(ty);
        match self.lookup(ty) {
            Some(TypeData::Class(_)) => true,
            Some(TypeData::Qualified(_, inner)) => self.is_named_class_type(inner),
            _ => false,
        }
    }

    /// Template bookkeeping of a specialized type (function or class), if
    /// any.
    pub fn specialization_of(&self, ty: TypeId) -> Option<SpecializationId> {
        match self.lookup(ty) {
            Some(TypeData::Specialized { info, .. }) => Some(info),
            Some(TypeData::Class(shape)) => self.class_shape(shape).specialization,
            _ => None,
        }
    }

    pub fn is_template_specialized_type(&self, ty: TypeId) -> bool {
        self.specialization_of(ty).is_some()
    }

    // =========================================================================
    // Display
    // =========================================================================

    /// Human-readable rendering for trace events. Not a declarator printer;
    /// just enough to follow deduction traces.
    pub fn display(&self, ty: TypeId) -> String {
        match self.lookup(ty) {
            None => format!("<invalid #{}>", ty.0),
            Some(TypeData::Intrinsic(kind)) => format!("{kind:?}").to_lowercase(),
            Some(TypeData::Qualified(cv, inner)) => {
                let mut out = String::new();
                if cv.contains(CvQualifiers::CONST) {
                    out.push_str("const ");
                }
                if cv.contains(CvQualifiers::VOLATILE) {
                    out.push_str("volatile ");
                }
                if cv.contains(CvQualifiers::RESTRICT) {
                    out.push_str("restrict ");
                }
                out.push_str(&self.display(inner));
                out
            }
            Some(TypeData::Pointer(pointee)) => format!("{}*", self.display(pointee)),
            Some(TypeData::LvalueRef(inner)) => format!("{}&", self.display(inner)),
            Some(TypeData::RvalueRef(inner)) => format!("{}&&", self.display(inner)),
            Some(TypeData::MemberPointer { class_of, pointee }) => {
                format!("{} {}::*", self.display(pointee), self.display(class_of))
            }
            Some(TypeData::Array { element, bound }) => match bound {
                ArrayBound::Unbounded => format!("{}[]", self.display(element)),
                ArrayBound::Constant(n) => format!("{}[{n}]", self.display(element)),
                ArrayBound::Param(p) => {
                    format!("{}[{{{}.{}}}]", self.display(element), p.nesting, p.position)
                }
            },
            Some(TypeData::Function(shape)) => {
                let shape = self.function_shape(shape);
                let mut out = format!("{} (", self.display(shape.return_type));
                for (index, &param) in shape.params.iter().enumerate() {
                    if index > 0 {
                        out.push_str(", ");
                    }
                    out.push_str(&self.display(param));
                }
                if shape.has_ellipsis {
                    if !shape.params.is_empty() {
                        out.push_str(", ");
                    }
                    out.push_str("...");
                }
                out.push(')');
                out
            }
            Some(TypeData::TypeParam(p)) => format!("{{{}.{}}}", p.nesting, p.position),
            Some(TypeData::Class(shape)) => {
                let shape = self.class_shape(shape);
                let mut out = self.resolve_atom(shape.name).to_string();
                if let Some(info) = shape.specialization {
                    let info = self.specialization_info(info);
                    out.push('<');
                    for (index, slot) in info.template_args.arguments.iter().enumerate() {
                        if index > 0 {
                            out.push_str(", ");
                        }
                        match slot {
                            None => out.push('?'),
                            Some(TemplateArgument::Type(t)) => out.push_str(&self.display(*t)),
                            Some(TemplateArgument::Value(v)) => out.push_str(&v.to_string()),
                            Some(TemplateArgument::ValueParam(p)) => {
                                out.push_str(&format!("{{{}.{}}}", p.nesting, p.position));
                            }
                            Some(TemplateArgument::Template(def)) => {
                                out.push_str(&self.resolve_atom(self.template_def(*def).name));
                            }
                        }
                    }
                    out.push('>');
                }
                out
            }
            Some(TypeData::Specialized { underlying, .. }) => self.display(underlying),
        }
    }
}

impl Default for TypeInterner {
    fn default() -> Self {
        Self::new()
    }
}

/// RAII guard for a scratch template definition.
///
/// The class-template ordering adapter wraps its synthesized template in one
/// of these so the definition is released on every exit path, early failures
/// included.
pub struct ScratchTemplate<'a> {
    interner: &'a TypeInterner,
    def: TemplateDefId,
}

impl ScratchTemplate<'_> {
    pub fn def_id(&self) -> TemplateDefId {
        self.def
    }

    /// Primary specialization type of the scratch template.
    pub fn primary_type(&self) -> TypeId {
        self.interner.template_primary_type(self.def)
    }
}

impl Drop for ScratchTemplate<'_> {
    fn drop(&mut self) {
        self.interner.release_scratch(self.def);
    }
}
