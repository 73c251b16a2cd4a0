//! Declaration context threaded through deduction and ordering.
//!
//! A [`DeclContext`] is an immutable value: "updating" the ambient
//! template-parameter binding builds a new context and leaves the original
//! untouched. This is what keeps sibling ordering attempts from
//! contaminating each other — a deduced binding installed for one comparison
//! is never visible to the caller's context or to another attempt.

use std::sync::Arc;

use crate::types::TemplateParamList;

/// Ambient lookup state for one comparison or deduction call.
#[derive(Clone, Debug, Default)]
pub struct DeclContext {
    template_parameters: Option<Arc<TemplateParamList>>,
}

impl DeclContext {
    pub fn empty() -> Self {
        Self::default()
    }

    /// The template-parameter binding in scope, if any.
    pub fn template_parameters(&self) -> Option<&TemplateParamList> {
        self.template_parameters.as_deref()
    }

    /// New context with the template-parameter binding replaced. The
    /// receiver is unaffected.
    #[must_use]
    pub fn with_template_parameters(&self, binding: TemplateParamList) -> Self {
        Self {
            template_parameters: Some(Arc::new(binding)),
        }
    }
}
